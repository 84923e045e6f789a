//! Core scheduling: balances, workers, requests, and the matching pass.

pub mod account;
pub mod assignment;
pub mod error;
pub mod events;
pub mod registry;
pub mod request;
pub mod scheduler;
pub mod snapshot;
mod state;
pub mod types;
pub mod worker;

pub use account::{best_priority_for, next_balance, AccountConfig};
pub use assignment::{Assignment, AssignmentKind};
pub use error::{AppResult, SchedulerError, SchedulerResult};
pub use events::{
    build_event, EventKind, EventSink, InMemoryEventSink, NullEventSink, TaskEvent,
};
pub use registry::SchedulerRegistry;
pub use request::TaskRequest;
pub use scheduler::{RequestStatus, Scheduler};
pub use snapshot::{AccountSnapshot, SchedulerRecord, SchedulerSnapshot, StateRecord};
pub use types::{AccountId, Balance, Priority, RequestId, WorkerId, FREE_BUCKET, NUM_PRIORITIES};
pub use worker::{RunningTask, Worker};
