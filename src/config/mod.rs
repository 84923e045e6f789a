//! Configuration models for schedulers and fleets of pools.

pub mod scheduler;

pub use scheduler::{
    FleetConfig, SchedulerConfig, CONFIG_PATH_ENV, DEFAULT_DEMOTE_THRESHOLD,
    DEFAULT_MAX_QUEUED_SECS, DEFAULT_PROMOTE_THRESHOLD, DEFAULT_WORKER_EXPIRATION_SECS,
};
