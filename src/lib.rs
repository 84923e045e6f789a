//! # Quota Scheduler
//!
//! A banked-quota, multi-tier, preemptive scheduler core for shared worker
//! fleets.
//!
//! Accounts (tenants) earn spendable balance over time at several priority
//! tiers. Each scheduling tick, queued requests are matched to idle workers at
//! the best tier the owning account can afford; when no idle worker fits, a
//! request may preempt a running task at a worse tier if its account can
//! outbid it. Running tasks are demoted or promoted in place as balances move.
//!
//! ## Core Problem Solved
//!
//! - **Fairness under contention**: balances replenish at a configured rate
//!   and saturate at a ceiling, so no account can bank unbounded priority
//! - **Real-time preemption**: well-funded work displaces cheaper work
//! - **Hysteresis**: distinct promote/demote thresholds stop tier flapping
//! - **Reproducibility**: time is always passed in and ties break on ids, so
//!   replaying the same calls yields the same assignments
//!
//! ## Usage
//!
//! ```rust
//! use std::collections::BTreeSet;
//!
//! use quota_scheduler::core::{
//!     AccountConfig, AssignmentKind, NullEventSink, Scheduler, TaskRequest, WorkerId,
//! };
//! use quota_scheduler::util::Timestamp;
//!
//! let t0 = Timestamp::from_secs(1_000);
//! let mut events = NullEventSink;
//! let mut scheduler = Scheduler::new(t0);
//!
//! scheduler.add_account("team-a", AccountConfig::new(vec![1.0, 2.0], 600.0), Some(&[10.0]));
//! scheduler.add_request(TaskRequest::new("build-1", "team-a", t0), t0, &mut events);
//! scheduler.mark_idle(&WorkerId::from("bot-1"), BTreeSet::new(), t0, &mut events);
//!
//! scheduler.update_time(t0.plus_secs(1), &mut events);
//! let assignments = scheduler.run_once(&mut events);
//! assert_eq!(assignments.len(), 1);
//! assert_eq!(assignments[0].kind, AssignmentKind::IdleWorker);
//! assert_eq!(assignments[0].priority, 0);
//! ```
//!
//! The caller owns the loop: advance time, reconcile worker and request
//! state, run a pass, dispatch the resulting assignments, persist the
//! [`core::SchedulerRecord`]. For several pools, see
//! [`core::SchedulerRegistry`] and [`builders::build_registry`].

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling: balances, workers, requests, and the matching pass.
pub mod core;
/// Configuration models for schedulers and fleets of pools.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// Shared utilities: caller-supplied time and tracing setup.
pub mod util;
