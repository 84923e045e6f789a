//! Serialization boundary and read-only views.
//!
//! [`SchedulerRecord`] is the lossless persistence form: state plus config,
//! without derived indexes. [`SchedulerSnapshot`] is a flattened export for
//! observers. Both are independent copies, never live views of scheduler
//! maps.

use serde::{Deserialize, Serialize};

use super::account::AccountConfig;
use super::request::TaskRequest;
use super::types::{AccountId, Balance};
use super::worker::Worker;
use crate::config::SchedulerConfig;
use crate::util::clock::Timestamp;

pub use super::state::StateRecord;

/// Full scheduler state and configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerRecord {
    /// Active configuration, including account policies.
    pub config: SchedulerConfig,
    /// Balances, workers, queue, and time.
    pub state: StateRecord,
}

/// Per-account summary in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Account identifier.
    pub id: AccountId,
    /// Current balance.
    pub balance: Balance,
    /// Quota policy.
    pub config: AccountConfig,
    /// Running tasks owned by the account.
    pub running: usize,
    /// Queued requests owned by the account.
    pub queued: usize,
}

/// Read-only export of one pool's scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    /// Pool the scheduler serves.
    pub pool_id: String,
    /// Scheduler time.
    pub last_update_time: Timestamp,
    /// Configured accounts, by id.
    pub accounts: Vec<AccountSnapshot>,
    /// Workers, by id.
    pub workers: Vec<Worker>,
    /// Queued requests, by id.
    pub queued_requests: Vec<TaskRequest>,
}

impl SchedulerSnapshot {
    /// Number of running workers.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.workers.iter().filter(|w| !w.is_idle()).count()
    }

    /// Number of idle workers.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.workers.iter().filter(|w| w.is_idle()).count()
    }
}
