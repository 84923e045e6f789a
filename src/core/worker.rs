//! Execution agents and the task each one is running.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::request::TaskRequest;
use super::types::{Balance, Priority, WorkerId};
use crate::util::clock::Timestamp;

/// The task occupying a running worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningTask {
    /// The request being run.
    pub request: TaskRequest,
    /// Tier the task is currently billed at.
    pub priority: Priority,
    /// Execution-seconds accrued so far, per tier.
    pub cost: Balance,
}

/// An execution agent: idle when `running_task` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    /// Caller-assigned identifier.
    pub id: WorkerId,
    /// Labels the worker advertises.
    #[serde(default)]
    pub labels: BTreeSet<String>,
    /// Last authoritative observation.
    pub confirmed_time: Timestamp,
    /// Last scheduler tick at which the visible state changed.
    pub modified_time: Timestamp,
    /// Task being run, if any.
    pub running_task: Option<RunningTask>,
}

impl Worker {
    /// A fresh idle worker.
    #[must_use]
    pub const fn idle(
        id: WorkerId,
        labels: BTreeSet<String>,
        confirmed_time: Timestamp,
        modified_time: Timestamp,
    ) -> Self {
        Self {
            id,
            labels,
            confirmed_time,
            modified_time,
            running_task: None,
        }
    }

    /// Whether the worker has no task.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.running_task.is_none()
    }

    /// Priority of the running task, if any.
    #[must_use]
    pub fn running_priority(&self) -> Option<Priority> {
        self.running_task.as_ref().map(|t| t.priority)
    }

    /// Total accrued cost of the running task; zero when idle.
    #[must_use]
    pub fn running_cost(&self) -> f64 {
        self.running_task.as_ref().map_or(0.0, |t| t.cost.total())
    }
}
