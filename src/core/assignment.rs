//! Scheduling decisions handed back to the caller.

use serde::{Deserialize, Serialize};

use super::types::{Priority, RequestId, WorkerId};
use crate::util::clock::Timestamp;

/// How a worker was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    /// An idle worker was bound to the request.
    IdleWorker,
    /// A running task was aborted to free the worker.
    PreemptWorker,
}

/// An immutable scheduling decision. The caller applies it externally, e.g.
/// by dispatching the request to the worker and aborting `task_to_abort`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Idle assignment or preemption.
    pub kind: AssignmentKind,
    /// Worker that should run the request.
    pub worker_id: WorkerId,
    /// Request to run.
    pub request_id: RequestId,
    /// Request to abort; set only for preemptions.
    pub task_to_abort: Option<RequestId>,
    /// Tier the request runs at.
    pub priority: Priority,
    /// Scheduler time of the decision.
    pub time: Timestamp,
}

impl Assignment {
    pub(crate) const fn idle_worker(
        worker_id: WorkerId,
        request_id: RequestId,
        priority: Priority,
        time: Timestamp,
    ) -> Self {
        Self {
            kind: AssignmentKind::IdleWorker,
            worker_id,
            request_id,
            task_to_abort: None,
            priority,
            time,
        }
    }

    pub(crate) const fn preempt_worker(
        worker_id: WorkerId,
        request_id: RequestId,
        task_to_abort: RequestId,
        priority: Priority,
        time: Timestamp,
    ) -> Self {
        Self {
            kind: AssignmentKind::PreemptWorker,
            worker_id,
            request_id,
            task_to_abort: Some(task_to_abort),
            priority,
            time,
        }
    }

    /// Whether this decision aborts a running task.
    #[must_use]
    pub const fn is_preemption(&self) -> bool {
        matches!(self.kind, AssignmentKind::PreemptWorker)
    }
}
