//! Event sink capability.
//!
//! The scheduler records what it decided (enqueue, assignment, preemption,
//! reprioritization, drops) into a caller-supplied [`EventSink`]. It never
//! reads events back; downstream consumption belongs to the caller.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::{AccountId, Priority, RequestId, WorkerId};
use crate::util::clock::Timestamp;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Request entered the queue.
    Enqueued,
    /// Request was bound to an idle worker.
    Assigned,
    /// Running request was aborted in favor of another.
    Preempted,
    /// Running request changed tier in place.
    Reprioritized,
    /// Worker reported idle after running the request.
    Completed,
    /// Execution layer reported the request gone.
    Absent,
    /// Unconfirmed assignment was undone.
    Unassigned,
    /// Request was discarded after queueing too long.
    Dropped,
    /// Idle worker was forgotten after the expiry window.
    WorkerExpired,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Enqueued => "enqueued",
            Self::Assigned => "assigned",
            Self::Preempted => "preempted",
            Self::Reprioritized => "reprioritized",
            Self::Completed => "completed",
            Self::Absent => "absent",
            Self::Unassigned => "unassigned",
            Self::Dropped => "dropped",
            Self::WorkerExpired => "worker_expired",
        };
        f.write_str(s)
    }
}

/// Structured audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEvent {
    /// Deterministic identifier derived from the subject, kind and time.
    pub event_id: String,
    /// What happened.
    pub kind: EventKind,
    /// Scheduler time of the event.
    pub time: Timestamp,
    /// Request concerned, if any.
    pub request_id: Option<RequestId>,
    /// Account owning the request, if known.
    pub account_id: Option<AccountId>,
    /// Worker concerned, if any.
    pub worker_id: Option<WorkerId>,
    /// Tier the request runs at after the event, if relevant.
    pub priority: Option<Priority>,
    /// Additional context.
    pub detail: Option<String>,
}

impl TaskEvent {
    /// Attach the request and its owning account.
    #[must_use]
    pub fn with_request(mut self, request_id: &RequestId, account_id: &AccountId) -> Self {
        self.event_id = format!("{request_id}-{}-{}", self.kind, self.time.as_millis());
        self.request_id = Some(request_id.clone());
        self.account_id = Some(account_id.clone());
        self
    }

    /// Attach the worker.
    #[must_use]
    pub fn with_worker(mut self, worker_id: &WorkerId) -> Self {
        if self.request_id.is_none() {
            self.event_id = format!("{worker_id}-{}-{}", self.kind, self.time.as_millis());
        }
        self.worker_id = Some(worker_id.clone());
        self
    }

    /// Attach the resulting priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Attach free-form context.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Helper to start an event of `kind` at `time`.
#[must_use]
pub fn build_event(kind: EventKind, time: Timestamp) -> TaskEvent {
    TaskEvent {
        event_id: format!("{kind}-{}", time.as_millis()),
        kind,
        time,
        request_id: None,
        account_id: None,
        worker_id: None,
        priority: None,
        detail: None,
    }
}

/// Append-only event collector.
pub trait EventSink: Send {
    /// Record an event.
    fn record(&mut self, event: TaskEvent);
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn record(&mut self, _event: TaskEvent) {}
}

impl EventSink for Vec<TaskEvent> {
    fn record(&mut self, event: TaskEvent) {
        self.push(event);
    }
}

/// Bounded in-memory sink for tests and development; drops the oldest event
/// when full.
#[derive(Debug, Clone)]
pub struct InMemoryEventSink {
    events: VecDeque<TaskEvent>,
    max_events: usize,
}

impl InMemoryEventSink {
    /// Create a sink holding at most `max_events` events.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events.min(1024)),
            max_events,
        }
    }

    /// Snapshot of stored events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<TaskEvent> {
        self.events.iter().cloned().collect()
    }

    /// Stored events of one kind.
    #[must_use]
    pub fn of_kind(&self, kind: EventKind) -> Vec<TaskEvent> {
        self.events.iter().filter(|e| e.kind == kind).cloned().collect()
    }

    /// Number of stored events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for InMemoryEventSink {
    fn record(&mut self, event: TaskEvent) {
        if self.max_events == 0 {
            return;
        }
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}
