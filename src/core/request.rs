//! Queued units of work.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::types::{AccountId, RequestId};
use crate::util::clock::Timestamp;

/// A unit of work awaiting (or occupying) a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Caller-assigned unique identifier.
    pub id: RequestId,
    /// Owning account.
    pub account_id: AccountId,
    /// When the request was first enqueued.
    pub enqueue_time: Timestamp,
    /// Last tick at which the request was considered and not matched.
    pub examined_time: Timestamp,
    /// Last authoritative observation of this request.
    pub confirmed_time: Timestamp,
    /// Labels a worker must carry to run this request.
    #[serde(default)]
    pub base_labels: BTreeSet<String>,
    /// Labels a worker should preferably carry; others can be provisioned.
    #[serde(default)]
    pub provisionable_labels: BTreeSet<String>,
}

impl TaskRequest {
    /// New request enqueued at `enqueue_time`.
    pub fn new(
        id: impl Into<RequestId>,
        account_id: impl Into<AccountId>,
        enqueue_time: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            account_id: account_id.into(),
            enqueue_time,
            examined_time: enqueue_time,
            confirmed_time: enqueue_time,
            base_labels: BTreeSet::new(),
            provisionable_labels: BTreeSet::new(),
        }
    }

    /// Require these labels on the worker.
    #[must_use]
    pub fn with_base_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Prefer workers carrying these labels.
    #[must_use]
    pub fn with_provisionable_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provisionable_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Whether a worker with `labels` may run this request at all.
    #[must_use]
    pub fn runs_on(&self, labels: &BTreeSet<String>) -> bool {
        self.base_labels.is_subset(labels)
    }

    /// Whether a worker with `labels` needs no provisioning for this request.
    #[must_use]
    pub fn fits_exactly(&self, labels: &BTreeSet<String>) -> bool {
        self.runs_on(labels) && self.provisionable_labels.is_subset(labels)
    }

    /// Whether the request has waited longer than `max_queued_secs` at `now`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn queued_too_long(&self, now: Timestamp, max_queued_secs: u64) -> bool {
        now.seconds_since(self.enqueue_time) > max_queued_secs as f64
    }
}
