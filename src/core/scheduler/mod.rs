//! The quota scheduler: account bookkeeping, worker/request lifecycle, and
//! time advance. The per-tick matching pass lives in `matching`.
//!
//! A `Scheduler` is single-writer: every method runs to completion on
//! in-memory maps, and callers serialize access (see
//! [`crate::core::SchedulerRegistry`]). Time is always passed in.

mod matching;

use std::collections::{BTreeMap, BTreeSet};

use super::account::{best_priority_for, next_balance, AccountConfig};
use super::assignment::Assignment;
use super::error::{SchedulerError, SchedulerResult};
use super::events::{build_event, EventKind, EventSink};
use super::request::TaskRequest;
use super::snapshot::{AccountSnapshot, SchedulerRecord, SchedulerSnapshot};
use super::state::State;
use super::types::{AccountId, Balance, Priority, RequestId, WorkerId, FREE_BUCKET, NUM_PRIORITIES};
use super::worker::Worker;
use crate::config::SchedulerConfig;
use crate::util::clock::Timestamp;

/// Where a known request currently is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestStatus<'a> {
    /// The request record.
    pub request: &'a TaskRequest,
    /// Worker running it, or `None` while queued.
    pub worker: Option<&'a WorkerId>,
    /// Tier it runs at, or `None` while queued.
    pub priority: Option<Priority>,
}

/// Banked-quota scheduler for one worker pool.
#[derive(Debug, Clone)]
pub struct Scheduler {
    state: State,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Fresh scheduler at `t` with the default configuration.
    #[must_use]
    pub fn new(t: Timestamp) -> Self {
        Self::with_config(t, SchedulerConfig::default())
    }

    /// Fresh scheduler at `t` with `config`. Configured accounts start with a
    /// zero balance.
    #[must_use]
    pub fn with_config(t: Timestamp, config: SchedulerConfig) -> Self {
        let mut state = State::new(t);
        for id in config.account_configs.keys() {
            state.set_balance(id.clone(), Balance::zero());
        }
        Self { state, config }
    }

    /// Rebuild a scheduler from its serialized form.
    ///
    /// Fails with [`SchedulerError::InconsistentState`] if a request is
    /// queued and running at once, or running on more than one worker.
    pub fn from_record(record: SchedulerRecord) -> SchedulerResult<Self> {
        Ok(Self {
            state: State::from_record(record.state)?,
            config: record.config,
        })
    }

    /// Independent copy of the full state and configuration.
    #[must_use]
    pub fn to_record(&self) -> SchedulerRecord {
        SchedulerRecord {
            config: self.config.clone(),
            state: self.state.to_record(),
        }
    }

    /// Encode state and configuration as JSON.
    pub fn to_json(&self) -> SchedulerResult<String> {
        Ok(serde_json::to_string(&self.to_record())?)
    }

    /// Decode a scheduler previously encoded with [`Self::to_json`].
    pub fn from_json(input: &str) -> SchedulerResult<Self> {
        let record: SchedulerRecord = serde_json::from_str(input)?;
        Self::from_record(record)
    }

    /// Read-only export for observers, labelled with `pool_id`.
    #[must_use]
    pub fn snapshot(&self, pool_id: &str) -> SchedulerSnapshot {
        let mut running: BTreeMap<&AccountId, usize> = BTreeMap::new();
        for task in self.state.workers().values().filter_map(|w| w.running_task.as_ref()) {
            *running.entry(&task.request.account_id).or_default() += 1;
        }
        let mut queued: BTreeMap<&AccountId, usize> = BTreeMap::new();
        for request in self.state.queued_requests().values() {
            *queued.entry(&request.account_id).or_default() += 1;
        }
        let accounts = self
            .config
            .account_configs
            .iter()
            .map(|(id, config)| AccountSnapshot {
                id: id.clone(),
                balance: self.state.balance(id).copied().unwrap_or_default(),
                config: config.clone(),
                running: running.get(id).copied().unwrap_or(0),
                queued: queued.get(id).copied().unwrap_or(0),
            })
            .collect();
        SchedulerSnapshot {
            pool_id: pool_id.to_owned(),
            last_update_time: self.state.last_update_time(),
            accounts,
            workers: self.state.workers().values().cloned().collect(),
            queued_requests: self.state.queued_requests().values().cloned().collect(),
        }
    }

    // Accounts.

    /// Add or replace an account, resetting its balance to `initial_balance`
    /// (zero when `None`).
    ///
    /// # Panics
    ///
    /// Panics if `initial_balance` has more than [`NUM_PRIORITIES`] entries.
    pub fn add_account(
        &mut self,
        id: impl Into<AccountId>,
        config: AccountConfig,
        initial_balance: Option<&[f64]>,
    ) {
        let id = id.into();
        let balance = initial_balance.map_or_else(Balance::zero, Balance::from_slice);
        tracing::info!(account = %id, ?balance, "account added");
        self.config.account_configs.insert(id.clone(), config);
        self.state.set_balance(id, balance);
    }

    /// Replace an existing account's configuration, keeping its balance.
    /// Returns `false` if the account does not exist.
    pub fn update_account_config(&mut self, id: &AccountId, config: AccountConfig) -> bool {
        match self.config.account_configs.get_mut(id) {
            Some(slot) => {
                *slot = config;
                tracing::info!(account = %id, "account config updated");
                true
            }
            None => false,
        }
    }

    /// Remove an account and its balance.
    pub fn delete_account(&mut self, id: &AccountId) {
        self.config.account_configs.remove(id);
        if self.state.remove_balance(id).is_some() {
            tracing::info!(account = %id, "account deleted");
        }
    }

    /// Zero an existing account's balance; no-op for unknown accounts.
    pub fn reset_balance(&mut self, id: &AccountId) {
        if self.config.account_configs.contains_key(id) {
            self.state.set_balance(id.clone(), Balance::zero());
        }
    }

    /// Balance per account.
    #[must_use]
    pub const fn balances(&self) -> &BTreeMap<AccountId, Balance> {
        self.state.balances()
    }

    // Requests and workers.

    /// Enqueue a new request at caller time `t`.
    ///
    /// # Panics
    ///
    /// Panics if the request id is empty or already known (queued or
    /// running). Both are caller bugs.
    pub fn add_request(
        &mut self,
        mut request: TaskRequest,
        t: Timestamp,
        events: &mut dyn EventSink,
    ) {
        assert!(!request.id.is_empty(), "request id must not be empty");
        assert!(
            !self.state.contains_request(&request.id),
            "request {} is already known to the scheduler",
            request.id
        );
        request.confirmed_time = t;
        tracing::debug!(request = %request.id, account = %request.account_id, "request enqueued");
        events.record(
            build_event(EventKind::Enqueued, t).with_request(&request.id, &request.account_id),
        );
        self.state.enqueue(request);
    }

    /// Record that `worker_id` is idle with `labels`, as observed at `t`.
    ///
    /// A task the worker was running is considered finished and forgotten.
    /// Observations older than the worker's last confirmation are ignored.
    pub fn mark_idle(
        &mut self,
        worker_id: &WorkerId,
        labels: BTreeSet<String>,
        t: Timestamp,
        events: &mut dyn EventSink,
    ) {
        let now = self.state.last_update_time();
        let Some(worker) = self.state.worker(worker_id) else {
            tracing::debug!(worker = %worker_id, "new idle worker");
            self.state.insert_idle_worker(worker_id.clone(), labels, t, now);
            return;
        };
        if t < worker.confirmed_time {
            tracing::debug!(worker = %worker_id, "ignoring stale idle report");
            return;
        }

        let mut changed = false;
        if let Some(task) = self.state.finish_task(worker_id, now) {
            tracing::debug!(worker = %worker_id, request = %task.request.id, "task completed");
            events.record(
                build_event(EventKind::Completed, now)
                    .with_request(&task.request.id, &task.request.account_id)
                    .with_worker(worker_id),
            );
            changed = true;
        }
        if self.state.refresh_worker(worker_id, labels, t) {
            changed = true;
        }
        if changed {
            self.state.touch_worker(worker_id, now);
        }
    }

    /// Authoritatively record that `request_id` is running on `worker_id`.
    pub fn notify_task_running(
        &mut self,
        request_id: &RequestId,
        worker_id: &WorkerId,
        t: Timestamp,
        events: &mut dyn EventSink,
    ) {
        let now = self.state.last_update_time();
        if self.state.worker(worker_id).is_some_and(|w| t < w.confirmed_time) {
            tracing::debug!(worker = %worker_id, "ignoring stale running report");
            return;
        }
        if self.state.worker_for(request_id) == Some(worker_id) {
            self.state.confirm_worker(worker_id, t);
            return;
        }

        let request = match self.state.take_queued(request_id) {
            Some(request) => Some(request),
            None => self.state.worker_for(request_id).cloned().and_then(|other| {
                // The worker we believed was running it is in an unknown state.
                tracing::warn!(
                    request = %request_id,
                    worker = %other,
                    "request found on another worker"
                );
                self.state
                    .remove_worker(&other)
                    .and_then(|w| w.running_task)
                    .map(|task| task.request)
            }),
        };

        let Some(mut request) = request else {
            tracing::warn!(
                request = %request_id,
                worker = %worker_id,
                "unknown request running; dropping worker"
            );
            self.drop_worker(worker_id, t, events);
            return;
        };

        if let Some(previous) = self.state.finish_task(worker_id, now) {
            tracing::warn!(
                worker = %worker_id,
                request = %previous.request.id,
                "worker was running a different request"
            );
            events.record(
                build_event(EventKind::Absent, t)
                    .with_request(&previous.request.id, &previous.request.account_id)
                    .with_worker(worker_id),
            );
        }
        if self.state.worker(worker_id).is_none() {
            self.state
                .insert_idle_worker(worker_id.clone(), BTreeSet::new(), t, now);
        }

        request.confirmed_time = request.confirmed_time.max(t);
        let priority = self.affordable_priority(&request.account_id);
        let account = request.account_id.clone();
        if self.state.start_task(worker_id, request, priority, now).is_ok() {
            self.state.confirm_worker(worker_id, t);
            tracing::info!(
                request = %request_id,
                worker = %worker_id,
                priority,
                "running task reconciled"
            );
            events.record(
                build_event(EventKind::Assigned, now)
                    .with_request(request_id, &account)
                    .with_worker(worker_id)
                    .with_priority(priority)
                    .with_detail("reconciled"),
            );
        }
    }

    /// Authoritatively record that `request_id` is neither queued nor
    /// running anywhere.
    pub fn notify_task_absent(
        &mut self,
        request_id: &RequestId,
        t: Timestamp,
        events: &mut dyn EventSink,
    ) {
        if let Some(request) = self.state.queued(request_id) {
            if t < request.confirmed_time {
                return;
            }
            let account = request.account_id.clone();
            self.state.take_queued(request_id);
            tracing::debug!(request = %request_id, "queued request absent");
            events.record(build_event(EventKind::Absent, t).with_request(request_id, &account));
            return;
        }

        let Some(worker_id) = self.state.worker_for(request_id).cloned() else {
            return;
        };
        let stale = self
            .state
            .worker(&worker_id)
            .and_then(|w| w.running_task.as_ref())
            .is_some_and(|task| t < task.request.confirmed_time);
        if stale {
            return;
        }
        // The worker's state is unknown once its task vanished.
        tracing::debug!(request = %request_id, worker = %worker_id, "running request absent");
        self.drop_worker(&worker_id, t, events);
    }

    /// Undo a local assignment that the execution layer never confirmed.
    ///
    /// The worker is forgotten. The request is requeued, or dropped if it has
    /// waited longer than the configured maximum as of `t`.
    pub fn unassign(
        &mut self,
        request_id: &RequestId,
        worker_id: &WorkerId,
        t: Timestamp,
        events: &mut dyn EventSink,
    ) -> SchedulerResult<()> {
        if self.state.worker_for(request_id) != Some(worker_id) {
            return Err(SchedulerError::NotAssigned {
                request: request_id.clone(),
                worker: worker_id.clone(),
            });
        }
        let Some(task) = self.state.remove_worker(worker_id).and_then(|w| w.running_task) else {
            return Err(SchedulerError::NotAssigned {
                request: request_id.clone(),
                worker: worker_id.clone(),
            });
        };
        let request = task.request;
        events.record(
            build_event(EventKind::Unassigned, t)
                .with_request(&request.id, &request.account_id)
                .with_worker(worker_id),
        );
        self.requeue(request, t, events);
        Ok(())
    }

    // Time.

    /// Advance scheduler time to `t`: bill running tasks, replenish balances,
    /// and expire stale idle workers. Earlier times are ignored.
    #[allow(clippy::cast_precision_loss)]
    pub fn update_time(&mut self, t: Timestamp, events: &mut dyn EventSink) {
        let last = self.state.last_update_time();
        if t < last {
            tracing::debug!(%t, %last, "ignoring time regression");
            return;
        }
        let elapsed = t.seconds_since(last);

        let mut running: BTreeMap<AccountId, [usize; NUM_PRIORITIES]> = BTreeMap::new();
        for task in self.state.workers().values().filter_map(|w| w.running_task.as_ref()) {
            if task.priority < FREE_BUCKET {
                running.entry(task.request.account_id.clone()).or_default()[task.priority] += 1;
            }
        }
        self.state.accrue_cost(elapsed);

        let configs = &self.config.account_configs;
        self.state.retain_balances(|id| configs.contains_key(id));
        for (id, config) in configs {
            let before = self.state.balance(id).copied().unwrap_or_default();
            let jobs = running.get(id).map_or(&[][..], |counts| &counts[..]);
            self.state
                .set_balance(id.clone(), next_balance(&before, config, elapsed, jobs));
        }

        self.state.set_last_update_time(t);
        self.expire_workers(events);
    }

    /// Forget idle workers not confirmed within the expiry window.
    #[allow(clippy::cast_precision_loss)]
    pub fn expire_workers(&mut self, events: &mut dyn EventSink) {
        let now = self.state.last_update_time();
        let window = self.config.worker_expiration_secs;
        let expired: Vec<WorkerId> = self
            .state
            .workers()
            .values()
            .filter(|w| w.is_idle() && now.seconds_since(w.confirmed_time) > window as f64)
            .map(|w| w.id.clone())
            .collect();
        for id in expired {
            tracing::info!(worker = %id, "idle worker expired");
            self.state.remove_worker(&id);
            events.record(build_event(EventKind::WorkerExpired, now).with_worker(&id));
        }
    }

    /// Run one matching pass: reprioritize running tasks, then match queued
    /// requests to idle workers or preempt cheaper running tasks.
    pub fn run_once(&mut self, events: &mut dyn EventSink) -> Vec<Assignment> {
        matching::run_once(self, events)
    }

    // Queries.

    /// Look up a queued or running request.
    #[must_use]
    pub fn get_request(&self, id: &RequestId) -> Option<RequestStatus<'_>> {
        if let Some(request) = self.state.queued(id) {
            return Some(RequestStatus {
                request,
                worker: None,
                priority: None,
            });
        }
        let worker_id = self.state.worker_for(id)?;
        let worker = self.state.worker(worker_id)?;
        let task = worker.running_task.as_ref()?;
        Some(RequestStatus {
            request: &task.request,
            worker: Some(worker_id),
            priority: worker.running_priority(),
        })
    }

    /// Known workers.
    #[must_use]
    pub const fn workers(&self) -> &BTreeMap<WorkerId, Worker> {
        self.state.workers()
    }

    /// Look up one worker.
    #[must_use]
    pub fn worker(&self, id: &WorkerId) -> Option<&Worker> {
        self.state.worker(id)
    }

    /// Requests waiting for a worker.
    #[must_use]
    pub const fn queued_requests(&self) -> &BTreeMap<RequestId, TaskRequest> {
        self.state.queued_requests()
    }

    /// Number of running requests.
    #[must_use]
    pub fn running_request_count(&self) -> usize {
        self.state.running_count()
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Time of the last accepted time advance.
    #[must_use]
    pub const fn last_update_time(&self) -> Timestamp {
        self.state.last_update_time()
    }

    // Helpers shared with the matching pass.

    /// Best tier the account can afford now; unknown accounts run free.
    fn affordable_priority(&self, account: &AccountId) -> Priority {
        if !self.config.account_configs.contains_key(account) {
            return FREE_BUCKET;
        }
        self.state
            .balance(account)
            .map_or(FREE_BUCKET, best_priority_for)
    }

    /// Return `request` to the queue unless it has waited too long at `t`.
    fn requeue(&mut self, request: TaskRequest, t: Timestamp, events: &mut dyn EventSink) {
        if request.queued_too_long(t, self.config.max_queued_secs) {
            tracing::warn!(
                request = %request.id,
                account = %request.account_id,
                "request exceeded maximum queueing time; dropping"
            );
            events.record(
                build_event(EventKind::Dropped, t).with_request(&request.id, &request.account_id),
            );
            return;
        }
        self.state.enqueue(request);
    }

    fn drop_worker(&mut self, worker_id: &WorkerId, t: Timestamp, events: &mut dyn EventSink) {
        let Some(worker) = self.state.remove_worker(worker_id) else {
            return;
        };
        if let Some(task) = worker.running_task {
            events.record(
                build_event(EventKind::Absent, t)
                    .with_request(&task.request.id, &task.request.account_id)
                    .with_worker(worker_id),
            );
        }
    }
}
