//! Scheduler-owned state: balances, workers, and queued requests.
//!
//! `State` keeps a derived index from running request to worker. Every method
//! that starts, finishes, or drops a running task updates the index in the
//! same call, and nothing outside this module can touch a worker's
//! `running_task`, so the index cannot diverge from the worker map.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::error::{SchedulerError, SchedulerResult};
use super::request::TaskRequest;
use super::types::{AccountId, Balance, Priority, RequestId, WorkerId, FREE_BUCKET};
use super::worker::{RunningTask, Worker};
use crate::util::clock::Timestamp;

/// Serializable form of [`State`], without derived indexes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Balance per account.
    pub balances: BTreeMap<AccountId, Balance>,
    /// Known workers, idle or running.
    pub workers: BTreeMap<WorkerId, Worker>,
    /// Requests waiting for a worker.
    pub queued_requests: BTreeMap<RequestId, TaskRequest>,
    /// Time of the last accepted time advance.
    pub last_update_time: Timestamp,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct State {
    balances: BTreeMap<AccountId, Balance>,
    workers: BTreeMap<WorkerId, Worker>,
    queued_requests: BTreeMap<RequestId, TaskRequest>,
    last_update_time: Timestamp,
    running_requests: BTreeMap<RequestId, WorkerId>,
}

impl State {
    pub(crate) fn new(t: Timestamp) -> Self {
        Self {
            last_update_time: t,
            ..Self::default()
        }
    }

    /// Rebuild state from its record, rejecting records where a request is
    /// not in exactly one place or a map key disagrees with its entry.
    pub(crate) fn from_record(record: StateRecord) -> SchedulerResult<Self> {
        if let Some((key, request)) = record.queued_requests.iter().find(|(k, r)| **k != r.id) {
            return Err(SchedulerError::InconsistentState(format!(
                "queued request stored under {key} has id {}",
                request.id
            )));
        }

        let mut running_requests = BTreeMap::new();
        for (key, worker) in &record.workers {
            if *key != worker.id {
                return Err(SchedulerError::InconsistentState(format!(
                    "worker stored under {key} has id {}",
                    worker.id
                )));
            }
            let Some(task) = worker.running_task.as_ref() else {
                continue;
            };
            let id = &task.request.id;
            if record.queued_requests.contains_key(id) {
                return Err(SchedulerError::InconsistentState(format!(
                    "request {id} is both queued and running on {key}"
                )));
            }
            if let Some(other) = running_requests.insert(id.clone(), worker.id.clone()) {
                return Err(SchedulerError::InconsistentState(format!(
                    "request {id} is running on both {other} and {key}"
                )));
            }
        }

        Ok(Self {
            balances: record.balances,
            workers: record.workers,
            queued_requests: record.queued_requests,
            last_update_time: record.last_update_time,
            running_requests,
        })
    }

    pub(crate) fn to_record(&self) -> StateRecord {
        StateRecord {
            balances: self.balances.clone(),
            workers: self.workers.clone(),
            queued_requests: self.queued_requests.clone(),
            last_update_time: self.last_update_time,
        }
    }

    pub(crate) const fn last_update_time(&self) -> Timestamp {
        self.last_update_time
    }

    pub(crate) fn set_last_update_time(&mut self, t: Timestamp) {
        self.last_update_time = t;
    }

    // Balances.

    pub(crate) const fn balances(&self) -> &BTreeMap<AccountId, Balance> {
        &self.balances
    }

    pub(crate) fn balance(&self, account: &AccountId) -> Option<&Balance> {
        self.balances.get(account)
    }

    pub(crate) fn set_balance(&mut self, account: AccountId, balance: Balance) {
        self.balances.insert(account, balance);
    }

    pub(crate) fn remove_balance(&mut self, account: &AccountId) -> Option<Balance> {
        self.balances.remove(account)
    }

    pub(crate) fn retain_balances(&mut self, mut keep: impl FnMut(&AccountId) -> bool) {
        self.balances.retain(|id, _| keep(id));
    }

    /// Credit `amount` slot-wise to an existing account.
    pub(crate) fn refund(&mut self, account: &AccountId, amount: &Balance) {
        if let Some(balance) = self.balances.get_mut(account) {
            balance.add_assign(amount);
        }
    }

    /// Debit `amount` at one paid tier of an existing account.
    pub(crate) fn charge(&mut self, account: &AccountId, priority: Priority, amount: f64) {
        if priority >= FREE_BUCKET {
            return;
        }
        if let Some(balance) = self.balances.get_mut(account) {
            balance[priority] -= amount;
        }
    }

    // Queue.

    pub(crate) const fn queued_requests(&self) -> &BTreeMap<RequestId, TaskRequest> {
        &self.queued_requests
    }

    pub(crate) fn queued(&self, id: &RequestId) -> Option<&TaskRequest> {
        self.queued_requests.get(id)
    }

    pub(crate) fn enqueue(&mut self, request: TaskRequest) {
        debug_assert!(!self.running_requests.contains_key(&request.id));
        self.queued_requests.insert(request.id.clone(), request);
    }

    pub(crate) fn take_queued(&mut self, id: &RequestId) -> Option<TaskRequest> {
        self.queued_requests.remove(id)
    }

    pub(crate) fn mark_examined(&mut self, id: &RequestId, t: Timestamp) {
        if let Some(request) = self.queued_requests.get_mut(id) {
            request.examined_time = t;
        }
    }

    // Workers.

    pub(crate) const fn workers(&self) -> &BTreeMap<WorkerId, Worker> {
        &self.workers
    }

    pub(crate) fn worker(&self, id: &WorkerId) -> Option<&Worker> {
        self.workers.get(id)
    }

    /// Worker currently running `request`, per the running index.
    pub(crate) fn worker_for(&self, request: &RequestId) -> Option<&WorkerId> {
        self.running_requests.get(request)
    }

    pub(crate) fn running_count(&self) -> usize {
        self.running_requests.len()
    }

    pub(crate) fn contains_request(&self, id: &RequestId) -> bool {
        self.queued_requests.contains_key(id) || self.running_requests.contains_key(id)
    }

    /// Insert a new idle worker, replacing nothing.
    pub(crate) fn insert_idle_worker(
        &mut self,
        id: WorkerId,
        labels: BTreeSet<String>,
        confirmed_time: Timestamp,
        modified_time: Timestamp,
    ) {
        if let Some(old) = self.workers.insert(
            id.clone(),
            Worker::idle(id, labels, confirmed_time, modified_time),
        ) {
            self.unindex(&old);
        }
    }

    /// Update an existing worker's labels and confirmation time. Returns
    /// whether the label set changed.
    pub(crate) fn refresh_worker(
        &mut self,
        id: &WorkerId,
        labels: BTreeSet<String>,
        confirmed_time: Timestamp,
    ) -> bool {
        let Some(worker) = self.workers.get_mut(id) else {
            return false;
        };
        worker.confirmed_time = worker.confirmed_time.max(confirmed_time);
        if worker.labels == labels {
            return false;
        }
        worker.labels = labels;
        true
    }

    pub(crate) fn confirm_worker(&mut self, id: &WorkerId, t: Timestamp) {
        if let Some(worker) = self.workers.get_mut(id) {
            worker.confirmed_time = worker.confirmed_time.max(t);
        }
    }

    pub(crate) fn touch_worker(&mut self, id: &WorkerId, t: Timestamp) {
        if let Some(worker) = self.workers.get_mut(id) {
            worker.modified_time = t;
        }
    }

    /// Remove a worker and whatever it was running.
    pub(crate) fn remove_worker(&mut self, id: &WorkerId) -> Option<Worker> {
        let worker = self.workers.remove(id)?;
        self.unindex(&worker);
        Some(worker)
    }

    /// Bind `request` to an idle worker. Returns the request back if the
    /// worker is unknown or busy.
    pub(crate) fn start_task(
        &mut self,
        worker_id: &WorkerId,
        request: TaskRequest,
        priority: Priority,
        now: Timestamp,
    ) -> Result<(), TaskRequest> {
        let Some(worker) = self.workers.get_mut(worker_id) else {
            return Err(request);
        };
        if !worker.is_idle() {
            return Err(request);
        }
        self.running_requests
            .insert(request.id.clone(), worker_id.clone());
        worker.running_task = Some(RunningTask {
            request,
            priority,
            cost: Balance::zero(),
        });
        worker.modified_time = now;
        Ok(())
    }

    /// Make a running worker idle, handing back its task.
    pub(crate) fn finish_task(
        &mut self,
        worker_id: &WorkerId,
        now: Timestamp,
    ) -> Option<RunningTask> {
        let worker = self.workers.get_mut(worker_id)?;
        let task = worker.running_task.take()?;
        worker.modified_time = now;
        self.running_requests.remove(&task.request.id);
        Some(task)
    }

    pub(crate) fn set_running_priority(&mut self, worker_id: &WorkerId, priority: Priority) {
        if let Some(task) = self
            .workers
            .get_mut(worker_id)
            .and_then(|w| w.running_task.as_mut())
        {
            task.priority = priority;
        }
    }

    /// Bill `elapsed_secs` to every task running at a paid tier.
    pub(crate) fn accrue_cost(&mut self, elapsed_secs: f64) {
        for task in self
            .workers
            .values_mut()
            .filter_map(|w| w.running_task.as_mut())
        {
            let priority = task.priority;
            if priority < FREE_BUCKET {
                task.cost[priority] += elapsed_secs;
            }
        }
    }

    fn unindex(&mut self, worker: &Worker) {
        if let Some(task) = &worker.running_task {
            self.running_requests.remove(&task.request.id);
        }
    }

    /// Whether the running index matches the worker map exactly.
    #[cfg(test)]
    pub(crate) fn index_consistent(&self) -> bool {
        Self::from_record(self.to_record())
            .is_ok_and(|rebuilt| rebuilt.running_requests == self.running_requests)
    }
}
