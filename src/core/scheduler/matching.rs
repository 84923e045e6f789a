//! The per-tick matching pass.
//!
//! 1. Reprioritize running tasks. Tasks of unconfigured accounts drop to the
//!    free tier. Then, tier by tier, demote an account's cheapest
//!    tasks when its balance is below the demote threshold and it spends
//!    faster than it earns; promote its most expensive lower-tier tasks when
//!    its balance is above the promote threshold and it earns faster than it
//!    spends. The gap between the two thresholds keeps tasks from flapping.
//! 2. Match queued requests, most affordable tier first, then by enqueue
//!    time and request id. Each request takes an idle worker if one carries
//!    its labels, else preempts the cheapest running task at a worse tier that
//!    its account can outbid.
//! 3. Stamp unmatched requests as examined, unless fanout throttled them.
//!
//! Ties always break on identifiers, so identical inputs give identical
//! assignments.

use std::collections::BTreeMap;

use super::Scheduler;
use crate::core::account::next_affordable_below;
use crate::core::assignment::Assignment;
use crate::core::events::{build_event, EventKind, EventSink};
use crate::core::types::{AccountId, Priority, RequestId, WorkerId, FREE_BUCKET, NUM_PRIORITIES};
use crate::util::clock::Timestamp;

pub(super) fn run_once(s: &mut Scheduler, events: &mut dyn EventSink) -> Vec<Assignment> {
    let now = s.state.last_update_time();
    demote_unconfigured(s, now, events);
    for priority in 0..NUM_PRIORITIES {
        reprioritize(s, priority, now, events);
    }

    let mut fanout = FanoutCounter::new(s);
    let mut assignments = Vec::new();
    for (planned, request_id) in prioritized_requests(s) {
        let Some(request) = s.state.queued(&request_id) else {
            continue;
        };
        let account = request.account_id.clone();

        if fanout.at_limit(s, &account) {
            tracing::debug!(request = %request_id, account = %account, "throttled by fanout");
            continue;
        }

        // Preemptions earlier in this pass may have spent the account's balance.
        let priority = planned.max(s.affordable_priority(&account));
        if priority == FREE_BUCKET && free_tasks_disabled(s, &account) {
            s.state.mark_examined(&request_id, now);
            continue;
        }

        if let Some(assignment) = assign_idle_worker(s, &request_id, priority, now, events) {
            fanout.add(&account);
            assignments.push(assignment);
            continue;
        }
        if priority < FREE_BUCKET && !s.config.disable_preemption {
            if let Some((assignment, victim)) = preempt(s, &request_id, priority, now, events) {
                fanout.add(&account);
                fanout.remove(&victim);
                assignments.push(assignment);
                continue;
            }
        }
        tracing::debug!(request = %request_id, priority, "no worker available");
        s.state.mark_examined(&request_id, now);
    }

    if !assignments.is_empty() {
        tracing::info!(count = assignments.len(), "matching pass produced assignments");
    }
    assignments
}

/// Queued requests with the tier each can currently afford, in match order.
fn prioritized_requests(s: &Scheduler) -> Vec<(Priority, RequestId)> {
    let mut ordered: Vec<(Priority, Timestamp, RequestId)> = s
        .state
        .queued_requests()
        .values()
        .map(|r| (s.affordable_priority(&r.account_id), r.enqueue_time, r.id.clone()))
        .collect();
    ordered.sort();
    ordered.into_iter().map(|(p, _, id)| (p, id)).collect()
}

fn free_tasks_disabled(s: &Scheduler, account: &AccountId) -> bool {
    s.config
        .account_configs
        .get(account)
        .is_some_and(|c| c.disable_free_tasks)
}

/// Tasks of accounts that are no longer configured can afford nothing, so
/// they drop to the free tier.
fn demote_unconfigured(s: &mut Scheduler, now: Timestamp, events: &mut dyn EventSink) {
    let configs = &s.config.account_configs;
    let orphaned: Vec<WorkerId> = s
        .state
        .workers()
        .values()
        .filter_map(|w| w.running_task.as_ref().map(|t| (w, t)))
        .filter(|(_, t)| t.priority < FREE_BUCKET && !configs.contains_key(&t.request.account_id))
        .map(|(w, _)| w.id.clone())
        .collect();
    for worker_id in orphaned {
        change_priority(s, &worker_id, FREE_BUCKET, now, events);
    }
}

fn reprioritize(s: &mut Scheduler, priority: Priority, now: Timestamp, events: &mut dyn EventSink) {
    let demote_threshold = s.config.demote_threshold;
    let promote_threshold = s.config.promote_threshold;
    let accounts: Vec<AccountId> = s.config.account_configs.keys().cloned().collect();

    for account in accounts {
        let Some(balance) = s.state.balance(&account).copied() else {
            continue;
        };
        let rate = s.config.account_configs[&account].rate(priority);

        let mut at_tier = running_for(s, &account, |p| p == priority);
        #[allow(clippy::cast_precision_loss)]
        let mut net_rate = rate - at_tier.len() as f64;

        if balance[priority] < demote_threshold && net_rate < 0.0 {
            at_tier.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
            let target = next_affordable_below(&balance, priority);
            for (_, worker_id) in at_tier {
                if net_rate >= 0.0 {
                    break;
                }
                change_priority(s, &worker_id, target, now, events);
                net_rate += 1.0;
            }
        } else if balance[priority] > promote_threshold && net_rate > 0.0 {
            let mut below = running_for(s, &account, |p| p > priority);
            below.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
            for (_, worker_id) in below {
                if net_rate <= 0.0 {
                    break;
                }
                change_priority(s, &worker_id, priority, now, events);
                net_rate -= 1.0;
            }
        }
    }
}

/// `(total cost, worker)` for the account's running tasks whose tier passes
/// `tier_filter`.
fn running_for(
    s: &Scheduler,
    account: &AccountId,
    tier_filter: impl Fn(Priority) -> bool,
) -> Vec<(f64, WorkerId)> {
    s.state
        .workers()
        .values()
        .filter_map(|w| w.running_task.as_ref().map(|t| (w, t)))
        .filter(|(_, t)| &t.request.account_id == account && tier_filter(t.priority))
        .map(|(w, t)| (t.cost.total(), w.id.clone()))
        .collect()
}

fn change_priority(
    s: &mut Scheduler,
    worker_id: &WorkerId,
    priority: Priority,
    now: Timestamp,
    events: &mut dyn EventSink,
) {
    let Some(task) = s.state.worker(worker_id).and_then(|w| w.running_task.as_ref()) else {
        return;
    };
    let (request_id, account, from) = (
        task.request.id.clone(),
        task.request.account_id.clone(),
        task.priority,
    );
    s.state.set_running_priority(worker_id, priority);
    tracing::info!(
        request = %request_id,
        worker = %worker_id,
        from,
        to = priority,
        "reprioritized"
    );
    events.record(
        build_event(EventKind::Reprioritized, now)
            .with_request(&request_id, &account)
            .with_worker(worker_id)
            .with_priority(priority)
            .with_detail(format!("from {from}")),
    );
}

fn assign_idle_worker(
    s: &mut Scheduler,
    request_id: &RequestId,
    priority: Priority,
    now: Timestamp,
    events: &mut dyn EventSink,
) -> Option<Assignment> {
    let request = s.state.queued(request_id)?;
    // Workers that need no provisioning sort first.
    let worker_id = s
        .state
        .workers()
        .values()
        .filter(|w| w.is_idle() && request.runs_on(&w.labels))
        .map(|w| (!request.fits_exactly(&w.labels), &w.id))
        .min()
        .map(|(_, id)| id.clone())?;

    let request = s.state.take_queued(request_id)?;
    let account = request.account_id.clone();
    if let Err(request) = s.state.start_task(&worker_id, request, priority, now) {
        s.state.enqueue(request);
        return None;
    }
    tracing::info!(request = %request_id, worker = %worker_id, priority, "assigned idle worker");
    events.record(
        build_event(EventKind::Assigned, now)
            .with_request(request_id, &account)
            .with_worker(&worker_id)
            .with_priority(priority),
    );
    Some(Assignment::idle_worker(worker_id, request_id.clone(), priority, now))
}

/// Preempt the cheapest compatible task at a worse tier than `priority` whose
/// accrued cost the requesting account can pay. Returns the assignment and
/// the preempted task's account.
fn preempt(
    s: &mut Scheduler,
    request_id: &RequestId,
    priority: Priority,
    now: Timestamp,
    events: &mut dyn EventSink,
) -> Option<(Assignment, AccountId)> {
    let request = s.state.queued(request_id)?;
    let account = request.account_id.clone();
    let budget = s.state.balance(&account)?.get(priority);

    let (worker_id, cost) = s
        .state
        .workers()
        .values()
        .filter(|w| request.runs_on(&w.labels))
        .filter_map(|w| w.running_task.as_ref().map(|t| (w, t)))
        .filter(|(_, t)| t.priority > priority && t.cost.total() < budget)
        .min_by(|(wa, ta), (wb, tb)| {
            ta.cost
                .total()
                .total_cmp(&tb.cost.total())
                .then_with(|| tb.priority.cmp(&ta.priority))
                .then_with(|| wa.id.cmp(&wb.id))
        })
        .map(|(w, t)| (w.id.clone(), t.cost))?;

    let victim = s.state.finish_task(&worker_id, now)?;
    let victim_account = victim.request.account_id.clone();
    let victim_id = victim.request.id.clone();

    let request = s.state.take_queued(request_id)?;
    if let Err(request) = s.state.start_task(&worker_id, request, priority, now) {
        s.state.enqueue(request);
        s.state.enqueue(victim.request);
        return None;
    }
    s.state.refund(&victim_account, &cost);
    s.state.charge(&account, priority, cost.total());

    tracing::info!(
        request = %request_id,
        worker = %worker_id,
        aborted = %victim_id,
        priority,
        "preempted running task"
    );
    events.record(
        build_event(EventKind::Preempted, now)
            .with_request(&victim_id, &victim_account)
            .with_worker(&worker_id)
            .with_detail(format!("preempted by {request_id}")),
    );
    events.record(
        build_event(EventKind::Assigned, now)
            .with_request(request_id, &account)
            .with_worker(&worker_id)
            .with_priority(priority),
    );
    s.requeue(victim.request, now, events);

    Some((
        Assignment::preempt_worker(worker_id, request_id.clone(), victim_id, priority, now),
        victim_account,
    ))
}

/// Running-task counts per account, kept current through the pass.
struct FanoutCounter {
    running: BTreeMap<AccountId, u32>,
}

impl FanoutCounter {
    fn new(s: &Scheduler) -> Self {
        let mut running = BTreeMap::new();
        for task in s.state.workers().values().filter_map(|w| w.running_task.as_ref()) {
            *running.entry(task.request.account_id.clone()).or_insert(0) += 1;
        }
        Self { running }
    }

    fn at_limit(&self, s: &Scheduler, account: &AccountId) -> bool {
        let Some(config) = s.config.account_configs.get(account) else {
            return false;
        };
        config.has_fanout_limit()
            && self.running.get(account).copied().unwrap_or(0) >= config.max_fanout
    }

    fn add(&mut self, account: &AccountId) {
        *self.running.entry(account.clone()).or_insert(0) += 1;
    }

    fn remove(&mut self, account: &AccountId) {
        if let Some(count) = self.running.get_mut(account) {
            *count = count.saturating_sub(1);
        }
    }
}
