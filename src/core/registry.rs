//! Named schedulers, one per worker pool, each behind its own lock.
//!
//! A [`Scheduler`] is single-writer. The registry hands out exclusive access
//! one pool at a time through [`SchedulerRegistry::with_pool`], so a caller
//! can apply a whole batch (advance time, reconcile, run a pass) without
//! interleaving with other writers to the same pool. Observers read
//! snapshots, which are copies.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::error::{SchedulerError, SchedulerResult};
use super::scheduler::Scheduler;
use super::snapshot::SchedulerSnapshot;

/// Registry of per-pool schedulers.
#[derive(Debug, Default)]
pub struct SchedulerRegistry {
    pools: RwLock<BTreeMap<String, Arc<Mutex<Scheduler>>>>,
}

impl SchedulerRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `scheduler` under `pool_id`, returning the one it replaces.
    pub fn insert(&self, pool_id: impl Into<String>, scheduler: Scheduler) -> Option<Scheduler> {
        let pool_id = pool_id.into();
        tracing::info!(pool = %pool_id, "scheduler registered");
        let previous = self
            .pools
            .write()
            .insert(pool_id, Arc::new(Mutex::new(scheduler)))?;
        Some(unwrap_or_clone(previous))
    }

    /// Unregister a pool, returning its scheduler.
    pub fn remove(&self, pool_id: &str) -> Option<Scheduler> {
        let removed = self.pools.write().remove(pool_id)?;
        tracing::info!(pool = %pool_id, "scheduler removed");
        Some(unwrap_or_clone(removed))
    }

    /// Registered pool ids in order.
    #[must_use]
    pub fn pool_ids(&self) -> Vec<String> {
        self.pools.read().keys().cloned().collect()
    }

    /// Number of registered pools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pools.read().len()
    }

    /// Whether no pools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.read().is_empty()
    }

    /// Run `f` with exclusive access to one pool's scheduler.
    pub fn with_pool<R>(
        &self,
        pool_id: &str,
        f: impl FnOnce(&mut Scheduler) -> R,
    ) -> SchedulerResult<R> {
        let pool = self
            .pools
            .read()
            .get(pool_id)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownPool(pool_id.to_owned()))?;
        let mut scheduler = pool.lock();
        Ok(f(&mut scheduler))
    }

    /// Snapshot one pool.
    pub fn snapshot(&self, pool_id: &str) -> SchedulerResult<SchedulerSnapshot> {
        self.with_pool(pool_id, |s| s.snapshot(pool_id))
    }

    /// Snapshot every pool, in pool-id order.
    #[must_use]
    pub fn snapshots(&self) -> Vec<SchedulerSnapshot> {
        let pools: Vec<(String, Arc<Mutex<Scheduler>>)> = self
            .pools
            .read()
            .iter()
            .map(|(id, pool)| (id.clone(), Arc::clone(pool)))
            .collect();
        pools
            .into_iter()
            .map(|(id, pool)| {
                let scheduler = pool.lock();
                scheduler.snapshot(&id)
            })
            .collect()
    }
}

/// Take the scheduler out of a shared slot, cloning if someone else still
/// holds a handle.
fn unwrap_or_clone(pool: Arc<Mutex<Scheduler>>) -> Scheduler {
    match Arc::try_unwrap(pool) {
        Ok(exclusive) => exclusive.into_inner(),
        Err(shared) => {
            let scheduler = shared.lock();
            Scheduler::clone(&scheduler)
        }
    }
}
