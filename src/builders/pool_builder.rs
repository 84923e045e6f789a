//! Builders to construct per-pool schedulers from configuration.

use crate::config::{FleetConfig, SchedulerConfig};
use crate::core::{Scheduler, SchedulerError, SchedulerRegistry};
use crate::util::clock::Timestamp;

/// Build a scheduler for one pool, validating its configuration first.
pub fn build_scheduler(
    cfg: &SchedulerConfig,
    now: Timestamp,
) -> Result<Scheduler, SchedulerError> {
    cfg.validate()?;
    Ok(Scheduler::with_config(now, cfg.clone()))
}

/// Build a registry with one fresh scheduler per configured pool.
pub fn build_registry(
    cfg: &FleetConfig,
    now: Timestamp,
) -> Result<SchedulerRegistry, SchedulerError> {
    cfg.validate()?;

    let registry = SchedulerRegistry::new();
    for (name, pool_cfg) in &cfg.pools {
        tracing::debug!(
            pool = %name,
            accounts = pool_cfg.account_configs.len(),
            "building scheduler"
        );
        registry.insert(name.clone(), Scheduler::with_config(now, pool_cfg.clone()));
    }
    Ok(registry)
}
