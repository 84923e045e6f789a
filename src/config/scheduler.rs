//! Scheduler and fleet configuration structures.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::{AccountConfig, AccountId, AppResult, SchedulerError};

/// Environment variable naming the fleet configuration file.
pub const CONFIG_PATH_ENV: &str = "QUOTA_SCHEDULER_CONFIG";

/// Default idle-worker expiry window.
pub const DEFAULT_WORKER_EXPIRATION_SECS: u64 = 300;
/// Default maximum time a request may wait before it is dropped instead of
/// requeued.
pub const DEFAULT_MAX_QUEUED_SECS: u64 = 600;
/// Default balance below which running tasks are demoted.
pub const DEFAULT_DEMOTE_THRESHOLD: f64 = -5.0;
/// Default balance above which running tasks are promoted.
pub const DEFAULT_PROMOTE_THRESHOLD: f64 = 5.0;

/// Configuration for one scheduler (one worker pool).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Quota policy per account.
    pub account_configs: BTreeMap<AccountId, AccountConfig>,
    /// Idle workers unseen for longer than this are forgotten.
    pub worker_expiration_secs: u64,
    /// Aborted or unassigned requests older than this are dropped.
    pub max_queued_secs: u64,
    /// Never preempt running tasks.
    pub disable_preemption: bool,
    /// Balance below which running tasks are demoted.
    pub demote_threshold: f64,
    /// Balance above which running tasks are promoted.
    pub promote_threshold: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            account_configs: BTreeMap::new(),
            worker_expiration_secs: DEFAULT_WORKER_EXPIRATION_SECS,
            max_queued_secs: DEFAULT_MAX_QUEUED_SECS,
            disable_preemption: false,
            demote_threshold: DEFAULT_DEMOTE_THRESHOLD,
            promote_threshold: DEFAULT_PROMOTE_THRESHOLD,
        }
    }
}

impl SchedulerConfig {
    /// Validate threshold and window values. Account configs are taken as
    /// given.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.demote_threshold > self.promote_threshold {
            return Err(SchedulerError::InvalidConfig(format!(
                "demote_threshold ({}) must not exceed promote_threshold ({})",
                self.demote_threshold, self.promote_threshold
            )));
        }
        if self.worker_expiration_secs == 0 {
            return Err(SchedulerError::InvalidConfig(
                "worker_expiration_secs must be greater than 0".into(),
            ));
        }
        if self.account_configs.keys().any(AccountId::is_empty) {
            return Err(SchedulerError::InvalidConfig("account id must not be empty".into()));
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, SchedulerError> {
        let cfg: Self = serde_json::from_str(input)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Root configuration: one scheduler per named pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Map of pool name to scheduler configuration.
    pub pools: BTreeMap<String, SchedulerConfig>,
}

impl FleetConfig {
    /// Validate all pools and ensure at least one exists.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.pools.is_empty() {
            return Err(SchedulerError::InvalidConfig(
                "at least one pool must be defined".into(),
            ));
        }
        for (name, pool) in &self.pools {
            pool.validate().map_err(|e| {
                SchedulerError::InvalidConfig(format!("pool `{name}` invalid: {e}"))
            })?;
        }
        Ok(())
    }

    /// Parse fleet configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, SchedulerError> {
        let cfg: Self = serde_json::from_str(input)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and validate a fleet configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading fleet config {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("parsing fleet config {}", path.display()))
    }

    /// Load `.env` if present, then read the file named by
    /// [`CONFIG_PATH_ENV`].
    pub fn from_env() -> AppResult<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("ignoring unreadable .env file: {e}");
            }
        }
        let path = std::env::var(CONFIG_PATH_ENV)
            .with_context(|| format!("{CONFIG_PATH_ENV} is not set"))?;
        Self::from_path(path)
    }
}
