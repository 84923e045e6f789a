//! Account quota policy and the balance replenishment rule.

use serde::{Deserialize, Serialize};

use super::types::{Balance, Priority, FREE_BUCKET, NUM_PRIORITIES};

/// Quota policy for one account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Replenishment rate per tier, in execution-seconds per second.
    /// Tiers past the end of the vector earn nothing.
    pub charge_rate: Vec<f64>,
    /// Multiplied by a tier's charge rate to get that tier's ceiling.
    pub max_charge_seconds: f64,
    /// Cap on concurrently running tasks; 0 means unlimited.
    pub max_fanout: u32,
    /// Never match this account's requests at [`FREE_BUCKET`].
    pub disable_free_tasks: bool,
    /// Opaque label.
    pub description: String,
}

impl AccountConfig {
    /// Config with the given rates and ceiling multiplier.
    #[must_use]
    pub fn new(charge_rate: Vec<f64>, max_charge_seconds: f64) -> Self {
        Self {
            charge_rate,
            max_charge_seconds,
            ..Self::default()
        }
    }

    /// Set the fanout cap.
    #[must_use]
    pub const fn with_max_fanout(mut self, max_fanout: u32) -> Self {
        self.max_fanout = max_fanout;
        self
    }

    /// Set whether free-tier matching is disabled.
    #[must_use]
    pub const fn with_disable_free_tasks(mut self, disable: bool) -> Self {
        self.disable_free_tasks = disable;
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Charge rate at `priority`; zero when unset.
    #[must_use]
    pub fn rate(&self, priority: Priority) -> f64 {
        self.charge_rate.get(priority).copied().unwrap_or(0.0)
    }

    /// Saturation ceiling at `priority`.
    #[must_use]
    pub fn ceiling(&self, priority: Priority) -> f64 {
        self.rate(priority) * self.max_charge_seconds
    }

    /// Whether the account has a running-task cap.
    #[must_use]
    pub const fn has_fanout_limit(&self) -> bool {
        self.max_fanout > 0
    }
}

/// Advance `before` by `elapsed_secs`, given per-tier running task counts.
///
/// Running tasks are paid for first. A tier already at or above its ceiling
/// after paying keeps its value; otherwise it recharges and is capped at the
/// ceiling. Missing entries in `running` or in the charge rates count as 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn next_balance(
    before: &Balance,
    config: &AccountConfig,
    elapsed_secs: f64,
    running: &[usize],
) -> Balance {
    let mut next = *before;
    for priority in 0..NUM_PRIORITIES {
        let rate = config.rate(priority);
        let ceiling = config.ceiling(priority);
        let jobs = running.get(priority).copied().unwrap_or(0) as f64;
        let spent = before[priority] - jobs * elapsed_secs;
        next[priority] = if spent >= ceiling {
            spent
        } else {
            ceiling.min(spent + rate * elapsed_secs)
        };
    }
    next
}

/// Most expensive tier with a positive balance, or [`FREE_BUCKET`].
#[must_use]
pub fn best_priority_for(balance: &Balance) -> Priority {
    (0..NUM_PRIORITIES)
        .find(|&p| balance[p] > 0.0)
        .unwrap_or(FREE_BUCKET)
}

/// First tier strictly cheaper than `priority` with a positive balance, or
/// [`FREE_BUCKET`].
#[must_use]
pub fn next_affordable_below(balance: &Balance, priority: Priority) -> Priority {
    (priority + 1..NUM_PRIORITIES)
        .find(|&p| balance[p] > 0.0)
        .unwrap_or(FREE_BUCKET)
}
