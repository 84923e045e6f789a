//! Integration tests for balance replenishment.
//!
//! These cover:
//! - Paying for running tasks before recharging
//! - Saturation at the per-tier ceiling
//! - Overdraft of tiers that earn nothing
//! - Randomized properties of the replenishment rule

use quota_scheduler::core::{
    best_priority_for, next_balance, AccountConfig, Balance, FREE_BUCKET, NUM_PRIORITIES,
};
use rand::Rng;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn assert_close(got: &Balance, want: &[f64]) {
    let want = Balance::from_slice(want);
    for p in 0..NUM_PRIORITIES {
        assert!(
            (got[p] - want[p]).abs() < 1e-9,
            "tier {p}: got {}, want {}",
            got[p],
            want[p]
        );
    }
}

// ============================================================================
// FIXED SCENARIOS
// ============================================================================

#[test]
fn test_one_job_per_tier_from_zero() {
    let config = AccountConfig::new(vec![1.0, 2.0, 3.0], 10.0);
    let got = next_balance(&Balance::zero(), &config, 2.0, &[1, 1, 1]);
    assert_close(&got, &[0.0, 2.0, 4.0, 0.0]);
}

#[test]
fn test_held_capped_and_overdrawn() {
    let config = AccountConfig::new(vec![1.0, 1.0, 1.0], 10.0);
    let before = Balance::from_slice(&[9.5, 12.0, 10.5, 0.0]);
    let got = next_balance(&before, &config, 1.0, &[0, 1, 1, 1]);
    assert_close(&got, &[10.0, 11.0, 10.0, -1.0]);
}

#[test]
fn test_zero_elapsed_keeps_balance_below_ceiling() {
    let config = AccountConfig::new(vec![1.0, 1.0], 10.0);
    let before = Balance::from_slice(&[3.0, -2.0]);
    let got = next_balance(&before, &config, 0.0, &[4, 4]);
    assert_close(&got, &[3.0, -2.0]);
}

#[test]
fn test_short_inputs_are_padded() {
    let config = AccountConfig::new(vec![2.0], 5.0);
    let got = next_balance(&Balance::zero(), &config, 1.0, &[]);
    assert_close(&got, &[2.0]);
    assert_eq!(best_priority_for(&got), 0);
}

#[test]
fn test_zero_rate_tiers_only_drain() {
    let config = AccountConfig::new(vec![], 100.0);
    let before = Balance::from_slice(&[0.0, 100.0]);
    let got = next_balance(&before, &config, 10.0, &[0, 1]);
    assert_close(&got, &[0.0, 90.0]);
    assert_eq!(best_priority_for(&got), 1);
}

#[test]
fn test_exhausted_account_runs_free() {
    let config = AccountConfig::new(vec![1.0], 100.0);
    let got = next_balance(&Balance::from_slice(&[1.0]), &config, 10.0, &[2]);
    assert!(got[0] < 0.0);
    assert_eq!(best_priority_for(&got), FREE_BUCKET);
}

#[test]
#[should_panic(expected = "at most")]
fn test_oversized_balance_is_a_caller_bug() {
    let _ = Balance::from_slice(&[1.0; NUM_PRIORITIES + 2]);
}

// ============================================================================
// RANDOMIZED PROPERTIES
// ============================================================================

#[test]
fn test_idle_account_never_loses_balance_and_stays_capped() {
    let mut rng = rand::rng();
    for _ in 0..500 {
        let rates: Vec<f64> = (0..NUM_PRIORITIES).map(|_| rng.random_range(0.0..5.0)).collect();
        let max_charge = rng.random_range(1.0..1_000.0);
        let config = AccountConfig::new(rates, max_charge);

        let mut before = Balance::zero();
        for p in 0..NUM_PRIORITIES {
            before[p] = rng.random_range(-50.0..config.ceiling(p) + 1.0);
        }
        let elapsed = rng.random_range(0.0..120.0);
        let after = next_balance(&before, &config, elapsed, &[]);

        for p in 0..NUM_PRIORITIES {
            assert!(after[p] >= before[p].min(config.ceiling(p)) - 1e-9);
            if before[p] <= config.ceiling(p) {
                assert!(after[p] <= config.ceiling(p) + 1e-9);
            } else {
                assert!((after[p] - before[p]).abs() < 1e-9);
            }
        }
    }
}

#[test]
fn test_mismatched_lengths_are_tolerated() {
    let mut rng = rand::rng();
    for _ in 0..200 {
        let rate_len = rng.random_range(0..=NUM_PRIORITIES + 3);
        let run_len = rng.random_range(0..=NUM_PRIORITIES + 3);
        let rates: Vec<f64> = (0..rate_len).map(|_| rng.random_range(0.0..2.0)).collect();
        let running: Vec<usize> = (0..run_len).map(|_| rng.random_range(0..4)).collect();
        let config = AccountConfig::new(rates, 60.0);

        let after = next_balance(&Balance::zero(), &config, 1.0, &running);
        assert!(after.as_array().iter().all(|v| v.is_finite()));
    }
}

#[test]
fn test_more_jobs_never_leave_more_balance() {
    let mut rng = rand::rng();
    for _ in 0..200 {
        let config = AccountConfig::new(vec![rng.random_range(0.0..3.0)], 100.0);
        let before = Balance::from_slice(&[rng.random_range(-20.0..20.0)]);
        let elapsed = rng.random_range(0.0..30.0);
        let jobs = rng.random_range(0..5);

        let fewer = next_balance(&before, &config, elapsed, &[jobs]);
        let more = next_balance(&before, &config, elapsed, &[jobs + 1]);
        assert!(more[0] <= fewer[0] + 1e-9);
    }
}
