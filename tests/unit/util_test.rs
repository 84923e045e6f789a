//! Tests for utility functions

use quota_scheduler::util::{init_tracing_with, Timestamp};

#[test]
fn test_timestamp_ordering() {
    assert!(Timestamp::from_secs(2) > Timestamp::from_millis(1_999));
    assert_eq!(Timestamp::from_secs(3).as_millis(), 3_000);
    assert_eq!(Timestamp::EPOCH, Timestamp::default());
}

#[test]
fn test_timestamp_arithmetic() {
    let t = Timestamp::from_secs(10);
    assert_eq!(t.plus_secs(5), Timestamp::from_secs(15));
    assert_eq!(t.plus_millis(250).as_millis(), 10_250);
    assert!((t.plus_millis(1_500).seconds_since(t) - 1.5).abs() < 1e-9);
    assert!(t.seconds_since(t.plus_secs(1)).abs() < f64::EPSILON);
}

#[test]
fn test_timestamp_display() {
    assert_eq!(Timestamp::from_millis(42).to_string(), "42ms");
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing_with("quota_scheduler=debug");
    init_tracing_with("quota_scheduler=debug");
}
