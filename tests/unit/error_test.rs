//! Tests for error types

use quota_scheduler::core::{RequestId, SchedulerError, WorkerId};

#[test]
fn test_error_display() {
    let err = SchedulerError::NotAssigned {
        request: RequestId::from("r1"),
        worker: WorkerId::from("w1"),
    };
    assert_eq!(err.to_string(), "request r1 is not assigned to worker w1");

    let err = SchedulerError::UnknownPool("mac".into());
    assert_eq!(err.to_string(), "unknown pool: mac");

    let err = SchedulerError::InvalidConfig("bad".into());
    assert_eq!(err.to_string(), "invalid configuration: bad");

    let err = SchedulerError::InconsistentState("r1 twice".into());
    assert_eq!(err.to_string(), "inconsistent scheduler state: r1 twice");
}

#[test]
fn test_serialization_error_conversion() {
    let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
    let err: SchedulerError = json_err.into();
    assert!(matches!(err, SchedulerError::Serialization(_)));
}
