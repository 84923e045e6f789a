//! Tests for event sinks

use quota_scheduler::core::{
    build_event, AccountId, EventKind, EventSink, InMemoryEventSink, RequestId, TaskEvent,
    WorkerId,
};
use quota_scheduler::util::Timestamp;

fn enqueued(id: &str, secs: u64) -> TaskEvent {
    build_event(EventKind::Enqueued, Timestamp::from_secs(secs))
        .with_request(&RequestId::from(id), &AccountId::from("a1"))
}

#[test]
fn test_in_memory_event_sink() {
    let mut sink = InMemoryEventSink::new(10);
    assert!(sink.is_empty());

    sink.record(enqueued("r1", 1));
    assert_eq!(sink.len(), 1);

    let events = sink.events();
    assert_eq!(events[0].event_id, "r1-enqueued-1000");
    assert_eq!(events[0].request_id, Some(RequestId::from("r1")));
    assert_eq!(events[0].kind, EventKind::Enqueued);
}

#[test]
fn test_event_sink_overflow() {
    let mut sink = InMemoryEventSink::new(2);

    sink.record(enqueued("r1", 1));
    sink.record(enqueued("r2", 2));
    sink.record(enqueued("r3", 3));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].request_id, Some(RequestId::from("r2"))); // First one popped
    assert_eq!(events[1].request_id, Some(RequestId::from("r3")));
}

#[test]
fn test_zero_capacity_sink_stores_nothing() {
    let mut sink = InMemoryEventSink::new(0);
    sink.record(enqueued("r1", 1));
    assert!(sink.is_empty());
}

#[test]
fn test_worker_only_event_id() {
    let event = build_event(EventKind::WorkerExpired, Timestamp::from_millis(42))
        .with_worker(&WorkerId::from("w9"));
    assert_eq!(event.event_id, "w9-worker_expired-42");
    assert!(event.request_id.is_none());
}

#[test]
fn test_filter_by_kind() {
    let mut sink = InMemoryEventSink::new(8);
    sink.record(enqueued("r1", 1));
    sink.record(
        build_event(EventKind::Assigned, Timestamp::from_secs(2))
            .with_request(&RequestId::from("r1"), &AccountId::from("a1"))
            .with_worker(&WorkerId::from("w1"))
            .with_priority(0),
    );
    let assigned = sink.of_kind(EventKind::Assigned);
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].priority, Some(0));
    assert_eq!(assigned[0].event_id, "r1-assigned-2000");
}

#[test]
fn test_vec_is_a_sink() {
    let mut sink: Vec<TaskEvent> = Vec::new();
    sink.record(enqueued("r1", 1));
    assert_eq!(sink.len(), 1);
}

#[test]
fn test_event_serializes_kind_in_snake_case() {
    let event = build_event(EventKind::WorkerExpired, Timestamp::from_secs(1));
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["kind"], "worker_expired");
    assert_eq!(json["time"], 1000);
}
