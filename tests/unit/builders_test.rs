//! Tests for builder modules and the pool registry

use std::collections::BTreeSet;

use quota_scheduler::builders::{build_registry, build_scheduler};
use quota_scheduler::config::{FleetConfig, SchedulerConfig};
use quota_scheduler::core::{
    AccountConfig, AccountId, Balance, NullEventSink, SchedulerError, TaskRequest, WorkerId,
};
use quota_scheduler::util::Timestamp;

fn fleet() -> FleetConfig {
    FleetConfig::from_json_str(
        r#"{
            "pools": {
                "linux": {
                    "account_configs": {"a1": {"charge_rate": [1.0], "max_charge_seconds": 60}}
                },
                "mac": {}
            }
        }"#,
    )
    .unwrap()
}

#[test]
fn test_build_scheduler_seeds_configured_accounts() {
    let mut cfg = SchedulerConfig::default();
    cfg.account_configs
        .insert(AccountId::from("a1"), AccountConfig::new(vec![1.0], 60.0));
    let s = build_scheduler(&cfg, Timestamp::from_secs(5)).unwrap();
    assert_eq!(s.last_update_time(), Timestamp::from_secs(5));
    assert_eq!(s.balances()[&AccountId::from("a1")], Balance::zero());
}

#[test]
fn test_build_scheduler_rejects_invalid_config() {
    let cfg = SchedulerConfig {
        demote_threshold: 10.0,
        promote_threshold: 0.0,
        ..SchedulerConfig::default()
    };
    let err = build_scheduler(&cfg, Timestamp::EPOCH).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidConfig(_)));
}

#[test]
fn test_build_registry_one_pool_each() {
    let registry = build_registry(&fleet(), Timestamp::EPOCH).unwrap();
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.pool_ids(), vec!["linux".to_string(), "mac".to_string()]);
}

#[test]
fn test_build_registry_rejects_empty_fleet() {
    assert!(build_registry(&FleetConfig::default(), Timestamp::EPOCH).is_err());
}

#[test]
fn test_registry_runs_a_pass_per_pool() {
    let registry = build_registry(&fleet(), Timestamp::EPOCH).unwrap();
    let t = Timestamp::from_secs(10);

    let assignments = registry
        .with_pool("linux", |s| {
            let mut events = NullEventSink;
            s.update_time(t, &mut events);
            s.add_request(TaskRequest::new("r1", "a1", t), t, &mut events);
            s.mark_idle(&WorkerId::from("w1"), BTreeSet::new(), t, &mut events);
            s.run_once(&mut events)
        })
        .unwrap();
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].priority, 0);

    let snapshots = registry.snapshots();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].pool_id, "linux");
    assert_eq!(snapshots[0].running_count(), 1);
    assert_eq!(snapshots[1].running_count(), 0);
}

#[test]
fn test_registry_unknown_pool() {
    let registry = build_registry(&fleet(), Timestamp::EPOCH).unwrap();
    let err = registry.with_pool("windows", |_| ()).unwrap_err();
    assert!(matches!(err, SchedulerError::UnknownPool(_)));
}

#[test]
fn test_registry_is_shareable_across_threads() {
    let registry = std::sync::Arc::new(build_registry(&fleet(), Timestamp::EPOCH).unwrap());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let registry = std::sync::Arc::clone(&registry);
            std::thread::spawn(move || {
                registry
                    .with_pool("mac", |s| {
                        let t = s.last_update_time();
                        s.add_request(
                            TaskRequest::new(format!("r{i}"), "a1", t),
                            t,
                            &mut NullEventSink,
                        );
                    })
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(registry.snapshot("mac").unwrap().queued_requests.len(), 4);
}
