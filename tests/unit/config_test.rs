//! Tests for configuration validation and loading

use std::collections::BTreeMap;

use quota_scheduler::config::{FleetConfig, SchedulerConfig};
use quota_scheduler::core::{AccountConfig, AccountId};

#[test]
fn test_scheduler_config_defaults() {
    let cfg = SchedulerConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.worker_expiration_secs, 300);
    assert_eq!(cfg.max_queued_secs, 600);
    assert!(!cfg.disable_preemption);
    assert!(cfg.demote_threshold < cfg.promote_threshold);
}

#[test]
fn test_scheduler_config_invalid_expiration() {
    let invalid = SchedulerConfig {
        worker_expiration_secs: 0,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_empty_account_id() {
    let mut account_configs = BTreeMap::new();
    account_configs.insert(AccountId::from(""), AccountConfig::new(vec![1.0], 10.0));
    let invalid = SchedulerConfig {
        account_configs,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_json_round_trip() {
    let mut cfg = SchedulerConfig::default();
    cfg.account_configs.insert(
        AccountId::from("team-a"),
        AccountConfig::new(vec![1.0, 0.5], 3600.0)
            .with_max_fanout(8)
            .with_description("build farm"),
    );
    let json = serde_json::to_string(&cfg).unwrap();
    let parsed = SchedulerConfig::from_json_str(&json).unwrap();
    assert_eq!(parsed, cfg);
}

#[test]
fn test_fleet_config_validation() {
    let json = r#"{
        "pools": {
            "linux": {"account_configs": {"a1": {"charge_rate": [1.0], "max_charge_seconds": 60}}},
            "mac": {"disable_preemption": true}
        }
    }"#;
    let fleet = FleetConfig::from_json_str(json).unwrap();
    assert_eq!(fleet.pools.len(), 2);
    assert!(fleet.pools["mac"].disable_preemption);
}

#[test]
fn test_fleet_config_names_invalid_pool() {
    let json = r#"{"pools": {"broken": {"worker_expiration_secs": 0}}}"#;
    let err = FleetConfig::from_json_str(json).unwrap_err();
    assert!(err.to_string().contains("broken"));
}

#[test]
fn test_fleet_config_from_path() {
    let path = std::env::temp_dir().join(format!("quota-fleet-{}.json", std::process::id()));
    std::fs::write(&path, r#"{"pools": {"p1": {}}}"#).unwrap();
    let fleet = FleetConfig::from_path(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert!(fleet.pools.contains_key("p1"));
}

#[test]
fn test_fleet_config_missing_file() {
    let err = FleetConfig::from_path("/nonexistent/quota-fleet.json").unwrap_err();
    assert!(format!("{err:#}").contains("reading fleet config"));
}
