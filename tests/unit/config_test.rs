//! Tests for configuration validation

use tribunal::config::{BatchConfig, CoreConfig, CourtConfig, PurgeConfig, QueueConfig};
use tribunal::core::batch::LABEL_MEMBER_FETCH;

#[test]
fn test_default_config_is_valid() {
    let config = CoreConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.queue.max_in_flight, 3);
    assert_eq!(config.court.required_supports, 20);
    assert_eq!(config.purge.bulk_delete_horizon_ms, 14 * 24 * 60 * 60 * 1_000);
}

#[test]
fn test_queue_config_invalid_in_flight() {
    let invalid = QueueConfig {
        max_in_flight: 0,
        ..QueueConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_queue_config_backoff_bounds() {
    let invalid = QueueConfig {
        rate_limit_backoff_ms: 5_000,
        max_backoff_ms: 1_000,
        ..QueueConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_batch_config_label_lookup() {
    let config = BatchConfig::default();
    assert_eq!(config.concurrency_for("message_delete"), 1);
    assert_eq!(config.concurrency_for(LABEL_MEMBER_FETCH), 5);
    assert_eq!(config.concurrency_for("something_else"), config.default_concurrency);

    let mut invalid = BatchConfig::default();
    invalid.labels.insert("thread_check".into(), 0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_purge_config_page_size_limit() {
    let invalid = PurgeConfig {
        fetch_page_size: 101,
        ..PurgeConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_court_config_zero_threshold() {
    let invalid = CourtConfig {
        required_supports: 0,
        ..CourtConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_config_from_json_fills_defaults() {
    let json = r#"{
        "queue": { "max_in_flight": 5 },
        "batch": { "labels": { "message_scan": 20 } },
        "court": { "required_supports": 8, "ops_channel_id": "123" }
    }"#;

    let config = CoreConfig::from_json_str(json).unwrap();
    assert_eq!(config.queue.max_in_flight, 5);
    assert_eq!(config.queue.max_queue_depth, QueueConfig::default().max_queue_depth);
    assert_eq!(config.batch.concurrency_for("message_scan"), 20);
    assert_eq!(config.court.required_supports, 8);
    assert_eq!(config.court.ops_channel_id.as_deref(), Some("123"));
}

#[test]
fn test_config_from_json_rejects_invalid() {
    let err = CoreConfig::from_json_str(r#"{ "queue": { "max_in_flight": 0 } }"#).unwrap_err();
    assert!(err.starts_with("queue invalid"));
    assert!(CoreConfig::from_json_str("not json").unwrap_err().starts_with("parse error"));
}

#[test]
fn test_config_from_path() {
    let dir = std::env::temp_dir().join(format!("tribunal-config-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("tribunal.json");
    std::fs::write(&path, r#"{ "purge": { "chunk_size": 25 } }"#).unwrap();

    let config = CoreConfig::from_path(&path).unwrap();
    assert_eq!(config.purge.chunk_size, 25);
    assert!(CoreConfig::from_path(dir.join("missing.json")).is_err());

    let _ = std::fs::remove_dir_all(&dir);
}
