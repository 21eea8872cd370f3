//! Tests for the service builder

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tribunal::builders::Services;
use tribunal::config::CoreConfig;
use tribunal::core::{Confirmation, DispatchError, Persistence, Platform};
use tribunal::infra::InMemoryStore;

use crate::common::{test_config, MockPlatform, TestSpawner};

fn build(config: CoreConfig) -> Result<Services<TestSpawner>, DispatchError> {
    Services::build(
        config,
        MockPlatform::new() as Arc<dyn Platform>,
        Arc::new(InMemoryStore::new()) as Arc<dyn Persistence>,
        TestSpawner,
    )
}

#[test]
fn test_build_rejects_invalid_config() {
    let mut config = test_config();
    config.purge.chunk_size = 0;
    match build(config) {
        Err(DispatchError::InvalidConfig(msg)) => {
            assert!(msg.starts_with("config invalid: purge invalid"));
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("invalid config accepted"),
    }
}

#[tokio::test]
async fn test_built_services_share_one_queue() {
    let services = build(test_config()).unwrap();
    assert_eq!(services.court.required_supports(), 3);

    let report = services.start(0).await.unwrap();
    assert_eq!(report.resolved + report.scheduled, 0);

    let status = services.status();
    assert!(status.contains("Queue: 0 pending, 0 in flight"));

    services.shutdown();
    assert!(services.purger.collect_before("general", "1").await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_uses_configured_window() {
    let mut config = test_config();
    config.court.confirmation_timeout_ms = 2_000;
    let services = build(config).unwrap();
    assert_eq!(services.confirmation_timeout(), Duration::from_secs(2));

    let (tx, rx) = oneshot::channel();
    tx.send(true).unwrap();
    assert_eq!(services.confirm(rx).await, Confirmation::Confirmed);

    let (_tx, rx) = oneshot::channel::<bool>();
    let opened = Instant::now();
    assert_eq!(services.confirm(rx).await, Confirmation::Expired);
    let waited = opened.elapsed();
    assert!(waited >= Duration::from_secs(2));
    assert!(waited < Duration::from_secs(3));
}
