//! Tests for error types

use tribunal::core::DispatchError;

#[test]
fn test_queue_full_error() {
    let err = DispatchError::QueueFull("depth 10000 reached".to_string());
    assert_eq!(format!("{}", err), "queue full: depth 10000 reached");
    assert_eq!(err.kind(), "queue_full");
}

#[test]
fn test_rate_limited_error() {
    let err = DispatchError::RateLimited { retry_after_ms: None };
    assert_eq!(format!("{}", err), "rate limited");
    assert!(err.is_rate_limited());
    assert_eq!(err.retry_after(), None);
}

#[test]
fn test_persistence_error() {
    let err = DispatchError::Persistence("disk full".to_string());
    assert_eq!(format!("{}", err), "persistence error: disk full");
    assert!(!err.is_skip());
}

#[test]
fn test_user_messages_hide_internals() {
    let err = DispatchError::External("HTTP 500 from gateway".into());
    assert!(!err.user_message().contains("500"));
    assert_eq!(
        DispatchError::ExternalUnavailable("that member".into()).user_message(),
        "Could not find that member."
    );
    assert_eq!(
        DispatchError::QueueFull("x".into()).user_message(),
        DispatchError::RateLimited { retry_after_ms: Some(5) }.user_message()
    );
}
