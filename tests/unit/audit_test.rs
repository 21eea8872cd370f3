//! Tests for audit sink

use tribunal::core::{build_audit_event, AuditAction, AuditSink, InMemoryAuditSink};

#[test]
fn test_in_memory_audit_sink() {
    let sink = InMemoryAuditSink::new(10);

    let event = build_audit_event(7, AuditAction::SupportAdded, Some("user1"), Some("detail".to_string()));

    sink.record(event.clone());
    assert_eq!(sink.events().len(), 1);

    let events = sink.events();
    assert_eq!(events[0], event);
    assert_eq!(events[0].actor.as_deref(), Some("user1"));
    assert_eq!(events[0].action, AuditAction::SupportAdded);
}

#[test]
fn test_audit_sink_overflow() {
    let sink = InMemoryAuditSink::new(2);

    sink.record(build_audit_event(1, AuditAction::Submitted, Some("a"), None));
    sink.record(build_audit_event(2, AuditAction::Submitted, Some("b"), None));
    sink.record(build_audit_event(3, AuditAction::Submitted, Some("c"), None));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].process_id, 2); // First one popped
    assert_eq!(events[1].process_id, 3);
}

#[test]
fn test_events_for_filters_by_process() {
    let sink = InMemoryAuditSink::new(10);
    sink.record(build_audit_event(1, AuditAction::Submitted, Some("a"), None));
    sink.record(build_audit_event(2, AuditAction::Submitted, Some("b"), None));
    sink.record(build_audit_event(1, AuditAction::Resolved, None, Some("vote passed".into())));

    let actions: Vec<_> = sink.events_for(1).into_iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![AuditAction::Submitted, AuditAction::Resolved]);
}

#[test]
fn test_build_audit_event() {
    let event = build_audit_event(42, AuditAction::EffectFailed, None, Some("missing permissions".to_string()));

    assert_eq!(event.process_id, 42);
    assert_eq!(event.action.to_string(), "effect_failed");
    assert_eq!(event.actor, None);
    assert_eq!(event.detail, Some("missing permissions".to_string()));
    assert_eq!(event.event_id.len(), 36);
    assert!(event.created_at_ms > 0);
}
