//! Tests for utility functions

use std::time::Duration;

use tribunal::util::{format_duration, parse_duration, until, Priority, TaskId};

#[test]
fn test_priority_ordering() {
    assert!(Priority::Administrative > Priority::Moderator);
    assert!(Priority::Moderator > Priority::EndUser);
    assert!(Priority::EndUser > Priority::Background);
    assert!(Priority::Background > Priority::Unclassified);
}

#[test]
fn test_priority_display_is_level() {
    assert_eq!(Priority::Moderator.to_string(), "4");
    assert_eq!(Priority::for_command("help"), Priority::Unclassified);
    assert_eq!(Priority::for_interaction("appeal_12"), Some(Priority::Moderator));
    assert_eq!(Priority::for_interaction("page_2"), None);
}

#[test]
fn test_duration_formatting() {
    assert_eq!(format_duration(None), "Permanent");
    assert_eq!(format_duration(Some(0)), "0m");
    let ms = parse_duration("3d5h").unwrap();
    assert_eq!(format_duration(Some(ms)), "3d 5h");
    assert_eq!(parse_duration("5x"), None);
    assert_eq!(parse_duration("0m"), None);
}

#[test]
fn test_until_saturates() {
    assert_eq!(until(1_000, 4_000), Duration::ZERO);
    assert_eq!(until(4_000, 1_000), Duration::from_millis(3_000));
}

#[test]
fn test_task_id() {
    let id: TaskId = 12345;
    assert_eq!(id, 12345);
}

#[test]
fn test_init_tracing_is_idempotent() {
    tribunal::util::init_tracing();
    tribunal::util::init_tracing();
    tracing::info!("tracing initialised twice without panicking");
}
