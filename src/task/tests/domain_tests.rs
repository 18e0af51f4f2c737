//! Domain tests for task identifiers, statuses and mutations.

use crate::task::domain::{
    DEFAULT_PRIORITY, ParseTaskStatusError, Task, TaskDomainError, TaskId, TaskStatus, TaskType,
};
use mockable::DefaultClock;
use rstest::rstest;

fn task_id(value: &str) -> TaskId {
    TaskId::new(value).expect("valid task id")
}

#[rstest]
#[case("")]
#[case("   ")]
fn blank_task_id_is_rejected(#[case] raw: &str) {
    assert_eq!(TaskId::new(raw), Err(TaskDomainError::EmptyTaskId));
}

#[test]
fn task_id_is_trimmed() {
    assert_eq!(task_id("  T1 ").as_str(), "T1");
}

#[test]
fn blank_title_is_rejected() {
    let result = Task::new(task_id("T1"), "  ", &DefaultClock);
    assert_eq!(result, Err(TaskDomainError::EmptyTitle));
}

#[test]
fn new_task_is_open_with_defaults() {
    let task = Task::new(task_id("T1"), "Write parser", &DefaultClock).expect("valid task");

    assert_eq!(task.status(), TaskStatus::Open);
    assert_eq!(task.task_type(), TaskType::Task);
    assert_eq!(task.priority(), DEFAULT_PRIORITY);
    assert!(task.parent_task_id().is_none());
    assert!(task.blockers().is_empty());
}

#[rstest]
#[case("open", TaskStatus::Open)]
#[case("IN_PROGRESS", TaskStatus::InProgress)]
#[case(" review ", TaskStatus::Review)]
#[case("closed", TaskStatus::Closed)]
#[case("escalated", TaskStatus::Escalated)]
fn status_parses_from_storage(#[case] raw: &str, #[case] expected: TaskStatus) {
    assert_eq!(TaskStatus::try_from(raw), Ok(expected));
}

#[test]
fn unknown_status_is_rejected() {
    assert_eq!(
        TaskStatus::try_from("blocked"),
        Err(ParseTaskStatusError("blocked".to_owned()))
    );
}

#[test]
fn only_epics_are_containers() {
    assert!(TaskType::Epic.is_container());
    assert!(!TaskType::Task.is_container());
    assert!(!TaskType::Bug.is_container());
}

#[test]
fn close_records_reason_and_commit() {
    let mut task = Task::new(task_id("T1"), "Write parser", &DefaultClock).expect("valid task");
    task.start();
    task.close(
        Some("completed".to_owned()),
        Some("abc123".to_owned()),
        &DefaultClock,
    );

    assert_eq!(task.status(), TaskStatus::Closed);
    assert!(task.closed_at().is_some());
    assert_eq!(task.closed_reason(), Some("completed"));
    assert_eq!(task.closed_commit_sha(), Some("abc123"));
}

#[test]
fn reopen_clears_close_metadata() {
    let mut task = Task::new(task_id("T1"), "Write parser", &DefaultClock).expect("valid task");
    task.close(None, Some("abc123".to_owned()), &DefaultClock);
    task.reopen();

    assert_eq!(task.status(), TaskStatus::Open);
    assert!(task.closed_at().is_none());
    assert!(task.closed_commit_sha().is_none());
}
