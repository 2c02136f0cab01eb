// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn terminal_statuses() {
    for status in [
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Skipped,
        TaskStatus::Cancelled,
    ] {
        assert!(status.is_terminal(), "{status} should be terminal");
    }
    for status in [TaskStatus::Pending, TaskStatus::Ready, TaskStatus::Running] {
        assert!(!status.is_terminal(), "{status} should not be terminal");
    }
}

#[test]
fn dependency_satisfaction() {
    assert!(TaskStatus::Completed.satisfies_dependency());
    assert!(TaskStatus::Skipped.satisfies_dependency());
    assert!(!TaskStatus::Failed.satisfies_dependency());
    assert!(!TaskStatus::Running.satisfies_dependency());
    assert!(!TaskStatus::Cancelled.satisfies_dependency());
}

#[test]
fn retry_budget() {
    let mut task = Task::builder().build();
    assert!(task.can_retry());
    task.retries = 2;
    assert!(!task.can_retry());
}

#[test]
fn status_serializes_snake_case() {
    assert_eq!(serde_json::to_string(&TaskStatus::Ready).unwrap(), "\"ready\"");
}
