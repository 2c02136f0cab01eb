// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    pending_running = { JobStatus::Pending, JobStatus::Running, true },
    pending_cancelling = { JobStatus::Pending, JobStatus::Cancelling, true },
    pending_failed = { JobStatus::Pending, JobStatus::Failed, true },
    running_completed = { JobStatus::Running, JobStatus::Completed, true },
    running_failed = { JobStatus::Running, JobStatus::Failed, true },
    running_cancelling = { JobStatus::Running, JobStatus::Cancelling, true },
    cancelling_cancelled = { JobStatus::Cancelling, JobStatus::Cancelled, true },
    pending_completed = { JobStatus::Pending, JobStatus::Completed, false },
    completed_running = { JobStatus::Completed, JobStatus::Running, false },
    cancelled_cancelling = { JobStatus::Cancelled, JobStatus::Cancelling, false },
    cancelling_completed = { JobStatus::Cancelling, JobStatus::Completed, false },
    failed_running = { JobStatus::Failed, JobStatus::Running, false },
)]
fn status_transitions(from: JobStatus, to: JobStatus, allowed: bool) {
    assert_eq!(from.can_transition(to), allowed);
}

#[test]
fn terminal_statuses() {
    assert!(JobStatus::Completed.is_terminal());
    assert!(JobStatus::Failed.is_terminal());
    assert!(JobStatus::Cancelled.is_terminal());
    assert!(!JobStatus::Pending.is_terminal());
    assert!(!JobStatus::Running.is_terminal());
    assert!(!JobStatus::Cancelling.is_terminal());
}

#[test]
fn status_serializes_snake_case() {
    assert_eq!(serde_json::to_string(&JobStatus::Cancelling).unwrap(), "\"cancelling\"");
}

#[test]
fn builder_produces_pending_job() {
    let job = Job::builder().audio_uri("s3://b/a.wav").build();
    assert_eq!(job.status, JobStatus::Pending);
    assert!(job.error.is_none());
    assert!(!job.is_terminal());
}
