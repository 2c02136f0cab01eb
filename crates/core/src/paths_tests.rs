// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn task_keys_nest_under_the_job_prefix() {
    let job = JobId::from_u128(1);
    let task = TaskId::from_u128(2);
    let input = task_input_key(job, task);
    let output = task_output_key(job, task);

    assert!(input.starts_with(&job_prefix(job)));
    assert!(input.starts_with(&job_tasks_prefix(job)));
    assert!(input.ends_with("/input.json"));
    assert!(output.ends_with("/output.json"));
    assert!(input.contains(&task.to_string()));
}

#[test]
fn audio_only_scope_prefixes_exclude_the_transcript() {
    let job = JobId::from_u128(3);
    let transcript = transcript_key(job);
    assert!(!transcript.starts_with(&job_audio_prefix(job)));
    assert!(!transcript.starts_with(&job_tasks_prefix(job)));
    assert!(transcript.starts_with(&job_prefix(job)));
}

#[test]
fn session_keys_nest_under_the_session_prefix() {
    let session = SessionId::from_string("sess_0123456789abcdef");
    assert!(session_audio_key(&session).starts_with(&session_prefix(&session)));
    assert!(session_transcript_key(&session).starts_with(&session_prefix(&session)));
}
