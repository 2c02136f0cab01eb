// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact store key scheme.
//!
//! Every blob the control plane reads or writes lives at a deterministic
//! key derived from its owner, so retention can purge by prefix without a
//! listing of what was written.

use crate::id::{JobId, SessionId, TaskId};

/// `jobs/{job}/`
pub fn job_prefix(job_id: JobId) -> String {
    format!("jobs/{job_id}/")
}

/// `jobs/{job}/audio/`
pub fn job_audio_prefix(job_id: JobId) -> String {
    format!("jobs/{job_id}/audio/")
}

/// `jobs/{job}/audio/original.{ext}`
pub fn job_audio_key(job_id: JobId, ext: &str) -> String {
    format!("jobs/{job_id}/audio/original.{ext}")
}

/// `jobs/{job}/tasks/`
pub fn job_tasks_prefix(job_id: JobId) -> String {
    format!("jobs/{job_id}/tasks/")
}

/// `jobs/{job}/tasks/{task}/input.json`
pub fn task_input_key(job_id: JobId, task_id: TaskId) -> String {
    format!("jobs/{job_id}/tasks/{task_id}/input.json")
}

/// `jobs/{job}/tasks/{task}/output.json`
pub fn task_output_key(job_id: JobId, task_id: TaskId) -> String {
    format!("jobs/{job_id}/tasks/{task_id}/output.json")
}

/// `jobs/{job}/transcript.json`
pub fn transcript_key(job_id: JobId) -> String {
    format!("jobs/{job_id}/transcript.json")
}

/// `sessions/{session}/`
pub fn session_prefix(session_id: &SessionId) -> String {
    format!("sessions/{session_id}/")
}

/// `sessions/{session}/audio.wav`
pub fn session_audio_key(session_id: &SessionId) -> String {
    format!("sessions/{session_id}/audio.wav")
}

/// `sessions/{session}/transcript.json`
pub fn session_transcript_key(session_id: &SessionId) -> String {
    format!("sessions/{session_id}/transcript.json")
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
