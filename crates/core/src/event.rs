// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control events carried on the event bus.
//!
//! The bus is a wake signal, not a source of truth: delivery is
//! at-least-once with no ordering guarantee, so every handler must be
//! idempotent against the state store. Serializes with
//! `{"type": "job.created", ...fields}`; unknown type tags deserialize to
//! `Unknown` and are ignored.

use crate::id::{JobId, SessionId, TaskId};
use crate::worker::WorkerId;
use serde::{Deserialize, Serialize};

/// Channel every control event is published on.
pub const EVENTS_CHANNEL: &str = "dalston:events";

/// Why a task failure was synthesized (absent for engine-reported errors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskFailureReason {
    /// The owning consumer stopped heartbeating mid-task.
    EngineDead,
    /// The message's processing deadline passed.
    Timeout,
    /// The engine aborted because the job was cancelled.
    Cancelled,
    /// No engine became available within the wait deadline.
    EngineUnavailable,
}

crate::simple_display! {
    TaskFailureReason {
        EngineDead => "engine_dead",
        Timeout => "timeout",
        Cancelled => "cancelled",
        EngineUnavailable => "engine_unavailable",
    }
}

impl TaskFailureReason {
    /// Failures worth re-dispatching. Cancellation and engine
    /// unavailability are not: retrying cannot change the outcome.
    pub fn is_retriable(self) -> bool {
        matches!(self, TaskFailureReason::EngineDead | TaskFailureReason::Timeout)
    }
}

/// Events that drive the orchestrator and the session gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "job.created")]
    JobCreated {
        job_id: JobId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    #[serde(rename = "job.cancel_requested")]
    JobCancelRequested { job_id: JobId },

    #[serde(rename = "task.completed")]
    TaskCompleted { task_id: TaskId },

    #[serde(rename = "task.failed")]
    TaskFailed {
        task_id: TaskId,
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<TaskFailureReason>,
    },

    /// A task waiting for an engine exceeded its wait deadline.
    #[serde(rename = "task.wait_timeout")]
    TaskWaitTimeout {
        task_id: TaskId,
        engine_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        queue_id: Option<String>,
        error: String,
    },

    #[serde(rename = "job.completed")]
    JobCompleted { job_id: JobId },

    #[serde(rename = "job.failed")]
    JobFailed { job_id: JobId, error: String },

    /// A realtime worker stopped heartbeating; one event per affected
    /// session so the gateway can notify clients.
    #[serde(rename = "worker.offline")]
    WorkerOffline { worker_id: WorkerId, session_id: SessionId },

    /// Forward-compatibility: event types this build doesn't know about.
    #[serde(other)]
    Unknown,
}

impl Event {
    /// Short human-readable form for log lines.
    pub fn log_summary(&self) -> String {
        match self {
            Event::JobCreated { job_id, .. } => format!("job.created {job_id}"),
            Event::JobCancelRequested { job_id } => format!("job.cancel_requested {job_id}"),
            Event::TaskCompleted { task_id } => format!("task.completed {task_id}"),
            Event::TaskFailed { task_id, reason, .. } => match reason {
                Some(r) => format!("task.failed {task_id} ({r})"),
                None => format!("task.failed {task_id}"),
            },
            Event::TaskWaitTimeout { task_id, engine_id, .. } => {
                format!("task.wait_timeout {task_id} engine={engine_id}")
            }
            Event::JobCompleted { job_id } => format!("job.completed {job_id}"),
            Event::JobFailed { job_id, .. } => format!("job.failed {job_id}"),
            Event::WorkerOffline { worker_id, session_id } => {
                format!("worker.offline {worker_id} session={session_id}")
            }
            Event::Unknown => "unknown".to_string(),
        }
    }

    /// Job the event correlates to, when derivable without a lookup.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Event::JobCreated { job_id, .. }
            | Event::JobCancelRequested { job_id }
            | Event::JobCompleted { job_id }
            | Event::JobFailed { job_id, .. } => Some(*job_id),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
