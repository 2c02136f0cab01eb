// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task entity and status state machine.

use crate::id::{JobId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a single task inside a job's pipeline.
///
/// `Pending → Ready` requires every dependency to be satisfied;
/// `Ready → Running` happens when a consumer claims the queued message.
/// Terminal states never regress except through an explicit retry
/// (`Failed → Ready` with `retries < max_retries`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Ready,
    Running,
    Completed,
    Failed,
    Skipped,
    Cancelled,
}

crate::simple_display! {
    TaskStatus {
        Pending => "pending",
        Ready => "ready",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Skipped => "skipped",
        Cancelled => "cancelled",
    }
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped | TaskStatus::Cancelled
        )
    }

    /// Whether a task in this state satisfies a dependent's readiness check.
    ///
    /// `Skipped` is only ever assigned to non-required tasks, so it counts
    /// as satisfied.
    pub fn satisfies_dependency(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Skipped)
    }
}

/// An atomic unit of work inside a job's pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub job_id: JobId,
    /// Stage label, e.g. `transcribe` or `transcribe_ch0`.
    pub stage: String,
    /// Queue the task is dispatched to. Channel fan-out stages share the
    /// base stream, so this equals the stage name.
    pub engine_id: String,
    pub status: TaskStatus,
    /// Tasks in the same job that must be satisfied before this one runs.
    pub dependencies: Vec<TaskId>,
    /// Stage-specific directives passed through to the engine.
    pub config: serde_json::Value,
    pub input_uri: Option<String>,
    pub output_uri: Option<String>,
    pub retries: u32,
    pub max_retries: u32,
    /// A failed required task fails the whole job; non-required failures
    /// are treated as skipped by dependents.
    pub required: bool,
    pub error: Option<String>,
    /// Processing deadline carried into the queue message.
    pub timeout_s: u64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn can_retry(&self) -> bool {
        self.retries < self.max_retries
    }
}

crate::builder! {
    pub struct TaskBuilder => Task {
        into {
            stage: String = "transcribe",
            engine_id: String = "transcribe",
        }
        set {
            id: TaskId = TaskId::new(),
            job_id: JobId = JobId::new(),
            status: TaskStatus = TaskStatus::Pending,
            dependencies: Vec<TaskId> = Vec::new(),
            config: serde_json::Value = serde_json::Value::Null,
            retries: u32 = 0,
            max_retries: u32 = 2,
            required: bool = true,
            timeout_s: u64 = 3600,
            created_at: chrono::DateTime<chrono::Utc> = chrono::DateTime::<chrono::Utc>::MIN_UTC,
        }
        option {
            input_uri: String = None,
            output_uri: String = None,
            error: String = None,
            started_at: chrono::DateTime<chrono::Utc> = None,
            completed_at: chrono::DateTime<chrono::Utc> = None,
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
