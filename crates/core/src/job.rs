// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job entity and status state machine.

use crate::id::{JobId, PolicyId, TenantId};
use crate::retention::RetentionScope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a batch transcription job.
///
/// Advances monotonically: `Pending → Running → (Completed | Failed |
/// Cancelled)`. `Cancelling` may only follow `Pending` or `Running` and
/// always precedes `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelling,
    Cancelled,
}

crate::simple_display! {
    JobStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelling => "cancelling",
        Cancelled => "cancelled",
    }
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }

    /// Whether a direct transition to `to` is legal.
    pub fn can_transition(self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Pending, Running)
                | (Pending, Failed)
                | (Pending, Cancelling)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelling)
                | (Cancelling, Cancelled)
        )
    }
}

/// Aggregate statistics computed from the final transcript when a job
/// completes successfully.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultStats {
    pub audio_duration_seconds: Option<f64>,
    pub language_code: Option<String>,
    pub word_count: u64,
    pub segment_count: u64,
    pub speaker_count: Option<u32>,
    pub character_count: u64,
}

/// A batch transcription job.
///
/// The open `parameters` map is parsed into typed options by the planner;
/// the raw value is kept so unknown keys survive round trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub tenant_id: TenantId,
    pub status: JobStatus,
    /// Logical reference into the artifact store.
    pub audio_uri: String,
    pub parameters: serde_json::Value,
    pub webhook_url: Option<String>,
    /// Caller-supplied JSON echoed back in webhook payloads (≤ 16 KiB).
    pub webhook_metadata: Option<serde_json::Value>,
    pub error: Option<String>,
    pub retention_policy_id: Option<PolicyId>,
    /// Copied from the resolved policy so purges don't re-read it.
    pub retention_scope: RetentionScope,
    pub result: Option<ResultStats>,
    pub purge_after: Option<DateTime<Utc>>,
    pub purged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

crate::builder! {
    pub struct JobBuilder => Job {
        into {
            audio_uri: String = "s3://bucket/audio.wav",
        }
        set {
            id: JobId = JobId::new(),
            tenant_id: TenantId = crate::tenant::DEFAULT_TENANT_ID,
            status: JobStatus = JobStatus::Pending,
            parameters: serde_json::Value = serde_json::Value::Null,
            retention_scope: RetentionScope = RetentionScope::All,
            created_at: chrono::DateTime<chrono::Utc> = chrono::DateTime::<chrono::Utc>::MIN_UTC,
        }
        option {
            webhook_url: String = None,
            webhook_metadata: serde_json::Value = None,
            error: String = None,
            retention_policy_id: PolicyId = None,
            result: ResultStats = None,
            purge_after: chrono::DateTime<chrono::Utc> = None,
            purged_at: chrono::DateTime<chrono::Utc> = None,
            started_at: chrono::DateTime<chrono::Utc> = None,
            completed_at: chrono::DateTime<chrono::Utc> = None,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
