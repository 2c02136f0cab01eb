// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime session entity.

use crate::id::{JobId, PolicyId, SessionId, TenantId};
use crate::worker::WorkerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a streaming transcription session.
///
/// Created on accept, updated while streaming, finalized on disconnect.
/// Sessions never own tasks; batch post-processing goes through an
/// enhancement job instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    /// Connection dropped without a clean close.
    Interrupted,
    Error,
}

crate::simple_display! {
    SessionStatus {
        Active => "active",
        Completed => "completed",
        Interrupted => "interrupted",
        Error => "error",
    }
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::Active)
    }
}

/// Persistent record of a realtime session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeSession {
    pub id: SessionId,
    pub tenant_id: TenantId,
    pub status: SessionStatus,
    pub language: Option<String>,
    pub model: Option<String>,
    pub engine: Option<String>,
    pub encoding: Option<String>,
    pub sample_rate: Option<u32>,
    pub worker_id: Option<WorkerId>,
    pub client_ip: Option<String>,
    /// Link for resumed sessions; no state is rehydrated from it.
    pub previous_session_id: Option<SessionId>,
    pub audio_duration_seconds: f64,
    pub segment_count: u64,
    pub word_count: u64,
    pub audio_uri: Option<String>,
    pub transcript_uri: Option<String>,
    /// Batch job created from this session's recorded audio, if any.
    pub enhancement_job_id: Option<JobId>,
    pub retention_policy_id: Option<PolicyId>,
    pub purge_after: Option<DateTime<Utc>>,
    pub purged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

crate::builder! {
    pub struct RealtimeSessionBuilder => RealtimeSession {
        set {
            id: SessionId = SessionId::mint(),
            tenant_id: TenantId = crate::tenant::DEFAULT_TENANT_ID,
            status: SessionStatus = SessionStatus::Active,
            audio_duration_seconds: f64 = 0.0,
            segment_count: u64 = 0,
            word_count: u64 = 0,
            created_at: chrono::DateTime<chrono::Utc> = chrono::DateTime::<chrono::Utc>::MIN_UTC,
            updated_at: chrono::DateTime<chrono::Utc> = chrono::DateTime::<chrono::Utc>::MIN_UTC,
        }
        option {
            language: String = None,
            model: String = None,
            engine: String = None,
            encoding: String = None,
            sample_rate: u32 = None,
            worker_id: WorkerId = None,
            client_ip: String = None,
            previous_session_id: SessionId = None,
            audio_uri: String = None,
            transcript_uri: String = None,
            enhancement_job_id: JobId = None,
            retention_policy_id: PolicyId = None,
            purge_after: chrono::DateTime<chrono::Utc> = None,
            purged_at: chrono::DateTime<chrono::Utc> = None,
            ended_at: chrono::DateTime<chrono::Utc> = None,
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
