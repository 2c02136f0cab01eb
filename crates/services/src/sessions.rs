// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime session history.
//!
//! Persistent rows for every streaming session: created on accept,
//! updated while streaming, finalized on disconnect. Distinct from the
//! ephemeral registry records the session router manages.

use crate::error::ServiceError;
use crate::retention::RetentionService;
use dalston_core::{Clock, JobId, RealtimeSession, SessionId, SessionStatus, TenantId, WorkerId};
use dalston_storage::StateStore;
use std::sync::Arc;

/// Session attributes fixed at accept time.
#[derive(Debug, Clone)]
pub struct StartSessionParams {
    pub session_id: SessionId,
    pub language: Option<String>,
    pub model: Option<String>,
    pub engine: Option<String>,
    pub encoding: Option<String>,
    pub sample_rate: Option<u32>,
    pub worker_id: Option<WorkerId>,
    pub client_ip: Option<String>,
    pub previous_session_id: Option<SessionId>,
    pub retention_policy: Option<String>,
}

impl StartSessionParams {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            language: None,
            model: None,
            engine: None,
            encoding: None,
            sample_rate: None,
            worker_id: None,
            client_ip: None,
            previous_session_id: None,
            retention_policy: None,
        }
    }

    dalston_core::setters! {
        option {
            language: String,
            model: String,
            engine: String,
            encoding: String,
            sample_rate: u32,
            worker_id: WorkerId,
            client_ip: String,
            previous_session_id: SessionId,
            retention_policy: String,
        }
    }
}

pub struct RealtimeSessionService<S, C> {
    store: Arc<S>,
    clock: C,
    retention: RetentionService<S, C>,
}

impl<S, C> RealtimeSessionService<S, C>
where
    S: StateStore,
    C: Clock,
{
    pub fn new(store: Arc<S>, clock: C) -> Self {
        let retention = RetentionService::new(store.clone(), clock.clone());
        Self { store, clock, retention }
    }

    pub async fn start_session(
        &self,
        tenant_id: TenantId,
        params: StartSessionParams,
    ) -> Result<RealtimeSession, ServiceError> {
        let policy = self
            .retention
            .resolve_policy(tenant_id, params.retention_policy.as_deref())
            .await?;

        let now = self.clock.now_utc();
        let session = RealtimeSession {
            id: params.session_id,
            tenant_id,
            status: SessionStatus::Active,
            language: params.language,
            model: params.model,
            engine: params.engine,
            encoding: params.encoding,
            sample_rate: params.sample_rate,
            worker_id: params.worker_id,
            client_ip: params.client_ip,
            previous_session_id: params.previous_session_id,
            audio_duration_seconds: 0.0,
            segment_count: 0,
            word_count: 0,
            audio_uri: None,
            transcript_uri: None,
            enhancement_job_id: None,
            retention_policy_id: Some(policy.id),
            purge_after: None,
            purged_at: None,
            created_at: now,
            updated_at: now,
            ended_at: None,
        };
        self.store.put_session(session.clone()).await?;
        Ok(session)
    }

    pub async fn get_session(
        &self,
        tenant_id: TenantId,
        id: &SessionId,
    ) -> Result<RealtimeSession, ServiceError> {
        match self.store.get_session(id).await? {
            Some(s) if s.tenant_id == tenant_id => Ok(s),
            _ => Err(ServiceError::NotFound(format!("session {id} not found"))),
        }
    }

    pub async fn list_sessions(
        &self,
        tenant_id: TenantId,
        limit: usize,
    ) -> Result<Vec<RealtimeSession>, ServiceError> {
        Ok(self.store.list_sessions(tenant_id, limit).await?)
    }

    /// Periodic stats refresh while the session streams.
    pub async fn update_stats(
        &self,
        tenant_id: TenantId,
        id: &SessionId,
        audio_duration_seconds: f64,
        segment_count: u64,
        word_count: u64,
    ) -> Result<RealtimeSession, ServiceError> {
        let mut session = self.get_session(tenant_id, id).await?;
        session.audio_duration_seconds = audio_duration_seconds;
        session.segment_count = segment_count;
        session.word_count = word_count;
        session.updated_at = self.clock.now_utc();
        self.store.put_session(session.clone()).await?;
        Ok(session)
    }

    /// Close out a session and stamp its purge deadline from the policy's
    /// realtime sub-mode.
    pub async fn finalize_session(
        &self,
        tenant_id: TenantId,
        id: &SessionId,
        status: SessionStatus,
        audio_uri: Option<String>,
        transcript_uri: Option<String>,
    ) -> Result<RealtimeSession, ServiceError> {
        if !status.is_terminal() {
            return Err(ServiceError::Validation(format!(
                "cannot finalize session into non-terminal status {status}"
            )));
        }

        let mut session = self.get_session(tenant_id, id).await?;
        if session.status.is_terminal() {
            // Disconnect handlers can race the keepalive reaper.
            return Ok(session);
        }

        let now = self.clock.now_utc();
        session.status = status;
        session.ended_at = Some(now);
        session.updated_at = now;
        if audio_uri.is_some() {
            session.audio_uri = audio_uri;
        }
        if transcript_uri.is_some() {
            session.transcript_uri = transcript_uri;
        }
        session.purge_after = self.retention.session_purge_after(&session, now).await?;

        self.store.put_session(session.clone()).await?;
        tracing::info!(session_id = %id, status = %status, "realtime session finalized");
        Ok(session)
    }

    /// Link the batch job created from this session's recorded audio.
    pub async fn set_enhancement_job(
        &self,
        tenant_id: TenantId,
        id: &SessionId,
        job_id: JobId,
    ) -> Result<(), ServiceError> {
        let mut session = self.get_session(tenant_id, id).await?;
        session.enhancement_job_id = Some(job_id);
        session.updated_at = self.clock.now_utc();
        self.store.put_session(session).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
