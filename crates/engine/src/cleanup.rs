// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retention cleanup worker.
//!
//! Periodically purges artifacts of jobs and sessions past their
//! `purge_after` deadline, then marks the owner purged. Per-owner
//! failures are isolated: log, skip, continue.

use crate::error::EngineError;
use dalston_adapters::ArtifactStore;
use dalston_core::{paths, Clock, Job, RealtimeSession, RetentionScope};
use dalston_services::audit::AuditContext;
use dalston_services::settings::{
    KEY_CLEANUP_BATCH_SIZE, KEY_CLEANUP_INTERVAL_SECONDS, NS_RETENTION,
};
use dalston_services::{AuditService, SettingsService};
use dalston_storage::StateStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct CleanupWorker<S, A, C: Clock> {
    store: Arc<S>,
    blobs: Arc<A>,
    clock: C,
    settings: SettingsService<S, C>,
    audit: AuditService<S, C>,
}

impl<S, A, C> CleanupWorker<S, A, C>
where
    S: StateStore,
    A: ArtifactStore,
    C: Clock,
{
    pub fn new(store: Arc<S>, blobs: Arc<A>, clock: C) -> Self {
        let settings = SettingsService::new(store.clone(), clock.clone());
        let audit = AuditService::new(store.clone(), clock.clone());
        Self { store, blobs, clock, settings, audit }
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!("cleanup worker started");
        loop {
            let interval = self
                .settings
                .get_u64(None, NS_RETENTION, KEY_CLEANUP_INTERVAL_SECONDS)
                .await
                .unwrap_or(300);
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_secs(interval)) => {
                    if let Err(e) = self.sweep_once().await {
                        tracing::error!(error = %e, "cleanup sweep failed");
                    }
                }
            }
        }
        tracing::info!("cleanup worker stopped");
    }

    /// One pass over expired jobs and sessions.
    pub async fn sweep_once(&self) -> Result<(), EngineError> {
        let batch_size =
            self.settings.get_u64(None, NS_RETENTION, KEY_CLEANUP_BATCH_SIZE).await? as usize;

        let jobs_purged = self.purge_expired_jobs(batch_size).await?;
        let sessions_purged = self.purge_expired_sessions(batch_size).await?;

        if jobs_purged > 0 || sessions_purged > 0 {
            tracing::info!(jobs_purged, sessions_purged, "cleanup sweep complete");
        }
        Ok(())
    }

    async fn purge_expired_jobs(&self, batch_size: usize) -> Result<usize, EngineError> {
        let now = self.clock.now_utc();
        let jobs = self.store.purgeable_jobs(now, batch_size).await?;
        let mut purged = 0usize;

        for job in jobs {
            match self.purge_job(&job).await {
                Ok(artifacts) => {
                    purged += 1;
                    self.audit
                        .log(
                            "job.purged",
                            "job",
                            &job.id.to_string(),
                            AuditContext {
                                tenant_id: Some(job.tenant_id),
                                detail: Some(serde_json::json!({
                                    "artifacts_deleted": artifacts,
                                    "retention_scope": job.retention_scope.to_string(),
                                })),
                                ..AuditContext::default()
                            },
                        )
                        .await;
                    tracing::info!(
                        job_id = %job.id,
                        retention_scope = %job.retention_scope,
                        "job purged"
                    );
                }
                Err(e) => {
                    tracing::error!(job_id = %job.id, error = %e, "job purge failed");
                }
            }
        }
        Ok(purged)
    }

    /// Delete one job's artifacts per its scope; returns the kinds
    /// deleted for the audit record.
    async fn purge_job(&self, job: &Job) -> Result<Vec<&'static str>, EngineError> {
        let artifacts = match job.retention_scope {
            RetentionScope::All => {
                self.blobs.delete_prefix(&paths::job_prefix(job.id)).await?;
                vec!["audio", "tasks", "transcript"]
            }
            RetentionScope::AudioOnly => {
                self.blobs.delete_prefix(&paths::job_audio_prefix(job.id)).await?;
                self.blobs.delete_prefix(&paths::job_tasks_prefix(job.id)).await?;
                vec!["audio", "tasks"]
            }
        };
        self.store.mark_job_purged(job.id, self.clock.now_utc()).await?;
        Ok(artifacts)
    }

    async fn purge_expired_sessions(&self, batch_size: usize) -> Result<usize, EngineError> {
        let now = self.clock.now_utc();
        let sessions = self.store.purgeable_sessions(now, batch_size).await?;
        let mut purged = 0usize;

        for session in sessions {
            match self.purge_session(&session).await {
                Ok(()) => {
                    purged += 1;
                    self.audit
                        .log(
                            "session.purged",
                            "session",
                            session.id.as_str(),
                            AuditContext {
                                tenant_id: Some(session.tenant_id),
                                ..AuditContext::default()
                            },
                        )
                        .await;
                    tracing::info!(session_id = %session.id, "session purged");
                }
                Err(e) => {
                    tracing::error!(
                        session_id = %session.id,
                        error = %e,
                        "session purge failed"
                    );
                }
            }
        }
        Ok(purged)
    }

    async fn purge_session(&self, session: &RealtimeSession) -> Result<(), EngineError> {
        self.blobs.delete_prefix(&paths::session_prefix(&session.id)).await?;
        self.store.mark_session_purged(&session.id, self.clock.now_utc()).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "cleanup_tests.rs"]
mod tests;
