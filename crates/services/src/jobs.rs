// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job intake and cancellation.

use crate::audit::{AuditContext, AuditService};
use crate::error::ServiceError;
use crate::retention::RetentionService;
use dalston_adapters::flags::{job_cancelled_key, JOB_CANCELLED_TTL};
use dalston_adapters::{EventBus, FlagStore};
use dalston_core::webhook::WEBHOOK_METADATA_MAX_BYTES;
use dalston_core::{Clock, Event, Job, JobId, JobParameters, JobStatus, TenantId};
use dalston_storage::StateStore;
use std::sync::Arc;

/// Validated job submission from the API layer.
#[derive(Debug, Clone)]
pub struct CreateJobRequest {
    pub audio_uri: String,
    pub parameters: serde_json::Value,
    pub webhook_url: Option<String>,
    pub webhook_metadata: Option<serde_json::Value>,
    pub retention_policy: Option<String>,
    pub request_id: Option<String>,
}

impl CreateJobRequest {
    pub fn new(audio_uri: impl Into<String>) -> Self {
        Self {
            audio_uri: audio_uri.into(),
            parameters: serde_json::Value::Null,
            webhook_url: None,
            webhook_metadata: None,
            retention_policy: None,
            request_id: None,
        }
    }

    dalston_core::setters! {
        set {
            parameters: serde_json::Value,
        }
        option {
            webhook_url: String,
            webhook_metadata: serde_json::Value,
            retention_policy: String,
            request_id: String,
        }
    }
}

pub struct JobsService<S, B, F, C> {
    store: Arc<S>,
    bus: Arc<B>,
    flags: Arc<F>,
    clock: C,
    retention: RetentionService<S, C>,
    audit: AuditService<S, C>,
}

impl<S, B, F, C> JobsService<S, B, F, C>
where
    S: StateStore,
    B: EventBus,
    F: FlagStore,
    C: Clock,
{
    pub fn new(store: Arc<S>, bus: Arc<B>, flags: Arc<F>, clock: C) -> Self {
        let retention = RetentionService::new(store.clone(), clock.clone());
        let audit = AuditService::new(store.clone(), clock.clone());
        Self { store, bus, flags, clock, retention, audit }
    }

    /// Accept a job: validate, resolve retention, persist, announce.
    pub async fn create_job(
        &self,
        tenant_id: TenantId,
        request: CreateJobRequest,
    ) -> Result<Job, ServiceError> {
        // Parameters must plan cleanly before anything is persisted.
        JobParameters::from_value(&request.parameters)?;

        if let Some(metadata) = &request.webhook_metadata {
            let size = metadata.to_string().len();
            if size > WEBHOOK_METADATA_MAX_BYTES {
                return Err(ServiceError::Validation(format!(
                    "webhook_metadata exceeds {WEBHOOK_METADATA_MAX_BYTES} bytes ({size})"
                )));
            }
        }

        if let Some(url) = &request.webhook_url {
            // Scheme and hostname only; the SSRF guard runs per send.
            let parsed = reqwest::Url::parse(url)
                .map_err(|e| ServiceError::Validation(format!("invalid webhook URL: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
                return Err(ServiceError::Validation(format!("invalid webhook URL: {url}")));
            }
        }

        let policy = self
            .retention
            .resolve_policy(tenant_id, request.retention_policy.as_deref())
            .await?;

        let now = self.clock.now_utc();
        let job = Job {
            id: JobId::new(),
            tenant_id,
            status: JobStatus::Pending,
            audio_uri: request.audio_uri,
            parameters: request.parameters,
            webhook_url: request.webhook_url,
            webhook_metadata: request.webhook_metadata,
            error: None,
            retention_policy_id: Some(policy.id),
            retention_scope: policy.scope,
            result: None,
            purge_after: None,
            purged_at: None,
            created_at: now,
            started_at: None,
            completed_at: None,
        };
        self.store.insert_job(job.clone()).await?;

        self.audit
            .log(
                "job.created",
                "job",
                &job.id.to_string(),
                AuditContext {
                    tenant_id: Some(tenant_id),
                    correlation_id: request.request_id.clone(),
                    detail: Some(serde_json::json!({
                        "retention_policy": policy.name,
                    })),
                    ..AuditContext::default()
                },
            )
            .await;

        self.bus
            .publish(&Event::JobCreated { job_id: job.id, request_id: request.request_id })
            .await?;

        tracing::info!(job_id = %job.id, tenant_id = %tenant_id, "job created");
        Ok(job)
    }

    /// Request cancellation.
    ///
    /// Cancelling a terminal job is a conflict; repeating a cancel while
    /// the job is still draining is accepted and changes nothing.
    pub async fn cancel_job(&self, tenant_id: TenantId, job_id: JobId) -> Result<Job, ServiceError> {
        let job = self.get_job(tenant_id, job_id).await?;

        if job.is_terminal() {
            return Err(ServiceError::Conflict(format!(
                "cannot cancel job in status {}",
                job.status
            )));
        }
        if job.status == JobStatus::Cancelling {
            return Ok(job);
        }

        let now = self.clock.now_utc();
        let applied = self
            .store
            .transition_job(
                job_id,
                &[JobStatus::Pending, JobStatus::Running],
                JobStatus::Cancelling,
                now,
            )
            .await?;
        if !applied {
            // Lost a race with completion or another cancel.
            let job = self.get_job(tenant_id, job_id).await?;
            if job.status == JobStatus::Cancelling {
                return Ok(job);
            }
            return Err(ServiceError::Conflict(format!(
                "cannot cancel job in status {}",
                job.status
            )));
        }

        // Engines poll this flag to self-abort before long work.
        self.flags
            .set_with_ttl(&job_cancelled_key(job_id), "1", JOB_CANCELLED_TTL)
            .await?;

        self.audit
            .log(
                "job.cancel_requested",
                "job",
                &job_id.to_string(),
                AuditContext { tenant_id: Some(tenant_id), ..AuditContext::default() },
            )
            .await;

        self.bus.publish(&Event::JobCancelRequested { job_id }).await?;

        tracing::info!(job_id = %job_id, "job cancellation requested");
        self.get_job(tenant_id, job_id).await
    }

    pub async fn get_job(&self, tenant_id: TenantId, job_id: JobId) -> Result<Job, ServiceError> {
        match self.store.get_job(job_id).await? {
            Some(job) if job.tenant_id == tenant_id => Ok(job),
            _ => Err(ServiceError::NotFound(format!("job {job_id} not found"))),
        }
    }

    pub async fn list_jobs(
        &self,
        tenant_id: TenantId,
        limit: usize,
    ) -> Result<Vec<Job>, ServiceError> {
        Ok(self.store.list_jobs(tenant_id, limit).await?)
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
