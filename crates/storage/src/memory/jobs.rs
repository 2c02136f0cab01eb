// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job rows.

use super::MemoryStore;
use crate::error::StoreError;
use crate::store::JobStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dalston_core::{Job, JobId, JobStatus, PolicyId, ResultStats, TenantId};
use std::sync::Arc;
use tokio::sync::Mutex;

impl MemoryStore {
    fn with_job<T>(
        &self,
        id: JobId,
        f: impl FnOnce(&mut Job) -> T,
    ) -> Result<T, StoreError> {
        let mut inner = self.lock();
        let job = inner.jobs.get_mut(&id).ok_or_else(|| StoreError::not_found("job", id))?;
        Ok(f(job))
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_job(&self, job: Job) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.jobs.contains_key(&job.id) {
            return Err(StoreError::Conflict(format!("job {} already exists", job.id)));
        }
        inner.jobs.insert(job.id, job);
        Ok(())
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.lock().jobs.get(&id).cloned())
    }

    async fn list_jobs(&self, tenant_id: TenantId, limit: usize) -> Result<Vec<Job>, StoreError> {
        let inner = self.lock();
        let mut jobs: Vec<Job> =
            inner.jobs.values().filter(|j| j.tenant_id == tenant_id).cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(limit);
        Ok(jobs)
    }

    async fn transition_job(
        &self,
        id: JobId,
        from: &[JobStatus],
        to: JobStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.with_job(id, |job| {
            if !from.contains(&job.status) {
                return false;
            }
            job.status = to;
            if to == JobStatus::Running && job.started_at.is_none() {
                job.started_at = Some(at);
            }
            if to.is_terminal() && job.completed_at.is_none() {
                job.completed_at = Some(at);
            }
            true
        })
    }

    async fn set_job_error(&self, id: JobId, error: Option<String>) -> Result<(), StoreError> {
        self.with_job(id, |job| job.error = error)
    }

    async fn set_job_result(&self, id: JobId, stats: ResultStats) -> Result<(), StoreError> {
        self.with_job(id, |job| job.result = Some(stats))
    }

    async fn set_job_purge_after(
        &self,
        id: JobId,
        purge_after: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        self.with_job(id, |job| job.purge_after = purge_after)
    }

    async fn mark_job_purged(&self, id: JobId, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.with_job(id, |job| job.purged_at = Some(at))
    }

    async fn purgeable_jobs(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Job>, StoreError> {
        let inner = self.lock();
        let mut jobs: Vec<Job> = inner
            .jobs
            .values()
            .filter(|j| j.purged_at.is_none() && j.purge_after.is_some_and(|p| p <= now))
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.purge_after);
        jobs.truncate(limit);
        Ok(jobs)
    }

    async fn count_jobs_using_policy(&self, policy_id: PolicyId) -> Result<u64, StoreError> {
        Ok(self
            .lock()
            .jobs
            .values()
            .filter(|j| j.retention_policy_id == Some(policy_id))
            .count() as u64)
    }

    async fn job_lock(&self, id: JobId) -> Arc<Mutex<()>> {
        self.job_lock_arc(id)
    }
}
