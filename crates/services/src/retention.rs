// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retention policy CRUD and resolution.

use crate::error::ServiceError;
use chrono::{DateTime, Utc};
use dalston_core::retention::{RealtimeMode, SYSTEM_POLICY_DEFAULT};
use dalston_core::{
    Clock, Job, PolicyId, RealtimeSession, RetentionMode, RetentionPolicy, RetentionScope,
    TenantId,
};
use dalston_storage::StateStore;
use std::sync::Arc;

/// Validated policy creation request.
#[derive(Debug, Clone)]
pub struct CreatePolicyRequest {
    pub name: String,
    pub mode: RetentionMode,
    pub scope: RetentionScope,
    pub realtime_mode: RealtimeMode,
    pub realtime_hours: Option<u32>,
    pub delete_realtime_on_enhancement: bool,
}

impl CreatePolicyRequest {
    pub fn new(name: impl Into<String>, mode: RetentionMode) -> Self {
        Self {
            name: name.into(),
            mode,
            scope: RetentionScope::All,
            realtime_mode: RealtimeMode::Inherit,
            realtime_hours: None,
            delete_realtime_on_enhancement: true,
        }
    }

    dalston_core::setters! {
        set {
            scope: RetentionScope,
            realtime_mode: RealtimeMode,
            delete_realtime_on_enhancement: bool,
        }
        option {
            realtime_hours: u32,
        }
    }
}

pub struct RetentionService<S, C> {
    store: Arc<S>,
    clock: C,
}

impl<S, C> RetentionService<S, C>
where
    S: StateStore,
    C: Clock,
{
    pub fn new(store: Arc<S>, clock: C) -> Self {
        Self { store, clock }
    }

    pub async fn create_policy(
        &self,
        tenant_id: TenantId,
        request: CreatePolicyRequest,
    ) -> Result<RetentionPolicy, ServiceError> {
        let policy = RetentionPolicy {
            id: PolicyId::new(),
            tenant_id: Some(tenant_id),
            name: request.name,
            mode: request.mode,
            scope: request.scope,
            realtime_mode: request.realtime_mode,
            realtime_hours: request.realtime_hours,
            delete_realtime_on_enhancement: request.delete_realtime_on_enhancement,
            is_system: false,
            created_at: self.clock.now_utc(),
        };
        policy.validate()?;

        if self
            .store
            .find_policy_by_name(Some(tenant_id), &policy.name)
            .await?
            .is_some()
        {
            return Err(ServiceError::Validation(format!(
                "policy with name '{}' already exists",
                policy.name
            )));
        }

        self.store.insert_policy(policy.clone()).await?;
        Ok(policy)
    }

    pub async fn list_policies(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<RetentionPolicy>, ServiceError> {
        Ok(self.store.list_policies(tenant_id).await?)
    }

    /// Fetch a policy the tenant may see: its own or a system policy.
    pub async fn get_policy(
        &self,
        tenant_id: TenantId,
        policy_id: PolicyId,
    ) -> Result<RetentionPolicy, ServiceError> {
        match self.store.get_policy(policy_id).await? {
            Some(p) if p.tenant_id.is_none() || p.tenant_id == Some(tenant_id) => Ok(p),
            _ => Err(ServiceError::NotFound(format!("retention policy {policy_id} not found"))),
        }
    }

    /// Delete a tenant policy. System policies and in-use policies stay.
    pub async fn delete_policy(
        &self,
        tenant_id: TenantId,
        policy_id: PolicyId,
    ) -> Result<(), ServiceError> {
        let policy = self.get_policy(tenant_id, policy_id).await?;

        if policy.is_system {
            return Err(ServiceError::Validation("cannot delete system policies".to_string()));
        }
        if policy.tenant_id != Some(tenant_id) {
            return Err(ServiceError::NotFound(format!(
                "retention policy {policy_id} not found"
            )));
        }

        let jobs = self.store.count_jobs_using_policy(policy_id).await?;
        if jobs > 0 {
            return Err(ServiceError::Conflict(format!("policy is in use by {jobs} job(s)")));
        }
        let sessions = self.store.count_sessions_using_policy(policy_id).await?;
        if sessions > 0 {
            return Err(ServiceError::Conflict(format!(
                "policy is in use by {sessions} session(s)"
            )));
        }

        self.store.delete_policy(policy_id).await?;
        Ok(())
    }

    /// Resolve the policy for a new job or session: by name (tenant scope
    /// first, then system), or the system default when unnamed.
    pub async fn resolve_policy(
        &self,
        tenant_id: TenantId,
        name: Option<&str>,
    ) -> Result<RetentionPolicy, ServiceError> {
        if let Some(name) = name {
            if let Some(policy) = self.store.find_policy_by_name(Some(tenant_id), name).await? {
                return Ok(policy);
            }
            if let Some(policy) = self.store.find_policy_by_name(None, name).await? {
                return Ok(policy);
            }
            return Err(ServiceError::NotFound(format!(
                "retention policy '{name}' not found"
            )));
        }

        self.store
            .get_policy(SYSTEM_POLICY_DEFAULT)
            .await?
            .ok_or_else(|| ServiceError::NotFound("system default policy not found".to_string()))
    }

    /// Policy governing an existing job, falling back to the system
    /// default when the job predates policy tracking.
    pub async fn policy_for_job(&self, job: &Job) -> Result<RetentionPolicy, ServiceError> {
        if let Some(id) = job.retention_policy_id {
            if let Some(policy) = self.store.get_policy(id).await? {
                return Ok(policy);
            }
        }
        self.store
            .get_policy(SYSTEM_POLICY_DEFAULT)
            .await?
            .ok_or_else(|| ServiceError::NotFound("system default policy not found".to_string()))
    }

    /// Stamp a finished job's purge deadline. Returns the deadline.
    pub async fn finalize_job_retention(
        &self,
        job: &Job,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, ServiceError> {
        let policy = self.policy_for_job(job).await?;
        let purge_after = policy.mode.purge_after(completed_at);
        self.store.set_job_purge_after(job.id, purge_after).await?;
        Ok(purge_after)
    }

    /// Purge deadline for a finalized realtime session, under the
    /// policy's realtime sub-mode.
    pub async fn session_purge_after(
        &self,
        session: &RealtimeSession,
        ended_at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, ServiceError> {
        let policy = match session.retention_policy_id {
            Some(id) => self.store.get_policy(id).await?,
            None => self.store.get_policy(SYSTEM_POLICY_DEFAULT).await?,
        };
        let Some(policy) = policy else {
            return Ok(None);
        };
        Ok(policy.effective_realtime_mode()?.purge_after(ended_at))
    }
}

#[cfg(test)]
#[path = "retention_tests.rs"]
mod tests;
