// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State-store contracts, one trait per entity.

use crate::error::StoreError;
use crate::types::{ArtifactObject, ArtifactOwner, AuditEntry, SettingScope};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dalston_core::{
    DeliveryId, EndpointId, Job, JobId, JobStatus, PolicyId, RealtimeSession, ResultStats,
    RetentionPolicy, SessionId, Task, TaskId, TaskStatus, Tenant, TenantId, WebhookDelivery,
    WebhookEndpoint,
};
use std::sync::Arc;
use tokio::sync::Mutex;

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: Job) -> Result<(), StoreError>;

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, StoreError>;

    async fn list_jobs(&self, tenant_id: TenantId, limit: usize) -> Result<Vec<Job>, StoreError>;

    /// Advance the job's status iff it is currently in one of `from`.
    ///
    /// Stamps `started_at` when entering `Running` and `completed_at` when
    /// entering a terminal state. Returns whether the update applied, so
    /// replayed events degrade to no-ops.
    async fn transition_job(
        &self,
        id: JobId,
        from: &[JobStatus],
        to: JobStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn set_job_error(&self, id: JobId, error: Option<String>) -> Result<(), StoreError>;

    async fn set_job_result(&self, id: JobId, stats: ResultStats) -> Result<(), StoreError>;

    async fn set_job_purge_after(
        &self,
        id: JobId,
        purge_after: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    async fn mark_job_purged(&self, id: JobId, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Unpurged jobs with `purge_after ≤ now`, oldest deadline first.
    async fn purgeable_jobs(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Job>, StoreError>;

    async fn count_jobs_using_policy(&self, policy_id: PolicyId) -> Result<u64, StoreError>;

    /// Serialization point for one job's event handling. Handlers hold the
    /// lock for the duration of one event; different jobs proceed in
    /// parallel.
    async fn job_lock(&self, id: JobId) -> Arc<Mutex<()>>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a job's planned tasks. Dependencies must reference tasks in
    /// the same batch or job; cross-job references are rejected.
    async fn insert_tasks(&self, tasks: Vec<Task>) -> Result<(), StoreError>;

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, StoreError>;

    async fn tasks_for_job(&self, job_id: JobId) -> Result<Vec<Task>, StoreError>;

    /// Conditional status advance, mirroring [`JobStore::transition_job`].
    async fn transition_task(
        &self,
        id: TaskId,
        from: &[TaskStatus],
        to: TaskStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn set_task_error(&self, id: TaskId, error: Option<String>) -> Result<(), StoreError>;

    async fn set_task_input_uri(&self, id: TaskId, uri: String) -> Result<(), StoreError>;

    async fn set_task_output_uri(&self, id: TaskId, uri: String) -> Result<(), StoreError>;

    /// Schedule a retry: iff the task is `Failed` with retry budget left,
    /// increment `retries` and set `Ready`. Returns whether it applied.
    async fn begin_task_retry(&self, id: TaskId, at: DateTime<Utc>) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put_session(&self, session: RealtimeSession) -> Result<(), StoreError>;

    async fn get_session(&self, id: &SessionId) -> Result<Option<RealtimeSession>, StoreError>;

    async fn list_sessions(
        &self,
        tenant_id: TenantId,
        limit: usize,
    ) -> Result<Vec<RealtimeSession>, StoreError>;

    async fn mark_session_purged(&self, id: &SessionId, at: DateTime<Utc>)
        -> Result<(), StoreError>;

    async fn purgeable_sessions(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RealtimeSession>, StoreError>;

    async fn count_sessions_using_policy(&self, policy_id: PolicyId) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn insert_policy(&self, policy: RetentionPolicy) -> Result<(), StoreError>;

    async fn get_policy(&self, id: PolicyId) -> Result<Option<RetentionPolicy>, StoreError>;

    /// Look up by name within one scope: a tenant's own policies when
    /// `tenant_id` is set, system policies when it is `None`.
    async fn find_policy_by_name(
        &self,
        tenant_id: Option<TenantId>,
        name: &str,
    ) -> Result<Option<RetentionPolicy>, StoreError>;

    /// Tenant policies plus system policies, system first.
    async fn list_policies(&self, tenant_id: TenantId)
        -> Result<Vec<RetentionPolicy>, StoreError>;

    async fn delete_policy(&self, id: PolicyId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait EndpointStore: Send + Sync {
    async fn insert_endpoint(&self, endpoint: WebhookEndpoint) -> Result<(), StoreError>;

    async fn get_endpoint(&self, id: EndpointId) -> Result<Option<WebhookEndpoint>, StoreError>;

    async fn list_endpoints(
        &self,
        tenant_id: TenantId,
        is_active: Option<bool>,
    ) -> Result<Vec<WebhookEndpoint>, StoreError>;

    /// Whole-row update used by the endpoint service under its own checks.
    async fn update_endpoint(&self, endpoint: WebhookEndpoint) -> Result<(), StoreError>;

    async fn delete_endpoint(&self, id: EndpointId) -> Result<(), StoreError>;

    /// Active endpoints of a tenant subscribed to `event_type`.
    async fn active_endpoints_for_event(
        &self,
        tenant_id: TenantId,
        event_type: &str,
    ) -> Result<Vec<WebhookEndpoint>, StoreError>;

    /// Reset failure tracking after a successful delivery.
    async fn record_endpoint_success(
        &self,
        id: EndpointId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Atomically bump the consecutive-failure counter; returns the new
    /// count for the auto-disable check.
    async fn increment_endpoint_failures(&self, id: EndpointId) -> Result<u32, StoreError>;

    async fn disable_endpoint(&self, id: EndpointId, reason: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Insert a delivery, deduplicated on
    /// `(endpoint_id | url_override, job_id, event_type)`. A duplicate
    /// insert returns the existing row untouched.
    async fn create_delivery(
        &self,
        delivery: WebhookDelivery,
    ) -> Result<WebhookDelivery, StoreError>;

    async fn get_delivery(&self, id: DeliveryId) -> Result<Option<WebhookDelivery>, StoreError>;

    async fn deliveries_for_endpoint(
        &self,
        endpoint_id: EndpointId,
        status: Option<dalston_core::DeliveryStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<WebhookDelivery>, u64), StoreError>;

    /// Fetch up to `limit` pending deliveries due at `now`, oldest due
    /// first, and claim them so concurrent workers skip the same rows.
    /// Claims are released by [`DeliveryStore::update_delivery`].
    async fn claim_due_deliveries(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<WebhookDelivery>, StoreError>;

    /// Write back a processed delivery and release its claim.
    async fn update_delivery(&self, delivery: WebhookDelivery) -> Result<(), StoreError>;

    /// Manual retry: iff the delivery is `Failed`, set it `Pending` and
    /// due at `now`. Returns the updated row.
    async fn reset_delivery_for_retry(
        &self,
        id: DeliveryId,
        now: DateTime<Utc>,
    ) -> Result<Option<WebhookDelivery>, StoreError>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_setting(
        &self,
        scope: &SettingScope,
        namespace: &str,
        key: &str,
    ) -> Result<Option<String>, StoreError>;

    async fn set_setting(
        &self,
        scope: SettingScope,
        namespace: &str,
        key: &str,
        value: String,
    ) -> Result<(), StoreError>;

    async fn delete_setting(
        &self,
        scope: &SettingScope,
        namespace: &str,
        key: &str,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append_audit(&self, entry: AuditEntry) -> Result<(), StoreError>;

    async fn recent_audit(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError>;
}

#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Insert the tenant if absent; existing rows are left untouched.
    async fn ensure_tenant(&self, tenant: Tenant) -> Result<(), StoreError>;

    async fn get_tenant(&self, id: TenantId) -> Result<Option<Tenant>, StoreError>;
}

#[async_trait]
pub trait ArtifactIndex: Send + Sync {
    async fn insert_artifact(&self, artifact: ArtifactObject) -> Result<(), StoreError>;

    async fn artifacts_for_owner(
        &self,
        owner: &ArtifactOwner,
    ) -> Result<Vec<ArtifactObject>, StoreError>;

    /// Stamp `available_at` on the owner's unprocessed artifacts and
    /// compute `purge_after` from each row's `ttl_seconds`. Returns how
    /// many rows were updated.
    async fn mark_owner_artifacts_available(
        &self,
        owner: &ArtifactOwner,
        available_at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    async fn expired_artifacts(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ArtifactObject>, StoreError>;

    async fn delete_artifact_row(&self, id: uuid::Uuid) -> Result<(), StoreError>;
}

/// The full state store a control-plane process runs against.
pub trait StateStore:
    JobStore
    + TaskStore
    + SessionStore
    + PolicyStore
    + EndpointStore
    + DeliveryStore
    + SettingsStore
    + AuditStore
    + TenantStore
    + ArtifactIndex
    + Send
    + Sync
    + 'static
{
}

impl<T> StateStore for T where
    T: JobStore
        + TaskStore
        + SessionStore
        + PolicyStore
        + EndpointStore
        + DeliveryStore
        + SettingsStore
        + AuditStore
        + TenantStore
        + ArtifactIndex
        + Send
        + Sync
        + 'static
{
}
