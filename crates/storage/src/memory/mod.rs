// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory state store.
//!
//! Backs the single-process daemon and every test. All maps live behind a
//! single mutex; each operation is one critical section, which gives the
//! same atomicity as one SQL statement. Per-job ordering comes from the
//! async lock map, not from the data mutex.

mod jobs;
mod retention;
mod sessions;
mod tasks;
mod webhooks;

use crate::error::StoreError;
use crate::store::{AuditStore, SettingsStore, TenantStore};
use crate::types::{ArtifactObject, AuditEntry, SettingScope};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dalston_core::{
    DeliveryId, EndpointId, Job, JobId, PolicyId, RealtimeSession, RetentionPolicy, Task, TaskId,
    Tenant, TenantId, WebhookDelivery, WebhookEndpoint,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Dedup key for delivery rows: registered endpoint or raw URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum DeliveryTarget {
    Endpoint(EndpointId),
    Url(String),
}

#[derive(Default)]
pub(crate) struct Inner {
    pub tenants: HashMap<TenantId, Tenant>,
    pub jobs: HashMap<JobId, Job>,
    pub tasks: HashMap<TaskId, Task>,
    /// Task ids per job in insertion (topological) order.
    pub job_tasks: HashMap<JobId, Vec<TaskId>>,
    pub sessions: HashMap<String, RealtimeSession>,
    pub policies: HashMap<PolicyId, RetentionPolicy>,
    pub endpoints: HashMap<EndpointId, WebhookEndpoint>,
    pub deliveries: HashMap<DeliveryId, WebhookDelivery>,
    pub delivery_dedup: HashMap<(DeliveryTarget, JobId, String), DeliveryId>,
    /// Rows currently claimed by a delivery worker.
    pub claimed_deliveries: HashSet<DeliveryId>,
    pub settings: HashMap<(SettingScope, String, String), String>,
    pub audit: Vec<AuditEntry>,
    pub artifacts: HashMap<Uuid, ArtifactObject>,
}

/// In-memory implementation of every state-store trait.
pub struct MemoryStore {
    pub(crate) inner: Mutex<Inner>,
    job_locks: Mutex<HashMap<JobId, Arc<tokio::sync::Mutex<()>>>>,
}

impl MemoryStore {
    /// Seed with the system policies and the default tenant, stamped now.
    pub fn new() -> Self {
        Self::seeded_at(Utc::now())
    }

    /// Deterministic variant for tests driving a fake clock.
    pub fn seeded_at(now: DateTime<Utc>) -> Self {
        let mut inner = Inner::default();
        for policy in RetentionPolicy::system_policies(now) {
            inner.policies.insert(policy.id, policy);
        }
        let tenant = Tenant::default_tenant(now);
        inner.tenants.insert(tenant.id, tenant);
        Self { inner: Mutex::new(inner), job_locks: Mutex::new(HashMap::new()) }
    }

    pub(crate) fn lock(&self) -> parking_lot::MutexGuard<'_, Inner> {
        self.inner.lock()
    }

    pub(crate) fn job_lock_arc(&self, id: JobId) -> Arc<tokio::sync::Mutex<()>> {
        self.job_locks.lock().entry(id).or_default().clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn ensure_tenant(&self, tenant: Tenant) -> Result<(), StoreError> {
        self.lock().tenants.entry(tenant.id).or_insert(tenant);
        Ok(())
    }

    async fn get_tenant(&self, id: TenantId) -> Result<Option<Tenant>, StoreError> {
        Ok(self.lock().tenants.get(&id).cloned())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_setting(
        &self,
        scope: &SettingScope,
        namespace: &str,
        key: &str,
    ) -> Result<Option<String>, StoreError> {
        let k = (scope.clone(), namespace.to_string(), key.to_string());
        Ok(self.lock().settings.get(&k).cloned())
    }

    async fn set_setting(
        &self,
        scope: SettingScope,
        namespace: &str,
        key: &str,
        value: String,
    ) -> Result<(), StoreError> {
        self.lock().settings.insert((scope, namespace.to_string(), key.to_string()), value);
        Ok(())
    }

    async fn delete_setting(
        &self,
        scope: &SettingScope,
        namespace: &str,
        key: &str,
    ) -> Result<(), StoreError> {
        let k = (scope.clone(), namespace.to_string(), key.to_string());
        self.lock().settings.remove(&k);
        Ok(())
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append_audit(&self, entry: AuditEntry) -> Result<(), StoreError> {
        self.lock().audit.push(entry);
        Ok(())
    }

    async fn recent_audit(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        let inner = self.lock();
        let start = inner.audit.len().saturating_sub(limit);
        Ok(inner.audit[start..].to_vec())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
