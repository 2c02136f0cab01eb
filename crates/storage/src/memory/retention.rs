// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retention policy rows and the per-blob artifact index.

use super::MemoryStore;
use crate::error::StoreError;
use crate::store::{ArtifactIndex, PolicyStore};
use crate::types::{ArtifactObject, ArtifactOwner};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dalston_core::{PolicyId, RetentionPolicy, TenantId};

#[async_trait]
impl PolicyStore for MemoryStore {
    async fn insert_policy(&self, policy: RetentionPolicy) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.policies.contains_key(&policy.id) {
            return Err(StoreError::Conflict(format!("policy {} already exists", policy.id)));
        }
        inner.policies.insert(policy.id, policy);
        Ok(())
    }

    async fn get_policy(&self, id: PolicyId) -> Result<Option<RetentionPolicy>, StoreError> {
        Ok(self.lock().policies.get(&id).cloned())
    }

    async fn find_policy_by_name(
        &self,
        tenant_id: Option<TenantId>,
        name: &str,
    ) -> Result<Option<RetentionPolicy>, StoreError> {
        Ok(self
            .lock()
            .policies
            .values()
            .find(|p| p.tenant_id == tenant_id && p.name == name)
            .cloned())
    }

    async fn list_policies(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<RetentionPolicy>, StoreError> {
        let inner = self.lock();
        let mut policies: Vec<RetentionPolicy> = inner
            .policies
            .values()
            .filter(|p| p.tenant_id.is_none() || p.tenant_id == Some(tenant_id))
            .cloned()
            .collect();
        policies.sort_by(|a, b| b.is_system.cmp(&a.is_system).then(a.name.cmp(&b.name)));
        Ok(policies)
    }

    async fn delete_policy(&self, id: PolicyId) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.policies.remove(&id).ok_or_else(|| StoreError::not_found("policy", id))?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactIndex for MemoryStore {
    async fn insert_artifact(&self, artifact: ArtifactObject) -> Result<(), StoreError> {
        self.lock().artifacts.insert(artifact.id, artifact);
        Ok(())
    }

    async fn artifacts_for_owner(
        &self,
        owner: &ArtifactOwner,
    ) -> Result<Vec<ArtifactObject>, StoreError> {
        let inner = self.lock();
        let mut rows: Vec<ArtifactObject> =
            inner.artifacts.values().filter(|a| &a.owner == owner).cloned().collect();
        rows.sort_by(|a, b| a.uri.cmp(&b.uri));
        Ok(rows)
    }

    async fn mark_owner_artifacts_available(
        &self,
        owner: &ArtifactOwner,
        available_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        let mut updated = 0;
        for artifact in inner.artifacts.values_mut() {
            if &artifact.owner != owner || artifact.purge_after.is_some() {
                continue;
            }
            artifact.available_at = Some(available_at);
            if let Some(ttl) = artifact.ttl_seconds {
                artifact.purge_after = Some(available_at + Duration::seconds(ttl as i64));
            }
            updated += 1;
        }
        Ok(updated)
    }

    async fn expired_artifacts(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ArtifactObject>, StoreError> {
        let inner = self.lock();
        let mut rows: Vec<ArtifactObject> = inner
            .artifacts
            .values()
            .filter(|a| a.purge_after.is_some_and(|p| p <= now))
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.purge_after);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn delete_artifact_row(&self, id: uuid::Uuid) -> Result<(), StoreError> {
        self.lock().artifacts.remove(&id);
        Ok(())
    }
}
