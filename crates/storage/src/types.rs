// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Row types owned by the storage layer.

use chrono::{DateTime, Utc};
use dalston_core::{JobId, SessionId, TenantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Owner of a tracked artifact blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "owner_type", content = "owner_id")]
pub enum ArtifactOwner {
    Job(JobId),
    Session(SessionId),
}

/// One row per persisted blob, letting retention purge per-artifact
/// independently of the owner row.
///
/// `purge_after` stays null until the owner finalizes; the bulk
/// availability update stamps `available_at` and computes the deadline
/// from `ttl_seconds`, so blobs written mid-run can't be purged early.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactObject {
    pub id: Uuid,
    pub owner: ArtifactOwner,
    pub uri: String,
    pub ttl_seconds: Option<u64>,
    pub available_at: Option<DateTime<Utc>>,
    pub purge_after: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit record. Writes are best-effort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub tenant_id: Option<TenantId>,
    pub actor_type: String,
    pub actor_id: String,
    /// Action performed, e.g. `job.created` or `job.purged`.
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub detail: Option<serde_json::Value>,
    pub correlation_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Which override level a setting row belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettingScope {
    System,
    Tenant(TenantId),
}
