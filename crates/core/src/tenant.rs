// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tenant entity.

use crate::id::TenantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known tenant for deployments running without auth.
pub const DEFAULT_TENANT_ID: TenantId = TenantId::from_u128(0xa1);
pub const DEFAULT_TENANT_NAME: &str = "default";

/// Isolation unit for jobs, sessions, policies and endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    /// Open per-tenant settings map.
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn default_tenant(now: DateTime<Utc>) -> Self {
        Self {
            id: DEFAULT_TENANT_ID,
            name: DEFAULT_TENANT_NAME.to_string(),
            settings: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }
}
