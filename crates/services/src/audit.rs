// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fail-open audit trail.
//!
//! Audit writes must never block a business operation: failures are
//! logged, counted in process metrics, and swallowed.

use dalston_core::metrics::METRICS;
use dalston_core::{Clock, TenantId};
use dalston_storage::{AuditEntry, AuditStore};
use std::sync::Arc;
use uuid::Uuid;

/// Optional fields attached to an audit record.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    pub tenant_id: Option<TenantId>,
    pub actor_type: Option<String>,
    pub actor_id: Option<String>,
    pub detail: Option<serde_json::Value>,
    pub correlation_id: Option<String>,
}

pub struct AuditService<S, C> {
    store: Arc<S>,
    clock: C,
}

impl<S, C> AuditService<S, C>
where
    S: AuditStore,
    C: Clock,
{
    pub fn new(store: Arc<S>, clock: C) -> Self {
        Self { store, clock }
    }

    /// Record an action. Never returns an error.
    pub async fn log(
        &self,
        action: &str,
        resource_type: &str,
        resource_id: &str,
        ctx: AuditContext,
    ) {
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant_id,
            actor_type: ctx.actor_type.unwrap_or_else(|| "system".to_string()),
            actor_id: ctx.actor_id.unwrap_or_else(|| "unknown".to_string()),
            action: action.to_string(),
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            detail: ctx.detail,
            correlation_id: ctx.correlation_id,
            created_at: self.clock.now_utc(),
        };

        if let Err(e) = self.store.append_audit(entry).await {
            METRICS.inc_audit_write_failures();
            tracing::error!(
                action,
                resource_type,
                resource_id,
                error = %e,
                "audit log write failed"
            );
        }
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
