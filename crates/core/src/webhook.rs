// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook endpoint and delivery entities.

use crate::id::{DeliveryId, EndpointId, JobId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event types endpoints may subscribe to. `*` matches everything.
pub const EVENT_TRANSCRIPTION_COMPLETED: &str = "transcription.completed";
pub const EVENT_TRANSCRIPTION_FAILED: &str = "transcription.failed";
pub const EVENT_WILDCARD: &str = "*";

pub const ALLOWED_EVENTS: [&str; 3] =
    [EVENT_TRANSCRIPTION_COMPLETED, EVENT_TRANSCRIPTION_FAILED, EVENT_WILDCARD];

/// Upper bound on caller-supplied webhook metadata echoed back in payloads.
pub const WEBHOOK_METADATA_MAX_BYTES: usize = 16 * 1024;

/// Signing secrets are minted with this prefix.
pub const SIGNING_SECRET_PREFIX: &str = "whsec_";

/// A persistent webhook subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    pub id: EndpointId,
    pub tenant_id: TenantId,
    pub url: String,
    pub description: Option<String>,
    pub events: Vec<String>,
    pub signing_secret: String,
    pub is_active: bool,
    pub consecutive_failures: u32,
    pub last_success_at: Option<DateTime<Utc>>,
    pub disabled_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WebhookEndpoint {
    /// Whether this endpoint subscribes to `event_type`.
    pub fn matches_event(&self, event_type: &str) -> bool {
        self.events.iter().any(|e| e == event_type || e == EVENT_WILDCARD)
    }
}

crate::builder! {
    pub struct WebhookEndpointBuilder => WebhookEndpoint {
        into {
            url: String = "https://example.com/hook",
            signing_secret: String = "whsec_test",
        }
        set {
            id: EndpointId = EndpointId::new(),
            tenant_id: TenantId = crate::tenant::DEFAULT_TENANT_ID,
            events: Vec<String> = vec![EVENT_WILDCARD.to_string()],
            is_active: bool = true,
            consecutive_failures: u32 = 0,
            created_at: chrono::DateTime<chrono::Utc> = chrono::DateTime::<chrono::Utc>::MIN_UTC,
        }
        option {
            description: String = None,
            last_success_at: chrono::DateTime<chrono::Utc> = None,
            disabled_reason: String = None,
        }
    }
}

/// Outcome of a delivery record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Success,
    Failed,
}

crate::simple_display! {
    DeliveryStatus {
        Pending => "pending",
        Success => "success",
        Failed => "failed",
    }
}

/// One webhook notification with its attempt bookkeeping.
///
/// Either `endpoint_id` (registered endpoint) or `url_override` (per-job
/// webhook using the global secret) is set, never both. At most one row
/// exists per `(target, job_id, event_type)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: DeliveryId,
    pub endpoint_id: Option<EndpointId>,
    pub url_override: Option<String>,
    pub job_id: JobId,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub last_status_code: Option<u16>,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

crate::builder! {
    pub struct WebhookDeliveryBuilder => WebhookDelivery {
        into {
            event_type: String = EVENT_TRANSCRIPTION_COMPLETED,
        }
        set {
            id: DeliveryId = DeliveryId::new(),
            job_id: JobId = JobId::new(),
            payload: serde_json::Value = serde_json::Value::Null,
            status: DeliveryStatus = DeliveryStatus::Pending,
            attempts: u32 = 0,
            created_at: chrono::DateTime<chrono::Utc> = chrono::DateTime::<chrono::Utc>::MIN_UTC,
        }
        option {
            endpoint_id: EndpointId = None,
            url_override: String = None,
            last_status_code: u16 = None,
            last_error: String = None,
            last_attempt_at: chrono::DateTime<chrono::Utc> = None,
            next_retry_at: chrono::DateTime<chrono::Utc> = None,
        }
    }
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
