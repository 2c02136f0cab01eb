// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook endpoint management.

use crate::error::ServiceError;
use crate::webhook::validate_webhook_url;
use dalston_core::webhook::{ALLOWED_EVENTS, SIGNING_SECRET_PREFIX};
use dalston_core::{
    Clock, DeliveryId, DeliveryStatus, EndpointId, TenantId, WebhookDelivery, WebhookEndpoint,
};
use dalston_storage::StateStore;
use std::sync::Arc;
use uuid::Uuid;

/// Fields an endpoint update may touch; `None` leaves the field alone.
#[derive(Debug, Clone, Default)]
pub struct EndpointUpdate {
    pub url: Option<String>,
    pub events: Option<Vec<String>>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

fn mint_secret() -> String {
    // Two UUIDs' worth of hex keeps the secret outside guessing range.
    format!(
        "{SIGNING_SECRET_PREFIX}{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

fn validate_events(events: &[String]) -> Result<(), ServiceError> {
    if events.is_empty() {
        return Err(ServiceError::Validation("at least one event type is required".to_string()));
    }
    let invalid: Vec<&str> = events
        .iter()
        .map(String::as_str)
        .filter(|e| !ALLOWED_EVENTS.contains(e))
        .collect();
    if !invalid.is_empty() {
        return Err(ServiceError::Validation(format!(
            "invalid event types: {}. Allowed: {}",
            invalid.join(", "),
            ALLOWED_EVENTS.join(", ")
        )));
    }
    Ok(())
}

pub struct WebhookEndpointService<S, C> {
    store: Arc<S>,
    clock: C,
}

impl<S, C> WebhookEndpointService<S, C>
where
    S: StateStore,
    C: Clock,
{
    pub fn new(store: Arc<S>, clock: C) -> Self {
        Self { store, clock }
    }

    /// Register an endpoint; returns it with the freshly minted secret
    /// (shown to the caller exactly once).
    pub async fn create_endpoint(
        &self,
        tenant_id: TenantId,
        url: String,
        events: Vec<String>,
        description: Option<String>,
    ) -> Result<(WebhookEndpoint, String), ServiceError> {
        validate_webhook_url(&url, false).await?;
        validate_events(&events)?;

        let secret = mint_secret();
        let endpoint = WebhookEndpoint {
            id: EndpointId::new(),
            tenant_id,
            url,
            description,
            events,
            signing_secret: secret.clone(),
            is_active: true,
            consecutive_failures: 0,
            last_success_at: None,
            disabled_reason: None,
            created_at: self.clock.now_utc(),
        };
        self.store.insert_endpoint(endpoint.clone()).await?;
        Ok((endpoint, secret))
    }

    pub async fn get_endpoint(
        &self,
        tenant_id: TenantId,
        id: EndpointId,
    ) -> Result<WebhookEndpoint, ServiceError> {
        match self.store.get_endpoint(id).await? {
            Some(e) if e.tenant_id == tenant_id => Ok(e),
            _ => Err(ServiceError::NotFound(format!("endpoint {id} not found"))),
        }
    }

    pub async fn list_endpoints(
        &self,
        tenant_id: TenantId,
        is_active: Option<bool>,
    ) -> Result<Vec<WebhookEndpoint>, ServiceError> {
        Ok(self.store.list_endpoints(tenant_id, is_active).await?)
    }

    /// Apply a partial update. Re-enabling clears the failure tracking so
    /// the endpoint starts fresh.
    pub async fn update_endpoint(
        &self,
        tenant_id: TenantId,
        id: EndpointId,
        update: EndpointUpdate,
    ) -> Result<WebhookEndpoint, ServiceError> {
        let mut endpoint = self.get_endpoint(tenant_id, id).await?;

        if let Some(url) = update.url {
            validate_webhook_url(&url, false).await?;
            endpoint.url = url;
        }
        if let Some(events) = update.events {
            validate_events(&events)?;
            endpoint.events = events;
        }
        if let Some(description) = update.description {
            endpoint.description = Some(description);
        }
        if let Some(is_active) = update.is_active {
            if is_active && !endpoint.is_active {
                endpoint.consecutive_failures = 0;
                endpoint.disabled_reason = None;
            }
            endpoint.is_active = is_active;
        }

        self.store.update_endpoint(endpoint.clone()).await?;
        Ok(endpoint)
    }

    pub async fn delete_endpoint(
        &self,
        tenant_id: TenantId,
        id: EndpointId,
    ) -> Result<(), ServiceError> {
        self.get_endpoint(tenant_id, id).await?;
        self.store.delete_endpoint(id).await?;
        Ok(())
    }

    /// Mint a replacement secret. Resets failure tracking like re-enable.
    pub async fn rotate_secret(
        &self,
        tenant_id: TenantId,
        id: EndpointId,
    ) -> Result<(WebhookEndpoint, String), ServiceError> {
        let mut endpoint = self.get_endpoint(tenant_id, id).await?;
        let secret = mint_secret();
        endpoint.signing_secret = secret.clone();
        endpoint.consecutive_failures = 0;
        endpoint.disabled_reason = None;
        self.store.update_endpoint(endpoint.clone()).await?;
        Ok((endpoint, secret))
    }

    pub async fn list_deliveries(
        &self,
        tenant_id: TenantId,
        endpoint_id: EndpointId,
        status: Option<DeliveryStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<WebhookDelivery>, u64), ServiceError> {
        self.get_endpoint(tenant_id, endpoint_id).await?;
        Ok(self.store.deliveries_for_endpoint(endpoint_id, status, limit, offset).await?)
    }

    /// Put a failed delivery back in the queue, due immediately.
    pub async fn retry_delivery(
        &self,
        tenant_id: TenantId,
        endpoint_id: EndpointId,
        delivery_id: DeliveryId,
    ) -> Result<WebhookDelivery, ServiceError> {
        self.get_endpoint(tenant_id, endpoint_id).await?;

        let delivery = self.store.get_delivery(delivery_id).await?;
        match delivery {
            Some(d) if d.endpoint_id == Some(endpoint_id) => {}
            _ => {
                return Err(ServiceError::NotFound(format!(
                    "delivery {delivery_id} not found"
                )))
            }
        }

        match self.store.reset_delivery_for_retry(delivery_id, self.clock.now_utc()).await {
            Ok(Some(delivery)) => Ok(delivery),
            Ok(None) => Err(ServiceError::NotFound(format!("delivery {delivery_id} not found"))),
            Err(dalston_storage::StoreError::Conflict(msg)) => Err(ServiceError::Conflict(msg)),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "endpoints_tests.rs"]
mod tests;
