// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook endpoint and delivery rows.

use super::{DeliveryTarget, MemoryStore};
use crate::error::StoreError;
use crate::store::{DeliveryStore, EndpointStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dalston_core::{
    DeliveryId, DeliveryStatus, EndpointId, TenantId, WebhookDelivery, WebhookEndpoint,
};

fn delivery_target(delivery: &WebhookDelivery) -> Result<DeliveryTarget, StoreError> {
    match (delivery.endpoint_id, &delivery.url_override) {
        (Some(id), None) => Ok(DeliveryTarget::Endpoint(id)),
        (None, Some(url)) => Ok(DeliveryTarget::Url(url.clone())),
        _ => Err(StoreError::Conflict(
            "delivery must carry exactly one of endpoint_id or url_override".to_string(),
        )),
    }
}

#[async_trait]
impl EndpointStore for MemoryStore {
    async fn insert_endpoint(&self, endpoint: WebhookEndpoint) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.endpoints.contains_key(&endpoint.id) {
            return Err(StoreError::Conflict(format!(
                "endpoint {} already exists",
                endpoint.id
            )));
        }
        inner.endpoints.insert(endpoint.id, endpoint);
        Ok(())
    }

    async fn get_endpoint(&self, id: EndpointId) -> Result<Option<WebhookEndpoint>, StoreError> {
        Ok(self.lock().endpoints.get(&id).cloned())
    }

    async fn list_endpoints(
        &self,
        tenant_id: TenantId,
        is_active: Option<bool>,
    ) -> Result<Vec<WebhookEndpoint>, StoreError> {
        let inner = self.lock();
        let mut endpoints: Vec<WebhookEndpoint> = inner
            .endpoints
            .values()
            .filter(|e| e.tenant_id == tenant_id)
            .filter(|e| is_active.is_none_or(|want| e.is_active == want))
            .cloned()
            .collect();
        endpoints.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(endpoints)
    }

    async fn update_endpoint(&self, endpoint: WebhookEndpoint) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.endpoints.contains_key(&endpoint.id) {
            return Err(StoreError::not_found("endpoint", endpoint.id));
        }
        inner.endpoints.insert(endpoint.id, endpoint);
        Ok(())
    }

    async fn delete_endpoint(&self, id: EndpointId) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.endpoints.remove(&id).ok_or_else(|| StoreError::not_found("endpoint", id))?;
        Ok(())
    }

    async fn active_endpoints_for_event(
        &self,
        tenant_id: TenantId,
        event_type: &str,
    ) -> Result<Vec<WebhookEndpoint>, StoreError> {
        Ok(self
            .lock()
            .endpoints
            .values()
            .filter(|e| e.tenant_id == tenant_id && e.is_active && e.matches_event(event_type))
            .cloned()
            .collect())
    }

    async fn record_endpoint_success(
        &self,
        id: EndpointId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let endpoint =
            inner.endpoints.get_mut(&id).ok_or_else(|| StoreError::not_found("endpoint", id))?;
        endpoint.consecutive_failures = 0;
        endpoint.last_success_at = Some(at);
        Ok(())
    }

    async fn increment_endpoint_failures(&self, id: EndpointId) -> Result<u32, StoreError> {
        let mut inner = self.lock();
        let endpoint =
            inner.endpoints.get_mut(&id).ok_or_else(|| StoreError::not_found("endpoint", id))?;
        endpoint.consecutive_failures += 1;
        Ok(endpoint.consecutive_failures)
    }

    async fn disable_endpoint(&self, id: EndpointId, reason: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let endpoint =
            inner.endpoints.get_mut(&id).ok_or_else(|| StoreError::not_found("endpoint", id))?;
        endpoint.is_active = false;
        endpoint.disabled_reason = Some(reason.to_string());
        Ok(())
    }
}

#[async_trait]
impl DeliveryStore for MemoryStore {
    async fn create_delivery(
        &self,
        delivery: WebhookDelivery,
    ) -> Result<WebhookDelivery, StoreError> {
        let target = delivery_target(&delivery)?;
        let key = (target, delivery.job_id, delivery.event_type.clone());

        let mut inner = self.lock();
        if let Some(existing_id) = inner.delivery_dedup.get(&key) {
            if let Some(existing) = inner.deliveries.get(existing_id) {
                return Ok(existing.clone());
            }
        }
        inner.delivery_dedup.insert(key, delivery.id);
        inner.deliveries.insert(delivery.id, delivery.clone());
        Ok(delivery)
    }

    async fn get_delivery(&self, id: DeliveryId) -> Result<Option<WebhookDelivery>, StoreError> {
        Ok(self.lock().deliveries.get(&id).cloned())
    }

    async fn deliveries_for_endpoint(
        &self,
        endpoint_id: EndpointId,
        status: Option<DeliveryStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<WebhookDelivery>, u64), StoreError> {
        let inner = self.lock();
        let mut rows: Vec<WebhookDelivery> = inner
            .deliveries
            .values()
            .filter(|d| d.endpoint_id == Some(endpoint_id))
            .filter(|d| status.is_none_or(|want| d.status == want))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = rows.len() as u64;
        let rows = rows.into_iter().skip(offset).take(limit).collect();
        Ok((rows, total))
    }

    async fn claim_due_deliveries(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<WebhookDelivery>, StoreError> {
        let mut inner = self.lock();
        let mut due: Vec<WebhookDelivery> = inner
            .deliveries
            .values()
            .filter(|d| {
                d.status == DeliveryStatus::Pending
                    && d.next_retry_at.is_some_and(|t| t <= now)
                    && !inner.claimed_deliveries.contains(&d.id)
            })
            .cloned()
            .collect();
        due.sort_by_key(|d| d.next_retry_at);
        due.truncate(limit);
        for d in &due {
            inner.claimed_deliveries.insert(d.id);
        }
        Ok(due)
    }

    async fn update_delivery(&self, delivery: WebhookDelivery) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.deliveries.contains_key(&delivery.id) {
            return Err(StoreError::not_found("delivery", delivery.id));
        }
        inner.claimed_deliveries.remove(&delivery.id);
        inner.deliveries.insert(delivery.id, delivery);
        Ok(())
    }

    async fn reset_delivery_for_retry(
        &self,
        id: DeliveryId,
        now: DateTime<Utc>,
    ) -> Result<Option<WebhookDelivery>, StoreError> {
        let mut inner = self.lock();
        let Some(delivery) = inner.deliveries.get_mut(&id) else {
            return Ok(None);
        };
        if delivery.status != DeliveryStatus::Failed {
            return Err(StoreError::Conflict(format!(
                "can only retry failed deliveries, current status: {}",
                delivery.status
            )));
        }
        delivery.status = DeliveryStatus::Pending;
        delivery.next_retry_at = Some(now);
        Ok(Some(delivery.clone()))
    }
}
