// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook delivery worker.
//!
//! Polls the durable delivery table for rows due for an attempt, hands
//! each to the HTTP sender, and schedules retries with exponential
//! back-off. Endpoints that fail chronically are disabled automatically.
//! Crash-resilient: everything lives in the state store, and row claims
//! keep concurrent workers off the same delivery.

use crate::error::EngineError;
use chrono::Duration as ChronoDuration;
use dalston_adapters::WebhookSender;
use dalston_core::{Clock, DeliveryStatus, WebhookDelivery};
use dalston_services::WebhookService;
use dalston_storage::StateStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Delay before attempt N+1, indexed by attempts made so far.
pub const RETRY_DELAYS: [i64; 5] = [0, 30, 120, 600, 3600];

pub const MAX_ATTEMPTS: u32 = 5;

pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Rows fetched per poll.
pub const MAX_CONCURRENT: usize = 10;

/// Endpoints are disabled after this many consecutive failures...
pub const AUTO_DISABLE_FAILURE_THRESHOLD: u32 = 10;

/// ...unless they had a success within this many days.
pub const AUTO_DISABLE_SUCCESS_WINDOW_DAYS: i64 = 7;

pub const AUTO_DISABLED_REASON: &str = "auto_disabled";

pub struct DeliveryWorker<S, H, C: Clock> {
    store: Arc<S>,
    sender: Arc<H>,
    webhooks: WebhookService<C>,
    clock: C,
}

impl<S, H, C> DeliveryWorker<S, H, C>
where
    S: StateStore,
    H: WebhookSender,
    C: Clock,
{
    pub fn new(store: Arc<S>, sender: Arc<H>, webhooks: WebhookService<C>, clock: C) -> Self {
        Self { store, sender, webhooks, clock }
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!("delivery worker started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(POLL_INTERVAL) => {
                    if let Err(e) = self.poll_once().await {
                        tracing::error!(error = %e, "delivery poll failed");
                    }
                }
            }
        }
        tracing::info!("delivery worker stopped");
    }

    /// Claim and process every delivery due right now.
    pub async fn poll_once(&self) -> Result<(), EngineError> {
        let now = self.clock.now_utc();
        let due = self.store.claim_due_deliveries(now, MAX_CONCURRENT).await?;
        if due.is_empty() {
            return Ok(());
        }
        tracing::debug!(count = due.len(), "processing due deliveries");

        for delivery in due {
            if let Err(e) = self.process_delivery(delivery).await {
                tracing::error!(error = %e, "delivery processing failed");
            }
        }
        Ok(())
    }

    async fn process_delivery(&self, mut delivery: WebhookDelivery) -> Result<(), EngineError> {
        // Resolve where to send and which secret signs it.
        let (url, secret, endpoint) = match delivery.endpoint_id {
            Some(endpoint_id) => match self.store.get_endpoint(endpoint_id).await? {
                Some(endpoint) => {
                    (endpoint.url.clone(), endpoint.signing_secret.clone(), Some(endpoint))
                }
                None => {
                    tracing::error!(delivery_id = %delivery.id, "delivery endpoint not found");
                    delivery.status = DeliveryStatus::Failed;
                    delivery.last_error = Some("endpoint not found".to_string());
                    delivery.next_retry_at = None;
                    self.store.update_delivery(delivery).await?;
                    return Ok(());
                }
            },
            None => match &delivery.url_override {
                Some(url) => (url.clone(), self.webhooks.global_secret().to_string(), None),
                None => {
                    delivery.status = DeliveryStatus::Failed;
                    delivery.last_error = Some("no URL configured".to_string());
                    delivery.next_retry_at = None;
                    self.store.update_delivery(delivery).await?;
                    return Ok(());
                }
            },
        };

        let (success, status_code, error) = self
            .webhooks
            .deliver(
                self.sender.as_ref(),
                &url,
                &delivery.payload,
                Some(&secret),
                Some(delivery.id),
            )
            .await;

        let now = self.clock.now_utc();
        delivery.attempts += 1;
        delivery.last_attempt_at = Some(now);
        delivery.last_status_code = status_code;
        delivery.last_error = error.clone();

        if success {
            delivery.status = DeliveryStatus::Success;
            delivery.next_retry_at = None;
            tracing::info!(
                delivery_id = %delivery.id,
                status_code = status_code.unwrap_or_default(),
                "webhook delivered"
            );
            if let Some(endpoint) = &endpoint {
                self.store.record_endpoint_success(endpoint.id, now).await?;
            }
        } else if delivery.attempts >= MAX_ATTEMPTS {
            delivery.status = DeliveryStatus::Failed;
            delivery.next_retry_at = None;
            tracing::warn!(
                delivery_id = %delivery.id,
                total_attempts = delivery.attempts,
                last_error = error.as_deref().unwrap_or(""),
                "webhook delivery exhausted"
            );
            if let Some(endpoint) = &endpoint {
                let failures = self.store.increment_endpoint_failures(endpoint.id).await?;
                self.check_auto_disable(endpoint.id, failures, endpoint.last_success_at)
                    .await?;
            }
        } else {
            let delay =
                RETRY_DELAYS[(delivery.attempts as usize).min(RETRY_DELAYS.len() - 1)];
            delivery.next_retry_at = Some(now + ChronoDuration::seconds(delay));
            tracing::info!(
                delivery_id = %delivery.id,
                next_attempt = delivery.attempts + 1,
                delay_seconds = delay,
                "webhook retry scheduled"
            );
        }

        self.store.update_delivery(delivery).await?;
        Ok(())
    }

    /// Disable an endpoint that keeps failing with no recent success.
    async fn check_auto_disable(
        &self,
        endpoint_id: dalston_core::EndpointId,
        consecutive_failures: u32,
        last_success_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<(), EngineError> {
        if consecutive_failures < AUTO_DISABLE_FAILURE_THRESHOLD {
            return Ok(());
        }
        let window_start =
            self.clock.now_utc() - ChronoDuration::days(AUTO_DISABLE_SUCCESS_WINDOW_DAYS);
        if last_success_at.is_some_and(|t| t > window_start) {
            return Ok(());
        }

        self.store.disable_endpoint(endpoint_id, AUTO_DISABLED_REASON).await?;
        tracing::warn!(
            endpoint_id = %endpoint_id,
            consecutive_failures,
            "webhook endpoint auto-disabled"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "delivery_tests.rs"]
mod tests;
