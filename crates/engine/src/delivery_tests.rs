// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dalston_adapters::{FakeWebhookSender, SendResult};
use dalston_core::tenant::DEFAULT_TENANT_ID;
use dalston_core::webhook::EVENT_TRANSCRIPTION_COMPLETED;
use dalston_core::{Clock, FakeClock, WebhookDelivery, WebhookEndpoint};
use dalston_storage::{DeliveryStore, EndpointStore, MemoryStore};

struct Ctx {
    clock: FakeClock,
    store: Arc<MemoryStore>,
    sender: Arc<FakeWebhookSender>,
    worker: DeliveryWorker<MemoryStore, FakeWebhookSender, FakeClock>,
}

fn setup() -> Ctx {
    let clock = FakeClock::new();
    let store = Arc::new(MemoryStore::seeded_at(clock.now_utc()));
    let sender = Arc::new(FakeWebhookSender::new());
    let webhooks = dalston_services::WebhookService::new("global-secret", clock.clone());
    let worker = DeliveryWorker::new(store.clone(), sender.clone(), webhooks, clock.clone());
    Ctx { clock, store, sender, worker }
}

fn due_delivery(ctx: &Ctx, endpoint: Option<&WebhookEndpoint>) -> WebhookDelivery {
    let mut delivery = WebhookDelivery::builder()
        .payload(serde_json::json!({"event": EVENT_TRANSCRIPTION_COMPLETED}))
        .next_retry_at(ctx.clock.now_utc())
        .build();
    match endpoint {
        Some(e) => delivery.endpoint_id = Some(e.id),
        None => delivery.url_override = Some("https://example.com/hook".to_string()),
    }
    delivery
}

async fn seed_endpoint(ctx: &Ctx) -> WebhookEndpoint {
    let endpoint = WebhookEndpoint::builder().build();
    ctx.store.insert_endpoint(endpoint.clone()).await.unwrap();
    endpoint
}

#[tokio::test]
async fn successful_delivery_resets_endpoint_failures() {
    let ctx = setup();
    let endpoint = seed_endpoint(&ctx).await;
    ctx.store.increment_endpoint_failures(endpoint.id).await.unwrap();
    let delivery = due_delivery(&ctx, Some(&endpoint));
    ctx.store.create_delivery(delivery.clone()).await.unwrap();

    ctx.worker.poll_once().await.unwrap();

    let updated = ctx.store.get_delivery(delivery.id).await.unwrap().unwrap();
    assert_eq!(updated.status, dalston_core::DeliveryStatus::Success);
    assert_eq!(updated.attempts, 1);
    assert_eq!(updated.last_status_code, Some(200));
    assert!(updated.next_retry_at.is_none());

    let endpoint = ctx.store.get_endpoint(endpoint.id).await.unwrap().unwrap();
    assert_eq!(endpoint.consecutive_failures, 0);
    assert_eq!(endpoint.last_success_at, Some(ctx.clock.now_utc()));

    // Signed with the endpoint's secret-bearing headers.
    let calls = ctx.sender.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].headers.iter().any(|(k, _)| k == "X-Dalston-Signature"));
    assert!(calls[0].headers.iter().any(|(k, _)| k == "X-Dalston-Webhook-Id"));
}

#[tokio::test]
async fn failures_back_off_with_the_retry_schedule() {
    let ctx = setup();
    let delivery = due_delivery(&ctx, None);
    ctx.store.create_delivery(delivery.clone()).await.unwrap();

    for (attempt, expected_delay) in [(1u32, 30i64), (2, 120), (3, 600), (4, 3600)] {
        ctx.sender.push_outcome(SendResult::ok(500));
        ctx.worker.poll_once().await.unwrap();

        let updated = ctx.store.get_delivery(delivery.id).await.unwrap().unwrap();
        assert_eq!(updated.status, dalston_core::DeliveryStatus::Pending);
        assert_eq!(updated.attempts, attempt);
        let next = updated.next_retry_at.unwrap();
        assert_eq!(next, ctx.clock.now_utc() + chrono::Duration::seconds(expected_delay));

        // Not due yet: polling now does nothing.
        ctx.worker.poll_once().await.unwrap();
        assert_eq!(
            ctx.store.get_delivery(delivery.id).await.unwrap().unwrap().attempts,
            attempt
        );
        ctx.clock.advance(std::time::Duration::from_secs(expected_delay as u64));
    }

    // Fifth attempt exhausts the budget.
    ctx.sender.push_outcome(SendResult::ok(500));
    ctx.worker.poll_once().await.unwrap();
    let updated = ctx.store.get_delivery(delivery.id).await.unwrap().unwrap();
    assert_eq!(updated.status, dalston_core::DeliveryStatus::Failed);
    assert_eq!(updated.attempts, MAX_ATTEMPTS);
    assert!(updated.next_retry_at.is_none());
}

#[tokio::test]
async fn chronic_failures_auto_disable_the_endpoint() {
    let ctx = setup();
    let endpoint = seed_endpoint(&ctx).await;

    // Ten deliveries, each exhausting its five attempts.
    for i in 0..10 {
        let mut delivery = due_delivery(&ctx, Some(&endpoint));
        delivery.event_type = format!("transcription.completed-{i}");
        ctx.store.create_delivery(delivery.clone()).await.unwrap();

        for _ in 0..5 {
            ctx.sender.push_outcome(SendResult::failed("connection refused"));
            ctx.worker.poll_once().await.unwrap();
            ctx.clock.advance(std::time::Duration::from_secs(3600));
        }
        assert_eq!(
            ctx.store.get_delivery(delivery.id).await.unwrap().unwrap().status,
            dalston_core::DeliveryStatus::Failed
        );
    }

    let endpoint = ctx.store.get_endpoint(endpoint.id).await.unwrap().unwrap();
    assert_eq!(endpoint.consecutive_failures, 10);
    assert!(!endpoint.is_active);
    assert_eq!(endpoint.disabled_reason.as_deref(), Some(AUTO_DISABLED_REASON));
}

#[tokio::test]
async fn recent_success_prevents_auto_disable() {
    let ctx = setup();
    let endpoint = seed_endpoint(&ctx).await;
    ctx.store.record_endpoint_success(endpoint.id, ctx.clock.now_utc()).await.unwrap();

    for _ in 0..10 {
        ctx.store.increment_endpoint_failures(endpoint.id).await.unwrap();
    }
    let mut delivery = due_delivery(&ctx, Some(&endpoint));
    delivery.attempts = MAX_ATTEMPTS - 1;
    ctx.store.create_delivery(delivery).await.unwrap();

    ctx.sender.push_outcome(SendResult::failed("refused"));
    ctx.worker.poll_once().await.unwrap();

    let endpoint = ctx.store.get_endpoint(endpoint.id).await.unwrap().unwrap();
    // Eleven consecutive failures, but the success was minutes ago.
    assert!(endpoint.is_active);
}

#[tokio::test]
async fn missing_endpoint_fails_the_delivery_without_sending() {
    let ctx = setup();
    let endpoint = seed_endpoint(&ctx).await;
    let delivery = due_delivery(&ctx, Some(&endpoint));
    ctx.store.create_delivery(delivery.clone()).await.unwrap();
    ctx.store.delete_endpoint(endpoint.id).await.unwrap();

    ctx.worker.poll_once().await.unwrap();

    let updated = ctx.store.get_delivery(delivery.id).await.unwrap().unwrap();
    assert_eq!(updated.status, dalston_core::DeliveryStatus::Failed);
    assert!(ctx.sender.calls().is_empty());
}

#[tokio::test]
async fn deliveries_not_yet_due_are_untouched() {
    let ctx = setup();
    let mut delivery = due_delivery(&ctx, None);
    delivery.next_retry_at = Some(ctx.clock.now_utc() + chrono::Duration::seconds(60));
    ctx.store.create_delivery(delivery.clone()).await.unwrap();

    ctx.worker.poll_once().await.unwrap();
    assert_eq!(ctx.store.get_delivery(delivery.id).await.unwrap().unwrap().attempts, 0);
}
