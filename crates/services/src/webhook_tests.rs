// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dalston_adapters::FakeWebhookSender;
use dalston_core::FakeClock;

fn service() -> WebhookService<FakeClock> {
    WebhookService::new("global-secret", FakeClock::new())
}

#[tokio::test]
async fn payload_includes_metadata_and_truncates_text() {
    let service = service();
    let long_text = "a".repeat(600);
    let payload = service.build_payload(
        "transcription.completed",
        JobId::from_u128(1),
        "completed",
        Some(&long_text),
        Some(12.5),
        None,
        Some(serde_json::json!({"order": 7})),
    );
    assert_eq!(payload.text.as_ref().map(String::len), Some(500));
    assert_eq!(payload.duration, Some(12.5));
    assert_eq!(payload.webhook_metadata, Some(serde_json::json!({"order": 7})));

    let json = serde_json::to_value(&payload).unwrap();
    assert_eq!(json["event"], "transcription.completed");
    assert!(json.get("error").is_none());
}

#[test]
fn signature_is_stable_and_prefixed() {
    let service = service();
    let sig = service.sign_payload(r#"{"event":"x"}"#, 1_700_000_000, None).unwrap();
    assert!(sig.starts_with("sha256="));
    assert_eq!(sig.len(), "sha256=".len() + 64);
    // Deterministic for identical input.
    assert_eq!(sig, service.sign_payload(r#"{"event":"x"}"#, 1_700_000_000, None).unwrap());
    // Different secret, different signature.
    let other = service.sign_payload(r#"{"event":"x"}"#, 1_700_000_000, Some("other")).unwrap();
    assert_ne!(sig, other);
}

#[tokio::test]
async fn deliver_signs_and_posts() {
    let service = service();
    let sender = FakeWebhookSender::new();
    let delivery_id = DeliveryId::from_u128(9);

    let (ok, status, error) = service
        .deliver(
            &sender,
            "https://example.com/hook",
            &serde_json::json!({"event": "transcription.completed"}),
            Some("endpoint-secret"),
            Some(delivery_id),
        )
        .await;
    assert!(ok);
    assert_eq!(status, Some(200));
    assert!(error.is_none());

    let calls = sender.calls();
    assert_eq!(calls.len(), 1);
    let headers: std::collections::HashMap<_, _> =
        calls[0].headers.iter().cloned().collect();
    assert!(headers[SIGNATURE_HEADER].starts_with("sha256="));
    assert_eq!(headers[WEBHOOK_ID_HEADER], delivery_id.to_string());
    assert!(headers.contains_key(TIMESTAMP_HEADER));
}

#[tokio::test]
async fn deliver_maps_http_errors() {
    let service = service();
    let sender = FakeWebhookSender::new();
    sender.push_outcome(dalston_adapters::SendResult::ok(503));

    let (ok, status, error) = service
        .deliver(&sender, "https://example.com/hook", &serde_json::json!({}), None, None)
        .await;
    assert!(!ok);
    assert_eq!(status, Some(503));
    assert_eq!(error.as_deref(), Some("HTTP 503"));
}

#[tokio::test]
async fn invalid_urls_fail_without_sending() {
    let service = service();
    let sender = FakeWebhookSender::new();

    let (ok, status, error) =
        service.deliver(&sender, "ftp://example.com", &serde_json::json!({}), None, None).await;
    assert!(!ok);
    assert_eq!(status, None);
    assert!(error.is_some());
    assert!(sender.calls().is_empty());
}

#[tokio::test]
async fn private_ip_literals_are_rejected() {
    for url in ["http://10.0.0.8/hook", "http://192.168.1.1/hook", "http://169.254.1.1/x"] {
        let err = validate_webhook_url(url, false).await.unwrap_err();
        assert!(err.is_validation(), "{url} should be rejected");
    }
}

#[tokio::test]
async fn localhost_is_allowed_for_development() {
    validate_webhook_url("http://localhost:9999/hook", false).await.unwrap();
    validate_webhook_url("http://127.0.0.1/hook", false).await.unwrap();
}

#[tokio::test]
async fn allow_private_skips_the_guard() {
    validate_webhook_url("http://10.1.2.3/hook", true).await.unwrap();
}
