// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn wildcard_endpoint_matches_everything() {
    let endpoint = WebhookEndpoint::builder().build();
    assert!(endpoint.matches_event(EVENT_TRANSCRIPTION_COMPLETED));
    assert!(endpoint.matches_event(EVENT_TRANSCRIPTION_FAILED));
}

#[test]
fn specific_subscription_only_matches_itself() {
    let endpoint = WebhookEndpoint::builder()
        .events(vec![EVENT_TRANSCRIPTION_COMPLETED.to_string()])
        .build();
    assert!(endpoint.matches_event(EVENT_TRANSCRIPTION_COMPLETED));
    assert!(!endpoint.matches_event(EVENT_TRANSCRIPTION_FAILED));
}

#[test]
fn delivery_defaults_to_pending() {
    let delivery = WebhookDelivery::builder().build();
    assert_eq!(delivery.status, DeliveryStatus::Pending);
    assert_eq!(delivery.attempts, 0);
    assert!(delivery.endpoint_id.is_none());
    assert!(delivery.url_override.is_none());
}
