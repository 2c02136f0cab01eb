// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    ok_200 = { Some(200), true },
    created_201 = { Some(201), true },
    edge_299 = { Some(299), true },
    redirect_300 = { Some(300), false },
    not_found_404 = { Some(404), false },
    server_error_500 = { Some(500), false },
    no_response = { None, false },
)]
fn success_means_a_2xx_status(status: Option<u16>, expected: bool) {
    let result = SendResult { status, error: None };
    assert_eq!(result.is_success(), expected);
}

#[test]
fn failed_outcomes_carry_the_error() {
    let result = SendResult::failed("timeout");
    assert!(!result.is_success());
    assert_eq!(result.status, None);
    assert_eq!(result.error.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn fake_sender_scripts_outcomes_in_order() {
    let sender = FakeWebhookSender::new();
    sender.push_outcome(SendResult::ok(503));

    let first = sender
        .send("https://example.com/hook", "{}".to_string(), vec![])
        .await;
    assert_eq!(first.status, Some(503));

    // Unscripted sends succeed.
    let second = sender
        .send("https://example.com/hook", "{}".to_string(), vec![])
        .await;
    assert_eq!(second.status, Some(200));

    let calls = sender.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].url, "https://example.com/hook");
}
