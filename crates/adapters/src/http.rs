// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound HTTP sender for webhook deliveries.
//!
//! The sender posts a prepared body with prepared headers and reports the
//! outcome; retry scheduling and signing live with the callers.

use async_trait::async_trait;
use std::time::Duration;

/// Outcome of a single POST attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SendResult {
    pub status: Option<u16>,
    pub error: Option<String>,
}

impl SendResult {
    pub fn ok(status: u16) -> Self {
        Self { status: Some(status), error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { status: None, error: Some(error.into()) }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_some_and(|s| (200..300).contains(&s))
    }
}

#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn send(&self, url: &str, body: String, headers: Vec<(String, String)>) -> SendResult;
}

/// Real sender over `reqwest` with a hard request timeout.
pub struct HttpWebhookSender {
    client: reqwest::Client,
}

/// Webhook receivers get this long to answer before the attempt fails.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(30);

impl HttpWebhookSender {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn send(&self, url: &str, body: String, headers: Vec<(String, String)>) -> SendResult {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(body);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        match request.send().await {
            Ok(response) => SendResult { status: Some(response.status().as_u16()), error: None },
            Err(e) if e.is_timeout() => SendResult::failed("timeout"),
            Err(e) => SendResult::failed(e.to_string()),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{SendResult, WebhookSender};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Recorded outbound request.
    #[derive(Debug, Clone)]
    pub struct SentWebhook {
        pub url: String,
        pub body: String,
        pub headers: Vec<(String, String)>,
    }

    struct FakeSenderState {
        calls: Vec<SentWebhook>,
        /// Scripted outcomes, consumed in order; empty means 200.
        outcomes: VecDeque<SendResult>,
    }

    /// Fake sender for testing delivery behavior without a network.
    #[derive(Clone)]
    pub struct FakeWebhookSender {
        inner: Arc<Mutex<FakeSenderState>>,
    }

    impl Default for FakeWebhookSender {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeSenderState {
                    calls: Vec::new(),
                    outcomes: VecDeque::new(),
                })),
            }
        }
    }

    impl FakeWebhookSender {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue the outcome of the next send.
        pub fn push_outcome(&self, outcome: SendResult) {
            self.inner.lock().outcomes.push_back(outcome);
        }

        /// Queue `n` identical outcomes.
        pub fn push_outcomes(&self, outcome: SendResult, n: usize) {
            let mut inner = self.inner.lock();
            for _ in 0..n {
                inner.outcomes.push_back(outcome.clone());
            }
        }

        pub fn calls(&self) -> Vec<SentWebhook> {
            self.inner.lock().calls.clone()
        }
    }

    #[async_trait]
    impl WebhookSender for FakeWebhookSender {
        async fn send(
            &self,
            url: &str,
            body: String,
            headers: Vec<(String, String)>,
        ) -> SendResult {
            let mut inner = self.inner.lock();
            inner.calls.push(SentWebhook { url: url.to_string(), body, headers });
            inner.outcomes.pop_front().unwrap_or_else(|| SendResult::ok(200))
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeWebhookSender, SentWebhook};

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
