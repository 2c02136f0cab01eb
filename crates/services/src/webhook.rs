// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook payloads, signing, URL validation and the send path.
//!
//! Payloads are signed `sha256=HMAC(secret, "{timestamp}.{json}")` and
//! carry the signature, timestamp and delivery id as headers so receivers
//! can verify and dedup. Outbound URLs are checked against private
//! address space before anything leaves the process.

use crate::error::ServiceError;
use dalston_adapters::{SendResult, WebhookSender};
use dalston_core::{Clock, DeliveryId, JobId};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::net::IpAddr;

pub const SIGNATURE_HEADER: &str = "X-Dalston-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Dalston-Timestamp";
pub const WEBHOOK_ID_HEADER: &str = "X-Dalston-Webhook-Id";

/// Transcript preview length included in payloads.
pub const TEXT_PREVIEW_CHARS: usize = 500;

/// Notification body posted to receivers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookPayload {
    pub event: String,
    pub transcription_id: String,
    pub status: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_metadata: Option<serde_json::Value>,
}

/// Whether an address must not be reached by outbound webhooks.
fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_documentation()
                || v4.is_unspecified()
                || v4.octets()[0] >= 240
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                // fc00::/7 unique local, fe80::/10 link local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Validate a webhook URL: http(s) scheme, a hostname, and no resolution
/// into private or loopback address space unless explicitly allowed.
///
/// DNS failures pass: the delivery attempt will surface the real error.
pub async fn validate_webhook_url(url: &str, allow_private: bool) -> Result<(), ServiceError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| ServiceError::Validation(format!("invalid webhook URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ServiceError::Validation(format!(
                "invalid URL scheme: {other}. Must be http or https."
            )))
        }
    }

    let Some(host) = parsed.host_str().map(|h| h.to_string()) else {
        return Err(ServiceError::Validation("URL must have a hostname".to_string()));
    };

    if allow_private {
        return Ok(());
    }

    if matches!(host.as_str(), "localhost" | "127.0.0.1" | "::1") {
        tracing::warn!(url, "webhook URL points to localhost, only use in development");
        return Ok(());
    }

    // A literal IP skips DNS.
    if let Ok(ip) = host.trim_matches(['[', ']']).parse::<IpAddr>() {
        if is_private_ip(ip) {
            return Err(ServiceError::Validation(format!(
                "webhook URL resolves to private IP ({ip})"
            )));
        }
        return Ok(());
    }

    match tokio::net::lookup_host((host, 443)).await {
        Ok(addrs) => {
            for addr in addrs {
                if is_private_ip(addr.ip()) {
                    return Err(ServiceError::Validation(format!(
                        "webhook URL resolves to private IP ({})",
                        addr.ip()
                    )));
                }
            }
            Ok(())
        }
        Err(_) => Ok(()),
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

/// Builds, signs and sends webhook notifications.
pub struct WebhookService<C> {
    /// Global secret used for per-job webhooks without a registered
    /// endpoint.
    secret: String,
    clock: C,
    /// Skip the private-address guard (local development).
    allow_private_urls: bool,
}

impl<C: Clock> WebhookService<C> {
    pub fn new(secret: impl Into<String>, clock: C) -> Self {
        Self { secret: secret.into(), clock, allow_private_urls: false }
    }

    pub fn with_private_urls_allowed(mut self) -> Self {
        self.allow_private_urls = true;
        self
    }

    pub fn global_secret(&self) -> &str {
        &self.secret
    }

    pub fn build_payload(
        &self,
        event: &str,
        job_id: JobId,
        status: &str,
        text: Option<&str>,
        duration: Option<f64>,
        error: Option<&str>,
        webhook_metadata: Option<serde_json::Value>,
    ) -> WebhookPayload {
        let text = text.map(|t| match t.char_indices().nth(TEXT_PREVIEW_CHARS) {
            Some((idx, _)) => t[..idx].to_string(),
            None => t.to_string(),
        });
        WebhookPayload {
            event: event.to_string(),
            transcription_id: job_id.to_string(),
            status: status.to_string(),
            timestamp: self.clock.now_utc().to_rfc3339(),
            text,
            duration,
            error: error.map(str::to_string),
            webhook_metadata,
        }
    }

    /// `sha256=<hex>` over `"{timestamp}.{payload_json}"`.
    pub fn sign_payload(
        &self,
        payload_json: &str,
        timestamp: u64,
        secret: Option<&str>,
    ) -> Result<String, ServiceError> {
        let secret = secret.unwrap_or(&self.secret);
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .map_err(|e| ServiceError::Validation(format!("invalid signing secret: {e}")))?;
        mac.update(format!("{timestamp}.{payload_json}").as_bytes());
        Ok(format!("sha256={}", to_hex(&mac.finalize().into_bytes())))
    }

    /// One delivery attempt: validate, sign, send.
    ///
    /// Returns `(success, status_code, error)`; retry scheduling belongs
    /// to the delivery worker's durable state, not to this call.
    pub async fn deliver<H: WebhookSender>(
        &self,
        sender: &H,
        url: &str,
        payload: &serde_json::Value,
        secret: Option<&str>,
        delivery_id: Option<DeliveryId>,
    ) -> (bool, Option<u16>, Option<String>) {
        if let Err(e) = validate_webhook_url(url, self.allow_private_urls).await {
            tracing::error!(url, error = %e, "webhook URL validation failed");
            return (false, None, Some(e.to_string()));
        }

        let payload_json = payload.to_string();
        let timestamp = self.clock.epoch_ms() / 1000;
        let signature = match self.sign_payload(&payload_json, timestamp, secret) {
            Ok(s) => s,
            Err(e) => return (false, None, Some(e.to_string())),
        };

        let mut headers = vec![
            (SIGNATURE_HEADER.to_string(), signature),
            (TIMESTAMP_HEADER.to_string(), timestamp.to_string()),
        ];
        if let Some(id) = delivery_id {
            headers.push((WEBHOOK_ID_HEADER.to_string(), id.to_string()));
        }

        let result: SendResult = sender.send(url, payload_json, headers).await;
        if result.is_success() {
            (true, result.status, None)
        } else {
            let error = result
                .error
                .or_else(|| result.status.map(|s| format!("HTTP {s}")))
                .unwrap_or_else(|| "send failed".to_string());
            (false, result.status, Some(error))
        }
    }
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
