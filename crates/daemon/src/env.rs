// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

pub const WEBHOOK_SECRET_DEFAULT: &str = "dalston-webhook-secret-change-me";

/// HMAC secret for per-job webhooks without a registered endpoint.
pub fn webhook_secret() -> String {
    std::env::var("WEBHOOK_SECRET")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| WEBHOOK_SECRET_DEFAULT.to_string())
}

/// Skip the private-address guard on outbound webhooks (local dev only).
pub fn allow_private_webhook_urls() -> bool {
    std::env::var("DALSTON_ALLOW_PRIVATE_WEBHOOKS")
        .map(|s| s == "1" || s.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Recovery scanner interval override.
pub fn scan_interval() -> Option<Duration> {
    std::env::var("DALSTON_SCAN_INTERVAL_SECONDS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Identity written into the scanner's leader lease.
pub fn instance_id() -> String {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
    format!("{host}:{}", std::process::id())
}

/// Optional log directory; unset means stderr only.
pub fn log_dir() -> Option<PathBuf> {
    std::env::var("DALSTON_LOG_DIR").ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}
