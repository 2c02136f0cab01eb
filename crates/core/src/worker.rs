// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime worker identity and registry state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a realtime worker instance.
///
/// Chosen by the worker itself at registration time (for example
/// `whisper-gpu-3`) and treated as opaque everywhere else: the control
/// plane only keys registry entries and membership sets by it. The
/// derived ordering keeps worker listings stable across reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for WorkerId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Worker status as published in its heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Ready,
    Busy,
    /// Finishing current sessions, accepting no new ones.
    Draining,
    Offline,
}

crate::simple_display! {
    WorkerStatus {
        Ready => "ready",
        Busy => "busy",
        Draining => "draining",
        Offline => "offline",
    }
}

/// Language wildcard accepted by clients and advertised by workers.
pub const LANGUAGE_AUTO: &str = "auto";

/// Worker state as read from the shared registry.
///
/// Workers are the writers (via heartbeat); the session router only reads,
/// except for the `active_sessions` counter which is incremented and
/// decremented atomically during allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub worker_id: WorkerId,
    /// WebSocket endpoint clients are proxied to.
    pub endpoint: String,
    pub status: WorkerStatus,
    pub capacity: u32,
    pub active_sessions: u32,
    pub models_loaded: Vec<String>,
    pub languages_supported: Vec<String>,
    pub engine: String,
    pub gpu_memory_used: String,
    pub gpu_memory_total: String,
    pub last_heartbeat: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
}

impl WorkerInfo {
    pub fn available_capacity(&self) -> u32 {
        self.capacity.saturating_sub(self.active_sessions)
    }

    /// Whether the worker can accept a new session at all.
    pub fn accepts_sessions(&self) -> bool {
        matches!(self.status, WorkerStatus::Ready | WorkerStatus::Busy)
            && self.available_capacity() > 0
    }

    /// Whether the worker can serve a `(model, language)` request.
    ///
    /// A null model means any loaded model is acceptable. Language matches
    /// when the client asks for auto-detect, the worker lists the language,
    /// or the worker itself advertises auto.
    pub fn supports(&self, model: Option<&str>, language: &str) -> bool {
        if let Some(model) = model {
            if !self.models_loaded.iter().any(|m| m == model) {
                return false;
            }
        }
        language == LANGUAGE_AUTO
            || self.languages_supported.iter().any(|l| l == language || l == LANGUAGE_AUTO)
    }

    pub fn is_available_for(&self, model: Option<&str>, language: &str) -> bool {
        self.accepts_sessions() && self.supports(model, language)
    }
}

crate::builder! {
    pub struct WorkerInfoBuilder => WorkerInfo {
        into {
            worker_id: WorkerId = "worker-1",
            endpoint: String = "ws://worker-1:9000",
            engine: String = "whisper",
            gpu_memory_used: String = "0GB",
            gpu_memory_total: String = "0GB",
        }
        set {
            status: WorkerStatus = WorkerStatus::Ready,
            capacity: u32 = 4,
            active_sessions: u32 = 0,
            models_loaded: Vec<String> = vec!["fast".to_string()],
            languages_supported: Vec<String> = vec!["auto".to_string()],
            last_heartbeat: chrono::DateTime<chrono::Utc> = chrono::DateTime::<chrono::Utc>::MIN_UTC,
            started_at: chrono::DateTime<chrono::Utc> = chrono::DateTime::<chrono::Utc>::MIN_UTC,
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
