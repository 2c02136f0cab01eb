// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-local counters surfaced for health reporting.
//!
//! Audit writes are fail-open, so their failures must be observable
//! somewhere other than the audit trail itself.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: ProcessMetrics = ProcessMetrics::new();

/// Monotonic counters updated across the control plane.
pub struct ProcessMetrics {
    audit_write_failures: AtomicU64,
    scanner_sweeps: AtomicU64,
    tasks_timed_out: AtomicU64,
    tasks_failed_engine_dead: AtomicU64,
}

impl ProcessMetrics {
    pub const fn new() -> Self {
        Self {
            audit_write_failures: AtomicU64::new(0),
            scanner_sweeps: AtomicU64::new(0),
            tasks_timed_out: AtomicU64::new(0),
            tasks_failed_engine_dead: AtomicU64::new(0),
        }
    }

    pub fn inc_audit_write_failures(&self) {
        self.audit_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_scanner_sweeps(&self) {
        self.scanner_sweeps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tasks_timed_out(&self) {
        self.tasks_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tasks_failed_engine_dead(&self) {
        self.tasks_failed_engine_dead.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            audit_write_failures: self.audit_write_failures.load(Ordering::Relaxed),
            scanner_sweeps: self.scanner_sweeps.load(Ordering::Relaxed),
            tasks_timed_out: self.tasks_timed_out.load(Ordering::Relaxed),
            tasks_failed_engine_dead: self.tasks_failed_engine_dead.load(Ordering::Relaxed),
        }
    }
}

impl Default for ProcessMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of [`ProcessMetrics`] for status reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub audit_write_failures: u64,
    pub scanner_sweeps: u64,
    pub tasks_timed_out: u64,
    pub tasks_failed_engine_dead: u64,
}
