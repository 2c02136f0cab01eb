// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orphaned-session reconciliation.
//!
//! A gateway crash between accept and close leaves a session counted
//! against its worker while the TTL'd record quietly expires. Walking the
//! membership sets and dropping entries whose record is gone restores the
//! lost capacity; counters clamp at zero so double cleanup is harmless.

use crate::error::RouterError;
use crate::RECONCILE_INTERVAL;
use dalston_adapters::WorkerRegistry;
use dalston_core::Clock;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct OrphanReconciler<R, C> {
    registry: Arc<R>,
    clock: C,
}

impl<R, C> OrphanReconciler<R, C>
where
    R: WorkerRegistry,
    C: Clock,
{
    pub fn new(registry: Arc<R>, clock: C) -> Self {
        Self { registry, clock }
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(RECONCILE_INTERVAL) => {
                    if let Err(e) = self.reconcile_once().await {
                        tracing::error!(error = %e, "session reconciliation failed");
                    }
                }
            }
        }
    }

    /// One pass; returns how many orphans were cleaned up.
    pub async fn reconcile_once(&self) -> Result<usize, RouterError> {
        let started = self.clock.epoch_ms();
        let mut cleaned = 0usize;

        for worker_id in self.registry.worker_ids().await? {
            for session_id in self.registry.worker_sessions(&worker_id).await? {
                if self.registry.get_session_record(&session_id).await?.is_some() {
                    continue;
                }
                // Record expired with the slot still held: an orphan.
                self.registry.decr_active_sessions(&worker_id).await?;
                self.registry.remove_worker_session(&worker_id, &session_id).await?;
                self.registry.remove_active_session(&session_id).await?;
                cleaned += 1;
                tracing::warn!(
                    session_id = %session_id,
                    worker_id = %worker_id,
                    "reconciled orphaned session"
                );
            }
        }

        // Entries in the global index with no record and no owning
        // worker: membership only, no counter to repair.
        for session_id in self.registry.active_session_ids().await? {
            if self.registry.get_session_record(&session_id).await?.is_none() {
                self.registry.remove_active_session(&session_id).await?;
                cleaned += 1;
                tracing::warn!(session_id = %session_id, "dropped stale active-session entry");
            }
        }

        if cleaned > 0 {
            tracing::info!(
                cleaned,
                elapsed_ms = self.clock.epoch_ms().saturating_sub(started),
                "session reconciliation complete"
            );
        }
        Ok(cleaned)
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
