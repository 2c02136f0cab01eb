// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker health monitoring via heartbeat age.

use crate::error::RouterError;
use dalston_adapters::{EventBus, WorkerRegistry};
use dalston_core::{Clock, Event, WorkerStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Seconds between health checks.
pub const CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Heartbeats older than this mark the worker offline.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HealthMonitor<R, B, C> {
    registry: Arc<R>,
    bus: Arc<B>,
    clock: C,
}

impl<R, B, C> HealthMonitor<R, B, C>
where
    R: WorkerRegistry,
    B: EventBus,
    C: Clock,
{
    pub fn new(registry: Arc<R>, bus: Arc<B>, clock: C) -> Self {
        Self { registry, bus, clock }
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!("health monitor started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(CHECK_INTERVAL) => {
                    if let Err(e) = self.check_once().await {
                        tracing::error!(error = %e, "health check failed");
                    }
                }
            }
        }
        tracing::info!("health monitor stopped");
    }

    /// Mark silent workers offline and announce each affected session so
    /// the gateway can notify its clients.
    pub async fn check_once(&self) -> Result<(), RouterError> {
        let now = self.clock.now_utc();

        for worker_id in self.registry.worker_ids().await? {
            let Some(worker) = self.registry.get_worker(&worker_id).await? else {
                continue;
            };
            if worker.status == WorkerStatus::Offline {
                continue;
            }

            let age = now - worker.last_heartbeat;
            if age <= chrono::Duration::from_std(HEARTBEAT_TIMEOUT).unwrap_or_default() {
                continue;
            }

            tracing::warn!(
                worker_id = %worker_id,
                heartbeat_age_s = age.num_seconds(),
                "worker heartbeat stale, marking offline"
            );
            self.registry.mark_worker_offline(&worker_id).await?;

            for session_id in self.registry.worker_sessions(&worker_id).await? {
                self.bus
                    .publish(&Event::WorkerOffline {
                        worker_id: worker_id.clone(),
                        session_id: session_id.clone(),
                    })
                    .await?;
                tracing::info!(
                    worker_id = %worker_id,
                    session_id = %session_id,
                    "published worker.offline"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
