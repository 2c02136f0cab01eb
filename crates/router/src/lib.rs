// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session router: realtime worker allocation and health.
//!
//! Gateways call [`SessionRouter::acquire`]/[`SessionRouter::release`]
//! around each WebSocket session; the health monitor turns silent workers
//! into `worker.offline` events, and the orphan reconciler returns the
//! capacity a crashed gateway left behind.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod allocator;
pub mod error;
pub mod health;
pub mod reconcile;

use dalston_adapters::{EventBus, SessionRecord, WorkerRegistry};
use dalston_core::{Clock, SessionId, WorkerInfo, WorkerStatus};
use error::RouterError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub use allocator::{SessionAllocator, WorkerAllocation, ENDED_SESSION_TTL, SESSION_TTL};
pub use health::HealthMonitor;
pub use reconcile::OrphanReconciler;

/// Capacity roll-up for management APIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityInfo {
    pub total_capacity: u32,
    pub used_capacity: u32,
    pub available_capacity: u32,
    pub worker_count: usize,
    pub ready_workers: usize,
}

/// Facade wiring the allocator, health monitor and reconciler together.
pub struct SessionRouter<R, B, C: Clock> {
    registry: Arc<R>,
    allocator: SessionAllocator<R, C>,
    health: HealthMonitor<R, B, C>,
    reconciler: OrphanReconciler<R, C>,
}

impl<R, B, C> SessionRouter<R, B, C>
where
    R: WorkerRegistry,
    B: EventBus,
    C: Clock,
{
    pub fn new(registry: Arc<R>, bus: Arc<B>, clock: C) -> Self {
        Self {
            registry: registry.clone(),
            allocator: SessionAllocator::new(registry.clone(), clock.clone()),
            health: HealthMonitor::new(registry.clone(), bus, clock.clone()),
            reconciler: OrphanReconciler::new(registry, clock),
        }
    }

    /// Run the background loops until shutdown. Reconciles once at
    /// startup so a restarted gateway starts from honest counters.
    pub async fn run(&self, shutdown: CancellationToken) {
        if let Err(e) = self.reconciler.reconcile_once().await {
            tracing::error!(error = %e, "startup session reconciliation failed");
        }
        tokio::join!(self.health.run(shutdown.clone()), self.reconciler.run(shutdown));
    }

    pub async fn acquire(
        &self,
        language: &str,
        model: Option<&str>,
        client_ip: &str,
        enhance_on_end: bool,
    ) -> Result<Option<WorkerAllocation>, RouterError> {
        self.allocator.acquire(language, model, client_ip, enhance_on_end).await
    }

    pub async fn release(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<SessionRecord>, RouterError> {
        self.allocator.release(session_id).await
    }

    pub async fn get_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<SessionRecord>, RouterError> {
        Ok(self.registry.get_session_record(session_id).await?)
    }

    /// Keepalive renewal from the gateway's ping loop.
    pub async fn touch_session(&self, session_id: &SessionId) -> Result<bool, RouterError> {
        Ok(self.registry.extend_session_ttl(session_id, SESSION_TTL).await?)
    }

    pub async fn list_workers(&self) -> Result<Vec<WorkerInfo>, RouterError> {
        let mut workers = Vec::new();
        for id in self.registry.worker_ids().await? {
            if let Some(worker) = self.registry.get_worker(&id).await? {
                workers.push(worker);
            }
        }
        Ok(workers)
    }

    pub async fn capacity(&self) -> Result<CapacityInfo, RouterError> {
        let workers = self.list_workers().await?;
        let total: u32 = workers.iter().map(|w| w.capacity).sum();
        let used: u32 = workers.iter().map(|w| w.active_sessions).sum();
        Ok(CapacityInfo {
            total_capacity: total,
            used_capacity: used,
            available_capacity: total.saturating_sub(used),
            worker_count: workers.len(),
            ready_workers: workers
                .iter()
                .filter(|w| matches!(w.status, WorkerStatus::Ready | WorkerStatus::Busy))
                .count(),
        })
    }
}

/// Interval between reconciler passes.
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(60);
