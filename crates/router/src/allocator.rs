// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Least-loaded session allocation.

use crate::error::RouterError;
use dalston_adapters::{SessionRecord, SessionRecordStatus, WorkerRegistry};
use dalston_core::{Clock, SessionId, WorkerInfo};
use std::sync::Arc;
use std::time::Duration;

/// Session records live this long between keepalive renewals.
pub const SESSION_TTL: Duration = Duration::from_secs(300);

/// Ended records linger briefly for debugging.
pub const ENDED_SESSION_TTL: Duration = Duration::from_secs(60);

/// Result of a successful allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerAllocation {
    pub worker_id: dalston_core::WorkerId,
    /// WebSocket endpoint the client is proxied to.
    pub endpoint: String,
    pub session_id: SessionId,
    pub engine: String,
}

pub struct SessionAllocator<R, C> {
    registry: Arc<R>,
    clock: C,
}

impl<R, C> SessionAllocator<R, C>
where
    R: WorkerRegistry,
    C: Clock,
{
    pub fn new(registry: Arc<R>, clock: C) -> Self {
        Self { registry, clock }
    }

    /// Reserve a slot on the least-loaded worker that can serve the
    /// request. Returns `None` when no worker has capacity.
    ///
    /// The counter increment is the reservation; a concurrent allocation
    /// that pushes a worker past capacity is rolled back and the next
    /// candidate tried.
    pub async fn acquire(
        &self,
        language: &str,
        model: Option<&str>,
        client_ip: &str,
        enhance_on_end: bool,
    ) -> Result<Option<WorkerAllocation>, RouterError> {
        let mut candidates: Vec<WorkerInfo> = Vec::new();
        for id in self.registry.worker_ids().await? {
            if let Some(worker) = self.registry.get_worker(&id).await? {
                if worker.is_available_for(model, language) {
                    candidates.push(worker);
                }
            }
        }
        if candidates.is_empty() {
            tracing::warn!(model = model.unwrap_or("any"), language, "no workers available");
            return Ok(None);
        }
        candidates.sort_by(|a, b| b.available_capacity().cmp(&a.available_capacity()));

        for worker in candidates {
            let new_count = self.registry.incr_active_sessions(&worker.worker_id).await?;
            if new_count > worker.capacity {
                // Raced another allocation; give the slot back.
                self.registry.decr_active_sessions(&worker.worker_id).await?;
                tracing::warn!(worker_id = %worker.worker_id, "worker at capacity, rolled back");
                continue;
            }

            let session_id = SessionId::mint();
            let record = SessionRecord {
                session_id: session_id.clone(),
                worker_id: worker.worker_id.clone(),
                status: SessionRecordStatus::Active,
                language: language.to_string(),
                model: model.map(str::to_string),
                client_ip: client_ip.to_string(),
                started_at: self.clock.now_utc(),
                enhance_on_end,
            };
            self.registry.put_session_record(record, SESSION_TTL).await?;
            self.registry.add_worker_session(&worker.worker_id, &session_id).await?;
            self.registry.add_active_session(&session_id).await?;

            tracing::info!(
                session_id = %session_id,
                worker_id = %worker.worker_id,
                active = new_count,
                capacity = worker.capacity,
                "session allocated"
            );
            return Ok(Some(WorkerAllocation {
                worker_id: worker.worker_id,
                endpoint: worker.endpoint,
                session_id,
                engine: worker.engine,
            }));
        }

        Ok(None)
    }

    /// Release a session's slot and membership; the record stays around
    /// briefly as `ended`. Returns the state prior to release.
    pub async fn release(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<SessionRecord>, RouterError> {
        let Some(record) = self.registry.get_session_record(session_id).await? else {
            tracing::warn!(session_id = %session_id, "release for unknown session");
            return Ok(None);
        };

        self.registry.decr_active_sessions(&record.worker_id).await?;
        self.registry.remove_worker_session(&record.worker_id, session_id).await?;
        self.registry.remove_active_session(session_id).await?;
        self.registry.mark_session_ended(session_id, ENDED_SESSION_TTL).await?;

        tracing::info!(
            session_id = %session_id,
            worker_id = %record.worker_id,
            "session released"
        );
        Ok(Some(record))
    }
}

#[cfg(test)]
#[path = "allocator_tests.rs"]
mod tests;
