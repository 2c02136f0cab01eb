// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared registries: realtime workers and batch engines.
//!
//! Workers and engines are the writers (heartbeats); the control plane
//! reads, except for the per-worker session counter which allocation
//! adjusts atomically. Session records carry a short TTL renewed by
//! keepalive, so a crashed gateway leaves only records that expire on
//! their own — the orphan reconciler turns those expiries back into
//! capacity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dalston_core::{Clock, SessionId, WorkerId, WorkerInfo};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use thiserror::Error;

/// Engine heartbeats older than this mean the engine is dead.
pub const ENGINE_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry backend: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRecordStatus {
    Active,
    Ended,
}

/// Ephemeral session state in the registry (distinct from the persistent
/// session row in the state store).
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub worker_id: WorkerId,
    pub status: SessionRecordStatus,
    pub language: String,
    pub model: Option<String>,
    pub client_ip: String,
    pub started_at: DateTime<Utc>,
    pub enhance_on_end: bool,
}

#[async_trait]
pub trait WorkerRegistry: Send + Sync {
    async fn worker_ids(&self) -> Result<Vec<WorkerId>, RegistryError>;

    async fn get_worker(&self, id: &WorkerId) -> Result<Option<WorkerInfo>, RegistryError>;

    /// Heartbeat write; whole-state upsert keyed by worker id.
    async fn put_worker(&self, info: WorkerInfo) -> Result<(), RegistryError>;

    async fn mark_worker_offline(&self, id: &WorkerId) -> Result<(), RegistryError>;

    /// Atomically bump the worker's session counter; returns the new
    /// value so allocation can detect a capacity race.
    async fn incr_active_sessions(&self, id: &WorkerId) -> Result<u32, RegistryError>;

    /// Decrement, clamped at zero; returns the new value.
    async fn decr_active_sessions(&self, id: &WorkerId) -> Result<u32, RegistryError>;

    async fn worker_sessions(&self, id: &WorkerId) -> Result<Vec<SessionId>, RegistryError>;

    async fn add_worker_session(
        &self,
        id: &WorkerId,
        session: &SessionId,
    ) -> Result<(), RegistryError>;

    async fn remove_worker_session(
        &self,
        id: &WorkerId,
        session: &SessionId,
    ) -> Result<(), RegistryError>;

    /// Global index of sessions believed active.
    async fn active_session_ids(&self) -> Result<Vec<SessionId>, RegistryError>;

    async fn add_active_session(&self, session: &SessionId) -> Result<(), RegistryError>;

    async fn remove_active_session(&self, session: &SessionId) -> Result<(), RegistryError>;

    async fn put_session_record(
        &self,
        record: SessionRecord,
        ttl: Duration,
    ) -> Result<(), RegistryError>;

    /// Expired records read back as `None`.
    async fn get_session_record(
        &self,
        session: &SessionId,
    ) -> Result<Option<SessionRecord>, RegistryError>;

    /// Flip the record to `Ended` with a short debug TTL.
    async fn mark_session_ended(
        &self,
        session: &SessionId,
        ttl: Duration,
    ) -> Result<(), RegistryError>;

    /// Keepalive renewal; returns false when the record already expired.
    async fn extend_session_ttl(
        &self,
        session: &SessionId,
        ttl: Duration,
    ) -> Result<bool, RegistryError>;
}

/// Batch engine heartbeat probe used by dispatch and recovery.
#[async_trait]
pub trait EngineRegistry: Send + Sync {
    /// Heartbeat write from an engine process.
    async fn record_heartbeat(
        &self,
        engine_id: &str,
        online: bool,
    ) -> Result<(), RegistryError>;

    /// True when the engine has a fresh heartbeat and isn't offline.
    async fn is_engine_alive(&self, engine_id: &str) -> Result<bool, RegistryError>;
}

#[derive(Default)]
struct WorkerInner {
    workers: HashMap<WorkerId, WorkerInfo>,
    worker_sessions: HashMap<WorkerId, HashSet<SessionId>>,
    active_sessions: HashSet<SessionId>,
    /// Session records with their expiry deadline (epoch ms).
    records: HashMap<SessionId, (SessionRecord, u64)>,
}

/// In-memory worker registry.
pub struct MemoryWorkerRegistry<C: Clock> {
    clock: C,
    inner: Mutex<WorkerInner>,
}

impl<C: Clock> MemoryWorkerRegistry<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, inner: Mutex::new(WorkerInner::default()) }
    }

    fn expire_record(&self, inner: &mut WorkerInner, session: &SessionId) {
        let now = self.clock.epoch_ms();
        let expired = matches!(inner.records.get(session), Some((_, deadline)) if *deadline <= now);
        if expired {
            inner.records.remove(session);
        }
    }
}

#[async_trait]
impl<C: Clock> WorkerRegistry for MemoryWorkerRegistry<C> {
    async fn worker_ids(&self) -> Result<Vec<WorkerId>, RegistryError> {
        let inner = self.inner.lock();
        let mut ids: Vec<WorkerId> = inner.workers.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn get_worker(&self, id: &WorkerId) -> Result<Option<WorkerInfo>, RegistryError> {
        Ok(self.inner.lock().workers.get(id).cloned())
    }

    async fn put_worker(&self, info: WorkerInfo) -> Result<(), RegistryError> {
        self.inner.lock().workers.insert(info.worker_id.clone(), info);
        Ok(())
    }

    async fn mark_worker_offline(&self, id: &WorkerId) -> Result<(), RegistryError> {
        if let Some(worker) = self.inner.lock().workers.get_mut(id) {
            worker.status = dalston_core::WorkerStatus::Offline;
        }
        Ok(())
    }

    async fn incr_active_sessions(&self, id: &WorkerId) -> Result<u32, RegistryError> {
        let mut inner = self.inner.lock();
        let worker = inner
            .workers
            .get_mut(id)
            .ok_or_else(|| RegistryError::Backend(format!("unknown worker {id}")))?;
        worker.active_sessions += 1;
        Ok(worker.active_sessions)
    }

    async fn decr_active_sessions(&self, id: &WorkerId) -> Result<u32, RegistryError> {
        let mut inner = self.inner.lock();
        let worker = inner
            .workers
            .get_mut(id)
            .ok_or_else(|| RegistryError::Backend(format!("unknown worker {id}")))?;
        worker.active_sessions = worker.active_sessions.saturating_sub(1);
        Ok(worker.active_sessions)
    }

    async fn worker_sessions(&self, id: &WorkerId) -> Result<Vec<SessionId>, RegistryError> {
        let inner = self.inner.lock();
        let mut sessions: Vec<SessionId> =
            inner.worker_sessions.get(id).into_iter().flatten().cloned().collect();
        sessions.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(sessions)
    }

    async fn add_worker_session(
        &self,
        id: &WorkerId,
        session: &SessionId,
    ) -> Result<(), RegistryError> {
        self.inner
            .lock()
            .worker_sessions
            .entry(id.clone())
            .or_default()
            .insert(session.clone());
        Ok(())
    }

    async fn remove_worker_session(
        &self,
        id: &WorkerId,
        session: &SessionId,
    ) -> Result<(), RegistryError> {
        if let Some(sessions) = self.inner.lock().worker_sessions.get_mut(id) {
            sessions.remove(session);
        }
        Ok(())
    }

    async fn active_session_ids(&self) -> Result<Vec<SessionId>, RegistryError> {
        let inner = self.inner.lock();
        let mut ids: Vec<SessionId> = inner.active_sessions.iter().cloned().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(ids)
    }

    async fn add_active_session(&self, session: &SessionId) -> Result<(), RegistryError> {
        self.inner.lock().active_sessions.insert(session.clone());
        Ok(())
    }

    async fn remove_active_session(&self, session: &SessionId) -> Result<(), RegistryError> {
        self.inner.lock().active_sessions.remove(session);
        Ok(())
    }

    async fn put_session_record(
        &self,
        record: SessionRecord,
        ttl: Duration,
    ) -> Result<(), RegistryError> {
        let deadline = self.clock.epoch_ms().saturating_add(ttl.as_millis() as u64);
        self.inner.lock().records.insert(record.session_id.clone(), (record, deadline));
        Ok(())
    }

    async fn get_session_record(
        &self,
        session: &SessionId,
    ) -> Result<Option<SessionRecord>, RegistryError> {
        let mut inner = self.inner.lock();
        self.expire_record(&mut inner, session);
        Ok(inner.records.get(session).map(|(r, _)| r.clone()))
    }

    async fn mark_session_ended(
        &self,
        session: &SessionId,
        ttl: Duration,
    ) -> Result<(), RegistryError> {
        let deadline = self.clock.epoch_ms().saturating_add(ttl.as_millis() as u64);
        let mut inner = self.inner.lock();
        self.expire_record(&mut inner, session);
        if let Some((record, expiry)) = inner.records.get_mut(session) {
            record.status = SessionRecordStatus::Ended;
            *expiry = deadline;
        }
        Ok(())
    }

    async fn extend_session_ttl(
        &self,
        session: &SessionId,
        ttl: Duration,
    ) -> Result<bool, RegistryError> {
        let deadline = self.clock.epoch_ms().saturating_add(ttl.as_millis() as u64);
        let mut inner = self.inner.lock();
        self.expire_record(&mut inner, session);
        match inner.records.get_mut(session) {
            Some((_, expiry)) => {
                *expiry = deadline;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

struct EngineState {
    online: bool,
    last_heartbeat_ms: u64,
}

/// In-memory engine registry.
pub struct MemoryEngineRegistry<C: Clock> {
    clock: C,
    engines: Mutex<HashMap<String, EngineState>>,
}

impl<C: Clock> MemoryEngineRegistry<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, engines: Mutex::new(HashMap::new()) }
    }
}

#[async_trait]
impl<C: Clock> EngineRegistry for MemoryEngineRegistry<C> {
    async fn record_heartbeat(&self, engine_id: &str, online: bool) -> Result<(), RegistryError> {
        self.engines.lock().insert(
            engine_id.to_string(),
            EngineState { online, last_heartbeat_ms: self.clock.epoch_ms() },
        );
        Ok(())
    }

    async fn is_engine_alive(&self, engine_id: &str) -> Result<bool, RegistryError> {
        let engines = self.engines.lock();
        let Some(state) = engines.get(engine_id) else {
            return Ok(false);
        };
        if !state.online {
            return Ok(false);
        }
        let age = self.clock.epoch_ms().saturating_sub(state.last_heartbeat_ms);
        Ok(age < ENGINE_HEARTBEAT_TIMEOUT.as_millis() as u64)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
