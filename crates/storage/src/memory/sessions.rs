// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime session rows.

use super::MemoryStore;
use crate::error::StoreError;
use crate::store::SessionStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dalston_core::{PolicyId, RealtimeSession, SessionId, TenantId};

#[async_trait]
impl SessionStore for MemoryStore {
    async fn put_session(&self, session: RealtimeSession) -> Result<(), StoreError> {
        self.lock().sessions.insert(session.id.as_str().to_string(), session);
        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<RealtimeSession>, StoreError> {
        Ok(self.lock().sessions.get(id.as_str()).cloned())
    }

    async fn list_sessions(
        &self,
        tenant_id: TenantId,
        limit: usize,
    ) -> Result<Vec<RealtimeSession>, StoreError> {
        let inner = self.lock();
        let mut sessions: Vec<RealtimeSession> =
            inner.sessions.values().filter(|s| s.tenant_id == tenant_id).cloned().collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions.truncate(limit);
        Ok(sessions)
    }

    async fn mark_session_purged(
        &self,
        id: &SessionId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let session = inner
            .sessions
            .get_mut(id.as_str())
            .ok_or_else(|| StoreError::not_found("session", id))?;
        session.purged_at = Some(at);
        Ok(())
    }

    async fn purgeable_sessions(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RealtimeSession>, StoreError> {
        let inner = self.lock();
        let mut sessions: Vec<RealtimeSession> = inner
            .sessions
            .values()
            .filter(|s| s.purged_at.is_none() && s.purge_after.is_some_and(|p| p <= now))
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.purge_after);
        sessions.truncate(limit);
        Ok(sessions)
    }

    async fn count_sessions_using_policy(&self, policy_id: PolicyId) -> Result<u64, StoreError> {
        Ok(self
            .lock()
            .sessions
            .values()
            .filter(|s| s.retention_policy_id == Some(policy_id))
            .count() as u64)
    }
}
