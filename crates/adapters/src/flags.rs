// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Flag and lease store: TTL'd string keys, sets, and hashes.
//!
//! Carries the cancellation flags engines poll, the waiting-for-engine
//! markers, and the scanner's leader lock. Every key is self-healing via
//! its TTL; a crashed writer leaves nothing permanent behind.

use async_trait::async_trait;
use dalston_core::{Clock, JobId, TaskId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use thiserror::Error;

/// `dalston:job:cancelled:<job_id>`, set on cancellation for engines to poll.
pub const JOB_CANCELLED_KEY_PREFIX: &str = "dalston:job:cancelled:";

/// Cancellation flags outlive any plausible job run.
pub const JOB_CANCELLED_TTL: Duration = Duration::from_secs(24 * 3600);

/// Set of task ids currently parked waiting for an engine.
pub const WAITING_ENGINE_TASKS_KEY: &str = "dalston:waiting_engine_tasks";

/// Leader-election lock for the recovery scanner.
pub const SCANNER_LEADER_KEY: &str = "dalston:scanner:leader";

/// Lock TTL: twice the scan interval, so a dead leader expires quickly.
pub const SCANNER_LEADER_TTL: Duration = Duration::from_secs(120);

/// `dalston:task:<task_id>`, per-task metadata hash.
pub const TASK_META_KEY_PREFIX: &str = "dalston:task:";

pub fn job_cancelled_key(job_id: JobId) -> String {
    format!("{JOB_CANCELLED_KEY_PREFIX}{job_id}")
}

pub fn task_meta_key(task_id: TaskId) -> String {
    format!("{TASK_META_KEY_PREFIX}{task_id}")
}

#[derive(Debug, Error)]
pub enum FlagError {
    #[error("flag backend: {0}")]
    Backend(String),
}

#[async_trait]
pub trait FlagStore: Send + Sync {
    /// Set `key` to `value` with a TTL iff it is absent; the acquire half
    /// of a lease. Returns whether the key was set.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, FlagError>;

    /// Unconditional set with TTL.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration)
        -> Result<(), FlagError>;

    async fn get(&self, key: &str) -> Result<Option<String>, FlagError>;

    async fn exists(&self, key: &str) -> Result<bool, FlagError>;

    async fn delete(&self, key: &str) -> Result<(), FlagError>;

    /// Atomic compare-value-then-delete; the release half of a lease.
    async fn compare_and_delete(&self, key: &str, value: &str) -> Result<bool, FlagError>;

    /// Atomic compare-value-then-extend-TTL; lease renewal. Returns false
    /// when the lease is gone or owned by someone else.
    async fn compare_and_extend(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, FlagError>;

    async fn set_add(&self, set: &str, member: &str) -> Result<(), FlagError>;

    async fn set_remove(&self, set: &str, member: &str) -> Result<(), FlagError>;

    async fn set_members(&self, set: &str) -> Result<Vec<String>, FlagError>;

    /// Merge fields into a hash, creating it if needed.
    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> Result<(), FlagError>;

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, FlagError>;

    async fn hash_delete_fields(&self, key: &str, fields: &[&str]) -> Result<(), FlagError>;
}

#[derive(Default)]
struct Inner {
    strings: HashMap<String, (String, Option<u64>)>,
    sets: HashMap<String, HashSet<String>>,
    hashes: HashMap<String, HashMap<String, String>>,
}

/// In-memory flag store; expiry is evaluated lazily against the clock.
pub struct MemoryFlagStore<C: Clock> {
    clock: C,
    inner: Mutex<Inner>,
}

impl<C: Clock> MemoryFlagStore<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, inner: Mutex::new(Inner::default()) }
    }

    fn deadline(&self, ttl: Duration) -> u64 {
        self.clock.epoch_ms().saturating_add(ttl.as_millis() as u64)
    }

    /// Drop the key if its deadline has passed, then return liveness.
    fn live<'a>(
        &self,
        inner: &'a mut Inner,
        key: &str,
    ) -> Option<&'a mut (String, Option<u64>)> {
        let now = self.clock.epoch_ms();
        let expired =
            matches!(inner.strings.get(key), Some((_, Some(deadline))) if *deadline <= now);
        if expired {
            inner.strings.remove(key);
        }
        inner.strings.get_mut(key)
    }
}

#[async_trait]
impl<C: Clock> FlagStore for MemoryFlagStore<C> {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, FlagError> {
        let deadline = self.deadline(ttl);
        let mut inner = self.inner.lock();
        if self.live(&mut inner, key).is_some() {
            return Ok(false);
        }
        inner.strings.insert(key.to_string(), (value.to_string(), Some(deadline)));
        Ok(true)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), FlagError> {
        let deadline = self.deadline(ttl);
        self.inner
            .lock()
            .strings
            .insert(key.to_string(), (value.to_string(), Some(deadline)));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, FlagError> {
        let mut inner = self.inner.lock();
        Ok(self.live(&mut inner, key).map(|(v, _)| v.clone()))
    }

    async fn exists(&self, key: &str) -> Result<bool, FlagError> {
        let mut inner = self.inner.lock();
        Ok(self.live(&mut inner, key).is_some())
    }

    async fn delete(&self, key: &str) -> Result<(), FlagError> {
        self.inner.lock().strings.remove(key);
        Ok(())
    }

    async fn compare_and_delete(&self, key: &str, value: &str) -> Result<bool, FlagError> {
        let mut inner = self.inner.lock();
        let held = matches!(self.live(&mut inner, key), Some((current, _)) if current == value);
        if held {
            inner.strings.remove(key);
        }
        Ok(held)
    }

    async fn compare_and_extend(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, FlagError> {
        let deadline = self.deadline(ttl);
        let mut inner = self.inner.lock();
        match self.live(&mut inner, key) {
            Some((current, expiry)) if current == value => {
                *expiry = Some(deadline);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<(), FlagError> {
        self.inner.lock().sets.entry(set.to_string()).or_default().insert(member.to_string());
        Ok(())
    }

    async fn set_remove(&self, set: &str, member: &str) -> Result<(), FlagError> {
        if let Some(members) = self.inner.lock().sets.get_mut(set) {
            members.remove(member);
        }
        Ok(())
    }

    async fn set_members(&self, set: &str) -> Result<Vec<String>, FlagError> {
        let inner = self.inner.lock();
        let mut members: Vec<String> =
            inner.sets.get(set).into_iter().flatten().cloned().collect();
        members.sort();
        Ok(members)
    }

    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> Result<(), FlagError> {
        let mut inner = self.inner.lock();
        let hash = inner.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert((*field).to_string(), value.clone());
        }
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, FlagError> {
        Ok(self.inner.lock().hashes.get(key).cloned().unwrap_or_default())
    }

    async fn hash_delete_fields(&self, key: &str, fields: &[&str]) -> Result<(), FlagError> {
        let mut inner = self.inner.lock();
        if let Some(hash) = inner.hashes.get_mut(key) {
            for field in fields {
                hash.remove(*field);
            }
            if hash.is_empty() {
                inner.hashes.remove(key);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "flags_tests.rs"]
mod tests;
