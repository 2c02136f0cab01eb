// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable task queue with consumer-group delivery.
//!
//! One append-only stream per base stage, one consumer group (`engines`),
//! at-least-once semantics: a claimed message sits in the claiming
//! consumer's pending-entries list (PEL) until acknowledged, and can be
//! reclaimed after going idle. Per-channel stages share their base
//! stream so a single engine pool serves every channel.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dalston_core::plan::base_stage;
use dalston_core::{Clock, JobId, TaskId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;

/// Stream key prefix; the full key is `dalston:stream:{base_stage}`.
pub const STREAM_PREFIX: &str = "dalston:stream:";

/// The single consumer group every engine claims from.
pub const CONSUMER_GROUP: &str = "engines";

/// Stream key for a (possibly channel-suffixed) stage.
pub fn stream_key(stage: &str) -> String {
    format!("{STREAM_PREFIX}{}", base_stage(stage))
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue backend: {0}")]
    Backend(String),
}

/// A message delivered from a task stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMessage {
    pub id: String,
    pub task_id: TaskId,
    pub job_id: JobId,
    pub enqueued_at: DateTime<Utc>,
    /// Deadline the recovery scanner enforces.
    pub timeout_at: DateTime<Utc>,
    /// 1 on first delivery, incremented by every reclaim.
    pub delivery_count: u64,
}

/// One PEL entry, for monitoring and recovery.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub message_id: String,
    pub task_id: TaskId,
    pub consumer: String,
    pub idle_ms: u64,
    pub delivery_count: u64,
}

/// Per-consumer pending counts inside [`StreamInfo`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerPending {
    pub name: String,
    pub pending: u64,
}

/// Stream statistics for dashboards.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub stream_key: String,
    /// Entries retained in the stream, acked ones included.
    pub length: u64,
    pub pending_count: u64,
    pub consumers: Vec<ConsumerPending>,
}

/// Contract of the durable task queue.
///
/// Every per-stage operation tolerates a missing stream or group by
/// creating it and returning empty.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Idempotent create of stream + consumer group.
    async fn ensure_group(&self, stage: &str) -> Result<(), QueueError>;

    /// Append a task message; returns the message id.
    async fn publish(
        &self,
        stage: &str,
        task_id: TaskId,
        job_id: JobId,
        timeout: Duration,
    ) -> Result<String, QueueError>;

    /// Claim the next undelivered message for `consumer`, blocking up to
    /// `block` when the stream is drained.
    async fn claim_next(
        &self,
        stage: &str,
        consumer: &str,
        block: Duration,
    ) -> Result<Option<StreamMessage>, QueueError>;

    /// Atomically reclaim messages idle for at least `min_idle`.
    async fn claim_idle(
        &self,
        stage: &str,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> Result<Vec<StreamMessage>, QueueError>;

    /// Force-claim specific messages regardless of idle time.
    async fn claim_by_id(
        &self,
        stage: &str,
        consumer: &str,
        message_ids: &[String],
    ) -> Result<Vec<StreamMessage>, QueueError>;

    /// Remove a message from its PEL. Called on success and on terminal
    /// failure alike.
    async fn ack(&self, stage: &str, message_id: &str) -> Result<(), QueueError>;

    /// Drop a message from the stream entirely (wait-timeout cleanup).
    async fn delete_message(&self, stage: &str, message_id: &str) -> Result<(), QueueError>;

    /// Read back a single message's fields without claiming it.
    async fn get_message(
        &self,
        stage: &str,
        message_id: &str,
    ) -> Result<Option<StreamMessage>, QueueError>;

    /// Enumerate the full PEL of a stage.
    async fn pending(&self, stage: &str) -> Result<Vec<PendingEntry>, QueueError>;

    /// PEL entry for one message, if it is currently claimed.
    async fn pending_entry(
        &self,
        stage: &str,
        message_id: &str,
    ) -> Result<Option<PendingEntry>, QueueError>;

    /// All known stages (base names), from the key space.
    async fn discover_stages(&self) -> Result<Vec<String>, QueueError>;

    async fn stream_info(&self, stage: &str) -> Result<StreamInfo, QueueError>;

    /// Age of the first message the group has not delivered yet, computed
    /// from the message's own `enqueued_at` (stream length retains acked
    /// history and would lie).
    async fn oldest_undelivered_age_ms(&self, stage: &str) -> Result<Option<u64>, QueueError>;
}

struct Entry {
    id: String,
    seq: u64,
    task_id: TaskId,
    job_id: JobId,
    enqueued_at: DateTime<Utc>,
    timeout_at: DateTime<Utc>,
    /// Consumer currently holding the message, when unacked.
    owner: Option<String>,
    delivered_at_ms: u64,
    delivery_count: u64,
    acked: bool,
}

impl Entry {
    fn message(&self) -> StreamMessage {
        StreamMessage {
            id: self.id.clone(),
            task_id: self.task_id,
            job_id: self.job_id,
            enqueued_at: self.enqueued_at,
            timeout_at: self.timeout_at,
            delivery_count: self.delivery_count,
        }
    }

    fn in_pel(&self) -> bool {
        self.owner.is_some() && !self.acked
    }
}

#[derive(Default)]
struct Stream {
    entries: Vec<Entry>,
    next_seq: u64,
    /// Messages at or below this sequence have been delivered at least
    /// once; the group's read position.
    last_delivered_seq: u64,
}

/// In-memory queue with stream/consumer-group semantics.
pub struct MemoryQueue<C: Clock> {
    clock: C,
    streams: Mutex<HashMap<String, Stream>>,
    published: Arc<Notify>,
}

impl<C: Clock> MemoryQueue<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, streams: Mutex::new(HashMap::new()), published: Arc::new(Notify::new()) }
    }

    fn try_claim_next(&self, stage: &str, consumer: &str) -> Option<StreamMessage> {
        let mut streams = self.streams.lock();
        let stream = streams.entry(stream_key(stage)).or_default();
        let now_ms = self.clock.epoch_ms();
        let last_delivered = stream.last_delivered_seq;
        let entry = stream.entries.iter_mut().find(|e| e.seq > last_delivered)?;
        stream.last_delivered_seq = entry.seq;
        entry.owner = Some(consumer.to_string());
        entry.delivered_at_ms = now_ms;
        entry.delivery_count = 1;
        Some(entry.message())
    }
}

#[async_trait]
impl<C: Clock> TaskQueue for MemoryQueue<C> {
    async fn ensure_group(&self, stage: &str) -> Result<(), QueueError> {
        self.streams.lock().entry(stream_key(stage)).or_default();
        Ok(())
    }

    async fn publish(
        &self,
        stage: &str,
        task_id: TaskId,
        job_id: JobId,
        timeout: Duration,
    ) -> Result<String, QueueError> {
        let now = self.clock.now_utc();
        let id = {
            let mut streams = self.streams.lock();
            let stream = streams.entry(stream_key(stage)).or_default();
            stream.next_seq += 1;
            let seq = stream.next_seq;
            let id = format!("{}-{}", self.clock.epoch_ms(), seq);
            stream.entries.push(Entry {
                id: id.clone(),
                seq,
                task_id,
                job_id,
                enqueued_at: now,
                timeout_at: now + ChronoDuration::milliseconds(timeout.as_millis() as i64),
                owner: None,
                delivered_at_ms: 0,
                delivery_count: 0,
                acked: false,
            });
            id
        };
        self.published.notify_waiters();
        Ok(id)
    }

    async fn claim_next(
        &self,
        stage: &str,
        consumer: &str,
        block: Duration,
    ) -> Result<Option<StreamMessage>, QueueError> {
        if let Some(message) = self.try_claim_next(stage, consumer) {
            return Ok(Some(message));
        }
        if block.is_zero() {
            return Ok(None);
        }

        let deadline = tokio::time::Instant::now() + block;
        loop {
            let notified = self.published.notified();
            if let Some(message) = self.try_claim_next(stage, consumer) {
                return Ok(Some(message));
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return Ok(self.try_claim_next(stage, consumer));
            }
        }
    }

    async fn claim_idle(
        &self,
        stage: &str,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> Result<Vec<StreamMessage>, QueueError> {
        let mut streams = self.streams.lock();
        let stream = streams.entry(stream_key(stage)).or_default();
        let now_ms = self.clock.epoch_ms();
        let min_idle_ms = min_idle.as_millis() as u64;

        let mut claimed = Vec::new();
        for entry in stream.entries.iter_mut() {
            if claimed.len() >= count {
                break;
            }
            if !entry.in_pel() {
                continue;
            }
            if now_ms.saturating_sub(entry.delivered_at_ms) < min_idle_ms {
                continue;
            }
            entry.owner = Some(consumer.to_string());
            entry.delivered_at_ms = now_ms;
            entry.delivery_count += 1;
            claimed.push(entry.message());
        }
        Ok(claimed)
    }

    async fn claim_by_id(
        &self,
        stage: &str,
        consumer: &str,
        message_ids: &[String],
    ) -> Result<Vec<StreamMessage>, QueueError> {
        let mut streams = self.streams.lock();
        let stream = streams.entry(stream_key(stage)).or_default();
        let now_ms = self.clock.epoch_ms();

        let mut claimed = Vec::new();
        for entry in stream.entries.iter_mut() {
            if !message_ids.contains(&entry.id) || !entry.in_pel() {
                continue;
            }
            entry.owner = Some(consumer.to_string());
            entry.delivered_at_ms = now_ms;
            entry.delivery_count += 1;
            claimed.push(entry.message());
        }
        Ok(claimed)
    }

    async fn ack(&self, stage: &str, message_id: &str) -> Result<(), QueueError> {
        let mut streams = self.streams.lock();
        let stream = streams.entry(stream_key(stage)).or_default();
        if let Some(entry) = stream.entries.iter_mut().find(|e| e.id == message_id) {
            entry.owner = None;
            entry.acked = true;
        }
        Ok(())
    }

    async fn delete_message(&self, stage: &str, message_id: &str) -> Result<(), QueueError> {
        let mut streams = self.streams.lock();
        let stream = streams.entry(stream_key(stage)).or_default();
        stream.entries.retain(|e| e.id != message_id);
        Ok(())
    }

    async fn get_message(
        &self,
        stage: &str,
        message_id: &str,
    ) -> Result<Option<StreamMessage>, QueueError> {
        let mut streams = self.streams.lock();
        let stream = streams.entry(stream_key(stage)).or_default();
        Ok(stream.entries.iter().find(|e| e.id == message_id).map(Entry::message))
    }

    async fn pending(&self, stage: &str) -> Result<Vec<PendingEntry>, QueueError> {
        let mut streams = self.streams.lock();
        let stream = streams.entry(stream_key(stage)).or_default();
        let now_ms = self.clock.epoch_ms();
        Ok(stream
            .entries
            .iter()
            .filter(|e| e.in_pel())
            .map(|e| PendingEntry {
                message_id: e.id.clone(),
                task_id: e.task_id,
                consumer: e.owner.clone().unwrap_or_default(),
                idle_ms: now_ms.saturating_sub(e.delivered_at_ms),
                delivery_count: e.delivery_count,
            })
            .collect())
    }

    async fn pending_entry(
        &self,
        stage: &str,
        message_id: &str,
    ) -> Result<Option<PendingEntry>, QueueError> {
        Ok(self.pending(stage).await?.into_iter().find(|e| e.message_id == message_id))
    }

    async fn discover_stages(&self) -> Result<Vec<String>, QueueError> {
        let streams = self.streams.lock();
        let mut stages: Vec<String> = streams
            .keys()
            .filter_map(|k| k.strip_prefix(STREAM_PREFIX))
            .map(str::to_string)
            .collect();
        stages.sort();
        Ok(stages)
    }

    async fn stream_info(&self, stage: &str) -> Result<StreamInfo, QueueError> {
        let mut streams = self.streams.lock();
        let key = stream_key(stage);
        let stream = streams.entry(key.clone()).or_default();

        let mut per_consumer: HashMap<String, u64> = HashMap::new();
        for entry in stream.entries.iter().filter(|e| e.in_pel()) {
            if let Some(owner) = &entry.owner {
                *per_consumer.entry(owner.clone()).or_default() += 1;
            }
        }
        let mut consumers: Vec<ConsumerPending> = per_consumer
            .into_iter()
            .map(|(name, pending)| ConsumerPending { name, pending })
            .collect();
        consumers.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(StreamInfo {
            stream_key: key,
            length: stream.entries.len() as u64,
            pending_count: stream.entries.iter().filter(|e| e.in_pel()).count() as u64,
            consumers,
        })
    }

    async fn oldest_undelivered_age_ms(&self, stage: &str) -> Result<Option<u64>, QueueError> {
        let mut streams = self.streams.lock();
        let stream = streams.entry(stream_key(stage)).or_default();
        let now = self.clock.now_utc();
        Ok(stream
            .entries
            .iter()
            .find(|e| e.seq > stream.last_delivered_seq)
            .map(|e| (now - e.enqueued_at).num_milliseconds().max(0) as u64))
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
