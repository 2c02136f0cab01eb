// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stale-task recovery scanner.
//!
//! Sweeps every stream's pending-entries list for tasks whose consumer
//! stopped heartbeating or whose processing deadline passed, and turns
//! them into explicit `task.failed` events. Leader election over a lease
//! key keeps one sweep running across all orchestrator replicas; a lost
//! lease aborts the iteration mid-sweep.

use crate::error::EngineError;
use dalston_adapters::flags::{
    task_meta_key, SCANNER_LEADER_KEY, SCANNER_LEADER_TTL, WAITING_ENGINE_TASKS_KEY,
};
use dalston_adapters::{EngineRegistry, EventBus, FlagStore, PendingEntry, TaskQueue};
use dalston_core::event::TaskFailureReason;
use dalston_core::metrics::METRICS;
use dalston_core::{Clock, Event, TaskId, TaskStatus};
use dalston_services::{EngineUnavailableBehavior, SettingsService};
use dalston_storage::StateStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How often the sweep runs.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(60);

/// PEL entries idle longer than this are examined.
pub const STALE_THRESHOLD: Duration = Duration::from_secs(10 * 60);

pub struct StaleTaskScanner<S, Q, B, F, E, C: Clock> {
    store: Arc<S>,
    queue: Arc<Q>,
    bus: Arc<B>,
    flags: Arc<F>,
    engines: Arc<E>,
    clock: C,
    settings: SettingsService<S, C>,
    scan_interval: Duration,
    /// `hostname:pid`, written into the leader lease.
    instance_id: String,
}

impl<S, Q, B, F, E, C> StaleTaskScanner<S, Q, B, F, E, C>
where
    S: StateStore,
    Q: TaskQueue,
    B: EventBus,
    F: FlagStore,
    E: EngineRegistry,
    C: Clock,
{
    pub fn new(
        store: Arc<S>,
        queue: Arc<Q>,
        bus: Arc<B>,
        flags: Arc<F>,
        engines: Arc<E>,
        clock: C,
        instance_id: impl Into<String>,
    ) -> Self {
        let settings = SettingsService::new(store.clone(), clock.clone());
        Self {
            store,
            queue,
            bus,
            flags,
            engines,
            clock,
            settings,
            scan_interval: DEFAULT_SCAN_INTERVAL,
            instance_id: instance_id.into(),
        }
    }

    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            instance_id = %self.instance_id,
            scan_interval_s = self.scan_interval.as_secs(),
            "stale task scanner started"
        );
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.scan_interval) => {
                    if let Err(e) = self.sweep_once().await {
                        tracing::error!(error = %e, "stale task sweep failed");
                    }
                }
            }
        }
        // Best effort; the lease expires on its own anyway.
        let _ = self.flags.compare_and_delete(SCANNER_LEADER_KEY, &self.instance_id).await;
        tracing::info!(instance_id = %self.instance_id, "stale task scanner stopped");
    }

    /// One election round plus (as leader) one full sweep.
    pub async fn sweep_once(&self) -> Result<(), EngineError> {
        let elected = self
            .flags
            .set_if_absent(SCANNER_LEADER_KEY, &self.instance_id, SCANNER_LEADER_TTL)
            .await?;
        if !elected {
            tracing::debug!(instance_id = %self.instance_id, "not the scan leader this round");
            return Ok(());
        }

        let result = self.scan().await;

        self.flags.compare_and_delete(SCANNER_LEADER_KEY, &self.instance_id).await?;
        METRICS.inc_scanner_sweeps();
        result
    }

    async fn scan(&self) -> Result<(), EngineError> {
        let stages = self.queue.discover_stages().await?;
        let mut stale = 0usize;
        let mut failed = 0usize;

        for stage in &stages {
            // Losing the lease mid-sweep means another instance may be
            // scanning; stop immediately.
            let still_leader = self
                .flags
                .compare_and_extend(SCANNER_LEADER_KEY, &self.instance_id, SCANNER_LEADER_TTL)
                .await?;
            if !still_leader {
                tracing::warn!(instance_id = %self.instance_id, "lost leadership mid-sweep");
                return Ok(());
            }

            let (s, f) = self.scan_stream(stage).await?;
            stale += s;
            failed += f;
        }

        let wait_failed = self.scan_waiting_engine_timeouts().await?;

        if stale > 0 || wait_failed > 0 {
            tracing::info!(
                streams_scanned = stages.len(),
                stale_tasks_found = stale,
                tasks_failed = failed,
                waiting_engine_timeouts = wait_failed,
                "stale task scan complete"
            );
        }
        Ok(())
    }

    async fn scan_stream(&self, stage: &str) -> Result<(usize, usize), EngineError> {
        let pending = self.queue.pending(stage).await?;
        let mut stale = 0usize;
        let mut failed = 0usize;
        let now = self.clock.now_utc();

        for entry in pending {
            if entry.idle_ms < STALE_THRESHOLD.as_millis() as u64 {
                continue;
            }
            stale += 1;

            let engine_alive = self.engines.is_engine_alive(&entry.consumer).await?;
            if !engine_alive {
                let error = format!(
                    "engine '{}' stopped heartbeating while processing task",
                    entry.consumer
                );
                if self
                    .fail_task(stage, &entry, &error, TaskFailureReason::EngineDead)
                    .await?
                {
                    failed += 1;
                }
                continue;
            }

            // Engine is alive; enforce the message's own deadline.
            let timed_out = match self.queue.get_message(stage, &entry.message_id).await? {
                Some(message) => now > message.timeout_at,
                None => false,
            };
            if timed_out
                && self
                    .fail_task(
                        stage,
                        &entry,
                        "task exceeded configured timeout",
                        TaskFailureReason::Timeout,
                    )
                    .await?
            {
                failed += 1;
            }
        }

        Ok((stale, failed))
    }

    /// Mark the task failed, ack the message, announce. Conditional on
    /// the task still running, so repeated sweeps are no-ops.
    async fn fail_task(
        &self,
        stage: &str,
        entry: &PendingEntry,
        error: &str,
        reason: TaskFailureReason,
    ) -> Result<bool, EngineError> {
        let now = self.clock.now_utc();
        let applied = self
            .store
            .transition_task(entry.task_id, &[TaskStatus::Running], TaskStatus::Failed, now)
            .await?;
        if !applied {
            tracing::debug!(
                task_id = %entry.task_id,
                "stale PEL entry for task no longer running"
            );
            return Ok(false);
        }

        self.store.set_task_error(entry.task_id, Some(error.to_string())).await?;
        self.queue.ack(stage, &entry.message_id).await?;

        match reason {
            TaskFailureReason::Timeout => METRICS.inc_tasks_timed_out(),
            TaskFailureReason::EngineDead => METRICS.inc_tasks_failed_engine_dead(),
            _ => {}
        }

        self.bus
            .publish(&Event::TaskFailed {
                task_id: entry.task_id,
                error: error.to_string(),
                reason: Some(reason),
            })
            .await?;

        tracing::info!(
            task_id = %entry.task_id,
            stage,
            consumer = %entry.consumer,
            reason = %reason,
            "task failed by scanner"
        );
        Ok(true)
    }

    /// Fail ready/pending tasks whose wait-for-engine deadline elapsed
    /// while their stream message was never claimed.
    async fn scan_waiting_engine_timeouts(&self) -> Result<usize, EngineError> {
        let behavior = self.settings.engine_unavailable_behavior(None).await?;
        if behavior != EngineUnavailableBehavior::Wait {
            return Ok(0);
        }

        let waiting = self.flags.set_members(WAITING_ENGINE_TASKS_KEY).await?;
        if waiting.is_empty() {
            return Ok(0);
        }

        let now = self.clock.now_utc();
        let mut timed_out = 0usize;

        for raw_id in waiting {
            let Ok(task_id) = raw_id.parse::<uuid::Uuid>().map(TaskId::from_uuid) else {
                self.flags.set_remove(WAITING_ENGINE_TASKS_KEY, &raw_id).await?;
                continue;
            };
            let meta_key = task_meta_key(task_id);
            let meta = self.flags.hash_get_all(&meta_key).await?;

            if meta.get("waiting_for_engine").map(String::as_str) != Some("true") {
                self.flags.set_remove(WAITING_ENGINE_TASKS_KEY, &raw_id).await?;
                continue;
            }
            let Some(deadline) = meta
                .get("wait_deadline_at")
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.with_timezone(&chrono::Utc))
            else {
                self.clear_waiting_marker(&raw_id, task_id).await?;
                continue;
            };
            if now <= deadline {
                continue;
            }

            let Some(task) = self.store.get_task(task_id).await? else {
                self.clear_waiting_marker(&raw_id, task_id).await?;
                continue;
            };
            if !matches!(task.status, TaskStatus::Ready | TaskStatus::Pending) {
                // Task moved on; no timeout action needed.
                self.clear_waiting_marker(&raw_id, task_id).await?;
                continue;
            }

            let queue_id = meta.get("queue_id").cloned();
            let message_id = meta.get("stream_message_id").cloned();

            // Claimed into a PEL in the meantime: the engine showed up,
            // the stale-task path covers it from here.
            if let (Some(queue_id), Some(message_id)) = (&queue_id, &message_id) {
                if self.queue.pending_entry(queue_id, message_id).await?.is_some() {
                    self.clear_waiting_marker(&raw_id, task_id).await?;
                    continue;
                }
            }

            let engine_id =
                meta.get("engine_id").cloned().unwrap_or_else(|| task.engine_id.clone());
            let wait_timeout_s = meta
                .get("wait_timeout_s")
                .cloned()
                .unwrap_or_else(|| "300".to_string());
            let error = format!(
                "engine '{engine_id}' did not become available within {wait_timeout_s} seconds"
            );

            // Block the message before announcing so an engine claiming
            // right now can't race the timeout.
            self.flags
                .hash_set(
                    &meta_key,
                    &[
                        ("blocked_reason", "engine_wait_timeout".to_string()),
                        ("blocked_at", now.to_rfc3339()),
                    ],
                )
                .await?;
            self.bus
                .publish(&Event::TaskWaitTimeout {
                    task_id,
                    engine_id: engine_id.clone(),
                    queue_id: queue_id.clone(),
                    error,
                })
                .await?;

            if let (Some(queue_id), Some(message_id)) = (&queue_id, &message_id) {
                self.queue.delete_message(queue_id, message_id).await?;
            }
            self.clear_waiting_marker(&raw_id, task_id).await?;
            timed_out += 1;

            tracing::warn!(
                task_id = %task_id,
                engine_id = %engine_id,
                wait_timeout_s = %wait_timeout_s,
                "task wait-for-engine timeout"
            );
        }

        Ok(timed_out)
    }

    async fn clear_waiting_marker(&self, raw_id: &str, task_id: TaskId) -> Result<(), EngineError> {
        self.flags.set_remove(WAITING_ENGINE_TASKS_KEY, raw_id).await?;
        self.flags
            .hash_delete_fields(
                &task_meta_key(task_id),
                &[
                    "waiting_for_engine",
                    "wait_deadline_at",
                    "wait_timeout_s",
                    "engine_id",
                    "queue_id",
                    "stream_message_id",
                ],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "scanner_tests.rs"]
mod tests;
