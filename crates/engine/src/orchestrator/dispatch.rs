// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task dispatch into the queue, with the engine-availability policy.

use super::Orchestrator;
use crate::error::EngineError;
use dalston_adapters::flags::{task_meta_key, WAITING_ENGINE_TASKS_KEY};
use dalston_adapters::{ArtifactStore, EngineRegistry, EventBus, FlagStore, TaskQueue};
use dalston_core::event::TaskFailureReason;
use dalston_core::plan::base_stage;
use dalston_core::{paths, Clock, Job, Task, TaskStatus};
use dalston_services::EngineUnavailableBehavior;
use dalston_storage::StateStore;
use std::time::Duration;

impl<S, Q, B, A, F, E, C> Orchestrator<S, Q, B, A, F, E, C>
where
    S: StateStore,
    Q: TaskQueue,
    B: EventBus,
    A: ArtifactStore,
    F: FlagStore,
    E: EngineRegistry,
    C: Clock,
{
    /// Make a task ready and hand it to its engine queue.
    ///
    /// Called for pending tasks whose dependencies are satisfied and for
    /// retried tasks that are already back in `ready`.
    pub(crate) async fn dispatch_task(&self, job: &Job, task: &Task) -> Result<(), EngineError> {
        self.write_input_descriptor(job, task).await?;

        let now = self.clock.now_utc();
        if task.status == TaskStatus::Pending {
            let applied = self
                .store
                .transition_task(task.id, &[TaskStatus::Pending], TaskStatus::Ready, now)
                .await?;
            if !applied {
                // Another handler instance won the race.
                return Ok(());
            }
        }

        let queue_id = base_stage(&task.engine_id).to_string();
        let engine_alive = self.engines.is_engine_alive(&queue_id).await?;
        let behavior = self.settings.engine_unavailable_behavior(Some(job.tenant_id)).await?;

        if !engine_alive && behavior == EngineUnavailableBehavior::FailFast {
            let error = format!(
                "engine '{}' is not available and engine_unavailable_behavior is fail_fast",
                queue_id
            );
            tracing::warn!(task_id = %task.id, stage = %task.stage, "no engine for stage");
            return self
                .apply_terminal_task_failure(
                    task.id,
                    &error,
                    Some(TaskFailureReason::EngineUnavailable),
                )
                .await;
        }

        let message_id = self
            .queue
            .publish(&task.engine_id, task.id, job.id, Duration::from_secs(task.timeout_s))
            .await?;
        tracing::debug!(
            task_id = %task.id,
            stage = %task.stage,
            message_id = %message_id,
            "task dispatched"
        );

        if !engine_alive {
            // Wait mode: park the task and let the scanner enforce the
            // deadline. The message stays queued so a late engine can
            // still claim it.
            let wait_timeout = self.settings.engine_wait_timeout(Some(job.tenant_id)).await?;
            let deadline = now + chrono::Duration::seconds(wait_timeout.as_secs() as i64);
            self.flags
                .hash_set(
                    &task_meta_key(task.id),
                    &[
                        ("waiting_for_engine", "true".to_string()),
                        ("wait_deadline_at", deadline.to_rfc3339()),
                        ("wait_timeout_s", wait_timeout.as_secs().to_string()),
                        ("engine_id", task.engine_id.clone()),
                        ("queue_id", queue_id.clone()),
                        ("stream_message_id", message_id),
                    ],
                )
                .await?;
            self.flags
                .set_add(WAITING_ENGINE_TASKS_KEY, &task.id.to_string())
                .await?;
            tracing::info!(
                task_id = %task.id,
                engine_id = %queue_id,
                wait_timeout_s = wait_timeout.as_secs(),
                "task waiting for engine"
            );
        }

        Ok(())
    }

    /// Write the engine's input descriptor before the task becomes
    /// claimable. Upstream outputs are referenced by stage name.
    async fn write_input_descriptor(&self, job: &Job, task: &Task) -> Result<(), EngineError> {
        if task.input_uri.is_some() {
            return Ok(());
        }

        let tasks = self.store.tasks_for_job(job.id).await?;
        let mut upstream = serde_json::Map::new();
        for dep_id in &task.dependencies {
            if let Some(dep) = tasks.iter().find(|t| t.id == *dep_id) {
                upstream.insert(
                    dep.stage.clone(),
                    serde_json::json!(paths::task_output_key(job.id, dep.id)),
                );
            }
        }

        let descriptor = serde_json::json!({
            "task_id": task.id,
            "job_id": job.id,
            "stage": task.stage,
            "audio_uri": job.audio_uri,
            "config": task.config,
            "parameters": job.parameters,
            "inputs": upstream,
        });

        let key = paths::task_input_key(job.id, task.id);
        self.blobs.put_json(&key, &descriptor).await?;
        self.store.set_task_input_uri(task.id, key).await?;
        Ok(())
    }

    /// Drop the waiting-for-engine markers, if any.
    pub(crate) async fn clear_waiting_markers(&self, task: &Task) -> Result<(), EngineError> {
        self.flags
            .set_remove(WAITING_ENGINE_TASKS_KEY, &task.id.to_string())
            .await?;
        self.flags
            .hash_delete_fields(
                &task_meta_key(task.id),
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
