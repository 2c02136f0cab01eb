// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job cancellation: stop what hasn't started, drain what has.

use super::Orchestrator;
use crate::error::EngineError;
use dalston_adapters::flags::{job_cancelled_key, JOB_CANCELLED_TTL};
use dalston_adapters::{ArtifactStore, EngineRegistry, EventBus, FlagStore, TaskQueue};
use dalston_core::{Clock, JobId, JobStatus, TaskStatus};
use dalston_storage::StateStore;

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
    pub(crate) async fn handle_cancel_requested(&self, job_id: JobId) -> Result<(), EngineError> {
        let Some(job) = self.store.get_job(job_id).await? else {
            tracing::warn!(job_id = %job_id, "cancel for unknown job");
            return Ok(());
        };
        if job.is_terminal() {
            tracing::debug!(job_id = %job_id, status = %job.status, "cancel for settled job");
            return Ok(());
        }

        let now = self.clock.now_utc();
        self.store
            .transition_job(
                job_id,
                &[JobStatus::Pending, JobStatus::Running],
                JobStatus::Cancelling,
                now,
            )
            .await?;

        // The API layer sets the flag too; repeating it is harmless and
        // covers cancels injected directly on the bus.
        self.flags
            .set_with_ttl(&job_cancelled_key(job_id), "1", JOB_CANCELLED_TTL)
            .await?;

        // Tasks not yet claimed will never run. Claimed (running) tasks
        // drain: engines poll the flag and abort, or finish naturally.
        let tasks = self.store.tasks_for_job(job_id).await?;
        for task in &tasks {
            let applied = self
                .store
                .transition_task(
                    task.id,
                    &[TaskStatus::Pending, TaskStatus::Ready],
                    TaskStatus::Cancelled,
                    now,
                )
                .await?;
            if applied {
                self.clear_waiting_markers(task).await?;
            }
        }

        tracing::info!(job_id = %job_id, "cancelling job");
        self.maybe_finalize_job(job_id).await
    }
}
