// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task failure handling: retry, skip, or fail the job.

use super::Orchestrator;
use crate::error::EngineError;
use dalston_adapters::{ArtifactStore, EngineRegistry, EventBus, FlagStore, TaskQueue};
use dalston_core::event::TaskFailureReason;
use dalston_core::{Clock, Event, Job, JobStatus, TaskId, TaskStatus};
use dalston_services::audit::AuditContext;
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
    pub(crate) async fn handle_task_failed(
        &self,
        task_id: TaskId,
        error: &str,
        reason: Option<TaskFailureReason>,
    ) -> Result<(), EngineError> {
        let Some(task) = self.store.get_task(task_id).await? else {
            return Ok(());
        };
        let now = self.clock.now_utc();

        // A cancelled engine run is part of the cancellation drain, not a
        // failure of the task itself.
        if reason == Some(TaskFailureReason::Cancelled) {
            self.store
                .transition_task(
                    task_id,
                    &[TaskStatus::Running, TaskStatus::Ready, TaskStatus::Pending],
                    TaskStatus::Cancelled,
                    now,
                )
                .await?;
            self.clear_waiting_markers(&task).await?;
            return self.maybe_finalize_job(task.job_id).await;
        }

        // Engines only report failures for claimed (running) work; the
        // scanner pre-marks tasks failed before publishing. Anything else
        // is a replay and changes nothing.
        let applied = self
            .store
            .transition_task(task_id, &[TaskStatus::Running], TaskStatus::Failed, now)
            .await?;
        if !applied && task.status != TaskStatus::Failed {
            tracing::debug!(
                task_id = %task_id,
                status = %task.status,
                "failure for task not in flight"
            );
            return Ok(());
        }
        self.store.set_task_error(task_id, Some(error.to_string())).await?;
        self.clear_waiting_markers(&task).await?;

        let retriable = reason.is_none_or(TaskFailureReason::is_retriable);
        if retriable && self.store.begin_task_retry(task_id, now).await? {
            let Some(job) = self.store.get_job(task.job_id).await? else {
                return Ok(());
            };
            if job.status == JobStatus::Running {
                let Some(task) = self.store.get_task(task_id).await? else {
                    return Ok(());
                };
                tracing::info!(
                    task_id = %task_id,
                    stage = %task.stage,
                    retries = task.retries,
                    max_retries = task.max_retries,
                    "retrying failed task"
                );
                return self.dispatch_task(&job, &task).await;
            }
            // Job is cancelling or already settled; put the retry back.
            self.store
                .transition_task(task_id, &[TaskStatus::Ready], TaskStatus::Failed, now)
                .await?;
            return self.maybe_finalize_job(task.job_id).await;
        }

        self.settle_failed_task(task_id, error).await
    }

    /// A wait-for-engine deadline elapsed: the task fails without retry,
    /// since no engine exists to run it.
    pub(crate) async fn handle_task_wait_timeout(
        &self,
        task_id: TaskId,
        engine_id: &str,
        error: &str,
    ) -> Result<(), EngineError> {
        let Some(task) = self.store.get_task(task_id).await? else {
            return Ok(());
        };
        if task.is_terminal() {
            return Ok(());
        }
        tracing::warn!(task_id = %task_id, engine_id, "task timed out waiting for engine");
        self.apply_terminal_task_failure(
            task_id,
            error,
            Some(TaskFailureReason::EngineUnavailable),
        )
        .await
    }

    /// Mark a task failed with no retry and propagate to the job.
    pub(crate) async fn apply_terminal_task_failure(
        &self,
        task_id: TaskId,
        error: &str,
        reason: Option<TaskFailureReason>,
    ) -> Result<(), EngineError> {
        let now = self.clock.now_utc();
        self.store
            .transition_task(
                task_id,
                &[TaskStatus::Running, TaskStatus::Ready, TaskStatus::Pending],
                TaskStatus::Failed,
                now,
            )
            .await?;
        self.store.set_task_error(task_id, Some(error.to_string())).await?;
        if let Some(task) = self.store.get_task(task_id).await? {
            self.clear_waiting_markers(&task).await?;
        }
        tracing::debug!(
            task_id = %task_id,
            reason = %reason.map(|r| r.to_string()).unwrap_or_default(),
            "task failed terminally"
        );
        self.settle_failed_task(task_id, error).await
    }

    /// Terminal failure bookkeeping shared by every no-retry path.
    async fn settle_failed_task(&self, task_id: TaskId, error: &str) -> Result<(), EngineError> {
        let Some(task) = self.store.get_task(task_id).await? else {
            return Ok(());
        };
        let now = self.clock.now_utc();

        if !task.required {
            // Dependents treat it as skipped; the pipeline carries on.
            self.store
                .transition_task(task_id, &[TaskStatus::Failed], TaskStatus::Skipped, now)
                .await?;
            tracing::info!(task_id = %task_id, stage = %task.stage, "optional task skipped");
            let Some(job) = self.store.get_job(task.job_id).await? else {
                return Ok(());
            };
            return self.advance_job(&job).await;
        }

        let Some(job) = self.store.get_job(task.job_id).await? else {
            return Ok(());
        };
        if job.status == JobStatus::Cancelling {
            // The drain decides; the job ends cancelled, not failed.
            return self.maybe_finalize_job(job.id).await;
        }

        let rollup = format!("{}: {}", task.stage, error);
        self.fail_job(&job, rollup).await
    }

    /// Fail the job: cancel everything not yet running, record the error,
    /// and announce. Tasks still running drain on their own.
    pub(crate) async fn fail_job(&self, job: &Job, error: String) -> Result<(), EngineError> {
        let now = self.clock.now_utc();
        let tasks = self.store.tasks_for_job(job.id).await?;
        for task in &tasks {
            if matches!(task.status, TaskStatus::Pending | TaskStatus::Ready) {
                self.store
                    .transition_task(
                        task.id,
                        &[TaskStatus::Pending, TaskStatus::Ready],
                        TaskStatus::Cancelled,
                        now,
                    )
                    .await?;
                self.clear_waiting_markers(task).await?;
            }
        }

        let applied = self
            .store
            .transition_job(
                job.id,
                &[JobStatus::Pending, JobStatus::Running],
                JobStatus::Failed,
                now,
            )
            .await?;
        if !applied {
            return Ok(());
        }
        self.store.set_job_error(job.id, Some(error.clone())).await?;

        self.audit
            .log(
                "job.failed",
                "job",
                &job.id.to_string(),
                AuditContext {
                    tenant_id: Some(job.tenant_id),
                    detail: Some(serde_json::json!({"error": error})),
                    ..AuditContext::default()
                },
            )
            .await;

        self.bus.publish(&Event::JobFailed { job_id: job.id, error: error.clone() }).await?;
        self.schedule_failure_deliveries(job, &error).await?;

        tracing::warn!(job_id = %job.id, error = %error, "job failed");
        Ok(())
    }
}
