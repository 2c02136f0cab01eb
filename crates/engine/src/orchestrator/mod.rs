// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The orchestrator: job lifecycle events in, pipeline progress out.
//!
//! One event-consumer loop per instance. Per-event work takes the job's
//! row lock, so duplicate events on the same job serialize while different
//! jobs proceed in parallel. Every handler is idempotent: replays degrade
//! to conditional updates that don't apply.

mod cancel;
mod completion;
mod dispatch;
mod failure;
mod job_create;

use crate::error::EngineError;
use dalston_adapters::{
    ArtifactStore, BusSubscriber, EngineRegistry, EventBus, FlagStore, TaskQueue,
};
use dalston_core::{Clock, Event, Job, JobId, TaskId, TaskStatus};
use dalston_services::{AuditService, RetentionService, SettingsService, WebhookService};
use dalston_storage::StateStore;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Substrate handles the orchestrator operates on.
pub struct OrchestratorDeps<S, Q, B, A, F, E> {
    pub store: Arc<S>,
    pub queue: Arc<Q>,
    pub bus: Arc<B>,
    pub blobs: Arc<A>,
    pub flags: Arc<F>,
    pub engines: Arc<E>,
}

pub struct Orchestrator<S, Q, B, A, F, E, C: Clock> {
    pub(crate) store: Arc<S>,
    pub(crate) queue: Arc<Q>,
    pub(crate) bus: Arc<B>,
    pub(crate) blobs: Arc<A>,
    pub(crate) flags: Arc<F>,
    pub(crate) engines: Arc<E>,
    pub(crate) clock: C,
    pub(crate) settings: SettingsService<S, C>,
    pub(crate) retention: RetentionService<S, C>,
    pub(crate) webhooks: WebhookService<C>,
    pub(crate) audit: AuditService<S, C>,
}

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
    pub fn new(
        deps: OrchestratorDeps<S, Q, B, A, F, E>,
        clock: C,
        webhooks: WebhookService<C>,
    ) -> Self {
        let settings = SettingsService::new(deps.store.clone(), clock.clone());
        let retention = RetentionService::new(deps.store.clone(), clock.clone());
        let audit = AuditService::new(deps.store.clone(), clock.clone());
        Self {
            store: deps.store,
            queue: deps.queue,
            bus: deps.bus,
            blobs: deps.blobs,
            flags: deps.flags,
            engines: deps.engines,
            clock,
            settings,
            retention,
            webhooks,
            audit,
        }
    }

    /// Event-consumer loop. Handler errors are logged and the loop moves
    /// on; the scanner and idempotent replays cover anything missed.
    pub async fn run(&self, mut subscriber: BusSubscriber, shutdown: CancellationToken) {
        tracing::info!("orchestrator started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = subscriber.recv() => {
                    let Some(event) = event else { break };
                    if let Err(e) = self.handle_event(&event).await {
                        tracing::error!(
                            event = %event.log_summary(),
                            error = %e,
                            "event handler failed"
                        );
                    }
                }
            }
        }
        tracing::info!("orchestrator stopped");
    }

    /// Dispatch a single event, serialized on the owning job.
    pub async fn handle_event(&self, event: &Event) -> Result<(), EngineError> {
        tracing::debug!(event = %event.log_summary(), "received event");
        match event {
            Event::JobCreated { job_id, .. } => {
                let _guard = self.store.job_lock(*job_id).await.lock_owned().await;
                self.handle_job_created(*job_id).await
            }
            Event::JobCancelRequested { job_id } => {
                let _guard = self.store.job_lock(*job_id).await.lock_owned().await;
                self.handle_cancel_requested(*job_id).await
            }
            Event::TaskCompleted { task_id } => {
                let Some(job_id) = self.job_of_task(*task_id).await? else {
                    return Ok(());
                };
                let _guard = self.store.job_lock(job_id).await.lock_owned().await;
                self.handle_task_completed(*task_id).await
            }
            Event::TaskFailed { task_id, error, reason } => {
                let Some(job_id) = self.job_of_task(*task_id).await? else {
                    return Ok(());
                };
                let _guard = self.store.job_lock(job_id).await.lock_owned().await;
                self.handle_task_failed(*task_id, error, *reason).await
            }
            Event::TaskWaitTimeout { task_id, engine_id, error, .. } => {
                let Some(job_id) = self.job_of_task(*task_id).await? else {
                    return Ok(());
                };
                let _guard = self.store.job_lock(job_id).await.lock_owned().await;
                self.handle_task_wait_timeout(*task_id, engine_id, error).await
            }
            // Terminal job events are for external consumers; state is
            // already settled by the time they are published.
            Event::JobCompleted { .. } | Event::JobFailed { .. } => Ok(()),
            Event::WorkerOffline { .. } | Event::Unknown => Ok(()),
        }
    }

    async fn job_of_task(&self, task_id: TaskId) -> Result<Option<JobId>, EngineError> {
        match self.store.get_task(task_id).await? {
            Some(task) => Ok(Some(task.job_id)),
            None => {
                tracing::warn!(task_id = %task_id, "event for unknown task");
                Ok(None)
            }
        }
    }

    /// Move every pending task whose dependencies are satisfied into
    /// `ready` and dispatch it, then settle the job if it drained.
    ///
    /// Boxed: a fail-fast dispatch can skip an optional task, which
    /// re-enters this function for the tasks it unblocks.
    pub(crate) fn advance_job<'a>(
        &'a self,
        job: &'a Job,
    ) -> Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send + 'a>> {
        Box::pin(async move {
            let tasks = self.store.tasks_for_job(job.id).await?;
            let by_id: HashMap<TaskId, TaskStatus> =
                tasks.iter().map(|t| (t.id, t.status)).collect();

            for task in &tasks {
                if task.status != TaskStatus::Pending {
                    continue;
                }
                let ready = task.dependencies.iter().all(|dep| {
                    by_id.get(dep).copied().is_some_and(|s| s.satisfies_dependency())
                });
                if ready {
                    self.dispatch_task(job, task).await?;
                }
            }

            self.maybe_finalize_job(job.id).await
        })
    }
}

#[cfg(test)]
#[path = "../orchestrator_tests/mod.rs"]
mod tests;
