// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task completion and job finalization.

use super::Orchestrator;
use crate::error::EngineError;
use dalston_adapters::{ArtifactStore, EngineRegistry, EventBus, FlagStore, TaskQueue};
use dalston_core::transcript::MergeOutput;
use dalston_core::webhook::{EVENT_TRANSCRIPTION_COMPLETED, EVENT_TRANSCRIPTION_FAILED};
use dalston_core::{
    paths, plan, Clock, DeliveryId, DeliveryStatus, Event, Job, JobId, JobStatus, ResultStats,
    TaskId, TaskStatus, WebhookDelivery,
};
use dalston_services::audit::AuditContext;
use dalston_storage::{ArtifactOwner, StateStore};

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
    pub(crate) async fn handle_task_completed(&self, task_id: TaskId) -> Result<(), EngineError> {
        let Some(task) = self.store.get_task(task_id).await? else {
            return Ok(());
        };

        let now = self.clock.now_utc();
        let applied = self
            .store
            .transition_task(
                task_id,
                &[TaskStatus::Running, TaskStatus::Ready],
                TaskStatus::Completed,
                now,
            )
            .await?;
        if !applied && task.status != TaskStatus::Completed {
            tracing::debug!(
                task_id = %task_id,
                status = %task.status,
                "completion for task not in flight"
            );
            return Ok(());
        }

        if applied {
            self.store
                .set_task_output_uri(task_id, paths::task_output_key(task.job_id, task_id))
                .await?;
            tracing::info!(task_id = %task_id, stage = %task.stage, "task completed");
        }
        self.clear_waiting_markers(&task).await?;

        let Some(job) = self.store.get_job(task.job_id).await? else {
            return Ok(());
        };
        self.advance_job(&job).await
    }

    /// Settle a job whose tasks have all reached a terminal state.
    pub(crate) async fn maybe_finalize_job(&self, job_id: JobId) -> Result<(), EngineError> {
        let Some(job) = self.store.get_job(job_id).await? else {
            return Ok(());
        };
        if job.is_terminal() {
            return Ok(());
        }

        let tasks = self.store.tasks_for_job(job_id).await?;
        let drained = tasks.iter().all(|t| t.is_terminal());

        // A cancelling job settles once nothing is running any more; a
        // cancel that raced ahead of planning has no tasks at all.
        if job.status != JobStatus::Cancelling && (tasks.is_empty() || !drained) {
            return Ok(());
        }

        let now = self.clock.now_utc();

        // A cancelling job that drained is cancelled, whatever the
        // individual task outcomes were.
        if job.status == JobStatus::Cancelling {
            if !drained {
                return Ok(());
            }
            let applied = self
                .store
                .transition_job(job_id, &[JobStatus::Cancelling], JobStatus::Cancelled, now)
                .await?;
            if applied {
                self.store.set_job_error(job_id, None).await?;
                self.audit
                    .log(
                        "job.cancelled",
                        "job",
                        &job_id.to_string(),
                        AuditContext { tenant_id: Some(job.tenant_id), ..AuditContext::default() },
                    )
                    .await;
                self.bus.publish(&Event::JobCompleted { job_id }).await?;
                tracing::info!(job_id = %job_id, "job cancelled");
            }
            return Ok(());
        }

        // Required failures finalize through the failure path; this is the
        // catch-all for replays that arrive after the tasks settled.
        let failed: Vec<_> =
            tasks.iter().filter(|t| t.required && t.status == TaskStatus::Failed).collect();
        if !failed.is_empty() {
            let rollup = failed
                .iter()
                .map(|t| {
                    format!("{}: {}", t.stage, t.error.as_deref().unwrap_or("unknown error"))
                })
                .collect::<Vec<_>>()
                .join("; ");
            return self.fail_job(&job, rollup).await;
        }

        let stats = self.merge_output_stats(&job, &tasks).await?;
        let applied = self
            .store
            .transition_job(job_id, &[JobStatus::Running], JobStatus::Completed, now)
            .await?;
        if !applied {
            return Ok(());
        }

        if let Some(stats) = &stats {
            self.store.set_job_result(job_id, stats.clone()).await?;
        }
        let purge_after = self.retention.finalize_job_retention(&job, now).await?;
        self.store
            .mark_owner_artifacts_available(&ArtifactOwner::Job(job_id), now)
            .await?;

        self.audit
            .log(
                "job.completed",
                "job",
                &job_id.to_string(),
                AuditContext {
                    tenant_id: Some(job.tenant_id),
                    detail: Some(serde_json::json!({
                        "purge_after": purge_after.map(|t| t.to_rfc3339()),
                    })),
                    ..AuditContext::default()
                },
            )
            .await;

        self.bus.publish(&Event::JobCompleted { job_id }).await?;
        self.schedule_deliveries(&job, EVENT_TRANSCRIPTION_COMPLETED, "completed", stats, None)
            .await?;

        tracing::info!(job_id = %job_id, "job completed");
        Ok(())
    }

    /// Aggregate stats from the merge task's output blob.
    async fn merge_output_stats(
        &self,
        job: &Job,
        tasks: &[dalston_core::Task],
    ) -> Result<Option<ResultStats>, EngineError> {
        let Some(merge) = tasks.iter().find(|t| t.stage == plan::STAGE_MERGE) else {
            return Ok(None);
        };
        let key = merge
            .output_uri
            .clone()
            .unwrap_or_else(|| paths::task_output_key(job.id, merge.id));
        match self.blobs.get_json(&key).await {
            Ok(Some(value)) => match serde_json::from_value::<MergeOutput>(value) {
                Ok(output) => Ok(Some(output.result_stats())),
                Err(e) => {
                    tracing::warn!(job_id = %job.id, error = %e, "unreadable merge output");
                    Ok(None)
                }
            },
            Ok(None) => {
                tracing::warn!(job_id = %job.id, key = %key, "merge output missing");
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "merge output unreadable");
                Ok(None)
            }
        }
    }

    /// Queue webhook notifications: the per-job URL plus every registered
    /// endpoint subscribed to the event. Dedup in the store makes this
    /// safe to replay.
    pub(crate) async fn schedule_deliveries(
        &self,
        job: &Job,
        event_type: &str,
        status: &str,
        stats: Option<ResultStats>,
        error: Option<&str>,
    ) -> Result<(), EngineError> {
        let text = match event_type {
            EVENT_TRANSCRIPTION_COMPLETED => self.transcript_preview(job.id).await,
            _ => None,
        };
        let payload = self.webhooks.build_payload(
            event_type,
            job.id,
            status,
            text.as_deref(),
            stats.as_ref().and_then(|s| s.audio_duration_seconds),
            error,
            job.webhook_metadata.clone(),
        );
        let payload = match serde_json::to_value(&payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "unserializable webhook payload");
                return Ok(());
            }
        };
        let now = self.clock.now_utc();

        let mut deliveries = Vec::new();
        if let Some(url) = &job.webhook_url {
            deliveries.push(WebhookDelivery {
                id: DeliveryId::new(),
                endpoint_id: None,
                url_override: Some(url.clone()),
                job_id: job.id,
                event_type: event_type.to_string(),
                payload: payload.clone(),
                status: DeliveryStatus::Pending,
                attempts: 0,
                last_status_code: None,
                last_error: None,
                last_attempt_at: None,
                next_retry_at: Some(now),
                created_at: now,
            });
        }
        for endpoint in
            self.store.active_endpoints_for_event(job.tenant_id, event_type).await?
        {
            deliveries.push(WebhookDelivery {
                id: DeliveryId::new(),
                endpoint_id: Some(endpoint.id),
                url_override: None,
                job_id: job.id,
                event_type: event_type.to_string(),
                payload: payload.clone(),
                status: DeliveryStatus::Pending,
                attempts: 0,
                last_status_code: None,
                last_error: None,
                last_attempt_at: None,
                next_retry_at: Some(now),
                created_at: now,
            });
        }

        for delivery in deliveries {
            self.store.create_delivery(delivery).await?;
        }
        Ok(())
    }

    async fn transcript_preview(&self, job_id: JobId) -> Option<String> {
        let value = self.blobs.get_json(&paths::transcript_key(job_id)).await.ok()??;
        value.get("text").and_then(|t| t.as_str()).map(str::to_string)
    }

    /// Common failed-webhook scheduling used by the failure path.
    pub(crate) async fn schedule_failure_deliveries(
        &self,
        job: &Job,
        error: &str,
    ) -> Result<(), EngineError> {
        self.schedule_deliveries(job, EVENT_TRANSCRIPTION_FAILED, "failed", None, Some(error))
            .await
    }
}
