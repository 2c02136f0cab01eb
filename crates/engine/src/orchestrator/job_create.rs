// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job creation: plan the pipeline and start its roots.

use super::Orchestrator;
use crate::error::EngineError;
use dalston_adapters::{ArtifactStore, EngineRegistry, EventBus, FlagStore, TaskQueue};
use dalston_core::{
    plan, Clock, Event, JobId, JobParameters, JobStatus, Task, TaskId, TaskStatus,
};
use dalston_storage::StateStore;
use std::collections::HashMap;

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
    pub(crate) async fn handle_job_created(&self, job_id: JobId) -> Result<(), EngineError> {
        let Some(job) = self.store.get_job(job_id).await? else {
            tracing::warn!(job_id = %job_id, "job.created for unknown job");
            return Ok(());
        };
        if job.status != JobStatus::Pending {
            tracing::debug!(job_id = %job_id, status = %job.status, "job already planned");
            return Ok(());
        }

        let params = match JobParameters::from_value(&job.parameters) {
            Ok(params) => params,
            Err(e) => {
                // Intake validates too; this covers rows written by older
                // builds or direct store writers.
                tracing::warn!(job_id = %job_id, error = %e, "unplannable job parameters");
                let now = self.clock.now_utc();
                self.store.set_job_error(job_id, Some(e.to_string())).await?;
                self.store
                    .transition_job(job_id, &[JobStatus::Pending], JobStatus::Failed, now)
                    .await?;
                self.bus
                    .publish(&Event::JobFailed { job_id, error: e.to_string() })
                    .await?;
                return Ok(());
            }
        };

        let specs = plan::plan(&params);
        let now = self.clock.now_utc();

        // Materialize ids, then rewrite stage-name dependencies.
        let ids: HashMap<&str, TaskId> =
            specs.iter().map(|s| (s.stage.as_str(), TaskId::new())).collect();
        let tasks: Vec<Task> = specs
            .iter()
            .map(|s| Task {
                id: ids[s.stage.as_str()],
                job_id,
                stage: s.stage.clone(),
                engine_id: s.engine_id.clone(),
                status: TaskStatus::Pending,
                dependencies: s.depends_on.iter().map(|d| ids[d.as_str()]).collect(),
                config: s.config.clone(),
                input_uri: None,
                output_uri: None,
                retries: 0,
                max_retries: s.max_retries,
                required: s.required,
                error: None,
                timeout_s: s.timeout_s,
                created_at: now,
                started_at: None,
                completed_at: None,
            })
            .collect();

        self.store.insert_tasks(tasks).await?;
        self.store
            .transition_job(job_id, &[JobStatus::Pending], JobStatus::Running, now)
            .await?;

        tracing::info!(
            job_id = %job_id,
            stages = specs.len(),
            speaker_detection = %params.speaker_detection,
            "pipeline planned"
        );

        let Some(job) = self.store.get_job(job_id).await? else {
            return Ok(());
        };
        self.advance_job(&job).await
    }
}
