// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Enhancement jobs: batch post-processing of a finished realtime
//! session's recorded audio (diarization, word alignment).

use crate::error::ServiceError;
use crate::jobs::{CreateJobRequest, JobsService};
use crate::sessions::RealtimeSessionService;
use dalston_adapters::{EventBus, FlagStore};
use dalston_core::{Clock, Job, SessionId, TenantId};
use dalston_storage::StateStore;
use serde_json::json;

/// What the batch pass should add on top of the realtime transcript.
#[derive(Debug, Clone, Copy)]
pub struct EnhancementOptions {
    pub diarization: bool,
    pub word_timestamps: bool,
}

impl Default for EnhancementOptions {
    fn default() -> Self {
        Self { diarization: true, word_timestamps: true }
    }
}

pub struct EnhancementService<S, B, F, C> {
    jobs: JobsService<S, B, F, C>,
    sessions: RealtimeSessionService<S, C>,
}

impl<S, B, F, C> EnhancementService<S, B, F, C>
where
    S: StateStore,
    B: EventBus,
    F: FlagStore,
    C: Clock,
{
    pub fn new(jobs: JobsService<S, B, F, C>, sessions: RealtimeSessionService<S, C>) -> Self {
        Self { jobs, sessions }
    }

    /// Create the batch job for a finished session.
    ///
    /// Requires recorded audio and a terminal session; a session is
    /// enhanced at most once.
    pub async fn create_enhancement_job(
        &self,
        tenant_id: TenantId,
        session_id: &SessionId,
        options: EnhancementOptions,
    ) -> Result<Job, ServiceError> {
        let session = self.sessions.get_session(tenant_id, session_id).await?;

        let Some(audio_uri) = session.audio_uri.clone() else {
            return Err(ServiceError::Validation(
                "cannot create enhancement job: session has no recorded audio".to_string(),
            ));
        };
        if !session.status.is_terminal() {
            return Err(ServiceError::Conflict(
                "cannot create enhancement job: session is still active".to_string(),
            ));
        }
        if let Some(existing) = session.enhancement_job_id {
            return Err(ServiceError::Conflict(format!(
                "session already has enhancement job {existing}"
            )));
        }

        let parameters = json!({
            "language": session.language.clone().unwrap_or_else(|| "auto".to_string()),
            "speaker_detection": if options.diarization { "diarize" } else { "none" },
            "timestamps_granularity": if options.word_timestamps { "word" } else { "segment" },
            "enhancement_source_session_id": session.id.to_string(),
        });

        let request = CreateJobRequest::new(audio_uri).parameters(parameters);
        let job = self.jobs.create_job(tenant_id, request).await?;
        self.sessions.set_enhancement_job(tenant_id, session_id, job.id).await?;

        tracing::info!(session_id = %session_id, job_id = %job.id, "enhancement job created");
        Ok(job)
    }
}

#[cfg(test)]
#[path = "enhancement_tests.rs"]
mod tests;
