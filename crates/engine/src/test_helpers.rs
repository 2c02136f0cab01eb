// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test fixtures: an in-memory control plane plus a scriptable
//! engine that claims, works and acknowledges like a real one.

use crate::orchestrator::{Orchestrator, OrchestratorDeps};
use dalston_adapters::{
    ArtifactStore, BusSubscriber, EngineRegistry, EventBus, MemoryBlobStore, MemoryBus,
    MemoryEngineRegistry, MemoryFlagStore, MemoryQueue, TaskQueue,
};
use dalston_core::tenant::DEFAULT_TENANT_ID;
use dalston_core::{
    paths, plan, Clock, Event, FakeClock, Job, JobId, Task, TaskFailureReason, TaskStatus,
};
use dalston_services::{CreateJobRequest, JobsService, WebhookService};
use dalston_storage::{JobStore, MemoryStore, TaskStore};
use std::sync::Arc;
use std::time::Duration;

pub(crate) type TestOrchestrator = Orchestrator<
    MemoryStore,
    MemoryQueue<FakeClock>,
    MemoryBus,
    MemoryBlobStore,
    MemoryFlagStore<FakeClock>,
    MemoryEngineRegistry<FakeClock>,
    FakeClock,
>;

pub(crate) struct TestContext {
    pub clock: FakeClock,
    pub store: Arc<MemoryStore>,
    pub queue: Arc<MemoryQueue<FakeClock>>,
    pub bus: Arc<MemoryBus>,
    pub blobs: Arc<MemoryBlobStore>,
    pub flags: Arc<MemoryFlagStore<FakeClock>>,
    pub engines: Arc<MemoryEngineRegistry<FakeClock>>,
    pub orchestrator: TestOrchestrator,
    pub jobs: JobsService<MemoryStore, MemoryBus, MemoryFlagStore<FakeClock>, FakeClock>,
    subscriber: BusSubscriber,
}

/// Every stage of the full pipeline, for engine heartbeats.
pub(crate) const ALL_STAGES: [&str; 7] = [
    plan::STAGE_PREPARE,
    plan::STAGE_TRANSCRIBE,
    plan::STAGE_ALIGN,
    plan::STAGE_DIARIZE,
    plan::STAGE_PII_DETECT,
    plan::STAGE_AUDIO_REDACT,
    plan::STAGE_MERGE,
];

impl TestContext {
    pub fn new() -> Self {
        let clock = FakeClock::new();
        let store = Arc::new(MemoryStore::seeded_at(clock.now_utc()));
        let queue = Arc::new(MemoryQueue::new(clock.clone()));
        let bus = Arc::new(MemoryBus::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let flags = Arc::new(MemoryFlagStore::new(clock.clone()));
        let engines = Arc::new(MemoryEngineRegistry::new(clock.clone()));

        let subscriber = bus.subscribe();
        let orchestrator = Orchestrator::new(
            OrchestratorDeps {
                store: store.clone(),
                queue: queue.clone(),
                bus: bus.clone(),
                blobs: blobs.clone(),
                flags: flags.clone(),
                engines: engines.clone(),
            },
            clock.clone(),
            WebhookService::new("test-secret", clock.clone()),
        );
        let jobs = JobsService::new(store.clone(), bus.clone(), flags.clone(), clock.clone());

        Self { clock, store, queue, bus, blobs, flags, engines, orchestrator, jobs, subscriber }
    }

    /// Heartbeat an engine for every pipeline stage.
    pub async fn heartbeat_all_engines(&self) {
        for stage in ALL_STAGES {
            self.engines.record_heartbeat(stage, true).await.unwrap();
        }
    }

    /// Drain the bus through the orchestrator until quiet. Events
    /// published while handling are picked up in the same pass.
    pub async fn pump(&mut self) {
        while let Some(event) = self.subscriber.try_recv() {
            self.orchestrator.handle_event(&event).await.unwrap();
        }
    }

    pub async fn create_job(&mut self, request: CreateJobRequest) -> Job {
        let job = self.jobs.create_job(DEFAULT_TENANT_ID, request).await.unwrap();
        self.pump().await;
        job
    }

    pub async fn job(&self, job_id: JobId) -> Job {
        self.store.get_job(job_id).await.unwrap().unwrap()
    }

    pub async fn tasks(&self, job_id: JobId) -> Vec<Task> {
        self.store.tasks_for_job(job_id).await.unwrap()
    }

    pub async fn task_by_stage(&self, job_id: JobId, stage: &str) -> Task {
        self.tasks(job_id)
            .await
            .into_iter()
            .find(|t| t.stage == stage)
            .unwrap_or_else(|| panic!("no task for stage {stage}"))
    }

    /// Claim one message from `stage`, complete it with `output`, ack,
    /// and pump the resulting events. Returns false when the stream was
    /// empty.
    pub async fn run_engine_ok(
        &mut self,
        stage: &str,
        consumer: &str,
        output: serde_json::Value,
    ) -> bool {
        let Some(msg) = self.queue.claim_next(stage, consumer, Duration::ZERO).await.unwrap()
        else {
            return false;
        };
        self.store
            .transition_task(
                msg.task_id,
                &[TaskStatus::Ready],
                TaskStatus::Running,
                self.clock.now_utc(),
            )
            .await
            .unwrap();
        self.blobs
            .put_json(&paths::task_output_key(msg.job_id, msg.task_id), &output)
            .await
            .unwrap();
        self.bus.publish(&Event::TaskCompleted { task_id: msg.task_id }).await.unwrap();
        self.queue.ack(stage, &msg.id).await.unwrap();
        self.pump().await;
        true
    }

    /// Claim one message and report failure for it.
    pub async fn run_engine_fail(
        &mut self,
        stage: &str,
        consumer: &str,
        error: &str,
        reason: Option<TaskFailureReason>,
    ) -> bool {
        let Some(msg) = self.queue.claim_next(stage, consumer, Duration::ZERO).await.unwrap()
        else {
            return false;
        };
        self.store
            .transition_task(
                msg.task_id,
                &[TaskStatus::Ready],
                TaskStatus::Running,
                self.clock.now_utc(),
            )
            .await
            .unwrap();
        self.bus
            .publish(&Event::TaskFailed {
                task_id: msg.task_id,
                error: error.to_string(),
                reason,
            })
            .await
            .unwrap();
        self.queue.ack(stage, &msg.id).await.unwrap();
        self.pump().await;
        true
    }

    /// Run the whole pipeline to completion with canned outputs.
    pub async fn run_pipeline_to_completion(&mut self, job_id: JobId) {
        // Bounded: every iteration either completes a task or stops.
        for _ in 0..32 {
            let mut progressed = false;
            let tasks = self.tasks(job_id).await;
            for task in tasks.iter().filter(|t| t.status == TaskStatus::Ready) {
                let output = if task.stage == plan::STAGE_MERGE {
                    merge_output_json()
                } else {
                    serde_json::json!({})
                };
                if self.run_engine_ok(&task.engine_id, "engine-test", output).await {
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
    }
}

/// A realistic merge output for stats assertions.
pub(crate) fn merge_output_json() -> serde_json::Value {
    serde_json::json!({
        "text": "good morning and welcome to the show",
        "language_code": "en",
        "duration": 42.5,
        "segments": [
            {"start": 0.0, "end": 2.1, "text": "good morning"},
            {"start": 2.1, "end": 4.0, "text": "and welcome to the show"},
        ],
        "words": [],
    })
}

pub(crate) fn merge_output_with_speakers(speakers: &[&str]) -> serde_json::Value {
    let segments: Vec<serde_json::Value> = speakers
        .iter()
        .enumerate()
        .map(|(i, s)| {
            serde_json::json!({
                "start": i as f64,
                "end": (i + 1) as f64,
                "text": format!("segment {i}"),
                "speaker": s,
            })
        })
        .collect();
    serde_json::json!({
        "text": "multi speaker transcript",
        "language_code": "en",
        "duration": 12.0,
        "segments": segments,
    })
}
