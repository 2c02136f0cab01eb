// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dalston_adapters::{MemoryBus, MemoryFlagStore};
use dalston_core::retention::{RetentionMode, SYSTEM_POLICY_DEFAULT, SYSTEM_POLICY_KEEP};
use dalston_core::tenant::DEFAULT_TENANT_ID;
use dalston_core::FakeClock;
use dalston_storage::{AuditStore, JobStore, MemoryStore};
use serde_json::json;

struct Ctx {
    store: Arc<MemoryStore>,
    bus: Arc<MemoryBus>,
    flags: Arc<MemoryFlagStore<FakeClock>>,
    clock: FakeClock,
    jobs: JobsService<MemoryStore, MemoryBus, MemoryFlagStore<FakeClock>, FakeClock>,
}

fn setup() -> Ctx {
    let clock = FakeClock::new();
    let store = Arc::new(MemoryStore::seeded_at(clock.now_utc()));
    let bus = Arc::new(MemoryBus::new());
    let flags = Arc::new(MemoryFlagStore::new(clock.clone()));
    let jobs = JobsService::new(store.clone(), bus.clone(), flags.clone(), clock.clone());
    Ctx { store, bus, flags, clock, jobs }
}

#[tokio::test]
async fn create_job_persists_and_announces() {
    let ctx = setup();
    let mut sub = ctx.bus.subscribe();

    let job = ctx
        .jobs
        .create_job(DEFAULT_TENANT_ID, CreateJobRequest::new("s3://b/a.wav"))
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.retention_policy_id, Some(SYSTEM_POLICY_DEFAULT));
    assert!(ctx.store.get_job(job.id).await.unwrap().is_some());
    assert_eq!(sub.try_recv(), Some(Event::JobCreated { job_id: job.id, request_id: None }));

    let audit = ctx.store.recent_audit(10).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].action, "job.created");
}

#[tokio::test]
async fn create_job_resolves_named_policy() {
    let ctx = setup();
    let job = ctx
        .jobs
        .create_job(
            DEFAULT_TENANT_ID,
            CreateJobRequest::new("s3://b/a.wav").retention_policy("keep"),
        )
        .await
        .unwrap();
    assert_eq!(job.retention_policy_id, Some(SYSTEM_POLICY_KEEP));
}

#[tokio::test]
async fn create_job_rejects_unknown_policy() {
    let ctx = setup();
    let err = ctx
        .jobs
        .create_job(
            DEFAULT_TENANT_ID,
            CreateJobRequest::new("s3://b/a.wav").retention_policy("nope"),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn create_job_rejects_invalid_parameters() {
    let ctx = setup();
    let err = ctx
        .jobs
        .create_job(
            DEFAULT_TENANT_ID,
            CreateJobRequest::new("s3://b/a.wav").parameters(json!({
                "speaker_detection": "diarize",
                "min_speakers": 6,
                "max_speakers": 2,
            })),
        )
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn create_job_caps_webhook_metadata() {
    let ctx = setup();
    let big = "x".repeat(17 * 1024);
    let err = ctx
        .jobs
        .create_job(
            DEFAULT_TENANT_ID,
            CreateJobRequest::new("s3://b/a.wav").webhook_metadata(json!({ "blob": big })),
        )
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn create_job_rejects_bad_webhook_scheme() {
    let ctx = setup();
    let err = ctx
        .jobs
        .create_job(
            DEFAULT_TENANT_ID,
            CreateJobRequest::new("s3://b/a.wav").webhook_url("ftp://example.com/hook"),
        )
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn cancel_sets_flag_and_publishes() {
    let ctx = setup();
    let job = ctx
        .jobs
        .create_job(DEFAULT_TENANT_ID, CreateJobRequest::new("s3://b/a.wav"))
        .await
        .unwrap();
    let mut sub = ctx.bus.subscribe();

    let cancelled = ctx.jobs.cancel_job(DEFAULT_TENANT_ID, job.id).await.unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelling);

    use dalston_adapters::FlagStore;
    assert!(ctx.flags.exists(&job_cancelled_key(job.id)).await.unwrap());
    assert_eq!(sub.try_recv(), Some(Event::JobCancelRequested { job_id: job.id }));
}

#[tokio::test]
async fn double_cancel_is_idempotent_while_draining() {
    let ctx = setup();
    let job = ctx
        .jobs
        .create_job(DEFAULT_TENANT_ID, CreateJobRequest::new("s3://b/a.wav"))
        .await
        .unwrap();

    ctx.jobs.cancel_job(DEFAULT_TENANT_ID, job.id).await.unwrap();
    let again = ctx.jobs.cancel_job(DEFAULT_TENANT_ID, job.id).await.unwrap();
    assert_eq!(again.status, JobStatus::Cancelling);
}

#[tokio::test]
async fn cancel_of_terminal_job_conflicts() {
    let ctx = setup();
    let job = ctx
        .jobs
        .create_job(DEFAULT_TENANT_ID, CreateJobRequest::new("s3://b/a.wav"))
        .await
        .unwrap();
    ctx.store
        .transition_job(job.id, &[JobStatus::Pending], JobStatus::Running, ctx.clock.now_utc())
        .await
        .unwrap();
    ctx.store
        .transition_job(job.id, &[JobStatus::Running], JobStatus::Completed, ctx.clock.now_utc())
        .await
        .unwrap();

    let err = ctx.jobs.cancel_job(DEFAULT_TENANT_ID, job.id).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn jobs_are_tenant_scoped() {
    let ctx = setup();
    let job = ctx
        .jobs
        .create_job(DEFAULT_TENANT_ID, CreateJobRequest::new("s3://b/a.wav"))
        .await
        .unwrap();
    let other = dalston_core::TenantId::new();
    assert!(ctx.jobs.get_job(other, job.id).await.unwrap_err().is_not_found());
}
