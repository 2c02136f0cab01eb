// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure handling: retries, exhausted budgets, fail-fast dispatch.

use super::*;

#[tokio::test]
async fn failed_task_is_retried_and_recovers() {
    let mut ctx = TestContext::new();
    ctx.heartbeat_all_engines().await;

    let job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;
    assert!(ctx.run_engine_ok("prepare", "prep-1", json!({})).await);

    assert!(ctx.run_engine_fail("transcribe", "stt-1", "GPU OOM", None).await);
    let task = ctx.task_by_stage(job.id, "transcribe").await;
    assert_eq!(task.status, TaskStatus::Ready);
    assert_eq!(task.retries, 1);
    assert_eq!(ctx.job(job.id).await.status, JobStatus::Running);

    // A replacement engine picks up the re-published message.
    assert!(ctx.run_engine_ok("transcribe", "stt-2", json!({})).await);
    assert!(ctx.run_engine_ok("align", "align-1", json!({})).await);
    assert!(ctx.run_engine_ok("merge", "merge-1", merge_output_json()).await);
    assert_eq!(ctx.job(job.id).await.status, JobStatus::Completed);
}

#[tokio::test]
async fn exhausted_retries_fail_the_job() {
    let mut ctx = TestContext::new();
    ctx.heartbeat_all_engines().await;

    let job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;
    assert!(ctx.run_engine_ok("prepare", "prep-1", json!({})).await);

    // Default budget: two retries, three attempts total.
    for attempt in 0..3 {
        assert!(
            ctx.run_engine_fail("transcribe", "stt-1", "decode error", None).await,
            "attempt {attempt} should find a message"
        );
    }

    let task = ctx.task_by_stage(job.id, "transcribe").await;
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.retries, 2);

    let job = ctx.job(job.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.as_deref().unwrap_or("").contains("transcribe"));
    assert!(job.error.as_deref().unwrap_or("").contains("decode error"));

    // Downstream work never ran.
    assert_eq!(ctx.task_by_stage(job.id, "align").await.status, TaskStatus::Cancelled);
    assert_eq!(ctx.task_by_stage(job.id, "merge").await.status, TaskStatus::Cancelled);
}

#[tokio::test]
async fn job_failure_schedules_failed_webhook() {
    let mut ctx = TestContext::new();
    ctx.heartbeat_all_engines().await;

    let job = ctx
        .create_job(
            CreateJobRequest::new("s3://b/a.wav").webhook_url("https://example.com/hook"),
        )
        .await;
    for _ in 0..3 {
        ctx.run_engine_fail("prepare", "prep-1", "bad container", None).await;
    }
    assert_eq!(ctx.job(job.id).await.status, JobStatus::Failed);

    use dalston_storage::DeliveryStore;
    let due = ctx.store.claim_due_deliveries(ctx.clock.now_utc(), 10).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].event_type, "transcription.failed");
    assert!(due[0].payload["error"].as_str().unwrap_or("").contains("bad container"));
}

#[tokio::test]
async fn fail_fast_dispatch_without_engine() {
    let mut ctx = TestContext::new();
    // No heartbeats at all: the default behavior fails at dispatch.
    let job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;

    let prepare = ctx.task_by_stage(job.id, "prepare").await;
    assert_eq!(prepare.status, TaskStatus::Failed);
    assert!(prepare.error.as_deref().unwrap_or("").contains("prepare"));

    let job = ctx.job(job.id).await;
    assert_eq!(job.status, JobStatus::Failed);
}

#[tokio::test]
async fn engine_reported_failure_records_the_error() {
    let mut ctx = TestContext::new();
    ctx.heartbeat_all_engines().await;

    let job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;
    assert!(ctx.run_engine_fail("prepare", "prep-1", "unsupported codec", None).await);

    let task = ctx.task_by_stage(job.id, "prepare").await;
    assert_eq!(task.error.as_deref(), Some("unsupported codec"));
}

#[tokio::test]
async fn engine_unavailable_reason_is_not_retried() {
    let mut ctx = TestContext::new();
    ctx.heartbeat_all_engines().await;

    let job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;
    assert!(ctx
        .run_engine_fail(
            "prepare",
            "prep-1",
            "no engine",
            Some(TaskFailureReason::EngineUnavailable),
        )
        .await);

    assert_eq!(ctx.task_by_stage(job.id, "prepare").await.retries, 0);
    assert_eq!(ctx.job(job.id).await.status, JobStatus::Failed);
}
