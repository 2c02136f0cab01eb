// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellation: stop the unclaimed, drain the running.

use super::*;
use dalston_adapters::flags::job_cancelled_key;
use dalston_adapters::FlagStore;
use std::time::Duration;

#[tokio::test]
async fn cancel_mid_run_drains_to_cancelled() {
    let mut ctx = TestContext::new();
    ctx.heartbeat_all_engines().await;

    let job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;
    assert!(ctx.run_engine_ok("prepare", "prep-1", json!({})).await);

    // An engine claims transcribe and starts working.
    let msg = ctx
        .queue
        .claim_next("transcribe", "stt-1", Duration::ZERO)
        .await
        .unwrap()
        .unwrap();
    ctx.store
        .transition_task(
            msg.task_id,
            &[TaskStatus::Ready],
            TaskStatus::Running,
            ctx.clock.now_utc(),
        )
        .await
        .unwrap();

    ctx.jobs.cancel_job(DEFAULT_TENANT_ID, job.id).await.unwrap();
    ctx.pump().await;

    // Unclaimed tasks are cancelled; the claimed one drains.
    assert_eq!(ctx.job(job.id).await.status, JobStatus::Cancelling);
    assert_eq!(ctx.task_by_stage(job.id, "align").await.status, TaskStatus::Cancelled);
    assert_eq!(ctx.task_by_stage(job.id, "merge").await.status, TaskStatus::Cancelled);
    assert!(ctx.flags.exists(&job_cancelled_key(job.id)).await.unwrap());

    // The engine notices the flag and aborts.
    ctx.bus
        .publish(&dalston_core::Event::TaskFailed {
            task_id: msg.task_id,
            error: "job cancelled".to_string(),
            reason: Some(TaskFailureReason::Cancelled),
        })
        .await
        .unwrap();
    ctx.queue.ack("transcribe", &msg.id).await.unwrap();
    ctx.pump().await;

    let job = ctx.job(job.id).await;
    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.error, None);
    assert!(job.completed_at.is_some());
}

#[tokio::test]
async fn cancel_before_any_claim_settles_immediately() {
    let mut ctx = TestContext::new();
    ctx.heartbeat_all_engines().await;

    let job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;
    ctx.jobs.cancel_job(DEFAULT_TENANT_ID, job.id).await.unwrap();
    ctx.pump().await;

    let job = ctx.job(job.id).await;
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(ctx.tasks(job.id).await.iter().all(|t| t.status == TaskStatus::Cancelled));
}

#[tokio::test]
async fn cancel_after_terminal_is_a_conflict_at_the_api() {
    let mut ctx = TestContext::new();
    ctx.heartbeat_all_engines().await;

    let job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;
    ctx.jobs.cancel_job(DEFAULT_TENANT_ID, job.id).await.unwrap();
    ctx.pump().await;
    assert_eq!(ctx.job(job.id).await.status, JobStatus::Cancelled);

    let err = ctx.jobs.cancel_job(DEFAULT_TENANT_ID, job.id).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn cancel_that_outruns_planning_still_settles() {
    let mut ctx = TestContext::new();

    // The job row exists but its job.created event never arrived.
    let mut job = dalston_core::Job::builder().build();
    job.created_at = ctx.clock.now_utc();
    ctx.store.insert_job(job.clone()).await.unwrap();

    ctx.jobs.cancel_job(DEFAULT_TENANT_ID, job.id).await.unwrap();
    ctx.pump().await;

    let job = ctx.job(job.id).await;
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(ctx.tasks(job.id).await.is_empty());
}

#[tokio::test]
async fn completed_tasks_keep_their_status_through_cancel() {
    let mut ctx = TestContext::new();
    ctx.heartbeat_all_engines().await;

    let job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;
    assert!(ctx.run_engine_ok("prepare", "prep-1", json!({})).await);

    ctx.jobs.cancel_job(DEFAULT_TENANT_ID, job.id).await.unwrap();
    ctx.pump().await;

    assert_eq!(ctx.task_by_stage(job.id, "prepare").await.status, TaskStatus::Completed);
    assert_eq!(ctx.job(job.id).await.status, JobStatus::Cancelled);
}
