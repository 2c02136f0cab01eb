// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! At-least-once tolerance: replayed events change nothing.

use super::*;

#[tokio::test]
async fn replayed_job_created_does_not_duplicate_tasks() {
    let mut ctx = TestContext::new();
    ctx.heartbeat_all_engines().await;

    let job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;
    let before = ctx.tasks(job.id).await.len();

    ctx.orchestrator
        .handle_event(&Event::JobCreated { job_id: job.id, request_id: None })
        .await
        .unwrap();
    ctx.pump().await;

    assert_eq!(ctx.tasks(job.id).await.len(), before);
}

#[tokio::test]
async fn replayed_task_completed_is_a_no_op() {
    let mut ctx = TestContext::new();
    ctx.heartbeat_all_engines().await;

    let job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;
    assert!(ctx.run_engine_ok("prepare", "prep-1", json!({})).await);
    let prepare = ctx.task_by_stage(job.id, "prepare").await;
    let completed_at = prepare.completed_at;

    ctx.clock.advance(std::time::Duration::from_secs(60));
    ctx.orchestrator
        .handle_event(&Event::TaskCompleted { task_id: prepare.id })
        .await
        .unwrap();
    ctx.pump().await;

    let replayed = ctx.task_by_stage(job.id, "prepare").await;
    assert_eq!(replayed.status, TaskStatus::Completed);
    assert_eq!(replayed.completed_at, completed_at);
    // The dependent was not re-dispatched into the stream a second time.
    let info = ctx.queue.stream_info("transcribe").await.unwrap();
    assert_eq!(info.length, 1);
}

#[tokio::test]
async fn replayed_failure_does_not_double_spend_the_retry_budget() {
    let mut ctx = TestContext::new();
    ctx.heartbeat_all_engines().await;

    let job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;
    assert!(ctx.run_engine_fail("prepare", "prep-1", "flaky", None).await);
    assert_eq!(ctx.task_by_stage(job.id, "prepare").await.retries, 1);

    let prepare = ctx.task_by_stage(job.id, "prepare").await;
    ctx.orchestrator
        .handle_event(&Event::TaskFailed {
            task_id: prepare.id,
            error: "flaky".to_string(),
            reason: None,
        })
        .await
        .unwrap();
    ctx.pump().await;

    // Replay saw a Ready task: recorded nothing, retried nothing.
    assert_eq!(ctx.task_by_stage(job.id, "prepare").await.retries, 1);
}

#[tokio::test]
async fn completed_job_survives_event_replays() {
    let mut ctx = TestContext::new();
    ctx.heartbeat_all_engines().await;

    let job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;
    ctx.run_pipeline_to_completion(job.id).await;
    let settled = ctx.job(job.id).await;
    assert_eq!(settled.status, JobStatus::Completed);

    for event in [
        Event::JobCreated { job_id: job.id, request_id: None },
        Event::JobCancelRequested { job_id: job.id },
        Event::JobCompleted { job_id: job.id },
    ] {
        ctx.orchestrator.handle_event(&event).await.unwrap();
    }
    ctx.pump().await;

    let after = ctx.job(job.id).await;
    assert_eq!(after.status, settled.status);
    assert_eq!(after.completed_at, settled.completed_at);
    assert_eq!(after.result, settled.result);
}

#[tokio::test]
async fn events_for_unknown_entities_are_ignored() {
    let mut ctx = TestContext::new();
    ctx.orchestrator
        .handle_event(&Event::TaskCompleted { task_id: dalston_core::TaskId::new() })
        .await
        .unwrap();
    ctx.orchestrator
        .handle_event(&Event::JobCreated { job_id: dalston_core::JobId::new(), request_id: None })
        .await
        .unwrap();
}
