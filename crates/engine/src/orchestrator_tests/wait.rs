// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wait-for-engine mode: parked tasks, wait markers, timeout handling.

use super::*;
use dalston_adapters::flags::{task_meta_key, WAITING_ENGINE_TASKS_KEY};
use dalston_adapters::FlagStore;
use dalston_services::settings::{KEY_UNAVAILABLE_BEHAVIOR, NS_ENGINES};
use std::time::Duration;

async fn wait_mode_ctx() -> TestContext {
    let ctx = TestContext::new();
    use dalston_storage::SettingsStore;
    ctx.store
        .set_setting(
            dalston_storage::SettingScope::System,
            NS_ENGINES,
            KEY_UNAVAILABLE_BEHAVIOR,
            "wait".to_string(),
        )
        .await
        .unwrap();
    ctx
}

#[tokio::test]
async fn tasks_park_with_wait_markers_when_no_engine_is_live() {
    let mut ctx = wait_mode_ctx().await;
    let job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;

    let prepare = ctx.task_by_stage(job.id, "prepare").await;
    assert_eq!(prepare.status, TaskStatus::Ready);
    assert_eq!(ctx.job(job.id).await.status, JobStatus::Running);

    let waiting = ctx.flags.set_members(WAITING_ENGINE_TASKS_KEY).await.unwrap();
    assert_eq!(waiting, vec![prepare.id.to_string()]);

    let meta = ctx.flags.hash_get_all(&task_meta_key(prepare.id)).await.unwrap();
    assert_eq!(meta["waiting_for_engine"], "true");
    assert_eq!(meta["queue_id"], "prepare");
    assert!(meta.contains_key("wait_deadline_at"));
    assert!(meta.contains_key("stream_message_id"));

    // The message is queued so a late engine can still claim it.
    let msg = ctx.queue.claim_next("prepare", "late-engine", Duration::ZERO).await.unwrap();
    assert!(msg.is_some());
}

#[tokio::test]
async fn late_engine_completion_clears_the_markers() {
    let mut ctx = wait_mode_ctx().await;
    let job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;
    let prepare = ctx.task_by_stage(job.id, "prepare").await;

    assert!(ctx.run_engine_ok("prepare", "late-engine", json!({})).await);

    assert_eq!(ctx.task_by_stage(job.id, "prepare").await.status, TaskStatus::Completed);
    let meta = ctx.flags.hash_get_all(&task_meta_key(prepare.id)).await.unwrap();
    assert!(!meta.contains_key("waiting_for_engine"));

    // The completed task left the waiting set; its dependent now parks
    // there instead, still starved of an engine.
    let transcribe = ctx.task_by_stage(job.id, "transcribe").await;
    assert_eq!(
        ctx.flags.set_members(WAITING_ENGINE_TASKS_KEY).await.unwrap(),
        vec![transcribe.id.to_string()]
    );
    assert_eq!(transcribe.status, TaskStatus::Ready);
}

#[tokio::test]
async fn wait_timeout_fails_the_task_without_retry() {
    let mut ctx = wait_mode_ctx().await;
    let job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;
    let prepare = ctx.task_by_stage(job.id, "prepare").await;

    ctx.bus
        .publish(&Event::TaskWaitTimeout {
            task_id: prepare.id,
            engine_id: "prepare".to_string(),
            queue_id: Some("prepare".to_string()),
            error: "engine 'prepare' did not become available within 300 seconds".to_string(),
        })
        .await
        .unwrap();
    ctx.pump().await;

    let prepare = ctx.task_by_stage(job.id, "prepare").await;
    assert_eq!(prepare.status, TaskStatus::Failed);
    assert_eq!(prepare.retries, 0);

    let job = ctx.job(job.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.as_deref().unwrap_or("").contains("did not become available"));
}
