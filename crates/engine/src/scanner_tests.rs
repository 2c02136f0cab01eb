// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{merge_output_json, TestContext};
use dalston_adapters::{EngineRegistry, TaskQueue};
use dalston_storage::TaskStore;
use dalston_core::JobStatus;
use dalston_services::settings::{KEY_UNAVAILABLE_BEHAVIOR, NS_ENGINES};
use dalston_services::CreateJobRequest;
use dalston_storage::{SettingScope, SettingsStore};
use serde_json::json;

type TestScanner = StaleTaskScanner<
    dalston_storage::MemoryStore,
    dalston_adapters::MemoryQueue<dalston_core::FakeClock>,
    dalston_adapters::MemoryBus,
    dalston_adapters::MemoryFlagStore<dalston_core::FakeClock>,
    dalston_adapters::MemoryEngineRegistry<dalston_core::FakeClock>,
    dalston_core::FakeClock,
>;

fn scanner_for(ctx: &TestContext, instance: &str) -> TestScanner {
    StaleTaskScanner::new(
        ctx.store.clone(),
        ctx.queue.clone(),
        ctx.bus.clone(),
        ctx.flags.clone(),
        ctx.engines.clone(),
        ctx.clock.clone(),
        instance,
    )
}

#[tokio::test]
async fn dead_engine_task_is_failed_and_redispatched() {
    let mut ctx = TestContext::new();
    ctx.heartbeat_all_engines().await;
    let scanner = scanner_for(&ctx, "host-a:1");

    let job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;
    assert!(ctx.run_engine_ok("prepare", "prep-1", json!({})).await);

    // A transcribe engine claims the task, then goes silent.
    ctx.engines.record_heartbeat("stt-dead", true).await.unwrap();
    let msg = ctx
        .queue
        .claim_next("transcribe", "stt-dead", std::time::Duration::ZERO)
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

    // Under the stale threshold nothing happens.
    ctx.clock.advance(std::time::Duration::from_secs(60));
    scanner.sweep_once().await.unwrap();
    ctx.pump().await;
    assert_eq!(ctx.task_by_stage(job.id, "transcribe").await.status, TaskStatus::Running);

    // Past the threshold, with stt-dead's heartbeat long gone. The stage
    // engines keep heartbeating so the retry can dispatch.
    ctx.clock.advance(STALE_THRESHOLD);
    ctx.heartbeat_all_engines().await;
    scanner.sweep_once().await.unwrap();
    ctx.pump().await;

    // Scanner failed it, the orchestrator retried it immediately.
    let task = ctx.task_by_stage(job.id, "transcribe").await;
    assert_eq!(task.status, TaskStatus::Ready);
    assert_eq!(task.retries, 1);
    // The stale message was acked out of the PEL.
    assert!(ctx.queue.pending_entry("transcribe", &msg.id).await.unwrap().is_none());

    // A replacement engine finishes the job.
    ctx.heartbeat_all_engines().await;
    assert!(ctx.run_engine_ok("transcribe", "stt-2", json!({})).await);
    assert!(ctx.run_engine_ok("align", "align-1", json!({})).await);
    assert!(ctx.run_engine_ok("merge", "merge-1", merge_output_json()).await);
    assert_eq!(ctx.job(job.id).await.status, JobStatus::Completed);
}

#[tokio::test]
async fn live_engine_past_deadline_is_timed_out() {
    let mut ctx = TestContext::new();
    ctx.heartbeat_all_engines().await;
    let scanner = scanner_for(&ctx, "host-a:1");

    let job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;
    let msg = ctx
        .queue
        .claim_next("prepare", "prep-1", std::time::Duration::ZERO)
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

    // Keep the claiming engine heartbeating past the task's own deadline
    // (prepare: 600 s) and the stale threshold.
    ctx.clock.advance(std::time::Duration::from_secs(601));
    ctx.heartbeat_all_engines().await;
    ctx.engines.record_heartbeat("prep-1", true).await.unwrap();
    scanner.sweep_once().await.unwrap();
    ctx.pump().await;

    let task = ctx.task_by_stage(job.id, "prepare").await;
    // Failed with reason timeout, then retried by the orchestrator.
    assert_eq!(task.retries, 1);
    assert_eq!(task.status, TaskStatus::Ready);
}

#[tokio::test]
async fn only_the_leader_sweeps() {
    let mut ctx = TestContext::new();
    ctx.heartbeat_all_engines().await;
    let scanner_a = scanner_for(&ctx, "host-a:1");
    let scanner_b = scanner_for(&ctx, "host-b:1");

    let _job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;

    use dalston_adapters::FlagStore;
    // B grabs the lease first; A's sweep must yield.
    assert!(ctx
        .flags
        .set_if_absent(
            dalston_adapters::flags::SCANNER_LEADER_KEY,
            "host-b:1",
            dalston_adapters::flags::SCANNER_LEADER_TTL,
        )
        .await
        .unwrap());
    scanner_a.sweep_once().await.unwrap();
    // The lease still belongs to B.
    assert_eq!(
        ctx.flags.get(dalston_adapters::flags::SCANNER_LEADER_KEY).await.unwrap().as_deref(),
        Some("host-b:1")
    );

    // B sweeps and releases its own lease.
    scanner_b.sweep_once().await.unwrap();
    assert!(ctx
        .flags
        .get(dalston_adapters::flags::SCANNER_LEADER_KEY)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn wait_deadline_elapsed_fails_the_unclaimed_task() {
    let mut ctx = TestContext::new();
    ctx.store
        .set_setting(
            SettingScope::System,
            NS_ENGINES,
            KEY_UNAVAILABLE_BEHAVIOR,
            "wait".to_string(),
        )
        .await
        .unwrap();
    let scanner = scanner_for(&ctx, "host-a:1");

    let job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;
    let prepare = ctx.task_by_stage(job.id, "prepare").await;
    assert_eq!(prepare.status, TaskStatus::Ready);

    // Deadline not reached: nothing happens.
    scanner.sweep_once().await.unwrap();
    ctx.pump().await;
    assert_eq!(ctx.task_by_stage(job.id, "prepare").await.status, TaskStatus::Ready);

    ctx.clock.advance(std::time::Duration::from_secs(301));
    scanner.sweep_once().await.unwrap();
    ctx.pump().await;

    let prepare = ctx.task_by_stage(job.id, "prepare").await;
    assert_eq!(prepare.status, TaskStatus::Failed);
    let job = ctx.job(job.id).await;
    assert_eq!(job.status, JobStatus::Failed);

    // The unclaimed message was deleted and the markers cleared.
    use dalston_adapters::FlagStore;
    assert!(ctx
        .flags
        .set_members(dalston_adapters::flags::WAITING_ENGINE_TASKS_KEY)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(ctx.queue.stream_info("prepare").await.unwrap().length, 0);
}

#[tokio::test]
async fn claimed_waiting_task_is_left_to_the_stale_path() {
    let mut ctx = TestContext::new();
    ctx.store
        .set_setting(
            SettingScope::System,
            NS_ENGINES,
            KEY_UNAVAILABLE_BEHAVIOR,
            "wait".to_string(),
        )
        .await
        .unwrap();
    let scanner = scanner_for(&ctx, "host-a:1");

    let job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;

    // An engine appears and claims the parked message just before the
    // deadline sweep.
    let msg = ctx
        .queue
        .claim_next("prepare", "late-prep", std::time::Duration::ZERO)
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

    ctx.clock.advance(std::time::Duration::from_secs(301));
    ctx.engines.record_heartbeat("late-prep", true).await.unwrap();
    scanner.sweep_once().await.unwrap();
    ctx.pump().await;

    // Not failed by the wait sweep; the markers are simply cleared.
    assert_eq!(ctx.task_by_stage(job.id, "prepare").await.status, TaskStatus::Running);
    assert_eq!(ctx.job(job.id).await.status, JobStatus::Running);
}
