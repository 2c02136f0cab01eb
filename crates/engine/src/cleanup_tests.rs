// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dalston_adapters::MemoryBlobStore;
use dalston_core::retention::SYSTEM_POLICY_KEEP;
use dalston_core::{FakeClock, Job, RealtimeSession, SessionId};
use dalston_storage::{AuditStore, JobStore, MemoryStore, SessionStore};
use std::sync::Arc;

struct Ctx {
    clock: FakeClock,
    store: Arc<MemoryStore>,
    blobs: Arc<MemoryBlobStore>,
    worker: CleanupWorker<MemoryStore, MemoryBlobStore, FakeClock>,
}

fn setup() -> Ctx {
    let clock = FakeClock::new();
    let store = Arc::new(MemoryStore::seeded_at(clock.now_utc()));
    let blobs = Arc::new(MemoryBlobStore::new());
    let worker = CleanupWorker::new(store.clone(), blobs.clone(), clock.clone());
    Ctx { clock, store, blobs, worker }
}

async fn seed_job_blobs(ctx: &Ctx, job: &Job) {
    let audio = paths::job_audio_key(job.id, "wav");
    let task_blob = format!("{}t/input.json", paths::job_tasks_prefix(job.id));
    let transcript = paths::transcript_key(job.id);
    for key in [audio, task_blob, transcript] {
        ctx.blobs.put(&key, vec![1]).await.unwrap();
    }
}

async fn expired_job(ctx: &Ctx, scope: RetentionScope) -> Job {
    let mut job = Job::builder().build();
    job.retention_scope = scope;
    job.purge_after = Some(ctx.clock.now_utc() - chrono::Duration::hours(1));
    ctx.store.insert_job(job.clone()).await.unwrap();
    seed_job_blobs(ctx, &job).await;
    job
}

#[tokio::test]
async fn all_scope_deletes_everything() {
    let ctx = setup();
    let job = expired_job(&ctx, RetentionScope::All).await;

    ctx.worker.sweep_once().await.unwrap();

    assert!(ctx.blobs.list(&paths::job_prefix(job.id)).await.unwrap().is_empty());
    let stored = ctx.store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(stored.purged_at, Some(ctx.clock.now_utc()));

    let audit = ctx.store.recent_audit(10).await.unwrap();
    assert!(audit.iter().any(|e| e.action == "job.purged"));
}

#[tokio::test]
async fn audio_only_scope_preserves_the_transcript() {
    let ctx = setup();
    let job = expired_job(&ctx, RetentionScope::AudioOnly).await;

    ctx.worker.sweep_once().await.unwrap();

    let remaining = ctx.blobs.list(&paths::job_prefix(job.id)).await.unwrap();
    assert_eq!(remaining, vec![paths::transcript_key(job.id)]);
    assert!(ctx.store.get_job(job.id).await.unwrap().unwrap().purged_at.is_some());
}

#[tokio::test]
async fn unexpired_and_keep_jobs_are_left_alone() {
    let ctx = setup();

    let mut future = Job::builder().build();
    future.purge_after = Some(ctx.clock.now_utc() + chrono::Duration::hours(1));
    ctx.store.insert_job(future.clone()).await.unwrap();

    let mut keep = Job::builder().build();
    keep.retention_policy_id = Some(SYSTEM_POLICY_KEEP);
    keep.purge_after = None;
    ctx.store.insert_job(keep.clone()).await.unwrap();

    ctx.worker.sweep_once().await.unwrap();

    assert!(ctx.store.get_job(future.id).await.unwrap().unwrap().purged_at.is_none());
    assert!(ctx.store.get_job(keep.id).await.unwrap().unwrap().purged_at.is_none());
}

#[tokio::test]
async fn purge_is_not_repeated() {
    let ctx = setup();
    let job = expired_job(&ctx, RetentionScope::All).await;

    ctx.worker.sweep_once().await.unwrap();
    let first = ctx.store.get_job(job.id).await.unwrap().unwrap().purged_at;

    ctx.clock.advance(std::time::Duration::from_secs(3600));
    ctx.worker.sweep_once().await.unwrap();
    assert_eq!(ctx.store.get_job(job.id).await.unwrap().unwrap().purged_at, first);
}

#[tokio::test]
async fn expired_sessions_are_purged_too() {
    let ctx = setup();
    let mut session = RealtimeSession::builder().build();
    session.purge_after = Some(ctx.clock.now_utc() - chrono::Duration::minutes(5));
    ctx.store.put_session(session.clone()).await.unwrap();
    ctx.blobs
        .put(&paths::session_audio_key(&session.id), vec![1])
        .await
        .unwrap();

    ctx.worker.sweep_once().await.unwrap();

    assert!(ctx.blobs.list(&paths::session_prefix(&session.id)).await.unwrap().is_empty());
    let stored = ctx
        .store
        .get_session(&SessionId::from_string(session.id.as_str()))
        .await
        .unwrap()
        .unwrap();
    assert!(stored.purged_at.is_some());
}
