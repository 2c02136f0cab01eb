// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dalston_core::tenant::DEFAULT_TENANT_ID;
use dalston_core::{FakeClock, Job, JobStatus, RealtimeSession, SessionStatus};
use dalston_storage::{JobStore, MemoryStore, SessionStore};

fn setup() -> (Arc<MemoryStore>, FakeClock, RetentionService<MemoryStore, FakeClock>) {
    let clock = FakeClock::new();
    let store = Arc::new(MemoryStore::seeded_at(clock.now_utc()));
    let service = RetentionService::new(store.clone(), clock.clone());
    (store, clock, service)
}

#[tokio::test]
async fn create_and_resolve_tenant_policy() {
    let (_store, _clock, service) = setup();
    let policy = service
        .create_policy(
            DEFAULT_TENANT_ID,
            CreatePolicyRequest::new("one-day", RetentionMode::AutoDelete { hours: 24 }),
        )
        .await
        .unwrap();

    let resolved =
        service.resolve_policy(DEFAULT_TENANT_ID, Some("one-day")).await.unwrap();
    assert_eq!(resolved.id, policy.id);
}

#[tokio::test]
async fn tenant_policy_shadows_system_policy() {
    let (_store, _clock, service) = setup();
    let shadow = service
        .create_policy(
            DEFAULT_TENANT_ID,
            CreatePolicyRequest::new("keep", RetentionMode::AutoDelete { hours: 1 }),
        )
        .await
        .unwrap();
    let resolved = service.resolve_policy(DEFAULT_TENANT_ID, Some("keep")).await.unwrap();
    assert_eq!(resolved.id, shadow.id);
    assert!(!resolved.is_system);
}

#[tokio::test]
async fn unnamed_resolution_uses_the_system_default() {
    let (_store, _clock, service) = setup();
    let resolved = service.resolve_policy(DEFAULT_TENANT_ID, None).await.unwrap();
    assert_eq!(resolved.id, SYSTEM_POLICY_DEFAULT);
}

#[tokio::test]
async fn duplicate_name_is_rejected() {
    let (_store, _clock, service) = setup();
    let request = CreatePolicyRequest::new("dup", RetentionMode::Keep);
    service.create_policy(DEFAULT_TENANT_ID, request.clone()).await.unwrap();
    let err = service.create_policy(DEFAULT_TENANT_ID, request).await.unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn invalid_modes_are_rejected() {
    let (_store, _clock, service) = setup();
    let err = service
        .create_policy(
            DEFAULT_TENANT_ID,
            CreatePolicyRequest::new("zero", RetentionMode::AutoDelete { hours: 0 }),
        )
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn system_policies_cannot_be_deleted() {
    let (_store, _clock, service) = setup();
    let err = service.delete_policy(DEFAULT_TENANT_ID, SYSTEM_POLICY_DEFAULT).await.unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn in_use_policies_cannot_be_deleted() {
    let (store, clock, service) = setup();
    let policy = service
        .create_policy(
            DEFAULT_TENANT_ID,
            CreatePolicyRequest::new("pinned", RetentionMode::Keep),
        )
        .await
        .unwrap();

    let mut job = Job::builder().build();
    job.retention_policy_id = Some(policy.id);
    job.created_at = clock.now_utc();
    store.insert_job(job).await.unwrap();

    let err = service.delete_policy(DEFAULT_TENANT_ID, policy.id).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn unused_policies_delete_cleanly() {
    let (_store, _clock, service) = setup();
    let policy = service
        .create_policy(
            DEFAULT_TENANT_ID,
            CreatePolicyRequest::new("scratch", RetentionMode::Keep),
        )
        .await
        .unwrap();
    service.delete_policy(DEFAULT_TENANT_ID, policy.id).await.unwrap();
    assert!(service
        .get_policy(DEFAULT_TENANT_ID, policy.id)
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn job_finalization_stamps_purge_after() {
    let (store, clock, service) = setup();
    let mut job = Job::builder().build();
    job.status = JobStatus::Completed;
    job.retention_policy_id = Some(SYSTEM_POLICY_DEFAULT);
    store.insert_job(job.clone()).await.unwrap();

    let completed_at = clock.now_utc();
    let purge_after = service.finalize_job_retention(&job, completed_at).await.unwrap();
    assert_eq!(purge_after, Some(completed_at + chrono::Duration::hours(720)));

    let stored = store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(stored.purge_after, purge_after);
}

#[tokio::test]
async fn session_purge_uses_realtime_override() {
    let (store, clock, service) = setup();
    let policy = service
        .create_policy(
            DEFAULT_TENANT_ID,
            CreatePolicyRequest::new("rt", RetentionMode::Keep)
                .realtime_mode(dalston_core::retention::RealtimeMode::AutoDelete)
                .realtime_hours(2u32),
        )
        .await
        .unwrap();

    let mut session = RealtimeSession::builder().build();
    session.status = SessionStatus::Completed;
    session.retention_policy_id = Some(policy.id);
    store.put_session(session.clone()).await.unwrap();

    let ended = clock.now_utc();
    let purge_after = service.session_purge_after(&session, ended).await.unwrap();
    assert_eq!(purge_after, Some(ended + chrono::Duration::hours(2)));
}
