// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dalston_adapters::MemoryWorkerRegistry;
use dalston_core::{FakeClock, WorkerId, WorkerInfo, WorkerStatus};

fn setup() -> (Arc<MemoryWorkerRegistry<FakeClock>>, SessionAllocator<MemoryWorkerRegistry<FakeClock>, FakeClock>, FakeClock)
{
    let clock = FakeClock::new();
    let registry = Arc::new(MemoryWorkerRegistry::new(clock.clone()));
    let allocator = SessionAllocator::new(registry.clone(), clock.clone());
    (registry, allocator, clock)
}

fn worker(id: &str, capacity: u32, active: u32) -> WorkerInfo {
    WorkerInfo::builder()
        .worker_id(id)
        .endpoint(format!("ws://{id}:9000"))
        .capacity(capacity)
        .active_sessions(active)
        .build()
}

#[tokio::test]
async fn least_loaded_worker_wins() {
    let (registry, allocator, _clock) = setup();
    registry.put_worker(worker("busy", 4, 3)).await.unwrap();
    registry.put_worker(worker("idle", 4, 0)).await.unwrap();

    let allocation = allocator.acquire("auto", None, "10.0.0.1", false).await.unwrap().unwrap();
    assert_eq!(allocation.worker_id, WorkerId::new("idle"));
    assert!(allocation.session_id.as_str().starts_with("sess_"));

    let idle = registry.get_worker(&WorkerId::new("idle")).await.unwrap().unwrap();
    assert_eq!(idle.active_sessions, 1);
}

#[tokio::test]
async fn allocation_respects_model_and_language() {
    let (registry, allocator, _clock) = setup();
    let mut english_only = worker("en-worker", 2, 0);
    english_only.languages_supported = vec!["en".to_string()];
    english_only.models_loaded = vec!["fast".to_string()];
    registry.put_worker(english_only).await.unwrap();

    assert!(allocator.acquire("de", None, "ip", false).await.unwrap().is_none());
    assert!(allocator.acquire("en", Some("accurate"), "ip", false).await.unwrap().is_none());
    assert!(allocator.acquire("en", Some("fast"), "ip", false).await.unwrap().is_some());
}

#[tokio::test]
async fn capacity_bounds_the_number_of_sessions() {
    let (registry, allocator, _clock) = setup();
    registry.put_worker(worker("a", 2, 0)).await.unwrap();
    registry.put_worker(worker("b", 1, 0)).await.unwrap();

    let mut allocations = Vec::new();
    for _ in 0..5 {
        if let Some(a) = allocator.acquire("auto", None, "ip", false).await.unwrap() {
            allocations.push(a);
        }
    }
    // Total capacity is 3: exactly three succeed, the rest report none.
    assert_eq!(allocations.len(), 3);

    // After releasing everything, the counters return to their floor.
    for allocation in &allocations {
        allocator.release(&allocation.session_id).await.unwrap();
    }
    for id in ["a", "b"] {
        let w = registry.get_worker(&WorkerId::new(id)).await.unwrap().unwrap();
        assert_eq!(w.active_sessions, 0, "worker {id}");
    }
}

#[tokio::test]
async fn release_returns_prior_state_and_marks_ended() {
    let (registry, allocator, _clock) = setup();
    registry.put_worker(worker("a", 2, 0)).await.unwrap();

    let allocation = allocator.acquire("en", None, "10.1.1.1", true).await.unwrap().unwrap();
    let record = allocator.release(&allocation.session_id).await.unwrap().unwrap();
    assert_eq!(record.status, SessionRecordStatus::Active);
    assert_eq!(record.language, "en");
    assert!(record.enhance_on_end);

    let after = registry.get_session_record(&allocation.session_id).await.unwrap().unwrap();
    assert_eq!(after.status, SessionRecordStatus::Ended);

    assert!(registry
        .worker_sessions(&WorkerId::new("a"))
        .await
        .unwrap()
        .is_empty());
    assert!(registry.active_session_ids().await.unwrap().is_empty());
}

#[tokio::test]
async fn double_release_is_harmless() {
    let (registry, allocator, clock) = setup();
    registry.put_worker(worker("a", 2, 0)).await.unwrap();
    let allocation = allocator.acquire("auto", None, "ip", false).await.unwrap().unwrap();

    allocator.release(&allocation.session_id).await.unwrap();
    // A second release hits the clamped counter and empty sets.
    allocator.release(&allocation.session_id).await.unwrap();
    clock.advance(ENDED_SESSION_TTL + std::time::Duration::from_secs(1));
    assert!(allocator.release(&allocation.session_id).await.unwrap().is_none());

    let w = registry.get_worker(&WorkerId::new("a")).await.unwrap().unwrap();
    assert_eq!(w.active_sessions, 0);
}

#[tokio::test]
async fn draining_and_offline_workers_get_nothing() {
    let (registry, allocator, _clock) = setup();
    let mut draining = worker("d", 4, 0);
    draining.status = WorkerStatus::Draining;
    registry.put_worker(draining).await.unwrap();

    assert!(allocator.acquire("auto", None, "ip", false).await.unwrap().is_none());
}

#[tokio::test]
async fn no_workers_means_no_capacity() {
    let (_registry, allocator, _clock) = setup();
    assert!(allocator.acquire("auto", None, "ip", false).await.unwrap().is_none());
}
