// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dalston_adapters::{BusSubscriber, MemoryBus, MemoryWorkerRegistry};
use dalston_core::{FakeClock, SessionId, WorkerId, WorkerInfo};

struct Ctx {
    clock: FakeClock,
    registry: Arc<MemoryWorkerRegistry<FakeClock>>,
    monitor: HealthMonitor<MemoryWorkerRegistry<FakeClock>, MemoryBus, FakeClock>,
    subscriber: BusSubscriber,
}

fn setup() -> Ctx {
    let clock = FakeClock::new();
    let registry = Arc::new(MemoryWorkerRegistry::new(clock.clone()));
    let bus = Arc::new(MemoryBus::new());
    let subscriber = bus.subscribe();
    let monitor = HealthMonitor::new(registry.clone(), bus, clock.clone());
    Ctx { clock, registry, monitor, subscriber }
}

#[tokio::test]
async fn fresh_workers_stay_online() {
    let ctx = setup();
    let mut worker = WorkerInfo::builder().worker_id("w1").build();
    worker.last_heartbeat = ctx.clock.now_utc();
    ctx.registry.put_worker(worker).await.unwrap();

    ctx.monitor.check_once().await.unwrap();

    let w = ctx.registry.get_worker(&WorkerId::new("w1")).await.unwrap().unwrap();
    assert_eq!(w.status, WorkerStatus::Ready);
}

#[tokio::test]
async fn stale_workers_go_offline_with_one_event_per_session() {
    let mut ctx = setup();
    let mut worker = WorkerInfo::builder().worker_id("w1").build();
    worker.last_heartbeat = ctx.clock.now_utc();
    ctx.registry.put_worker(worker).await.unwrap();

    let s1 = SessionId::from_string("sess_a");
    let s2 = SessionId::from_string("sess_b");
    ctx.registry.add_worker_session(&WorkerId::new("w1"), &s1).await.unwrap();
    ctx.registry.add_worker_session(&WorkerId::new("w1"), &s2).await.unwrap();

    ctx.clock.advance(HEARTBEAT_TIMEOUT + std::time::Duration::from_secs(1));
    ctx.monitor.check_once().await.unwrap();

    let w = ctx.registry.get_worker(&WorkerId::new("w1")).await.unwrap().unwrap();
    assert_eq!(w.status, WorkerStatus::Offline);

    let mut offline_sessions = Vec::new();
    while let Some(event) = ctx.subscriber.try_recv() {
        if let Event::WorkerOffline { worker_id, session_id } = event {
            assert_eq!(worker_id, WorkerId::new("w1"));
            offline_sessions.push(session_id);
        }
    }
    offline_sessions.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    assert_eq!(offline_sessions, vec![s1, s2]);
}

#[tokio::test]
async fn already_offline_workers_are_not_reannounced() {
    let mut ctx = setup();
    let mut worker = WorkerInfo::builder().worker_id("w1").build();
    worker.last_heartbeat = ctx.clock.now_utc();
    ctx.registry.put_worker(worker).await.unwrap();
    ctx.registry
        .add_worker_session(&WorkerId::new("w1"), &SessionId::from_string("sess_a"))
        .await
        .unwrap();

    ctx.clock.advance(std::time::Duration::from_secs(60));
    ctx.monitor.check_once().await.unwrap();
    while ctx.subscriber.try_recv().is_some() {}

    // Second pass: still offline, no fresh events.
    ctx.monitor.check_once().await.unwrap();
    assert!(ctx.subscriber.try_recv().is_none());
}
