// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon wiring: build the substrates, spawn the loops, drain on
//! shutdown.
//!
//! The built-in memory backends make one process a complete control
//! plane; external substrate products slot in by implementing the adapter
//! traits and swapping the constructors here.

use crate::env;
use dalston_adapters::{
    EventBus, HttpWebhookSender, MemoryBlobStore, MemoryBus, MemoryEngineRegistry,
    MemoryFlagStore, MemoryQueue, MemoryWorkerRegistry,
};
use dalston_core::SystemClock;
use dalston_engine::orchestrator::OrchestratorDeps;
use dalston_engine::{CleanupWorker, DeliveryWorker, Orchestrator, StaleTaskScanner};
use dalston_router::SessionRouter;
use dalston_services::WebhookService;
use dalston_storage::MemoryStore;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Run every control-plane loop until the shutdown token fires.
pub async fn run(shutdown: CancellationToken) -> Result<(), LifecycleError> {
    let clock = SystemClock;
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new(clock));
    let bus = Arc::new(MemoryBus::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let flags = Arc::new(MemoryFlagStore::new(clock));
    let engines = Arc::new(MemoryEngineRegistry::new(clock));
    let workers = Arc::new(MemoryWorkerRegistry::new(clock));

    let secret = env::webhook_secret();
    if secret == env::WEBHOOK_SECRET_DEFAULT {
        tracing::warn!(
            "using the default webhook secret, set WEBHOOK_SECRET for production use"
        );
    }
    let webhook_service = |allow_private: bool| {
        let service = WebhookService::new(secret.clone(), clock);
        if allow_private {
            service.with_private_urls_allowed()
        } else {
            service
        }
    };
    let allow_private = env::allow_private_webhook_urls();

    let orchestrator = Arc::new(Orchestrator::new(
        OrchestratorDeps {
            store: store.clone(),
            queue: queue.clone(),
            bus: bus.clone(),
            blobs: blobs.clone(),
            flags: flags.clone(),
            engines: engines.clone(),
        },
        clock,
        webhook_service(allow_private),
    ));

    let mut scanner = StaleTaskScanner::new(
        store.clone(),
        queue.clone(),
        bus.clone(),
        flags.clone(),
        engines.clone(),
        clock,
        env::instance_id(),
    );
    if let Some(interval) = env::scan_interval() {
        scanner = scanner.with_scan_interval(interval);
    }
    let scanner = Arc::new(scanner);

    let cleanup = Arc::new(CleanupWorker::new(store.clone(), blobs.clone(), clock));

    let sender = Arc::new(HttpWebhookSender::new()?);
    let delivery = Arc::new(DeliveryWorker::new(
        store.clone(),
        sender,
        webhook_service(allow_private),
        clock,
    ));

    let router = Arc::new(SessionRouter::new(workers, bus.clone(), clock));

    let subscriber = bus.subscribe();
    let mut handles = Vec::new();
    {
        let orchestrator = orchestrator.clone();
        let token = shutdown.clone();
        handles.push(tokio::spawn(async move {
            orchestrator.run(subscriber, token).await;
        }));
    }
    {
        let scanner = scanner.clone();
        let token = shutdown.clone();
        handles.push(tokio::spawn(async move { scanner.run(token).await }));
    }
    {
        let cleanup = cleanup.clone();
        let token = shutdown.clone();
        handles.push(tokio::spawn(async move { cleanup.run(token).await }));
    }
    {
        let delivery = delivery.clone();
        let token = shutdown.clone();
        handles.push(tokio::spawn(async move { delivery.run(token).await }));
    }
    {
        let router = router.clone();
        let token = shutdown.clone();
        handles.push(tokio::spawn(async move { router.run(token).await }));
    }

    tracing::info!("dalston control plane running");
    shutdown.cancelled().await;
    tracing::info!("shutting down");

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "loop task join failed");
        }
    }
    Ok(())
}
