// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fire-and-forget event bus.
//!
//! Publishers must not assume any subscriber is live; missed events are
//! harmless because the recovery scanner and idempotent handlers catch up
//! from the state store.

use async_trait::async_trait;
use dalston_core::Event;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus backend: {0}")]
    Backend(String),
}

/// Receiving half of a subscription.
pub struct BusSubscriber {
    rx: broadcast::Receiver<Event>,
}

impl BusSubscriber {
    pub fn new(rx: broadcast::Receiver<Event>) -> Self {
        Self { rx }
    }

    /// Next event, or `None` once the channel is closed. A slow consumer
    /// that lagged simply skips ahead; losing events is within contract.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged, skipping ahead");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant used by tests to drain the channel.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: &Event) -> Result<(), BusError>;

    fn subscribe(&self) -> BusSubscriber;
}

/// In-process bus over a broadcast channel.
pub struct MemoryBus {
    tx: broadcast::Sender<Event>,
}

impl MemoryBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for MemoryBus {
    async fn publish(&self, event: &Event) -> Result<(), BusError> {
        // No receivers is fine; the bus is a wake signal only.
        let _ = self.tx.send(event.clone());
        Ok(())
    }

    fn subscribe(&self) -> BusSubscriber {
        BusSubscriber::new(self.tx.subscribe())
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
