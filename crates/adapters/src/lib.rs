// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Substrate contracts and built-in backends.
//!
//! The control plane talks to its durable substrates through these traits:
//! a consumer-group task queue, a fire-and-forget event bus, an artifact
//! blob store, a TTL'd flag/lease store, the realtime worker and engine
//! registries, and a webhook HTTP sender. Each trait ships an in-memory
//! backend used by the single-process daemon and by tests; external
//! products (a streaming store, an object store) implement the same
//! contracts out of tree.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod blob;
pub mod bus;
pub mod flags;
pub mod http;
pub mod queue;
pub mod registry;

pub use blob::{ArtifactStore, BlobError, MemoryBlobStore};
pub use bus::{BusError, BusSubscriber, EventBus, MemoryBus};
pub use flags::{FlagError, FlagStore, MemoryFlagStore};
pub use http::{HttpWebhookSender, SendResult, WebhookSender};
pub use queue::{
    MemoryQueue, PendingEntry, QueueError, StreamInfo, StreamMessage, TaskQueue, CONSUMER_GROUP,
    STREAM_PREFIX,
};
pub use registry::{
    EngineRegistry, MemoryEngineRegistry, MemoryWorkerRegistry, RegistryError, SessionRecord,
    SessionRecordStatus, WorkerRegistry, ENGINE_HEARTBEAT_TIMEOUT,
};

#[cfg(any(test, feature = "test-support"))]
pub use http::FakeWebhookSender;
