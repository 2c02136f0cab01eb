// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors surfaced by the control-plane loops.

use dalston_adapters::{BlobError, BusError, FlagError, QueueError, RegistryError};
use dalston_services::ServiceError;
use dalston_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Flags(#[from] FlagError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}
