// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service-level error taxonomy.

use dalston_adapters::{BlobError, BusError, FlagError};
use dalston_core::params::ParamsError;
use dalston_core::retention::PolicyError;
use dalston_storage::StoreError;
use thiserror::Error;

/// Errors surfaced to API callers.
///
/// `Validation` maps to 400, `Conflict` to 409, `NotFound` to 404;
/// everything else is a backing-store failure the outer layer logs.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Flags(#[from] FlagError),

    #[error(transparent)]
    Blob(#[from] BlobError),
}

impl From<ParamsError> for ServiceError {
    fn from(e: ParamsError) -> Self {
        ServiceError::Validation(e.to_string())
    }
}

impl From<PolicyError> for ServiceError {
    fn from(e: PolicyError) -> Self {
        ServiceError::Validation(e.to_string())
    }
}

impl ServiceError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ServiceError::Conflict(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ServiceError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound(_))
    }
}
