// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier newtypes.
//!
//! Persistent entities are keyed by opaque UUIDs wrapped in per-entity
//! newtypes so a `JobId` can never be passed where a `TaskId` is expected.
//! Realtime sessions use a short prefixed string id minted at allocation
//! time (`sess_` + 16 hex chars).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Define a newtype ID wrapper around [`uuid::Uuid`].
///
/// Generates `new()` for random v4 generation, `from_uuid()`, `parse()`,
/// `as_uuid()`, `Display`, `FromStr`, and transparent serde.
#[macro_export]
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            /// Generate a new random ID.
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub const fn from_uuid(id: uuid::Uuid) -> Self {
                Self(id)
            }

            /// Well-known ID constructed from a 128-bit literal.
            pub const fn from_u128(v: u128) -> Self {
                Self(uuid::Uuid::from_u128(v))
            }

            /// Parse from the canonical hyphenated form.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(uuid::Uuid::parse_str(s)?))
            }

            pub fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(u: uuid::Uuid) -> Self {
                Self(u)
            }
        }
    };
}

define_uuid_id! {
    /// Unique identifier for a tenant.
    pub struct TenantId;
}

define_uuid_id! {
    /// Unique identifier for a batch transcription job.
    pub struct JobId;
}

define_uuid_id! {
    /// Unique identifier for a task inside a job's pipeline.
    pub struct TaskId;
}

define_uuid_id! {
    /// Unique identifier for a retention policy.
    pub struct PolicyId;
}

define_uuid_id! {
    /// Unique identifier for a webhook endpoint.
    pub struct EndpointId;
}

define_uuid_id! {
    /// Unique identifier for a webhook delivery attempt record.
    pub struct DeliveryId;
}

/// Realtime session identifier: `sess_` followed by 16 hex characters.
///
/// Minted by the session router at allocation time and used both as the
/// registry key and as the persistent row key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub const PREFIX: &'static str = "sess_";

    /// Mint a new session id from a random UUID's first 16 hex chars.
    pub fn mint() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("{}{}", Self::PREFIX, &hex[..16]))
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
