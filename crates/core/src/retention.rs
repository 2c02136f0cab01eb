// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retention policies: when artifacts may be deleted.

use crate::id::{PolicyId, TenantId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Well-known system policies, seeded at bootstrap and undeletable.
pub const SYSTEM_POLICY_DEFAULT: PolicyId = PolicyId::from_u128(0x01);
pub const SYSTEM_POLICY_ZERO_RETENTION: PolicyId = PolicyId::from_u128(0x02);
pub const SYSTEM_POLICY_KEEP: PolicyId = PolicyId::from_u128(0x03);

/// Hours the system `default` policy keeps artifacts (30 days).
pub const DEFAULT_RETENTION_HOURS: u32 = 720;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("hours is required when mode is 'auto_delete'")]
    HoursRequired,

    #[error("hours must be at least 1")]
    HoursOutOfRange,

    #[error("hours must be null when mode is '{0}'")]
    HoursForbidden(String),

    #[error("unknown retention mode: {0}")]
    UnknownMode(String),

    #[error("unknown retention scope: {0}")]
    UnknownScope(String),

    #[error("unknown realtime retention mode: {0}")]
    UnknownRealtimeMode(String),
}

/// Deletion contract for an owner's artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetentionMode {
    /// Purge `hours` after the owner finalizes.
    AutoDelete { hours: u32 },
    /// Never purge.
    Keep,
    /// Artifacts exist only transiently for processing; purge on the next
    /// sweep after finalization.
    None,
}

crate::simple_display! {
    RetentionMode {
        AutoDelete { .. } => "auto_delete",
        Keep => "keep",
        None => "none",
    }
}

impl RetentionMode {
    /// Reassemble from the stored `(mode, hours)` column pair, enforcing
    /// `auto_delete ⇔ hours ≥ 1`.
    pub fn from_parts(mode: &str, hours: Option<u32>) -> Result<Self, PolicyError> {
        match mode {
            "auto_delete" => match hours {
                Some(h) if h >= 1 => Ok(RetentionMode::AutoDelete { hours: h }),
                Some(_) => Err(PolicyError::HoursOutOfRange),
                Option::None => Err(PolicyError::HoursRequired),
            },
            "keep" => match hours {
                Option::None => Ok(RetentionMode::Keep),
                Some(_) => Err(PolicyError::HoursForbidden("keep".to_string())),
            },
            "none" => match hours {
                Option::None => Ok(RetentionMode::None),
                Some(_) => Err(PolicyError::HoursForbidden("none".to_string())),
            },
            other => Err(PolicyError::UnknownMode(other.to_string())),
        }
    }

    pub fn hours(&self) -> Option<u32> {
        match self {
            RetentionMode::AutoDelete { hours } => Some(*hours),
            _ => Option::None,
        }
    }

    /// Deadline after which the owner's artifacts may be purged.
    /// `None` (the return value) means never.
    pub fn purge_after(&self, finalized_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            RetentionMode::AutoDelete { hours } => {
                Some(finalized_at + Duration::hours(i64::from(*hours)))
            }
            RetentionMode::Keep => Option::None,
            RetentionMode::None => Some(finalized_at),
        }
    }
}

/// Which artifacts a purge removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionScope {
    /// Everything under the owner's prefix.
    All,
    /// Audio and task intermediates; the final transcript survives.
    AudioOnly,
}

crate::simple_display! {
    RetentionScope {
        All => "all",
        AudioOnly => "audio_only",
    }
}

impl RetentionScope {
    pub fn parse(s: &str) -> Result<Self, PolicyError> {
        match s {
            "all" => Ok(RetentionScope::All),
            "audio_only" => Ok(RetentionScope::AudioOnly),
            other => Err(PolicyError::UnknownScope(other.to_string())),
        }
    }
}

/// Realtime sessions can inherit the batch mode or override it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealtimeMode {
    Inherit,
    AutoDelete,
    Keep,
    None,
}

crate::simple_display! {
    RealtimeMode {
        Inherit => "inherit",
        AutoDelete => "auto_delete",
        Keep => "keep",
        None => "none",
    }
}

/// A named deletion contract, tenant-scoped or system-wide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub id: PolicyId,
    /// `None` for system policies.
    pub tenant_id: Option<TenantId>,
    pub name: String,
    pub mode: RetentionMode,
    pub scope: RetentionScope,
    pub realtime_mode: RealtimeMode,
    pub realtime_hours: Option<u32>,
    pub delete_realtime_on_enhancement: bool,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
}

impl RetentionPolicy {
    /// The mode applied to realtime sessions under this policy.
    pub fn effective_realtime_mode(&self) -> Result<RetentionMode, PolicyError> {
        match self.realtime_mode {
            RealtimeMode::Inherit => Ok(self.mode),
            RealtimeMode::AutoDelete => match self.realtime_hours {
                Some(h) if h >= 1 => Ok(RetentionMode::AutoDelete { hours: h }),
                Some(_) => Err(PolicyError::HoursOutOfRange),
                None => Err(PolicyError::HoursRequired),
            },
            RealtimeMode::Keep => Ok(RetentionMode::Keep),
            RealtimeMode::None => Ok(RetentionMode::None),
        }
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if let RetentionMode::AutoDelete { hours } = self.mode {
            if hours < 1 {
                return Err(PolicyError::HoursOutOfRange);
            }
        }
        // Realtime overrides are checked the same way they are resolved.
        self.effective_realtime_mode().map(|_| ())
    }

    /// The three policies every deployment carries.
    pub fn system_policies(now: DateTime<Utc>) -> Vec<RetentionPolicy> {
        let base = |id, name: &str, mode| RetentionPolicy {
            id,
            tenant_id: None,
            name: name.to_string(),
            mode,
            scope: RetentionScope::All,
            realtime_mode: RealtimeMode::Inherit,
            realtime_hours: None,
            delete_realtime_on_enhancement: true,
            is_system: true,
            created_at: now,
        };
        vec![
            base(
                SYSTEM_POLICY_DEFAULT,
                "default",
                RetentionMode::AutoDelete { hours: DEFAULT_RETENTION_HOURS },
            ),
            base(SYSTEM_POLICY_ZERO_RETENTION, "zero-retention", RetentionMode::None),
            base(SYSTEM_POLICY_KEEP, "keep", RetentionMode::Keep),
        ]
    }
}

crate::builder! {
    pub struct RetentionPolicyBuilder => RetentionPolicy {
        into {
            name: String = "test-policy",
        }
        set {
            id: PolicyId = PolicyId::new(),
            mode: RetentionMode = RetentionMode::AutoDelete { hours: 24 },
            scope: RetentionScope = RetentionScope::All,
            realtime_mode: RealtimeMode = RealtimeMode::Inherit,
            delete_realtime_on_enhancement: bool = true,
            is_system: bool = false,
            created_at: chrono::DateTime<chrono::Utc> = chrono::DateTime::<chrono::Utc>::MIN_UTC,
        }
        option {
            tenant_id: TenantId = None,
            realtime_hours: u32 = None,
        }
    }
}

#[cfg(test)]
#[path = "retention_tests.rs"]
mod tests;
