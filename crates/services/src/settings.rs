// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admin-overridable settings.
//!
//! Every setting is declared in a registry with its type, bounds and
//! environment variable. Resolution order: tenant override → system
//! override → environment → code default. Overrides are cached per
//! process for a few seconds; the writer invalidates.

use crate::error::ServiceError;
use dalston_core::{Clock, TenantId};
use dalston_storage::{SettingScope, SettingsStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const CACHE_TTL: Duration = Duration::from_secs(5);

pub const NS_ENGINES: &str = "engines";
pub const NS_RETENTION: &str = "retention";
pub const NS_RATE_LIMITS: &str = "rate_limits";

pub const KEY_UNAVAILABLE_BEHAVIOR: &str = "unavailable_behavior";
pub const KEY_WAIT_TIMEOUT_SECONDS: &str = "wait_timeout_seconds";
pub const KEY_CLEANUP_INTERVAL_SECONDS: &str = "cleanup_interval_seconds";
pub const KEY_CLEANUP_BATCH_SIZE: &str = "cleanup_batch_size";
pub const KEY_CONCURRENT_JOBS: &str = "concurrent_jobs";
pub const KEY_CONCURRENT_SESSIONS: &str = "concurrent_sessions";

/// Value shape of a setting, with validation bounds.
#[derive(Debug, Clone, Copy)]
pub enum SettingType {
    Int { min: i64, max: i64 },
    Select(&'static [&'static str]),
}

/// Schema for one admin-configurable setting.
#[derive(Debug, Clone, Copy)]
pub struct SettingDefinition {
    pub namespace: &'static str,
    pub key: &'static str,
    pub value_type: SettingType,
    pub default: &'static str,
    pub env_var: &'static str,
}

/// The full registry of known settings.
pub const SETTING_DEFINITIONS: &[SettingDefinition] = &[
    SettingDefinition {
        namespace: NS_ENGINES,
        key: KEY_UNAVAILABLE_BEHAVIOR,
        value_type: SettingType::Select(&["fail_fast", "wait"]),
        default: "fail_fast",
        env_var: "ENGINE_UNAVAILABLE_BEHAVIOR",
    },
    SettingDefinition {
        namespace: NS_ENGINES,
        key: KEY_WAIT_TIMEOUT_SECONDS,
        value_type: SettingType::Int { min: 10, max: 3600 },
        default: "300",
        env_var: "ENGINE_WAIT_TIMEOUT_SECONDS",
    },
    SettingDefinition {
        namespace: NS_RETENTION,
        key: KEY_CLEANUP_INTERVAL_SECONDS,
        value_type: SettingType::Int { min: 10, max: 86_400 },
        default: "300",
        env_var: "RETENTION_CLEANUP_INTERVAL_SECONDS",
    },
    SettingDefinition {
        namespace: NS_RETENTION,
        key: KEY_CLEANUP_BATCH_SIZE,
        value_type: SettingType::Int { min: 1, max: 10_000 },
        default: "100",
        env_var: "RETENTION_CLEANUP_BATCH_SIZE",
    },
    SettingDefinition {
        namespace: NS_RATE_LIMITS,
        key: KEY_CONCURRENT_JOBS,
        value_type: SettingType::Int { min: 1, max: 1000 },
        default: "10",
        env_var: "RATE_LIMIT_CONCURRENT_JOBS",
    },
    SettingDefinition {
        namespace: NS_RATE_LIMITS,
        key: KEY_CONCURRENT_SESSIONS,
        value_type: SettingType::Int { min: 1, max: 1000 },
        default: "5",
        env_var: "RATE_LIMIT_CONCURRENT_SESSIONS",
    },
];

pub fn find_definition(namespace: &str, key: &str) -> Option<&'static SettingDefinition> {
    SETTING_DEFINITIONS.iter().find(|d| d.namespace == namespace && d.key == key)
}

/// What the dispatcher does when a task's engine has no live consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineUnavailableBehavior {
    /// Fail the task immediately with a diagnostic.
    FailFast,
    /// Keep the task ready and let the scanner enforce a wait deadline.
    Wait,
}

type CacheKey = (Option<TenantId>, &'static str, &'static str);

pub struct SettingsService<S, C> {
    store: Arc<S>,
    clock: C,
    cache: Mutex<HashMap<CacheKey, (Option<String>, u64)>>,
}

impl<S, C> SettingsService<S, C>
where
    S: SettingsStore,
    C: Clock,
{
    pub fn new(store: Arc<S>, clock: C) -> Self {
        Self { store, clock, cache: Mutex::new(HashMap::new()) }
    }

    /// Resolve one setting for a tenant (or system-wide with `None`).
    pub async fn get(
        &self,
        tenant_id: Option<TenantId>,
        namespace: &str,
        key: &str,
    ) -> Result<String, ServiceError> {
        let def = find_definition(namespace, key).ok_or_else(|| {
            ServiceError::Validation(format!("unknown setting {namespace}.{key}"))
        })?;

        if let Some(tenant) = tenant_id {
            if let Some(value) = self.cached_override(Some(tenant), def).await? {
                return Ok(value);
            }
        }
        if let Some(value) = self.cached_override(None, def).await? {
            return Ok(value);
        }
        if let Ok(value) = std::env::var(def.env_var) {
            if !value.is_empty() {
                return Ok(value);
            }
        }
        Ok(def.default.to_string())
    }

    pub async fn get_u64(
        &self,
        tenant_id: Option<TenantId>,
        namespace: &str,
        key: &str,
    ) -> Result<u64, ServiceError> {
        let value = self.get(tenant_id, namespace, key).await?;
        value.parse().map_err(|_| {
            ServiceError::Validation(format!("setting {namespace}.{key} is not an integer"))
        })
    }

    pub async fn engine_unavailable_behavior(
        &self,
        tenant_id: Option<TenantId>,
    ) -> Result<EngineUnavailableBehavior, ServiceError> {
        let value = self.get(tenant_id, NS_ENGINES, KEY_UNAVAILABLE_BEHAVIOR).await?;
        Ok(match value.as_str() {
            "wait" => EngineUnavailableBehavior::Wait,
            _ => EngineUnavailableBehavior::FailFast,
        })
    }

    pub async fn engine_wait_timeout(
        &self,
        tenant_id: Option<TenantId>,
    ) -> Result<Duration, ServiceError> {
        Ok(Duration::from_secs(
            self.get_u64(tenant_id, NS_ENGINES, KEY_WAIT_TIMEOUT_SECONDS).await?,
        ))
    }

    /// Write an override after validating against the definition.
    pub async fn set_override(
        &self,
        tenant_id: Option<TenantId>,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ServiceError> {
        let def = find_definition(namespace, key).ok_or_else(|| {
            ServiceError::Validation(format!("unknown setting {namespace}.{key}"))
        })?;
        validate_value(def, value)?;

        let scope = scope_for(tenant_id);
        self.store.set_setting(scope, namespace, key, value.to_string()).await?;
        self.invalidate(tenant_id, def);
        Ok(())
    }

    pub async fn delete_override(
        &self,
        tenant_id: Option<TenantId>,
        namespace: &str,
        key: &str,
    ) -> Result<(), ServiceError> {
        let def = find_definition(namespace, key).ok_or_else(|| {
            ServiceError::Validation(format!("unknown setting {namespace}.{key}"))
        })?;
        self.store.delete_setting(&scope_for(tenant_id), namespace, key).await?;
        self.invalidate(tenant_id, def);
        Ok(())
    }

    async fn cached_override(
        &self,
        tenant_id: Option<TenantId>,
        def: &'static SettingDefinition,
    ) -> Result<Option<String>, ServiceError> {
        let cache_key = (tenant_id, def.namespace, def.key);
        let now = self.clock.epoch_ms();
        {
            let cache = self.cache.lock();
            if let Some((value, expires)) = cache.get(&cache_key) {
                if *expires > now {
                    return Ok(value.clone());
                }
            }
        }

        let value =
            self.store.get_setting(&scope_for(tenant_id), def.namespace, def.key).await?;
        self.cache
            .lock()
            .insert(cache_key, (value.clone(), now + CACHE_TTL.as_millis() as u64));
        Ok(value)
    }

    fn invalidate(&self, tenant_id: Option<TenantId>, def: &'static SettingDefinition) {
        self.cache.lock().remove(&(tenant_id, def.namespace, def.key));
    }
}

fn scope_for(tenant_id: Option<TenantId>) -> SettingScope {
    match tenant_id {
        Some(id) => SettingScope::Tenant(id),
        None => SettingScope::System,
    }
}

fn validate_value(def: &SettingDefinition, value: &str) -> Result<(), ServiceError> {
    match def.value_type {
        SettingType::Int { min, max } => {
            let n: i64 = value.parse().map_err(|_| {
                ServiceError::Validation(format!(
                    "{}.{} must be an integer",
                    def.namespace, def.key
                ))
            })?;
            if n < min || n > max {
                return Err(ServiceError::Validation(format!(
                    "{}.{} must be between {min} and {max}",
                    def.namespace, def.key
                )));
            }
        }
        SettingType::Select(options) => {
            if !options.contains(&value) {
                return Err(ServiceError::Validation(format!(
                    "{}.{} must be one of: {}",
                    def.namespace,
                    def.key,
                    options.join(", ")
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
