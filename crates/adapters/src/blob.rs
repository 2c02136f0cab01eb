// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact blob store.
//!
//! Object-store semantics: put/get/delete plus prefix operations, which is
//! all retention needs to purge an owner without a manifest.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob backend: {0}")]
    Backend(String),

    #[error("blob {0} is not valid JSON: {1}")]
    Json(String, String),
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), BlobError>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError>;

    async fn delete(&self, key: &str) -> Result<(), BlobError>;

    /// Delete every blob under `prefix`; returns how many went away.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, BlobError>;

    async fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError>;

    async fn put_json(&self, key: &str, value: &serde_json::Value) -> Result<(), BlobError> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| BlobError::Json(key.to_string(), e.to_string()))?;
        self.put(key, bytes).await
    }

    async fn get_json(&self, key: &str) -> Result<Option<serde_json::Value>, BlobError> {
        match self.get(key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| BlobError::Json(key.to_string(), e.to_string())),
            None => Ok(None),
        }
    }
}

/// In-memory blob store; ordered map so prefix scans are cheap.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), BlobError> {
        self.blobs.lock().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError> {
        Ok(self.blobs.lock().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.blobs.lock().remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, BlobError> {
        let mut blobs = self.blobs.lock();
        let keys: Vec<String> =
            blobs.range(prefix.to_string()..).take_while(|(k, _)| k.starts_with(prefix)).map(|(k, _)| k.clone()).collect();
        for key in &keys {
            blobs.remove(key);
        }
        Ok(keys.len() as u64)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError> {
        let blobs = self.blobs.lock();
        Ok(blobs
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[cfg(test)]
#[path = "blob_tests.rs"]
mod tests;
