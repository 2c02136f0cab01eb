// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use dalston_core::FakeClock;
use dalston_storage::{AuditStore, MemoryStore, StoreError};

#[tokio::test]
async fn log_appends_an_entry() {
    let clock = FakeClock::new();
    let store = Arc::new(MemoryStore::seeded_at(clock.now_utc()));
    let audit = AuditService::new(store.clone(), clock);

    audit
        .log(
            "job.purged",
            "job",
            "some-job",
            AuditContext {
                detail: Some(serde_json::json!({"artifacts_deleted": ["audio", "tasks"]})),
                ..AuditContext::default()
            },
        )
        .await;

    let entries = store.recent_audit(10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "job.purged");
    assert_eq!(entries[0].actor_type, "system");
}

struct BrokenAuditStore;

#[async_trait]
impl AuditStore for BrokenAuditStore {
    async fn append_audit(&self, _entry: dalston_storage::AuditEntry) -> Result<(), StoreError> {
        Err(StoreError::Backend("disk full".to_string()))
    }

    async fn recent_audit(
        &self,
        _limit: usize,
    ) -> Result<Vec<dalston_storage::AuditEntry>, StoreError> {
        Ok(vec![])
    }
}

#[tokio::test]
async fn write_failures_are_swallowed_and_counted() {
    let before = dalston_core::metrics::METRICS.snapshot().audit_write_failures;
    let audit = AuditService::new(Arc::new(BrokenAuditStore), FakeClock::new());

    // Must not propagate the backend error.
    audit.log("job.created", "job", "j", AuditContext::default()).await;

    let after = dalston_core::metrics::METRICS.snapshot().audit_write_failures;
    assert_eq!(after, before + 1);
}
