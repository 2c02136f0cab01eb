// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dalston_core::tenant::DEFAULT_TENANT_ID;
use dalston_core::FakeClock;
use dalston_storage::MemoryStore;
use yare::parameterized;

fn setup() -> (FakeClock, SettingsService<MemoryStore, FakeClock>) {
    let clock = FakeClock::new();
    let store = Arc::new(MemoryStore::seeded_at(clock.now_utc()));
    (clock.clone(), SettingsService::new(store, clock))
}

#[tokio::test]
async fn defaults_apply_without_overrides() {
    let (_clock, service) = setup();
    assert_eq!(
        service.engine_unavailable_behavior(None).await.unwrap(),
        EngineUnavailableBehavior::FailFast
    );
    assert_eq!(
        service.engine_wait_timeout(None).await.unwrap(),
        std::time::Duration::from_secs(300)
    );
    assert_eq!(service.get_u64(None, NS_RETENTION, KEY_CLEANUP_BATCH_SIZE).await.unwrap(), 100);
}

#[tokio::test]
async fn tenant_override_wins_over_system_override() {
    let (clock, service) = setup();
    service.set_override(None, NS_ENGINES, KEY_UNAVAILABLE_BEHAVIOR, "wait").await.unwrap();
    service
        .set_override(
            Some(DEFAULT_TENANT_ID),
            NS_ENGINES,
            KEY_UNAVAILABLE_BEHAVIOR,
            "fail_fast",
        )
        .await
        .unwrap();

    // Let any stale cached resolution expire.
    clock.advance(CACHE_TTL + std::time::Duration::from_secs(1));

    assert_eq!(
        service.engine_unavailable_behavior(Some(DEFAULT_TENANT_ID)).await.unwrap(),
        EngineUnavailableBehavior::FailFast
    );
    assert_eq!(
        service.engine_unavailable_behavior(None).await.unwrap(),
        EngineUnavailableBehavior::Wait
    );
}

#[tokio::test]
async fn writer_invalidates_the_cache() {
    let (_clock, service) = setup();
    assert_eq!(
        service.engine_unavailable_behavior(None).await.unwrap(),
        EngineUnavailableBehavior::FailFast
    );
    service.set_override(None, NS_ENGINES, KEY_UNAVAILABLE_BEHAVIOR, "wait").await.unwrap();
    // Visible immediately despite the cache TTL.
    assert_eq!(
        service.engine_unavailable_behavior(None).await.unwrap(),
        EngineUnavailableBehavior::Wait
    );
}

#[tokio::test]
async fn cache_expires_after_its_ttl() {
    let (clock, service) = setup();
    let _ = service.get(None, NS_ENGINES, KEY_WAIT_TIMEOUT_SECONDS).await.unwrap();
    clock.advance(CACHE_TTL + std::time::Duration::from_secs(1));
    let _ = service.get(None, NS_ENGINES, KEY_WAIT_TIMEOUT_SECONDS).await.unwrap();
}

#[parameterized(
    select_ok = { NS_ENGINES, KEY_UNAVAILABLE_BEHAVIOR, "wait", true },
    select_unknown = { NS_ENGINES, KEY_UNAVAILABLE_BEHAVIOR, "explode", false },
    int_ok = { NS_ENGINES, KEY_WAIT_TIMEOUT_SECONDS, "60", true },
    int_below_min = { NS_ENGINES, KEY_WAIT_TIMEOUT_SECONDS, "5", false },
    int_above_max = { NS_ENGINES, KEY_WAIT_TIMEOUT_SECONDS, "9000", false },
    not_a_number = { NS_RETENTION, KEY_CLEANUP_BATCH_SIZE, "many", false },
)]
fn values_validate_against_the_definition(
    namespace: &str,
    key: &str,
    value: &str,
    ok: bool,
) {
    let def = find_definition(namespace, key).unwrap();
    assert_eq!(validate_value(def, value).is_ok(), ok);
}

#[tokio::test]
async fn unknown_settings_are_rejected() {
    let (_clock, service) = setup();
    let err = service.set_override(None, "nope", "nothing", "1").await.unwrap_err();
    assert!(err.is_validation());

    let err = service.get(None, NS_ENGINES, "nothing").await.unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn delete_override_restores_the_default() {
    let (_clock, service) = setup();
    service.set_override(None, NS_RETENTION, KEY_CLEANUP_BATCH_SIZE, "7").await.unwrap();
    assert_eq!(service.get_u64(None, NS_RETENTION, KEY_CLEANUP_BATCH_SIZE).await.unwrap(), 7);
    service.delete_override(None, NS_RETENTION, KEY_CLEANUP_BATCH_SIZE).await.unwrap();
    assert_eq!(service.get_u64(None, NS_RETENTION, KEY_CLEANUP_BATCH_SIZE).await.unwrap(), 100);
}
