// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use yare::parameterized;

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).single().unwrap()
}

#[test]
fn auto_delete_purges_after_hours() {
    let mode = RetentionMode::AutoDelete { hours: 48 };
    assert_eq!(mode.purge_after(at(0)), Some(at(0) + Duration::hours(48)));
}

#[test]
fn none_purges_immediately() {
    assert_eq!(RetentionMode::None.purge_after(at(12)), Some(at(12)));
}

#[test]
fn keep_never_purges() {
    assert_eq!(RetentionMode::Keep.purge_after(at(12)), None);
}

#[parameterized(
    auto_ok = { "auto_delete", Some(24), Ok(RetentionMode::AutoDelete { hours: 24 }) },
    auto_missing_hours = { "auto_delete", None, Err(PolicyError::HoursRequired) },
    auto_zero_hours = { "auto_delete", Some(0), Err(PolicyError::HoursOutOfRange) },
    keep_ok = { "keep", None, Ok(RetentionMode::Keep) },
    keep_with_hours = { "keep", Some(5), Err(PolicyError::HoursForbidden("keep".to_string())) },
    none_ok = { "none", None, Ok(RetentionMode::None) },
    none_with_hours = { "none", Some(5), Err(PolicyError::HoursForbidden("none".to_string())) },
    unknown = { "forever", None, Err(PolicyError::UnknownMode("forever".to_string())) },
)]
fn mode_from_parts(mode: &str, hours: Option<u32>, expected: Result<RetentionMode, PolicyError>) {
    assert_eq!(RetentionMode::from_parts(mode, hours), expected);
}

#[test]
fn realtime_inherit_uses_batch_mode() {
    let policy = RetentionPolicy::builder()
        .mode(RetentionMode::AutoDelete { hours: 12 })
        .build();
    assert_eq!(
        policy.effective_realtime_mode().unwrap(),
        RetentionMode::AutoDelete { hours: 12 }
    );
}

#[test]
fn realtime_override_takes_precedence() {
    let policy = RetentionPolicy::builder()
        .mode(RetentionMode::Keep)
        .realtime_mode(RealtimeMode::AutoDelete)
        .realtime_hours(2u32)
        .build();
    assert_eq!(
        policy.effective_realtime_mode().unwrap(),
        RetentionMode::AutoDelete { hours: 2 }
    );
}

#[test]
fn realtime_auto_delete_without_hours_is_invalid() {
    let policy = RetentionPolicy::builder()
        .realtime_mode(RealtimeMode::AutoDelete)
        .build();
    assert_eq!(policy.validate(), Err(PolicyError::HoursRequired));
}

#[test]
fn system_policies_are_well_known() {
    let policies = RetentionPolicy::system_policies(at(0));
    assert_eq!(policies.len(), 3);
    assert!(policies.iter().all(|p| p.is_system && p.tenant_id.is_none()));

    let by_name: std::collections::HashMap<&str, &RetentionPolicy> =
        policies.iter().map(|p| (p.name.as_str(), p)).collect();
    assert_eq!(by_name["default"].id, SYSTEM_POLICY_DEFAULT);
    assert_eq!(by_name["zero-retention"].mode, RetentionMode::None);
    assert_eq!(by_name["keep"].mode, RetentionMode::Keep);
}

#[test]
fn scope_parses() {
    assert_eq!(RetentionScope::parse("all").unwrap(), RetentionScope::All);
    assert_eq!(RetentionScope::parse("audio_only").unwrap(), RetentionScope::AudioOnly);
    assert!(RetentionScope::parse("some").is_err());
}
