// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn uuid_ids_round_trip_through_display_and_parse() {
    let id = JobId::new();
    let parsed = JobId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn uuid_ids_serialize_transparently() {
    let id = TaskId::from_u128(7);
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{}\"", id.0));
    let back: TaskId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn distinct_ids_are_distinct() {
    assert_ne!(JobId::new(), JobId::new());
}

#[test]
fn session_id_mint_has_prefix_and_length() {
    let id = SessionId::mint();
    assert!(id.as_str().starts_with("sess_"));
    assert_eq!(id.as_str().len(), "sess_".len() + 16);
    assert!(id.as_str()["sess_".len()..].chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn session_id_is_transparent_in_json() {
    let id = SessionId::from_string("sess_0123456789abcdef");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"sess_0123456789abcdef\"");
}
