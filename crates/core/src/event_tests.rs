// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn events_tag_with_dotted_type() {
    let event = Event::JobCreated { job_id: JobId::from_u128(1), request_id: None };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "job.created");
    assert!(json.get("request_id").is_none());
}

#[test]
fn task_failed_round_trips_with_reason() {
    let event = Event::TaskFailed {
        task_id: TaskId::from_u128(2),
        error: "engine 'whisper-1' stopped heartbeating".to_string(),
        reason: Some(TaskFailureReason::EngineDead),
    };
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("\"reason\":\"engine_dead\""));
    let back: Event = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn unknown_event_types_deserialize_to_unknown() {
    let back: Event =
        serde_json::from_str(r#"{"type":"job.archived","job_id":"x"}"#).unwrap();
    assert_eq!(back, Event::Unknown);
}

#[test]
fn extra_fields_are_ignored() {
    let raw = serde_json::json!({
        "type": "task.completed",
        "task_id": TaskId::from_u128(9),
        "request_id": "req-1",
        "shard": 3,
    });
    let back: Event = serde_json::from_value(raw).unwrap();
    assert_eq!(back, Event::TaskCompleted { task_id: TaskId::from_u128(9) });
}

#[test]
fn retriable_reasons() {
    assert!(TaskFailureReason::EngineDead.is_retriable());
    assert!(TaskFailureReason::Timeout.is_retriable());
    assert!(!TaskFailureReason::Cancelled.is_retriable());
    assert!(!TaskFailureReason::EngineUnavailable.is_retriable());
}

#[test]
fn log_summaries_name_the_entity() {
    let id = JobId::from_u128(5);
    let summary = Event::JobCompleted { job_id: id }.log_summary();
    assert!(summary.contains(&id.to_string()));
}
