// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

#[test]
fn null_parameters_use_defaults() {
    let params = JobParameters::from_value(&serde_json::Value::Null).unwrap();
    assert_eq!(params, JobParameters::default());
    assert_eq!(params.timestamps, TimestampsGranularity::Word);
}

#[test]
fn empty_map_uses_defaults() {
    let params = JobParameters::from_value(&json!({})).unwrap();
    assert_eq!(params.speaker_detection, SpeakerDetection::None);
    assert!(!params.pii.detect);
}

#[test]
fn unknown_keys_are_ignored() {
    let params = JobParameters::from_value(&json!({"future_option": true})).unwrap();
    assert_eq!(params, JobParameters::default());
}

#[test]
fn diarize_with_speaker_bounds() {
    let params = JobParameters::from_value(&json!({
        "speaker_detection": "diarize",
        "min_speakers": 2,
        "max_speakers": 4,
    }))
    .unwrap();
    assert_eq!(
        params.speaker_detection,
        SpeakerDetection::Diarize { min_speakers: Some(2), max_speakers: Some(4) }
    );
}

#[test]
fn per_channel_parses_channel_count() {
    let params = JobParameters::from_value(&json!({
        "speaker_detection": "per_channel",
        "num_channels": 2,
        "timestamps_granularity": "segment",
    }))
    .unwrap();
    assert_eq!(params.speaker_detection, SpeakerDetection::PerChannel { num_channels: 2 });
    assert_eq!(params.timestamps, TimestampsGranularity::Segment);
}

#[test]
fn per_channel_defaults_to_one_channel() {
    let params =
        JobParameters::from_value(&json!({"speaker_detection": "per_channel"})).unwrap();
    assert_eq!(params.speaker_detection, SpeakerDetection::PerChannel { num_channels: 1 });
}

#[test]
fn inverted_speaker_range_is_rejected() {
    let err = JobParameters::from_value(&json!({
        "speaker_detection": "diarize",
        "min_speakers": 5,
        "max_speakers": 2,
    }))
    .unwrap_err();
    assert_eq!(err, ParamsError::SpeakerRangeInverted { min: 5, max: 2 });
}

#[parameterized(
    zero = { 0 },
    too_many = { 17 },
)]
fn channel_count_out_of_range_is_rejected(n: u32) {
    let err = JobParameters::from_value(&json!({
        "speaker_detection": "per_channel",
        "num_channels": n,
    }))
    .unwrap_err();
    assert_eq!(err, ParamsError::InvalidChannelCount(n));
}

#[test]
fn unknown_speaker_detection_is_rejected() {
    let err =
        JobParameters::from_value(&json!({"speaker_detection": "psychic"})).unwrap_err();
    assert_eq!(err, ParamsError::UnknownSpeakerDetection("psychic".to_string()));
}

#[test]
fn redaction_requires_detection() {
    let err = JobParameters::from_value(&json!({"redact_pii_audio": true})).unwrap_err();
    assert_eq!(err, ParamsError::RedactWithoutDetect);
}

#[test]
fn pii_options_parse() {
    let params = JobParameters::from_value(&json!({
        "pii_detection": true,
        "redact_pii_audio": true,
        "pii_redaction_mode": "silence",
    }))
    .unwrap();
    assert!(params.pii.detect);
    assert!(params.pii.redact_audio);
    assert_eq!(params.pii.redaction_mode, PiiRedactionMode::Silence);
}

#[test]
fn non_object_parameters_are_rejected() {
    let err = JobParameters::from_value(&json!([1, 2, 3])).unwrap_err();
    assert_eq!(err, ParamsError::NotAnObject);
}
