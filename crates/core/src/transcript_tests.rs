// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn segment(text: &str, speaker: Option<&str>) -> TranscriptSegment {
    TranscriptSegment {
        start: 0.0,
        end: 1.0,
        text: text.to_string(),
        speaker: speaker.map(str::to_string),
        channel: None,
    }
}

#[test]
fn stats_from_plain_transcript() {
    let output = MergeOutput {
        text: "hello there general".to_string(),
        language_code: Some("en".to_string()),
        duration: Some(4.2),
        segments: vec![segment("hello there", None), segment("general", None)],
        words: vec![],
        pii: None,
        redacted_audio: None,
    };
    let stats = output.result_stats();
    assert_eq!(stats.word_count, 3);
    assert_eq!(stats.segment_count, 2);
    assert_eq!(stats.speaker_count, None);
    assert_eq!(stats.language_code.as_deref(), Some("en"));
    assert_eq!(stats.character_count, 19);
    assert_eq!(stats.audio_duration_seconds, Some(4.2));
}

#[test]
fn explicit_words_win_over_whitespace_count() {
    let output = MergeOutput {
        text: "one two".to_string(),
        language_code: None,
        duration: None,
        segments: vec![],
        words: vec![
            TranscriptWord { start: 0.0, end: 0.5, word: "one".to_string(), speaker: None },
            TranscriptWord { start: 0.5, end: 0.9, word: "two".to_string(), speaker: None },
            TranscriptWord { start: 0.9, end: 1.2, word: "three".to_string(), speaker: None },
        ],
        pii: None,
        redacted_audio: None,
    };
    assert_eq!(output.result_stats().word_count, 3);
}

#[test]
fn distinct_speakers_are_counted() {
    let output = MergeOutput {
        text: String::new(),
        language_code: None,
        duration: None,
        segments: vec![
            segment("a", Some("S0")),
            segment("b", Some("S1")),
            segment("c", Some("S0")),
        ],
        words: vec![],
        pii: None,
        redacted_audio: None,
    };
    assert_eq!(output.result_stats().speaker_count, Some(2));
}

#[test]
fn preview_truncates_on_char_boundaries() {
    let output = MergeOutput {
        text: "héllo wörld".to_string(),
        language_code: None,
        duration: None,
        segments: vec![],
        words: vec![],
        pii: None,
        redacted_audio: None,
    };
    assert_eq!(output.text_preview(5), "héllo");
    assert_eq!(output.text_preview(500), "héllo wörld");
}

#[test]
fn merge_output_tolerates_minimal_json() {
    let output: MergeOutput = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
    assert_eq!(output.text, "hi");
    assert!(output.segments.is_empty());
    assert!(output.pii.is_none());
}
