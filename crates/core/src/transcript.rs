// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Merge output parsing and result statistics.
//!
//! The merge engine writes its combined transcript as the task output;
//! the orchestrator reads it back to populate the job's aggregate stats.

use crate::job::ResultStats;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
    pub start: f64,
    pub end: f64,
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

/// PII findings attached by the merge engine when detection ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiSummary {
    pub entities_detected: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redacted_text: Option<String>,
}

/// Shape of the merge task's `output.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeOutput {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    /// Audio duration in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
    #[serde(default)]
    pub words: Vec<TranscriptWord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pii: Option<PiiSummary>,
    /// URI of the redacted audio artifact when audio redaction ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redacted_audio: Option<String>,
}

impl MergeOutput {
    /// Derive the job-level aggregate statistics.
    ///
    /// Word count prefers explicit word timings and falls back to
    /// whitespace splitting. Speaker count is the number of distinct
    /// speaker labels, or absent when nothing was attributed.
    pub fn result_stats(&self) -> ResultStats {
        let word_count = if self.words.is_empty() {
            self.text.split_whitespace().count() as u64
        } else {
            self.words.len() as u64
        };

        let speakers: BTreeSet<&str> = self
            .segments
            .iter()
            .filter_map(|s| s.speaker.as_deref())
            .collect();
        let speaker_count = if speakers.is_empty() { None } else { Some(speakers.len() as u32) };

        ResultStats {
            audio_duration_seconds: self.duration,
            language_code: self.language_code.clone(),
            word_count,
            segment_count: self.segments.len() as u64,
            speaker_count,
            character_count: self.text.chars().count() as u64,
        }
    }

    /// Leading text included in webhook payloads.
    pub fn text_preview(&self, max_chars: usize) -> &str {
        match self.text.char_indices().nth(max_chars) {
            Some((idx, _)) => &self.text[..idx],
            None => &self.text,
        }
    }
}

#[cfg(test)]
#[path = "transcript_tests.rs"]
mod tests;
