// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job parameter parsing and validation.
//!
//! Jobs carry an open parameter map in the state store. This module parses
//! that map into typed options and rejects invalid combinations before a
//! pipeline is ever planned.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on per-channel fan-out.
pub const MAX_CHANNELS: u32 = 16;

/// Errors raised while parsing or validating job parameters.
///
/// These are caller errors: surfaced synchronously, never logged as
/// failures of the control plane itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamsError {
    #[error("unknown speaker_detection mode: {0}")]
    UnknownSpeakerDetection(String),

    #[error("unknown timestamps_granularity: {0}")]
    UnknownTimestamps(String),

    #[error("unknown pii_redaction_mode: {0}")]
    UnknownRedactionMode(String),

    #[error("num_channels must be between 1 and {MAX_CHANNELS}, got {0}")]
    InvalidChannelCount(u32),

    #[error("min_speakers ({min}) must not exceed max_speakers ({max})")]
    SpeakerRangeInverted { min: u32, max: u32 },

    #[error("min_speakers must be at least 1")]
    SpeakerCountZero,

    #[error("redact_pii_audio requires pii_detection")]
    RedactWithoutDetect,

    #[error("parameters are not a JSON object")]
    NotAnObject,

    #[error("invalid value for {field}")]
    InvalidField { field: &'static str },
}

/// Speaker handling requested for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeakerDetection {
    /// Single speaker stream, no attribution.
    None,
    /// Diarize the mixed audio into speaker turns.
    Diarize { min_speakers: Option<u32>, max_speakers: Option<u32> },
    /// One transcription branch per audio channel.
    PerChannel { num_channels: u32 },
}

crate::simple_display! {
    SpeakerDetection {
        None => "none",
        Diarize { .. } => "diarize",
        PerChannel { .. } => "per_channel",
    }
}

/// Timestamp resolution of the final transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampsGranularity {
    None,
    Segment,
    Word,
}

crate::simple_display! {
    TimestampsGranularity {
        None => "none",
        Segment => "segment",
        Word => "word",
    }
}

/// How redacted spans are rendered in the output audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiRedactionMode {
    Beep,
    Silence,
}

crate::simple_display! {
    PiiRedactionMode {
        Beep => "beep",
        Silence => "silence",
    }
}

/// PII handling options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiiOptions {
    pub detect: bool,
    pub redact_audio: bool,
    pub redaction_mode: PiiRedactionMode,
}

impl Default for PiiOptions {
    fn default() -> Self {
        Self { detect: false, redact_audio: false, redaction_mode: PiiRedactionMode::Beep }
    }
}

/// Typed view of a job's open parameter map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobParameters {
    pub language: Option<String>,
    pub model: Option<String>,
    pub speaker_detection: SpeakerDetection,
    pub timestamps: TimestampsGranularity,
    pub pii: PiiOptions,
}

impl Default for JobParameters {
    fn default() -> Self {
        Self {
            language: None,
            model: None,
            speaker_detection: SpeakerDetection::None,
            // Word timestamps are the default; the align stage is planned
            // unless the caller asks for segment-level output.
            timestamps: TimestampsGranularity::Word,
            pii: PiiOptions::default(),
        }
    }
}

impl JobParameters {
    /// Parse and validate the open parameter map stored on a job.
    ///
    /// A `null` or empty map yields the defaults. Unknown keys are ignored
    /// so older clients and newer engines can coexist.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ParamsError> {
        let map = match value {
            serde_json::Value::Null => return Ok(Self::default()),
            serde_json::Value::Object(map) => map,
            _ => return Err(ParamsError::NotAnObject),
        };

        let mut params = Self::default();

        if let Some(v) = map.get("language") {
            params.language = parse_opt_string(v, "language")?;
        }
        if let Some(v) = map.get("model") {
            params.model = parse_opt_string(v, "model")?;
        }

        if let Some(v) = map.get("timestamps_granularity") {
            let s = v.as_str().ok_or(ParamsError::InvalidField { field: "timestamps_granularity" })?;
            params.timestamps = match s {
                "none" => TimestampsGranularity::None,
                "segment" => TimestampsGranularity::Segment,
                "word" => TimestampsGranularity::Word,
                other => return Err(ParamsError::UnknownTimestamps(other.to_string())),
            };
        }

        let mode = map.get("speaker_detection").and_then(|v| v.as_str()).unwrap_or("none");
        params.speaker_detection = match mode {
            "none" => SpeakerDetection::None,
            "diarize" => SpeakerDetection::Diarize {
                min_speakers: parse_opt_u32(map.get("min_speakers"), "min_speakers")?,
                max_speakers: parse_opt_u32(map.get("max_speakers"), "max_speakers")?,
            },
            "per_channel" => SpeakerDetection::PerChannel {
                num_channels: parse_opt_u32(map.get("num_channels"), "num_channels")?.unwrap_or(1),
            },
            other => return Err(ParamsError::UnknownSpeakerDetection(other.to_string())),
        };

        let detect = parse_opt_bool(map.get("pii_detection"), "pii_detection")?.unwrap_or(false);
        let redact_audio =
            parse_opt_bool(map.get("redact_pii_audio"), "redact_pii_audio")?.unwrap_or(false);
        let redaction_mode = match map.get("pii_redaction_mode").and_then(|v| v.as_str()) {
            None => PiiRedactionMode::Beep,
            Some("beep") => PiiRedactionMode::Beep,
            Some("silence") => PiiRedactionMode::Silence,
            Some(other) => return Err(ParamsError::UnknownRedactionMode(other.to_string())),
        };
        params.pii = PiiOptions { detect, redact_audio, redaction_mode };

        params.validate()?;
        Ok(params)
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<(), ParamsError> {
        match &self.speaker_detection {
            SpeakerDetection::None => {}
            SpeakerDetection::Diarize { min_speakers, max_speakers } => {
                if *min_speakers == Some(0) {
                    return Err(ParamsError::SpeakerCountZero);
                }
                if let (Some(min), Some(max)) = (min_speakers, max_speakers) {
                    if min > max {
                        return Err(ParamsError::SpeakerRangeInverted { min: *min, max: *max });
                    }
                }
            }
            SpeakerDetection::PerChannel { num_channels } => {
                if *num_channels < 1 || *num_channels > MAX_CHANNELS {
                    return Err(ParamsError::InvalidChannelCount(*num_channels));
                }
            }
        }

        if self.pii.redact_audio && !self.pii.detect {
            return Err(ParamsError::RedactWithoutDetect);
        }

        Ok(())
    }
}

fn parse_opt_string(
    v: &serde_json::Value,
    field: &'static str,
) -> Result<Option<String>, ParamsError> {
    match v {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s.clone())),
        _ => Err(ParamsError::InvalidField { field }),
    }
}

fn parse_opt_u32(
    v: Option<&serde_json::Value>,
    field: &'static str,
) -> Result<Option<u32>, ParamsError> {
    match v {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => {
            let n = v.as_u64().ok_or(ParamsError::InvalidField { field })?;
            u32::try_from(n).map(Some).map_err(|_| ParamsError::InvalidField { field })
        }
    }
}

fn parse_opt_bool(
    v: Option<&serde_json::Value>,
    field: &'static str,
) -> Result<Option<bool>, ParamsError> {
    match v {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v.as_bool().map(Some).ok_or(ParamsError::InvalidField { field }),
    }
}

#[cfg(test)]
#[path = "params_tests.rs"]
mod tests;
