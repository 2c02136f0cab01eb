// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline planning: job parameters → task graph.
//!
//! [`plan`] is a pure function from parameters to an ordered list of
//! [`TaskSpec`]s. New stages are added here plus an engine subscribing to
//! the new queue; nothing else in the control plane needs to change.

use crate::id::TaskId;
use crate::params::{JobParameters, SpeakerDetection, TimestampsGranularity};
use serde_json::json;
use std::collections::HashMap;

pub const STAGE_PREPARE: &str = "prepare";
pub const STAGE_TRANSCRIBE: &str = "transcribe";
pub const STAGE_ALIGN: &str = "align";
pub const STAGE_DIARIZE: &str = "diarize";
pub const STAGE_PII_DETECT: &str = "pii_detect";
pub const STAGE_AUDIO_REDACT: &str = "audio_redact";
pub const STAGE_MERGE: &str = "merge";

pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Per-stage processing deadlines, carried into the queue message.
fn stage_timeout_s(base: &str) -> u64 {
    match base {
        STAGE_PREPARE => 600,
        STAGE_TRANSCRIBE => 3600,
        STAGE_ALIGN | STAGE_DIARIZE => 1800,
        STAGE_PII_DETECT | STAGE_AUDIO_REDACT => 900,
        STAGE_MERGE => 600,
        _ => 1800,
    }
}

/// Blueprint for one task, produced by the planner before ids exist.
///
/// `depends_on` references other specs in the same plan by stage name;
/// stage names are unique within a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub stage: String,
    pub engine_id: String,
    pub depends_on: Vec<String>,
    pub config: serde_json::Value,
    pub required: bool,
    pub timeout_s: u64,
    pub max_retries: u32,
}

impl TaskSpec {
    fn new(stage: impl Into<String>, depends_on: Vec<String>, config: serde_json::Value) -> Self {
        let stage = stage.into();
        let timeout_s = stage_timeout_s(base_stage(&stage));
        Self {
            engine_id: stage.clone(),
            stage,
            depends_on,
            config,
            required: true,
            timeout_s,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Name of the per-channel variant of a stage, e.g. `transcribe_ch0`.
pub fn channel_stage(base: &str, channel: u32) -> String {
    format!("{base}_ch{channel}")
}

/// Base stage of a possibly channel-suffixed stage name.
///
/// Per-channel stages route to the base stream so one engine pool serves
/// every channel: `transcribe_ch3` → `transcribe`, anything else unchanged.
pub fn base_stage(stage: &str) -> &str {
    if let Some(pos) = stage.rfind("_ch") {
        let suffix = &stage[pos + 3..];
        if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
            return &stage[..pos];
        }
    }
    stage
}

/// Build the task graph for a job, in topological order.
///
/// The default pipeline is `prepare → transcribe → align → merge`; segment
/// granularity drops the align stage, diarization adds a parallel branch,
/// per-channel mode fans transcription out per channel, and the PII stages
/// slot in between the transcript producers and the merge.
pub fn plan(params: &JobParameters) -> Vec<TaskSpec> {
    let mut specs: Vec<TaskSpec> = Vec::new();
    let align = params.timestamps == TimestampsGranularity::Word;

    let prepare_config = match &params.speaker_detection {
        SpeakerDetection::PerChannel { num_channels } => json!({
            "split_channels": true,
            "num_channels": num_channels,
        }),
        _ => json!({}),
    };
    specs.push(TaskSpec::new(STAGE_PREPARE, vec![], prepare_config));

    let transcribe_config = json!({
        "language": params.language,
        "model": params.model,
    });

    // Stages whose output is a transcript; the PII join hangs off these.
    let mut transcript_tails: Vec<String> = Vec::new();

    match &params.speaker_detection {
        SpeakerDetection::PerChannel { num_channels } => {
            for ch in 0..*num_channels {
                let transcribe = channel_stage(STAGE_TRANSCRIBE, ch);
                let mut config = transcribe_config.clone();
                if let Some(map) = config.as_object_mut() {
                    map.insert("channel".to_string(), json!(ch));
                }
                specs.push(TaskSpec::new(
                    transcribe.clone(),
                    vec![STAGE_PREPARE.to_string()],
                    config,
                ));

                if align {
                    let align_stage = channel_stage(STAGE_ALIGN, ch);
                    specs.push(TaskSpec::new(
                        align_stage.clone(),
                        vec![transcribe],
                        json!({"channel": ch}),
                    ));
                    transcript_tails.push(align_stage);
                } else {
                    transcript_tails.push(transcribe);
                }
            }
        }
        _ => {
            specs.push(TaskSpec::new(
                STAGE_TRANSCRIBE,
                vec![STAGE_PREPARE.to_string()],
                transcribe_config,
            ));
            if align {
                specs.push(TaskSpec::new(
                    STAGE_ALIGN,
                    vec![STAGE_TRANSCRIBE.to_string()],
                    json!({}),
                ));
                transcript_tails.push(STAGE_ALIGN.to_string());
            } else {
                transcript_tails.push(STAGE_TRANSCRIBE.to_string());
            }
        }
    }

    if let SpeakerDetection::Diarize { min_speakers, max_speakers } = &params.speaker_detection {
        specs.push(TaskSpec::new(
            STAGE_DIARIZE,
            vec![STAGE_PREPARE.to_string()],
            json!({
                "min_speakers": min_speakers,
                "max_speakers": max_speakers,
            }),
        ));
    }

    if params.pii.detect {
        let mut deps = transcript_tails.clone();
        if matches!(params.speaker_detection, SpeakerDetection::Diarize { .. }) {
            deps.push(STAGE_DIARIZE.to_string());
        }
        specs.push(TaskSpec::new(STAGE_PII_DETECT, deps, json!({})));

        if params.pii.redact_audio {
            specs.push(TaskSpec::new(
                STAGE_AUDIO_REDACT,
                vec![STAGE_PII_DETECT.to_string()],
                json!({"mode": params.pii.redaction_mode.to_string()}),
            ));
        }
    }

    // Merge joins everything planned so far.
    let merge_deps: Vec<String> = specs.iter().map(|s| s.stage.clone()).collect();
    let mut merge_config = json!({
        "speaker_detection": params.speaker_detection.to_string(),
        "timestamps_granularity": params.timestamps.to_string(),
        "pii_detection": params.pii.detect,
        "redact_audio": params.pii.redact_audio,
    });
    if let SpeakerDetection::PerChannel { num_channels } = &params.speaker_detection {
        if let Some(map) = merge_config.as_object_mut() {
            map.insert("channel_count".to_string(), json!(num_channels));
        }
    }
    specs.push(TaskSpec::new(STAGE_MERGE, merge_deps, merge_config));

    specs
}

/// Check that a set of task dependency edges contains no cycle.
///
/// Dependencies pointing outside the map are ignored; the planner never
/// produces them and the store rejects cross-job references.
pub fn dependencies_acyclic(deps: &HashMap<TaskId, Vec<TaskId>>) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        InProgress,
        Done,
    }

    let mut marks: HashMap<TaskId, Mark> = HashMap::new();

    for start in deps.keys() {
        if marks.contains_key(start) {
            continue;
        }
        // Iterative DFS; (node, next child index) stack.
        let mut stack: Vec<(TaskId, usize)> = vec![(*start, 0)];
        marks.insert(*start, Mark::InProgress);

        while let Some((node, idx)) = stack.pop() {
            let children = deps.get(&node).map(Vec::as_slice).unwrap_or(&[]);
            if idx < children.len() {
                stack.push((node, idx + 1));
                let child = children[idx];
                if !deps.contains_key(&child) {
                    continue;
                }
                match marks.get(&child) {
                    Some(Mark::InProgress) => return false,
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(child, Mark::InProgress);
                        stack.push((child, 0));
                    }
                }
            } else {
                marks.insert(node, Mark::Done);
            }
        }
    }

    true
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
