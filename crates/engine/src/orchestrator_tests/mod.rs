// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator tests

mod cancel;
mod failures;
mod idempotency;
mod pipeline;
mod wait;

use crate::test_helpers::{merge_output_json, merge_output_with_speakers, TestContext};
use dalston_adapters::{ArtifactStore, EventBus, TaskQueue};
use dalston_core::tenant::DEFAULT_TENANT_ID;
use dalston_core::{Clock, Event, JobStatus, TaskFailureReason, TaskStatus};
use dalston_services::CreateJobRequest;
use dalston_storage::{JobStore, TaskStore};
use serde_json::json;
