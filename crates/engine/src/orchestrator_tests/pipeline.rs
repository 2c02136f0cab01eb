// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Happy-path pipelines: planning, dispatch order, completion stats.

use super::*;

#[tokio::test]
async fn default_pipeline_runs_to_completion() {
    let mut ctx = TestContext::new();
    ctx.heartbeat_all_engines().await;

    let job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;

    // Planned in topological order; only the root is dispatched.
    let tasks = ctx.tasks(job.id).await;
    assert_eq!(
        tasks.iter().map(|t| t.stage.as_str()).collect::<Vec<_>>(),
        vec!["prepare", "transcribe", "align", "merge"]
    );
    assert_eq!(ctx.task_by_stage(job.id, "prepare").await.status, TaskStatus::Ready);
    assert_eq!(ctx.task_by_stage(job.id, "transcribe").await.status, TaskStatus::Pending);
    assert_eq!(ctx.job(job.id).await.status, JobStatus::Running);

    // Input descriptor is written before the task becomes claimable.
    let prepare = ctx.task_by_stage(job.id, "prepare").await;
    let input = ctx
        .blobs
        .get_json(prepare.input_uri.as_deref().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(input["audio_uri"], "s3://b/a.wav");
    assert_eq!(input["stage"], "prepare");

    assert!(ctx.run_engine_ok("prepare", "prep-1", json!({})).await);
    assert_eq!(ctx.task_by_stage(job.id, "transcribe").await.status, TaskStatus::Ready);

    assert!(ctx.run_engine_ok("transcribe", "stt-1", json!({})).await);
    assert!(ctx.run_engine_ok("align", "align-1", json!({})).await);
    assert!(ctx.run_engine_ok("merge", "merge-1", merge_output_json()).await);

    let job = ctx.job(job.id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.completed_at.is_some());

    let stats = job.result.unwrap();
    assert_eq!(stats.language_code.as_deref(), Some("en"));
    assert!(stats.word_count > 0);
    assert!(stats.segment_count > 0);
    assert_eq!(stats.speaker_count, None);
    assert_eq!(stats.audio_duration_seconds, Some(42.5));

    // Completion stamps the retention deadline from the default policy.
    assert!(job.purge_after.is_some());
}

#[tokio::test]
async fn per_channel_stereo_pipeline() {
    let mut ctx = TestContext::new();
    ctx.heartbeat_all_engines().await;

    let job = ctx
        .create_job(CreateJobRequest::new("s3://b/stereo.wav").parameters(json!({
            "speaker_detection": "per_channel",
            "num_channels": 2,
            "timestamps_granularity": "segment",
        })))
        .await;

    let tasks = ctx.tasks(job.id).await;
    assert_eq!(
        tasks.iter().map(|t| t.stage.as_str()).collect::<Vec<_>>(),
        vec!["prepare", "transcribe_ch0", "transcribe_ch1", "merge"]
    );
    let prepare = ctx.task_by_stage(job.id, "prepare").await;
    assert_eq!(prepare.config["split_channels"], json!(true));

    let merge = ctx.task_by_stage(job.id, "merge").await;
    let expected_deps: Vec<_> = tasks
        .iter()
        .filter(|t| t.stage != "merge")
        .map(|t| t.id)
        .collect();
    assert_eq!(merge.dependencies, expected_deps);
    assert_eq!(merge.config["channel_count"], json!(2));

    assert!(ctx.run_engine_ok("prepare", "prep-1", json!({})).await);
    // Both channels share the transcribe stream.
    assert!(ctx.run_engine_ok("transcribe", "stt-1", json!({})).await);
    assert!(ctx.run_engine_ok("transcribe", "stt-2", json!({})).await);
    assert!(ctx
        .run_engine_ok("merge", "merge-1", merge_output_with_speakers(&["ch0", "ch1"]))
        .await);

    let job = ctx.job(job.id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.result.unwrap().speaker_count, Some(2));
}

#[tokio::test]
async fn diarize_with_pii_audio_redaction_pipeline() {
    let mut ctx = TestContext::new();
    ctx.heartbeat_all_engines().await;

    let job = ctx
        .create_job(CreateJobRequest::new("s3://b/meeting.wav").parameters(json!({
            "speaker_detection": "diarize",
            "timestamps_granularity": "word",
            "pii_detection": true,
            "redact_pii_audio": true,
            "pii_redaction_mode": "beep",
        })))
        .await;

    let tasks = ctx.tasks(job.id).await;
    assert_eq!(
        tasks.iter().map(|t| t.stage.as_str()).collect::<Vec<_>>(),
        vec!["prepare", "transcribe", "align", "diarize", "pii_detect", "audio_redact", "merge"]
    );

    let pii = ctx.task_by_stage(job.id, "pii_detect").await;
    let align = ctx.task_by_stage(job.id, "align").await;
    let diarize = ctx.task_by_stage(job.id, "diarize").await;
    assert_eq!(pii.dependencies, vec![align.id, diarize.id]);

    let redact = ctx.task_by_stage(job.id, "audio_redact").await;
    assert_eq!(redact.dependencies, vec![pii.id]);

    ctx.run_pipeline_to_completion(job.id).await;
    assert_eq!(ctx.job(job.id).await.status, JobStatus::Completed);
}

#[tokio::test]
async fn diarize_branch_runs_in_parallel_with_transcription() {
    let mut ctx = TestContext::new();
    ctx.heartbeat_all_engines().await;

    let job = ctx
        .create_job(CreateJobRequest::new("s3://b/a.wav").parameters(json!({
            "speaker_detection": "diarize",
        })))
        .await;

    assert!(ctx.run_engine_ok("prepare", "prep-1", json!({})).await);
    // After prepare, both branches are claimable at once.
    assert_eq!(ctx.task_by_stage(job.id, "transcribe").await.status, TaskStatus::Ready);
    assert_eq!(ctx.task_by_stage(job.id, "diarize").await.status, TaskStatus::Ready);
}

#[tokio::test]
async fn input_descriptor_references_upstream_outputs() {
    let mut ctx = TestContext::new();
    ctx.heartbeat_all_engines().await;

    let job = ctx.create_job(CreateJobRequest::new("s3://b/a.wav")).await;
    assert!(ctx.run_engine_ok("prepare", "prep-1", json!({})).await);

    let transcribe = ctx.task_by_stage(job.id, "transcribe").await;
    let input = ctx
        .blobs
        .get_json(transcribe.input_uri.as_deref().unwrap())
        .await
        .unwrap()
        .unwrap();
    let prepare = ctx.task_by_stage(job.id, "prepare").await;
    assert_eq!(
        input["inputs"]["prepare"],
        json!(dalston_core::paths::task_output_key(job.id, prepare.id))
    );
}

#[tokio::test]
async fn completion_schedules_webhook_deliveries() {
    let mut ctx = TestContext::new();
    ctx.heartbeat_all_engines().await;

    let job = ctx
        .create_job(
            CreateJobRequest::new("s3://b/a.wav")
                .webhook_url("https://example.com/hook")
                .webhook_metadata(json!({"ref": "order-9"})),
        )
        .await;
    ctx.run_pipeline_to_completion(job.id).await;

    use dalston_storage::DeliveryStore;
    let due = ctx
        .store
        .claim_due_deliveries(ctx.clock.now_utc(), 10)
        .await
        .unwrap();
    assert_eq!(due.len(), 1);
    let delivery = &due[0];
    assert_eq!(delivery.url_override.as_deref(), Some("https://example.com/hook"));
    assert_eq!(delivery.event_type, "transcription.completed");
    assert_eq!(delivery.payload["webhook_metadata"], json!({"ref": "order-9"}));
    assert_eq!(delivery.payload["transcription_id"], json!(job.id.to_string()));
}
