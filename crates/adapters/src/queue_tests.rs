// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dalston_core::FakeClock;

fn queue() -> (MemoryQueue<FakeClock>, FakeClock) {
    let clock = FakeClock::new();
    (MemoryQueue::new(clock.clone()), clock)
}

async fn publish_one(queue: &MemoryQueue<FakeClock>, stage: &str) -> (TaskId, String) {
    let task_id = TaskId::new();
    let id = queue
        .publish(stage, task_id, JobId::new(), Duration::from_secs(600))
        .await
        .unwrap();
    (task_id, id)
}

#[tokio::test]
async fn claim_moves_message_into_pel() {
    let (queue, _clock) = queue();
    let (task_id, msg_id) = publish_one(&queue, "transcribe").await;

    let msg = queue.claim_next("transcribe", "engine-1", Duration::ZERO).await.unwrap().unwrap();
    assert_eq!(msg.task_id, task_id);
    assert_eq!(msg.id, msg_id);
    assert_eq!(msg.delivery_count, 1);

    // Claimed: not redelivered to anyone else.
    assert!(queue.claim_next("transcribe", "engine-2", Duration::ZERO).await.unwrap().is_none());

    let pending = queue.pending("transcribe").await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].consumer, "engine-1");
}

#[tokio::test]
async fn ack_clears_the_pel_but_keeps_history() {
    let (queue, _clock) = queue();
    let (_, msg_id) = publish_one(&queue, "transcribe").await;
    queue.claim_next("transcribe", "engine-1", Duration::ZERO).await.unwrap();
    queue.ack("transcribe", &msg_id).await.unwrap();

    assert!(queue.pending("transcribe").await.unwrap().is_empty());
    let info = queue.stream_info("transcribe").await.unwrap();
    assert_eq!(info.length, 1);
    assert_eq!(info.pending_count, 0);
}

#[tokio::test]
async fn channel_stages_share_the_base_stream() {
    let (queue, _clock) = queue();
    publish_one(&queue, "transcribe_ch0").await;
    publish_one(&queue, "transcribe_ch1").await;

    // One engine pool on the base stage sees both.
    assert!(queue.claim_next("transcribe", "e", Duration::ZERO).await.unwrap().is_some());
    assert!(queue.claim_next("transcribe", "e", Duration::ZERO).await.unwrap().is_some());
    assert_eq!(queue.discover_stages().await.unwrap(), vec!["transcribe".to_string()]);
}

#[tokio::test]
async fn claim_idle_reclaims_and_bumps_delivery_count() {
    let (queue, clock) = queue();
    publish_one(&queue, "transcribe").await;
    queue.claim_next("transcribe", "engine-dead", Duration::ZERO).await.unwrap();

    // Not idle long enough yet.
    let none = queue
        .claim_idle("transcribe", "engine-2", Duration::from_secs(600), 10)
        .await
        .unwrap();
    assert!(none.is_empty());

    clock.advance(Duration::from_secs(601));
    let claimed = queue
        .claim_idle("transcribe", "engine-2", Duration::from_secs(600), 10)
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].delivery_count, 2);

    let pending = queue.pending("transcribe").await.unwrap();
    assert_eq!(pending[0].consumer, "engine-2");
    assert_eq!(pending[0].delivery_count, 2);
}

#[tokio::test]
async fn claim_by_id_ignores_idle_time() {
    let (queue, _clock) = queue();
    let (_, msg_id) = publish_one(&queue, "transcribe").await;
    queue.claim_next("transcribe", "engine-1", Duration::ZERO).await.unwrap();

    let claimed =
        queue.claim_by_id("transcribe", "scanner", &[msg_id.clone()]).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].delivery_count, 2);

    // Unknown ids are skipped.
    let none = queue.claim_by_id("transcribe", "scanner", &["9-9".to_string()]).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn timeout_at_is_derived_from_publish_time() {
    let (queue, clock) = queue();
    let before = clock.now_utc();
    publish_one(&queue, "align").await;
    let msg = queue.claim_next("align", "e", Duration::ZERO).await.unwrap().unwrap();
    assert_eq!(msg.enqueued_at, before);
    assert_eq!(msg.timeout_at, before + chrono::Duration::seconds(600));
}

#[tokio::test]
async fn oldest_undelivered_age_tracks_the_group_position() {
    let (queue, clock) = queue();
    assert_eq!(queue.oldest_undelivered_age_ms("merge").await.unwrap(), None);

    publish_one(&queue, "merge").await;
    publish_one(&queue, "merge").await;
    clock.advance(Duration::from_secs(30));
    assert_eq!(queue.oldest_undelivered_age_ms("merge").await.unwrap(), Some(30_000));

    queue.claim_next("merge", "e", Duration::ZERO).await.unwrap();
    // First message delivered (even though unacked): age now reflects the second.
    assert_eq!(queue.oldest_undelivered_age_ms("merge").await.unwrap(), Some(30_000));
    queue.claim_next("merge", "e", Duration::ZERO).await.unwrap();
    assert_eq!(queue.oldest_undelivered_age_ms("merge").await.unwrap(), None);
}

#[tokio::test]
async fn delete_message_removes_it_entirely() {
    let (queue, _clock) = queue();
    let (_, msg_id) = publish_one(&queue, "transcribe").await;
    queue.delete_message("transcribe", &msg_id).await.unwrap();
    assert!(queue.claim_next("transcribe", "e", Duration::ZERO).await.unwrap().is_none());
    assert_eq!(queue.stream_info("transcribe").await.unwrap().length, 0);
}

#[tokio::test]
async fn blocking_claim_wakes_on_publish() {
    let (queue, _clock) = queue();
    let queue = std::sync::Arc::new(queue);

    let waiter = {
        let queue = queue.clone();
        tokio::spawn(async move {
            queue.claim_next("transcribe", "e", Duration::from_secs(5)).await.unwrap()
        })
    };
    tokio::task::yield_now().await;
    publish_one(&queue, "transcribe").await;

    let msg = waiter.await.unwrap();
    assert!(msg.is_some());
}

#[tokio::test]
async fn stream_info_groups_pending_by_consumer() {
    let (queue, _clock) = queue();
    publish_one(&queue, "transcribe").await;
    publish_one(&queue, "transcribe").await;
    publish_one(&queue, "transcribe").await;
    queue.claim_next("transcribe", "a", Duration::ZERO).await.unwrap();
    queue.claim_next("transcribe", "a", Duration::ZERO).await.unwrap();
    queue.claim_next("transcribe", "b", Duration::ZERO).await.unwrap();

    let info = queue.stream_info("transcribe").await.unwrap();
    assert_eq!(info.pending_count, 3);
    assert_eq!(info.consumers.len(), 2);
    assert_eq!(info.consumers[0].name, "a");
    assert_eq!(info.consumers[0].pending, 2);
}
