//! Poller lifecycle, job failure, result fetching and teardown through the
//! queue.

mod common;

use bridge_traits::{JobConfig, JobId};
use common::*;
use core_async::time::Duration;
use core_runtime::events::{ProgressStage, UploadEvent};
use core_upload::{ItemState, PollerConfig, QueueConfig, UploadError};

#[tokio::test(start_paused = true)]
async fn polling_stops_after_last_job_resolves() {
    let h = Harness::new();
    h.backend.accept_as(&["job-a"]);
    h.backend.script_status(
        "job-a",
        vec![processing(None), processing(None), completed("result-a")],
    );
    h.queue.enqueue(vec![file("a.mp4")]).unwrap();

    assert!(!h.queue.is_polling());
    h.queue.start_upload(&JobConfig::default()).await.unwrap();
    assert!(h.queue.is_polling());

    advance(1900).await;
    assert_eq!(h.backend.total_status_calls(), 0);

    advance(4200).await;
    assert_eq!(h.backend.status_calls_for("job-a"), 3);
    assert!(!h.queue.is_polling());
    assert_eq!(h.queue.completed_count(), 1);

    advance(20_000).await;
    assert_eq!(h.backend.total_status_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn second_batch_restarts_polling() {
    let h = Harness::new();
    h.queue.enqueue(vec![file("a.mp4")]).unwrap();
    h.queue.start_upload(&JobConfig::default()).await.unwrap();
    advance(2100).await;
    assert!(!h.queue.is_polling());

    h.queue.enqueue(vec![file("b.mp4")]).unwrap();
    h.queue.start_upload(&JobConfig::default()).await.unwrap();
    assert!(h.queue.is_polling());
    advance(2100).await;

    assert!(!h.queue.is_polling());
    assert_eq!(h.queue.completed_count(), 2);
    assert_eq!(h.queue.content().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn job_failure_keeps_item_with_backend_message() {
    let mut h = Harness::new();
    h.backend.accept_as(&["job-a"]);
    h.backend
        .script_status("job-a", vec![failed("unsupported codec")]);
    let id = h.queue.enqueue(vec![file("a.mp4")]).unwrap()[0];

    h.queue.start_upload(&JobConfig::default()).await.unwrap();
    advance(2100).await;

    let item = h.queue.item(id).unwrap();
    assert_eq!(item.state(), ItemState::Failed);
    assert_eq!(item.error_message(), Some("unsupported codec"));
    assert_eq!(item.remote_job_id(), Some(&JobId::from("job-a")));
    assert_eq!(h.previews.live(), 1);
    assert!(h.queue.content().is_empty());
    assert!(!h.queue.is_polling());

    let events = upload_events(&h.take_events());
    assert!(events.iter().any(|event| matches!(
        event,
        UploadEvent::Failed { message, recoverable: false, .. } if message == "unsupported codec"
    )));

    h.queue.remove_queued(id).unwrap();
    assert_eq!(h.previews.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn processing_progress_is_forwarded() {
    let mut h = Harness::new();
    h.backend.accept_as(&["job-a"]);
    h.backend.script_status(
        "job-a",
        vec![
            processing(Some(30)),
            processing(Some(30)),
            processing(Some(80)),
            processing(Some(80)),
        ],
    );
    let id = h.queue.enqueue(vec![file("a.mp4")]).unwrap()[0];
    h.queue.start_upload(&JobConfig::default()).await.unwrap();
    h.take_events();

    advance(6100).await;

    assert_eq!(h.queue.item(id).unwrap().processing_progress(), Some(80));
    let percents: Vec<u8> = upload_events(&h.take_events())
        .into_iter()
        .filter_map(|event| match event {
            UploadEvent::Progress {
                stage: ProgressStage::Processing,
                percent,
                ..
            } => Some(percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents, vec![30, 80]);
    h.queue.shutdown();
}

#[tokio::test(start_paused = true)]
async fn processing_items_cannot_be_removed() {
    let h = Harness::new();
    h.backend.accept_as(&["job-a"]);
    h.backend.script_status("job-a", vec![processing(None)]);
    let id = h.queue.enqueue(vec![file("a.mp4")]).unwrap()[0];
    h.queue.start_upload(&JobConfig::default()).await.unwrap();

    let err = h.queue.remove_queued(id).unwrap_err();

    assert!(matches!(err, UploadError::InvalidStateTransition { .. }));
    assert_eq!(h.queue.processing_count(), 1);
    assert_eq!(h.previews.live(), 1);
    assert!(matches!(
        h.queue.remove_queued(core_upload::QueueItemId::new()),
        Err(UploadError::ItemNotFound(_))
    ));
    h.queue.shutdown();
}

#[tokio::test(start_paused = true)]
async fn result_fetch_is_retried_with_backoff() {
    let h = Harness::new();
    h.backend.accept_as(&["job-a"]);
    h.backend.script_status("job-a", vec![completed("result-a")]);
    h.backend.fail_fetch("result-a", 2);
    let id = h.queue.enqueue(vec![file("a.mp4")]).unwrap()[0];
    h.queue.start_upload(&JobConfig::default()).await.unwrap();

    // Fetches at 2000ms, 2500ms and 3500ms.
    advance(2100).await;
    assert_eq!(h.queue.item(id).unwrap().state(), ItemState::Processing);
    assert!(!h.queue.is_polling());

    advance(1500).await;
    assert!(h.queue.item(id).is_none());
    assert_eq!(h.backend.fetch_calls(), 3);
    assert_eq!(h.queue.content().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_result_fetch_fails_item() {
    let h = Harness::with_config(QueueConfig {
        result_fetch_attempts: 2,
        ..QueueConfig::default()
    });
    h.backend.accept_as(&["job-a"]);
    h.backend.script_status("job-a", vec![completed("result-a")]);
    h.backend.fail_fetch("result-a", 5);
    let id = h.queue.enqueue(vec![file("a.mp4")]).unwrap()[0];
    h.queue.start_upload(&JobConfig::default()).await.unwrap();

    advance(5000).await;

    let item = h.queue.item(id).unwrap();
    assert_eq!(item.state(), ItemState::Failed);
    assert!(item.error_message().unwrap().starts_with("result unavailable"));
    assert_eq!(h.backend.fetch_calls(), 2);
    assert_eq!(h.previews.live(), 1);
}

#[tokio::test(start_paused = true)]
async fn miss_cap_gives_up_on_unreachable_job() {
    let h = Harness::with_config(QueueConfig {
        poller: PollerConfig {
            max_consecutive_misses: Some(3),
            ..PollerConfig::default()
        },
        ..QueueConfig::default()
    });
    h.backend.accept_as(&["job-a"]);
    h.backend
        .script_status("job-a", vec![unreachable_status("gateway timeout")]);
    let id = h.queue.enqueue(vec![file("a.mp4")]).unwrap()[0];
    h.queue.start_upload(&JobConfig::default()).await.unwrap();

    advance(4100).await;
    assert_eq!(h.queue.item(id).unwrap().state(), ItemState::Processing);

    advance(2000).await;
    let item = h.queue.item(id).unwrap();
    assert_eq!(item.state(), ItemState::Failed);
    assert_eq!(
        item.error_message(),
        Some("status unavailable after 3 attempts")
    );
    assert!(!h.queue.is_polling());
}

#[tokio::test(start_paused = true)]
async fn processing_timeout_fails_stuck_job() {
    let h = Harness::with_config(QueueConfig {
        poller: PollerConfig {
            processing_timeout: Some(Duration::from_secs(10)),
            ..PollerConfig::default()
        },
        ..QueueConfig::default()
    });
    h.backend.accept_as(&["job-a"]);
    h.backend.script_status("job-a", vec![processing(Some(5))]);
    let id = h.queue.enqueue(vec![file("a.mp4")]).unwrap()[0];
    h.queue.start_upload(&JobConfig::default()).await.unwrap();

    advance(8100).await;
    assert_eq!(h.queue.item(id).unwrap().state(), ItemState::Processing);

    advance(2000).await;
    let item = h.queue.item(id).unwrap();
    assert_eq!(item.state(), ItemState::Failed);
    assert!(item.error_message().unwrap().contains("timed out"));
}

#[tokio::test(start_paused = true)]
async fn clear_queue_only_removes_queued_items() {
    let h = Harness::new();
    h.endpoint
        .script("bad.mp4", UploadScript::FailNetwork("offline".into()));
    h.queue.enqueue(vec![file("bad.mp4")]).unwrap();
    h.queue.start_upload(&JobConfig::default()).await.unwrap();
    h.queue
        .enqueue(vec![file("a.mp4"), file("b.mp4")])
        .unwrap();

    assert_eq!(h.queue.clear_queue(), 2);

    assert_eq!(h.queue.len(), 1);
    assert_eq!(h.queue.failed_count(), 1);
    assert_eq!(h.previews.live(), 1);
    assert_eq!(h.queue.clear_queue(), 0);
}

#[tokio::test(start_paused = true)]
async fn unreadable_file_rolls_back_enqueue() {
    let h = Harness::new();

    let err = h
        .queue
        .enqueue(vec![file("a.mp4"), file("unreadable.mp4")])
        .unwrap_err();

    assert!(matches!(err, UploadError::Bridge(_)));
    assert!(h.queue.is_empty());
    assert_eq!(h.previews.created(), 1);
    assert_eq!(h.previews.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_releases_everything_once() {
    let h = Harness::new();
    h.endpoint.script("hang.mp4", UploadScript::Hang(vec![(100, 1000)]));
    h.backend.accept_as(&["job-a"]);
    h.backend.script_status("job-a", vec![processing(None)]);

    h.queue.enqueue(vec![file("a.mp4")]).unwrap();
    h.queue.start_upload(&JobConfig::default()).await.unwrap();
    h.queue
        .enqueue(vec![file("hang.mp4"), file("idle.mp4")])
        .unwrap();
    let queue = h.queue.clone();
    let upload = tokio::spawn(async move { queue.start_upload(&JobConfig::default()).await });
    for _ in 0..100 {
        if h.queue.uploading_count() == 2 && h.endpoint.started().len() == 3 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(h.previews.live(), 3);
    assert!(h.queue.is_polling());

    h.queue.shutdown();
    h.queue.shutdown();

    assert!(h.queue.is_shut_down());
    assert!(!h.queue.is_polling());
    assert_eq!(h.previews.live(), 0);
    assert_eq!(h.previews.revoked().len(), 3);
    assert!(h.previews.no_double_revoke());
    assert_eq!(h.queue.lease_stats().live(), 0);

    let outcome = upload.await.unwrap().unwrap();
    assert!(outcome.aborted >= 1);
    assert!(h.endpoint.was_dropped("hang.mp4"));

    let calls = h.backend.total_status_calls();
    advance(10_000).await;
    assert_eq!(h.backend.total_status_calls(), calls);

    assert!(matches!(
        h.queue.enqueue(vec![file("late.mp4")]),
        Err(UploadError::ShutDown)
    ));
    assert!(matches!(
        h.queue.start_upload(&JobConfig::default()).await,
        Err(UploadError::ShutDown)
    ));
}

#[tokio::test(start_paused = true)]
async fn invalid_job_config_changes_nothing() {
    let h = Harness::new();
    let id = h.queue.enqueue(vec![file("a.mp4")]).unwrap()[0];
    let config = JobConfig::default().with_caption(bridge_traits::CaptionStyle {
        max_words_per_line: 0,
        ..bridge_traits::CaptionStyle::default()
    });

    let err = h.queue.start_upload(&config).await.unwrap_err();

    assert!(matches!(err, UploadError::Submission(_)));
    assert_eq!(h.queue.item(id).unwrap().state(), ItemState::Queued);
    assert!(h.endpoint.started().is_empty());
}

#[tokio::test(start_paused = true)]
async fn refresh_and_completion_do_not_duplicate_content() {
    let h = Harness::new();
    h.backend.accept_as(&["job-a"]);
    h.backend.script_status("job-a", vec![completed("result-a")]);
    h.queue.enqueue(vec![file("a.mp4")]).unwrap();
    h.queue.start_upload(&JobConfig::default()).await.unwrap();

    // A full refresh already containing the result lands before the poll.
    assert_eq!(
        h.queue
            .merge_content(vec![content("older"), content("result-a")]),
        2
    );
    advance(2100).await;

    let ids: Vec<String> = h.queue.content().into_iter().map(|c| c.id).collect();
    assert_eq!(ids, vec!["older", "result-a"]);
    assert_eq!(h.queue.completed_count(), 1);
    assert_eq!(h.queue.merge_content(vec![content("result-a")]), 0);
}
