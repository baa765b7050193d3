//! Integration tests for the fetch-and-checkpoint loop

use crate::support::{
    harness, harness_at, output_ids, quick_config, read_json, server_error, FakeEndpoint, EPOCH,
};
use player_data_downloader::downloader::{
    DownloadError, FetchConfig, FetchExecutor, ManualClock, RunStatus,
};
use player_data_downloader::fetcher::{FetcherError, RateLimitInfo};
use player_data_downloader::resume::{ResumePaths, RunLock};
use player_data_downloader::shutdown::ShutdownCoordinator;
use player_data_downloader::Cursor;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_fetches_all_pages_and_marks_complete() {
    let dir = TempDir::new().unwrap();
    let h = harness(&dir, quick_config());
    let endpoint = FakeEndpoint::with_pages(&[&[1, 2], &[3, 4], &[5]]).report_total();

    let report = h.executor.run(&endpoint).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.store.len(), 5);
    assert_eq!(endpoint.pages_requested(), vec![1, 2, 3]);
    assert_eq!(output_ids(&h.paths.output), vec![1, 2, 3, 4, 5]);

    let checkpoint = read_json(&h.paths.checkpoint);
    assert_eq!(checkpoint["next_cursor"], serde_json::Value::Null);
    assert_eq!(checkpoint["completed"], true);
    assert_eq!(checkpoint["pages_fetched"], 3);
    assert_eq!(checkpoint["record_count"], 5);
    assert_eq!(checkpoint["total_pages"], 3);
}

#[tokio::test]
async fn test_empty_last_page_ends_the_run() {
    let dir = TempDir::new().unwrap();
    let h = harness(&dir, quick_config());
    let endpoint = FakeEndpoint::with_pages(&[&[1], &[]]);

    let report = h.executor.run(&endpoint).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(endpoint.pages_requested(), vec![1, 2]);
    assert_eq!(report.next_cursor, None);
    assert_eq!(output_ids(&h.paths.output), vec![1]);

    let checkpoint = read_json(&h.paths.checkpoint);
    assert_eq!(checkpoint["next_cursor"], serde_json::Value::Null);
    assert_eq!(checkpoint["completed"], true);
    assert_eq!(checkpoint["pages_fetched"], 2);
}

#[tokio::test]
async fn test_duplicates_keep_first_seen_record() {
    let dir = TempDir::new().unwrap();
    let h = harness(&dir, quick_config());
    let endpoint = FakeEndpoint::with_pages(&[&[1, 2, 3], &[3, 4], &[1, 4, 5]]);

    let report = h.executor.run(&endpoint).await.unwrap();

    assert_eq!(report.store.ids().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    assert_eq!(report.records_added, 5);
    assert_eq!(report.store.get(3).unwrap().get("page"), Some(&json!(1)));
    assert_eq!(report.store.get(4).unwrap().get("page"), Some(&json!(2)));
}

#[tokio::test]
async fn test_items_without_id_are_skipped() {
    let dir = TempDir::new().unwrap();
    let h = harness(&dir, quick_config());
    let endpoint = FakeEndpoint::with_raw_pages(vec![vec![
        json!({"id": 7}),
        json!({"name": "anonymous"}),
        json!({"id": "8"}),
    ]]);

    let report = h.executor.run(&endpoint).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.store.ids().collect::<Vec<_>>(), vec![7]);
}

#[tokio::test]
async fn test_consecutive_empty_pages_end_the_run() {
    let dir = TempDir::new().unwrap();
    let config = FetchConfig {
        max_empty_pages: 2,
        ..quick_config()
    };
    let h = harness(&dir, config);
    let endpoint = FakeEndpoint::with_pages(&[&[1], &[], &[], &[4], &[5]]);

    let report = h.executor.run(&endpoint).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(endpoint.pages_requested(), vec![1, 2, 3]);
    assert_eq!(report.next_cursor, None);
    assert_eq!(read_json(&h.paths.checkpoint)["completed"], true);
}

#[tokio::test]
async fn test_single_empty_page_does_not_end_the_run() {
    let dir = TempDir::new().unwrap();
    let config = FetchConfig {
        max_empty_pages: 2,
        ..quick_config()
    };
    let h = harness(&dir, config);
    let endpoint = FakeEndpoint::with_pages(&[&[1], &[], &[3], &[], &[5]]);

    let report = h.executor.run(&endpoint).await.unwrap();

    assert_eq!(endpoint.pages_requested(), vec![1, 2, 3, 4, 5]);
    assert_eq!(report.store.ids().collect::<Vec<_>>(), vec![1, 3, 5]);
}

#[tokio::test]
async fn test_transient_failures_then_success() {
    let dir = TempDir::new().unwrap();
    let h = harness(&dir, quick_config());
    let endpoint = FakeEndpoint::with_pages(&[&[1], &[2]])
        .fail_times(2, 3, server_error)
        .with_clock(h.clock.clone());

    let report = h.executor.run(&endpoint).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.retries, 3);
    assert_eq!(endpoint.pages_requested(), vec![1, 2, 2, 2, 2]);
    // backoff 1s, 2s, 4s
    let sleeps = h.clock.sleeps();
    for backoff in [1, 2, 4] {
        assert!(sleeps.contains(&Duration::from_secs(backoff)), "{sleeps:?}");
    }
}

#[tokio::test]
async fn test_retry_ceiling_makes_exactly_max_retries_plus_one_attempts() {
    for max_retries in [0, 1, 3] {
        let dir = TempDir::new().unwrap();
        let config = FetchConfig {
            max_retries,
            ..quick_config()
        };
        let h = harness(&dir, config);
        let endpoint = FakeEndpoint::with_pages(&[&[1], &[2]]).fail_times(2, 10, || {
            FetcherError::Timeout("deadline elapsed".into())
        });

        let report = h.executor.run(&endpoint).await.unwrap();

        assert_eq!(report.status, RunStatus::RetriesExhausted);
        let page_two_attempts = endpoint.pages_requested().iter().filter(|p| **p == 2).count();
        assert_eq!(page_two_attempts, max_retries as usize + 1);
        assert_eq!(report.retries, max_retries as u64);
        // Progress up to the failing page stays on disk
        assert_eq!(output_ids(&h.paths.output), vec![1]);
        assert_eq!(read_json(&h.paths.checkpoint)["next_cursor"], 2);
        assert_eq!(report.next_cursor, Some(Cursor::Number(2)));
    }
}

#[tokio::test]
async fn test_retry_after_replaces_backoff() {
    let dir = TempDir::new().unwrap();
    let h = harness(&dir, quick_config());
    let endpoint = FakeEndpoint::with_pages(&[&[1]]).fail(
        1,
        FetcherError::RateLimited {
            status: 429,
            info: RateLimitInfo {
                remaining: Some(4),
                retry_after_secs: Some(17),
                ..Default::default()
            },
        },
    );

    let report = h.executor.run(&endpoint).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(h.clock.sleeps()[0], Duration::from_secs(17));
}

#[tokio::test]
async fn test_malformed_response_is_retried() {
    let dir = TempDir::new().unwrap();
    let h = harness(&dir, quick_config());
    let endpoint = FakeEndpoint::with_pages(&[&[1]])
        .fail(1, FetcherError::MalformedResponse("missing field 'response'".into()))
        .fail(1, FetcherError::Api("{\"requests\":\"busy\"}".into()));

    let report = h.executor.run(&endpoint).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(endpoint.pages_requested(), vec![1, 1, 1]);
}

#[tokio::test]
async fn test_daily_cap_stops_and_keeps_progress() {
    let dir = TempDir::new().unwrap();
    let h = harness(&dir, quick_config());
    let endpoint = FakeEndpoint::with_pages(&[&[1], &[2], &[3]]).fail(2, daily_cap(None));

    let report = h.executor.run(&endpoint).await.unwrap();

    assert_eq!(report.status, RunStatus::DailyLimitReached);
    assert_eq!(endpoint.pages_requested(), vec![1, 2]);
    assert_eq!(output_ids(&h.paths.output), vec![1]);
    assert_eq!(read_json(&h.paths.checkpoint)["next_cursor"], 2);
}

#[tokio::test]
async fn test_daily_cap_wait_does_not_consume_retries() {
    let dir = TempDir::new().unwrap();
    let config = FetchConfig {
        wait_for_reset: true,
        max_retries: 0,
        ..quick_config()
    };
    let h = harness(&dir, config);
    let endpoint = FakeEndpoint::with_pages(&[&[1], &[2]])
        .fail(2, daily_cap(Some(EPOCH as u64 + 3_600)))
        .fail(2, daily_cap(None));

    let report = h.executor.run(&endpoint).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.retries, 0);
    assert_eq!(endpoint.pages_requested(), vec![1, 2, 2, 2]);
    let sleeps = h.clock.sleeps();
    // reset header read as a unix timestamp, then the 60s fallback
    assert!(sleeps.iter().any(|s| s.as_secs() >= 3_500 && s.as_secs() <= 3_600), "{sleeps:?}");
    assert!(sleeps.contains(&Duration::from_secs(60)), "{sleeps:?}");
}

#[tokio::test]
async fn test_reset_waits_stop_at_configured_cap() {
    let dir = TempDir::new().unwrap();
    let config = FetchConfig {
        wait_for_reset: true,
        max_reset_waits: Some(1),
        ..quick_config()
    };
    let h = harness(&dir, config);
    let endpoint = FakeEndpoint::with_pages(&[&[1], &[2]])
        .fail(2, daily_cap(None))
        .fail(2, daily_cap(None));

    let report = h.executor.run(&endpoint).await.unwrap();

    assert_eq!(report.status, RunStatus::DailyLimitReached);
    assert_eq!(endpoint.pages_requested(), vec![1, 2, 2]);
    let resets = h
        .clock
        .sleeps()
        .iter()
        .filter(|s| **s == Duration::from_secs(60))
        .count();
    assert_eq!(resets, 1);
    assert_eq!(report.next_cursor, Some(Cursor::Number(2)));
    assert_eq!(output_ids(&h.paths.output), vec![1]);
}

#[tokio::test]
async fn test_rejected_request_stops_without_retry() {
    let dir = TempDir::new().unwrap();
    let h = harness(&dir, quick_config());
    let endpoint = FakeEndpoint::with_pages(&[&[1], &[2]]).fail(
        2,
        FetcherError::Rejected {
            status: 401,
            body: "invalid key".into(),
        },
    );

    let report = h.executor.run(&endpoint).await.unwrap();

    assert_eq!(report.status, RunStatus::Rejected);
    assert_eq!(endpoint.pages_requested(), vec![1, 2]);
    assert!(report.error.unwrap().contains("401"));
    assert_eq!(output_ids(&h.paths.output), vec![1]);
}

#[tokio::test]
async fn test_persistence_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let paths = ResumePaths {
        output: blocker.join("out.json"),
        checkpoint: blocker.join("out.checkpoint.json"),
        lock: dir.path().join("out.lock"),
    };
    let executor = FetchExecutor::new(quick_config(), paths)
        .with_clock(Arc::new(ManualClock::new(EPOCH)))
        .with_shutdown(ShutdownCoordinator::shared());
    let endpoint = FakeEndpoint::with_pages(&[&[1], &[2]]);

    let result = executor.run(&endpoint).await;

    assert!(matches!(result, Err(DownloadError::Persistence(_))));
    // The failed save is not retried
    assert_eq!(endpoint.pages_requested(), vec![1]);
}

#[tokio::test]
async fn test_output_in_missing_directory_is_created() {
    let dir = TempDir::new().unwrap();
    let h = harness_at(&dir.path().join("assets").join("players.json"), quick_config());
    let endpoint = FakeEndpoint::with_pages(&[&[1]]);

    let report = h.executor.run(&endpoint).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert!(dir.path().join("assets").join("players.checkpoint.json").exists());
}

#[tokio::test]
async fn test_second_concurrent_run_is_locked_out() {
    let dir = TempDir::new().unwrap();
    let h = harness(&dir, quick_config());
    let mut lock = RunLock::open(&h.paths.lock).unwrap();
    let _guard = lock.try_exclusive().unwrap();
    let endpoint = FakeEndpoint::with_pages(&[&[1]]);

    let result = h.executor.run(&endpoint).await;

    assert!(matches!(result, Err(DownloadError::Locked(_))));
    assert!(endpoint.calls().is_empty());
}

fn daily_cap(reset: Option<u64>) -> FetcherError {
    FetcherError::RateLimited {
        status: 429,
        info: RateLimitInfo {
            limit: Some(100),
            remaining: Some(0),
            reset,
            retry_after_secs: None,
        },
    }
}
