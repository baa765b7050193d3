//! HTTP endpoint against a local scripted server

use crate::support::{harness_at, quick_config};
use player_data_downloader::downloader::{FetchConfig, RunStatus};
use player_data_downloader::fetcher::sources::Source;
use player_data_downloader::fetcher::{FetcherError, PageFetcher};
use player_data_downloader::Cursor;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Canned response: status, extra headers, body
type Reply = (u16, Vec<(&'static str, String)>, String);

struct TestServer {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    /// Serve `replies` in order, one per connection
    async fn start(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let replies = Arc::new(Mutex::new(VecDeque::from(replies)));

        let seen = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                seen.lock()
                    .unwrap()
                    .push(String::from_utf8_lossy(&buf).into_owned());

                let (status, headers, body) = replies
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or((404, vec![], String::new()));
                let mut response = format!(
                    "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n",
                    body.len()
                );
                for (name, value) in headers {
                    response.push_str(&format!("{name}: {value}\r\n"));
                }
                response.push_str("\r\n");
                response.push_str(&body);
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self { base_url, requests }
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn ok(body: serde_json::Value) -> Reply {
    (200, vec![], body.to_string())
}

#[tokio::test]
async fn api_sports_page_is_requested_and_normalized() {
    let server = TestServer::start(vec![(
        200,
        vec![
            ("x-ratelimit-requests-limit", "100".to_string()),
            ("x-ratelimit-requests-remaining", "42".to_string()),
        ],
        json!({
            "errors": [],
            "paging": {"current": 1, "total": 3},
            "response": [{"player": {"id": 10, "name": "A"}}, {"player": {"id": 11}}]
        })
        .to_string(),
    )])
    .await;

    let endpoint = Source::ApiSports
        .endpoint("secret", Some(&server.base_url), &FetchConfig::default())
        .unwrap();
    let page = endpoint.fetch_page(Some(&Cursor::Number(1))).await.unwrap();

    assert_eq!(page.records.len(), 2);
    assert_eq!(page.next, Some(Cursor::Number(2)));
    assert_eq!(page.rate_limit.remaining, Some(42));
    assert_eq!(page.rate_limit.limit, Some(100));

    let request = server.requests().remove(0).to_lowercase();
    assert!(request.starts_with("get /players/profiles?page=1 "), "{request}");
    assert!(request.contains("x-rapidapi-key: secret"));
    assert!(request.contains("x-rapidapi-host: 127.0.0.1:"));
}

#[tokio::test]
async fn error_statuses_are_classified() {
    let server = TestServer::start(vec![
        (
            429,
            vec![("retry-after", "7".to_string())],
            "{}".to_string(),
        ),
        (
            503,
            vec![("x-ratelimit-requests-remaining", "0".to_string())],
            String::new(),
        ),
        (502, vec![], String::new()),
        (401, vec![], "{\"message\":\"bad key\"}".to_string()),
        (200, vec![], "<html>maintenance</html>".to_string()),
    ])
    .await;
    let endpoint = Source::Balldontlie
        .endpoint("k", Some(&server.base_url), &FetchConfig::default())
        .unwrap();

    let err = endpoint.fetch_page(None).await.unwrap_err();
    assert!(matches!(err, FetcherError::RateLimited { status: 429, .. }));
    assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
    assert!(!err.is_daily_cap());

    let err = endpoint.fetch_page(None).await.unwrap_err();
    assert!(err.is_daily_cap());

    let err = endpoint.fetch_page(None).await.unwrap_err();
    assert!(matches!(err, FetcherError::Server { status: 502, .. }));

    let err = endpoint.fetch_page(None).await.unwrap_err();
    assert!(matches!(err, FetcherError::Rejected { status: 401, ref body } if body.contains("bad key")));
    assert!(!err.is_retryable());

    let err = endpoint.fetch_page(None).await.unwrap_err();
    assert!(matches!(err, FetcherError::MalformedResponse(_)));
}

#[tokio::test]
async fn connection_refused_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let endpoint = Source::Balldontlie
        .endpoint("k", Some(&base_url), &FetchConfig::default())
        .unwrap();
    let err = endpoint.fetch_page(None).await.unwrap_err();
    assert!(matches!(err, FetcherError::Network(_)), "{err}");
}

#[tokio::test]
async fn cursor_listing_downloads_end_to_end() {
    let server = TestServer::start(vec![
        ok(json!({"data": [{"id": 2}, {"id": 1}], "meta": {"next_cursor": 2}})),
        (500, vec![], String::new()),
        ok(json!({"data": [{"id": 3}, {"id": 2}], "meta": {"next_cursor": "c3"}})),
        ok(json!({"data": [{"id": 4}], "meta": {"next_cursor": null}})),
    ])
    .await;
    let dir = TempDir::new().unwrap();
    let config = FetchConfig {
        page_size: 2,
        ..quick_config()
    };
    let h = harness_at(&dir.path().join("nba_players.json"), config.clone());
    let endpoint = Source::Balldontlie
        .endpoint("k", Some(&server.base_url), &config)
        .unwrap();

    let report = h.executor.run(&endpoint).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.store.ids().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    assert_eq!(report.retries, 1);
    let request_lines: Vec<String> = server
        .requests()
        .iter()
        .map(|r| r.lines().next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        request_lines,
        vec![
            "GET /v1/players?per_page=2 HTTP/1.1",
            "GET /v1/players?per_page=2&cursor=2 HTTP/1.1",
            "GET /v1/players?per_page=2&cursor=2 HTTP/1.1",
            "GET /v1/players?per_page=2&cursor=c3 HTTP/1.1",
        ]
    );
}
