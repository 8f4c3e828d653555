use activity_sync::db;
use activity_sync::model::{MediaType, SyncStatus};
use activity_sync::snapshot::{fetch_recent_posts, SnapshotClient, SnapshotService};
use activity_sync::{FetchError, SyncEngine, SyncOptions};
use chrono::Utc;
use reqwest::Url;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve exactly one canned HTTP response and hand back the raw request.
async fn serve_once(status: &'static str, body: &'static str) -> (Url, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&buf).into_owned()
    });
    let url = Url::parse(&format!("http://{addr}/")).unwrap();
    (url, handle)
}

fn client(base: Url) -> SnapshotClient {
    SnapshotClient::with_base_url(base, "202312".into(), "MEMBER_SHARE_INFO".into()).unwrap()
}

#[tokio::test]
async fn ok_response_is_flattened_into_records() {
    let body = r#"{"elements":[{"snapshotDomain":"MEMBER_SHARE_INFO","snapshotData":[
        {"ShareLink":"https://www.linkedin.com/feed/update/urn:li:activity:111","Date":"2024-02-01 09:00:00","ShareCommentary":"first","MediaUrl":"https://media.licdn.com/a.png"},
        {"Visibility":"MEMBER_NETWORK"}
    ]}]}"#;
    let (base, server) = serve_once("200 OK", body).await;
    let client = client(base);

    let posts = fetch_recent_posts(&client, "secret-token", 10, Utc::now())
        .await
        .unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].post_urn, "urn:li:activity:111");
    assert_eq!(posts[0].media_type, MediaType::Image);

    let request = server.await.unwrap();
    assert!(request.starts_with("GET /rest/memberSnapshotData?"));
    assert!(request.contains("domain=MEMBER_SHARE_INFO"));
    assert!(request.contains("count=20"));
    let lower = request.to_ascii_lowercase();
    assert!(lower.contains("authorization: bearer secret-token"));
    assert!(lower.contains("linkedin-version: 202312"));
}

#[tokio::test]
async fn not_found_is_an_empty_snapshot() {
    let (base, server) = serve_once("404 Not Found", r#"{"message":"no data"}"#).await;
    let records = client(base).fetch_raw("tok", 10).await.unwrap();
    assert!(records.is_empty());
    server.await.unwrap();
}

#[tokio::test]
async fn other_errors_carry_status_and_body() {
    let (base, server) = serve_once("429 Too Many Requests", "slow down").await;
    let err = client(base).fetch_raw("tok", 10).await.unwrap_err();
    match err {
        FetchError::Status { status, body } => {
            assert_eq!(status.as_u16(), 429);
            assert_eq!(body, "slow down");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn missing_elements_and_malformed_bodies() {
    let (base, server) = serve_once("200 OK", r#"{"paging":{}}"#).await;
    assert!(client(base).fetch_raw("tok", 10).await.unwrap().is_empty());
    server.await.unwrap();

    let (base, server) = serve_once("200 OK", "not json").await;
    let err = client(base).fetch_raw("tok", 10).await.unwrap_err();
    assert!(matches!(err, FetchError::Decode(_)));
    server.await.unwrap();
}

#[tokio::test]
async fn not_found_counts_as_successful_user_sync() {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let uid = db::create_user(&pool, "Ada", Some("tok")).await.unwrap();

    let (base, server) = serve_once("404 Not Found", "").await;
    let engine = SyncEngine::new(pool.clone(), Arc::new(client(base)), SyncOptions::default());
    let summary = engine.run_scheduled_sync().await.unwrap();
    server.await.unwrap();

    assert_eq!(summary.successful, 1);
    assert_eq!(summary.failed, 0);
    let view = engine.sync_status(uid).await.unwrap();
    assert_eq!(view.status, SyncStatus::Success);
    assert_eq!(view.posts_count, 0);
}
