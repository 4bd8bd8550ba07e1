//! Integration tests for tweetstream-client
//!
//! These tests run the client over real HTTP against the scripted test server.

use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use tweetstream_client::testing::{TestResponse, TestServer};
use tweetstream_client::{
    Backoff, ConnectionState, Credentials, ExponentialCause, FilterSpec, StreamClient,
    StreamConfig, StreamError,
};

const TWEET: &str = r#"{"text":"hello world","id":1}"#;

// =============================================================================
// Helpers
// =============================================================================

fn sample_config(server: &TestServer) -> StreamConfig {
    StreamConfig::builder()
        .url(format!("{}/1.1/statuses/sample.json", server.base_url()))
        .credentials(Credentials::basic("username", "password"))
        .build()
}

fn sample_client(server: &TestServer) -> StreamClient {
    StreamClient::new(sample_config(server)).unwrap()
}

async fn drain(client: &mut StreamClient) -> (usize, StreamError) {
    let mut records = 0;
    loop {
        match client.next_record().await {
            Ok(_) => records += 1,
            Err(e) => return (records, e),
        }
    }
}

// =============================================================================
// Connect-time classification
// =============================================================================

#[tokio::test]
async fn test_status_codes() {
    for status in [401u16, 404, 406, 413, 416, 420, 500, 503] {
        let server = TestServer::start(TestResponse::status(status)).unwrap();
        let mut client = sample_client(&server);

        let err = client.next_record().await.unwrap_err();
        let expected = match status {
            401 => matches!(err, StreamError::Authentication { .. }),
            404 | 406 | 413 | 416 => matches!(err, StreamError::Fatal { .. }),
            420 => err.is_rate_limited() && err.backoff() == Backoff::Exponential,
            _ => matches!(
                err,
                StreamError::ReconnectExponentially {
                    cause: ExponentialCause::HttpStatus,
                    ..
                }
            ),
        };
        assert!(expected, "status {} gave {:?}", status, err);
        assert_eq!(err.status(), Some(status));
        assert_eq!(client.state(), ConnectionState::Closed);
        assert_eq!(server.requests().len(), 1);
    }
}

#[tokio::test]
async fn test_status_by_reason_phrase() {
    let cases = [
        ("Unauthorized", 401u16),
        ("Not Found", 404),
        ("Enhance Your Calm", 420),
        ("Service Unavailable", 503),
    ];
    for (phrase, status) in cases {
        let server = TestServer::start(TestResponse::ok().reason(phrase)).unwrap();
        let mut client = sample_client(&server);

        let err = client.next_record().await.unwrap_err();
        assert_eq!(err.status(), Some(status), "{} gave {:?}", phrase, err);
        assert_eq!(client.state(), ConnectionState::Closed);
    }
}

#[tokio::test]
async fn test_redirect_is_not_followed() {
    let server = TestServer::start(
        TestResponse::status(302).header("location", "http://127.0.0.1:1/elsewhere"),
    )
    .unwrap();
    let mut client = sample_client(&server);

    let err = client.connect().await.unwrap_err();
    assert_eq!(err.status(), Some(302));
    assert_eq!(err.backoff(), Backoff::Exponential);
}

#[tokio::test]
async fn test_bad_host() {
    let config = StreamConfig::builder()
        .url("http://127.0.0.1:1/1.1/statuses/sample.json")
        .connect_timeout(Duration::from_secs(2))
        .build();
    let mut client = StreamClient::new(config).unwrap();

    let err = client.next_record().await.unwrap_err();
    assert!(
        matches!(
            err,
            StreamError::ReconnectExponentially {
                cause: ExponentialCause::Connect,
                ..
            }
        ),
        "got {:?}",
        err
    );
    assert!(err.is_retryable());
    assert_eq!(client.start_time(), None);
}

// =============================================================================
// Reading
// =============================================================================

#[tokio::test]
async fn test_bad_content() {
    let server = TestServer::start(TestResponse::ok().lines([
        TWEET,
        TWEET,
        "[1,2, I need no stinking close brace",
        TWEET,
    ]))
    .unwrap();
    let mut client = sample_client(&server);

    let (records, err) = drain(&mut client).await;
    assert_eq!(records, 2);
    assert!(matches!(err, StreamError::ReconnectImmediately { .. }));
    assert_eq!(err.details(), Some("[1,2, I need no stinking close brace"));
    assert!(!client.connected());
}

#[tokio::test]
async fn test_closed_connection() {
    let server = TestServer::start(TestResponse::ok().lines([TWEET, TWEET, TWEET])).unwrap();
    let mut client = sample_client(&server);

    let (records, err) = drain(&mut client).await;
    assert_eq!(records, 3);
    assert_eq!(client.count(), 3);
    assert_eq!(err, StreamError::reconnect_immediately("Server disconnected"));
    assert!(client.start_time().is_some());
}

#[tokio::test]
async fn test_keepalives_are_skipped() {
    let server = TestServer::start(
        TestResponse::ok()
            .line(TWEET)
            .keepalive()
            .keepalive()
            .line(TWEET)
            .keepalive()
            .keepalive()
            .keepalive()
            .line(TWEET)
            .keepalive(),
    )
    .unwrap();
    let mut client = sample_client(&server);

    let (records, _) = drain(&mut client).await;
    assert_eq!(records, 3);
    assert_eq!(client.count(), 3);
}

#[tokio::test]
async fn test_records_split_across_chunks() {
    let server = TestServer::start(
        TestResponse::ok()
            .chunk(r#"{"text":"sp"#)
            .pause(Duration::from_millis(50))
            .chunk("lit\"}\r")
            .pause(Duration::from_millis(50))
            .chunk("\n{\"text\":\"next\"}\r\n"),
    )
    .unwrap();
    let mut client = sample_client(&server);

    assert_eq!(client.next_record().await.unwrap()["text"], "split");
    assert_eq!(client.next_record().await.unwrap()["text"], "next");
}

#[tokio::test]
async fn test_buffering() {
    let server = TestServer::start(
        TestResponse::ok()
            .line(TWEET)
            .pause(Duration::from_secs(2))
            .line(TWEET),
    )
    .unwrap();
    let mut client = sample_client(&server);

    let started = Instant::now();
    client.next_record().await.unwrap();
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "first record took {:?}",
        started.elapsed()
    );

    client.next_record().await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_read_timeout() {
    let server = TestServer::start(
        TestResponse::ok()
            .line(TWEET)
            .pause(Duration::from_secs(10)),
    )
    .unwrap();
    let config = StreamConfig::builder()
        .url(format!("{}/sample.json", server.base_url()))
        .read_timeout(Duration::from_millis(500))
        .build();
    let mut client = StreamClient::new(config).unwrap();

    client.next_record().await.unwrap();
    let started = Instant::now();
    let err = client.next_record().await.unwrap_err();
    assert_eq!(err, StreamError::reconnect_immediately("Stream timed out"));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_close_handle_interrupts_read() {
    let server = TestServer::start(
        TestResponse::ok()
            .line(TWEET)
            .pause(Duration::from_secs(30)),
    )
    .unwrap();
    let mut client = sample_client(&server);
    client.next_record().await.unwrap();

    let handle = client.close_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.close();
    });

    let started = Instant::now();
    assert_eq!(client.next_record().await.unwrap_err(), StreamError::Closed);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(client.state(), ConnectionState::Closed);
}

// =============================================================================
// Request shape
// =============================================================================

#[tokio::test]
async fn test_sample_request() {
    let server = TestServer::start(TestResponse::ok()).unwrap();
    let config = StreamConfig::builder()
        .url(format!("{}/1.1/statuses/sample.json", server.base_url()))
        .credentials(Credentials::bearer("token"))
        .user_agent("tweetstream-tests/1.0")
        .build();
    let mut client = StreamClient::new(config).unwrap();
    client.connect().await.unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "GET");
    assert_eq!(request.path, "/1.1/statuses/sample.json");
    assert_eq!(request.header("authorization"), Some("Bearer token"));
    assert_eq!(request.header("user-agent"), Some("tweetstream-tests/1.0"));
    assert!(request.body.is_empty());
}

#[tokio::test]
async fn test_filter_request() {
    let server = TestServer::start(TestResponse::ok().line(TWEET)).unwrap();
    let filter = FilterSpec::new()
        .track(["foo", "bar"])
        .follow(["12", "13"])
        .locations(["-122.75", "36.8", "-121.75", "37.8"]);
    let config = StreamConfig::builder()
        .url(format!("{}/1.1/statuses/filter.json", server.base_url()))
        .credentials(Credentials::basic("username", "password"))
        .filter(filter)
        .catchup(5)
        .build();
    let mut client = StreamClient::new(config).unwrap();
    client.next_record().await.unwrap();

    let requests = server.requests();
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/1.1/statuses/filter.json");
    assert_eq!(
        request.header("authorization"),
        Some("Basic dXNlcm5hbWU6cGFzc3dvcmQ=")
    );
    assert_eq!(
        request.header("content-type"),
        Some("application/x-www-form-urlencoded")
    );
    assert_eq!(
        request.form(),
        vec![
            ("track".to_string(), "foo,bar".to_string()),
            ("follow".to_string(), "12,13".to_string()),
            ("locations".to_string(), "-122.75,36.8,-121.75,37.8".to_string()),
            ("count".to_string(), "5".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_empty_filter_never_reaches_server() {
    let server = TestServer::start(TestResponse::ok()).unwrap();
    let config = StreamConfig::builder()
        .url(format!("{}/filter.json", server.base_url()))
        .filter(FilterSpec::new().locations(["1", "2", "3", "4"]))
        .build();

    let err = StreamClient::new(config).unwrap_err();
    assert!(matches!(err, StreamError::Configuration(_)));
    assert!(server.requests().is_empty());
}
