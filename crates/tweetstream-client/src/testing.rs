//! Test utilities for tweetstream-client
//!
//! [`TestServer`] is a throwaway HTTP server on an ephemeral local port that
//! answers every request with a scripted [`TestResponse`]. The body can be
//! delivered in chunks with pauses in between, which is what streaming tests
//! need to exercise buffering, keepalives and read timeouts.
//!
//! ```no_run
//! use std::time::Duration;
//! use tweetstream_client::testing::{TestResponse, TestServer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let server = TestServer::start(
//!     TestResponse::ok()
//!         .line(r#"{"text":"first"}"#)
//!         .pause(Duration::from_secs(2))
//!         .line(r#"{"text":"second"}"#),
//! )?;
//! let url = format!("{}/1.1/statuses/sample.json", server.base_url());
//! // point a client at `url`
//! server.shutdown()?;
//! # Ok(())
//! # }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// How long to wait for the server thread to come up or go down
const SIGNAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Reason phrase of the non-standard rate limit status
const RATE_LIMIT_REASON: &str = "Enhance Your Calm";

/// Test server errors
#[derive(Debug, thiserror::Error)]
pub enum TestServerError {
    #[error("Failed to start server runtime: {0}")]
    Runtime(String),

    #[error("Failed to bind listener: {0}")]
    Bind(String),

    #[error("Server did not become ready within {0:?}")]
    StartTimeout(Duration),

    #[error("Server did not stop within {0:?}")]
    StopTimeout(Duration),
}

/// Piece of a scripted response body
#[derive(Debug, Clone)]
pub enum BodyPart {
    Data(Bytes),
    Pause(Duration),
}

/// Scripted response served for every request
#[derive(Debug, Clone)]
pub struct TestResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<BodyPart>,
}

impl TestResponse {
    /// `200 OK` with a JSON content type and an empty body
    pub fn ok() -> Self {
        Self::status(200).header("content-type", "application/json")
    }

    /// Response with the given status and no body
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Set the status from its reason phrase, e.g. `"Not Found"`
    ///
    /// Matching ignores case. `"Enhance Your Calm"` maps to 420. Unknown
    /// phrases give 500.
    pub fn reason(mut self, phrase: &str) -> Self {
        self.status = status_for_reason(phrase).unwrap_or_else(|| {
            warn!(phrase, "Unknown reason phrase, answering 500");
            500
        });
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Append raw bytes as one chunk
    pub fn chunk(mut self, data: impl Into<Bytes>) -> Self {
        self.body.push(BodyPart::Data(data.into()));
        self
    }

    /// Append a CRLF-terminated line as one chunk
    pub fn line(self, line: impl AsRef<str>) -> Self {
        self.chunk(format!("{}\r\n", line.as_ref()))
    }

    /// Append several lines, one chunk each
    pub fn lines<I, S>(self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        lines.into_iter().fold(self, |response, line| response.line(line))
    }

    /// Append a bare keepalive
    pub fn keepalive(self) -> Self {
        self.chunk("\r\n")
    }

    /// Wait before sending the rest of the body
    pub fn pause(mut self, duration: Duration) -> Self {
        self.body.push(BodyPart::Pause(duration));
        self
    }
}

fn status_for_reason(phrase: &str) -> Option<u16> {
    let phrase = phrase.trim();
    if phrase.eq_ignore_ascii_case(RATE_LIMIT_REASON) {
        return Some(420);
    }
    (100u16..600).find(|&code| {
        StatusCode::from_u16(code)
            .ok()
            .and_then(|status| status.canonical_reason())
            .is_some_and(|reason| reason.eq_ignore_ascii_case(phrase))
    })
}

/// A request received by the test server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Header names are lowercase
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    /// First value of a header, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Body decoded as `application/x-www-form-urlencoded`
    pub fn form(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(self.body.as_bytes())
            .into_owned()
            .collect()
    }
}

struct Shared {
    response: TestResponse,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// A test server that shuts down when dropped
///
/// Runs on a dedicated thread with its own runtime, so it works the same
/// from blocking tests and from async tests.
pub struct TestServer {
    addr: SocketAddr,
    shared: Arc<Shared>,
    stop_tx: Option<oneshot::Sender<()>>,
    done_rx: mpsc::Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Start a server answering every request with `response`
    ///
    /// Returns once the listener is bound and accepting.
    pub fn start(response: TestResponse) -> Result<Self, TestServerError> {
        let shared = Arc::new(Shared {
            response,
            requests: Mutex::new(Vec::new()),
        });
        let router = Router::new()
            .fallback(handle_request)
            .with_state(shared.clone());

        let (ready_tx, ready_rx) = mpsc::channel::<Result<SocketAddr, TestServerError>>();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let thread = std::thread::spawn(move || {
            serve(router, ready_tx, stop_rx);
            let _ = done_tx.send(());
        });

        let addr = match ready_rx.recv_timeout(SIGNAL_TIMEOUT) {
            Ok(Ok(addr)) => addr,
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(TestServerError::StartTimeout(SIGNAL_TIMEOUT)),
        };
        debug!(%addr, "Test server ready");

        Ok(Self {
            addr,
            shared,
            stop_tx: Some(stop_tx),
            done_rx,
            thread: Some(thread),
        })
    }

    /// Bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the base URL of the test server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.shared.requests.lock().clone()
    }

    /// Stop the server and wait for its thread
    pub fn shutdown(mut self) -> Result<(), TestServerError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), TestServerError> {
        let Some(stop_tx) = self.stop_tx.take() else {
            return Ok(());
        };
        let _ = stop_tx.send(());

        match self.done_rx.recv_timeout(SIGNAL_TIMEOUT) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                if let Some(thread) = self.thread.take() {
                    let _ = thread.join();
                }
                Ok(())
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                Err(TestServerError::StopTimeout(SIGNAL_TIMEOUT))
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(addr = %self.addr, "Test server leaked: {}", e);
        }
    }
}

fn serve(
    router: Router,
    ready_tx: mpsc::Sender<Result<SocketAddr, TestServerError>>,
    stop_rx: oneshot::Receiver<()>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready_tx.send(Err(TestServerError::Runtime(e.to_string())));
            return;
        }
    };

    runtime.block_on(async move {
        let listener = match TcpListener::bind("127.0.0.1:0").await {
            Ok(listener) => listener,
            Err(e) => {
                let _ = ready_tx.send(Err(TestServerError::Bind(e.to_string())));
                return;
            }
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                let _ = ready_tx.send(Err(TestServerError::Bind(e.to_string())));
                return;
            }
        };
        let _ = ready_tx.send(Ok(addr));

        let server = async move { axum::serve(listener, router).await };
        // Open streams are dropped with the runtime instead of drained
        tokio::select! {
            _ = stop_rx => {}
            result = server => {
                if let Err(e) = result {
                    warn!("Test server failed: {}", e);
                }
            }
        }
    });
}

async fn handle_request(
    State(shared): State<Arc<Shared>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    shared.requests.lock().push(RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(String::from),
        headers: headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect(),
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    let script = &shared.response;
    let status = StatusCode::from_u16(script.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let parts = script.body.clone();
    let stream = async_stream::stream! {
        for part in parts {
            match part {
                BodyPart::Data(data) => yield Ok::<Bytes, Infallible>(data),
                BodyPart::Pause(duration) => tokio::time::sleep(duration).await,
            }
        }
    };

    let mut builder = Response::builder().status(status);
    for (name, value) in &script.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Body::from_stream(stream))
        .unwrap_or_else(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response())
}
