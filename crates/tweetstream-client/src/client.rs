//! Streaming client implementation

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, instrument, trace, warn};
use tweetstream_core::{
    classify, Credentials, FilterSpec, Phase, RateWindow, Result, StreamError, TransportError,
};
use url::Url;

use crate::config::StreamConfig;
use crate::lines::LineBuffer;
use crate::transport::{Connection, HttpTransport, RequestMethod, StreamRequest, Transport};

/// Lifecycle of a stream client
///
/// Transitions only go forward: `Disconnected → Connected → Closed`, or
/// straight to `Closed` when connecting fails. A closed client stays closed;
/// reconnecting means building a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Closed,
}

/// Closes a [`StreamClient`] from another task or thread
///
/// A `next_record` call blocked on the network returns
/// [`StreamError::Closed`] as soon as the handle is used.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    signal: Arc<watch::Sender<bool>>,
}

impl CloseHandle {
    /// Ask the client to close
    pub fn close(&self) {
        self.signal.send_replace(true);
    }

    /// Whether close was requested
    pub fn is_closed(&self) -> bool {
        *self.signal.borrow()
    }
}

/// A single streaming subscription
///
/// Records are pulled with [`next_record`](Self::next_record). The first call
/// opens the connection. Errors are classified into [`StreamError`] kinds
/// and close the client; the client never reconnects on its own.
///
/// # Example
///
/// ```no_run
/// use tweetstream_client::{Credentials, FilterSpec, StreamClient};
///
/// # async fn example() -> Result<(), tweetstream_client::StreamError> {
/// let filter = FilterSpec::new().track(["rust"]);
/// let mut client = StreamClient::filter(Credentials::bearer("token"), filter)?;
///
/// loop {
///     match client.next_record().await {
///         Ok(record) => println!("{}", record),
///         Err(e) => {
///             eprintln!("stream ended: {} (backoff: {})", e, e.backoff());
///             break;
///         }
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct StreamClient {
    config: StreamConfig,
    transport: Arc<dyn Transport>,
    connection: Option<Box<dyn Connection>>,
    state: ConnectionState,
    lines: LineBuffer,
    count: u64,
    rate: RateWindow,
    start_time: Option<DateTime<Utc>>,
    close_tx: Arc<watch::Sender<bool>>,
    close_rx: watch::Receiver<bool>,
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("url", &self.url())
            .field("state", &self.state)
            .field("count", &self.count)
            .field("pending_bytes", &self.lines.pending())
            .finish_non_exhaustive()
    }
}

impl StreamClient {
    /// Create a client over HTTP
    ///
    /// Fails with [`StreamError::Configuration`] before any network activity
    /// when the configuration is invalid.
    pub fn new(config: StreamConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config.connect_timeout())
            .map_err(|e| StreamError::configuration(e.to_string()))?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a client over a custom transport
    pub fn with_transport(config: StreamConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let (close_tx, close_rx) = watch::channel(false);
        let rate = RateWindow::new(config.rate_period());

        Ok(Self {
            config,
            transport,
            connection: None,
            state: ConnectionState::Disconnected,
            lines: LineBuffer::new(),
            count: 0,
            rate,
            start_time: None,
            close_tx: Arc::new(close_tx),
            close_rx,
        })
    }

    /// Client for the unfiltered sample stream
    pub fn sample(credentials: Credentials) -> Result<Self> {
        Self::new(StreamConfig::sample(credentials))
    }

    /// Client for a filter stream
    pub fn filter(credentials: Credentials, filter: FilterSpec) -> Result<Self> {
        Self::new(StreamConfig::filter(credentials, filter))
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        self.config.endpoint()
    }

    /// Client configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the stream is currently connected
    pub fn connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// When the first successful connect happened
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    /// Number of payload records returned so far
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Payload records per second over the last sampling window
    pub fn rate(&mut self) -> f64 {
        self.rate.rate(Instant::now())
    }

    /// Bytes of an unterminated line waiting for the rest of its data
    pub fn pending_bytes(&self) -> usize {
        self.lines.pending()
    }

    /// Handle for closing this client from elsewhere
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            signal: self.close_tx.clone(),
        }
    }

    /// Open the connection
    ///
    /// Does nothing when already connected. On failure the client is closed
    /// and the classified error returned.
    #[instrument(skip(self), fields(url = %self.url()))]
    pub async fn connect(&mut self) -> Result<()> {
        self.check_close_signal();
        match self.state {
            ConnectionState::Connected => return Ok(()),
            ConnectionState::Closed => return Err(StreamError::Closed),
            ConnectionState::Disconnected => {}
        }

        let request = match self.build_request() {
            Ok(request) => request,
            Err(e) => return Err(self.fail(e)),
        };
        debug!(
            method = %request.method,
            fields = request.form.len(),
            "Opening stream"
        );

        let timeout = self.config.connect_timeout() + self.config.read_timeout();
        let opened = {
            let transport = self.transport.clone();
            let open = tokio::time::timeout(timeout, transport.open(&request));
            tokio::select! {
                biased;
                _ = self.close_rx.wait_for(|closed| *closed) => None,
                result = open => Some(result.unwrap_or(Err(TransportError::Timeout))),
            }
        };

        match opened {
            None => Err(self.fail(StreamError::Closed)),
            Some(Ok(connection)) => {
                self.connection = Some(connection);
                self.state = ConnectionState::Connected;
                if self.start_time.is_none() {
                    self.start_time = Some(Utc::now());
                }
                info!("Stream connected");
                Ok(())
            }
            Some(Err(e)) => {
                let error = classify(Phase::Connect, e, self.url());
                Err(self.fail(error))
            }
        }
    }

    /// Next complete line as raw bytes, without UTF-8 or JSON decoding
    ///
    /// Keepalive lines are skipped. A line counts as a payload record when it
    /// contains the quoted `count_field` key, so `count` and `rate` work
    /// without decoding.
    pub async fn next_bytes(&mut self) -> Result<Bytes> {
        let line = self.next_raw_line().await?;
        if self.has_payload_marker(&line) {
            self.count += 1;
            self.rate.record(Instant::now());
        }
        Ok(line)
    }

    /// Next complete line from the stream, undecoded
    ///
    /// Keepalive lines are skipped. Connects first if needed.
    pub async fn next_line(&mut self) -> Result<String> {
        let line = self.next_raw_line().await?;
        match String::from_utf8(line.to_vec()) {
            Ok(text) => Ok(text),
            Err(e) => {
                let error = StreamError::reconnect_immediately("Could not decode as UTF-8")
                    .with_details(e.to_string());
                Err(self.fail(error))
            }
        }
    }

    /// Next decoded record from the stream
    ///
    /// Blocks until a full line has arrived, the read times out, the stream
    /// ends or the client is closed.
    pub async fn next_record(&mut self) -> Result<Value> {
        let line = self.next_line().await?;
        let record: Value = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                debug!(error = %e, "Undecodable line");
                let error = StreamError::reconnect_immediately("Got invalid data from stream")
                    .with_details(line);
                return Err(self.fail(error));
            }
        };

        if self.is_payload(&record) {
            self.count += 1;
            self.rate.record(Instant::now());
        }
        Ok(record)
    }

    /// Close the connection
    ///
    /// Safe to call any number of times.
    pub fn close(&mut self) {
        if self.state != ConnectionState::Closed {
            debug!(count = self.count, "Closing stream");
        }
        self.state = ConnectionState::Closed;
        self.connection = None;
        self.lines.clear();
    }

    async fn next_raw_line(&mut self) -> Result<Bytes> {
        self.connect().await?;

        loop {
            if let Some(line) = self.lines.pop_line() {
                return Ok(line);
            }

            match self.read_chunk().await {
                Ok(Some(chunk)) if chunk.is_empty() && self.lines.is_empty() => {
                    return Err(self.fail(StreamError::reconnect_immediately(
                        "Got entry of length 0. Server disconnected",
                    )));
                }
                Ok(Some(chunk)) => {
                    trace!(len = chunk.len(), "Read chunk");
                    self.lines.push(&chunk);
                }
                Ok(None) => {
                    let error = StreamError::reconnect_immediately("Server disconnected");
                    return Err(self.fail(error));
                }
                Err(e) => return Err(self.fail(e)),
            }
        }
    }

    async fn read_chunk(&mut self) -> Result<Option<Bytes>> {
        self.check_close_signal();
        let timeout = self.config.read_timeout();
        let url = self.config.endpoint().to_string();

        let Some(connection) = self.connection.as_mut() else {
            return Err(StreamError::Closed);
        };

        tokio::select! {
            biased;
            _ = self.close_rx.wait_for(|closed| *closed) => Err(StreamError::Closed),
            result = tokio::time::timeout(timeout, connection.chunk()) => {
                match result {
                    Ok(Ok(chunk)) => Ok(chunk),
                    Ok(Err(e)) => Err(classify(Phase::Read, e, &url)),
                    Err(_) => Err(classify(Phase::Read, TransportError::Timeout, &url)),
                }
            }
        }
    }

    fn build_request(&self) -> Result<StreamRequest> {
        let url = Url::parse(self.url()).map_err(|e| {
            StreamError::fatal(format!("Invalid endpoint URL: {}", self.url()), None)
                .with_details(e.to_string())
        })?;

        let form = self.config.form_params();
        let method = if form.is_empty() {
            RequestMethod::Get
        } else {
            RequestMethod::Post
        };

        Ok(StreamRequest {
            method,
            url,
            user_agent: self.config.user_agent.clone(),
            credentials: self.config.credentials.clone(),
            form,
        })
    }

    fn is_payload(&self, record: &Value) -> bool {
        match &self.config.count_field {
            Some(field) => record.get(field).is_some(),
            None => true,
        }
    }

    fn has_payload_marker(&self, line: &[u8]) -> bool {
        let Some(field) = &self.config.count_field else {
            return true;
        };
        let marker = format!("\"{}\"", field);
        line.windows(marker.len()).any(|window| window == marker.as_bytes())
    }

    /// A close requested through a handle applies even if no read is pending
    fn check_close_signal(&mut self) {
        if *self.close_rx.borrow() && self.state != ConnectionState::Closed {
            self.close();
        }
    }

    /// Close the connection and hand back the error to return
    fn fail(&mut self, error: StreamError) -> StreamError {
        match &error {
            StreamError::Closed => debug!("Stream closed while waiting"),
            e => warn!(backoff = %e.backoff(), "{}", e),
        }
        self.close();
        error
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.close();
    }
}
