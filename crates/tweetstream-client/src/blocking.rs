//! Blocking facade over [`crate::StreamClient`]
//!
//! For callers without an async runtime. Each client owns a current-thread
//! tokio runtime and drives the async client on it.
//!
//! ```no_run
//! use tweetstream_client::blocking::StreamClient;
//! use tweetstream_client::Credentials;
//!
//! # fn main() -> Result<(), tweetstream_client::StreamError> {
//! let mut client = StreamClient::sample(Credentials::basic("user", "pass"))?;
//! for record in client.records().take(10) {
//!     println!("{}", record?);
//! }
//! println!("{} tweets", client.count());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::runtime::{Builder, Runtime};
use tweetstream_core::{Credentials, FilterSpec, Result, StreamError};

use crate::client::{CloseHandle, ConnectionState};
use crate::config::StreamConfig;
use crate::transport::Transport;

/// Blocking stream client
///
/// [`records`](Self::records) iterates over the stream. The client stays
/// usable while and after iterating, so accessors like `count` reflect what
/// has been read so far.
pub struct StreamClient {
    // Dropped before the runtime it was driven on
    inner: crate::client::StreamClient,
    runtime: Runtime,
    finished: bool,
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("blocking::StreamClient")
            .field("inner", &self.inner)
            .field("finished", &self.finished)
            .finish()
    }
}

impl StreamClient {
    /// Create a client over HTTP
    pub fn new(config: StreamConfig) -> Result<Self> {
        let runtime = build_runtime()?;
        let inner = crate::client::StreamClient::new(config)?;
        Ok(Self::from_parts(inner, runtime))
    }

    /// Create a client over a custom transport
    pub fn with_transport(config: StreamConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let runtime = build_runtime()?;
        let inner = crate::client::StreamClient::with_transport(config, transport)?;
        Ok(Self::from_parts(inner, runtime))
    }

    /// Client for the unfiltered sample stream
    pub fn sample(credentials: Credentials) -> Result<Self> {
        Self::new(StreamConfig::sample(credentials))
    }

    /// Client for a filter stream
    pub fn filter(credentials: Credentials, filter: FilterSpec) -> Result<Self> {
        Self::new(StreamConfig::filter(credentials, filter))
    }

    fn from_parts(inner: crate::client::StreamClient, runtime: Runtime) -> Self {
        Self {
            inner,
            runtime,
            finished: false,
        }
    }

    /// Open the connection
    pub fn connect(&mut self) -> Result<()> {
        self.runtime.block_on(self.inner.connect())
    }

    /// Next decoded record
    pub fn next_record(&mut self) -> Result<Value> {
        self.runtime.block_on(self.inner.next_record())
    }

    /// Next raw line as bytes, counted by payload marker
    pub fn next_bytes(&mut self) -> Result<Bytes> {
        self.runtime.block_on(self.inner.next_bytes())
    }

    /// Next raw line
    pub fn next_line(&mut self) -> Result<String> {
        self.runtime.block_on(self.inner.next_line())
    }

    /// Close the connection
    pub fn close(&mut self) {
        self.inner.close();
    }

    /// Handle usable from any thread to interrupt a blocked read
    pub fn close_handle(&self) -> CloseHandle {
        self.inner.close_handle()
    }

    pub fn url(&self) -> &str {
        self.inner.url()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    pub fn connected(&self) -> bool {
        self.inner.connected()
    }

    pub fn count(&self) -> u64 {
        self.inner.count()
    }

    pub fn rate(&mut self) -> f64 {
        self.inner.rate()
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.inner.start_time()
    }

    pub fn pending_bytes(&self) -> usize {
        self.inner.pending_bytes()
    }

    /// Iterate over decoded records
    ///
    /// Yields records until the stream fails, then the error once, then
    /// `None` for good, across every `records` call on this client.
    pub fn records(&mut self) -> Records<'_> {
        Records { client: self }
    }
}

/// Iterator over the records of a blocking [`StreamClient`]
#[derive(Debug)]
pub struct Records<'a> {
    client: &'a mut StreamClient,
}

impl Iterator for Records<'_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.client.finished {
            return None;
        }
        let result = self.client.next_record();
        if result.is_err() {
            self.client.finished = true;
        }
        Some(result)
    }
}

impl<'a> IntoIterator for &'a mut StreamClient {
    type Item = Result<Value>;
    type IntoIter = Records<'a>;

    fn into_iter(self) -> Records<'a> {
        self.records()
    }
}

fn build_runtime() -> Result<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| StreamError::configuration(format!("Failed to start runtime: {}", e)))
}
