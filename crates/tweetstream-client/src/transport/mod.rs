//! Transport seam between the stream client and the network
//!
//! The client builds a [`StreamRequest`] and hands it to a [`Transport`],
//! which returns a [`Connection`] yielding body chunks as they arrive.
//! Failures are reported as [`TransportError`] and classified by the client.
//!
//! - [`HttpTransport`] talks HTTP(S) through reqwest
//! - [`mock::MockTransport`] replays a script, for tests
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tweetstream_client::{StreamClient, StreamConfig};
//! use tweetstream_client::transport::mock::{MockStep, MockTransport};
//!
//! let transport = MockTransport::new(vec![MockStep::data("{\"text\":\"hi\"}\r\n")]);
//! let mut client = StreamClient::with_transport(StreamConfig::default(), Arc::new(transport))?;
//! let record = client.next_record().await?;
//! ```

mod http;
pub mod mock;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

pub use http::HttpTransport;
pub use tweetstream_core::TransportError;
use tweetstream_core::Credentials;

/// HTTP method used to open the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestMethod::Get => f.write_str("GET"),
            RequestMethod::Post => f.write_str("POST"),
        }
    }
}

/// Everything a transport needs to open a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub method: RequestMethod,
    pub url: Url,
    pub user_agent: String,
    pub credentials: Option<Credentials>,
    /// Form fields sent url-encoded as the POST body
    pub form: Vec<(String, String)>,
}

/// Opens streaming connections
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and wait for a successful response head
    ///
    /// Non-success statuses are reported as [`TransportError::Status`].
    async fn open(&self, request: &StreamRequest) -> Result<Box<dyn Connection>, TransportError>;
}

/// An open streaming response
///
/// Dropping the connection closes it.
#[async_trait]
pub trait Connection: Send {
    /// Next chunk of the body as it comes off the wire
    ///
    /// `Ok(None)` means the server ended the body.
    async fn chunk(&mut self) -> Result<Option<Bytes>, TransportError>;
}
