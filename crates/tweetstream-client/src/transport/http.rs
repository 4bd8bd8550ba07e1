//! reqwest-backed transport

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{redirect, Client, Response};
use tracing::debug;
use tweetstream_core::Credentials;

use super::{Connection, RequestMethod, StreamRequest, Transport, TransportError};

/// HTTP(S) transport
///
/// Redirects are not followed, so a 3xx answer surfaces as an HTTP error
/// like any other non-success status.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with the given connect timeout
    pub fn new(connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(redirect::Policy::none())
            .tcp_nodelay(true)
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        Ok(Self { client })
    }

    /// Wrap an existing reqwest client (shared connection pool, proxies, TLS settings)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, request: &StreamRequest) -> Result<Box<dyn Connection>, TransportError> {
        let mut builder = match request.method {
            RequestMethod::Get => self.client.get(request.url.clone()),
            RequestMethod::Post => self.client.post(request.url.clone()).form(&request.form),
        };

        builder = builder.header(reqwest::header::USER_AGENT, &request.user_agent);
        builder = match &request.credentials {
            Some(Credentials::Basic { username, password }) => {
                builder.basic_auth(username, Some(password))
            }
            Some(Credentials::Bearer { token }) => builder.bearer_auth(token),
            None => builder,
        };

        debug!("{} {}", request.method, request.url);
        let response = builder.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        Ok(Box::new(HttpConnection { response }))
    }
}

struct HttpConnection {
    response: Response,
}

#[async_trait]
impl Connection for HttpConnection {
    async fn chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        self.response.chunk().await.map_err(map_reqwest_error)
    }
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_builder() {
        TransportError::InvalidRequest(error.to_string())
    } else if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else if error.is_body() || error.is_decode() {
        TransportError::IncompleteRead(error.to_string())
    } else {
        TransportError::Network(error.to_string())
    }
}
