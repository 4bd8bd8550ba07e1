//! tweetstream client library
//!
//! Consumes long-lived HTTP streams of newline-delimited JSON records, such as
//! the Twitter sample and filter streams. The response body is reassembled
//! into lines regardless of how the network fragments it, keepalive lines are
//! skipped, and every failure is reported as a [`StreamError`] that tells the
//! caller how to back off before reconnecting.
//!
//! # Example
//!
//! ```rust,no_run
//! use tweetstream_client::{Credentials, ReconnectPolicy, StreamClient, StreamConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut policy = ReconnectPolicy::new();
//!
//!     loop {
//!         let config = StreamConfig::sample(Credentials::basic("user", "pass"));
//!         let mut client = StreamClient::new(config)?;
//!
//!         let error = loop {
//!             match client.next_record().await {
//!                 Ok(record) => {
//!                     policy.reset();
//!                     println!("{}", record);
//!                 }
//!                 Err(e) => break e,
//!             }
//!         };
//!
//!         match policy.next_delay(&error) {
//!             Some(delay) => tokio::time::sleep(delay).await,
//!             None => return Err(error.into()),
//!         }
//!     }
//! }
//! ```
//!
//! Callers without a runtime can use [`blocking::StreamClient`], whose
//! `records()` iterator pulls one record per call.
//!
//! # Testing
//!
//! The `testing` module provides a scripted local HTTP server:
//!
//! ```rust,ignore
//! use tweetstream_client::testing::{TestResponse, TestServer};
//!
//! let server = TestServer::start(TestResponse::ok().line(r#"{"text":"hi"}"#))?;
//! ```

pub mod blocking;
mod client;
pub mod config;
pub mod deprecated;
mod lines;
pub mod testing;
pub mod transport;

pub use client::{CloseHandle, ConnectionState, StreamClient};
pub use config::{ConfigError, StreamConfig, StreamConfigBuilder, FILTER_URL, SAMPLE_URL};
pub use lines::LineBuffer;

// Re-export core types for convenience
pub use tweetstream_core::{
    Backoff, Credentials, ExponentialCause, FilterSpec, ReconnectPolicy, Result, StreamError,
};
