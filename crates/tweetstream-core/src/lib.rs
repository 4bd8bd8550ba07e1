//! tweetstream-core - Error taxonomy and shared types for streaming clients
//!
//! This crate has no I/O. It defines how connection failures are classified
//! into reconnection guidance, the filter parameters a filter stream sends,
//! credentials, and the lazy rate estimator used by the client.

pub mod backoff;
pub mod classify;
pub mod credentials;
pub mod error;
pub mod filter;
pub mod rate;

pub use backoff::ReconnectPolicy;
pub use classify::{classify, classify_status, Phase, TransportError};
pub use credentials::Credentials;
pub use error::{Backoff, ExponentialCause, Result, StreamError};
pub use filter::FilterSpec;
pub use rate::{RateWindow, DEFAULT_RATE_PERIOD};
