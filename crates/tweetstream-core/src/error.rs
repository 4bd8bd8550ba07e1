//! Error taxonomy for streaming connections
//!
//! Every failure a stream client can hit is reported as one of the variants
//! below. Each variant carries the reconnection guidance from the upstream
//! streaming API documentation, so a retry loop can dispatch on the kind alone
//! without looking at status codes again.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for stream operations
pub type Result<T> = std::result::Result<T, StreamError>;

/// Retry cadence implied by an error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Do not reconnect without changing the request or credentials
    Never,
    /// Reconnect right away
    Immediate,
    /// Back off linearly (network-level trouble, usually transient)
    Linear,
    /// Back off exponentially (HTTP-level trouble)
    Exponential,
}

impl fmt::Display for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backoff::Never => "never",
            Backoff::Immediate => "immediate",
            Backoff::Linear => "linear",
            Backoff::Exponential => "exponential",
        };
        f.write_str(name)
    }
}

/// Why an exponential backoff was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExponentialCause {
    /// The server answered with an HTTP error status
    HttpStatus,
    /// HTTP 420 "Enhance Your Calm": the account is being rate limited
    RateLimited,
    /// The connection could not be established at all
    Connect,
}

/// Errors raised by a streaming connection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The client was constructed with invalid parameters
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Credentials were rejected (HTTP 401)
    #[error("Authentication failed: {reason}")]
    Authentication {
        reason: String,
        details: Option<String>,
    },

    /// The request itself is wrong and retrying it unchanged will not help
    #[error("Fatal request error: {reason}")]
    Fatal {
        reason: String,
        status: Option<u16>,
        details: Option<String>,
    },

    /// An established stream dropped or delivered garbage
    #[error("Reconnect immediately: {reason}")]
    ReconnectImmediately {
        reason: String,
        details: Option<String>,
    },

    /// A TCP/IP level error on an established stream
    #[error("Reconnect with linear backoff: {reason}")]
    ReconnectLinearly {
        reason: String,
        details: Option<String>,
    },

    /// An HTTP error or a failed connection attempt
    #[error("Reconnect with exponential backoff: {reason}")]
    ReconnectExponentially {
        reason: String,
        cause: ExponentialCause,
        status: Option<u16>,
        details: Option<String>,
    },

    /// The client was closed
    #[error("Connection closed")]
    Closed,
}

impl StreamError {
    /// Create a configuration error
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    /// Create an authentication error
    pub fn authentication(reason: impl Into<String>) -> Self {
        Self::Authentication {
            reason: reason.into(),
            details: None,
        }
    }

    /// Create a fatal request error
    pub fn fatal(reason: impl Into<String>, status: Option<u16>) -> Self {
        Self::Fatal {
            reason: reason.into(),
            status,
            details: None,
        }
    }

    /// Create an error asking for an immediate reconnect
    pub fn reconnect_immediately(reason: impl Into<String>) -> Self {
        Self::ReconnectImmediately {
            reason: reason.into(),
            details: None,
        }
    }

    /// Create an error asking for a linear backoff
    pub fn reconnect_linearly(reason: impl Into<String>) -> Self {
        Self::ReconnectLinearly {
            reason: reason.into(),
            details: None,
        }
    }

    /// Create an error asking for an exponential backoff
    pub fn reconnect_exponentially(
        reason: impl Into<String>,
        cause: ExponentialCause,
        status: Option<u16>,
    ) -> Self {
        Self::ReconnectExponentially {
            reason: reason.into(),
            cause,
            status,
            details: None,
        }
    }

    /// Create the rate limit flavour of [`StreamError::ReconnectExponentially`]
    pub fn rate_limited() -> Self {
        Self::reconnect_exponentially("Enhance your calm", ExponentialCause::RateLimited, Some(420))
    }

    /// Attach diagnostic details (the offending line, the transport message)
    ///
    /// Variants without a details slot are returned unchanged.
    pub fn with_details(mut self, value: impl Into<String>) -> Self {
        match &mut self {
            Self::Authentication { details, .. }
            | Self::Fatal { details, .. }
            | Self::ReconnectImmediately { details, .. }
            | Self::ReconnectLinearly { details, .. }
            | Self::ReconnectExponentially { details, .. } => *details = Some(value.into()),
            Self::Configuration(_) | Self::Closed => {}
        }
        self
    }

    /// Backoff shape a retry loop should apply
    pub fn backoff(&self) -> Backoff {
        match self {
            Self::Configuration(_) | Self::Authentication { .. } | Self::Fatal { .. } => {
                Backoff::Never
            }
            Self::Closed => Backoff::Never,
            Self::ReconnectImmediately { .. } => Backoff::Immediate,
            Self::ReconnectLinearly { .. } => Backoff::Linear,
            Self::ReconnectExponentially { .. } => Backoff::Exponential,
        }
    }

    /// Whether reconnecting with the same request can succeed
    pub fn is_retryable(&self) -> bool {
        self.backoff() != Backoff::Never
    }

    /// Whether this is the HTTP 420 rate limit signal
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            Self::ReconnectExponentially {
                cause: ExponentialCause::RateLimited,
                ..
            }
        )
    }

    /// Human-readable reason
    pub fn reason(&self) -> &str {
        match self {
            Self::Configuration(reason) => reason,
            Self::Authentication { reason, .. }
            | Self::Fatal { reason, .. }
            | Self::ReconnectImmediately { reason, .. }
            | Self::ReconnectLinearly { reason, .. }
            | Self::ReconnectExponentially { reason, .. } => reason,
            Self::Closed => "Connection closed",
        }
    }

    /// Raw details captured at the point of failure
    pub fn details(&self) -> Option<&str> {
        match self {
            Self::Authentication { details, .. }
            | Self::Fatal { details, .. }
            | Self::ReconnectImmediately { details, .. }
            | Self::ReconnectLinearly { details, .. }
            | Self::ReconnectExponentially { details, .. } => details.as_deref(),
            Self::Configuration(_) | Self::Closed => None,
        }
    }

    /// HTTP status code behind the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { .. } => Some(401),
            Self::Fatal { status, .. } | Self::ReconnectExponentially { status, .. } => *status,
            _ => None,
        }
    }
}
