//! Mapping from transport outcomes to the error taxonomy
//!
//! Transports report what went wrong in terms of [`TransportError`]; the
//! functions here turn that into a [`StreamError`] carrying the right backoff
//! guidance. The same mapping is used when opening a connection and while
//! reading from it, with the [`Phase`] deciding how transport-level failures
//! are treated.

use thiserror::Error;

use crate::error::{ExponentialCause, StreamError};

/// Where in the connection lifecycle a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Opening the connection and waiting for the response head
    Connect,
    /// Reading the body of an established stream
    Read,
}

/// Failures reported by a transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server answered with a non-success status
    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    /// DNS failure, refused connection, TLS handshake failure
    #[error("Connection failed: {0}")]
    Connect(String),

    /// No data within the configured timeout
    #[error("Timed out")]
    Timeout,

    /// The body ended before a chunk was complete
    #[error("Incomplete read: {0}")]
    IncompleteRead(String),

    /// Socket-level error on an established connection
    #[error("Network error: {0}")]
    Network(String),

    /// The request could not be built (bad URL, bad header value)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Classify an HTTP error status
///
/// `url` is only used to make the reason readable.
pub fn classify_status(status: u16, reason: &str, url: &str) -> StreamError {
    let detail = format!("HTTP {} {}", status, reason);
    match status {
        401 => StreamError::authentication("Access denied").with_details(detail),
        404 => StreamError::fatal(format!("{}: {}", url, detail), Some(status)),
        // Not Acceptable, Too Long, Range Unacceptable: the request is malformed
        406 | 413 | 416 => StreamError::fatal(detail, Some(status)),
        420 => StreamError::rate_limited().with_details(detail),
        _ => {
            StreamError::reconnect_exponentially(detail, ExponentialCause::HttpStatus, Some(status))
        }
    }
}

/// Classify a transport failure
pub fn classify(phase: Phase, error: TransportError, url: &str) -> StreamError {
    match (phase, error) {
        (_, TransportError::Status { status, reason }) => classify_status(status, &reason, url),
        (_, TransportError::InvalidRequest(message)) => {
            StreamError::fatal(format!("Invalid request for {}", url), None).with_details(message)
        }
        // Connect-time failures may well be a client misconfiguration, so
        // they get the conservative cadence
        (Phase::Connect, error) => {
            StreamError::reconnect_exponentially(error.to_string(), ExponentialCause::Connect, None)
        }
        (Phase::Read, TransportError::Timeout) => {
            StreamError::reconnect_immediately("Stream timed out")
        }
        (Phase::Read, TransportError::IncompleteRead(message)) => {
            StreamError::reconnect_immediately("Incomplete read").with_details(message)
        }
        (Phase::Read, error @ (TransportError::Network(_) | TransportError::Connect(_))) => {
            StreamError::reconnect_linearly("Network error").with_details(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Backoff;

    const URL: &str = "https://stream.example.com/sample.json";

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            classify_status(401, "Unauthorized", URL),
            StreamError::Authentication { .. }
        ));
        for status in [404, 406, 413, 416] {
            let err = classify_status(status, "x", URL);
            assert!(
                matches!(err, StreamError::Fatal { .. }),
                "{} should be fatal",
                status
            );
            assert_eq!(err.status(), Some(status));
        }
        assert!(classify_status(420, "Enhance your calm", URL).is_rate_limited());

        for status in [301, 418, 500, 503] {
            let err = classify_status(status, "x", URL);
            assert_eq!(err.backoff(), Backoff::Exponential);
            assert!(!err.is_rate_limited());
        }
    }

    #[test]
    fn test_not_found_mentions_url() {
        let err = classify_status(404, "Not Found", URL);
        assert!(err.reason().contains(URL));
    }

    #[test]
    fn test_connect_phase_is_exponential() {
        for error in [
            TransportError::Connect("refused".into()),
            TransportError::Timeout,
            TransportError::Network("reset".into()),
        ] {
            let err = classify(Phase::Connect, error, URL);
            assert!(matches!(
                err,
                StreamError::ReconnectExponentially {
                    cause: ExponentialCause::Connect,
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_read_phase() {
        assert_eq!(
            classify(Phase::Read, TransportError::Timeout, URL),
            StreamError::reconnect_immediately("Stream timed out")
        );

        let err = classify(Phase::Read, TransportError::IncompleteRead("3 bytes".into()), URL);
        assert_eq!(err.backoff(), Backoff::Immediate);
        assert_eq!(err.details(), Some("3 bytes"));

        let err = classify(Phase::Read, TransportError::Network("reset by peer".into()), URL);
        assert_eq!(err.backoff(), Backoff::Linear);
    }

    #[test]
    fn test_invalid_request_is_fatal() {
        let err = classify(Phase::Connect, TransportError::InvalidRequest("bad url".into()), URL);
        assert!(matches!(err, StreamError::Fatal { status: None, .. }));
        assert_eq!(err.details(), Some("bad url"));
    }
}
