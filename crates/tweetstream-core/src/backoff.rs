//! Caller-side reconnect cadence
//!
//! Stream clients never retry on their own. A caller that wants to keep a
//! stream alive can feed each error into a [`ReconnectPolicy`] and sleep for
//! the returned delay before building a new client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Backoff, StreamError};

/// Delays for each backoff shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Step added per attempt for network errors
    #[serde(default = "default_linear_step", with = "millis")]
    pub linear_step: Duration,

    /// Upper bound for linear backoff
    #[serde(default = "default_linear_max", with = "millis")]
    pub linear_max: Duration,

    /// First delay for HTTP errors, doubled per attempt
    #[serde(default = "default_exponential_start", with = "millis")]
    pub exponential_start: Duration,

    /// Upper bound for exponential backoff
    #[serde(default = "default_exponential_max", with = "millis")]
    pub exponential_max: Duration,

    /// First delay after a rate limit response, doubled per attempt
    #[serde(default = "default_rate_limit_start", with = "millis")]
    pub rate_limit_start: Duration,

    /// Upper bound for rate limit backoff
    #[serde(default = "default_rate_limit_max", with = "millis")]
    pub rate_limit_max: Duration,

    /// Give up after this many consecutive failures
    #[serde(default)]
    pub max_attempts: Option<u32>,

    #[serde(skip)]
    attempts: u32,

    #[serde(skip)]
    current: Option<(Backoff, bool)>,
}

fn default_linear_step() -> Duration {
    Duration::from_millis(250)
}

fn default_linear_max() -> Duration {
    Duration::from_secs(16)
}

fn default_exponential_start() -> Duration {
    Duration::from_secs(10)
}

fn default_exponential_max() -> Duration {
    Duration::from_secs(240)
}

fn default_rate_limit_start() -> Duration {
    Duration::from_secs(60)
}

fn default_rate_limit_max() -> Duration {
    Duration::from_secs(960)
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            linear_step: default_linear_step(),
            linear_max: default_linear_max(),
            exponential_start: default_exponential_start(),
            exponential_max: default_exponential_max(),
            rate_limit_start: default_rate_limit_start(),
            rate_limit_max: default_rate_limit_max(),
            max_attempts: None,
            attempts: 0,
            current: None,
        }
    }
}

impl ReconnectPolicy {
    /// Policy with the upstream-recommended delays
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop after `attempts` consecutive failures
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Consecutive failures seen since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Forget previous failures, e.g. once records are flowing again
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.current = None;
    }

    /// Delay before the next reconnect, or `None` to give up
    pub fn next_delay(&mut self, error: &StreamError) -> Option<Duration> {
        let backoff = error.backoff();
        if backoff == Backoff::Never {
            return None;
        }

        // A different kind of failure starts its own progression. Rate limits
        // and other HTTP errors both back off exponentially but never share one.
        let shape = (backoff, error.is_rate_limited());
        if self.current != Some(shape) {
            self.attempts = 0;
            self.current = Some(shape);
        }

        if let Some(max) = self.max_attempts {
            if self.attempts >= max {
                tracing::debug!(attempts = self.attempts, "Reconnect attempts exhausted");
                return None;
            }
        }
        self.attempts += 1;

        let delay = match backoff {
            Backoff::Never => return None,
            Backoff::Immediate => Duration::ZERO,
            Backoff::Linear => self
                .linear_step
                .saturating_mul(self.attempts)
                .min(self.linear_max),
            Backoff::Exponential if error.is_rate_limited() => {
                doubled(self.rate_limit_start, self.attempts).min(self.rate_limit_max)
            }
            Backoff::Exponential => {
                doubled(self.exponential_start, self.attempts).min(self.exponential_max)
            }
        };
        Some(delay)
    }
}

/// `start * 2^(attempt - 1)`, saturating
fn doubled(start: Duration, attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(16);
    start.saturating_mul(factor)
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
