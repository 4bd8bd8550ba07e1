//! Lazy record rate estimation

use std::time::{Duration, Instant};

/// Default length of the sampling window
pub const DEFAULT_RATE_PERIOD: Duration = Duration::from_secs(10);

/// Records-per-second estimate over a sampling window
///
/// Nothing runs in the background: the window is only rolled over when a
/// record is counted or the rate is read. A long silent gap therefore shows
/// up as a low rate the next time the window is rolled.
#[derive(Debug, Clone)]
pub struct RateWindow {
    period: Duration,
    count: u64,
    started: Option<Instant>,
    rate: f64,
}

impl Default for RateWindow {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_PERIOD)
    }
}

impl RateWindow {
    /// Create a window with the given sampling period
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            count: 0,
            started: None,
            rate: 0.0,
        }
    }

    /// Sampling period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Change the sampling period; takes effect on the next roll
    pub fn set_period(&mut self, period: Duration) {
        self.period = period;
    }

    /// Records counted in the current window
    pub fn count_in_window(&self) -> u64 {
        self.count
    }

    /// Count one record at `now`
    pub fn record(&mut self, now: Instant) {
        self.roll(now);
        self.count += 1;
    }

    /// Current rate estimate, rolling the window first if it is due
    pub fn rate(&mut self, now: Instant) -> f64 {
        self.roll(now);
        self.rate
    }

    fn roll(&mut self, now: Instant) {
        let Some(started) = self.started else {
            self.started = Some(now);
            self.count = 0;
            return;
        };

        let elapsed = now.saturating_duration_since(started);
        if elapsed > self.period {
            self.rate = self.count as f64 / elapsed.as_secs_f64();
            self.count = 0;
            self.started = Some(now);
        }
    }
}
