//! Stream client configuration with YAML support

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tweetstream_core::{Credentials, FilterSpec, Result, StreamError};

/// Endpoint of the unfiltered sample stream
pub const SAMPLE_URL: &str = "https://stream.twitter.com/1.1/statuses/sample.json";

/// Endpoint of the filter stream
pub const FILTER_URL: &str = "https://stream.twitter.com/1.1/statuses/filter.json";

/// User agent sent unless overridden
pub fn default_user_agent() -> String {
    format!("tweetstream/{}", env!("CARGO_PKG_VERSION"))
}

/// Stream client configuration
///
/// Can be loaded from YAML or JSON, or constructed programmatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Endpoint override; defaults to the sample or filter URL
    #[serde(default)]
    pub url: Option<String>,

    /// Authentication material
    #[serde(default)]
    pub credentials: Option<Credentials>,

    /// Filter predicates; presence makes this a filter stream
    #[serde(default)]
    pub filter: Option<FilterSpec>,

    /// Number of historical records to request before the live tail
    #[serde(default)]
    pub catchup: Option<u32>,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// User-Agent header value
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Sampling window for the rate estimate, in milliseconds
    #[serde(default = "default_rate_period")]
    pub rate_period_ms: u64,

    /// Field whose presence marks a record as a payload for counting
    ///
    /// `None` counts every decoded record.
    #[serde(default = "default_count_field")]
    pub count_field: Option<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: None,
            credentials: None,
            filter: None,
            catchup: None,
            timeouts: TimeoutsConfig::default(),
            user_agent: default_user_agent(),
            rate_period_ms: default_rate_period(),
            count_field: default_count_field(),
        }
    }
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Longest a single read may block, in milliseconds (default: 90s)
    #[serde(default = "default_read_timeout")]
    pub read_ms: u64,

    /// Connect timeout in milliseconds (default: 10s)
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            read_ms: default_read_timeout(),
            connect_ms: default_connect_timeout(),
        }
    }
}

fn default_read_timeout() -> u64 {
    90_000 // upstream recommends treating 90s of silence as a stall
}

fn default_connect_timeout() -> u64 {
    10_000
}

fn default_rate_period() -> u64 {
    10_000
}

fn default_count_field() -> Option<String> {
    Some("text".to_string())
}

impl StreamConfig {
    /// Configuration for the unfiltered sample stream
    pub fn sample(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
            ..Self::default()
        }
    }

    /// Configuration for a filter stream
    pub fn filter(credentials: Credentials, filter: FilterSpec) -> Self {
        Self {
            credentials: Some(credentials),
            filter: Some(filter),
            ..Self::default()
        }
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> std::result::Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Serialize configuration to YAML
    pub fn to_yaml(&self) -> std::result::Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Create a builder for programmatic configuration
    pub fn builder() -> StreamConfigBuilder {
        StreamConfigBuilder::new()
    }

    /// Endpoint the client connects to
    pub fn endpoint(&self) -> &str {
        match (&self.url, &self.filter) {
            (Some(url), _) => url,
            (None, Some(_)) => FILTER_URL,
            (None, None) => SAMPLE_URL,
        }
    }

    /// Read timeout as a [`Duration`]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.read_ms)
    }

    /// Connect timeout as a [`Duration`]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.connect_ms)
    }

    /// Rate sampling period as a [`Duration`]
    pub fn rate_period(&self) -> Duration {
        Duration::from_millis(self.rate_period_ms)
    }

    /// Form fields for the request body; empty means a GET
    pub fn form_params(&self) -> Vec<(String, String)> {
        let mut form: Vec<(String, String)> = self
            .filter
            .iter()
            .flat_map(FilterSpec::form_params)
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        if let Some(count) = self.catchup {
            form.push(("count".to_string(), count.to_string()));
        }
        form
    }

    /// Check the configuration before any network activity
    pub fn validate(&self) -> Result<()> {
        if let Some(filter) = &self.filter {
            filter.validate()?;
        }
        if self.timeouts.read_ms == 0 {
            return Err(StreamError::configuration("Read timeout must be non-zero"));
        }
        if self.rate_period_ms == 0 {
            return Err(StreamError::configuration("Rate period must be non-zero"));
        }
        Ok(())
    }
}

/// Builder for StreamConfig
#[derive(Debug, Default)]
pub struct StreamConfigBuilder {
    config: StreamConfig,
}

impl StreamConfigBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the endpoint URL
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = Some(url.into());
        self
    }

    /// Set the credentials
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.config.credentials = Some(credentials);
        self
    }

    /// Make this a filter stream
    pub fn filter(mut self, filter: FilterSpec) -> Self {
        self.config.filter = Some(filter);
        self
    }

    /// Request historical records before the live tail
    pub fn catchup(mut self, count: u32) -> Self {
        self.config.catchup = Some(count);
        self
    }

    /// Set read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.read_ms = timeout.as_millis() as u64;
        self
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.connect_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the rate sampling period
    pub fn rate_period(mut self, period: Duration) -> Self {
        self.config.rate_period_ms = period.as_millis() as u64;
        self
    }

    /// Set the payload marker field, or `None` to count every record
    pub fn count_field(mut self, field: Option<&str>) -> Self {
        self.config.count_field = field.map(String::from);
        self
    }

    /// Build the configuration
    pub fn build(self) -> StreamConfig {
        self.config
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
