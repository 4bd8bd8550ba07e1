//! Configuration file handling for tweetstream

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tweetstream_client::Credentials;

use crate::output::OutputFormat;

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Endpoint override
    pub url: Option<String>,
    /// Basic auth user
    pub username: Option<String>,
    /// Basic auth password
    pub password: Option<String>,
    /// Bearer token; wins over username/password
    pub bearer: Option<String>,
    /// Read timeout in seconds
    pub timeout: Option<u64>,
    /// Default output format
    pub output: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
}

/// Values given on the command line, overriding the file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides<'a> {
    pub url: Option<&'a str>,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub bearer: Option<&'a str>,
    pub timeout: Option<u64>,
    pub output: Option<OutputFormat>,
    pub no_color: bool,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("tweetstream");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(&self, args: &CliOverrides<'_>) -> MergedConfig {
        let bearer = args.bearer.map(String::from).or_else(|| {
            // Basic auth given on the command line beats a token from the file
            if args.username.is_some() {
                None
            } else {
                self.bearer.clone()
            }
        });
        let username = args.username.map(String::from).or_else(|| self.username.clone());
        let password = args.password.map(String::from).or_else(|| self.password.clone());

        let credentials = match (bearer, username) {
            (Some(token), _) => Some(Credentials::bearer(token)),
            (None, Some(user)) => Some(Credentials::basic(user, password.unwrap_or_default())),
            (None, None) => None,
        };

        let output = args
            .output
            .or_else(|| {
                self.output
                    .as_deref()
                    .and_then(|s| OutputFormat::from_str(s, true).ok())
            })
            .unwrap_or_default();

        MergedConfig {
            url: args.url.map(String::from).or_else(|| self.url.clone()),
            credentials,
            timeout: args
                .timeout
                .or(self.timeout)
                .map(Duration::from_secs),
            output,
            no_color: args.no_color || self.no_color.unwrap_or(false),
        }
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub url: Option<String>,
    pub credentials: Option<Credentials>,
    pub timeout: Option<Duration>,
    pub output: OutputFormat,
    pub no_color: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            r#"
url = "http://localhost:9000/stream"
username = "alice"
password = "secret"
timeout = 30
output = "json"
"#,
        );

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.url.as_deref(), Some("http://localhost:9000/stream"));
        assert_eq!(config.username.as_deref(), Some("alice"));
        assert_eq!(config.timeout, Some(30));

        let merged = config.merge_with_args(&CliOverrides::default());
        assert_eq!(merged.credentials, Some(Credentials::basic("alice", "secret")));
        assert_eq!(merged.timeout, Some(Duration::from_secs(30)));
        assert_eq!(merged.output, OutputFormat::Json);
        assert!(!merged.no_color);
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let file = write_config("url = [unterminated");
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from(&dir.path().join("nope.toml")).is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let config = Config {
            url: Some("http://file".to_string()),
            bearer: Some("file-token".to_string()),
            output: Some("json".to_string()),
            no_color: Some(true),
            ..Config::default()
        };

        let merged = config.merge_with_args(&CliOverrides {
            url: Some("http://cli"),
            username: Some("bob"),
            password: Some("pw"),
            output: Some(OutputFormat::Text),
            ..CliOverrides::default()
        });

        assert_eq!(merged.url.as_deref(), Some("http://cli"));
        assert_eq!(merged.credentials, Some(Credentials::basic("bob", "pw")));
        assert_eq!(merged.output, OutputFormat::Text);
        assert!(merged.no_color);
    }

    #[test]
    fn test_bearer_from_file() {
        let config = Config {
            bearer: Some("t0k3n".to_string()),
            username: Some("ignored".to_string()),
            ..Config::default()
        };

        let merged = config.merge_with_args(&CliOverrides::default());
        assert_eq!(merged.credentials, Some(Credentials::bearer("t0k3n")));
    }

    #[test]
    fn test_defaults_without_file() {
        let merged = Config::default().merge_with_args(&CliOverrides::default());
        assert_eq!(merged.url, None);
        assert_eq!(merged.credentials, None);
        assert_eq!(merged.timeout, None);
        assert_eq!(merged.output, OutputFormat::Text);
    }
}
