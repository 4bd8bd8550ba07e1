//! Output formatting for tweetstream (text, json)

use clap::ValueEnum;
use colored::Colorize;
use serde_json::Value;

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per record, tweets as `@user: text` (default)
    #[default]
    Text,
    /// Records as compact JSON, one per line
    Json,
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print an info message to stderr (unless in quiet mode)
    ///
    /// Status goes to stderr so stdout stays a clean record stream.
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", msg);
        }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", msg.green());
        }
    }

    /// Print a warning message
    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Print one record in the configured format
    pub fn record(&self, record: &Value) {
        match self.format {
            OutputFormat::Json => println!("{}", record),
            OutputFormat::Text => println!("{}", format_text(record)),
        }
    }
}

/// Render a record for humans
///
/// Tweets become `@screen_name: text`; anything else (deletes, limit
/// notices) is shown dimmed as JSON.
pub fn format_text(record: &Value) -> String {
    match record.get("text").and_then(Value::as_str) {
        Some(text) => {
            let user = record
                .pointer("/user/screen_name")
                .and_then(Value::as_str)
                .unwrap_or("?");
            format!("{}: {}", format!("@{}", user).cyan().bold(), text)
        }
        None => record.to_string().dimmed().to_string(),
    }
}
