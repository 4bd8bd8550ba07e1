//! tweetstream - tail streaming JSON APIs from the command line
//!
//! Connects to the sample or filter stream and prints each record, with an
//! optional reconnect loop driven by the error classification.

mod commands;
mod config;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tweetstream_client::{FilterSpec, StreamConfig};

use crate::commands::TailOptions;
use crate::config::{CliOverrides, Config, MergedConfig};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "tweetstream")]
#[command(author, version, about = "Tail Twitter-style streaming APIs")]
#[command(propagate_version = true)]
struct Cli {
    /// Endpoint URL (defaults to the sample or filter stream)
    #[arg(long, env = "TWEETSTREAM_URL")]
    url: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "TWEETSTREAM_CONFIG")]
    config: Option<PathBuf>,

    /// Basic auth user name
    #[arg(short, long, env = "TWEETSTREAM_USERNAME")]
    username: Option<String>,

    /// Basic auth password
    #[arg(short, long, env = "TWEETSTREAM_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Bearer token
    #[arg(long, env = "TWEETSTREAM_BEARER", hide_env_values = true)]
    bearer: Option<String>,

    /// Read timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tail the unfiltered sample stream
    Sample {
        #[command(flatten)]
        tail: TailArgs,
    },

    /// Tail the filter stream
    Filter {
        /// Keywords to track (comma-separated)
        #[arg(long, value_delimiter = ',')]
        track: Vec<String>,

        /// User IDs to follow (comma-separated)
        #[arg(long, value_delimiter = ',')]
        follow: Vec<String>,

        /// Bounding box coordinates (comma-separated, needs --track or --follow)
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        locations: Vec<String>,

        #[command(flatten)]
        tail: TailArgs,
    },
}

#[derive(Args)]
struct TailArgs {
    /// Stop after this many records
    #[arg(short = 'n', long)]
    limit: Option<u64>,

    /// Request this many historical records first
    #[arg(long)]
    catchup: Option<u32>,

    /// Reconnect after retryable errors with the recommended backoff
    #[arg(long)]
    reconnect: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    // Merge CLI args with config
    let merged = config.merge_with_args(&CliOverrides {
        url: cli.url.as_deref(),
        username: cli.username.as_deref(),
        password: cli.password.as_deref(),
        bearer: cli.bearer.as_deref(),
        timeout: cli.timeout,
        output: cli.output,
        no_color: cli.no_color,
    });

    // Create output context
    let ctx = OutputContext::new(merged.output, merged.no_color, cli.quiet);

    let (filter, tail) = match cli.command {
        Commands::Sample { tail } => (None, tail),
        Commands::Filter {
            track,
            follow,
            locations,
            tail,
        } => {
            let filter = FilterSpec::new()
                .track(track)
                .follow(follow)
                .locations(locations);
            (Some(filter), tail)
        }
    };

    let stream_config = build_stream_config(&merged, filter, tail.catchup);
    let options = TailOptions {
        limit: tail.limit,
        reconnect: tail.reconnect,
    };

    commands::tail(stream_config, options, &ctx).await
}

/// Build the client configuration from the merged settings
fn build_stream_config(
    merged: &MergedConfig,
    filter: Option<FilterSpec>,
    catchup: Option<u32>,
) -> StreamConfig {
    let mut builder = StreamConfig::builder();
    if let Some(url) = &merged.url {
        builder = builder.url(url);
    }
    if let Some(credentials) = &merged.credentials {
        builder = builder.credentials(credentials.clone());
    }
    if let Some(filter) = filter {
        builder = builder.filter(filter);
    }
    if let Some(count) = catchup {
        builder = builder.catchup(count);
    }
    if let Some(timeout) = merged.timeout {
        builder = builder.read_timeout(timeout.max(Duration::from_secs(1)));
    }
    builder.build()
}
