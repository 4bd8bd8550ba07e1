//! Tail command - print records from a stream, reconnecting on request

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::{debug, info};
use tweetstream_client::{CloseHandle, ReconnectPolicy, StreamClient, StreamConfig, StreamError};

use crate::output::OutputContext;

/// How the tail loop behaves
#[derive(Debug, Clone, Default)]
pub struct TailOptions {
    /// Stop after this many payload records
    pub limit: Option<u64>,
    /// Reconnect after retryable errors
    pub reconnect: bool,
}

/// Why one connection ended
enum SessionEnd {
    LimitReached,
    Interrupted,
    Failed(StreamError),
}

/// Stream records to stdout until the limit, Ctrl+C or a final error
pub async fn tail(config: StreamConfig, options: TailOptions, ctx: &OutputContext) -> Result<()> {
    let stopped = Arc::new(AtomicBool::new(false));
    let current: Arc<Mutex<Option<CloseHandle>>> = Arc::new(Mutex::new(None));

    // Set up Ctrl+C handler
    {
        let stopped = stopped.clone();
        let current = current.clone();
        ctrlc::set_handler(move || {
            stopped.store(true, Ordering::SeqCst);
            if let Some(handle) = current.lock().as_ref() {
                handle.close();
            }
        })?;
    }

    ctx.info(&format!("Connecting to {}", config.endpoint()));
    ctx.info("Press Ctrl+C to stop");

    let mut policy = ReconnectPolicy::new();
    let mut total: u64 = 0;

    let outcome = loop {
        let mut client = StreamClient::new(config.clone()).context("Invalid stream configuration")?;
        *current.lock() = Some(client.close_handle());
        if stopped.load(Ordering::SeqCst) {
            break Ok(());
        }

        let started = Instant::now();
        let end = run_session(&mut client, &mut policy, total, &options, ctx).await;
        total += client.count();
        ctx.info(&format!(
            "{} records in {:.1}s ({:.2}/s)",
            client.count(),
            started.elapsed().as_secs_f64(),
            client.rate()
        ));

        match end {
            SessionEnd::LimitReached | SessionEnd::Interrupted => break Ok(()),
            SessionEnd::Failed(error) => {
                ctx.error(&format!("Stream error: {}", error));
                if let Some(details) = error.details() {
                    debug!("{}", details);
                }
                if !options.reconnect {
                    break Err(error);
                }
                let Some(delay) = policy.next_delay(&error) else {
                    break Err(error);
                };
                ctx.warn(&format!(
                    "Reconnecting in {:.1}s (attempt {}, {} backoff)",
                    delay.as_secs_f64(),
                    policy.attempts(),
                    error.backoff()
                ));
                if !sleep_unless_stopped(delay, &stopped).await {
                    break Ok(());
                }
            }
        }
    };

    *current.lock() = None;
    ctx.success(&format!("{} records received", total));
    outcome.context("Stream ended")
}

async fn run_session(
    client: &mut StreamClient,
    policy: &mut ReconnectPolicy,
    previous: u64,
    options: &TailOptions,
    ctx: &OutputContext,
) -> SessionEnd {
    loop {
        match client.next_record().await {
            Ok(record) => {
                policy.reset();
                ctx.record(&record);
                if let Some(limit) = options.limit {
                    if previous + client.count() >= limit {
                        info!(limit, "Record limit reached");
                        return SessionEnd::LimitReached;
                    }
                }
            }
            Err(StreamError::Closed) => return SessionEnd::Interrupted,
            Err(e) => return SessionEnd::Failed(e),
        }
    }
}

/// Sleep for `delay`, returning early with `false` once Ctrl+C was pressed
async fn sleep_unless_stopped(delay: Duration, stopped: &AtomicBool) -> bool {
    let deadline = tokio::time::Instant::now() + delay;
    while tokio::time::Instant::now() < deadline {
        if stopped.load(Ordering::SeqCst) {
            return false;
        }
        let step = deadline
            .saturating_duration_since(tokio::time::Instant::now())
            .min(Duration::from_millis(100));
        tokio::time::sleep(step).await;
    }
    !stopped.load(Ordering::SeqCst)
}
