//! Process-wide log sink.

use std::io::{self, Write};

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::ChronoLocal;

/// Timestamp format of log lines.
const TIME_FORMAT: &str = "%H:%M:%S";

/// Flushes the standard streams when dropped.
#[derive(Debug)]
#[must_use = "dropping the guard immediately flushes and ends buffered output"]
pub struct LoggingGuard {
    _private: (),
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
    }
}

/// Level filter for the given flags. `quiet` wins over `verbose`.
pub fn filter(verbose: bool, quiet: bool) -> EnvFilter {
    if quiet {
        EnvFilter::new("warn")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber. Logs go to stderr so stdout stays clean
/// for command output.
///
/// Fails if a subscriber is already installed.
pub fn init(verbose: bool, quiet: bool) -> Result<LoggingGuard> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(verbose, quiet))
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_target(false)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to initialise logging: {e}"))?;

    Ok(LoggingGuard { _private: () })
}
