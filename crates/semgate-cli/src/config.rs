// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Global options shared by every demo, and logging setup.
//!
//! Each option can come from a flag or its environment variable; the flag
//! wins. Logging falls back to RUST_LOG, then to `warn`.

use std::time::Duration;

use clap::{Args, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Log filter used when neither `--log`, SEMGATE_LOG nor RUST_LOG is set.
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Colored report for people
    #[default]
    Human,
    /// One JSON document on stdout
    Json,
}

#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Report format
    #[arg(long, global = true, env = "SEMGATE_FORMAT", value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,

    /// Log filter, e.g. `info` or `semgate_sync=trace`
    #[arg(long, global = true, env = "SEMGATE_LOG")]
    pub log: Option<String>,

    /// Fail the run if it has not finished after this many milliseconds
    #[arg(long, global = true, env = "SEMGATE_DEADLINE_MS", default_value_t = 30_000)]
    pub deadline_ms: u64,
}

impl GlobalArgs {
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// Pick the log filter: explicit option, then RUST_LOG, then the default.
pub fn log_filter(explicit: Option<&str>) -> EnvFilter {
    match explicit {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    }
}

/// Install the stderr subscriber. Call once at startup.
pub fn init_logging(explicit: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter(explicit))
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .with_target(false)
        .try_init();
}
