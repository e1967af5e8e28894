//! Logging
//!
//! Diagnostics go to stderr through `tracing`; stdout carries JSON envelopes only.
//! `RUST_LOG` overrides the level passed on the command line.

use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` when set and valid, else `level`
#[must_use]
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_lowercase()))
}

/// Install the global subscriber
///
/// Calling it twice is harmless; the second call leaves the first subscriber in place.
pub fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}
