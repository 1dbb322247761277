//! Logging utilities for the netvip tools.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize tracing for CLI tools and tests.
///
/// Uses the RUST_LOG environment variable to control log levels. Defaults to
/// WARN and writes to stderr so command output on stdout stays clean.
pub fn init() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
}
