//! lobster - check and report requirements traceability
//!
//! The binary drives [`lobster_core`]: `lobster report` builds a report from
//! a tracing policy and `lobster status` summarizes an existing one. This
//! library half holds the rendering and logging setup so it can be tested
//! without spawning the binary.

pub mod output;

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `LOBSTER_LOG=debug`.
pub const LOG_ENV: &str = "LOBSTER_LOG";

/// Log to stderr, filtered by [`LOG_ENV`] (warnings only by default).
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
