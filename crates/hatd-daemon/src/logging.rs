//! Tracing subscriber initialisation for the `hatd` binary.
//!
//! Logs go to stderr. The filter is chosen in this order:
//!
//! 1. `HATD_LOG` (per-target directives, e.g. `hatd_lock=debug,info`)
//! 2. `RUST_LOG`
//! 3. `info`

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Daemon-specific filter variable.
pub const ENV_LOG: &str = "HATD_LOG";

/// Level used when no filter variable is set.
pub const DEFAULT_LEVEL: Level = Level::INFO;

/// Install the global subscriber.
///
/// Call once, before the configuration is loaded.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_subscriber() {
    let hatd_log = std::env::var(ENV_LOG).ok();
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_env_filter(hatd_log.as_deref(), rust_log.as_deref());
    let use_ansi = std::io::IsTerminal::is_terminal(&std::io::stderr());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(use_ansi)
                .with_target(true),
        )
        .init();
}

/// Build the filter from the daemon's own directives, falling back to
/// `RUST_LOG` and then [`DEFAULT_LEVEL`]. Empty or unparseable directives
/// fall through.
fn build_env_filter(hatd_log: Option<&str>, rust_log: Option<&str>) -> EnvFilter {
    [hatd_log, rust_log]
        .into_iter()
        .flatten()
        .filter(|directives| !directives.trim().is_empty())
        .find_map(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LEVEL.as_str()))
}
