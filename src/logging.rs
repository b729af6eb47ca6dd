//! Logging configuration for tenant-forge.
//!
//! Logs go to stderr so that result output on stdout stays machine-readable
//! (`--format json` output can be piped without log noise mixed in).

use tracing_subscriber::EnvFilter;

/// Initializes logging to stderr.
///
/// The filter is taken from `RUST_LOG` when set, defaulting to `info`.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
