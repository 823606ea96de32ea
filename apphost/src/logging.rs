//! Logging setup for the host binary

use crate::runtime::AppHostError;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global `tracing` subscriber
///
/// `RUST_LOG` wins over `default_filter` when it is set. Logs go to stderr so
/// stdout only carries the run summary.
pub fn init_logging(default_filter: &str) -> Result<(), AppHostError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)?,
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppHostError::Logging(e.to_string()))
}
