//! Tracing subscriber setup shared by the Butler binaries.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies.

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::ProxyError;

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns [`ProxyError::Logging`] if a global subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<(), ProxyError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match config.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| ProxyError::Logging(e.to_string()))
}

/// Deployment tag attached to the root span of each binary.
pub const fn env_tag(config: &LoggingConfig) -> &'static str {
    if config.dev_mode { "DEV" } else { "PRD" }
}
