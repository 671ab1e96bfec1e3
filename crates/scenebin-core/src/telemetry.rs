//! Tracing setup

use crate::config::{CacheConfig, LogFormat};
use tracing_subscriber::EnvFilter;

/// Install a global text subscriber
///
/// `RUST_LOG` takes precedence over `default_filter`. Returns `false` if a
/// global subscriber was already installed, in which case nothing changes.
pub fn init_tracing(default_filter: &str) -> bool {
    init_with_format(default_filter, LogFormat::Text)
}

/// Install a global subscriber configured from `config`
pub fn init_from_config(config: &CacheConfig) -> bool {
    init_with_format(&config.log_filter, config.log_format)
}

fn init_with_format(default_filter: &str, format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    match format {
        LogFormat::Text => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}
