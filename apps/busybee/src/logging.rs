use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Install the global subscriber. Output goes to stderr so stdout stays
/// clean for reports.
///
/// `RUST_LOG`, when set, replaces `cfg.level` entirely.
///
/// # Errors
/// Fails on an unparsable level directive or if a subscriber is already set.
pub fn init(cfg: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cfg.level)
            .with_context(|| format!("invalid logging level '{}'", cfg.level))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = if cfg.json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init()
    };
    result.context("failed to install tracing subscriber")
}
