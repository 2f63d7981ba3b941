//! Log output setup.
//!
//! `RUST_LOG` wins over the configured filter so a single run can be turned up
//! without touching config files.

use anyhow::{Context, Result};
use stageconf::{LogFormat, TelemetryConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// Returns `Ok(false)` if another subscriber was installed first (tests,
/// embedding applications); that is not an error.
pub fn init(config: &TelemetryConfig) -> Result<bool> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .with_context(|| format!("Invalid log filter {:?}", config.log_level))?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match config.log_format {
        LogFormat::Full => registry.with(fmt::layer()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
    };

    match installed {
        Ok(()) => {
            tracing::debug!(filter = %config.log_level, format = %config.log_format, "logging initialized");
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}
