//! Minimal configuration loading for Stagehand.
//!
//! Every Stagehand crate can import this without pulling in the engine.
//!
//! # Sections
//!
//! - **Engine** (`EngineConfig`): dispatch blocking budget, default ready
//!   timeout, whether offers are broadcast to remote participants.
//! - **Telemetry** (`TelemetryConfig`): log filter and line format.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins, key by key):
//! 1. `/etc/stagehand/config.toml` (system)
//! 2. `~/.config/stagehand/config.toml` (user)
//! 3. `./stagehand.toml` (local override) or an explicit path
//! 4. Environment variables (`STAGEHAND_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [engine]
//! dispatch_timeout_ms = 0
//! default_ready_timeout_ms = 5000
//! broadcast_offers = true
//!
//! [telemetry]
//! log_level = "info,stagehand=debug"
//! log_format = "compact"
//! ```

pub mod loader;
pub mod settings;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use settings::{EngineConfig, LogFormat, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete Stagehand configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StagehandConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl StagehandConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with `config_path` replacing `./stagehand.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = StagehandConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            loader::load_layer(&mut config, &path)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# Stagehand Configuration\n\n");

        output.push_str("[engine]\n");
        output.push_str(&format!(
            "dispatch_timeout_ms = {}\n",
            self.engine.dispatch_timeout_ms
        ));
        output.push_str(&format!(
            "default_ready_timeout_ms = {}\n",
            self.engine.default_ready_timeout_ms
        ));
        output.push_str(&format!(
            "broadcast_offers = {}\n",
            self.engine.broadcast_offers
        ));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!(
            "log_level = \"{}\"\n",
            self.telemetry.log_level
        ));
        output.push_str(&format!(
            "log_format = \"{}\"\n",
            self.telemetry.log_format
        ));

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StagehandConfig::default();
        assert_eq!(config.engine.default_ready_timeout_ms, 0);
        assert_eq!(config.telemetry.log_format, LogFormat::Full);
    }

    #[test]
    fn test_to_toml_round_trips_through_loader() {
        let mut config = StagehandConfig::default();
        config.engine.dispatch_timeout_ms = 15;
        config.telemetry.log_format = LogFormat::Compact;

        let rendered = config.to_toml();
        assert!(rendered.contains("[engine]"));
        assert!(rendered.contains("[telemetry]"));

        let mut reloaded = StagehandConfig::default();
        loader::apply_toml(&mut reloaded, &rendered, Path::new("rendered.toml")).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stagehand.toml");
        std::fs::write(&path, "[engine]\ndefault_ready_timeout_ms = 1234\n").unwrap();

        let (config, sources) = StagehandConfig::load_with_sources_from(Some(&path)).unwrap();
        assert!(sources.files.contains(&path));
        if !sources.env_overrides.iter().any(|v| v == "STAGEHAND_READY_TIMEOUT_MS") {
            assert_eq!(config.engine.default_ready_timeout_ms, 1234);
        }
    }
}
