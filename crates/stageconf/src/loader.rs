//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, LogFormat, StagehandConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with an explicit override path.
///
/// If `explicit` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/stagehand/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("stagehand/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = explicit {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("stagehand.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file and overlay the keys it sets onto `config`.
pub fn load_layer(config: &mut StagehandConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    apply_toml(config, &contents, path)
}

/// Overlay the keys present in `contents`; absent keys keep their value.
pub(crate) fn apply_toml(
    config: &mut StagehandConfig,
    contents: &str,
    path: &Path,
) -> Result<(), ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let bad = |key: &str, expected: &str| ConfigError::Parse {
        path: path.to_path_buf(),
        message: format!("{} must be {}", key, expected),
    };

    if let Some(engine) = table.get("engine").and_then(|v| v.as_table()) {
        if let Some(v) = engine.get("dispatch_timeout_ms") {
            let ms = v
                .as_integer()
                .filter(|ms| *ms >= 0)
                .ok_or_else(|| bad("engine.dispatch_timeout_ms", "a non-negative integer"))?;
            config.engine.dispatch_timeout_ms = ms as u64;
        }
        if let Some(v) = engine.get("default_ready_timeout_ms") {
            let ms = v
                .as_integer()
                .filter(|ms| *ms >= 0)
                .ok_or_else(|| bad("engine.default_ready_timeout_ms", "a non-negative integer"))?;
            config.engine.default_ready_timeout_ms = ms as u64;
        }
        if let Some(v) = engine.get("broadcast_offers") {
            config.engine.broadcast_offers = v
                .as_bool()
                .ok_or_else(|| bad("engine.broadcast_offers", "a boolean"))?;
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("log_level") {
            config.telemetry.log_level = v
                .as_str()
                .ok_or_else(|| bad("telemetry.log_level", "a string"))?
                .to_string();
        }
        if let Some(v) = telemetry.get("log_format") {
            config.telemetry.log_format = v
                .as_str()
                .ok_or_else(|| bad("telemetry.log_format", "a string"))?
                .parse()
                .map_err(|message| ConfigError::Parse {
                    path: path.to_path_buf(),
                    message,
                })?;
        }
    }

    Ok(())
}

/// Apply environment variable overrides to config.
///
/// Values that fail to parse are skipped and not recorded as overrides.
pub fn apply_env_overrides(config: &mut StagehandConfig, sources: &mut ConfigSources) {
    if let Ok(v) = env::var("STAGEHAND_DISPATCH_TIMEOUT_MS") {
        if let Ok(ms) = v.parse() {
            config.engine.dispatch_timeout_ms = ms;
            sources.env_overrides.push("STAGEHAND_DISPATCH_TIMEOUT_MS".to_string());
        }
    }
    if let Ok(v) = env::var("STAGEHAND_READY_TIMEOUT_MS") {
        if let Ok(ms) = v.parse() {
            config.engine.default_ready_timeout_ms = ms;
            sources.env_overrides.push("STAGEHAND_READY_TIMEOUT_MS".to_string());
        }
    }
    if let Ok(v) = env::var("STAGEHAND_BROADCAST_OFFERS") {
        if let Some(flag) = parse_flag(&v) {
            config.engine.broadcast_offers = flag;
            sources.env_overrides.push("STAGEHAND_BROADCAST_OFFERS".to_string());
        }
    }

    if let Ok(v) = env::var("STAGEHAND_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("STAGEHAND_LOG_LEVEL".to_string());
    }
    // Also support RUST_LOG
    if let Ok(v) = env::var("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
    if let Ok(v) = env::var("STAGEHAND_LOG_FORMAT") {
        if let Ok(format) = v.parse::<LogFormat>() {
            config.telemetry.log_format = format;
            sources.env_overrides.push("STAGEHAND_LOG_FORMAT".to_string());
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
