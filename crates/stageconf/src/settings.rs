//! Config sections.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Protocol engine and orchestrator tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long a dispatch call may block waiting for events.
    /// Default: 0 (non-blocking poll)
    #[serde(default = "EngineConfig::default_dispatch_timeout_ms")]
    pub dispatch_timeout_ms: u64,

    /// Ready-request timeout applied when the caller passes none.
    /// Default: 0 (never times out)
    #[serde(default = "EngineConfig::default_ready_timeout_ms")]
    pub default_ready_timeout_ms: u64,

    /// Whether offers are announced to remote participants at all.
    /// Default: true
    #[serde(default = "EngineConfig::default_broadcast_offers")]
    pub broadcast_offers: bool,
}

impl EngineConfig {
    fn default_dispatch_timeout_ms() -> u64 {
        0
    }

    fn default_ready_timeout_ms() -> u64 {
        0
    }

    fn default_broadcast_offers() -> bool {
        true
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dispatch_timeout_ms: Self::default_dispatch_timeout_ms(),
            default_ready_timeout_ms: Self::default_ready_timeout_ms(),
            broadcast_offers: Self::default_broadcast_offers(),
        }
    }
}

/// Line format for the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(LogFormat::Full),
            "compact" => Ok(LogFormat::Compact),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Full => f.write_str("full"),
            LogFormat::Compact => f.write_str("compact"),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level or filter directive (trace, debug, info, warn, error).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,

    /// Default: full
    #[serde(default)]
    pub log_format: LogFormat,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}
