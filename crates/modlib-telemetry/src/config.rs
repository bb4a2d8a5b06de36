//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for process-local logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Module name attached to every log line
    pub module_name: String,

    /// Log level filter (trace, debug, info, warn, error or an EnvFilter directive)
    pub log_level: String,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,

    /// Whether to use ANSI colors (ignored for JSON)
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            module_name: "module".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            ansi: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MODLIB_MODULE_NAME`: Module name (default: module)
    /// - `MODLIB_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `MODLIB_JSON_LOGS`: Enable JSON logs (default: false)
    /// - `MODLIB_LOG_ANSI`: Enable ANSI colors (default: false)
    pub fn from_env() -> Self {
        Self {
            module_name: env::var("MODLIB_MODULE_NAME").unwrap_or_else(|_| "module".to_string()),

            log_level: env::var("MODLIB_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("MODLIB_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),

            ansi: env::var("MODLIB_LOG_ANSI")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    /// Create configuration for a named module.
    pub fn for_module(module_name: &str) -> Self {
        let mut config = Self::from_env();
        config.module_name = module_name.to_string();
        config
    }
}
