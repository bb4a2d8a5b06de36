//! Session configuration with validation.
//!
//! Every knob defaults to the behavior of a plain host channel: no call
//! timeouts, no expiry of pending entries, unanswerable requests dropped.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// What to do with an `mpcRequest` that cannot be answered normally
/// (no hook registered, or the hook failed).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnhandledMpcPolicy {
    /// Drop the request. The remote caller keeps waiting.
    #[default]
    Drop,
    /// Answer with `isResult: true` and an `{error}` payload.
    ErrorReply,
}

impl FromStr for UnhandledMpcPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "error-reply" | "error_reply" | "error" => Ok(Self::ErrorReply),
            other => Err(ConfigError::Invalid(format!(
                "unknown unhandled-mpc policy: {other}"
            ))),
        }
    }
}

impl fmt::Display for UnhandledMpcPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drop => f.write_str("drop"),
            Self::ErrorReply => f.write_str("error-reply"),
        }
    }
}

/// Module session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Policy for inbound calls nobody answers
    pub unhandled_mpc: UnhandledMpcPolicy,
    /// Deadline applied by `mpc()`/`query()`; `None` waits forever
    #[serde(with = "humantime_serde")]
    pub call_timeout: Option<Duration>,
    /// Age after which unanswered entries are swept; `None` keeps them
    #[serde(with = "humantime_serde")]
    pub pending_ttl: Option<Duration>,
    /// How often the sweeper runs when `pending_ttl` is set
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            unhandled_mpc: UnhandledMpcPolicy::Drop,
            call_timeout: None,
            pending_ttl: None,
            sweep_interval: Duration::from_secs(30),
        }
    }
}

impl ModuleConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MODLIB_UNHANDLED_MPC`: `drop` or `error-reply` (default: drop)
    /// - `MODLIB_CALL_TIMEOUT_MS`: deadline for `mpc()`/`query()` (default: none)
    /// - `MODLIB_PENDING_TTL_MS`: expiry for unanswered entries (default: none)
    /// - `MODLIB_SWEEP_INTERVAL_MS`: sweeper period (default: 30000)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            unhandled_mpc: env::var("MODLIB_UNHANDLED_MPC")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.unhandled_mpc),

            call_timeout: env_millis("MODLIB_CALL_TIMEOUT_MS").or(defaults.call_timeout),

            pending_ttl: env_millis("MODLIB_PENDING_TTL_MS").or(defaults.pending_ttl),

            sweep_interval: env_millis("MODLIB_SWEEP_INTERVAL_MS")
                .unwrap_or(defaults.sweep_interval),
        }
    }

    /// Reply to unanswerable calls instead of dropping them.
    pub fn with_error_replies(mut self) -> Self {
        self.unhandled_mpc = UnhandledMpcPolicy::ErrorReply;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn with_pending_ttl(mut self, ttl: Duration, sweep_interval: Duration) -> Self {
        self.pending_ttl = Some(ttl);
        self.sweep_interval = sweep_interval;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.call_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::InvalidTimeout(
                "call_timeout cannot be 0".into(),
            ));
        }

        if self.pending_ttl.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::InvalidTimeout("pending_ttl cannot be 0".into()));
        }

        if self.sweep_interval.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "sweep_interval cannot be 0".into(),
            ));
        }

        Ok(())
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Configuration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
