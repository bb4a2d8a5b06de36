//! # Modlib Telemetry
//!
//! Process-local structured logging for modules built on `modlib`.
//!
//! This is separate from the host-facing `log()` operation: it records what
//! the library itself is doing (dispatch, correlation, transport errors) for
//! whoever runs the module process.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use modlib_telemetry::{init_logging, TelemetryConfig};
//!
//! init_logging(&TelemetryConfig::for_module("billing"))?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MODLIB_MODULE_NAME` | `module` | Module name in logs |
//! | `MODLIB_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `MODLIB_JSON_LOGS` | `false` | JSON output |
//! | `MODLIB_LOG_ANSI` | `false` | ANSI colors |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::init_logging;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("Global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}
