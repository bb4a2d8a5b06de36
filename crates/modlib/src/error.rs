//! Error types for the module client.

use crate::config::ConfigError;
use modlib_types::{CodecError, CorrelationId, DatabaseError};
use std::time::Duration;
use thiserror::Error;

/// Result alias used across the crate.
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The channel to the host is gone.
    #[error("channel closed")]
    Closed,

    /// Inbound messages can only be consumed by one dispatcher.
    #[error("inbound channel already subscribed")]
    AlreadySubscribed,

    /// Message could not be encoded for the wire.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Pending-call registry failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A continuation is already registered under this id.
    #[error("correlation id {0} is already pending")]
    DuplicateId(CorrelationId),
}

/// Errors returned by outbound operations.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// The host answered a query with `databaseError`.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// No response arrived within the caller's deadline.
    #[error("request {id} timed out after {}ms", .timeout.as_millis())]
    Timeout { id: CorrelationId, timeout: Duration },

    /// The pending entry was removed before a response arrived.
    #[error("request {id} was cancelled before a response arrived")]
    Cancelled { id: CorrelationId },
}
