//! # Error Types
//!
//! Errors shared by the wire contract and every transport variant.

use serde_json::Value;
use thiserror::Error;

/// Failures turning messages into or out of JSON.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Inbound data did not match the wire contract.
    #[error("Failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),

    /// Outbound message could not be serialized.
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// A `databaseError` reply, surfaced as the rejection of `query()`.
///
/// The message is derived from the payload: strings verbatim, objects via
/// their `message` field, anything else as its JSON text.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct DatabaseError {
    pub message: String,
    pub payload: Value,
}

impl DatabaseError {
    pub fn from_payload(payload: Value) -> Self {
        let message = match &payload {
            Value::String(s) => s.clone(),
            Value::Object(map) => match map.get("message") {
                Some(Value::String(s)) => s.clone(),
                _ => payload.to_string(),
            },
            other => other.to_string(),
        };
        Self { message, payload }
    }
}
