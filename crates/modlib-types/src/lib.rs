//! # Modlib Types
//!
//! The wire contract between a module and its host process.
//!
//! ## Design Principles
//!
//! - **One sum type**: every message is a variant of [`Message`], tagged by
//!   its `type` field; shapes are validated at the boundary, never at use sites.
//! - **Exact field names**: field names match what existing hosts emit and
//!   expect, so any conforming host interoperates.
//! - **Opaque correlation**: [`CorrelationId`] is minted locally and echoed
//!   back by the host untouched.

pub mod correlation;
pub mod errors;
pub mod message;

pub use correlation::CorrelationId;
pub use errors::{CodecError, DatabaseError};
pub use message::{InitPayload, InvokeRequest, LogLevel, Message, ModuleDefinition, MpcCall};
