//! Transport seam between a module session and its host.
//!
//! A transport only moves [`Message`]s: `send` queues one outbound message
//! and never waits, `subscribe` hands out the single inbound stream. The
//! session and dispatcher are written once against this trait.
//!
//! - [`ProcessChannel`]: newline-delimited JSON over the child's stdio (or
//!   any reader/writer pair)
//! - [`HostTransport`]: a host-provided API object with `send`/`on`
//! - [`MemoryTransport`]: in-process pair for tests and embedders

pub mod host;
pub mod memory;
pub mod process;

pub use host::{HostApi, HostListener, HostTransport, MESSAGE_EVENT};
pub use memory::{HostEnd, MemoryTransport};
pub use process::ProcessChannel;

use crate::error::TransportError;
use modlib_types::Message;
use tokio::sync::mpsc;

/// Inbound messages in delivery order.
pub type Inbound = mpsc::UnboundedReceiver<Message>;

/// Message channel to the host.
pub trait Transport: Send + Sync {
    /// Queue `message` for the host. Fire-and-forget; no retries.
    fn send(&self, message: Message) -> Result<(), TransportError>;

    /// Take the inbound stream. Only the first caller succeeds.
    fn subscribe(&self) -> Result<Inbound, TransportError>;

    /// Outbound messages accepted by `send` but not yet handed to the host.
    fn queued(&self) -> usize {
        0
    }
}
