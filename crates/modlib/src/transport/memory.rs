//! In-process transport pair.
//!
//! The module side implements [`Transport`]; the [`HostEnd`] plays the host,
//! delivering inbound messages and observing what the module sent.

use super::{Inbound, Transport};
use crate::error::TransportError;
use modlib_types::Message;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// Module side of an in-memory channel.
pub struct MemoryTransport {
    outbound: mpsc::UnboundedSender<Message>,
    inbound: Mutex<Option<Inbound>>,
}

/// Host side of an in-memory channel.
pub struct HostEnd {
    inbound: mpsc::UnboundedSender<Message>,
    outbound: mpsc::UnboundedReceiver<Message>,
}

impl MemoryTransport {
    /// Create a connected transport/host pair.
    pub fn pair() -> (Self, HostEnd) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        (
            Self {
                outbound: out_tx,
                inbound: Mutex::new(Some(in_rx)),
            },
            HostEnd {
                inbound: in_tx,
                outbound: out_rx,
            },
        )
    }
}

impl Transport for MemoryTransport {
    fn send(&self, message: Message) -> Result<(), TransportError> {
        self.outbound
            .send(message)
            .map_err(|_| TransportError::Closed)
    }

    fn subscribe(&self) -> Result<Inbound, TransportError> {
        self.inbound
            .lock()
            .take()
            .ok_or(TransportError::AlreadySubscribed)
    }
}

impl HostEnd {
    /// Deliver a message to the module.
    pub fn deliver(&self, message: Message) -> Result<(), TransportError> {
        self.inbound
            .send(message)
            .map_err(|_| TransportError::Closed)
    }

    /// Deliver raw JSON, decoding it the way a real host boundary would.
    pub fn deliver_json(&self, value: serde_json::Value) -> Result<(), TransportError> {
        let message = Message::from_value(value)?;
        self.deliver(message)
    }

    /// Next message the module sent, waiting if necessary.
    pub async fn recv(&mut self) -> Option<Message> {
        self.outbound.recv().await
    }

    /// Next message the module sent, or `None` after `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<Message> {
        tokio::time::timeout(timeout, self.outbound.recv())
            .await
            .ok()
            .flatten()
    }

    /// Next message already sent, without waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.outbound.try_recv().ok()
    }
}
