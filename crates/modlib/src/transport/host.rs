//! Host-API transport.
//!
//! For modules running inside a host VM that exposes an API object instead of
//! a process channel. The object takes untyped JSON and delivers inbound
//! traffic through event-name-keyed listeners; this adapter subscribes to
//! [`MESSAGE_EVENT`] and validates every value against the wire contract
//! before it reaches the dispatcher.

use super::{Inbound, Transport};
use crate::error::TransportError;
use modlib_types::Message;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Event name under which the host delivers inbound messages.
pub const MESSAGE_EVENT: &str = "message";

/// Listener registered with [`HostApi::on`].
pub type HostListener = Box<dyn Fn(Value) + Send + Sync>;

/// Capability interface of the host-provided API object.
pub trait HostApi: Send + Sync {
    /// Hand a message to the host.
    fn send(&self, message: Value);

    /// Register a listener for a named host event.
    fn on(&self, event: &str, listener: HostListener);
}

/// [`Transport`] over a [`HostApi`] object.
pub struct HostTransport<H> {
    host: Arc<H>,
    subscribed: AtomicBool,
}

impl<H: HostApi> HostTransport<H> {
    pub fn new(host: Arc<H>) -> Self {
        Self {
            host,
            subscribed: AtomicBool::new(false),
        }
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }
}

impl<H: HostApi> Transport for HostTransport<H> {
    fn send(&self, message: Message) -> Result<(), TransportError> {
        let value = message.to_value()?;
        self.host.send(value);
        Ok(())
    }

    fn subscribe(&self) -> Result<Inbound, TransportError> {
        if self.subscribed.swap(true, Ordering::SeqCst) {
            return Err(TransportError::AlreadySubscribed);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.host.on(
            MESSAGE_EVENT,
            Box::new(move |value| match Message::from_value(value) {
                Ok(message) => {
                    // Receiver gone means the session shut down
                    let _ = tx.send(message);
                }
                Err(e) => warn!(error = %e, "Dropping inbound host message"),
            }),
        );
        Ok(rx)
    }
}
