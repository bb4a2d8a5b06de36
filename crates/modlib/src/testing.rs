//! Test doubles for host integrations.

use crate::transport::{HostApi, HostListener};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

/// In-memory [`HostApi`] that records what the module sends and lets tests
/// fire host events.
#[derive(Default)]
pub struct RecordingHost {
    sent: Mutex<Vec<Value>>,
    listeners: Mutex<HashMap<String, Vec<HostListener>>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, oldest first.
    pub fn sent(&self) -> Vec<Value> {
        self.sent.lock().clone()
    }

    /// Remove and return everything sent so far.
    pub fn take_sent(&self) -> Vec<Value> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Invoke every listener registered for `event`.
    pub fn emit(&self, event: &str, value: Value) {
        let listeners = self.listeners.lock();
        if let Some(listeners) = listeners.get(event) {
            for listener in listeners {
                listener(value.clone());
            }
        }
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.lock().get(event).map_or(0, Vec::len)
    }
}

impl HostApi for RecordingHost {
    fn send(&self, message: Value) {
        self.sent.lock().push(message);
    }

    fn on(&self, event: &str, listener: HostListener) {
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(listener);
    }
}
