//! Single-slot lifecycle hooks.
//!
//! Each slot holds at most one callback; registering again replaces it.
//! Callbacks are cloned out of their slot before being invoked, so a hook may
//! re-register hooks or issue calls without holding any lock.

use futures::future::BoxFuture;
use modlib_types::{InitPayload, InvokeRequest};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

/// Called when the host sends `init`.
pub type LoadedHook = Arc<dyn Fn(InitPayload) + Send + Sync>;

/// Called when the host sends `invoke`.
pub type InvokeHook = Arc<dyn Fn(InvokeRequest) + Send + Sync>;

/// Called with `(command, params)` when another module sends `mpcRequest`.
pub type MpcRequestHook =
    Arc<dyn Fn(String, Vec<Value>) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

#[derive(Default)]
pub struct HookSlots {
    loaded: RwLock<Option<LoadedHook>>,
    invoke: RwLock<Option<InvokeHook>>,
    mpc_request: RwLock<Option<MpcRequestHook>>,
}

impl HookSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_loaded(&self, hook: LoadedHook) {
        *self.loaded.write() = Some(hook);
    }

    pub fn set_invoke(&self, hook: InvokeHook) {
        *self.invoke.write() = Some(hook);
    }

    pub fn set_mpc_request(&self, hook: MpcRequestHook) {
        *self.mpc_request.write() = Some(hook);
    }

    pub fn loaded(&self) -> Option<LoadedHook> {
        self.loaded.read().clone()
    }

    pub fn invoke(&self) -> Option<InvokeHook> {
        self.invoke.read().clone()
    }

    pub fn mpc_request(&self) -> Option<MpcRequestHook> {
        self.mpc_request.read().clone()
    }
}
