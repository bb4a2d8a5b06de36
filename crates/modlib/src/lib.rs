//! # Modlib - Module Client for Host Message Channels
//!
//! Lets an isolated module talk to its parent host over one bidirectional
//! message channel: register routes and commands, receive lifecycle and
//! invocation events, call other modules, query the host database and log.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        ModuleSession                          │
//! │                                                               │
//! │  mpc() ──┐   query() ──┐        log() / init_module() / reply()
//! │          ▼             ▼                      │               │
//! │  ┌──────────────┐ ┌──────────────┐            │               │
//! │  │ PendingCalls │ │ PendingCalls │            │               │
//! │  │   (mpc)      │ │  (queries)   │            │               │
//! │  └──────▲───────┘ └──────▲───────┘            │               │
//! │         │ resolve        │ resolve            │               │
//! │  ┌──────┴────────────────┴───────┐            │               │
//! │  │          Dispatcher           │──► hooks   │               │
//! │  └──────────────▲────────────────┘            │               │
//! └─────────────────┼─────────────────────────────┼───────────────┘
//!                   │ subscribe()                 │ send()
//!             ┌─────┴─────────────────────────────▼─────┐
//!             │  Transport: ProcessChannel | HostTransport │
//!             └──────────────────────────────────────────┘
//! ```
//!
//! ## Correlation
//!
//! Every request that expects a reply mints a [`CorrelationId`], registers a
//! one-shot continuation under it and sends the request. The dispatcher
//! resolves the continuation when a response with the same id arrives, then
//! forgets it. Unknown ids are dropped; responses may arrive in any order.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use modlib::{ModuleConfig, ModuleDefinition, ModuleSession};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let session = ModuleSession::stdio(ModuleConfig::from_env())?;
//!     session.on_mpc_request(|command, params| async move {
//!         Ok(serde_json::json!({ "command": command, "echo": params }))
//!     });
//!     session.init_module(ModuleDefinition::new().with_command("echo"))?;
//!
//!     let pong = session.mpc("peer", "ping", vec![]).await?;
//!     session.closed().await;
//!     Ok(())
//! }
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]
#![deny(unsafe_code)]

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod hooks;
pub mod pending;
pub mod session;
pub mod testing;
pub mod transport;

// Re-export main types
pub use config::{ConfigError, ModuleConfig, UnhandledMpcPolicy};
pub use dispatcher::{Dispatcher, QueryOutcome};
pub use error::{ModuleError, ModuleResult, RegistryError, TransportError};
pub use hooks::{HookSlots, InvokeHook, LoadedHook, MpcRequestHook};
pub use pending::{PendingCalls, PendingStats};
pub use session::ModuleSession;
pub use transport::{
    HostApi, HostEnd, HostListener, HostTransport, Inbound, MemoryTransport, ProcessChannel,
    Transport, MESSAGE_EVENT,
};

pub use modlib_types::{
    CorrelationId, DatabaseError, InitPayload, InvokeRequest, LogLevel, Message,
    ModuleDefinition, MpcCall,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
