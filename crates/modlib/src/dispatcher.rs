//! Inbound dispatcher.
//!
//! Single entry point for everything the host sends. Stateless per message:
//! each message is routed by its `type` tag either to a pending-call registry
//! (responses) or to a lifecycle hook (inbound requests). Messages are
//! dispatched one at a time in delivery order.
//!
//! | type | action |
//! |---|---|
//! | `init` | module-loaded hook |
//! | `invoke` | RPC-invoke hook |
//! | `mpcResponse` | resolve the matching `mpc()` call |
//! | `mpcRequest` | MPC-request hook, then reply with `isResult: true` |
//! | `databaseResult` | resolve the matching `query()` |
//! | `databaseError` | reject the matching `query()` |
//! | anything else | ignored |

use crate::config::UnhandledMpcPolicy;
use crate::hooks::HookSlots;
use crate::pending::PendingCalls;
use crate::transport::{Inbound, Transport};
use modlib_types::{CorrelationId, DatabaseError, Message, MpcCall};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// What a `query()` continuation receives.
pub type QueryOutcome = Result<Value, DatabaseError>;

/// Routes inbound messages to registries and hooks.
#[derive(Clone)]
pub struct Dispatcher {
    hooks: Arc<HookSlots>,
    calls: Arc<PendingCalls<Value>>,
    queries: Arc<PendingCalls<QueryOutcome>>,
    transport: Arc<dyn Transport>,
    unhandled: UnhandledMpcPolicy,
    /// mpcRequest hooks whose reply has not been sent yet
    in_flight: Arc<AtomicUsize>,
}

impl Dispatcher {
    pub fn new(
        hooks: Arc<HookSlots>,
        calls: Arc<PendingCalls<Value>>,
        queries: Arc<PendingCalls<QueryOutcome>>,
        transport: Arc<dyn Transport>,
        unhandled: UnhandledMpcPolicy,
    ) -> Self {
        Self {
            hooks,
            calls,
            queries,
            transport,
            unhandled,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `mpcRequest` replies still being computed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Route one inbound message.
    ///
    /// Must be called from within a Tokio runtime: the reply to an
    /// `mpcRequest` is awaited on a spawned task.
    pub fn dispatch(&self, message: Message) {
        match message {
            Message::Init(fields) => match self.hooks.loaded() {
                Some(hook) => hook(fields),
                None => debug!("init received with no loaded hook"),
            },

            Message::Invoke(request) => match self.hooks.invoke() {
                Some(hook) => hook(request),
                None => debug!(handler_id = %request.handler_id, "invoke received with no invoke hook"),
            },

            Message::MpcResponse { id, payload } => {
                self.calls.resolve(&id, payload);
            }

            Message::MpcRequest { id, payload } => self.handle_mpc_request(id, payload),

            Message::DatabaseResult { id, payload } => {
                self.queries.resolve(&id, Ok(payload));
            }

            Message::DatabaseError { id, payload } => {
                self.queries
                    .resolve(&id, Err(DatabaseError::from_payload(payload)));
            }

            other => trace!(kind = other.kind(), "Ignoring inbound message"),
        }
    }

    /// Dispatch until the transport closes its inbound stream.
    pub async fn run(self, mut inbound: Inbound) {
        info!("Dispatcher started");
        while let Some(message) = inbound.recv().await {
            self.dispatch(message);
        }
        info!("Inbound channel closed, dispatcher stopped");
    }

    fn handle_mpc_request(&self, id: CorrelationId, call: MpcCall) {
        let MpcCall { command, params } = call;

        let Some(hook) = self.hooks.mpc_request() else {
            warn!(correlation_id = %id, command = %command, "mpcRequest with no handler registered");
            self.answer_unhandled(id, format!("no handler registered for command {command}"));
            return;
        };

        // The hook starts in message order; its result is awaited off the
        // dispatch loop so it may itself call mpc() without deadlocking.
        let pending = hook(command.clone(), params);
        let dispatcher = self.clone();
        let guard = InFlight::enter(&self.in_flight);
        tokio::spawn(async move {
            let _guard = guard;
            match pending.await {
                Ok(result) => {
                    debug!(correlation_id = %id, command = %command, "Replying to mpcRequest");
                    dispatcher.send(Message::mpc_result(id, result));
                }
                Err(e) => {
                    warn!(correlation_id = %id, command = %command, error = %e, "mpcRequest handler failed");
                    dispatcher.answer_unhandled(id, format!("{e:#}"));
                }
            }
        });
    }

    fn answer_unhandled(&self, id: CorrelationId, error: String) {
        match self.unhandled {
            UnhandledMpcPolicy::Drop => {}
            UnhandledMpcPolicy::ErrorReply => self.send(Message::mpc_error(id, error)),
        }
    }

    fn send(&self, message: Message) {
        let kind = message.kind();
        if let Err(e) = self.transport.send(message) {
            warn!(kind = kind, error = %e, "Failed to send reply to host");
        }
    }
}

/// Counts one outstanding reply; released on drop, including abort.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
