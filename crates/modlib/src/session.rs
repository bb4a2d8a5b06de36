//! Module session.
//!
//! The context object a module holds for its whole lifetime: it owns the
//! transport handle, the two pending-call registries (inter-module calls and
//! database queries), the hook slots and the configuration. Sessions are
//! independent of each other, so several may coexist in one process.
//!
//! Calls that expect a reply send eagerly: by the time `mpc()` or `query()`
//! returns its future the request is already on the wire.

use crate::config::ModuleConfig;
use crate::dispatcher::{Dispatcher, QueryOutcome};
use crate::error::{ModuleError, ModuleResult};
use crate::hooks::HookSlots;
use crate::pending::{PendingCalls, PendingStats};
use crate::transport::{HostApi, HostTransport, ProcessChannel, Transport};
use futures::FutureExt;
use modlib_types::{
    CorrelationId, InitPayload, InvokeRequest, LogLevel, Message, ModuleDefinition, MpcCall,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Handle to a module's connection with its host. Cheap to clone.
#[derive(Clone)]
pub struct ModuleSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    transport: Arc<dyn Transport>,
    calls: Arc<PendingCalls<Value>>,
    queries: Arc<PendingCalls<QueryOutcome>>,
    hooks: Arc<HookSlots>,
    dispatcher: Dispatcher,
    config: ModuleConfig,
    dispatch_loop: Mutex<Option<JoinHandle<()>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    /// Moved into the dispatch loop by `start`; dropped or set when it ends
    stopped_tx: Mutex<Option<watch::Sender<bool>>>,
    stopped: watch::Receiver<bool>,
}

/// Poll period while waiting for outstanding replies to leave.
const DRAIN_POLL: Duration = Duration::from_millis(5);

impl ModuleSession {
    /// Create a session over `transport` without consuming inbound traffic.
    ///
    /// Messages can then be fed through [`dispatch`](Self::dispatch), or the
    /// dispatch loop started with [`start`](Self::start).
    pub fn new(transport: Arc<dyn Transport>, config: ModuleConfig) -> ModuleResult<Self> {
        config.validate()?;

        let calls = Arc::new(PendingCalls::new());
        let queries = Arc::new(PendingCalls::new());
        let hooks = Arc::new(HookSlots::new());
        let dispatcher = Dispatcher::new(
            hooks.clone(),
            calls.clone(),
            queries.clone(),
            transport.clone(),
            config.unhandled_mpc,
        );

        let (stopped_tx, stopped) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(SessionInner {
                transport,
                calls,
                queries,
                hooks,
                dispatcher,
                config,
                dispatch_loop: Mutex::new(None),
                sweeper: Mutex::new(None),
                stopped_tx: Mutex::new(Some(stopped_tx)),
                stopped,
            }),
        })
    }

    /// Create a session and start dispatching inbound messages.
    pub fn connect(transport: Arc<dyn Transport>, config: ModuleConfig) -> ModuleResult<Self> {
        let session = Self::new(transport, config)?;
        session.start()?;
        Ok(session)
    }

    /// Connect over this process's stdin/stdout.
    pub fn stdio(config: ModuleConfig) -> ModuleResult<Self> {
        Self::connect(Arc::new(ProcessChannel::stdio()), config)
    }

    /// Connect through a host-provided API object.
    pub fn with_host<H: HostApi + 'static>(host: Arc<H>, config: ModuleConfig) -> ModuleResult<Self> {
        Self::connect(Arc::new(HostTransport::new(host)), config)
    }

    /// Subscribe to the transport and spawn the dispatch loop (plus the
    /// expiry sweeper when `pending_ttl` is configured).
    pub fn start(&self) -> ModuleResult<()> {
        let inbound = self.inner.transport.subscribe()?;
        let stopped = self.inner.stopped_tx.lock().take();
        let dispatcher = self.inner.dispatcher.clone();
        let handle = tokio::spawn(async move {
            dispatcher.run(inbound).await;
            if let Some(stopped) = stopped {
                let _ = stopped.send(true);
            }
        });
        *self.inner.dispatch_loop.lock() = Some(handle);

        if let Some(ttl) = self.inner.config.pending_ttl {
            let handle = tokio::spawn(sweep_task(
                self.inner.calls.clone(),
                self.inner.queries.clone(),
                ttl,
                self.inner.config.sweep_interval,
            ));
            *self.inner.sweeper.lock() = Some(handle);
        }

        info!(
            unhandled_mpc = %self.inner.config.unhandled_mpc,
            "Module session started"
        );
        Ok(())
    }

    /// Wait until the dispatch loop ends: the host closed the inbound
    /// channel or [`shutdown`](Self::shutdown) was called. Returns at once
    /// if the session was never started.
    ///
    /// Cancel-safe; may be awaited any number of times.
    pub async fn closed(&self) {
        if self.inner.stopped_tx.lock().is_some() {
            return;
        }

        let mut stopped = self.inner.stopped.clone();
        while !*stopped.borrow_and_update() {
            // Sender dropped: the loop was aborted
            if stopped.changed().await.is_err() {
                break;
            }
        }
    }

    /// Wait up to `limit` for `mpcRequest` replies still being computed and
    /// for outbound messages still queued in the transport.
    ///
    /// Returns false if something was still outstanding at the deadline.
    pub async fn drain(&self, limit: Duration) -> bool {
        let idle = async {
            while self.inner.dispatcher.in_flight() > 0 || self.inner.transport.queued() > 0 {
                tokio::time::sleep(DRAIN_POLL).await;
            }
        };
        tokio::time::timeout(limit, idle).await.is_ok()
    }

    /// Stop background tasks. Outstanding calls stay pending.
    pub fn shutdown(&self) {
        if let Some(handle) = self.inner.dispatch_loop.lock().take() {
            handle.abort();
        }
        if let Some(handle) = self.inner.sweeper.lock().take() {
            handle.abort();
        }
    }

    /// Route one inbound message, as the dispatch loop would.
    pub fn dispatch(&self, message: Message) {
        self.inner.dispatcher.dispatch(message);
    }

    // =========================================================================
    // HOOKS
    // =========================================================================

    /// Set the module-loaded hook (replaces any previous one).
    pub fn on_loaded<F>(&self, hook: F)
    where
        F: Fn(InitPayload) + Send + Sync + 'static,
    {
        self.inner.hooks.set_loaded(Arc::new(hook));
    }

    /// Set the RPC-invoke hook (replaces any previous one). Answer with
    /// [`reply`](Self::reply).
    pub fn on_invoke<F>(&self, hook: F)
    where
        F: Fn(InvokeRequest) + Send + Sync + 'static,
    {
        self.inner.hooks.set_invoke(Arc::new(hook));
    }

    /// Set the handler for commands invoked by other modules (replaces any
    /// previous one). The returned value is sent back as `{result}`.
    pub fn on_mpc_request<F, Fut>(&self, hook: F)
    where
        F: Fn(String, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.inner
            .hooks
            .set_mpc_request(Arc::new(move |command: String, params: Vec<Value>| {
                hook(command, params).boxed()
            }));
    }

    // =========================================================================
    // OUTBOUND OPERATIONS
    // =========================================================================

    /// Send a log line to the host.
    pub fn log(&self, message: impl Into<String>, level: LogLevel) -> ModuleResult<()> {
        self.send(Message::log(level, message))
    }

    /// Announce this module's routes and commands.
    pub fn init_module(&self, definition: ModuleDefinition) -> ModuleResult<()> {
        debug!(commands = ?definition.commands, "Registering module");
        self.send(Message::register(definition))
    }

    /// Answer an `invoke` previously received by the invoke hook.
    pub fn reply(
        &self,
        msg_id: &CorrelationId,
        payload: Value,
        content_type: Option<&str>,
    ) -> ModuleResult<()> {
        self.send(Message::response(
            msg_id.clone(),
            payload,
            content_type.map(str::to_string),
        ))
    }

    /// Invoke `command` on module `target`.
    ///
    /// Resolves with the payload of the matching `mpcResponse`. Waits forever
    /// unless `call_timeout` is configured.
    pub fn mpc(
        &self,
        target: &str,
        command: &str,
        params: Vec<Value>,
    ) -> impl Future<Output = ModuleResult<Value>> + Send + 'static {
        self.mpc_inner(target, command, params, self.inner.config.call_timeout)
    }

    /// [`mpc`](Self::mpc) with an explicit deadline. On expiry the pending
    /// entry is discarded and a late response is dropped.
    pub fn mpc_with_timeout(
        &self,
        target: &str,
        command: &str,
        params: Vec<Value>,
        timeout: Duration,
    ) -> impl Future<Output = ModuleResult<Value>> + Send + 'static {
        self.mpc_inner(target, command, params, Some(timeout))
    }

    /// Run `sql` against the host database.
    ///
    /// Resolves on `databaseResult`, fails with [`ModuleError::Database`] on
    /// `databaseError`.
    pub fn query(&self, sql: &str) -> impl Future<Output = ModuleResult<Value>> + Send + 'static {
        self.query_inner(sql, self.inner.config.call_timeout)
    }

    /// [`query`](Self::query) with an explicit deadline.
    pub fn query_with_timeout(
        &self,
        sql: &str,
        timeout: Duration,
    ) -> impl Future<Output = ModuleResult<Value>> + Send + 'static {
        self.query_inner(sql, Some(timeout))
    }

    // =========================================================================
    // DIAGNOSTICS
    // =========================================================================

    /// Outstanding `mpc()` calls.
    pub fn pending_calls(&self) -> usize {
        self.inner.calls.pending_count()
    }

    /// Outstanding `query()` calls.
    pub fn pending_queries(&self) -> usize {
        self.inner.queries.pending_count()
    }

    pub fn call_stats(&self) -> &PendingStats {
        self.inner.calls.stats()
    }

    pub fn query_stats(&self) -> &PendingStats {
        self.inner.queries.stats()
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.inner.config
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn send(&self, message: Message) -> ModuleResult<()> {
        self.inner.transport.send(message)?;
        Ok(())
    }

    fn mpc_inner(
        &self,
        target: &str,
        command: &str,
        params: Vec<Value>,
        timeout: Option<Duration>,
    ) -> impl Future<Output = ModuleResult<Value>> + Send + 'static {
        let calls = self.inner.calls.clone();
        let started = self.begin_mpc(target, command, params);

        async move {
            let (id, rx) = started?;
            await_reply(&calls, id, rx, timeout).await
        }
    }

    fn begin_mpc(
        &self,
        target: &str,
        command: &str,
        params: Vec<Value>,
    ) -> ModuleResult<(CorrelationId, oneshot::Receiver<Value>)> {
        let id = CorrelationId::new();
        let call = MpcCall {
            command: command.to_string(),
            params,
        };
        let rx = self
            .inner
            .calls
            .register(id.clone(), &format!("{target}.{command}"))?;

        if let Err(e) = self.send(Message::mpc_call(id.clone(), target, &call)) {
            self.inner.calls.cancel(&id);
            return Err(e);
        }

        debug!(correlation_id = %id, target = target, command = command, "Sent mpc request");
        Ok((id, rx))
    }

    fn query_inner(
        &self,
        sql: &str,
        timeout: Option<Duration>,
    ) -> impl Future<Output = ModuleResult<Value>> + Send + 'static {
        let queries = self.inner.queries.clone();
        let started = self.begin_query(sql);

        async move {
            let (id, rx) = started?;
            let outcome = await_reply(&queries, id, rx, timeout).await?;
            Ok(outcome?)
        }
    }

    fn begin_query(
        &self,
        sql: &str,
    ) -> ModuleResult<(CorrelationId, oneshot::Receiver<QueryOutcome>)> {
        let id = CorrelationId::new();
        let rx = self.inner.queries.register(id.clone(), "databaseQuery")?;

        if let Err(e) = self.send(Message::database_query(id.clone(), sql)) {
            self.inner.queries.cancel(&id);
            return Err(e);
        }

        debug!(correlation_id = %id, "Sent database query");
        Ok((id, rx))
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some(handle) = self.dispatch_loop.get_mut().take() {
            handle.abort();
        }
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
    }
}

async fn await_reply<T>(
    registry: &PendingCalls<T>,
    id: CorrelationId,
    rx: oneshot::Receiver<T>,
    timeout: Option<Duration>,
) -> ModuleResult<T> {
    let received = match timeout {
        None => rx.await,
        Some(limit) => match tokio::time::timeout(limit, rx).await {
            Ok(received) => received,
            Err(_) => {
                registry.cancel(&id);
                return Err(ModuleError::Timeout { id, timeout: limit });
            }
        },
    };

    received.map_err(|_| ModuleError::Cancelled { id })
}

/// Periodically expire entries older than `ttl` from both registries.
async fn sweep_task(
    calls: Arc<PendingCalls<Value>>,
    queries: Arc<PendingCalls<QueryOutcome>>,
    ttl: Duration,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let removed = calls.remove_expired(ttl) + queries.remove_expired(ttl);
        if removed > 0 {
            debug!(removed = removed, "Swept expired pending calls");
        }
    }
}
