//! Pending-call registry.
//!
//! Maps correlation IDs to the one-shot continuation of a caller awaiting a
//! response from the host.
//!
//! Flow:
//! 1. Caller mints a `CorrelationId`
//! 2. Caller calls `register()` to get a oneshot receiver
//! 3. Caller sends the request carrying that id
//! 4. Dispatcher receives the matching response and calls `resolve()`
//! 5. Caller's receiver yields the value
//!
//! An entry is removed before its continuation fires, so a second response
//! for the same id finds nothing and is dropped.

use crate::error::RegistryError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use modlib_types::CorrelationId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// A continuation waiting for its response
struct PendingCall<T> {
    sender: oneshot::Sender<T>,
    created_at: Instant,
    /// What was asked (for logging)
    label: String,
}

/// Counters for a registry
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total continuations registered
    pub total_registered: AtomicU64,
    /// Total continuations fired
    pub total_completed: AtomicU64,
    /// Removed by `cancel()` or resolved after the caller gave up
    pub total_cancelled: AtomicU64,
    /// Removed by the expiry sweep
    pub total_expired: AtomicU64,
    /// Responses whose id matched nothing
    pub total_unrouted: AtomicU64,
}

/// Registry of outstanding requests, keyed by correlation id.
///
/// Inserts and removals are single-key operations, so a continuation that
/// registers a new call while a response is being routed is safe.
pub struct PendingCalls<T> {
    pending: DashMap<CorrelationId, PendingCall<T>>,
    stats: PendingStats,
}

impl<T> PendingCalls<T> {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            stats: PendingStats::default(),
        }
    }

    /// Register a continuation under `id` and get the receiving end.
    ///
    /// Fails without touching the existing entry if `id` is already pending.
    pub fn register(
        &self,
        id: CorrelationId,
        label: &str,
    ) -> Result<oneshot::Receiver<T>, RegistryError> {
        match self.pending.entry(id) {
            Entry::Occupied(entry) => Err(RegistryError::DuplicateId(entry.key().clone())),
            Entry::Vacant(entry) => {
                let (tx, rx) = oneshot::channel();
                debug!(correlation_id = %entry.key(), label = label, "Registered pending call");
                entry.insert(PendingCall {
                    sender: tx,
                    created_at: Instant::now(),
                    label: label.to_string(),
                });
                self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
                Ok(rx)
            }
        }
    }

    /// Fire the continuation for `id` with `value`, removing the entry.
    ///
    /// Returns true if a waiting caller received the value. An unknown or
    /// already-resolved id is a silent no-op.
    pub fn resolve(&self, id: &CorrelationId, value: T) -> bool {
        let Some((_, call)) = self.pending.remove(id) else {
            self.stats.total_unrouted.fetch_add(1, Ordering::Relaxed);
            debug!(correlation_id = %id, "Response for unknown or already resolved correlation ID");
            return false;
        };

        let elapsed = call.created_at.elapsed();
        match call.sender.send(value) {
            Ok(()) => {
                self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %id,
                    label = %call.label,
                    response_time_ms = elapsed.as_millis(),
                    "Resolved pending call"
                );
                true
            }
            Err(_) => {
                // Caller dropped its future
                self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %id,
                    label = %call.label,
                    "Pending call receiver dropped"
                );
                false
            }
        }
    }

    /// Drop the entry for `id` without firing it.
    pub fn cancel(&self, id: &CorrelationId) -> bool {
        if self.pending.remove(id).is_some() {
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Remove entries older than `max_age`. Their callers observe a closed
    /// channel.
    ///
    /// Returns the number of entries removed.
    pub fn remove_expired(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.pending.retain(|id, call| {
            let elapsed = now.duration_since(call.created_at);
            if elapsed > max_age {
                warn!(
                    correlation_id = %id,
                    label = %call.label,
                    elapsed_ms = elapsed.as_millis(),
                    "Expiring unanswered pending call"
                );
                removed += 1;
                false
            } else {
                true
            }
        });

        self.stats
            .total_expired
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Number of outstanding calls
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: &CorrelationId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}

impl<T> Default for PendingCalls<T> {
    fn default() -> Self {
        Self::new()
    }
}
