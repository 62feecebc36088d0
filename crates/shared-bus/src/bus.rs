//! # Lifecycle Bus
//!
//! The in-memory bus: handler registry, synchronous dispatch, and the
//! bounded replay history.

use crate::events::{EventFilter, EventKind, LifecycleEvent};
use crate::DEFAULT_HISTORY_CAPACITY;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use thiserror::Error;
use tracing::{debug, warn};

/// A fault reported by an event handler.
///
/// Handler faults are isolated: they are logged by the bus and never
/// propagate to the publisher or to subsequent handlers.
#[derive(Debug, Clone, Error)]
#[error("handler failed: {0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    /// Build a fault from any displayable cause.
    pub fn new(cause: impl std::fmt::Display) -> Self {
        Self(cause.to_string())
    }
}

/// The handler signature: called synchronously on the publishing thread,
/// so handlers must be non-blocking or hand off long work themselves.
type Handler = dyn Fn(&LifecycleEvent) -> Result<(), HandlerError> + Send + Sync;

struct HandlerEntry {
    id: u64,
    filter: EventFilter,
    handler: Arc<Handler>,
}

struct Registry {
    /// Handlers in subscription order; delivery follows this order.
    handlers: Vec<HandlerEntry>,
    /// Bounded FIFO of published events, oldest first.
    history: VecDeque<LifecycleEvent>,
}

/// In-process lifecycle event bus.
///
/// `publish` appends the event to the bounded history (oldest evicted once
/// capacity is exceeded) and then invokes every matching handler in
/// subscription order, on the publishing thread. Suitable for single-node
/// operation; a distributed deployment would adapt the boundary to a
/// message channel instead.
pub struct LifecycleBus {
    registry: Arc<RwLock<Registry>>,

    /// Next subscription id (monotonic; also the delivery order key).
    next_handler_id: AtomicU64,

    /// Total events published.
    events_published: AtomicU64,

    /// History capacity.
    capacity: usize,
}

impl LifecycleBus {
    /// Create a bus with the default history capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Create a bus with the specified history capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry {
                handlers: Vec::new(),
                history: VecDeque::with_capacity(capacity),
            })),
            next_handler_id: AtomicU64::new(0),
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe a handler for events matching `filter`.
    ///
    /// Multiple subscriptions are independent and all fire. The returned
    /// guard deregisters exactly this handler on `unsubscribe()` or drop.
    #[must_use]
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> SubscriptionGuard
    where
        F: Fn(&LifecycleEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let id = self.next_handler_id.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut registry) = self.registry.write() {
            registry.handlers.push(HandlerEntry {
                id,
                filter,
                handler: Arc::new(handler),
            });
        }

        debug!(subscription = id, "New subscription created");

        SubscriptionGuard {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Subscribe to one event kind.
    #[must_use]
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionGuard
    where
        F: Fn(&LifecycleEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.subscribe(EventFilter::kind(kind), handler)
    }

    /// Subscribe to all event kinds.
    #[must_use]
    pub fn on_any<F>(&self, handler: F) -> SubscriptionGuard
    where
        F: Fn(&LifecycleEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.subscribe(EventFilter::all(), handler)
    }

    /// Publish an event: record it in the history, then deliver it to every
    /// matching handler in subscription order.
    ///
    /// Returns the number of handlers invoked. A handler fault (error or
    /// panic) is logged and does not prevent delivery to later handlers.
    pub fn publish(&self, event: LifecycleEvent) -> usize {
        let kind = event.kind();
        self.events_published.fetch_add(1, Ordering::Relaxed);

        // Record history and snapshot the matching handlers, then release
        // the lock before invoking anything: handlers may subscribe,
        // unsubscribe, or read history themselves.
        let matching: Vec<(u64, Arc<Handler>)> = {
            let Ok(mut registry) = self.registry.write() else {
                warn!(kind = ?kind, "Event dropped (bus registry poisoned)");
                return 0;
            };

            registry.history.push_back(event.clone());
            while registry.history.len() > self.capacity {
                registry.history.pop_front();
            }

            registry
                .handlers
                .iter()
                .filter(|entry| entry.filter.matches(&event))
                .map(|entry| (entry.id, Arc::clone(&entry.handler)))
                .collect()
        };

        let mut invoked = 0;
        for (id, handler) in matching {
            invoked += 1;
            match catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(subscription = id, kind = ?kind, error = %e, "Handler fault isolated");
                }
                Err(_) => {
                    warn!(subscription = id, kind = ?kind, "Handler panicked; fault isolated");
                }
            }
        }

        debug!(kind = ?kind, handlers = invoked, "Event published");
        invoked
    }

    /// The retained history, publish order (most-recent-last), optionally
    /// narrowed by a filter.
    #[must_use]
    pub fn history(&self, filter: Option<&EventFilter>) -> Vec<LifecycleEvent> {
        let Ok(registry) = self.registry.read() else {
            return Vec::new();
        };
        registry
            .history
            .iter()
            .filter(|event| filter.map_or(true, |f| f.matches(event)))
            .cloned()
            .collect()
    }

    /// The full retained history, publish order.
    #[must_use]
    pub fn history_all(&self) -> Vec<LifecycleEvent> {
        self.history(None)
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.read().map_or(0, |r| r.handlers.len())
    }

    /// The history capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total events published since construction.
    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

impl Default for LifecycleBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Capability to deregister one handler.
///
/// Dropping the guard deregisters the handler; `unsubscribe` does the same
/// explicitly. Outlives the bus safely (the registry reference is weak).
pub struct SubscriptionGuard {
    id: u64,
    registry: Weak<RwLock<Registry>>,
}

impl SubscriptionGuard {
    /// Deregister exactly the handler this guard was returned for.
    pub fn unsubscribe(self) {}
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let Ok(mut registry) = registry.write() else {
            return;
        };
        registry.handlers.retain(|entry| entry.id != self.id);
        debug!(subscription = self.id, "Subscription dropped");
    }
}
