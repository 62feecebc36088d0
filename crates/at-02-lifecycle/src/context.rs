//! # Trace Context
//!
//! Explicit wiring of the in-memory adapters into one running lifecycle
//! context for a process: store, directory, ledger, bus, and the service
//! over them. `start` registers the audit observer; `stop` deregisters it.
//!
//! Embedders that bring their own adapters construct `LifecycleService`
//! directly instead.

use crate::ports::{InMemoryChainStore, InMemoryProfileDirectory};
use crate::service::LifecycleService;
use at_01_record_store::{InMemoryLedgerStore, RecordLedger, SystemTimeSource};
use shared_bus::{LifecycleBus, SubscriptionGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// The lifecycle service type over the in-memory adapters.
pub type InMemoryLifecycleService = LifecycleService<
    InMemoryChainStore,
    InMemoryProfileDirectory,
    InMemoryLedgerStore,
    SystemTimeSource,
>;

/// A fully wired in-memory lifecycle context.
///
/// Owns the shared ports so embedders can seed profiles, query entities,
/// and subscribe to events alongside the service.
pub struct TraceContext {
    store: Arc<InMemoryChainStore>,
    directory: Arc<InMemoryProfileDirectory>,
    ledger: Arc<RecordLedger<InMemoryLedgerStore, SystemTimeSource>>,
    bus: Arc<LifecycleBus>,
    service: InMemoryLifecycleService,

    started: AtomicBool,
    audit_guard: Mutex<Option<SubscriptionGuard>>,
}

impl TraceContext {
    /// Wire a fresh context. Nothing is subscribed until `start`.
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(InMemoryChainStore::new());
        let directory = Arc::new(InMemoryProfileDirectory::new());
        let ledger = Arc::new(RecordLedger::new_in_memory());
        let bus = Arc::new(LifecycleBus::new());

        let service = LifecycleService::new(
            Arc::clone(&store),
            Arc::clone(&directory),
            Arc::clone(&ledger),
            Arc::clone(&bus),
        );

        Self {
            store,
            directory,
            ledger,
            bus,
            service,
            started: AtomicBool::new(false),
            audit_guard: Mutex::new(None),
        }
    }

    /// Start the context: registers the audit observer that logs every
    /// published event. Idempotent; a second call is a no-op.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Context already started");
            return;
        }

        let guard = self.bus.on_any(|event| {
            info!(
                kind = ?event.kind(),
                timestamp = event.timestamp,
                "Lifecycle event observed"
            );
            Ok(())
        });

        if let Ok(mut slot) = self.audit_guard.lock() {
            *slot = Some(guard);
        }

        info!("Lifecycle context started");
    }

    /// Stop the context: drops the audit subscription. Idempotent.
    pub fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Ok(mut slot) = self.audit_guard.lock() {
            slot.take();
        }

        info!("Lifecycle context stopped");
    }

    /// Whether `start` has been called without a matching `stop`.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// The lifecycle service.
    #[must_use]
    pub fn service(&self) -> &InMemoryLifecycleService {
        &self.service
    }

    /// The entity store.
    #[must_use]
    pub fn store(&self) -> &Arc<InMemoryChainStore> {
        &self.store
    }

    /// The profile directory, for seeding test or bootstrap identities.
    #[must_use]
    pub fn directory(&self) -> &Arc<InMemoryProfileDirectory> {
        &self.directory
    }

    /// The provenance ledger.
    #[must_use]
    pub fn ledger(&self) -> &Arc<RecordLedger<InMemoryLedgerStore, SystemTimeSource>> {
        &self.ledger
    }

    /// The event bus.
    #[must_use]
    pub fn bus(&self) -> &Arc<LifecycleBus> {
        &self.bus
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new()
    }
}
