//! # Query Facade (at-03)
//!
//! Read-only projections over the Record Store, the entity store, and the
//! event bus, for observers that poll instead of subscribing.
//!
//! ## Read Model
//!
//! - Every read is a snapshot: event delivery is independent of reads, so
//!   a caller may observe an event for a state its last read already
//!   reflected. Observers must tolerate that overlap.
//! - Misses and backend errors both yield empty results; the facade never
//!   surfaces an error to a reader. Failures are logged and reads degrade
//!   to "nothing found".

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

use at_01_record_store::{LedgerStore, ProvenanceRecord, RecordLedger, TimeSource};
use at_02_lifecycle::ChainStore;
use serde::Serialize;
use shared_bus::{EventFilter, LifecycleBus, LifecycleEvent};
use shared_types::{Batch, BatchId, Crop, TxId};
use std::sync::Arc;
use tracing::{debug, warn};

/// The public provenance view resolved from a batch code.
///
/// What a consumer scanning the artifact link sees: the batch, its crop,
/// the full ledger trail, and whether every record still verifies.
#[derive(Debug, Clone, Serialize)]
pub struct BatchProvenance {
    pub batch: Batch,
    pub crop: Option<Crop>,
    pub records: Vec<ProvenanceRecord>,
    /// True iff every record in `records` passes hash verification.
    pub trail_intact: bool,
}

/// Read-side facade over the ledger, the entity store, and the bus.
pub struct ProvenanceQuery<S, L, C>
where
    S: ChainStore,
    L: LedgerStore,
    C: TimeSource,
{
    store: Arc<S>,
    ledger: Arc<RecordLedger<L, C>>,
    bus: Arc<LifecycleBus>,
}

impl<S, L, C> ProvenanceQuery<S, L, C>
where
    S: ChainStore,
    L: LedgerStore,
    C: TimeSource,
{
    /// Create a facade over the shared read sources.
    pub fn new(store: Arc<S>, ledger: Arc<RecordLedger<L, C>>, bus: Arc<LifecycleBus>) -> Self {
        Self { store, ledger, bus }
    }

    /// All ledger records for a batch, append order. Empty on miss or
    /// backend failure.
    #[must_use]
    pub fn records_for_batch(&self, batch_id: BatchId) -> Vec<ProvenanceRecord> {
        match self.ledger.records_for_batch(batch_id) {
            Ok(records) => records,
            Err(e) => {
                warn!(batch = %batch_id, error = %e, "Batch record read degraded to empty");
                Vec::new()
            }
        }
    }

    /// All ledger records referencing a sale transaction, append order.
    /// Empty on miss or backend failure.
    #[must_use]
    pub fn records_for_transaction(&self, tx_id: TxId) -> Vec<ProvenanceRecord> {
        match self.ledger.records_for_transaction(tx_id) {
            Ok(records) => records,
            Err(e) => {
                warn!(transaction = %tx_id, error = %e, "Transaction record read degraded to empty");
                Vec::new()
            }
        }
    }

    /// The retained event history, publish order, optionally narrowed.
    #[must_use]
    pub fn event_history(&self, filter: Option<&EventFilter>) -> Vec<LifecycleEvent> {
        self.bus.history(filter)
    }

    /// Resolve a public batch code to its provenance view.
    ///
    /// `None` when the code matches no batch. Each record in the view is
    /// re-verified against its stored hash.
    #[must_use]
    pub fn batch_provenance(&self, code: &str) -> Option<BatchProvenance> {
        let batch = match self.store.batch_by_code(code) {
            Ok(Some(batch)) => batch,
            Ok(None) => {
                debug!(code, "Batch code resolved to nothing");
                return None;
            }
            Err(e) => {
                warn!(code, error = %e, "Batch code lookup degraded to miss");
                return None;
            }
        };

        let crop = match self.store.get_crop(batch.crop_id) {
            Ok(crop) => crop,
            Err(e) => {
                warn!(crop = %batch.crop_id, error = %e, "Crop read degraded to missing");
                None
            }
        };

        let records = self.records_for_batch(batch.id);
        let trail_intact = records.iter().all(|record| self.ledger.verify(record));

        Some(BatchProvenance {
            batch,
            crop,
            records,
            trail_intact,
        })
    }
}
