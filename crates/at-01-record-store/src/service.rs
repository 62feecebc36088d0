//! # Record Ledger Service
//!
//! The application service implementing append and verify.
//!
//! Append is the final persistence step of every lifecycle transition:
//! the controller commits its entity mutation first, then calls `append`,
//! so a record always documents a state that actually exists.

use crate::domain::entities::{ProvenanceRecord, RecordId, RecordType};
use crate::domain::errors::LedgerError;
use crate::domain::hashing::{canonical_bytes, content_hash};
use crate::domain::value_objects::LedgerConfig;
use crate::ports::{InMemoryLedgerStore, LedgerStore, SystemTimeSource, TimeSource};
use serde::Serialize;
use shared_types::{BatchId, TxId};
use tracing::{debug, info};

/// The Record Ledger service.
///
/// Generic over its persistence and time ports; see `new_in_memory` for
/// the embedded configuration.
pub struct RecordLedger<S, C>
where
    S: LedgerStore,
    C: TimeSource,
{
    store: S,
    clock: C,
    config: LedgerConfig,
}

impl RecordLedger<InMemoryLedgerStore, SystemTimeSource> {
    /// Ledger backed by the in-memory store and system clock.
    #[must_use]
    pub fn new_in_memory() -> Self {
        Self::new(
            InMemoryLedgerStore::new(),
            SystemTimeSource,
            LedgerConfig::default(),
        )
    }
}

impl<S, C> RecordLedger<S, C>
where
    S: LedgerStore,
    C: TimeSource,
{
    /// Create a ledger over explicit ports.
    pub fn new(store: S, clock: C, config: LedgerConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Append a tamper-evident record.
    ///
    /// Serializes `data` canonically, computes the SHA-256 content hash,
    /// and persists the record with `verified: true`. Returns the stored
    /// record including its generated id and hash.
    ///
    /// # Errors
    ///
    /// - `InvalidRecordPayload` if `data` cannot be serialized or exceeds
    ///   the configured size cap (caller programming error).
    /// - `StorageFailure` if the persistence port fails; the enclosing
    ///   transition must abort.
    pub fn append<P: Serialize>(
        &self,
        batch_id: BatchId,
        transaction_id: Option<TxId>,
        record_type: RecordType,
        data: &P,
    ) -> Result<ProvenanceRecord, LedgerError> {
        let data = serde_json::to_value(data)
            .map_err(|e| LedgerError::InvalidRecordPayload(e.to_string()))?;

        let bytes =
            canonical_bytes(&data).map_err(|e| LedgerError::InvalidRecordPayload(e.to_string()))?;
        if bytes.len() > self.config.max_payload_bytes {
            return Err(LedgerError::InvalidRecordPayload(format!(
                "payload is {} bytes, cap is {}",
                bytes.len(),
                self.config.max_payload_bytes
            )));
        }

        let hash =
            content_hash(&data).map_err(|e| LedgerError::InvalidRecordPayload(e.to_string()))?;

        let record = ProvenanceRecord {
            id: RecordId::new(),
            batch_id,
            transaction_id,
            record_type,
            data,
            hash,
            verified: true,
            created_at: self.clock.now(),
        };

        self.store.insert(record.clone())?;

        info!(
            record = %record.id,
            batch = %batch_id,
            record_type = record_type.as_str(),
            hash = %record.hash,
            "Ledger record appended"
        );

        Ok(record)
    }

    /// Current time from the ledger's clock. Callers stamping payloads use
    /// this so record and payload timestamps share one source.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Recompute the digest over the stored `data` and compare to `hash`.
    ///
    /// Used for integrity audits. Fails closed: any serialization error
    /// yields `false`.
    #[must_use]
    pub fn verify(&self, record: &ProvenanceRecord) -> bool {
        match content_hash(&record.data) {
            Ok(hash) => hash == record.hash,
            Err(e) => {
                debug!(record = %record.id, error = %e, "Verification failed closed");
                false
            }
        }
    }

    /// Fetch one record by id.
    pub fn get(&self, id: RecordId) -> Result<Option<ProvenanceRecord>, LedgerError> {
        Ok(self.store.get(id)?)
    }

    /// All records for a batch, append order.
    pub fn records_for_batch(&self, batch_id: BatchId) -> Result<Vec<ProvenanceRecord>, LedgerError> {
        Ok(self.store.for_batch(batch_id)?)
    }

    /// All records referencing a sale transaction, append order.
    pub fn records_for_transaction(&self, tx_id: TxId) -> Result<Vec<ProvenanceRecord>, LedgerError> {
        Ok(self.store.for_transaction(tx_id)?)
    }
}
