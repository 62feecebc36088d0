//! # Outbound Ports (Driven Ports)
//!
//! Dependencies required by the Record Store service, plus the in-memory
//! adapters used for tests and single-process embedding.
//!
//! The persistence port is intentionally append-only: there is no update
//! or delete surface, so tamper evidence cannot be bypassed through the
//! port.

use crate::domain::entities::{ProvenanceRecord, RecordId};
use crate::domain::errors::LedgerStoreError;
use shared_types::{BatchId, TxId};
use std::sync::RwLock;

/// Abstract interface for ledger persistence.
///
/// Production: a relational or KV adapter in the host application.
/// Testing/embedding: `InMemoryLedgerStore` (below).
pub trait LedgerStore: Send + Sync {
    /// Insert a new record. Records are immutable once inserted.
    fn insert(&self, record: ProvenanceRecord) -> Result<(), LedgerStoreError>;

    /// Fetch one record by id.
    fn get(&self, id: RecordId) -> Result<Option<ProvenanceRecord>, LedgerStoreError>;

    /// All records for a batch, in append order.
    fn for_batch(&self, batch_id: BatchId) -> Result<Vec<ProvenanceRecord>, LedgerStoreError>;

    /// All records referencing a sale transaction, in append order.
    fn for_transaction(&self, tx_id: TxId) -> Result<Vec<ProvenanceRecord>, LedgerStoreError>;
}

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    /// Current timestamp in seconds since epoch.
    fn now(&self) -> u64;
}

/// Default time source using system time.
#[derive(Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// In-memory ledger store.
///
/// Appends are serialized by an internal lock; concurrent appends need no
/// further coordination because record ids are random UUIDs.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    records: RwLock<Vec<ProvenanceRecord>>,
}

impl InMemoryLedgerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().map_or(0, |r| r.len())
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn insert(&self, record: ProvenanceRecord) -> Result<(), LedgerStoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| LedgerStoreError::Io("ledger store lock poisoned".into()))?;

        if records.iter().any(|r| r.id == record.id) {
            return Err(LedgerStoreError::DuplicateId(record.id.to_string()));
        }
        records.push(record);
        Ok(())
    }

    fn get(&self, id: RecordId) -> Result<Option<ProvenanceRecord>, LedgerStoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| LedgerStoreError::Io("ledger store lock poisoned".into()))?;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    fn for_batch(&self, batch_id: BatchId) -> Result<Vec<ProvenanceRecord>, LedgerStoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| LedgerStoreError::Io("ledger store lock poisoned".into()))?;
        Ok(records
            .iter()
            .filter(|r| r.batch_id == batch_id)
            .cloned()
            .collect())
    }

    fn for_transaction(&self, tx_id: TxId) -> Result<Vec<ProvenanceRecord>, LedgerStoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| LedgerStoreError::Io("ledger store lock poisoned".into()))?;
        Ok(records
            .iter()
            .filter(|r| r.transaction_id == Some(tx_id))
            .cloned()
            .collect())
    }
}
