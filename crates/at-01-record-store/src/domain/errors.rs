//! # Domain Errors
//!
//! Error types for the Record Store. Port failures abort the enclosing
//! lifecycle transition; payload errors are caller programming errors.

use thiserror::Error;

/// Errors surfaced by the `RecordLedger` service.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// The payload could not be serialized (or exceeds the size cap).
    /// Hashing never fails for well-formed input, so this is a caller
    /// programming error, not an I/O condition.
    #[error("Invalid record payload: {0}")]
    InvalidRecordPayload(String),

    /// The underlying persistence port failed. The enclosing transition
    /// must abort.
    #[error("Ledger storage failure: {0}")]
    StorageFailure(String),
}

/// Errors from the `LedgerStore` port.
#[derive(Debug, Clone, Error)]
pub enum LedgerStoreError {
    /// I/O failure in the backing store.
    #[error("Ledger store I/O error: {0}")]
    Io(String),

    /// A record with this id already exists (ids are random UUIDs, so this
    /// indicates a retried insert, which the caller must not repeat).
    #[error("Duplicate record id: {0}")]
    DuplicateId(String),
}

impl From<LedgerStoreError> for LedgerError {
    fn from(err: LedgerStoreError) -> Self {
        LedgerError::StorageFailure(err.to_string())
    }
}
