//! # Error Taxonomy
//!
//! Structured errors shared across subsystems. Every controller failure is
//! one of these kinds plus a human-readable message; callers can match on
//! the kind without parsing strings.

use crate::entities::{BatchId, CropId, ProfileId, Role};
use thiserror::Error;

/// Failures surfaced by Lifecycle Controller operations.
///
/// No operation partially applies from the caller's point of view except
/// the documented `InconsistentLedger` case, which is logged as a
/// high-severity reconciliation item before it is returned.
#[derive(Debug, Clone, Error)]
pub enum LifecycleError {
    /// Input failed shape/range validation. Rejected before any mutation.
    #[error("Validation failed: {reason}")]
    ValidationFailed { reason: String },

    /// Caller's role does not grant the required capability. No mutation.
    #[error("Unauthorized: profile {profile_id} lacks the {required} role")]
    UnauthorizedRole {
        profile_id: ProfileId,
        required: Role,
    },

    /// No crop with this id.
    #[error("Crop not found: {0}")]
    CropNotFound(CropId),

    /// No batch with this id.
    #[error("Batch not found: {0}")]
    BatchNotFound(BatchId),

    /// The batch is not in a purchasable state. No mutation.
    #[error("Batch {batch_id} is not available for purchase (status: {status})")]
    BatchUnavailable { batch_id: BatchId, status: String },

    /// Requested more units than the batch currently holds. No mutation.
    #[error("Requested {requested} units of batch {batch_id}, only {available} available")]
    QuantityExceedsAvailable {
        batch_id: BatchId,
        requested: u64,
        available: u64,
    },

    /// Underlying persistence failure; partial writes were rolled back.
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    /// Crop registration failed; all steps of the call were rolled back.
    #[error("Crop registration failed: {cause}")]
    RegistrationFailed { cause: String },

    /// The ledger append failed after the entity mutation committed; the
    /// mutation was rolled back before this error surfaced.
    #[error("Ledger append failed after {attempts} attempts: {cause}")]
    LedgerAppendFailed { attempts: u32, cause: String },

    /// The ledger append failed AND the compensating rollback failed.
    /// The entity mutation is committed without its ledger record; operator
    /// reconciliation is required.
    #[error("Inconsistent ledger for batch {batch_id}: {cause} (reconciliation required)")]
    InconsistentLedger { batch_id: BatchId, cause: String },
}

/// Errors from the chain store port (entity persistence).
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// I/O failure in the underlying store.
    #[error("Store I/O error: {0}")]
    Io(String),

    /// Referenced row does not exist.
    #[error("Row not found: {0}")]
    NotFound(String),

    /// A conditional write lost: the guarded precondition no longer holds.
    /// The whole atomic commit was discarded.
    #[error("Conditional write failed: {0}")]
    ConditionFailed(String),
}

/// Errors from the external profile directory.
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    /// No profile registered under this id.
    #[error("Unknown profile: {0}")]
    UnknownProfile(ProfileId),

    /// Directory lookup failed (network, backend, ...).
    #[error("Directory lookup failed: {0}")]
    LookupFailed(String),
}
