//! # Outbound Ports (Driven Ports)
//!
//! Dependencies required by the Lifecycle Controller: entity persistence
//! with atomic multi-row commit, and the external profile directory.
//!
//! ## Atomicity Guarantee
//!
//! `ChainStore::atomic_commit` applies a whole op list or none of it. The
//! conditional ops (`DecrementBatchQuantity`) re-check their precondition
//! inside the commit, which is the single serialization point for
//! concurrent purchases: a losing purchase gets `ConditionFailed` and the
//! commit leaves no trace.

use crate::domain::state::crop_transition_allowed;
use shared_types::{
    Batch, BatchId, BatchStatus, Crop, CropId, CropStatus, DirectoryError, Profile, ProfileId,
    SaleTransaction, StoreError, TxId,
};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use tracing::debug;

/// One row operation inside an atomic commit.
#[derive(Debug, Clone)]
pub enum StoreOp {
    /// Insert or replace a crop row.
    PutCrop(Crop),
    /// Insert or replace a batch row.
    PutBatch(Batch),
    /// Insert or replace a sale transaction row.
    PutTransaction(SaleTransaction),
    /// Remove a crop row (registration rollback). Idempotent.
    DeleteCrop(CropId),
    /// Remove a batch row (registration rollback). Idempotent.
    DeleteBatch(BatchId),
    /// Remove a transaction row (purchase compensation). Idempotent.
    DeleteTransaction(TxId),
    /// Check-and-decrement the batch quantity. Fails the whole commit with
    /// `ConditionFailed` unless the batch is `Available` and holds at least
    /// `quantity` units; sets `Purchased` when the remainder reaches zero.
    DecrementBatchQuantity { batch_id: BatchId, quantity: u64 },
    /// Return units to a batch (purchase compensation): re-opens a
    /// `Purchased` batch to `Available` and re-lists a `Sold` crop.
    RestockBatch { batch_id: BatchId, quantity: u64 },
    /// Advance the crop to `Sold` if every one of its batches is
    /// `Purchased`; no-op otherwise.
    AdvanceCropIfExhausted(CropId),
}

/// Abstract interface for entity persistence.
///
/// Production: a relational adapter in the host application (rows for
/// crops, batches, transactions; `atomic_commit` maps to one DB
/// transaction). Testing/embedding: `InMemoryChainStore` (below).
pub trait ChainStore: Send + Sync {
    fn get_crop(&self, id: CropId) -> Result<Option<Crop>, StoreError>;
    fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, StoreError>;
    fn get_transaction(&self, id: TxId) -> Result<Option<SaleTransaction>, StoreError>;

    /// All batches of a crop, ordered by `batch_number`.
    fn batches_for_crop(&self, crop_id: CropId) -> Result<Vec<Batch>, StoreError>;

    /// Resolve a finalized batch code to its batch.
    fn batch_by_code(&self, code: &str) -> Result<Option<Batch>, StoreError>;

    /// Execute an atomic multi-row commit: either ALL operations apply, or
    /// NONE do.
    fn atomic_commit(&self, ops: Vec<StoreOp>) -> Result<(), StoreError>;
}

/// Abstract interface for the external identity/profile directory.
///
/// The controller treats this as a read-only dependency and maps role
/// mismatches to `UnauthorizedRole`.
pub trait ProfileDirectory: Send + Sync {
    /// Resolve a profile id to its profile (including the role).
    fn resolve(&self, id: ProfileId) -> Result<Profile, DirectoryError>;
}

// =============================================================================
// ADAPTER IMPLEMENTATIONS
// Production adapters live in the host application; the in-memory versions
// below serve tests and single-process embedding.
// =============================================================================

#[derive(Default, Clone)]
struct Tables {
    crops: HashMap<CropId, Crop>,
    batches: HashMap<BatchId, Batch>,
    transactions: HashMap<TxId, SaleTransaction>,
}

/// In-memory chain store.
///
/// One mutex guards all tables; `atomic_commit` stages every op on a copy
/// and swaps it in only when the whole list succeeded, so partial commits
/// cannot be observed even on failure.
#[derive(Default)]
pub struct InMemoryChainStore {
    tables: Mutex<Tables>,
}

impl InMemoryChainStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Io("chain store lock poisoned".into()))
    }

    fn apply(staged: &mut Tables, op: StoreOp) -> Result<(), StoreError> {
        match op {
            StoreOp::PutCrop(crop) => {
                staged.crops.insert(crop.id, crop);
            }
            StoreOp::PutBatch(batch) => {
                staged.batches.insert(batch.id, batch);
            }
            StoreOp::PutTransaction(tx) => {
                staged.transactions.insert(tx.id, tx);
            }
            StoreOp::DeleteCrop(id) => {
                staged.crops.remove(&id);
            }
            StoreOp::DeleteBatch(id) => {
                staged.batches.remove(&id);
            }
            StoreOp::DeleteTransaction(id) => {
                staged.transactions.remove(&id);
            }
            StoreOp::DecrementBatchQuantity { batch_id, quantity } => {
                let batch = staged
                    .batches
                    .get_mut(&batch_id)
                    .ok_or_else(|| StoreError::NotFound(format!("batch {batch_id}")))?;
                if batch.status != BatchStatus::Available {
                    return Err(StoreError::ConditionFailed(format!(
                        "batch {batch_id} is not available"
                    )));
                }
                if batch.quantity < quantity {
                    return Err(StoreError::ConditionFailed(format!(
                        "batch {batch_id} holds {} units, {quantity} requested",
                        batch.quantity
                    )));
                }
                batch.quantity -= quantity;
                if batch.quantity == 0 {
                    batch.status = BatchStatus::Purchased;
                }
            }
            StoreOp::RestockBatch { batch_id, quantity } => {
                let batch = staged
                    .batches
                    .get_mut(&batch_id)
                    .ok_or_else(|| StoreError::NotFound(format!("batch {batch_id}")))?;
                batch.quantity += quantity;
                if batch.status == BatchStatus::Purchased {
                    batch.status = BatchStatus::Available;
                }
                let crop_id = batch.crop_id;
                if let Some(crop) = staged.crops.get_mut(&crop_id) {
                    if crop.status == CropStatus::Sold {
                        crop.status = CropStatus::Listed;
                    }
                }
            }
            StoreOp::AdvanceCropIfExhausted(crop_id) => {
                let exhausted = {
                    let batches: Vec<_> = staged
                        .batches
                        .values()
                        .filter(|b| b.crop_id == crop_id)
                        .collect();
                    !batches.is_empty()
                        && batches.iter().all(|b| b.status == BatchStatus::Purchased)
                };
                let crop = staged
                    .crops
                    .get_mut(&crop_id)
                    .ok_or_else(|| StoreError::NotFound(format!("crop {crop_id}")))?;
                if exhausted && crop_transition_allowed(crop.status, CropStatus::Sold) {
                    crop.status = CropStatus::Sold;
                }
            }
        }
        Ok(())
    }
}

impl ChainStore for InMemoryChainStore {
    fn get_crop(&self, id: CropId) -> Result<Option<Crop>, StoreError> {
        Ok(self.lock()?.crops.get(&id).cloned())
    }

    fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, StoreError> {
        Ok(self.lock()?.batches.get(&id).cloned())
    }

    fn get_transaction(&self, id: TxId) -> Result<Option<SaleTransaction>, StoreError> {
        Ok(self.lock()?.transactions.get(&id).cloned())
    }

    fn batches_for_crop(&self, crop_id: CropId) -> Result<Vec<Batch>, StoreError> {
        let tables = self.lock()?;
        let mut batches: Vec<Batch> = tables
            .batches
            .values()
            .filter(|b| b.crop_id == crop_id)
            .cloned()
            .collect();
        batches.sort_by_key(|b| b.batch_number);
        Ok(batches)
    }

    fn batch_by_code(&self, code: &str) -> Result<Option<Batch>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .batches
            .values()
            .find(|b| b.code.as_str() == code)
            .cloned())
    }

    fn atomic_commit(&self, ops: Vec<StoreOp>) -> Result<(), StoreError> {
        let mut tables = self.lock()?;

        // Stage on a copy; swap in only if every op applied.
        let mut staged = tables.clone();
        let op_count = ops.len();
        for op in ops {
            Self::apply(&mut staged, op)?;
        }
        *tables = staged;

        debug!(ops = op_count, "Atomic commit applied");
        Ok(())
    }
}

/// In-memory profile directory for tests and embedding.
#[derive(Default)]
pub struct InMemoryProfileDirectory {
    profiles: RwLock<HashMap<ProfileId, Profile>>,
}

impl InMemoryProfileDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a profile.
    pub fn register(&self, profile: Profile) {
        if let Ok(mut profiles) = self.profiles.write() {
            profiles.insert(profile.id, profile);
        }
    }
}

impl ProfileDirectory for InMemoryProfileDirectory {
    fn resolve(&self, id: ProfileId) -> Result<Profile, DirectoryError> {
        let profiles = self
            .profiles
            .read()
            .map_err(|_| DirectoryError::LookupFailed("directory lock poisoned".into()))?;
        profiles
            .get(&id)
            .cloned()
            .ok_or(DirectoryError::UnknownProfile(id))
    }
}
