//! # State Machines
//!
//! Transition guards for the two entity state machines:
//!
//! ```text
//! Crop:   Created -> Listed -> Sold
//! Batch:  Created -> Available -> InTransit -> Purchased
//! ```
//!
//! Distributor assignment deliberately bypasses the batch table: it sets
//! `InTransit` unconditionally so re-assignment is an idempotent overwrite
//! (see `LifecycleService::assign_distributor`).

use shared_types::{Batch, BatchStatus, Crop, CropStatus, LifecycleError};

/// Whether `from -> to` is a legal crop transition.
#[must_use]
pub fn crop_transition_allowed(from: CropStatus, to: CropStatus) -> bool {
    matches!(
        (from, to),
        (CropStatus::Created, CropStatus::Listed) | (CropStatus::Listed, CropStatus::Sold)
    )
}

/// Whether `from -> to` is a legal batch transition.
#[must_use]
pub fn batch_transition_allowed(from: BatchStatus, to: BatchStatus) -> bool {
    matches!(
        (from, to),
        (BatchStatus::Created, BatchStatus::Available)
            | (BatchStatus::Available, BatchStatus::InTransit)
            | (BatchStatus::Available, BatchStatus::Purchased)
    )
}

/// Advance a freshly created crop to `Listed`.
pub fn list_crop(crop: &mut Crop) -> Result<(), LifecycleError> {
    if !crop_transition_allowed(crop.status, CropStatus::Listed) {
        return Err(LifecycleError::ValidationFailed {
            reason: format!("crop {} cannot be listed from {:?}", crop.id, crop.status),
        });
    }
    crop.status = CropStatus::Listed;
    Ok(())
}

/// Advance a freshly created batch to `Available`.
pub fn list_batch(batch: &mut Batch) -> Result<(), LifecycleError> {
    if !batch_transition_allowed(batch.status, BatchStatus::Available) {
        return Err(LifecycleError::ValidationFailed {
            reason: format!(
                "batch {} cannot be listed from {:?}",
                batch.id, batch.status
            ),
        });
    }
    batch.status = BatchStatus::Available;
    Ok(())
}
