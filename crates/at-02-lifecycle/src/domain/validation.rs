//! # Input Validation
//!
//! Shape/range validation for registration input. Rejections happen before
//! any mutation, so a `ValidationFailed` has no partial effect.

use serde::{Deserialize, Serialize};
use shared_types::LifecycleError;

/// Caller-supplied crop registration input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropInput {
    pub name: String,
    pub quantity: u64,
    pub unit: String,
    pub price_per_unit: u64,
    pub location: String,
    pub harvest_date: String,
    #[serde(default)]
    pub certifications: Vec<String>,
}

impl CropInput {
    /// Validate shape and ranges.
    ///
    /// A zero-quantity crop would create a batch that is exhausted before
    /// its first sale, so at least one unit is required.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if self.name.trim().is_empty() {
            return Err(LifecycleError::ValidationFailed {
                reason: "crop name must not be empty".into(),
            });
        }
        if self.unit.trim().is_empty() {
            return Err(LifecycleError::ValidationFailed {
                reason: "unit must not be empty".into(),
            });
        }
        if self.quantity == 0 {
            return Err(LifecycleError::ValidationFailed {
                reason: "quantity must be at least 1".into(),
            });
        }
        Ok(())
    }
}
