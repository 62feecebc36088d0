//! # Core Domain Entities
//!
//! Defines the supply-chain entities tracked by AgriTrace.
//!
//! ## Clusters
//!
//! - **Produce**: `Crop`, `CropStatus`
//! - **Logistics & Sale**: `Batch`, `BatchStatus`, `BatchCode`, `SaleTransaction`
//! - **Identity**: `Profile`, `Role`
//!
//! Status fields advance only through the Lifecycle Controller; the types
//! here carry no transition logic beyond terminal-state queries.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique identifier of a crop lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CropId(pub Uuid);

/// Unique identifier of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(pub Uuid);

/// Unique identifier of a sale transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub Uuid);

/// Unique identifier of a user profile (farmer, distributor, buyer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileId(pub Uuid);

macro_rules! impl_id {
    ($name:ident) => {
        impl $name {
            /// Generate a fresh random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

impl_id!(CropId);
impl_id!(BatchId);
impl_id!(TxId);
impl_id!(ProfileId);

// =============================================================================
// CLUSTER A: PRODUCE
// =============================================================================

/// Lifecycle states of a crop lot.
///
/// ```text
/// Created -> Listed -> Sold
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropStatus {
    /// Registered but not yet listed for sale.
    Created,
    /// Listed; batches of this crop can be sold.
    Listed,
    /// Every batch of this crop has been purchased. Terminal.
    Sold,
}

impl CropStatus {
    /// A sold crop is immutable.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sold)
    }
}

/// A registered crop lot owned by a farmer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crop {
    pub id: CropId,
    pub farmer_id: ProfileId,
    /// Human-readable produce name (e.g., "Arabica coffee").
    pub name: String,
    /// Total registered quantity, in `unit`.
    pub quantity: u64,
    /// Measurement unit (e.g., "kg").
    pub unit: String,
    /// Asking price per unit, in minor currency units.
    pub price_per_unit: u64,
    pub status: CropStatus,
    /// Free-form origin location.
    pub location: String,
    /// Harvest date label as provided at registration (e.g., "2026-08-01").
    pub harvest_date: String,
    /// Certification labels (organic, fair-trade, ...).
    pub certifications: Vec<String>,
}

// =============================================================================
// CLUSTER B: LOGISTICS & SALE
// =============================================================================

/// Lifecycle states of a batch.
///
/// ```text
/// Created -> Available -> InTransit -> Purchased
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Created but not yet listed.
    Created,
    /// Listed for sale; purchases are accepted.
    Available,
    /// A distributor holds custody of the batch.
    InTransit,
    /// Fully purchased; quantity is zero. Terminal.
    Purchased,
}

impl BatchStatus {
    /// A fully purchased batch is immutable.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Purchased)
    }
}

/// The externally resolvable code of a batch.
///
/// Starts as a placeholder at creation and is finalized once the batch id is
/// known: the final form embeds the batch id plus a random nonce so codes are
/// unique and not guessable. The format is opaque to consumers; the only
/// contract is uniqueness and resolvability via the Query Facade.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchCode(String);

impl BatchCode {
    /// Sentinel used between batch creation and code finalization.
    pub const PLACEHOLDER: &'static str = "pending";

    /// The placeholder code assigned at batch creation.
    #[must_use]
    pub fn placeholder() -> Self {
        Self(Self::PLACEHOLDER.to_string())
    }

    /// Wrap an already finalized code string.
    #[must_use]
    pub fn finalized(code: String) -> Self {
        Self(code)
    }

    /// Whether this code is still the creation placeholder.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.0 == Self::PLACEHOLDER
    }

    /// The code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A sellable quantity slice of a crop, tracked independently for
/// logistics and sale. Many batches may reference one crop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub crop_id: CropId,
    /// Sequential number of this batch within its crop (1-based).
    pub batch_number: u32,
    /// Externally resolvable code; placeholder until finalized.
    pub code: BatchCode,
    /// Remaining quantity available for purchase. Never negative.
    pub quantity: u64,
    pub unit: String,
    pub price_per_unit: u64,
    pub status: BatchStatus,
    /// Assigned distributor, if any.
    pub distributor_id: Option<ProfileId>,
    /// Current route description while in transit.
    pub route: Option<String>,
    /// Vehicle code of the carrier while in transit.
    pub vehicle_code: Option<String>,
}

/// Status of a sale transaction.
///
/// Transactions are written only after all business checks pass, so the
/// only persisted state is `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Completed,
}

/// A completed purchase of part (or all) of a batch. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleTransaction {
    pub id: TxId,
    pub batch_id: BatchId,
    pub buyer_id: ProfileId,
    pub seller_id: ProfileId,
    /// Units purchased in this transaction.
    pub quantity: u64,
    /// `quantity * batch.price_per_unit` at the instant of purchase.
    pub total_price: u64,
    pub status: TxStatus,
}

// =============================================================================
// CLUSTER C: IDENTITY
// =============================================================================

/// Capability roles resolved by the external profile directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Farmer,
    Distributor,
    Buyer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Farmer => "farmer",
            Self::Distributor => "distributor",
            Self::Buyer => "buyer",
        };
        f.write_str(s)
    }
}

/// A resolved user profile. Read-only from the controller's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub role: Role,
    pub display_name: String,
}
