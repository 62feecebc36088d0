//! # Record Entities
//!
//! The ledger record and its identifier/hash value types.

use serde::{Deserialize, Serialize};
use shared_types::{BatchId, TxId};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub Uuid);

impl RecordId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A 256-bit content hash over the canonically serialized payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordHash(pub [u8; 32]);

impl RecordHash {
    /// Lowercase hex rendering of the digest.
    #[must_use]
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in self.0 {
            use fmt::Write;
            // Writing to a String cannot fail.
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

impl fmt::Display for RecordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// The kind of transition a record documents.
///
/// The set is extensible: adding a variant is a schema-compatible change
/// because records store the snake_case tag, not an ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    /// A farmer registered a crop (companion batch included).
    CropRegistration,
    /// An additional batch was created for an existing crop.
    BatchCreated,
    /// A distributor took custody of a batch.
    AssignedDistributor,
    /// A purchase completed.
    Transaction,
    /// A location checkpoint reported during transit.
    TransitCheckpoint,
}

impl RecordType {
    /// The stored snake_case tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CropRegistration => "crop_registration",
            Self::BatchCreated => "batch_created",
            Self::AssignedDistributor => "assigned_distributor",
            Self::Transaction => "transaction",
            Self::TransitCheckpoint => "transit_checkpoint",
        }
    }
}

/// One tamper-evident ledger entry. Append-only: never updated, never
/// deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub id: RecordId,
    /// The batch whose lifecycle this record documents.
    pub batch_id: BatchId,
    /// The sale transaction, for purchase records.
    pub transaction_id: Option<TxId>,
    pub record_type: RecordType,
    /// Opaque structured payload; the hash covers exactly this value.
    pub data: serde_json::Value,
    /// SHA-256 over the canonical serialization of `data`.
    pub hash: RecordHash,
    /// Set at append time after the hash was computed from `data`.
    pub verified: bool,
    /// Seconds since epoch.
    pub created_at: u64,
}
