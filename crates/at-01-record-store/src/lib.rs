//! # Record Store (at-01)
//!
//! The Record Store is the durable, tamper-evident trail of AgriTrace.
//! Every lifecycle transition appends exactly one `ProvenanceRecord`;
//! records are never updated or deleted.
//!
//! ## Integrity Model
//!
//! Each record carries a SHA-256 digest of its canonically serialized
//! payload. Integrity is per record: there is no link to the previous
//! record's hash, so this is a local fingerprint, not a consensus chain.
//!
//! | ID | Invariant | Description |
//! |----|-----------|-------------|
//! | 1 | Append-Only | No update or delete surface exists on the port |
//! | 2 | Content Hash | `hash = SHA-256(canonical(data))` at append time |
//! | 3 | Fail Closed | `verify` returns false on any serialization error |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Pure domain logic (record entity, hashing, errors, config)
//! - `ports.rs` - Outbound ports (`LedgerStore`, `TimeSource`) and the
//!   in-memory adapters
//! - `service.rs` - The `RecordLedger` application service
//!
//! ## Usage
//!
//! ```ignore
//! use at_01_record_store::{InMemoryLedgerStore, RecordLedger, RecordType};
//!
//! let ledger = RecordLedger::new_in_memory();
//! let record = ledger.append(batch_id, None, RecordType::CropRegistration, &payload)?;
//! assert!(ledger.verify(&record));
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod domain;
pub mod ports;
pub mod service;

// Re-export key types for convenience
pub use domain::entities::{ProvenanceRecord, RecordHash, RecordId, RecordType};
pub use domain::errors::{LedgerError, LedgerStoreError};
pub use domain::hashing::{canonical_bytes, content_hash};
pub use domain::value_objects::LedgerConfig;
pub use ports::{InMemoryLedgerStore, LedgerStore, SystemTimeSource, TimeSource};
pub use service::RecordLedger;
