//! # Lifecycle Controller (at-02)
//!
//! Enforces the Crop/Batch status state machine and orchestrates every
//! multi-entity transition: crop registration, batch creation, distributor
//! assignment, transit checkpoints, and purchases.
//!
//! ## Transition Protocol
//!
//! ```text
//! caller ──→ validate ──→ role check ──→ atomic entity commit
//!                                              │
//!                                   ledger append (bounded retries)
//!                                              │
//!                            ┌── failure: compensating rollback ──→ error
//!                            │
//!                     publish one LifecycleEvent ──→ observers
//! ```
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Description |
//! |----|-----------|-------------|
//! | 1 | Quantity Conservation | Purchases never exceed the initial batch quantity |
//! | 2 | Exhaustion | `Purchased` iff remaining quantity is zero |
//! | 3 | Crop Closure | Crop is `Sold` iff every batch of it is `Purchased` |
//! | 4 | Single Trail | One operation = one ledger record = one event |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - State machine guards, input validation, batch codes
//! - `ports.rs` - `ChainStore` / `ProfileDirectory` ports and in-memory adapters
//! - `service.rs` - The `LifecycleService` application service
//! - `context.rs` - `TraceContext`: explicit start/stop wiring for a process

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod context;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export key types for convenience
pub use context::TraceContext;
pub use domain::codes::finalize_batch_code;
pub use domain::validation::CropInput;
pub use ports::{
    ChainStore, InMemoryChainStore, InMemoryProfileDirectory, ProfileDirectory, StoreOp,
};
pub use service::{LifecycleService, MAX_APPEND_RETRIES};
