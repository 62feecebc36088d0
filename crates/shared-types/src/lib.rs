//! # Shared Types Crate
//!
//! This crate contains the domain entities and error taxonomy shared by the
//! AgriTrace subsystems.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: all cross-subsystem types are defined here.
//! - **Typed identifiers**: every entity id is a UUID newtype; ids of
//!   different entities never mix.
//! - **No hidden state**: entities are plain data; status transitions are
//!   enforced by the Lifecycle Controller, not by the types themselves.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
