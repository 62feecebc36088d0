//! # Domain Layer
//!
//! Pure lifecycle logic: state machine guards, input validation, and batch
//! code finalization. No I/O here.

pub mod codes;
pub mod state;
pub mod validation;
