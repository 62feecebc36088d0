//! # Domain Layer
//!
//! Pure domain logic for the Record Store: the record entity, canonical
//! hashing, errors, and configuration values. No I/O here.

pub mod entities;
pub mod errors;
pub mod hashing;
pub mod value_objects;
