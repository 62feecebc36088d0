//! # AgriTrace Test Suite
//!
//! Unified test crate for cross-crate behavior:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── flows.rs        # Full lifecycle choreography, trail + events
//!     └── concurrency.rs  # Concurrent purchases against one batch
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p at-tests
//!
//! # By category
//! cargo test -p at-tests integration::flows
//! cargo test -p at-tests integration::concurrency
//! ```

#![allow(dead_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod integration;
