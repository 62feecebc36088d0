//! # Shared Bus - Lifecycle Event Notification
//!
//! In-process typed publish/subscribe for lifecycle transitions.
//!
//! ## Delivery Model
//!
//! ```text
//! ┌─────────────────────┐                   ┌──────────────┐
//! │ Lifecycle Controller│                   │  Observer A  │
//! │   (after commit)    │    publish()      └──────────────┘
//! │                     │ ──────┐                  ↑
//! └─────────────────────┘       ▼                  │ handler called
//!                         ┌──────────────┐         │ synchronously
//!                         │ LifecycleBus │ ────────┤
//!                         │  + history   │         │
//!                         └──────────────┘         ↓
//!                            on() / on_any() ┌──────────────┐
//!                                            │  Observer B  │
//!                                            └──────────────┘
//! ```
//!
//! - Delivery is synchronous on the publishing thread, in subscription
//!   order; a handler fault is isolated and logged, never propagated.
//! - A bounded FIFO history retains the last events for late readers;
//!   late subscribers get no replay through their handler.
//! - Only the Record Store is durable. A process restart loses the bus
//!   history and all subscriptions.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bus;
pub mod events;

// Re-export main types
pub use bus::{HandlerError, LifecycleBus, SubscriptionGuard};
pub use events::{EventFilter, EventKind, EventPayload, LifecycleEvent};

/// Default number of events retained in the replay history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 256;
