//! # Value Objects
//!
//! Immutable configuration for the Record Store.

/// Ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Maximum canonical payload size accepted by `append`, in bytes.
    pub max_payload_bytes: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            // Record payloads are transition summaries, not bulk data.
            max_payload_bytes: 64 * 1024,
        }
    }
}
