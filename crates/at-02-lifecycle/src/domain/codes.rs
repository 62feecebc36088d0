//! # Batch Codes
//!
//! Finalization of the externally resolvable batch code.
//!
//! The code cannot be produced before insertion because it must embed the
//! batch id; a random nonce is added so codes cannot be enumerated by
//! guessing ids.

use rand::Rng;
use shared_types::{BatchCode, BatchId};

/// URI scheme of finalized batch codes.
pub const CODE_SCHEME: &str = "agritrace";

/// Finalize the code for a batch whose id is now known.
#[must_use]
pub fn finalize_batch_code(batch_id: BatchId) -> BatchCode {
    let nonce: u64 = rand::thread_rng().gen();
    BatchCode::finalized(format!("{CODE_SCHEME}://batch/{batch_id}?n={nonce:016x}"))
}
