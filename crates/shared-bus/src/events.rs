//! # Lifecycle Events
//!
//! Defines the closed set of event types that flow through the bus, one
//! strongly-typed payload per lifecycle transition. Observers subscribe to
//! the union and narrow by tag or by entity id; there is no stringly-typed
//! dispatch.

use serde::{Deserialize, Serialize};
use shared_types::{Batch, BatchId, Crop, CropId, ProfileId, TxId};

/// A lifecycle notification: what happened, to what, and when.
///
/// Events live only for the process lifetime of the bus; the durable trail
/// is the Record Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Seconds since epoch at publish time.
    pub timestamp: u64,
    /// The transition this event describes.
    pub payload: EventPayload,
}

impl LifecycleEvent {
    /// The tag of this event, for subscription filtering.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// The crop this event concerns, if any.
    #[must_use]
    pub fn crop_id(&self) -> Option<CropId> {
        match &self.payload {
            EventPayload::ProductCreated { crop, .. } => Some(crop.id),
            EventPayload::BatchCreated { batch } => Some(batch.crop_id),
            EventPayload::BatchLocationUpdated { crop_id, .. }
            | EventPayload::BatchPurchased { crop_id, .. }
            | EventPayload::OwnershipTransferred { crop_id, .. } => Some(*crop_id),
        }
    }

    /// The batch this event concerns, if any.
    #[must_use]
    pub fn batch_id(&self) -> Option<BatchId> {
        match &self.payload {
            EventPayload::ProductCreated { batch, .. }
            | EventPayload::BatchCreated { batch } => Some(batch.id),
            EventPayload::BatchLocationUpdated { batch_id, .. }
            | EventPayload::BatchPurchased { batch_id, .. }
            | EventPayload::OwnershipTransferred { batch_id, .. } => Some(*batch_id),
        }
    }
}

/// All transitions that can be published to the bus.
///
/// One variant per lifecycle transition; each carries its own payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// A farmer registered a crop; its companion batch is already listed.
    ProductCreated { crop: Crop, batch: Batch },

    /// An additional batch was created for an existing crop.
    BatchCreated { batch: Batch },

    /// A distributor reported a transit checkpoint.
    BatchLocationUpdated {
        batch_id: BatchId,
        crop_id: CropId,
        distributor_id: ProfileId,
        location: String,
    },

    /// A buyer purchased part (or all) of a batch.
    BatchPurchased {
        batch_id: BatchId,
        crop_id: CropId,
        transaction_id: TxId,
        buyer_id: ProfileId,
        quantity: u64,
        total_price: u64,
        /// Units left in the batch after this purchase.
        remaining: u64,
        /// Whether this purchase exhausted every batch of the crop.
        crop_sold: bool,
    },

    /// Custody of a batch moved to a distributor.
    OwnershipTransferred {
        batch_id: BatchId,
        crop_id: CropId,
        from: ProfileId,
        to: ProfileId,
        route: Option<String>,
    },
}

impl EventPayload {
    /// Get the tag for this payload (for filtering).
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ProductCreated { .. } => EventKind::ProductCreated,
            Self::BatchCreated { .. } => EventKind::BatchCreated,
            Self::BatchLocationUpdated { .. } => EventKind::BatchLocationUpdated,
            Self::BatchPurchased { .. } => EventKind::BatchPurchased,
            Self::OwnershipTransferred { .. } => EventKind::OwnershipTransferred,
        }
    }
}

/// Event tags for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    ProductCreated,
    BatchCreated,
    BatchLocationUpdated,
    BatchPurchased,
    OwnershipTransferred,
}

/// Filter for subscribing to specific events.
///
/// All populated dimensions must match; empty/None dimensions accept
/// everything. Filters are pure predicates: they narrow what a handler
/// sees and never change delivery semantics.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Kinds to include. Empty means all kinds.
    pub kinds: Vec<EventKind>,
    /// Only events concerning this crop.
    pub crop_id: Option<CropId>,
    /// Only events concerning this batch.
    pub batch_id: Option<BatchId>,
}

impl EventFilter {
    /// A filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter for specific kinds.
    #[must_use]
    pub fn kinds(kinds: Vec<EventKind>) -> Self {
        Self {
            kinds,
            ..Self::default()
        }
    }

    /// A filter for a single kind.
    #[must_use]
    pub fn kind(kind: EventKind) -> Self {
        Self::kinds(vec![kind])
    }

    /// A filter for events concerning one crop (product).
    #[must_use]
    pub fn for_product(crop_id: CropId) -> Self {
        Self {
            crop_id: Some(crop_id),
            ..Self::default()
        }
    }

    /// A filter for events concerning one batch.
    #[must_use]
    pub fn for_batch(batch_id: BatchId) -> Self {
        Self {
            batch_id: Some(batch_id),
            ..Self::default()
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &LifecycleEvent) -> bool {
        let kind_match = self.kinds.is_empty() || self.kinds.contains(&event.kind());
        let crop_match = self
            .crop_id
            .map_or(true, |id| event.crop_id() == Some(id));
        let batch_match = self
            .batch_id
            .map_or(true, |id| event.batch_id() == Some(id));

        kind_match && crop_match && batch_match
    }
}
