//! # Lifecycle Service
//!
//! The application service implementing every lifecycle operation.
//!
//! ## Transition Protocol
//!
//! Each operation is one unit of work:
//!
//! 1. Validate input and resolve the caller's role (no mutation on failure).
//! 2. Commit all entity updates in ONE `ChainStore::atomic_commit`.
//! 3. Append the ledger record (bounded retries on storage failure).
//! 4. If the append fails, run the compensating commit to roll the entity
//!    mutation back; if compensation also fails, report the batch for
//!    operator reconciliation and surface `InconsistentLedger`.
//! 5. Publish exactly one `LifecycleEvent`.
//!
//! The record append is never reordered ahead of the mutation it documents.

use crate::domain::codes::finalize_batch_code;
use crate::domain::state;
use crate::domain::validation::CropInput;
use crate::ports::{ChainStore, ProfileDirectory, StoreOp};
use at_01_record_store::{
    LedgerError, LedgerStore, ProvenanceRecord, RecordLedger, RecordType, TimeSource,
};
use serde_json::json;
use shared_bus::{EventPayload, LifecycleBus, LifecycleEvent};
use shared_types::{
    Batch, BatchCode, BatchId, BatchStatus, Crop, CropId, CropStatus, DirectoryError,
    LifecycleError, Profile, ProfileId, Role, SaleTransaction, StoreError, TxId, TxStatus,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// How many times a failed ledger append is retried before the entity
/// mutation is compensated and the operation fails.
pub const MAX_APPEND_RETRIES: u32 = 3;

/// The Lifecycle Controller service.
///
/// Generic over its persistence, directory, ledger, and time ports.
pub struct LifecycleService<S, P, L, C>
where
    S: ChainStore,
    P: ProfileDirectory,
    L: LedgerStore,
    C: TimeSource,
{
    /// Entity persistence (crops, batches, transactions).
    store: Arc<S>,
    /// External identity/profile directory (read-only).
    directory: Arc<P>,
    /// The provenance ledger; shared with the Query Facade.
    ledger: Arc<RecordLedger<L, C>>,
    /// Event bus; publish happens after the record append.
    bus: Arc<LifecycleBus>,
}

impl<S, P, L, C> LifecycleService<S, P, L, C>
where
    S: ChainStore,
    P: ProfileDirectory,
    L: LedgerStore,
    C: TimeSource,
{
    /// Create a service over explicit ports.
    pub fn new(
        store: Arc<S>,
        directory: Arc<P>,
        ledger: Arc<RecordLedger<L, C>>,
        bus: Arc<LifecycleBus>,
    ) -> Self {
        Self {
            store,
            directory,
            ledger,
            bus,
        }
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Register a crop lot and its companion batch.
    ///
    /// The crop is created and listed; the batch is created, immediately
    /// listed for sale (`Available`), and its code finalized from the
    /// assigned id plus a random nonce. Appends one `crop_registration`
    /// record and publishes `ProductCreated`.
    ///
    /// Any failure after work began rolls back all prior steps of this call
    /// and surfaces `RegistrationFailed` with the underlying cause.
    pub fn register_crop(
        &self,
        farmer_id: ProfileId,
        input: CropInput,
    ) -> Result<(Crop, Batch, ProvenanceRecord), LifecycleError> {
        input.validate()?;
        let farmer = self.require_role(farmer_id, Role::Farmer)?;

        let mut crop = Crop {
            id: CropId::new(),
            farmer_id,
            name: input.name,
            quantity: input.quantity,
            unit: input.unit,
            price_per_unit: input.price_per_unit,
            status: CropStatus::Created,
            location: input.location,
            harvest_date: input.harvest_date,
            certifications: input.certifications,
        };
        state::list_crop(&mut crop)?;

        let mut batch = Batch {
            id: BatchId::new(),
            crop_id: crop.id,
            batch_number: 1,
            code: BatchCode::placeholder(),
            quantity: crop.quantity,
            unit: crop.unit.clone(),
            price_per_unit: crop.price_per_unit,
            status: BatchStatus::Created,
            distributor_id: None,
            route: None,
            vehicle_code: None,
        };
        state::list_batch(&mut batch)?;
        // The code embeds the batch id, so it can only exist after the id.
        batch.code = finalize_batch_code(batch.id);

        self.store
            .atomic_commit(vec![
                StoreOp::PutCrop(crop.clone()),
                StoreOp::PutBatch(batch.clone()),
            ])
            .map_err(|e| LifecycleError::RegistrationFailed {
                cause: e.to_string(),
            })?;

        let payload = json!({
            "crop_id": crop.id,
            "farmer_id": farmer_id,
            "name": crop.name,
            "quantity": crop.quantity,
            "unit": crop.unit,
            "price_per_unit": crop.price_per_unit,
            "location": crop.location,
            "harvest_date": crop.harvest_date,
            "certifications": crop.certifications,
            "batch_id": batch.id,
            "batch_code": batch.code.as_str(),
        });

        let record = match self.append_with_retries(
            batch.id,
            None,
            RecordType::CropRegistration,
            &payload,
        ) {
            Ok(record) => record,
            Err(append_err) => {
                if let Err(rollback_err) = self.store.atomic_commit(vec![
                    StoreOp::DeleteBatch(batch.id),
                    StoreOp::DeleteCrop(crop.id),
                ]) {
                    error!(
                        batch = %batch.id,
                        error = %rollback_err,
                        "Registration rollback failed; reconciliation required"
                    );
                    return Err(LifecycleError::InconsistentLedger {
                        batch_id: batch.id,
                        cause: format!("{append_err}; rollback: {rollback_err}"),
                    });
                }
                return Err(LifecycleError::RegistrationFailed {
                    cause: append_err.to_string(),
                });
            }
        };

        self.publish(EventPayload::ProductCreated {
            crop: crop.clone(),
            batch: batch.clone(),
        });
        info!(
            crop = %crop.id,
            batch = %batch.id,
            farmer = %farmer.id,
            quantity = crop.quantity,
            "Crop registered and listed"
        );

        Ok((crop, batch, record))
    }

    /// Create an additional batch for an existing crop.
    ///
    /// Appends one `batch_created` record and publishes `BatchCreated`.
    pub fn add_batch(
        &self,
        farmer_id: ProfileId,
        crop_id: CropId,
        quantity: u64,
        price_per_unit: u64,
    ) -> Result<(Batch, ProvenanceRecord), LifecycleError> {
        if quantity == 0 {
            return Err(LifecycleError::ValidationFailed {
                reason: "batch quantity must be at least 1".into(),
            });
        }
        self.require_role(farmer_id, Role::Farmer)?;

        let crop = self
            .get_crop(crop_id)?
            .ok_or(LifecycleError::CropNotFound(crop_id))?;
        if crop.farmer_id != farmer_id {
            return Err(LifecycleError::ValidationFailed {
                reason: format!("crop {crop_id} does not belong to farmer {farmer_id}"),
            });
        }
        if crop.status.is_terminal() {
            return Err(LifecycleError::ValidationFailed {
                reason: format!("crop {crop_id} is sold; no further batches"),
            });
        }

        let siblings = self
            .store
            .batches_for_crop(crop_id)
            .map_err(|e| LifecycleError::StorageFailure(e.to_string()))?;
        let batch_number = u32::try_from(siblings.len()).unwrap_or(u32::MAX - 1) + 1;

        let mut batch = Batch {
            id: BatchId::new(),
            crop_id,
            batch_number,
            code: BatchCode::placeholder(),
            quantity,
            unit: crop.unit.clone(),
            price_per_unit,
            status: BatchStatus::Created,
            distributor_id: None,
            route: None,
            vehicle_code: None,
        };
        state::list_batch(&mut batch)?;
        batch.code = finalize_batch_code(batch.id);

        self.store
            .atomic_commit(vec![StoreOp::PutBatch(batch.clone())])
            .map_err(|e| LifecycleError::StorageFailure(e.to_string()))?;

        let payload = json!({
            "batch_id": batch.id,
            "crop_id": crop_id,
            "batch_number": batch_number,
            "quantity": quantity,
            "unit": batch.unit,
            "price_per_unit": price_per_unit,
            "batch_code": batch.code.as_str(),
        });

        let record =
            match self.append_with_retries(batch.id, None, RecordType::BatchCreated, &payload) {
                Ok(record) => record,
                Err(append_err) => {
                    return Err(self.rollback_or_reconcile(
                        batch.id,
                        vec![StoreOp::DeleteBatch(batch.id)],
                        append_err,
                    ));
                }
            };

        self.publish(EventPayload::BatchCreated {
            batch: batch.clone(),
        });
        info!(batch = %batch.id, crop = %crop_id, number = batch_number, "Batch created");

        Ok((batch, record))
    }

    /// Assign (or re-assign) a distributor to a batch.
    ///
    /// Sets the batch to `InTransit` unconditionally: re-assignment
    /// overwrites route and vehicle, and the status transition is a no-op
    /// if the batch is already in transit. The mutation commits before the
    /// `assigned_distributor` record is appended; if the append fails the
    /// status change is rolled back. Publishes `OwnershipTransferred`.
    pub fn assign_distributor(
        &self,
        batch_id: BatchId,
        distributor_id: ProfileId,
        route: Option<String>,
        vehicle_code: Option<String>,
    ) -> Result<ProvenanceRecord, LifecycleError> {
        let distributor = self.require_role(distributor_id, Role::Distributor)?;

        let prior = self
            .get_batch(batch_id)?
            .ok_or(LifecycleError::BatchNotFound(batch_id))?;
        let crop = self
            .get_crop(prior.crop_id)?
            .ok_or(LifecycleError::CropNotFound(prior.crop_id))?;

        let mut updated = prior.clone();
        updated.distributor_id = Some(distributor_id);
        updated.route = route.clone();
        updated.vehicle_code = vehicle_code.clone();
        updated.status = BatchStatus::InTransit;

        self.store
            .atomic_commit(vec![StoreOp::PutBatch(updated)])
            .map_err(|e| LifecycleError::StorageFailure(e.to_string()))?;

        let payload = json!({
            "batch_id": batch_id,
            "distributor_id": distributor_id,
            "distributor": distributor.display_name,
            "route": route,
            "vehicle_code": vehicle_code,
            "previous_status": prior.status,
        });

        let record = match self.append_with_retries(
            batch_id,
            None,
            RecordType::AssignedDistributor,
            &payload,
        ) {
            Ok(record) => record,
            Err(append_err) => {
                return Err(self.rollback_or_reconcile(
                    batch_id,
                    vec![StoreOp::PutBatch(prior)],
                    append_err,
                ));
            }
        };

        // Custody moves from the previous holder (or the farmer) to the
        // newly assigned distributor.
        let from = prior.distributor_id.unwrap_or(crop.farmer_id);
        self.publish(EventPayload::OwnershipTransferred {
            batch_id,
            crop_id: crop.id,
            from,
            to: distributor_id,
            route,
        });
        info!(batch = %batch_id, distributor = %distributor_id, "Distributor assigned");

        Ok(record)
    }

    /// Report a location checkpoint for a batch in transit.
    ///
    /// Appends one `transit_checkpoint` record and publishes
    /// `BatchLocationUpdated`.
    pub fn record_transit_checkpoint(
        &self,
        distributor_id: ProfileId,
        batch_id: BatchId,
        location: String,
    ) -> Result<ProvenanceRecord, LifecycleError> {
        self.require_role(distributor_id, Role::Distributor)?;

        let prior = self
            .get_batch(batch_id)?
            .ok_or(LifecycleError::BatchNotFound(batch_id))?;
        if prior.status != BatchStatus::InTransit {
            return Err(LifecycleError::BatchUnavailable {
                batch_id,
                status: format!("{:?}", prior.status),
            });
        }
        if prior.distributor_id != Some(distributor_id) {
            return Err(LifecycleError::ValidationFailed {
                reason: format!("batch {batch_id} is assigned to a different distributor"),
            });
        }

        let mut updated = prior.clone();
        updated.route = Some(location.clone());

        self.store
            .atomic_commit(vec![StoreOp::PutBatch(updated)])
            .map_err(|e| LifecycleError::StorageFailure(e.to_string()))?;

        let payload = json!({
            "batch_id": batch_id,
            "distributor_id": distributor_id,
            "location": location,
            "timestamp": self.ledger.now(),
        });

        let record = match self.append_with_retries(
            batch_id,
            None,
            RecordType::TransitCheckpoint,
            &payload,
        ) {
            Ok(record) => record,
            Err(append_err) => {
                return Err(self.rollback_or_reconcile(
                    batch_id,
                    vec![StoreOp::PutBatch(prior)],
                    append_err,
                ));
            }
        };

        self.publish(EventPayload::BatchLocationUpdated {
            batch_id,
            crop_id: prior.crop_id,
            distributor_id,
            location,
        });

        Ok(record)
    }

    /// Purchase `quantity` units of a batch.
    ///
    /// The transaction row, the conditional quantity decrement, and the
    /// crop closure check commit atomically; the conditional decrement is
    /// the serialization point for concurrent purchases, so a losing
    /// purchase fails cleanly instead of corrupting the quantity. Appends
    /// one `transaction` record and publishes `BatchPurchased`.
    pub fn purchase_batch(
        &self,
        buyer_id: ProfileId,
        batch_id: BatchId,
        quantity: u64,
    ) -> Result<(SaleTransaction, ProvenanceRecord), LifecycleError> {
        if quantity == 0 {
            return Err(LifecycleError::ValidationFailed {
                reason: "purchase quantity must be at least 1".into(),
            });
        }
        self.require_role(buyer_id, Role::Buyer)?;

        let prior = self
            .get_batch(batch_id)?
            .ok_or(LifecycleError::BatchNotFound(batch_id))?;
        if prior.status != BatchStatus::Available {
            return Err(LifecycleError::BatchUnavailable {
                batch_id,
                status: format!("{:?}", prior.status),
            });
        }
        if quantity > prior.quantity {
            return Err(LifecycleError::QuantityExceedsAvailable {
                batch_id,
                requested: quantity,
                available: prior.quantity,
            });
        }
        let crop = self
            .get_crop(prior.crop_id)?
            .ok_or(LifecycleError::CropNotFound(prior.crop_id))?;

        let total_price = quantity.checked_mul(prior.price_per_unit).ok_or_else(|| {
            LifecycleError::ValidationFailed {
                reason: "total price overflows".into(),
            }
        })?;
        let tx = SaleTransaction {
            id: TxId::new(),
            batch_id,
            buyer_id,
            seller_id: crop.farmer_id,
            quantity,
            total_price,
            status: TxStatus::Completed,
        };

        match self.store.atomic_commit(vec![
            StoreOp::PutTransaction(tx.clone()),
            StoreOp::DecrementBatchQuantity { batch_id, quantity },
            StoreOp::AdvanceCropIfExhausted(crop.id),
        ]) {
            Ok(()) => {}
            Err(StoreError::ConditionFailed(_)) => {
                // A concurrent purchase won the decrement; re-read and
                // surface the business rejection it implies.
                let current = self
                    .get_batch(batch_id)?
                    .ok_or(LifecycleError::BatchNotFound(batch_id))?;
                return Err(if current.status != BatchStatus::Available {
                    LifecycleError::BatchUnavailable {
                        batch_id,
                        status: format!("{:?}", current.status),
                    }
                } else {
                    LifecycleError::QuantityExceedsAvailable {
                        batch_id,
                        requested: quantity,
                        available: current.quantity,
                    }
                });
            }
            Err(e) => return Err(LifecycleError::StorageFailure(e.to_string())),
        }

        // The remaining quantity and crop closure come from a re-read: the
        // committed decrement may have raced other purchases, so the values
        // in hand are stale. A failed re-read undoes the purchase so the
        // commit never outlives its ledger record.
        let post_commit = self.get_batch(batch_id).and_then(|b| {
            let updated = b.ok_or(LifecycleError::BatchNotFound(batch_id))?;
            let crop_after = self
                .get_crop(crop.id)?
                .ok_or(LifecycleError::CropNotFound(crop.id))?;
            Ok((updated, crop_after))
        });
        let (updated, crop_after) = match post_commit {
            Ok(pair) => pair,
            Err(read_err) => {
                return Err(self.rollback_or_reconcile(
                    batch_id,
                    vec![
                        StoreOp::DeleteTransaction(tx.id),
                        StoreOp::RestockBatch { batch_id, quantity },
                    ],
                    read_err,
                ));
            }
        };

        let payload = json!({
            "transaction_id": tx.id,
            "buyer": buyer_id,
            "seller": crop.farmer_id,
            "batch_id": batch_id,
            "quantity": quantity,
            "price": total_price,
            "timestamp": self.ledger.now(),
        });

        let record = match self.append_with_retries(
            batch_id,
            Some(tx.id),
            RecordType::Transaction,
            &payload,
        ) {
            Ok(record) => record,
            Err(append_err) => {
                let compensation = vec![
                    StoreOp::DeleteTransaction(tx.id),
                    StoreOp::RestockBatch { batch_id, quantity },
                ];
                if let Err(comp_err) = self.store.atomic_commit(compensation) {
                    error!(
                        batch = %batch_id,
                        transaction = %tx.id,
                        error = %comp_err,
                        "Purchase compensation failed; reconciliation required"
                    );
                    return Err(LifecycleError::InconsistentLedger {
                        batch_id,
                        cause: format!("{append_err}; compensation: {comp_err}"),
                    });
                }
                return Err(append_err);
            }
        };

        self.publish(EventPayload::BatchPurchased {
            batch_id,
            crop_id: crop.id,
            transaction_id: tx.id,
            buyer_id,
            quantity,
            total_price,
            remaining: updated.quantity,
            crop_sold: crop_after.status == CropStatus::Sold,
        });
        info!(
            batch = %batch_id,
            transaction = %tx.id,
            buyer = %buyer_id,
            quantity,
            remaining = updated.quantity,
            "Batch purchased"
        );

        Ok((tx, record))
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    /// Resolve a profile and require a role.
    ///
    /// Unknown profiles map to `UnauthorizedRole` (the caller holds no
    /// capability at all); directory outages map to `StorageFailure`.
    fn require_role(&self, id: ProfileId, required: Role) -> Result<Profile, LifecycleError> {
        let profile = match self.directory.resolve(id) {
            Ok(profile) => profile,
            Err(DirectoryError::UnknownProfile(_)) => {
                return Err(LifecycleError::UnauthorizedRole {
                    profile_id: id,
                    required,
                })
            }
            Err(e) => return Err(LifecycleError::StorageFailure(e.to_string())),
        };
        if profile.role != required {
            return Err(LifecycleError::UnauthorizedRole {
                profile_id: id,
                required,
            });
        }
        Ok(profile)
    }

    /// Append a record, retrying storage failures a bounded number of
    /// times. Payload errors abort immediately (caller programming error).
    fn append_with_retries(
        &self,
        batch_id: BatchId,
        transaction_id: Option<TxId>,
        record_type: RecordType,
        payload: &serde_json::Value,
    ) -> Result<ProvenanceRecord, LifecycleError> {
        let mut last_cause = String::new();
        for attempt in 1..=MAX_APPEND_RETRIES {
            match self
                .ledger
                .append(batch_id, transaction_id, record_type, payload)
            {
                Ok(record) => return Ok(record),
                Err(LedgerError::InvalidRecordPayload(msg)) => {
                    return Err(LifecycleError::ValidationFailed { reason: msg })
                }
                Err(LedgerError::StorageFailure(msg)) => {
                    warn!(
                        batch = %batch_id,
                        record_type = record_type.as_str(),
                        attempt,
                        error = %msg,
                        "Ledger append attempt failed"
                    );
                    last_cause = msg;
                }
            }
        }
        Err(LifecycleError::LedgerAppendFailed {
            attempts: MAX_APPEND_RETRIES,
            cause: last_cause,
        })
    }

    /// Run a compensating commit after a failed append; escalate to
    /// `InconsistentLedger` if the compensation itself fails.
    fn rollback_or_reconcile(
        &self,
        batch_id: BatchId,
        compensation: Vec<StoreOp>,
        append_err: LifecycleError,
    ) -> LifecycleError {
        if let Err(rollback_err) = self.store.atomic_commit(compensation) {
            error!(
                batch = %batch_id,
                error = %rollback_err,
                "Rollback after failed ledger append failed; reconciliation required"
            );
            return LifecycleError::InconsistentLedger {
                batch_id,
                cause: format!("{append_err}; rollback: {rollback_err}"),
            };
        }
        append_err
    }

    fn get_crop(&self, id: CropId) -> Result<Option<Crop>, LifecycleError> {
        self.store
            .get_crop(id)
            .map_err(|e| LifecycleError::StorageFailure(e.to_string()))
    }

    fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, LifecycleError> {
        self.store
            .get_batch(id)
            .map_err(|e| LifecycleError::StorageFailure(e.to_string()))
    }

    fn publish(&self, payload: EventPayload) {
        self.bus.publish(LifecycleEvent {
            timestamp: self.ledger.now(),
            payload,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{InMemoryChainStore, InMemoryProfileDirectory};
    use at_01_record_store::{
        InMemoryLedgerStore, LedgerConfig, LedgerStoreError, RecordId, SystemTimeSource,
    };
    use shared_bus::EventKind;
    use std::sync::atomic::{AtomicBool, Ordering};

    type MemoryService =
        LifecycleService<InMemoryChainStore, InMemoryProfileDirectory, InMemoryLedgerStore, SystemTimeSource>;

    struct Harness {
        store: Arc<InMemoryChainStore>,
        directory: Arc<InMemoryProfileDirectory>,
        ledger: Arc<RecordLedger<InMemoryLedgerStore, SystemTimeSource>>,
        bus: Arc<LifecycleBus>,
        service: MemoryService,
        farmer: ProfileId,
        distributor: ProfileId,
        buyer: ProfileId,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryChainStore::new());
        let directory = Arc::new(InMemoryProfileDirectory::new());
        let ledger = Arc::new(RecordLedger::new_in_memory());
        let bus = Arc::new(LifecycleBus::new());

        let farmer = ProfileId::new();
        let distributor = ProfileId::new();
        let buyer = ProfileId::new();
        directory.register(Profile {
            id: farmer,
            role: Role::Farmer,
            display_name: "Ana".into(),
        });
        directory.register(Profile {
            id: distributor,
            role: Role::Distributor,
            display_name: "Haulage Co".into(),
        });
        directory.register(Profile {
            id: buyer,
            role: Role::Buyer,
            display_name: "Mill Ltd".into(),
        });

        let service = LifecycleService::new(
            Arc::clone(&store),
            Arc::clone(&directory),
            Arc::clone(&ledger),
            Arc::clone(&bus),
        );

        Harness {
            store,
            directory,
            ledger,
            bus,
            service,
            farmer,
            distributor,
            buyer,
        }
    }

    fn crop_input(quantity: u64, price_per_unit: u64) -> CropInput {
        CropInput {
            name: "Arabica coffee".into(),
            quantity,
            unit: "kg".into(),
            price_per_unit,
            location: "Aceh".into(),
            harvest_date: "2026-08-01".into(),
            certifications: vec!["organic".into()],
        }
    }

    /// Ledger store whose backend is permanently down; used to exercise the
    /// append-failure paths.
    struct FailingLedgerStore;

    impl LedgerStore for FailingLedgerStore {
        fn insert(&self, _record: ProvenanceRecord) -> Result<(), LedgerStoreError> {
            Err(LedgerStoreError::Io("ledger backend offline".into()))
        }
        fn get(&self, _id: RecordId) -> Result<Option<ProvenanceRecord>, LedgerStoreError> {
            Ok(None)
        }
        fn for_batch(&self, _batch_id: BatchId) -> Result<Vec<ProvenanceRecord>, LedgerStoreError> {
            Ok(Vec::new())
        }
        fn for_transaction(&self, _tx_id: TxId) -> Result<Vec<ProvenanceRecord>, LedgerStoreError> {
            Ok(Vec::new())
        }
    }

    /// Chain store whose reads start failing right after a purchase
    /// decrement commits; used to exercise the post-commit read path.
    struct FlakyReadStore {
        inner: InMemoryChainStore,
        fail_reads: AtomicBool,
    }

    impl FlakyReadStore {
        fn new() -> Self {
            Self {
                inner: InMemoryChainStore::new(),
                fail_reads: AtomicBool::new(false),
            }
        }

        fn gate(&self) -> Result<(), StoreError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(StoreError::Io("connection dropped".into()));
            }
            Ok(())
        }
    }

    impl ChainStore for FlakyReadStore {
        fn get_crop(&self, id: CropId) -> Result<Option<Crop>, StoreError> {
            self.gate()?;
            self.inner.get_crop(id)
        }
        fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, StoreError> {
            self.gate()?;
            self.inner.get_batch(id)
        }
        fn get_transaction(&self, id: TxId) -> Result<Option<SaleTransaction>, StoreError> {
            self.gate()?;
            self.inner.get_transaction(id)
        }
        fn batches_for_crop(&self, crop_id: CropId) -> Result<Vec<Batch>, StoreError> {
            self.gate()?;
            self.inner.batches_for_crop(crop_id)
        }
        fn batch_by_code(&self, code: &str) -> Result<Option<Batch>, StoreError> {
            self.gate()?;
            self.inner.batch_by_code(code)
        }
        fn atomic_commit(&self, ops: Vec<StoreOp>) -> Result<(), StoreError> {
            let decrements = ops
                .iter()
                .any(|op| matches!(op, StoreOp::DecrementBatchQuantity { .. }));
            self.inner.atomic_commit(ops)?;
            if decrements {
                self.fail_reads.store(true, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    fn failing_service(
        h: &Harness,
    ) -> LifecycleService<InMemoryChainStore, InMemoryProfileDirectory, FailingLedgerStore, SystemTimeSource>
    {
        let ledger = Arc::new(RecordLedger::new(
            FailingLedgerStore,
            SystemTimeSource,
            LedgerConfig::default(),
        ));
        LifecycleService::new(
            Arc::clone(&h.store),
            Arc::clone(&h.directory),
            ledger,
            Arc::clone(&h.bus),
        )
    }

    #[test]
    fn test_register_crop_lists_batch() {
        let h = harness();
        let (crop, batch, record) = h.service.register_crop(h.farmer, crop_input(100, 5)).unwrap();

        assert_eq!(crop.status, CropStatus::Listed);
        assert_eq!(batch.quantity, 100);
        assert_eq!(batch.status, BatchStatus::Available);
        assert!(batch.code.as_str().contains(&batch.id.to_string()));

        assert_eq!(record.record_type, RecordType::CropRegistration);
        assert_eq!(record.data["quantity"], 100);
        assert!(h.ledger.verify(&record));

        let history = h.bus.history_all();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind(), EventKind::ProductCreated);
    }

    #[test]
    fn test_register_requires_farmer_role() {
        let h = harness();
        let err = h.service.register_crop(h.buyer, crop_input(10, 1)).unwrap_err();

        assert!(matches!(err, LifecycleError::UnauthorizedRole { .. }));
        assert!(h.bus.history_all().is_empty());
    }

    #[test]
    fn test_register_rejects_invalid_input() {
        let h = harness();
        let err = h.service.register_crop(h.farmer, crop_input(0, 1)).unwrap_err();
        assert!(matches!(err, LifecycleError::ValidationFailed { .. }));
    }

    #[test]
    fn test_add_batch_increments_number() {
        let h = harness();
        let (crop, _, _) = h.service.register_crop(h.farmer, crop_input(100, 5)).unwrap();

        let (batch, record) = h.service.add_batch(h.farmer, crop.id, 40, 6).unwrap();
        assert_eq!(batch.batch_number, 2);
        assert_eq!(batch.status, BatchStatus::Available);
        assert_eq!(record.record_type, RecordType::BatchCreated);

        assert_eq!(h.store.batches_for_crop(crop.id).unwrap().len(), 2);
    }

    #[test]
    fn test_assign_distributor_is_idempotent_overwrite() {
        let h = harness();
        let (_, batch, _) = h.service.register_crop(h.farmer, crop_input(100, 5)).unwrap();

        h.service
            .assign_distributor(batch.id, h.distributor, Some("route A".into()), None)
            .unwrap();
        let stored = h.store.get_batch(batch.id).unwrap().unwrap();
        assert_eq!(stored.status, BatchStatus::InTransit);
        assert_eq!(stored.distributor_id, Some(h.distributor));
        assert_eq!(stored.route.as_deref(), Some("route A"));

        // Re-assignment overwrites metadata; status stays in transit.
        h.service
            .assign_distributor(batch.id, h.distributor, Some("route B".into()), Some("TRK-9".into()))
            .unwrap();
        let stored = h.store.get_batch(batch.id).unwrap().unwrap();
        assert_eq!(stored.status, BatchStatus::InTransit);
        assert_eq!(stored.route.as_deref(), Some("route B"));
        assert_eq!(stored.vehicle_code.as_deref(), Some("TRK-9"));

        let transfers = h
            .bus
            .history(Some(&shared_bus::EventFilter::kind(EventKind::OwnershipTransferred)));
        assert_eq!(transfers.len(), 2);
    }

    #[test]
    fn test_assign_rejects_non_distributor() {
        let h = harness();
        let (_, batch, _) = h.service.register_crop(h.farmer, crop_input(100, 5)).unwrap();

        let err = h
            .service
            .assign_distributor(batch.id, h.buyer, None, None)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::UnauthorizedRole { .. }));

        // No mutation and no record beyond the registration one.
        let stored = h.store.get_batch(batch.id).unwrap().unwrap();
        assert_eq!(stored.status, BatchStatus::Available);
        assert_eq!(h.ledger.records_for_batch(batch.id).unwrap().len(), 1);
    }

    #[test]
    fn test_transit_checkpoint_requires_in_transit() {
        let h = harness();
        let (_, batch, _) = h.service.register_crop(h.farmer, crop_input(100, 5)).unwrap();

        let err = h
            .service
            .record_transit_checkpoint(h.distributor, batch.id, "depot 1".into())
            .unwrap_err();
        assert!(matches!(err, LifecycleError::BatchUnavailable { .. }));

        h.service
            .assign_distributor(batch.id, h.distributor, None, None)
            .unwrap();
        let record = h
            .service
            .record_transit_checkpoint(h.distributor, batch.id, "depot 1".into())
            .unwrap();
        assert_eq!(record.record_type, RecordType::TransitCheckpoint);

        let updates = h
            .bus
            .history(Some(&shared_bus::EventFilter::kind(EventKind::BatchLocationUpdated)));
        assert_eq!(updates.len(), 1);
    }

    #[test]
    fn test_purchase_partial_then_insufficient() {
        let h = harness();
        let (_, batch, _) = h.service.register_crop(h.farmer, crop_input(50, 3)).unwrap();

        let (tx, record) = h.service.purchase_batch(h.buyer, batch.id, 30).unwrap();
        assert_eq!(tx.total_price, 90);
        assert_eq!(record.record_type, RecordType::Transaction);
        assert_eq!(h.store.get_batch(batch.id).unwrap().unwrap().quantity, 20);

        let err = h.service.purchase_batch(h.buyer, batch.id, 30).unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::QuantityExceedsAvailable {
                requested: 30,
                available: 20,
                ..
            }
        ));
        // The rejected purchase left the quantity unchanged.
        assert_eq!(h.store.get_batch(batch.id).unwrap().unwrap().quantity, 20);
    }

    #[test]
    fn test_full_purchase_closes_crop() {
        let h = harness();
        let (crop, batch, _) = h.service.register_crop(h.farmer, crop_input(100, 5)).unwrap();

        let (tx, _) = h.service.purchase_batch(h.buyer, batch.id, 100).unwrap();
        assert_eq!(tx.total_price, 500);

        let stored = h.store.get_batch(batch.id).unwrap().unwrap();
        assert_eq!(stored.quantity, 0);
        assert_eq!(stored.status, BatchStatus::Purchased);
        assert_eq!(
            h.store.get_crop(crop.id).unwrap().unwrap().status,
            CropStatus::Sold
        );

        let purchases = h
            .bus
            .history(Some(&shared_bus::EventFilter::kind(EventKind::BatchPurchased)));
        assert_eq!(purchases.len(), 1);
        match &purchases[0].payload {
            EventPayload::BatchPurchased {
                remaining,
                crop_sold,
                ..
            } => {
                assert_eq!(*remaining, 0);
                assert!(*crop_sold);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_crop_stays_listed_while_sibling_batch_open() {
        let h = harness();
        let (crop, batch, _) = h.service.register_crop(h.farmer, crop_input(100, 5)).unwrap();
        h.service.add_batch(h.farmer, crop.id, 40, 5).unwrap();

        h.service.purchase_batch(h.buyer, batch.id, 100).unwrap();

        assert_eq!(
            h.store.get_crop(crop.id).unwrap().unwrap().status,
            CropStatus::Listed
        );
    }

    #[test]
    fn test_purchase_requires_available_status() {
        let h = harness();
        let (_, batch, _) = h.service.register_crop(h.farmer, crop_input(100, 5)).unwrap();
        h.service
            .assign_distributor(batch.id, h.distributor, None, None)
            .unwrap();

        let err = h.service.purchase_batch(h.buyer, batch.id, 10).unwrap_err();
        assert!(matches!(err, LifecycleError::BatchUnavailable { .. }));
    }

    #[test]
    fn test_purchase_zero_quantity_rejected() {
        let h = harness();
        let (_, batch, _) = h.service.register_crop(h.farmer, crop_input(100, 5)).unwrap();

        let err = h.service.purchase_batch(h.buyer, batch.id, 0).unwrap_err();
        assert!(matches!(err, LifecycleError::ValidationFailed { .. }));
    }

    #[test]
    fn test_failed_append_rolls_back_registration() {
        let h = harness();
        let bad = failing_service(&h);

        let err = bad.register_crop(h.farmer, crop_input(100, 5)).unwrap_err();
        assert!(matches!(err, LifecycleError::RegistrationFailed { .. }));
        assert!(h.bus.history_all().is_empty());
    }

    #[test]
    fn test_failed_append_compensates_purchase() {
        let h = harness();
        let (_, batch, _) = h.service.register_crop(h.farmer, crop_input(50, 3)).unwrap();

        let bad = failing_service(&h);
        let err = bad.purchase_batch(h.buyer, batch.id, 30).unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::LedgerAppendFailed {
                attempts: MAX_APPEND_RETRIES,
                ..
            }
        ));

        // Quantity and status restored; no purchase event published.
        let stored = h.store.get_batch(batch.id).unwrap().unwrap();
        assert_eq!(stored.quantity, 50);
        assert_eq!(stored.status, BatchStatus::Available);
        assert_eq!(h.bus.history_all().len(), 1); // ProductCreated only
    }

    #[test]
    fn test_failed_post_commit_read_compensates_purchase() {
        let h = harness();
        let store = Arc::new(FlakyReadStore::new());
        let service = LifecycleService::new(
            Arc::clone(&store),
            Arc::clone(&h.directory),
            Arc::clone(&h.ledger),
            Arc::clone(&h.bus),
        );
        let (_, batch, _) = service.register_crop(h.farmer, crop_input(50, 3)).unwrap();

        // The decrement commits, then every read fails.
        let err = service.purchase_batch(h.buyer, batch.id, 30).unwrap_err();
        assert!(matches!(err, LifecycleError::StorageFailure(_)));

        // The purchase was undone: full quantity back, no transaction
        // record, no purchase event.
        let stored = store.inner.get_batch(batch.id).unwrap().unwrap();
        assert_eq!(stored.quantity, 50);
        assert_eq!(stored.status, BatchStatus::Available);
        assert_eq!(h.ledger.records_for_batch(batch.id).unwrap().len(), 1);
        assert_eq!(h.bus.history_all().len(), 1);
    }

    #[test]
    fn test_failed_append_rolls_back_assignment() {
        let h = harness();
        let (_, batch, _) = h.service.register_crop(h.farmer, crop_input(50, 3)).unwrap();

        let bad = failing_service(&h);
        let err = bad
            .assign_distributor(batch.id, h.distributor, Some("route A".into()), None)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::LedgerAppendFailed { .. }));

        let stored = h.store.get_batch(batch.id).unwrap().unwrap();
        assert_eq!(stored.status, BatchStatus::Available);
        assert_eq!(stored.distributor_id, None);
    }
}
