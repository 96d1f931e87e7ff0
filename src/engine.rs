//! Reconciliation Engine
//!
//! Consumes the pending batch and decides, per record, the identity-verified
//! and vehicle-verified outcomes. Records are processed strictly one at a
//! time: record N+1 does not start until record N's writes and status
//! transition have been issued, which bounds gateway concurrency to one and
//! keeps partial-failure reasoning local to a single record.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::consistency::reconcile_vehicle;
use crate::gateway::{DatabaseCheckRequest, IdentityGateway};
use crate::record::{CustomerRecord, IdentityProof};
use crate::store::{RecordStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Counters for one verification run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Records selected by the pending query.
    pub selected: usize,
    /// Records this run claimed and processed.
    pub processed: usize,
    /// Records already claimed by a concurrent run.
    pub skipped: usize,
    /// Processed records whose write-backs all succeeded.
    pub completed: usize,
    /// Processed records parked as failed for retry.
    pub failed: usize,
}

pub struct ReconciliationEngine {
    store: Arc<dyn RecordStore>,
    gateway: Arc<dyn IdentityGateway>,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn RecordStore>, gateway: Arc<dyn IdentityGateway>) -> Self {
        Self { store, gateway }
    }

    /// Process the current pending batch.
    ///
    /// Only the batch read itself can fail this call; every per-record
    /// error is contained, logged, and never prevents subsequent records
    /// from being processed.
    pub async fn process_pending(&self) -> Result<BatchSummary, EngineError> {
        let records = self.store.fetch_pending().await?;
        let mut summary = BatchSummary {
            selected: records.len(),
            ..Default::default()
        };

        info!(count = records.len(), "Processing pending verification batch");

        for record in records {
            match self.store.claim(record.customer_id).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(
                        customer_id = record.customer_id,
                        "Record already claimed by a concurrent run, skipping"
                    );
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    error!(customer_id = record.customer_id, error = %e, "Failed to claim record");
                    summary.skipped += 1;
                    continue;
                }
            }

            summary.processed += 1;
            if self.process_record(&record).await {
                summary.completed += 1;
            } else {
                summary.failed += 1;
            }
        }

        info!(
            selected = summary.selected,
            processed = summary.processed,
            skipped = summary.skipped,
            completed = summary.completed,
            failed = summary.failed,
            "Verification batch finished"
        );

        Ok(summary)
    }

    /// Process one claimed record end to end. Returns whether the record
    /// reached `completed` (all required write-backs succeeded).
    async fn process_record(&self, record: &CustomerRecord) -> bool {
        let customer_id = record.customer_id;
        let mut writes_ok = true;

        // Identity: at most one gateway call, on the selected proof path.
        match record.identity_proof() {
            Some(proof) => {
                let verified = self.verify_identity(record, &proof).await;
                info!(
                    customer_id,
                    name = %record.name,
                    proof = proof.kind(),
                    verified,
                    "Customer identity decision"
                );
                if let Err(e) = self.store.set_customer_verified(customer_id, verified).await {
                    error!(customer_id, error = %e, "Failed to persist customer verification");
                    writes_ok = false;
                }
            }
            None => {
                // No proof path: the field stays unset. An unattempted
                // verification is not a failed one.
                debug!(customer_id, name = %record.name, "No verification ID provided");
            }
        }

        // Vehicle: one write carrying both the flag and the full report.
        let (vehicle_verified, report) = reconcile_vehicle(record);
        debug!(
            customer_id,
            vehicle_verified,
            vin = report.vin.consistent,
            chassis = report.chassis.consistent,
            engine = report.engine.consistent,
            "Vehicle reconciliation decision"
        );
        if let Err(e) = self
            .store
            .set_vehicle_verification(customer_id, vehicle_verified, &report)
            .await
        {
            error!(customer_id, error = %e, "Failed to persist vehicle verification");
            writes_ok = false;
        }

        if writes_ok {
            match self.store.mark_completed(customer_id).await {
                Ok(()) => true,
                Err(e) => {
                    error!(customer_id, error = %e, "Failed to mark record completed");
                    self.park_failed(customer_id).await;
                    false
                }
            }
        } else {
            self.park_failed(customer_id).await;
            false
        }
    }

    /// Reset a record so the next trigger run retries it. If even this
    /// write fails the record stays `in_progress` until operator action.
    async fn park_failed(&self, customer_id: i64) {
        if let Err(e) = self.store.mark_failed(customer_id).await {
            error!(customer_id, error = %e, "Failed to park record for retry, record left in_progress");
        }
    }

    /// Gateway verdict for the selected proof. Any gateway error counts as
    /// a failed verification for this record only.
    async fn verify_identity(&self, record: &CustomerRecord, proof: &IdentityProof) -> bool {
        let request = DatabaseCheckRequest::for_identity(proof, &record.name, record.dob);
        match self.gateway.database_check(&request).await {
            Ok(response) => response.is_match(),
            Err(e) => {
                warn!(
                    customer_id = record.customer_id,
                    proof = proof.kind(),
                    error = %e,
                    "Gateway call failed, treating as not verified"
                );
                false
            }
        }
    }
}
