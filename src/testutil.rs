//! Test fixtures: record builders, an in-memory record store, and a
//! scripted gateway.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::gateway::{
    DatabaseCheckRequest, DatabaseCheckResponse, GatewayError, IdentityGateway, MatchStatus,
};
use crate::record::{CustomerRecord, DocumentSnapshot, VerificationReport, VerificationStatus};
use crate::store::{RecordStore, StoreError};

/// A baseline pending record with no proofs and no snapshots.
pub fn record(customer_id: i64) -> CustomerRecord {
    let now = Utc::now();
    CustomerRecord {
        customer_id,
        name: "Asha Rao".to_string(),
        dob: NaiveDate::from_ymd_opt(1990, 1, 15).expect("valid date"),
        aadhaar_provided: false,
        aadhaar_number: None,
        pan_provided: false,
        pan_number: None,
        dl_provided: false,
        dl_number: None,
        tax_invoice: None,
        dan: None,
        cddn: None,
        customer_verification: None,
        vehicle_verification: None,
        verification_result: None,
        verification_status: VerificationStatus::Pending,
        created_at: now,
        updated_at: now,
    }
}

pub fn snapshot(
    vin: Option<&str>,
    chassis: Option<&str>,
    engine: Option<&str>,
) -> DocumentSnapshot {
    DocumentSnapshot {
        vin_number: vin.map(str::to_string),
        chassis_number: chassis.map(str::to_string),
        engine_number: engine.map(str::to_string),
    }
}

fn simulated_failure(what: &str) -> StoreError {
    StoreError::Database(sqlx::Error::Protocol(format!("simulated {what} failure")))
}

/// In-memory [`RecordStore`] with switches for simulating persistence
/// failures and claim contention.
pub struct InMemoryRecordStore {
    rows: Mutex<BTreeMap<i64, CustomerRecord>>,
    fail_fetch: AtomicBool,
    fail_customer_writes: AtomicBool,
    fail_vehicle_writes: AtomicBool,
    deny_next_claim: AtomicBool,
}

impl InMemoryRecordStore {
    pub fn new(records: Vec<CustomerRecord>) -> Self {
        let rows = records.into_iter().map(|r| (r.customer_id, r)).collect();
        Self {
            rows: Mutex::new(rows),
            fail_fetch: AtomicBool::new(false),
            fail_customer_writes: AtomicBool::new(false),
            fail_vehicle_writes: AtomicBool::new(false),
            deny_next_claim: AtomicBool::new(false),
        }
    }

    pub fn get(&self, customer_id: i64) -> CustomerRecord {
        self.rows
            .lock()
            .expect("store lock")
            .get(&customer_id)
            .cloned()
            .expect("record exists")
    }

    pub fn fail_fetch(&self) {
        self.fail_fetch.store(true, Ordering::SeqCst);
    }

    pub fn fail_customer_writes(&self) {
        self.fail_customer_writes.store(true, Ordering::SeqCst);
    }

    pub fn fail_vehicle_writes(&self) {
        self.fail_vehicle_writes.store(true, Ordering::SeqCst);
    }

    pub fn allow_all_writes(&self) {
        self.fail_customer_writes.store(false, Ordering::SeqCst);
        self.fail_vehicle_writes.store(false, Ordering::SeqCst);
    }

    /// The next claim returns false, as if a concurrent run won the race.
    pub fn deny_next_claim(&self) {
        self.deny_next_claim.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn fetch_pending(&self) -> Result<Vec<CustomerRecord>, StoreError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(simulated_failure("fetch"));
        }
        let rows = self.rows.lock().expect("store lock");
        Ok(rows
            .values()
            .filter(|r| r.verification_status.is_reprocessable())
            .cloned()
            .collect())
    }

    async fn claim(&self, customer_id: i64) -> Result<bool, StoreError> {
        if self.deny_next_claim.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        let mut rows = self.rows.lock().expect("store lock");
        match rows.get_mut(&customer_id) {
            Some(r) if r.verification_status.is_reprocessable() => {
                r.verification_status = VerificationStatus::InProgress;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_customer_verified(
        &self,
        customer_id: i64,
        verified: bool,
    ) -> Result<(), StoreError> {
        if self.fail_customer_writes.load(Ordering::SeqCst) {
            return Err(simulated_failure("customer write"));
        }
        let mut rows = self.rows.lock().expect("store lock");
        if let Some(r) = rows.get_mut(&customer_id) {
            r.customer_verification = Some(verified);
        }
        Ok(())
    }

    async fn set_vehicle_verification(
        &self,
        customer_id: i64,
        verified: bool,
        report: &VerificationReport,
    ) -> Result<(), StoreError> {
        if self.fail_vehicle_writes.load(Ordering::SeqCst) {
            return Err(simulated_failure("vehicle write"));
        }
        let mut rows = self.rows.lock().expect("store lock");
        if let Some(r) = rows.get_mut(&customer_id) {
            r.vehicle_verification = Some(verified);
            r.verification_result = Some(report.clone());
        }
        Ok(())
    }

    async fn mark_completed(&self, customer_id: i64) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().expect("store lock");
        if let Some(r) = rows.get_mut(&customer_id) {
            r.verification_status = VerificationStatus::Completed;
        }
        Ok(())
    }

    async fn mark_failed(&self, customer_id: i64) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().expect("store lock");
        if let Some(r) = rows.get_mut(&customer_id) {
            r.verification_status = VerificationStatus::Failed;
        }
        Ok(())
    }

    async fn find_by_customer_id(
        &self,
        customer_id: i64,
    ) -> Result<Option<CustomerRecord>, StoreError> {
        let rows = self.rows.lock().expect("store lock");
        Ok(rows.get(&customer_id).cloned())
    }
}

/// What the scripted gateway should answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockScript {
    /// `status.status_matching == "success"`.
    Match,
    /// A well-formed response with a non-success literal.
    NoMatch,
    /// A response with no status at all.
    Empty,
    /// A gateway error (provider outage).
    Fail,
}

/// Scripted [`IdentityGateway`] that records every request it receives.
pub struct MockGateway {
    script: MockScript,
    calls: Mutex<Vec<DatabaseCheckRequest>>,
}

impl MockGateway {
    pub fn new(script: MockScript) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }
}

#[async_trait]
impl IdentityGateway for MockGateway {
    async fn database_check(
        &self,
        request: &DatabaseCheckRequest,
    ) -> Result<DatabaseCheckResponse, GatewayError> {
        self.calls.lock().expect("calls lock").push(request.clone());
        match self.script {
            MockScript::Match => Ok(DatabaseCheckResponse {
                status: Some(MatchStatus {
                    status_matching: Some("success".to_string()),
                }),
            }),
            MockScript::NoMatch => Ok(DatabaseCheckResponse {
                status: Some(MatchStatus {
                    status_matching: Some("failure".to_string()),
                }),
            }),
            MockScript::Empty => Ok(DatabaseCheckResponse::default()),
            MockScript::Fail => Err(GatewayError::Status(503)),
        }
    }
}
