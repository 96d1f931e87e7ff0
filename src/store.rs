//! Record Store
//!
//! Persistence access for customer verification records.
//!
//! NOTE: All queries use runtime-checked sqlx::query() instead of
//! compile-time sqlx::query!() macros because the table is created by
//! migrations that may not exist at compile time.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use tracing::warn;

use crate::record::{CustomerRecord, DocumentSnapshot, VerificationReport, VerificationStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid stored data for customer {customer_id}: {message}")]
    InvalidRow { customer_id: i64, message: String },
}

/// Persistence operations the reconciliation core needs.
///
/// The write shapes are deliberately narrow: one update per concern, keyed
/// by `customer_id`, matching how the engine sequences its write-backs.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records eligible for a verification run (`pending`, plus `failed`
    /// records parked by an earlier partial write outage).
    async fn fetch_pending(&self) -> Result<Vec<CustomerRecord>, StoreError>;

    /// Conditionally transition a record to `in_progress`. Returns whether
    /// the claim took effect; a `false` means another run got there first
    /// and the caller must skip the record.
    async fn claim(&self, customer_id: i64) -> Result<bool, StoreError>;

    async fn set_customer_verified(
        &self,
        customer_id: i64,
        verified: bool,
    ) -> Result<(), StoreError>;

    /// Persist the vehicle flag and the complete report in a single write.
    async fn set_vehicle_verification(
        &self,
        customer_id: i64,
        verified: bool,
        report: &VerificationReport,
    ) -> Result<(), StoreError>;

    async fn mark_completed(&self, customer_id: i64) -> Result<(), StoreError>;

    /// Park the record as `failed` so the next run retries it.
    async fn mark_failed(&self, customer_id: i64) -> Result<(), StoreError>;

    async fn find_by_customer_id(
        &self,
        customer_id: i64,
    ) -> Result<Option<CustomerRecord>, StoreError>;
}

/// Postgres-backed record store.
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const RECORD_COLUMNS: &str = r#"
    customer_id, name, dob,
    aadhaar_provided, aadhaar_number,
    pan_provided, pan_number,
    dl_provided, dl_number,
    tax_invoice, dan, cddn,
    customer_verification, vehicle_verification,
    verification_result, verification_status,
    created_at, updated_at
"#;

/// Decode a JSONB snapshot column; a malformed snapshot is logged and
/// treated as absent, which the consistency rules already score as
/// incomplete data.
fn snapshot_column(
    row: &PgRow,
    customer_id: i64,
    column: &str,
) -> Result<Option<DocumentSnapshot>, StoreError> {
    let value: Option<serde_json::Value> = row.try_get(column)?;
    Ok(value.and_then(|v| match serde_json::from_value(v) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!(customer_id, column, error = %e, "Malformed document snapshot, treating as absent");
            None
        }
    }))
}

fn record_from_row(row: &PgRow) -> Result<CustomerRecord, StoreError> {
    let customer_id: i64 = row.try_get("customer_id")?;

    let status_raw: String = row.try_get("verification_status")?;
    let verification_status =
        VerificationStatus::from_str(&status_raw).map_err(|e| StoreError::InvalidRow {
            customer_id,
            message: e.to_string(),
        })?;

    let verification_result: Option<VerificationReport> = row
        .try_get::<Option<serde_json::Value>, _>("verification_result")?
        .and_then(|v| match serde_json::from_value(v) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(customer_id, error = %e, "Malformed verification result, treating as unset");
                None
            }
        });

    Ok(CustomerRecord {
        customer_id,
        name: row.try_get("name")?,
        dob: row.try_get("dob")?,
        aadhaar_provided: row.try_get("aadhaar_provided")?,
        aadhaar_number: row.try_get("aadhaar_number")?,
        pan_provided: row.try_get("pan_provided")?,
        pan_number: row.try_get("pan_number")?,
        dl_provided: row.try_get("dl_provided")?,
        dl_number: row.try_get("dl_number")?,
        tax_invoice: snapshot_column(row, customer_id, "tax_invoice")?,
        dan: snapshot_column(row, customer_id, "dan")?,
        cddn: snapshot_column(row, customer_id, "cddn")?,
        customer_verification: row.try_get("customer_verification")?,
        vehicle_verification: row.try_get("vehicle_verification")?,
        verification_result,
        verification_status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn fetch_pending(&self) -> Result<Vec<CustomerRecord>, StoreError> {
        let sql = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM customer_records
            WHERE verification_status IN ('pending', 'failed')
            ORDER BY customer_id
            "#
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn claim(&self, customer_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE customer_records
            SET verification_status = 'in_progress', updated_at = now()
            WHERE customer_id = $1
              AND verification_status IN ('pending', 'failed')
            "#,
        )
        .bind(customer_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_customer_verified(
        &self,
        customer_id: i64,
        verified: bool,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE customer_records
            SET customer_verification = $2, updated_at = now()
            WHERE customer_id = $1
            "#,
        )
        .bind(customer_id)
        .bind(verified)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_vehicle_verification(
        &self,
        customer_id: i64,
        verified: bool,
        report: &VerificationReport,
    ) -> Result<(), StoreError> {
        let report = serde_json::to_value(report).map_err(|e| StoreError::InvalidRow {
            customer_id,
            message: format!("Unserializable verification report: {e}"),
        })?;

        sqlx::query(
            r#"
            UPDATE customer_records
            SET vehicle_verification = $2, verification_result = $3, updated_at = now()
            WHERE customer_id = $1
            "#,
        )
        .bind(customer_id)
        .bind(verified)
        .bind(report)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_completed(&self, customer_id: i64) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE customer_records
            SET verification_status = 'completed', updated_at = now()
            WHERE customer_id = $1
            "#,
        )
        .bind(customer_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_failed(&self, customer_id: i64) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE customer_records
            SET verification_status = 'failed', updated_at = now()
            WHERE customer_id = $1
            "#,
        )
        .bind(customer_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_customer_id(
        &self,
        customer_id: i64,
    ) -> Result<Option<CustomerRecord>, StoreError> {
        let sql = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM customer_records
            WHERE customer_id = $1
            LIMIT 1
            "#
        );
        let row = sqlx::query(&sql)
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }
}
