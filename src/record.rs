//! Customer Verification Record Types
//!
//! One record per customer/upload, created by the upstream extraction worker
//! in `pending` status and mutated exclusively by the reconciliation engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Vehicle identifiers as extracted from a single source document.
///
/// Every field is optional: extraction may fail to locate any given
/// identifier, and the consistency rules treat a missing value as
/// incomplete data rather than a mismatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vin_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chassis_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_number: Option<String>,
}

/// The three vehicle identifier classes cross-checked between documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierClass {
    Vin,
    Chassis,
    Engine,
}

impl DocumentSnapshot {
    /// The captured value for one identifier class, if extraction found it.
    pub fn identifier(&self, class: IdentifierClass) -> Option<&str> {
        match class {
            IdentifierClass::Vin => self.vin_number.as_deref(),
            IdentifierClass::Chassis => self.chassis_number.as_deref(),
            IdentifierClass::Engine => self.engine_number.as_deref(),
        }
    }
}

/// The single identity-proof path evaluated for a record.
///
/// Exactly one path is selected by priority (Aadhaar > PAN > DL), so an
/// "all three provided" row still verifies against one document only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityProof {
    Aadhaar { number: String },
    Pan { number: String },
    DrivingLicense { number: String },
}

impl IdentityProof {
    pub fn id_number(&self) -> &str {
        match self {
            Self::Aadhaar { number } | Self::Pan { number } | Self::DrivingLicense { number } => {
                number
            }
        }
    }

    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Aadhaar { .. } => "aadhaar",
            Self::Pan { .. } => "pan",
            Self::DrivingLicense { .. } => "dl",
        }
    }
}

/// Processing status of a record.
///
/// `pending → in_progress → completed` on the happy path. A record whose
/// write-backs partially failed is parked as `failed` and re-selected by
/// the next trigger run; `completed` records never are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown verification status: {0}")]
pub struct StatusParseError(pub String);

impl FromStr for VerificationStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(StatusParseError(s.to_string())),
        }
    }
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Is this record eligible for selection by a verification run?
    pub fn is_reprocessable(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }
}

/// Outcome of one identifier-class consistency check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierCheck {
    pub consistent: bool,
    pub detail: String,
}

/// Overall vehicle verdict, a strict function of the three identifier checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleVerdict {
    pub verified: bool,
    pub detail: String,
}

/// Structured explanation of a vehicle reconciliation.
///
/// Always written as a complete object; partial reports are never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub vin: IdentifierCheck,
    pub chassis: IdentifierCheck,
    pub engine: IdentifierCheck,
    pub vehicle: VehicleVerdict,
}

/// A customer verification record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRecord {
    /// Unique key, assigned by the extraction pipeline.
    pub customer_id: i64,
    pub name: String,
    pub dob: NaiveDate,

    /// Proof flags and numbers as captured from the upload form.
    pub aadhaar_provided: bool,
    pub aadhaar_number: Option<String>,
    pub pan_provided: bool,
    pub pan_number: Option<String>,
    pub dl_provided: bool,
    pub dl_number: Option<String>,

    /// Independently captured document snapshots.
    pub tax_invoice: Option<DocumentSnapshot>,
    pub dan: Option<DocumentSnapshot>,
    pub cddn: Option<DocumentSnapshot>,

    /// Tri-state: `None` means verification was never attempted, which is
    /// distinct from an explicit `Some(false)` no-match.
    pub customer_verification: Option<bool>,
    pub vehicle_verification: Option<bool>,
    pub verification_result: Option<VerificationReport>,
    pub verification_status: VerificationStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomerRecord {
    /// Select the single proof path to evaluate, by priority
    /// Aadhaar > PAN > DL.
    ///
    /// A flag set without its number present does not select that path;
    /// selection falls through to the next priority.
    pub fn identity_proof(&self) -> Option<IdentityProof> {
        if self.aadhaar_provided {
            if let Some(number) = &self.aadhaar_number {
                return Some(IdentityProof::Aadhaar {
                    number: number.clone(),
                });
            }
        }
        if self.pan_provided {
            if let Some(number) = &self.pan_number {
                return Some(IdentityProof::Pan {
                    number: number.clone(),
                });
            }
        }
        if self.dl_provided {
            if let Some(number) = &self.dl_number {
                return Some(IdentityProof::DrivingLicense {
                    number: number.clone(),
                });
            }
        }
        None
    }
}
