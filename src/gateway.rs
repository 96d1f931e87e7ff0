//! Identity Verification Gateway
//!
//! HTTP client for the external document database-check provider. The
//! provider verifies manually entered identity fields (Aadhaar, PAN,
//! driving license) against government databases; registration-certificate
//! and GST checks share the same endpoint.
//!
//! The engine only ever depends on the [`IdentityGateway`] trait so tests
//! can run against a scripted mock.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::GatewayConfig;
use crate::record::IdentityProof;

/// Literal the provider uses to signal a database match.
pub const MATCH_SUCCESS: &str = "success";

const DATABASE_CHECK_PATH: &str = "/v4/databaseCheck";
const NAME_MATCH_THRESHOLD: u32 = 100;

/// Errors from a gateway call. All of them are contained at the per-record
/// boundary and treated as "not verified" for that record.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway returned status {0}")]
    Status(u16),
}

/// Document types accepted by the database-check endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DocType {
    #[serde(rename = "ind_aadhaar")]
    IndAadhaar,
    #[serde(rename = "ind_pan")]
    IndPan,
    #[serde(rename = "ind_driving_license")]
    IndDrivingLicense,
    #[serde(rename = "ind_rc")]
    IndRc,
    #[serde(rename = "ind_gst_certificate")]
    IndGstCertificate,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IndAadhaar => "ind_aadhaar",
            Self::IndPan => "ind_pan",
            Self::IndDrivingLicense => "ind_driving_license",
            Self::IndRc => "ind_rc",
            Self::IndGstCertificate => "ind_gst_certificate",
        }
    }
}

/// Manually entered fields sent for verification; the shape depends on the
/// document type.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ManualInput {
    Identity {
        id_number: String,
        name: String,
        /// Formatted `YYYY-MM-DD`.
        dob: String,
    },
    RegistrationCertificate {
        rc_number: String,
        chassis_number: String,
        owner_name: String,
    },
    Gst {
        gstin: String,
    },
}

/// Request body for `POST /v4/databaseCheck`.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseCheckRequest {
    #[serde(rename = "docType")]
    pub doc_type: DocType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_match_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_parameters: Option<Vec<String>>,
    pub manual_input: ManualInput,
}

impl DatabaseCheckRequest {
    /// Build the request for a record's selected identity proof.
    ///
    /// `success_parameters` is sent for Aadhaar and DL but omitted for PAN;
    /// the provider rejects it on PAN checks.
    pub fn for_identity(proof: &IdentityProof, name: &str, dob: NaiveDate) -> Self {
        let manual_input = ManualInput::Identity {
            id_number: proof.id_number().to_string(),
            name: name.to_string(),
            dob: dob.format("%Y-%m-%d").to_string(),
        };

        let (doc_type, success_parameters) = match proof {
            IdentityProof::Aadhaar { .. } => {
                (DocType::IndAadhaar, Some(vec!["id_number".to_string()]))
            }
            IdentityProof::Pan { .. } => (DocType::IndPan, None),
            IdentityProof::DrivingLicense { .. } => {
                (DocType::IndDrivingLicense, Some(vec!["id_number".to_string()]))
            }
        };

        Self {
            doc_type,
            name_match_threshold: Some(NAME_MATCH_THRESHOLD),
            success_parameters,
            manual_input,
        }
    }

    /// Registration-certificate check for a vehicle.
    pub fn for_registration_certificate(
        rc_number: impl Into<String>,
        chassis_number: impl Into<String>,
        owner_name: impl Into<String>,
    ) -> Self {
        Self {
            doc_type: DocType::IndRc,
            name_match_threshold: None,
            success_parameters: Some(vec![
                "rc_number".to_string(),
                "chassis_number".to_string(),
                "owner_name".to_string(),
            ]),
            manual_input: ManualInput::RegistrationCertificate {
                rc_number: rc_number.into(),
                chassis_number: chassis_number.into(),
                owner_name: owner_name.into(),
            },
        }
    }

    /// GSTIN check for a dealership.
    pub fn for_gst(gstin: impl Into<String>) -> Self {
        Self {
            doc_type: DocType::IndGstCertificate,
            name_match_threshold: None,
            success_parameters: None,
            manual_input: ManualInput::Gst {
                gstin: gstin.into(),
            },
        }
    }
}

/// Nested match status in the provider response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchStatus {
    #[serde(default)]
    pub status_matching: Option<String>,
}

/// Provider response. Anything other than the exact success literal in
/// `status.status_matching` — including a missing or malformed status —
/// is not a match.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseCheckResponse {
    #[serde(default)]
    pub status: Option<MatchStatus>,
}

impl DatabaseCheckResponse {
    pub fn is_match(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.status_matching.as_deref())
            == Some(MATCH_SUCCESS)
    }
}

/// Abstract gateway so the engine can run against a mock in tests.
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    async fn database_check(
        &self,
        request: &DatabaseCheckRequest,
    ) -> Result<DatabaseCheckResponse, GatewayError>;
}

/// Production client for the SpringScan database-check API.
pub struct SpringScanClient {
    client: reqwest::Client,
    base_url: String,
    token_key: String,
}

impl SpringScanClient {
    /// The request timeout bounds every call: an unbounded gateway call on
    /// one record would stall the whole sequential batch.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token_key: config.token_key.clone(),
        })
    }
}

#[async_trait]
impl IdentityGateway for SpringScanClient {
    async fn database_check(
        &self,
        request: &DatabaseCheckRequest,
    ) -> Result<DatabaseCheckResponse, GatewayError> {
        let url = format!("{}{}", self.base_url, DATABASE_CHECK_PATH);
        debug!(doc_type = request.doc_type.as_str(), "Issuing database check");

        let response = self
            .client
            .post(&url)
            .header("tokenKey", &self.token_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status(status.as_u16()));
        }

        Ok(response.json().await?)
    }
}
