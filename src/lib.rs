//! Dealer Verification Core
//!
//! Verification reconciliation for vehicle-dealer customer onboarding.
//! An external extraction worker parses uploaded PDFs into customer records;
//! this crate decides, per record, whether the customer's identity proof
//! matches the verification provider and whether the vehicle identifiers
//! (VIN, chassis, engine) are consistent across the three source documents
//! (tax invoice, DAN, CDDN).
//!
//! Data flow: new record → threshold NOTIFY → [`TriggerController`] →
//! [`ReconciliationEngine`] → identity gateway + consistency checks →
//! write-back → broadcast to subscribed clients.

pub mod config;
pub mod consistency;
pub mod engine;
pub mod gateway;
pub mod notifier;
pub mod record;
pub mod store;
pub mod trigger;

#[cfg(test)]
pub(crate) mod testutil;

pub use engine::{BatchSummary, ReconciliationEngine};
pub use notifier::{EventBroadcaster, VerificationEvent};
pub use record::{
    CustomerRecord, DocumentSnapshot, IdentityProof, VerificationReport, VerificationStatus,
};
pub use trigger::TriggerController;
