//! Consistency Rules
//!
//! Pure cross-document reconciliation helpers. Each vehicle identifier
//! (VIN, chassis, engine) is compared across the three source documents
//! (tax invoice, DAN, CDDN); the per-identifier booleans then combine into
//! the overall vehicle verdict. No I/O here.

use crate::record::{
    CustomerRecord, DocumentSnapshot, IdentifierCheck, IdentifierClass, VehicleVerdict,
    VerificationReport,
};

pub const DETAIL_INCOMPLETE: &str = "Incomplete data for verification";
pub const DETAIL_ALL_THREE: &str = "All three consistent (Tax Invoice && DAN && CDDN)";
pub const DETAIL_TAX_DAN: &str = "Tax Invoice && DAN consistent";
pub const DETAIL_DAN_CDDN: &str = "DAN && CDDN consistent";
pub const DETAIL_CDDN_TAX: &str = "Tax Invoice && CDDN consistent";
pub const DETAIL_NONE: &str = "None are consistent";

pub const VERDICT_ALL_THREE: &str = "All three parameters are consistent";
pub const VERDICT_TWO: &str = "Two parameters are consistent";
pub const VERDICT_ONE: &str = "Only one parameter is consistent";
pub const VERDICT_NONE: &str = "None are consistent — verification failed";

/// Check one identifier class across the three snapshot values.
///
/// Pair tie-break order is fixed: tax∼dan, then dan∼cddn, then cddn∼tax —
/// only the first satisfied pair is reported.
pub fn check_identifier(
    tax: Option<&str>,
    dan: Option<&str>,
    cddn: Option<&str>,
) -> IdentifierCheck {
    let (Some(tax), Some(dan), Some(cddn)) = (tax, dan, cddn) else {
        return IdentifierCheck {
            consistent: false,
            detail: DETAIL_INCOMPLETE.to_string(),
        };
    };

    let (consistent, detail) = if tax == dan && dan == cddn {
        (true, DETAIL_ALL_THREE)
    } else if tax == dan {
        (true, DETAIL_TAX_DAN)
    } else if dan == cddn {
        (true, DETAIL_DAN_CDDN)
    } else if cddn == tax {
        (true, DETAIL_CDDN_TAX)
    } else {
        (false, DETAIL_NONE)
    };

    IdentifierCheck {
        consistent,
        detail: detail.to_string(),
    }
}

/// Combine the three identifier booleans into the vehicle verdict.
///
/// Two consistent identifiers pass; one does not. The asymmetry (partial
/// consistency flagged as not verified at exactly one) is deliberate.
pub fn vehicle_verdict(vin: bool, chassis: bool, engine: bool) -> VehicleVerdict {
    let (verified, detail) = match [vin, chassis, engine].iter().filter(|c| **c).count() {
        3 => (true, VERDICT_ALL_THREE),
        2 => (true, VERDICT_TWO),
        1 => (false, VERDICT_ONE),
        _ => (false, VERDICT_NONE),
    };

    VehicleVerdict {
        verified,
        detail: detail.to_string(),
    }
}

fn snapshot_value(snapshot: &Option<DocumentSnapshot>, class: IdentifierClass) -> Option<&str> {
    snapshot.as_ref().and_then(|s| s.identifier(class))
}

/// Run the full vehicle reconciliation for a record.
///
/// Returns the vehicle-verified flag plus the complete report (one entry
/// per identifier class, one overall verdict).
pub fn reconcile_vehicle(record: &CustomerRecord) -> (bool, VerificationReport) {
    let check = |class: IdentifierClass| {
        check_identifier(
            snapshot_value(&record.tax_invoice, class),
            snapshot_value(&record.dan, class),
            snapshot_value(&record.cddn, class),
        )
    };

    let vin = check(IdentifierClass::Vin);
    let chassis = check(IdentifierClass::Chassis);
    let engine = check(IdentifierClass::Engine);

    let vehicle = vehicle_verdict(vin.consistent, chassis.consistent, engine.consistent);
    let verified = vehicle.verified;

    (
        verified,
        VerificationReport {
            vin,
            chassis,
            engine,
            vehicle,
        },
    )
}
