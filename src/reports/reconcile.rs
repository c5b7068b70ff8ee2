use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use crate::models::Holding;
use crate::reports::positions::ReconstructionState;
use crate::warnings::{DataWarning, WarningKind};

/// Differences at or below this many shares are rounding noise
pub const QUANTITY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 6);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingDifference {
    pub security_id: String,
    pub reconstructed: Decimal,
    pub reported: Decimal,
}

impl HoldingDifference {
    pub fn difference(&self) -> Decimal {
        self.reconstructed - self.reported
    }
}

/// Compare reconstructed quantities with the current holdings snapshot.
///
/// Holdings are summed across accounts. Cash securities are ignored on both
/// sides. Only mismatches are returned.
pub fn reconcile(
    state: &ReconstructionState,
    holdings: &[Holding],
    cash_securities: &BTreeSet<String>,
) -> (Vec<HoldingDifference>, Vec<DataWarning>) {
    let mut reported: BTreeMap<&str, Decimal> = BTreeMap::new();
    for holding in holdings {
        *reported
            .entry(holding.security_id.as_str())
            .or_insert(Decimal::ZERO) += holding.quantity;
    }

    let mut security_ids: BTreeSet<&str> = reported.keys().copied().collect();
    security_ids.extend(state.positions.keys().map(String::as_str));

    let mut differences = Vec::new();
    let mut warnings = Vec::new();

    for security_id in security_ids {
        if cash_securities.contains(security_id) {
            continue;
        }
        let difference = HoldingDifference {
            security_id: security_id.to_string(),
            reconstructed: state.quantity(security_id),
            reported: reported.get(security_id).copied().unwrap_or(Decimal::ZERO),
        };
        if difference.difference().abs() <= QUANTITY_TOLERANCE {
            continue;
        }

        warn!(
            "Holding mismatch for {}: reconstructed {} vs reported {}",
            security_id, difference.reconstructed, difference.reported
        );
        warnings.push(
            DataWarning::new(
                WarningKind::HoldingMismatch,
                format!(
                    "reconstructed {} shares, holdings report {}",
                    difference.reconstructed, difference.reported
                ),
            )
            .with_security(security_id),
        );
        differences.push(difference);
    }

    if differences.is_empty() {
        info!("Reconstructed positions match the holdings snapshot");
    }
    (differences, warnings)
}
