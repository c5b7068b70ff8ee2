//! Recoverable data-quality findings.
//!
//! Per-record and per-month problems are collected here instead of failing
//! the run, so a caller can decide whether partial results are acceptable.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::models::Month;

/// Category of a data-quality finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A record missing a required field was dropped from the ledger
    MalformedRecord,
    /// A held security had no price for the month
    DataGap,
    /// A sell exceeded the tracked quantity and was clamped at zero
    NegativeQuantity,
    /// A share movement had no quantity and none could be derived
    MissingQuantity,
    /// A month's return had a zero denominator
    UndefinedReturn,
    /// A benchmark constituent had no return for a month
    BenchmarkGap,
    /// Benchmark weights did not sum to one (lax mode)
    WeightTolerance,
    /// Reconstructed quantity disagrees with the holdings snapshot
    HoldingMismatch,
    /// Rewinding holdings produced a negative opening quantity
    NegativeOpeningPosition,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningKind::MalformedRecord => "MALFORMED_RECORD",
            WarningKind::DataGap => "DATA_GAP",
            WarningKind::NegativeQuantity => "NEGATIVE_QUANTITY",
            WarningKind::MissingQuantity => "MISSING_QUANTITY",
            WarningKind::UndefinedReturn => "UNDEFINED_RETURN",
            WarningKind::BenchmarkGap => "BENCHMARK_GAP",
            WarningKind::WeightTolerance => "WEIGHT_TOLERANCE",
            WarningKind::HoldingMismatch => "HOLDING_MISMATCH",
            WarningKind::NegativeOpeningPosition => "NEGATIVE_OPENING_POSITION",
        }
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single flagged issue with whatever context applies
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataWarning {
    pub kind: WarningKind,
    pub month: Option<Month>,
    pub security_id: Option<String>,
    pub record_id: Option<String>,
    pub message: String,
}

impl DataWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            month: None,
            security_id: None,
            record_id: None,
            message: message.into(),
        }
    }

    pub fn with_month(mut self, month: Month) -> Self {
        self.month = Some(month);
        self
    }

    pub fn with_security(mut self, security_id: impl Into<String>) -> Self {
        self.security_id = Some(security_id.into());
        self
    }

    pub fn with_record(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }
}

impl fmt::Display for DataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(month) = self.month {
            write!(f, " {}", month)?;
        }
        if let Some(ref security) = self.security_id {
            write!(f, " {}", security)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Count warnings by kind for summary reporting
pub fn summarize(warnings: &[DataWarning]) -> BTreeMap<WarningKind, usize> {
    let mut summary = BTreeMap::new();
    for warning in warnings {
        *summary.entry(warning.kind).or_insert(0) += 1;
    }
    summary
}

/// True if any warning of `kind` mentions `month`
pub fn is_flagged(warnings: &[DataWarning], kind: WarningKind, month: Month) -> bool {
    warnings
        .iter()
        .any(|w| w.kind == kind && w.month == Some(month))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let month = Month::new(2024, 3).unwrap();
        let warning = DataWarning::new(WarningKind::DataGap, "no price")
            .with_month(month)
            .with_security("sec-aaa");
        assert_eq!(warning.to_string(), "[DATA_GAP] 2024-03 sec-aaa: no price");
    }

    #[test]
    fn test_summarize_counts_by_kind() {
        let month = Month::new(2024, 1).unwrap();
        let warnings = vec![
            DataWarning::new(WarningKind::DataGap, "a").with_month(month),
            DataWarning::new(WarningKind::DataGap, "b"),
            DataWarning::new(WarningKind::MalformedRecord, "c").with_record("tx-9"),
        ];
        let summary = summarize(&warnings);
        assert_eq!(summary.get(&WarningKind::DataGap), Some(&2));
        assert_eq!(summary.get(&WarningKind::MalformedRecord), Some(&1));
        assert!(is_flagged(&warnings, WarningKind::DataGap, month));
        assert!(!is_flagged(&warnings, WarningKind::MalformedRecord, month));
    }
}
