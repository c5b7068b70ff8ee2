//! Error handling for return analysis
//!
//! Fatal problems that abort a run are `AnalysisError` values. Everything
//! recoverable (bad records, missing prices, oversold positions) is a
//! `DataWarning` returned alongside the result instead. Application plumbing
//! uses anyhow for context chaining.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that abort an analysis run
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("invalid date range: {from} is after {to}")]
    InvalidDateRange { from: NaiveDate, to: NaiveDate },

    #[error("benchmark weights sum to {sum}, outside 1 ± {tolerance}")]
    WeightsOutOfTolerance { sum: Decimal, tolerance: Decimal },

    #[error("no return series supplied for benchmark ticker {0}")]
    MissingBenchmarkSeries(String),

    #[error("invalid weight {weight} for benchmark ticker {ticker}")]
    InvalidWeight { ticker: String, weight: Decimal },

    #[error("invalid simulation parameters: {0}")]
    InvalidSimulation(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error")]
    Io(#[from] std::io::Error),
}

impl AnalysisError {
    /// Configuration-level errors are the caller's fault, not the data's.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AnalysisError::WeightsOutOfTolerance { .. }
                | AnalysisError::MissingBenchmarkSeries(_)
                | AnalysisError::InvalidWeight { .. }
                | AnalysisError::InvalidSimulation(_)
        )
    }
}

/// Result type alias for application-level operations
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_formatting_is_readable() {
        let err = AnalysisError::MissingBenchmarkSeries("VEA".to_string());
        assert_eq!(
            err.to_string(),
            "no return series supplied for benchmark ticker VEA"
        );

        let err = AnalysisError::WeightsOutOfTolerance {
            sum: dec!(0.95),
            tolerance: dec!(0.001),
        };
        assert_eq!(
            err.to_string(),
            "benchmark weights sum to 0.95, outside 1 ± 0.001"
        );
    }

    #[test]
    fn test_invalid_date_range_message() {
        let err = AnalysisError::InvalidDateRange {
            from: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "invalid date range: 2024-06-01 is after 2024-01-01"
        );
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_anyhow_context_chains_errors() {
        use anyhow::Context;
        let result: Result<()> = Err(AnalysisError::Parse("bad month".into()))
            .context("failed to load benchmark series");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("failed to load benchmark series"));
        assert!(format!("{:?}", err).contains("bad month"));
    }

    #[test]
    fn test_configuration_variants() {
        assert!(AnalysisError::MissingBenchmarkSeries("SPY".into()).is_configuration());
        assert!(AnalysisError::InvalidSimulation("years".into()).is_configuration());
        assert!(!AnalysisError::Parse("x".into()).is_configuration());
    }
}
