//! Weighted-allocation benchmark built from external monthly return series.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::AnalysisError;
use crate::models::{Month, MonthlyReturn, MonthlySeries, SeriesByTicker};
use crate::warnings::{DataWarning, WarningKind};

/// Allowed distance of the weight sum from 1
pub const DEFAULT_WEIGHT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Benchmark definition: ticker → weight
pub type Allocation = BTreeMap<String, Decimal>;

#[derive(Debug, Clone, Copy)]
pub struct BenchmarkOptions {
    pub tolerance: Decimal,
    /// Reject weight sums outside tolerance instead of warning
    pub strict: bool,
}

impl Default for BenchmarkOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_WEIGHT_TOLERANCE,
            strict: false,
        }
    }
}

/// Weighted benchmark return per month, plus the months that had to be skipped
#[derive(Debug, Clone, Default)]
pub struct BenchmarkSeries {
    pub returns: MonthlySeries,
    pub warnings: Vec<DataWarning>,
}

/// Check weights before any series is touched.
///
/// Negative weights are always fatal. A sum outside `1 ± tolerance` is fatal
/// in strict mode and a `WeightTolerance` warning otherwise.
pub fn validate_allocation(
    allocation: &Allocation,
    options: &BenchmarkOptions,
) -> Result<Vec<DataWarning>, AnalysisError> {
    if allocation.is_empty() {
        return Ok(Vec::new());
    }
    if let Some((ticker, weight)) = allocation.iter().find(|(_, w)| **w < Decimal::ZERO) {
        return Err(AnalysisError::InvalidWeight {
            ticker: ticker.clone(),
            weight: *weight,
        });
    }

    let sum: Decimal = allocation.values().sum();
    if (sum - Decimal::ONE).abs() <= options.tolerance {
        return Ok(Vec::new());
    }

    if options.strict {
        return Err(AnalysisError::WeightsOutOfTolerance {
            sum,
            tolerance: options.tolerance,
        });
    }

    warn!("Benchmark weights sum to {}; applying them as given", sum);
    Ok(vec![DataWarning::new(
        WarningKind::WeightTolerance,
        format!(
            "weights sum to {}, outside 1 ± {}; applied unnormalized",
            sum, options.tolerance
        ),
    )])
}

/// Σ weight × return for each requested month.
///
/// A month missing from any constituent is skipped entirely and flagged
/// `BenchmarkGap`; it is never zero-filled. A constituent with no series at
/// all is a configuration error.
pub fn weighted_returns<I>(
    allocation: &Allocation,
    series: &SeriesByTicker,
    months: I,
    options: &BenchmarkOptions,
) -> Result<BenchmarkSeries, AnalysisError>
where
    I: IntoIterator<Item = Month>,
{
    let mut warnings = validate_allocation(allocation, options)?;

    let constituents: Vec<(&String, Decimal, &MonthlySeries)> = allocation
        .iter()
        .filter(|(_, weight)| !weight.is_zero())
        .map(|(ticker, weight)| match series.get(ticker) {
            Some(s) if !s.is_empty() => Ok((ticker, *weight, s)),
            _ => Err(AnalysisError::MissingBenchmarkSeries(ticker.clone())),
        })
        .collect::<Result<_, _>>()?;

    let mut returns = MonthlySeries::new();
    if constituents.is_empty() {
        return Ok(BenchmarkSeries { returns, warnings });
    }

    for month in months {
        let missing: Vec<&str> = constituents
            .iter()
            .filter(|(_, _, s)| !s.contains_key(&month))
            .map(|(ticker, _, _)| ticker.as_str())
            .collect();

        if !missing.is_empty() {
            warn!("Benchmark skips {}: no return for {}", month, missing.join(", "));
            warnings.push(
                DataWarning::new(
                    WarningKind::BenchmarkGap,
                    format!("no return for {}", missing.join(", ")),
                )
                .with_month(month),
            );
            continue;
        }

        let weighted: Decimal = constituents
            .iter()
            .map(|(_, weight, s)| *weight * s.get(&month).copied().unwrap_or_default())
            .sum();
        returns.insert(month, weighted);
    }

    debug!(
        "Benchmark computed for {} months ({} gaps)",
        returns.len(),
        warnings
            .iter()
            .filter(|w| w.kind == WarningKind::BenchmarkGap)
            .count()
    );

    Ok(BenchmarkSeries { returns, warnings })
}

/// Fill benchmark fields of a portfolio series.
///
/// `benchmark_value` grows `base_value` (the portfolio's value just before
/// the first return month) by the benchmark's returns; gap months keep both
/// fields empty and the value carries over.
pub fn attach(monthly: &mut [MonthlyReturn], benchmark: &MonthlySeries, base_value: Decimal) {
    let mut value = base_value;
    for entry in monthly.iter_mut() {
        match benchmark.get(&entry.month) {
            Some(r) => {
                value *= Decimal::ONE + r;
                entry.benchmark_return = Some(*r);
                entry.benchmark_value = Some(value);
            }
            None => {
                entry.benchmark_return = None;
                entry.benchmark_value = None;
            }
        }
    }
}

/// Month-end prices → monthly returns, for consecutive months only
pub fn prices_to_returns(prices: &MonthlySeries) -> MonthlySeries {
    prices
        .iter()
        .filter_map(|(month, price)| {
            let previous = prices.get(&month.pred())?;
            if previous.is_zero() {
                return None;
            }
            Some((*month, price / previous - Decimal::ONE))
        })
        .collect()
}

/// Convert every ticker's month-end prices to monthly returns
pub fn returns_from_prices(prices: &SeriesByTicker) -> SeriesByTicker {
    prices
        .iter()
        .map(|(ticker, series)| (ticker.clone(), prices_to_returns(series)))
        .filter(|(_, returns)| !returns.is_empty())
        .collect()
}

/// Normalize allocation tickers to upper case, summing duplicates
pub fn normalize_allocation<I, S>(weights: I) -> Allocation
where
    I: IntoIterator<Item = (S, Decimal)>,
    S: AsRef<str>,
{
    let mut allocation = Allocation::new();
    for (ticker, weight) in weights {
        *allocation
            .entry(ticker.as_ref().trim().to_uppercase())
            .or_insert(Decimal::ZERO) += weight;
    }
    allocation
}
