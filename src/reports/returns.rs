use chrono::Datelike;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::models::{MonthBucket, MonthlyReturn, PositionSnapshot, ReturnsAnalysis};
use crate::reports::monthly::{cash_flow, CashFlowBasis};
use crate::warnings::{DataWarning, WarningKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReturnMethod {
    /// Month-level flows adjust the ending value; timing is ignored
    #[default]
    TimeWeighted,
    /// Modified Dietz: flows weighted by the fraction of the month invested
    ModifiedDietz,
}

impl ReturnMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnMethod::TimeWeighted => "time-weighted",
            ReturnMethod::ModifiedDietz => "modified-dietz",
        }
    }
}

impl FromStr for ReturnMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "twr" | "time-weighted" | "time_weighted" => Ok(ReturnMethod::TimeWeighted),
            "dietz" | "modified-dietz" | "money-weighted" | "mwr" => {
                Ok(ReturnMethod::ModifiedDietz)
            }
            _ => Err(()),
        }
    }
}

/// What to do with a month whose valuation is missing prices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriceGapPolicy {
    /// No return for a month whose own or previous snapshot has gaps
    #[default]
    Skip,
    /// Compute on the priced value anyway (the gap stays flagged)
    Include,
}

impl FromStr for PriceGapPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(PriceGapPolicy::Skip),
            "include" => Ok(PriceGapPolicy::Include),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReturnOptions {
    pub method: ReturnMethod,
    pub price_gap_policy: PriceGapPolicy,
    pub cash_flow_basis: CashFlowBasis,
}

/// Time-weighted monthly return: (V_m − V_{m−1} − CF_m) / V_{m−1}.
///
/// `None` when the starting value is zero.
pub fn time_weighted_return(
    previous_value: Decimal,
    value: Decimal,
    net_cash_flow: Decimal,
) -> Option<Decimal> {
    if previous_value.is_zero() {
        return None;
    }
    Some((value - previous_value - net_cash_flow) / previous_value)
}

/// Modified Dietz monthly return.
///
/// `flows` are (day of month, signed amount). A flow on day d is weighted by
/// (D − (d − 1)) / D, so a flow on the 1st counts for the whole month.
pub fn modified_dietz_return(
    previous_value: Decimal,
    value: Decimal,
    flows: &[(u32, Decimal)],
    days_in_month: u32,
) -> Option<Decimal> {
    let days = Decimal::from(days_in_month);
    let net: Decimal = flows.iter().map(|(_, amount)| *amount).sum();
    let weighted: Decimal = flows
        .iter()
        .map(|(day, amount)| {
            let invested = Decimal::from(days_in_month + 1 - (*day).clamp(1, days_in_month));
            *amount * invested / days
        })
        .sum();

    let denominator = previous_value + weighted;
    if denominator.is_zero() {
        return None;
    }
    Some((value - previous_value - net) / denominator)
}

/// Derive one return per month from consecutive snapshots.
///
/// `snapshots[i]` must be the valuation after `buckets[i]`. The first month
/// has no predecessor and never produces a return.
pub fn calculate_monthly_returns(
    snapshots: &[PositionSnapshot],
    buckets: &[MonthBucket],
    options: &ReturnOptions,
) -> (Vec<MonthlyReturn>, Vec<DataWarning>) {
    let mut returns = Vec::new();
    let mut warnings = Vec::new();

    for (i, (snapshot, bucket)) in snapshots.iter().zip(buckets).enumerate().skip(1) {
        debug_assert_eq!(snapshot.month, bucket.month);
        let previous = &snapshots[i - 1];

        if !(snapshot.is_complete() && previous.is_complete())
            && options.price_gap_policy == PriceGapPolicy::Skip
        {
            debug!("Skipping {}: valuation has price gaps", snapshot.month);
            continue;
        }

        let value = match options.method {
            ReturnMethod::TimeWeighted => time_weighted_return(
                previous.market_value,
                snapshot.market_value,
                bucket.net_cash_flow,
            ),
            ReturnMethod::ModifiedDietz => {
                let flows: Vec<(u32, Decimal)> = bucket
                    .transactions
                    .iter()
                    .map(|tx| (tx.date.day(), cash_flow(tx, options.cash_flow_basis)))
                    .filter(|(_, amount)| !amount.is_zero())
                    .collect();
                modified_dietz_return(
                    previous.market_value,
                    snapshot.market_value,
                    &flows,
                    snapshot.month.days_in_month(),
                )
            }
        };

        match value {
            Some(portfolio_return) => returns.push(MonthlyReturn {
                month: snapshot.month,
                portfolio_return,
                portfolio_value: snapshot.market_value,
                benchmark_return: None,
                benchmark_value: None,
            }),
            None => {
                warn!("Return for {} is undefined (zero starting value)", snapshot.month);
                warnings.push(
                    DataWarning::new(
                        WarningKind::UndefinedReturn,
                        "starting value is zero; month skipped",
                    )
                    .with_month(snapshot.month),
                );
            }
        }
    }

    (returns, warnings)
}

/// Geometric total: Π(1 + r) − 1
pub fn total_return<I>(returns: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    returns
        .into_iter()
        .fold(Decimal::ONE, |growth, r| growth * (Decimal::ONE + r))
        - Decimal::ONE
}

/// (1 + total)^(12 / months) − 1.
///
/// Zero months annualize to 0. A total loss (1 + total ≤ 0) annualizes to −1.
pub fn annualized_return(total: Decimal, months: usize) -> Decimal {
    if months == 0 {
        return Decimal::ZERO;
    }
    let base = Decimal::ONE + total;
    if base <= Decimal::ZERO {
        return Decimal::NEGATIVE_ONE;
    }

    let exponent = Decimal::from(12) / Decimal::from(months as u64);
    match base.checked_powd(exponent) {
        Some(growth) => growth - Decimal::ONE,
        None => {
            warn!("Annualizing {} over {} months overflows", total, months);
            Decimal::MAX
        }
    }
}

/// Assemble the report from a monthly series.
///
/// Benchmark totals use only the months that carry a benchmark return.
pub fn summarize(monthly_returns: Vec<MonthlyReturn>) -> ReturnsAnalysis {
    let months = monthly_returns.len();
    let total = total_return(monthly_returns.iter().map(|r| r.portfolio_return));
    let annualized = annualized_return(total, months);

    let benchmark: Vec<Decimal> = monthly_returns
        .iter()
        .filter_map(|r| r.benchmark_return)
        .collect();
    let (benchmark_total, benchmark_annualized) = if benchmark.is_empty() {
        (None, None)
    } else {
        let total = total_return(benchmark.iter().copied());
        (Some(total), Some(annualized_return(total, benchmark.len())))
    };

    ReturnsAnalysis {
        monthly_returns,
        total_return: total,
        annualized_return: annualized,
        benchmark_total_return: benchmark_total,
        benchmark_annualized_return: benchmark_annualized,
        outperformance: benchmark_annualized.map(|b| annualized - b),
    }
}
