//! End-to-end return analysis.
//!
//! Runs normalizer → aggregator → reconstructor → return calculator →
//! benchmark → statistics → reconciliation over inputs that were loaded
//! beforehand. No I/O happens here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::AnalysisError;
use crate::importers::{normalize, RawFeed};
use crate::models::{Month, PositionSnapshot, ReturnsAnalysis, SeriesByTicker};
use crate::reports::benchmark::{self, Allocation, BenchmarkOptions};
use crate::reports::monthly::{aggregate, AggregationOptions, CashFlowBasis};
use crate::reports::positions::{rewind_holdings, PriceTable, ReconstructionState, Reconstructor};
use crate::reports::reconcile::{reconcile, HoldingDifference};
use crate::reports::returns::{self, PriceGapPolicy, ReturnMethod, ReturnOptions};
use crate::reports::statistics::{self, ReturnStatistics};
use crate::warnings::DataWarning;

/// Where reconstruction starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpeningPositions {
    /// No positions before the first transaction
    #[default]
    Empty,
    /// Current holdings rewound through every transaction since the window start
    RewindHoldings,
}

impl FromStr for OpeningPositions {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "empty" => Ok(OpeningPositions::Empty),
            "rewind-holdings" | "rewind" => Ok(OpeningPositions::RewindHoldings),
            _ => Err(()),
        }
    }
}

/// Everything an analysis consumes, already loaded
#[derive(Debug, Clone, Default)]
pub struct AnalysisInput {
    pub feed: RawFeed,
    /// Month-end prices by ticker
    pub prices: SeriesByTicker,
    /// Benchmark constituent monthly returns by ticker
    pub benchmark_series: SeriesByTicker,
    pub allocation: Allocation,
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    /// Window start; defaults to the first transaction date
    pub from: Option<NaiveDate>,
    /// Window end; defaults to the last transaction date
    pub to: Option<NaiveDate>,
    pub method: ReturnMethod,
    pub cash_flow_basis: CashFlowBasis,
    pub price_gap_policy: PriceGapPolicy,
    pub carry_forward_to_end: bool,
    pub opening_positions: OpeningPositions,
    pub benchmark: BenchmarkOptions,
    pub reconcile_holdings: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub analysis: ReturnsAnalysis,
    pub statistics: ReturnStatistics,
    pub snapshots: Vec<PositionSnapshot>,
    pub holding_differences: Vec<HoldingDifference>,
    pub warnings: Vec<DataWarning>,
    pub transactions_used: usize,
    pub duplicates_dropped: usize,
}

pub fn analyze(
    input: &AnalysisInput,
    options: &AnalysisOptions,
) -> Result<AnalysisReport, AnalysisError> {
    let normalized = normalize(&input.feed);
    let mut warnings = normalized.warnings.clone();

    let from = options
        .from
        .or_else(|| normalized.transactions.first().map(|t| t.date));
    let to = options
        .to
        .or_else(|| normalized.transactions.last().map(|t| t.date));

    let (Some(from), Some(to)) = (from, to) else {
        info!("No transactions and no window; nothing to analyze");
        return Ok(AnalysisReport {
            from,
            to,
            analysis: returns::summarize(Vec::new()),
            statistics: ReturnStatistics::default(),
            snapshots: Vec::new(),
            holding_differences: Vec::new(),
            warnings,
            transactions_used: 0,
            duplicates_dropped: normalized.duplicates_dropped,
        });
    };
    if from > to {
        return Err(AnalysisError::InvalidDateRange { from, to });
    }
    benchmark::validate_allocation(&input.allocation, &options.benchmark)?;

    let buckets = aggregate(
        &normalized.transactions,
        from,
        to,
        &AggregationOptions {
            cash_flow_basis: options.cash_flow_basis,
            carry_forward_to_end: options.carry_forward_to_end,
        },
    )?;
    let transactions_used: usize = buckets.iter().map(|b| b.transactions.len()).sum();

    let cash_securities = normalized.cash_securities();
    let opening = match options.opening_positions {
        OpeningPositions::Empty => ReconstructionState::default(),
        OpeningPositions::RewindHoldings => {
            let since_start: Vec<_> = normalized
                .transactions
                .iter()
                .filter(|t| t.date >= from)
                .cloned()
                .collect();
            let (state, rewind_warnings) =
                rewind_holdings(&normalized.holdings, &since_start, &cash_securities);
            warnings.extend(rewind_warnings);
            state
        }
    };

    let prices = PriceTable::new(input.prices.clone(), normalized.tickers());
    debug!("Price table covers {} tickers", prices.ticker_count());
    let reconstruction = Reconstructor::new(&prices)
        .with_cash_securities(cash_securities.clone())
        .run(opening, &buckets);
    warnings.extend(reconstruction.warnings);

    let (mut monthly, return_warnings) = returns::calculate_monthly_returns(
        &reconstruction.snapshots,
        &buckets,
        &ReturnOptions {
            method: options.method,
            price_gap_policy: options.price_gap_policy,
            cash_flow_basis: options.cash_flow_basis,
        },
    );
    warnings.extend(return_warnings);

    if !input.allocation.is_empty() {
        let series = benchmark::weighted_returns(
            &input.allocation,
            &input.benchmark_series,
            monthly.iter().map(|r| r.month).collect::<Vec<_>>(),
            &options.benchmark,
        )?;
        warnings.extend(series.warnings);

        let base_value = monthly
            .first()
            .and_then(|first| {
                reconstruction
                    .snapshots
                    .iter()
                    .find(|s| s.month == first.month.pred())
            })
            .map(|s| s.market_value)
            .unwrap_or_default();
        benchmark::attach(&mut monthly, &series.returns, base_value);
    }

    let analysis = returns::summarize(monthly);
    let statistics = statistics::compute(
        &analysis.monthly_returns,
        &reconstruction.snapshots,
        Month::from_date(from),
        Month::from_date(to),
    );

    let mut holding_differences = Vec::new();
    let history_after_window = normalized.transactions.iter().any(|t| t.date > to);
    if options.reconcile_holdings && !normalized.holdings.is_empty() {
        if history_after_window {
            debug!("Skipping reconciliation: transactions exist after {}", to);
        } else {
            let (differences, reconcile_warnings) =
                reconcile(&reconstruction.final_state, &normalized.holdings, &cash_securities);
            holding_differences = differences;
            warnings.extend(reconcile_warnings);
        }
    }

    info!(
        "Analyzed {} to {}: {} monthly returns, {} warnings",
        from,
        to,
        analysis.monthly_returns.len(),
        warnings.len()
    );

    Ok(AnalysisReport {
        from: Some(from),
        to: Some(to),
        analysis,
        statistics,
        snapshots: reconstruction.snapshots,
        holding_differences,
        warnings,
        transactions_used,
        duplicates_dropped: normalized.duplicates_dropped,
    })
}
