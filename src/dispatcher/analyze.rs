//! Analyze command dispatcher implementation

use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::str::FromStr;
use tracing::info;

use super::{parse_optional_date, Bound};
use crate::cli::formatters::format_analysis_table;
use crate::cli::AnalyzeArgs;
use monthly_returns::config::Config;
use monthly_returns::importers;
use monthly_returns::models::SeriesByTicker;
use monthly_returns::reports::{
    analyze, normalize_allocation, returns_from_prices, write_audit_csv, Allocation,
    AnalysisInput, AnalysisOptions, CashFlowBasis, OpeningPositions, PriceGapPolicy,
    ReturnMethod,
};

/// Parse an option value with a `FromStr<Err = ()>` enum, naming the choices on failure
fn parse_choice<T: FromStr>(value: &str, flag: &str, choices: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| anyhow!("Invalid {} '{}'. Use: {}", flag, value, choices))
}

/// Parse repeated `TICKER=WEIGHT` arguments into an allocation
fn parse_weights(weights: &[String]) -> Result<Allocation> {
    let entries = weights
        .iter()
        .map(|entry| -> Result<(String, Decimal)> {
            let (ticker, weight) = entry
                .split_once('=')
                .ok_or_else(|| anyhow!("Invalid weight '{}'. Use TICKER=WEIGHT", entry))?;
            let weight = Decimal::from_str(weight.trim())
                .with_context(|| format!("Invalid weight value in '{}'", entry))?;
            if ticker.trim().is_empty() {
                return Err(anyhow!("Missing ticker in weight '{}'", entry));
            }
            Ok((ticker.to_string(), weight))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(normalize_allocation(entries))
}

/// Constituent returns from the returns CSV, completed by any price CSV.
///
/// A ticker present in both keeps its stated returns.
fn load_benchmark_series(args: &AnalyzeArgs, config: &Config) -> Result<Option<SeriesByTicker>> {
    let returns_path = args
        .benchmark
        .clone()
        .or_else(|| config.benchmark.series.clone());
    if returns_path.is_none() && args.benchmark_prices.is_none() {
        return Ok(None);
    }

    let mut series = match &returns_path {
        Some(path) => importers::load_benchmark_returns(path)?,
        None => SeriesByTicker::new(),
    };
    if let Some(path) = &args.benchmark_prices {
        for (ticker, returns) in returns_from_prices(&importers::load_prices(path)?) {
            series.entry(ticker).or_insert(returns);
        }
    }
    Ok(Some(series))
}

/// Merge CLI flags over the configured analysis settings
fn build_options(args: &AnalyzeArgs, config: &Config) -> Result<AnalysisOptions> {
    let defaults = &config.analysis;

    let method = match args.method.as_deref() {
        Some(m) => parse_choice::<ReturnMethod>(m, "method", "time-weighted, modified-dietz")?,
        None => defaults.method,
    };
    let cash_flow_basis = match args.cash_flow_basis.as_deref() {
        Some(b) => parse_choice::<CashFlowBasis>(b, "cash flow basis", "external, trades")?,
        None => defaults.cash_flow_basis,
    };
    let price_gap_policy = match args.price_gap_policy.as_deref() {
        Some(p) => parse_choice::<PriceGapPolicy>(p, "price gap policy", "skip, include")?,
        None => defaults.price_gap_policy,
    };
    let opening_positions = match args.opening_positions.as_deref() {
        Some(o) => {
            parse_choice::<OpeningPositions>(o, "opening positions", "empty, rewind-holdings")?
        }
        None => defaults.opening_positions,
    };

    let mut benchmark = config.benchmark.options();
    benchmark.strict |= args.strict;

    Ok(AnalysisOptions {
        from: parse_optional_date(args.from.as_deref(), Bound::Start)?,
        to: parse_optional_date(args.to.as_deref(), Bound::End)?,
        method,
        cash_flow_basis,
        price_gap_policy,
        carry_forward_to_end: args.carry_forward || defaults.carry_forward_to_end,
        opening_positions,
        benchmark,
        reconcile_holdings: defaults.reconcile_holdings && !args.no_reconcile,
    })
}

pub fn dispatch_analyze(args: &AnalyzeArgs, config: &Config, json_output: bool) -> Result<()> {
    let options = build_options(args, config)?;

    let allocation = if args.weights.is_empty() {
        config.benchmark.allocation.clone()
    } else {
        parse_weights(&args.weights)?
    };
    let benchmark_series = load_benchmark_series(args, config)?;
    if !allocation.is_empty() && benchmark_series.is_none() {
        return Err(anyhow!(
            "A benchmark allocation is configured but no benchmark series was given \
             (--benchmark or --benchmark-prices)"
        ));
    }

    let input = AnalysisInput {
        feed: importers::load_feed(&args.feed)?,
        prices: importers::load_prices(&args.prices)?,
        benchmark_series: benchmark_series.unwrap_or_default(),
        allocation,
    };

    let report = analyze(&input, &options)?;

    if let Some(path) = &args.audit_csv {
        let constituents: Vec<String> = input.allocation.keys().cloned().collect();
        let file = File::create(path)
            .with_context(|| format!("Failed to create audit file: {}", path.display()))?;
        write_audit_csv(
            file,
            &report.analysis.monthly_returns,
            &constituents,
            &input.benchmark_series,
        )?;
        info!("Audit trail written to {}", path.display());
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", format_analysis_table(&report, args.verbose));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_weights() {
        let allocation = parse_weights(&["spy=0.98".into(), "VEA = 0.02".into()]).unwrap();
        assert_eq!(allocation["SPY"], dec!(0.98));
        assert_eq!(allocation["VEA"], dec!(0.02));

        let summed = parse_weights(&["spy=0.5".into(), "SPY=0.5".into()]).unwrap();
        assert_eq!(summed.len(), 1);
        assert_eq!(summed["SPY"], dec!(1.0));
    }

    #[test]
    fn test_parse_weights_rejects_bad_entries() {
        assert!(parse_weights(&["SPY".into()]).is_err());
        assert!(parse_weights(&["SPY=abc".into()]).is_err());
        assert!(parse_weights(&["=0.5".into()]).is_err());
    }

    #[test]
    fn test_parse_choice_names_options() {
        let err = parse_choice::<ReturnMethod>("irr", "method", "time-weighted, modified-dietz")
            .unwrap_err();
        assert!(err.to_string().contains("time-weighted"));
        assert_eq!(
            parse_choice::<ReturnMethod>("modified-dietz", "method", "").unwrap(),
            ReturnMethod::ModifiedDietz
        );
    }
}
