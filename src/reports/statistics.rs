use rust_decimal::prelude::*;
use serde::Serialize;

use crate::models::{Month, MonthlyReturn, PositionSnapshot};

/// A single month's figure, e.g. best or worst return
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthValue {
    pub month: Month,
    pub value: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReturnStatistics {
    pub months: usize,
    pub average_monthly_return: Decimal,
    pub annualized_volatility: Decimal,
    pub best_month: Option<MonthValue>,
    pub worst_month: Option<MonthValue>,
    /// Largest peak-to-trough decline of the compounded path, as a positive fraction
    pub max_drawdown: Decimal,
    pub benchmark_average_monthly_return: Option<Decimal>,
    pub benchmark_annualized_volatility: Option<Decimal>,
    /// Fully priced months in the window / calendar months in the window
    pub coverage: Decimal,
    pub complete_months: usize,
    pub expected_months: usize,
}

/// Arithmetic mean; 0 for an empty slice
pub fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    values.iter().sum::<Decimal>() / Decimal::from(values.len() as u64)
}

/// Population standard deviation; 0 for an empty slice
pub fn population_std_dev(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    let avg = mean(values);
    let variance = values
        .iter()
        .map(|v| (*v - avg) * (*v - avg))
        .sum::<Decimal>()
        / Decimal::from(values.len() as u64);
    variance.sqrt().unwrap_or(Decimal::ZERO)
}

/// Monthly standard deviation scaled by √12
pub fn annualized_volatility(monthly: &[Decimal]) -> Decimal {
    let sqrt_12 = Decimal::from(12).sqrt().unwrap_or(Decimal::ZERO);
    population_std_dev(monthly) * sqrt_12
}

pub fn max_drawdown(returns: &[Decimal]) -> Decimal {
    let mut growth = Decimal::ONE;
    let mut peak = Decimal::ONE;
    let mut worst = Decimal::ZERO;
    for r in returns {
        growth *= Decimal::ONE + r;
        if growth > peak {
            peak = growth;
        } else if peak > Decimal::ZERO {
            worst = worst.max((peak - growth) / peak);
        }
    }
    worst
}

pub fn coverage(complete_months: usize, expected_months: usize) -> Decimal {
    if expected_months == 0 {
        return Decimal::ZERO;
    }
    Decimal::from(complete_months as u64) / Decimal::from(expected_months as u64)
}

/// Statistics for a return series over the requested `[from, to]` window
pub fn compute(
    monthly: &[MonthlyReturn],
    snapshots: &[PositionSnapshot],
    from: Month,
    to: Month,
) -> ReturnStatistics {
    let returns: Vec<Decimal> = monthly.iter().map(|r| r.portfolio_return).collect();
    let benchmark: Vec<Decimal> = monthly.iter().filter_map(|r| r.benchmark_return).collect();

    let best_month = monthly
        .iter()
        .max_by(|a, b| a.portfolio_return.cmp(&b.portfolio_return))
        .map(|r| MonthValue {
            month: r.month,
            value: r.portfolio_return,
        });
    let worst_month = monthly
        .iter()
        .min_by(|a, b| a.portfolio_return.cmp(&b.portfolio_return))
        .map(|r| MonthValue {
            month: r.month,
            value: r.portfolio_return,
        });

    let expected_months = from.count_through(to);
    let complete_months = snapshots
        .iter()
        .filter(|s| s.month >= from && s.month <= to && s.is_complete())
        .count();

    let (benchmark_average, benchmark_volatility) = if benchmark.is_empty() {
        (None, None)
    } else {
        (Some(mean(&benchmark)), Some(annualized_volatility(&benchmark)))
    };

    ReturnStatistics {
        months: returns.len(),
        average_monthly_return: mean(&returns),
        annualized_volatility: annualized_volatility(&returns),
        best_month,
        worst_month,
        max_drawdown: max_drawdown(&returns),
        benchmark_average_monthly_return: benchmark_average,
        benchmark_annualized_volatility: benchmark_volatility,
        coverage: coverage(complete_months, expected_months),
        complete_months,
        expected_months,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn month(s: &str) -> Month {
        s.parse().unwrap()
    }

    fn close(a: Decimal, b: Decimal) -> bool {
        (a - b).abs() < dec!(0.000001)
    }

    fn ret(m: &str, r: Decimal) -> MonthlyReturn {
        MonthlyReturn {
            month: month(m),
            portfolio_return: r,
            portfolio_value: Decimal::ZERO,
            benchmark_return: None,
            benchmark_value: None,
        }
    }

    fn snapshot(m: &str, gap: bool) -> PositionSnapshot {
        PositionSnapshot {
            month: month(m),
            positions: BTreeMap::new(),
            market_value: Decimal::ZERO,
            realized_gain: Decimal::ZERO,
            unpriced: if gap { vec!["X".into()] } else { Vec::new() },
        }
    }

    #[test]
    fn test_mean_and_population_volatility() {
        let values = [dec!(0.01), dec!(0.03), dec!(-0.01), dec!(0.01)];
        assert_eq!(mean(&values), dec!(0.01));
        // deviations 0, .02, -.02, 0 → variance 0.0002
        let std = population_std_dev(&values);
        assert!(close(std, dec!(0.0141421356)));
        assert!(close(annualized_volatility(&values), dec!(0.0489897949)));
    }

    #[test]
    fn test_empty_inputs_are_zero() {
        assert_eq!(mean(&[]), Decimal::ZERO);
        assert_eq!(population_std_dev(&[]), Decimal::ZERO);
        assert_eq!(max_drawdown(&[]), Decimal::ZERO);
        assert_eq!(coverage(0, 0), Decimal::ZERO);

        let stats = compute(&[], &[], month("2024-01"), month("2024-12"));
        assert_eq!(stats.months, 0);
        assert_eq!(stats.coverage, Decimal::ZERO);
        assert_eq!(stats.best_month, None);
    }

    #[test]
    fn test_max_drawdown_tracks_peak() {
        // 1.0 → 1.1 → 0.88 → 0.968 → 1.1616
        let dd = max_drawdown(&[dec!(0.1), dec!(-0.2), dec!(0.1), dec!(0.2)]);
        assert_eq!(dd, dec!(0.2));
        assert_eq!(max_drawdown(&[dec!(0.01), dec!(0.02)]), Decimal::ZERO);
    }

    #[test]
    fn test_coverage_counts_complete_months_in_window() {
        let snapshots = vec![
            snapshot("2023-12", false),
            snapshot("2024-01", false),
            snapshot("2024-02", true),
            snapshot("2024-03", false),
        ];
        let monthly = vec![ret("2024-01", dec!(0.02)), ret("2024-03", dec!(-0.01))];
        let stats = compute(&monthly, &snapshots, month("2024-01"), month("2024-04"));

        assert_eq!(stats.expected_months, 4);
        assert_eq!(stats.complete_months, 2);
        assert_eq!(stats.coverage, dec!(0.5));
        assert_eq!(stats.best_month.unwrap().month, month("2024-01"));
        assert_eq!(stats.worst_month.unwrap().value, dec!(-0.01));
        assert_eq!(stats.benchmark_annualized_volatility, None);
    }
}
