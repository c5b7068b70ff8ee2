//! Monthly aggregation: sorted transactions → contiguous month buckets.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

use crate::error::AnalysisError;
use crate::models::{Month, MonthBucket, Transaction, TransactionType};

/// Which transactions count as money entering or leaving the portfolio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CashFlowBasis {
    /// Transfers in/out of the account (contributions and withdrawals)
    #[default]
    External,
    /// Purchases are contributions and sales withdrawals; cash is not tracked
    Trades,
}

impl CashFlowBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            CashFlowBasis::External => "external",
            CashFlowBasis::Trades => "trades",
        }
    }
}

impl FromStr for CashFlowBasis {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "external" | "transfers" => Ok(CashFlowBasis::External),
            "trades" => Ok(CashFlowBasis::Trades),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AggregationOptions {
    pub cash_flow_basis: CashFlowBasis,
    /// Emit empty buckets up to the window's end month
    pub carry_forward_to_end: bool,
}

/// Signed external flow of one transaction: positive money in, negative out
pub fn cash_flow(tx: &Transaction, basis: CashFlowBasis) -> Decimal {
    let value = tx.flow_value();
    match (basis, tx.transaction_type) {
        (CashFlowBasis::External, TransactionType::TransferIn) => value,
        (CashFlowBasis::External, TransactionType::TransferOut) => -value,
        (CashFlowBasis::Trades, TransactionType::Buy) => value,
        (CashFlowBasis::Trades, TransactionType::Sell) => -value,
        // In-kind security transfers move value even when trades drive flows
        (CashFlowBasis::Trades, TransactionType::TransferIn) if is_in_kind(tx) => value,
        (CashFlowBasis::Trades, TransactionType::TransferOut) if is_in_kind(tx) => -value,
        _ => Decimal::ZERO,
    }
}

fn is_in_kind(tx: &Transaction) -> bool {
    tx.security_id.is_some() && tx.quantity.is_some_and(|q| !q.is_zero())
}

/// Fees counted for the month; unclassified records never contribute
fn fee_contribution(tx: &Transaction) -> Decimal {
    if tx.transaction_type == TransactionType::Other {
        Decimal::ZERO
    } else {
        tx.total_fees()
    }
}

/// Bucket transactions dated within `[from, to]` into calendar months.
///
/// Input order is not trusted: transactions are stably sorted by date first.
/// Every month between the first and last month with data gets a bucket,
/// empty ones included, so positions can be carried across quiet months.
pub fn aggregate(
    transactions: &[Transaction],
    from: NaiveDate,
    to: NaiveDate,
    options: &AggregationOptions,
) -> Result<Vec<MonthBucket>, AnalysisError> {
    if from > to {
        return Err(AnalysisError::InvalidDateRange { from, to });
    }

    let mut in_range: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.date >= from && t.date <= to)
        .collect();
    in_range.sort_by_key(|t| t.date);

    let (Some(first), Some(last)) = (in_range.first(), in_range.last()) else {
        debug!("No transactions between {} and {}", from, to);
        return Ok(Vec::new());
    };

    let first_month = first.month();
    let last_month = if options.carry_forward_to_end {
        Month::from_date(to)
    } else {
        last.month()
    };

    let mut buckets: Vec<MonthBucket> = Month::range_inclusive(first_month, last_month)
        .map(MonthBucket::empty)
        .collect();

    for tx in in_range {
        let idx = first_month.count_through(tx.month()) - 1;
        let bucket = &mut buckets[idx];
        bucket.net_cash_flow += cash_flow(tx, options.cash_flow_basis);
        bucket.fee_total += fee_contribution(tx);
        bucket.transactions.push(tx.clone());
    }

    debug!(
        "Aggregated {} buckets ({} empty) from {} to {}",
        buckets.len(),
        buckets.iter().filter(|b| b.is_empty()).count(),
        first_month,
        last_month
    );

    Ok(buckets)
}
