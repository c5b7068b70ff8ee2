//! Canonical data model shared by every analysis stage.
//!
//! Only the normalizer builds `Transaction`/`Holding`/`Security` values from
//! vendor records; downstream stages never see raw shapes.

mod month;

pub use month::Month;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Month-keyed values for one ticker (month-end prices or monthly returns)
pub type MonthlySeries = BTreeMap<Month, Decimal>;

/// Monthly series keyed by ticker
pub type SeriesByTicker = BTreeMap<String, MonthlySeries>;

/// Canonical transaction type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Buy,
    Sell,
    Dividend,
    Fee,
    TransferIn,
    TransferOut,
    Other,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "BUY",
            TransactionType::Sell => "SELL",
            TransactionType::Dividend => "DIVIDEND",
            TransactionType::Fee => "FEE",
            TransactionType::TransferIn => "TRANSFER_IN",
            TransactionType::TransferOut => "TRANSFER_OUT",
            TransactionType::Other => "OTHER",
        }
    }

    /// Buys and inbound transfers add shares
    pub fn adds_shares(&self) -> bool {
        matches!(self, TransactionType::Buy | TransactionType::TransferIn)
    }

    /// Sells and outbound transfers remove shares
    pub fn removes_shares(&self) -> bool {
        matches!(self, TransactionType::Sell | TransactionType::TransferOut)
    }
}

impl FromStr for TransactionType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace([' ', '-'], "_").as_str() {
            "BUY" => Ok(TransactionType::Buy),
            "SELL" => Ok(TransactionType::Sell),
            "DIVIDEND" => Ok(TransactionType::Dividend),
            "FEE" => Ok(TransactionType::Fee),
            "TRANSFER_IN" => Ok(TransactionType::TransferIn),
            "TRANSFER_OUT" => Ok(TransactionType::TransferOut),
            "OTHER" => Ok(TransactionType::Other),
            _ => Err(()),
        }
    }
}

/// Normalized investment transaction. Immutable once built; identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub account_id: String,
    pub security_id: Option<String>,
    pub date: NaiveDate,
    pub transaction_type: TransactionType,
    /// Vendor subtype as received, kept for audit
    pub subtype: Option<String>,
    /// Signed currency value in the vendor's sign convention
    pub amount: Decimal,
    /// Signed share quantity
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
    /// Explicit fee field, separate from a fee-type amount
    pub fees: Option<Decimal>,
    pub name: Option<String>,
}

impl Transaction {
    pub fn month(&self) -> Month {
        Month::from_date(self.date)
    }

    /// Fees carried by this transaction: the explicit fee field plus the
    /// absolute amount when the transaction itself is a fee. The two sources
    /// are independent, so a record only counts twice when it carries both.
    pub fn total_fees(&self) -> Decimal {
        let explicit = self.fees.unwrap_or(Decimal::ZERO);
        let fee_amount = if self.transaction_type == TransactionType::Fee {
            self.amount.abs()
        } else {
            Decimal::ZERO
        };
        explicit + fee_amount
    }

    /// Currency value moved by the transaction.
    ///
    /// In-kind transfers often carry a zero amount; their value is then
    /// quantity × price.
    pub fn flow_value(&self) -> Decimal {
        if !self.amount.is_zero() {
            return self.amount.abs();
        }
        match (self.quantity, self.price) {
            (Some(q), Some(p)) => q.checked_mul(p).map(|v| v.abs()).unwrap_or(Decimal::ZERO),
            _ => Decimal::ZERO,
        }
    }

    /// Absolute share quantity, derived from amount / price when missing
    pub fn share_quantity(&self) -> Option<Decimal> {
        match self.quantity {
            Some(q) if !q.is_zero() => Some(q.abs()),
            _ => match self.price {
                Some(p) if !p.is_zero() && !self.amount.is_zero() => {
                    self.amount.checked_div(p).map(|q| q.abs())
                }
                _ => None,
            },
        }
    }
}

/// Security category as reported by the aggregator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SecurityType {
    Equity,
    Etf,
    MutualFund,
    FixedIncome,
    Cash,
    Derivative,
    Other,
}

impl SecurityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityType::Equity => "EQUITY",
            SecurityType::Etf => "ETF",
            SecurityType::MutualFund => "MUTUAL_FUND",
            SecurityType::FixedIncome => "FIXED_INCOME",
            SecurityType::Cash => "CASH",
            SecurityType::Derivative => "DERIVATIVE",
            SecurityType::Other => "OTHER",
        }
    }
}

impl FromStr for SecurityType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equity" | "stock" => Ok(SecurityType::Equity),
            "etf" => Ok(SecurityType::Etf),
            "mutual fund" | "mutual_fund" => Ok(SecurityType::MutualFund),
            "fixed income" | "fixed_income" | "bond" => Ok(SecurityType::FixedIncome),
            "cash" | "money market" => Ok(SecurityType::Cash),
            "derivative" | "option" => Ok(SecurityType::Derivative),
            "" => Err(()),
            _ => Ok(SecurityType::Other),
        }
    }
}

/// Security reference entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Security {
    pub security_id: String,
    /// None for non-tradeable cash positions
    pub ticker: Option<String>,
    pub name: Option<String>,
    pub security_type: SecurityType,
}

/// Point-in-time holding snapshot ("current"), used only for reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub account_id: String,
    pub security_id: String,
    pub quantity: Decimal,
    pub cost_basis: Option<Decimal>,
}

/// One calendar month of transactions, derived per run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthBucket {
    pub month: Month,
    /// Chronological within the month
    pub transactions: Vec<Transaction>,
    pub net_cash_flow: Decimal,
    pub fee_total: Decimal,
}

impl MonthBucket {
    pub fn empty(month: Month) -> Self {
        Self {
            month,
            transactions: Vec::new(),
            net_cash_flow: Decimal::ZERO,
            fee_total: Decimal::ZERO,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Number of buys and sells in the month
    pub fn trade_count(&self) -> usize {
        self.transactions
            .iter()
            .filter(|t| {
                matches!(
                    t.transaction_type,
                    TransactionType::Buy | TransactionType::Sell
                )
            })
            .count()
    }
}

/// Running per-security position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub quantity: Decimal,
    pub cost_basis: Decimal,
}

impl Position {
    pub fn average_cost(&self) -> Decimal {
        if self.quantity > Decimal::ZERO {
            self.cost_basis / self.quantity
        } else {
            Decimal::ZERO
        }
    }
}

/// End-of-month holdings and valuation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSnapshot {
    pub month: Month,
    pub positions: BTreeMap<String, Position>,
    /// Sum of quantity × month-end price over priced securities only
    pub market_value: Decimal,
    /// Cumulative realized gain through this month
    pub realized_gain: Decimal,
    /// Held securities with no price this month (excluded from market_value)
    pub unpriced: Vec<String>,
}

impl PositionSnapshot {
    /// True when every held security was priced
    pub fn is_complete(&self) -> bool {
        self.unpriced.is_empty()
    }

    pub fn quantity(&self, security_id: &str) -> Decimal {
        self.positions
            .get(security_id)
            .map(|p| p.quantity)
            .unwrap_or(Decimal::ZERO)
    }
}

/// One month of the output series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReturn {
    pub month: Month,
    pub portfolio_return: Decimal,
    pub portfolio_value: Decimal,
    pub benchmark_return: Option<Decimal>,
    pub benchmark_value: Option<Decimal>,
}

/// The final report of an analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnsAnalysis {
    pub monthly_returns: Vec<MonthlyReturn>,
    pub total_return: Decimal,
    pub annualized_return: Decimal,
    pub benchmark_total_return: Option<Decimal>,
    pub benchmark_annualized_return: Option<Decimal>,
    pub outperformance: Option<Decimal>,
}
