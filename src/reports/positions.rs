//! Position reconstruction: a pure fold of month buckets into end-of-month
//! holdings, cost basis and market value.
//!
//! Each step takes the previous state and one bucket and returns a new state;
//! nothing is mutated in place, so a single month can be tested in isolation.
//! Cost basis follows the average cost method.

use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::models::{
    Holding, Month, MonthBucket, Position, PositionSnapshot, SeriesByTicker, Transaction,
    TransactionType,
};
use crate::warnings::{DataWarning, WarningKind};

/// Month-end price lookup. `None` means the price is unavailable.
pub trait PriceSource {
    fn price(&self, security_id: &str, month: Month) -> Option<Decimal>;
}

impl<F> PriceSource for F
where
    F: Fn(&str, Month) -> Option<Decimal>,
{
    fn price(&self, security_id: &str, month: Month) -> Option<Decimal> {
        self(security_id, month)
    }
}

/// Month-end prices keyed by ticker, resolved through a security → ticker map.
///
/// A security with no ticker mapping is looked up under its own id.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    prices: SeriesByTicker,
    tickers: HashMap<String, String>,
}

impl PriceTable {
    pub fn new(prices: SeriesByTicker, tickers: HashMap<String, String>) -> Self {
        Self { prices, tickers }
    }

    pub fn insert(&mut self, ticker: &str, month: Month, price: Decimal) {
        self.prices
            .entry(ticker.to_string())
            .or_default()
            .insert(month, price);
    }

    pub fn ticker_for<'a>(&'a self, security_id: &'a str) -> &'a str {
        self.tickers
            .get(security_id)
            .map(String::as_str)
            .unwrap_or(security_id)
    }

    pub fn ticker_count(&self) -> usize {
        self.prices.len()
    }
}

impl PriceSource for PriceTable {
    fn price(&self, security_id: &str, month: Month) -> Option<Decimal> {
        self.prices
            .get(self.ticker_for(security_id))
            .and_then(|series| series.get(&month))
            .copied()
    }
}

/// Running state carried between months
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconstructionState {
    /// Open positions only; a fully sold security is removed
    pub positions: BTreeMap<String, Position>,
    pub realized_gain: Decimal,
}

impl ReconstructionState {
    pub fn quantity(&self, security_id: &str) -> Decimal {
        self.positions
            .get(security_id)
            .map(|p| p.quantity)
            .unwrap_or(Decimal::ZERO)
    }
}

/// Result of folding one bucket
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub state: ReconstructionState,
    pub snapshot: PositionSnapshot,
    pub warnings: Vec<DataWarning>,
}

/// Full reconstruction over a bucket sequence
#[derive(Debug, Clone, Default)]
pub struct Reconstruction {
    pub snapshots: Vec<PositionSnapshot>,
    pub final_state: ReconstructionState,
    pub warnings: Vec<DataWarning>,
}

/// Folds buckets with a fixed price source.
///
/// Securities in `cash_securities` are cash balances, not equity positions:
/// their transactions stay in the ledger but never move share quantities.
pub struct Reconstructor<'a> {
    prices: &'a dyn PriceSource,
    cash_securities: BTreeSet<String>,
}

impl<'a> Reconstructor<'a> {
    pub fn new(prices: &'a dyn PriceSource) -> Self {
        Self {
            prices,
            cash_securities: BTreeSet::new(),
        }
    }

    pub fn with_cash_securities(mut self, cash_securities: BTreeSet<String>) -> Self {
        self.cash_securities = cash_securities;
        self
    }

    /// Run the fold over chronologically ordered buckets
    pub fn run(&self, opening: ReconstructionState, buckets: &[MonthBucket]) -> Reconstruction {
        let mut state = opening;
        let mut snapshots = Vec::with_capacity(buckets.len());
        let mut warnings = Vec::new();

        for bucket in buckets {
            let outcome = self.step(&state, bucket);
            state = outcome.state;
            snapshots.push(outcome.snapshot);
            warnings.extend(outcome.warnings);
        }

        debug!(
            "Reconstructed {} snapshots, {} open positions",
            snapshots.len(),
            state.positions.len()
        );

        Reconstruction {
            snapshots,
            final_state: state,
            warnings,
        }
    }

    /// Apply one month's transactions and value the result at month end
    pub fn step(&self, previous: &ReconstructionState, bucket: &MonthBucket) -> StepOutcome {
        let mut state = previous.clone();
        let mut warnings = Vec::new();

        for tx in &bucket.transactions {
            let Some(security_id) = tx.security_id.as_deref() else {
                continue;
            };
            if self.cash_securities.contains(security_id) {
                continue;
            }
            if tx.transaction_type.adds_shares() {
                self.apply_addition(&mut state, security_id, tx, bucket.month, &mut warnings);
            } else if tx.transaction_type.removes_shares() {
                apply_removal(&mut state, security_id, tx, bucket.month, &mut warnings);
            }
        }

        let snapshot = self.value(&state, bucket.month, &mut warnings);
        StepOutcome {
            state,
            snapshot,
            warnings,
        }
    }

    fn apply_addition(
        &self,
        state: &mut ReconstructionState,
        security_id: &str,
        tx: &Transaction,
        month: Month,
        warnings: &mut Vec<DataWarning>,
    ) {
        let Some(quantity) = tx.share_quantity() else {
            warnings.push(missing_quantity(tx, security_id, month));
            return;
        };

        // In-kind transfers without a stated value are booked at the month's price
        let mut cost = Some(tx.flow_value());
        if cost.is_some_and(|c| c.is_zero()) {
            if let Some(price) = self.prices.price(security_id, month) {
                cost = quantity.checked_mul(price);
            }
        }

        let position = state.positions.entry(security_id.to_string()).or_default();
        let updated = cost.and_then(|cost| {
            Some(Position {
                quantity: position.quantity.checked_add(quantity)?,
                cost_basis: position.cost_basis.checked_add(cost)?,
            })
        });
        match updated {
            Some(updated) => *position = updated,
            None => warnings.push(overflow(
                format!("adding {} shares overflows the position", quantity),
                security_id,
                month,
                Some(tx.id.as_str()),
            )),
        }
    }

    fn value(
        &self,
        state: &ReconstructionState,
        month: Month,
        warnings: &mut Vec<DataWarning>,
    ) -> PositionSnapshot {
        let mut market_value = Decimal::ZERO;
        let mut unpriced = Vec::new();

        for (security_id, position) in &state.positions {
            if position.quantity.is_zero() {
                continue;
            }
            match self.prices.price(security_id, month) {
                Some(price) => {
                    match position
                        .quantity
                        .checked_mul(price)
                        .and_then(|v| market_value.checked_add(v))
                    {
                        Some(total) => market_value = total,
                        None => {
                            warnings.push(overflow(
                                format!(
                                    "{} shares at {} overflow the portfolio value; excluded",
                                    position.quantity, price
                                ),
                                security_id,
                                month,
                                None,
                            ));
                            unpriced.push(security_id.clone());
                        }
                    }
                }
                None => {
                    warn!("No price for {} in {}", security_id, month);
                    warnings.push(
                        DataWarning::new(
                            WarningKind::DataGap,
                            format!(
                                "no month-end price; {} shares excluded from value",
                                position.quantity
                            ),
                        )
                        .with_month(month)
                        .with_security(security_id.as_str()),
                    );
                    unpriced.push(security_id.clone());
                }
            }
        }

        PositionSnapshot {
            month,
            positions: state.positions.clone(),
            market_value,
            realized_gain: state.realized_gain,
            unpriced,
        }
    }
}

/// Fold a single bucket with no cash securities
pub fn apply_bucket(
    state: &ReconstructionState,
    bucket: &MonthBucket,
    prices: &dyn PriceSource,
) -> StepOutcome {
    Reconstructor::new(prices).step(state, bucket)
}

fn apply_removal(
    state: &mut ReconstructionState,
    security_id: &str,
    tx: &Transaction,
    month: Month,
    warnings: &mut Vec<DataWarning>,
) {
    let Some(requested) = tx.share_quantity() else {
        warnings.push(missing_quantity(tx, security_id, month));
        return;
    };

    let position = state.positions.get(security_id).copied().unwrap_or_default();
    let removed = if requested > position.quantity {
        warn!(
            "{} removes {} shares of {} but only {} are tracked; clamping at zero",
            tx.id, requested, security_id, position.quantity
        );
        warnings.push(
            DataWarning::new(
                WarningKind::NegativeQuantity,
                format!(
                    "removal of {} shares exceeds tracked {}; history is likely incomplete",
                    requested, position.quantity
                ),
            )
            .with_month(month)
            .with_security(security_id)
            .with_record(tx.id.as_str()),
        );
        position.quantity
    } else {
        requested
    };

    let remaining = position.quantity - removed;
    let removed_cost = if remaining.is_zero() {
        position.cost_basis
    } else {
        position.average_cost() * removed
    };

    if tx.transaction_type == TransactionType::Sell && !removed.is_zero() {
        // Only the tracked share of the proceeds realizes a gain
        let proceeds = tx.flow_value() * (removed / requested);
        state.realized_gain += proceeds - removed_cost;
    }

    if remaining.is_zero() {
        state.positions.remove(security_id);
    } else {
        state.positions.insert(
            security_id.to_string(),
            Position {
                quantity: remaining,
                cost_basis: position.cost_basis - removed_cost,
            },
        );
    }
}

fn overflow(message: String, security_id: &str, month: Month, record: Option<&str>) -> DataWarning {
    warn!("{} in {}: {}", security_id, month, message);
    let warning = DataWarning::new(WarningKind::MalformedRecord, message)
        .with_month(month)
        .with_security(security_id);
    match record {
        Some(id) => warning.with_record(id),
        None => warning,
    }
}

fn missing_quantity(tx: &Transaction, security_id: &str, month: Month) -> DataWarning {
    warn!("{} has no share quantity; skipped for positions", tx.id);
    DataWarning::new(
        WarningKind::MissingQuantity,
        format!("{} without quantity or price", tx.transaction_type.as_str()),
    )
    .with_month(month)
    .with_security(security_id)
    .with_record(tx.id.as_str())
}

/// Opening positions derived by rewinding the current holdings snapshot
/// through every in-window transaction.
///
/// Holdings are summed across accounts. A rewind that goes below zero means
/// the snapshot and the ledger disagree; the position opens at zero and the
/// security is flagged.
pub fn rewind_holdings(
    holdings: &[Holding],
    transactions: &[Transaction],
    cash_securities: &BTreeSet<String>,
) -> (ReconstructionState, Vec<DataWarning>) {
    let mut quantities: BTreeMap<String, (Decimal, Option<Decimal>)> = BTreeMap::new();
    for holding in holdings {
        if cash_securities.contains(&holding.security_id) {
            continue;
        }
        let entry = quantities
            .entry(holding.security_id.clone())
            .or_insert((Decimal::ZERO, None));
        entry.0 += holding.quantity;
        if let Some(cost) = holding.cost_basis {
            entry.1 = Some(entry.1.unwrap_or(Decimal::ZERO) + cost);
        }
    }

    let mut net_change: HashMap<&str, Decimal> = HashMap::new();
    for tx in transactions {
        let Some(security_id) = tx.security_id.as_deref() else {
            continue;
        };
        let Some(quantity) = tx.share_quantity() else {
            continue;
        };
        let delta = if tx.transaction_type.adds_shares() {
            quantity
        } else if tx.transaction_type.removes_shares() {
            -quantity
        } else {
            continue;
        };
        *net_change.entry(security_id).or_insert(Decimal::ZERO) += delta;
    }

    let mut state = ReconstructionState::default();
    let mut warnings = Vec::new();

    let mut security_ids: BTreeSet<&str> = quantities.keys().map(String::as_str).collect();
    security_ids.extend(
        net_change
            .keys()
            .copied()
            .filter(|id| !cash_securities.contains(*id)),
    );

    for security_id in security_ids {
        let (current, cost) = quantities
            .get(security_id)
            .copied()
            .unwrap_or((Decimal::ZERO, None));
        let opening = current - net_change.get(security_id).copied().unwrap_or(Decimal::ZERO);

        if opening < Decimal::ZERO {
            warn!(
                "Rewinding holdings for {} gives {} shares; opening at zero",
                security_id, opening
            );
            warnings.push(
                DataWarning::new(
                    WarningKind::NegativeOpeningPosition,
                    format!("rewound opening quantity {} clamped to zero", opening),
                )
                .with_security(security_id),
            );
            continue;
        }
        if opening.is_zero() {
            continue;
        }

        let average_cost = match cost {
            Some(cost) if current > Decimal::ZERO => cost / current,
            _ => Decimal::ZERO,
        };
        state.positions.insert(
            security_id.to_string(),
            Position {
                quantity: opening,
                cost_basis: average_cost * opening,
            },
        );
    }

    (state, warnings)
}
