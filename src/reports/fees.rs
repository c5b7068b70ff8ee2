//! Fee audit over a date window.
//!
//! Applies the per-transaction fee policy (explicit fee field plus the amount
//! of fee-type records) and breaks the result down by month, security and
//! vendor subtype. Records that carry both sources are counted separately so
//! the double-source assumption can be checked against real data.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::error::AnalysisError;
use crate::models::{Month, Transaction, TransactionType};

const NO_SECURITY: &str = "(account)";
const NO_SUBTYPE: &str = "(none)";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeeAudit {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total_fees: Decimal,
    /// Sum of explicit fee fields
    pub explicit_fees: Decimal,
    /// Sum of |amount| over fee-type transactions
    pub fee_type_amounts: Decimal,
    pub by_month: BTreeMap<Month, Decimal>,
    /// Keyed by ticker when known, else security id
    pub by_security: BTreeMap<String, Decimal>,
    pub by_subtype: BTreeMap<String, Decimal>,
    pub transactions_with_fees: usize,
    /// Fee-type transactions that also carry an explicit fee field
    pub double_source_count: usize,
}

pub fn audit_fees(
    transactions: &[Transaction],
    tickers: &HashMap<String, String>,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<FeeAudit, AnalysisError> {
    if from > to {
        return Err(AnalysisError::InvalidDateRange { from, to });
    }

    let mut audit = FeeAudit {
        from,
        to,
        total_fees: Decimal::ZERO,
        explicit_fees: Decimal::ZERO,
        fee_type_amounts: Decimal::ZERO,
        by_month: BTreeMap::new(),
        by_security: BTreeMap::new(),
        by_subtype: BTreeMap::new(),
        transactions_with_fees: 0,
        double_source_count: 0,
    };

    for tx in transactions
        .iter()
        .filter(|t| t.date >= from && t.date <= to)
        .filter(|t| t.transaction_type != TransactionType::Other)
    {
        let fees = tx.total_fees();
        if fees.is_zero() {
            continue;
        }

        let explicit = tx.fees.unwrap_or(Decimal::ZERO);
        audit.explicit_fees += explicit;
        if tx.transaction_type == TransactionType::Fee {
            audit.fee_type_amounts += tx.amount.abs();
            if !explicit.is_zero() {
                audit.double_source_count += 1;
            }
        }

        audit.total_fees += fees;
        audit.transactions_with_fees += 1;
        *audit.by_month.entry(tx.month()).or_insert(Decimal::ZERO) += fees;

        let security = tx
            .security_id
            .as_deref()
            .map(|id| tickers.get(id).map(String::as_str).unwrap_or(id))
            .unwrap_or(NO_SECURITY);
        *audit
            .by_security
            .entry(security.to_string())
            .or_insert(Decimal::ZERO) += fees;

        let subtype = tx
            .subtype
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_else(|| NO_SUBTYPE.to_string());
        *audit.by_subtype.entry(subtype).or_insert(Decimal::ZERO) += fees;
    }

    debug!(
        "Fee audit {}..{}: {} across {} transactions",
        from, to, audit.total_fees, audit.transactions_with_fees
    );
    Ok(audit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tx(
        id: &str,
        date: &str,
        t: TransactionType,
        security: Option<&str>,
        subtype: &str,
        amount: Decimal,
        fees: Option<Decimal>,
    ) -> Transaction {
        Transaction {
            id: id.into(),
            account_id: "acc".into(),
            security_id: security.map(str::to_string),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            transaction_type: t,
            subtype: Some(subtype.into()),
            amount,
            quantity: None,
            price: None,
            fees,
            name: None,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_fee_breakdowns() {
        let tickers = HashMap::from([("sec-aaa".to_string(), "AAA".to_string())]);
        let txs = vec![
            tx("b1", "2024-01-05", TransactionType::Buy, Some("sec-aaa"), "buy", dec!(1000), Some(dec!(4.95))),
            tx("f1", "2024-01-31", TransactionType::Fee, None, "account fee", dec!(25), None),
            tx("f2", "2024-02-29", TransactionType::Fee, None, "Management Fee", dec!(-10), Some(dec!(1))),
            tx("o1", "2024-02-10", TransactionType::Other, Some("sec-aaa"), "adjustment", dec!(5), Some(dec!(3))),
            tx("late", "2024-04-01", TransactionType::Fee, None, "account fee", dec!(99), None),
        ];

        let audit = audit_fees(&txs, &tickers, date("2024-01-01"), date("2024-03-31")).unwrap();
        assert_eq!(audit.total_fees, dec!(40.95));
        assert_eq!(audit.explicit_fees, dec!(5.95));
        assert_eq!(audit.fee_type_amounts, dec!(35));
        assert_eq!(audit.transactions_with_fees, 3);
        assert_eq!(audit.double_source_count, 1);

        let jan: Month = "2024-01".parse().unwrap();
        assert_eq!(audit.by_month[&jan], dec!(29.95));
        assert_eq!(audit.by_security["AAA"], dec!(4.95));
        assert_eq!(audit.by_security[NO_SECURITY], dec!(36));
        assert_eq!(audit.by_subtype["management fee"], dec!(11));
    }

    #[test]
    fn test_inverted_window_is_rejected() {
        let err = audit_fees(&[], &HashMap::new(), date("2024-02-01"), date("2024-01-01"));
        assert!(matches!(err, Err(AnalysisError::InvalidDateRange { .. })));
    }
}
