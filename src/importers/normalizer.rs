//! Event normalization: vendor records → canonical transactions, holdings
//! and a security lookup.
//!
//! Collects issues instead of failing on the first bad record. A record that
//! lacks a required field is dropped from the ledger and reported as a
//! `MalformedRecord` warning; it never aborts the run.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::raw::{RawFeed, RawHolding, RawSecurity, RawTransaction};
use crate::models::{Holding, Security, SecurityType, Transaction, TransactionType};
use crate::warnings::{DataWarning, WarningKind};

/// Output of the normalizer
#[derive(Debug, Clone, Default)]
pub struct NormalizedFeed {
    /// Deduplicated and sorted by date (stable within a day)
    pub transactions: Vec<Transaction>,
    pub holdings: Vec<Holding>,
    /// Securities referenced by at least one transaction or holding
    pub securities: BTreeMap<String, Security>,
    pub warnings: Vec<DataWarning>,
    pub duplicates_dropped: usize,
}

impl NormalizedFeed {
    /// security_id → ticker for securities that have one
    pub fn tickers(&self) -> HashMap<String, String> {
        self.securities
            .values()
            .filter_map(|s| s.ticker.clone().map(|t| (s.security_id.clone(), t)))
            .collect()
    }

    /// Cash-like securities, which are not valued as equity positions
    pub fn cash_securities(&self) -> BTreeSet<String> {
        self.securities
            .values()
            .filter(|s| s.security_type == SecurityType::Cash)
            .map(|s| s.security_id.clone())
            .collect()
    }
}

/// Normalize a full (already concatenated) feed
pub fn normalize(feed: &RawFeed) -> NormalizedFeed {
    let (transactions, mut warnings, duplicates_dropped) =
        normalize_transactions(&feed.investment_transactions);
    let (holdings, holding_warnings) = normalize_holdings(&feed.holdings);
    warnings.extend(holding_warnings);

    let mut referenced: HashSet<&str> = transactions
        .iter()
        .filter_map(|t| t.security_id.as_deref())
        .collect();
    referenced.extend(holdings.iter().map(|h| h.security_id.as_str()));

    let securities: BTreeMap<String, Security> = normalize_securities(&feed.securities)
        .into_iter()
        .filter(|(id, _)| referenced.contains(id.as_str()))
        .collect();

    info!(
        "Normalized {} transactions, {} holdings, {} securities ({} warnings)",
        transactions.len(),
        holdings.len(),
        securities.len(),
        warnings.len()
    );

    NormalizedFeed {
        transactions,
        holdings,
        securities,
        warnings,
        duplicates_dropped,
    }
}

/// Deduplicate by id, validate, classify and sort by date.
///
/// The first valid occurrence of an id wins; a malformed copy does not
/// shadow a later valid one. Returns the canonical transactions, the warnings raised, and the number of
/// duplicates dropped.
pub fn normalize_transactions(
    raw: &[RawTransaction],
) -> (Vec<Transaction>, Vec<DataWarning>, usize) {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut transactions = Vec::with_capacity(raw.len());
    let mut warnings = Vec::new();
    let mut duplicates = 0;

    for (idx, record) in raw.iter().enumerate() {
        let id = match record.investment_transaction_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => {
                warn!("Dropping transaction at position {}: missing id", idx);
                warnings.push(DataWarning::new(
                    WarningKind::MalformedRecord,
                    format!("transaction at position {} has no id", idx),
                ));
                continue;
            }
        };

        if seen.contains(id) {
            duplicates += 1;
            continue;
        }

        match to_transaction(id, record) {
            Ok(tx) => {
                seen.insert(id);
                transactions.push(tx);
            }
            Err(reason) => {
                warn!("Dropping transaction {}: {}", id, reason);
                warnings.push(
                    DataWarning::new(WarningKind::MalformedRecord, reason).with_record(id),
                );
            }
        }
    }

    if duplicates > 0 {
        debug!("Dropped {} duplicate transactions", duplicates);
    }

    transactions.sort_by_key(|t| t.date);
    (transactions, warnings, duplicates)
}

fn to_transaction(id: &str, record: &RawTransaction) -> Result<Transaction, String> {
    let date_str = record
        .date
        .as_deref()
        .ok_or_else(|| "missing date".to_string())?;
    let date =
        parse_date(date_str).ok_or_else(|| format!("unparseable date '{}'", date_str))?;

    let transaction_type = classify(
        record.transaction_type.as_deref(),
        record.subtype.as_deref(),
        record.quantity,
        record.amount,
    )
    .ok_or_else(|| "missing type and subtype".to_string())?;
    check_magnitudes(record)?;

    Ok(Transaction {
        id: id.to_string(),
        account_id: record.account_id.clone().unwrap_or_default(),
        security_id: non_empty(record.security_id.as_deref()),
        date,
        transaction_type,
        subtype: non_empty(record.subtype.as_deref()),
        amount: record.amount.unwrap_or(Decimal::ZERO),
        quantity: record.quantity,
        price: record.price,
        fees: record.fees,
        name: record.name.clone(),
    })
}

/// Reject values whose derived quantity or value cannot be represented
fn check_magnitudes(record: &RawTransaction) -> Result<(), String> {
    if let (Some(quantity), Some(price)) = (record.quantity, record.price) {
        if quantity.checked_mul(price).is_none() {
            return Err(format!("quantity {} × price {} overflows", quantity, price));
        }
    }
    if let (Some(amount), Some(price)) = (record.amount, record.price) {
        if !price.is_zero() && amount.checked_div(price).is_none() {
            return Err(format!("amount {} / price {} overflows", amount, price));
        }
    }
    Ok(())
}

/// Parse an ISO calendar date. Timestamps keep only their date part.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let date_part = match s.find('T') {
        Some(10) => &s[..10],
        _ => s,
    };
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Map vendor type/subtype strings onto the canonical enum.
///
/// The subtype is consulted first, the type second. Returns None only when
/// both are missing; anything unrecognized is `Other`.
pub fn classify(
    kind: Option<&str>,
    subtype: Option<&str>,
    quantity: Option<Decimal>,
    amount: Option<Decimal>,
) -> Option<TransactionType> {
    let kind = kind.map(str::trim).filter(|s| !s.is_empty());
    let subtype = subtype.map(str::trim).filter(|s| !s.is_empty());
    if kind.is_none() && subtype.is_none() {
        return None;
    }

    let resolved = subtype
        .and_then(|s| classify_label(s, quantity, amount))
        .or_else(|| kind.and_then(|k| classify_label(k, quantity, amount)))
        .unwrap_or(TransactionType::Other);
    Some(resolved)
}

fn classify_label(
    label: &str,
    quantity: Option<Decimal>,
    amount: Option<Decimal>,
) -> Option<TransactionType> {
    let label = label.to_ascii_lowercase();
    let tx_type = match label.as_str() {
        "buy"
        | "buy to cover"
        | "dividend reinvestment"
        | "interest reinvestment"
        | "long-term capital gain reinvestment"
        | "short-term capital gain reinvestment" => TransactionType::Buy,
        "sell" | "sell short" => TransactionType::Sell,
        "dividend"
        | "qualified dividend"
        | "non-qualified dividend"
        | "interest"
        | "long-term capital gain"
        | "short-term capital gain"
        | "unqualified gain" => TransactionType::Dividend,
        "contribution" | "deposit" | "transfer in" | "transfer_in" => TransactionType::TransferIn,
        "withdrawal" | "distribution" | "transfer out" | "transfer_out" => {
            TransactionType::TransferOut
        }
        "transfer" => transfer_direction(quantity, amount)?,
        "margin expense" => TransactionType::Fee,
        other if other.contains("fee") => TransactionType::Fee,
        _ => return None,
    };
    Some(tx_type)
}

/// Direction of a bare "transfer": share sign first, then cash sign
/// (negative amount = cash entering the account).
fn transfer_direction(quantity: Option<Decimal>, amount: Option<Decimal>) -> Option<TransactionType> {
    match quantity {
        Some(q) if q > Decimal::ZERO => return Some(TransactionType::TransferIn),
        Some(q) if q < Decimal::ZERO => return Some(TransactionType::TransferOut),
        _ => {}
    }
    match amount {
        Some(a) if a < Decimal::ZERO => Some(TransactionType::TransferIn),
        Some(a) if a > Decimal::ZERO => Some(TransactionType::TransferOut),
        _ => None,
    }
}

fn normalize_holdings(raw: &[RawHolding]) -> (Vec<Holding>, Vec<DataWarning>) {
    let mut holdings = Vec::with_capacity(raw.len());
    let mut warnings = Vec::new();

    for (idx, record) in raw.iter().enumerate() {
        let security_id = non_empty(record.security_id.as_deref());
        match (security_id, record.quantity) {
            (Some(security_id), Some(quantity)) => holdings.push(Holding {
                account_id: record.account_id.clone().unwrap_or_default(),
                security_id,
                quantity,
                cost_basis: record.cost_basis,
            }),
            _ => {
                warn!("Dropping holding at position {}: missing security or quantity", idx);
                warnings.push(DataWarning::new(
                    WarningKind::MalformedRecord,
                    format!("holding at position {} lacks security_id or quantity", idx),
                ));
            }
        }
    }

    (holdings, warnings)
}

/// Deduplicate securities by id (first wins) and canonicalize tickers
fn normalize_securities(raw: &[RawSecurity]) -> BTreeMap<String, Security> {
    let mut securities = BTreeMap::new();
    for record in raw {
        let Some(security_id) = non_empty(record.security_id.as_deref()) else {
            debug!("Skipping security without id: {:?}", record.name);
            continue;
        };
        if securities.contains_key(&security_id) {
            continue;
        }

        let security_type = if record.is_cash_equivalent == Some(true) {
            SecurityType::Cash
        } else {
            record
                .security_type
                .as_deref()
                .and_then(|t| SecurityType::from_str(t).ok())
                .unwrap_or(SecurityType::Other)
        };

        securities.insert(
            security_id.clone(),
            Security {
                security_id,
                ticker: non_empty(record.ticker_symbol.as_deref()).map(|t| t.to_uppercase()),
                name: record.name.clone(),
                security_type,
            },
        );
    }
    securities
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw(id: &str, date: Option<&str>, kind: &str, subtype: &str) -> RawTransaction {
        RawTransaction {
            investment_transaction_id: Some(id.to_string()),
            account_id: Some("acc-1".to_string()),
            security_id: Some("sec-aaa".to_string()),
            date: date.map(str::to_string),
            transaction_type: Some(kind.to_string()),
            subtype: Some(subtype.to_string()),
            amount: Some(dec!(100)),
            quantity: Some(dec!(1)),
            price: Some(dec!(100)),
            fees: None,
            name: None,
        }
    }

    #[test]
    fn test_dedup_first_occurrence_wins() {
        let mut second = raw("t1", Some("2024-02-01"), "sell", "sell");
        second.amount = Some(dec!(-999));
        let records = vec![raw("t1", Some("2024-01-15"), "buy", "buy"), second];

        let (txs, warnings, dups) = normalize_transactions(&records);
        assert_eq!(txs.len(), 1);
        assert_eq!(dups, 1);
        assert!(warnings.is_empty());
        assert_eq!(txs[0].transaction_type, TransactionType::Buy);
        assert_eq!(txs[0].amount, dec!(100));
    }

    #[test]
    fn test_malformed_copy_does_not_shadow_valid_one() {
        let records = vec![
            raw("t1", None, "buy", "buy"),
            raw("t1", Some("2024-01-15"), "buy", "buy"),
            raw("t1", Some("2024-02-01"), "sell", "sell"),
        ];

        let (txs, warnings, dups) = normalize_transactions(&records);
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(dups, 1);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::MalformedRecord);
    }

    #[test]
    fn test_overflowing_values_are_malformed() {
        let mut huge_quantity = raw("big", Some("2024-01-15"), "buy", "buy");
        huge_quantity.quantity = Some(Decimal::MAX);
        huge_quantity.price = Some(dec!(2));

        let mut tiny_price = raw("tiny", Some("2024-01-15"), "buy", "buy");
        tiny_price.quantity = None;
        tiny_price.amount = Some(Decimal::MAX);
        tiny_price.price = Some(dec!(0.5));

        let ok = raw("ok", Some("2024-01-15"), "buy", "buy");
        let (txs, warnings, _) = normalize_transactions(&[huge_quantity, tiny_price, ok]);
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].id, "ok");
        assert_eq!(warnings.len(), 2);
        assert!(warnings
            .iter()
            .all(|w| w.kind == WarningKind::MalformedRecord));
        assert!(warnings[0].message.contains("overflows"));
    }

    #[test]
    fn test_dedup_is_idempotent_across_repeated_pages() {
        let page = vec![
            raw("t2", Some("2024-03-01"), "sell", "sell"),
            raw("t1", Some("2024-01-15"), "buy", "buy"),
            raw("t3", Some("2024-02-10"), "cash", "dividend"),
        ];
        let (once, _, _) = normalize_transactions(&page);

        let doubled: Vec<RawTransaction> = page.iter().chain(page.iter()).cloned().collect();
        let (twice, _, dups) = normalize_transactions(&doubled);

        assert_eq!(once, twice);
        assert_eq!(dups, 3);
    }

    #[test]
    fn test_output_sorted_by_date() {
        let records = vec![
            raw("b", Some("2024-03-01"), "buy", "buy"),
            raw("a", Some("2024-01-01"), "buy", "buy"),
            raw("c", Some("2024-03-01"), "sell", "sell"),
        ];
        let (txs, _, _) = normalize_transactions(&records);
        let ids: Vec<&str> = txs.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_date_is_dropped_with_warning() {
        let records = vec![
            raw("ok", Some("2024-01-15"), "buy", "buy"),
            raw("nodate", None, "buy", "buy"),
            raw("baddate", Some("15/01/2024"), "buy", "buy"),
        ];
        let (txs, warnings, _) = normalize_transactions(&records);
        assert_eq!(txs.len(), 1);
        assert_eq!(warnings.len(), 2);
        assert!(warnings
            .iter()
            .all(|w| w.kind == WarningKind::MalformedRecord));
        assert_eq!(warnings[0].record_id.as_deref(), Some("nodate"));
    }

    #[test]
    fn test_missing_type_is_dropped() {
        let mut record = raw("t", Some("2024-01-15"), "", "");
        record.transaction_type = None;
        let (txs, warnings, _) = normalize_transactions(&[record]);
        assert!(txs.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_classification_prefers_subtype() {
        assert_eq!(
            classify(Some("cash"), Some("qualified dividend"), None, None),
            Some(TransactionType::Dividend)
        );
        assert_eq!(
            classify(Some("fee"), Some("account fee"), None, None),
            Some(TransactionType::Fee)
        );
        assert_eq!(
            classify(Some("cash"), Some("contribution"), None, None),
            Some(TransactionType::TransferIn)
        );
        assert_eq!(
            classify(Some("cash"), Some("withdrawal"), None, None),
            Some(TransactionType::TransferOut)
        );
        assert_eq!(
            classify(Some("buy"), Some("something new"), None, None),
            Some(TransactionType::Buy)
        );
        assert_eq!(
            classify(Some("cancel"), Some("request"), None, None),
            Some(TransactionType::Other)
        );
        assert_eq!(classify(None, None, None, None), None);
    }

    #[test]
    fn test_bare_transfer_direction() {
        assert_eq!(
            classify(Some("transfer"), Some("transfer"), Some(dec!(5)), None),
            Some(TransactionType::TransferIn)
        );
        assert_eq!(
            classify(Some("transfer"), Some("transfer"), Some(dec!(-5)), None),
            Some(TransactionType::TransferOut)
        );
        assert_eq!(
            classify(Some("transfer"), None, None, Some(dec!(-250))),
            Some(TransactionType::TransferIn)
        );
        assert_eq!(
            classify(Some("transfer"), None, None, None),
            Some(TransactionType::Other)
        );
    }

    #[test]
    fn test_parse_date_accepts_timestamps() {
        assert_eq!(
            parse_date("2024-01-15T13:45:00Z"),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
        assert_eq!(parse_date(" 2024-02-29 "), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(parse_date("2023-02-29"), None);
    }

    #[test]
    fn test_unreferenced_securities_are_pruned() {
        let feed = RawFeed {
            investment_transactions: vec![raw("t1", Some("2024-01-15"), "buy", "buy")],
            securities: vec![
                RawSecurity {
                    security_id: Some("sec-aaa".into()),
                    ticker_symbol: Some("aaa".into()),
                    name: Some("AAA Corp".into()),
                    security_type: Some("equity".into()),
                    is_cash_equivalent: Some(false),
                },
                RawSecurity {
                    security_id: Some("sec-zzz".into()),
                    ticker_symbol: Some("ZZZ".into()),
                    ..Default::default()
                },
                RawSecurity {
                    security_id: Some("sec-cash".into()),
                    ticker_symbol: None,
                    security_type: Some("cash".into()),
                    ..Default::default()
                },
            ],
            holdings: vec![RawHolding {
                account_id: Some("acc-1".into()),
                security_id: Some("sec-cash".into()),
                quantity: Some(dec!(250)),
                cost_basis: None,
            }],
        };

        let normalized = normalize(&feed);
        let ids: Vec<&String> = normalized.securities.keys().collect();
        assert_eq!(ids, vec!["sec-aaa", "sec-cash"]);
        assert_eq!(normalized.tickers().get("sec-aaa").map(String::as_str), Some("AAA"));
        assert!(!normalized.tickers().contains_key("sec-cash"));
        assert!(normalized.cash_securities().contains("sec-cash"));
    }

    #[test]
    fn test_holding_without_quantity_is_flagged() {
        let feed = RawFeed {
            holdings: vec![RawHolding {
                account_id: None,
                security_id: Some("s".into()),
                quantity: None,
                cost_basis: None,
            }],
            ..Default::default()
        };
        let normalized = normalize(&feed);
        assert!(normalized.holdings.is_empty());
        assert_eq!(normalized.warnings.len(), 1);
    }
}
