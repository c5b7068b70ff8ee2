//! Vendor record shapes as delivered by the aggregation API.
//!
//! Every field is optional here; the normalizer decides what is required.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    #[serde(alias = "id")]
    pub investment_transaction_id: Option<String>,
    pub account_id: Option<String>,
    pub security_id: Option<String>,
    pub date: Option<String>,
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    pub subtype: Option<String>,
    pub amount: Option<Decimal>,
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
    pub fees: Option<Decimal>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSecurity {
    pub security_id: Option<String>,
    #[serde(alias = "ticker")]
    pub ticker_symbol: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub security_type: Option<String>,
    pub is_cash_equivalent: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHolding {
    pub account_id: Option<String>,
    pub security_id: Option<String>,
    pub quantity: Option<Decimal>,
    pub cost_basis: Option<Decimal>,
}

/// One page of the investments feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFeed {
    #[serde(default, alias = "transactions")]
    pub investment_transactions: Vec<RawTransaction>,
    #[serde(default)]
    pub securities: Vec<RawSecurity>,
    #[serde(default)]
    pub holdings: Vec<RawHolding>,
}

impl RawFeed {
    /// Concatenate paginated responses in fetch order
    pub fn concat(pages: impl IntoIterator<Item = RawFeed>) -> RawFeed {
        pages.into_iter().fold(RawFeed::default(), |mut acc, page| {
            acc.investment_transactions
                .extend(page.investment_transactions);
            acc.securities.extend(page.securities);
            acc.holdings.extend(page.holdings);
            acc
        })
    }
}

/// A feed file holds either a single page or an array of pages
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FeedDocument {
    Pages(Vec<RawFeed>),
    Single(RawFeed),
}

impl FeedDocument {
    pub fn into_feed(self) -> RawFeed {
        match self {
            FeedDocument::Pages(pages) => RawFeed::concat(pages),
            FeedDocument::Single(feed) => feed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_deserialize_vendor_transaction() {
        let json = r#"{
            "investment_transaction_id": "tx-1",
            "account_id": "acc-1",
            "security_id": "sec-1",
            "date": "2024-01-15",
            "type": "buy",
            "subtype": "buy",
            "amount": 1000.5,
            "quantity": 10,
            "price": 100.05,
            "fees": null
        }"#;
        let raw: RawTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(raw.investment_transaction_id.as_deref(), Some("tx-1"));
        assert_eq!(raw.transaction_type.as_deref(), Some("buy"));
        assert_eq!(raw.amount, Some(dec!(1000.5)));
        assert_eq!(raw.fees, None);
    }

    #[test]
    fn test_id_alias_and_ticker_alias() {
        let raw: RawTransaction = serde_json::from_str(r#"{"id": "x"}"#).unwrap();
        assert_eq!(raw.investment_transaction_id.as_deref(), Some("x"));

        let sec: RawSecurity =
            serde_json::from_str(r#"{"security_id": "s", "ticker": "SPY"}"#).unwrap();
        assert_eq!(sec.ticker_symbol.as_deref(), Some("SPY"));
    }

    #[test]
    fn test_feed_document_accepts_pages() {
        let single: FeedDocument =
            serde_json::from_str(r#"{"investment_transactions": [{"id": "a"}]}"#).unwrap();
        assert_eq!(single.into_feed().investment_transactions.len(), 1);

        let pages: FeedDocument = serde_json::from_str(
            r#"[{"investment_transactions": [{"id": "a"}]},
                {"investment_transactions": [{"id": "b"}], "securities": [{"security_id": "s"}]}]"#,
        )
        .unwrap();
        let feed = pages.into_feed();
        assert_eq!(feed.investment_transactions.len(), 2);
        assert_eq!(feed.securities.len(), 1);
    }
}
