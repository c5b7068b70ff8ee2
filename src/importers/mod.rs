// Import module - aggregation feed JSON and price/benchmark CSV loaders

pub mod normalizer;
pub mod raw;
mod series_csv;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

pub use normalizer::{normalize, NormalizedFeed};
pub use raw::{FeedDocument, RawFeed, RawHolding, RawSecurity, RawTransaction};
pub use series_csv::{load_benchmark_returns, load_prices, parse_benchmark_returns, parse_prices};

/// Load an investments feed from a JSON file.
///
/// Accepts a single page object or an array of pages; pages are concatenated
/// in file order. Deduplication happens later in the normalizer.
pub fn load_feed<P: AsRef<Path>>(path: P) -> Result<RawFeed> {
    let path = path.as_ref();
    info!("Loading investments feed: {:?}", path);

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read feed file {:?}", path))?;
    parse_feed(&content).with_context(|| format!("Failed to parse feed file {:?}", path))
}

pub fn parse_feed(content: &str) -> Result<RawFeed> {
    let document: FeedDocument =
        serde_json::from_str(content).context("Feed is not a page object or array of pages")?;
    let feed = document.into_feed();
    info!(
        "Feed has {} transactions, {} securities, {} holdings",
        feed.investment_transactions.len(),
        feed.securities.len(),
        feed.holdings.len()
    );
    Ok(feed)
}

/// Load and normalize a feed in one step
pub fn import_feed<P: AsRef<Path>>(path: P) -> Result<NormalizedFeed> {
    let feed = load_feed(path)?;
    Ok(normalize(&feed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_feed_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"investment_transactions": [{{"id": "a", "date": "2024-01-02", "type": "buy"}}]}},
               {{"investment_transactions": [{{"id": "a", "date": "2024-01-02", "type": "buy"}}]}}]"#
        )
        .unwrap();

        let normalized = import_feed(file.path()).unwrap();
        assert_eq!(normalized.transactions.len(), 1);
        assert_eq!(normalized.duplicates_dropped, 1);
    }

    #[test]
    fn test_invalid_json_has_context() {
        let err = parse_feed("not json").unwrap_err();
        assert!(err.to_string().contains("page object"));
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = load_feed("/nonexistent/feed.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read feed file"));
    }
}
