//! Fees command dispatcher implementation

use anyhow::{anyhow, Result};
use colored::Colorize;
use std::path::Path;

use super::{parse_optional_date, Bound};
use crate::cli::formatters::format_fee_audit;
use monthly_returns::importers;
use monthly_returns::reports::audit_fees;

pub fn dispatch_fees(
    feed: &Path,
    from: Option<&str>,
    to: Option<&str>,
    json_output: bool,
) -> Result<()> {
    let normalized = importers::import_feed(feed)?;

    let from = parse_optional_date(from, Bound::Start)?
        .or_else(|| normalized.transactions.first().map(|t| t.date));
    let to = parse_optional_date(to, Bound::End)?
        .or_else(|| normalized.transactions.last().map(|t| t.date));

    let (Some(from), Some(to)) = (from, to) else {
        if json_output {
            return Err(anyhow!("Feed contains no transactions and no window was given"));
        }
        println!("\n{} No transactions found\n", "ℹ".blue().bold());
        return Ok(());
    };

    let audit = audit_fees(&normalized.transactions, &normalized.tickers(), from, to)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&audit)?);
    } else {
        print!("{}", format_fee_audit(&audit));
    }
    Ok(())
}
