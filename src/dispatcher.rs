//! Command dispatcher that routes parsed clap commands to their handlers.

mod analyze;
mod fees;
mod simulate;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;

use crate::cli::Commands;
use monthly_returns::config::Config;
use monthly_returns::models::Month;

/// Route a parsed command to its handler
pub fn dispatch_command(command: Commands, config: &Config, json_output: bool) -> Result<()> {
    match command {
        Commands::Analyze(args) => analyze::dispatch_analyze(&args, config, json_output),
        Commands::Fees { feed, from, to } => {
            fees::dispatch_fees(&feed, from.as_deref(), to.as_deref(), json_output)
        }
        Commands::Simulate(args) => simulate::dispatch_simulate(&args, config, json_output),
    }
}

/// Which end of a window a partial date denotes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Start,
    End,
}

/// Parse a window bound: YYYY-MM-DD, YYYY-MM or YYYY.
///
/// Partial dates expand to the first day of the period for a start bound and
/// the last day for an end bound.
fn parse_window_date(s: &str, bound: Bound) -> Result<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }

    let month = if let Ok(month) = s.parse::<Month>() {
        Some(month)
    } else if let Ok(year) = s.parse::<i32>() {
        let month = if bound == Bound::Start { 1 } else { 12 };
        Month::new(year, month).filter(|_| (1900..=2100).contains(&year))
    } else {
        None
    };

    month
        .and_then(|m| {
            let day = match bound {
                Bound::Start => 1,
                Bound::End => m.days_in_month(),
            };
            NaiveDate::from_ymd_opt(m.year(), m.month(), day)
        })
        .ok_or_else(|| anyhow!("Invalid date '{}'. Use YYYY-MM-DD, YYYY-MM, or YYYY", s))
}

fn parse_optional_date(s: Option<&str>, bound: Bound) -> Result<Option<NaiveDate>> {
    s.map(|s| parse_window_date(s, bound)).transpose()
}
