use anyhow::Context;
use csv::Writer;
use rust_decimal::Decimal;
use std::io::Write;

use crate::error::Result;
use crate::models::{MonthlyReturn, SeriesByTicker};

/// Write the audit-trail CSV: header first, one row per monthly return.
///
/// `cumulative_value` is the growth of one unit through the row's month.
/// Constituent columns hold each benchmark ticker's raw return, blank when
/// the ticker has none for the month.
pub fn write_audit_csv<W: Write>(
    out: W,
    monthly: &[MonthlyReturn],
    constituents: &[String],
    series: &SeriesByTicker,
) -> Result<()> {
    let mut writer = Writer::from_writer(out);

    let mut header = vec![
        "date".to_string(),
        "portfolio_return".to_string(),
        "cumulative_value".to_string(),
        "benchmark_return".to_string(),
    ];
    header.extend(constituents.iter().map(|t| format!("{}_return", t)));
    writer.write_record(&header).context("Failed to write audit header")?;

    let mut cumulative = Decimal::ONE;
    for entry in monthly {
        cumulative *= Decimal::ONE + entry.portfolio_return;

        let mut row = vec![
            entry.month.to_string(),
            entry.portfolio_return.normalize().to_string(),
            cumulative.normalize().to_string(),
            entry
                .benchmark_return
                .map(|r| r.normalize().to_string())
                .unwrap_or_default(),
        ];
        row.extend(constituents.iter().map(|ticker| {
            series
                .get(ticker)
                .and_then(|s| s.get(&entry.month))
                .map(|r| r.normalize().to_string())
                .unwrap_or_default()
        }));
        writer
            .write_record(&row)
            .with_context(|| format!("Failed to write audit row for {}", entry.month))?;
    }

    writer.flush().context("Failed to flush audit CSV")?;
    Ok(())
}

/// Render the audit CSV into a string
pub fn audit_csv_string(
    monthly: &[MonthlyReturn],
    constituents: &[String],
    series: &SeriesByTicker,
) -> Result<String> {
    let mut buffer = Vec::new();
    write_audit_csv(&mut buffer, monthly, constituents, series)?;
    String::from_utf8(buffer).context("Audit CSV is not valid UTF-8")
}
