//! Output formatting module for CLI display
//!
//! This module handles all terminal output formatting, separating
//! the concerns of data calculation from presentation.

use colored::Colorize;
use itertools::Itertools;
use rust_decimal::Decimal;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use monthly_returns::reports::{AnalysisReport, FeeAudit};
use monthly_returns::simulation::{Preset, SimulationResult};
use monthly_returns::utils::{
    format_amount, format_currency, format_percent, format_percent_f64,
};
use monthly_returns::warnings::{self, DataWarning};

fn colored_percent(value: Decimal) -> String {
    let text = format_percent(value);
    if value >= Decimal::ZERO {
        text.green().to_string()
    } else {
        text.red().to_string()
    }
}

fn optional_percent(value: Option<Decimal>) -> String {
    value.map(colored_percent).unwrap_or_else(|| "N/A".to_string())
}

/// Format a return analysis for terminal output
pub fn format_analysis_table(report: &AnalysisReport, verbose: bool) -> String {
    let mut output = String::new();
    let analysis = &report.analysis;

    let window = match (report.from, report.to) {
        (Some(from), Some(to)) => format!("{} → {}", from, to),
        _ => "no transactions".to_string(),
    };
    output.push_str(&format!("\n{} Monthly Returns ({})\n\n", "📈".cyan().bold(), window));

    #[derive(Tabled)]
    struct ReturnRow {
        #[tabled(rename = "Month")]
        month: String,
        #[tabled(rename = "Return")]
        portfolio_return: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Benchmark")]
        benchmark_return: String,
        #[tabled(rename = "Benchmark Value")]
        benchmark_value: String,
    }

    if analysis.monthly_returns.is_empty() {
        output.push_str(&format!(
            "{} Not enough valued months to compute a return\n",
            "ℹ".blue().bold()
        ));
    } else {
        let rows: Vec<ReturnRow> = analysis
            .monthly_returns
            .iter()
            .map(|r| ReturnRow {
                month: r.month.to_string(),
                portfolio_return: colored_percent(r.portfolio_return),
                value: format_currency(r.portfolio_value),
                benchmark_return: optional_percent(r.benchmark_return),
                benchmark_value: r
                    .benchmark_value
                    .map(format_currency)
                    .unwrap_or_else(|| "N/A".to_string()),
            })
            .collect();

        let mut table = Table::new(&rows);
        table.with(Style::modern());
        table.modify(Columns::new(1..), Alignment::right());
        output.push_str(&table.to_string());
        output.push('\n');
    }

    output.push_str(&format!("\n{} Summary", "━".repeat(60).bright_black()));
    output.push_str(&format!(
        "\n{:<26} {}",
        "Total Return:".bold(),
        colored_percent(analysis.total_return)
    ));
    output.push_str(&format!(
        "\n{:<26} {}",
        "Annualized Return:".bold(),
        colored_percent(analysis.annualized_return)
    ));
    if analysis.benchmark_total_return.is_some() {
        output.push_str(&format!(
            "\n{:<26} {}",
            "Benchmark Total:".bold(),
            optional_percent(analysis.benchmark_total_return)
        ));
        output.push_str(&format!(
            "\n{:<26} {}",
            "Benchmark Annualized:".bold(),
            optional_percent(analysis.benchmark_annualized_return)
        ));
        output.push_str(&format!(
            "\n{:<26} {}",
            "Outperformance:".bold(),
            optional_percent(analysis.outperformance)
        ));
    }

    let stats = &report.statistics;
    output.push_str(&format!(
        "\n{:<26} {}",
        "Average Monthly:".bold(),
        format_percent(stats.average_monthly_return)
    ));
    output.push_str(&format!(
        "\n{:<26} {}",
        "Annualized Volatility:".bold(),
        format_percent(stats.annualized_volatility)
    ));
    if let (Some(best), Some(worst)) = (stats.best_month, stats.worst_month) {
        output.push_str(&format!(
            "\n{:<26} {} ({}) / {} ({})",
            "Best / Worst Month:".bold(),
            colored_percent(best.value),
            best.month,
            colored_percent(worst.value),
            worst.month
        ));
    }
    output.push_str(&format!(
        "\n{:<26} {}",
        "Max Drawdown:".bold(),
        format_percent(stats.max_drawdown)
    ));
    output.push_str(&format!(
        "\n{:<26} {} ({}/{} months fully priced)",
        "Coverage:".bold(),
        format_percent(stats.coverage),
        stats.complete_months,
        stats.expected_months
    ));
    output.push_str(&format!(
        "\n{:<26} {} used, {} duplicates dropped\n",
        "Transactions:".bold(),
        report.transactions_used,
        report.duplicates_dropped
    ));

    if !report.holding_differences.is_empty() {
        output.push_str(&format!(
            "\n{} Holdings that differ from the reconstruction\n",
            "⚠".yellow().bold()
        ));
        for diff in &report.holding_differences {
            output.push_str(&format!(
                "  {:<24} reconstructed {}  reported {}  (Δ {})\n",
                diff.security_id,
                diff.reconstructed.normalize(),
                diff.reported.normalize(),
                diff.difference().normalize()
            ));
        }
    }

    output.push_str(&format_warnings(&report.warnings, verbose));
    output
}

/// Per-kind warning counts, plus every warning when `verbose`
pub fn format_warnings(list: &[DataWarning], verbose: bool) -> String {
    if list.is_empty() {
        return String::new();
    }

    let counts = warnings::summarize(list)
        .iter()
        .map(|(kind, count)| format!("{} {}", count, kind.as_str()))
        .join(", ");
    let mut output = format!(
        "\n{} {} warnings: {}\n",
        "⚠".yellow().bold(),
        list.len(),
        counts
    );

    if verbose {
        for warning in list {
            let context = [
                warning.month.map(|m| m.to_string()),
                warning.security_id.clone(),
                warning.record_id.clone(),
            ]
            .into_iter()
            .flatten()
            .join(" ");
            output.push_str(&format!(
                "  [{}] {}{}\n",
                warning.kind.as_str().yellow(),
                if context.is_empty() {
                    String::new()
                } else {
                    format!("{}: ", context)
                },
                warning.message
            ));
        }
    } else {
        output.push_str(&format!("  Run with {} to list them\n", "--verbose".bold()));
    }
    output
}

/// Format a fee audit for terminal output
pub fn format_fee_audit(audit: &FeeAudit) -> String {
    let mut output = format!(
        "\n{} Fees {} → {}\n\n",
        "💸".cyan().bold(),
        audit.from,
        audit.to
    );

    if audit.transactions_with_fees == 0 {
        output.push_str(&format!("{} No fees charged in this window\n", "ℹ".blue().bold()));
        return output;
    }

    #[derive(Tabled)]
    struct FeeRow {
        #[tabled(rename = "Month")]
        month: String,
        #[tabled(rename = "Fees")]
        fees: String,
    }

    let rows: Vec<FeeRow> = audit
        .by_month
        .iter()
        .map(|(month, fees)| FeeRow {
            month: month.to_string(),
            fees: format_currency(*fees),
        })
        .collect();
    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(1..), Alignment::right());
    output.push_str(&table.to_string());

    let breakdown = |title: &str, entries: &std::collections::BTreeMap<String, Decimal>| {
        let lines = entries
            .iter()
            .sorted_by(|a, b| b.1.cmp(a.1))
            .map(|(key, fees)| format!("  {:<28} {:>14}", key, format_currency(*fees)))
            .join("\n");
        format!("\n\n{}\n{}", title.bold(), lines)
    };
    output.push_str(&breakdown("By security", &audit.by_security));
    output.push_str(&breakdown("By subtype", &audit.by_subtype));

    output.push_str(&format!("\n\n{} Summary", "━".repeat(60).bright_black()));
    output.push_str(&format!(
        "\n{:<26} {}",
        "Total Fees:".bold(),
        format_currency(audit.total_fees).red()
    ));
    output.push_str(&format!(
        "\n{:<26} {}",
        "Explicit Fee Fields:".bold(),
        format_currency(audit.explicit_fees)
    ));
    output.push_str(&format!(
        "\n{:<26} {}",
        "Fee-Type Amounts:".bold(),
        format_currency(audit.fee_type_amounts)
    ));
    output.push_str(&format!(
        "\n{:<26} {}\n",
        "Transactions with Fees:".bold(),
        audit.transactions_with_fees
    ));
    if audit.double_source_count > 0 {
        output.push_str(&format!(
            "{} {} fee transactions also carry an explicit fee field; both were counted\n",
            "⚠".yellow().bold(),
            audit.double_source_count
        ));
    }
    output
}

/// Format a simulation result: yearly percentile bands and final statistics
pub fn format_simulation(result: &SimulationResult) -> String {
    let params = &result.params;
    let mut output = format!(
        "\n{} Retirement Projection ({} paths, {} years, {} returns)\n\n",
        "🎲".cyan().bold(),
        params.simulations,
        params.years,
        params.distribution.as_str()
    );

    #[derive(Tabled)]
    struct BandRow {
        #[tabled(rename = "Year")]
        year: usize,
        #[tabled(rename = "P10")]
        p10: String,
        #[tabled(rename = "P50")]
        p50: String,
        #[tabled(rename = "P90")]
        p90: String,
        #[tabled(rename = "Contributed")]
        contributed: String,
    }

    let bands = &result.bands;
    let rows: Vec<BandRow> = (1..=params.years as usize)
        .filter_map(|year| {
            let month = year * 12;
            Some(BandRow {
                year,
                p10: format_amount(*bands.p10.get(month)?),
                p50: format_amount(*bands.p50.get(month)?),
                p90: format_amount(*bands.p90.get(month)?),
                contributed: format_amount(
                    params.initial_balance + params.monthly_contribution * month as f64,
                ),
            })
        })
        .collect();
    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(1..), Alignment::right());
    output.push_str(&table.to_string());

    let stats = &result.statistics;
    output.push_str(&format!("\n\n{} Final Balance", "━".repeat(60).bright_black()));
    for (label, value) in [
        ("Median:", format_amount(stats.median)),
        ("Mean:", format_amount(stats.mean)),
        ("Std Dev:", format_amount(stats.std_dev)),
        (
            "10th / 90th pct:",
            format!("{} / {}", format_amount(stats.p10), format_amount(stats.p90)),
        ),
        ("Min:", format_amount(stats.min)),
        ("Max:", format_amount(stats.max)),
        ("Total Contributions:", format_amount(stats.total_contributions)),
    ] {
        output.push_str(&format!("\n{:<26} {}", label.bold(), value));
    }

    output.push_str(&format!("\n\n{}", "Success Rates".bold()));
    output.push_str(&format!(
        "\n  {:<32} {}",
        "Ends above zero:",
        format_percent_f64(stats.success_rate_positive / 100.0).green()
    ));
    output.push_str(&format!(
        "\n  {:<32} {}",
        "Beats contributions:",
        format_percent_f64(stats.success_rate_beat_contributions / 100.0).green()
    ));
    output.push_str(&format!(
        "\n  {:<32} {}\n",
        "Doubles contributions:",
        format_percent_f64(stats.success_rate_double / 100.0).green()
    ));
    output
}

pub fn format_presets() -> String {
    let mut output = format!("\n{} Presets\n\n", "📋".cyan().bold());
    for preset in Preset::all() {
        let p = preset.params();
        output.push_str(&format!(
            "  {:<20} {}\n  {:<20} {} initial, {}/month, {} return, {} volatility, {} years, {} tails\n\n",
            preset.as_str().bold(),
            preset.description(),
            "",
            format_amount(p.initial_balance),
            format_amount(p.monthly_contribution),
            format_percent_f64(p.annual_return),
            format_percent_f64(p.annual_volatility),
            p.years,
            p.tail_severity.as_str()
        ));
    }
    output
}
