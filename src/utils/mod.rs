//! Formatting helpers shared by the terminal output
//!
//! Amounts render with a `$` prefix, `,` thousands separators and two
//! decimals. Returns are fractions and render as percentages.

use itertools::Itertools;
use rust_decimal::prelude::*;

/// Currency symbol options for formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencySymbol {
    /// Include "$" prefix
    Dollar,
    /// No currency symbol (table cells with a currency header)
    None,
}

fn group_thousands(integer_part: &str) -> String {
    let reversed: Vec<char> = integer_part.chars().rev().collect();
    reversed
        .chunks(3)
        .map(|chunk| chunk.iter().rev().collect::<String>())
        .rev()
        .join(",")
}

/// Core formatting function with full control over output.
///
/// # Examples
/// ```
/// use monthly_returns::utils::{format_currency_with_width, CurrencySymbol};
/// use rust_decimal_macros::dec;
///
/// assert_eq!(
///     format_currency_with_width(dec!(1234.56), 0, CurrencySymbol::Dollar),
///     "$1,234.56"
/// );
/// assert_eq!(
///     format_currency_with_width(dec!(1234), 12, CurrencySymbol::None),
///     "    1,234.00"
/// );
/// ```
pub fn format_currency_with_width(value: Decimal, width: usize, symbol: CurrencySymbol) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (integer_part, decimal_part) = formatted
        .split_once('.')
        .unwrap_or((formatted.as_str(), "00"));

    // -0.004 rounds to 0.00 and should not carry a sign
    let sign = if value < Decimal::ZERO && formatted != "0.00" {
        "-"
    } else {
        ""
    };
    let prefix = match symbol {
        CurrencySymbol::Dollar => "$",
        CurrencySymbol::None => "",
    };

    let result = format!(
        "{}{}{}.{}",
        sign,
        prefix,
        group_thousands(integer_part),
        decimal_part
    );
    if width > 0 && result.len() < width {
        format!("{:>width$}", result, width = width)
    } else {
        result
    }
}

/// "$1,234.56"
pub fn format_currency(value: Decimal) -> String {
    format_currency_with_width(value, 0, CurrencySymbol::Dollar)
}

pub fn format_currency_aligned(value: Decimal, width: usize) -> String {
    format_currency_with_width(value, width, CurrencySymbol::Dollar)
}

/// Currency formatting for simulated balances, which are `f64`
pub fn format_amount(value: f64) -> String {
    Decimal::from_f64(value)
        .map(format_currency)
        .unwrap_or_else(|| format!("${:.2}", value))
}

/// Fraction → percentage with two decimals: 0.0585 → "5.85%"
///
/// # Examples
/// ```
/// use monthly_returns::utils::format_percent;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_percent(dec!(0.05847)), "5.85%");
/// assert_eq!(format_percent(dec!(-0.1)), "-10.00%");
/// ```
pub fn format_percent(fraction: Decimal) -> String {
    let pct = (fraction * Decimal::ONE_HUNDRED).round_dp(2);
    let pct = if pct.is_zero() { Decimal::ZERO } else { pct };
    format!("{:.2}%", pct)
}

pub fn format_percent_f64(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}
