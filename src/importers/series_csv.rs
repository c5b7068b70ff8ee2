use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::importers::normalizer::parse_date;
use crate::models::{Month, SeriesByTicker};

/// Load a `ticker,date,price` CSV of historical prices.
///
/// Dates may be `YYYY-MM` or `YYYY-MM-DD`. When a month has several rows the
/// latest dated one is that month's close; a bare `YYYY-MM` row counts as the
/// close itself.
pub fn load_prices<P: AsRef<Path>>(file_path: P) -> Result<SeriesByTicker> {
    let path = file_path.as_ref();
    info!("Loading price series: {:?}", path);
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open price file {:?}", path))?;
    parse_prices(file)
}

/// Load a `ticker,month,return` CSV of benchmark constituent returns
pub fn load_benchmark_returns<P: AsRef<Path>>(file_path: P) -> Result<SeriesByTicker> {
    let path = file_path.as_ref();
    info!("Loading benchmark returns: {:?}", path);
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open benchmark file {:?}", path))?;
    parse_benchmark_returns(file)
}

pub fn parse_prices<R: Read>(input: R) -> Result<SeriesByTicker> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(input);
    let headers = reader.headers().context("Failed to read CSV headers")?.clone();
    let columns = find_columns(&headers, &["date", "month"], &["price", "close"])?;
    debug!("Price columns: {:?}", columns);

    // (ticker, month) -> (day rank, price); later rows win ties
    let mut closes: BTreeMap<(String, Month), (u32, Decimal)> = BTreeMap::new();

    for (idx, result) in reader.records().enumerate() {
        let record = result.context("Failed to read CSV record")?;
        match parse_price_row(&record, &columns) {
            Ok((ticker, month, rank, price)) => {
                let entry = closes.entry((ticker, month)).or_insert((rank, price));
                if rank >= entry.0 {
                    *entry = (rank, price);
                }
            }
            Err(e) => {
                warn!("Skipping price row {}: {}", idx + 2, e);
            }
        }
    }

    let mut series = SeriesByTicker::new();
    for ((ticker, month), (_, price)) in closes {
        series.entry(ticker).or_default().insert(month, price);
    }

    info!("Loaded prices for {} tickers", series.len());
    Ok(series)
}

pub fn parse_benchmark_returns<R: Read>(input: R) -> Result<SeriesByTicker> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(input);
    let headers = reader.headers().context("Failed to read CSV headers")?.clone();
    let columns = find_columns(&headers, &["month", "date"], &["return"])?;

    let mut series = SeriesByTicker::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.context("Failed to read CSV record")?;
        match parse_return_row(&record, &columns) {
            Ok((ticker, month, value)) => {
                if series
                    .entry(ticker.clone())
                    .or_default()
                    .insert(month, value)
                    .is_some()
                {
                    debug!("Duplicate return for {} {}, keeping the later row", ticker, month);
                }
            }
            Err(e) => {
                warn!("Skipping benchmark row {}: {}", idx + 2, e);
            }
        }
    }

    info!("Loaded benchmark returns for {} tickers", series.len());
    Ok(series)
}

#[derive(Debug)]
struct SeriesColumns {
    ticker: usize,
    date: usize,
    value: usize,
}

fn find_columns(
    headers: &StringRecord,
    date_names: &[&str],
    value_names: &[&str],
) -> Result<SeriesColumns> {
    let position = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.contains(&h.to_ascii_lowercase().as_str()))
    };

    Ok(SeriesColumns {
        ticker: position(&["ticker", "symbol"]).ok_or_else(|| anyhow!("Ticker column not found"))?,
        date: position(date_names).ok_or_else(|| anyhow!("Date column not found"))?,
        value: position(value_names).ok_or_else(|| anyhow!("Value column not found"))?,
    })
}

fn field<'a>(record: &'a StringRecord, idx: usize, name: &str) -> Result<&'a str> {
    record
        .get(idx)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("missing {}", name))
}

fn parse_ticker(record: &StringRecord, columns: &SeriesColumns) -> Result<String> {
    Ok(field(record, columns.ticker, "ticker")?.to_uppercase())
}

fn parse_price_row(
    record: &StringRecord,
    columns: &SeriesColumns,
) -> Result<(String, Month, u32, Decimal)> {
    let ticker = parse_ticker(record, columns)?;
    let date_str = field(record, columns.date, "date")?;
    let (month, rank) = if date_str.len() == 7 {
        (Month::from_str(date_str).map_err(|e| anyhow!(e))?, 32)
    } else {
        let date = parse_date(date_str).ok_or_else(|| anyhow!("invalid date '{}'", date_str))?;
        (Month::from_date(date), chrono::Datelike::day(&date))
    };
    let price = Decimal::from_str(field(record, columns.value, "price")?)
        .context("invalid price")?;
    if price <= Decimal::ZERO {
        return Err(anyhow!("non-positive price {}", price));
    }
    Ok((ticker, month, rank, price))
}

fn parse_return_row(
    record: &StringRecord,
    columns: &SeriesColumns,
) -> Result<(String, Month, Decimal)> {
    let ticker = parse_ticker(record, columns)?;
    let month = Month::from_str(field(record, columns.date, "month")?).map_err(|e| anyhow!(e))?;
    let value = Decimal::from_str(field(record, columns.value, "return")?)
        .context("invalid return")?;
    Ok((ticker, month, value))
}
