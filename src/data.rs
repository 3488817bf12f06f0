//! Price data loading and fetching
//!
//! Handles loading the wide daily price CSV the engine consumes and
//! downloading fresh history from the Stooq public endpoint.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::error::DataError;
use crate::types::Ticker;

// =============================================================================
// Constants
// =============================================================================

const STOOQ_DAILY_URL: &str = "https://stooq.com/q/d/l/";
const REQUEST_DELAY_MS: u64 = 500;

const DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// Price table
// =============================================================================

/// Ordered-by-date table of per-ticker prices
///
/// Dates are strictly increasing and duplicate-free. A `None` cell is a
/// per-date gap; it is not an error and surfaces downstream as an NA
/// classification.
#[derive(Debug, Clone)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    columns: BTreeMap<Ticker, Vec<Option<f64>>>,
}

impl PriceTable {
    /// Assemble a table, enforcing the date and column-length invariants
    pub fn from_columns(
        dates: Vec<NaiveDate>,
        columns: BTreeMap<Ticker, Vec<Option<f64>>>,
    ) -> Result<Self, DataError> {
        for pair in dates.windows(2) {
            if pair[1] <= pair[0] {
                return Err(DataError::DuplicateDate(pair[1]));
            }
        }
        for (ticker, column) in &columns {
            if column.len() != dates.len() {
                return Err(DataError::LengthMismatch {
                    ticker: ticker.to_string(),
                    expected: dates.len(),
                    got: column.len(),
                });
            }
        }
        Ok(PriceTable { dates, columns })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|t| t.as_str())
    }

    /// Price series for one ticker, aligned with `dates()`
    pub fn series(&self, ticker: &str) -> Option<&[Option<f64>]> {
        self.columns.get(ticker).map(|c| c.as_slice())
    }
}

// =============================================================================
// Wide CSV loading
// =============================================================================

/// Load the wide daily price CSV: a `date` column plus one column per ticker
///
/// Ticker columns may be named bare (`SPY`) or suffixed with the price field
/// (`SPY_adj_close`). Every requested ticker must resolve under one of the
/// two conventions or loading fails naming all missing tickers.
pub fn load_wide_csv(
    path: impl AsRef<Path>,
    tickers: &[Ticker],
    price_field: &str,
) -> Result<PriceTable, DataError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_wide_csv(file, tickers, price_field)
}

/// Same as [`load_wide_csv`] but from any reader
pub fn read_wide_csv<R: Read>(
    reader: R,
    tickers: &[Ticker],
    price_field: &str,
) -> Result<PriceTable, DataError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();

    let date_idx = headers
        .iter()
        .position(|h| h == "date" || h == "Date")
        .ok_or(DataError::NoDateColumn)?;

    // Resolve each ticker to a column index, bare name first
    let mut column_idx = Vec::with_capacity(tickers.len());
    let mut missing = Vec::new();
    for ticker in tickers {
        let suffixed = format!("{}_{}", ticker, price_field);
        match headers
            .iter()
            .position(|h| h == ticker.as_str() || h == suffixed)
        {
            Some(idx) => column_idx.push(idx),
            None => missing.push(ticker.to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(DataError::MissingTickers {
            missing,
            price_field: price_field.to_string(),
        });
    }

    let mut rows: Vec<(NaiveDate, Vec<Option<f64>>)> = Vec::new();
    for (row_num, result) in rdr.records().enumerate() {
        let record = result?;

        let date_str = record.get(date_idx).unwrap_or("").trim();
        let date = NaiveDate::parse_from_str(date_str, DATE_FORMAT).map_err(|_| {
            DataError::BadDate {
                row: row_num + 1,
                value: date_str.to_string(),
            }
        })?;

        let mut cells = Vec::with_capacity(tickers.len());
        for (ticker, &idx) in tickers.iter().zip(&column_idx) {
            let raw = record.get(idx).unwrap_or("").trim();
            let price = parse_price(raw, ticker.as_str(), date)?;
            cells.push(price);
        }
        rows.push((date, cells));
    }

    if rows.is_empty() {
        return Err(DataError::Empty);
    }

    rows.sort_by_key(|(date, _)| *date);
    for pair in rows.windows(2) {
        if pair[1].0 == pair[0].0 {
            return Err(DataError::DuplicateDate(pair[1].0));
        }
    }

    let dates: Vec<NaiveDate> = rows.iter().map(|(date, _)| *date).collect();
    let mut columns: BTreeMap<Ticker, Vec<Option<f64>>> = tickers
        .iter()
        .map(|t| (t.clone(), Vec::with_capacity(rows.len())))
        .collect();
    for (_, cells) in &rows {
        for (ticker, &cell) in tickers.iter().zip(cells) {
            if let Some(column) = columns.get_mut(ticker) {
                column.push(cell);
            }
        }
    }

    PriceTable::from_columns(dates, columns)
}

/// Empty and NA-like cells are per-date gaps; anything else must be a
/// positive price
fn parse_price(raw: &str, ticker: &str, date: NaiveDate) -> Result<Option<f64>, DataError> {
    if raw.is_empty() || raw == "NA" || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let value: f64 = raw.parse().map_err(|_| DataError::BadPrice {
        ticker: ticker.to_string(),
        date,
        value: raw.to_string(),
    })?;
    if value <= 0.0 {
        return Err(DataError::NonPositivePrice {
            ticker: ticker.to_string(),
            date,
            value,
        });
    }
    Ok(Some(value))
}

/// Write a table back out in the wide format the engine loads
pub fn save_wide_csv(table: &PriceTable, path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let mut writer = csv::Writer::from_path(path).context("Failed to create prices CSV")?;

    let tickers: Vec<&str> = table.tickers().collect();
    let mut header = vec!["date"];
    header.extend(tickers.iter().copied());
    writer.write_record(&header)?;

    for (i, date) in table.dates().iter().enumerate() {
        let mut row = vec![date.format(DATE_FORMAT).to_string()];
        for ticker in &tickers {
            let cell = table
                .series(ticker)
                .and_then(|s| s.get(i).copied().flatten())
                .map(|v| v.to_string())
                .unwrap_or_default();
            row.push(cell);
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;

    info!("Saved {} trading days to {}", table.len(), path.display());
    Ok(path.to_path_buf())
}

// =============================================================================
// Stooq fetcher
// =============================================================================

/// Fetch daily close history from the Stooq public CSV endpoint
pub struct StooqFetcher {
    client: reqwest::blocking::Client,
    request_delay: StdDuration,
}

impl StooqFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(StdDuration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            request_delay: StdDuration::from_millis(REQUEST_DELAY_MS),
        })
    }

    /// Convert a ticker to Stooq's symbol format: SPY -> spy.us
    pub fn to_symbol(ticker: &str) -> String {
        let lower = ticker.to_lowercase();
        if lower.contains('.') {
            lower
        } else {
            format!("{}.us", lower)
        }
    }

    /// Fetch one ticker's daily close series for the date range
    pub fn fetch_daily(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>> {
        let url = format!(
            "{}?s={}&d1={}&d2={}&i=d",
            STOOQ_DAILY_URL,
            Self::to_symbol(ticker),
            start.format("%Y%m%d"),
            end.format("%Y%m%d"),
        );

        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("Failed to fetch {}", ticker))?;

        if !response.status().is_success() {
            anyhow::bail!("Stooq returned status {} for {}", response.status(), ticker);
        }

        let body = response.text().context("Failed to read response body")?;
        let mut rdr = csv::Reader::from_reader(body.as_bytes());

        // Stooq layout: Date,Open,High,Low,Close,Volume
        let headers = rdr.headers().context("Missing CSV header")?.clone();
        let date_idx = headers
            .iter()
            .position(|h| h == "Date")
            .with_context(|| format!("No Date column in Stooq response for {}", ticker))?;
        let close_idx = headers
            .iter()
            .position(|h| h == "Close")
            .with_context(|| format!("No Close column in Stooq response for {}", ticker))?;

        let mut series = Vec::new();
        for result in rdr.records() {
            let record = result?;
            let date_str = record.get(date_idx).unwrap_or("");
            let date = NaiveDate::parse_from_str(date_str, DATE_FORMAT)
                .with_context(|| format!("Unparseable date {:?} for {}", date_str, ticker))?;
            let close: f64 = record
                .get(close_idx)
                .unwrap_or("")
                .parse()
                .with_context(|| format!("Unparseable close for {} on {}", ticker, date))?;
            series.push((date, close));
        }

        Ok(series)
    }

    /// Download all tickers and align trading days across them
    pub fn fetch_table(
        &self,
        tickers: &[Ticker],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable> {
        info!(
            "Downloading prices for {} tickers from {} to {}",
            tickers.len(),
            start,
            end
        );

        let mut per_ticker: BTreeMap<Ticker, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
        for ticker in tickers {
            let series = self.fetch_daily(ticker.as_str(), start, end)?;
            if series.is_empty() {
                anyhow::bail!("No data returned for {}", ticker);
            }
            info!("  {} rows for {}", series.len(), ticker);
            per_ticker.insert(ticker.clone(), series.into_iter().collect());

            // Rate limiting
            sleep(self.request_delay);
        }

        let table = align_trading_days(&per_ticker)?;
        info!("{} trading days after alignment", table.len());
        Ok(table)
    }
}

/// Inner join on date: keep only dates where every ticker has a price
pub fn align_trading_days(
    per_ticker: &BTreeMap<Ticker, BTreeMap<NaiveDate, f64>>,
) -> Result<PriceTable> {
    let mut dates: Option<Vec<NaiveDate>> = None;
    for series in per_ticker.values() {
        let keys: Vec<NaiveDate> = series.keys().copied().collect();
        dates = Some(match dates {
            None => keys,
            Some(prev) => prev.into_iter().filter(|d| series.contains_key(d)).collect(),
        });
    }
    let dates = dates.unwrap_or_default();

    if dates.is_empty() {
        anyhow::bail!("No trading days with complete data found after alignment");
    }

    let dropped = per_ticker
        .values()
        .map(|s| s.len())
        .max()
        .unwrap_or(0)
        .saturating_sub(dates.len());
    if dropped > 0 {
        warn!("Dropped {} rows with incomplete ticker coverage", dropped);
    }

    let columns: BTreeMap<Ticker, Vec<Option<f64>>> = per_ticker
        .iter()
        .map(|(ticker, series)| {
            let column = dates.iter().map(|d| series.get(d).copied()).collect();
            (ticker.clone(), column)
        })
        .collect();

    PriceTable::from_columns(dates, columns).map_err(Into::into)
}

// =============================================================================
// Tests
// =============================================================================
