//! Fetch command implementation
//!
//! Downloads daily close history for every ticker the configuration
//! references and writes the aligned wide CSV the engine consumes.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use market_state::data::{self, StooqFetcher};
use tracing::info;

pub fn run(
    config_path: Option<String>,
    legacy: bool,
    start: String,
    end: Option<String>,
    out: String,
) -> Result<()> {
    let start = NaiveDate::parse_from_str(&start, "%Y-%m-%d")
        .with_context(|| format!("Invalid start date: {}", start))?;
    let end = match end {
        Some(end) => NaiveDate::parse_from_str(&end, "%Y-%m-%d")
            .with_context(|| format!("Invalid end date: {}", end))?,
        None => chrono::Local::now().date_naive(),
    };
    anyhow::ensure!(end > start, "End date must be after start date");

    let engine = super::build_engine(config_path.as_deref(), legacy, None)?;
    let tickers = engine.config().tickers();
    info!("Required tickers: {:?}", tickers);

    let fetcher = StooqFetcher::new()?;
    let table = fetcher.fetch_table(&tickers, start, end)?;
    data::save_wide_csv(&table, &out)?;

    println!(
        "Saved {} trading days for {} tickers to {}",
        table.len(),
        tickers.len(),
        out
    );
    Ok(())
}
