//! Snapshot command implementation
//!
//! Computes the latest record, writes it to state.json and produces a small
//! Markdown changelog of signal transitions since the previous snapshot.

use std::path::Path;

use anyhow::Result;
use market_state::{data, output};
use tracing::info;

pub fn run(
    input: String,
    config_path: Option<String>,
    legacy: bool,
    out_dir: String,
) -> Result<()> {
    info!("Building daily snapshot and changelog");

    let engine = super::build_engine(config_path.as_deref(), legacy, None)?;
    let config = engine.config();

    let tickers = config.tickers();
    let table = data::load_wide_csv(&input, &tickers, &config.price_field)?;
    let records = engine.run(&table)?;

    let Some(current) = records.last() else {
        anyhow::bail!("No records computed; price table was empty");
    };
    info!("Current state computed for {}", current.date);

    let out_dir = Path::new(&out_dir);
    std::fs::create_dir_all(out_dir)?;
    let state_path = out_dir.join("state.json");
    let changelog_path = out_dir.join("CHANGELOG.md");

    // Read the previous snapshot before overwriting it
    let prev = output::read_previous_state(&state_path);
    match &prev {
        Some(p) => info!(
            "Previous state loaded for {}",
            p.get("date").and_then(|d| d.as_str()).unwrap_or("unknown")
        ),
        None => info!("No previous state found"),
    }

    output::write_state_json(&state_path, current)?;
    output::write_changelog(&changelog_path, current, prev.as_ref())?;

    println!("Snapshot for {} -> {}", current.date, state_path.display());
    println!("{}", output::signal_changes(prev.as_ref(), &current.signals));
    Ok(())
}
