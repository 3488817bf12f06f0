//! Compute command implementation

use anyhow::Result;
use market_state::{data, output};
use tracing::info;

pub fn run(
    input: String,
    config_path: Option<String>,
    out: String,
    window: Option<usize>,
    legacy: bool,
) -> Result<()> {
    info!("Starting signal computation");

    let engine = super::build_engine(config_path.as_deref(), legacy, window)?;
    let config = engine.config();

    let tickers = config.tickers();
    info!("Loading prices from: {}", input);
    let table = data::load_wide_csv(&input, &tickers, &config.price_field)?;
    info!(
        "Loaded {} trading days for {} tickers",
        table.len(),
        tickers.len()
    );

    let records = engine.run(&table)?;
    output::write_ndjson_atomic(&out, &records)?;

    if let Some(last) = records.last() {
        println!("\n{}", "=".repeat(60));
        println!("MARKET STATE");
        println!("{}", "=".repeat(60));
        println!("Date:     {}", last.date.format("%Y-%m-%d"));
        println!("State:    {} ({})", last.state.label, last.state.rule);
        for (name, trend) in &last.signals {
            println!("  {:<12} {}", name, trend);
        }
        println!("Records:  {}", records.len());
        println!("Output:   {}", out);
        println!("{}", "=".repeat(60));
    }

    info!("Computation completed successfully");
    Ok(())
}
