//! Validate command implementation

use anyhow::Result;
use market_state::{Engine, SignalsConfig, StateGeneration};

pub fn run(config_path: String) -> Result<()> {
    let config = SignalsConfig::from_file(&config_path)?;
    let engine = Engine::from_config(config)?;
    let config = engine.config();

    println!("Configuration OK: {}", config_path);
    println!("  version:     {}", config.version);
    println!("  price_field: {}", config.price_field);
    println!("  window:      {}", config.window);
    println!("  signals:     {}", config.signals.len());
    let tickers: Vec<String> = config.tickers().iter().map(|t| t.to_string()).collect();
    println!("  tickers:     {}", tickers.join(", "));
    let generation = match engine.generation() {
        StateGeneration::FixedThree => "fixed three-signal rule",
        StateGeneration::Ordered => "ordered label rules",
    };
    println!("  state rule:  {}", generation);
    Ok(())
}
