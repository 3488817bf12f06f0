//! CLI command implementations

pub mod compute;
pub mod fetch;
pub mod snapshot;
pub mod validate;

use anyhow::Result;
use market_state::{Engine, SignalsConfig};

/// Build the engine from the shared run parameters
///
/// `--legacy` short-circuits config loading entirely; otherwise the config
/// file is loaded, routed and validated before any data is touched.
pub fn build_engine(
    config_path: Option<&str>,
    legacy: bool,
    window: Option<usize>,
) -> Result<Engine> {
    if let Some(window) = window {
        anyhow::ensure!(window >= 1, "--window must be a positive integer");
    }

    let engine = if legacy {
        tracing::info!("Legacy mode: built-in v0.1 signal set");
        Engine::legacy()
    } else {
        let path =
            config_path.ok_or_else(|| anyhow::anyhow!("--config is required unless --legacy"))?;
        let config = SignalsConfig::from_file(path)?;
        tracing::info!("Loaded configuration from: {}", path);
        Engine::from_config(config)?
    };

    Ok(match window {
        Some(window) => engine.with_window(window),
        None => engine,
    })
}
