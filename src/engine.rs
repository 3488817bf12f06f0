//! Engine assembly and version routing
//!
//! The run mode and state-rule generation are decided once, up front, from
//! the legacy toggle and the `market_state.version` discriminator. A single
//! run never mixes legacy and config-driven state logic.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::config::SignalsConfig;
use crate::data::PriceTable;
use crate::error::{ConfigError, DataError};
use crate::signals::{self, SignalSeries};
use crate::state;
use crate::types::{Record, RunInputs, SignalMetrics, SignalResult, StateResult};

/// State-classification rule generation, selected once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateGeneration {
    /// Fixed tech/utilities/rates rule
    FixedThree,
    /// Ordered, user-configurable label rule list
    Ordered,
}

/// The signal/state computation engine
///
/// Holds the validated configuration for the duration of a run; the
/// configuration is read-only once the engine is constructed.
#[derive(Debug)]
pub struct Engine {
    config: SignalsConfig,
    generation: StateGeneration,
}

impl Engine {
    /// Legacy mode: built-in v0.1 signal set, fixed state rule, no config
    /// file involved
    pub fn legacy() -> Self {
        Engine {
            config: SignalsConfig::legacy(),
            generation: StateGeneration::FixedThree,
        }
    }

    /// Config-driven mode; validates before any date is processed
    pub fn from_config(config: SignalsConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let generation = match config.market_state.as_ref() {
            None => StateGeneration::FixedThree,
            Some(ms) => match ms.version {
                1 => StateGeneration::FixedThree,
                2 => {
                    config.validate_market_state()?;
                    StateGeneration::Ordered
                }
                other => return Err(ConfigError::UnknownStateVersion(other)),
            },
        };

        Ok(Engine { config, generation })
    }

    /// Override the shared lookback window (CLI flag)
    pub fn with_window(mut self, window: usize) -> Self {
        self.config.window = window;
        self
    }

    pub fn config(&self) -> &SignalsConfig {
        &self.config
    }

    pub fn generation(&self) -> StateGeneration {
        self.generation
    }

    /// Compute the full record sequence for the price table, date-ascending
    pub fn run(&self, table: &PriceTable) -> Result<Vec<Record>, DataError> {
        let series: Vec<SignalSeries> = self
            .config
            .signals
            .iter()
            .map(|(name, def)| signals::build_series(name, def, table, self.config.window))
            .collect::<Result<_, _>>()?;

        debug!(
            signals = series.len(),
            dates = table.len(),
            "signal series built"
        );

        let inputs = RunInputs {
            bench: self.config.bench.clone(),
            tickers: self.config.tickers(),
            window: self.config.window,
            price_field: self.config.price_field.clone(),
        };
        let state_field = self
            .config
            .market_state
            .as_ref()
            .map(|ms| ms.field.clone())
            .unwrap_or_else(|| "state".to_string());

        let mut records = Vec::with_capacity(table.len());
        for (idx, date) in table.dates().iter().enumerate() {
            let results: BTreeMap<String, SignalResult> = series
                .iter()
                .map(|s| (s.name.clone(), s.result_at(idx)))
                .collect();

            let state = match (self.generation, self.config.market_state.as_ref()) {
                (StateGeneration::Ordered, Some(ms)) => state::classify_configured(ms, &results),
                _ => state::classify_fixed(&results),
            };

            records.push(build_record(
                *date,
                &results,
                state,
                &inputs,
                &self.config.version,
                &state_field,
            ));
        }

        Ok(records)
    }
}

/// Assemble one output record from a date's evaluation
fn build_record(
    date: NaiveDate,
    results: &BTreeMap<String, SignalResult>,
    state: StateResult,
    inputs: &RunInputs,
    version: &str,
    state_field: &str,
) -> Record {
    let signals = results
        .iter()
        .map(|(name, r)| (name.clone(), r.trend))
        .collect();
    let metrics = results
        .iter()
        .map(|(name, r)| {
            (
                name.clone(),
                SignalMetrics {
                    value: r.value,
                    sma: r.sma,
                },
            )
        })
        .collect();

    Record {
        date,
        signals,
        state,
        metrics,
        inputs: inputs.clone(),
        version: version.to_string(),
        state_field: state_field.to_string(),
    }
}
