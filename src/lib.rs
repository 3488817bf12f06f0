//! Market State Engine
//!
//! Converts a daily table of asset prices into dated market regime records:
//! a small set of directional UP/DOWN/NA signals derived from trailing
//! moving averages, plus a composite state label evaluated against a
//! user-editable rule configuration.

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod output;
pub mod signals;
pub mod state;
pub mod types;

pub use config::{MarketStateConfig, SignalDef, SignalRule, SignalSource, SignalsConfig};
pub use engine::{Engine, StateGeneration};
pub use error::{ConfigError, DataError};
pub use types::*;
