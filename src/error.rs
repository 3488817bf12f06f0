//! Error taxonomy
//!
//! Configuration and price-input problems are fatal and abort before any
//! record is produced. Per-date data gaps (short lookback window, missing
//! price on one date) are not errors: they surface in-band as NA
//! classifications in the output records.

use chrono::NaiveDate;
use thiserror::Error;

/// Fatal configuration errors, raised during load/validation
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: String, message: String },

    #[error("unsupported config format .{0:?} (expected .yaml, .yml or .json)")]
    UnsupportedFormat(String),

    #[error("config defines no signals")]
    NoSignals,

    #[error("window must be a positive integer")]
    InvalidWindow,

    #[error("signal {name:?}: window must be a positive integer")]
    InvalidSignalWindow { name: String },

    #[error("market_state.{0} must be a non-empty list")]
    EmptyList(&'static str),

    #[error("market_state.labels_order references undefined label {0:?}")]
    UndefinedLabel(String),

    #[error("market_state.labels: more than one default label ({first:?} and {second:?})")]
    MultipleDefaults { first: String, second: String },

    #[error("market_state.labels.{label}: default marker must be `default: true`")]
    BadDefaultMarker { label: String },

    #[error("market_state.labels.{label}: condition list must be non-empty")]
    EmptyConditions { label: String },

    #[error("unsupported market_state.version {0} (expected 1 or 2)")]
    UnknownStateVersion(u32),
}

/// Fatal price-input errors
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read prices from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read prices CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("prices CSV has no date column (expected `date` or `Date`)")]
    NoDateColumn,

    #[error("missing required ticker columns (as TICKER or TICKER_{price_field}): {missing:?}")]
    MissingTickers {
        missing: Vec<String>,
        price_field: String,
    },

    #[error("row {row}: unparseable date {value:?}")]
    BadDate { row: usize, value: String },

    #[error("duplicate date {0} in price table")]
    DuplicateDate(NaiveDate),

    #[error("{ticker} on {date}: unparseable price {value:?}")]
    BadPrice {
        ticker: String,
        date: NaiveDate,
        value: String,
    },

    #[error("{ticker} on {date}: price must be positive, got {value}")]
    NonPositivePrice {
        ticker: String,
        date: NaiveDate,
        value: f64,
    },

    #[error("column {ticker:?} has {got} rows, expected {expected}")]
    LengthMismatch {
        ticker: String,
        expected: usize,
        got: usize,
    },

    #[error("price table is empty")]
    Empty,

    #[error("signal {signal:?} references ticker {ticker:?} absent from the price table")]
    UnknownTicker { signal: String, ticker: String },
}
