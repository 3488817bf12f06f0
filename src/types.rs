//! Core data types used across the engine

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Ticker symbol using Arc<str> for cheap cloning
///
/// Tickers are cloned into every record's inputs block and into per-signal
/// lookups, so cloning must not reallocate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticker(#[serde(with = "arc_str_serde")] std::sync::Arc<str>);

/// Custom serde for Arc<str>
mod arc_str_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S>(value: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Arc::from(s.as_str()))
    }
}

impl Ticker {
    pub fn new(s: impl AsRef<str>) -> Self {
        Ticker(std::sync::Arc::from(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Ticker {
    fn from(s: &str) -> Self {
        Ticker::new(s)
    }
}

// Lets BTreeMap<Ticker, _> be queried with a plain &str
impl std::borrow::Borrow<str> for Ticker {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Per-date directional classification of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
    Up,
    Down,
    Na,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Trend::Up => "UP",
            Trend::Down => "DOWN",
            Trend::Na => "NA",
        };
        write!(f, "{}", s)
    }
}

/// One signal evaluated on one date: classification plus the numbers behind it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignalResult {
    pub trend: Trend,
    pub value: Option<f64>,
    pub sma: Option<f64>,
}

/// Composite state for one date
///
/// `rule` names the branch that produced the label: `fixed`, `disabled`,
/// `required`, `match`, `default` or `fallback`. `missing` carries the
/// required signal names that forced an NA state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateResult {
    pub label: String,
    pub rule: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
}

/// Numeric value/SMA pair reported per signal in every record
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignalMetrics {
    pub value: Option<f64>,
    pub sma: Option<f64>,
}

/// Run provenance echoed into every record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunInputs {
    pub bench: String,
    pub tickers: Vec<Ticker>,
    pub window: usize,
    pub price_field: String,
}

/// One dated output record
///
/// Built fresh per date and immutable once emitted. The key the state object
/// is written under is configurable (`market_state.field`), so serialization
/// is written by hand instead of derived.
#[derive(Debug, Clone)]
pub struct Record {
    pub date: NaiveDate,
    pub signals: BTreeMap<String, Trend>,
    pub state: StateResult,
    pub metrics: BTreeMap<String, SignalMetrics>,
    pub inputs: RunInputs,
    pub version: String,
    pub state_field: String,
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(6))?;
        map.serialize_entry("date", &self.date.format("%Y-%m-%d").to_string())?;
        map.serialize_entry("signals", &self.signals)?;
        map.serialize_entry(self.state_field.as_str(), &self.state)?;
        map.serialize_entry("metrics", &self.metrics)?;
        map.serialize_entry("inputs", &self.inputs)?;
        map.serialize_entry("version", &self.version)?;
        map.end()
    }
}
