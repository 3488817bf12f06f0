//! Rule configuration
//!
//! Loading, defaults and structural validation for the signal and
//! market-state rule configuration. YAML is the canonical on-disk format
//! (`signals.yaml`); JSON is accepted as well, dispatched on file extension.
//!
//! Signal kinds and comparison rules are closed enums rejected at
//! deserialization time, never deferred to per-date evaluation.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::types::{Ticker, Trend};

/// Shared process-wide lookback default
pub const DEFAULT_WINDOW: usize = 20;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalsConfig {
    #[serde(default = "default_price_field")]
    pub price_field: String,
    #[serde(default = "default_window")]
    pub window: usize,
    /// Benchmark ticker, always fetched and echoed into record inputs
    pub bench: String,
    pub signals: BTreeMap<String, SignalDef>,
    /// Schema version tag stamped into every record
    #[serde(default = "default_version")]
    pub version: String,
    /// Optional state-classification block; absence selects the fixed
    /// three-signal rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_state: Option<MarketStateConfig>,
}

fn default_price_field() -> String {
    "adj_close".to_string()
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

fn default_version() -> String {
    "0.1".to_string()
}

/// One configured signal: what it measures, how it compares to its MA
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalDef {
    #[serde(flatten)]
    pub source: SignalSource,
    pub rule: SignalRule,
    /// Per-signal lookback override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<usize>,
}

impl SignalDef {
    /// Tickers this signal reads from the price table
    pub fn tickers(&self) -> Vec<&str> {
        match &self.source {
            SignalSource::Rs { a, b } => vec![a, b],
            SignalSource::Price { ticker } => vec![ticker],
        }
    }

    pub fn window(&self, default: usize) -> usize {
        self.window.unwrap_or(default)
    }
}

/// What a signal measures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalSource {
    /// Relative strength: price of `a` divided by price of `b`
    Rs { a: String, b: String },
    /// Raw price of a single ticker
    Price { ticker: String },
}

/// How a signal value compares against its moving average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalRule {
    /// UP iff value strictly above the MA
    GtSma,
    /// UP iff value strictly below the MA (inverted reading, e.g. bond
    /// price down means yields up)
    LtSma,
}

/// State-classification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStateConfig {
    /// Rule generation: 1 = fixed three-signal rule, 2 = ordered label rules
    #[serde(default = "default_state_version")]
    pub version: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Output key the state object is written under
    #[serde(default = "default_state_field")]
    pub field: String,
    #[serde(default = "default_na_label")]
    pub na_label: String,
    /// Signals whose NA forces the state to `na_label`
    #[serde(default)]
    pub required_signals: Vec<String>,
    /// Label evaluation priority, first match wins
    #[serde(default)]
    pub labels_order: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, LabelDef>,
}

fn default_state_version() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

fn default_state_field() -> String {
    "state".to_string()
}

fn default_na_label() -> String {
    "NA".to_string()
}

/// A label is either the default marker or a conjunction of conditions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelDef {
    /// `{default: true}`
    Default { default: bool },
    /// `{all: [{signal, is}, ...]}`
    Rule { all: Vec<Condition> },
}

impl LabelDef {
    pub fn is_default(&self) -> bool {
        matches!(self, LabelDef::Default { default: true })
    }
}

/// Equality condition on one signal's classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub signal: String,
    pub is: Trend,
}

impl SignalsConfig {
    /// Load configuration from a YAML or JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "yaml" | "yml" => Self::from_yaml_str(&contents, &path.display().to_string()),
            "json" => Self::from_json_str(&contents, &path.display().to_string()),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn from_yaml_str(contents: &str, path: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    pub fn from_json_str(contents: &str, path: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    /// The built-in v0.1 signal set: three sector relative-strength signals
    /// against SPY plus TLT price against its own MA
    pub fn legacy() -> Self {
        let mut signals = BTreeMap::new();
        signals.insert(
            "energy".to_string(),
            SignalDef {
                source: SignalSource::Rs {
                    a: "XLE".to_string(),
                    b: "SPY".to_string(),
                },
                rule: SignalRule::GtSma,
                window: None,
            },
        );
        signals.insert(
            "tech".to_string(),
            SignalDef {
                source: SignalSource::Rs {
                    a: "XLK".to_string(),
                    b: "SPY".to_string(),
                },
                rule: SignalRule::GtSma,
                window: None,
            },
        );
        signals.insert(
            "utilities".to_string(),
            SignalDef {
                source: SignalSource::Rs {
                    a: "XLU".to_string(),
                    b: "SPY".to_string(),
                },
                rule: SignalRule::GtSma,
                window: None,
            },
        );
        signals.insert(
            "rates".to_string(),
            SignalDef {
                source: SignalSource::Price {
                    ticker: "TLT".to_string(),
                },
                rule: SignalRule::LtSma,
                window: None,
            },
        );

        SignalsConfig {
            price_field: default_price_field(),
            window: DEFAULT_WINDOW,
            bench: "SPY".to_string(),
            signals,
            version: "0.1".to_string(),
            market_state: None,
        }
    }

    /// Sorted distinct set of all tickers referenced by any signal plus the
    /// benchmark
    pub fn tickers(&self) -> Vec<Ticker> {
        self.signals
            .values()
            .flat_map(|def| def.tickers())
            .chain(std::iter::once(self.bench.as_str()))
            .map(Ticker::new)
            .unique()
            .sorted()
            .collect()
    }

    /// Structural checks shared by every run mode
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signals.is_empty() {
            return Err(ConfigError::NoSignals);
        }
        if self.window == 0 {
            return Err(ConfigError::InvalidWindow);
        }
        for (name, def) in &self.signals {
            if def.window == Some(0) {
                return Err(ConfigError::InvalidSignalWindow { name: name.clone() });
            }
        }
        Ok(())
    }

    /// Structural checks for the ordered label-rule generation, run before
    /// any date is processed
    pub fn validate_market_state(&self) -> Result<(), ConfigError> {
        let Some(ms) = self.market_state.as_ref() else {
            return Ok(());
        };

        if ms.required_signals.is_empty() {
            return Err(ConfigError::EmptyList("required_signals"));
        }
        if ms.labels_order.is_empty() {
            return Err(ConfigError::EmptyList("labels_order"));
        }

        for label in &ms.labels_order {
            let def = ms
                .labels
                .get(label)
                .ok_or_else(|| ConfigError::UndefinedLabel(label.clone()))?;
            match def {
                LabelDef::Default { default: true } => {}
                LabelDef::Default { default: false } => {
                    return Err(ConfigError::BadDefaultMarker {
                        label: label.clone(),
                    });
                }
                LabelDef::Rule { all } => {
                    if all.is_empty() {
                        return Err(ConfigError::EmptyConditions {
                            label: label.clone(),
                        });
                    }
                }
            }
        }

        let mut first_default: Option<&str> = None;
        for (name, def) in &ms.labels {
            if def.is_default() {
                if let Some(first) = first_default {
                    return Err(ConfigError::MultipleDefaults {
                        first: first.to_string(),
                        second: name.clone(),
                    });
                }
                first_default = Some(name);
            }
        }
        if first_default.is_none() {
            warn!("market_state.labels has no default label; unmatched dates will fall back to MIXED");
        }

        for name in &ms.required_signals {
            if !self.signals.contains_key(name) {
                warn!(signal = %name, "required signal is not defined; every state will be {}", ms.na_label);
            }
        }
        for (label, def) in &ms.labels {
            if let LabelDef::Rule { all } = def {
                for cond in all {
                    if !self.signals.contains_key(&cond.signal) {
                        warn!(label = %label, signal = %cond.signal, "condition references undefined signal and can never match");
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v2_yaml() -> &'static str {
        r#"
price_field: adj_close
window: 20
bench: SPY
version: "0.2"
signals:
  tech:
    kind: rs
    a: XLK
    b: SPY
    rule: gt_sma
  rates:
    kind: price
    ticker: TLT
    rule: lt_sma
market_state:
  version: 2
  required_signals: [tech, rates]
  labels_order: [RISK_ON, RISK_OFF]
  labels:
    RISK_ON:
      all:
        - {signal: tech, is: UP}
        - {signal: rates, is: DOWN}
    RISK_OFF:
      all:
        - {signal: tech, is: DOWN}
        - {signal: rates, is: UP}
    MIXED:
      default: true
"#
    }

    #[test]
    fn test_parse_v2_yaml() {
        let config = SignalsConfig::from_yaml_str(v2_yaml(), "test").unwrap();
        assert_eq!(config.window, 20);
        assert_eq!(config.signals.len(), 2);
        assert!(matches!(
            config.signals["tech"].source,
            SignalSource::Rs { .. }
        ));
        assert_eq!(config.signals["rates"].rule, SignalRule::LtSma);

        let ms = config.market_state.as_ref().unwrap();
        assert_eq!(ms.version, 2);
        assert!(ms.enabled);
        assert_eq!(ms.field, "state");
        assert_eq!(ms.na_label, "NA");
        assert!(ms.labels["MIXED"].is_default());

        config.validate().unwrap();
        config.validate_market_state().unwrap();
    }

    #[test]
    fn test_unknown_kind_rejected_at_parse_time() {
        let yaml = r#"
bench: SPY
signals:
  bad:
    kind: ema_cross
    ticker: SPY
    rule: gt_sma
"#;
        let err = SignalsConfig::from_yaml_str(yaml, "test").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_unknown_rule_rejected_at_parse_time() {
        let yaml = r#"
bench: SPY
signals:
  bad:
    kind: price
    ticker: SPY
    rule: ge_sma
"#;
        assert!(SignalsConfig::from_yaml_str(yaml, "test").is_err());
    }

    #[test]
    fn test_defaults_applied() {
        let yaml = r#"
bench: SPY
signals:
  spy:
    kind: price
    ticker: SPY
    rule: gt_sma
"#;
        let config = SignalsConfig::from_yaml_str(yaml, "test").unwrap();
        assert_eq!(config.price_field, "adj_close");
        assert_eq!(config.window, DEFAULT_WINDOW);
        assert_eq!(config.version, "0.1");
        assert!(config.market_state.is_none());
    }

    #[test]
    fn test_undefined_label_in_order() {
        let mut config = SignalsConfig::from_yaml_str(v2_yaml(), "test").unwrap();
        config
            .market_state
            .as_mut()
            .unwrap()
            .labels_order
            .push("EUPHORIA".to_string());
        let err = config.validate_market_state().unwrap_err();
        assert!(matches!(err, ConfigError::UndefinedLabel(label) if label == "EUPHORIA"));
    }

    #[test]
    fn test_multiple_defaults_rejected() {
        let mut config = SignalsConfig::from_yaml_str(v2_yaml(), "test").unwrap();
        config
            .market_state
            .as_mut()
            .unwrap()
            .labels
            .insert("ALSO_DEFAULT".to_string(), LabelDef::Default { default: true });
        let err = config.validate_market_state().unwrap_err();
        assert!(matches!(err, ConfigError::MultipleDefaults { .. }));
    }

    #[test]
    fn test_empty_conditions_rejected() {
        let mut config = SignalsConfig::from_yaml_str(v2_yaml(), "test").unwrap();
        config
            .market_state
            .as_mut()
            .unwrap()
            .labels
            .insert("RISK_ON".to_string(), LabelDef::Rule { all: vec![] });
        let err = config.validate_market_state().unwrap_err();
        assert!(matches!(err, ConfigError::EmptyConditions { label } if label == "RISK_ON"));
    }

    #[test]
    fn test_empty_required_signals_rejected() {
        let mut config = SignalsConfig::from_yaml_str(v2_yaml(), "test").unwrap();
        config.market_state.as_mut().unwrap().required_signals.clear();
        let err = config.validate_market_state().unwrap_err();
        assert!(matches!(err, ConfigError::EmptyList("required_signals")));
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut config = SignalsConfig::legacy();
        config.window = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::InvalidWindow
        ));
    }

    #[test]
    fn test_legacy_ticker_universe() {
        let config = SignalsConfig::legacy();
        let universe = config.tickers();
        let tickers: Vec<&str> = universe.iter().map(|t| t.as_str()).collect();
        assert_eq!(tickers, vec!["SPY", "TLT", "XLE", "XLK", "XLU"]);
    }

    #[test]
    fn test_json_config_loads() {
        let json = r#"{
            "bench": "SPY",
            "signals": {
                "spy": {"kind": "price", "ticker": "SPY", "rule": "gt_sma"}
            }
        }"#;
        let config = SignalsConfig::from_json_str(json, "test").unwrap();
        assert_eq!(config.signals.len(), 1);
    }
}
