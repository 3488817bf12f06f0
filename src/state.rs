//! Market state classification
//!
//! Combines one date's signal classifications into a single composite
//! regime label. Two generations exist: the fixed three-signal rule and the
//! ordered, user-configurable label rule list. Both are stateless per-date
//! functions of the date's signal results.

use std::collections::BTreeMap;

use crate::config::{LabelDef, MarketStateConfig};
use crate::types::{SignalResult, StateResult, Trend};

/// Signals the fixed rule reads
pub const FIXED_RULE_SIGNALS: [&str; 3] = ["tech", "utilities", "rates"];

/// Fixed three-signal rule
///
/// tech UP with utilities and rates DOWN is risk-on; the exact mirror is
/// risk-off; anything else is mixed. A missing or NA leg makes the whole
/// state NA.
pub fn classify_fixed(signals: &BTreeMap<String, SignalResult>) -> StateResult {
    let trend = |name: &str| signals.get(name).map(|r| r.trend);

    if FIXED_RULE_SIGNALS
        .iter()
        .any(|name| !matches!(trend(name), Some(Trend::Up) | Some(Trend::Down)))
    {
        return na_fixed();
    }

    let legs = (trend("tech"), trend("utilities"), trend("rates"));
    let (Some(tech), Some(utilities), Some(rates)) = legs else {
        return na_fixed();
    };

    let label = match (tech, utilities, rates) {
        (Trend::Up, Trend::Down, Trend::Down) => "RISK_ON",
        (Trend::Down, Trend::Up, Trend::Up) => "RISK_OFF",
        _ => "MIXED",
    };

    StateResult {
        label: label.to_string(),
        rule: "fixed",
        missing: None,
    }
}

fn na_fixed() -> StateResult {
    StateResult {
        label: "NA".to_string(),
        rule: "fixed",
        missing: None,
    }
}

/// Ordered config-driven rule
///
/// First match over `labels_order` wins; default markers are skipped during
/// the ordered pass and only consulted as the fallback.
pub fn classify_configured(
    ms: &MarketStateConfig,
    signals: &BTreeMap<String, SignalResult>,
) -> StateResult {
    if !ms.enabled {
        return StateResult {
            label: ms.na_label.clone(),
            rule: "disabled",
            missing: None,
        };
    }

    let missing: Vec<String> = ms
        .required_signals
        .iter()
        .filter(|name| {
            !matches!(
                signals.get(name.as_str()).map(|r| r.trend),
                Some(Trend::Up) | Some(Trend::Down)
            )
        })
        .cloned()
        .collect();
    if !missing.is_empty() {
        return StateResult {
            label: ms.na_label.clone(),
            rule: "required",
            missing: Some(missing),
        };
    }

    for label in &ms.labels_order {
        let Some(LabelDef::Rule { all }) = ms.labels.get(label) else {
            continue;
        };
        let matched = all
            .iter()
            .all(|cond| signals.get(&cond.signal).map(|r| r.trend) == Some(cond.is));
        if matched {
            return StateResult {
                label: label.clone(),
                rule: "match",
                missing: None,
            };
        }
    }

    if let Some((name, _)) = ms.labels.iter().find(|(_, def)| def.is_default()) {
        return StateResult {
            label: name.clone(),
            rule: "default",
            missing: None,
        };
    }

    // Inherited fallback for configs with no default label
    StateResult {
        label: "MIXED".to_string(),
        rule: "fallback",
        missing: None,
    }
}
