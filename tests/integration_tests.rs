//! Integration tests for the market-state engine
//!
//! These exercise the full path from price table to emitted records.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use market_state::data::PriceTable;
use market_state::{
    data, output, Engine, SignalRule, SignalsConfig, StateGeneration, Ticker, Trend,
};

// =============================================================================
// Test Utilities
// =============================================================================

fn dates(count: usize) -> Vec<NaiveDate> {
    let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    (0..count)
        .map(|i| start + chrono::Days::new(i as u64))
        .collect()
}

/// Build a price table from full (gap-free) per-ticker series
fn table(columns: &[(&str, Vec<f64>)]) -> PriceTable {
    let len = columns[0].1.len();
    let columns: BTreeMap<Ticker, Vec<Option<f64>>> = columns
        .iter()
        .map(|(t, v)| (Ticker::new(t), v.iter().copied().map(Some).collect()))
        .collect();
    PriceTable::from_columns(dates(len), columns).unwrap()
}

/// Constant-price legacy universe
fn flat_legacy_table(len: usize) -> PriceTable {
    table(&[
        ("XLE", vec![100.0; len]),
        ("TLT", vec![110.0; len]),
        ("XLK", vec![150.0; len]),
        ("XLU", vec![65.0; len]),
        ("SPY", vec![400.0; len]),
    ])
}

/// Two-signal v2 configuration used by the state-rule tests
fn v2_config_yaml() -> &'static str {
    r#"
price_field: adj_close
window: 3
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

fn v2_engine(yaml: &str) -> Engine {
    let config = SignalsConfig::from_yaml_str(yaml, "test").unwrap();
    Engine::from_config(config).unwrap()
}

// =============================================================================
// Warmup Window Tests
// =============================================================================

#[test]
fn test_first_window_minus_one_dates_are_na() {
    let engine = Engine::legacy();
    let records = engine.run(&flat_legacy_table(25)).unwrap();

    for record in &records[..19] {
        for trend in record.signals.values() {
            assert_eq!(*trend, Trend::Na);
        }
    }
    for record in &records[19..] {
        for trend in record.signals.values() {
            assert_ne!(*trend, Trend::Na, "complete data past warmup must classify");
        }
    }
}

#[test]
fn test_constant_ratio_classifies_down_on_window_fill() {
    // 21 dates, A constant 100, B constant 400, window 20, gt_sma on A/B.
    // The ratio equals its own SMA exactly, which resolves to DOWN.
    let yaml = r#"
bench: B
window: 20
signals:
  ratio:
    kind: rs
    a: A
    b: B
    rule: gt_sma
"#;
    let engine = v2_engine(yaml);
    let table = table(&[("A", vec![100.0; 21]), ("B", vec![400.0; 21])]);
    let records = engine.run(&table).unwrap();

    for record in &records[..19] {
        assert_eq!(record.signals["ratio"], Trend::Na);
    }
    assert_eq!(records[19].signals["ratio"], Trend::Down);
    assert_eq!(records[20].signals["ratio"], Trend::Down);
}

#[test]
fn test_rates_semantics_tlt_below_ma_is_up() {
    // TLT drops below its 20-day MA, so the rates signal reads UP (yields up)
    let mut tlt = vec![110.0; 10];
    tlt.extend(vec![105.0; 11]);

    let engine = Engine::legacy();
    let table = table(&[
        ("XLE", vec![100.0; 21]),
        ("TLT", tlt),
        ("XLK", vec![150.0; 21]),
        ("XLU", vec![65.0; 21]),
        ("SPY", vec![400.0; 21]),
    ]);
    let records = engine.run(&table).unwrap();

    assert_eq!(records[20].signals["rates"], Trend::Up);
}

#[test]
fn test_rising_relative_strength_is_up() {
    // XLE gains on SPY in the back half, pulling the ratio above its MA
    let mut xle = vec![100.0; 10];
    xle.extend(vec![105.0; 11]);

    let engine = Engine::legacy();
    let table = table(&[
        ("XLE", xle),
        ("TLT", vec![110.0; 21]),
        ("XLK", vec![150.0; 21]),
        ("XLU", vec![65.0; 21]),
        ("SPY", vec![400.0; 21]),
    ]);
    let records = engine.run(&table).unwrap();

    assert_eq!(records[20].signals["energy"], Trend::Up);
}

// =============================================================================
// Rule Complementarity Tests
// =============================================================================

#[test]
fn test_gt_and_lt_rules_are_complementary() {
    let pairs = [(1.0, 2.0), (2.0, 1.0), (0.37, 0.375), (100.0, 99.9)];
    for (value, sma) in pairs {
        let gt = market_state::signals::classify(Some(value), Some(sma), SignalRule::GtSma);
        let lt = market_state::signals::classify(Some(value), Some(sma), SignalRule::LtSma);
        assert_ne!(gt, lt, "value {} vs sma {} must flip between rules", value, sma);
    }
}

#[test]
fn test_equality_is_down_under_both_rules() {
    for rule in [SignalRule::GtSma, SignalRule::LtSma] {
        assert_eq!(
            market_state::signals::classify(Some(0.25), Some(0.25), rule),
            Trend::Down
        );
    }
}

// =============================================================================
// Fixed State Rule Tests
// =============================================================================

/// Legacy universe shaped so tech/utilities/rates land on the wanted trends
fn fixed_rule_table(tech: Trend, utilities: Trend, rates: Trend) -> PriceTable {
    let len = 21;
    let shaped = |trend: Trend, flat: f64| -> Vec<f64> {
        let mut series = vec![flat; 10];
        let late = match trend {
            Trend::Up => flat * 1.05,
            Trend::Down => flat * 0.95,
            Trend::Na => flat,
        };
        series.extend(vec![late; len - 10]);
        series
    };

    // rates reads TLT with lt_sma, so UP wants the price below its MA
    let tlt = match rates {
        Trend::Up => shaped(Trend::Down, 110.0),
        Trend::Down => shaped(Trend::Up, 110.0),
        Trend::Na => vec![110.0; len],
    };

    table(&[
        ("XLE", vec![100.0; len]),
        ("TLT", tlt),
        ("XLK", shaped(tech, 150.0)),
        ("XLU", shaped(utilities, 65.0)),
        ("SPY", vec![400.0; len]),
    ])
}

#[test]
fn test_fixed_rule_risk_on() {
    let engine = Engine::legacy();
    let table = fixed_rule_table(Trend::Up, Trend::Down, Trend::Down);
    let records = engine.run(&table).unwrap();
    assert_eq!(records[20].state.label, "RISK_ON");
    assert_eq!(records[20].state.rule, "fixed");
}

#[test]
fn test_fixed_rule_risk_off() {
    let engine = Engine::legacy();
    let table = fixed_rule_table(Trend::Down, Trend::Up, Trend::Up);
    let records = engine.run(&table).unwrap();
    assert_eq!(records[20].state.label, "RISK_OFF");
}

#[test]
fn test_fixed_rule_single_flip_is_mixed() {
    let engine = Engine::legacy();
    for table in [
        fixed_rule_table(Trend::Down, Trend::Down, Trend::Down),
        fixed_rule_table(Trend::Up, Trend::Up, Trend::Down),
        fixed_rule_table(Trend::Up, Trend::Down, Trend::Up),
    ] {
        let records = engine.run(&table).unwrap();
        assert_eq!(records[20].state.label, "MIXED");
    }
}

#[test]
fn test_fixed_rule_na_during_warmup() {
    let engine = Engine::legacy();
    let records = engine.run(&flat_legacy_table(21)).unwrap();
    assert_eq!(records[0].state.label, "NA");
}

// =============================================================================
// Config-Driven State Rule Tests
// =============================================================================

/// 21 dates shaped so tech is UP and rates DOWN once the window fills:
/// XLK gains on a flat SPY every day, TLT grinds higher
fn risk_on_table() -> PriceTable {
    let xlk: Vec<f64> = (0..21).map(|i| 150.0 + i as f64).collect();
    let tlt: Vec<f64> = (0..21).map(|i| 105.0 + 0.5 * i as f64).collect();
    table(&[("XLK", xlk), ("TLT", tlt), ("SPY", vec![400.0; 21])])
}

#[test]
fn test_config_driven_first_match_wins() {
    // TECH_UP is satisfiable whenever RISK_ON is; order decides
    let yaml = v2_config_yaml()
        .replace(
            "labels_order: [RISK_ON, RISK_OFF]",
            "labels_order: [RISK_ON, TECH_UP, RISK_OFF]",
        )
        .replace(
            "    MIXED:",
            "    TECH_UP:\n      all:\n        - {signal: tech, is: UP}\n    MIXED:",
        );

    let engine = v2_engine(&yaml);
    let records = engine.run(&risk_on_table()).unwrap();

    let last = records.last().unwrap();
    assert_eq!(last.signals["tech"], Trend::Up);
    assert_eq!(last.signals["rates"], Trend::Down);
    assert_eq!(last.state.label, "RISK_ON", "earlier label must win");
}

#[test]
fn test_config_driven_required_na_lists_offenders() {
    // Window 3: the first two dates have no SMA, so required signals are NA
    let engine = v2_engine(v2_config_yaml());
    let records = engine.run(&risk_on_table()).unwrap();

    let first = &records[0];
    assert_eq!(first.state.label, "NA");
    assert_eq!(first.state.rule, "required");
    // Offenders are listed in required_signals order
    assert_eq!(
        first.state.missing,
        Some(vec!["tech".to_string(), "rates".to_string()])
    );
}

#[test]
fn test_config_driven_disabled_forces_na_label() {
    let yaml = v2_config_yaml().replace("version: 2", "version: 2\n  enabled: false\n  na_label: HALTED");
    let engine = v2_engine(&yaml);
    let records = engine.run(&risk_on_table()).unwrap();

    for record in &records {
        assert_eq!(record.state.label, "HALTED");
        assert_eq!(record.state.rule, "disabled");
    }
}

#[test]
fn test_config_driven_custom_state_field() {
    let yaml = v2_config_yaml().replace("version: 2", "version: 2\n  field: regime");
    let engine = v2_engine(&yaml);
    let records = engine.run(&risk_on_table()).unwrap();

    let json = serde_json::to_string(records.last().unwrap()).unwrap();
    assert!(json.contains("\"regime\":{"));
    assert!(!json.contains("\"state\":{"));
}

#[test]
fn test_market_state_absent_selects_fixed_rule() {
    let yaml = r#"
bench: SPY
window: 3
signals:
  tech:
    kind: rs
    a: XLK
    b: SPY
    rule: gt_sma
"#;
    let engine = v2_engine(yaml);
    assert_eq!(engine.generation(), StateGeneration::FixedThree);
}

// =============================================================================
// Determinism Tests
// =============================================================================

#[test]
fn test_round_trip_determinism() {
    let engine = v2_engine(v2_config_yaml());
    let table = risk_on_table();

    let mut first = Vec::new();
    output::write_ndjson(&mut first, &engine.run(&table).unwrap()).unwrap();
    let mut second = Vec::new();
    output::write_ndjson(&mut second, &engine.run(&table).unwrap()).unwrap();

    assert_eq!(first, second, "identical inputs must produce identical bytes");
}

#[test]
fn test_records_in_date_ascending_order() {
    let engine = Engine::legacy();
    let records = engine.run(&flat_legacy_table(21)).unwrap();
    for pair in records.windows(2) {
        assert!(pair[0].date < pair[1].date);
    }
}

// =============================================================================
// Record Schema Tests
// =============================================================================

#[test]
fn test_record_schema_completeness() {
    let engine = Engine::legacy();
    let records = engine.run(&flat_legacy_table(21)).unwrap();

    let json: serde_json::Value =
        serde_json::to_value(&records[20]).unwrap();
    assert!(json.get("date").is_some());
    assert!(json.get("signals").is_some());
    assert!(json.get("state").is_some());
    assert!(json.get("metrics").is_some());
    assert!(json.get("inputs").is_some());
    assert_eq!(json["version"], "0.1");
    assert_eq!(json["inputs"]["window"], 20);
    assert_eq!(json["inputs"]["price_field"], "adj_close");
    assert_eq!(
        json["inputs"]["tickers"],
        serde_json::json!(["SPY", "TLT", "XLE", "XLK", "XLU"])
    );
}

#[test]
fn test_metrics_are_null_during_warmup() {
    let engine = Engine::legacy();
    let records = engine.run(&flat_legacy_table(21)).unwrap();

    let json = serde_json::to_value(&records[0]).unwrap();
    assert!(json["metrics"]["tech"]["sma"].is_null());
    assert!(!json["metrics"]["tech"]["value"].is_null());
}

// =============================================================================
// CSV Loading Tests
// =============================================================================

#[test]
fn test_csv_round_trip_through_engine() {
    let csv = "\
date,XLK,TLT,SPY
2025-01-01,150.0,110.0,400.0
2025-01-02,151.0,110.0,400.0
2025-01-03,152.0,109.0,401.0
2025-01-06,153.0,108.0,402.0
";
    let tickers = vec![Ticker::new("SPY"), Ticker::new("TLT"), Ticker::new("XLK")];
    let table = data::read_wide_csv(csv.as_bytes(), &tickers, "adj_close").unwrap();

    let engine = v2_engine(v2_config_yaml());
    let records = engine.run(&table).unwrap();

    assert_eq!(records.len(), 4);
    assert_eq!(records[2].signals["tech"], Trend::Up);
    assert_eq!(records[2].signals["rates"], Trend::Up);
}

#[test]
fn test_missing_ticker_columns_abort_loading() {
    let csv = "date,SPY\n2025-01-01,400.0\n";
    let tickers = vec![Ticker::new("SPY"), Ticker::new("TLT"), Ticker::new("XLK")];
    let err = data::read_wide_csv(csv.as_bytes(), &tickers, "adj_close").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("TLT"));
    assert!(message.contains("XLK"));
}
