//! Signal engine
//!
//! Derives a value series and its trailing moving average for each
//! configured signal definition, then classifies every date as UP, DOWN or
//! NA. Pure functions of the price table and configuration.

use crate::config::{SignalDef, SignalRule, SignalSource};
use crate::data::PriceTable;
use crate::error::DataError;
use crate::indicators;
use crate::types::{SignalResult, Trend};

/// One signal evaluated over the full date range
#[derive(Debug, Clone)]
pub struct SignalSeries {
    pub name: String,
    pub rule: SignalRule,
    pub values: Vec<Option<f64>>,
    pub sma: Vec<Option<f64>>,
}

impl SignalSeries {
    /// Classification plus the numbers behind it for one date index
    pub fn result_at(&self, idx: usize) -> SignalResult {
        let value = self.values.get(idx).copied().flatten();
        let sma = self.sma.get(idx).copied().flatten();
        SignalResult {
            trend: classify(value, sma, self.rule),
            value,
            sma,
        }
    }
}

/// Build the value and SMA series for one signal definition
pub fn build_series(
    name: &str,
    def: &SignalDef,
    table: &PriceTable,
    default_window: usize,
) -> Result<SignalSeries, DataError> {
    let lookup = |ticker: &str| {
        table.series(ticker).ok_or_else(|| DataError::UnknownTicker {
            signal: name.to_string(),
            ticker: ticker.to_string(),
        })
    };

    let values: Vec<Option<f64>> = match &def.source {
        SignalSource::Rs { a, b } => {
            let num = lookup(a)?;
            let den = lookup(b)?;
            num.iter()
                .zip(den)
                .map(|(n, d)| match (n, d) {
                    (Some(n), Some(d)) if *d != 0.0 => Some(n / d),
                    _ => None,
                })
                .collect()
        }
        SignalSource::Price { ticker } => lookup(ticker)?.to_vec(),
    };

    let sma = indicators::sma(&values, def.window(default_window));

    Ok(SignalSeries {
        name: name.to_string(),
        rule: def.rule,
        values,
        sma,
    })
}

/// Classify one date's value against its moving average
///
/// NA whenever either side is undefined. Equality resolves to DOWN under
/// both rules; there is no tie label.
pub fn classify(value: Option<f64>, sma: Option<f64>, rule: SignalRule) -> Trend {
    let (value, sma) = match (value, sma) {
        (Some(v), Some(s)) => (v, s),
        _ => return Trend::Na,
    };

    let up = match rule {
        SignalRule::GtSma => value > sma,
        SignalRule::LtSma => value < sma,
    };

    if up {
        Trend::Up
    } else {
        Trend::Down
    }
}
