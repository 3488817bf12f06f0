//! Technical indicators
//!
//! The engine uses a single indicator: the trailing simple moving average a
//! signal value is compared against.

/// Trailing simple moving average over a gap-aware series
///
/// A slot is `Some` only when all `window` samples ending at and including
/// that index are present. Partial windows and windows containing a gap
/// yield `None`; an average is never produced from fewer than `window`
/// values.
pub fn sma(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(values.len());

    for i in 0..values.len() {
        if window == 0 || i + 1 < window {
            result.push(None);
            continue;
        }

        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_none()) {
            result.push(None);
        } else {
            let sum: f64 = slice.iter().flatten().sum();
            result.push(Some(sum / window as f64));
        }
    }

    result
}
