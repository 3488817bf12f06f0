//! Output writing
//!
//! NDJSON record streams, snapshot state.json and the daily signal
//! changelog. Fatal failures must never leave a partial output file, so the
//! NDJSON writer goes through a temp file renamed into place.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use crate::types::{Record, Trend};

/// Serialize records as newline-delimited JSON, date-ascending
pub fn write_ndjson<W: Write>(mut writer: W, records: &[Record]) -> Result<()> {
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// Write NDJSON via temp file + rename so a failed run leaves the previous
/// output intact
pub fn write_ndjson_atomic(path: impl AsRef<Path>, records: &[Record]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let tmp_path = path.with_extension("ndjson.tmp");
    {
        let file = File::create(&tmp_path)
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        let mut writer = BufWriter::new(file);
        write_ndjson(&mut writer, records)?;
        writer.flush()?;
    }
    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to move output into place at {}", path.display()))?;

    info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

/// Write the most recent record as pretty JSON (the daily snapshot)
pub fn write_state_json(path: impl AsRef<Path>, record: &Record) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(record)?;
    fs::write(path, json + "\n")
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("State written to {}", path.display());
    Ok(())
}

/// Previous snapshot, if one exists and parses
pub fn read_previous_state(path: impl AsRef<Path>) -> Option<Value> {
    let contents = fs::read_to_string(path.as_ref()).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Human-readable summary of signal transitions since the previous snapshot
pub fn signal_changes(prev: Option<&Value>, curr: &BTreeMap<String, Trend>) -> String {
    let Some(prev_signals) = prev.and_then(|p| p.get("signals")).and_then(|s| s.as_object())
    else {
        return "Previous snapshot unavailable.".to_string();
    };

    let mut changes = Vec::new();
    for (name, trend) in curr {
        let current = trend.to_string();
        match prev_signals.get(name).and_then(|v| v.as_str()) {
            None => changes.push(format!("{}: NEW ({})", name, current)),
            Some(previous) if previous != current => {
                changes.push(format!("{}: {} -> {}", name, previous, current));
            }
            Some(_) => {}
        }
    }

    if changes.is_empty() {
        "No signal changes.".to_string()
    } else {
        changes.join("; ")
    }
}

/// Write the Markdown changelog for the latest record
pub fn write_changelog(
    path: impl AsRef<Path>,
    record: &Record,
    prev: Option<&Value>,
) -> Result<()> {
    let path = path.as_ref();
    let lines = [
        "# Market State Engine Daily Changelog".to_string(),
        format!("**Date:** {}", record.date.format("%Y-%m-%d")),
        format!("**Version:** {}", record.version),
        String::new(),
        "## Signal Changes".to_string(),
        signal_changes(prev, &record.signals),
        String::new(),
        "---".to_string(),
        format!("*Generated at {}*", chrono::Local::now().to_rfc3339()),
    ];

    fs::write(path, lines.join("\n") + "\n")
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Changelog written to {}", path.display());
    Ok(())
}
