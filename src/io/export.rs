//! CSV export for batch summaries and analysis reports.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::analysis::{ContingencyRow, TapScore};
use crate::grid::Id;
use crate::sim::{LineLoadingStats, VoltageRow};

const VOLTAGE_HEADER: &[&str] = &[
    "timestamp",
    "max_u_pu_node",
    "max_u_pu",
    "min_u_pu_node",
    "min_u_pu",
];

const LINE_HEADER: &[&str] = &[
    "line",
    "energy_loss_kwh",
    "max_loading",
    "max_loading_timestamp",
    "min_loading",
    "min_loading_timestamp",
];

const TAP_HEADER: &[&str] = &["position", "ratio", "score", "converged", "failed"];

const ALTERNATIVES_HEADER: &[&str] = &["removed_line", "alternative"];

fn create(path: &Path) -> io::Result<io::BufWriter<File>> {
    File::create(path).map(io::BufWriter::new)
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Writes one row per converged timestamp with its extreme node voltages.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_voltage_rows(rows: &[VoltageRow], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(VOLTAGE_HEADER)?;
    for r in rows {
        wtr.write_record(&[
            r.timestamp.to_string(),
            r.max_u_pu_node.to_string(),
            format!("{:.6}", r.max_u_pu),
            r.min_u_pu_node.to_string(),
            format!("{:.6}", r.min_u_pu),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes per-line loading extremes and energy loss.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_line_stats(stats: &[LineLoadingStats], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(LINE_HEADER)?;
    for s in stats {
        wtr.write_record(&[
            s.line.to_string(),
            format!("{:.6}", s.energy_loss_kwh),
            format!("{:.6}", s.max_loading),
            s.max_loading_timestamp.to_string(),
            format!("{:.6}", s.min_loading),
            s.min_loading_timestamp.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes contingency rows; the header comes from the row's field names.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_contingency_rows(rows: &[ContingencyRow], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes one row per tap position; unscorable positions have an empty score.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_tap_scores(scores: &[TapScore], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(TAP_HEADER)?;
    for s in scores {
        wtr.write_record(&[
            s.position.to_string(),
            s.ratio.to_string(),
            opt(s.score.map(|v| format!("{v:.6}"))),
            s.converged.to_string(),
            s.failed.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes `(removed_line, alternative)` pairs. A line without alternatives
/// gets one row with an empty alternative so it is still listed.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_alternatives(pairs: &[(Id, Vec<Id>)], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(ALTERNATIVES_HEADER)?;
    for (removed, alternatives) in pairs {
        if alternatives.is_empty() {
            wtr.write_record(&[removed.to_string(), String::new()])?;
        }
        for alt in alternatives {
            wtr.write_record(&[removed.to_string(), alt.to_string()])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Exports contingency alternatives to a CSV file at `path`.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_alternatives(pairs: &[(Id, Vec<Id>)], path: &Path) -> io::Result<()> {
    write_alternatives(pairs, create(path)?)
}
