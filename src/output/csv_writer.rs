//! CSV writer for telemetry records.
//!
//! Writes one row per frame in append-only mode, so records already written
//! survive a crash partway through a batch. Scalar field columns follow the
//! catalog, in name order.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::pipeline::TelemetryRecord;

/// Columns before the scalar fields
const LEADING_COLUMNS: &[&str] = &["frame", "timestamp", "source"];

/// Columns after the scalar fields
const TRAILING_COLUMNS: &[&str] = &["pose", "pose_confidence", "riders", "current_position"];

/// Header row for the given scalar fields.
pub fn csv_header(fields: &[String]) -> String {
    LEADING_COLUMNS
        .iter()
        .copied()
        .chain(fields.iter().map(String::as_str))
        .chain(TRAILING_COLUMNS.iter().copied())
        .collect::<Vec<_>>()
        .join(",")
}

/// Initializes CSV file with header if it doesn't exist or is empty.
///
/// If the file exists and has content, this does nothing (preserves existing data).
pub fn init_csv(path: &Path, fields: &[String]) -> Result<()> {
    if path.exists() {
        let file = File::open(path).context("Failed to open existing CSV")?;
        let reader = BufReader::new(file);
        if reader.lines().next().is_some() {
            return Ok(());
        }
    }

    let mut file = File::create(path).context("Failed to create CSV file")?;
    writeln!(file, "{}", csv_header(fields)).context("Failed to write CSV header")?;
    Ok(())
}

/// Formats one record as a CSV row matching [`csv_header`].
pub fn format_row(record: &TelemetryRecord, fields: &[String]) -> String {
    let mut cells: Vec<String> = vec![
        record.frame_index.to_string(),
        record.captured_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        escape(record.source.as_deref().unwrap_or("")),
    ];

    for field in fields {
        let cell = record
            .value(field)
            .map(|v| escape(&v.to_string()))
            .unwrap_or_default();
        cells.push(cell);
    }

    match &record.pose {
        Some(pose) => {
            cells.push(escape(&pose.pose.to_string()));
            cells.push(format!("{:.2}", pose.confidence));
        }
        None => {
            cells.push(String::new());
            cells.push(String::new());
        }
    }
    cells.push(record.leaderboard.len().to_string());
    cells.push(
        record
            .current_rider()
            .map(|e| e.position.to_string())
            .unwrap_or_default(),
    );

    cells.join(",")
}

/// Appends one record row to the CSV file.
pub fn append_record(path: &Path, fields: &[String], record: &TelemetryRecord) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context("Failed to open CSV for append")?;

    writeln!(file, "{}", format_row(record, fields)).context("Failed to write CSV row")?;
    Ok(())
}

fn escape(cell: &str) -> String {
    if cell.contains([',', '"', '\n']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
