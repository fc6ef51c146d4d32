//! JSON export for telemetry records.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::pipeline::TelemetryRecord;

/// Export records to a JSON file as one pretty-printed array.
pub fn export_to_json(records: &[TelemetryRecord], output_path: &Path) -> Result<()> {
    let json =
        serde_json::to_string_pretty(records).context("Failed to serialize records to JSON")?;

    let mut file = File::create(output_path)
        .context(format!("Failed to create JSON file: {}", output_path.display()))?;

    file.write_all(json.as_bytes())
        .context("Failed to write JSON data")?;

    Ok(())
}

/// Appends one record as a single JSON line.
pub fn append_jsonl(path: &Path, record: &TelemetryRecord) -> Result<()> {
    let line = serde_json::to_string(record).context("Failed to serialize record")?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context(format!("Failed to open {} for append", path.display()))?;

    writeln!(file, "{}", line).context("Failed to write JSON line")?;
    Ok(())
}

/// Reads records back from a JSON-lines file, skipping blank lines.
pub fn read_jsonl(path: &Path) -> Result<Vec<TelemetryRecord>> {
    let file = File::open(path).context(format!("Failed to open {}", path.display()))?;
    let mut records = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .with_context(|| format!("Invalid record on line {}", number + 1))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{FieldValue, Value};
    use chrono::Local;
    use tempfile::tempdir;

    fn record(index: u32) -> TelemetryRecord {
        let mut record = TelemetryRecord::new(index, Local::now());
        record.fields.insert(
            "speed".to_string(),
            FieldValue {
                value: Some(Value::Integer(38)),
                raw_text: "38".to_string(),
            },
        );
        record
    }

    #[test]
    fn test_export_to_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("telemetry.json");

        export_to_json(&[record(1), record(2)], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"frame_index\": 2"));
        assert!(content.contains("\"raw_text\": \"38\""));
    }

    #[test]
    fn test_jsonl_append_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("telemetry.jsonl");

        append_jsonl(&path, &record(1)).unwrap();
        append_jsonl(&path, &record(2)).unwrap();

        let records = read_jsonl(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].frame_index, 2);
        assert_eq!(records[0].value("speed"), Some(&Value::Integer(38)));
    }
}
