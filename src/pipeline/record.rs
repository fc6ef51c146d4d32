use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ExtractError;
use crate::leaderboard::LeaderboardEntry;
use crate::parse::{FieldValue, Value};
use crate::pose::PoseClassification;

/// A field that could not be extracted this frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl From<&ExtractError> for FieldError {
    fn from(err: &ExtractError) -> Self {
        let message = match std::error::Error::source(err) {
            Some(source) => format!("{}: {}", err, source),
            None => err.to_string(),
        };
        Self {
            field: err.field().to_string(),
            message,
        }
    }
}

/// Everything extracted from one frame.
///
/// A record with some fields missing is still complete: absent values are
/// `None` and per-field failures are listed in `errors`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub frame_index: u32,
    pub captured_at: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub pose: Option<PoseClassification>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl TelemetryRecord {
    pub fn new(frame_index: u32, captured_at: DateTime<Local>) -> Self {
        Self {
            frame_index,
            captured_at,
            source: None,
            fields: BTreeMap::new(),
            leaderboard: Vec::new(),
            pose: None,
            errors: Vec::new(),
        }
    }

    /// Parsed value of a scalar field, if it was read this frame.
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).and_then(|f| f.value.as_ref())
    }

    /// The viewer's own leaderboard entry.
    pub fn current_rider(&self) -> Option<&LeaderboardEntry> {
        self.leaderboard.iter().find(|e| e.is_current_rider)
    }

    pub fn record_error(&mut self, err: &ExtractError) {
        self.errors.push(FieldError::from(err));
    }
}
