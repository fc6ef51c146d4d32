//! Tolerant grammars turning recognized text into typed field values.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::ocr::Detection;

/// `M:SS` or `MM:SS` anywhere in the text
static TIME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2}):(\d{2})").expect("static regex"));

/// Active power-up labels shown in the HUD.
pub const DEFAULT_VOCABULARY: &[&str] = &[
    "Featherweight",
    "Aero Boost",
    "Draft Boost",
    "Lightweight",
    "Steamroller",
    "Anvil",
    "Burrito",
];

/// Grammar used to read a scalar field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Integer,
    Decimal,
    Time,
    FreeText,
}

/// Elapsed race time as minutes and seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceTime {
    pub minutes: u32,
    pub seconds: u32,
}

impl RaceTime {
    /// `None` unless `seconds < 60`.
    pub fn new(minutes: u32, seconds: u32) -> Option<Self> {
        (seconds < 60).then_some(Self { minutes, seconds })
    }

    pub fn total_seconds(&self) -> u32 {
        self.minutes * 60 + self.seconds
    }
}

impl fmt::Display for RaceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes, self.seconds)
    }
}

/// A successfully parsed field value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Decimal(f64),
    Time(RaceTime),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Decimal(v) => Some(*v),
            Value::Time(t) => Some(t.total_seconds() as f64),
            Value::Text(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::Time(t) => write!(f, "{}", t),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Parsed value plus the text it came from. `value == None` means the field
/// was absent or unreadable this frame; `raw_text` is kept either way.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub value: Option<Value>,
    pub raw_text: String,
}

impl FieldValue {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }
}

/// Parser for scalar HUD fields.
#[derive(Clone, Debug)]
pub struct FieldParser {
    /// (canonical label, normalized label)
    vocabulary: Vec<(String, String)>,
}

impl Default for FieldParser {
    fn default() -> Self {
        Self::with_vocabulary(DEFAULT_VOCABULARY.iter().copied())
    }
}

impl FieldParser {
    pub fn with_vocabulary<S: AsRef<str>>(labels: impl IntoIterator<Item = S>) -> Self {
        let vocabulary = labels
            .into_iter()
            .map(|label| {
                let label = label.as_ref();
                (label.to_string(), normalize_letters(label))
            })
            .filter(|(_, normalized)| !normalized.is_empty())
            .collect();
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> impl Iterator<Item = &str> {
        self.vocabulary.iter().map(|(label, _)| label.as_str())
    }

    /// Parses the highest-confidence detection; ties go to the first seen.
    pub fn parse(&self, kind: FieldKind, detections: &[Detection]) -> FieldValue {
        let Some(best) = top_detection(detections) else {
            return FieldValue::absent();
        };

        let value = self.parse_text(kind, &best.text);
        if value.is_none() {
            debug!("Unparsable {:?} text: {:?}", kind, best.text);
        }
        FieldValue {
            value,
            raw_text: best.text.clone(),
        }
    }

    /// Applies one grammar to a piece of text.
    pub fn parse_text(&self, kind: FieldKind, text: &str) -> Option<Value> {
        match kind {
            FieldKind::Integer => parse_integer(text).map(Value::Integer),
            FieldKind::Decimal => parse_decimal(text).map(Value::Decimal),
            FieldKind::Time => parse_time(text).map(Value::Time),
            FieldKind::FreeText => self.match_vocabulary(text).map(Value::Text),
        }
    }

    /// First vocabulary label whose normalized form appears in the text.
    pub fn match_vocabulary(&self, text: &str) -> Option<String> {
        let normalized = normalize_letters(text);
        if normalized.is_empty() {
            return None;
        }
        self.vocabulary
            .iter()
            .find(|(_, label)| normalized.contains(label.as_str()))
            .map(|(label, _)| label.clone())
    }
}

fn top_detection(detections: &[Detection]) -> Option<&Detection> {
    let mut best: Option<&Detection> = None;
    for det in detections {
        match best {
            Some(current) if det.confidence <= current.confidence => {}
            _ => best = Some(det),
        }
    }
    best
}

/// Digits only; `"268w"` reads as 268.
pub fn parse_integer(text: &str) -> Option<i64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Digits and periods only; must form a finite number.
pub fn parse_decimal(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `MM:SS`, or a bare 3-4 digit run with the colon dropped (`"3106"`).
pub fn parse_time(text: &str) -> Option<RaceTime> {
    if let Some(caps) = TIME_PATTERN.captures(text) {
        let minutes = caps[1].parse().ok()?;
        let seconds = caps[2].parse().ok()?;
        return RaceTime::new(minutes, seconds);
    }

    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if !(3..=4).contains(&digits.len()) {
        return None;
    }
    let (minutes, seconds) = digits.split_at(digits.len() - 2);
    RaceTime::new(minutes.parse().ok()?, seconds.parse().ok()?)
}

fn normalize_letters(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_lowercase)
        .collect()
}
