//! Ordered predicate rules for leaderboard token classification.
//!
//! Name rules are evaluated top to bottom and the first rule that fires
//! decides. Column rules likewise: the first rule that claims a token
//! assigns its column.

use once_cell::sync::Lazy;
use regex::Regex;

use super::LeaderboardSettings;
use crate::ocr::Detection;

static INITIAL_DOT_SURNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]\.\s?[A-Za-z]").expect("static regex"));

static CAPITALIZED_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][a-z]").expect("static regex"));

static BARE_INITIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]\.$").expect("static regex"));
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("static regex"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject,
}

/// A named test on the text of a candidate name token.
pub struct NameRule {
    pub name: &'static str,
    pub verdict: Verdict,
    pub matches: fn(&str) -> bool,
}

pub const NAME_RULES: &[NameRule] = &[
    NameRule {
        name: "distance_unit",
        verdict: Verdict::Reject,
        matches: has_distance_unit,
    },
    NameRule {
        name: "power_unit",
        verdict: Verdict::Reject,
        matches: has_power_unit,
    },
    NameRule {
        name: "numeric_only",
        verdict: Verdict::Reject,
        matches: is_numeric_only,
    },
    NameRule {
        name: "initial_dot_surname",
        verdict: Verdict::Accept,
        matches: |text| INITIAL_DOT_SURNAME.is_match(text),
    },
    NameRule {
        name: "dotted",
        verdict: Verdict::Accept,
        matches: |text| {
            text.matches('.').count() >= 2 && text.chars().any(char::is_alphabetic)
        },
    },
    NameRule {
        name: "capitalized",
        verdict: Verdict::Accept,
        matches: |text| CAPITALIZED_WORD.is_match(text),
    },
    NameRule {
        name: "team_tag",
        verdict: Verdict::Accept,
        matches: |text| text.contains('(') || text.contains(')'),
    },
    NameRule {
        name: "bare_initial",
        verdict: Verdict::Accept,
        matches: |text| BARE_INITIAL.is_match(text),
    },
];

/// First name rule firing for `text`, if any.
pub fn first_name_rule(text: &str) -> Option<&'static NameRule> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    NAME_RULES.iter().find(|rule| (rule.matches)(text))
}

/// True when the token looks like a rider name.
pub fn is_likely_name(text: &str) -> bool {
    first_name_rule(text).is_some_and(|rule| rule.verdict == Verdict::Accept)
}

fn has_distance_unit(text: &str) -> bool {
    text.to_uppercase().contains("KM")
}

fn has_power_unit(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("w/kg") || lower.contains("wkg")
}

fn is_numeric_only(text: &str) -> bool {
    let stripped: String = text
        .chars()
        .filter(|c| !matches!(c, '.' | ',') && !c.is_whitespace())
        .collect();
    !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit())
}

/// Column a stats-row token was assigned to, with its value.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    TimeDelta(String),
    Distance(f32),
    WattsPerKg(f32),
}

/// A named test assigning a stats-row token to a column.
pub struct ColumnRule {
    pub name: &'static str,
    pub classify: fn(&Detection, &LeaderboardSettings) -> Option<Cell>,
}

pub const COLUMN_RULES: &[ColumnRule] = &[
    ColumnRule {
        name: "time_delta",
        classify: time_delta,
    },
    ColumnRule {
        name: "distance",
        classify: distance,
    },
    ColumnRule {
        name: "wkg_marked",
        classify: wkg_marked,
    },
    ColumnRule {
        name: "wkg_positional",
        classify: wkg_positional,
    },
];

/// Runs the column rules in order; the first claim wins.
pub fn classify_token(
    det: &Detection,
    settings: &LeaderboardSettings,
) -> Option<(&'static str, Cell)> {
    COLUMN_RULES
        .iter()
        .find_map(|rule| (rule.classify)(det, settings).map(|cell| (rule.name, cell)))
}

fn first_number(text: &str) -> Option<f32> {
    NUMBER
        .find(text)
        .and_then(|m| m.as_str().parse::<f32>().ok())
        .filter(|v| v.is_finite())
}

fn time_delta(det: &Detection, _: &LeaderboardSettings) -> Option<Cell> {
    let text = det.text.trim();
    let signed = text.starts_with(['+', '-', '\u{2212}']);
    (signed && text.contains(':')).then(|| Cell::TimeDelta(text.to_string()))
}

fn distance(det: &Detection, _: &LeaderboardSettings) -> Option<Cell> {
    if !has_distance_unit(&det.text) {
        return None;
    }
    first_number(&det.text).map(Cell::Distance)
}

fn wkg_marked(det: &Detection, _: &LeaderboardSettings) -> Option<Cell> {
    if !has_power_unit(&det.text) {
        return None;
    }
    first_number(&det.text).map(Cell::WattsPerKg)
}

fn wkg_positional(det: &Detection, settings: &LeaderboardSettings) -> Option<Cell> {
    if !det.text.contains('.') || !settings.wkg_column.contains(det.x()) {
        return None;
    }
    let cleaned: String = det
        .text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned
        .parse::<f32>()
        .ok()
        .filter(|v| settings.in_wkg_range(*v))
        .map(Cell::WattsPerKg)
}
