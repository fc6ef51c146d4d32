//! Leaderboard reconstruction from scattered text detections.
//!
//! Each rider occupies a name row with a stats row directly beneath it.
//! Rows are rebuilt from detection geometry alone, so the recognizer's
//! output order never matters.

pub mod reconstruct;
pub mod rules;

pub use reconstruct::reconstruct;

use serde::{Deserialize, Serialize};

use crate::catalog::ColumnBand;

/// One rider row of the on-screen leaderboard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based rank in screen order
    pub position: u32,
    pub name: String,
    pub time_delta: Option<String>,
    pub watts_per_kg: Option<f32>,
    pub distance_km: Option<f32>,
    pub is_current_rider: bool,
}

/// Tuned geometry constants for row association, in region pixels at the
/// reference height.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardSettings {
    /// Stats row starts strictly below `name_y + min_row_gap`
    #[serde(default = "default_min_row_gap")]
    pub min_row_gap: f32,
    /// and ends at `name_y + max_row_gap` inclusive
    #[serde(default = "default_max_row_gap")]
    pub max_row_gap: f32,
    /// A topmost name above this line is the event title
    #[serde(default = "default_title_cutoff_y")]
    pub title_cutoff_y: f32,
    /// Horizontal band of the unlabeled W/kg column
    #[serde(default = "default_wkg_column")]
    pub wkg_column: ColumnBand,
    /// Plausible W/kg values for an unlabeled decimal
    #[serde(default = "default_wkg_range")]
    pub wkg_range: (f32, f32),
    /// Frame height the pixel constants above were tuned for
    #[serde(default = "default_reference_height")]
    pub reference_height: f32,
}

fn default_min_row_gap() -> f32 {
    10.0
}

fn default_max_row_gap() -> f32 {
    40.0
}

fn default_title_cutoff_y() -> f32 {
    180.0
}

fn default_wkg_column() -> ColumnBand {
    ColumnBand::new(80.0, 180.0)
}

fn default_wkg_range() -> (f32, f32) {
    (0.5, 7.0)
}

fn default_reference_height() -> f32 {
    1080.0
}

impl Default for LeaderboardSettings {
    fn default() -> Self {
        Self {
            min_row_gap: default_min_row_gap(),
            max_row_gap: default_max_row_gap(),
            title_cutoff_y: default_title_cutoff_y(),
            wkg_column: default_wkg_column(),
            wkg_range: default_wkg_range(),
            reference_height: default_reference_height(),
        }
    }
}

impl LeaderboardSettings {
    /// Rescales the pixel constants for a frame of the given height.
    pub fn scaled_for_height(&self, frame_height: u32) -> Self {
        if self.reference_height <= 0.0 || frame_height == 0 {
            return *self;
        }
        let factor = frame_height as f32 / self.reference_height;
        Self {
            min_row_gap: self.min_row_gap * factor,
            max_row_gap: self.max_row_gap * factor,
            title_cutoff_y: self.title_cutoff_y * factor,
            wkg_column: self.wkg_column.scaled(factor),
            wkg_range: self.wkg_range,
            reference_height: frame_height as f32,
        }
    }

    /// Uses the region's own column band when the catalog provides one.
    pub fn with_column_band(mut self, band: Option<ColumnBand>) -> Self {
        if let Some(band) = band {
            self.wkg_column = band;
        }
        self
    }

    pub fn in_wkg_range(&self, value: f32) -> bool {
        self.wkg_range.0 <= value && value <= self.wkg_range.1
    }
}
