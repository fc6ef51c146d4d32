//! Built-in region layout for a 1920x1080 HUD.

use super::profile::PreprocessProfile;
use super::region::{ColumnBand, RecognitionHints, Region, RegionRole};
use super::RegionCatalog;

pub const RESOLUTION: &str = "1920x1080";

/// Dimmer readouts need a lower binarization cutoff
const DIM_TEXT_THRESHOLD: u8 = 150;

/// The gradient uses a decorative font that only survives inversion
const GRADIENT_THRESHOLD: u8 = 100;
const GRADIENT_SCALE: f32 = 4.0;

/// Characters HUD number readouts are drawn with, units included
pub const NUMERIC_WHITELIST: &str = "0123456789.:+-/kmhWrpmbg%";
const GRADIENT_WHITELIST: &str = "0123456789.-%";

/// Sparse text: finds every word on the leaderboard panel in no fixed order
const LEADERBOARD_PAGE_SEGMENTATION_MODE: u8 = 11;

/// Regions as (name, (x, y, width, height), role)
const SCALAR_FIELDS: &[(&str, (u32, u32, u32, u32), RegionRole)] = &[
    ("speed", (693, 44, 71, 61), RegionRole::Integer),
    ("distance", (833, 44, 84, 55), RegionRole::Decimal),
    ("altitude", (975, 45, 75, 50), RegionRole::Integer),
    ("race_time", (1070, 45, 134, 49), RegionRole::Time),
    ("power", (268, 49, 117, 61), RegionRole::Integer),
    ("cadence", (240, 135, 45, 31), RegionRole::Integer),
    ("heart_rate", (341, 129, 69, 38), RegionRole::Integer),
    ("powerup_name", (880, 360, 180, 40), RegionRole::FreeText),
];

pub fn default_regions() -> Vec<Region> {
    let mut regions: Vec<Region> = SCALAR_FIELDS
        .iter()
        .map(|&(name, rect, role)| {
            let region = Region::new(name, rect, role);
            if role == RegionRole::FreeText {
                region
            } else {
                region.with_recognition(numeric())
            }
        })
        .collect();

    regions.push(
        Region::new("gradient", (1695, 71, 50, 50), RegionRole::Decimal)
            .with_profile(PreprocessProfile::inverted(GRADIENT_THRESHOLD, GRADIENT_SCALE))
            .with_recognition(RecognitionHints::default().with_char_whitelist(GRADIENT_WHITELIST)),
    );
    regions.push(
        Region::new("distance_to_finish", (1143, 138, 50, 27), RegionRole::Decimal)
            .with_profile(PreprocessProfile::default().with_threshold(DIM_TEXT_THRESHOLD))
            .with_recognition(numeric()),
    );
    regions.push(
        Region::new("leaderboard", (1500, 200, 420, 600), RegionRole::Leaderboard)
            .with_profile(PreprocessProfile::contrast_only())
            .with_column_band(ColumnBand::new(80.0, 180.0))
            .with_recognition(
                RecognitionHints::default()
                    .with_page_segmentation_mode(LEADERBOARD_PAGE_SEGMENTATION_MODE),
            ),
    );
    regions.push(
        Region::new("rider_avatar", (860, 400, 200, 300), RegionRole::Silhouette)
            .with_profile(PreprocessProfile::grayscale_only()),
    );

    regions
}

fn numeric() -> RecognitionHints {
    RecognitionHints::default().with_char_whitelist(NUMERIC_WHITELIST)
}

/// Catalog for the built-in layout.
pub fn default_catalog() -> RegionCatalog {
    // The constant table is validated by the tests below.
    RegionCatalog::from_trusted(RESOLUTION, default_regions())
}
