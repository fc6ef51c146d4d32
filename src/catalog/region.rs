//! Screen regions and the role each one plays in a frame.

use serde::{Deserialize, Serialize};

use super::profile::PreprocessProfile;
use crate::error::CatalogError;
use crate::parse::FieldKind;

/// What the detections inside a region mean.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionRole {
    Integer,
    Decimal,
    Time,
    FreeText,
    /// Multi-entry ranked rider list
    Leaderboard,
    /// Rider avatar used for pose classification
    Silhouette,
}

impl RegionRole {
    /// Parser grammar for scalar regions, `None` for the structured ones.
    pub fn field_kind(&self) -> Option<FieldKind> {
        match self {
            Self::Integer => Some(FieldKind::Integer),
            Self::Decimal => Some(FieldKind::Decimal),
            Self::Time => Some(FieldKind::Time),
            Self::FreeText => Some(FieldKind::FreeText),
            Self::Leaderboard | Self::Silhouette => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Time => "time",
            Self::FreeText => "free_text",
            Self::Leaderboard => "leaderboard",
            Self::Silhouette => "silhouette",
        }
    }
}

/// Horizontal band inside a region, in region pixels (exclusive bounds).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnBand {
    pub min_x: f32,
    pub max_x: f32,
}

impl ColumnBand {
    pub fn new(min_x: f32, max_x: f32) -> Self {
        Self { min_x, max_x }
    }

    pub fn contains(&self, x: f32) -> bool {
        self.min_x < x && x < self.max_x
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            min_x: self.min_x * factor,
            max_x: self.max_x * factor,
        }
    }
}

/// Engine settings a region asks of the recognizer.
///
/// Unset values leave the recognizer's own defaults in place.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionHints {
    /// Tesseract `--psm`; multi-line regions need a sparse or block mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_segmentation_mode: Option<u8>,
    /// Only these characters may be recognized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_whitelist: Option<String>,
}

impl RecognitionHints {
    pub fn is_empty(&self) -> bool {
        self.page_segmentation_mode.is_none() && self.char_whitelist.is_none()
    }

    pub fn with_page_segmentation_mode(mut self, psm: u8) -> Self {
        self.page_segmentation_mode = Some(psm);
        self
    }

    pub fn with_char_whitelist(mut self, chars: &str) -> Self {
        self.char_whitelist = Some(chars.to_string());
        self
    }
}

/// A named rectangle in absolute frame pixels plus its preprocessing profile.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub role: RegionRole,
    pub profile: PreprocessProfile,
    /// Known middle (W/kg) column for leaderboard regions
    pub column_band: Option<ColumnBand>,
    pub recognition: RecognitionHints,
}

impl Region {
    pub fn new(name: &str, rect: (u32, u32, u32, u32), role: RegionRole) -> Self {
        let (x, y, width, height) = rect;
        Self {
            name: name.to_string(),
            x,
            y,
            width,
            height,
            role,
            profile: PreprocessProfile::default(),
            column_band: None,
            recognition: RecognitionHints::default(),
        }
    }

    pub fn with_profile(mut self, profile: PreprocessProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_column_band(mut self, band: ColumnBand) -> Self {
        self.column_band = Some(band);
        self
    }

    pub fn with_recognition(mut self, hints: RecognitionHints) -> Self {
        self.recognition = hints;
        self
    }

    /// Checks the invariants every catalog entry must hold.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let invalid = |reason: &str| CatalogError::InvalidRegion {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.width == 0 || self.height == 0 {
            return Err(invalid("width and height must be positive"));
        }
        if !self.profile.scale.is_finite() || self.profile.scale <= 0.0 {
            return Err(invalid("scale must be a positive finite number"));
        }
        if self.recognition.char_whitelist.as_deref() == Some("") {
            return Err(invalid("character whitelist must not be empty"));
        }
        Ok(())
    }

    /// True when the whole rectangle lies inside a frame of the given size.
    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        let right = self.x as u64 + self.width as u64;
        let bottom = self.y as u64 + self.height as u64;
        right <= frame_width as u64 && bottom <= frame_height as u64
    }

    pub fn as_tuple(&self) -> (u32, u32, u32, u32) {
        (self.x, self.y, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sized_region_rejected() {
        let region = Region::new("speed", (10, 10, 0, 20), RegionRole::Integer);
        assert!(matches!(
            region.validate(),
            Err(CatalogError::InvalidRegion { .. })
        ));
    }

    #[test]
    fn test_bad_scale_rejected() {
        let profile = PreprocessProfile {
            scale: f32::NAN,
            ..PreprocessProfile::default()
        };
        let region = Region::new("power", (0, 0, 5, 5), RegionRole::Integer).with_profile(profile);
        assert!(region.validate().is_err());
    }

    #[test]
    fn test_fits_within() {
        let region = Region::new("gradient", (1695, 71, 50, 50), RegionRole::Decimal);
        assert!(region.fits_within(1920, 1080));
        assert!(!region.fits_within(1280, 720));
        // Exactly touching the right edge is still inside
        assert!(region.fits_within(1745, 121));
    }

    #[test]
    fn test_column_band_is_exclusive() {
        let band = ColumnBand::new(80.0, 180.0);
        assert!(!band.contains(80.0));
        assert!(band.contains(80.5));
        assert!(!band.contains(180.0));
        assert_eq!(band.scaled(2.0), ColumnBand::new(160.0, 360.0));
    }

    #[test]
    fn test_empty_whitelist_rejected() {
        let region = Region::new("speed", (0, 0, 5, 5), RegionRole::Integer)
            .with_recognition(RecognitionHints::default().with_char_whitelist(""));
        assert!(region.validate().is_err());
    }

    #[test]
    fn test_hints_skip_unset_values() {
        let hints = RecognitionHints::default().with_page_segmentation_mode(11);
        assert_eq!(
            serde_json::to_string(&hints).unwrap(),
            r#"{"page_segmentation_mode":11}"#
        );
        assert!(RecognitionHints::default().is_empty());
    }

    #[test]
    fn test_role_field_kind() {
        assert_eq!(RegionRole::Time.field_kind(), Some(FieldKind::Time));
        assert_eq!(RegionRole::Leaderboard.field_kind(), None);
    }
}
