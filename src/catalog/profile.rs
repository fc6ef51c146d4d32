//! Per-region preprocessing profiles.
//!
//! Different HUD elements are rendered with different fonts and colours, so
//! each region carries its own profile. Adding a field with an unusual
//! rendering means adding a catalog entry with a different profile, never a
//! new code path.

use serde::{Deserialize, Serialize};

/// Default binarization cutoff for ordinary HUD text.
pub const DEFAULT_THRESHOLD: u8 = 200;

/// Default upscaling factor applied before recognition.
pub const DEFAULT_SCALE: f32 = 3.0;

/// How a region's pixels are prepared before they reach the recognizer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreprocessProfile {
    /// Collapse to a single intensity channel
    #[serde(default = "default_true")]
    pub grayscale: bool,
    /// Complement intensities (light-on-dark glyphs)
    #[serde(default)]
    pub invert: bool,
    /// Binarization cutoff; `None` skips binarization
    #[serde(default = "default_threshold")]
    pub threshold: Option<u8>,
    /// Isotropic upscaling factor, applied last
    #[serde(default = "default_scale")]
    pub scale: f32,
    /// Tile-based adaptive histogram equalization before thresholding
    #[serde(default)]
    pub enhance_contrast: bool,
}

fn default_true() -> bool {
    true
}

fn default_threshold() -> Option<u8> {
    Some(DEFAULT_THRESHOLD)
}

fn default_scale() -> f32 {
    DEFAULT_SCALE
}

impl Default for PreprocessProfile {
    fn default() -> Self {
        Self {
            grayscale: true,
            invert: false,
            threshold: default_threshold(),
            scale: DEFAULT_SCALE,
            enhance_contrast: false,
        }
    }
}

impl PreprocessProfile {
    /// Profile for stylized light-on-dark readouts such as the gradient.
    pub fn inverted(threshold: u8, scale: f32) -> Self {
        Self {
            invert: true,
            threshold: Some(threshold),
            scale,
            ..Self::default()
        }
    }

    /// Profile for dense multi-line regions: contrast enhancement only.
    pub fn contrast_only() -> Self {
        Self {
            threshold: None,
            scale: 1.0,
            enhance_contrast: true,
            ..Self::default()
        }
    }

    /// Grayscale conversion and nothing else.
    pub fn grayscale_only() -> Self {
        Self {
            threshold: None,
            scale: 1.0,
            ..Self::default()
        }
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// True when the output is a single intensity channel.
    pub fn is_single_channel(&self) -> bool {
        self.grayscale || self.threshold.is_some() || self.enhance_contrast
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let profile: PreprocessProfile = serde_json::from_str("{}").unwrap();
        assert_eq!(profile, PreprocessProfile::default());
    }

    #[test]
    fn test_null_threshold_disables_binarization() {
        let profile: PreprocessProfile =
            serde_json::from_str(r#"{"threshold": null, "enhance_contrast": true}"#).unwrap();
        assert_eq!(profile.threshold, None);
        assert!(profile.enhance_contrast);
    }

    #[test]
    fn test_threshold_implies_single_channel() {
        let profile = PreprocessProfile {
            grayscale: false,
            ..PreprocessProfile::default()
        };
        assert!(profile.is_single_channel());

        let colour = PreprocessProfile {
            grayscale: false,
            threshold: None,
            ..PreprocessProfile::default()
        };
        assert!(!colour.is_single_channel());
    }
}
