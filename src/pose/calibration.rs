//! Per-pose feature ranges.
//!
//! Calibration is data: an ordered list of variants, each with optional
//! inclusive `[min, max]` ranges. Order matters, since earlier variants win
//! ties during classification.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use super::features::PoseFeatures;

/// Inclusive `[min, max]` range, serialized as a two-element array.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureRange(pub f32, pub f32);

impl FeatureRange {
    pub fn contains(&self, value: f32) -> bool {
        self.0 <= value && value <= self.1
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseVariant {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<FeatureRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub torso_angle: Option<FeatureRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_height_ratio: Option<FeatureRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center_of_mass_y: Option<FeatureRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_density: Option<FeatureRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_density: Option<FeatureRange>,
    /// Satisfied when the symmetry score is below it; counts half
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symmetry_threshold: Option<f32>,
}

impl PoseVariant {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            aspect_ratio: None,
            torso_angle: None,
            head_height_ratio: None,
            center_of_mass_y: None,
            upper_density: None,
            lower_density: None,
            symmetry_threshold: None,
        }
    }

    /// Weighted fraction of this variant's checks the features satisfy.
    /// `None` when the variant defines no checks at all.
    pub fn match_fraction(&self, features: &PoseFeatures) -> Option<f32> {
        let checks = [
            (self.aspect_ratio, features.aspect_ratio),
            (self.torso_angle, features.torso_angle_deg),
            (self.head_height_ratio, features.head_height_ratio),
            (self.center_of_mass_y, features.center_of_mass_y),
            (self.upper_density, features.upper_density),
            (self.lower_density, features.lower_density),
        ];

        let mut total = 0.0f32;
        let mut satisfied = 0.0f32;
        for (range, value) in checks {
            if let Some(range) = range {
                total += 1.0;
                if range.contains(value) {
                    satisfied += 1.0;
                }
            }
        }
        if let Some(threshold) = self.symmetry_threshold {
            total += 0.5;
            if features.symmetry_score < threshold {
                satisfied += 0.5;
            }
        }

        (total > 0.0).then(|| satisfied / total)
    }
}

/// Ordered pose variants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoseCalibration {
    variants: Vec<PoseVariant>,
}

impl Default for PoseCalibration {
    fn default() -> Self {
        let range = |lo, hi| Some(FeatureRange(lo, hi));
        Self {
            variants: vec![
                PoseVariant {
                    aspect_ratio: range(0.8, 1.3),
                    torso_angle: range(30.0, 60.0),
                    head_height_ratio: range(0.5, 0.7),
                    center_of_mass_y: range(0.55, 0.7),
                    ..PoseVariant::new("normal_tuck")
                },
                PoseVariant {
                    aspect_ratio: range(1.3, 1.7),
                    torso_angle: range(-15.0, 15.0),
                    head_height_ratio: range(0.7, 0.85),
                    center_of_mass_y: range(0.45, 0.55),
                    ..PoseVariant::new("normal_normal")
                },
                PoseVariant {
                    aspect_ratio: range(1.7, 2.5),
                    torso_angle: range(-5.0, 25.0),
                    head_height_ratio: range(0.8, 0.95),
                    center_of_mass_y: range(0.3, 0.45),
                    symmetry_threshold: Some(0.7),
                    ..PoseVariant::new("climbing_standing")
                },
                PoseVariant {
                    aspect_ratio: range(1.4, 1.8),
                    torso_angle: range(5.0, 30.0),
                    head_height_ratio: range(0.65, 0.8),
                    center_of_mass_y: range(0.45, 0.6),
                    ..PoseVariant::new("climbing_seated")
                },
            ],
        }
    }
}

impl PoseCalibration {
    pub fn new(variants: Vec<PoseVariant>) -> Self {
        Self { variants }
    }

    pub fn variants(&self) -> &[PoseVariant] {
        &self.variants
    }

    pub fn get(&self, name: &str) -> Option<&PoseVariant> {
        self.variants.iter().find(|v| v.name == name)
    }

    /// Same-name variants are replaced in place, new ones appended.
    pub fn merge(&mut self, other: PoseCalibration) {
        for variant in other.variants {
            match self.variants.iter_mut().find(|v| v.name == variant.name) {
                Some(existing) => *existing = variant,
                None => self.variants.push(variant),
            }
        }
    }
}

/// Loads a calibration file and merges it over the default table.
pub fn load_calibration(path: &Path) -> Result<PoseCalibration> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read calibration file: {}", path.display()))?;
    let custom: PoseCalibration = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse calibration file: {}", path.display()))?;

    info!(
        "Loaded {} pose variants from {}",
        custom.variants.len(),
        path.display()
    );

    let mut calibration = PoseCalibration::default();
    calibration.merge(custom);
    Ok(calibration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn features(aspect: f32, angle: f32, head: f32, com: f32, symmetry: f32) -> PoseFeatures {
        PoseFeatures {
            aspect_ratio: aspect,
            torso_angle_deg: angle,
            head_height_ratio: head,
            center_of_mass_y: com,
            upper_density: 0.1,
            lower_density: 0.1,
            symmetry_score: symmetry,
        }
    }

    #[test]
    fn test_default_order() {
        let calibration = PoseCalibration::default();
        let names: Vec<&str> = calibration
            .variants()
            .iter()
            .map(|v| v.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["normal_tuck", "normal_normal", "climbing_standing", "climbing_seated"]
        );
    }

    #[test]
    fn test_symmetry_counts_half() {
        let calibration = PoseCalibration::default();
        let standing = calibration.get("climbing_standing").unwrap();
        // All four ranges satisfied, symmetry too high
        let f = features(2.0, 10.0, 0.9, 0.4, 0.9);
        assert_eq!(standing.match_fraction(&f), Some(4.0 / 4.5));
        let f = features(2.0, 10.0, 0.9, 0.4, 0.5);
        assert_eq!(standing.match_fraction(&f), Some(1.0));
    }

    #[test]
    fn test_variant_without_checks() {
        let empty = PoseVariant::new("nothing");
        assert_eq!(empty.match_fraction(&PoseFeatures::empty()), None);
    }

    #[test]
    fn test_merge_replaces_and_appends() {
        let mut calibration = PoseCalibration::default();
        calibration.merge(PoseCalibration::new(vec![
            PoseVariant {
                aspect_ratio: Some(FeatureRange(0.9, 1.1)),
                ..PoseVariant::new("normal_tuck")
            },
            PoseVariant {
                aspect_ratio: Some(FeatureRange(3.0, 4.0)),
                ..PoseVariant::new("supertuck")
            },
        ]));

        let names: Vec<&str> = calibration.variants().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names[0], "normal_tuck");
        assert_eq!(names.last(), Some(&"supertuck"));
        assert_eq!(calibration.variants().len(), 5);
        let tuck = calibration.get("normal_tuck").unwrap();
        assert_eq!(tuck.aspect_ratio, Some(FeatureRange(0.9, 1.1)));
        assert_eq!(tuck.torso_angle, None);
    }

    #[test]
    fn test_load_calibration_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pose_calibration.json");
        fs::write(
            &path,
            r#"[{"name": "sprint", "aspect_ratio": [1.0, 1.5], "symmetry_threshold": 0.5}]"#,
        )
        .unwrap();

        let calibration = load_calibration(&path).unwrap();
        let sprint = calibration.get("sprint").unwrap();
        assert_eq!(sprint.aspect_ratio, Some(FeatureRange(1.0, 1.5)));
        assert_eq!(sprint.symmetry_threshold, Some(0.5));
        assert!(calibration.get("normal_tuck").is_some());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(load_calibration(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn test_serializes_as_ordered_list() {
        let json = serde_json::to_value(PoseCalibration::default()).unwrap();
        assert_eq!(json[0]["name"], "normal_tuck");
        assert_eq!(json[0]["aspect_ratio"], serde_json::json!([0.8f32, 1.3f32]));
    }
}
