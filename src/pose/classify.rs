use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::calibration::PoseCalibration;
use super::features::{extract_features, PoseFeatures};

/// Default minimum match fraction for selecting a pose
pub const DEFAULT_CONFIDENCE_CUTOFF: f32 = 0.6;

/// Classified pose, serialized as the variant name or `"unknown"`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Pose {
    Variant(String),
    Unknown,
}

impl Pose {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Pose::Unknown)
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pose::Variant(name) => write!(f, "{}", name),
            Pose::Unknown => write!(f, "unknown"),
        }
    }
}

impl From<Pose> for String {
    fn from(pose: Pose) -> Self {
        pose.to_string()
    }
}

impl From<String> for Pose {
    fn from(name: String) -> Self {
        if name == "unknown" {
            Pose::Unknown
        } else {
            Pose::Variant(name)
        }
    }
}

/// Pose result with the evidence it was derived from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseClassification {
    pub pose: Pose,
    /// Match fraction of the best variant, even when below the cutoff
    pub confidence: f32,
    pub features: PoseFeatures,
}

/// Rule-based pose classifier over a calibration table.
#[derive(Clone, Debug)]
pub struct PoseClassifier {
    calibration: PoseCalibration,
    cutoff: f32,
}

impl Default for PoseClassifier {
    fn default() -> Self {
        Self::new(PoseCalibration::default(), DEFAULT_CONFIDENCE_CUTOFF)
    }
}

impl PoseClassifier {
    pub fn new(calibration: PoseCalibration, cutoff: f32) -> Self {
        Self {
            calibration,
            cutoff,
        }
    }

    pub fn calibration(&self) -> &PoseCalibration {
        &self.calibration
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    /// Extracts features from the avatar region and classifies them.
    pub fn classify_image(&self, region: &DynamicImage) -> PoseClassification {
        self.classify(extract_features(region))
    }

    /// Picks the variant with the highest match fraction; ties keep the
    /// earlier variant. Below the cutoff the pose is unknown.
    pub fn classify(&self, features: PoseFeatures) -> PoseClassification {
        let mut best: Option<(&str, f32)> = None;
        for variant in self.calibration.variants() {
            let Some(fraction) = variant.match_fraction(&features) else {
                continue;
            };
            debug!("Pose {} matches {:.2}", variant.name, fraction);
            if best.is_none_or(|(_, top)| fraction > top) {
                best = Some((&variant.name, fraction));
            }
        }

        let (pose, confidence) = match best {
            Some((name, fraction)) if fraction > self.cutoff => {
                (Pose::Variant(name.to_string()), fraction)
            }
            Some((_, fraction)) => (Pose::Unknown, fraction),
            None => (Pose::Unknown, 0.0),
        };

        PoseClassification {
            pose,
            confidence,
            features,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::calibration::{FeatureRange, PoseVariant};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn features(aspect: f32, angle: f32, head: f32, com: f32, symmetry: f32) -> PoseFeatures {
        PoseFeatures {
            aspect_ratio: aspect,
            torso_angle_deg: angle,
            head_height_ratio: head,
            center_of_mass_y: com,
            upper_density: 0.2,
            lower_density: 0.3,
            symmetry_score: symmetry,
        }
    }

    #[test]
    fn test_vector_inside_one_pose() {
        let classifier = PoseClassifier::default();
        let result = classifier.classify(features(1.0, 45.0, 0.6, 0.65, 0.9));
        assert_eq!(result.pose, Pose::Variant("normal_tuck".to_string()));
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_vector_outside_every_pose_is_unknown() {
        let classifier = PoseClassifier::default();
        let result = classifier.classify(features(5.0, 80.0, 0.1, 0.05, 0.95));
        assert_eq!(result.pose, Pose::Unknown);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_empty_features_are_unknown() {
        let result = PoseClassifier::default().classify(PoseFeatures::empty());
        assert!(result.pose.is_unknown());
    }

    #[test]
    fn test_cutoff_is_exclusive() {
        let variant = PoseVariant {
            aspect_ratio: Some(FeatureRange(0.0, 10.0)),
            torso_angle: Some(FeatureRange(0.0, 90.0)),
            head_height_ratio: Some(FeatureRange(0.0, 1.0)),
            center_of_mass_y: Some(FeatureRange(0.9, 1.0)),
            upper_density: Some(FeatureRange(0.9, 1.0)),
            ..PoseVariant::new("three_of_five")
        };
        let classifier = PoseClassifier::new(PoseCalibration::new(vec![variant]), 0.6);

        let result = classifier.classify(features(1.0, 45.0, 0.5, 0.5, 0.5));
        assert_eq!(result.confidence, 0.6);
        assert_eq!(result.pose, Pose::Unknown);
    }

    #[test]
    fn test_ties_keep_first_variant() {
        let range = Some(FeatureRange(0.0, 10.0));
        let calibration = PoseCalibration::new(vec![
            PoseVariant {
                aspect_ratio: range,
                ..PoseVariant::new("first")
            },
            PoseVariant {
                aspect_ratio: range,
                ..PoseVariant::new("second")
            },
        ]);
        let result = PoseClassifier::new(calibration, 0.6).classify(features(1.0, 0.0, 0.0, 0.0, 0.0));
        assert_eq!(result.pose, Pose::Variant("first".to_string()));
    }

    #[test]
    fn test_pose_serializes_as_name() {
        assert_eq!(serde_json::to_string(&Pose::Unknown).unwrap(), r#""unknown""#);
        let pose: Pose = serde_json::from_str(r#""normal_tuck""#).unwrap();
        assert_eq!(pose, Pose::Variant("normal_tuck".to_string()));
    }

    proptest! {
        #[test]
        fn prop_classify_is_deterministic(
            aspect in 0.0f32..4.0,
            angle in 0.0f32..90.0,
            head in 0.0f32..1.0,
            com in 0.0f32..1.0,
            symmetry in 0.0f32..1.0,
        ) {
            let classifier = PoseClassifier::default();
            let f = features(aspect, angle, head, com, symmetry);
            prop_assert_eq!(classifier.classify(f), classifier.classify(f));
        }
    }
}
