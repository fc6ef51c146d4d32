//! Rider pose classification from avatar silhouette geometry.

pub mod calibration;
pub mod classify;
pub mod features;

pub use calibration::{load_calibration, FeatureRange, PoseCalibration, PoseVariant};
pub use classify::{Pose, PoseClassification, PoseClassifier, DEFAULT_CONFIDENCE_CUTOFF};
pub use features::{extract_features, PoseFeatures};
