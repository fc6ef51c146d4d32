//! Telemetry extraction from cycling-simulator HUD frames.
//!
//! A [`RegionCatalog`] says where each readout lives, the preprocessor and an
//! injected [`Recognizer`] turn pixels into text detections, and the parsers
//! turn detections into scalar values, a reconstructed leaderboard and a
//! rider pose. [`FrameExtractor`] ties the pieces together per frame.

pub mod catalog;
pub mod config;
pub mod error;
pub mod leaderboard;
pub mod ocr;
pub mod output;
pub mod parse;
pub mod paths;
pub mod pipeline;
pub mod pose;
pub mod worker;

pub use catalog::{default_catalog, PreprocessProfile, Region, RegionCatalog, RegionRole};
pub use config::{load_config, AppConfig};
pub use error::{CatalogError, ExtractError};
pub use leaderboard::{LeaderboardEntry, LeaderboardSettings};
pub use ocr::{CannedRecognizer, Detection, Quad, Recognizer, TesseractRecognizer};
pub use parse::{FieldKind, FieldParser, FieldValue, RaceTime, Value};
pub use pipeline::{FieldError, FrameExtractor, TelemetryRecord};
pub use pose::{Pose, PoseCalibration, PoseClassification, PoseClassifier, PoseFeatures};
pub use worker::{FrameJob, FramePool};
