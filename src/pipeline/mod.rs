//! Per-frame extraction: catalog regions in, one telemetry record out.
//!
//! Every region is independent, so scalar fields run on the rayon pool
//! alongside the leaderboard and the pose. A failing region is recorded in
//! the record and never stops the others.

pub mod record;

pub use record::{FieldError, TelemetryRecord};

use chrono::{DateTime, Local};
use image::DynamicImage;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::{Region, RegionCatalog, RegionRole};
use crate::error::ExtractError;
use crate::leaderboard::{self, LeaderboardEntry, LeaderboardSettings};
use crate::ocr::{self, Detection, Recognizer};
use crate::parse::{FieldParser, FieldValue};
use crate::pose::{PoseClassification, PoseClassifier};

/// Extracts telemetry from frames using an injected recognizer.
#[derive(Clone)]
pub struct FrameExtractor {
    catalog: Arc<RegionCatalog>,
    recognizer: Arc<dyn Recognizer>,
    parser: FieldParser,
    leaderboard: LeaderboardSettings,
    classifier: PoseClassifier,
}

impl FrameExtractor {
    pub fn new(catalog: Arc<RegionCatalog>, recognizer: Arc<dyn Recognizer>) -> Self {
        Self {
            catalog,
            recognizer,
            parser: FieldParser::default(),
            leaderboard: LeaderboardSettings::default(),
            classifier: PoseClassifier::default(),
        }
    }

    pub fn with_parser(mut self, parser: FieldParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_leaderboard_settings(mut self, settings: LeaderboardSettings) -> Self {
        self.leaderboard = settings;
        self
    }

    pub fn with_classifier(mut self, classifier: PoseClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn catalog(&self) -> &RegionCatalog {
        &self.catalog
    }

    /// Crops, preprocesses and recognizes one region. Detection coordinates
    /// are mapped back to region pixels.
    pub fn recognize_region(
        &self,
        frame: &DynamicImage,
        region: &Region,
    ) -> Result<Vec<Detection>, ExtractError> {
        let cropped = ocr::crop_region(frame, region)?;
        let processed = ocr::apply(&region.profile, &cropped);
        let detections = self
            .recognizer
            .recognize(&processed, &region.recognition)
            .map_err(|e| ExtractError::recognition(&region.name, e))?;

        Ok(detections
            .into_iter()
            .map(|d| d.unscaled(region.profile.scale))
            .collect())
    }

    /// Reads one scalar field by name.
    pub fn extract_field(&self, frame: &DynamicImage, field: &str) -> Result<FieldValue, ExtractError> {
        let region = self.catalog.resolve(field)?;
        self.extract_scalar(frame, region)
    }

    fn extract_scalar(&self, frame: &DynamicImage, region: &Region) -> Result<FieldValue, ExtractError> {
        let kind = region.role.field_kind().ok_or_else(|| ExtractError::WrongRole {
            field: region.name.clone(),
            role: region.role.as_str().to_string(),
        })?;
        let detections = self.recognize_region(frame, region)?;
        let value = self.parser.parse(kind, &detections);
        debug!("{} = {:?} (raw {:?})", region.name, value.value, value.raw_text);
        Ok(value)
    }

    /// Rebuilds the leaderboard held by `region`.
    pub fn extract_leaderboard(
        &self,
        frame: &DynamicImage,
        region: &Region,
    ) -> Result<Vec<LeaderboardEntry>, ExtractError> {
        if region.role != RegionRole::Leaderboard {
            return Err(ExtractError::WrongRole {
                field: region.name.clone(),
                role: region.role.as_str().to_string(),
            });
        }
        let detections = self.recognize_region(frame, region)?;
        let settings = self
            .leaderboard
            .scaled_for_height(frame.height())
            .with_column_band(region.column_band);
        let entries = leaderboard::reconstruct(&detections, &settings);
        debug!(
            "Leaderboard: {} entries from {} detections",
            entries.len(),
            detections.len()
        );
        Ok(entries)
    }

    /// Classifies the rider pose from the silhouette `region`.
    pub fn classify_pose(
        &self,
        frame: &DynamicImage,
        region: &Region,
    ) -> Result<PoseClassification, ExtractError> {
        if region.role != RegionRole::Silhouette {
            return Err(ExtractError::WrongRole {
                field: region.name.clone(),
                role: region.role.as_str().to_string(),
            });
        }
        let cropped = ocr::crop_region(frame, region)?;
        let processed = ocr::apply(&region.profile, &cropped);
        let result = self.classifier.classify_image(&processed);
        debug!("Pose: {} ({:.2})", result.pose, result.confidence);
        Ok(result)
    }

    /// Extracts every catalog region of one frame.
    pub fn extract(
        &self,
        frame: &DynamicImage,
        frame_index: u32,
        captured_at: DateTime<Local>,
    ) -> TelemetryRecord {
        let scalar: Vec<&Region> = self.catalog.scalar_regions().collect();
        let board_region = self.catalog.find_role(RegionRole::Leaderboard);
        let pose_region = self.catalog.find_role(RegionRole::Silhouette);

        let (fields, (board, pose)) = rayon::join(
            || {
                scalar
                    .par_iter()
                    .map(|region| (region.name.clone(), self.extract_scalar(frame, region)))
                    .collect::<Vec<_>>()
            },
            || {
                rayon::join(
                    || board_region.map(|r| self.extract_leaderboard(frame, r)),
                    || pose_region.map(|r| self.classify_pose(frame, r)),
                )
            },
        );

        let mut record = TelemetryRecord::new(frame_index, captured_at);

        for (name, result) in fields {
            match result {
                Ok(value) => {
                    record.fields.insert(name, value);
                }
                Err(e) => {
                    warn!("Frame {}: {}", frame_index, e);
                    record.record_error(&e);
                    record.fields.insert(name, FieldValue::absent());
                }
            }
        }

        match board {
            Some(Ok(entries)) => record.leaderboard = entries,
            Some(Err(e)) => {
                warn!("Frame {}: {}", frame_index, e);
                record.record_error(&e);
            }
            None => {}
        }

        match pose {
            Some(Ok(classification)) => record.pose = Some(classification),
            Some(Err(e)) => {
                warn!("Frame {}: {}", frame_index, e);
                record.record_error(&e);
            }
            None => {}
        }

        record
    }
}
