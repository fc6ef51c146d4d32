pub mod engine;
pub mod preprocess;
pub mod setup;

pub use engine::TesseractRecognizer;
pub use preprocess::{apply, crop_region};
pub use setup::{ensure_tessdata, TesseractPaths};

use anyhow::Result;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::catalog::RecognitionHints;

/// A point in region pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Bounding quadrilateral of a detection: top-left, top-right,
/// bottom-right, bottom-left.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quad(pub [Point; 4]);

impl Quad {
    /// Axis-aligned quad from a rectangle.
    pub fn from_rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        Quad([
            Point::new(x, y),
            Point::new(x + width, y),
            Point::new(x + width, y + height),
            Point::new(x, y + height),
        ])
    }

    pub fn min_x(&self) -> f32 {
        self.0.iter().map(|p| p.x).fold(f32::INFINITY, f32::min)
    }

    pub fn min_y(&self) -> f32 {
        self.0.iter().map(|p| p.y).fold(f32::INFINITY, f32::min)
    }

    pub fn max_y(&self) -> f32 {
        self.0.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max)
    }

    /// Vertical centre of the quad.
    pub fn center_y(&self) -> f32 {
        (self.min_y() + self.max_y()) / 2.0
    }

    /// Divides every coordinate by `factor`; maps detections made on an
    /// upscaled image back to region pixels.
    pub fn unscaled(&self, factor: f32) -> Self {
        if factor <= 0.0 || factor == 1.0 {
            return *self;
        }
        Quad(self.0.map(|p| Point::new(p.x / factor, p.y / factor)))
    }
}

/// One recognized text fragment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub text: String,
    pub quad: Quad,
    /// Recognizer confidence in [0, 1]
    pub confidence: f32,
}

impl Detection {
    pub fn new(text: &str, quad: Quad, confidence: f32) -> Self {
        Self {
            text: text.to_string(),
            quad,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Axis-aligned detection from a rectangle.
    pub fn from_rect(text: &str, x: f32, y: f32, width: f32, height: f32, confidence: f32) -> Self {
        Self::new(text, Quad::from_rect(x, y, width, height), confidence)
    }

    /// Left edge, used for column placement.
    pub fn x(&self) -> f32 {
        self.quad.min_x()
    }

    /// Vertical centre, used for row placement.
    pub fn y(&self) -> f32 {
        self.quad.center_y()
    }

    pub fn unscaled(mut self, factor: f32) -> Self {
        self.quad = self.quad.unscaled(factor);
        self
    }
}

/// External text recognition engine.
///
/// Passed explicitly into every extraction call. Implementations must be
/// deterministic for identical pixels; the order of returned detections is
/// not significant.
pub trait Recognizer: Send + Sync {
    fn name(&self) -> &str;
    /// `hints` carries the region's engine settings; engines ignore what
    /// they cannot honour.
    fn recognize(&self, image: &DynamicImage, hints: &RecognitionHints) -> Result<Vec<Detection>>;
}

/// Recognizer returning canned detections keyed by image size, or a
/// fallback list. Used to drive the pipeline without an OCR engine.
#[derive(Default)]
pub struct CannedRecognizer {
    by_size: HashMap<(u32, u32), Vec<Detection>>,
    fallback: Vec<Detection>,
    calls: AtomicUsize,
}

impl CannedRecognizer {
    pub fn new(fallback: Vec<Detection>) -> Self {
        Self {
            fallback,
            ..Self::default()
        }
    }

    /// Returns `detections` for any image of exactly `width` x `height`.
    pub fn with_response(mut self, width: u32, height: u32, detections: Vec<Detection>) -> Self {
        self.by_size.insert((width, height), detections);
        self
    }

    /// Number of `recognize` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Recognizer for CannedRecognizer {
    fn name(&self) -> &str {
        "canned"
    }

    fn recognize(&self, image: &DynamicImage, _hints: &RecognitionHints) -> Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let size = (image.width(), image.height());
        Ok(self
            .by_size
            .get(&size)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}
