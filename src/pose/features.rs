//! Silhouette geometry: edge map, largest contour and the feature vector.

use image::{DynamicImage, GrayImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::edges::canny;
use serde::{Deserialize, Serialize};

pub const CANNY_LOW: f32 = 50.0;
pub const CANNY_HIGH: f32 = 150.0;

/// Share of the bounding height treated as the head slice
const HEAD_SLICE: f32 = 0.3;

/// Minimum contour points for a meaningful principal axis
const MIN_PCA_POINTS: usize = 6;

/// Normalized geometric description of one rider silhouette.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseFeatures {
    pub aspect_ratio: f32,
    pub torso_angle_deg: f32,
    pub head_height_ratio: f32,
    pub center_of_mass_y: f32,
    pub upper_density: f32,
    pub lower_density: f32,
    pub symmetry_score: f32,
}

impl PoseFeatures {
    /// Returned when no silhouette with positive area is found.
    pub fn empty() -> Self {
        Self {
            aspect_ratio: 0.0,
            torso_angle_deg: 0.0,
            head_height_ratio: 0.0,
            center_of_mass_y: 0.5,
            upper_density: 0.0,
            lower_density: 0.0,
            symmetry_score: 0.0,
        }
    }

    pub fn is_finite(&self) -> bool {
        [
            self.aspect_ratio,
            self.torso_angle_deg,
            self.head_height_ratio,
            self.center_of_mass_y,
            self.upper_density,
            self.lower_density,
            self.symmetry_score,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Binary edge map of the avatar region.
pub fn edge_map(img: &DynamicImage) -> GrayImage {
    canny(&img.to_luma8(), CANNY_LOW, CANNY_HIGH)
}

/// Edge detection followed by feature extraction.
pub fn extract_features(img: &DynamicImage) -> PoseFeatures {
    features_from_edges(&edge_map(img))
}

/// Features of the largest outer contour of an edge map.
pub fn features_from_edges(edges: &GrayImage) -> PoseFeatures {
    let (width, height) = edges.dimensions();
    if width == 0 || height == 0 {
        return PoseFeatures::empty();
    }

    let Some((contour, area)) = largest_outer_contour(edges) else {
        return PoseFeatures::empty();
    };
    let points: Vec<(f32, f32)> = contour
        .points
        .iter()
        .map(|p| (p.x as f32, p.y as f32))
        .collect();

    let (min_x, max_x, min_y, max_y) = bounds(&points);
    let box_w = max_x - min_x + 1.0;
    let box_h = max_y - min_y + 1.0;

    let center_y = polygon_centroid_y(&points, area)
        .unwrap_or_else(|| points.iter().map(|p| p.1).sum::<f32>() / points.len() as f32);

    let (upper_density, lower_density) = half_densities(edges);

    let features = PoseFeatures {
        aspect_ratio: box_h / box_w,
        torso_angle_deg: torso_angle(&points),
        head_height_ratio: head_height_ratio(&points, min_y, box_h),
        center_of_mass_y: (center_y / height as f32).clamp(0.0, 1.0),
        upper_density,
        lower_density,
        symmetry_score: symmetry(edges),
    };

    if features.is_finite() {
        features
    } else {
        PoseFeatures::empty()
    }
}

fn largest_outer_contour(edges: &GrayImage) -> Option<(Contour<u32>, f32)> {
    find_contours::<u32>(edges)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.points.len() >= 3)
        .map(|c| {
            let area = shoelace_area(&c);
            (c, area)
        })
        .filter(|(_, area)| *area > 0.0)
        .fold(None, |best: Option<(Contour<u32>, f32)>, candidate| match best {
            Some(b) if b.1 >= candidate.1 => Some(b),
            _ => Some(candidate),
        })
}

/// Absolute polygon area of a contour.
fn shoelace_area(contour: &Contour<u32>) -> f32 {
    let pts = &contour.points;
    let n = pts.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let a = pts[i];
            let b = pts[(i + 1) % n];
            a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64
        })
        .sum();
    (twice.abs() / 2.0) as f32
}

fn bounds(points: &[(f32, f32)]) -> (f32, f32, f32, f32) {
    points.iter().fold(
        (f32::INFINITY, f32::NEG_INFINITY, f32::INFINITY, f32::NEG_INFINITY),
        |(min_x, max_x, min_y, max_y), &(x, y)| (min_x.min(x), max_x.max(x), min_y.min(y), max_y.max(y)),
    )
}

/// Vertical centroid from first-order polygon moments.
fn polygon_centroid_y(points: &[(f32, f32)], area: f32) -> Option<f32> {
    let n = points.len();
    let mut signed_twice = 0.0f64;
    let mut moment = 0.0f64;
    for i in 0..n {
        let (x0, y0) = (points[i].0 as f64, points[i].1 as f64);
        let (x1, y1) = (points[(i + 1) % n].0 as f64, points[(i + 1) % n].1 as f64);
        let cross = x0 * y1 - x1 * y0;
        signed_twice += cross;
        moment += (y0 + y1) * cross;
    }
    if area <= 0.0 || signed_twice.abs() < f64::EPSILON {
        return None;
    }
    Some((moment / (3.0 * signed_twice)) as f32)
}

/// Angle of the principal axis from vertical, in [0, 90].
fn torso_angle(points: &[(f32, f32)]) -> f32 {
    if points.len() < MIN_PCA_POINTS {
        return 0.0;
    }
    let n = points.len() as f32;
    let mean_x = points.iter().map(|p| p.0).sum::<f32>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f32>() / n;

    let (mut cxx, mut cyy, mut cxy) = (0.0f32, 0.0f32, 0.0f32);
    for &(x, y) in points {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cxx += dx * dx;
        cyy += dy * dy;
        cxy += dx * dy;
    }

    let theta = 0.5 * (2.0 * cxy).atan2(cxx - cyy);
    (90.0 - theta.to_degrees().abs()).abs().clamp(0.0, 90.0)
}

/// 1.0 when the top slice sits right at the top of the box.
fn head_height_ratio(points: &[(f32, f32)], top: f32, box_h: f32) -> f32 {
    let limit = top + HEAD_SLICE * box_h;
    let slice: Vec<f32> = points.iter().map(|p| p.1).filter(|y| *y <= limit).collect();
    if slice.is_empty() || box_h <= 0.0 {
        return 0.0;
    }
    let mean = slice.iter().sum::<f32>() / slice.len() as f32;
    (1.0 - (mean - top) / box_h).clamp(0.0, 1.0)
}

/// Fraction of edge pixels in the top and bottom halves.
fn half_densities(edges: &GrayImage) -> (f32, f32) {
    let (width, height) = edges.dimensions();
    let mid = height / 2;
    let mut upper = 0u64;
    let mut lower = 0u64;
    for (_, y, pixel) in edges.enumerate_pixels() {
        if pixel[0] > 0 {
            if y < mid {
                upper += 1;
            } else {
                lower += 1;
            }
        }
    }
    let ratio = |count: u64, rows: u32| {
        let total = width as u64 * rows as u64;
        if total == 0 { 0.0 } else { count as f32 / total as f32 }
    };
    (ratio(upper, mid), ratio(lower, height - mid))
}

/// Left half against the mirrored right half.
fn symmetry(edges: &GrayImage) -> f32 {
    let (width, height) = edges.dimensions();
    let half = width / 2;
    if half == 0 || height == 0 {
        return 1.0;
    }
    let mut diff = 0u64;
    for y in 0..height {
        for x in 0..half {
            let left = edges.get_pixel(x, y)[0] as i32;
            let right = edges.get_pixel(width - 1 - x, y)[0] as i32;
            diff += (left - right).unsigned_abs() as u64;
        }
    }
    let max = half as u64 * height as u64 * 255;
    1.0 - diff as f32 / max as f32
}
