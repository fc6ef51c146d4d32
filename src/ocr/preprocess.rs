use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::{threshold, ThresholdType};

use crate::catalog::{PreprocessProfile, Region};
use crate::error::ExtractError;

/// Tile grid used by contrast enhancement (tiles per axis)
const CONTRAST_TILE_GRID: u32 = 8;

/// Histogram clip limit, as a multiple of the mean bin height
const CONTRAST_CLIP_LIMIT: f32 = 2.0;

/// Cuts a region out of a frame.
///
/// Unlike a clamped crop, a rectangle that does not lie entirely inside the
/// frame is rejected: the catalog was made for a different resolution and
/// reading a partial region would produce plausible-looking garbage.
pub fn crop_region(frame: &DynamicImage, region: &Region) -> Result<DynamicImage, ExtractError> {
    let (w, h) = (frame.width(), frame.height());
    if !region.fits_within(w, h) {
        return Err(ExtractError::invalid_image(
            &region.name,
            format!(
                "rectangle ({}, {}, {}x{}) exceeds {}x{} frame",
                region.x, region.y, region.width, region.height, w, h
            ),
        ));
    }
    Ok(frame.crop_imm(region.x, region.y, region.width, region.height))
}

/// Prepares a cropped region for recognition.
///
/// Steps run in a fixed order: grayscale, invert, contrast enhancement,
/// threshold, upscale. Thresholding and contrast enhancement work on a
/// single intensity channel, so they imply grayscale.
pub fn apply(profile: &PreprocessProfile, img: &DynamicImage) -> DynamicImage {
    let processed = if profile.is_single_channel() {
        let mut gray = img.to_luma8();
        if profile.invert {
            image::imageops::invert(&mut gray);
        }
        if profile.enhance_contrast {
            gray = equalize_tiles(&gray, CONTRAST_TILE_GRID, CONTRAST_CLIP_LIMIT);
        }
        if let Some(cutoff) = profile.threshold {
            // Above the cutoff becomes white, the rest black
            gray = threshold(&gray, cutoff, ThresholdType::Binary);
        }
        DynamicImage::ImageLuma8(gray)
    } else {
        let mut colour = img.clone();
        if profile.invert {
            colour.invert();
        }
        colour
    };

    upscale(processed, profile.scale)
}

/// Isotropic cubic upscaling. Small glyphs recognize poorly, so HUD text is
/// usually enlarged 2x-4x.
pub fn upscale(img: DynamicImage, scale: f32) -> DynamicImage {
    if !scale.is_finite() || scale <= 0.0 || (scale - 1.0).abs() < f32::EPSILON {
        return img;
    }
    let width = ((img.width() as f32 * scale).round() as u32).max(1);
    let height = ((img.height() as f32 * scale).round() as u32).max(1);
    img.resize_exact(width, height, FilterType::CatmullRom)
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into at most `grid` x `grid` tiles. Each tile gets its
/// own clipped-histogram lookup table and every pixel blends the tables of
/// the four nearest tile centres bilinearly.
pub fn equalize_tiles(img: &GrayImage, grid: u32, clip_limit: f32) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }

    let tile_w = width.div_ceil(grid.clamp(1, width));
    let tile_h = height.div_ceil(grid.clamp(1, height));
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts.push(tile_lut(img, (x0, y0, x1, y1), clip_limit));
        }
    }

    let lut_at = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];

    let mut output = GrayImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels() {
        let fx = ((x as f32 + 0.5) / tile_w as f32 - 0.5).clamp(0.0, (tiles_x - 1) as f32);
        let fy = ((y as f32 + 0.5) / tile_h as f32 - 0.5).clamp(0.0, (tiles_y - 1) as f32);
        let tx0 = fx.floor() as u32;
        let ty0 = fy.floor() as u32;
        let tx1 = (tx0 + 1).min(tiles_x - 1);
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let ax = fx - tx0 as f32;
        let ay = fy - ty0 as f32;

        let v = pixel[0] as usize;
        let top = lut_at(tx0, ty0)[v] * (1.0 - ax) + lut_at(tx1, ty0)[v] * ax;
        let bottom = lut_at(tx0, ty1)[v] * (1.0 - ax) + lut_at(tx1, ty1)[v] * ax;
        let value = top * (1.0 - ay) + bottom * ay;

        output.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
    }

    output
}

/// Clipped-histogram equalization table for one tile.
fn tile_lut(img: &GrayImage, bounds: (u32, u32, u32, u32), clip_limit: f32) -> [f32; 256] {
    let (x0, y0, x1, y1) = bounds;
    let mut hist = [0f32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[img.get_pixel(x, y)[0] as usize] += 1.0;
        }
    }

    let pixels = ((x1 - x0) * (y1 - y0)) as f32;
    let limit = (clip_limit * pixels / 256.0).max(1.0);

    let mut excess = 0.0;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }
    let share = excess / 256.0;

    let mut lut = [0f32; 256];
    let mut cdf = 0.0;
    for (value, bin) in hist.iter().enumerate() {
        cdf += bin + share;
        lut[value] = (cdf * 255.0 / pixels).min(255.0);
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RegionRole;
    use image::{ImageBuffer, Rgba};

    fn gradient_frame(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([x as u8, y as u8, 0, 255])
        }))
    }

    #[test]
    fn test_crop_region() {
        let frame = gradient_frame(100, 200);
        let region = Region::new("speed", (10, 50, 50, 20), RegionRole::Integer);
        let cropped = crop_region(&frame, &region).unwrap();

        assert_eq!((cropped.width(), cropped.height()), (50, 20));
        // Top-left pixel should be (10, 50) from original
        let px = cropped.to_rgba8().get_pixel(0, 0).0;
        assert_eq!((px[0], px[1]), (10, 50));
    }

    #[test]
    fn test_crop_region_out_of_bounds() {
        let frame = gradient_frame(100, 100);
        let region = Region::new("gradient", (90, 90, 50, 50), RegionRole::Decimal);
        let err = crop_region(&frame, &region).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidImage { ref field, .. } if field == "gradient"));
    }

    #[test]
    fn test_threshold_profile_binarizes() {
        let mut img = GrayImage::new(3, 1);
        img.put_pixel(0, 0, Luma([100]));
        img.put_pixel(1, 0, Luma([250]));
        img.put_pixel(2, 0, Luma([200]));
        let profile = PreprocessProfile {
            scale: 1.0,
            ..PreprocessProfile::default()
        };

        let result = apply(&profile, &DynamicImage::ImageLuma8(img)).to_luma8();

        assert_eq!(result.get_pixel(0, 0)[0], 0, "Dark pixel should become black");
        assert_eq!(result.get_pixel(1, 0)[0], 255, "Bright pixel should become white");
        assert_eq!(result.get_pixel(2, 0)[0], 0, "Cutoff itself is not above threshold");
    }

    #[test]
    fn test_inverted_profile_turns_dark_glyphs_bright() {
        // Dark glyph (20) on light background (230)
        let mut img = GrayImage::from_pixel(4, 4, Luma([230]));
        img.put_pixel(1, 1, Luma([20]));
        let profile = PreprocessProfile::inverted(100, 4.0);

        let out = apply(&profile, &DynamicImage::ImageLuma8(img)).to_luma8();

        // Upscaling runs after binarization, so cubic ringing leaves values
        // near, not exactly at, the two levels
        assert_eq!(out.dimensions(), (16, 16));
        assert!(out.get_pixel(0, 0)[0] < 64, "background becomes dark");
        assert!(out.get_pixel(14, 14)[0] < 64, "background becomes dark");
        assert!(out.get_pixel(5, 5)[0] > 192, "glyph becomes bright");
    }

    #[test]
    fn test_apply_is_deterministic() {
        let frame = gradient_frame(40, 30);
        let profile = PreprocessProfile {
            enhance_contrast: true,
            ..PreprocessProfile::default()
        };
        assert_eq!(apply(&profile, &frame), apply(&profile, &frame));
    }

    #[test]
    fn test_colour_profile_keeps_channels() {
        let frame = gradient_frame(10, 10);
        let profile = PreprocessProfile {
            grayscale: false,
            threshold: None,
            invert: true,
            scale: 2.0,
            enhance_contrast: false,
        };
        let out = apply(&profile, &frame);
        assert_eq!((out.width(), out.height()), (20, 20));
        assert!(out.color().has_color());
    }

    #[test]
    fn test_upscale_identity() {
        let img = DynamicImage::new_luma8(7, 5);
        let out = upscale(img, 1.0);
        assert_eq!((out.width(), out.height()), (7, 5));
    }

    #[test]
    fn test_equalize_stretches_low_contrast() {
        // One tile holding two close grey levels
        let img = GrayImage::from_fn(32, 32, |x, _| if x < 16 { Luma([100]) } else { Luma([110]) });
        let spread = |clip: f32| {
            let out = equalize_tiles(&img, 1, clip);
            out.get_pixel(29, 16)[0] as i32 - out.get_pixel(2, 16)[0] as i32
        };

        let loose = spread(40.0);
        let tight = spread(2.0);
        assert!(loose > 40, "loose clip spread {loose}");
        assert!(tight < loose, "clipping limits the stretch: {tight} vs {loose}");
        assert!(tight >= 10, "tight clip spread {tight}");
    }

    #[test]
    fn test_equalize_small_image() {
        let img = GrayImage::from_pixel(3, 2, Luma([50]));
        let out = equalize_tiles(&img, 8, 2.0);
        assert_eq!(out.dimensions(), (3, 2));
    }
}
