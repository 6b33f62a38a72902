// ============================================================================
// Stamp Processing
// ============================================================================
//
// Turns a photo of a seal or signature on paper into solid black ink on a
// transparent background.

use crate::error::{CertError, Result};
use ::image::imageops::FilterType;
use ::image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use std::io::Read;
use tracing::debug;

/// Longer edge of a processed stamp, in pixels.
pub const MAX_EDGE_PX: u32 = 800;

/// Pixels brighter than this (mean of R, G, B) become transparent.
pub const WHITE_THRESHOLD: u8 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StampProcessor {
    pub max_edge: u32,
    pub threshold: u8,
}

impl Default for StampProcessor {
    fn default() -> Self {
        Self {
            max_edge: MAX_EDGE_PX,
            threshold: WHITE_THRESHOLD,
        }
    }
}

impl StampProcessor {
    pub fn new(max_edge: u32, threshold: u8) -> Self {
        Self {
            max_edge: max_edge.max(1),
            threshold,
        }
    }

    pub fn process(&self, image: &DynamicImage) -> RgbaImage {
        let (width, height) = image.dimensions();
        let (target_w, target_h) = fit_longer_edge(width, height, self.max_edge);

        let mut rgba = if (target_w, target_h) == (width, height) {
            image.to_rgba8()
        } else {
            debug!(width, height, target_w, target_h, "Downscaling stamp source");
            image
                .resize_exact(target_w, target_h, FilterType::Triangle)
                .to_rgba8()
        };

        binarize(&mut rgba, self.threshold);
        rgba
    }
}

/// Threshold every pixel in place: bright pixels vanish, the rest turn black.
pub fn binarize(image: &mut RgbaImage, threshold: u8) {
    for pixel in image.pixels_mut() {
        let Rgba([r, g, b, a]) = *pixel;
        let luminance = (r as u16 + g as u16 + b as u16) / 3;
        *pixel = if luminance > threshold as u16 {
            Rgba([r, g, b, 0])
        } else {
            Rgba([0, 0, 0, a])
        };
    }
}

/// Target size whose longer edge is at most `max_edge`, preserving aspect.
pub fn fit_longer_edge(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= max_edge || longer == 0 {
        return (width, height);
    }
    let scale = max_edge as f64 / longer as f64;
    let w = ((width as f64 * scale).round() as u32).clamp(1, max_edge);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max_edge);
    (w, h)
}

/// Load an image from a file path or an http(s) URL.
pub fn load_image(source: &str) -> Result<DynamicImage> {
    let image_bytes = if source.starts_with("http://") || source.starts_with("https://") {
        let response = ureq::get(source)
            .call()
            .map_err(|e| CertError::ImageLoadError(format!("Failed to fetch URL: {}", e)))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| CertError::ImageLoadError(format!("Failed to read response: {}", e)))?;
        bytes
    } else {
        std::fs::read(source).map_err(|e| CertError::ImageLoadError(format!("{}: {}", source, e)))?
    };

    ::image::load_from_memory(&image_bytes)
        .map_err(|e| CertError::ImageLoadError(format!("Failed to decode image: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::Rgb;
    use proptest::prelude::*;

    fn solid(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(::image::RgbImage::from_pixel(
            width,
            height,
            Rgb([value, value, value]),
        ))
    }

    #[test]
    fn test_mid_gray_becomes_opaque_black() {
        let out = StampProcessor::default().process(&solid(10, 10, 128));
        assert!(out.pixels().all(|p| *p == Rgba([0, 0, 0, 255])));
    }

    #[test]
    fn test_near_white_becomes_transparent() {
        let out = StampProcessor::default().process(&solid(10, 10, 210));
        assert!(out.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // Luminance exactly 200 stays ink.
        let out = StampProcessor::default().process(&solid(2, 2, 200));
        assert!(out.pixels().all(|p| *p == Rgba([0, 0, 0, 255])));
    }

    #[test]
    fn test_unweighted_mean_luminance() {
        // Pure red has mean 85, so it is ink even though it looks bright.
        let img = DynamicImage::ImageRgb8(::image::RgbImage::from_pixel(1, 1, Rgb([255, 0, 0])));
        let out = StampProcessor::default().process(&img);
        assert_eq!(*out.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_keeps_source_alpha_on_ink() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([20, 20, 20, 90])));
        let out = StampProcessor::default().process(&img);
        assert_eq!(*out.get_pixel(0, 0), Rgba([0, 0, 0, 90]));
    }

    #[test]
    fn test_downscales_longer_edge() {
        let out = StampProcessor::default().process(&solid(1600, 400, 0));
        assert_eq!(out.dimensions(), (800, 200));

        let out = StampProcessor::default().process(&solid(300, 2400, 0));
        assert_eq!(out.dimensions(), (100, 800));
    }

    #[test]
    fn test_small_images_keep_size() {
        let out = StampProcessor::default().process(&solid(640, 480, 0));
        assert_eq!(out.dimensions(), (640, 480));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = load_image("definitely/not/here.png");
        assert!(matches!(result, Err(CertError::ImageLoadError(_))));
    }

    proptest! {
        /// Re-processing a stamp changes nothing.
        #[test]
        fn prop_process_is_idempotent(
            pixels in proptest::collection::vec(any::<[u8; 4]>(), 1..64),
            width in 1u32..8,
        ) {
            let height = (pixels.len() as u32 / width).max(1);
            let mut img = RgbaImage::new(width, height);
            for (i, p) in img.pixels_mut().enumerate() {
                *p = Rgba(pixels[i % pixels.len()]);
            }
            let processor = StampProcessor::default();
            let once = processor.process(&DynamicImage::ImageRgba8(img));
            let twice = processor.process(&DynamicImage::ImageRgba8(once.clone()));
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_fit_never_exceeds_max_edge(w in 1u32..5000, h in 1u32..5000) {
            let (tw, th) = fit_longer_edge(w, h, MAX_EDGE_PX);
            prop_assert!(tw.max(th) <= MAX_EDGE_PX);
            prop_assert!(tw >= 1 && th >= 1);
        }
    }
}
