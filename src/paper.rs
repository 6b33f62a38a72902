// ============================================================================
// Paper Slot
// ============================================================================
//
// The fixed signature region on the certificate page. Holds at most one
// placed signature, fitted with a 10% margin and centred.

use crate::error::Result;
use ::image::imageops::{self, FilterType};
use ::image::RgbaImage;
use tracing::{debug, info};

/// Fraction of the slot the fitted signature may occupy along its
/// constraining axis.
pub const FIT_FRACTION: f32 = 0.9;

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedSignature {
    pub raster: RgbaImage,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Fit `composite` into a `slot_width` x `slot_height` pixel slot.
pub fn embed(composite: &RgbaImage, slot_width: f32, slot_height: f32) -> PlacedSignature {
    let (x, y, width, height) = fit_rect(
        composite.width().max(1) as f32,
        composite.height().max(1) as f32,
        slot_width,
        slot_height,
    );
    PlacedSignature {
        raster: composite.clone(),
        x,
        y,
        width,
        height,
    }
}

/// Aspect-preserving fit of an image into a slot, returned as
/// `(offset_x, offset_y, draw_width, draw_height)`.
pub fn fit_rect(img_w: f32, img_h: f32, slot_width: f32, slot_height: f32) -> (f32, f32, f32, f32) {
    let canvas_ratio = slot_width / slot_height;
    let img_ratio = img_w / img_h;

    let (draw_width, draw_height) = if img_ratio > canvas_ratio {
        let w = slot_width * FIT_FRACTION;
        (w, w / img_ratio)
    } else {
        let h = slot_height * FIT_FRACTION;
        (h * img_ratio, h)
    };

    (
        (slot_width - draw_width) / 2.0,
        (slot_height - draw_height) / 2.0,
        draw_width,
        draw_height,
    )
}

#[derive(Debug)]
pub struct PaperSlot {
    css_width: f32,
    css_height: f32,
    device_pixel_ratio: f32,
    placed: Option<PlacedSignature>,
}

impl PaperSlot {
    pub fn new(css_width: f32, css_height: f32, device_pixel_ratio: f32) -> Self {
        Self {
            css_width: css_width.max(1.0),
            css_height: css_height.max(1.0),
            device_pixel_ratio: if device_pixel_ratio > 0.0 {
                device_pixel_ratio
            } else {
                1.0
            },
            placed: None,
        }
    }

    pub fn css_size(&self) -> (f32, f32) {
        (self.css_width, self.css_height)
    }

    /// Backing canvas size in device pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            (self.css_width * self.device_pixel_ratio).round().max(1.0) as u32,
            (self.css_height * self.device_pixel_ratio).round().max(1.0) as u32,
        )
    }

    pub fn placed(&self) -> Option<&PlacedSignature> {
        self.placed.as_ref()
    }

    /// The "tap to sign" indicator shows while nothing is placed.
    pub fn shows_sign_hint(&self) -> bool {
        self.placed.is_none()
    }

    /// Embed a new signature, replacing any previous one.
    pub fn place(&mut self, composite: &RgbaImage) -> &PlacedSignature {
        let (w, h) = self.pixel_size();
        let placed = embed(composite, w as f32, h as f32);
        info!(
            x = placed.x,
            y = placed.y,
            width = placed.width,
            height = placed.height,
            replaced = self.placed.is_some(),
            "Signature embedded in paper slot"
        );
        self.placed.insert(placed)
    }

    /// Put back a previously rendered slot raster, e.g. from a draft.
    pub fn restore(&mut self, raster: RgbaImage) {
        let (w, h) = self.pixel_size();
        self.placed = Some(PlacedSignature {
            raster,
            x: 0.0,
            y: 0.0,
            width: w as f32,
            height: h as f32,
        });
    }

    /// Move the placed signature by a screen-space pointer delta.
    ///
    /// Only allowed in pan mode. `zoom` is the current viewport zoom; the
    /// delta is converted into backing canvas pixels.
    pub fn reposition(&mut self, dx: f32, dy: f32, pan_mode: bool, zoom: f32) -> bool {
        if !pan_mode {
            return false;
        }
        let (pixel_w, pixel_h) = self.pixel_size();
        let zoom = if zoom > 0.0 { zoom } else { 1.0 };
        let scale_x = pixel_w as f32 / (self.css_width * zoom);
        let scale_y = pixel_h as f32 / (self.css_height * zoom);
        let Some(placed) = self.placed.as_mut() else {
            return false;
        };
        placed.x += dx * scale_x;
        placed.y += dy * scale_y;
        debug!(x = placed.x, y = placed.y, "Signature repositioned");
        true
    }

    pub fn clear(&mut self) {
        if self.placed.take().is_some() {
            info!("Signature removed from paper slot");
        }
    }

    /// Render the slot canvas: transparent with the signature drawn in.
    pub fn render(&self) -> RgbaImage {
        let (w, h) = self.pixel_size();
        let mut canvas = RgbaImage::new(w, h);
        if let Some(placed) = &self.placed {
            let dw = placed.width.round().max(1.0) as u32;
            let dh = placed.height.round().max(1.0) as u32;
            let scaled = if placed.raster.dimensions() == (dw, dh) {
                placed.raster.clone()
            } else {
                imageops::resize(&placed.raster, dw, dh, FilterType::Triangle)
            };
            // Empty canvas: copy, do not blend.
            imageops::replace(
                &mut canvas,
                &scaled,
                placed.x.round() as i64,
                placed.y.round() as i64,
            );
        }
        canvas
    }

    /// PNG data URL of the rendered slot, or `None` when empty.
    pub fn to_data_url(&self) -> Result<Option<String>> {
        match self.placed {
            Some(_) => crate::document::encode_png_data_url(&self.render()).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::Rgba;
    use proptest::prelude::*;

    #[test]
    fn test_wide_signature_is_width_constrained() {
        let composite = RgbaImage::new(600, 100);
        let placed = embed(&composite, 400.0, 160.0);
        assert!((placed.width - 360.0).abs() < 1e-4);
        assert!((placed.height - 60.0).abs() < 1e-4);
        assert!((placed.x - 20.0).abs() < 1e-4);
        assert!((placed.y - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_tall_signature_is_height_constrained() {
        let composite = RgbaImage::new(100, 100);
        let placed = embed(&composite, 400.0, 160.0);
        assert!((placed.height - 144.0).abs() < 1e-4);
        assert!((placed.width - 144.0).abs() < 1e-4);
        assert!((placed.x - 128.0).abs() < 1e-4);
    }

    #[test]
    fn test_single_placement() {
        let mut slot = PaperSlot::new(200.0, 80.0, 2.0);
        assert!(slot.shows_sign_hint());
        slot.place(&RgbaImage::new(10, 10));
        slot.place(&RgbaImage::new(20, 5));
        assert_eq!(slot.placed().unwrap().raster.dimensions(), (20, 5));
        slot.clear();
        assert!(slot.shows_sign_hint());
        assert!(slot.to_data_url().unwrap().is_none());
    }

    #[test]
    fn test_reposition_requires_pan_mode() {
        let mut slot = PaperSlot::new(200.0, 80.0, 2.0);
        slot.place(&RgbaImage::new(100, 100));
        let before = slot.placed().unwrap().x;
        assert!(!slot.reposition(10.0, 0.0, false, 1.0));
        assert_eq!(slot.placed().unwrap().x, before);

        // 10 screen px at zoom 0.5 and dpr 2 is 40 canvas px.
        assert!(slot.reposition(10.0, 5.0, true, 0.5));
        assert!((slot.placed().unwrap().x - (before + 40.0)).abs() < 1e-4);
    }

    #[test]
    fn test_render_draws_signature_in_slot() {
        let mut slot = PaperSlot::new(100.0, 50.0, 1.0);
        slot.place(&RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255])));
        let canvas = slot.render();
        assert_eq!(canvas.dimensions(), (100, 50));
        assert_eq!(canvas.get_pixel(50, 25)[3], 255);
        assert_eq!(canvas.get_pixel(2, 2)[3], 0);
    }

    #[test]
    fn test_restoring_a_render_reproduces_it() {
        let mut slot = PaperSlot::new(100.0, 50.0, 2.0);
        slot.place(&RgbaImage::from_pixel(30, 10, Rgba([0, 0, 0, 77])));
        slot.reposition(3.0, 7.0, true, 1.0);
        let rendered = slot.render();

        let mut restored = PaperSlot::new(100.0, 50.0, 2.0);
        restored.restore(rendered.clone());
        assert_eq!(restored.render(), rendered);
    }

    proptest! {
        #[test]
        fn prop_embed_stays_inside_and_centred(
            iw in 1u32..3000, ih in 1u32..3000,
            sw in 1.0f32..2000.0, sh in 1.0f32..2000.0,
        ) {
            let (x, y, width, height) = fit_rect(iw as f32, ih as f32, sw, sh);
            let tol = 1e-3 * sw.max(sh);
            prop_assert!(width <= sw * FIT_FRACTION + tol);
            prop_assert!(height <= sh * FIT_FRACTION + tol);
            prop_assert!((x - (sw - width) / 2.0).abs() <= tol);
            prop_assert!((y - (sh - height) / 2.0).abs() <= tol);
            let ratio = width / height;
            prop_assert!((ratio - iw as f32 / ih as f32).abs() <= 1e-2 * ratio.max(1.0));
        }
    }
}
