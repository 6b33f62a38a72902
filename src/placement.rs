// ============================================================================
// Placement Editor
// ============================================================================

use crate::compositor::{BackgroundImage, SignatureCompositor};
use ::image::RgbaImage;
use tracing::{debug, info};

pub const INITIAL_SCALE: f32 = 0.5;
pub const MIN_SCALE: f32 = 0.1;
pub const MAX_SCALE: f32 = 2.0;

/// Positions and scales an imported stamp over the signature pad before it
/// is merged into the pad's image stack.
///
/// Position is the image centre in editor (css pixel) coordinates. The
/// mapping to compositor pixels is taken at commit time so a resize while the
/// editor is open cannot skew the result.
#[derive(Debug)]
pub struct PlacementEditor {
    image: RgbaImage,
    container_width: f32,
    container_height: f32,
    center_x: f32,
    center_y: f32,
    scale: f32,
}

impl PlacementEditor {
    /// Open over `compositor`, centred at half scale.
    pub fn open(
        image: RgbaImage,
        compositor: &mut SignatureCompositor,
        container_width: f32,
        container_height: f32,
    ) -> Self {
        compositor.enter_placement();
        let container_width = container_width.max(1.0);
        let container_height = container_height.max(1.0);
        debug!(
            width = image.width(),
            height = image.height(),
            container_width,
            container_height,
            "Placement editor opened"
        );
        Self {
            image,
            container_width,
            container_height,
            center_x: container_width / 2.0,
            center_y: container_height / 2.0,
            scale: INITIAL_SCALE,
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn center(&self) -> (f32, f32) {
        (self.center_x, self.center_y)
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn drag_by(&mut self, dx: f32, dy: f32) {
        self.center_x += dx;
        self.center_y += dy;
    }

    /// Slider input, clamped to the supported range.
    pub fn set_scale(&mut self, scale: f32) {
        self.scale = if scale.is_finite() {
            scale.clamp(MIN_SCALE, MAX_SCALE)
        } else {
            INITIAL_SCALE
        };
    }

    pub fn resize_container(&mut self, width: f32, height: f32) {
        self.container_width = width.max(1.0);
        self.container_height = height.max(1.0);
    }

    /// On-screen rectangle `(x, y, width, height)` of the preview.
    pub fn display_rect(&self) -> (f32, f32, f32, f32) {
        let w = self.image.width() as f32 * self.scale;
        let h = self.image.height() as f32 * self.scale;
        (self.center_x - w / 2.0, self.center_y - h / 2.0, w, h)
    }

    /// Map the preview into compositor pixels and append it to the stack.
    pub fn commit(self, compositor: &mut SignatureCompositor) -> BackgroundImage {
        let (pixel_w, pixel_h) = compositor.pixel_size();
        let ratio_x = pixel_w as f32 / self.container_width;
        let ratio_y = pixel_h as f32 / self.container_height;
        let (x, y, w, h) = self.display_rect();

        let background = BackgroundImage {
            image: self.image,
            x: x * ratio_x,
            y: y * ratio_y,
            width: w * ratio_x,
            height: h * ratio_y,
        };
        info!(
            x = background.x,
            y = background.y,
            width = background.width,
            height = background.height,
            "Stamp placed on signature pad"
        );
        compositor.leave_placement();
        compositor.push_background(background.clone());
        background
    }

    pub fn cancel(self, compositor: &mut SignatureCompositor) {
        debug!("Placement cancelled");
        compositor.leave_placement();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::CompositorState;
    use ::image::Rgba;

    fn stamp(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255]))
    }

    #[test]
    fn test_opens_centered_at_half_scale() {
        let mut c = SignatureCompositor::new(400, 200, 2.0);
        let editor = PlacementEditor::open(stamp(100, 60), &mut c, 400.0, 200.0);
        assert_eq!(editor.scale(), 0.5);
        assert_eq!(editor.center(), (200.0, 100.0));
        assert_eq!(editor.display_rect(), (175.0, 85.0, 50.0, 30.0));
        assert_eq!(c.state(), CompositorState::PlacingImage);
    }

    #[test]
    fn test_scale_is_clamped() {
        let mut c = SignatureCompositor::new(400, 200, 1.0);
        let mut editor = PlacementEditor::open(stamp(10, 10), &mut c, 400.0, 200.0);
        editor.set_scale(5.0);
        assert_eq!(editor.scale(), MAX_SCALE);
        editor.set_scale(0.0);
        assert_eq!(editor.scale(), MIN_SCALE);
    }

    #[test]
    fn test_commit_maps_to_compositor_pixels() {
        let mut c = SignatureCompositor::new(400, 200, 2.0);
        let mut editor = PlacementEditor::open(stamp(100, 60), &mut c, 400.0, 200.0);
        editor.drag_by(20.0, -10.0);
        editor.set_scale(1.0);
        let bg = editor.commit(&mut c);

        // Centre (220, 90), size 100x60 css -> x2 device pixels.
        assert_eq!((bg.x, bg.y, bg.width, bg.height), (340.0, 120.0, 200.0, 120.0));
        assert_eq!(c.backgrounds().len(), 1);
        assert_eq!(c.state(), CompositorState::Idle);
        assert_eq!(c.composite().get_pixel(440, 180)[3], 255);
    }

    #[test]
    fn test_commit_uses_size_at_commit_time() {
        let mut c = SignatureCompositor::new(400, 200, 1.0);
        let editor = PlacementEditor::open(stamp(100, 100), &mut c, 400.0, 200.0);
        c.resize(800, 400);
        let bg = editor.commit(&mut c);
        assert_eq!((bg.x, bg.y, bg.width, bg.height), (350.0, 150.0, 100.0, 100.0));
    }

    #[test]
    fn test_cancel_leaves_compositor_untouched() {
        let mut c = SignatureCompositor::new(400, 200, 1.0);
        let before = c.composite().clone();
        let editor = PlacementEditor::open(stamp(10, 10), &mut c, 400.0, 200.0);
        editor.cancel(&mut c);
        assert!(c.is_empty());
        assert_eq!(c.composite(), &before);
        assert_eq!(c.state(), CompositorState::Idle);
    }
}
