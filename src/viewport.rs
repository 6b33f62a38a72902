// ============================================================================
// Viewport Transform
// ============================================================================
//
// Pan/zoom of the whole document surface. Presentation only: nothing here
// touches document content.

use crate::config::DOCUMENT_WIDTH;
use crate::debounce::Debouncer;
use std::time::Instant;
use tracing::debug;

pub const MIN_ZOOM: f32 = 0.3;
pub const FIT_UPPER_BOUND: f32 = 1.1;
pub const RESIZE_DEBOUNCE_MS: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub zoom: f32,
    pub pan_x: f32,
    pub pan_y: f32,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        zoom: 1.0,
        pan_x: 0.0,
        pan_y: 0.0,
    };

    /// `translate(pan) · scale(zoom)` applied to a document-space point.
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.zoom + self.pan_x, y * self.zoom + self.pan_y)
    }

    /// Screen-space point back to document space.
    pub fn invert(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pan_x) / self.zoom, (y - self.pan_y) / self.zoom)
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

#[derive(Debug)]
pub struct ViewportTransform {
    transform: Transform,
    panning_enabled: bool,
    document_width: f32,
    fit_upper_bound: f32,
    min_zoom: f32,
    resize: Debouncer<f32>,
}

impl Default for ViewportTransform {
    fn default() -> Self {
        Self::new(DOCUMENT_WIDTH, FIT_UPPER_BOUND, MIN_ZOOM, RESIZE_DEBOUNCE_MS)
    }
}

impl ViewportTransform {
    pub fn new(document_width: f32, fit_upper_bound: f32, min_zoom: f32, debounce_ms: u64) -> Self {
        Self {
            transform: Transform::IDENTITY,
            panning_enabled: false,
            document_width,
            fit_upper_bound,
            min_zoom,
            resize: Debouncer::from_millis(debounce_ms),
        }
    }

    pub fn from_config(config: &crate::config::EditorConfig) -> Self {
        Self::new(
            config.document_width,
            config.fit_upper_bound,
            config.min_zoom,
            config.resize_debounce_ms,
        )
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn zoom(&self) -> f32 {
        self.transform.zoom
    }

    pub fn pan(&self) -> (f32, f32) {
        (self.transform.pan_x, self.transform.pan_y)
    }

    pub fn panning_enabled(&self) -> bool {
        self.panning_enabled
    }

    /// Fit the document to the container width and recentre.
    pub fn fit_to_width(&mut self, container_width: f32) {
        let ratio = container_width / self.document_width;
        let zoom = if ratio <= self.fit_upper_bound {
            ratio.min(1.0)
        } else {
            1.0
        };
        self.transform = Transform {
            zoom: zoom.max(f32::MIN_POSITIVE),
            pan_x: 0.0,
            pan_y: 0.0,
        };
        debug!(container_width, zoom, "Fitted viewport to width");
    }

    /// Debounced variant of `fit_to_width` for window resize events.
    pub fn on_resize(&mut self, container_width: f32, now: Instant) {
        self.resize.schedule(now, container_width);
    }

    /// Drive pending timers. Returns true when a fit was applied.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.resize.poll(now) {
            Some(width) => {
                self.fit_to_width(width);
                true
            }
            None => false,
        }
    }

    pub fn adjust_zoom(&mut self, delta: f32) {
        self.transform.zoom = (self.transform.zoom + delta).max(self.min_zoom);
    }

    pub fn toggle_pan_mode(&mut self) -> bool {
        self.panning_enabled = !self.panning_enabled;
        self.panning_enabled
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.transform.pan_x += dx;
        self.transform.pan_y += dy;
    }

    /// Replace the transform wholesale. Used to freeze and restore for capture.
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fit_narrow_container() {
        let mut v = ViewportTransform::default();
        v.fit_to_width(640.0);
        assert!((v.zoom() - 640.0 / 854.0).abs() < 1e-6);
        assert!((v.zoom() - 0.749).abs() < 0.001);
        assert_eq!(v.pan(), (0.0, 0.0));
    }

    #[test]
    fn test_fit_slightly_wider_container_caps_at_one() {
        let mut v = ViewportTransform::default();
        v.fit_to_width(900.0);
        assert_eq!(v.zoom(), 1.0);
    }

    #[test]
    fn test_fit_wide_container() {
        let mut v = ViewportTransform::default();
        v.adjust_zoom(0.5);
        v.fit_to_width(1920.0);
        assert_eq!(v.zoom(), 1.0);
    }

    #[test]
    fn test_fit_resets_pan() {
        let mut v = ViewportTransform::default();
        v.pan_by(30.0, -12.0);
        v.fit_to_width(854.0);
        assert_eq!(v.transform(), Transform::IDENTITY);
    }

    #[test]
    fn test_zoom_has_floor_but_no_ceiling() {
        let mut v = ViewportTransform::default();
        v.adjust_zoom(-5.0);
        assert_eq!(v.zoom(), MIN_ZOOM);
        v.adjust_zoom(10.0);
        assert!((v.zoom() - 10.3).abs() < 1e-5);
    }

    #[test]
    fn test_resize_is_debounced() {
        let start = Instant::now();
        let mut v = ViewportTransform::default();
        v.on_resize(500.0, start);
        v.on_resize(640.0, start + Duration::from_millis(150));
        assert!(!v.tick(start + Duration::from_millis(300)));
        assert_eq!(v.zoom(), 1.0);
        assert!(v.tick(start + Duration::from_millis(350)));
        assert!((v.zoom() - 640.0 / 854.0).abs() < 1e-6);
    }

    #[test]
    fn test_transform_round_trip() {
        let t = Transform {
            zoom: 0.75,
            pan_x: 12.0,
            pan_y: -40.0,
        };
        let (sx, sy) = t.apply(100.0, 200.0);
        assert_eq!((sx, sy), (87.0, 110.0));
        let (dx, dy) = t.invert(sx, sy);
        assert!((dx - 100.0).abs() < 1e-4 && (dy - 200.0).abs() < 1e-4);
    }

    #[test]
    fn test_toggle_pan_mode() {
        let mut v = ViewportTransform::default();
        assert!(v.toggle_pan_mode());
        assert!(!v.toggle_pan_mode());
    }
}
