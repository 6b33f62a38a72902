// ============================================================================
// Signature Compositor
// ============================================================================
//
// Freehand pen/eraser surface over an ordered stack of placed images. The
// pixel buffer is derived state: it can always be rebuilt from the image
// stack (bottom) and the stroke history (top).

use ::image::imageops::{self, FilterType};
use ::image::{Rgba, RgbaImage};
use tracing::{debug, info};

pub const PEN_WIDTH_RANGE: (f32, f32) = (1.0, 3.0);
pub const ERASER_WIDTH_RANGE: (f32, f32) = (10.0, 20.0);

/// Anti-aliasing falloff at the stroke edge, in device pixels.
const EDGE_FALLOFF: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Pen,
    Eraser,
}

impl Tool {
    pub fn paint_mode(self) -> PaintMode {
        match self {
            Tool::Pen => PaintMode::Draw,
            Tool::Eraser => PaintMode::Erase,
        }
    }

    pub fn width_range(self) -> (f32, f32) {
        match self {
            Tool::Pen => PEN_WIDTH_RANGE,
            Tool::Eraser => ERASER_WIDTH_RANGE,
        }
    }
}

/// Source-over ink, or destination-out erase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintMode {
    Draw,
    Erase,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokePoint {
    pub x: f32,
    pub y: f32,
    pub pressure: f32,
}

impl StrokePoint {
    pub fn new(x: f32, y: f32, pressure: f32) -> Self {
        Self {
            x,
            y,
            pressure: if pressure.is_finite() {
                pressure.clamp(0.0, 1.0)
            } else {
                0.5
            },
        }
    }
}

/// A recorded stroke, in container (css pixel) coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    points: Vec<StrokePoint>,
    mode: PaintMode,
    min_width: f32,
    max_width: f32,
}

impl Stroke {
    fn begin(tool: Tool, first: StrokePoint) -> Self {
        let (min_width, max_width) = tool.width_range();
        Self {
            points: vec![first],
            mode: tool.paint_mode(),
            min_width,
            max_width,
        }
    }

    pub fn points(&self) -> &[StrokePoint] {
        &self.points
    }

    pub fn mode(&self) -> PaintMode {
        self.mode
    }

    pub fn width_range(&self) -> (f32, f32) {
        (self.min_width, self.max_width)
    }

    fn width_at(&self, pressure: f32) -> f32 {
        self.min_width + (self.max_width - self.min_width) * pressure
    }
}

/// An image placed under the strokes, in compositor pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundImage {
    pub image: RgbaImage,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositorState {
    Idle,
    Drawing,
    PlacingImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoOutcome {
    Stroke,
    Background,
    Nothing,
}

pub struct SignatureCompositor {
    css_width: u32,
    css_height: u32,
    device_pixel_ratio: f32,
    buffer: RgbaImage,
    strokes: Vec<Stroke>,
    backgrounds: Vec<BackgroundImage>,
    current: Option<Stroke>,
    tool: Tool,
    state: CompositorState,
}

impl std::fmt::Debug for SignatureCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureCompositor")
            .field("css_size", &(self.css_width, self.css_height))
            .field("pixel_size", &self.buffer.dimensions())
            .field("strokes", &self.strokes.len())
            .field("backgrounds", &self.backgrounds.len())
            .field("tool", &self.tool)
            .field("state", &self.state)
            .finish()
    }
}

impl SignatureCompositor {
    pub fn new(css_width: u32, css_height: u32, device_pixel_ratio: f32) -> Self {
        let device_pixel_ratio = if device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };
        let (w, h) = pixel_size(css_width, css_height, device_pixel_ratio);
        Self {
            css_width: css_width.max(1),
            css_height: css_height.max(1),
            device_pixel_ratio,
            buffer: RgbaImage::new(w, h),
            strokes: Vec::new(),
            backgrounds: Vec::new(),
            current: None,
            tool: Tool::Pen,
            state: CompositorState::Idle,
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn composite(&self) -> &RgbaImage {
        &self.buffer
    }

    pub fn css_size(&self) -> (u32, u32) {
        (self.css_width, self.css_height)
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn state(&self) -> CompositorState {
        self.state
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn backgrounds(&self) -> &[BackgroundImage] {
        &self.backgrounds
    }

    /// True when there is nothing to apply: no strokes and no placed images.
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty() && self.backgrounds.is_empty() && self.current.is_none()
    }

    // ------------------------------------------------------------------------
    // Tools and strokes
    // ------------------------------------------------------------------------

    /// Applies to the next stroke; a stroke in progress keeps its mode.
    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn pen_down(&mut self, x: f32, y: f32, pressure: f32) -> bool {
        if self.state != CompositorState::Idle {
            return false;
        }
        let stroke = Stroke::begin(self.tool, StrokePoint::new(x, y, pressure));
        paint_stroke(&mut self.buffer, &stroke, self.device_pixel_ratio);
        self.current = Some(stroke);
        self.state = CompositorState::Drawing;
        true
    }

    pub fn pen_move(&mut self, x: f32, y: f32, pressure: f32) {
        let Some(stroke) = self.current.as_mut() else {
            return;
        };
        let point = StrokePoint::new(x, y, pressure);
        let prev = *stroke.points.last().unwrap_or(&point);
        stroke.points.push(point);

        // Live preview of the newest segment only; pen_up rebuilds canonically.
        let segment = Stroke {
            points: vec![prev, point],
            ..stroke.clone_header()
        };
        paint_stroke(&mut self.buffer, &segment, self.device_pixel_ratio);
    }

    /// Commit the stroke in progress to history.
    pub fn pen_up(&mut self) -> bool {
        let Some(stroke) = self.current.take() else {
            return false;
        };
        debug!(points = stroke.points.len(), mode = ?stroke.mode, "Stroke committed");
        self.strokes.push(stroke);
        self.state = CompositorState::Idle;
        self.redraw();
        true
    }

    // ------------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------------

    pub fn undo(&mut self) -> UndoOutcome {
        self.pen_up();
        let outcome = if self.strokes.pop().is_some() {
            UndoOutcome::Stroke
        } else if self.backgrounds.pop().is_some() {
            UndoOutcome::Background
        } else {
            UndoOutcome::Nothing
        };
        if outcome != UndoOutcome::Nothing {
            self.redraw();
        }
        outcome
    }

    /// Empty strokes and images, but only if `confirm` agrees.
    pub fn clear_all(&mut self, confirm: impl FnOnce() -> bool) -> bool {
        if !confirm() {
            return false;
        }
        self.current = None;
        if self.state == CompositorState::Drawing {
            self.state = CompositorState::Idle;
        }
        self.strokes.clear();
        self.backgrounds.clear();
        self.redraw();
        info!("Signature pad cleared");
        true
    }

    pub fn push_background(&mut self, background: BackgroundImage) {
        debug!(
            x = background.x,
            y = background.y,
            width = background.width,
            height = background.height,
            "Background image placed"
        );
        self.backgrounds.push(background);
        self.redraw();
    }

    // ------------------------------------------------------------------------
    // Placement mode
    // ------------------------------------------------------------------------

    pub(crate) fn enter_placement(&mut self) {
        self.pen_up();
        self.state = CompositorState::PlacingImage;
    }

    pub(crate) fn leave_placement(&mut self) {
        if self.state == CompositorState::PlacingImage {
            self.state = CompositorState::Idle;
        }
    }

    // ------------------------------------------------------------------------
    // Surface
    // ------------------------------------------------------------------------

    /// Resize the container. A stroke in progress is committed first so the
    /// rebuilt buffer and the history agree.
    pub fn resize(&mut self, css_width: u32, css_height: u32) {
        if self.state == CompositorState::Drawing {
            debug!("Resize during stroke, committing it first");
            self.pen_up();
        }
        self.css_width = css_width.max(1);
        self.css_height = css_height.max(1);
        let (w, h) = pixel_size(self.css_width, self.css_height, self.device_pixel_ratio);
        self.buffer = RgbaImage::new(w, h);
        self.redraw();
    }

    /// Clear, then images bottom-up, then the stroke history.
    pub fn redraw(&mut self) {
        let (w, h) = self.buffer.dimensions();
        self.buffer = RgbaImage::new(w, h);
        for background in &self.backgrounds {
            paint_background(&mut self.buffer, background);
        }
        for stroke in &self.strokes {
            paint_stroke(&mut self.buffer, stroke, self.device_pixel_ratio);
        }
    }
}

impl Stroke {
    fn clone_header(&self) -> Stroke {
        Stroke {
            points: Vec::new(),
            mode: self.mode,
            min_width: self.min_width,
            max_width: self.max_width,
        }
    }
}

// ============================================================================
// Rasterization
// ============================================================================

pub fn pixel_size(css_width: u32, css_height: u32, device_pixel_ratio: f32) -> (u32, u32) {
    let w = (css_width.max(1) as f32 * device_pixel_ratio).round().max(1.0) as u32;
    let h = (css_height.max(1) as f32 * device_pixel_ratio).round().max(1.0) as u32;
    (w, h)
}

fn paint_background(buffer: &mut RgbaImage, background: &BackgroundImage) {
    let w = background.width.round().max(1.0) as u32;
    let h = background.height.round().max(1.0) as u32;
    let scaled = if background.image.dimensions() == (w, h) {
        background.image.clone()
    } else {
        imageops::resize(&background.image, w, h, FilterType::Triangle)
    };
    imageops::overlay(
        buffer,
        &scaled,
        background.x.round() as i64,
        background.y.round() as i64,
    );
}

/// Rasterize a whole stroke into a coverage mask, then composite it once so
/// overlapping segments do not double up.
fn paint_stroke(buffer: &mut RgbaImage, stroke: &Stroke, scale: f32) {
    let (bw, bh) = buffer.dimensions();
    if stroke.points.is_empty() || bw == 0 || bh == 0 {
        return;
    }

    let device: Vec<(f32, f32, f32)> = stroke
        .points
        .iter()
        .map(|p| (p.x * scale, p.y * scale, stroke.width_at(p.pressure) * scale / 2.0))
        .collect();

    let pad = stroke.max_width * scale / 2.0 + EDGE_FALLOFF + 1.0;
    let min_x = device.iter().map(|p| p.0).fold(f32::INFINITY, f32::min) - pad;
    let min_y = device.iter().map(|p| p.1).fold(f32::INFINITY, f32::min) - pad;
    let max_x = device.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max) + pad;
    let max_y = device.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max) + pad;

    let x0 = min_x.floor().max(0.0) as u32;
    let y0 = min_y.floor().max(0.0) as u32;
    let x1 = (max_x.ceil().max(0.0) as u32).min(bw);
    let y1 = (max_y.ceil().max(0.0) as u32).min(bh);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let mask_w = (x1 - x0) as usize;
    let mut mask = vec![0.0f32; mask_w * (y1 - y0) as usize];

    let segments: Vec<((f32, f32, f32), (f32, f32, f32))> = if device.len() == 1 {
        vec![(device[0], device[0])]
    } else {
        device.windows(2).map(|w| (w[0], w[1])).collect()
    };

    for (a, b) in segments {
        let r = a.2.max(b.2) + EDGE_FALLOFF + 1.0;
        let sx0 = ((a.0.min(b.0) - r).floor().max(x0 as f32)) as u32;
        let sy0 = ((a.1.min(b.1) - r).floor().max(y0 as f32)) as u32;
        let sx1 = ((a.0.max(b.0) + r).ceil().min(x1 as f32)).max(0.0) as u32;
        let sy1 = ((a.1.max(b.1) + r).ceil().min(y1 as f32)).max(0.0) as u32;

        for py in sy0..sy1 {
            for px in sx0..sx1 {
                let coverage = capsule_coverage(px as f32 + 0.5, py as f32 + 0.5, a, b);
                if coverage <= 0.0 {
                    continue;
                }
                let idx = (py - y0) as usize * mask_w + (px - x0) as usize;
                if coverage > mask[idx] {
                    mask[idx] = coverage;
                }
            }
        }
    }

    for py in y0..y1 {
        for px in x0..x1 {
            let coverage = mask[(py - y0) as usize * mask_w + (px - x0) as usize];
            if coverage <= 0.0 {
                continue;
            }
            let pixel = buffer.get_pixel_mut(px, py);
            *pixel = match stroke.mode {
                PaintMode::Draw => ink_over(*pixel, coverage),
                PaintMode::Erase => erase(*pixel, coverage),
            };
        }
    }
}

/// Coverage of a pixel centre by a segment swept with a linearly varying radius.
fn capsule_coverage(px: f32, py: f32, a: (f32, f32, f32), b: (f32, f32, f32)) -> f32 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq <= f32::EPSILON {
        0.0
    } else {
        (((px - a.0) * dx + (py - a.1) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + dx * t, a.1 + dy * t);
    let radius = a.2 + (b.2 - a.2) * t;
    let dist = ((px - cx).powi(2) + (py - cy).powi(2)).sqrt();
    (radius + EDGE_FALLOFF - dist).clamp(0.0, 1.0)
}

/// Black ink, source-over.
fn ink_over(dst: Rgba<u8>, src_alpha: f32) -> Rgba<u8> {
    let Rgba([r, g, b, a]) = dst;
    let da = a as f32 / 255.0;
    let out_a = src_alpha + da * (1.0 - src_alpha);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let keep = da * (1.0 - src_alpha) / out_a;
    Rgba([
        (r as f32 * keep).round() as u8,
        (g as f32 * keep).round() as u8,
        (b as f32 * keep).round() as u8,
        (out_a * 255.0).round() as u8,
    ])
}

/// Destination-out: scale destination alpha by the inverse coverage.
fn erase(dst: Rgba<u8>, coverage: f32) -> Rgba<u8> {
    let Rgba([r, g, b, a]) = dst;
    let out_a = (a as f32 * (1.0 - coverage)).round() as u8;
    if out_a == 0 {
        Rgba([0, 0, 0, 0])
    } else {
        Rgba([r, g, b, out_a])
    }
}
