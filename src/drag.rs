// ============================================================================
// Pointer Drags
// ============================================================================
//
// A `DragSession` exists from pointer-down until pointer-up. While it exists
// the surface counts its move/up listeners as attached to the global input
// surface, so the drag keeps tracking after the pointer leaves the element
// it started on. Every exit path detaches them.

use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    Pan,
    PlaceImage,
    RepositionSignature,
}

/// What a pointer-down landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    /// Anywhere on the document that is not one of the other targets.
    Document,
    /// An input, textarea, button or other form control.
    FormControl,
    /// The freehand signature canvas.
    SignatureCanvas,
    /// The stamp preview inside the placement editor.
    PlacementImage,
    /// The signature already embedded in the paper slot.
    PlacedSignature,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    kind: DragKind,
    last_x: f32,
    last_y: f32,
    moved: bool,
}

impl DragSession {
    fn new(kind: DragKind, x: f32, y: f32) -> Self {
        Self {
            kind,
            last_x: x,
            last_y: y,
            moved: false,
        }
    }

    pub fn kind(&self) -> DragKind {
        self.kind
    }

    pub fn moved(&self) -> bool {
        self.moved
    }

    /// Delta since the previous pointer position.
    fn advance(&mut self, x: f32, y: f32) -> (f32, f32) {
        let delta = (x - self.last_x, y - self.last_y);
        self.last_x = x;
        self.last_y = y;
        if delta != (0.0, 0.0) {
            self.moved = true;
        }
        delta
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragDelta {
    pub kind: DragKind,
    pub dx: f32,
    pub dy: f32,
}

/// Global input surface holding at most one active drag.
#[derive(Debug, Default)]
pub struct InputSurface {
    active: Option<DragSession>,
    attached_listeners: usize,
}

const LISTENERS_PER_DRAG: usize = 2;

impl InputSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a drag. Refused while another drag is active.
    pub fn begin(&mut self, kind: DragKind, x: f32, y: f32) -> bool {
        if let Some(active) = &self.active {
            warn!(active = ?active.kind(), requested = ?kind, "Drag already active, ignoring");
            return false;
        }
        self.active = Some(DragSession::new(kind, x, y));
        self.attached_listeners += LISTENERS_PER_DRAG;
        debug!(?kind, "Drag started");
        true
    }

    pub fn update(&mut self, x: f32, y: f32) -> Option<DragDelta> {
        let session = self.active.as_mut()?;
        let (dx, dy) = session.advance(x, y);
        Some(DragDelta {
            kind: session.kind(),
            dx,
            dy,
        })
    }

    /// End the active drag, detaching its listeners.
    pub fn end(&mut self) -> Option<DragSession> {
        let session = self.active.take()?;
        self.attached_listeners = self.attached_listeners.saturating_sub(LISTENERS_PER_DRAG);
        debug!(kind = ?session.kind(), moved = session.moved(), "Drag ended");
        Some(session)
    }

    pub fn active(&self) -> Option<DragKind> {
        self.active.map(|s| s.kind())
    }

    pub fn attached_listeners(&self) -> usize {
        self.attached_listeners
    }
}

impl Drop for InputSurface {
    fn drop(&mut self) {
        self.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deltas_are_incremental() {
        let mut surface = InputSurface::new();
        assert!(surface.begin(DragKind::Pan, 10.0, 10.0));
        let d = surface.update(15.0, 7.0).unwrap();
        assert_eq!((d.dx, d.dy), (5.0, -3.0));
        let d = surface.update(20.0, 7.0).unwrap();
        assert_eq!((d.dx, d.dy), (5.0, 0.0));
    }

    #[test]
    fn test_single_active_drag() {
        let mut surface = InputSurface::new();
        assert!(surface.begin(DragKind::Pan, 0.0, 0.0));
        assert!(!surface.begin(DragKind::PlaceImage, 0.0, 0.0));
        assert_eq!(surface.active(), Some(DragKind::Pan));
        assert_eq!(surface.attached_listeners(), 2);
    }

    #[test]
    fn test_listeners_detach_on_end() {
        let mut surface = InputSurface::new();
        for _ in 0..5 {
            surface.begin(DragKind::RepositionSignature, 0.0, 0.0);
            surface.update(3.0, 3.0);
            let ended = surface.end().unwrap();
            assert!(ended.moved());
        }
        assert_eq!(surface.attached_listeners(), 0);
        assert!(surface.update(1.0, 1.0).is_none());
        assert!(surface.end().is_none());
    }
}
