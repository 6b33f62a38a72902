// ============================================================================
// Editor Session
// ============================================================================
//
// Owns every surface of one open editor: the live document, the signature
// pad and its placement overlay, and the global input surface. Pointer
// events are routed here and turned into drags on the right component.

use crate::compositor::SignatureCompositor;
use crate::config::EditorConfig;
use crate::document::LiveDocument;
use crate::draft::{DraftKey, DraftStore, KeyValueStore};
use crate::drag::{DragDelta, DragKind, InputSurface, PointerTarget};
use crate::error::{CertError, Notification, Result};
use crate::export::{CaptureExporter, ExportFormat, ExportOutcome};
use crate::placement::PlacementEditor;
use crate::stamp::StampProcessor;
use ::image::DynamicImage;
use chrono::NaiveDate;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const EMPTY_SIGNATURE_MESSAGE: &str = "서명을 입력해 주세요.";

#[derive(Debug)]
pub struct ViewportSession {
    id: Uuid,
    config: EditorConfig,
    document: LiveDocument,
    draft_key: Option<DraftKey>,
    stamp: StampProcessor,
    pad: Option<SignatureCompositor>,
    placement: Option<PlacementEditor>,
    input: InputSurface,
}

impl ViewportSession {
    /// A session bound to one (site, work log) pair, or unscoped with `None`.
    pub fn new(config: EditorConfig, draft_key: Option<DraftKey>) -> Self {
        let id = Uuid::new_v4();
        info!(session = %id, scoped = draft_key.is_some(), "Editor session opened");
        Self {
            id,
            document: LiveDocument::new(&config),
            stamp: StampProcessor::new(config.stamp_max_edge, config.stamp_threshold),
            config,
            draft_key,
            pad: None,
            placement: None,
            input: InputSurface::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn draft_key(&self) -> Option<&DraftKey> {
        self.draft_key.as_ref()
    }

    pub fn document(&self) -> &LiveDocument {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut LiveDocument {
        &mut self.document
    }

    pub fn input(&self) -> &InputSurface {
        &self.input
    }

    // ------------------------------------------------------------------------
    // Viewport
    // ------------------------------------------------------------------------

    pub fn mount(&mut self, container_width: f32) {
        self.document.viewport.fit_to_width(container_width);
    }

    pub fn on_resize(&mut self, container_width: f32, now: Instant) {
        self.document.viewport.on_resize(container_width, now);
    }

    /// Fire due timers. Returns true if the viewport refit.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.document.viewport.tick(now)
    }

    /// Turning pan mode off ends a pan or reposition drag in progress.
    pub fn toggle_pan_mode(&mut self) -> bool {
        let enabled = self.document.viewport.toggle_pan_mode();
        if !enabled && matches!(self.input.active(), Some(DragKind::Pan | DragKind::RepositionSignature)) {
            self.end_drag();
        }
        enabled
    }

    // ------------------------------------------------------------------------
    // Signature pad
    // ------------------------------------------------------------------------

    pub fn open_signature_pad(&mut self, css_width: u32, css_height: u32) -> &mut SignatureCompositor {
        if self.pad.is_some() {
            debug!("Signature pad already open");
        }
        let dpr = self.config.device_pixel_ratio;
        self.pad
            .get_or_insert_with(|| SignatureCompositor::new(css_width, css_height, dpr))
    }

    pub fn pad(&self) -> Option<&SignatureCompositor> {
        self.pad.as_ref()
    }

    pub fn pad_mut(&mut self) -> Option<&mut SignatureCompositor> {
        self.pad.as_mut()
    }

    pub fn resize_pad(&mut self, css_width: u32, css_height: u32) {
        if let Some(pad) = self.pad.as_mut() {
            pad.resize(css_width, css_height);
        }
        if let Some(placement) = self.placement.as_mut() {
            placement.resize_container(css_width as f32, css_height as f32);
        }
    }

    /// Close the pad, discarding an open placement. Drags are always ended.
    pub fn close_signature_pad(&mut self) {
        self.end_drag();
        if let (Some(placement), Some(pad)) = (self.placement.take(), self.pad.as_mut()) {
            placement.cancel(pad);
        }
        if self.pad.take().is_some() {
            debug!("Signature pad closed");
        }
    }

    /// Binarize an imported image and open it in the placement editor.
    pub fn import_stamp(&mut self, image: &DynamicImage) -> Result<()> {
        let Some(pad) = self.pad.as_mut() else {
            return Err(CertError::ImageLoadError("Signature pad is not open".into()));
        };
        if let Some(previous) = self.placement.take() {
            previous.cancel(pad);
        }
        let stamp = self.stamp.process(image);
        let (css_w, css_h) = pad.css_size();
        self.placement = Some(PlacementEditor::open(stamp, pad, css_w as f32, css_h as f32));
        Ok(())
    }

    pub fn placement(&self) -> Option<&PlacementEditor> {
        self.placement.as_ref()
    }

    pub fn placement_mut(&mut self) -> Option<&mut PlacementEditor> {
        self.placement.as_mut()
    }

    pub fn commit_placement(&mut self) -> bool {
        if self.placement.is_some() {
            self.end_drag();
        }
        match (self.placement.take(), self.pad.as_mut()) {
            (Some(placement), Some(pad)) => {
                placement.commit(pad);
                true
            }
            _ => false,
        }
    }

    pub fn cancel_placement(&mut self) {
        if self.placement.is_some() {
            self.end_drag();
        }
        if let (Some(placement), Some(pad)) = (self.placement.take(), self.pad.as_mut()) {
            placement.cancel(pad);
        }
    }

    /// Embed the pad composite into the paper slot and close the pad.
    /// An empty pad is a toast and changes nothing.
    pub fn apply_signature(&mut self) -> std::result::Result<(), Notification> {
        let Some(pad) = self.pad.as_ref().filter(|p| !p.is_empty()) else {
            info!("Apply with empty signature pad");
            return Err(Notification::info(EMPTY_SIGNATURE_MESSAGE));
        };
        self.document.paper.place(pad.composite());
        if let Err(e) = self.sync_signature_raster() {
            warn!(error = %e, "Signature could not be encoded for the form");
            return Err(Notification::error(format!("서명을 저장하지 못했습니다: {}", e)));
        }
        self.close_signature_pad();
        Ok(())
    }

    /// Write the rendered slot into the form, which is what drafts persist.
    fn sync_signature_raster(&mut self) -> Result<()> {
        self.document.form.signature_raster = self.document.paper.to_data_url()?;
        Ok(())
    }

    pub fn clear_signature(&mut self) {
        self.document.paper.clear();
        self.document.form.signature_raster = None;
    }

    /// Explicit user reset of fields and signature.
    pub fn reset(&mut self) {
        self.close_signature_pad();
        self.document.reset();
        info!(session = %self.id, "Document reset");
    }

    // ------------------------------------------------------------------------
    // Pointer routing
    // ------------------------------------------------------------------------

    pub fn pointer_down(&mut self, target: PointerTarget, x: f32, y: f32) -> bool {
        let panning = self.document.viewport.panning_enabled();
        let kind = match target {
            PointerTarget::FormControl | PointerTarget::SignatureCanvas => None,
            PointerTarget::PlacementImage if self.placement.is_some() => Some(DragKind::PlaceImage),
            PointerTarget::PlacementImage => None,
            PointerTarget::PlacedSignature if panning && self.document.paper.placed().is_some() => {
                Some(DragKind::RepositionSignature)
            }
            PointerTarget::PlacedSignature | PointerTarget::Document if panning => Some(DragKind::Pan),
            PointerTarget::PlacedSignature | PointerTarget::Document => None,
        };
        match kind {
            Some(kind) => self.input.begin(kind, x, y),
            None => false,
        }
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) -> Option<DragDelta> {
        let delta = self.input.update(x, y)?;
        match delta.kind {
            DragKind::Pan => self.document.viewport.pan_by(delta.dx, delta.dy),
            DragKind::PlaceImage => {
                if let Some(placement) = self.placement.as_mut() {
                    placement.drag_by(delta.dx, delta.dy);
                }
            }
            DragKind::RepositionSignature => {
                let viewport = &self.document.viewport;
                let (pan_mode, zoom) = (viewport.panning_enabled(), viewport.zoom());
                self.document.paper.reposition(delta.dx, delta.dy, pan_mode, zoom);
            }
        }
        Some(delta)
    }

    pub fn pointer_up(&mut self) -> bool {
        self.end_drag()
    }

    /// End the active drag. A moved signature is written back to the form.
    fn end_drag(&mut self) -> bool {
        let Some(session) = self.input.end() else {
            return false;
        };
        if session.kind() == DragKind::RepositionSignature && session.moved() {
            if let Err(e) = self.sync_signature_raster() {
                warn!(error = %e, "Repositioned signature could not be encoded for the form");
            }
        }
        true
    }

    // ------------------------------------------------------------------------
    // Drafts and export
    // ------------------------------------------------------------------------

    /// Load the eligible draft, if any, into the document.
    pub fn restore_draft<S: KeyValueStore>(&mut self, drafts: &mut DraftStore<S>) -> Result<bool> {
        match drafts.restore(self.draft_key.as_ref())? {
            Some(record) => {
                info!(session = %self.id, source = %record.source_key, "Draft restored");
                if self.draft_key.is_none() {
                    self.draft_key = parse_source_key(&record.source_key);
                }
                self.document.load_form(record.form);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Schedule a debounced save of the current form. Unscoped sessions
    /// have nowhere to save to.
    pub fn schedule_save<S: KeyValueStore>(&self, drafts: &mut DraftStore<S>, now: Instant) -> Result<bool> {
        let Some(key) = self.draft_key.as_ref() else {
            debug!("Unscoped session, draft not saved");
            return Ok(false);
        };
        drafts.schedule_save(key, &self.document.form, now)?;
        Ok(true)
    }

    pub fn export(
        &mut self,
        exporter: &mut CaptureExporter,
        format: ExportFormat,
        date: NaiveDate,
    ) -> std::result::Result<ExportOutcome, Notification> {
        self.end_drag();
        exporter.export(&mut self.document, format, date)
    }
}

impl Drop for ViewportSession {
    fn drop(&mut self) {
        self.close_signature_pad();
        debug!(session = %self.id, "Editor session closed");
    }
}

fn parse_source_key(source_key: &str) -> Option<DraftKey> {
    source_key
        .split_once(':')
        .map(|(site, log)| DraftKey::new(site, log))
}
