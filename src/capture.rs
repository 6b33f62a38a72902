// ============================================================================
// Capture Preparation
// ============================================================================
//
// Before a snapshot the live document is put into a canonical print state:
// placeholders cleared, non-printable chrome hidden, viewport frozen at 1:1.
// `PreparedCapture` undoes every change in reverse order when dropped, so
// the live document cannot be left prepared, whatever happens in between.

use crate::document::{Affordance, FieldId, LiveDocument};
use crate::viewport::Transform;
use std::ops::Deref;
use tracing::debug;

/// Chrome hidden during capture.
pub const NON_PRINTABLE: [Affordance; 4] = [
    Affordance::SignatureDragHandle,
    Affordance::SignHint,
    Affordance::PanToggle,
    Affordance::ZoomControls,
];

#[derive(Debug)]
enum Mutation {
    Placeholder(FieldId, String),
    Affordance(Affordance, bool),
    Viewport(Transform),
}

pub struct PreparedCapture<'a> {
    doc: &'a mut LiveDocument,
    log: Vec<Mutation>,
}

pub fn prepare(doc: &mut LiveDocument) -> PreparedCapture<'_> {
    let mut log = Vec::new();

    for id in FieldId::ALL {
        match doc.take_placeholder(id) {
            Some(text) => log.push(Mutation::Placeholder(id, text)),
            None => debug!(field = ?id, "No placeholder to clear"),
        }
    }

    for affordance in NON_PRINTABLE {
        match doc.set_affordance_visible(affordance, false) {
            Some(was_visible) => log.push(Mutation::Affordance(affordance, was_visible)),
            None => debug!(?affordance, "Affordance not mounted, skipping"),
        }
    }

    log.push(Mutation::Viewport(doc.viewport.transform()));
    doc.viewport.set_transform(Transform::IDENTITY);

    debug!(mutations = log.len(), "Document prepared for capture");
    PreparedCapture { doc, log }
}

impl Deref for PreparedCapture<'_> {
    type Target = LiveDocument;

    fn deref(&self) -> &LiveDocument {
        &*self.doc
    }
}

impl Drop for PreparedCapture<'_> {
    fn drop(&mut self) {
        while let Some(mutation) = self.log.pop() {
            match mutation {
                Mutation::Viewport(transform) => self.doc.viewport.set_transform(transform),
                Mutation::Affordance(affordance, visible) => {
                    self.doc.set_affordance_visible(affordance, visible);
                }
                Mutation::Placeholder(id, text) => self.doc.set_placeholder(id, text),
            }
        }
        debug!("Capture preparation restored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;

    fn document() -> LiveDocument {
        let mut doc = LiveDocument::new(&EditorConfig::default());
        doc.viewport.fit_to_width(640.0);
        doc.viewport.pan_by(15.0, 25.0);
        doc
    }

    #[test]
    fn test_prepare_neutralises_live_state() {
        let mut doc = document();
        let prepared = prepare(&mut doc);
        assert!(FieldId::ALL.iter().all(|id| prepared.placeholder(*id) == Some("")));
        assert!(NON_PRINTABLE.iter().all(|a| !prepared.affordance_visible(*a)));
        assert!(prepared.viewport.transform().is_identity());
    }

    #[test]
    fn test_drop_restores_everything() {
        let mut doc = document();
        let before = doc.viewport.transform();
        doc.set_affordance_visible(Affordance::ZoomControls, false);
        {
            let _prepared = prepare(&mut doc);
        }
        assert_eq!(doc.viewport.transform(), before);
        assert_eq!(
            doc.placeholder(FieldId::SiteName),
            Some(FieldId::SiteName.default_placeholder())
        );
        assert!(doc.affordance_visible(Affordance::SignHint));
        // Hidden before capture, hidden after.
        assert!(!doc.affordance_visible(Affordance::ZoomControls));
    }

    #[test]
    fn test_missing_affordance_is_tolerated() {
        let mut doc = document();
        doc.unmount_affordance(Affordance::PanToggle);
        {
            let prepared = prepare(&mut doc);
            assert!(!prepared.has_affordance(Affordance::PanToggle));
        }
        assert!(!doc.has_affordance(Affordance::PanToggle));
        assert!(doc.affordance_visible(Affordance::SignatureDragHandle));
    }

    #[test]
    fn test_restores_after_panic() {
        let mut doc = document();
        let before = doc.viewport.transform();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _prepared = prepare(&mut doc);
            panic!("snapshot blew up");
        }));
        assert!(result.is_err());
        assert_eq!(doc.viewport.transform(), before);
        assert!(doc.affordance_visible(Affordance::SignHint));
    }
}
