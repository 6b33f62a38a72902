//! Completion certificate editor core.
//!
//! Fill in the certificate, sign it by hand or with a photographed stamp,
//! keep a draft per site and work log, and export the page as a one-page
//! A4 PDF or a shareable JPEG.

pub mod capture;
pub mod compositor;
pub mod config;
pub mod debounce;
pub mod document;
pub mod drag;
pub mod draft;
pub mod error;
pub mod export;
pub mod layout;
pub mod paper;
pub mod placement;
pub mod session;
pub mod snapshot;
pub mod stamp;
pub mod text;
pub mod viewport;

pub use compositor::{SignatureCompositor, Tool};
pub use config::EditorConfig;
pub use document::{DocumentForm, FieldId, LiveDocument};
pub use draft::{DraftKey, DraftRecord, DraftStore, FileStore, KeyValueStore, MemoryStore};
pub use error::{CertError, Notification, Result};
pub use export::{CaptureArtifact, CaptureExporter, ExportFormat, ExportOutcome, HostCapabilities};
pub use paper::PaperSlot;
pub use placement::PlacementEditor;
pub use session::ViewportSession;
pub use stamp::StampProcessor;
pub use viewport::ViewportTransform;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
