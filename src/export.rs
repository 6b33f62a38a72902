// ============================================================================
// Export
// ============================================================================
//
// Turns a captured page raster into a one-page A4 PDF or a JPEG for the
// platform share sheet, and hands the file to the host.

use crate::capture;
use crate::config::EditorConfig;
use crate::document::LiveDocument;
use crate::error::{CertError, Notification, Result};
use crate::snapshot;
use crate::text::TextRenderer;
use ::image::codecs::jpeg::JpegEncoder;
use ::image::{Rgb, RgbImage, Rgba, RgbaImage};
use chrono::NaiveDate;
use printpdf::*;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{error, info, warn};
use uuid::Uuid;

/// A4 dimensions in mm
pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;

pub const PDF_JPEG_QUALITY: u8 = 95;
pub const SHARE_JPEG_QUALITY: u8 = 90;

pub const FILE_STEM: &str = "작업완료확인서";

const PDF_MIME: &str = "application/pdf";
const JPEG_MIME: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureArtifact {
    pub id: Uuid,
    pub filename: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

pub fn artifact_filename(date: NaiveDate, extension: &str) -> String {
    format!("{}_{}.{}", FILE_STEM, date.format("%Y%m%d"), extension)
}

// ============================================================================
// Page Fitting
// ============================================================================

/// Where the raster lands on the page, in mm from the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PagePlacement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Scale to page width and centre vertically; if that is too tall, scale
/// uniformly down to page height instead and centre horizontally.
pub fn fit_to_page(bitmap_w: u32, bitmap_h: u32, page_w: f32, page_h: f32) -> PagePlacement {
    let bw = bitmap_w.max(1) as f32;
    let bh = bitmap_h.max(1) as f32;
    let scaled_h = bh * page_w / bw;
    if scaled_h <= page_h {
        PagePlacement {
            x: 0.0,
            y: (page_h - scaled_h) / 2.0,
            width: page_w,
            height: scaled_h,
        }
    } else {
        let scaled_w = bw * page_h / bh;
        PagePlacement {
            x: (page_w - scaled_w) / 2.0,
            y: 0.0,
            width: scaled_w,
            height: page_h,
        }
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Composite against white; JPEG has no alpha.
fn flatten(bitmap: &RgbaImage) -> RgbImage {
    let mut rgb_image = RgbImage::new(bitmap.width(), bitmap.height());
    for (x, y, pixel) in bitmap.enumerate_pixels() {
        let Rgba([r, g, b, a]) = *pixel;
        let alpha = a as f32 / 255.0;
        let bg = 255.0;
        let out_r = (r as f32 * alpha + bg * (1.0 - alpha)).round() as u8;
        let out_g = (g as f32 * alpha + bg * (1.0 - alpha)).round() as u8;
        let out_b = (b as f32 * alpha + bg * (1.0 - alpha)).round() as u8;
        rgb_image.put_pixel(x, y, Rgb([out_r, out_g, out_b]));
    }
    rgb_image
}

pub fn encode_jpeg(bitmap: &RgbaImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = flatten(bitmap);
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| CertError::EncodeError(e.to_string()))?;
    Ok(bytes)
}

pub fn to_pdf(bitmap: &RgbaImage, date: NaiveDate, quality: u8) -> Result<CaptureArtifact> {
    let jpeg = encode_jpeg(bitmap, quality)?;
    let (width, height) = bitmap.dimensions();
    let placement = fit_to_page(width, height, PAGE_WIDTH_MM, PAGE_HEIGHT_MM);

    let (doc, page1, layer1) = PdfDocument::new(
        FILE_STEM,
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let layer = doc.get_page(page1).get_layer(layer1);

    let image = Image::from(ImageXObject {
        width: Px(width as usize),
        height: Px(height as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: true,
        image_data: jpeg,
        image_filter: Some(ImageFilter::DCT),
        clipping_bbox: None,
        smask: None,
    });

    // Same dpi on both axes keeps the scale uniform.
    let dpi = (width as f32) / (placement.width / 25.4);

    image.add_to_layer(
        layer,
        ImageTransform {
            translate_x: Some(Mm(placement.x)),
            translate_y: Some(Mm(placement.y)),
            dpi: Some(dpi),
            ..Default::default()
        },
    );

    let mut writer = BufWriter::new(Vec::new());
    doc.save(&mut writer)
        .map_err(|e| CertError::PdfError(e.to_string()))?;
    let bytes = writer
        .into_inner()
        .map_err(|e| CertError::PdfError(e.to_string()))?;

    Ok(CaptureArtifact {
        id: Uuid::new_v4(),
        filename: artifact_filename(date, "pdf"),
        mime: PDF_MIME,
        bytes,
    })
}

pub fn to_shareable(bitmap: &RgbaImage, date: NaiveDate, quality: u8) -> Result<CaptureArtifact> {
    Ok(CaptureArtifact {
        id: Uuid::new_v4(),
        filename: artifact_filename(date, "jpg"),
        mime: JPEG_MIME,
        bytes: encode_jpeg(bitmap, quality)?,
    })
}

// ============================================================================
// Host Capabilities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(PathBuf),
    /// The user dismissed the save dialog. Not an error.
    Cancelled,
}

/// A native "save file" capability.
pub trait SaveTarget {
    fn save(&self, artifact: &CaptureArtifact) -> Result<SaveOutcome>;
}

/// A native share capability.
pub trait ShareTarget {
    fn share(&self, artifact: &CaptureArtifact) -> Result<()>;
}

/// Fallback when there is no save capability: drop the file in a directory.
#[derive(Debug, Clone)]
pub struct DownloadDir {
    dir: PathBuf,
}

impl DownloadDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SaveTarget for DownloadDir {
    fn save(&self, artifact: &CaptureArtifact) -> Result<SaveOutcome> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&artifact.filename);
        std::fs::write(&path, &artifact.bytes)?;
        Ok(SaveOutcome::Saved(path))
    }
}

#[derive(Default)]
pub struct HostCapabilities {
    pub save: Option<Box<dyn SaveTarget>>,
    pub share: Option<Box<dyn ShareTarget>>,
}

impl std::fmt::Debug for HostCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostCapabilities")
            .field("save", &self.save.is_some())
            .field("share", &self.share.is_some())
            .finish()
    }
}

// ============================================================================
// Exporter
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Pdf,
    Jpeg,
    Share,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Saved(PathBuf),
    Shared(String),
    Cancelled,
}

#[derive(Debug)]
pub struct CaptureExporter {
    host: HostCapabilities,
    fallback: DownloadDir,
    text: Option<TextRenderer>,
    density: f32,
    pdf_quality: u8,
    share_quality: u8,
}

impl CaptureExporter {
    pub fn new(config: &EditorConfig, host: HostCapabilities) -> Self {
        let text = match config.resolve_font_path() {
            Some(path) => match TextRenderer::load(&path) {
                Ok(renderer) => Some(renderer),
                Err(e) => {
                    warn!(error = %e, "Capture font unavailable, exports will omit text");
                    None
                }
            },
            None => {
                warn!("No capture font configured or found, exports will omit text");
                None
            }
        };
        Self {
            host,
            fallback: DownloadDir::new(config.download_dir.clone()),
            text,
            density: config.capture_density,
            pdf_quality: config.pdf_jpeg_quality,
            share_quality: config.share_jpeg_quality,
        }
    }

    pub fn with_text_renderer(mut self, text: TextRenderer) -> Self {
        self.text = Some(text);
        self
    }

    /// Prepare, snapshot and encode. The document is restored before this
    /// returns, on every path.
    pub fn capture(&self, doc: &mut LiveDocument, format: ExportFormat, date: NaiveDate) -> Result<CaptureArtifact> {
        let bitmap = {
            let prepared = capture::prepare(doc);
            snapshot::snapshot_to_raster(&prepared, self.text.as_ref(), self.density)
        };
        match format {
            ExportFormat::Pdf => to_pdf(&bitmap, date, self.pdf_quality),
            ExportFormat::Jpeg | ExportFormat::Share => to_shareable(&bitmap, date, self.share_quality),
        }
    }

    fn deliver(&self, artifact: &CaptureArtifact, format: ExportFormat) -> Result<ExportOutcome> {
        if format == ExportFormat::Share {
            let share = self.host.share.as_ref().ok_or(CertError::ShareUnsupported)?;
            share.share(artifact)?;
            return Ok(ExportOutcome::Shared(artifact.filename.clone()));
        }
        let outcome = match &self.host.save {
            Some(save) => save.save(artifact)?,
            None => self.fallback.save(artifact)?,
        };
        Ok(match outcome {
            SaveOutcome::Saved(path) => ExportOutcome::Saved(path),
            SaveOutcome::Cancelled => ExportOutcome::Cancelled,
        })
    }

    /// Capture and hand off to the host. Failures are logged and come back
    /// as a toast; they never escape as errors.
    ///
    /// The exporter stays mutably borrowed until the artifact is delivered,
    /// so one capture runs at a time.
    pub fn export(
        &mut self,
        doc: &mut LiveDocument,
        format: ExportFormat,
        date: NaiveDate,
    ) -> std::result::Result<ExportOutcome, Notification> {
        let result = self
            .capture(doc, format, date)
            .and_then(|artifact| {
                info!(
                    id = %artifact.id,
                    filename = %artifact.filename,
                    bytes = artifact.bytes.len(),
                    "Capture encoded"
                );
                self.deliver(&artifact, format)
            });

        match result {
            Ok(ExportOutcome::Cancelled) => {
                info!("Save cancelled by user");
                Ok(ExportOutcome::Cancelled)
            }
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(error = %e, ?format, "Capture failed");
                Err(Notification::error(format!("캡처에 실패했습니다: {}", e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn test_short_bitmap_is_centred_vertically() {
        let p = fit_to_page(1000, 500, 210.0, 297.0);
        assert_eq!(p.width, 210.0);
        assert_eq!(p.height, 105.0);
        assert_eq!(p.x, 0.0);
        assert!((p.y - 96.0).abs() < 1e-4);
    }

    #[test]
    fn test_tall_bitmap_is_scaled_to_page_height() {
        let p = fit_to_page(500, 1000, 210.0, 297.0);
        assert_eq!(p.height, 297.0);
        assert_eq!(p.width, 148.5);
        assert!((p.x - 30.75).abs() < 1e-4);
        assert_eq!(p.y, 0.0);
    }

    #[test]
    fn test_filenames_are_date_stamped() {
        assert_eq!(artifact_filename(date(), "pdf"), "작업완료확인서_20240501.pdf");
        assert_eq!(artifact_filename(date(), "jpg"), "작업완료확인서_20240501.jpg");
    }

    #[test]
    fn test_jpeg_flattens_alpha_to_white() {
        let bitmap = RgbaImage::new(8, 8);
        let bytes = encode_jpeg(&bitmap, 90).unwrap();
        let decoded = ::image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert!(decoded.pixels().all(|p| p[0] > 250 && p[1] > 250 && p[2] > 250));
    }

    #[test]
    fn test_pdf_has_one_page() {
        let bitmap = RgbaImage::from_pixel(60, 80, Rgba([0, 0, 0, 255]));
        let artifact = to_pdf(&bitmap, date(), PDF_JPEG_QUALITY).unwrap();
        assert_eq!(artifact.mime, "application/pdf");
        assert!(artifact.bytes.starts_with(b"%PDF"));
        let parsed = lopdf::Document::load_mem(&artifact.bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), 1);
    }

    struct CancellingSave;

    impl SaveTarget for CancellingSave {
        fn save(&self, _artifact: &CaptureArtifact) -> Result<SaveOutcome> {
            Ok(SaveOutcome::Cancelled)
        }
    }

    struct FailingSave;

    impl SaveTarget for FailingSave {
        fn save(&self, _artifact: &CaptureArtifact) -> Result<SaveOutcome> {
            Err(CertError::IoError(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }
    }

    struct RecordingShare(Rc<RefCell<Vec<String>>>);

    impl ShareTarget for RecordingShare {
        fn share(&self, artifact: &CaptureArtifact) -> Result<()> {
            self.0.borrow_mut().push(artifact.filename.clone());
            Ok(())
        }
    }

    fn exporter(host: HostCapabilities) -> CaptureExporter {
        let config = EditorConfig {
            font_path: Some(PathBuf::from("/nonexistent/font.ttf")),
            capture_density: 0.5,
            ..Default::default()
        };
        CaptureExporter::new(&config, host)
    }

    fn document() -> LiveDocument {
        let mut doc = LiveDocument::new(&EditorConfig::default());
        doc.viewport.fit_to_width(500.0);
        doc
    }

    #[test]
    fn test_cancelled_save_is_silent() {
        let mut exporter = exporter(HostCapabilities {
            save: Some(Box::new(CancellingSave)),
            share: None,
        });
        let mut doc = document();
        assert_eq!(
            exporter.export(&mut doc, ExportFormat::Pdf, date()),
            Ok(ExportOutcome::Cancelled)
        );
    }

    #[test]
    fn test_failure_becomes_notification_and_restores() {
        let mut exporter = exporter(HostCapabilities {
            save: Some(Box::new(FailingSave)),
            share: None,
        });
        let mut doc = document();
        let before = doc.viewport.transform();
        let notice = exporter
            .export(&mut doc, ExportFormat::Pdf, date())
            .unwrap_err();
        assert!(notice.is_error());
        assert_eq!(doc.viewport.transform(), before);
    }

    struct PanicsOnceSave {
        calls: Cell<u32>,
        dir: PathBuf,
    }

    impl SaveTarget for PanicsOnceSave {
        fn save(&self, artifact: &CaptureArtifact) -> Result<SaveOutcome> {
            self.calls.set(self.calls.get() + 1);
            if self.calls.get() == 1 {
                panic!("save dialog crashed");
            }
            DownloadDir::new(&self.dir).save(artifact)
        }
    }

    #[test]
    fn test_exporter_usable_after_panicking_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = exporter(HostCapabilities {
            save: Some(Box::new(PanicsOnceSave {
                calls: Cell::new(0),
                dir: dir.path().to_path_buf(),
            })),
            share: None,
        });
        let mut doc = document();
        let before = doc.viewport.transform();

        let first = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            exporter.export(&mut doc, ExportFormat::Jpeg, date())
        }));
        assert!(first.is_err());
        assert_eq!(doc.viewport.transform(), before);

        let second = exporter.export(&mut doc, ExportFormat::Jpeg, date()).unwrap();
        assert_eq!(
            second,
            ExportOutcome::Saved(dir.path().join("작업완료확인서_20240501.jpg"))
        );
    }

    #[test]
    fn test_share_without_capability_is_reported() {
        let mut exporter = exporter(HostCapabilities::default());
        let mut doc = document();
        let notice = exporter
            .export(&mut doc, ExportFormat::Share, date())
            .unwrap_err();
        assert!(notice.message.contains("not supported"));
    }

    #[test]
    fn test_share_hands_off_jpeg() {
        let shared = Rc::new(RefCell::new(Vec::new()));
        let mut exporter = exporter(HostCapabilities {
            save: None,
            share: Some(Box::new(RecordingShare(shared.clone()))),
        });
        let mut doc = document();
        let outcome = exporter.export(&mut doc, ExportFormat::Share, date()).unwrap();
        assert_eq!(outcome, ExportOutcome::Shared("작업완료확인서_20240501.jpg".into()));
        assert_eq!(shared.borrow().len(), 1);
    }

    #[test]
    fn test_fallback_writes_to_download_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = EditorConfig {
            font_path: Some(PathBuf::from("/nonexistent/font.ttf")),
            capture_density: 0.5,
            download_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let mut exporter = CaptureExporter::new(&config, HostCapabilities::default());
        let mut doc = document();
        let outcome = exporter.export(&mut doc, ExportFormat::Jpeg, date()).unwrap();
        let expected = dir.path().join("작업완료확인서_20240501.jpg");
        assert_eq!(outcome, ExportOutcome::Saved(expected.clone()));
        assert!(expected.exists());
    }
}
