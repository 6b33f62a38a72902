// ============================================================================
// Editor Configuration
// ============================================================================

use crate::error::{CertError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Natural width of the certificate page in css pixels.
pub const DOCUMENT_WIDTH: f32 = 854.0;

/// Page height in css pixels (A4 aspect at `DOCUMENT_WIDTH`).
pub const DOCUMENT_HEIGHT: f32 = 1208.0;

pub const DEFAULT_DEVICE_PIXEL_RATIO: f32 = 2.0;

/// Font files tried, in order, when no font path is configured.
const FALLBACK_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/nanum/NanumGothic.ttf",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/System/Library/Fonts/AppleSDGothicNeo.ttc",
    "C:\\Windows\\Fonts\\malgun.ttf",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    pub device_pixel_ratio: f32,
    pub document_width: f32,
    /// fitToWidth only shrinks below this container/document ratio.
    pub fit_upper_bound: f32,
    pub min_zoom: f32,
    pub resize_debounce_ms: u64,
    pub save_debounce_ms: u64,
    pub stamp_max_edge: u32,
    pub stamp_threshold: u8,
    pub capture_density: f32,
    pub pdf_jpeg_quality: u8,
    pub share_jpeg_quality: u8,
    pub font_path: Option<PathBuf>,
    pub download_dir: PathBuf,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            device_pixel_ratio: DEFAULT_DEVICE_PIXEL_RATIO,
            document_width: DOCUMENT_WIDTH,
            fit_upper_bound: crate::viewport::FIT_UPPER_BOUND,
            min_zoom: crate::viewport::MIN_ZOOM,
            resize_debounce_ms: crate::viewport::RESIZE_DEBOUNCE_MS,
            save_debounce_ms: crate::draft::SAVE_DEBOUNCE_MS,
            stamp_max_edge: crate::stamp::MAX_EDGE_PX,
            stamp_threshold: crate::stamp::WHITE_THRESHOLD,
            capture_density: crate::snapshot::CAPTURE_DENSITY,
            pdf_jpeg_quality: crate::export::PDF_JPEG_QUALITY,
            share_jpeg_quality: crate::export::SHARE_JPEG_QUALITY,
            font_path: None,
            download_dir: PathBuf::from("."),
        }
    }
}

impl EditorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CertError::ConfigError(format!("{}: {}", path.display(), e)))?;
        let config: EditorConfig = serde_json::from_str(&content)
            .map_err(|e| CertError::ConfigError(format!("Invalid JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.device_pixel_ratio > 0.0) {
            return Err(CertError::ConfigError(format!(
                "devicePixelRatio must be positive, got {}",
                self.device_pixel_ratio
            )));
        }
        if !(self.document_width > 0.0) {
            return Err(CertError::ConfigError("documentWidth must be positive".into()));
        }
        if !(self.capture_density > 0.0) {
            return Err(CertError::ConfigError("captureDensity must be positive".into()));
        }
        if self.pdf_jpeg_quality == 0 || self.pdf_jpeg_quality > 100 {
            return Err(CertError::ConfigError("pdfJpegQuality must be 1..=100".into()));
        }
        if self.share_jpeg_quality == 0 || self.share_jpeg_quality > 100 {
            return Err(CertError::ConfigError("shareJpegQuality must be 1..=100".into()));
        }
        Ok(())
    }

    /// The configured font, or the first fallback font present on this machine.
    pub fn resolve_font_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.font_path {
            return Some(path.clone());
        }
        FALLBACK_FONTS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = EditorConfig::default();
        assert_eq!(config.document_width, 854.0);
        assert_eq!(config.resize_debounce_ms, 200);
        assert_eq!(config.save_debounce_ms, 600);
        assert_eq!(config.stamp_max_edge, 800);
        assert_eq!(config.stamp_threshold, 200);
        assert_eq!(config.pdf_jpeg_quality, 95);
        assert_eq!(config.share_jpeg_quality, 90);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: EditorConfig =
            serde_json::from_str(r#"{ "devicePixelRatio": 3.0 }"#).unwrap();
        assert_eq!(config.device_pixel_ratio, 3.0);
        assert_eq!(config.document_width, DOCUMENT_WIDTH);
    }

    #[test]
    fn test_rejects_bad_ratio() {
        let config = EditorConfig {
            device_pixel_ratio: 0.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CertError::ConfigError(_))));
    }

    #[test]
    fn test_explicit_font_path_wins() {
        let config = EditorConfig {
            font_path: Some(PathBuf::from("/tmp/custom.ttf")),
            ..Default::default()
        };
        assert_eq!(config.resolve_font_path(), Some(PathBuf::from("/tmp/custom.ttf")));
    }
}
