// ============================================================================
// Error Handling
// ============================================================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CertError {
    #[error("Failed to create PDF: {0}")]
    PdfError(String),
    #[error("Failed to load image: {0}")]
    ImageLoadError(String),
    #[error("Failed to encode image: {0}")]
    EncodeError(String),
    #[error("Failed to load font: {0}")]
    FontError(String),
    #[error("Draft store error: {0}")]
    DraftError(String),
    #[error("Unsupported draft version: {0}")]
    UnsupportedDraftVersion(u64),
    #[error("Invalid date format: {0}")]
    DateError(String),
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
    #[error("Sharing is not supported on this host")]
    ShareUnsupported,
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CertError>;

// ============================================================================
// User Notifications
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A toast shown to the user. Never carries control flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
