// ============================================================================
// Document Model
// ============================================================================

use crate::config::EditorConfig;
use crate::error::{CertError, Result};
use crate::layout;
use crate::paper::PaperSlot;
use crate::viewport::ViewportTransform;
use ::image::{DynamicImage, ImageFormat, RgbaImage};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Cursor;
use tracing::{debug, warn};

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Editable text fields of the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldId {
    SiteName,
    CompanyName,
    WorkPeriod,
    WorkContent,
    Notes,
    SignerName,
    ConfirmDateText,
    Recipient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    SingleLine,
    MultiLine,
    Date,
    Recipient,
}

impl FieldId {
    pub const ALL: [FieldId; 8] = [
        FieldId::SiteName,
        FieldId::CompanyName,
        FieldId::WorkPeriod,
        FieldId::WorkContent,
        FieldId::Notes,
        FieldId::SignerName,
        FieldId::ConfirmDateText,
        FieldId::Recipient,
    ];

    pub fn kind(self) -> FieldKind {
        match self {
            FieldId::WorkContent | FieldId::Notes => FieldKind::MultiLine,
            FieldId::ConfirmDateText => FieldKind::Date,
            FieldId::Recipient => FieldKind::Recipient,
            _ => FieldKind::SingleLine,
        }
    }

    pub fn default_placeholder(self) -> &'static str {
        match self {
            FieldId::SiteName => "현장명을 입력하세요",
            FieldId::CompanyName => "업체명을 입력하세요",
            FieldId::WorkPeriod => "예) 2024.05.01 ~ 2024.05.31",
            FieldId::WorkContent => "작업 내용을 입력하세요",
            FieldId::Notes => "특이사항이 있으면 입력하세요",
            FieldId::SignerName => "성명",
            FieldId::ConfirmDateText => "YYYY년 M월 D일",
            FieldId::Recipient => "수신처",
        }
    }
}

// ============================================================================
// Form Data
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentForm {
    pub site_name: String,
    pub company_name: String,
    pub work_period: String,
    pub work_content: String,
    pub notes: String,
    pub signer_name: String,
    pub confirm_date_text: String,
    pub recipient: String,
    /// PNG data URL of the rendered signature slot.
    pub signature_raster: Option<String>,
}

impl DocumentForm {
    pub fn field(&self, id: FieldId) -> &str {
        match id {
            FieldId::SiteName => &self.site_name,
            FieldId::CompanyName => &self.company_name,
            FieldId::WorkPeriod => &self.work_period,
            FieldId::WorkContent => &self.work_content,
            FieldId::Notes => &self.notes,
            FieldId::SignerName => &self.signer_name,
            FieldId::ConfirmDateText => &self.confirm_date_text,
            FieldId::Recipient => &self.recipient,
        }
    }

    pub fn set_field(&mut self, id: FieldId, value: impl Into<String>) {
        let slot = match id {
            FieldId::SiteName => &mut self.site_name,
            FieldId::CompanyName => &mut self.company_name,
            FieldId::WorkPeriod => &mut self.work_period,
            FieldId::WorkContent => &mut self.work_content,
            FieldId::Notes => &mut self.notes,
            FieldId::SignerName => &mut self.signer_name,
            FieldId::ConfirmDateText => &mut self.confirm_date_text,
            FieldId::Recipient => &mut self.recipient,
        };
        *slot = value.into();
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_blank(&self) -> bool {
        *self == Self::default()
    }
}

pub fn encode_png_data_url(image: &RgbaImage) -> Result<String> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| CertError::EncodeError(e.to_string()))?;
    Ok(format!("{}{}", PNG_DATA_URL_PREFIX, STANDARD.encode(bytes)))
}

/// Decode any `data:image/...;base64,` URL.
pub fn decode_data_url(url: &str) -> Result<DynamicImage> {
    let payload = url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, data)| data)
        .ok_or_else(|| CertError::ImageLoadError("Not a base64 data URL".into()))?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| CertError::ImageLoadError(format!("Invalid base64: {}", e)))?;
    ::image::load_from_memory(&bytes)
        .map_err(|e| CertError::ImageLoadError(format!("Failed to decode image: {}", e)))
}

// ============================================================================
// Live Document
// ============================================================================

/// Interactive on-screen chrome that must not appear in captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Affordance {
    SignatureDragHandle,
    SignHint,
    PanToggle,
    ZoomControls,
}

/// The document as the user sees it: form data plus presentation state.
#[derive(Debug)]
pub struct LiveDocument {
    pub form: DocumentForm,
    pub viewport: ViewportTransform,
    pub paper: PaperSlot,
    placeholders: BTreeMap<FieldId, String>,
    affordances: BTreeMap<Affordance, bool>,
}

impl LiveDocument {
    pub fn new(config: &EditorConfig) -> Self {
        let slot = layout::SIGNATURE_SLOT;
        let placeholders = FieldId::ALL
            .iter()
            .map(|id| (*id, id.default_placeholder().to_string()))
            .collect();
        let affordances = [
            Affordance::SignatureDragHandle,
            Affordance::SignHint,
            Affordance::PanToggle,
            Affordance::ZoomControls,
        ]
        .into_iter()
        .map(|a| (a, true))
        .collect();

        Self {
            form: DocumentForm::default(),
            viewport: ViewportTransform::from_config(config),
            paper: PaperSlot::new(slot.width, slot.height, config.device_pixel_ratio),
            placeholders,
            affordances,
        }
    }

    /// Load form data, restoring the embedded signature if it decodes.
    pub fn load_form(&mut self, form: DocumentForm) {
        self.paper.clear();
        if let Some(url) = &form.signature_raster {
            match decode_data_url(url) {
                Ok(image) => self.paper.restore(image.to_rgba8()),
                Err(e) => warn!(error = %e, "Stored signature could not be decoded, ignoring"),
            }
        }
        self.form = form;
        debug!("Form loaded into live document");
    }

    /// Explicit user reset: clears fields and signature.
    pub fn reset(&mut self) {
        self.form.reset();
        self.paper.clear();
    }

    pub fn placeholder(&self, id: FieldId) -> Option<&str> {
        self.placeholders.get(&id).map(String::as_str)
    }

    pub fn set_placeholder(&mut self, id: FieldId, text: impl Into<String>) {
        self.placeholders.insert(id, text.into());
    }

    pub(crate) fn take_placeholder(&mut self, id: FieldId) -> Option<String> {
        self.placeholders
            .get_mut(&id)
            .map(std::mem::take)
    }

    /// Whether an affordance is mounted at all.
    pub fn has_affordance(&self, affordance: Affordance) -> bool {
        self.affordances.contains_key(&affordance)
    }

    pub fn affordance_visible(&self, affordance: Affordance) -> bool {
        self.affordances.get(&affordance).copied().unwrap_or(false)
    }

    /// Set visibility, returning the previous value, or `None` if the
    /// affordance is not mounted.
    pub(crate) fn set_affordance_visible(&mut self, affordance: Affordance, visible: bool) -> Option<bool> {
        self.affordances
            .get_mut(&affordance)
            .map(|v| std::mem::replace(v, visible))
    }

    pub fn unmount_affordance(&mut self, affordance: Affordance) {
        self.affordances.remove(&affordance);
    }

    /// The "tap to sign" hint is drawn only while the slot is empty.
    pub fn sign_hint_showing(&self) -> bool {
        self.paper.shows_sign_hint() && self.affordance_visible(Affordance::SignHint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::Rgba;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_form_json_is_camel_case() {
        let mut form = DocumentForm::default();
        form.site_name = "Site A".into();
        form.confirm_date_text = "2024년 5월 1일".into();
        let json = serde_json::to_value(&form).unwrap();
        assert_eq!(json["siteName"], "Site A");
        assert_eq!(json["confirmDateText"], "2024년 5월 1일");
        assert!(json["signatureRaster"].is_null());
    }

    #[test]
    fn test_missing_fields_default() {
        let form: DocumentForm = serde_json::from_str(r#"{"companyName":"ACME"}"#).unwrap();
        assert_eq!(form.company_name, "ACME");
        assert_eq!(form.field(FieldId::SiteName), "");
    }

    #[test]
    fn test_set_and_get_every_field() {
        let mut form = DocumentForm::default();
        for (i, id) in FieldId::ALL.iter().enumerate() {
            form.set_field(*id, format!("value {}", i));
        }
        for (i, id) in FieldId::ALL.iter().enumerate() {
            assert_eq!(form.field(*id), format!("value {}", i));
        }
        form.reset();
        assert!(form.is_blank());
    }

    #[test]
    fn test_data_url_round_trip() {
        let image = RgbaImage::from_pixel(3, 2, Rgba([0, 0, 0, 200]));
        let url = encode_png_data_url(&image).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        let decoded = decode_data_url(&url).unwrap().to_rgba8();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_bad_data_url_is_an_error() {
        assert!(decode_data_url("https://example.com/a.png").is_err());
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn test_load_form_restores_signature() {
        let config = EditorConfig::default();
        let mut doc = LiveDocument::new(&config);
        let mut form = DocumentForm::default();
        form.signature_raster = Some(encode_png_data_url(&RgbaImage::new(4, 4)).unwrap());
        doc.load_form(form);
        assert!(!doc.paper.shows_sign_hint());

        doc.reset();
        assert!(doc.paper.shows_sign_hint());
        assert!(doc.form.is_blank());
    }

    #[test]
    fn test_affordance_visibility() {
        let config = EditorConfig::default();
        let mut doc = LiveDocument::new(&config);
        assert!(doc.sign_hint_showing());
        assert_eq!(doc.set_affordance_visible(Affordance::SignHint, false), Some(true));
        assert!(!doc.sign_hint_showing());
        doc.unmount_affordance(Affordance::PanToggle);
        assert_eq!(doc.set_affordance_visible(Affordance::PanToggle, false), None);
    }
}
