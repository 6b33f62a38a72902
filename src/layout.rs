// ============================================================================
// Page Layout
// ============================================================================
//
// Fixed geometry of the certificate page in css pixels. The live editor and
// the capture projection both read these, so a field's text metrics are the
// same whether it is being edited or exported.

use crate::config::{DOCUMENT_HEIGHT, DOCUMENT_WIDTH};
use crate::document::FieldId;

pub const TITLE: &str = "작업완료확인서";
pub const STATEMENT: &str = "상기 작업을 완료하였음을 확인합니다.";
pub const SIGN_HINT: &str = "터치하여 서명";
pub const SIGNATURE_SUFFIX: &str = "(서명)";
pub const RECIPIENT_SUFFIX: &str = "귀하";

const MARGIN: f32 = 60.0;
const LABEL_COL_WIDTH: f32 = 150.0;
const CELL_PADDING: f32 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn inset(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(
            self.x + dx,
            self.y + dy,
            (self.width - 2.0 * dx).max(0.0),
            (self.height - 2.0 * dy).max(0.0),
        )
    }

    pub fn scaled(&self, factor: f32) -> Rect {
        Rect::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

/// Computed font metrics of a text field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font_size: f32,
    pub line_height: f32,
    pub align: Align,
    /// Grey level of the ink (0 = black).
    pub ink: u8,
    pub wrap: bool,
}

impl TextStyle {
    fn single(font_size: f32, align: Align) -> Self {
        Self {
            font_size,
            line_height: font_size * 1.4,
            align,
            ink: 0,
            wrap: false,
        }
    }

    fn multi(font_size: f32) -> Self {
        Self {
            font_size,
            line_height: font_size * 1.6,
            align: Align::Left,
            ink: 0,
            wrap: true,
        }
    }

    pub fn placeholder(self) -> Self {
        Self { ink: 160, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldLayout {
    pub label: Option<&'static str>,
    /// Whole table row, including the label cell. `None` for free fields.
    pub row: Option<Rect>,
    /// Where the field's text is drawn.
    pub text: Rect,
    pub style: TextStyle,
}

pub const PAGE: Rect = Rect::new(0.0, 0.0, DOCUMENT_WIDTH, DOCUMENT_HEIGHT);
pub const TITLE_RECT: Rect = Rect::new(MARGIN, 60.0, DOCUMENT_WIDTH - 2.0 * MARGIN, 60.0);
pub const TITLE_STYLE: TextStyle = TextStyle {
    font_size: 34.0,
    line_height: 48.0,
    align: Align::Center,
    ink: 0,
    wrap: false,
};
pub const STATEMENT_RECT: Rect = Rect::new(MARGIN, 770.0, DOCUMENT_WIDTH - 2.0 * MARGIN, 36.0);
pub const STATEMENT_STYLE: TextStyle = TextStyle {
    font_size: 18.0,
    line_height: 25.0,
    align: Align::Center,
    ink: 0,
    wrap: false,
};
pub const SIGNER_LABEL_RECT: Rect = Rect::new(360.0, 900.0, 80.0, 40.0);
pub const SIGNATURE_SUFFIX_RECT: Rect = Rect::new(740.0, 900.0, 60.0, 40.0);
pub const LABEL_STYLE: TextStyle = TextStyle {
    font_size: 17.0,
    line_height: 24.0,
    align: Align::Left,
    ink: 0,
    wrap: false,
};

/// The fixed region reserved for the signature.
pub const SIGNATURE_SLOT: Rect = Rect::new(580.0, 880.0, 160.0, 80.0);

fn table_row(y: f32, height: f32) -> Rect {
    Rect::new(MARGIN, y, DOCUMENT_WIDTH - 2.0 * MARGIN, height)
}

fn value_cell(row: Rect) -> Rect {
    Rect::new(
        row.x + LABEL_COL_WIDTH + CELL_PADDING,
        row.y + CELL_PADDING,
        row.width - LABEL_COL_WIDTH - 2.0 * CELL_PADDING,
        row.height - 2.0 * CELL_PADDING,
    )
}

pub fn field_layout(id: FieldId) -> FieldLayout {
    match id {
        FieldId::SiteName => table_field("현장명", table_row(160.0, 52.0), TextStyle::single(17.0, Align::Left)),
        FieldId::CompanyName => table_field("업체명", table_row(212.0, 52.0), TextStyle::single(17.0, Align::Left)),
        FieldId::WorkPeriod => table_field("작업기간", table_row(264.0, 52.0), TextStyle::single(17.0, Align::Left)),
        FieldId::WorkContent => table_field("작업내용", table_row(316.0, 260.0), TextStyle::multi(16.0)),
        FieldId::Notes => table_field("특이사항", table_row(576.0, 160.0), TextStyle::multi(16.0)),
        FieldId::ConfirmDateText => FieldLayout {
            label: None,
            row: None,
            text: Rect::new(MARGIN, 826.0, DOCUMENT_WIDTH - 2.0 * MARGIN, 40.0),
            style: TextStyle::single(20.0, Align::Center),
        },
        FieldId::SignerName => FieldLayout {
            label: None,
            row: None,
            text: Rect::new(440.0, 900.0, 140.0, 40.0),
            style: TextStyle::single(18.0, Align::Center),
        },
        FieldId::Recipient => FieldLayout {
            label: None,
            row: None,
            text: Rect::new(MARGIN, 1040.0, 480.0, 48.0),
            style: TextStyle::single(26.0, Align::Left),
        },
    }
}

fn table_field(label: &'static str, row: Rect, style: TextStyle) -> FieldLayout {
    FieldLayout {
        label: Some(label),
        row: Some(row),
        text: value_cell(row),
        style,
    }
}

/// Label cell of a table row.
pub fn label_cell(row: &Rect) -> Rect {
    Rect::new(row.x + CELL_PADDING, row.y + CELL_PADDING, LABEL_COL_WIDTH - 2.0 * CELL_PADDING, row.height - 2.0 * CELL_PADDING)
}

/// x offset of the label/value divider in a table row.
pub fn divider_x(row: &Rect) -> f32 {
    row.x + LABEL_COL_WIDTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_stay_on_page() {
        for id in FieldId::ALL {
            let layout = field_layout(id);
            assert!(layout.text.x >= 0.0 && layout.text.right() <= PAGE.width, "{:?}", id);
            assert!(layout.text.y >= 0.0 && layout.text.bottom() <= PAGE.height, "{:?}", id);
            assert!(layout.text.height >= layout.style.font_size, "{:?}", id);
        }
        assert!(SIGNATURE_SLOT.right() <= PAGE.width);
    }

    #[test]
    fn test_table_rows_do_not_overlap() {
        let rows: Vec<Rect> = FieldId::ALL
            .iter()
            .filter_map(|id| field_layout(*id).row)
            .collect();
        for pair in rows.windows(2) {
            assert!(pair[0].bottom() <= pair[1].y);
        }
    }

    #[test]
    fn test_rect_helpers() {
        let r = Rect::new(10.0, 20.0, 100.0, 50.0);
        assert_eq!(r.inset(5.0, 5.0), Rect::new(15.0, 25.0, 90.0, 40.0));
        assert_eq!(r.scaled(2.0), Rect::new(20.0, 40.0, 200.0, 100.0));
        assert!(r.contains(10.0, 20.0));
        assert!(!r.contains(110.0, 20.0));
    }
}
