// ============================================================================
// Document Snapshot
// ============================================================================
//
// Captures render a read-only projection of the document: every field is a
// static text node built from `DocumentForm`, never from an editable control.

use crate::document::{Affordance, FieldId, FieldKind, LiveDocument};
use crate::layout::{self, Rect, TextStyle};
use crate::text::TextRenderer;
use crate::viewport::Transform;
use ::image::imageops::{self, FilterType};
use ::image::{Rgba, RgbaImage};
use tracing::{debug, warn};

/// Pixel density of captured rasters relative to css pixels.
pub const CAPTURE_DENSITY: f32 = 2.0;

const RULE_WIDTH: f32 = 1.5;
const RULE_COLOR: [u8; 3] = [0, 0, 0];
const HANDLE_COLOR: [u8; 3] = [37, 99, 235];
const HINT_INK: u8 = 150;

#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    /// The form field this node stands in for; `None` for fixed page text.
    pub field: Option<FieldId>,
    pub text: String,
    pub rect: Rect,
    pub style: TextStyle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub rect: Rect,
    pub color: [u8; 3],
}

#[derive(Debug, Clone)]
pub struct DocumentProjection {
    pub text_nodes: Vec<TextNode>,
    pub fills: Vec<Fill>,
    pub signature: Option<RgbaImage>,
    pub transform: Transform,
}

impl DocumentProjection {
    pub fn field_node(&self, id: FieldId) -> Option<&TextNode> {
        self.text_nodes.iter().find(|n| n.field == Some(id))
    }
}

/// Build the static projection of `doc` as it currently presents.
pub fn project(doc: &LiveDocument) -> DocumentProjection {
    let mut text_nodes = vec![TextNode {
        field: None,
        text: layout::TITLE.to_string(),
        rect: layout::TITLE_RECT,
        style: layout::TITLE_STYLE,
    }];
    let mut fills = Vec::new();

    for id in FieldId::ALL {
        let field = layout::field_layout(id);
        if let (Some(label), Some(row)) = (field.label, field.row) {
            text_nodes.push(TextNode {
                field: None,
                text: label.to_string(),
                rect: layout::label_cell(&row),
                style: layout::LABEL_STYLE,
            });
            outline(&mut fills, row, RULE_COLOR);
            let divider = layout::divider_x(&row);
            fills.push(Fill {
                rect: Rect::new(divider - RULE_WIDTH / 2.0, row.y, RULE_WIDTH, row.height),
                color: RULE_COLOR,
            });
        }

        let value = doc.form.field(id);
        if !value.is_empty() {
            let text = match id.kind() {
                FieldKind::Recipient => format!("{} {}", value, layout::RECIPIENT_SUFFIX),
                _ => value.to_string(),
            };
            text_nodes.push(TextNode {
                field: Some(id),
                text,
                rect: field.text,
                style: field.style,
            });
        } else if let Some(placeholder) = doc.placeholder(id).filter(|p| !p.is_empty()) {
            text_nodes.push(TextNode {
                field: Some(id),
                text: placeholder.to_string(),
                rect: field.text,
                style: field.style.placeholder(),
            });
        }
    }

    text_nodes.push(TextNode {
        field: None,
        text: layout::STATEMENT.to_string(),
        rect: layout::STATEMENT_RECT,
        style: layout::STATEMENT_STYLE,
    });
    text_nodes.push(TextNode {
        field: None,
        text: "확인자".to_string(),
        rect: layout::SIGNER_LABEL_RECT,
        style: layout::LABEL_STYLE,
    });
    text_nodes.push(TextNode {
        field: None,
        text: layout::SIGNATURE_SUFFIX.to_string(),
        rect: layout::SIGNATURE_SUFFIX_RECT,
        style: layout::LABEL_STYLE,
    });

    if doc.sign_hint_showing() {
        text_nodes.push(TextNode {
            field: None,
            text: layout::SIGN_HINT.to_string(),
            rect: layout::SIGNATURE_SLOT,
            style: TextStyle {
                ink: HINT_INK,
                align: layout::Align::Center,
                ..layout::LABEL_STYLE
            },
        });
    }

    let signature = doc.paper.placed().map(|_| doc.paper.render());
    if signature.is_some() && doc.affordance_visible(Affordance::SignatureDragHandle) {
        outline(&mut fills, layout::SIGNATURE_SLOT, HANDLE_COLOR);
    }

    DocumentProjection {
        text_nodes,
        fills,
        signature,
        transform: doc.viewport.transform(),
    }
}

fn outline(fills: &mut Vec<Fill>, r: Rect, color: [u8; 3]) {
    let w = RULE_WIDTH;
    fills.push(Fill { rect: Rect::new(r.x, r.y, r.width, w), color });
    fills.push(Fill { rect: Rect::new(r.x, r.bottom() - w, r.width, w), color });
    fills.push(Fill { rect: Rect::new(r.x, r.y, w, r.height), color });
    fills.push(Fill { rect: Rect::new(r.right() - w, r.y, w, r.height), color });
}

/// Render the projection of `doc` on a white page at `density` x css pixels.
///
/// The current viewport transform is honoured, so an unfrozen viewport
/// yields an off-canonical image; capture freezes it first.
pub fn snapshot_to_raster(doc: &LiveDocument, text: Option<&TextRenderer>, density: f32) -> RgbaImage {
    let projection = project(doc);
    render(&projection, text, density)
}

pub fn render(projection: &DocumentProjection, text: Option<&TextRenderer>, density: f32) -> RgbaImage {
    let page = layout::PAGE.scaled(density);
    let mut canvas = RgbaImage::from_pixel(
        page.width.round().max(1.0) as u32,
        page.height.round().max(1.0) as u32,
        Rgba([255, 255, 255, 255]),
    );

    let t = projection.transform;
    let to_device = |r: Rect| -> Rect {
        let (x, y) = t.apply(r.x, r.y);
        Rect::new(x * density, y * density, r.width * t.zoom * density, r.height * t.zoom * density)
    };
    let scale = t.zoom * density;

    for fill in &projection.fills {
        fill_rect(&mut canvas, to_device(fill.rect), fill.color);
    }

    match text {
        Some(renderer) => {
            for node in &projection.text_nodes {
                renderer.draw(&mut canvas, &node.text, to_device(node.rect), &node.style, scale);
            }
        }
        None => warn!(
            nodes = projection.text_nodes.len(),
            "No capture font available, text omitted from snapshot"
        ),
    }

    if let Some(signature) = &projection.signature {
        let slot = to_device(layout::SIGNATURE_SLOT);
        let w = slot.width.round().max(1.0) as u32;
        let h = slot.height.round().max(1.0) as u32;
        let scaled = imageops::resize(signature, w, h, FilterType::Triangle);
        imageops::overlay(&mut canvas, &scaled, slot.x.round() as i64, slot.y.round() as i64);
    }

    debug!(
        width = canvas.width(),
        height = canvas.height(),
        "Rendered document snapshot"
    );
    canvas
}

fn fill_rect(canvas: &mut RgbaImage, rect: Rect, color: [u8; 3]) {
    let x0 = rect.x.round().max(0.0) as u32;
    let y0 = rect.y.round().max(0.0) as u32;
    let x1 = (rect.right().round().max(0.0) as u32).min(canvas.width());
    let y1 = (rect.bottom().round().max(0.0) as u32).min(canvas.height());
    for y in y0..y1 {
        for x in x0..x1 {
            canvas.put_pixel(x, y, Rgba([color[0], color[1], color[2], 255]));
        }
    }
}
