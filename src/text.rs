// ============================================================================
// Static Text
// ============================================================================
//
// Draws field text straight into a raster with the field's own font
// metrics, so a captured page never depends on how an editable control
// places its caret or baseline.

use crate::error::{CertError, Result};
use crate::layout::{Align, Rect, TextStyle};
use ab_glyph::{point, Font, FontArc, PxScale, ScaleFont};
use ::image::{Rgba, RgbaImage};
use std::path::Path;
use tracing::debug;

pub struct TextRenderer {
    font: FontArc,
}

impl std::fmt::Debug for TextRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRenderer").finish_non_exhaustive()
    }
}

impl TextRenderer {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| CertError::FontError(format!("{}: {}", path.display(), e)))?;
        let renderer = Self::from_bytes(bytes)?;
        debug!(path = %path.display(), "Loaded capture font");
        Ok(renderer)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| CertError::FontError(format!("Invalid font data: {}", e)))?;
        Ok(Self { font })
    }

    /// Scale at which one em equals `font_size` pixels, as css sizes text.
    fn px_scale(&self, font_size: f32) -> PxScale {
        let units_per_em = self.font.units_per_em().unwrap_or(1000.0);
        PxScale::from(font_size * self.font.height_unscaled() / units_per_em)
    }

    pub fn measure(&self, text: &str, font_size: f32) -> f32 {
        let scaled = self.font.as_scaled(self.px_scale(font_size));
        let mut width = 0.0f32;
        let mut prev = None;
        for ch in text.chars() {
            let gid = self.font.glyph_id(ch);
            if let Some(prev_id) = prev {
                width += scaled.kern(prev_id, gid);
            }
            width += scaled.h_advance(gid);
            prev = Some(gid);
        }
        width
    }

    /// Draw `text` into `rect` (device pixels) with `style` scaled by `scale`.
    pub fn draw(&self, canvas: &mut RgbaImage, text: &str, rect: Rect, style: &TextStyle, scale: f32) {
        let font_size = style.font_size * scale;
        let line_height = style.line_height * scale;
        let lines = if style.wrap {
            wrap_lines(text, rect.width, |s| self.measure(s, font_size))
        } else {
            vec![text.lines().next().unwrap_or("").to_string()]
        };

        let px_scale = self.px_scale(font_size);
        let scaled = self.font.as_scaled(px_scale);
        let glyph_height = scaled.ascent() - scaled.descent();

        let mut top = if style.wrap {
            rect.y
        } else {
            rect.y + (rect.height - line_height) / 2.0
        };

        for line in lines {
            if style.wrap && top + line_height > rect.bottom() + 0.5 {
                break;
            }
            let baseline = top + (line_height - glyph_height) / 2.0 + scaled.ascent();
            let mut x = match style.align {
                Align::Left => rect.x,
                Align::Center => rect.x + (rect.width - self.measure(&line, font_size)) / 2.0,
            };

            let mut prev = None;
            for ch in line.chars() {
                let gid = self.font.glyph_id(ch);
                if let Some(prev_id) = prev {
                    x += scaled.kern(prev_id, gid);
                }
                let glyph = gid.with_scale_and_position(px_scale, point(x, baseline));
                if let Some(outlined) = self.font.outline_glyph(glyph) {
                    let bounds = outlined.px_bounds();
                    outlined.draw(|gx, gy, coverage| {
                        let px = bounds.min.x as i64 + gx as i64;
                        let py = bounds.min.y as i64 + gy as i64;
                        blend_ink(canvas, px, py, style.ink, coverage);
                    });
                }
                x += scaled.h_advance(gid);
                prev = Some(gid);
            }
            top += line_height;
        }
    }
}

fn blend_ink(canvas: &mut RgbaImage, x: i64, y: i64, ink: u8, coverage: f32) {
    if x < 0 || y < 0 || x >= canvas.width() as i64 || y >= canvas.height() as i64 {
        return;
    }
    let a = coverage.clamp(0.0, 1.0);
    let Rgba([r, g, b, alpha]) = *canvas.get_pixel(x as u32, y as u32);
    let mix = |c: u8| (c as f32 * (1.0 - a) + ink as f32 * a).round() as u8;
    let out_alpha = (alpha as f32 + (255.0 - alpha as f32) * a).round() as u8;
    canvas.put_pixel(x as u32, y as u32, Rgba([mix(r), mix(g), mix(b), out_alpha]));
}

/// Greedy wrap honouring explicit newlines. Breaks at spaces when a line has
/// one, otherwise between characters (Hangul runs rarely contain spaces).
pub fn wrap_lines(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut out = Vec::new();
    for paragraph in text.split('\n') {
        let paragraph = paragraph.trim_end_matches('\r');
        if paragraph.is_empty() {
            out.push(String::new());
            continue;
        }
        let mut line = String::new();
        for ch in paragraph.chars() {
            let mut candidate = line.clone();
            candidate.push(ch);
            if line.is_empty() || measure(&candidate) <= max_width {
                line = candidate;
                continue;
            }
            match line.rfind(' ') {
                Some(split) if split > 0 && !ch.is_whitespace() => {
                    let rest = line[split + 1..].to_string();
                    out.push(line[..split].to_string());
                    line = rest;
                    line.push(ch);
                }
                _ => {
                    out.push(std::mem::take(&mut line));
                    if !ch.is_whitespace() {
                        line.push(ch);
                    }
                }
            }
        }
        out.push(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ten_per_char(s: &str) -> f32 {
        s.chars().count() as f32 * 10.0
    }

    #[test]
    fn test_wrap_breaks_at_spaces() {
        let lines = wrap_lines("alpha beta gamma", 100.0, ten_per_char);
        assert_eq!(lines, vec!["alpha beta", "gamma"]);
    }

    #[test]
    fn test_wrap_breaks_hangul_between_chars() {
        let lines = wrap_lines("가나다라마바사", 30.0, ten_per_char);
        assert_eq!(lines, vec!["가나다", "라마바", "사"]);
    }

    #[test]
    fn test_wrap_keeps_explicit_newlines() {
        let lines = wrap_lines("one\n\ntwo", 100.0, ten_per_char);
        assert_eq!(lines, vec!["one", "", "two"]);
    }

    #[test]
    fn test_invalid_font_bytes() {
        let result = TextRenderer::from_bytes(b"not a font".to_vec());
        assert!(matches!(result, Err(CertError::FontError(_))));
    }

    #[test]
    fn test_blend_ink_ignores_out_of_bounds() {
        let mut canvas = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]));
        blend_ink(&mut canvas, -1, 0, 0, 1.0);
        blend_ink(&mut canvas, 5, 5, 0, 1.0);
        blend_ink(&mut canvas, 1, 1, 0, 1.0);
        assert_eq!(*canvas.get_pixel(1, 1), Rgba([0, 0, 0, 255]));
        assert_eq!(*canvas.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
    }
}
