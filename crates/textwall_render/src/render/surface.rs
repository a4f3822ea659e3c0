use super::canvas::GlyphGrid;

/// Color encoded as RGB bytes.
pub type Rgb = [u8; 3];

pub const BLACK: Rgb = [0, 0, 0];

/// How a glyph is drawn. Surfaces are free to approximate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GlyphStyle {
    #[default]
    Regular,
    /// Distinct face for the highlight overlay.
    Serif,
    /// Soft halo bleeding past the glyph.
    Glow,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphPaint {
    pub ch: char,
    pub color: Rgb,
    /// Opacity in [0, 1].
    pub alpha: f32,
    pub style: GlyphStyle,
}

/// Drawing target addressed in cells.
///
/// Surfaces keep their contents between frames; the compositor relies on that
/// to repaint only what changed.
pub trait Surface {
    /// `(cols, rows)`.
    fn dimensions(&self) -> (usize, usize);

    /// Reallocates for a new grid size. Contents are unspecified afterwards.
    fn resize(&mut self, cols: usize, rows: usize);

    fn clear_cell(&mut self, col: usize, row: usize, background: Rgb);

    /// Composites a glyph over whatever the cell holds.
    fn draw_glyph(&mut self, col: usize, row: usize, paint: &GlyphPaint);

    /// Copies a prepared layer onto the surface, replacing every cell.
    fn blit(&mut self, layer: &GlyphGrid) {
        let (cols, rows) = self.dimensions();
        for row in 0..rows.min(layer.rows) {
            for col in 0..cols.min(layer.cols) {
                let cell = layer.cell(col, row);
                self.clear_cell(col, row, cell.bg.unwrap_or(BLACK));
                if cell.ch != ' ' {
                    let paint = GlyphPaint { ch: cell.ch, color: cell.fg, alpha: 1.0, style: cell.style };
                    self.draw_glyph(col, row, &paint);
                }
            }
        }
    }
}

/// Linear blend from `from` towards `to`.
pub fn mix(from: Rgb, to: Rgb, t: f32) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    let channel = |a: u8, b: u8| (f32::from(a) + (f32::from(b) - f32::from(a)) * t).round() as u8;
    [channel(from[0], to[0]), channel(from[1], to[1]), channel(from[2], to[2])]
}

/// Parses `#rrggbb` or `rrggbb`.
pub fn parse_hex(text: &str) -> Option<Rgb> {
    let hex = text.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}

pub fn to_hex(color: Rgb) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}
