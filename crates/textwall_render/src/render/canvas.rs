use std::fmt::Write;

use super::surface::{mix, GlyphPaint, GlyphStyle, Rgb, Surface, BLACK};

/// Share of a glow's color that bleeds into the cell background.
const GLOW_BLEED: f32 = 0.25;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellGlyph {
    pub ch: char,
    /// Foreground color encoded as RGB bytes.
    pub fg: Rgb,
    /// Background color; `None` until the cell is first cleared.
    pub bg: Option<Rgb>,
    pub style: GlyphStyle,
}

impl CellGlyph {
    pub fn blank(bg: Rgb) -> Self {
        Self { ch: ' ', fg: bg, bg: Some(bg), style: GlyphStyle::Regular }
    }
}

impl Default for CellGlyph {
    fn default() -> Self {
        Self { ch: ' ', fg: BLACK, bg: None, style: GlyphStyle::Regular }
    }
}

/// A surface holding one resolved glyph per cell, suitable for terminals and
/// as the buffered base layer.
#[derive(Clone, Debug, PartialEq)]
pub struct GlyphGrid {
    pub cols: usize,
    pub rows: usize,
    pub cells: Vec<CellGlyph>,
}

impl GlyphGrid {
    pub fn new(cols: usize, rows: usize, cells: Vec<CellGlyph>) -> Self {
        assert_eq!(cols * rows, cells.len());
        Self { cols, rows, cells }
    }

    pub fn blank(cols: usize, rows: usize) -> Self {
        Self::new(cols, rows, vec![CellGlyph::default(); cols * rows])
    }

    pub fn cell(&self, col: usize, row: usize) -> &CellGlyph {
        &self.cells[row * self.cols + col]
    }

    pub fn rows(&self) -> impl Iterator<Item = String> + '_ {
        self.cells.chunks(self.cols.max(1)).map(|row| row.iter().map(|cell| cell.ch).collect::<String>())
    }

    /// Rows with 24-bit color escapes, each terminated by a reset.
    pub fn ansi_rows(&self) -> impl Iterator<Item = String> + '_ {
        self.cells.chunks(self.cols.max(1)).map(|row| {
            let mut line = String::with_capacity(row.len() * 24);
            for cell in row {
                let [fr, fg, fb] = cell.fg;
                let [br, bg, bb] = cell.bg.unwrap_or(BLACK);
                let bold = if cell.style == GlyphStyle::Serif { "1;" } else { "" };
                let _ = write!(line, "\x1b[{bold}38;2;{fr};{fg};{fb};48;2;{br};{bg};{bb}m{}", cell.ch);
                if !bold.is_empty() {
                    line.push_str("\x1b[22m");
                }
            }
            line.push_str("\x1b[0m");
            line
        })
    }
}

impl Surface for GlyphGrid {
    fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    fn resize(&mut self, cols: usize, rows: usize) {
        *self = GlyphGrid::blank(cols, rows);
    }

    fn clear_cell(&mut self, col: usize, row: usize, background: Rgb) {
        let cols = self.cols;
        self.cells[row * cols + col] = CellGlyph::blank(background);
    }

    fn draw_glyph(&mut self, col: usize, row: usize, paint: &GlyphPaint) {
        let cols = self.cols;
        let cell = &mut self.cells[row * cols + col];
        let bg = cell.bg.unwrap_or(BLACK);
        // A different character starts from the bare background.
        let under = if cell.ch == paint.ch { cell.fg } else { bg };

        cell.ch = paint.ch;
        cell.fg = mix(under, paint.color, paint.alpha);
        cell.style = paint.style;
        if paint.style == GlyphStyle::Glow {
            cell.bg = Some(mix(bg, paint.color, paint.alpha * GLOW_BLEED));
        }
    }

    fn blit(&mut self, layer: &GlyphGrid) {
        if (self.cols, self.rows) == (layer.cols, layer.rows) {
            self.cells.copy_from_slice(&layer.cells);
        } else {
            *self = layer.clone();
        }
    }
}
