use image::{GrayImage, Luma};
use log::{debug, warn};

use super::font::{Typeface, GLYPH_UNITS};

/// Upper bound on auto-fit refinement passes.
pub const FIT_ITERATIONS: usize = 7;
/// Fraction of the grid the text block may occupy on either axis.
pub const FIT_MARGIN: f32 = 0.9;
/// Auto-fit stops once the block is at most this much oversized.
pub const FIT_TOLERANCE: f32 = 0.995;
/// Coverage a cell must exceed to join the mask (about a quarter of full).
pub const MASK_ALPHA_THRESHOLD: u8 = 64;
/// Highlight used when the requested text has nothing to draw.
pub const FALLBACK_TEXT: &str = "*";

const LINE_ADVANCE_UNITS: f32 = GLYPH_UNITS as f32;
const SUPERSAMPLE: usize = 4;

/// Cells covered by the rasterized highlight text, with a per-column index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HighlightMask {
    cols: usize,
    rows: usize,
    cells: Vec<bool>,
    by_column: Vec<Vec<usize>>,
}

impl HighlightMask {
    pub fn empty(cols: usize, rows: usize) -> Self {
        Self::from_cells(cols, rows, vec![false; cols * rows])
    }

    pub fn from_cells(cols: usize, rows: usize, cells: Vec<bool>) -> Self {
        assert_eq!(cols * rows, cells.len());
        let mut by_column = vec![Vec::new(); cols];
        for row in 0..rows {
            for (col, column) in by_column.iter_mut().enumerate() {
                let idx = row * cols + col;
                if cells[idx] {
                    column.push(idx);
                }
            }
        }
        Self { cols, rows, cells, by_column }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn contains(&self, idx: usize) -> bool {
        self.cells.get(idx).copied().unwrap_or(false)
    }

    /// Highlighted cell indices in `col`, top to bottom.
    pub fn column(&self, col: usize) -> &[usize] {
        self.by_column.get(col).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    pub fn count(&self) -> usize {
        self.by_column.iter().map(Vec::len).sum()
    }
}

/// Splits on real newlines as well as the two-character `\n` escape.
/// Empty lines become a single space so they still take up a line.
pub fn split_lines(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .replace("\\n", "\n")
        .split('\n')
        .map(|line| if line.is_empty() { " ".to_owned() } else { line.to_owned() })
        .collect()
}

#[derive(Clone, Copy, Debug)]
struct PlacedGlyph {
    ch: char,
    x: f32,
    y: f32,
}

/// Ink extents in font units.
#[derive(Clone, Copy, Debug)]
struct UnitBox {
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

impl UnitBox {
    fn union(self, other: UnitBox) -> UnitBox {
        UnitBox {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    fn width(&self) -> f32 {
        self.right - self.left
    }

    fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// Text laid out in font units: every line centered on x = 0.
struct BlockLayout {
    glyphs: Vec<PlacedGlyph>,
    ink: UnitBox,
}

impl BlockLayout {
    fn new(lines: &[String], typeface: &impl Typeface) -> Option<Self> {
        let mut glyphs = Vec::new();
        let mut block_ink: Option<UnitBox> = None;

        for (line_idx, line) in lines.iter().enumerate() {
            let y = line_idx as f32 * LINE_ADVANCE_UNITS;
            let start = glyphs.len();
            let mut line_ink: Option<UnitBox> = None;

            for (k, ch) in line.chars().enumerate() {
                let x = (k * GLYPH_UNITS) as f32;
                glyphs.push(PlacedGlyph { ch, x, y });
                if let Some(ink) = typeface.ink_box(ch) {
                    let glyph_ink = UnitBox {
                        left: x + ink.left as f32,
                        top: y + ink.top as f32,
                        right: x + ink.right as f32,
                        bottom: y + ink.bottom as f32,
                    };
                    line_ink = Some(line_ink.map_or(glyph_ink, |acc| acc.union(glyph_ink)));
                }
            }

            let Some(mut ink) = line_ink else {
                continue;
            };
            let shift = -(ink.left + ink.right) / 2.0;
            for glyph in &mut glyphs[start..] {
                glyph.x += shift;
            }
            ink.left += shift;
            ink.right += shift;
            block_ink = Some(block_ink.map_or(ink, |acc| acc.union(ink)));
        }

        block_ink.map(|ink| Self { glyphs, ink })
    }

    /// Pixel size of the inked block at `font_size` px per em.
    fn measure(&self, font_size: f32) -> (f32, f32) {
        let unit = font_size / GLYPH_UNITS as f32;
        (self.ink.width() * unit, self.ink.height() * unit)
    }

    fn fit(&self, cols: usize, rows: usize) -> f32 {
        let target_width = cols as f32 * FIT_MARGIN;
        let target_height = rows as f32 * FIT_MARGIN;
        let mut font_size = cols.min(rows) as f32;

        for _ in 0..FIT_ITERATIONS {
            let (width, height) = self.measure(font_size);
            let scale = (target_width / width).min(target_height / height);
            if !scale.is_finite() || scale >= FIT_TOLERANCE {
                break;
            }
            font_size *= scale;
        }

        font_size
    }
}

/// Draws `text` into a `cols × rows` coverage image, one pixel per cell,
/// auto-fitted and centered.
pub fn coverage(text: &str, cols: usize, rows: usize, typeface: &impl Typeface) -> GrayImage {
    let mut image = GrayImage::new(cols as u32, rows as u32);

    let text = if text.trim().is_empty() {
        warn!("highlight text is blank, using fallback");
        FALLBACK_TEXT
    } else {
        text
    };
    let lines = split_lines(text);
    let Some(layout) = BlockLayout::new(&lines, typeface) else {
        return image;
    };

    let font_size = layout.fit(cols, rows);
    let unit = font_size / GLYPH_UNITS as f32;
    let (block_width, block_height) = layout.measure(font_size);
    let origin_x = (cols as f32 - block_width) / 2.0 - layout.ink.left * unit;
    let origin_y = (rows as f32 - block_height) / 2.0 - layout.ink.top * unit;
    let glyph_px = GLYPH_UNITS as f32 * unit;
    let samples = (SUPERSAMPLE * SUPERSAMPLE) as u32;

    for glyph in &layout.glyphs {
        if typeface.ink_box(glyph.ch).is_none() {
            continue;
        }
        let x0 = origin_x + glyph.x * unit;
        let y0 = origin_y + glyph.y * unit;
        let px_start = x0.floor().max(0.0) as usize;
        let px_end = ((x0 + glyph_px).ceil().max(0.0) as usize).min(cols);
        let py_start = y0.floor().max(0.0) as usize;
        let py_end = ((y0 + glyph_px).ceil().max(0.0) as usize).min(rows);

        for py in py_start..py_end {
            for px in px_start..px_end {
                let mut hits = 0;
                for sy in 0..SUPERSAMPLE {
                    let fy = py as f32 + (sy as f32 + 0.5) / SUPERSAMPLE as f32;
                    let uy = (fy - y0) / unit;
                    if uy < 0.0 {
                        continue;
                    }
                    for sx in 0..SUPERSAMPLE {
                        let fx = px as f32 + (sx as f32 + 0.5) / SUPERSAMPLE as f32;
                        let ux = (fx - x0) / unit;
                        if ux >= 0.0 && typeface.is_inked(glyph.ch, ux as usize, uy as usize) {
                            hits += 1;
                        }
                    }
                }

                let alpha = ((hits * 255) as f32 / samples as f32).round() as u8;
                let pixel = image.get_pixel_mut(px as u32, py as u32);
                pixel.0[0] = pixel.0[0].max(alpha);
            }
        }
    }

    image
}

/// Turns `text` into a highlight mask for a `cols × rows` grid.
pub fn rasterize(text: &str, cols: usize, rows: usize, typeface: &impl Typeface) -> HighlightMask {
    let image = coverage(text, cols, rows, typeface);
    let cells = image.pixels().map(|&Luma([alpha])| alpha > MASK_ALPHA_THRESHOLD).collect();
    let mask = HighlightMask::from_cells(cols, rows, cells);
    debug!("rasterized highlight into {}x{} grid: {} cells", cols, rows, mask.count());
    mask
}
