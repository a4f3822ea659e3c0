use std::path::Path;

use image::{Rgba, RgbaImage};

use super::surface::{mix, GlyphPaint, GlyphStyle, Rgb, Surface};
use crate::wall::font::{BitmapFont, Typeface, GLYPH_UNITS};
use crate::TextWallError;

const HALO_STRENGTH: f32 = 0.35;
const SUPERSAMPLE: u32 = 2;

/// Raster surface drawing every cell as a `cell_px` square through a typeface.
pub struct PixelCanvas<T: Typeface = BitmapFont> {
    cols: usize,
    rows: usize,
    cell_px: u32,
    image: RgbaImage,
    typeface: T,
}

impl PixelCanvas<BitmapFont> {
    pub fn new(cols: usize, rows: usize, cell_px: u32) -> Self {
        Self::with_typeface(cols, rows, cell_px, BitmapFont)
    }
}

impl<T: Typeface> PixelCanvas<T> {
    pub fn with_typeface(cols: usize, rows: usize, cell_px: u32, typeface: T) -> Self {
        let cell_px = cell_px.max(1);
        Self {
            cols,
            rows,
            cell_px,
            image: RgbaImage::from_pixel(cols as u32 * cell_px, rows as u32 * cell_px, Rgba([0, 0, 0, 255])),
            typeface,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<(), TextWallError> {
        self.image.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }

    /// Fraction of the sub-samples of pixel (`px`, `py`) in the cell that hit ink.
    fn coverage(&self, ch: char, px: u32, py: u32, style: GlyphStyle) -> f32 {
        let unit = self.cell_px as f32 / GLYPH_UNITS as f32;
        let mut hits = 0;
        for sy in 0..SUPERSAMPLE {
            for sx in 0..SUPERSAMPLE {
                let fx = (px as f32 + (sx as f32 + 0.5) / SUPERSAMPLE as f32) / unit;
                let fy = (py as f32 + (sy as f32 + 0.5) / SUPERSAMPLE as f32) / unit;
                let (ux, uy) = (fx as usize, fy as usize);
                let inked = self.typeface.is_inked(ch, ux, uy)
                    || (style == GlyphStyle::Serif && ux > 0 && self.typeface.is_inked(ch, ux - 1, uy));
                if inked {
                    hits += 1;
                }
            }
        }
        hits as f32 / (SUPERSAMPLE * SUPERSAMPLE) as f32
    }

    fn halo(&self, ch: char, px: u32, py: u32) -> bool {
        let unit = self.cell_px as f32 / GLYPH_UNITS as f32;
        let ux = ((px as f32 + 0.5) / unit) as isize;
        let uy = ((py as f32 + 0.5) / unit) as isize;
        (-1..=1).any(|dy| {
            (-1..=1).any(|dx| {
                let (x, y) = (ux + dx, uy + dy);
                x >= 0 && y >= 0 && self.typeface.is_inked(ch, x as usize, y as usize)
            })
        })
    }

    fn blend(&mut self, x: u32, y: u32, color: Rgb, alpha: f32) {
        if alpha <= 0.0 {
            return;
        }
        let pixel = self.image.get_pixel_mut(x, y);
        let [r, g, b] = mix([pixel.0[0], pixel.0[1], pixel.0[2]], color, alpha);
        *pixel = Rgba([r, g, b, 255]);
    }
}

impl<T: Typeface> Surface for PixelCanvas<T> {
    fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    fn resize(&mut self, cols: usize, rows: usize) {
        self.cols = cols;
        self.rows = rows;
        self.image = RgbaImage::from_pixel(
            cols as u32 * self.cell_px,
            rows as u32 * self.cell_px,
            Rgba([0, 0, 0, 255]),
        );
    }

    fn clear_cell(&mut self, col: usize, row: usize, background: Rgb) {
        let (x0, y0) = (col as u32 * self.cell_px, row as u32 * self.cell_px);
        let [r, g, b] = background;
        for y in y0..y0 + self.cell_px {
            for x in x0..x0 + self.cell_px {
                self.image.put_pixel(x, y, Rgba([r, g, b, 255]));
            }
        }
    }

    fn draw_glyph(&mut self, col: usize, row: usize, paint: &GlyphPaint) {
        let (x0, y0) = (col as u32 * self.cell_px, row as u32 * self.cell_px);
        for py in 0..self.cell_px {
            for px in 0..self.cell_px {
                let mut alpha = self.coverage(paint.ch, px, py, paint.style) * paint.alpha;
                if paint.style == GlyphStyle::Glow && self.halo(paint.ch, px, py) {
                    alpha = alpha.max(paint.alpha * HALO_STRENGTH);
                }
                self.blend(x0 + px, y0 + py, paint.color, alpha);
            }
        }
    }
}
