use std::f32::consts::TAU;

use rand::Rng;

use super::charset::Fill;
use super::mask::HighlightMask;

/// Smallest cell edge in pixels.
pub const MIN_CELL_SIZE: f32 = 8.0;

const TWINKLE_SPEED_RANGE: std::ops::Range<f32> = 0.6..2.4;

/// Cell layout derived from the viewport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    pub cols: usize,
    pub rows: usize,
    /// Cell edge in pixels.
    pub cell_size: f32,
}

impl Geometry {
    /// Covers the viewport with whole cells; partial cells at the right and
    /// bottom edges count. Never yields an empty grid.
    pub fn derive(viewport_width: f32, viewport_height: f32, cell_size: f32) -> Self {
        let cell_size = if cell_size.is_finite() { cell_size.max(MIN_CELL_SIZE) } else { MIN_CELL_SIZE };
        Self {
            cols: cells_along(viewport_width, cell_size),
            rows: cells_along(viewport_height, cell_size),
            cell_size,
        }
    }

    pub fn len(&self) -> usize {
        self.cols * self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cells_along(extent: f32, cell_size: f32) -> usize {
    let count = (extent / cell_size).ceil();
    if count.is_finite() && count >= 1.0 {
        count as usize
    } else {
        1
    }
}

/// Columnar cell storage. Index is `row * cols + col`.
#[derive(Clone, Debug)]
pub struct Grid {
    geometry: Geometry,
    codepoints: Vec<u32>,
    baseline: Vec<u32>,
    twinkle_phase: Vec<f32>,
    twinkle_speed: Vec<f32>,
    mask: HighlightMask,
}

impl Grid {
    pub fn build<R: Rng + ?Sized>(geometry: Geometry, fill: &Fill, rng: &mut R) -> Self {
        let Geometry { cols, rows, .. } = geometry;
        let len = geometry.len();

        let mut codepoints = Vec::with_capacity(len);
        let mut twinkle_phase = Vec::with_capacity(len);
        let mut twinkle_speed = Vec::with_capacity(len);
        for row in 0..rows {
            for col in 0..cols {
                codepoints.push(fill.baseline(col, row, cols, rows, rng));
                twinkle_phase.push(rng.gen_range(0.0..TAU));
                twinkle_speed.push(rng.gen_range(TWINKLE_SPEED_RANGE));
            }
        }

        Self {
            geometry,
            baseline: codepoints.clone(),
            codepoints,
            twinkle_phase,
            twinkle_speed,
            mask: HighlightMask::empty(cols, rows),
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn cols(&self) -> usize {
        self.geometry.cols
    }

    pub fn rows(&self) -> usize {
        self.geometry.rows
    }

    pub fn len(&self) -> usize {
        self.codepoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codepoints.is_empty()
    }

    pub fn index(&self, col: usize, row: usize) -> usize {
        row * self.geometry.cols + col
    }

    pub fn position(&self, idx: usize) -> (usize, usize) {
        (idx % self.geometry.cols, idx / self.geometry.cols)
    }

    pub fn codepoint(&self, idx: usize) -> u32 {
        self.codepoints[idx]
    }

    pub fn codepoints(&self) -> &[u32] {
        &self.codepoints
    }

    pub fn set_codepoint(&mut self, idx: usize, codepoint: u32) {
        self.codepoints[idx] = codepoint;
    }

    pub fn baseline(&self, idx: usize) -> u32 {
        self.baseline[idx]
    }

    pub fn restore_baseline(&mut self, idx: usize) {
        self.codepoints[idx] = self.baseline[idx];
    }

    pub fn twinkle_params(&self, idx: usize) -> (f32, f32) {
        (self.twinkle_phase[idx], self.twinkle_speed[idx])
    }

    /// Ambient oscillation of a cell in [0, 1] at `time_secs`.
    pub fn twinkle(&self, idx: usize, time_secs: f32) -> f32 {
        0.5 + 0.5 * (time_secs * self.twinkle_speed[idx] + self.twinkle_phase[idx]).sin()
    }

    pub fn is_highlighted(&self, idx: usize) -> bool {
        self.mask.contains(idx)
    }

    pub fn mask(&self) -> &HighlightMask {
        &self.mask
    }

    /// Swaps in a freshly rasterized mask. Nothing else about the cells changes.
    pub fn set_mask(&mut self, mask: HighlightMask) {
        assert_eq!((mask.cols(), mask.rows()), (self.cols(), self.rows()));
        self.mask = mask;
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::wall::charset::{CharPool, Orientation, Script};

    #[test]
    fn geometry_rounds_partial_cells_up() {
        let geometry = Geometry::derive(320.0, 160.0, 16.0);
        assert_eq!((geometry.cols, geometry.rows), (20, 10));

        let geometry = Geometry::derive(321.0, 150.0, 16.0);
        assert_eq!((geometry.cols, geometry.rows), (21, 10));
    }

    #[test]
    fn geometry_never_collapses() {
        let geometry = Geometry::derive(0.0, -5.0, 16.0);
        assert_eq!((geometry.cols, geometry.rows), (1, 1));

        let geometry = Geometry::derive(100.0, 100.0, 2.0);
        assert_eq!(geometry.cell_size, MIN_CELL_SIZE);
    }

    #[test]
    fn fixed_fill_cycles_row_major() {
        let fill = Fill::Fixed {
            pool: CharPool::from_sources(&["AB"]),
            orientation: Orientation::Horizontal,
        };
        let mut rng = StdRng::seed_from_u64(3);
        let grid = Grid::build(Geometry::derive(320.0, 160.0, 16.0), &fill, &mut rng);

        assert_eq!(grid.len(), 200);
        for (idx, &cp) in grid.codepoints().iter().enumerate() {
            let expected = if idx % 2 == 0 { 'A' } else { 'B' };
            assert_eq!(cp, expected as u32);
        }
    }

    #[test]
    fn seeded_builds_are_reproducible() {
        let geometry = Geometry::derive(200.0, 120.0, 10.0);
        let fill = Fill::Random(Script::Katakana);
        let a = Grid::build(geometry, &fill, &mut StdRng::seed_from_u64(9));
        let b = Grid::build(geometry, &fill, &mut StdRng::seed_from_u64(9));
        assert_eq!(a.codepoints(), b.codepoints());
        assert_eq!(a.twinkle_params(17), b.twinkle_params(17));
    }

    #[test]
    fn twinkle_stays_in_unit_range() {
        let geometry = Geometry::derive(64.0, 64.0, 8.0);
        let grid = Grid::build(geometry, &Fill::Random(Script::Digits), &mut StdRng::seed_from_u64(5));
        for idx in 0..grid.len() {
            for step in 0..20 {
                let value = grid.twinkle(idx, step as f32 * 0.37);
                assert!((0.0..=1.0).contains(&value));
            }
        }
    }

    #[test]
    fn restore_returns_to_build_time_codepoint() {
        let fill = Fill::Fixed {
            pool: CharPool::from_sources(&["XYZ"]),
            orientation: Orientation::Horizontal,
        };
        let mut grid = Grid::build(Geometry::derive(80.0, 80.0, 8.0), &fill, &mut StdRng::seed_from_u64(2));
        grid.set_codepoint(4, 'Q' as u32);
        grid.restore_baseline(4);
        assert_eq!(grid.codepoint(4), 'Y' as u32);
    }
}
