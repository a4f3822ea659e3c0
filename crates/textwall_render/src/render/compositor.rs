use super::canvas::GlyphGrid;
use super::dirty::Repaint;
use super::surface::{GlyphPaint, GlyphStyle, Surface};
use crate::motion::rain::RainField;
use crate::motion::sweep::{affected_columns, window_position};
use crate::params::EffectParams;
use crate::wall::charset::to_char;
use crate::wall::grid::Grid;

/// Refresh rate of the buffered wall layer.
pub const BASE_LAYER_HZ: f64 = 12.0;

/// Everything a frame is drawn from.
#[derive(Clone, Copy)]
pub struct Scene<'a> {
    pub grid: &'a Grid,
    pub params: &'a EffectParams,
    pub now_ms: f64,
}

impl Scene<'_> {
    /// Twinkle-modulated wall brightness of a cell.
    fn wall_alpha(&self, idx: usize) -> f32 {
        let depth = self.params.twinkle_depth;
        let twinkle = self.grid.twinkle(idx, (self.now_ms / 1000.0) as f32);
        self.params.wall_brightness * (1.0 - depth + depth * twinkle)
    }

    fn glyph(&self, idx: usize) -> char {
        to_char(self.grid.codepoint(idx))
    }
}

/// Draws frames in a fixed layer order.
#[derive(Debug)]
pub struct Compositor {
    base_layer: GlyphGrid,
    base_refreshed_ms: Option<f64>,
    repaint: Vec<usize>,
    queued: Vec<bool>,
}

impl Compositor {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            base_layer: GlyphGrid::blank(cols, rows),
            base_refreshed_ms: None,
            repaint: Vec::new(),
            queued: vec![false; cols * rows],
        }
    }

    pub fn base_layer(&self) -> &GlyphGrid {
        &self.base_layer
    }

    pub fn base_refreshed_ms(&self) -> Option<f64> {
        self.base_refreshed_ms
    }

    /// Forces the buffered layer to be redrawn on the next frame.
    pub fn invalidate(&mut self) {
        self.base_refreshed_ms = None;
    }

    /// Shimmer and sweep frames: wall, highlight base, then the sweep band.
    pub fn paint_sweep<S: Surface + ?Sized>(&mut self, surface: &mut S, scene: &Scene<'_>, center: f32) {
        let params = scene.params;
        let grid = scene.grid;
        let half_width = params.sweep_half_width;

        if params.buffered_base && params.wall_sweep_boost <= 0.0 {
            self.refresh_base_layer(scene);
            surface.blit(&self.base_layer);
        } else {
            paint_wall(surface, scene, Some(center));
        }

        let mask = grid.mask();
        for col in 0..grid.cols() {
            for &idx in mask.column(col) {
                let (_, row) = grid.position(idx);
                let paint = GlyphPaint {
                    ch: scene.glyph(idx),
                    color: params.colors.highlight,
                    alpha: params.base_brightness,
                    style: GlyphStyle::Regular,
                };
                surface.draw_glyph(col, row, &paint);
            }
        }

        let lift = (params.peak_brightness - params.base_brightness).max(0.0);
        let span = match affected_columns(center, half_width, grid.cols()) {
            Some(span) if lift > 0.0 => span,
            _ => return,
        };
        for col in span.iter() {
            let u = window_position(col, grid.cols(), center, half_width);
            let alpha = params.gradient.evaluate(u, params.lock_ends) * lift;
            if alpha <= 0.0 {
                continue;
            }

            for &idx in mask.column(col) {
                let (_, row) = grid.position(idx);
                let paint =
                    GlyphPaint { ch: scene.glyph(idx), color: params.colors.sweep, alpha, style: GlyphStyle::Regular };
                surface.draw_glyph(col, row, &paint);
            }
        }
    }

    /// Rain frames repaint only the scheduled cells: every dirty cell, plus the
    /// twinkle stripe or the whole wall.
    pub fn paint_rain<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        scene: &Scene<'_>,
        rain: &RainField,
        repaint: &Repaint,
        dirty: &[usize],
    ) {
        self.collect(scene.grid, repaint, dirty);

        let grid = scene.grid;
        let params = scene.params;
        let colors = &params.colors;

        for &idx in &self.repaint {
            let (col, row) = grid.position(idx);
            surface.clear_cell(col, row, colors.background);
            let paint =
                GlyphPaint { ch: scene.glyph(idx), color: colors.wall, alpha: scene.wall_alpha(idx), style: GlyphStyle::Regular };
            surface.draw_glyph(col, row, &paint);
        }

        for &idx in self.repaint.iter().filter(|&&idx| rain.is_active(idx)) {
            let (col, row) = grid.position(idx);
            let alpha = params.lift_strength * rain.trail(idx);
            let paint = GlyphPaint { ch: scene.glyph(idx), color: colors.trail, alpha, style: GlyphStyle::Regular };
            surface.draw_glyph(col, row, &paint);
        }

        for &idx in self.repaint.iter().filter(|&&idx| rain.is_active(idx) && !grid.is_highlighted(idx)) {
            let (col, row) = grid.position(idx);
            let alpha = rain.trail(idx).min(params.trail_alpha_cap);
            let paint = GlyphPaint { ch: scene.glyph(idx), color: colors.trail, alpha, style: GlyphStyle::Regular };
            surface.draw_glyph(col, row, &paint);
        }

        for &idx in self.repaint.iter().filter(|&&idx| rain.is_active(idx) && grid.is_highlighted(idx)) {
            let (col, row) = grid.position(idx);
            let paint = GlyphPaint { ch: scene.glyph(idx), color: colors.glow, alpha: rain.trail(idx), style: GlyphStyle::Glow };
            surface.draw_glyph(col, row, &paint);
        }

        for &idx in self.repaint.iter().filter(|&&idx| grid.is_highlighted(idx)) {
            let (col, row) = grid.position(idx);
            let paint = GlyphPaint {
                ch: scene.glyph(idx),
                color: colors.overlay,
                alpha: params.highlight_opacity,
                style: GlyphStyle::Serif,
            };
            surface.draw_glyph(col, row, &paint);
        }
    }

    fn refresh_base_layer(&mut self, scene: &Scene<'_>) {
        let interval_ms = 1000.0 / BASE_LAYER_HZ;
        let fresh = self.base_layer.dimensions() == (scene.grid.cols(), scene.grid.rows())
            && self.base_refreshed_ms.map_or(false, |last| {
                let elapsed = scene.now_ms - last;
                (0.0..interval_ms).contains(&elapsed)
            });
        if fresh {
            return;
        }

        if self.base_layer.dimensions() != (scene.grid.cols(), scene.grid.rows()) {
            self.base_layer.resize(scene.grid.cols(), scene.grid.rows());
        }
        paint_wall(&mut self.base_layer, scene, None);
        self.base_refreshed_ms = Some(scene.now_ms);
    }

    fn collect(&mut self, grid: &Grid, repaint: &Repaint, dirty: &[usize]) {
        self.repaint.clear();
        self.queued.clear();
        self.queued.resize(grid.len(), false);

        match repaint {
            Repaint::Full => self.repaint.extend(0..grid.len()),
            Repaint::Partial { stripe } => {
                let stripe_cells = stripe.iter().flat_map(|rows| rows.start * grid.cols()..rows.end * grid.cols());
                for idx in dirty.iter().copied().chain(stripe_cells) {
                    if idx < grid.len() && !self.queued[idx] {
                        self.queued[idx] = true;
                        self.repaint.push(idx);
                    }
                }
            },
        }
    }
}

/// Clears and draws every wall cell. With a sweep `center`, columns inside
/// the band are brightened by the wall boost.
fn paint_wall<S: Surface + ?Sized>(surface: &mut S, scene: &Scene<'_>, center: Option<f32>) {
    let params = scene.params;
    let grid = scene.grid;
    let boost = params.wall_sweep_boost;

    for col in 0..grid.cols() {
        let sweep = match center {
            Some(center) if boost > 0.0 => {
                let u = window_position(col, grid.cols(), center, params.sweep_half_width);
                params.gradient.evaluate(u, params.lock_ends) * boost
            },
            _ => 0.0,
        };

        for row in 0..grid.rows() {
            let idx = grid.index(col, row);
            surface.clear_cell(col, row, params.colors.background);
            let paint = GlyphPaint {
                ch: scene.glyph(idx),
                color: params.colors.wall,
                alpha: (scene.wall_alpha(idx) + sweep).min(1.0),
                style: GlyphStyle::Regular,
            };
            surface.draw_glyph(col, row, &paint);
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::motion::rain::{Drop, TrailTuning};
    use crate::params::EffectVariant;
    use crate::render::canvas::CellGlyph;
    use crate::render::dirty::DirtyRegionScheduler;
    use crate::render::surface::BLACK;
    use crate::wall::charset::{Fill, Script};
    use crate::wall::grid::Geometry;
    use crate::wall::mask::HighlightMask;

    /// 4x2 wall whose top-left and bottom-right cells are highlighted.
    fn wall() -> Grid {
        let fill = Fill::Random(Script::Digits);
        let mut grid = Grid::build(Geometry { cols: 4, rows: 2, cell_size: 8.0 }, &fill, &mut StdRng::seed_from_u64(9));
        let mut cells = vec![false; 8];
        cells[0] = true;
        cells[7] = true;
        grid.set_mask(HighlightMask::from_cells(4, 2, cells));
        grid
    }

    fn surface_for(grid: &Grid) -> GlyphGrid {
        let mut surface = GlyphGrid::blank(grid.cols(), grid.rows());
        for cell in &mut surface.cells {
            *cell = CellGlyph { ch: '#', fg: [1, 2, 3], bg: Some([1, 2, 3]), style: GlyphStyle::Regular };
        }
        surface
    }

    #[test]
    fn sweep_stays_inside_the_highlight_without_boost() {
        let grid = wall();
        let params = EffectParams { buffered_base: false, ..EffectParams::preset(EffectVariant::Sweep) };
        let scene = Scene { grid: &grid, params: &params, now_ms: 1000.0 };
        let mut compositor = Compositor::new(4, 2);

        let mut off_wall = surface_for(&grid);
        compositor.paint_sweep(&mut off_wall, &scene, -1.0);
        let mut mid_wall = surface_for(&grid);
        compositor.paint_sweep(&mut mid_wall, &scene, 0.0);

        for idx in 0..grid.len() {
            let (col, row) = grid.position(idx);
            if grid.is_highlighted(idx) {
                continue;
            }
            assert_eq!(off_wall.cell(col, row), mid_wall.cell(col, row));
        }
        assert_ne!(off_wall.cell(0, 0).fg, mid_wall.cell(0, 0).fg);
    }

    #[test]
    fn wall_boost_lets_the_sweep_bleed() {
        let grid = wall();
        let params = EffectParams::preset(EffectVariant::Shimmer);
        assert!(params.wall_sweep_boost > 0.0);
        let scene = Scene { grid: &grid, params: &params, now_ms: 0.0 };
        let mut compositor = Compositor::new(4, 2);

        let mut off_wall = surface_for(&grid);
        compositor.paint_sweep(&mut off_wall, &scene, -1.0);
        let mut on_wall = surface_for(&grid);
        compositor.paint_sweep(&mut on_wall, &scene, 1.0 / 3.0);

        // Column 1 sits at the center of the band.
        assert_ne!(off_wall.cell(1, 0).fg, on_wall.cell(1, 0).fg);
    }

    #[test]
    fn buffered_wall_refreshes_at_reduced_rate() {
        let grid = wall();
        let params = EffectParams::preset(EffectVariant::Sweep);
        let mut compositor = Compositor::new(4, 2);
        let mut surface = surface_for(&grid);

        compositor.paint_sweep(&mut surface, &Scene { grid: &grid, params: &params, now_ms: 0.0 }, -1.0);
        assert_eq!(compositor.base_refreshed_ms(), Some(0.0));

        compositor.paint_sweep(&mut surface, &Scene { grid: &grid, params: &params, now_ms: 40.0 }, -1.0);
        assert_eq!(compositor.base_refreshed_ms(), Some(0.0));

        compositor.paint_sweep(&mut surface, &Scene { grid: &grid, params: &params, now_ms: 90.0 }, -1.0);
        assert_eq!(compositor.base_refreshed_ms(), Some(90.0));

        compositor.invalidate();
        compositor.paint_sweep(&mut surface, &Scene { grid: &grid, params: &params, now_ms: 100.0 }, -1.0);
        assert_eq!(compositor.base_refreshed_ms(), Some(100.0));

        // Non-highlighted cells come straight from the cached layer.
        assert_eq!(surface.cell(1, 0), compositor.base_layer().cell(1, 0));
    }

    fn rain_setup(grid: &mut Grid) -> RainField {
        let fill = Fill::Random(Script::Digits);
        let mut rng = StdRng::seed_from_u64(4);
        let mut rain = RainField::new(grid, TrailTuning::default(), &mut rng);
        for drop in rain.drops_mut() {
            *drop = Drop { position: -100.0, speed: 0.0 };
        }
        rain.drops_mut()[0] = Drop { position: 0.5, speed: 1.0 };
        rain.drops_mut()[1] = Drop { position: 0.5, speed: 1.0 };
        let mut dirty = DirtyRegionScheduler::new(grid.len());
        rain.step(grid, &fill, &mut rng, &mut dirty);
        rain
    }

    #[test]
    fn partial_rain_frames_touch_only_scheduled_cells() {
        let mut grid = wall();
        let rain = rain_setup(&mut grid);
        let params = EffectParams::preset(EffectVariant::Rain);
        let scene = Scene { grid: &grid, params: &params, now_ms: 0.0 };
        let mut compositor = Compositor::new(4, 2);
        let mut surface = surface_for(&grid);

        let dirty = [grid.index(2, 1)];
        compositor.paint_rain(&mut surface, &scene, &rain, &Repaint::Partial { stripe: None }, &dirty);

        for idx in 0..grid.len() {
            let (col, row) = grid.position(idx);
            let untouched = surface.cell(col, row).bg == Some([1, 2, 3]);
            assert_eq!(untouched, idx != dirty[0], "cell {idx}");
        }
    }

    #[test]
    fn stripe_rows_are_repainted() {
        let mut grid = wall();
        let rain = rain_setup(&mut grid);
        let params = EffectParams::preset(EffectVariant::Rain);
        let scene = Scene { grid: &grid, params: &params, now_ms: 0.0 };
        let mut compositor = Compositor::new(4, 2);
        let mut surface = surface_for(&grid);

        compositor.paint_rain(&mut surface, &scene, &rain, &Repaint::Partial { stripe: Some(1..2) }, &[]);

        for col in 0..4 {
            assert_eq!(surface.cell(col, 0).bg, Some([1, 2, 3]));
            assert_ne!(surface.cell(col, 1).bg, Some([1, 2, 3]));
        }
    }

    #[test]
    fn rain_layers_stack_in_order() {
        let mut grid = wall();
        let rain = rain_setup(&mut grid);
        let params = EffectParams {
            colors: crate::params::Palette { background: BLACK, ..EffectParams::preset(EffectVariant::Rain).colors },
            ..EffectParams::preset(EffectVariant::Rain)
        };
        let scene = Scene { grid: &grid, params: &params, now_ms: 0.0 };
        let mut compositor = Compositor::new(4, 2);
        let mut surface = surface_for(&grid);

        compositor.paint_rain(&mut surface, &scene, &rain, &Repaint::Full, &[]);

        // Struck highlight cell: glow tints the background, the overlay lands last.
        let inside = surface.cell(0, 0);
        assert_eq!(inside.style, GlyphStyle::Serif);
        assert_ne!(inside.bg, Some(BLACK));

        // Struck wall cell keeps a plain background.
        let outside = surface.cell(1, 0);
        assert!(rain.is_active(grid.index(1, 0)));
        assert_eq!(outside.style, GlyphStyle::Regular);
        assert_eq!(outside.bg, Some(BLACK));

        // Quiet highlight cell still carries the overlay.
        assert_eq!(surface.cell(3, 1).style, GlyphStyle::Serif);
    }
}
