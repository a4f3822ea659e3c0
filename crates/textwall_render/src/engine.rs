use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::motion::rain::RainField;
use crate::motion::stepper::FixedStepper;
use crate::motion::sweep::{overscan, SweepClock};
use crate::params::{EffectParams, EffectVariant, ParamChange};
use crate::render::compositor::{Compositor, Scene};
use crate::render::dirty::DirtyRegionScheduler;
use crate::render::surface::Surface;
use crate::wall::charset::Fill;
use crate::wall::font::{BitmapFont, Typeface};
use crate::wall::grid::Grid;
use crate::wall::mask;

/// A running text-wall effect.
///
/// Owns the grid and every piece of animation state. Drive it by calling
/// [`TextWall::frame`] once per display refresh; not calling it pauses the
/// effect without losing anything.
pub struct TextWall<T: Typeface = BitmapFont> {
    params: EffectParams,
    grid: Grid,
    fill: Fill,
    sweep: SweepClock,
    rain: Option<RainField>,
    stepper: FixedStepper,
    scheduler: DirtyRegionScheduler,
    compositor: Compositor,
    typeface: T,
    rng: StdRng,
}

impl TextWall<BitmapFont> {
    /// Production callers pass `None` for an unseeded wall.
    pub fn new(params: EffectParams, seed: Option<u64>) -> Self {
        Self::with_typeface(params, seed, BitmapFont)
    }
}

impl<T: Typeface> TextWall<T> {
    pub fn with_typeface(params: EffectParams, seed: Option<u64>, typeface: T) -> Self {
        let params = params.sanitized();
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let fill = params.fill();
        let grid = build_grid(&params, &fill, &typeface, &mut rng);
        let sweep = SweepClock::new(params.sweep_period, &mut rng);
        let rain = new_rain(&params, &grid, &mut rng);

        Self {
            stepper: FixedStepper::new(params.step_rate),
            scheduler: DirtyRegionScheduler::new(grid.len()),
            compositor: Compositor::new(grid.cols(), grid.rows()),
            params,
            grid,
            fill,
            sweep,
            rain,
            typeface,
            rng,
        }
    }

    pub fn params(&self) -> &EffectParams {
        &self.params
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn rain(&self) -> Option<&RainField> {
        self.rain.as_ref()
    }

    pub fn scheduler(&self) -> &DirtyRegionScheduler {
        &self.scheduler
    }

    pub fn sweep_clock(&self) -> &SweepClock {
        &self.sweep
    }

    /// Normalized sweep center at `now_ms`.
    pub fn sweep_center(&self, now_ms: f64) -> f32 {
        self.sweep.center(now_ms, overscan(self.params.sweep_half_width))
    }

    /// Applies new parameters, doing only the work the change requires.
    pub fn update(&mut self, params: EffectParams) -> ParamChange {
        let next = params.sanitized();
        let change = self.params.diff(&next);
        self.params = next;

        if change.period {
            self.sweep.set_period(self.params.sweep_period, &mut self.rng);
        }
        if change.rebuild {
            self.rebuild();
            return change;
        }

        if change.highlight {
            self.remask();
        }

        self.stepper.set_rate(self.params.step_rate);
        if let Some(rain) = self.rain.as_mut() {
            rain.set_tuning(self.params.trail_tuning());
        }
        if change.highlight || change.appearance {
            self.scheduler.request_full();
            self.compositor.invalidate();
        }

        change
    }

    /// Rebuilds the grid and all derived state from the current parameters.
    /// The sweep clock keeps its phase.
    pub fn rebuild(&mut self) {
        self.fill = self.params.fill();
        self.grid = build_grid(&self.params, &self.fill, &self.typeface, &mut self.rng);
        self.rain = new_rain(&self.params, &self.grid, &mut self.rng);
        self.stepper = FixedStepper::new(self.params.step_rate);
        self.scheduler = DirtyRegionScheduler::new(self.grid.len());
        self.compositor = Compositor::new(self.grid.cols(), self.grid.rows());
    }

    /// Draws the frame for `now_ms` onto `surface`, resizing it to the grid
    /// first if needed.
    pub fn frame<S: Surface + ?Sized>(&mut self, now_ms: f64, surface: &mut S) {
        let (cols, rows) = (self.grid.cols(), self.grid.rows());
        if surface.dimensions() != (cols, rows) {
            surface.resize(cols, rows);
            self.scheduler.request_full();
            self.compositor.invalidate();
        }

        match self.rain.as_mut() {
            Some(rain) => {
                for _ in 0..self.stepper.advance(now_ms) {
                    rain.step(&mut self.grid, &self.fill, &mut self.rng, &mut self.scheduler);
                }

                let repaint = self.scheduler.plan(now_ms, self.params.twinkle_rate, cols, rows);
                let scene = Scene { grid: &self.grid, params: &self.params, now_ms };
                self.compositor.paint_rain(surface, &scene, rain, &repaint, self.scheduler.dirty());
                self.scheduler.clear_dirty();
            },
            None => {
                let center = self.sweep.center(now_ms, overscan(self.params.sweep_half_width));
                let scene = Scene { grid: &self.grid, params: &self.params, now_ms };
                self.compositor.paint_sweep(surface, &scene, center);
            },
        }
    }

    fn remask(&mut self) {
        let mask = mask::rasterize(&self.params.highlight_text, self.grid.cols(), self.grid.rows(), &self.typeface);
        self.grid.set_mask(mask);
    }
}

fn build_grid<T: Typeface>(params: &EffectParams, fill: &Fill, typeface: &T, rng: &mut StdRng) -> Grid {
    let geometry = params.geometry();
    let mut grid = Grid::build(geometry, fill, rng);
    grid.set_mask(mask::rasterize(&params.highlight_text, grid.cols(), grid.rows(), typeface));
    debug!(
        "built {}x{} {:?} wall, {} highlighted cells",
        geometry.cols,
        geometry.rows,
        params.variant,
        grid.mask().count()
    );
    grid
}

fn new_rain(params: &EffectParams, grid: &Grid, rng: &mut StdRng) -> Option<RainField> {
    (params.variant == EffectVariant::Rain).then(|| RainField::new(grid, params.trail_tuning(), rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::canvas::GlyphGrid;
    use crate::render::surface::GlyphStyle;
    use crate::wall::charset::{FillMode, Orientation};

    fn fixed_ab(variant: EffectVariant) -> EffectParams {
        EffectParams {
            viewport_width: 320.0,
            viewport_height: 160.0,
            cell_size: 16.0,
            fill_mode: FillMode::Fixed,
            sources: vec!["AB".to_owned()],
            orientation: Orientation::Horizontal,
            highlight_text: "HI".to_owned(),
            ..EffectParams::preset(variant)
        }
    }

    #[test]
    fn fixed_fill_cycles_row_major() {
        let wall = TextWall::new(fixed_ab(EffectVariant::Sweep), Some(1));
        assert_eq!((wall.grid().cols(), wall.grid().rows()), (20, 10));
        for (idx, &codepoint) in wall.grid().codepoints().iter().enumerate() {
            let expected = if idx % 2 == 0 { 'A' } else { 'B' };
            assert_eq!(codepoint, u32::from(expected));
        }
        assert!(wall.grid().mask().count() > 0);
    }

    #[test]
    fn text_update_only_remasks() {
        let mut wall = TextWall::new(fixed_ab(EffectVariant::Rain), Some(2));
        let codepoints = wall.grid().codepoints().to_vec();
        let twinkle: Vec<_> = (0..wall.grid().len()).map(|idx| wall.grid().twinkle_params(idx)).collect();
        let before = wall.grid().mask().clone();

        let change = wall.update(EffectParams { highlight_text: "-".to_owned(), ..wall.params().clone() });

        assert!(change.highlight && !change.rebuild);
        assert_ne!(wall.grid().mask(), &before);
        assert_eq!(wall.grid().codepoints(), codepoints.as_slice());
        let after: Vec<_> = (0..wall.grid().len()).map(|idx| wall.grid().twinkle_params(idx)).collect();
        assert_eq!(after, twinkle);
        assert!(wall.scheduler().full_requested());
    }

    #[test]
    fn geometry_update_rebuilds() {
        let mut wall = TextWall::new(fixed_ab(EffectVariant::Sweep), Some(3));
        let change = wall.update(EffectParams { viewport_width: 640.0, ..wall.params().clone() });
        assert!(change.rebuild);
        assert_eq!(wall.grid().cols(), 40);
        assert_eq!(wall.grid().mask().cols(), 40);
    }

    #[test]
    fn period_change_draws_new_phase() {
        let mut wall = TextWall::new(fixed_ab(EffectVariant::Sweep), Some(4));
        let phase = wall.sweep_clock().phase_offset();
        let change = wall.update(EffectParams { sweep_period: 7.5, ..wall.params().clone() });
        assert!(change.period);
        assert_eq!(wall.sweep_clock().period_secs(), 7.5);
        assert_ne!(wall.sweep_clock().phase_offset(), phase);
    }

    #[test]
    fn appearance_change_forces_one_full_repaint() {
        let mut wall = TextWall::new(fixed_ab(EffectVariant::Rain), Some(5));
        let mut surface = GlyphGrid::blank(1, 1);
        wall.frame(0.0, &mut surface);
        assert!(!wall.scheduler().full_requested());

        let change = wall.update(EffectParams { trail_alpha_cap: 0.2, ..wall.params().clone() });
        assert!(change.appearance);
        assert!(wall.scheduler().full_requested());

        wall.frame(16.0, &mut surface);
        assert!(!wall.scheduler().full_requested());
    }

    #[test]
    fn rebuild_keeps_the_new_period() {
        let mut wall = TextWall::new(fixed_ab(EffectVariant::Sweep), Some(10));
        let change =
            wall.update(EffectParams { viewport_width: 640.0, sweep_period: 9.0, ..wall.params().clone() });
        assert!(change.rebuild && change.period);
        assert_eq!(wall.grid().cols(), 40);
        assert_eq!(wall.sweep_clock().period_secs(), 9.0);
    }

    #[test]
    fn recolor_with_new_period_repaints_every_cell() {
        let params = EffectParams { twinkle_rate: 0.0, ..fixed_ab(EffectVariant::Rain) };
        let mut wall = TextWall::new(params, Some(11));
        let mut surface = GlyphGrid::blank(1, 1);
        wall.frame(0.0, &mut surface);

        let mut colors = wall.params().colors;
        colors.background = [200, 0, 0];
        let change = wall.update(EffectParams { sweep_period: 9.0, colors, ..wall.params().clone() });
        assert!(change.period && change.appearance);
        assert!(wall.scheduler().full_requested());

        wall.frame(16.0, &mut surface);
        // Glowing trails tint their own background.
        let plain = surface.cells.iter().filter(|cell| cell.style != GlyphStyle::Glow);
        assert!(plain.clone().count() > 0);
        assert!(plain.clone().all(|cell| cell.bg == Some([200, 0, 0])));
    }

    #[test]
    fn frame_resizes_the_surface() {
        let mut wall = TextWall::new(fixed_ab(EffectVariant::Sweep), Some(6));
        let mut surface = GlyphGrid::blank(3, 3);
        wall.frame(0.0, &mut surface);
        assert_eq!(surface.dimensions(), (20, 10));
        assert!(surface.cells.iter().all(|cell| cell.ch == 'A' || cell.ch == 'B'));
    }

    #[test]
    fn same_seed_same_frames() {
        let params = EffectParams { viewport_width: 200.0, viewport_height: 120.0, ..EffectParams::preset(EffectVariant::Rain) };
        let mut first = TextWall::new(params.clone(), Some(7));
        let mut second = TextWall::new(params, Some(7));
        let mut a = GlyphGrid::blank(1, 1);
        let mut b = GlyphGrid::blank(1, 1);

        for frame in 0..30 {
            let now = f64::from(frame) * 16.0;
            first.frame(now, &mut a);
            second.frame(now, &mut b);
        }
        assert_eq!(a, b);
    }

    #[test]
    fn resume_after_pause_caps_catch_up() {
        let params = EffectParams { viewport_width: 160.0, viewport_height: 160.0, ..EffectParams::preset(EffectVariant::Rain) };
        let mut wall = TextWall::new(params, Some(8));
        let mut surface = GlyphGrid::blank(1, 1);
        wall.frame(0.0, &mut surface);
        wall.frame(100.0, &mut surface);

        let before: Vec<_> = wall.rain().map(|rain| rain.drops().to_vec()).unwrap_or_default();
        wall.frame(60_000.0, &mut surface);
        let after = wall.rain().map(|rain| rain.drops().to_vec()).unwrap_or_default();

        let max_speed = wall.params().drop_speed_max;
        for (old, new) in before.iter().zip(&after) {
            assert!(new.position - old.position <= 3.0 * max_speed + 1e-4);
        }
    }

    #[test]
    fn sweep_variants_have_no_rain() {
        assert!(TextWall::new(EffectParams::preset(EffectVariant::Shimmer), Some(9)).rain().is_none());
        assert!(TextWall::new(EffectParams::preset(EffectVariant::Rain), Some(9)).rain().is_some());
    }
}
