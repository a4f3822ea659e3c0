use rand::Rng;

use crate::render::dirty::DirtyRegionScheduler;
use crate::wall::charset::Fill;
use crate::wall::grid::Grid;

/// Trails below this are considered gone.
pub const TRAIL_EPSILON: f32 = 0.006;
/// Rows a drop must fall past the bottom edge before it may respawn.
pub const RESPAWN_DEPTH: f32 = 6.0;

/// Strength and lifetime of trails, split by highlight membership.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrailTuning {
    pub inject_inside: f32,
    pub inject_outside: f32,
    /// Per-step multiplier for trails inside the highlight.
    pub decay_inside: f32,
    pub decay_outside: f32,
    /// Rows advanced per step.
    pub speed_min: f32,
    pub speed_max: f32,
    /// Per-step chance that a drop below the wall starts over.
    pub respawn_chance: f32,
}

impl Default for TrailTuning {
    fn default() -> Self {
        Self {
            inject_inside: 1.0,
            inject_outside: 0.8,
            decay_inside: 0.95,
            decay_outside: 0.86,
            speed_min: 0.3,
            speed_max: 1.1,
            respawn_chance: 0.08,
        }
    }
}

impl TrailTuning {
    pub fn injection(&self, highlighted: bool) -> f32 {
        if highlighted {
            self.inject_inside
        } else {
            self.inject_outside
        }
    }

    pub fn decay(&self, highlighted: bool) -> f32 {
        if highlighted {
            self.decay_inside
        } else {
            self.decay_outside
        }
    }

    fn speed<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        if self.speed_max > self.speed_min {
            rng.gen_range(self.speed_min..=self.speed_max)
        } else {
            self.speed_min
        }
    }
}

/// A falling position in row space. One per column.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Drop {
    pub position: f32,
    pub speed: f32,
}

/// Falling drops and the decaying trails they leave behind.
#[derive(Clone, Debug)]
pub struct RainField {
    rows: usize,
    drops: Vec<Drop>,
    trail: Vec<f32>,
    active: Vec<bool>,
    active_cells: Vec<usize>,
    tuning: TrailTuning,
}

impl RainField {
    /// Drops start staggered above the wall so columns enter at different times.
    pub fn new<R: Rng + ?Sized>(grid: &Grid, tuning: TrailTuning, rng: &mut R) -> Self {
        let rows = grid.rows();
        let drops = (0..grid.cols())
            .map(|_| Drop { position: -rng.gen_range(0.0..rows as f32 + 1.0), speed: tuning.speed(rng) })
            .collect();

        Self {
            rows,
            drops,
            trail: vec![0.0; grid.len()],
            active: vec![false; grid.len()],
            active_cells: Vec::new(),
            tuning,
        }
    }

    pub fn tuning(&self) -> &TrailTuning {
        &self.tuning
    }

    pub fn set_tuning(&mut self, tuning: TrailTuning) {
        self.tuning = tuning;
    }

    pub fn drops(&self) -> &[Drop] {
        &self.drops
    }

    pub fn drops_mut(&mut self) -> &mut [Drop] {
        &mut self.drops
    }

    pub fn trail(&self, idx: usize) -> f32 {
        self.trail[idx]
    }

    pub fn is_active(&self, idx: usize) -> bool {
        self.active[idx]
    }

    pub fn active_cells(&self) -> &[usize] {
        &self.active_cells
    }

    /// Advances the simulation by one fixed step: existing trails decay, then
    /// every drop falls and strikes the rows it passed through.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        grid: &mut Grid,
        fill: &Fill,
        rng: &mut R,
        dirty: &mut DirtyRegionScheduler,
    ) {
        self.decay(grid, fill, dirty);

        let rows = self.rows as i64;
        for col in 0..self.drops.len() {
            let mut drop = self.drops[col];
            let previous = drop.position;
            drop.position += drop.speed;

            let first_row = previous.floor() as i64;
            let last_row = drop.position.floor() as i64;
            if last_row > first_row {
                for row in first_row.max(0)..=last_row.min(rows - 1) {
                    self.strike(grid.index(col, row as usize), grid, fill, rng, dirty);
                }
            }

            if drop.position > self.rows as f32 + RESPAWN_DEPTH
                && rng.gen::<f32>() < self.tuning.respawn_chance
            {
                drop = Drop {
                    position: -rng.gen_range(1.0..(self.rows as f32).max(1.0) + 1.0),
                    speed: self.tuning.speed(rng),
                };
            }

            self.drops[col] = drop;
        }
    }

    fn strike<R: Rng + ?Sized>(
        &mut self,
        idx: usize,
        grid: &mut Grid,
        fill: &Fill,
        rng: &mut R,
        dirty: &mut DirtyRegionScheduler,
    ) {
        grid.set_codepoint(idx, fill.strike(rng));
        let injection = self.tuning.injection(grid.is_highlighted(idx));
        self.trail[idx] = self.trail[idx].max(injection);
        if !self.active[idx] {
            self.active[idx] = true;
            self.active_cells.push(idx);
        }
        dirty.mark(idx);
    }

    fn decay(&mut self, grid: &mut Grid, fill: &Fill, dirty: &mut DirtyRegionScheduler) {
        let mut i = 0;
        while i < self.active_cells.len() {
            let idx = self.active_cells[i];
            let value = self.trail[idx] * self.tuning.decay(grid.is_highlighted(idx));
            dirty.mark(idx);

            if value < TRAIL_EPSILON {
                self.trail[idx] = 0.0;
                self.active[idx] = false;
                self.active_cells.swap_remove(i);
                if fill.restores_baseline() {
                    grid.restore_baseline(idx);
                }
                continue;
            }

            self.trail[idx] = value;
            i += 1;
        }
    }
}
