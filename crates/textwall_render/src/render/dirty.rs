use std::ops::Range;

/// Cells repainted per frame by the ambient twinkle stripe.
pub const STRIPE_CELL_BUDGET: usize = 2000;

/// What the compositor has to repaint this frame besides the dirty cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Repaint {
    /// Every cell.
    Full,
    /// Dirty cells plus, when the twinkle interval elapsed, a band of rows.
    Partial { stripe: Option<Range<usize>> },
}

/// Tracks cells changed since the last paint and spreads the twinkle
/// refresh of the whole wall over several frames.
#[derive(Clone, Debug)]
pub struct DirtyRegionScheduler {
    dirty: Vec<usize>,
    marked: Vec<bool>,
    cursor: usize,
    last_stripe_ms: Option<f64>,
    force_full: bool,
}

impl DirtyRegionScheduler {
    pub fn new(cells: usize) -> Self {
        Self {
            dirty: Vec::new(),
            marked: vec![false; cells],
            cursor: 0,
            last_stripe_ms: None,
            force_full: true,
        }
    }

    pub fn mark(&mut self, idx: usize) {
        if let Some(marked) = self.marked.get_mut(idx) {
            if !*marked {
                *marked = true;
                self.dirty.push(idx);
            }
        }
    }

    pub fn is_marked(&self, idx: usize) -> bool {
        self.marked.get(idx).copied().unwrap_or(false)
    }

    /// Marked cells in insertion order.
    pub fn dirty(&self) -> &[usize] {
        &self.dirty
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Schedules one repaint of every cell on the next frame.
    pub fn request_full(&mut self) {
        self.force_full = true;
    }

    pub fn full_requested(&self) -> bool {
        self.force_full
    }

    /// Rows per stripe so a stripe stays within [`STRIPE_CELL_BUDGET`].
    pub fn stripe_rows(cols: usize, rows: usize) -> usize {
        (STRIPE_CELL_BUDGET / cols.max(1)).clamp(1, rows.max(1))
    }

    /// Decides this frame's repaint. A forced full repaint is consumed here.
    /// `twinkle_rate` is in stripes per second; zero disables the stripe.
    pub fn plan(&mut self, now_ms: f64, twinkle_rate: f32, cols: usize, rows: usize) -> Repaint {
        if self.force_full {
            self.force_full = false;
            self.last_stripe_ms = Some(now_ms);
            return Repaint::Full;
        }

        if twinkle_rate <= 0.0 || rows == 0 {
            return Repaint::Partial { stripe: None };
        }

        let interval_ms = 1000.0 / f64::from(twinkle_rate);
        let due = self.last_stripe_ms.map_or(true, |last| now_ms - last >= interval_ms);
        if !due {
            return Repaint::Partial { stripe: None };
        }

        self.last_stripe_ms = Some(now_ms);
        let start = self.cursor.min(rows - 1);
        let end = (start + Self::stripe_rows(cols, rows)).min(rows);
        self.cursor = if end >= rows { 0 } else { end };
        Repaint::Partial { stripe: Some(start..end) }
    }

    /// Forgets all marks once they have been painted.
    pub fn clear_dirty(&mut self) {
        for &idx in &self.dirty {
            self.marked[idx] = false;
        }
        self.dirty.clear();
    }
}
