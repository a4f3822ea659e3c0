use rand::Rng;

/// Travel added beyond the sweep half-width so the band fully leaves the wall.
pub const OVERSCAN_MARGIN: f32 = 0.05;

/// Inclusive range of grid columns touched by the sweep window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnSpan {
    pub start: usize,
    pub end: usize,
}

impl ColumnSpan {
    pub fn iter(self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// Position of the sweep band over time, in normalized column space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepClock {
    period_secs: f32,
    phase_offset: f64,
}

impl SweepClock {
    pub fn new<R: Rng + ?Sized>(period_secs: f32, rng: &mut R) -> Self {
        Self::with_phase(period_secs, rng.gen_range(0.0..1.0))
    }

    pub fn with_phase(period_secs: f32, phase_offset: f64) -> Self {
        Self { period_secs, phase_offset }
    }

    pub fn period_secs(&self) -> f32 {
        self.period_secs
    }

    pub fn phase_offset(&self) -> f64 {
        self.phase_offset
    }

    /// A new period also draws a new phase offset.
    pub fn set_period<R: Rng + ?Sized>(&mut self, period_secs: f32, rng: &mut R) {
        *self = Self::new(period_secs, rng);
    }

    /// Sweep center at `timestamp_ms`, ranging over `[-overscan, 1 + overscan]`.
    pub fn center(&self, timestamp_ms: f64, overscan: f32) -> f32 {
        let period_ms = f64::from(self.period_secs) * 1000.0;
        let t = (timestamp_ms / period_ms + self.phase_offset).rem_euclid(1.0) as f32;
        -overscan + t * (1.0 + 2.0 * overscan)
    }
}

pub fn overscan(half_width: f32) -> f32 {
    half_width + OVERSCAN_MARGIN
}

/// Columns within `half_width` of `center`, or `None` when the band is
/// entirely off the wall.
pub fn affected_columns(center: f32, half_width: f32, cols: usize) -> Option<ColumnSpan> {
    let last = cols.saturating_sub(1) as f32;
    let start = ((center - half_width) * last).floor();
    let end = ((center + half_width) * last).ceil();
    if end < 0.0 || start > last {
        return None;
    }

    Some(ColumnSpan { start: start.max(0.0) as usize, end: end.min(last) as usize })
}

/// Where `col` sits inside the sweep window: 0 at its leading edge, 1 at its
/// trailing edge, outside [0, 1] beyond them.
pub fn window_position(col: usize, cols: usize, center: f32, half_width: f32) -> f32 {
    let x = if cols > 1 { col as f32 / (cols - 1) as f32 } else { 0.5 };
    (x - (center - half_width)) / (2.0 * half_width)
}
