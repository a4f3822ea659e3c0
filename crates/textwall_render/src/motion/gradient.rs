use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Floor for the distance between two neighbouring stops.
const POSITION_EPSILON: f32 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    pub position: f32,
    pub value: f32,
}

impl GradientStop {
    pub const fn new(position: f32, value: f32) -> Self {
        Self { position, value }
    }
}

/// Piecewise-linear sweep intensity profile.
///
/// Stops are kept sorted by position. The sort is stable, so stops sharing a
/// position keep their input order and the first of them wins lookups.
#[derive(Clone, Debug, PartialEq)]
pub struct Gradient {
    stops: Vec<GradientStop>,
}

impl Default for Gradient {
    fn default() -> Self {
        Self::bell()
    }
}

impl Gradient {
    pub fn new(stops: impl Into<Vec<GradientStop>>) -> Self {
        let mut stops: Vec<GradientStop> = stops
            .into()
            .into_iter()
            .filter(|stop| stop.position.is_finite() && stop.value.is_finite())
            .map(|stop| GradientStop::new(stop.position.clamp(0.0, 1.0), stop.value.clamp(0.0, 1.0)))
            .collect();
        stops.sort_by(|a, b| a.position.total_cmp(&b.position));
        Self { stops }
    }

    /// Rises to full intensity in the middle of the window.
    pub fn bell() -> Self {
        Self::new([
            GradientStop::new(0.0, 0.0),
            GradientStop::new(0.5, 1.0),
            GradientStop::new(1.0, 0.0),
        ])
    }

    pub fn plateau() -> Self {
        Self::new([
            GradientStop::new(0.0, 0.0),
            GradientStop::new(0.3, 1.0),
            GradientStop::new(0.7, 1.0),
            GradientStop::new(1.0, 0.0),
        ])
    }

    /// Parses `[{ "position": .., "value": .. }, ..]`. Anything else, or an
    /// empty list, yields `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let entries = value.as_array()?;
        if entries.is_empty() {
            return None;
        }

        let mut stops = Vec::with_capacity(entries.len());
        for entry in entries {
            let position = entry.get("position")?.as_f64()?;
            let value = entry.get("value")?.as_f64()?;
            stops.push(GradientStop::new(position as f32, value as f32));
        }

        let gradient = Self::new(stops);
        (!gradient.stops.is_empty()).then_some(gradient)
    }

    pub fn stops(&self) -> &[GradientStop] {
        &self.stops
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Intensity at sweep-relative position `u`, where the window spans [0, 1].
    ///
    /// With `lock_ends` the profile is zero at and beyond the window edges no
    /// matter what the outer stops say.
    pub fn evaluate(&self, u: f32, lock_ends: bool) -> f32 {
        if lock_ends && (u <= 0.0 || u >= 1.0) {
            return 0.0;
        }

        let (first, last) = match (self.stops.first(), self.stops.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };

        if u <= first.position {
            return first.value;
        }
        if u >= last.position {
            return last.value;
        }

        for pair in self.stops.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if u >= a.position && u <= b.position {
                let span = (b.position - a.position).max(POSITION_EPSILON);
                let t = ((u - a.position) / span).clamp(0.0, 1.0);
                return a.value + (b.value - a.value) * t;
            }
        }

        last.value
    }
}
