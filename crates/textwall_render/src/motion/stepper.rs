use log::trace;

/// Upper bound on simulation steps run for a single rendered frame.
pub const MAX_STEPS_PER_FRAME: u32 = 3;

/// Turns frame timestamps into a fixed-rate step count.
///
/// Elapsed time accumulates into a budget that is spent one interval at a
/// time. Anything left over after [`MAX_STEPS_PER_FRAME`] steps is dropped, so
/// a long stall costs at most one slow frame.
#[derive(Clone, Debug)]
pub struct FixedStepper {
    interval_ms: f64,
    budget_ms: f64,
    last_ms: Option<f64>,
}

impl FixedStepper {
    pub fn new(steps_per_sec: f32) -> Self {
        Self { interval_ms: interval_for(steps_per_sec), budget_ms: 0.0, last_ms: None }
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    pub fn set_rate(&mut self, steps_per_sec: f32) {
        self.interval_ms = interval_for(steps_per_sec);
    }

    pub fn advance(&mut self, now_ms: f64) -> u32 {
        let elapsed = match self.last_ms.replace(now_ms) {
            Some(previous) => (now_ms - previous).max(0.0),
            None => 0.0,
        };
        self.budget_ms += elapsed;

        let mut steps = 0;
        while self.budget_ms >= self.interval_ms && steps < MAX_STEPS_PER_FRAME {
            self.budget_ms -= self.interval_ms;
            steps += 1;
        }

        if self.budget_ms >= self.interval_ms {
            trace!("dropping {:.1} ms of simulation backlog", self.budget_ms);
            self.budget_ms = 0.0;
        }

        steps
    }
}

fn interval_for(steps_per_sec: f32) -> f64 {
    1000.0 / f64::from(steps_per_sec.max(0.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_runs_nothing() {
        let mut stepper = FixedStepper::new(30.0);
        assert_eq!(stepper.advance(5000.0), 0);
    }

    #[test]
    fn steps_follow_the_configured_rate() {
        let mut stepper = FixedStepper::new(25.0);
        let mut total = 0;
        for frame in 0..=63 {
            total += stepper.advance(f64::from(frame) * 1000.0 / 60.0);
        }
        assert_eq!(total, 26);
    }

    #[test]
    fn stalls_are_capped_and_discarded() {
        let mut stepper = FixedStepper::new(50.0);
        stepper.advance(0.0);
        assert_eq!(stepper.advance(10_000.0), MAX_STEPS_PER_FRAME);
        assert_eq!(stepper.advance(10_005.0), 0);
        assert_eq!(stepper.advance(10_020.0), 1);
    }

    #[test]
    fn clock_going_backwards_is_ignored() {
        let mut stepper = FixedStepper::new(10.0);
        stepper.advance(1000.0);
        assert_eq!(stepper.advance(500.0), 0);
        assert_eq!(stepper.advance(600.0), 1);
    }
}
