pub mod gradient;
pub mod rain;
pub mod stepper;
pub mod sweep;
