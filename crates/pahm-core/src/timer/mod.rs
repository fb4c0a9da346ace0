mod engine;
mod practice;

pub use engine::{RobustTimer, TimerPhase, TimerSnapshot, TimerState, DEFAULT_TICK_INTERVAL};
pub use practice::{SessionConfiguration, MIN_DURATION_MINUTES};
