//! Time-window evaluation.
//!
//! ## Contents
//! - [`WindowEvaluator`] pure in/out decision for a daily window
//! - [`WindowConfig`] reference timezone, boundary mode, always-open weekdays
//! - [`Clock`] injected source of the current instant

mod clock;
mod evaluator;

pub use clock::{Clock, FixedClock, SystemClock};
pub use evaluator::{
    Boundary, BoundaryMode, DEFAULT_TIMEZONE, TIME_FORMAT, WindowConfig, WindowDecision,
    WindowError, WindowEvaluator, parse_time_of_day,
};
