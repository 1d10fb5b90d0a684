//! # Daily window evaluation.
//!
//! [`WindowEvaluator`] answers one question: does an instant fall inside a
//! recurring daily `[start, end]` window? Every comparison happens on
//! time-of-day values in a single reference timezone ([`WindowConfig::timezone`]),
//! never in the caller's local zone.
//!
//! ## Rules
//! - Default membership is **strict**: `start < now < end`. The exact boundary
//!   instants are outside. [`BoundaryMode::Inclusive`] flips this to `<=`.
//! - Windows do not wrap midnight: `start >= end` never matches.
//! - Empty or missing boundaries fail closed ([`WindowDecision::EmptyBoundary`]).
//! - Unparseable boundaries are an error ([`WindowError::InvalidBoundary`]),
//!   so the caller can tell misconfiguration apart from a closed window.
//! - Weekdays listed in [`WindowConfig::always_open_days`] are always open.
//!   The check runs after parsing and before the time comparison. The list is
//!   empty by default.
//!
//! ## Evaluation order
//! ```text
//! boundaries present? ── no ──► EmptyBoundary
//!        │ yes
//! boundaries parse?   ── no ──► Err(InvalidBoundary)
//!        │ yes
//! weekday always open? ─ yes ─► AlwaysOpenDay
//!        │ no
//! start < now < end?  ── yes ─► Inside
//!        │ no
//!        └────────────────────► Outside
//! ```

use std::fmt;

use chrono::{DateTime, Datelike, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Format of window boundaries.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Reference timezone used when none is configured.
pub const DEFAULT_TIMEZONE: Tz = Tz::Asia__Kolkata;

/// How boundary instants are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryMode {
    /// `start < now < end`.
    #[default]
    Exclusive,
    /// `start <= now <= end`.
    Inclusive,
}

/// Which boundary an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Boundary {
    Start,
    End,
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boundary::Start => f.write_str("start"),
            Boundary::End => f.write_str("end"),
        }
    }
}

/// Window configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("missing window {which} boundary")]
    MissingBoundary { which: Boundary },

    #[error("invalid window {which} boundary {value:?}: expected HH:MM:SS")]
    InvalidBoundary { which: Boundary, value: String },
}

/// Result of evaluating a window at one instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowDecision {
    Inside,
    Outside,
    /// The weekday is configured as always open.
    AlwaysOpenDay,
    /// A boundary is missing or blank.
    EmptyBoundary,
}

impl WindowDecision {
    /// True when the action may run.
    pub fn is_open(&self) -> bool {
        matches!(self, WindowDecision::Inside | WindowDecision::AlwaysOpenDay)
    }
}

/// Process-wide window settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowConfig {
    /// IANA zone all boundaries are interpreted in.
    pub timezone: Tz,
    pub boundary: BoundaryMode,
    /// Weekdays treated as in-window regardless of the boundaries.
    pub always_open_days: Vec<Weekday>,
}

impl Default for WindowConfig {
    /// `Asia/Kolkata`, exclusive boundaries, no always-open days.
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE,
            boundary: BoundaryMode::Exclusive,
            always_open_days: Vec::new(),
        }
    }
}

impl WindowConfig {
    /// Marks Saturday and Sunday as always open.
    pub fn with_weekend_override(mut self) -> Self {
        for day in [Weekday::Sat, Weekday::Sun] {
            if !self.always_open_days.contains(&day) {
                self.always_open_days.push(day);
            }
        }
        self
    }
}

/// Parses an `HH:MM:SS` boundary.
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), TIME_FORMAT).ok()
}

/// Stateless window evaluator.
///
/// Cheap to clone and safe to share between tasks.
#[derive(Clone, Debug, Default)]
pub struct WindowEvaluator {
    config: WindowConfig,
}

impl WindowEvaluator {
    pub fn new(config: WindowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Compares time-of-day values according to the boundary mode.
    pub fn in_window(&self, now: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
        match self.config.boundary {
            BoundaryMode::Exclusive => start < now && now < end,
            BoundaryMode::Inclusive => start < end && start <= now && now <= end,
        }
    }

    /// Evaluates the window for a local time-of-day and weekday.
    pub fn decide(
        &self,
        now: NaiveTime,
        weekday: Weekday,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<WindowDecision, WindowError> {
        let (Some(start), Some(end)) = (non_blank(start), non_blank(end)) else {
            return Ok(WindowDecision::EmptyBoundary);
        };
        let start_t = parse_time_of_day(start).ok_or_else(|| WindowError::InvalidBoundary {
            which: Boundary::Start,
            value: start.to_string(),
        })?;
        let end_t = parse_time_of_day(end).ok_or_else(|| WindowError::InvalidBoundary {
            which: Boundary::End,
            value: end.to_string(),
        })?;

        if self.config.always_open_days.contains(&weekday) {
            return Ok(WindowDecision::AlwaysOpenDay);
        }

        if self.in_window(now, start_t, end_t) {
            Ok(WindowDecision::Inside)
        } else {
            Ok(WindowDecision::Outside)
        }
    }

    /// Evaluates the window at `instant`, converted to the reference timezone.
    ///
    /// Sub-second precision is dropped, since boundaries only carry seconds.
    pub fn evaluate(
        &self,
        instant: DateTime<Utc>,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<WindowDecision, WindowError> {
        let local = instant.with_timezone(&self.config.timezone);
        let now = local.time().with_nanosecond(0).unwrap_or(local.time());
        self.decide(now, local.weekday(), start, end)
    }

    /// Boolean form of [`evaluate`](Self::evaluate): errors count as closed.
    pub fn is_open(&self, instant: DateTime<Utc>, start: Option<&str>, end: Option<&str>) -> bool {
        self.evaluate(instant, start, end)
            .map(|d| d.is_open())
            .unwrap_or(false)
    }
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}
