//! # Planning: the pure half of a reconcile pass.
//!
//! [`Planner::plan`] maps `(desired, generation, observed, now)` to a [`Plan`]
//! without touching the store or the executor. The reconciler then carries
//! the plan out.
//!
//! ```text
//! mode absent / unrecognized ─────────────────────────► Skip(UnrecognizedMode)
//! Immediate, Completed for this generation ───────────► Skip(AlreadyCompleted)
//! targets invalid ────────────────────────────────────► Reject(<Mode>/Failed)
//! Immediate ──────────────────────────────────────────► Execute(Immediate/InProgress)
//! Windowed, boundary missing or unparseable ──────────► Reject(Windowed/Failed)
//! Windowed, inside (or always-open weekday) ──────────► Execute(Windowed/InWindow, requeue)
//! Windowed, outside ──────────────────────────────────► Record(Windowed/OutOfWindow, requeue)
//! ```

use chrono::{DateTime, Utc};

use crate::executor::ActionRequest;
use crate::resource::{DesiredState, Mode, ObservedStatus, Phase};
use crate::window::{Boundary, WindowDecision, WindowError, WindowEvaluator};

/// Why a pass does nothing at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The immediate action already ran for this generation.
    AlreadyCompleted,
    /// `mode` is absent or not understood.
    UnrecognizedMode,
}

/// What one reconcile pass should do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Plan {
    /// Leave status untouched; no action; no re-check.
    Skip { reason: SkipReason },

    /// Record `pending`, then call the executor with `request`.
    Execute {
        mode: Mode,
        pending: ObservedStatus,
        request: ActionRequest,
        /// Re-check after success (windowed objects).
        requeue: bool,
    },

    /// Record `status` without calling the executor.
    Record {
        status: ObservedStatus,
        requeue: bool,
    },

    /// Configuration error: record `status` (a `Failed` phase) and surface `reason`.
    Reject {
        status: ObservedStatus,
        reason: String,
    },
}

impl Plan {
    /// Executor request, if the plan calls the executor.
    pub fn request(&self) -> Option<&ActionRequest> {
        match self {
            Plan::Execute { request, .. } => Some(request),
            _ => None,
        }
    }
}

/// Stateless planner around a [`WindowEvaluator`].
#[derive(Clone, Debug, Default)]
pub struct Planner {
    evaluator: WindowEvaluator,
}

impl Planner {
    pub fn new(evaluator: WindowEvaluator) -> Self {
        Self { evaluator }
    }

    pub fn evaluator(&self) -> &WindowEvaluator {
        &self.evaluator
    }

    pub fn plan(
        &self,
        desired: &DesiredState,
        generation: u64,
        observed: Option<&ObservedStatus>,
        now: DateTime<Utc>,
    ) -> Plan {
        let mode = match desired.mode {
            Some(mode @ (Mode::Immediate | Mode::Windowed)) => mode,
            Some(Mode::Unrecognized) | None => {
                return Plan::Skip {
                    reason: SkipReason::UnrecognizedMode,
                };
            }
        };

        if mode == Mode::Immediate && observed.is_some_and(|st| st.is_immediate_done(generation)) {
            return Plan::Skip {
                reason: SkipReason::AlreadyCompleted,
            };
        }

        let reject = |reason: String| Plan::Reject {
            status: ObservedStatus::new(mode, Phase::Failed, generation).with_message(&reason),
            reason,
        };

        let targets = match desired.validated_targets() {
            Ok(targets) => targets,
            Err(e) => return reject(e.to_string()),
        };
        let request = ActionRequest::new(desired.action, targets);

        if mode == Mode::Immediate {
            return Plan::Execute {
                mode,
                pending: ObservedStatus::new(mode, Phase::InProgress, generation),
                request,
                requeue: false,
            };
        }

        let start = desired.window_start.as_deref();
        let end = desired.window_end.as_deref();
        match self.evaluator.evaluate(now, start, end) {
            Err(e) => reject(e.to_string()),
            Ok(WindowDecision::EmptyBoundary) => reject(missing_boundary(start).to_string()),
            Ok(WindowDecision::Inside | WindowDecision::AlwaysOpenDay) => Plan::Execute {
                mode,
                pending: ObservedStatus::new(mode, Phase::InWindow, generation),
                request,
                requeue: true,
            },
            Ok(WindowDecision::Outside) => Plan::Record {
                status: ObservedStatus::new(mode, Phase::OutOfWindow, generation),
                requeue: true,
            },
        }
    }
}

fn missing_boundary(start: Option<&str>) -> WindowError {
    let which = if start.is_none_or(|s| s.trim().is_empty()) {
        Boundary::Start
    } else {
        Boundary::End
    };
    WindowError::MissingBoundary { which }
}
