//! # Observed status written back by the reconciler.
//!
//! Status is stored as two typed fields, [`Mode`] and [`Phase`]. The familiar
//! `"Immediate/Completed"` label is derived from them for display only; the
//! once-only guard of immediate mode is a typed check
//! ([`ObservedStatus::is_immediate_done`]) and never parses the label.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::desired::Mode;

/// Reconcile phase of an object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Pending,
    InProgress,
    InWindow,
    OutOfWindow,
    Completed,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Pending => "Pending",
            Phase::InProgress => "InProgress",
            Phase::InWindow => "InWindow",
            Phase::OutOfWindow => "OutOfWindow",
            Phase::Completed => "Completed",
            Phase::Failed => "Failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status owned by the reconciler and persisted through the store.
///
/// Overwritten on every pass; never appended to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedStatus {
    pub mode: Mode,
    pub phase: Phase,
    /// Spec generation this status was computed from.
    #[serde(default)]
    pub observed_generation: u64,
    /// Detail for failed phases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ObservedStatus {
    pub fn new(mode: Mode, phase: Phase, observed_generation: u64) -> Self {
        Self {
            mode,
            phase,
            observed_generation,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Display label, e.g. `Windowed/OutOfWindow`.
    pub fn label(&self) -> String {
        format!("{}/{}", self.mode, self.phase)
    }

    /// True when an immediate action already completed for `generation`.
    pub fn is_immediate_done(&self, generation: u64) -> bool {
        self.mode == Mode::Immediate
            && self.phase == Phase::Completed
            && self.observed_generation == generation
    }
}

impl fmt::Display for ObservedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.mode, self.phase)
    }
}
