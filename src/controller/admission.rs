//! # Per-key admission policy
//!
//! The controller treats objects as **slots** identified by their
//! [`ObjectKey`](crate::ObjectKey). At any given time **one** reconcile may run
//! in a slot. When a trigger for a busy slot arrives, the admission policy
//! decides what to do with it.
//!
//! ## Variants
//! - `Coalesce`: remember the trigger; run **one** follow-up pass when the
//!   current one finishes, however many triggers arrived meanwhile.
//! - `DropIfRunning`: **ignore** the trigger.
//!
//! ## Invariants
//! - Reconciles for the same key never run in parallel.
//! - Deletion is never subject to admission: it always cancels the slot.

use serde::Deserialize;

/// Policy controlling how triggers are handled when a slot is busy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionPolicy {
    /// Merge into a single follow-up pass.
    ///
    /// Use when:
    /// - Every spec change must eventually be observed
    /// - Bursts of watch notifications should not queue up passes
    #[default]
    Coalesce,

    /// Skip the trigger if a pass is already running.
    ///
    /// Use when:
    /// - The periodic re-check is enough to catch up
    /// - Load matters more than latency of spec changes
    DropIfRunning,
}
