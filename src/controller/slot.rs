use std::time::Instant;

use tokio_util::sync::CancellationToken;

use super::request::Cause;

/// State of a single object slot.
pub(super) struct SlotState {
    /// Current status (idle or running).
    pub status: SlotStatus,

    /// Follow-up pass requested while running (coalesced).
    pub pending: Option<Cause>,

    /// Cancels the scheduled re-check or retry, if any.
    pub timer: CancellationToken,

    /// Consecutive retryable failures; drives the backoff delay.
    pub failures: u32,

    /// Deletion observed while a pass was running; drop the slot when it ends.
    pub deleted: bool,
}

/// Status of an object slot.
#[derive(Debug, Clone)]
pub(super) enum SlotStatus {
    /// No pass running, ready to start one.
    Idle,

    /// Pass currently running.
    Running {
        /// When the pass started.
        started_at: Instant,
        /// Cancels the pass (executor call included).
        token: CancellationToken,
    },
}

impl SlotState {
    /// Creates a new idle slot.
    pub fn new() -> Self {
        Self {
            status: SlotStatus::Idle,
            pending: None,
            timer: CancellationToken::new(),
            failures: 0,
            deleted: false,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, SlotStatus::Running { .. })
    }

    /// Cancels the running pass and any scheduled timer.
    pub fn cancel(&mut self) {
        self.timer.cancel();
        if let SlotStatus::Running { token, .. } = &self.status {
            token.cancel();
        }
    }
}
