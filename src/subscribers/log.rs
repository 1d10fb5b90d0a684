//! # Structured logging subscriber.
//!
//! [`LogWriter`] turns runtime events into `tracing` records. Every record
//! carries the object key plus mode/action/phase when the event has them, so a
//! failed pass can be diagnosed from the log alone.
//!
//! Install any `tracing` subscriber (e.g. `tracing-subscriber`'s `fmt`) to see
//! the output:
//! ```text
//! INFO  reconcile started key=ops/nightly cause=applied
//! INFO  status updated key=ops/nightly mode=Windowed phase=InWindow
//! ERROR action failed key=ops/nightly mode=Windowed action=Stop reason="timed out after 10s"
//! INFO  requeue scheduled key=ops/nightly delay_ms=47213
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// `tracing`-backed logging subscriber (feature `logging`).
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let key = e.key.as_deref().unwrap_or("-");
        let mode = e.mode.map(|m| m.as_str()).unwrap_or("-");
        let action = e.action.map(|a| a.as_str()).unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::ReconcileStarted => {
                tracing::debug!(key, cause = reason, "reconcile started");
            }
            EventKind::ReconcileCoalesced | EventKind::ReconcileDropped => {
                tracing::debug!(key, cause = reason, kind = ?e.kind, "trigger while busy");
            }
            EventKind::ReconcileFailed => {
                tracing::warn!(key, reason, "reconcile failed");
            }
            EventKind::ObjectDeleted => {
                tracing::info!(key, "object deleted");
            }
            EventKind::ObjectNotFound => {
                tracing::debug!(key, "object not found");
            }
            EventKind::ModeUnrecognized => {
                tracing::warn!(key, reason, "invalid mode specified, ignoring object");
            }
            EventKind::AlreadyCompleted => {
                tracing::debug!(key, mode, action, "ignoring already processed object");
            }
            EventKind::OutOfWindow => {
                tracing::info!(key, mode, action, "outside scheduled time window");
            }
            EventKind::ConfigurationInvalid => {
                tracing::error!(key, mode, action, reason, "invalid configuration");
            }
            EventKind::StatusUpdated => {
                let phase = e.phase.map(|p| p.as_str()).unwrap_or("-");
                tracing::info!(key, mode, phase, "status updated");
            }
            EventKind::StatusUnchanged => {
                let phase = e.phase.map(|p| p.as_str()).unwrap_or("-");
                tracing::trace!(key, mode, phase, "status unchanged");
            }
            EventKind::StatusConflict => {
                tracing::debug!(key, attempt = e.attempt, "status write conflict, re-reading");
            }
            EventKind::ActionStarting => {
                tracing::info!(key, mode, action, targets = reason, "action starting");
            }
            EventKind::ActionSucceeded => {
                tracing::info!(key, mode, action, "action succeeded");
            }
            EventKind::ActionFailed => {
                tracing::error!(key, mode, action, reason, "action failed");
            }
            EventKind::TimeoutHit => {
                tracing::warn!(key, mode, action, timeout_ms = e.timeout_ms, "action timed out");
            }
            EventKind::RequeueScheduled => {
                tracing::debug!(key, delay_ms = e.delay_ms, "requeue scheduled");
            }
            EventKind::BackoffScheduled => {
                tracing::warn!(
                    key,
                    delay_ms = e.delay_ms,
                    failures = e.attempt,
                    reason,
                    "retry scheduled"
                );
            }
            EventKind::ShutdownRequested => {
                tracing::info!("shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                tracing::info!("all reconciles stopped within grace");
            }
            EventKind::GraceExceeded => {
                tracing::error!(reason, "grace exceeded");
            }
            // Filtered by `wants`; `SubscriberSet` warns about these itself.
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {}
        }
    }

    fn wants(&self, e: &Event) -> bool {
        !e.is_subscriber_health()
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
