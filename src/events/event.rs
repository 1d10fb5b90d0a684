//! # Runtime events emitted by the controller, reconciler and runner.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Dispatch events**: what the controller did with a trigger
//! - **Decision events**: what a reconcile pass decided
//! - **Action events**: executor call lifecycle (starting, succeeded, failed, timeout)
//! - **Runtime events**: shutdown and subscriber health
//!
//! The [`Event`] struct carries the object key, mode, action and phase the
//! event refers to, so every log line can be traced back to one object.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use instancevisor::{Action, Event, EventKind, Mode, ObjectKey};
//!
//! let ev = Event::now(EventKind::ActionFailed)
//!     .with_key(&ObjectKey::new("ops", "nightly"))
//!     .with_mode(Mode::Windowed)
//!     .with_action(Action::Stop)
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::ActionFailed);
//! assert_eq!(ev.key.as_deref(), Some("ops/nightly"));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::resource::{Action, Mode, ObjectKey, ObservedStatus, Phase};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `reason` (subscriber name and panic info)
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `reason`
    SubscriberOverflow,

    // === Shutdown events ===
    /// Shutdown requested (OS signal or explicit shutdown).
    ShutdownRequested,

    /// All in-flight reconciles finished within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some reconciles did not finish in time.
    GraceExceeded,

    // === Dispatch events ===
    /// Trigger accepted and a reconcile pass is being started.
    ///
    /// Sets: `key`, `reason` (trigger cause)
    ReconcileStarted,

    /// Trigger arrived while the key was busy and was merged into one follow-up pass.
    ///
    /// Sets: `key`, `reason` (trigger cause)
    ReconcileCoalesced,

    /// Trigger arrived while the key was busy and was dropped.
    ///
    /// Sets: `key`, `reason` (trigger cause)
    ReconcileDropped,

    /// Reconcile pass returned an error.
    ///
    /// Sets: `key`, `reason` (error label and message)
    ReconcileFailed,

    /// Object deletion observed; timers and in-flight work for the key are cancelled.
    ///
    /// Sets: `key`
    ObjectDeleted,

    /// Periodic re-check scheduled.
    ///
    /// Sets: `key`, `delay_ms`
    RequeueScheduled,

    /// Retry scheduled after a retryable failure.
    ///
    /// Sets: `key`, `delay_ms`, `attempt` (consecutive failures), `reason`
    BackoffScheduled,

    // === Decision events ===
    /// Object was not found in the store; nothing to do.
    ///
    /// Sets: `key`
    ObjectNotFound,

    /// `mode` absent or unrecognized; no action taken.
    ///
    /// Sets: `key`, `reason`
    ModeUnrecognized,

    /// Immediate action already completed for this spec generation.
    ///
    /// Sets: `key`, `mode`, `action`
    AlreadyCompleted,

    /// Windowed object evaluated outside its window.
    ///
    /// Sets: `key`, `mode`, `action`
    OutOfWindow,

    /// Spec is invalid (window boundaries or targets).
    ///
    /// Sets: `key`, `mode`, `action`, `reason`
    ConfigurationInvalid,

    // === Status events ===
    /// Status patched in the store.
    ///
    /// Sets: `key`, `mode`, `phase`
    StatusUpdated,

    /// Computed status equals the stored one; write skipped.
    ///
    /// Sets: `key`, `mode`, `phase`
    StatusUnchanged,

    /// Status write hit a concurrent modification; retrying with a fresh read.
    ///
    /// Sets: `key`, `attempt`
    StatusConflict,

    // === Action events ===
    /// Executor call starting.
    ///
    /// Sets: `key`, `mode`, `action`, `reason` (target list)
    ActionStarting,

    /// Executor call succeeded.
    ///
    /// Sets: `key`, `mode`, `action`
    ActionSucceeded,

    /// Executor call failed, timed out or was cancelled.
    ///
    /// Sets: `key`, `mode`, `action`, `reason`
    ActionFailed,

    /// Executor call exceeded its timeout (always followed by `ActionFailed`).
    ///
    /// Sets: `key`, `mode`, `action`, `timeout_ms`
    TimeoutHit,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    pub kind: EventKind,

    /// Object key (`namespace/name`), if applicable.
    pub key: Option<Arc<str>>,
    pub mode: Option<Mode>,
    pub action: Option<Action>,
    pub phase: Option<Phase>,

    /// Human-readable reason (errors, causes, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Delay before the next pass in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Executor timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Attempt or failure count.
    pub attempt: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            key: None,
            mode: None,
            action: None,
            phase: None,
            reason: None,
            delay_ms: None,
            timeout_ms: None,
            attempt: None,
        }
    }

    #[inline]
    pub fn with_key(mut self, key: &ObjectKey) -> Self {
        self.key = Some(key.to_string().into());
        self
    }

    #[inline]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    #[inline]
    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Attaches mode and phase of a status.
    #[inline]
    pub fn with_status(mut self, status: &ObservedStatus) -> Self {
        self.mode = Some(status.mode);
        self.phase = Some(status.phase);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::now(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::now(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} panic={info}"))
    }

    /// True for events about subscriber health; these are never re-broadcast to subscribers.
    #[inline]
    pub fn is_subscriber_health(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
