//! Delay policies.
//!
//! This module groups the knobs that control **how long** to wait before a key
//! is reconciled again.
//!
//! ## Contents
//! - [`RequeuePolicy`] periodic re-check of windowed objects (base + jitter)
//! - [`BackoffPolicy`] retry delay after retryable failures (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid synchronized re-checks
//!
//! ## Quick wiring
//! ```text
//! Reconciler ── Outcome::requeue_after() ◄── RequeuePolicy::next()
//!
//! Controller ── on retryable ReconcileError ─► BackoffPolicy::next(failures)
//!            └─ on success                  ─► failures = 0
//! ```
//!
//! ## Defaults
//! - `RequeuePolicy::default()` → 60s ± 50%.
//! - `BackoffPolicy::default()` → 1s, ×2, capped at 5min, equal jitter.
//! - `JitterPolicy::None` by default.

mod backoff;
mod jitter;
mod requeue;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use requeue::RequeuePolicy;
