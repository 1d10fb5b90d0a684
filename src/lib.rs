//! # instancevisor
//!
//! **Instancevisor** reconciles declared start/stop intents for cloud compute
//! instances against what has actually been done to them.
//!
//! A desired-state object names a set of instances, an action (`Start` or
//! `Stop`) and a mode:
//! - **Immediate**: run the action once per spec generation;
//! - **Windowed**: run the action on every pass whose instant falls strictly
//!   inside a daily `HH:MM:SS` window in a fixed reference timezone, and
//!   re-check on a jittered cadence.
//!
//! ## Architecture
//! ```text
//!   watch transport (not part of this crate)
//!          │ ReconcileRequest { key, cause }
//!          ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Scheduler                                                        │
//! │  - Controller (one slot per key, coalescing, timers, backoff)     │
//! │  - Reconciler (fetch ─► plan ─► status ─► executor ─► status)     │
//! │  - Bus + SubscriberSet (events to injected subscribers)           │
//! └──────┬───────────────────────────┬────────────────────────────────┘
//!        ▼                           ▼
//!   StatusStore                 ActionExecutor
//!   (MemoryStore, ...)          (AwsCliExecutor, ...)
//! ```
//!
//! ### Status
//! Status is a typed `(Mode, Phase)` pair plus the spec generation it was
//! computed from. The `"Windowed/InWindow"` style label is derived for display.
//!
//! | Mode      | Phases written                                   |
//! |-----------|--------------------------------------------------|
//! | Immediate | `InProgress` → `Completed` \| `Failed`           |
//! | Windowed  | `InWindow` \| `OutOfWindow`, `Failed` on errors  |
//!
//! ## Features
//! | Area              | Description                                           | Key types / traits                          |
//! |-------------------|-------------------------------------------------------|---------------------------------------------|
//! | **Reconcile**     | One pass over one object, pure planning inside.       | [`Reconciler`], [`Planner`], [`Outcome`]    |
//! | **Windows**       | Daily window evaluation in an IANA timezone.          | [`WindowEvaluator`], [`WindowConfig`]       |
//! | **Controller**    | Per-key serialization, re-checks and retries.         | [`ControllerHandle`], [`AdmissionPolicy`]   |
//! | **Collaborators** | Store and executor seams.                             | [`StatusStore`], [`ActionExecutor`]         |
//! | **Subscriber API**| Hook into runtime events (logging, metrics, custom).  | [`Subscribe`]                               |
//! | **Policies**      | Re-check cadence and retry backoff.                   | [`RequeuePolicy`], [`BackoffPolicy`]        |
//! | **Errors**        | Typed errors with stable labels.                      | [`ReconcileError`], [`RuntimeError`]        |
//! | **Configuration** | Centralized settings, loadable from TOML.             | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging` (default): exports the `tracing`-backed [`LogWriter`] subscriber.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//! use instancevisor::{
//!     Action, ActionExecutor, ActionRequest, DesiredState, ExecutorError, MemoryStore,
//!     ObjectKey, Outcome, Bus, Reconciler,
//! };
//!
//! struct Noop;
//!
//! #[async_trait]
//! impl ActionExecutor for Noop {
//!     async fn execute(&self, _req: &ActionRequest, _ctx: CancellationToken) -> Result<(), ExecutorError> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let key = ObjectKey::new("ops", "batch");
//!     store.apply(key.clone(), DesiredState::immediate(Action::Stop, ["i-1", "i-2"])).await;
//!
//!     let reconciler = Reconciler::new(store.clone(), Arc::new(Noop), Bus::new(64));
//!     let outcome = reconciler.reconcile(&key, &CancellationToken::new()).await?;
//!     assert!(matches!(outcome, Outcome::Applied { executed: true, .. }));
//!
//!     // Second pass: already completed for this generation.
//!     let outcome = reconciler.reconcile(&key, &CancellationToken::new()).await?;
//!     assert!(matches!(outcome, Outcome::Skipped { .. }));
//!     assert_eq!(store.status(&key).await.unwrap().label(), "Immediate/Completed");
//!     Ok(())
//! }
//! ```

pub mod controller;
mod core;
mod error;
pub mod events;
pub mod executor;
pub mod policies;
pub mod resource;
pub mod store;
pub mod subscribers;
pub mod window;

// ---- Public re-exports ----

pub use controller::{
    AdmissionPolicy, Cause, ControllerConfig, ControllerHandle, ReconcileRequest, SubmitError,
};
pub use self::core::{
    Config, DEFAULT_EXECUTOR_TIMEOUT, DEFAULT_STATUS_RETRIES, Outcome, Plan, Planner, Reconciler,
    Scheduler, SchedulerBuilder, SkipReason,
};
pub use error::{ConfigError, ExecutorError, ReconcileError, RuntimeError, StoreError};
pub use events::{Bus, Event, EventKind};
pub use executor::{ActionExecutor, ActionRequest, AwsCliExecutor};
pub use policies::{BackoffPolicy, JitterPolicy, RequeuePolicy};
pub use resource::{
    Action, DEFAULT_NAMESPACE, DesiredState, InstanceId, MAX_INSTANCE_ID_LEN, Mode, ObjectKey,
    ObservedStatus, Phase, TargetError,
};
pub use store::{MemoryStore, Resource, StatusStore};
pub use subscribers::{Subscribe, SubscriberSet};
pub use window::{
    Boundary, BoundaryMode, Clock, DEFAULT_TIMEZONE, FixedClock, SystemClock, WindowConfig,
    WindowDecision, WindowError, WindowEvaluator,
};

// Optional: expose a simple built-in logger subscriber.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
