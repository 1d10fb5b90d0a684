//! # Scheduler: wires the reconciler, the controller and event delivery.
//!
//! The [`Scheduler`] owns the event bus, the [`SubscriberSet`](crate::SubscriberSet), the
//! [`Reconciler`] and the [`Controller`] loop. Triggers go in through
//! [`Scheduler::handle`]; [`Scheduler::run`] waits for a termination signal
//! (or [`Scheduler::shutdown`]) and then drains in-flight passes within
//! [`Config::grace`].
//!
//! ## High-level architecture
//! ```text
//! watch transport ── ReconcileRequest ──► ControllerHandle ──► Controller loop
//!                                                                   │ (one slot per key)
//!                                                                   ▼
//!                                         Reconciler::reconcile(key, child_token)
//!                                            │  fetch / plan / patch_status
//!                                            ▼
//!                                  StatusStore        ActionExecutor (via runner)
//!
//! Event flow:
//!   Controller / Reconciler / runner ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit
//!
//! Shutdown path:
//!   signal or shutdown()
//!         └─► Bus.publish(ShutdownRequested)
//!         └─► runtime_token.cancel()   → in-flight passes and timers
//!         └─► wait for controller loop within cfg.grace:
//!                ├─ Ok      → Bus.publish(AllStoppedWithin)
//!                └─ Timeout → Bus.publish(GraceExceeded), RuntimeError::GraceExceeded { stuck }
//!         └─► stop listener, drain queued events into subscribers, join their workers
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use instancevisor::{
//!     Action, AwsCliExecutor, Config, DesiredState, MemoryStore, ObjectKey,
//!     ReconcileRequest, Scheduler,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let key = ObjectKey::new("ops", "nightly-stop");
//!     store
//!         .apply(
//!             key.clone(),
//!             DesiredState::windowed(Action::Stop, ["i-0abc"], "20:00:00", "23:59:00"),
//!         )
//!         .await;
//!
//!     let scheduler = Scheduler::builder(Config::default())
//!         .build(store, Arc::new(AwsCliExecutor::new()));
//!     scheduler.handle().submit(ReconcileRequest::applied(key)).await?;
//!
//!     scheduler.run().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{builder::SchedulerBuilder, config::Config, reconciler::Reconciler, shutdown};
use crate::{
    controller::{Controller, ControllerHandle},
    error::RuntimeError,
    events::{Bus, Event, EventKind},
};

/// Coordinates the controller loop, event delivery and graceful shutdown.
pub struct Scheduler {
    pub(super) cfg: Config,
    pub(super) bus: Bus,
    pub(super) subscriber_count: usize,
    pub(super) listener: Mutex<Option<JoinHandle<()>>>,
    pub(super) listener_token: CancellationToken,
    pub(super) reconciler: Arc<Reconciler>,
    pub(super) controller: Arc<Controller>,
    pub(super) controller_task: Mutex<Option<JoinHandle<()>>>,
    pub(super) runtime_token: CancellationToken,
}

impl Scheduler {
    /// Starts building a scheduler.
    pub fn builder(cfg: Config) -> SchedulerBuilder {
        SchedulerBuilder::new(cfg)
    }

    /// Handle for submitting reconcile triggers.
    pub fn handle(&self) -> ControllerHandle {
        self.controller.handle()
    }

    /// The reconciler driven by the controller, for one-off passes.
    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Number of subscribers receiving events.
    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count
    }

    /// Keys with a reconcile pass in flight.
    pub async fn in_flight(&self) -> Vec<String> {
        self.controller.in_flight().await
    }

    /// Requests shutdown; [`run`](Self::run) then drains within the grace period.
    pub fn shutdown(&self) {
        if !self.runtime_token.is_cancelled() {
            self.bus.publish(
                Event::now(EventKind::ShutdownRequested).with_reason("shutdown requested"),
            );
            self.runtime_token.cancel();
        }
    }

    /// Runs until a termination signal or [`shutdown`](Self::shutdown), then
    /// waits for in-flight passes.
    ///
    /// # Errors
    /// [`RuntimeError::GraceExceeded`] if passes are still running after
    /// [`Config::grace`].
    pub async fn run(&self) -> Result<(), RuntimeError> {
        let signal = async {
            match shutdown::wait_for_shutdown_signal().await {
                Ok(name) => name,
                Err(e) => {
                    tracing::warn!(error = %e, "signal handlers unavailable, waiting for shutdown()");
                    std::future::pending().await
                }
            }
        };

        tokio::select! {
            name = signal => {
                self.bus.publish(Event::now(EventKind::ShutdownRequested).with_reason(name));
                self.runtime_token.cancel();
            }
            _ = self.runtime_token.cancelled() => {}
        }

        self.wait_with_grace().await
    }

    /// Waits for the controller loop to drain within the configured grace period.
    ///
    /// Publishes [`EventKind::AllStoppedWithin`] on success, or
    /// [`EventKind::GraceExceeded`] on timeout and returns
    /// [`RuntimeError::GraceExceeded`] with the keys still in flight.
    /// Either way subscribers see the final event before this returns.
    async fn wait_with_grace(&self) -> Result<(), RuntimeError> {
        let Some(task) = self.controller_task.lock().await.take() else {
            return Ok(());
        };
        let grace = self.cfg.grace;

        let res = match tokio::time::timeout(grace, task).await {
            Ok(_) => {
                self.bus.publish(Event::now(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                let stuck = self.controller.in_flight().await;
                self.bus.publish(
                    Event::now(EventKind::GraceExceeded).with_reason(stuck.join(",")),
                );
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        };
        self.close_subscribers().await;
        res
    }

    /// Stops the subscriber listener and waits for subscriber queues to drain.
    ///
    /// Bounded by [`Config::grace`] so a stuck subscriber cannot block exit.
    async fn close_subscribers(&self) {
        self.listener_token.cancel();
        let Some(listener) = self.listener.lock().await.take() else {
            return;
        };
        if tokio::time::timeout(self.cfg.grace, listener).await.is_err() {
            tracing::warn!("subscribers did not drain within grace");
        }
    }
}
