//! # Reconciler: one pass over one desired-state object.
//!
//! [`Reconciler::reconcile`] fetches the object, asks the [`Planner`] what to
//! do, records status, calls the executor through the runner and returns an
//! [`Outcome`] carrying the re-check directive.
//!
//! ## Pass
//! ```text
//! fetch(key) ── None ──► Outcome::NotFound
//!     │
//!  plan(spec, generation, status, clock.now())
//!     ├─ Skip    ──► Outcome::Skipped            (status untouched)
//!     ├─ Reject  ──► write <Mode>/Failed ──► Err(Configuration)
//!     ├─ Record  ──► write Windowed/OutOfWindow ──► Applied { requeue }
//!     └─ Execute ──► write InProgress|InWindow
//!                      └─ run_action()
//!                           ├─ Ok  ──► write Completed|InWindow ──► Applied
//!                           └─ Err ──► write <Mode>/Failed ──► Err(Executor)
//! ```
//!
//! ## Status writes
//! - Diffed: a status equal to the stored one is not written.
//! - Guarded by `resource_version`; a conflict re-reads the object and tries
//!   again, up to `status_retries` attempts.
//! - If the re-read shows a newer generation, the pass stops with
//!   [`ReconcileError::Superseded`]; nothing planned from the old spec runs.
//! - An object that disappears mid-pass ends the pass with
//!   [`Outcome::NotFound`].
//!
//! The reconciler holds no state between passes; concurrent passes for the
//! same key are prevented by the controller, not here.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::plan::{Plan, Planner, SkipReason};
use super::runner::run_action;
use crate::{
    error::{ReconcileError, StoreError},
    events::{Bus, Event, EventKind},
    executor::ActionExecutor,
    policies::RequeuePolicy,
    resource::{Mode, ObjectKey, ObservedStatus, Phase},
    store::{Resource, StatusStore},
    window::{Clock, SystemClock, WindowEvaluator},
};

/// Default number of status write attempts before giving up on conflicts.
pub const DEFAULT_STATUS_RETRIES: u32 = 3;

/// Default executor timeout.
pub const DEFAULT_EXECUTOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a successful pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The object does not exist (or vanished mid-pass). Nothing to do.
    NotFound,

    /// Nothing was done and status was left as is.
    Skipped { status: Option<ObservedStatus> },

    /// Status was recorded (and the executor called when `executed`).
    Applied {
        status: ObservedStatus,
        executed: bool,
        requeue_after: Option<Duration>,
    },
}

impl Outcome {
    /// Delay before the next re-check, if any.
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            Outcome::Applied { requeue_after, .. } => *requeue_after,
            Outcome::NotFound | Outcome::Skipped { .. } => None,
        }
    }
}

/// What happened to one status write.
enum Write {
    Done,
    Vanished,
}

/// Last known version and status of the object being reconciled.
struct Cursor {
    generation: u64,
    version: u64,
    status: Option<ObservedStatus>,
}

/// Drives one reconcile pass per call.
pub struct Reconciler {
    store: Arc<dyn StatusStore>,
    executor: Arc<dyn ActionExecutor>,
    planner: Planner,
    clock: Arc<dyn Clock>,
    requeue: RequeuePolicy,
    executor_timeout: Option<Duration>,
    status_retries: u32,
    bus: Bus,
}

impl Reconciler {
    /// Creates a reconciler with default policies and the system clock.
    pub fn new(store: Arc<dyn StatusStore>, executor: Arc<dyn ActionExecutor>, bus: Bus) -> Self {
        Self {
            store,
            executor,
            planner: Planner::default(),
            clock: Arc::new(SystemClock),
            requeue: RequeuePolicy::default(),
            executor_timeout: Some(DEFAULT_EXECUTOR_TIMEOUT),
            status_retries: DEFAULT_STATUS_RETRIES,
            bus,
        }
    }

    pub fn with_evaluator(mut self, evaluator: WindowEvaluator) -> Self {
        self.planner = Planner::new(evaluator);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_requeue(mut self, requeue: RequeuePolicy) -> Self {
        self.requeue = requeue;
        self
    }

    /// `None` (or zero) disables the timeout.
    pub fn with_executor_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.executor_timeout = timeout;
        self
    }

    pub fn with_status_retries(mut self, attempts: u32) -> Self {
        self.status_retries = attempts.max(1);
        self
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// Runs one pass for `key`.
    ///
    /// `token` cancels an in-flight executor call (object deleted, shutdown).
    ///
    /// # Errors
    /// - [`ReconcileError::Configuration`] invalid window or targets (status records `Failed`).
    /// - [`ReconcileError::Executor`] the action failed (status records `Failed`).
    /// - [`ReconcileError::StatusConflict`] status could not be written.
    /// - [`ReconcileError::Superseded`] the spec changed while the pass was writing status.
    /// - [`ReconcileError::Store`] any other store failure.
    pub async fn reconcile(
        &self,
        key: &ObjectKey,
        token: &CancellationToken,
    ) -> Result<Outcome, ReconcileError> {
        let Some(res) = self.fetch(key).await? else {
            self.bus
                .publish(Event::now(EventKind::ObjectNotFound).with_key(key));
            return Ok(Outcome::NotFound);
        };

        let Resource {
            generation,
            resource_version,
            spec,
            status,
            ..
        } = res;
        let plan = self
            .planner
            .plan(&spec, generation, status.as_ref(), self.clock.now());
        let mut cursor = Cursor {
            generation,
            version: resource_version,
            status,
        };

        match plan {
            Plan::Skip { reason } => {
                let ev = match reason {
                    SkipReason::AlreadyCompleted => Event::now(EventKind::AlreadyCompleted)
                        .with_mode(Mode::Immediate)
                        .with_action(spec.action),
                    SkipReason::UnrecognizedMode => Event::now(EventKind::ModeUnrecognized)
                        .with_reason(match spec.mode {
                            Some(_) => "mode not recognized",
                            None => "mode not set",
                        }),
                };
                self.bus.publish(ev.with_key(key));
                Ok(Outcome::Skipped {
                    status: cursor.status,
                })
            }

            Plan::Reject { status, reason } => {
                self.bus.publish(
                    Event::now(EventKind::ConfigurationInvalid)
                        .with_key(key)
                        .with_mode(status.mode)
                        .with_action(spec.action)
                        .with_reason(reason.as_str()),
                );
                if let Write::Vanished = self.write_status(key, &mut cursor, &status).await? {
                    return Ok(Outcome::NotFound);
                }
                Err(ReconcileError::Configuration {
                    key: key.clone(),
                    mode: status.mode,
                    reason,
                })
            }

            Plan::Record { status, requeue } => {
                self.bus.publish(
                    Event::now(EventKind::OutOfWindow)
                        .with_key(key)
                        .with_mode(status.mode)
                        .with_action(spec.action),
                );
                if let Write::Vanished = self.write_status(key, &mut cursor, &status).await? {
                    return Ok(Outcome::NotFound);
                }
                Ok(Outcome::Applied {
                    status,
                    executed: false,
                    requeue_after: requeue.then(|| self.requeue.next()),
                })
            }

            Plan::Execute {
                mode,
                pending,
                request,
                requeue,
            } => {
                if let Write::Vanished = self.write_status(key, &mut cursor, &pending).await? {
                    return Ok(Outcome::NotFound);
                }

                let result = run_action(
                    self.executor.as_ref(),
                    &request,
                    key,
                    mode,
                    token,
                    self.executor_timeout,
                    &self.bus,
                )
                .await;

                match result {
                    Ok(()) => {
                        let status = match mode {
                            Mode::Immediate => {
                                ObservedStatus::new(mode, Phase::Completed, generation)
                            }
                            _ => pending,
                        };
                        if let Write::Vanished =
                            self.write_status(key, &mut cursor, &status).await?
                        {
                            return Ok(Outcome::NotFound);
                        }
                        Ok(Outcome::Applied {
                            status,
                            executed: true,
                            requeue_after: requeue.then(|| self.requeue.next()),
                        })
                    }
                    Err(source) => {
                        let failed = ObservedStatus::new(mode, Phase::Failed, generation)
                            .with_message(source.to_string());
                        if let Write::Vanished =
                            self.write_status(key, &mut cursor, &failed).await?
                        {
                            return Ok(Outcome::NotFound);
                        }
                        Err(ReconcileError::Executor {
                            key: key.clone(),
                            mode,
                            action: request.action,
                            source,
                        })
                    }
                }
            }
        }
    }

    async fn fetch(&self, key: &ObjectKey) -> Result<Option<Resource>, ReconcileError> {
        self.store
            .fetch(key)
            .await
            .map_err(|source| ReconcileError::Store {
                key: key.clone(),
                source,
            })
    }

    /// Writes `desired` unless the stored status already equals it.
    async fn write_status(
        &self,
        key: &ObjectKey,
        cursor: &mut Cursor,
        desired: &ObservedStatus,
    ) -> Result<Write, ReconcileError> {
        let mut attempt = 0;
        loop {
            if cursor.status.as_ref() == Some(desired) {
                self.bus.publish(
                    Event::now(EventKind::StatusUnchanged)
                        .with_key(key)
                        .with_status(desired),
                );
                return Ok(Write::Done);
            }

            attempt += 1;
            match self.store.patch_status(key, cursor.version, desired).await {
                Ok(version) => {
                    cursor.version = version;
                    cursor.status = Some(desired.clone());
                    self.bus.publish(
                        Event::now(EventKind::StatusUpdated)
                            .with_key(key)
                            .with_status(desired),
                    );
                    return Ok(Write::Done);
                }
                Err(StoreError::NotFound { .. }) => return Ok(Write::Vanished),
                Err(StoreError::Conflict { .. }) => {
                    self.bus.publish(
                        Event::now(EventKind::StatusConflict)
                            .with_key(key)
                            .with_attempt(attempt),
                    );
                    if attempt >= self.status_retries {
                        return Err(ReconcileError::StatusConflict {
                            key: key.clone(),
                            attempts: attempt,
                        });
                    }
                    match self.fetch(key).await? {
                        Some(fresh) if fresh.generation != cursor.generation => {
                            return Err(ReconcileError::Superseded {
                                key: key.clone(),
                                planned: cursor.generation,
                                current: fresh.generation,
                            });
                        }
                        Some(fresh) => {
                            cursor.version = fresh.resource_version;
                            cursor.status = fresh.status;
                        }
                        None => return Ok(Write::Vanished),
                    }
                }
                Err(source) => {
                    return Err(ReconcileError::Store {
                        key: key.clone(),
                        source,
                    });
                }
            }
        }
    }
}
