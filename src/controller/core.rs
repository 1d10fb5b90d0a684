use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::{Mutex, RwLock, Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
    core::{Outcome, Reconciler},
    error::ReconcileError,
    events::{Bus, Event, EventKind},
    policies::BackoffPolicy,
    resource::ObjectKey,
};

use super::{
    admission::AdmissionPolicy,
    config::ControllerConfig,
    error::SubmitError,
    request::{Cause, ReconcileRequest},
    slot::{SlotState, SlotStatus},
};

/// Handle for submitting reconcile triggers to the controller.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<ReconcileRequest>,
}

impl ControllerHandle {
    /// Submit a trigger (async, waits if queue is full).
    pub async fn submit(&self, req: ReconcileRequest) -> Result<(), SubmitError> {
        self.tx.send(req).await.map_err(|_| SubmitError::Closed)
    }

    /// Try to submit without blocking (fails if queue full).
    pub fn try_submit(&self, req: ReconcileRequest) -> Result<(), SubmitError> {
        self.tx.try_send(req).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SubmitError::Full,
            mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
        })
    }
}

/// How a worker ended.
enum Finished {
    Done(Result<Outcome, ReconcileError>),
    /// Cancelled before the pass started (waiting for a permit).
    Canceled,
    Panicked(String),
}

struct Completion {
    key: ObjectKey,
    finished: Finished,
}

/// Controller manages one slot per object key.
///
/// Each slot runs at most one reconcile pass at a time. Triggers for a busy
/// slot are handled according to the [`AdmissionPolicy`]; re-checks and
/// retries are per-slot timers that feed back into the submission queue.
///
/// ```text
/// submit(req) ──► queue ──► loop ──┬─ Idle    ──► spawn worker ──► Reconciler::reconcile
///                  ▲               ├─ Running ──► coalesce | drop
///                  │               └─ Deleted ──► cancel timer + in-flight token
///                  │
///            timer fires ◄── completion: requeue_after | backoff | follow-up
/// ```
pub struct Controller {
    config: ControllerConfig,
    reconciler: Arc<Reconciler>,
    retry: BackoffPolicy,
    semaphore: Option<Arc<Semaphore>>,
    bus: Bus,

    // Slot table; written only by the controller loop.
    slots: RwLock<HashMap<ObjectKey, SlotState>>,

    // Submission queue.
    tx: mpsc::Sender<ReconcileRequest>,
    rx: Mutex<Option<mpsc::Receiver<ReconcileRequest>>>,
}

impl Controller {
    /// Creates a new controller (must call `.run()` to start).
    pub fn new(
        config: ControllerConfig,
        reconciler: Arc<Reconciler>,
        retry: BackoffPolicy,
        semaphore: Option<Arc<Semaphore>>,
        bus: Bus,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));

        Arc::new(Self {
            config,
            reconciler,
            retry,
            semaphore,
            bus,
            slots: RwLock::new(HashMap::new()),
            tx,
            rx: Mutex::new(Some(rx)),
        })
    }

    /// Returns a handle for submitting triggers.
    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            tx: self.tx.clone(),
        }
    }

    /// Keys with a pass in flight, oldest first.
    pub async fn in_flight(&self) -> Vec<String> {
        let slots = self.slots.read().await;
        let mut running: Vec<(Instant, String)> = slots
            .iter()
            .filter_map(|(key, slot)| match &slot.status {
                SlotStatus::Running { started_at, .. } => Some((*started_at, key.to_string())),
                SlotStatus::Idle => None,
            })
            .collect();
        running.sort();
        running.into_iter().map(|(_, key)| key).collect()
    }

    /// Starts the controller loop (spawns in background).
    ///
    /// The returned handle completes once `token` is cancelled and every
    /// in-flight pass has finished.
    pub fn run(self: Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run_inner(token).await {
                tracing::error!(error = %e, "controller loop failed");
            }
        })
    }

    async fn run_inner(&self, token: CancellationToken) -> anyhow::Result<()> {
        let mut rx = self
            .rx
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow::anyhow!("controller already running"))?;

        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();
        let mut workers = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,

                Some(done) = done_rx.recv() => {
                    self.on_completed(done, &token, &done_tx, &mut workers).await;
                }
                Some(req) = rx.recv() => {
                    self.on_request(req, &token, &done_tx, &mut workers).await;
                }
                Some(_) = workers.join_next(), if !workers.is_empty() => {}
            }
        }

        // Shutdown: every running pass holds a child of `token` and is being
        // cancelled; wait for them so the slot table reflects what is stuck.
        while workers.join_next().await.is_some() {
            while let Ok(done) = done_rx.try_recv() {
                self.mark_idle(&done.key).await;
            }
        }
        while let Ok(done) = done_rx.try_recv() {
            self.mark_idle(&done.key).await;
        }
        Ok(())
    }

    /// Handles one trigger.
    async fn on_request(
        &self,
        req: ReconcileRequest,
        token: &CancellationToken,
        done_tx: &mpsc::UnboundedSender<Completion>,
        workers: &mut JoinSet<()>,
    ) {
        let ReconcileRequest { key, cause } = req;
        let mut slots = self.slots.write().await;

        if cause == Cause::Deleted {
            self.bus
                .publish(Event::now(EventKind::ObjectDeleted).with_key(&key));
            if let Some(slot) = slots.get_mut(&key) {
                slot.cancel();
                if slot.is_running() {
                    slot.deleted = true;
                    slot.pending = None;
                } else {
                    slots.remove(&key);
                }
            }
            return;
        }

        let slot = slots.entry(key.clone()).or_insert_with(SlotState::new);
        if cause == Cause::Applied {
            slot.deleted = false;
        }

        match (slot.is_running(), self.config.admission) {
            (false, _) => {
                self.start(&key, slot, cause, token, done_tx, workers);
            }
            (true, AdmissionPolicy::Coalesce) => {
                slot.pending = Some(cause);
                self.bus.publish(
                    Event::now(EventKind::ReconcileCoalesced)
                        .with_key(&key)
                        .with_reason(cause.as_str()),
                );
            }
            (true, AdmissionPolicy::DropIfRunning) => {
                self.bus.publish(
                    Event::now(EventKind::ReconcileDropped)
                        .with_key(&key)
                        .with_reason(cause.as_str()),
                );
            }
        }
    }

    /// Handles the end of a pass: requeue, backoff, follow-up.
    async fn on_completed(
        &self,
        done: Completion,
        token: &CancellationToken,
        done_tx: &mpsc::UnboundedSender<Completion>,
        workers: &mut JoinSet<()>,
    ) {
        let Completion { key, finished } = done;
        let mut slots = self.slots.write().await;
        let Some(slot) = slots.get_mut(&key) else {
            return;
        };
        slot.status = SlotStatus::Idle;

        if slot.deleted {
            slots.remove(&key);
            return;
        }

        match finished {
            Finished::Done(Ok(Outcome::NotFound)) => {
                if slot.pending.is_none() {
                    slots.remove(&key);
                    return;
                }
            }
            Finished::Done(Ok(outcome)) => {
                slot.failures = 0;
                if let Some(delay) = outcome.requeue_after() {
                    self.schedule(&key, slot, delay, Cause::Requeue, token);
                    self.bus.publish(
                        Event::now(EventKind::RequeueScheduled)
                            .with_key(&key)
                            .with_delay(delay),
                    );
                }
            }
            Finished::Done(Err(e)) => {
                let reason = format!("{}: {e}", e.as_label());
                self.bus.publish(
                    Event::now(EventKind::ReconcileFailed)
                        .with_key(&key)
                        .with_reason(reason.as_str()),
                );
                if e.is_retryable() {
                    self.backoff(&key, slot, &reason, token);
                }
            }
            Finished::Panicked(info) => {
                let reason = format!("reconcile panicked: {info}");
                self.bus.publish(
                    Event::now(EventKind::ReconcileFailed)
                        .with_key(&key)
                        .with_reason(reason.as_str()),
                );
                self.backoff(&key, slot, &reason, token);
            }
            Finished::Canceled => {}
        }

        if let Some(cause) = slot.pending.take() {
            self.start(&key, slot, cause, token, done_tx, workers);
        }
    }

    /// Marks a slot idle during shutdown (no follow-ups).
    async fn mark_idle(&self, key: &ObjectKey) {
        if let Some(slot) = self.slots.write().await.get_mut(key) {
            slot.status = SlotStatus::Idle;
        }
    }

    /// Spawns one reconcile pass for `key`.
    fn start(
        &self,
        key: &ObjectKey,
        slot: &mut SlotState,
        cause: Cause,
        token: &CancellationToken,
        done_tx: &mpsc::UnboundedSender<Completion>,
        workers: &mut JoinSet<()>,
    ) {
        // The new pass supersedes any scheduled timer; it schedules its own.
        slot.timer.cancel();

        let child = token.child_token();
        slot.status = SlotStatus::Running {
            started_at: Instant::now(),
            token: child.clone(),
        };
        self.bus.publish(
            Event::now(EventKind::ReconcileStarted)
                .with_key(key)
                .with_reason(cause.as_str()),
        );

        let reconciler = Arc::clone(&self.reconciler);
        let semaphore = self.semaphore.clone();
        let done_tx = done_tx.clone();
        let key = key.clone();

        workers.spawn(async move {
            let _permit = match semaphore {
                Some(sem) => tokio::select! {
                    permit = sem.acquire_owned() => permit.ok(),
                    _ = child.cancelled() => {
                        let _ = done_tx.send(Completion { key, finished: Finished::Canceled });
                        return;
                    }
                },
                None => None,
            };

            let pass = std::panic::AssertUnwindSafe(reconciler.reconcile(&key, &child));
            let finished = match pass.catch_unwind().await {
                Ok(result) => Finished::Done(result),
                Err(panic) => Finished::Panicked(panic_message(panic.as_ref())),
            };
            let _ = done_tx.send(Completion { key, finished });
        });
    }

    /// Schedules a retry after a retryable failure.
    fn backoff(&self, key: &ObjectKey, slot: &mut SlotState, reason: &str, token: &CancellationToken) {
        let delay = self.retry.next(slot.failures);
        slot.failures = slot.failures.saturating_add(1);
        self.schedule(key, slot, delay, Cause::Retry, token);
        self.bus.publish(
            Event::now(EventKind::BackoffScheduled)
                .with_key(key)
                .with_delay(delay)
                .with_attempt(slot.failures)
                .with_reason(reason),
        );
    }

    /// Replaces the slot timer with one that submits `cause` after `delay`.
    fn schedule(
        &self,
        key: &ObjectKey,
        slot: &mut SlotState,
        delay: Duration,
        cause: Cause,
        token: &CancellationToken,
    ) {
        slot.timer.cancel();
        let timer = token.child_token();
        slot.timer = timer.clone();

        let tx = self.tx.clone();
        let req = ReconcileRequest::new(key.clone(), cause);
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(req).await;
                }
            }
        });
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
