use std::sync::Arc;

use tokio::sync::{self, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{config::Config, reconciler::Reconciler, scheduler::Scheduler};
use crate::{
    controller::Controller,
    events::{Bus, Event},
    executor::ActionExecutor,
    store::StatusStore,
    subscribers::{Subscribe, SubscriberSet},
    window::{Clock, SystemClock, WindowEvaluator},
};

/// Builder for constructing a [`Scheduler`].
pub struct SchedulerBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    clock: Arc<dyn Clock>,
}

impl SchedulerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (dispatch, decisions, status writes,
    /// executor calls) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Replaces the wall clock used for window decisions.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the scheduler and starts its controller loop.
    ///
    /// Must be called from within a tokio runtime:
    /// - Event bus and subscriber workers
    /// - Reconciler configured from [`Config`]
    /// - Controller loop (running until shutdown)
    pub fn build(
        self,
        store: Arc<dyn StatusStore>,
        executor: Arc<dyn ActionExecutor>,
    ) -> Arc<Scheduler> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let subscriber_count = subs.len();
        let listener_token = CancellationToken::new();
        let listener = subscriber_listener(&bus, subs, listener_token.clone());
        let runtime_token = CancellationToken::new();

        let semaphore = self
            .cfg
            .concurrency_limit()
            .map(sync::Semaphore::new)
            .map(Arc::new);

        let reconciler = Arc::new(
            Reconciler::new(store, executor, bus.clone())
                .with_evaluator(WindowEvaluator::new(self.cfg.window.clone()))
                .with_clock(self.clock)
                .with_requeue(self.cfg.requeue)
                .with_executor_timeout(self.cfg.executor_timeout())
                .with_status_retries(self.cfg.status_retries),
        );

        let controller = Controller::new(
            self.cfg.controller.clone(),
            Arc::clone(&reconciler),
            self.cfg.retry,
            semaphore,
            bus.clone(),
        );
        let task = Arc::clone(&controller).run(runtime_token.clone());

        Arc::new(Scheduler {
            cfg: self.cfg,
            bus,
            subscriber_count,
            listener: sync::Mutex::new(Some(listener)),
            listener_token,
            reconciler,
            controller,
            controller_task: sync::Mutex::new(Some(task)),
            runtime_token,
        })
    }
}

/// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
///
/// Subscriber health events are not forwarded, so a failing subscriber
/// cannot feed itself. Once `stop` fires, events already on the bus are
/// forwarded, then the set is shut down and its workers joined.
fn subscriber_listener(bus: &Bus, set: SubscriberSet, stop: CancellationToken) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                biased;
                received = rx.recv() => received,
                _ = stop.cancelled() => break,
            };
            match received {
                Ok(ev) => forward(&set, &ev),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber listener lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }

        loop {
            match rx.try_recv() {
                Ok(ev) => forward(&set, &ev),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber listener lagged behind the bus");
                }
                Err(_) => break,
            }
        }
        set.shutdown().await;
    })
}

fn forward(set: &SubscriberSet, ev: &Event) {
    if !ev.is_subscriber_health() {
        set.emit(ev);
    }
}
