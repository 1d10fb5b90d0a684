//! # Run a single executor call.
//!
//! Executes one [`ActionRequest`] with an optional timeout and publishes
//! lifecycle events to [`Bus`].
//!
//! - **Execute ONE call** with a child cancellation token
//! - **Apply timeout** if configured (wraps execution in `tokio::time::timeout`)
//! - **Race cancellation** so a deleted object or a shutdown stops waiting at once
//!
//! ## Event flow
//!
//! ```text
//! Success:
//!   ActionStarting → execute() → Ok(())        → ActionSucceeded
//!
//! Failure:
//!   ActionStarting → execute() → Err(Failed)   → ActionFailed
//!
//! Cancellation:
//!   ActionStarting → token cancelled           → ActionFailed (canceled)
//!
//! Timeout:
//!   ActionStarting → timeout exceeded → cancel child → TimeoutHit
//!                                                    → ActionFailed (timeout)
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event: `ActionSucceeded` or `ActionFailed`
//! - `TimeoutHit` is published **in addition to** `ActionFailed` on timeout
//! - Derives a **child token** per call; cancelling it never affects the parent

use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::{
    error::ExecutorError,
    events::{Bus, Event, EventKind},
    executor::{ActionExecutor, ActionRequest},
    resource::{Mode, ObjectKey},
};

/// Executes `request` once, publishing lifecycle events for `key` to `bus`.
///
/// ### Timeout behavior
/// If `timeout` is `Some(dur)` and `dur > 0` the call is wrapped in
/// `tokio::time::timeout`. On expiry the child token is cancelled, `TimeoutHit`
/// is published and [`ExecutorError::Timeout`] is returned.
///
/// ### Cancellation
/// Parent cancellation propagates to the child token handed to the executor.
/// The runner stops waiting as soon as the token fires and returns
/// [`ExecutorError::Canceled`], even if the executor ignores the token.
pub async fn run_action(
    executor: &dyn ActionExecutor,
    request: &ActionRequest,
    key: &ObjectKey,
    mode: Mode,
    parent: &CancellationToken,
    timeout: Option<Duration>,
    bus: &Bus,
) -> Result<(), ExecutorError> {
    let child = parent.child_token();
    let event = |kind| {
        Event::now(kind)
            .with_key(key)
            .with_mode(mode)
            .with_action(request.action)
    };

    bus.publish(event(EventKind::ActionStarting).with_reason(request.targets_display()));

    let call = async {
        tokio::select! {
            res = executor.execute(request, child.clone()) => res,
            _ = child.cancelled() => Err(ExecutorError::Canceled),
        }
    };

    let res = if let Some(dur) = timeout.filter(|d| *d > Duration::ZERO) {
        match time::timeout(dur, call).await {
            Ok(r) => r,
            Err(_elapsed) => {
                child.cancel();
                bus.publish(event(EventKind::TimeoutHit).with_timeout(dur));
                Err(ExecutorError::Timeout { timeout: dur })
            }
        }
    } else {
        call.await
    };

    match &res {
        Ok(()) => bus.publish(event(EventKind::ActionSucceeded)),
        Err(e) => bus.publish(event(EventKind::ActionFailed).with_reason(e.to_string())),
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Action, InstanceId};
    use async_trait::async_trait;

    struct Sleepy(Duration);

    #[async_trait]
    impl ActionExecutor for Sleepy {
        async fn execute(
            &self,
            _request: &ActionRequest,
            _ctx: CancellationToken,
        ) -> Result<(), ExecutorError> {
            time::sleep(self.0).await;
            Ok(())
        }
    }

    fn request() -> ActionRequest {
        ActionRequest::new(Action::Stop, vec![InstanceId::parse("i-1").unwrap()])
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<EventKind> {
        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        kinds
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_publishes_timeout_then_failure() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let key = ObjectKey::new("ops", "web");

        let err = run_action(
            &Sleepy(Duration::from_secs(60)),
            &request(),
            &key,
            Mode::Immediate,
            &CancellationToken::new(),
            Some(Duration::from_secs(10)),
            &bus,
        )
        .await
        .unwrap_err();

        assert_eq!(
            err,
            ExecutorError::Timeout {
                timeout: Duration::from_secs(10)
            }
        );
        assert_eq!(
            drain(&mut rx),
            vec![
                EventKind::ActionStarting,
                EventKind::TimeoutHit,
                EventKind::ActionFailed
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cancel_is_reported_as_canceled() {
        let bus = Bus::new(16);
        let parent = CancellationToken::new();
        parent.cancel();

        let err = run_action(
            &Sleepy(Duration::from_secs(60)),
            &request(),
            &ObjectKey::new("ops", "web"),
            Mode::Windowed,
            &parent,
            None,
            &bus,
        )
        .await
        .unwrap_err();
        assert_eq!(err, ExecutorError::Canceled);
    }

    #[tokio::test]
    async fn success_publishes_one_terminal_event() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();

        run_action(
            &Sleepy(Duration::ZERO),
            &request(),
            &ObjectKey::new("ops", "web"),
            Mode::Immediate,
            &CancellationToken::new(),
            Some(Duration::from_secs(10)),
            &bus,
        )
        .await
        .unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![EventKind::ActionStarting, EventKind::ActionSucceeded]
        );
    }
}
