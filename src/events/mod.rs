//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Controller` (dispatch, requeue, backoff), `Reconciler`
//!   (decisions, status writes), `runner::run_action` (executor lifecycle),
//!   `Scheduler` (shutdown).
//! - **Consumers**: `Scheduler::subscriber_listener()` fans out to `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
