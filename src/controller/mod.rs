//! # Controller: per-key serialization of reconcile passes.
//!
//! Triggers (`ReconcileRequest { key, cause }`) are submitted through a
//! [`ControllerHandle`]. The controller keeps one slot per object key and
//! guarantees that at most one reconcile pass runs per key at any time.
//!
//! - Triggers for a busy key follow the [`AdmissionPolicy`].
//! - A pass that returns `requeue_after` schedules a re-check timer.
//! - A retryable error schedules a retry with the configured backoff.
//! - `Cause::Deleted` cancels the key's timer and its in-flight pass.

pub mod admission;
pub mod config;
pub mod error;
pub mod request;

mod core;
mod slot;

pub use admission::AdmissionPolicy;
pub use config::ControllerConfig;
pub use self::core::{Controller, ControllerHandle};
pub use error::SubmitError;
pub use request::{Cause, ReconcileRequest};
