//! Runtime core: reconciliation and lifecycle.
//!
//! The public entry point is [`Scheduler`], which runs the controller loop,
//! event delivery and graceful shutdown. [`Reconciler`] can also be used on
//! its own for one-off passes.
//!
//! Internal modules:
//! - [`plan`]: pure decision of what a pass should do;
//! - [`reconciler`]: carries a plan out against the store and the executor;
//! - [`runner`]: executes one executor call with timeout/cancellation and event publishing;
//! - [`scheduler`]: wires everything together, handles shutdown;
//! - [`shutdown`]: cross-platform shutdown signal handling;
//! - [`config`]: runtime configuration and TOML loading.

mod builder;
mod config;
mod plan;
mod reconciler;
mod runner;
mod scheduler;
mod shutdown;

pub use builder::SchedulerBuilder;
pub use config::Config;
pub use plan::{Plan, Planner, SkipReason};
pub use reconciler::{DEFAULT_EXECUTOR_TIMEOUT, DEFAULT_STATUS_RETRIES, Outcome, Reconciler};
pub use scheduler::Scheduler;
