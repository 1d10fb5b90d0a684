//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`]
//! fan-out used to deliver runtime events published on the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Controller / Reconciler / Runner ── publish(Event) ──► Bus ──► SubscriberSet
//!                                                                   │
//!                                                      ┌────────────┼────────────┐
//!                                                      ▼            ▼            ▼
//!                                                  LogWriter     Metrics       Custom
//! ```
//!
//! Subscribers are injected through
//! [`SchedulerBuilder::with_subscribers`](crate::SchedulerBuilder::with_subscribers).

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscriber;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
