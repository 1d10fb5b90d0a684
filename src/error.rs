//! Error types used by the scheduler runtime, the reconciler and its collaborators.
//!
//! - [`RuntimeError`] errors raised by the runtime itself (shutdown).
//! - [`ReconcileError`] outcome of a failed reconcile pass.
//! - [`ExecutorError`] failures of the action executor.
//! - [`StoreError`] failures of the desired-state store.
//! - [`ConfigError`] invalid configuration files.
//!
//! Every type provides `as_label()`, a short stable snake_case label for logs
//! and metrics.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::resource::{Action, Mode, ObjectKey};

/// # Errors produced by the scheduler runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some reconciles were still in flight.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        grace: Duration,
        /// Keys whose reconcile did not finish in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use instancevisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// # Errors produced by an [`ActionExecutor`](crate::ActionExecutor).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// The call exceeded the configured executor timeout.
    #[error("timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The executor ran and reported a failure for at least one target.
    #[error("execution failed: {detail}")]
    Failed { detail: String },

    /// The call was cancelled (object deleted or runtime shutting down).
    #[error("execution cancelled")]
    Canceled,
}

impl ExecutorError {
    pub fn failed(detail: impl Into<String>) -> Self {
        ExecutorError::Failed {
            detail: detail.into(),
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            ExecutorError::Timeout { .. } => "executor_timeout",
            ExecutorError::Failed { .. } => "executor_failed",
            ExecutorError::Canceled => "executor_canceled",
        }
    }

    /// `Timeout` and `Failed` may succeed on a later attempt; `Canceled` may not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecutorError::Timeout { .. } | ExecutorError::Failed { .. }
        )
    }
}

/// # Errors produced by a [`StatusStore`](crate::StatusStore).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("object {key} not found")]
    NotFound { key: ObjectKey },

    /// Optimistic concurrency check failed.
    #[error("object {key} was modified concurrently (expected version {expected}, found {actual})")]
    Conflict {
        key: ObjectKey,
        expected: u64,
        actual: u64,
    },

    #[error("store backend error: {detail}")]
    Backend { detail: String },
}

impl StoreError {
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "store_not_found",
            StoreError::Conflict { .. } => "store_conflict",
            StoreError::Backend { .. } => "store_backend",
        }
    }
}

/// # Errors surfaced by one reconcile pass.
///
/// A vanished object is **not** an error; it is reported as
/// [`Outcome::NotFound`](crate::Outcome::NotFound).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// The spec cannot be acted on until it changes.
    #[error("{key}: invalid {mode} configuration: {reason}")]
    Configuration {
        key: ObjectKey,
        mode: Mode,
        reason: String,
    },

    /// The action executor failed, timed out or was cancelled.
    #[error("{key}: {mode} {action} failed: {source}")]
    Executor {
        key: ObjectKey,
        mode: Mode,
        action: Action,
        #[source]
        source: ExecutorError,
    },

    /// Status could not be written after re-reading the object `attempts` times.
    #[error("{key}: status write conflicted {attempts} times")]
    StatusConflict { key: ObjectKey, attempts: u32 },

    /// The spec changed under the pass; the plan made for `planned` is void.
    #[error("{key}: spec changed from generation {planned} to {current} mid-pass")]
    Superseded {
        key: ObjectKey,
        planned: u64,
        current: u64,
    },

    #[error("{key}: {source}")]
    Store {
        key: ObjectKey,
        #[source]
        source: StoreError,
    },
}

impl ReconcileError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use instancevisor::{ObjectKey, Mode, ReconcileError};
    ///
    /// let err = ReconcileError::Configuration {
    ///     key: ObjectKey::new("default", "nightly"),
    ///     mode: Mode::Windowed,
    ///     reason: "missing window start boundary".into(),
    /// };
    /// assert_eq!(err.as_label(), "reconcile_configuration");
    /// assert!(!err.is_retryable());
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ReconcileError::Configuration { .. } => "reconcile_configuration",
            ReconcileError::Executor { .. } => "reconcile_executor",
            ReconcileError::StatusConflict { .. } => "reconcile_status_conflict",
            ReconcileError::Superseded { .. } => "reconcile_superseded",
            ReconcileError::Store { .. } => "reconcile_store",
        }
    }

    /// Key of the object the error belongs to.
    pub fn key(&self) -> &ObjectKey {
        match self {
            ReconcileError::Configuration { key, .. }
            | ReconcileError::Executor { key, .. }
            | ReconcileError::StatusConflict { key, .. }
            | ReconcileError::Superseded { key, .. }
            | ReconcileError::Store { key, .. } => key,
        }
    }

    /// Whether the controller should schedule a backoff retry.
    ///
    /// Configuration errors wait for the next spec change instead.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcileError::Configuration { .. } => false,
            ReconcileError::Executor { source, .. } => source.is_retryable(),
            ReconcileError::StatusConflict { .. }
            | ReconcileError::Superseded { .. }
            | ReconcileError::Store { .. } => true,
        }
    }
}

/// # Errors produced while loading configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown timezone {0:?}")]
    InvalidTimezone(String),

    #[error("unknown weekday {0:?}")]
    InvalidWeekday(String),
}
