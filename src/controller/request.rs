use std::fmt;

use crate::resource::ObjectKey;

/// Why a reconcile was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cause {
    /// The object was created or its spec changed.
    Applied,
    /// The object was deleted; cancels timers and in-flight work for the key.
    Deleted,
    /// Periodic re-check scheduled by a previous pass.
    Requeue,
    /// Backoff retry after a failed pass.
    Retry,
}

impl Cause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cause::Applied => "applied",
            Cause::Deleted => "deleted",
            Cause::Requeue => "requeue",
            Cause::Retry => "retry",
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trigger submitted to the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileRequest {
    pub key: ObjectKey,
    pub cause: Cause,
}

impl ReconcileRequest {
    pub fn new(key: ObjectKey, cause: Cause) -> Self {
        Self { key, cause }
    }

    /// Convenience: object created or updated.
    #[inline]
    pub fn applied(key: ObjectKey) -> Self {
        Self::new(key, Cause::Applied)
    }

    #[inline]
    pub fn deleted(key: ObjectKey) -> Self {
        Self::new(key, Cause::Deleted)
    }
}
