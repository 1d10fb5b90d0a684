use thiserror::Error;

/// Error returned by [`ControllerHandle::submit`](super::ControllerHandle::submit).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// Submission queue is full (try again later or use async `submit`).
    #[error("submission queue full")]
    Full,

    /// Controller channel is closed (runtime shut down).
    #[error("controller channel closed")]
    Closed,
}
