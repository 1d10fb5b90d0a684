//! # Action executor: the component that actually starts or stops instances.
//!
//! The reconciler hands the executor a typed [`ActionRequest`] (never a
//! command string). Targets inside a request have already passed
//! [`InstanceId`] validation.
//!
//! An executor applies the action to **all** targets as one logical call and
//! reports one aggregate result: if any target fails the whole call fails.
//!
//! Implementations:
//! - [`AwsCliExecutor`] drives the `aws` CLI with an argument vector.
//! - Anything implementing [`ActionExecutor`] (an SDK client, a test double).

mod aws_cli;

pub use aws_cli::AwsCliExecutor;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ExecutorError;
use crate::resource::{Action, InstanceId};

/// One executor call: an action over a set of validated targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionRequest {
    pub action: Action,
    pub targets: Vec<InstanceId>,
}

impl ActionRequest {
    pub fn new(action: Action, targets: Vec<InstanceId>) -> Self {
        Self { action, targets }
    }

    /// Comma-separated target list for logs.
    pub fn targets_display(&self) -> String {
        self.targets
            .iter()
            .map(InstanceId::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// # Applies start/stop actions to instances.
///
/// The runner wraps every call in a timeout and passes a cancellation token;
/// implementations should stop promptly when the token fires and return
/// [`ExecutorError::Canceled`].
///
/// Calls must be idempotent at the infrastructure layer: starting a running
/// instance (or stopping a stopped one) is a successful no-op.
#[async_trait]
pub trait ActionExecutor: Send + Sync + 'static {
    async fn execute(
        &self,
        request: &ActionRequest,
        ctx: CancellationToken,
    ) -> Result<(), ExecutorError>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "executor"
    }
}
