//! # `aws` CLI executor.
//!
//! Runs `aws ec2 start-instances|stop-instances --instance-ids <id>...` as a
//! child process. Arguments are passed as a vector straight to the process
//! (no shell), and ids have been validated before they get here.
//!
//! Credentials and region come from the usual AWS environment/profile chain;
//! `--region` and `--profile` can be pinned per executor.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::{ActionExecutor, ActionRequest};
use crate::error::ExecutorError;
use crate::resource::Action;

/// Longest stderr excerpt kept in an error.
const MAX_DETAIL_LEN: usize = 512;

/// Executor backed by the `aws` command line tool.
#[derive(Clone, Debug)]
pub struct AwsCliExecutor {
    program: PathBuf,
    region: Option<String>,
    profile: Option<String>,
}

impl Default for AwsCliExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl AwsCliExecutor {
    /// Uses `aws` from `PATH`.
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("aws"),
            region: None,
            profile: None,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Argument vector for `request`, excluding the program itself.
    pub fn args(&self, request: &ActionRequest) -> Vec<OsString> {
        let subcommand = match request.action {
            Action::Start => "start-instances",
            Action::Stop => "stop-instances",
        };

        let mut args: Vec<OsString> = vec!["ec2".into(), subcommand.into()];
        if let Some(region) = &self.region {
            args.push("--region".into());
            args.push(region.into());
        }
        if let Some(profile) = &self.profile {
            args.push("--profile".into());
            args.push(profile.into());
        }
        args.push("--instance-ids".into());
        args.extend(request.targets.iter().map(|id| OsString::from(id.as_str())));
        args
    }
}

#[async_trait]
impl ActionExecutor for AwsCliExecutor {
    async fn execute(
        &self,
        request: &ActionRequest,
        ctx: CancellationToken,
    ) -> Result<(), ExecutorError> {
        let child = Command::new(&self.program)
            .args(self.args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ExecutorError::failed(format!("failed to spawn {}: {e}", self.program.display()))
            })?;

        // Dropping the wait future on cancel kills the child (kill_on_drop).
        let output = tokio::select! {
            out = child.wait_with_output() => out
                .map_err(|e| ExecutorError::failed(format!("failed to wait for aws cli: {e}")))?,
            _ = ctx.cancelled() => return Err(ExecutorError::Canceled),
        };

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut detail = stderr.trim().to_string();
        if detail.len() > MAX_DETAIL_LEN {
            let mut cut = MAX_DETAIL_LEN;
            while !detail.is_char_boundary(cut) {
                cut -= 1;
            }
            detail.truncate(cut);
        }
        Err(ExecutorError::failed(format!(
            "aws cli exited with {}: {detail}",
            output.status
        )))
    }

    fn name(&self) -> &str {
        "aws-cli"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::InstanceId;

    fn request(action: Action, ids: &[&str]) -> ActionRequest {
        ActionRequest::new(
            action,
            ids.iter().map(|id| InstanceId::parse(id).unwrap()).collect(),
        )
    }

    #[test]
    fn builds_one_argument_per_target() {
        let exec = AwsCliExecutor::new();
        let args = exec.args(&request(Action::Stop, &["i-1", "i-2"]));
        let args: Vec<&str> = args.iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(
            args,
            vec!["ec2", "stop-instances", "--instance-ids", "i-1", "i-2"]
        );
    }

    #[test]
    fn region_and_profile_precede_instance_ids() {
        let exec = AwsCliExecutor::new()
            .with_region("ap-south-1")
            .with_profile("ops");
        let args = exec.args(&request(Action::Start, &["i-9"]));
        let args: Vec<&str> = args.iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(
            args,
            vec![
                "ec2",
                "start-instances",
                "--region",
                "ap-south-1",
                "--profile",
                "ops",
                "--instance-ids",
                "i-9"
            ]
        );
    }

    #[tokio::test]
    async fn missing_program_is_an_execution_failure() {
        let exec = AwsCliExecutor::new().with_program("/nonexistent/aws-cli-for-tests");
        let err = exec
            .execute(&request(Action::Start, &["i-1"]), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Failed { .. }));
        assert!(err.is_retryable());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_reports_stderr() {
        // `false` ignores its arguments and exits 1.
        let exec = AwsCliExecutor::new().with_program("false");
        let err = exec
            .execute(&request(Action::Stop, &["i-1"]), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("aws cli exited"));
    }
}
