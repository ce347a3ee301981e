//! Decision engine client using subprocess mode.
//!
//! Each call spawns `<binary> [args..] <Operation>`, writes the JSON request to
//! stdin, and parses the JSON response from stdout. A spawn failure, timeout,
//! non-zero exit, or unparsable output is an `Engine` error carrying whatever
//! the process wrote to stderr.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::protocol::*;
use super::DecisionEngine;
use crate::config::EngineSettings;
use crate::error::{OrchestratorError, Result};

/// Engine adapter that runs one process per call
#[derive(Debug, Clone)]
pub struct SubprocessEngine {
    binary_path: PathBuf,
    args: Vec<String>,
    call_timeout: Duration,
}

impl SubprocessEngine {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            binary_path: settings.binary.clone(),
            args: settings.args.clone(),
            call_timeout: settings.timeout,
        }
    }

    /// Create an engine client for a custom binary with the given timeout
    pub fn with_binary_path(binary_path: impl Into<PathBuf>, call_timeout: Duration) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            call_timeout,
        }
    }

    /// One request/response round trip
    async fn call<Req, Resp>(&self, operation: Operation, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let op = operation.as_str();
        let input = serde_json::to_vec(request)
            .map_err(|e| OrchestratorError::engine(op, format!("failed to encode request: {}", e)))?;

        let mut child = Command::new(&self.binary_path)
            .args(&self.args)
            .arg(op)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                OrchestratorError::engine(
                    op,
                    format!("failed to spawn {}: {}", self.binary_path.display(), e),
                )
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&input)
                .await
                .map_err(|e| OrchestratorError::engine(op, format!("failed to write stdin: {}", e)))?;
            // Drop stdin to signal EOF
        }

        let output = timeout(self.call_timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                OrchestratorError::engine(op, format!("timed out after {:?}", self.call_timeout))
            })?
            .map_err(|e| OrchestratorError::engine(op, format!("failed to wait for process: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            return Err(OrchestratorError::engine(
                op,
                format!("exit code {}: {}", exit_code, stderr.trim()),
            ));
        }

        debug!(operation = op, bytes = output.stdout.len(), "Engine responded");

        serde_json::from_slice(&output.stdout).map_err(|e| {
            OrchestratorError::engine(
                op,
                format!(
                    "malformed response ({}): {}",
                    e,
                    String::from_utf8_lossy(&output.stdout).trim()
                ),
            )
        })
    }
}

#[async_trait]
impl DecisionEngine for SubprocessEngine {
    fn name(&self) -> &str {
        "subprocess"
    }

    async fn evaluate_policy(
        &self,
        request: &EvaluatePolicyRequest,
    ) -> Result<EvaluatePolicyResponse> {
        self.call(Operation::EvaluatePolicy, request).await
    }

    async fn issue_approval_token(
        &self,
        request: &IssueApprovalTokenRequest,
    ) -> Result<IssueApprovalTokenResponse> {
        self.call(Operation::IssueApprovalToken, request).await
    }

    async fn execute_run(&self, request: &ExecuteRunRequest) -> Result<ExecuteRunResponse> {
        self.call(Operation::ExecuteRun, request).await
    }
}
