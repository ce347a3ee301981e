//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;

use astra_orchestrator::adapters::{
    DecisionEngine, EvaluatePolicyRequest, EvaluatePolicyResponse, ExecuteRunRequest,
    ExecuteRunResponse, ExecutionResult, IssueApprovalTokenRequest, IssueApprovalTokenResponse,
};
use astra_orchestrator::config::Config;
use astra_orchestrator::core::Orchestrator;
use astra_orchestrator::domain::ApprovalToken;
use astra_orchestrator::error::{OrchestratorError, Result};

/// Which engine call should fail with a transport error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    EvaluatePolicy,
    IssueApprovalToken,
    ExecuteRun,
}

/// Every request the engine has seen, in call order
#[derive(Debug, Default)]
pub struct Calls {
    pub evaluate_policy: Vec<EvaluatePolicyRequest>,
    pub issue_approval_token: Vec<IssueApprovalTokenRequest>,
    pub execute_run: Vec<ExecuteRunRequest>,
}

/// Decision engine double with fixed answers that records its inputs
pub struct ScriptedEngine {
    pub approval_required: bool,
    pub reason_code: Option<String>,
    pub execution_result: ExecutionResult,
    pub fail_at: Option<FailAt>,
    pub calls: Mutex<Calls>,
}

impl ScriptedEngine {
    /// Allows every run and reports success
    pub fn allow() -> Self {
        Self {
            approval_required: false,
            reason_code: None,
            execution_result: ExecutionResult::succeeded(),
            fail_at: None,
            calls: Mutex::new(Calls::default()),
        }
    }

    /// Requires approval for every run and reports success
    pub fn gated() -> Self {
        Self {
            approval_required: true,
            reason_code: Some("APPROVAL_REQUIRED_HIGH_RISK".to_string()),
            ..Self::allow()
        }
    }

    pub fn with_execution_result(mut self, result: ExecutionResult) -> Self {
        self.execution_result = result;
        self
    }

    pub fn failing_at(mut self, fail_at: FailAt) -> Self {
        self.fail_at = Some(fail_at);
        self
    }

    fn check(&self, at: FailAt, operation: &'static str) -> Result<()> {
        if self.fail_at == Some(at) {
            return Err(OrchestratorError::Engine {
                operation,
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DecisionEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn evaluate_policy(
        &self,
        request: &EvaluatePolicyRequest,
    ) -> Result<EvaluatePolicyResponse> {
        self.calls.lock().unwrap().evaluate_policy.push(request.clone());
        self.check(FailAt::EvaluatePolicy, "EvaluatePolicy")?;

        Ok(EvaluatePolicyResponse {
            status: "ok".to_string(),
            decision: if self.approval_required {
                "approve_required".to_string()
            } else {
                "allow".to_string()
            },
            approval_required: self.approval_required,
            policy_snapshot_hash: request.policy_snapshot_hash.clone(),
            reason_code: self.reason_code.clone(),
        })
    }

    async fn issue_approval_token(
        &self,
        request: &IssueApprovalTokenRequest,
    ) -> Result<IssueApprovalTokenResponse> {
        self.calls
            .lock()
            .unwrap()
            .issue_approval_token
            .push(request.clone());
        self.check(FailAt::IssueApprovalToken, "IssueApprovalToken")?;

        Ok(IssueApprovalTokenResponse {
            status: "ok".to_string(),
            token: ApprovalToken {
                token_id: format!("token_{}", request.run_id),
                policy_snapshot_hash: request.policy_snapshot_hash.clone(),
                issued_at: Utc::now().to_rfc3339(),
            },
        })
    }

    async fn execute_run(&self, request: &ExecuteRunRequest) -> Result<ExecuteRunResponse> {
        self.calls.lock().unwrap().execute_run.push(request.clone());
        self.check(FailAt::ExecuteRun, "ExecuteRun")?;

        Ok(ExecuteRunResponse {
            execution_result: self.execution_result.clone(),
        })
    }
}

/// Orchestrator over fresh storage, plus a handle on the engine double
pub async fn create_test_orchestrator(
    engine: ScriptedEngine,
) -> (Orchestrator, Arc<ScriptedEngine>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let engine = Arc::new(engine);
    let config = Config::with_home(temp_dir.path());
    let orchestrator = Orchestrator::with_engine(&config, engine.clone())
        .await
        .unwrap();
    (orchestrator, engine, temp_dir)
}
