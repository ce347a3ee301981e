//! In-process reference decision engine.
//!
//! Implements the engine contract with the simplest useful rules: high risk
//! requires approval, tokens are bound to the snapshot they were issued
//! against, and execution fails when the request's snapshot disagrees with the
//! token's. Backs the `astra-engine` binary and the test suite.

use async_trait::async_trait;
use chrono::Utc;

use super::protocol::*;
use super::DecisionEngine;
use crate::domain::ApprovalToken;
use crate::error::Result;

/// Reason code for high-risk runs that need a human approval
pub const REASON_APPROVAL_REQUIRED: &str = "APPROVAL_REQUIRED_HIGH_RISK";

/// Reason code when the executed snapshot differs from the approved one
pub const REASON_SNAPSHOT_MISMATCH: &str = "POLICY_SNAPSHOT_MISMATCH";

/// Reason code when the caller asked for a failed execution
pub const REASON_EXECUTION_FAILED: &str = "EXECUTION_FAILED";

/// Risk level that triggers the approval gate
const HIGH_RISK: &str = "high";

#[derive(Debug, Clone, Default)]
pub struct ReferenceEngine;

impl ReferenceEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DecisionEngine for ReferenceEngine {
    fn name(&self) -> &str {
        "reference"
    }

    async fn evaluate_policy(
        &self,
        request: &EvaluatePolicyRequest,
    ) -> Result<EvaluatePolicyResponse> {
        let approval_required = request.risk_level == HIGH_RISK;
        Ok(EvaluatePolicyResponse {
            status: "ok".to_string(),
            decision: if approval_required {
                "approve_required".to_string()
            } else {
                "allow".to_string()
            },
            approval_required,
            policy_snapshot_hash: request.policy_snapshot_hash.clone(),
            reason_code: approval_required.then(|| REASON_APPROVAL_REQUIRED.to_string()),
        })
    }

    async fn issue_approval_token(
        &self,
        request: &IssueApprovalTokenRequest,
    ) -> Result<IssueApprovalTokenResponse> {
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
        let mismatched = request
            .approval_token
            .as_ref()
            .is_some_and(|token| token.policy_snapshot_hash != request.policy_snapshot_hash);

        let execution_result = if mismatched {
            ExecutionResult::failed(REASON_SNAPSHOT_MISMATCH)
        } else if request.force_fail.unwrap_or(false) {
            ExecutionResult::failed(REASON_EXECUTION_FAILED)
        } else {
            ExecutionResult::succeeded()
        };

        Ok(ExecuteRunResponse { execution_result })
    }
}
