//! Decision engine integration.
//!
//! The orchestrator talks to the engine only through [`DecisionEngine`]. The
//! production implementation spawns the engine as a subprocess per call; the
//! reference engine runs the same contract in-process.

pub mod protocol;
pub mod reference;
pub mod subprocess;

use async_trait::async_trait;

use crate::error::Result;

pub use protocol::{
    EvaluatePolicyRequest, EvaluatePolicyResponse, ExecuteRunRequest, ExecuteRunResponse,
    ExecutionResult, ExecutionStatus, IssueApprovalTokenRequest, IssueApprovalTokenResponse,
    Operation,
};
pub use reference::ReferenceEngine;
pub use subprocess::SubprocessEngine;

/// The three operations of the external decision engine.
///
/// Each call is one synchronous round trip. Implementations must not retry;
/// any failure surfaces as an `Engine` error.
#[async_trait]
pub trait DecisionEngine: Send + Sync {
    /// Human-readable engine name
    fn name(&self) -> &str;

    async fn evaluate_policy(&self, request: &EvaluatePolicyRequest)
        -> Result<EvaluatePolicyResponse>;

    async fn issue_approval_token(
        &self,
        request: &IssueApprovalTokenRequest,
    ) -> Result<IssueApprovalTokenResponse>;

    async fn execute_run(&self, request: &ExecuteRunRequest) -> Result<ExecuteRunResponse>;
}
