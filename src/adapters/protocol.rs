//! Request/response payloads for the decision engine.
//!
//! Each operation has its own typed pair. Optional fields are explicit
//! `Option`s so an absent value never gets confused with an empty one, and a
//! response missing a required field fails to parse instead of defaulting.

use serde::{Deserialize, Serialize};

use crate::domain::ApprovalToken;

/// Wire names of the three engine operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    EvaluatePolicy,
    IssueApprovalToken,
    ExecuteRun,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EvaluatePolicy => "EvaluatePolicy",
            Self::IssueApprovalToken => "IssueApprovalToken",
            Self::ExecuteRun => "ExecuteRun",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "EvaluatePolicy" => Some(Self::EvaluatePolicy),
            "IssueApprovalToken" => Some(Self::IssueApprovalToken),
            "ExecuteRun" => Some(Self::ExecuteRun),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatePolicyRequest {
    pub tenant_id: String,
    pub correlation_id: String,
    pub actor: String,
    pub run_id: String,
    pub policy_snapshot_hash: String,
    pub risk_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatePolicyResponse {
    pub status: String,
    pub decision: String,
    pub approval_required: bool,
    pub policy_snapshot_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueApprovalTokenRequest {
    pub tenant_id: String,
    pub correlation_id: String,
    pub actor: String,
    pub run_id: String,
    pub policy_snapshot_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueApprovalTokenResponse {
    pub status: String,
    pub token: ApprovalToken,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRunRequest {
    pub tenant_id: String,
    pub correlation_id: String,
    pub actor: String,
    pub run_id: String,
    /// Re-sent so the engine can detect a stale or mismatched token
    pub policy_snapshot_hash: String,
    /// Present only when executing after an approval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_token: Option<ApprovalToken>,
    /// Ask the engine to report a failed execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_fail: Option<bool>,
}

/// Outcome reported by the engine for an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Succeeded,
    Failed,
    /// Anything else the engine reports; treated as not-failed
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
}

impl ExecutionResult {
    pub fn succeeded() -> Self {
        Self {
            status: ExecutionStatus::Succeeded,
            reason_code: None,
        }
    }

    pub fn failed(reason_code: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            reason_code: Some(reason_code.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == ExecutionStatus::Failed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRunResponse {
    pub execution_result: ExecutionResult,
}
