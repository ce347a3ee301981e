//! Run record and lifecycle status.
//!
//! A RunRecord is the materialized current state of one run. The event log
//! remains the system of record for what happened; the record exists so status
//! queries don't need to replay history.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};

/// Opaque run identifier (`run_<16 hex>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh run id
    pub fn generate() -> Self {
        let simple = Uuid::new_v4().simple().to_string();
        Self(format!("run_{}", &simple[..16]))
    }

    /// Wrap an existing id (e.g. from the command line)
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this id can name a file in the run store
    pub fn is_storage_safe(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }

    /// Correlation id derived from this run id
    pub fn correlation_id(&self) -> String {
        format!("corr_{}", self.0)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Lifecycle status of a run
///
/// ```text
/// created ──► awaiting_approval ──► completed | failed
///    └───────────────────────────► completed | failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Created,
    AwaitingApproval,
    Completed,
    Failed,
}

impl RunStatus {
    /// Terminal states are never left
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a forward transition
    pub fn can_transition_to(self, next: RunStatus) -> bool {
        match self {
            Self::Created => next != Self::Created,
            Self::AwaitingApproval => next.is_terminal(),
            Self::Completed | Self::Failed => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted state of a single run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,

    pub tenant_id: String,

    pub correlation_id: String,

    /// Who triggered the run
    pub actor: String,

    /// Policy version the run was evaluated against (immutable)
    pub policy_snapshot_hash: String,

    /// Set once the policy decision returns
    #[serde(default)]
    pub approval_required: bool,

    pub status: RunStatus,

    /// Set only after an approval step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_token_id: Option<String>,

    /// Refreshed by the run store on every write
    pub updated_at: DateTime<Utc>,
}

impl RunRecord {
    /// A freshly created run
    pub fn new(
        run_id: RunId,
        tenant_id: impl Into<String>,
        actor: impl Into<String>,
        policy_snapshot_hash: impl Into<String>,
    ) -> Self {
        let correlation_id = run_id.correlation_id();
        Self {
            run_id,
            tenant_id: tenant_id.into(),
            correlation_id,
            actor: actor.into(),
            policy_snapshot_hash: policy_snapshot_hash.into(),
            approval_required: false,
            status: RunStatus::Created,
            approval_token_id: None,
            updated_at: Utc::now(),
        }
    }

    /// Move to `next`, rejecting regressions and any change to a terminal run
    pub fn transition(&mut self, next: RunStatus, operation: &'static str) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(OrchestratorError::State {
                run_id: self.run_id.to_string(),
                status: self.status,
                operation,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
