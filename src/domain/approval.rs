//! Approval tokens issued by the decision engine.

use serde::{Deserialize, Serialize};

/// Artifact authorizing execution of one run under one policy snapshot.
///
/// Owned by the decision engine; a run record only keeps its `token_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalToken {
    pub token_id: String,

    /// Snapshot the approver actually approved
    pub policy_snapshot_hash: String,

    pub issued_at: String,
}
