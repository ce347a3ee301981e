//! Event types for the append-only audit trail.
//!
//! One event is written per state transition or engine call outcome. Events
//! are never updated or deleted once appended.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::run::RunRecord;
use crate::error::{OrchestratorError, Result};

/// Actor recorded on events emitted by the orchestrator itself
pub const ACTOR_ORCHESTRATOR: &str = "system:orchestrator";

/// Actor recorded on the policy decision event
pub const ACTOR_POLICY: &str = "system:policy";

/// A single entry in the event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,

    pub occurred_at: DateTime<Utc>,

    pub tenant_id: String,

    pub correlation_id: String,

    pub actor: String,

    /// Event-specific fields; always includes `run_id` for run events
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl Event {
    /// Create an event with the current timestamp and an empty payload
    pub fn new(
        event_type: EventType,
        tenant_id: impl Into<String>,
        correlation_id: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            occurred_at: Utc::now(),
            tenant_id: tenant_id.into(),
            correlation_id: correlation_id.into(),
            actor: actor.into(),
            payload: Map::new(),
        }
    }

    /// Create an event for a run, copying its provenance and id
    pub fn for_run(event_type: EventType, record: &RunRecord, actor: impl Into<String>) -> Self {
        Self::new(
            event_type,
            record.tenant_id.clone(),
            record.correlation_id.clone(),
            actor,
        )
        .with("run_id", record.run_id.as_str())
    }

    /// Add a payload field
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    /// Run id referenced by the payload, if any
    pub fn run_id(&self) -> Option<&str> {
        self.payload.get("run_id").and_then(Value::as_str)
    }

    /// Look up a string payload field
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Reject events missing tenant, correlation id, or actor
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("tenant_id", &self.tenant_id),
            ("correlation_id", &self.correlation_id),
            ("actor", &self.actor),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(OrchestratorError::Validation(format!(
                "event {} missing {}",
                self.event_type,
                missing.join(", ")
            )))
        }
    }
}

/// Transition tags written to the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "run.created")]
    RunCreated,

    #[serde(rename = "run.policy.requested")]
    PolicyRequested,

    #[serde(rename = "run.policy.decided")]
    PolicyDecided,

    #[serde(rename = "run.paused.awaiting_approval")]
    PausedAwaitingApproval,

    #[serde(rename = "run.approved")]
    RunApproved,

    #[serde(rename = "run.started")]
    RunStarted,

    #[serde(rename = "run.completed")]
    RunCompleted,

    #[serde(rename = "run.failed")]
    RunFailed,

    /// Any tag this orchestrator does not write itself
    #[serde(rename = "unknown")]
    #[serde(other)]
    Unknown,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RunCreated => "run.created",
            Self::PolicyRequested => "run.policy.requested",
            Self::PolicyDecided => "run.policy.decided",
            Self::PausedAwaitingApproval => "run.paused.awaiting_approval",
            Self::RunApproved => "run.approved",
            Self::RunStarted => "run.started",
            Self::RunCompleted => "run.completed",
            Self::RunFailed => "run.failed",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::RunCompleted | Self::RunFailed)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
