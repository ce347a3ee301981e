//! Consistency checks over a run's event trail.
//!
//! Verifies that the events recorded for a run follow the lifecycle, carry
//! the run's provenance, agree on the policy snapshot, and end in a state that
//! matches the stored record.

use thiserror::Error;

use crate::domain::{Event, EventType, RunId, RunRecord, RunStatus};

/// Events whose payload must carry the record's snapshot hash
const SNAPSHOT_BEARING: [EventType; 4] = [
    EventType::RunCreated,
    EventType::PolicyRequested,
    EventType::PolicyDecided,
    EventType::RunApproved,
];

/// A single inconsistency found in a run's trail
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditFinding {
    #[error("event #{index}: expected one of [{expected}], found {found}")]
    UnexpectedEvent {
        index: usize,
        expected: String,
        found: EventType,
    },

    #[error("event #{index}: {field} is {found:?}, run has {expected:?}")]
    ProvenanceMismatch {
        index: usize,
        field: &'static str,
        expected: String,
        found: String,
    },

    #[error("event #{index} ({event_type}): policy_snapshot_hash {found:?} differs from run's {expected:?}")]
    SnapshotMismatch {
        index: usize,
        event_type: EventType,
        expected: String,
        found: Option<String>,
    },

    #[error("record status {status} does not match last event {last_event:?}")]
    StatusMismatch {
        status: RunStatus,
        last_event: Option<EventType>,
    },
}

/// Result of auditing one run
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub run_id: RunId,
    pub events_checked: usize,
    pub findings: Vec<AuditFinding>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Audit `events` (in write order) against `record`
pub fn verify_run(record: &RunRecord, events: &[Event]) -> AuditReport {
    let mut findings = Vec::new();

    check_sequence(events, &mut findings);

    for (index, event) in events.iter().enumerate() {
        check_provenance(index, event, record, &mut findings);

        if SNAPSHOT_BEARING.contains(&event.event_type) {
            let found = event.payload_str("policy_snapshot_hash");
            if found != Some(record.policy_snapshot_hash.as_str()) {
                findings.push(AuditFinding::SnapshotMismatch {
                    index,
                    event_type: event.event_type,
                    expected: record.policy_snapshot_hash.clone(),
                    found: found.map(str::to_string),
                });
            }
        }
    }

    let last_event = events
        .iter()
        .rev()
        .map(|e| e.event_type)
        .find(|t| *t != EventType::Unknown);
    if !status_matches(record.status, last_event) {
        findings.push(AuditFinding::StatusMismatch {
            status: record.status,
            last_event,
        });
    }

    AuditReport {
        run_id: record.run_id.clone(),
        events_checked: events.len(),
        findings,
    }
}

/// Event types allowed to follow `prev`
fn expected_after(prev: Option<&Event>) -> &'static [EventType] {
    use EventType::*;

    match prev.map(|e| (e.event_type, e)) {
        None => &[RunCreated],
        Some((RunCreated, _)) => &[PolicyRequested],
        Some((PolicyRequested, _)) => &[PolicyDecided],
        Some((PolicyDecided, decided)) => {
            let gated = decided
                .payload
                .get("approval_required")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if gated {
                &[PausedAwaitingApproval]
            } else {
                &[RunStarted]
            }
        }
        Some((PausedAwaitingApproval, _)) => &[RunApproved],
        Some((RunApproved, _)) => &[RunStarted],
        Some((RunStarted, _)) => &[RunCompleted, RunFailed],
        Some((RunCompleted | RunFailed | Unknown, _)) => &[],
    }
}

fn check_sequence(events: &[Event], findings: &mut Vec<AuditFinding>) {
    let mut prev: Option<&Event> = None;

    for (index, event) in events.iter().enumerate() {
        let expected = expected_after(prev);
        if !expected.contains(&event.event_type) {
            let expected = expected
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            findings.push(AuditFinding::UnexpectedEvent {
                index,
                expected,
                found: event.event_type,
            });
        }
        // A foreign tag is reported once; the lifecycle resumes after it
        if event.event_type != EventType::Unknown {
            prev = Some(event);
        }
    }
}

fn check_provenance(
    index: usize,
    event: &Event,
    record: &RunRecord,
    findings: &mut Vec<AuditFinding>,
) {
    let pairs = [
        ("tenant_id", &event.tenant_id, &record.tenant_id),
        ("correlation_id", &event.correlation_id, &record.correlation_id),
    ];

    for (field, found, expected) in pairs {
        if found != expected {
            findings.push(AuditFinding::ProvenanceMismatch {
                index,
                field,
                expected: expected.clone(),
                found: found.clone(),
            });
        }
    }
}

/// Whether a stored status is reachable given the last recorded event.
///
/// A failed command leaves the last persisted record behind, so a record can
/// trail its events (e.g. `created` after `run.started` when execution errored).
fn status_matches(status: RunStatus, last_event: Option<EventType>) -> bool {
    use EventType::*;

    match last_event {
        None | Some(RunCreated | PolicyRequested | PolicyDecided | Unknown) => {
            status == RunStatus::Created
        }
        Some(PausedAwaitingApproval | RunApproved) => status == RunStatus::AwaitingApproval,
        Some(RunStarted) => !status.is_terminal(),
        Some(RunCompleted) => status == RunStatus::Completed,
        Some(RunFailed) => status == RunStatus::Failed,
    }
}
