//! Run lifecycle orchestrator.
//!
//! Sequences policy evaluation, the optional approval gate, and execution
//! against the decision engine. Every transition is mirrored into the event
//! log, and the run record is rewritten in full at each persist point.
//!
//! Each operation is one sequential unit of work: every step waits for the
//! previous one to be durable, and the first error aborts the operation
//! without further side effects.

use std::path::PathBuf;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{field, info, instrument, warn, Span};

use crate::adapters::{
    DecisionEngine, EvaluatePolicyRequest, ExecuteRunRequest, IssueApprovalTokenRequest,
    SubprocessEngine,
};
use crate::config::{Config, RunDefaults};
use crate::domain::{
    ApprovalToken, Event, EventType, RunId, RunRecord, RunStatus, ACTOR_ORCHESTRATOR,
    ACTOR_POLICY,
};
use crate::error::{OrchestratorError, Result};

use super::audit::{self, AuditReport};
use super::event_store::EventLog;
use super::run_store::RunStore;

/// Suffix the mismatch demonstration appends to the approved snapshot
const MISMATCH_SUFFIX: &str = "_mismatch";

/// Provenance for a new run; unset fields fall back to configured defaults
#[derive(Debug, Clone, Default)]
pub struct TriggerRequest {
    pub tenant_id: Option<String>,
    pub actor: Option<String>,
    pub risk_level: Option<String>,
    /// Ask the engine to fail the execution (direct path only)
    pub force_fail: bool,
}

/// Where a trigger or approve call left the run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub record: RunRecord,

    /// Policy reason when paused, engine reason when failed
    pub reason_code: Option<String>,
}

/// Current record plus the tail of its event trail
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub record: RunRecord,
    pub recent_events: Vec<Event>,
    /// False when no event has been written by anyone yet
    pub log_present: bool,
}

/// Main run orchestrator
pub struct Orchestrator {
    runs: RunStore,
    events: EventLog,
    engine: Arc<dyn DecisionEngine>,
    defaults: RunDefaults,
    policy_snapshot_path: Option<PathBuf>,
}

impl Orchestrator {
    /// Open an orchestrator that talks to the configured engine process
    pub async fn open(config: &Config) -> Result<Self> {
        let engine = Arc::new(SubprocessEngine::new(&config.engine));
        Self::with_engine(config, engine).await
    }

    /// Open an orchestrator backed by an arbitrary engine implementation
    pub async fn with_engine(config: &Config, engine: Arc<dyn DecisionEngine>) -> Result<Self> {
        Ok(Self {
            runs: RunStore::open(&config.runs_dir).await?,
            events: EventLog::open(&config.events_path).await?,
            engine,
            defaults: config.defaults.clone(),
            policy_snapshot_path: config.policy_snapshot_path.clone(),
        })
    }

    pub fn run_store(&self) -> &RunStore {
        &self.runs
    }

    pub fn event_log(&self) -> &EventLog {
        &self.events
    }

    /// Create a run, evaluate policy, and either pause for approval or execute
    #[instrument(skip(self, request), fields(run_id = field::Empty))]
    pub async fn trigger(&self, request: TriggerRequest) -> Result<RunOutcome> {
        let run_id = RunId::generate();
        Span::current().record("run_id", field::display(&run_id));

        // No lock: the id is fresh, and approve only acts once the final
        // awaiting_approval write has landed.
        let tenant_id = request
            .tenant_id
            .unwrap_or_else(|| self.defaults.tenant_id.clone());
        let actor = request.actor.unwrap_or_else(|| self.defaults.actor.clone());
        let risk_level = request
            .risk_level
            .unwrap_or_else(|| self.defaults.risk_level.clone());
        let snapshot = self.policy_snapshot_hash(&run_id).await?;

        let mut record = RunRecord::new(run_id, tenant_id, actor, snapshot);
        self.runs.put(&mut record).await?;
        info!(tenant = %record.tenant_id, actor = %record.actor, "Run created");

        self.events
            .append(
                &Event::for_run(EventType::RunCreated, &record, record.actor.clone())
                    .with("policy_snapshot_hash", record.policy_snapshot_hash.clone()),
            )
            .await?;
        self.events
            .append(
                &Event::for_run(EventType::PolicyRequested, &record, ACTOR_ORCHESTRATOR)
                    .with("policy_snapshot_hash", record.policy_snapshot_hash.clone()),
            )
            .await?;

        let decision = self
            .engine
            .evaluate_policy(&EvaluatePolicyRequest {
                tenant_id: record.tenant_id.clone(),
                correlation_id: record.correlation_id.clone(),
                actor: record.actor.clone(),
                run_id: record.run_id.to_string(),
                policy_snapshot_hash: record.policy_snapshot_hash.clone(),
                risk_level,
            })
            .await?;

        self.events
            .append(
                &Event::for_run(EventType::PolicyDecided, &record, ACTOR_POLICY)
                    .with("decision", decision.decision.clone())
                    .with("approval_required", decision.approval_required)
                    .with("policy_snapshot_hash", decision.policy_snapshot_hash.clone())
                    .with("reason_code", decision.reason_code.clone()),
            )
            .await?;
        info!(
            decision = %decision.decision,
            approval_required = decision.approval_required,
            "Policy decided"
        );

        record.approval_required = decision.approval_required;

        if decision.approval_required {
            record.transition(RunStatus::AwaitingApproval, "pause for approval")?;
            self.events
                .append(
                    &Event::for_run(EventType::PausedAwaitingApproval, &record, ACTOR_ORCHESTRATOR)
                        .with("reason_code", decision.reason_code.clone()),
                )
                .await?;
            self.runs.put(&mut record).await?;
            info!(reason_code = ?decision.reason_code, "Run paused awaiting approval");

            return Ok(RunOutcome {
                record,
                reason_code: decision.reason_code,
            });
        }

        let snapshot = record.policy_snapshot_hash.clone();
        let force_fail = request.force_fail.then_some(true);
        self.execute(record, None, &snapshot, force_fail).await
    }

    /// Approve a paused run and execute it
    #[instrument(skip(self, approver), fields(run_id = %run_id))]
    pub async fn approve(&self, run_id: &RunId, approver: Option<&str>) -> Result<RunOutcome> {
        let approver = approver.unwrap_or(&self.defaults.approver).to_string();
        self.approve_with_snapshot(run_id, &approver, None).await
    }

    /// Approval path shared with the mismatch demonstration.
    ///
    /// `execute_snapshot` replaces the snapshot hash sent to `executeRun`; the
    /// record's own hash is never changed.
    async fn approve_with_snapshot(
        &self,
        run_id: &RunId,
        approver: &str,
        execute_snapshot: Option<String>,
    ) -> Result<RunOutcome> {
        // Unknown ids must not leave a lock file behind
        if !self.runs.exists(run_id).await? {
            return Err(OrchestratorError::NotFound(run_id.to_string()));
        }
        let _lock = self.runs.lock(run_id).await?;

        let mut record = self.runs.get(run_id).await?;
        if record.status != RunStatus::AwaitingApproval {
            return Err(OrchestratorError::State {
                run_id: run_id.to_string(),
                status: record.status,
                operation: "approve",
            });
        }

        let issued = self
            .engine
            .issue_approval_token(&IssueApprovalTokenRequest {
                tenant_id: record.tenant_id.clone(),
                correlation_id: record.correlation_id.clone(),
                actor: approver.to_string(),
                run_id: record.run_id.to_string(),
                policy_snapshot_hash: record.policy_snapshot_hash.clone(),
            })
            .await?;
        let token = issued.token;

        record.approval_token_id = Some(token.token_id.clone());
        self.events
            .append(
                &Event::for_run(EventType::RunApproved, &record, approver)
                    .with("approval_token_id", token.token_id.clone())
                    .with("policy_snapshot_hash", token.policy_snapshot_hash.clone()),
            )
            .await?;
        info!(approver, token_id = %token.token_id, "Run approved");

        let snapshot = execute_snapshot.unwrap_or_else(|| record.policy_snapshot_hash.clone());
        self.execute(record, Some(token), &snapshot, None).await
    }

    /// Shared tail: start, call the engine, and record the terminal outcome.
    ///
    /// A reported `failed` status is a normal outcome, not an error.
    async fn execute(
        &self,
        mut record: RunRecord,
        token: Option<ApprovalToken>,
        policy_snapshot_hash: &str,
        force_fail: Option<bool>,
    ) -> Result<RunOutcome> {
        self.events
            .append(&Event::for_run(EventType::RunStarted, &record, ACTOR_ORCHESTRATOR))
            .await?;

        let response = self
            .engine
            .execute_run(&ExecuteRunRequest {
                tenant_id: record.tenant_id.clone(),
                correlation_id: record.correlation_id.clone(),
                actor: ACTOR_ORCHESTRATOR.to_string(),
                run_id: record.run_id.to_string(),
                policy_snapshot_hash: policy_snapshot_hash.to_string(),
                approval_token: token,
                force_fail,
            })
            .await?;
        let result = response.execution_result;

        if result.is_failed() {
            record.transition(RunStatus::Failed, "fail")?;
            self.events
                .append(
                    &Event::for_run(EventType::RunFailed, &record, ACTOR_ORCHESTRATOR)
                        .with("reason_code", result.reason_code.clone())
                        .with("execution_status", "failed"),
                )
                .await?;
            self.runs.put(&mut record).await?;
            warn!(run_id = %record.run_id, reason_code = ?result.reason_code, "Run failed");

            return Ok(RunOutcome {
                record,
                reason_code: result.reason_code,
            });
        }

        record.transition(RunStatus::Completed, "complete")?;
        self.events
            .append(
                &Event::for_run(EventType::RunCompleted, &record, ACTOR_ORCHESTRATOR)
                    .with("execution_status", "succeeded"),
            )
            .await?;
        self.runs.put(&mut record).await?;
        info!(run_id = %record.run_id, "Run completed");

        Ok(RunOutcome {
            record,
            reason_code: None,
        })
    }

    /// Read-only view of a run and its most recent `limit` events
    pub async fn status(&self, run_id: &RunId, limit: usize) -> Result<StatusReport> {
        let record = self.runs.get(run_id).await?;
        let log_present = self.events.exists().await?;
        let recent_events = self.events.query_by_run(run_id, limit).await?;

        Ok(StatusReport {
            record,
            recent_events,
            log_present,
        })
    }

    /// Audit a run's full event trail against its record
    pub async fn verify(&self, run_id: &RunId) -> Result<AuditReport> {
        let record = self.runs.get(run_id).await?;
        let events = self.events.events_for_run(run_id).await?;
        Ok(audit::verify_run(&record, &events))
    }

    /// End-to-end check that the engine rejects a mismatched snapshot.
    ///
    /// Triggers an approval-gated run, approves it, then executes with a
    /// snapshot hash that differs from the one the token was issued against.
    /// Succeeds only if the engine reports the execution as failed.
    #[instrument(skip(self), fields(run_id = field::Empty))]
    pub async fn demo_mismatch(&self) -> Result<RunOutcome> {
        let paused = self
            .trigger(TriggerRequest {
                tenant_id: Some("tenant_demo".to_string()),
                actor: Some("user:mismatch".to_string()),
                risk_level: Some("high".to_string()),
                force_fail: false,
            })
            .await?;
        let run_id = paused.record.run_id.clone();
        Span::current().record("run_id", field::display(&run_id));

        if paused.record.status != RunStatus::AwaitingApproval {
            return Err(OrchestratorError::State {
                run_id: run_id.to_string(),
                status: paused.record.status,
                operation: "run the mismatch demo without an approval gate",
            });
        }

        let mismatched = format!("{}{}", paused.record.policy_snapshot_hash, MISMATCH_SUFFIX);
        let outcome = self
            .approve_with_snapshot(&run_id, "approver:mismatch", Some(mismatched))
            .await?;

        if outcome.record.status != RunStatus::Failed {
            return Err(OrchestratorError::MismatchUndetected {
                run_id: run_id.to_string(),
                status: outcome.record.status,
            });
        }

        info!(reason_code = ?outcome.reason_code, "Engine rejected mismatched snapshot");
        Ok(outcome)
    }

    /// Hash of the configured policy file, or a per-run placeholder
    async fn policy_snapshot_hash(&self, run_id: &RunId) -> Result<String> {
        match &self.policy_snapshot_path {
            Some(path) => {
                let content = fs::read(path).await?;
                Ok(hex::encode(Sha256::digest(&content)))
            }
            None => Ok(format!("snap_{}", run_id)),
        }
    }
}
