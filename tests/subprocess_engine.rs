//! Subprocess Engine Integration Tests
//!
//! Runs the orchestrator and the CLI against the real `astra-engine` process.

use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use astra_orchestrator::adapters::{
    DecisionEngine, EvaluatePolicyRequest, SubprocessEngine,
};
use astra_orchestrator::adapters::reference::{REASON_EXECUTION_FAILED, REASON_SNAPSHOT_MISMATCH};
use astra_orchestrator::config::Config;
use astra_orchestrator::core::{Orchestrator, TriggerRequest};
use astra_orchestrator::domain::{EventType, RunStatus};

const ENGINE_BIN: &str = env!("CARGO_BIN_EXE_astra-engine");
const CLI_BIN: &str = env!("CARGO_BIN_EXE_astra");

async fn create_test_orchestrator(temp_dir: &TempDir) -> Orchestrator {
    let config = Config::with_home(temp_dir.path()).with_engine(ENGINE_BIN);
    Orchestrator::open(&config).await.unwrap()
}

fn astra(home: &Path, args: &[&str]) -> Output {
    Command::new(CLI_BIN)
        .args(args)
        .env("ASTRA_HOME", home)
        .env("ASTRA_ENGINE", ENGINE_BIN)
        .env_remove("ASTRA_CONFIG")
        .output()
        .unwrap()
}

#[tokio::test]
async fn test_engine_round_trip() {
    let engine = SubprocessEngine::with_binary_path(ENGINE_BIN, Duration::from_secs(10));
    let response = engine
        .evaluate_policy(&EvaluatePolicyRequest {
            tenant_id: "tenant_a".to_string(),
            correlation_id: "corr_run_1".to_string(),
            actor: "user:a".to_string(),
            run_id: "run_1".to_string(),
            policy_snapshot_hash: "snap_run_1".to_string(),
            risk_level: "high".to_string(),
        })
        .await
        .unwrap();

    assert!(response.approval_required);
    assert_eq!(response.policy_snapshot_hash, "snap_run_1");
}

#[tokio::test]
async fn test_gated_run_through_engine_process() {
    let temp_dir = TempDir::new().unwrap();
    let orchestrator = create_test_orchestrator(&temp_dir).await;

    let paused = orchestrator
        .trigger(TriggerRequest {
            risk_level: Some("high".to_string()),
            ..TriggerRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(paused.record.status, RunStatus::AwaitingApproval);

    let outcome = orchestrator.approve(&paused.record.run_id, None).await.unwrap();
    assert_eq!(outcome.record.status, RunStatus::Completed);

    let report = orchestrator.verify(&paused.record.run_id).await.unwrap();
    assert!(report.is_clean(), "{:?}", report.findings);
    assert_eq!(report.events_checked, 7);
}

#[tokio::test]
async fn test_demo_mismatch_fails_run() {
    let temp_dir = TempDir::new().unwrap();
    let orchestrator = create_test_orchestrator(&temp_dir).await;

    let outcome = orchestrator.demo_mismatch().await.unwrap();
    assert_eq!(outcome.record.status, RunStatus::Failed);
    assert_eq!(outcome.reason_code.as_deref(), Some(REASON_SNAPSHOT_MISMATCH));
    assert_eq!(outcome.record.tenant_id, "tenant_demo");

    let run_id = outcome.record.run_id.clone();
    let events = orchestrator.event_log().events_for_run(&run_id).await.unwrap();
    assert_eq!(events.last().unwrap().event_type, EventType::RunFailed);

    // Record keeps the approved snapshot; only the execute call diverged
    let stored = orchestrator.run_store().get(&run_id).await.unwrap();
    assert_eq!(stored.policy_snapshot_hash, format!("snap_{}", run_id));
    assert!(orchestrator.verify(&run_id).await.unwrap().is_clean());
}

#[tokio::test]
async fn test_forced_failure_through_engine_process() {
    let temp_dir = TempDir::new().unwrap();
    let orchestrator = create_test_orchestrator(&temp_dir).await;

    let outcome = orchestrator
        .trigger(TriggerRequest {
            risk_level: Some("low".to_string()),
            force_fail: true,
            ..TriggerRequest::default()
        })
        .await
        .unwrap();

    assert!(!outcome.record.approval_required);
    assert_eq!(outcome.record.status, RunStatus::Failed);
    assert_eq!(outcome.reason_code.as_deref(), Some(REASON_EXECUTION_FAILED));

    let run_id = outcome.record.run_id.clone();
    let events = orchestrator.event_log().events_for_run(&run_id).await.unwrap();
    let last = events.last().unwrap();
    assert_eq!(last.event_type, EventType::RunFailed);
    assert_eq!(last.payload_str("reason_code"), Some(REASON_EXECUTION_FAILED));
    assert!(orchestrator.verify(&run_id).await.unwrap().is_clean());
}

#[test]
fn test_cli_force_fail_is_reported_in_status() {
    let temp_dir = TempDir::new().unwrap();
    let home = temp_dir.path();

    let trigger = astra(home, &["trigger", "--risk-level", "low", "--force-fail"]);
    assert!(trigger.status.success(), "{:?}", trigger);
    let run_id = String::from_utf8(trigger.stdout).unwrap().trim().to_string();

    let status = astra(home, &["status", &run_id]);
    let stdout = String::from_utf8(status.stdout).unwrap();
    assert!(stdout.contains("\"status\": \"failed\""), "{}", stdout);
    assert!(stdout.contains("EXECUTION_FAILED"));
}

#[tokio::test]
async fn test_unknown_operation_exits_non_zero() {
    let output = Command::new(ENGINE_BIN)
        .arg("DeleteEverything")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown operation"));
}

#[test]
fn test_cli_trigger_approve_status() {
    let temp_dir = TempDir::new().unwrap();
    let home = temp_dir.path();

    let trigger = astra(home, &["trigger", "--risk-level", "high"]);
    assert!(trigger.status.success(), "{:?}", trigger);
    let run_id = String::from_utf8(trigger.stdout).unwrap().trim().to_string();
    assert!(run_id.starts_with("run_"));

    let approve = astra(home, &["approve", &run_id]);
    assert!(approve.status.success(), "{:?}", approve);
    assert!(approve.stdout.is_empty());

    let status = astra(home, &["status", &run_id, "--limit", "2"]);
    assert!(status.status.success());
    let stdout = String::from_utf8(status.stdout).unwrap();
    assert!(stdout.contains("\"status\": \"completed\""), "{}", stdout);
    assert!(stdout.contains("Recent events:"));
    assert!(stdout.contains("run.completed"));
    assert!(!stdout.contains("run.approved"));

    let verify = astra(home, &["verify", &run_id]);
    assert!(verify.status.success());

    // Second approval is a state error
    let again = astra(home, &["approve", &run_id]);
    assert!(!again.status.success());
}

#[test]
fn test_cli_demo_mismatch_output() {
    let temp_dir = TempDir::new().unwrap();

    let output = astra(temp_dir.path(), &["demo-mismatch"]);
    assert!(output.status.success(), "{:?}", output);

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("Demo mismatch run_id=run_"), "{}", stdout);
    assert!(stdout.trim_end().ends_with("reason_code=POLICY_SNAPSHOT_MISMATCH"));
}

#[test]
fn test_cli_status_unknown_run_fails() {
    let temp_dir = TempDir::new().unwrap();

    let output = astra(temp_dir.path(), &["status", "run_missing"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Run not found"));
}

#[tokio::test]
async fn test_orchestrator_accepts_shared_engine() {
    let temp_dir = TempDir::new().unwrap();
    let engine: Arc<dyn DecisionEngine> = Arc::new(SubprocessEngine::with_binary_path(
        ENGINE_BIN,
        Duration::from_secs(10),
    ));
    let orchestrator = Orchestrator::with_engine(&Config::with_home(temp_dir.path()), engine)
        .await
        .unwrap();

    let outcome = orchestrator
        .trigger(TriggerRequest {
            risk_level: Some("low".to_string()),
            ..TriggerRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(outcome.record.status, RunStatus::Completed);
}
