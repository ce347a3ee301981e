//! Core orchestration logic.
//!
//! This module contains:
//! - RunStore: One durable record per run
//! - EventLog: Append-only event logging
//! - Orchestrator: The run lifecycle
//! - audit: Trail consistency checks

pub mod audit;
pub mod event_store;
pub mod orchestrator;
pub mod run_store;

// Re-export commonly used types
pub use audit::{verify_run, AuditFinding, AuditReport};
pub use event_store::{EventLog, DEFAULT_QUERY_LIMIT};
pub use orchestrator::{Orchestrator, RunOutcome, StatusReport, TriggerRequest};
pub use run_store::{RunLock, RunStore};
