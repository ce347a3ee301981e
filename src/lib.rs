//! astra - Policy-gated run orchestrator
//!
//! Drives runs through policy evaluation, an optional human approval gate,
//! and execution. Every decision comes from an external decision engine; the
//! orchestrator only sequences calls and keeps the record.
//!
//! # Architecture
//!
//! - Each run has one mutable record, rewritten in full at every persist point
//! - Every transition is appended to a shared JSONL event log
//! - Approval tokens are bound to the policy snapshot they were issued against
//!
//! # Modules
//!
//! - `adapters`: Decision engine contract and clients
//! - `core`: RunStore, EventLog, Orchestrator, audit
//! - `domain`: Data structures (RunRecord, Event, ApprovalToken)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Start a run (prints the run id)
//! astra trigger --risk-level high
//!
//! # Approve a paused run
//! astra approve <run-id>
//!
//! # Check run status
//! astra status <run-id>
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;

// Re-export main types at crate root for convenience
pub use adapters::{DecisionEngine, ReferenceEngine, SubprocessEngine};
pub use config::Config;
pub use crate::core::{EventLog, Orchestrator, RunOutcome, RunStore, StatusReport, TriggerRequest};
pub use domain::{ApprovalToken, Event, EventType, RunId, RunRecord, RunStatus};
pub use error::{OrchestratorError, Result};
