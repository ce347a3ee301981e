//! Domain types for the run orchestrator.
//!
//! This module contains the core data structures:
//! - Run: the persisted record and its status machine
//! - Events: immutable audit trail entries
//! - Approval: tokens issued by the decision engine

pub mod approval;
pub mod events;
pub mod run;

// Re-export commonly used types
pub use approval::ApprovalToken;
pub use events::{Event, EventType, ACTOR_ORCHESTRATOR, ACTOR_POLICY};
pub use run::{RunId, RunRecord, RunStatus};
