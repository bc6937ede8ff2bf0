//! Wealth Workflow Orchestrator
//!
//! A workflow classification-and-execution engine for wealth management:
//! - Keeps a catalog of workflow definitions, each tagged with an execution pattern
//! - Classifies free-text requests by persona, urgency, complexity and trigger
//! - Routes a classification to a pattern, handler, priority, timeout and retry policy
//! - Executes workflow steps sequentially, in parallel, in bounded loops, gated by
//!   event severity, on a schedule or as an orchestration of sub-workflows
//! - Replays generated test cases against every workflow
//!
//! REQUEST FLOW:
//! INPUT → CLASSIFY → ROUTE → SELECT → EXECUTE → COMPLETE

pub mod agent;
pub mod api;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod error;
pub mod execution;
pub mod harness;
pub mod models;
pub mod router;
pub mod state;
pub mod tools;

pub use error::{Result, StepError, WorkflowError};

// Re-export common types
pub use agent::{Orchestrator, OrchestratorBuilder};
pub use catalog::{Catalog, CatalogFilter};
pub use classifier::WorkflowClassifier;
pub use config::EngineConfig;
pub use execution::{ExecutionOptions, WorkflowExecutor};
pub use models::*;
pub use router::WorkflowRouter;
