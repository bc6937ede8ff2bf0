//! Error types for the workflow orchestrator

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, WorkflowError>;

#[derive(Error, Debug)]
pub enum WorkflowError {

    // =============================
    // Catalog Errors
    // =============================

    #[error("Duplicate workflow id: {0}")]
    DuplicateId(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Invalid workflow definition: {0}")]
    InvalidDefinition(String),

    #[error("Catalog integrity check failed: {0}")]
    Integrity(String),

    #[error("Unknown {kind}: '{value}'")]
    UnknownLabel { kind: &'static str, value: String },

    // =============================
    // Execution Errors
    // =============================

    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("Step handler error: {0}")]
    Step(String),

    #[error("Executor fault: {0}")]
    ExecutorFault(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    // =============================
    // Configuration
    // =============================

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A failed step, converted to data at the dispatcher boundary.
///
/// Never propagated as an error past the dispatcher: pattern handlers record it
/// and decide for themselves whether the execution continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepError {
    pub step_name: String,
    pub message: String,
}

impl StepError {
    pub fn new(step_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step '{}' failed: {}", self.step_name, self.message)
    }
}

impl std::error::Error for StepError {}
