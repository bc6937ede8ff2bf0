//! Declarative expectations for harness test cases
//!
//! Each expectation inspects a finished execution and yields a check result.
//! A case passes only when every one of its checks passes.

use crate::models::{ExecutionStatus, StepStatus, WorkflowExecution};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Expectation {
    Status(ExecutionStatus),
    /// Exact number of step records
    StepsRecorded(usize),
    MaxDurationMs(u64),
    /// Completed despite step failures, and every failed step explains itself
    GracefulDegradation,
    /// Event-driven response time headline
    MaxResponseTimeMs(u64),
    EventProcessed,
    ParallelTasksRecorded,
    NextRunScheduled,
    IterationsAtMost(u32),
    SubWorkflowsReported(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationCheck {
    pub expectation: Expectation,
    pub passed: bool,
    pub details: String,
}

impl Expectation {
    pub fn name(&self) -> &'static str {
        match self {
            Expectation::Status(_) => "status",
            Expectation::StepsRecorded(_) => "steps_recorded",
            Expectation::MaxDurationMs(_) => "max_duration",
            Expectation::GracefulDegradation => "graceful_degradation",
            Expectation::MaxResponseTimeMs(_) => "max_response_time",
            Expectation::EventProcessed => "event_processed",
            Expectation::ParallelTasksRecorded => "parallel_tasks_recorded",
            Expectation::NextRunScheduled => "next_run_scheduled",
            Expectation::IterationsAtMost(_) => "iterations_at_most",
            Expectation::SubWorkflowsReported(_) => "sub_workflows_reported",
        }
    }

    pub fn evaluate(&self, execution: &WorkflowExecution) -> ExpectationCheck {
        let result = &execution.pattern_result;

        let (passed, details) = match self {
            Expectation::Status(expected) => (
                execution.status == *expected,
                format!("Expected status {}, got {}", expected, execution.status),
            ),
            Expectation::StepsRecorded(expected) => {
                let actual = execution.step_results.len();
                (
                    actual == *expected,
                    format!("Expected {} step records, got {}", expected, actual),
                )
            }
            Expectation::MaxDurationMs(max) => match execution.duration_ms() {
                Some(actual) => (
                    actual <= *max,
                    format!("Execution took {} ms, max allowed {} ms", actual, max),
                ),
                None => (false, "Execution has no duration".to_string()),
            },
            Expectation::GracefulDegradation => {
                let failed: Vec<_> = execution
                    .step_results
                    .iter()
                    .filter(|r| r.status == StepStatus::Failed)
                    .collect();
                let explained = failed.iter().all(|r| r.error.is_some());
                (
                    execution.status == ExecutionStatus::Completed && explained,
                    format!(
                        "Status {} with {} failed step(s), all explained: {}",
                        execution.status,
                        failed.len(),
                        explained
                    ),
                )
            }
            Expectation::MaxResponseTimeMs(max) => match result["response_time_ms"].as_u64() {
                Some(actual) => (
                    actual <= *max,
                    format!("Response time {} ms, max allowed {} ms", actual, max),
                ),
                None => (false, "No response time reported".to_string()),
            },
            Expectation::EventProcessed => (
                result["event_processed"] == Value::Bool(true),
                format!("event_processed = {}", result["event_processed"]),
            ),
            Expectation::ParallelTasksRecorded => {
                let tasks = result["parallel_tasks"].as_array().map_or(0, Vec::len);
                (
                    tasks > 0 && tasks == execution.workflow.steps.len(),
                    format!("{} parallel task(s) recorded", tasks),
                )
            }
            Expectation::NextRunScheduled => (
                result["next_scheduled_run"].is_string(),
                format!("next_scheduled_run = {}", result["next_scheduled_run"]),
            ),
            Expectation::IterationsAtMost(max) => match result["iterations"].as_u64() {
                Some(actual) => (
                    actual >= 1 && actual <= u64::from(*max),
                    format!("{} iteration(s), max allowed {}", actual, max),
                ),
                None => (false, "No iteration count reported".to_string()),
            },
            Expectation::SubWorkflowsReported(expected) => {
                let reported = result["sub_workflows"].as_array().map_or(0, Vec::len);
                (
                    reported == *expected,
                    format!("Expected {} sub-workflow summaries, got {}", expected, reported),
                )
            }
        };

        ExpectationCheck {
            expectation: self.clone(),
            passed,
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ComplexityTier, ExecutionContext, ExecutionPattern, StepRecord, WorkflowCategory,
        WorkflowDefinition,
    };
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Arc;

    fn finished(pattern: ExecutionPattern, result: Value) -> WorkflowExecution {
        let definition = Arc::new(WorkflowDefinition::new(
            "TST001",
            "Expectation test",
            WorkflowCategory::Client,
            pattern,
            ComplexityTier::Simple,
            &["Assess exposure", "Notify clients"],
        ));
        let mut execution = WorkflowExecution::new(definition, ExecutionContext::new());
        execution.transition(ExecutionStatus::InProgress).unwrap();
        execution.complete(result).unwrap();
        execution
    }

    fn record(step_name: &str, status: StepStatus, error: Option<&str>) -> StepRecord {
        StepRecord {
            step_number: 1,
            step_name: step_name.to_string(),
            handler: "generic".to_string(),
            status,
            output: json!({}),
            error: error.map(str::to_string),
            attempts: 1,
            iteration: None,
            duration_ms: 0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_status_and_step_count() {
        let mut execution = finished(ExecutionPattern::Sequential, json!({}));
        execution.step_results.push(record("Assess exposure", StepStatus::Success, None));

        assert!(Expectation::Status(ExecutionStatus::Completed).evaluate(&execution).passed);
        assert!(!Expectation::Status(ExecutionStatus::Failed).evaluate(&execution).passed);

        let check = Expectation::StepsRecorded(2).evaluate(&execution);
        assert!(!check.passed);
        assert_eq!(check.details, "Expected 2 step records, got 1");
    }

    #[test]
    fn test_graceful_degradation() {
        let mut execution = finished(ExecutionPattern::Sequential, json!({}));
        execution
            .step_results
            .push(record("Assess exposure", StepStatus::Failed, Some("service down")));
        assert!(Expectation::GracefulDegradation.evaluate(&execution).passed);

        execution
            .step_results
            .push(record("Notify clients", StepStatus::Failed, None));
        assert!(!Expectation::GracefulDegradation.evaluate(&execution).passed);
    }

    #[test]
    fn test_pattern_result_checks() {
        let event = finished(
            ExecutionPattern::EventDriven,
            json!({ "event_processed": true, "response_time_ms": 12 }),
        );
        assert!(Expectation::EventProcessed.evaluate(&event).passed);
        assert!(Expectation::MaxResponseTimeMs(2000).evaluate(&event).passed);
        assert!(!Expectation::MaxResponseTimeMs(5).evaluate(&event).passed);

        let parallel = finished(
            ExecutionPattern::Parallel,
            json!({ "parallel_tasks": [{ "step": "a" }, { "step": "b" }] }),
        );
        assert!(Expectation::ParallelTasksRecorded.evaluate(&parallel).passed);

        let scheduled = finished(ExecutionPattern::Scheduled, json!({ "next_scheduled_run": null }));
        assert!(!Expectation::NextRunScheduled.evaluate(&scheduled).passed);

        let looped = finished(ExecutionPattern::Loop, json!({ "iterations": 5 }));
        assert!(Expectation::IterationsAtMost(5).evaluate(&looped).passed);
        assert!(!Expectation::IterationsAtMost(4).evaluate(&looped).passed);

        let master = finished(
            ExecutionPattern::MasterOrchestration,
            json!({ "sub_workflows": [{}, {}] }),
        );
        let check = Expectation::SubWorkflowsReported(3).evaluate(&master);
        assert!(!check.passed);
        assert_eq!(check.expectation.name(), "sub_workflows_reported");
    }

    #[test]
    fn test_wire_format() {
        let encoded = serde_json::to_value(Expectation::MaxDurationMs(5000)).unwrap();
        assert_eq!(encoded, json!({ "kind": "max_duration_ms", "value": 5000 }));
    }
}
