//! Pattern handlers
//!
//! Each handler appends its step records to the execution as it goes and
//! returns the pattern-specific result payload. Step failures are data; only
//! malformed context values surface as `ExecutorFault`.

use super::{deadline_exceeded, ExecutionOptions, WorkflowExecutor};
use crate::error::WorkflowError;
use crate::models::{
    ExecutionContext, ExecutionPattern, ExecutionStatus, ExecutionSummary, StepRecord,
    StepStatus, WorkflowDefinition, WorkflowExecution,
};
use crate::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, warn};

pub const DEFAULT_LOOP_ITERATIONS: u32 = 3;

//
// ================= Event Severity =================
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    /// Unknown labels get the most restrictive gate.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            other => {
                warn!(severity = other, "Unknown event severity, applying low-severity gate");
                Severity::Low
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    /// Whether a step runs for an event of this severity.
    pub fn admits(&self, step_name: &str) -> bool {
        let step = step_name.to_lowercase();
        match self {
            Severity::High => true,
            Severity::Medium => !step.contains("critical") && !step.contains("emergency"),
            Severity::Low => step.contains("assess") || step.contains("monitor"),
        }
    }
}

/// Offset to the next run of a recurring schedule.
pub fn next_run_offset(schedule_type: &str) -> chrono::Duration {
    match schedule_type {
        "hourly" => chrono::Duration::hours(1),
        "weekly" => chrono::Duration::weeks(1),
        "monthly" => chrono::Duration::days(30),
        _ => chrono::Duration::days(1),
    }
}

//
// ================= Context Accessors =================
//

fn type_fault(key: &str, expected: &str, value: &Value) -> WorkflowError {
    WorkflowError::ExecutorFault(format!(
        "context field '{}' must be {}, got {}",
        key, expected, value
    ))
}

pub(crate) fn context_u32(context: &ExecutionContext, key: &str) -> Result<Option<u32>> {
    match context.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| type_fault(key, "an unsigned integer", value)),
    }
}

pub(crate) fn context_str<'a>(context: &'a ExecutionContext, key: &str) -> Result<Option<&'a str>> {
    match context.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(value) => Err(type_fault(key, "a string", value)),
    }
}

pub(crate) fn context_bool(context: &ExecutionContext, key: &str) -> Result<Option<bool>> {
    match context.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(value) => Err(type_fault(key, "a boolean", value)),
    }
}

pub(crate) fn context_str_list(context: &ExecutionContext, key: &str) -> Result<Option<Vec<String>>> {
    match context.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| type_fault(key, "a list of strings", item))
            })
            .collect::<Result<Vec<_>>>()
            .map(Some),
        Some(value) => Err(type_fault(key, "a list of strings", value)),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn step_brief(record: &StepRecord) -> Value {
    json!({
        "step": record.step_name,
        "status": record.status,
        "attempts": record.attempts,
    })
}

//
// ================= Handlers =================
//

impl WorkflowExecutor {
    pub(super) async fn run_pattern(
        &self,
        execution: &mut WorkflowExecution,
        options: &ExecutionOptions,
        depth: usize,
        deadline: Option<Instant>,
    ) -> Result<Value> {
        match execution.workflow.pattern {
            ExecutionPattern::Sequential => self.run_sequential(execution, options).await,
            ExecutionPattern::Parallel => self.run_parallel(execution, options).await,
            ExecutionPattern::Loop => self.run_loop(execution, options).await,
            ExecutionPattern::EventDriven => self.run_event_driven(execution, options).await,
            ExecutionPattern::Scheduled => self.run_scheduled(execution, options).await,
            ExecutionPattern::MasterOrchestration => {
                self.run_master_orchestration(execution, options, depth, deadline).await
            }
        }
    }

    async fn run_step(
        &self,
        index: usize,
        step_name: &str,
        definition: &WorkflowDefinition,
        context: &ExecutionContext,
        options: &ExecutionOptions,
        iteration: Option<u32>,
    ) -> StepRecord {
        let started = Instant::now();
        let attempt = self
            .dispatcher
            .dispatch_with_retry(
                step_name,
                definition,
                context,
                &options.retry,
                self.config.retry_base_delay,
            )
            .await;

        let (status, output, error) = match attempt.outcome {
            Ok(payload) => (StepStatus::Success, payload, None),
            Err(e) => {
                warn!(
                    workflow_id = %definition.workflow_id,
                    step = step_name,
                    attempts = attempt.attempts,
                    error = %e.message,
                    "Step failed"
                );
                (StepStatus::Failed, json!({ "error": e.message }), Some(e.message))
            }
        };

        StepRecord {
            step_number: index + 1,
            step_name: step_name.to_string(),
            handler: attempt.route.to_string(),
            status,
            output,
            error,
            attempts: attempt.attempts,
            iteration,
            duration_ms: elapsed_ms(started),
            timestamp: Utc::now(),
        }
    }

    async fn pace(&self) {
        if !self.config.step_delay.is_zero() {
            tokio::time::sleep(self.config.step_delay).await;
        }
    }

    /// Every step in order; a failed step never stops the ones after it.
    async fn run_sequential(
        &self,
        execution: &mut WorkflowExecution,
        options: &ExecutionOptions,
    ) -> Result<Value> {
        let started = Instant::now();
        let definition = execution.workflow.clone();

        for (index, step) in definition.steps.iter().enumerate() {
            debug!(step = index + 1, total = definition.steps.len(), "Sequential step");
            let record = self
                .run_step(index, step, &definition, &execution.context, options, None)
                .await;
            execution.step_results.push(record);
            self.pace().await;
        }

        let succeeded = execution.step_results.iter().filter(|r| r.is_success()).count();
        Ok(json!({
            "pattern": ExecutionPattern::Sequential,
            "steps_completed": execution.step_results.iter().map(|r| &r.step_name).collect::<Vec<_>>(),
            "steps_succeeded": succeeded,
            "steps_failed": execution.step_results.len() - succeeded,
            "execution_time_ms": elapsed_ms(started),
        }))
    }

    /// Fan out all steps (at most `max_concurrent_tasks` in flight) and record
    /// results in declared order.
    async fn run_parallel(
        &self,
        execution: &mut WorkflowExecution,
        options: &ExecutionOptions,
    ) -> Result<Value> {
        let started = Instant::now();
        let definition = execution.workflow.clone();
        let max_concurrent = context_u32(&execution.context, "max_concurrent_tasks")?
            .map(|n| n.max(1) as usize)
            .unwrap_or(definition.steps.len())
            .max(1);

        let context = &execution.context;
        let mut pending = Vec::with_capacity(definition.steps.len());
        for (index, step) in definition.steps.iter().enumerate() {
            pending.push(self.run_step(index, step, &definition, context, options, None));
        }
        let records: Vec<StepRecord> = stream::iter(pending)
            .buffered(max_concurrent)
            .collect()
            .await;

        let tasks: Vec<Value> = records
            .iter()
            .map(|r| json!({ "step": r.step_name, "success": r.is_success() }))
            .collect();
        let failed = records.iter().filter(|r| !r.is_success()).count();
        execution.step_results.extend(records);

        Ok(json!({
            "pattern": ExecutionPattern::Parallel,
            "parallel_tasks": tasks,
            "max_concurrent_tasks": max_concurrent,
            "failed_tasks": failed,
            "execution_time_ms": elapsed_ms(started),
        }))
    }

    /// Repeat the full step list up to `min(max_iterations, hard cap)` times,
    /// asking the continuation predicate after each iteration.
    async fn run_loop(
        &self,
        execution: &mut WorkflowExecution,
        options: &ExecutionOptions,
    ) -> Result<Value> {
        let started = Instant::now();
        let definition = execution.workflow.clone();
        let requested =
            context_u32(&execution.context, "max_iterations")?.unwrap_or(DEFAULT_LOOP_ITERATIONS);
        let limit = requested.min(self.config.loop_hard_cap);

        let mut blocks = Vec::new();
        let mut iterations = 0;

        for iteration in 1..=limit {
            debug!(iteration, limit, "Loop iteration");

            let mut iteration_context = execution.context.clone();
            iteration_context.insert("iteration".to_string(), json!(iteration));

            let mut records = Vec::with_capacity(definition.steps.len());
            for (index, step) in definition.steps.iter().enumerate() {
                let record = self
                    .run_step(index, step, &definition, &iteration_context, options, Some(iteration))
                    .await;
                records.push(record);
                self.pace().await;
            }

            iterations = iteration;
            blocks.push(json!({
                "iteration": iteration,
                "steps": records.iter().map(step_brief).collect::<Vec<_>>(),
                "timestamp": Utc::now(),
            }));

            let proceed = options.continuation.should_continue(iteration, &records);
            execution.step_results.extend(records);
            if !proceed {
                debug!(iteration, "Loop continuation declined");
                break;
            }
        }

        Ok(json!({
            "pattern": ExecutionPattern::Loop,
            "iterations": iterations,
            "requested_iterations": requested,
            "hard_cap": self.config.loop_hard_cap,
            "stopped_early": iterations < limit,
            "loop_results": blocks,
            "execution_time_ms": elapsed_ms(started),
        }))
    }

    /// Gate the step list by event severity, then run the admitted steps in order.
    async fn run_event_driven(
        &self,
        execution: &mut WorkflowExecution,
        options: &ExecutionOptions,
    ) -> Result<Value> {
        let started = Instant::now();
        let definition = execution.workflow.clone();
        let event_type = context_str(&execution.context, "event_type")?
            .unwrap_or("market_volatility")
            .to_string();
        let severity = Severity::parse(context_str(&execution.context, "severity")?.unwrap_or("medium"));

        debug!(event_type = %event_type, severity = severity.as_str(), "Processing event");

        let mut actions = Vec::new();
        let mut skipped = Vec::new();
        for (index, step) in definition.steps.iter().enumerate() {
            if !severity.admits(step) {
                skipped.push(step.clone());
                continue;
            }
            let record = self
                .run_step(index, step, &definition, &execution.context, options, None)
                .await;
            actions.push(json!({
                "action": record.step_name,
                "status": record.status,
                "timestamp": record.timestamp,
            }));
            execution.step_results.push(record);
            self.pace().await;
        }

        Ok(json!({
            "pattern": ExecutionPattern::EventDriven,
            "event_type": event_type,
            "severity": severity.as_str(),
            "event_processed": true,
            "actions_taken": actions,
            "skipped_steps": skipped,
            "response_time_ms": elapsed_ms(started),
        }))
    }

    /// Run every step once; recurring schedules also report their next run.
    async fn run_scheduled(
        &self,
        execution: &mut WorkflowExecution,
        options: &ExecutionOptions,
    ) -> Result<Value> {
        let started = Instant::now();
        let definition = execution.workflow.clone();
        let schedule_type = context_str(&execution.context, "schedule_type")?
            .unwrap_or("daily")
            .to_string();
        let recurring = context_bool(&execution.context, "recurring")?.unwrap_or(false);

        let mut tasks = Vec::new();
        for (index, step) in definition.steps.iter().enumerate() {
            let record = self
                .run_step(index, step, &definition, &execution.context, options, None)
                .await;
            tasks.push(json!({
                "task": record.step_name,
                "status": record.status,
                "executed_at": record.timestamp,
            }));
            execution.step_results.push(record);
            self.pace().await;
        }

        let next_scheduled_run = recurring.then(|| Utc::now() + next_run_offset(&schedule_type));

        Ok(json!({
            "pattern": ExecutionPattern::Scheduled,
            "schedule_type": schedule_type,
            "recurring": recurring,
            "scheduled_tasks": tasks,
            "next_scheduled_run": next_scheduled_run,
            "execution_time_ms": elapsed_ms(started),
        }))
    }

    /// Run each id in `sub_workflows` through the executor. Sub-workflow failures
    /// are reported in the summaries and never fail the parent. Children share
    /// the parent's deadline, and the summaries so far are kept on the parent
    /// record so a cancelled parent still shows what ran.
    async fn run_master_orchestration(
        &self,
        execution: &mut WorkflowExecution,
        options: &ExecutionOptions,
        depth: usize,
        deadline: Option<Instant>,
    ) -> Result<Value> {
        let started = Instant::now();
        let sub_workflow_ids = context_str_list(&execution.context, "sub_workflows")?.unwrap_or_default();

        let mut summaries: Vec<ExecutionSummary> = Vec::with_capacity(sub_workflow_ids.len());
        for workflow_id in &sub_workflow_ids {
            if deadline.is_some_and(|at| Instant::now() >= at) {
                return Err(deadline_exceeded(options));
            }

            let Some(definition) = self.catalog.get(workflow_id) else {
                warn!(workflow_id = %workflow_id, "Unknown sub-workflow");
                summaries.push(ExecutionSummary::rejected(
                    workflow_id.clone(),
                    0,
                    format!("Workflow not found: {}", workflow_id),
                ));
                execution.pattern_result = orchestration_result(&summaries, sub_workflow_ids.len(), started);
                continue;
            };

            if depth >= self.config.max_orchestration_depth {
                warn!(
                    workflow_id = %workflow_id,
                    depth,
                    "Orchestration depth limit reached"
                );
                summaries.push(ExecutionSummary::rejected(
                    workflow_id.clone(),
                    definition.steps.len(),
                    format!(
                        "orchestration depth limit of {} reached",
                        self.config.max_orchestration_depth
                    ),
                ));
                execution.pattern_result = orchestration_result(&summaries, sub_workflow_ids.len(), started);
                continue;
            }

            let child_options = ExecutionOptions {
                timeout: deadline.map(|at| at.saturating_duration_since(Instant::now())),
                ..options.clone()
            };
            let child = self
                .run(definition, execution.context.clone(), &child_options, depth + 1)
                .await;
            summaries.push(child.summary());
            execution.pattern_result = orchestration_result(&summaries, sub_workflow_ids.len(), started);

            if child.status == ExecutionStatus::Cancelled && deadline.is_some_and(|at| Instant::now() >= at) {
                return Err(deadline_exceeded(options));
            }
        }

        Ok(orchestration_result(&summaries, sub_workflow_ids.len(), started))
    }
}

fn orchestration_result(summaries: &[ExecutionSummary], total: usize, started: Instant) -> Value {
    let failed = summaries
        .iter()
        .filter(|s| s.status != ExecutionStatus::Completed)
        .count();

    json!({
        "pattern": ExecutionPattern::MasterOrchestration,
        "sub_workflows": summaries,
        "sub_workflows_total": total,
        "sub_workflows_failed": failed,
        "execution_time_ms": elapsed_ms(started),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_gate() {
        let steps = [
            "Initiate emergency protocols",
            "Assess crisis severity and impact",
            "Coordinate team response",
            "Escalate critical positions",
            "Monitor client sentiment",
        ];

        let admitted = |severity: Severity| -> Vec<&str> {
            steps.iter().copied().filter(|s| severity.admits(s)).collect()
        };

        assert_eq!(admitted(Severity::High).len(), 5);
        assert_eq!(
            admitted(Severity::Medium),
            vec!["Assess crisis severity and impact", "Coordinate team response", "Monitor client sentiment"]
        );
        assert_eq!(
            admitted(Severity::Low),
            vec!["Assess crisis severity and impact", "Monitor client sentiment"]
        );
    }

    #[test]
    fn test_unknown_severity_uses_low_gate() {
        assert_eq!(Severity::parse("extreme"), Severity::Low);
        assert_eq!(Severity::parse(" HIGH "), Severity::High);
    }

    #[test]
    fn test_next_run_offsets() {
        assert_eq!(next_run_offset("hourly"), chrono::Duration::hours(1));
        assert_eq!(next_run_offset("weekly"), chrono::Duration::days(7));
        assert_eq!(next_run_offset("monthly"), chrono::Duration::days(30));
        assert_eq!(next_run_offset("fortnightly"), chrono::Duration::days(1));
    }

    #[test]
    fn test_context_type_checks() {
        let mut context = ExecutionContext::new();
        context.insert("max_iterations".into(), json!("three"));
        context.insert("recurring".into(), json!("yes"));
        context.insert("sub_workflows".into(), json!(["ADV001", 7]));
        context.insert("severity".into(), json!("high"));

        assert!(matches!(
            context_u32(&context, "max_iterations"),
            Err(WorkflowError::ExecutorFault(_))
        ));
        assert!(context_bool(&context, "recurring").is_err());
        assert!(context_str_list(&context, "sub_workflows").is_err());
        assert_eq!(context_str(&context, "severity").unwrap(), Some("high"));
        assert_eq!(context_u32(&context, "missing").unwrap(), None);
    }
}
