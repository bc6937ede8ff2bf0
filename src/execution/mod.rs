//! Workflow executor
//!
//! Creates an execution record, runs the workflow's pattern handler through the
//! step dispatcher and always finalizes the record in a terminal state.
//! Faults inside a pattern become FAILED, an expired deadline becomes CANCELLED;
//! neither is returned to the caller as an error.

mod patterns;

pub use patterns::{next_run_offset, Severity, DEFAULT_LOOP_ITERATIONS};

use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::error::WorkflowError;
use crate::models::{
    ExecutionContext, ExecutionStatus, ExecutorStats, RetryPolicy, RoutingDecision, StepRecord,
    WorkflowDefinition, WorkflowExecution, WorkflowUsage,
};
use crate::state::{ExecutionStore, InMemoryExecutionStore};
use crate::tools::StepDispatcher;
use crate::Result;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Number of workflows listed in `ExecutorStats::most_executed`
const MOST_EXECUTED_LIMIT: usize = 5;

/// Decides whether a loop runs another iteration, given the iteration just
/// finished (1-based) and its step records.
pub trait LoopContinuation: Send + Sync {
    fn should_continue(&self, iteration: u32, records: &[StepRecord]) -> bool;
}

impl<F> LoopContinuation for F
where
    F: Fn(u32, &[StepRecord]) -> bool + Send + Sync,
{
    fn should_continue(&self, iteration: u32, records: &[StepRecord]) -> bool {
        self(iteration, records)
    }
}

/// Default continuation: keep going while some step produced a payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinueWhileProductive;

impl LoopContinuation for ContinueWhileProductive {
    fn should_continue(&self, _iteration: u32, records: &[StepRecord]) -> bool {
        records.iter().any(StepRecord::has_payload)
    }
}

#[derive(Clone)]
pub struct ExecutionOptions {
    /// Deadline for the whole execution; `None` runs unbounded
    pub timeout: Option<Duration>,
    pub retry: RetryPolicy,
    pub continuation: Arc<dyn LoopContinuation>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            retry: RetryPolicy::default(),
            continuation: Arc::new(ContinueWhileProductive),
        }
    }
}

impl ExecutionOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_continuation(mut self, continuation: impl LoopContinuation + 'static) -> Self {
        self.continuation = Arc::new(continuation);
        self
    }

    /// Options derived from a routing decision: its retry policy, and its
    /// deadline when timeouts are enforced.
    pub fn from_routing(decision: &RoutingDecision, config: &EngineConfig) -> Self {
        Self {
            timeout: config.enforce_timeouts.then(|| decision.execution_deadline()),
            retry: decision.retry_policy,
            ..Self::default()
        }
    }
}

type BoxedExecution<'a> = Pin<Box<dyn Future<Output = WorkflowExecution> + Send + 'a>>;

pub struct WorkflowExecutor {
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) dispatcher: Arc<StepDispatcher>,
    store: Arc<dyn ExecutionStore>,
    pub(crate) config: EngineConfig,
}

impl WorkflowExecutor {
    pub fn new(catalog: Arc<Catalog>, dispatcher: Arc<StepDispatcher>, config: EngineConfig) -> Self {
        Self {
            catalog,
            dispatcher,
            store: Arc::new(InMemoryExecutionStore::new()),
            config,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ExecutionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a workflow with default options. The only error is an unknown id;
    /// every other outcome is a terminal execution record.
    pub async fn execute_workflow(
        &self,
        workflow_id: &str,
        context: ExecutionContext,
    ) -> Result<WorkflowExecution> {
        self.execute_with_options(workflow_id, context, &ExecutionOptions::default())
            .await
    }

    pub async fn execute_with_options(
        &self,
        workflow_id: &str,
        context: ExecutionContext,
        options: &ExecutionOptions,
    ) -> Result<WorkflowExecution> {
        let definition = self
            .catalog
            .get(workflow_id)
            .ok_or_else(|| WorkflowError::WorkflowNotFound(workflow_id.to_string()))?;

        Ok(self.run(definition, context, options, 0).await)
    }

    /// Boxed so master orchestration can recurse into it.
    pub(crate) fn run<'a>(
        &'a self,
        definition: Arc<WorkflowDefinition>,
        context: ExecutionContext,
        options: &'a ExecutionOptions,
        depth: usize,
    ) -> BoxedExecution<'a> {
        Box::pin(async move {
            let mut execution = WorkflowExecution::new(definition, context);

            if let Err(e) = execution.transition(ExecutionStatus::InProgress) {
                error!(execution_id = %execution.execution_id, error = %e, "Could not start execution");
            }

            info!(
                execution_id = %execution.execution_id,
                workflow_id = %execution.workflow_id(),
                pattern = %execution.workflow.pattern,
                depth,
                "Starting workflow execution"
            );

            let mut guard = AbandonGuard::new(self.store.clone(), &execution);
            if let Err(e) = self.store.begin(&execution).await {
                warn!(execution_id = %execution.execution_id, error = %e, "Failed to record active execution");
            }

            // a deadline past the clock's range is no deadline
            let deadline = options.timeout.and_then(|timeout| Instant::now().checked_add(timeout));
            let outcome = match deadline {
                Some(at) => {
                    let pattern = self.run_pattern(&mut execution, options, depth, deadline);
                    match tokio::time::timeout_at(at, pattern).await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(deadline_exceeded(options)),
                    }
                }
                None => self.run_pattern(&mut execution, options, depth, None).await,
            };

            let finalized = match outcome {
                Ok(pattern_result) => execution.complete(pattern_result),
                Err(WorkflowError::Timeout(ms)) => {
                    warn!(
                        execution_id = %execution.execution_id,
                        deadline_ms = ms,
                        steps_recorded = execution.step_results.len(),
                        "Execution deadline exceeded"
                    );
                    execution.cancel(format!("Execution exceeded its deadline of {} ms", ms))
                }
                Err(e) => {
                    error!(
                        execution_id = %execution.execution_id,
                        workflow_id = %execution.workflow_id(),
                        error = %e,
                        "Workflow execution failed"
                    );
                    execution.fail(e.to_string())
                }
            };
            if let Err(e) = finalized {
                error!(execution_id = %execution.execution_id, error = %e, "Could not finalize execution");
            }

            if let Err(e) = self.store.complete(&execution).await {
                warn!(execution_id = %execution.execution_id, error = %e, "Failed to archive execution");
            }
            guard.disarm();

            info!(
                execution_id = %execution.execution_id,
                workflow_id = %execution.workflow_id(),
                status = %execution.status,
                steps = execution.step_results.len(),
                duration_ms = execution.duration_ms().unwrap_or(0),
                "Workflow execution finished"
            );

            execution
        })
    }

    pub async fn get_execution(&self, execution_id: Uuid) -> Result<Option<WorkflowExecution>> {
        self.store.get(execution_id).await
    }

    pub async fn active_executions(&self) -> Result<Vec<WorkflowExecution>> {
        self.store.active().await
    }

    pub async fn recent_executions(&self, limit: usize) -> Result<Vec<WorkflowExecution>> {
        self.store.history(limit).await
    }

    pub async fn stats(&self) -> Result<ExecutorStats> {
        let active = self.store.active().await?;
        let history = self.store.history(usize::MAX).await?;

        let count = |status: ExecutionStatus| history.iter().filter(|e| e.status == status).count();
        let successful = count(ExecutionStatus::Completed);

        let durations: Vec<u64> = history.iter().filter_map(|e| e.duration_ms()).collect();
        let average_duration_ms = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<u64>() as f64 / durations.len() as f64
        };

        Ok(ExecutorStats {
            active_executions: active.len(),
            total_executions: history.len(),
            successful_executions: successful,
            failed_executions: count(ExecutionStatus::Failed),
            cancelled_executions: count(ExecutionStatus::Cancelled),
            success_rate: successful as f64 / history.len().max(1) as f64,
            average_duration_ms,
            most_executed: most_executed(&history, MOST_EXECUTED_LIMIT),
        })
    }
}

pub(crate) fn deadline_exceeded(options: &ExecutionOptions) -> WorkflowError {
    WorkflowError::Timeout(options.timeout.map_or(0, |t| t.as_millis() as u64))
}

/// Archives an execution as CANCELLED when its future is dropped before the
/// record reaches a terminal state, e.g. by an outer timeout or a closed
/// HTTP connection.
struct AbandonGuard {
    store: Arc<dyn ExecutionStore>,
    snapshot: Option<WorkflowExecution>,
}

impl AbandonGuard {
    fn new(store: Arc<dyn ExecutionStore>, execution: &WorkflowExecution) -> Self {
        Self {
            store,
            snapshot: Some(execution.clone()),
        }
    }

    fn disarm(&mut self) {
        self.snapshot = None;
    }
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        let Some(mut execution) = self.snapshot.take() else {
            return;
        };

        warn!(
            execution_id = %execution.execution_id,
            workflow_id = %execution.workflow_id(),
            "Execution dropped before finishing"
        );
        if let Err(e) = execution.cancel("Execution was abandoned before it finished") {
            error!(execution_id = %execution.execution_id, error = %e, "Could not cancel abandoned execution");
            return;
        }

        // the store is async; archive from a task on the current runtime
        let store = self.store.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = store.complete(&execution).await {
                        warn!(execution_id = %execution.execution_id, error = %e, "Failed to archive abandoned execution");
                    }
                });
            }
            Err(_) => {
                warn!(execution_id = %execution.execution_id, "No runtime left to archive abandoned execution");
            }
        }
    }
}

/// Execution counts per workflow, highest first; ties keep first-seen order.
fn most_executed(history: &[WorkflowExecution], limit: usize) -> Vec<WorkflowUsage> {
    let mut usage: Vec<WorkflowUsage> = Vec::new();
    let mut position: HashMap<&str, usize> = HashMap::new();

    for execution in history {
        let workflow_id = execution.workflow_id();
        match position.get(workflow_id) {
            Some(&index) => usage[index].execution_count += 1,
            None => {
                position.insert(workflow_id, usage.len());
                usage.push(WorkflowUsage {
                    workflow_id: workflow_id.to_string(),
                    workflow_name: execution.workflow.name.clone(),
                    execution_count: 1,
                });
            }
        }
    }

    // stable sort
    usage.sort_by(|a, b| b.execution_count.cmp(&a.execution_count));
    usage.truncate(limit);
    usage
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ComplexityTier, ExecutionPattern, ExecutionSummary, StepStatus, WorkflowCategory,
    };
    use crate::tools::StepHandler;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Behaviour keyed on the step name: "fail" errors, "quiet" returns an empty
    /// payload, "lag <ms>" sleeps first, "stall" sleeps for a long time.
    #[derive(Default)]
    struct ScriptedHandler {
        completions: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl StepHandler for ScriptedHandler {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn invoke(&self, step_name: &str, _context: &ExecutionContext) -> Result<Value> {
            let lowered = step_name.to_lowercase();

            if let Some(ms) = lowered
                .strip_prefix("lag ")
                .and_then(|rest| rest.split_whitespace().next())
                .and_then(|n| n.parse::<u64>().ok())
            {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            if lowered.contains("stall") {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }

            self.completions.lock().unwrap().push(step_name.to_string());

            if lowered.contains("fail") {
                return Err(WorkflowError::Step("scripted failure".into()));
            }
            if lowered.contains("quiet") {
                return Ok(json!({}));
            }
            Ok(json!({ "status": "SUCCESS", "step": step_name }))
        }
    }

    fn definition(id: &str, pattern: ExecutionPattern, steps: &[&str]) -> WorkflowDefinition {
        WorkflowDefinition::new(
            id,
            format!("{} workflow", id),
            WorkflowCategory::Operations,
            pattern,
            ComplexityTier::Moderate,
            steps,
        )
    }

    fn test_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        let definitions = [
            definition(
                "SEQ4",
                ExecutionPattern::Sequential,
                &["Gather data", "Fail market analysis", "Prepare report", "Document interaction"],
            ),
            definition("PAR3", ExecutionPattern::Parallel, &["Lag 60 alpha", "Beta", "Lag 20 gamma"]),
            definition("LOOP2", ExecutionPattern::Loop, &["Check drift", "Track exposure"]),
            definition("QUIET", ExecutionPattern::Loop, &["Quiet scan"]),
            definition(
                "EVT5",
                ExecutionPattern::EventDriven,
                &[
                    "Initiate emergency protocols",
                    "Assess crisis severity",
                    "Coordinate team response",
                    "Notify clients",
                    "Monitor sentiment",
                ],
            ),
            definition("SCHED", ExecutionPattern::Scheduled, &["Generate statements", "File reports"]),
            definition("MASTER", ExecutionPattern::MasterOrchestration, &["Coordinate"]),
            definition("SLOW", ExecutionPattern::Sequential, &["First", "Stall here", "Never reached"]),
        ];
        for d in definitions {
            catalog.register(d).unwrap();
        }
        catalog
    }

    fn executor_with(handler: Arc<ScriptedHandler>) -> WorkflowExecutor {
        WorkflowExecutor::new(
            Arc::new(test_catalog()),
            Arc::new(StepDispatcher::new(handler)),
            EngineConfig {
                retry_base_delay: Duration::ZERO,
                ..EngineConfig::default()
            },
        )
    }

    fn executor() -> WorkflowExecutor {
        executor_with(Arc::new(ScriptedHandler::default()))
    }

    fn context(value: Value) -> ExecutionContext {
        match value {
            Value::Object(map) => map,
            _ => ExecutionContext::new(),
        }
    }

    fn iterations(execution: &WorkflowExecution) -> u64 {
        execution.pattern_result["iterations"].as_u64().unwrap()
    }

    #[tokio::test]
    async fn test_unknown_workflow_is_an_error() {
        let err = executor()
            .execute_workflow("NOPE", ExecutionContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::WorkflowNotFound(id) if id == "NOPE"));
    }

    #[tokio::test]
    async fn test_sequential_continues_after_step_failure() {
        let execution = executor()
            .execute_workflow("SEQ4", ExecutionContext::new())
            .await
            .unwrap();

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.step_results.len(), 4);
        assert!(execution.completed_at.is_some());
        assert!(execution.error_message.is_none());

        let statuses: Vec<StepStatus> = execution.step_results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![StepStatus::Success, StepStatus::Failed, StepStatus::Success, StepStatus::Success]
        );
        assert_eq!(execution.step_results[1].output["error"], "Step handler error: scripted failure");
        assert_eq!(execution.pattern_result["steps_failed"], 1);
    }

    #[tokio::test]
    async fn test_parallel_records_in_declared_order() {
        let handler = Arc::new(ScriptedHandler::default());
        let execution = executor_with(handler.clone())
            .execute_workflow("PAR3", ExecutionContext::new())
            .await
            .unwrap();

        let recorded: Vec<&str> = execution.step_results.iter().map(|r| r.step_name.as_str()).collect();
        assert_eq!(recorded, vec!["Lag 60 alpha", "Beta", "Lag 20 gamma"]);
        let numbers: Vec<usize> = execution.step_results.iter().map(|r| r.step_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        // completion order differs from the recorded order
        let completed = handler.completions.lock().unwrap().clone();
        assert_eq!(completed, vec!["Beta", "Lag 20 gamma", "Lag 60 alpha"]);
        assert_eq!(execution.status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn test_parallel_concurrency_limit_keeps_order() {
        let execution = executor()
            .execute_workflow("PAR3", context(json!({ "max_concurrent_tasks": 1 })))
            .await
            .unwrap();

        assert_eq!(execution.step_results.len(), 3);
        assert_eq!(execution.step_results[0].step_name, "Lag 60 alpha");
        assert_eq!(execution.pattern_result["max_concurrent_tasks"], 1);
    }

    #[tokio::test]
    async fn test_loop_runs_requested_iterations() {
        let options = ExecutionOptions::default().with_continuation(|_: u32, _: &[StepRecord]| true);
        let execution = executor()
            .execute_with_options("LOOP2", context(json!({ "max_iterations": 3 })), &options)
            .await
            .unwrap();

        assert_eq!(iterations(&execution), 3);
        assert_eq!(execution.pattern_result["loop_results"].as_array().unwrap().len(), 3);
        assert_eq!(execution.step_results.len(), 6);
        assert_eq!(execution.step_results[5].iteration, Some(3));
    }

    #[tokio::test]
    async fn test_loop_respects_hard_cap() {
        let options = ExecutionOptions::default().with_continuation(|_: u32, _: &[StepRecord]| true);
        let execution = executor()
            .execute_with_options("LOOP2", context(json!({ "max_iterations": 100 })), &options)
            .await
            .unwrap();

        assert_eq!(iterations(&execution), 5);
        assert_eq!(execution.pattern_result["requested_iterations"], 100);
        assert_eq!(execution.step_results.len(), 10);
    }

    #[tokio::test]
    async fn test_loop_default_continuation_stops_without_payloads() {
        let execution = executor()
            .execute_workflow("QUIET", context(json!({ "max_iterations": 4 })))
            .await
            .unwrap();

        assert_eq!(iterations(&execution), 1);
        assert_eq!(execution.pattern_result["stopped_early"], true);
    }

    #[tokio::test]
    async fn test_loop_continuation_sees_iteration_number() {
        let options =
            ExecutionOptions::default().with_continuation(|iteration: u32, _: &[StepRecord]| iteration < 2);
        let execution = executor()
            .execute_with_options("LOOP2", ExecutionContext::new(), &options)
            .await
            .unwrap();
        assert_eq!(iterations(&execution), 2);
    }

    #[tokio::test]
    async fn test_loop_with_malformed_iterations_fails() {
        let execution = executor()
            .execute_workflow("LOOP2", context(json!({ "max_iterations": "many" })))
            .await
            .unwrap();

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution.completed_at.is_some());
        assert!(execution.error_message.unwrap().contains("max_iterations"));
    }

    #[tokio::test]
    async fn test_event_low_severity_runs_assess_and_monitor_only() {
        let execution = executor()
            .execute_workflow("EVT5", context(json!({ "severity": "low" })))
            .await
            .unwrap();

        let dispatched: Vec<&str> = execution.step_results.iter().map(|r| r.step_name.as_str()).collect();
        assert_eq!(dispatched, vec!["Assess crisis severity", "Monitor sentiment"]);
        assert_eq!(execution.pattern_result["skipped_steps"].as_array().unwrap().len(), 3);
        assert!(execution.pattern_result["response_time_ms"].is_u64());
    }

    #[tokio::test]
    async fn test_event_severity_gates() {
        let executor = executor();

        let high = executor
            .execute_workflow("EVT5", context(json!({ "severity": "high" })))
            .await
            .unwrap();
        assert_eq!(high.step_results.len(), 5);

        let medium = executor
            .execute_workflow("EVT5", ExecutionContext::new())
            .await
            .unwrap();
        assert_eq!(medium.step_results.len(), 4);

        let unknown = executor
            .execute_workflow("EVT5", context(json!({ "severity": "extreme" })))
            .await
            .unwrap();
        assert_eq!(unknown.step_results.len(), 2);

        let malformed = executor
            .execute_workflow("EVT5", context(json!({ "severity": 9 })))
            .await
            .unwrap();
        assert_eq!(malformed.status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn test_scheduled_next_run() {
        let executor = executor();

        let recurring = executor
            .execute_workflow(
                "SCHED",
                context(json!({ "recurring": true, "schedule_type": "weekly" })),
            )
            .await
            .unwrap();
        let next_run: chrono::DateTime<chrono::Utc> =
            serde_json::from_value(recurring.pattern_result["next_scheduled_run"].clone()).unwrap();
        let offset = next_run - recurring.started_at.unwrap();
        assert!(offset >= chrono::Duration::days(7));
        assert!(offset < chrono::Duration::days(7) + chrono::Duration::minutes(1));

        let once = executor
            .execute_workflow("SCHED", ExecutionContext::new())
            .await
            .unwrap();
        assert!(once.pattern_result["next_scheduled_run"].is_null());
        assert_eq!(once.step_results.len(), 2);
    }

    #[tokio::test]
    async fn test_master_reports_sub_workflow_failures() {
        let executor = executor();
        let execution = executor
            .execute_workflow(
                "MASTER",
                context(json!({
                    "sub_workflows": ["SEQ4", "LOOP2", "MISSING"],
                    "max_iterations": "many",
                })),
            )
            .await
            .unwrap();

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(execution.step_results.is_empty());

        let summaries: Vec<ExecutionSummary> =
            serde_json::from_value(execution.pattern_result["sub_workflows"].clone()).unwrap();
        assert_eq!(summaries.len(), 3);

        assert_eq!(summaries[0].workflow_id, "SEQ4");
        assert_eq!(summaries[0].status, ExecutionStatus::Completed);
        assert_eq!(summaries[0].steps_completed, 4);
        assert_eq!(summaries[0].total_steps, 4);
        assert!((summaries[0].success_ratio - 0.75).abs() < 1e-9);

        assert_eq!(summaries[1].status, ExecutionStatus::Failed);
        assert!(summaries[1].execution_id.is_some());

        assert_eq!(summaries[2].status, ExecutionStatus::Failed);
        assert!(summaries[2].execution_id.is_none());
        assert_eq!(execution.pattern_result["sub_workflows_failed"], 2);

        // sub-executions are tracked like any other
        let child_id = summaries[0].execution_id.unwrap();
        assert!(executor.get_execution(child_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_master_recursion_is_bounded() {
        let executor = executor();
        let execution = executor
            .execute_workflow("MASTER", context(json!({ "sub_workflows": ["MASTER"] })))
            .await
            .unwrap();

        assert_eq!(execution.status, ExecutionStatus::Completed);
        // depths 0 through the configured maximum each produced one execution
        let max_depth = executor.config().max_orchestration_depth;
        assert_eq!(executor.recent_executions(100).await.unwrap().len(), max_depth + 1);
    }

    #[tokio::test]
    async fn test_deadline_cancels_and_keeps_partial_records() {
        let options = ExecutionOptions::default().with_timeout(Duration::from_millis(100));
        let execution = executor()
            .execute_with_options("SLOW", ExecutionContext::new(), &options)
            .await
            .unwrap();

        assert_eq!(execution.status, ExecutionStatus::Cancelled);
        assert!(execution.completed_at.is_some());
        assert!(execution.error_message.unwrap().contains("deadline"));
        assert_eq!(execution.step_results.len(), 1);
        assert_eq!(execution.step_results[0].step_name, "First");
    }

    #[tokio::test]
    async fn test_master_deadline_cancels_children() {
        let executor = executor();
        let options = ExecutionOptions::default().with_timeout(Duration::from_millis(100));
        let parent = executor
            .execute_with_options(
                "MASTER",
                context(json!({ "sub_workflows": ["SEQ4", "SLOW", "SCHED"] })),
                &options,
            )
            .await
            .unwrap();

        assert_eq!(parent.status, ExecutionStatus::Cancelled);
        assert!(parent.completed_at.is_some());

        // the children that ran before the deadline are still reported
        let summaries: Vec<ExecutionSummary> =
            serde_json::from_value(parent.pattern_result["sub_workflows"].clone()).unwrap();
        assert_eq!(summaries[0].workflow_id, "SEQ4");
        assert_eq!(summaries[0].status, ExecutionStatus::Completed);
        assert!(summaries.iter().all(|s| s.workflow_id != "SCHED"));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(executor.active_executions().await.unwrap().is_empty());

        let history = executor.recent_executions(10).await.unwrap();
        let slow = history.iter().find(|e| e.workflow_id() == "SLOW").unwrap();
        assert_eq!(slow.status, ExecutionStatus::Cancelled);
        assert!(slow.completed_at.is_some());
        assert_eq!(executor.stats().await.unwrap().active_executions, 0);
    }

    #[tokio::test]
    async fn test_dropped_execution_is_archived_as_cancelled() {
        let executor = executor();
        let outcome = tokio::time::timeout(
            Duration::from_millis(50),
            executor.execute_workflow("SLOW", ExecutionContext::new()),
        )
        .await;
        assert!(outcome.is_err());

        // archiving runs on a spawned task
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(executor.active_executions().await.unwrap().is_empty());
        let history = executor.recent_executions(10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, ExecutionStatus::Cancelled);
        assert!(history[0].completed_at.is_some());
        assert!(history[0].error_message.as_deref().unwrap().contains("abandoned"));

        let stats = executor.stats().await.unwrap();
        assert_eq!(stats.active_executions, 0);
        assert_eq!(stats.cancelled_executions, 1);
    }

    #[tokio::test]
    async fn test_retry_policy_applies_to_steps() {
        let options = ExecutionOptions::default().with_retry(RetryPolicy {
            max_attempts: 3,
            backoff_factor: 1.0,
            timeout_multiplier: 1.5,
        });
        let execution = executor()
            .execute_with_options("SEQ4", ExecutionContext::new(), &options)
            .await
            .unwrap();

        assert_eq!(execution.step_results[0].attempts, 1);
        assert_eq!(execution.step_results[1].attempts, 3);
        assert_eq!(execution.step_results[1].status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn test_status_lookup_and_stats() {
        let executor = executor();
        let first = executor.execute_workflow("SEQ4", ExecutionContext::new()).await.unwrap();
        executor.execute_workflow("SCHED", ExecutionContext::new()).await.unwrap();
        executor.execute_workflow("SCHED", ExecutionContext::new()).await.unwrap();
        executor
            .execute_workflow("LOOP2", context(json!({ "max_iterations": -1 })))
            .await
            .unwrap();

        let stored = executor.get_execution(first.execution_id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExecutionStatus::Completed);
        assert!(executor.get_execution(Uuid::new_v4()).await.unwrap().is_none());

        let stats = executor.stats().await.unwrap();
        assert_eq!(stats.active_executions, 0);
        assert_eq!(stats.total_executions, 4);
        assert_eq!(stats.successful_executions, 3);
        assert_eq!(stats.failed_executions, 1);
        assert_eq!(stats.cancelled_executions, 0);
        assert!((stats.success_rate - 0.75).abs() < 1e-9);

        let ids: Vec<&str> = stats.most_executed.iter().map(|u| u.workflow_id.as_str()).collect();
        assert_eq!(ids, vec!["SCHED", "SEQ4", "LOOP2"]);
        assert_eq!(stats.most_executed[0].execution_count, 2);
    }

    #[test]
    fn test_options_from_routing() {
        let decision = RoutingDecision {
            workflow_type: crate::models::WorkflowType::MarketResponse,
            recommended_pattern: ExecutionPattern::Sequential,
            handler: crate::models::HandlerKind::MarketResponse,
            priority: 100,
            timeout_secs: 30,
            retry_policy: crate::router::retry_policy(crate::models::Urgency::Critical),
            priority_queue: crate::models::PriorityQueue::Immediate,
            execution_mode: crate::models::ExecutionMode::Expedited,
            monitoring_enabled: true,
            candidate_workflows: vec![],
        };

        let enforced = ExecutionOptions::from_routing(&decision, &EngineConfig::default());
        assert_eq!(enforced.timeout, Some(Duration::from_secs(45)));
        assert_eq!(enforced.retry.max_attempts, 3);

        let relaxed = ExecutionOptions::from_routing(
            &decision,
            &EngineConfig {
                enforce_timeouts: false,
                ..EngineConfig::default()
            },
        );
        assert!(relaxed.timeout.is_none());
    }
}
