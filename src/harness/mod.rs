//! Workflow test harness
//!
//! Generates test cases for every catalog workflow (basic, error-injection,
//! performance and one pattern-specific case), replays them through the
//! executor under a per-case timeout and scores them against declarative
//! expectations.

pub mod expectations;

pub use expectations::{Expectation, ExpectationCheck};

use crate::catalog::CatalogFilter;
use crate::execution::{ExecutionOptions, Severity, WorkflowExecutor};
use crate::models::{
    ComplexityTier, ExecutionContext, ExecutionPattern, ExecutionStatus, TestCategory,
    TestPriority, WorkflowCategory, WorkflowDefinition,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

const DEFAULT_CASE_TIMEOUT: Duration = Duration::from_secs(30);
const BASIC_MAX_DURATION_MS: u64 = 30_000;
const EVENT_RESPONSE_MAX_MS: u64 = 2_000;
/// Far above any hard cap, so the loop case proves the cap holds
const LOOP_BOUND_PROBE: u32 = 100;
const ORCHESTRATION_FANOUT: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub test_id: String,
    pub workflow_id: String,
    pub test_name: String,
    pub description: String,
    pub context: ExecutionContext,
    pub expectations: Vec<Expectation>,
    pub category: TestCategory,
    pub priority: TestPriority,
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestMetrics {
    pub steps_per_second: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tasks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations_completed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub test_id: String,
    pub test_name: String,
    pub workflow_id: String,
    pub pattern: Option<ExecutionPattern>,
    pub category: TestCategory,
    pub priority: TestPriority,
    pub execution_id: Option<Uuid>,
    pub execution_status: Option<ExecutionStatus>,
    pub passed: bool,
    /// The harness deadline expired; distinct from an execution that FAILED
    pub timed_out: bool,
    pub checks: Vec<ExpectationCheck>,
    pub error_message: Option<String>,
    pub duration_ms: u64,
    pub metrics: TestMetrics,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub total: usize,
    pub passed: usize,
}

impl Tally {
    fn add(&mut self, passed: bool) {
        self.total += 1;
        if passed {
            self.passed += 1;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub success_rate: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub average_duration_ms: f64,
    pub max_duration_ms: u64,
    pub total_duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedTest {
    pub test_id: String,
    pub test_name: String,
    pub error_message: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub summary: ReportSummary,
    pub by_category: BTreeMap<String, Tally>,
    pub by_pattern: BTreeMap<String, Tally>,
    pub by_priority: BTreeMap<String, Tally>,
    pub performance: PerformanceSummary,
    pub failed_tests: Vec<FailedTest>,
    pub results: Vec<TestResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryCoverage {
    pub total: usize,
    pub tested: usize,
    pub coverage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCoverage {
    pub overall_coverage: f64,
    pub workflows_total: usize,
    pub workflows_tested: usize,
    pub by_category: BTreeMap<String, CategoryCoverage>,
    pub total_test_cases: usize,
    pub test_categories: Vec<TestCategory>,
}

/// Which cases a suite run includes. Empty lists match everything.
#[derive(Debug, Clone, Default)]
pub struct SuiteFilter {
    pub categories: Vec<TestCategory>,
    pub priorities: Vec<TestPriority>,
}

impl SuiteFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: TestCategory) -> Self {
        self.categories.push(category);
        self
    }

    pub fn priority(mut self, priority: TestPriority) -> Self {
        self.priorities.push(priority);
        self
    }

    pub fn matches(&self, case: &TestCase) -> bool {
        (self.categories.is_empty() || self.categories.contains(&case.category))
            && (self.priorities.is_empty() || self.priorities.contains(&case.priority))
    }
}

pub struct WorkflowTestHarness {
    executor: Arc<WorkflowExecutor>,
    cases: Vec<TestCase>,
}

impl WorkflowTestHarness {
    /// Harness with generated cases for every workflow in the executor's catalog.
    pub fn new(executor: Arc<WorkflowExecutor>) -> Self {
        let catalog = executor.catalog().clone();
        let orchestration_targets: Vec<String> = catalog
            .iter()
            .filter(|d| d.pattern != ExecutionPattern::MasterOrchestration)
            .take(ORCHESTRATION_FANOUT)
            .map(|d| d.workflow_id.clone())
            .collect();
        let hard_cap = executor.config().loop_hard_cap;

        let cases = catalog
            .iter()
            .flat_map(|definition| generate_cases(definition, &orchestration_targets, hard_cap))
            .collect();

        Self { executor, cases }
    }

    /// Add a hand-written case after the generated ones.
    pub fn with_case(mut self, case: TestCase) -> Self {
        self.cases.push(case);
        self
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn case(&self, test_id: &str) -> Option<&TestCase> {
        self.cases.iter().find(|c| c.test_id == test_id)
    }

    pub async fn run_suite(&self, filter: &SuiteFilter) -> TestReport {
        let selected: Vec<&TestCase> = self.cases.iter().filter(|c| filter.matches(c)).collect();
        info!(cases = selected.len(), "Running workflow test suite");
        self.run_cases(selected).await
    }

    /// High-priority functionality cases for every workflow.
    pub async fn run_smoke_tests(&self) -> TestReport {
        self.run_suite(
            &SuiteFilter::all()
                .category(TestCategory::Functionality)
                .priority(TestPriority::High),
        )
        .await
    }

    pub async fn run_performance_tests(&self) -> TestReport {
        self.run_suite(&SuiteFilter::all().category(TestCategory::Performance))
            .await
    }

    /// Every case of every workflow tagged with `pattern`.
    pub async fn run_pattern_tests(&self, pattern: ExecutionPattern) -> TestReport {
        let workflow_ids = self.executor.catalog().ids_for_pattern(pattern);
        let selected: Vec<&TestCase> = self
            .cases
            .iter()
            .filter(|c| workflow_ids.contains(&c.workflow_id))
            .collect();
        info!(pattern = %pattern, cases = selected.len(), "Running pattern tests");
        self.run_cases(selected).await
    }

    pub async fn run_case(&self, case: &TestCase) -> TestResult {
        debug!(test_id = %case.test_id, "Executing test case");
        let started = Instant::now();

        // the deadline goes to the executor so a timed-out run still ends in a terminal record
        let options = ExecutionOptions::default().with_timeout(case.timeout);
        let outcome = self
            .executor
            .execute_with_options(&case.workflow_id, case.context.clone(), &options)
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let mut result = TestResult {
            test_id: case.test_id.clone(),
            test_name: case.test_name.clone(),
            workflow_id: case.workflow_id.clone(),
            pattern: None,
            category: case.category,
            priority: case.priority,
            execution_id: None,
            execution_status: None,
            passed: false,
            timed_out: false,
            checks: Vec::new(),
            error_message: None,
            duration_ms,
            metrics: TestMetrics::default(),
            timestamp: Utc::now(),
        };

        match outcome {
            Ok(execution) => {
                result.pattern = Some(execution.workflow.pattern);
                result.execution_id = Some(execution.execution_id);
                result.execution_status = Some(execution.status);
                result.metrics = metrics_for(&execution.pattern_result, execution.step_results.len(), duration_ms);

                if execution.status == ExecutionStatus::Cancelled {
                    warn!(test_id = %case.test_id, timeout_ms = case.timeout.as_millis() as u64, "Test case timed out");
                    result.timed_out = true;
                    result.error_message = Some(format!(
                        "Test timed out after {} ms",
                        case.timeout.as_millis()
                    ));
                    return result;
                }

                let checks: Vec<ExpectationCheck> =
                    case.expectations.iter().map(|e| e.evaluate(&execution)).collect();

                result.passed = checks.iter().all(|c| c.passed);
                result.error_message = checks
                    .iter()
                    .find(|c| !c.passed)
                    .map(|c| c.details.clone());
                result.checks = checks;
            }
            Err(e) => {
                result.error_message = Some(format!("Test execution failed: {}", e));
            }
        }

        result
    }

    async fn run_cases(&self, selected: Vec<&TestCase>) -> TestReport {
        let started_at = Utc::now();
        let mut results = Vec::with_capacity(selected.len());
        for case in selected {
            results.push(self.run_case(case).await);
        }
        let report = build_report(results, started_at, Utc::now());

        info!(
            passed = report.summary.passed,
            total = report.summary.total,
            timed_out = report.summary.timed_out,
            "Test suite completed"
        );
        report
    }

    pub fn coverage(&self) -> TestCoverage {
        let catalog = self.executor.catalog();
        let tested = |workflow_id: &str| self.cases.iter().any(|c| c.workflow_id == workflow_id);

        let workflows_tested = catalog.iter().filter(|d| tested(&d.workflow_id)).count();

        let by_category = WorkflowCategory::ALL
            .iter()
            .map(|&category| {
                let filter = CatalogFilter::all().category(category);
                let (total, covered) = catalog.list(&filter).fold((0, 0), |(total, covered), d| {
                    (total + 1, covered + usize::from(tested(&d.workflow_id)))
                });
                (
                    category.to_string(),
                    CategoryCoverage {
                        total,
                        tested: covered,
                        coverage: covered as f64 / total.max(1) as f64,
                    },
                )
            })
            .collect();

        let mut test_categories: Vec<TestCategory> = Vec::new();
        for case in &self.cases {
            if !test_categories.contains(&case.category) {
                test_categories.push(case.category);
            }
        }

        TestCoverage {
            overall_coverage: workflows_tested as f64 / catalog.len().max(1) as f64,
            workflows_total: catalog.len(),
            workflows_tested,
            by_category,
            total_test_cases: self.cases.len(),
            test_categories,
        }
    }
}

//
// ================= Case Generation =================
//

fn base_context(definition: &WorkflowDefinition, orchestration_targets: &[String]) -> ExecutionContext {
    let mut context = ExecutionContext::new();
    context.insert("test_mode".into(), json!(true));
    context.insert("client_id".into(), json!("WM000001"));
    context.insert("execution_date".into(), json!(Utc::now().to_rfc3339()));

    let by_category = match definition.category {
        WorkflowCategory::Advisor => json!({
            "advisor_id": "ADV001",
            "client_count": 1,
            "meeting_type": "review",
        }),
        WorkflowCategory::Client => json!({
            "session_type": "planning",
            "goal_type": "retirement",
        }),
        WorkflowCategory::Operations => json!({
            "operation_type": "account_maintenance",
            "batch_size": 10,
            "priority": "standard",
        }),
    };

    let by_pattern = match definition.pattern {
        ExecutionPattern::EventDriven => json!({
            "event_type": "market_volatility",
            "severity": "medium",
            "trigger_threshold": 15.0,
        }),
        ExecutionPattern::Scheduled => json!({
            "schedule_type": "daily",
            "recurring": true,
        }),
        ExecutionPattern::Loop => json!({
            "max_iterations": 3,
            "convergence_threshold": 0.01,
        }),
        ExecutionPattern::Parallel => json!({
            "max_concurrent_tasks": 5,
            "task_timeout": 10,
        }),
        ExecutionPattern::MasterOrchestration => json!({
            "sub_workflows": orchestration_targets,
        }),
        ExecutionPattern::Sequential => json!({}),
    };

    for extra in [by_category, by_pattern] {
        if let Value::Object(map) = extra {
            context.extend(map);
        }
    }
    context
}

fn with_entries(mut context: ExecutionContext, entries: Value) -> ExecutionContext {
    if let Value::Object(map) = entries {
        context.extend(map);
    }
    context
}

/// Step records a single run produces, when it is known up front.
fn expected_step_count(definition: &WorkflowDefinition, context: &ExecutionContext) -> Option<usize> {
    match definition.pattern {
        ExecutionPattern::Sequential | ExecutionPattern::Parallel | ExecutionPattern::Scheduled => {
            Some(definition.steps.len())
        }
        ExecutionPattern::EventDriven => {
            let severity = Severity::parse(
                context.get("severity").and_then(Value::as_str).unwrap_or("medium"),
            );
            Some(definition.steps.iter().filter(|s| severity.admits(s)).count())
        }
        ExecutionPattern::MasterOrchestration => Some(0),
        ExecutionPattern::Loop => None,
    }
}

fn performance_threshold_ms(complexity: ComplexityTier) -> u64 {
    match complexity {
        ComplexityTier::Simple => 5_000,
        ComplexityTier::Moderate => 15_000,
        ComplexityTier::Complex => 30_000,
    }
}

fn generate_cases(
    definition: &WorkflowDefinition,
    orchestration_targets: &[String],
    hard_cap: u32,
) -> Vec<TestCase> {
    let id = &definition.workflow_id;
    let base = base_context(definition, orchestration_targets);
    let case = |suffix: &str,
                label: &str,
                description: String,
                context: ExecutionContext,
                expectations: Vec<Expectation>,
                category: TestCategory,
                priority: TestPriority| TestCase {
        test_id: format!("{}_{}", id, suffix),
        workflow_id: id.clone(),
        test_name: format!("{} - {}", definition.name, label),
        description,
        context,
        expectations,
        category,
        priority,
        timeout: DEFAULT_CASE_TIMEOUT,
    };

    let mut basic_expectations = vec![
        Expectation::Status(ExecutionStatus::Completed),
        Expectation::MaxDurationMs(BASIC_MAX_DURATION_MS),
    ];
    if let Some(count) = expected_step_count(definition, &base) {
        basic_expectations.push(Expectation::StepsRecorded(count));
    }

    let mut cases = vec![
        case(
            "BASIC",
            "Basic Functionality",
            format!("Basic execution of {}", definition.name),
            base.clone(),
            basic_expectations,
            TestCategory::Functionality,
            TestPriority::High,
        ),
        case(
            "ERROR",
            "Error Handling",
            format!("Error handling in {} with failing services", definition.name),
            with_entries(
                base.clone(),
                json!({ "force_error": true, "invalid_client_id": "INVALID_ID" }),
            ),
            vec![Expectation::GracefulDegradation],
            TestCategory::ErrorHandling,
            TestPriority::High,
        ),
        case(
            "PERF",
            "Performance",
            format!("Performance characteristics of {}", definition.name),
            with_entries(base.clone(), performance_load(definition.pattern)),
            vec![
                Expectation::Status(ExecutionStatus::Completed),
                Expectation::MaxDurationMs(performance_threshold_ms(definition.complexity)),
            ],
            TestCategory::Performance,
            TestPriority::Medium,
        ),
    ];

    let pattern_case = match definition.pattern {
        ExecutionPattern::EventDriven => Some(case(
            "EVENT_RESPONSE",
            "Event Response Time",
            "Event-driven response characteristics".to_string(),
            with_entries(
                base,
                json!({ "severity": "high", "measure_response_time": true }),
            ),
            vec![
                Expectation::Status(ExecutionStatus::Completed),
                Expectation::EventProcessed,
                Expectation::MaxResponseTimeMs(EVENT_RESPONSE_MAX_MS),
                Expectation::StepsRecorded(definition.steps.len()),
            ],
            TestCategory::PatternSpecific,
            TestPriority::High,
        )),
        ExecutionPattern::Scheduled => Some(case(
            "SCHEDULE",
            "Schedule Execution",
            "Scheduled timing and next-run computation".to_string(),
            with_entries(base, json!({ "schedule_type": "hourly", "recurring": true })),
            vec![
                Expectation::Status(ExecutionStatus::Completed),
                Expectation::NextRunScheduled,
            ],
            TestCategory::PatternSpecific,
            TestPriority::Medium,
        )),
        ExecutionPattern::Parallel => Some(case(
            "CONCURRENCY",
            "Concurrency",
            "Parallel fan-out with ordered fan-in".to_string(),
            with_entries(base, json!({ "max_concurrent_tasks": 10 })),
            vec![
                Expectation::Status(ExecutionStatus::Completed),
                Expectation::ParallelTasksRecorded,
                Expectation::StepsRecorded(definition.steps.len()),
            ],
            TestCategory::PatternSpecific,
            TestPriority::High,
        )),
        ExecutionPattern::Loop => Some(case(
            "LOOP_BOUND",
            "Loop Bound",
            "Iteration count never exceeds the hard cap".to_string(),
            with_entries(base, json!({ "max_iterations": LOOP_BOUND_PROBE })),
            vec![
                Expectation::Status(ExecutionStatus::Completed),
                Expectation::IterationsAtMost(hard_cap),
            ],
            TestCategory::PatternSpecific,
            TestPriority::Medium,
        )),
        ExecutionPattern::MasterOrchestration => Some(case(
            "ORCHESTRATION",
            "Sub-workflow Orchestration",
            "Every sub-workflow is reported".to_string(),
            base,
            vec![
                Expectation::Status(ExecutionStatus::Completed),
                Expectation::SubWorkflowsReported(orchestration_targets.len()),
            ],
            TestCategory::PatternSpecific,
            TestPriority::High,
        )),
        ExecutionPattern::Sequential => None,
    };

    cases.extend(pattern_case);
    cases
}

fn performance_load(pattern: ExecutionPattern) -> Value {
    match pattern {
        ExecutionPattern::Parallel => json!({ "client_count": 100, "concurrent_operations": 10 }),
        ExecutionPattern::Loop => json!({ "max_iterations": 10, "large_dataset": true }),
        _ => json!({ "client_count": 50, "data_volume": "large" }),
    }
}

//
// ================= Reporting =================
//

fn metrics_for(pattern_result: &Value, steps: usize, duration_ms: u64) -> TestMetrics {
    let seconds = (duration_ms as f64 / 1000.0).max(0.001);
    TestMetrics {
        steps_per_second: steps as f64 / seconds,
        response_time_ms: pattern_result["response_time_ms"].as_u64(),
        parallel_tasks: pattern_result["parallel_tasks"].as_array().map(Vec::len),
        iterations_completed: pattern_result["iterations"].as_u64(),
    }
}

fn build_report(
    results: Vec<TestResult>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
) -> TestReport {
    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();

    let mut by_category: BTreeMap<String, Tally> = BTreeMap::new();
    let mut by_pattern: BTreeMap<String, Tally> = BTreeMap::new();
    let mut by_priority: BTreeMap<String, Tally> = BTreeMap::new();

    for result in &results {
        by_category
            .entry(result.category.to_string())
            .or_default()
            .add(result.passed);
        by_priority
            .entry(result.priority.to_string())
            .or_default()
            .add(result.passed);
        if let Some(pattern) = result.pattern {
            by_pattern
                .entry(pattern.to_string())
                .or_default()
                .add(result.passed);
        }
    }

    let durations: Vec<u64> = results.iter().map(|r| r.duration_ms).collect();
    let total_duration: u64 = durations.iter().sum();

    let failed_tests = results
        .iter()
        .filter(|r| !r.passed)
        .map(|r| FailedTest {
            test_id: r.test_id.clone(),
            test_name: r.test_name.clone(),
            error_message: r.error_message.clone(),
            duration_ms: r.duration_ms,
        })
        .collect();

    TestReport {
        summary: ReportSummary {
            total,
            passed,
            failed: total - passed,
            timed_out: results.iter().filter(|r| r.timed_out).count(),
            success_rate: passed as f64 / total.max(1) as f64,
            started_at,
            finished_at,
            total_duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
        },
        by_category,
        by_pattern,
        by_priority,
        performance: PerformanceSummary {
            average_duration_ms: total_duration as f64 / total.max(1) as f64,
            max_duration_ms: durations.iter().copied().max().unwrap_or(0),
            total_duration_ms: total_duration,
        },
        failed_tests,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::EngineConfig;
    use crate::error::WorkflowError;
    use crate::tools::{StepDispatcher, StepHandler};
    use crate::Result;

    fn builtin_harness() -> WorkflowTestHarness {
        let executor = WorkflowExecutor::new(
            Arc::new(Catalog::with_builtin_workflows().unwrap()),
            Arc::new(StepDispatcher::with_mock_handlers()),
            EngineConfig::default(),
        );
        WorkflowTestHarness::new(Arc::new(executor))
    }

    struct StallingHandler;

    #[async_trait::async_trait]
    impl StepHandler for StallingHandler {
        fn name(&self) -> &'static str {
            "stalling"
        }

        async fn invoke(&self, _step_name: &str, _context: &ExecutionContext) -> Result<Value> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(WorkflowError::Step("unreachable".into()))
        }
    }

    #[test]
    fn test_case_generation() {
        let harness = builtin_harness();
        let ids: Vec<&str> = harness
            .cases()
            .iter()
            .filter(|c| c.workflow_id == "ADV007")
            .map(|c| c.test_id.as_str())
            .collect();
        assert_eq!(
            ids,
            vec!["ADV007_BASIC", "ADV007_ERROR", "ADV007_PERF", "ADV007_EVENT_RESPONSE"]
        );

        // sequential workflows get no pattern-specific case
        let adv001 = harness.cases().iter().filter(|c| c.workflow_id == "ADV001").count();
        assert_eq!(adv001, 3);

        let loop_case = harness.case("ADV003_LOOP_BOUND").unwrap();
        assert_eq!(loop_case.context["max_iterations"], 100);
        assert!(loop_case.expectations.contains(&Expectation::IterationsAtMost(5)));

        let error_case = harness.case("CLI001_ERROR").unwrap();
        assert_eq!(error_case.context["force_error"], true);
        assert_eq!(error_case.category, TestCategory::ErrorHandling);
    }

    #[test]
    fn test_coverage() {
        let harness = builtin_harness();
        let coverage = harness.coverage();

        assert_eq!(coverage.workflows_total, 21);
        assert_eq!(coverage.workflows_tested, 21);
        assert!((coverage.overall_coverage - 1.0).abs() < f64::EPSILON);
        assert_eq!(coverage.by_category["client"].total, 3);
        assert_eq!(coverage.total_test_cases, harness.cases().len());
        assert_eq!(coverage.test_categories.len(), 4);
    }

    #[tokio::test]
    async fn test_smoke_suite_passes_on_builtin_catalog() {
        let harness = builtin_harness();
        let report = harness.run_smoke_tests().await;

        assert_eq!(report.summary.total, 21);
        assert_eq!(report.summary.passed, 21, "failures: {:?}", report.failed_tests);
        assert!(report.failed_tests.is_empty());
        assert_eq!(report.by_category["functionality"].total, 21);
        assert_eq!(report.by_priority["high"].passed, 21);
    }

    #[tokio::test]
    async fn test_full_suite_passes_on_builtin_catalog() {
        let harness = builtin_harness();
        let report = harness.run_suite(&SuiteFilter::all()).await;

        assert_eq!(report.summary.total, harness.cases().len());
        assert_eq!(report.summary.failed, 0, "failures: {:?}", report.failed_tests);
        assert_eq!(report.summary.timed_out, 0);

        let tallied: usize = report.by_pattern.values().map(|t| t.total).sum();
        assert_eq!(tallied, report.summary.total);
    }

    #[tokio::test]
    async fn test_pattern_tests_select_matching_workflows() {
        let harness = builtin_harness();
        let report = harness.run_pattern_tests(ExecutionPattern::Scheduled).await;

        assert!(report.summary.total > 0);
        assert_eq!(report.by_pattern.len(), 1);
        assert!(report.by_pattern.contains_key("scheduled"));
        assert!(report.results.iter().any(|r| r.test_id.ends_with("_SCHEDULE")));
    }

    #[tokio::test]
    async fn test_timeout_is_distinct_from_failure() {
        let mut catalog = Catalog::new();
        catalog
            .register(WorkflowDefinition::new(
                "SLOW001",
                "Slow workflow",
                WorkflowCategory::Operations,
                ExecutionPattern::Sequential,
                ComplexityTier::Simple,
                &["Wait on custodian"],
            ))
            .unwrap();
        let executor = WorkflowExecutor::new(
            Arc::new(catalog),
            Arc::new(StepDispatcher::new(Arc::new(StallingHandler))),
            EngineConfig::default(),
        );
        let harness = WorkflowTestHarness::new(Arc::new(executor));

        let mut case = harness.case("SLOW001_BASIC").unwrap().clone();
        case.timeout = Duration::from_millis(50);

        let result = harness.run_case(&case).await;
        assert!(result.timed_out);
        assert!(!result.passed);
        assert_eq!(result.execution_status, Some(ExecutionStatus::Cancelled));
        assert_eq!(result.error_message.as_deref(), Some("Test timed out after 50 ms"));

        // the timed-out run is archived, not left active
        assert!(harness.executor.active_executions().await.unwrap().is_empty());
        let archived = harness
            .executor
            .get_execution(result.execution_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(archived.status, ExecutionStatus::Cancelled);
        assert!(archived.completed_at.is_some());

        let report = harness.run_cases(vec![&case]).await;
        assert_eq!(report.summary.timed_out, 1);
        assert_eq!(report.summary.failed, 1);
    }

    #[tokio::test]
    async fn test_unknown_workflow_case_fails() {
        let harness = builtin_harness();
        let mut case = harness.case("ADV001_BASIC").unwrap().clone();
        case.test_id = "MISSING_BASIC".into();
        case.workflow_id = "MISSING".into();
        let harness = harness.with_case(case);

        let report = harness
            .run_cases(vec![harness.case("MISSING_BASIC").unwrap()])
            .await;
        assert_eq!(report.summary.failed, 1);
        assert!(!report.results[0].timed_out);
        assert!(report.failed_tests[0]
            .error_message
            .as_deref()
            .unwrap()
            .starts_with("Test execution failed: Workflow not found"));
    }
}
