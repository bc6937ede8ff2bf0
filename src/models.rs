//! Core data models for the workflow orchestrator

use crate::error::WorkflowError;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Opaque key-value input supplied by the caller of an execution.
pub type ExecutionContext = Map<String, Value>;

/// Closed label enumerations share the same string plumbing: a wire name used
/// by serde, `Display` and a forgiving `FromStr` (case and `-`/`_` insensitive).
macro_rules! labeled_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $label)] $variant,)+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = WorkflowError;

            fn from_str(s: &str) -> Result<Self> {
                let normalized = s.trim().to_lowercase().replace('-', "_");
                match normalized.as_str() {
                    $($label => Ok($name::$variant),)+
                    _ => Err(WorkflowError::UnknownLabel {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

//
// ================= Catalog Enums =================
//

labeled_enum!(WorkflowCategory, "category" {
    Advisor => "advisor",
    Client => "client",
    Operations => "operations",
});

labeled_enum!(
    /// The six execution semantics a workflow can be tagged with.
    ExecutionPattern, "pattern" {
        Sequential => "sequential",
        Parallel => "parallel",
        Loop => "loop",
        EventDriven => "event_driven",
        Scheduled => "scheduled",
        MasterOrchestration => "master_orchestration",
    }
);

labeled_enum!(ComplexityTier, "complexity tier" {
    Simple => "simple",
    Moderate => "moderate",
    Complex => "complex",
});

//
// ================= Workflow Definition =================
//

/// Immutable description of a workflow, created at catalog load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub workflow_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: WorkflowCategory,
    pub pattern: ExecutionPattern,
    pub complexity: ComplexityTier,
    #[serde(default)]
    pub personas: Vec<String>,
    #[serde(default)]
    pub triggers: Vec<String>,
    pub steps: Vec<String>,
    #[serde(default)]
    pub tools_required: Vec<String>,
}

impl WorkflowDefinition {
    pub fn new(
        workflow_id: impl Into<String>,
        name: impl Into<String>,
        category: WorkflowCategory,
        pattern: ExecutionPattern,
        complexity: ComplexityTier,
        steps: &[&str],
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            name: name.into(),
            description: String::new(),
            category,
            pattern,
            complexity,
            personas: Vec::new(),
            triggers: Vec::new(),
            steps: steps.iter().map(|s| s.to_string()).collect(),
            tools_required: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_personas(mut self, personas: &[&str]) -> Self {
        self.personas = personas.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_triggers(mut self, triggers: &[&str]) -> Self {
        self.triggers = triggers.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tools_required = tools.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Structural checks applied on registration.
    pub fn validate(&self) -> Result<()> {
        if self.workflow_id.trim().is_empty() {
            return Err(WorkflowError::InvalidDefinition(
                "workflow_id must not be empty".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(WorkflowError::InvalidDefinition(format!(
                "{}: name must not be empty",
                self.workflow_id
            )));
        }
        if self.steps.is_empty() {
            return Err(WorkflowError::InvalidDefinition(format!(
                "{}: at least one step is required",
                self.workflow_id
            )));
        }
        if let Some(position) = self.steps.iter().position(|s| s.trim().is_empty()) {
            return Err(WorkflowError::InvalidDefinition(format!(
                "{}: step {} has a blank name",
                self.workflow_id,
                position + 1
            )));
        }
        Ok(())
    }
}

//
// ================= Execution =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }

    fn rank(&self) -> u8 {
        match self {
            ExecutionStatus::Pending => 0,
            ExecutionStatus::InProgress => 1,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "PENDING",
            ExecutionStatus::InProgress => "IN_PROGRESS",
            ExecutionStatus::Completed => "COMPLETED",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
}

/// Outcome of one dispatched step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based position of the step in its definition
    pub step_number: usize,
    pub step_name: String,
    pub handler: String,
    pub status: StepStatus,
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl StepRecord {
    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }

    /// True when the step succeeded with a non-empty payload.
    pub fn has_payload(&self) -> bool {
        if !self.is_success() {
            return false;
        }
        match &self.output {
            Value::Null => false,
            Value::Object(map) => !map.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }
}

/// A single run of a workflow. Mutated only by the executor; read-only once terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub execution_id: Uuid,
    pub workflow: Arc<WorkflowDefinition>,
    pub status: ExecutionStatus,
    pub context: ExecutionContext,
    pub step_results: Vec<StepRecord>,
    #[serde(default)]
    pub pattern_result: Value,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl WorkflowExecution {
    pub fn new(workflow: Arc<WorkflowDefinition>, context: ExecutionContext) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            workflow,
            status: ExecutionStatus::Pending,
            context,
            step_results: Vec::new(),
            pattern_result: Value::Null,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow.workflow_id
    }

    /// Move to `next`. Status only ever moves forward and terminal states are final;
    /// the completion timestamp is set exactly when a terminal state is entered.
    pub fn transition(&mut self, next: ExecutionStatus) -> Result<()> {
        if self.status.is_terminal() || next.rank() <= self.status.rank() {
            return Err(WorkflowError::ExecutorFault(format!(
                "invalid status transition {} -> {}",
                self.status, next
            )));
        }

        self.status = next;
        match next {
            ExecutionStatus::InProgress => self.started_at = Some(Utc::now()),
            status if status.is_terminal() => self.completed_at = Some(Utc::now()),
            _ => {}
        }
        Ok(())
    }

    pub fn complete(&mut self, pattern_result: Value) -> Result<()> {
        self.transition(ExecutionStatus::Completed)?;
        self.pattern_result = pattern_result;
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        self.transition(ExecutionStatus::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    pub fn cancel(&mut self, message: impl Into<String>) -> Result<()> {
        self.transition(ExecutionStatus::Cancelled)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    /// Wall-clock time between start and completion, once both are known.
    pub fn duration_ms(&self) -> Option<u64> {
        let started = self.started_at?;
        let completed = self.completed_at?;
        Some((completed - started).num_milliseconds().max(0) as u64)
    }

    pub fn summary(&self) -> ExecutionSummary {
        let steps_completed = self.step_results.len();
        let steps_succeeded = self.step_results.iter().filter(|r| r.is_success()).count();

        ExecutionSummary {
            execution_id: Some(self.execution_id),
            workflow_id: self.workflow.workflow_id.clone(),
            status: self.status,
            steps_completed,
            steps_succeeded,
            total_steps: self.workflow.steps.len(),
            success_ratio: steps_succeeded as f64 / steps_completed.max(1) as f64,
            duration_ms: self.duration_ms().unwrap_or(0),
            error_message: self.error_message.clone(),
        }
    }
}

/// Short digest of an execution, used by orchestration results and reports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionSummary {
    /// `None` when the workflow was never started
    pub execution_id: Option<Uuid>,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub steps_completed: usize,
    pub steps_succeeded: usize,
    pub total_steps: usize,
    pub success_ratio: f64,
    pub duration_ms: u64,
    pub error_message: Option<String>,
}

impl ExecutionSummary {
    /// Summary for a workflow that was refused before an execution was created.
    pub fn rejected(workflow_id: impl Into<String>, total_steps: usize, message: impl Into<String>) -> Self {
        Self {
            execution_id: None,
            workflow_id: workflow_id.into(),
            status: ExecutionStatus::Failed,
            steps_completed: 0,
            steps_succeeded: 0,
            total_steps,
            success_ratio: 0.0,
            duration_ms: 0,
            error_message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowUsage {
    pub workflow_id: String,
    pub workflow_name: String,
    pub execution_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutorStats {
    pub active_executions: usize,
    pub total_executions: usize,
    pub successful_executions: usize,
    pub failed_executions: usize,
    pub cancelled_executions: usize,
    pub success_rate: f64,
    pub average_duration_ms: f64,
    pub most_executed: Vec<WorkflowUsage>,
}

//
// ================= Classification =================
//

labeled_enum!(Persona, "persona" {
    Advisor => "advisor",
    Client => "client",
    Operations => "operations",
});

labeled_enum!(Urgency, "urgency" {
    Critical => "critical",
    High => "high",
    Medium => "medium",
    Low => "low",
});

labeled_enum!(Complexity, "complexity" {
    Simple => "simple",
    Complex => "complex",
    MultiStep => "multi_step",
    Orchestration => "orchestration",
});

labeled_enum!(TriggerType, "trigger type" {
    EventDriven => "event_driven",
    Scheduled => "scheduled",
    Manual => "manual",
    Threshold => "threshold",
});

labeled_enum!(WorkflowType, "workflow type" {
    ClientMeetingPrep => "client_meeting_prep",
    MarketResponse => "market_response",
    CrisisManagement => "crisis_management",
    RegulatoryResponse => "regulatory_response",
    TransactionProcessing => "transaction_processing",
    ClientOnboarding => "client_onboarding",
    CampaignManagement => "campaign_management",
    PerformanceReporting => "performance_reporting",
    ComplianceScanning => "compliance_scanning",
    MultiClientOutreach => "multi_client_outreach",
    PortfolioMonitoring => "portfolio_monitoring",
    RiskAssessment => "risk_assessment",
    MarketMonitoring => "market_monitoring",
    ContinuousCompliance => "continuous_compliance",
    MarketVolatility => "market_volatility",
    RiskBreach => "risk_breach",
    NewsImpact => "news_impact",
    ThresholdAlerts => "threshold_alerts",
    ReportingCycle => "reporting_cycle",
    PlanningProcess => "planning_process",
    ReviewMeetings => "review_meetings",
    ComplianceDeadlines => "compliance_deadlines",
    MultiPersonaCrisis => "multi_persona_crisis",
    BusinessContinuity => "business_continuity",
    SystemImplementation => "system_implementation",
    AnnualPlanning => "annual_planning",
    ClientService => "client_service",
    AdvisorSupport => "advisor_support",
    OperationsSupport => "operations_support",
});

/// Per-dimension confidence in [0, 1]; `overall` is the mean of the four.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Confidence {
    pub overall: f64,
    pub persona: f64,
    pub urgency: f64,
    pub complexity: f64,
    pub trigger_type: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchedKeywords {
    pub persona: Vec<String>,
    pub urgency: Vec<String>,
    pub complexity: Vec<String>,
    pub trigger: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassificationResult {
    pub persona: Persona,
    pub urgency: Urgency,
    pub complexity: Complexity,
    pub trigger_type: TriggerType,
    pub workflow_type: WorkflowType,
    pub confidence: Confidence,
    pub matched_keywords: MatchedKeywords,
    pub query_length: usize,
}

//
// ================= Routing =================
//

labeled_enum!(
    /// Handler class a routed request is sent to.
    HandlerKind, "handler" {
        EventDriven => "event_driven_agent",
        Scheduled => "scheduled_agent",
        MasterOrchestrator => "master_orchestrator",
        ClientOnboarding => "client_onboarding_agent",
        PortfolioMonitoring => "portfolio_monitoring_agent",
        MarketResponse => "market_response_agent",
        CrisisManagement => "crisis_management_agent",
        Sequential => "sequential_agent",
    }
);

labeled_enum!(PriorityQueue, "priority queue" {
    Immediate => "immediate",
    Priority => "priority",
    Standard => "standard",
    Batch => "batch",
});

labeled_enum!(ExecutionMode, "execution mode" {
    Orchestrated => "orchestrated",
    Expedited => "expedited",
    Concurrent => "concurrent",
    Standard => "standard",
});

/// Upper bound on the sleep between retry attempts
pub const MAX_BACKOFF_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub backoff_factor: f64,
    pub timeout_multiplier: f64,
}

impl RetryPolicy {
    pub const fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            backoff_factor: 2.0,
            timeout_multiplier: 1.0,
        }
    }

    /// Delay before attempt `attempt + 1`, given the delay before the first retry.
    /// Never longer than [`MAX_BACKOFF_DELAY`].
    pub fn backoff_delay(&self, base: Duration, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let seconds = base.as_secs_f64() * self.backoff_factor.max(0.0).powi(exponent);
        Duration::try_from_secs_f64(seconds)
            .map(|delay| delay.min(MAX_BACKOFF_DELAY))
            .unwrap_or(MAX_BACKOFF_DELAY)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single_attempt()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingDecision {
    pub workflow_type: WorkflowType,
    pub recommended_pattern: ExecutionPattern,
    pub handler: HandlerKind,
    /// 0..=100, non-decreasing in urgency and complexity
    pub priority: u8,
    pub timeout_secs: u64,
    pub retry_policy: RetryPolicy,
    pub priority_queue: PriorityQueue,
    pub execution_mode: ExecutionMode,
    pub monitoring_enabled: bool,
    /// Catalog workflows registered with the recommended pattern, in catalog order
    pub candidate_workflows: Vec<String>,
}

impl RoutingDecision {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Deadline for one execution: the base timeout stretched by the retry policy.
    pub fn execution_deadline(&self) -> Duration {
        self.timeout().mul_f64(self.retry_policy.timeout_multiplier.max(1.0))
    }
}

//
// ================= Test Harness =================
//

labeled_enum!(TestCategory, "test category" {
    Functionality => "functionality",
    ErrorHandling => "error_handling",
    Performance => "performance",
    PatternSpecific => "pattern_specific",
});

labeled_enum!(TestPriority, "test priority" {
    High => "high",
    Medium => "medium",
    Low => "low",
});
