//! Workflow router
//!
//! Turns a classification into a routing decision. Every field of the
//! decision is a pure table lookup over the classification; the catalog is
//! consulted only to list candidate workflows for the chosen pattern.

use crate::catalog::Catalog;
use crate::models::{
    ClassificationResult, Complexity, ExecutionMode, ExecutionPattern, HandlerKind,
    PriorityQueue, RetryPolicy, RoutingDecision, Urgency, WorkflowType,
};
use std::sync::Arc;
use tracing::debug;

pub struct WorkflowRouter {
    catalog: Arc<Catalog>,
}

impl WorkflowRouter {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn route(&self, classification: &ClassificationResult) -> RoutingDecision {
        let urgency = classification.urgency;
        let complexity = classification.complexity;
        let workflow_type = classification.workflow_type;

        let pattern = recommended_pattern(workflow_type, urgency, complexity);

        let decision = RoutingDecision {
            workflow_type,
            recommended_pattern: pattern,
            handler: handler_for(pattern, workflow_type),
            priority: priority(urgency, complexity),
            timeout_secs: timeout_secs(complexity),
            retry_policy: retry_policy(urgency),
            priority_queue: priority_queue(urgency),
            execution_mode: execution_mode(pattern, urgency, complexity),
            monitoring_enabled: matches!(urgency, Urgency::Critical | Urgency::High),
            candidate_workflows: self.catalog.ids_for_pattern(pattern),
        };

        debug!(
            workflow_type = %workflow_type,
            pattern = %decision.recommended_pattern,
            handler = %decision.handler,
            priority = decision.priority,
            candidates = decision.candidate_workflows.len(),
            "Routing decision"
        );

        decision
    }
}

/// Static type→pattern table. `None` means the type has no fixed pattern.
pub fn pattern_for_type(workflow_type: WorkflowType) -> Option<ExecutionPattern> {
    use ExecutionPattern::*;
    use WorkflowType::*;

    let pattern = match workflow_type {
        ClientMeetingPrep | MarketResponse | CrisisManagement | RegulatoryResponse
        | TransactionProcessing => Sequential,
        ClientOnboarding | CampaignManagement | PerformanceReporting | ComplianceScanning
        | MultiClientOutreach => Parallel,
        PortfolioMonitoring | RiskAssessment | MarketMonitoring | ContinuousCompliance => Loop,
        MarketVolatility | RiskBreach | NewsImpact | ThresholdAlerts => EventDriven,
        ReportingCycle | PlanningProcess | ReviewMeetings | ComplianceDeadlines => Scheduled,
        MultiPersonaCrisis | BusinessContinuity | SystemImplementation | AnnualPlanning => {
            MasterOrchestration
        }
        ClientService | AdvisorSupport | OperationsSupport => return None,
    };
    Some(pattern)
}

pub fn recommended_pattern(
    workflow_type: WorkflowType,
    urgency: Urgency,
    complexity: Complexity,
) -> ExecutionPattern {
    if let Some(pattern) = pattern_for_type(workflow_type) {
        return pattern;
    }

    match (urgency, complexity) {
        (_, Complexity::Orchestration) => ExecutionPattern::MasterOrchestration,
        (_, Complexity::MultiStep) => ExecutionPattern::Sequential,
        (Urgency::Critical | Urgency::High, Complexity::Complex) => ExecutionPattern::Parallel,
        _ => ExecutionPattern::Sequential,
    }
}

pub fn handler_for(pattern: ExecutionPattern, workflow_type: WorkflowType) -> HandlerKind {
    match pattern {
        ExecutionPattern::EventDriven => HandlerKind::EventDriven,
        ExecutionPattern::Scheduled => HandlerKind::Scheduled,
        ExecutionPattern::MasterOrchestration => HandlerKind::MasterOrchestrator,
        ExecutionPattern::Parallel => HandlerKind::ClientOnboarding,
        ExecutionPattern::Loop => HandlerKind::PortfolioMonitoring,
        ExecutionPattern::Sequential => {
            let label = workflow_type.as_str();
            if label.contains("market") {
                HandlerKind::MarketResponse
            } else if label.contains("crisis") {
                HandlerKind::CrisisManagement
            } else {
                HandlerKind::Sequential
            }
        }
    }
}

/// Urgency base score plus complexity bonus, capped at 100.
pub fn priority(urgency: Urgency, complexity: Complexity) -> u8 {
    let base: u8 = match urgency {
        Urgency::Critical => 100,
        Urgency::High => 75,
        Urgency::Medium => 50,
        Urgency::Low => 25,
    };
    let bonus: u8 = match complexity {
        Complexity::Orchestration => 20,
        Complexity::MultiStep => 15,
        Complexity::Complex => 10,
        Complexity::Simple => 0,
    };
    base.saturating_add(bonus).min(100)
}

pub fn timeout_secs(complexity: Complexity) -> u64 {
    match complexity {
        Complexity::Simple => 30,
        Complexity::Complex => 120,
        Complexity::MultiStep => 300,
        Complexity::Orchestration => 600,
    }
}

pub fn retry_policy(urgency: Urgency) -> RetryPolicy {
    match urgency {
        Urgency::Critical => RetryPolicy {
            max_attempts: 3,
            backoff_factor: 1.0,
            timeout_multiplier: 1.5,
        },
        Urgency::High => RetryPolicy {
            max_attempts: 2,
            backoff_factor: 1.5,
            timeout_multiplier: 1.2,
        },
        Urgency::Medium | Urgency::Low => RetryPolicy::single_attempt(),
    }
}

pub fn priority_queue(urgency: Urgency) -> PriorityQueue {
    match urgency {
        Urgency::Critical => PriorityQueue::Immediate,
        Urgency::High => PriorityQueue::Priority,
        Urgency::Medium => PriorityQueue::Standard,
        Urgency::Low => PriorityQueue::Batch,
    }
}

pub fn execution_mode(
    pattern: ExecutionPattern,
    urgency: Urgency,
    complexity: Complexity,
) -> ExecutionMode {
    if complexity == Complexity::Orchestration {
        ExecutionMode::Orchestrated
    } else if matches!(urgency, Urgency::Critical | Urgency::High) {
        ExecutionMode::Expedited
    } else if pattern == ExecutionPattern::Parallel {
        ExecutionMode::Concurrent
    } else {
        ExecutionMode::Standard
    }
}
