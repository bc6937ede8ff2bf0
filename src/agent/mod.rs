//! Orchestrator façade
//!
//! INPUT → CLASSIFY → ROUTE → SELECT → EXECUTE → COMPLETE
//!
//! Owns the catalog, classifier, router and executor, and exposes the
//! operations callers use: catalog lookups, classification, routing,
//! execution and execution status.

use crate::catalog::{Catalog, CatalogFilter};
use crate::classifier::WorkflowClassifier;
use crate::config::EngineConfig;
use crate::error::WorkflowError;
use crate::execution::{ExecutionOptions, WorkflowExecutor};
use crate::harness::WorkflowTestHarness;
use crate::models::{
    ClassificationResult, ExecutionContext, ExecutionSummary, ExecutorStats, RoutingDecision,
    WorkflowDefinition, WorkflowExecution,
};
use crate::router::WorkflowRouter;
use crate::state::ExecutionStore;
use crate::tools::{create_default_dispatcher, StepDispatcher};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Request words shorter than this are ignored when matching workflows
const MIN_MATCH_WORD_LEN: usize = 4;

/// Everything `handle_request` decided, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestOutcome {
    pub request: String,
    pub classification: ClassificationResult,
    pub routing: RoutingDecision,
    pub selected_workflow: Option<String>,
    /// Distinct request words found in the selected workflow's text
    pub selection_score: usize,
    pub execution: Option<WorkflowExecution>,
    pub summary: Option<ExecutionSummary>,
    pub reasoning_trace: Vec<String>,
    pub total_time_ms: u64,
}

/// Collects the catalog and collaborators before the façade is frozen.
pub struct OrchestratorBuilder {
    config: EngineConfig,
    catalog: Catalog,
    dispatcher: Option<StepDispatcher>,
    store: Option<Arc<dyn ExecutionStore>>,
}

impl OrchestratorBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            catalog: Catalog::new(),
            dispatcher: None,
            store: None,
        }
    }

    pub fn with_builtin_workflows(mut self) -> Result<Self> {
        self.catalog = Catalog::with_builtin_workflows()?;
        Ok(self)
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn register_workflow(&mut self, definition: WorkflowDefinition) -> Result<Arc<WorkflowDefinition>> {
        self.catalog.register(definition)
    }

    pub fn with_dispatcher(mut self, dispatcher: StepDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ExecutionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Freeze the catalog. Without an explicit dispatcher the configured
    /// default (remote or mock handlers) is used.
    pub fn build(self) -> Result<Orchestrator> {
        let dispatcher = match self.dispatcher {
            Some(dispatcher) => dispatcher,
            None => create_default_dispatcher(&self.config)?,
        };

        let catalog = Arc::new(self.catalog);
        let mut executor = WorkflowExecutor::new(catalog.clone(), Arc::new(dispatcher), self.config.clone());
        if let Some(store) = self.store {
            executor = executor.with_store(store);
        }

        info!(workflows = catalog.len(), "Orchestrator initialized");

        Ok(Orchestrator {
            router: WorkflowRouter::new(catalog.clone()),
            classifier: WorkflowClassifier::new(),
            executor: Arc::new(executor),
            catalog,
            config: self.config,
        })
    }
}

/// Main orchestrator that coordinates classification, routing and execution
pub struct Orchestrator {
    catalog: Arc<Catalog>,
    classifier: WorkflowClassifier,
    router: WorkflowRouter,
    executor: Arc<WorkflowExecutor>,
    config: EngineConfig,
}

impl Orchestrator {
    pub fn builder(config: EngineConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn executor(&self) -> &Arc<WorkflowExecutor> {
        &self.executor
    }

    pub fn get_workflow(&self, workflow_id: &str) -> Result<Arc<WorkflowDefinition>> {
        self.catalog
            .get(workflow_id)
            .ok_or_else(|| WorkflowError::WorkflowNotFound(workflow_id.to_string()))
    }

    pub fn list_workflows(&self, filter: &CatalogFilter) -> Vec<Arc<WorkflowDefinition>> {
        self.catalog.list(filter).cloned().collect()
    }

    pub fn classify(&self, text: &str) -> ClassificationResult {
        self.classifier.classify(text)
    }

    pub fn route(&self, classification: &ClassificationResult) -> RoutingDecision {
        self.router.route(classification)
    }

    pub async fn execute_workflow(
        &self,
        workflow_id: &str,
        context: ExecutionContext,
    ) -> Result<WorkflowExecution> {
        self.executor.execute_workflow(workflow_id, context).await
    }

    /// Execute with the retry policy and deadline of a routing decision.
    pub async fn execute_routed(
        &self,
        workflow_id: &str,
        context: ExecutionContext,
        decision: &RoutingDecision,
    ) -> Result<WorkflowExecution> {
        let options = ExecutionOptions::from_routing(decision, &self.config);
        self.executor
            .execute_with_options(workflow_id, context, &options)
            .await
    }

    pub async fn get_execution_status(&self, execution_id: Uuid) -> Result<WorkflowExecution> {
        self.executor
            .get_execution(execution_id)
            .await?
            .ok_or_else(|| WorkflowError::ExecutionNotFound(execution_id.to_string()))
    }

    pub async fn get_executor_stats(&self) -> Result<ExecutorStats> {
        self.executor.stats().await
    }

    pub fn test_harness(&self) -> WorkflowTestHarness {
        WorkflowTestHarness::new(self.executor.clone())
    }

    /// Classify, route, pick the best-matching candidate workflow and run it
    /// with the routed options.
    pub async fn handle_request(&self, text: &str, context: ExecutionContext) -> Result<RequestOutcome> {
        let start_time = Instant::now();
        let mut reasoning_trace = Vec::new();

        info!(request = %text, "Orchestrator: handling request");
        reasoning_trace.push("INPUT: Request received".to_string());

        // === CLASSIFY ===
        let classification = self.classify(text);
        reasoning_trace.push(format!(
            "CLASSIFY: {}/{}/{}/{} -> {} (confidence {:.3})",
            classification.persona,
            classification.urgency,
            classification.complexity,
            classification.trigger_type,
            classification.workflow_type,
            classification.confidence.overall
        ));

        // === ROUTE ===
        let routing = self.route(&classification);
        reasoning_trace.push(format!(
            "ROUTE: {} pattern via {} (priority {}, timeout {}s, {} candidates)",
            routing.recommended_pattern,
            routing.handler,
            routing.priority,
            routing.timeout_secs,
            routing.candidate_workflows.len()
        ));

        // === SELECT ===
        let selection = self.select_workflow(text, &routing.candidate_workflows);
        let Some((workflow_id, selection_score)) = selection else {
            warn!(pattern = %routing.recommended_pattern, "No candidate workflow for routed pattern");
            reasoning_trace.push("SELECT: No candidate workflow registered".to_string());
            return Ok(RequestOutcome {
                request: text.to_string(),
                classification,
                routing,
                selected_workflow: None,
                selection_score: 0,
                execution: None,
                summary: None,
                reasoning_trace,
                total_time_ms: start_time.elapsed().as_millis() as u64,
            });
        };
        reasoning_trace.push(format!(
            "SELECT: {} ({} matching words)",
            workflow_id, selection_score
        ));

        // === EXECUTE ===
        let execution = self.execute_routed(&workflow_id, context, &routing).await?;
        let summary = execution.summary();
        reasoning_trace.push(format!(
            "EXECUTE: {} steps recorded, {} succeeded",
            summary.steps_completed, summary.steps_succeeded
        ));
        reasoning_trace.push(format!("COMPLETE: Execution {}", execution.status));

        debug!(
            execution_id = %execution.execution_id,
            status = %execution.status,
            "Request handled"
        );

        Ok(RequestOutcome {
            request: text.to_string(),
            classification,
            routing,
            selected_workflow: Some(workflow_id),
            selection_score,
            execution: Some(execution),
            summary: Some(summary),
            reasoning_trace,
            total_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    /// Candidate with the most request words in its name, description and
    /// triggers. Candidates are in catalog order and the earliest wins ties.
    fn select_workflow(&self, text: &str, candidates: &[String]) -> Option<(String, usize)> {
        let lowered = text.to_lowercase();
        let mut words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() >= MIN_MATCH_WORD_LEN)
            .collect();
        words.sort_unstable();
        words.dedup();

        let mut best: Option<(String, usize)> = None;
        for definition in candidates.iter().filter_map(|id| self.catalog.get(id)) {
            let haystack = format!(
                "{} {} {}",
                definition.name,
                definition.description,
                definition.triggers.join(" ")
            )
            .to_lowercase();
            let score = words.iter().filter(|w| haystack.contains(**w)).count();

            if best.as_ref().map_or(true, |(_, top)| score > *top) {
                best = Some((definition.workflow_id.clone(), score));
            }
        }
        best
    }
}
