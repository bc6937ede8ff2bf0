//! Step handler boundary and dispatcher
//!
//! A step is routed to a handler by keyword matching on its lower-cased name,
//! through a fixed-precedence table of `(predicate, handler)` routes. Handler
//! failures never escape the dispatcher: they become [`StepError`] values.

pub mod handlers;
pub mod remote;

use crate::config::EngineConfig;
use crate::error::StepError;
use crate::models::{ExecutionContext, RetryPolicy, WorkflowDefinition};
use crate::Result;
use handlers::{
    ClientCommunicationHandler, ClientMeetingHandler, ClientOnboardingHandler, ComplianceHandler,
    GenericStepHandler, MarketAnalysisHandler, MarketCommentaryHandler,
    PortfolioPerformanceHandler, PortfolioRiskHandler, RebalancingHandler,
    TaxOptimizationHandler,
};
use remote::{FinancialApiClient, RemoteStepHandler};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// External capability that executes one named step.
#[async_trait::async_trait]
pub trait StepHandler: Send + Sync {
    fn name(&self) -> &'static str;
    async fn invoke(&self, step_name: &str, context: &ExecutionContext) -> Result<Value>;
}

/// Predicate over a lower-cased step name.
pub type StepPredicate = fn(&str) -> bool;

pub const GENERIC_ROUTE: &str = "generic";

/// Domain routes in precedence order. Anything unmatched goes to the generic handler.
///
/// Routes are flat: a step that names a domain ("portfolio") without one of
/// its sub-topics is not claimed by that domain and keeps falling through to
/// later routes, ending at the generic handler.
pub const ROUTE_TABLE: &[(&str, StepPredicate)] = &[
    ("portfolio_performance", |s| s.contains("portfolio") && s.contains("performance")),
    ("portfolio_risk", |s| s.contains("portfolio") && s.contains("risk")),
    ("portfolio_rebalancing", |s| s.contains("portfolio") && s.contains("rebalanc")),
    ("client_onboarding", |s| {
        s.contains("client") && (s.contains("onboard") || s.contains("kyc"))
    }),
    ("client_communication", |s| s.contains("client") && s.contains("communication")),
    ("client_meeting", |s| s.contains("client") && s.contains("meeting")),
    ("market_analysis", |s| {
        s.contains("market") && (s.contains("analysis") || s.contains("volatility"))
    }),
    ("market_commentary", |s| s.contains("market") && s.contains("commentary")),
    ("compliance", |s| s.contains("compliance") || s.contains("regulatory")),
    ("tax", |s| s.contains("tax")),
];

struct StepRoute {
    name: &'static str,
    predicate: StepPredicate,
    handler: Arc<dyn StepHandler>,
}

/// Outcome of a dispatch including retries.
#[derive(Debug, Clone)]
pub struct StepAttempt {
    pub route: &'static str,
    pub outcome: std::result::Result<Value, StepError>,
    pub attempts: u32,
}

pub struct StepDispatcher {
    routes: Vec<StepRoute>,
    fallback: Arc<dyn StepHandler>,
}

impl StepDispatcher {
    /// Dispatcher with no domain routes; every step goes to `fallback`.
    pub fn new(fallback: Arc<dyn StepHandler>) -> Self {
        Self {
            routes: Vec::new(),
            fallback,
        }
    }

    /// Build every route of [`ROUTE_TABLE`] from `factory`, in table order.
    pub fn from_factory<F>(fallback: Arc<dyn StepHandler>, factory: F) -> Self
    where
        F: Fn(&'static str) -> Arc<dyn StepHandler>,
    {
        ROUTE_TABLE
            .iter()
            .fold(Self::new(fallback), |dispatcher, &(name, predicate)| {
                dispatcher.with_route(name, predicate, factory(name))
            })
    }

    /// Append a route after the existing ones.
    pub fn with_route(
        mut self,
        name: &'static str,
        predicate: StepPredicate,
        handler: Arc<dyn StepHandler>,
    ) -> Self {
        self.routes.push(StepRoute {
            name,
            predicate,
            handler,
        });
        self
    }

    /// Mock financial services for every route.
    pub fn with_mock_handlers() -> Self {
        Self::from_factory(Arc::new(GenericStepHandler), mock_handler)
    }

    pub fn route_names(&self) -> Vec<&'static str> {
        self.routes.iter().map(|r| r.name).collect()
    }

    /// Route name and handler for a step. First matching predicate wins.
    pub fn resolve(&self, step_name: &str) -> (&'static str, Arc<dyn StepHandler>) {
        let lowered = step_name.to_lowercase();
        self.routes
            .iter()
            .find(|route| (route.predicate)(&lowered))
            .map(|route| (route.name, route.handler.clone()))
            .unwrap_or_else(|| (GENERIC_ROUTE, self.fallback.clone()))
    }

    /// Run one step once. Handler errors and non-object payloads come back as
    /// a `StepError`.
    pub async fn execute(
        &self,
        step_name: &str,
        definition: &WorkflowDefinition,
        context: &ExecutionContext,
    ) -> std::result::Result<Value, StepError> {
        let (route, handler) = self.resolve(step_name);

        debug!(
            workflow_id = %definition.workflow_id,
            step = step_name,
            route,
            handler = handler.name(),
            "Dispatching step"
        );

        match handler.invoke(step_name, context).await {
            Ok(payload) if payload.is_object() => Ok(payload),
            Ok(payload) => Err(StepError::new(
                step_name,
                format!("malformed payload from {}: expected an object, got {}", route, payload),
            )),
            Err(e) => Err(StepError::new(step_name, e.to_string())),
        }
    }

    /// Run one step, retrying failures up to `policy.max_attempts` total attempts
    /// with exponential backoff starting at `base_delay`.
    pub async fn dispatch_with_retry(
        &self,
        step_name: &str,
        definition: &WorkflowDefinition,
        context: &ExecutionContext,
        policy: &RetryPolicy,
        base_delay: Duration,
    ) -> StepAttempt {
        let (route, _) = self.resolve(step_name);
        let max_attempts = policy.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let outcome = self.execute(step_name, definition, context).await;

            match outcome {
                Err(ref e) if attempts < max_attempts => {
                    let delay = policy.backoff_delay(base_delay, attempts);
                    warn!(
                        workflow_id = %definition.workflow_id,
                        step = step_name,
                        attempt = attempts,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e.message,
                        "Step failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                outcome => {
                    return StepAttempt {
                        route,
                        outcome,
                        attempts,
                    }
                }
            }
        }
    }
}

impl Default for StepDispatcher {
    fn default() -> Self {
        Self::with_mock_handlers()
    }
}

fn mock_handler(route: &'static str) -> Arc<dyn StepHandler> {
    match route {
        "portfolio_performance" => Arc::new(PortfolioPerformanceHandler),
        "portfolio_risk" => Arc::new(PortfolioRiskHandler),
        "portfolio_rebalancing" => Arc::new(RebalancingHandler),
        "client_onboarding" => Arc::new(ClientOnboardingHandler),
        "client_communication" => Arc::new(ClientCommunicationHandler),
        "client_meeting" => Arc::new(ClientMeetingHandler),
        "market_analysis" => Arc::new(MarketAnalysisHandler),
        "market_commentary" => Arc::new(MarketCommentaryHandler),
        "compliance" => Arc::new(ComplianceHandler),
        "tax" => Arc::new(TaxOptimizationHandler),
        _ => Arc::new(GenericStepHandler),
    }
}

/// Dispatcher for the configured environment: remote handlers when a financial
/// API base URL is set, mock handlers otherwise. The generic route stays local.
pub fn create_default_dispatcher(config: &EngineConfig) -> Result<StepDispatcher> {
    match &config.financial_api_base_url {
        Some(base_url) => {
            let api = Arc::new(FinancialApiClient::new(base_url)?);
            info!(base_url = %api.base_url(), "Using remote financial step handlers");
            Ok(StepDispatcher::from_factory(
                Arc::new(GenericStepHandler),
                |route| Arc::new(RemoteStepHandler::new(api.clone(), route)) as Arc<dyn StepHandler>,
            ))
        }
        None => Ok(StepDispatcher::with_mock_handlers()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkflowError;
    use crate::models::{ComplexityTier, ExecutionPattern, WorkflowCategory};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn definition() -> WorkflowDefinition {
        WorkflowDefinition::new(
            "TST001",
            "Dispatch test",
            WorkflowCategory::Advisor,
            ExecutionPattern::Sequential,
            ComplexityTier::Simple,
            &["Analyze tax situation"],
        )
    }

    /// Fails the first `failures` invocations, then succeeds.
    struct FlakyHandler {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl StepHandler for FlakyHandler {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn invoke(&self, _step_name: &str, _context: &ExecutionContext) -> Result<Value> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(WorkflowError::Step(format!("outage #{}", call)))
            } else {
                Ok(json!({"status": "SUCCESS", "call": call}))
            }
        }
    }

    struct ScalarHandler;

    #[async_trait::async_trait]
    impl StepHandler for ScalarHandler {
        fn name(&self) -> &'static str {
            "scalar"
        }

        async fn invoke(&self, _step_name: &str, _context: &ExecutionContext) -> Result<Value> {
            Ok(json!(42))
        }
    }

    #[test]
    fn test_route_precedence() {
        let dispatcher = StepDispatcher::with_mock_handlers();
        let route = |step: &str| dispatcher.resolve(step).0;

        assert_eq!(route("Review portfolio performance"), "portfolio_performance");
        assert_eq!(route("Assess portfolio risk metrics"), "portfolio_risk");
        assert_eq!(route("Portfolio rebalancing run"), "portfolio_rebalancing");
        assert_eq!(route("Client KYC review"), "client_onboarding");
        assert_eq!(route("Create client communications"), "client_communication");
        assert_eq!(route("Prepare client meeting"), "client_meeting");
        assert_eq!(route("Analyze market volatility levels"), "market_analysis");
        assert_eq!(route("Generate market commentary"), "market_commentary");
        assert_eq!(route("Generate regulatory reports"), "compliance");
        assert_eq!(route("Analyze tax situation"), "tax");
        assert_eq!(route("Conduct meeting"), GENERIC_ROUTE);

        // performance outranks risk when both appear
        assert_eq!(route("Portfolio performance and risk"), "portfolio_performance");
        // a portfolio step with no portfolio sub-topic keeps looking further down
        assert_eq!(route("Assess portfolio tax drag"), "tax");
        assert_eq!(route("Review client portfolio"), GENERIC_ROUTE);
        assert_eq!(route("Portfolio compliance sweep"), "compliance");
    }

    #[test]
    fn test_route_table_order() {
        let dispatcher = StepDispatcher::with_mock_handlers();
        let names: Vec<_> = ROUTE_TABLE.iter().map(|(name, _)| *name).collect();
        assert_eq!(dispatcher.route_names(), names);
        assert_eq!(names.len(), 10);
    }

    #[tokio::test]
    async fn test_handler_failure_becomes_step_error() {
        let dispatcher = StepDispatcher::with_mock_handlers();
        let mut context = ExecutionContext::new();
        context.insert("force_error".into(), json!(true));

        let err = dispatcher
            .execute("Analyze tax situation", &definition(), &context)
            .await
            .unwrap_err();
        assert_eq!(err.step_name, "Analyze tax situation");
        assert!(err.message.contains("forced error"));
    }

    #[tokio::test]
    async fn test_non_object_payload_is_malformed() {
        let dispatcher = StepDispatcher::new(Arc::new(ScalarHandler));
        let err = dispatcher
            .execute("Anything", &definition(), &ExecutionContext::new())
            .await
            .unwrap_err();
        assert!(err.message.contains("malformed payload"));
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let dispatcher = StepDispatcher::new(Arc::new(FlakyHandler {
            failures: 2,
            calls: AtomicU32::new(0),
        }));
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff_factor: 1.0,
            timeout_multiplier: 1.5,
        };

        let attempt = dispatcher
            .dispatch_with_retry("Step", &definition(), &ExecutionContext::new(), &policy, Duration::ZERO)
            .await;
        assert_eq!(attempt.attempts, 3);
        assert_eq!(attempt.route, GENERIC_ROUTE);
        assert_eq!(attempt.outcome.unwrap()["call"], 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let dispatcher = StepDispatcher::new(Arc::new(FlakyHandler {
            failures: 10,
            calls: AtomicU32::new(0),
        }));
        let policy = RetryPolicy {
            max_attempts: 2,
            backoff_factor: 1.5,
            timeout_multiplier: 1.2,
        };

        let attempt = dispatcher
            .dispatch_with_retry(
                "Step",
                &definition(),
                &ExecutionContext::new(),
                &policy,
                Duration::from_millis(1),
            )
            .await;
        assert_eq!(attempt.attempts, 2);
        assert_eq!(attempt.outcome.unwrap_err().message, "Step handler error: outage #2");
    }

    #[test]
    fn test_default_dispatcher_without_remote() {
        let dispatcher = create_default_dispatcher(&EngineConfig::default()).unwrap();
        assert_eq!(dispatcher.resolve("Analyze tax situation").1.name(), "tax");
    }

    #[test]
    fn test_default_dispatcher_with_remote() {
        let config = EngineConfig {
            financial_api_base_url: Some("http://localhost:9000".into()),
            ..EngineConfig::default()
        };
        let dispatcher = create_default_dispatcher(&config).unwrap();
        let (route, handler) = dispatcher.resolve("Perform compliance testing");
        assert_eq!(route, "compliance");
        assert_eq!(handler.name(), "compliance");
        assert_eq!(dispatcher.resolve("Conduct meeting").1.name(), "generic");
    }
}
