//! Mock financial step handlers
//!
//! Deterministic stand-ins for the market data, custody, CRM, compliance and
//! tax services. Setting `force_error: true` in the context makes every domain
//! handler fail; the generic handler always succeeds.

use super::StepHandler;
use crate::error::WorkflowError;
use crate::models::ExecutionContext;
use crate::Result;
use chrono::Utc;
use serde_json::{json, Value};

fn check_forced_error(service: &str, context: &ExecutionContext) -> Result<()> {
    if context.get("force_error").and_then(Value::as_bool) == Some(true) {
        return Err(WorkflowError::Step(format!(
            "{} service unavailable (forced error)",
            service
        )));
    }
    Ok(())
}

fn context_str<'a>(context: &'a ExecutionContext, key: &str, default: &'a str) -> &'a str {
    context.get(key).and_then(Value::as_str).unwrap_or(default)
}

pub struct PortfolioPerformanceHandler;

#[async_trait::async_trait]
impl StepHandler for PortfolioPerformanceHandler {
    fn name(&self) -> &'static str {
        "portfolio_performance"
    }

    async fn invoke(&self, _step_name: &str, context: &ExecutionContext) -> Result<Value> {
        check_forced_error("performance", context)?;

        Ok(json!({
            "status": "SUCCESS",
            "client_id": context_str(context, "client_id", "WM000001"),
            "portfolio_value": 1_000_000,
            "ytd_return": 0.08,
            "benchmark_comparison": "in-line",
            "analysis_date": Utc::now().to_rfc3339(),
        }))
    }
}

pub struct PortfolioRiskHandler;

#[async_trait::async_trait]
impl StepHandler for PortfolioRiskHandler {
    fn name(&self) -> &'static str {
        "portfolio_risk"
    }

    async fn invoke(&self, _step_name: &str, context: &ExecutionContext) -> Result<Value> {
        check_forced_error("risk analytics", context)?;

        Ok(json!({
            "status": "SUCCESS",
            "risk_score": 6.2,
            "var_95": 0.023,
            "concentration_risk": "moderate",
            "recommendations": ["diversify sector allocation", "reduce single position size"],
        }))
    }
}

pub struct RebalancingHandler;

#[async_trait::async_trait]
impl StepHandler for RebalancingHandler {
    fn name(&self) -> &'static str {
        "portfolio_rebalancing"
    }

    async fn invoke(&self, _step_name: &str, context: &ExecutionContext) -> Result<Value> {
        check_forced_error("trading", context)?;

        Ok(json!({
            "status": "SUCCESS",
            "trades_generated": 5,
            "total_trade_value": 150_000,
            "rebalancing_cost": 85.50,
        }))
    }
}

pub struct ClientOnboardingHandler;

#[async_trait::async_trait]
impl StepHandler for ClientOnboardingHandler {
    fn name(&self) -> &'static str {
        "client_onboarding"
    }

    async fn invoke(&self, _step_name: &str, context: &ExecutionContext) -> Result<Value> {
        check_forced_error("CRM", context)?;

        Ok(json!({
            "status": "SUCCESS",
            "onboarding_stage": "kyc_collection",
            "documents_collected": 3,
            "completion_percentage": 0.6,
        }))
    }
}

pub struct ClientCommunicationHandler;

#[async_trait::async_trait]
impl StepHandler for ClientCommunicationHandler {
    fn name(&self) -> &'static str {
        "client_communication"
    }

    async fn invoke(&self, _step_name: &str, context: &ExecutionContext) -> Result<Value> {
        check_forced_error("communications", context)?;

        Ok(json!({
            "status": "SUCCESS",
            "communication_sent": true,
            "delivery_method": context_str(context, "communication_method", "email"),
            "client_count": context.get("client_count").cloned().unwrap_or(json!(1)),
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}

pub struct ClientMeetingHandler;

#[async_trait::async_trait]
impl StepHandler for ClientMeetingHandler {
    fn name(&self) -> &'static str {
        "client_meeting"
    }

    async fn invoke(&self, _step_name: &str, context: &ExecutionContext) -> Result<Value> {
        check_forced_error("calendar", context)?;

        Ok(json!({
            "status": "SUCCESS",
            "meeting_type": context_str(context, "meeting_type", "review"),
            "agenda_items": 5,
            "action_items_generated": 3,
            "follow_up_scheduled": true,
        }))
    }
}

pub struct MarketAnalysisHandler;

#[async_trait::async_trait]
impl StepHandler for MarketAnalysisHandler {
    fn name(&self) -> &'static str {
        "market_analysis"
    }

    async fn invoke(&self, _step_name: &str, context: &ExecutionContext) -> Result<Value> {
        check_forced_error("market data", context)?;

        Ok(json!({
            "status": "SUCCESS",
            "volatility_level": "moderate",
            "market_direction": "neutral",
            "key_indicators": {
                "vix_level": 18.5,
                "sp500_return": 0.012,
                "bond_yield": 0.045,
            },
            "analysis_date": Utc::now().to_rfc3339(),
        }))
    }
}

pub struct MarketCommentaryHandler;

#[async_trait::async_trait]
impl StepHandler for MarketCommentaryHandler {
    fn name(&self) -> &'static str {
        "market_commentary"
    }

    async fn invoke(&self, _step_name: &str, context: &ExecutionContext) -> Result<Value> {
        check_forced_error("research", context)?;

        Ok(json!({
            "status": "SUCCESS",
            "commentary_length": 450,
            "key_topics": ["market outlook", "sector rotation", "risk factors"],
            "distribution_channels": ["email", "portal", "newsletter"],
        }))
    }
}

pub struct ComplianceHandler;

#[async_trait::async_trait]
impl StepHandler for ComplianceHandler {
    fn name(&self) -> &'static str {
        "compliance"
    }

    async fn invoke(&self, _step_name: &str, context: &ExecutionContext) -> Result<Value> {
        check_forced_error("compliance", context)?;

        Ok(json!({
            "status": "SUCCESS",
            "compliance_check": "passed",
            "regulations_reviewed": 3,
            "documentation_complete": true,
        }))
    }
}

pub struct TaxOptimizationHandler;

#[async_trait::async_trait]
impl StepHandler for TaxOptimizationHandler {
    fn name(&self) -> &'static str {
        "tax"
    }

    async fn invoke(&self, _step_name: &str, context: &ExecutionContext) -> Result<Value> {
        check_forced_error("tax", context)?;

        Ok(json!({
            "status": "SUCCESS",
            "tax_savings_identified": 12_500,
            "strategies_recommended": 4,
            "implementation_timeline": "Q4",
        }))
    }
}

/// Domain-agnostic fallback: always succeeds and echoes the context keys.
pub struct GenericStepHandler;

#[async_trait::async_trait]
impl StepHandler for GenericStepHandler {
    fn name(&self) -> &'static str {
        "generic"
    }

    async fn invoke(&self, step_name: &str, context: &ExecutionContext) -> Result<Value> {
        let mut context_keys: Vec<&str> = context.keys().map(String::as_str).collect();
        context_keys.sort_unstable();

        Ok(json!({
            "status": "SUCCESS",
            "step_name": step_name,
            "execution_result": "completed",
            "timestamp": Utc::now().to_rfc3339(),
            "context_keys": context_keys,
        }))
    }
}
