use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wealth_workflow_orchestrator::{
    agent::Orchestrator,
    config::EngineConfig,
    models::{ExecutionContext, ExecutionPattern},
};

/// One representative run per execution pattern
fn demo_runs() -> Vec<(&'static str, serde_json::Value)> {
    vec![
        ("ADV001", json!({ "client_id": "WM000001", "meeting_type": "review" })),
        ("ADV005", json!({ "max_concurrent_tasks": 3 })),
        ("ADV003", json!({ "max_iterations": 3 })),
        ("ADV007", json!({ "event_type": "market_volatility", "severity": "high" })),
        ("ADV008", json!({ "schedule_type": "weekly", "recurring": true })),
        ("OPS003", json!({ "sub_workflows": ["ADV009", "CLI002", "OPS001"] })),
    ]
}

fn context(value: serde_json::Value) -> ExecutionContext {
    match value {
        serde_json::Value::Object(map) => map,
        _ => ExecutionContext::new(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Wealth Workflow Orchestrator starting");

    let orchestrator = Orchestrator::builder(EngineConfig::from_env()?)
        .with_builtin_workflows()?
        .build()?;

    let stats = orchestrator.catalog().stats();
    println!("\n=== WORKFLOW CATALOG ===");
    println!("Total workflows: {}", stats.total_workflows);
    for pattern in ExecutionPattern::ALL {
        println!(
            "  {:<22} {}",
            pattern.as_str(),
            stats.by_pattern.get(pattern.as_str()).copied().unwrap_or(0)
        );
    }

    println!("\n=== PATTERN DEMOS ===");
    for (workflow_id, ctx) in demo_runs() {
        let execution = orchestrator.execute_workflow(workflow_id, context(ctx)).await?;
        let summary = execution.summary();
        println!(
            "{} [{}] {} - {}/{} steps succeeded in {} ms",
            workflow_id,
            execution.workflow.pattern,
            summary.status,
            summary.steps_succeeded,
            summary.steps_completed,
            summary.duration_ms
        );
        if let Some(error) = &summary.error_message {
            println!("  error: {}", error);
        }
    }

    println!("\n=== REQUEST HANDLING ===");
    let outcome = orchestrator
        .handle_request(
            "Market crash! Urgent help needed for my clients immediately",
            ExecutionContext::new(),
        )
        .await?;
    println!("Request: {}", outcome.request);
    for (i, trace) in outcome.reasoning_trace.iter().enumerate() {
        println!("  {}: {}", i + 1, trace);
    }

    println!("\n=== SMOKE TESTS ===");
    let report = orchestrator.test_harness().run_smoke_tests().await;
    println!(
        "{}/{} passed ({} timed out)",
        report.summary.passed, report.summary.total, report.summary.timed_out
    );
    for failed in &report.failed_tests {
        println!(
            "  {}: {}",
            failed.test_id,
            failed.error_message.as_deref().unwrap_or("unknown failure")
        );
    }

    let executor_stats = orchestrator.get_executor_stats().await?;
    println!("\n=== EXECUTOR STATS ===");
    println!(
        "{} executions, success rate {:.2}, average {:.1} ms",
        executor_stats.total_executions,
        executor_stats.success_rate,
        executor_stats.average_duration_ms
    );

    Ok(())
}
