//! REST API server for the workflow orchestrator
//!
//! Thin HTTP adapter over the `Orchestrator` façade

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::agent::Orchestrator;
use crate::catalog::CatalogFilter;
use crate::error::WorkflowError;
use crate::models::{ClassificationResult, ExecutionContext};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClassifyRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub context: ExecutionContext,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OrchestrationRequest {
    pub text: String,
    #[serde(default)]
    pub context: ExecutionContext,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

fn ok<T: Serialize>(data: T) -> ApiResult {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

fn failure(error: WorkflowError) -> ApiResult {
    let status = match error {
        WorkflowError::WorkflowNotFound(_) | WorkflowError::ExecutionNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        WorkflowError::DuplicateId(_)
        | WorkflowError::InvalidDefinition(_)
        | WorkflowError::UnknownLabel { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ApiResponse::error(error.to_string())))
}

fn respond<T: Serialize>(result: crate::Result<T>) -> ApiResult {
    match result {
        Ok(data) => ok(data),
        Err(e) => failure(e),
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "workflows": state.orchestrator.catalog().len(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Catalog Endpoints
/// =============================

async fn list_workflows(
    State(state): State<ApiState>,
    Query(filter): Query<CatalogFilter>,
) -> ApiResult {
    ok(state.orchestrator.list_workflows(&filter))
}

async fn get_workflow(State(state): State<ApiState>, Path(workflow_id): Path<String>) -> ApiResult {
    respond(state.orchestrator.get_workflow(&workflow_id))
}

async fn catalog_stats(State(state): State<ApiState>) -> ApiResult {
    ok(state.orchestrator.catalog().stats())
}

async fn catalog_export(State(state): State<ApiState>) -> ApiResult {
    respond(state.orchestrator.catalog().export())
}

/// =============================
/// Classification & Routing
/// =============================

async fn classify(State(state): State<ApiState>, Json(req): Json<ClassifyRequest>) -> ApiResult {
    ok(state.orchestrator.classify(&req.text))
}

/// Accepts either raw text or a prior classification.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RouteRequest {
    Classification(ClassificationResult),
    Text { text: String },
}

async fn route(State(state): State<ApiState>, Json(req): Json<RouteRequest>) -> ApiResult {
    let classification = match req {
        RouteRequest::Classification(classification) => classification,
        RouteRequest::Text { text } => state.orchestrator.classify(&text),
    };
    ok(state.orchestrator.route(&classification))
}

/// =============================
/// Execution Endpoints
/// =============================

async fn execute_workflow(
    State(state): State<ApiState>,
    Path(workflow_id): Path<String>,
    Json(req): Json<ExecuteRequest>,
) -> ApiResult {
    info!(workflow_id = %workflow_id, "Received execution request");
    respond(state.orchestrator.execute_workflow(&workflow_id, req.context).await)
}

async fn handle_request(
    State(state): State<ApiState>,
    Json(req): Json<OrchestrationRequest>,
) -> ApiResult {
    info!(request = %req.text, "Received orchestration request");
    respond(state.orchestrator.handle_request(&req.text, req.context).await)
}

async fn execution_status(State(state): State<ApiState>, Path(execution_id): Path<String>) -> ApiResult {
    let Ok(execution_id) = Uuid::parse_str(&execution_id) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!("Invalid execution id: {}", execution_id))),
        );
    };
    respond(state.orchestrator.get_execution_status(execution_id).await)
}

async fn executor_stats(State(state): State<ApiState>) -> ApiResult {
    respond(state.orchestrator.get_executor_stats().await)
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/api/workflows", get(list_workflows))
        .route("/api/workflows/:id", get(get_workflow))
        .route("/api/workflows/:id/execute", post(execute_workflow))
        .route("/api/catalog/stats", get(catalog_stats))
        .route("/api/catalog/export", get(catalog_export))
        .route("/api/classify", post(classify))
        .route("/api/route", post(route))
        .route("/api/requests", post(handle_request))
        .route("/api/executions/:id", get(execution_status))
        .route("/api/stats", get(executor_stats))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<Orchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
