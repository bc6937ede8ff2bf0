//! HTTP-backed step handlers
//!
//! Each domain route POSTs `{step_name, context}` to
//! `<base>/api/v1/steps/<route>` on the configured financial API service.

use super::StepHandler;
use crate::error::WorkflowError;
use crate::models::ExecutionContext;
use crate::Result;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FinancialApiClient {
    client: Client,
    base_url: String,
}

impl FinancialApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn step_url(&self, route: &str) -> String {
        format!("{}/api/v1/steps/{}", self.base_url, route)
    }

    async fn post_json(&self, url: String, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| WorkflowError::Step(format!("Financial API request failed for {}: {}", url, e)))?;

        let status = response.status();
        let body = response
            .json::<Value>()
            .await
            .map_err(|e| WorkflowError::Step(format!("Invalid JSON response: {}", e)))?;

        if !status.is_success() {
            return Err(WorkflowError::Step(format!(
                "Financial API returned {} for {}: {}",
                status, url, body
            )));
        }

        Ok(body)
    }
}

/// Step handler that delegates one dispatch route to the remote service.
pub struct RemoteStepHandler {
    api: Arc<FinancialApiClient>,
    route: &'static str,
}

impl RemoteStepHandler {
    pub fn new(api: Arc<FinancialApiClient>, route: &'static str) -> Self {
        Self { api, route }
    }
}

#[async_trait::async_trait]
impl StepHandler for RemoteStepHandler {
    fn name(&self) -> &'static str {
        self.route
    }

    async fn invoke(&self, step_name: &str, context: &ExecutionContext) -> Result<Value> {
        self.api
            .post_json(
                self.api.step_url(self.route),
                &json!({
                    "step_name": step_name,
                    "context": context,
                }),
            )
            .await
    }
}
