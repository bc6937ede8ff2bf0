//! Engine configuration
//!
//! Every knob has a default suitable for tests; binaries load `.env` first and
//! then call [`EngineConfig::from_env`].

use crate::error::WorkflowError;
use crate::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Pacing delay between sequential steps. Zero disables it.
    pub step_delay: Duration,
    /// Upper bound on loop iterations regardless of `max_iterations`
    pub loop_hard_cap: u32,
    /// How deep master orchestrations may nest
    pub max_orchestration_depth: usize,
    /// Delay before the first retry of a failed step
    pub retry_base_delay: Duration,
    /// Whether routed executions run under the router's deadline
    pub enforce_timeouts: bool,
    /// Base URL of the remote financial services, if any
    pub financial_api_base_url: Option<String>,
    pub api_port: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_delay: Duration::ZERO,
            loop_hard_cap: 5,
            max_orchestration_depth: 3,
            retry_base_delay: Duration::from_millis(100),
            enforce_timeouts: true,
            financial_api_base_url: None,
            api_port: 8080,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Missing keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let step_delay = parse_var::<u64, _>(&lookup, "WORKFLOW_STEP_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.step_delay);

        let loop_hard_cap = parse_var(&lookup, "WORKFLOW_LOOP_HARD_CAP")?
            .unwrap_or(defaults.loop_hard_cap);
        if loop_hard_cap == 0 {
            return Err(WorkflowError::Config(
                "WORKFLOW_LOOP_HARD_CAP must be at least 1".to_string(),
            ));
        }

        let max_orchestration_depth = parse_var(&lookup, "WORKFLOW_MAX_ORCHESTRATION_DEPTH")?
            .unwrap_or(defaults.max_orchestration_depth);

        let retry_base_delay = parse_var::<u64, _>(&lookup, "WORKFLOW_RETRY_BASE_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_base_delay);

        let enforce_timeouts = parse_var(&lookup, "WORKFLOW_ENFORCE_TIMEOUTS")?
            .unwrap_or(defaults.enforce_timeouts);

        let financial_api_base_url = lookup("FINANCIAL_API_BASE_URL")
            .or_else(|| lookup("TOOLS_API_BASE_URL"))
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        let api_port = match parse_var(&lookup, "PORT")? {
            Some(port) => port,
            None => parse_var(&lookup, "API_PORT")?.unwrap_or(defaults.api_port),
        };

        Ok(Self {
            step_delay,
            loop_hard_cap,
            max_orchestration_depth,
            retry_base_delay,
            enforce_timeouts,
            financial_api_base_url,
            api_port,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| WorkflowError::Config(format!("{}='{}': {}", key, raw, e))),
    }
}
