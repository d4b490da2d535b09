//! Query submission and status polling.
//!
//! Owns the validate → submit → (optionally) poll-until-terminal flow. The
//! controller keeps no state between calls; every execution it returns was
//! observed from the engine.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::fetch_status;
use crate::athena::{QueryExecution, QueryExecutionClient, QueryState};
use crate::config::{validate_output_location, PollingConfig, QueryDefaults};
use crate::error::{Result, ServiceError};
use crate::safety::QueryValidator;

/// Suspends the polling loop between status checks.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A statement to run, as received from a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRequest {
    pub statement: String,
    /// Falls back to the configured default when absent or empty.
    pub workgroup: Option<String>,
    /// Falls back to the configured default when absent or empty.
    pub output_location: Option<String>,
    pub wait_for_completion: bool,
}

impl QueryRequest {
    /// Creates a request that returns as soon as the engine accepts it.
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            ..Default::default()
        }
    }

    /// Makes the request block until a terminal state or the poll budget.
    pub fn waiting(mut self) -> Self {
        self.wait_for_completion = true;
        self
    }
}

/// Drives a query from submission to (optionally) a terminal state.
pub struct QueryLifecycleController {
    client: Arc<dyn QueryExecutionClient>,
    validator: QueryValidator,
    defaults: QueryDefaults,
    polling: PollingConfig,
    sleeper: Arc<dyn Sleeper>,
    shutdown: CancellationToken,
}

impl QueryLifecycleController {
    /// Creates a controller using the tokio timer and a private shutdown token.
    pub fn new(
        client: Arc<dyn QueryExecutionClient>,
        defaults: QueryDefaults,
        polling: PollingConfig,
    ) -> Self {
        Self {
            client,
            validator: QueryValidator::new(),
            defaults,
            polling,
            sleeper: Arc::new(TokioSleeper),
            shutdown: CancellationToken::new(),
        }
    }

    /// Replaces the sleeper used between polls.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Sets the process shutdown token observed by the polling loop.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Validates and submits a query, polling to completion if requested.
    pub async fn submit(&self, request: &QueryRequest) -> Result<QueryExecution> {
        let kind = self.validator.validate(&request.statement)?;

        let workgroup = effective(&request.workgroup, &self.defaults.workgroup);
        let output_location = effective(&request.output_location, &self.defaults.output_location);
        validate_output_location(output_location)
            .map_err(|e| ServiceError::invalid_arguments(strip_config_prefix(&e)))?;

        let id = self
            .client
            .submit(&request.statement, workgroup, output_location)
            .await
            .map_err(|e| {
                warn!("Athena rejected submission: {}", e);
                ServiceError::submission(e.to_string())
            })?;
        info!("Submitted {} query {} to workgroup {}", kind, id, workgroup);

        if !request.wait_for_completion {
            // A freshly accepted execution is queued; report it without another round trip.
            let result_file = result_file_location(output_location, &id);
            let mut execution = QueryExecution::new(id, QueryState::Queued);
            execution.workgroup = Some(workgroup.to_string());
            return Ok(execution.with_output_location(result_file));
        }

        self.wait_for_terminal(&id).await
    }

    /// Polls until the execution is terminal, the poll budget runs out, or
    /// shutdown is requested. The last observation is returned in the latter
    /// two cases; the remote query keeps running.
    pub async fn wait_for_terminal(&self, execution_id: &str) -> Result<QueryExecution> {
        let mut polls = 0;
        loop {
            let execution = fetch_status(self.client.as_ref(), execution_id).await?;
            polls += 1;
            debug!(
                "Query {} is {} after {} poll(s)",
                execution_id, execution.state, polls
            );

            if execution.is_terminal() {
                info!("Query {} finished as {}", execution_id, execution.state);
                return Ok(execution);
            }
            if polls >= self.polling.max_polls {
                warn!(
                    "Query {} still {} after {} polls; returning without waiting further",
                    execution_id, execution.state, polls
                );
                return Ok(execution);
            }

            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested; abandoning wait on query {}", execution_id);
                    return Ok(execution);
                }
                _ = self.sleeper.sleep(self.polling.interval) => {}
            }
        }
    }
}

/// Returns the request value unless it is absent or blank.
fn effective<'a>(requested: &'a Option<String>, default: &'a str) -> &'a str {
    requested
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
}

/// Athena writes results to `<output location>/<execution id>.csv`.
fn result_file_location(output_location: &str, execution_id: &str) -> String {
    if output_location.ends_with('/') {
        format!("{output_location}{execution_id}.csv")
    } else {
        format!("{output_location}/{execution_id}.csv")
    }
}

fn strip_config_prefix(error: &ServiceError) -> String {
    match error {
        ServiceError::Config(msg) => msg.clone(),
        other => other.to_string(),
    }
}
