//! Query lifecycle for athena-mcp.
//!
//! This module isolates submission, polling, and pagination from the tool
//! router so each can be tested against the mock engine.

pub mod controller;
pub mod paginator;

pub use controller::{QueryLifecycleController, QueryRequest, Sleeper, TokioSleeper};
pub use paginator::ResultPaginator;

use tracing::warn;

use crate::athena::{EngineError, QueryExecution, QueryExecutionClient};
use crate::error::{Result, ServiceError};

/// Looks up an execution's status, retrying a single failed lookup.
///
/// An unknown execution is reported immediately as `ExecutionNotFound`.
pub(crate) async fn fetch_status(
    client: &dyn QueryExecutionClient,
    execution_id: &str,
) -> Result<QueryExecution> {
    match client.get_status(execution_id).await {
        Ok(execution) => Ok(execution),
        Err(EngineError::NotFound(id)) => Err(ServiceError::ExecutionNotFound(id)),
        Err(first) => {
            warn!(
                "Status lookup for {} failed, retrying once: {}",
                execution_id, first
            );
            client
                .get_status(execution_id)
                .await
                .map_err(|e| match e {
                    EngineError::NotFound(id) => ServiceError::ExecutionNotFound(id),
                    other => ServiceError::status_fetch(other.to_string()),
                })
        }
    }
}
