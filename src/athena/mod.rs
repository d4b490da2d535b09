//! Query engine access layer.
//!
//! Provides a trait-based interface over Athena's submit/status/fetch
//! primitives so the lifecycle controller and paginator can run against
//! the real service or an in-memory double. This is the only layer that
//! talks to the network, and it never retries on its own.

mod client;
mod mock;
mod signing;
mod types;

pub use client::{AthenaClient, AthenaClientConfig};
pub use mock::{MockAthenaClient, MockFetch, MockSubmission};
pub use signing::Credentials;
pub use types::{
    clamp_row_limit, ColumnInfo, QueryExecution, QueryState, QueryStatistics, ResultPage, Row,
    MAX_PAGE_ROWS,
};

use async_trait::async_trait;
use thiserror::Error;

/// Failure of a single engine primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Network failure, timeout, or unreachable endpoint.
    #[error("transport error: {0}")]
    Transport(String),

    /// The engine answered with an error.
    #[error("{code}: {message}")]
    Service { code: String, message: String },

    /// The referenced execution does not exist.
    #[error("query execution {0} was not found")]
    NotFound(String),

    /// The engine answered with something we could not decode.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl EngineError {
    /// Creates a service error from an engine error code and message.
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Result type for engine primitives.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Trait defining the interface to the query engine.
#[async_trait]
pub trait QueryExecutionClient: Send + Sync {
    /// Submits a statement and returns the engine-assigned execution id.
    async fn submit(
        &self,
        statement: &str,
        workgroup: &str,
        output_location: &str,
    ) -> EngineResult<String>;

    /// Looks up the current status of an execution.
    async fn get_status(&self, execution_id: &str) -> EngineResult<QueryExecution>;

    /// Fetches one page of results for a succeeded execution.
    async fn get_results_page(
        &self,
        execution_id: &str,
        next_token: Option<&str>,
        limit: u32,
    ) -> EngineResult<ResultPage>;
}
