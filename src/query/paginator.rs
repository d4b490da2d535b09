//! Cursor-based result pagination.
//!
//! Each call re-derives its position purely from the caller's execution id
//! and continuation token. Nothing is buffered or cached between calls.

use std::sync::Arc;
use tracing::{debug, warn};

use super::fetch_status;
use crate::athena::{clamp_row_limit, EngineError, QueryExecutionClient, QueryState, ResultPage};
use crate::error::{Result, ServiceError};

/// Serves result pages for succeeded executions.
pub struct ResultPaginator {
    client: Arc<dyn QueryExecutionClient>,
}

impl ResultPaginator {
    /// Creates a paginator over the given engine client.
    pub fn new(client: Arc<dyn QueryExecutionClient>) -> Self {
        Self { client }
    }

    /// Fetches one page of results.
    ///
    /// The execution must have SUCCEEDED; otherwise no fetch is attempted.
    /// `row_limit` is clamped to `[1, 1000]` and defaults to 1000, and is
    /// sent to the engine unchanged. The header row Athena puts at the top of
    /// the first page counts toward that limit and is then stripped, so a
    /// first page holds at most `row_limit - 1` data rows. Results without a
    /// header row (`SHOW`, `DESCRIBE`) keep the full limit. Column names are
    /// always reported in `columns`.
    pub async fn fetch_page(
        &self,
        execution_id: &str,
        next_token: Option<&str>,
        row_limit: Option<i64>,
    ) -> Result<ResultPage> {
        let execution = fetch_status(self.client.as_ref(), execution_id).await?;

        if execution.state != QueryState::Succeeded {
            debug!(
                "Refusing to fetch results for {} in state {}",
                execution_id, execution.state
            );
            return Err(ServiceError::ExecutionNotSucceeded {
                state: execution.state,
                reason: execution.state_change_reason,
            });
        }

        let limit = clamp_row_limit(row_limit);
        let mut page = self
            .client
            .get_results_page(execution_id, next_token, limit)
            .await
            .map_err(|e| {
                warn!("Fetching results for {} failed: {}", execution_id, e);
                match e {
                    EngineError::NotFound(id) => ServiceError::ExecutionNotFound(id),
                    other => ServiceError::result_fetch(other.to_string()),
                }
            })?;

        if next_token.is_none() && page.starts_with_header() {
            page.rows.remove(0);
        }
        page.row_limit = limit;

        debug!(
            "Fetched {} row(s) for {} (final page: {})",
            page.rows.len(),
            execution_id,
            page.is_final()
        );
        Ok(page)
    }
}
