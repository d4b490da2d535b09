//! Tool definitions and dispatch.
//!
//! Exposes `run_query` and `get_query_results` to agents and shapes their
//! responses. Handlers are thin wrappers over the lifecycle controller and
//! the paginator.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::athena::{ColumnInfo, QueryExecution, QueryState, QueryStatistics, ResultPage, Row};
use crate::error::ServiceError;
use crate::query::{QueryLifecycleController, QueryRequest, ResultPaginator};

pub const RUN_QUERY: &str = "run_query";
pub const GET_QUERY_RESULTS: &str = "get_query_results";

/// Tool definition advertised through `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Input parameters for the run_query tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunQueryInput {
    pub query_string: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workgroup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_location: Option<String>,
    #[serde(default)]
    pub wait_for_completion: bool,
}

/// Input parameters for the get_query_results tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetQueryResultsInput {
    pub query_execution_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

/// Output of the run_query tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunQueryOutput {
    pub query_execution_id: String,
    pub state: QueryState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workgroup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_change_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<QueryStatistics>,
    /// First page of rows, attached when the call waited for success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<QueryResultsOutput>,
    /// Why the attached first page could not be fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_error: Option<Value>,
}

impl From<QueryExecution> for RunQueryOutput {
    fn from(execution: QueryExecution) -> Self {
        Self {
            query_execution_id: execution.id,
            state: execution.state,
            output_location: execution.output_location,
            workgroup: execution.workgroup,
            state_change_reason: execution.state_change_reason,
            submitted_at: execution.submitted_at.map(|t| t.to_rfc3339()),
            completed_at: execution.completed_at.map(|t| t.to_rfc3339()),
            statistics: execution.statistics,
            results: None,
            results_error: None,
        }
    }
}

/// Output of the get_query_results tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResultsOutput {
    pub query_execution_id: String,
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Row>,
    pub row_count: usize,
    /// Pass back as `next_token` for the next page; absent on the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl QueryResultsOutput {
    fn from_page(execution_id: &str, page: ResultPage) -> Self {
        Self {
            query_execution_id: execution_id.to_string(),
            row_count: page.rows.len(),
            columns: page.columns,
            rows: page.rows,
            next_token: page.next_token,
        }
    }
}

/// Errors surfaced by tool dispatch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    /// No tool with this name exists.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The tool ran and failed.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Returns the tool definitions available to agents.
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: RUN_QUERY.to_string(),
            description: "Execute a read-only Athena SQL query (SELECT, WITH, SHOW, DESCRIBE, \
                          EXPLAIN) and return the execution details. Set wait_for_completion \
                          to block until the query finishes."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query_string": {
                        "type": "string",
                        "description": "The SQL query to execute in Athena"
                    },
                    "workgroup": {
                        "type": "string",
                        "description": "The Athena workgroup to use. If not provided, uses the server's configured default."
                    },
                    "output_location": {
                        "type": "string",
                        "description": "S3 location to store query results. If not provided, uses the server's configured default."
                    },
                    "wait_for_completion": {
                        "type": "boolean",
                        "description": "Whether to wait for query completion",
                        "default": false
                    }
                },
                "required": ["query_string"]
            }),
        },
        ToolDefinition {
            name: GET_QUERY_RESULTS.to_string(),
            description: "Get a page of results of a previously executed Athena query. Pass the \
                          returned next_token to fetch the following page."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query_execution_id": {
                        "type": "string",
                        "description": "The execution ID of the query to get results for"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of rows the engine returns for this page (1-1000). On the first page one of these rows is the header row, which is removed, so the first page holds at most max_results - 1 data rows.",
                        "default": 1000
                    },
                    "next_token": {
                        "type": "string",
                        "description": "Continuation token from a previous page"
                    }
                },
                "required": ["query_execution_id"]
            }),
        },
    ]
}

/// Routes tool calls to the query lifecycle.
pub struct ToolRouter {
    controller: QueryLifecycleController,
    paginator: ResultPaginator,
}

impl ToolRouter {
    /// Creates a new tool router.
    pub fn new(controller: QueryLifecycleController, paginator: ResultPaginator) -> Self {
        Self {
            controller,
            paginator,
        }
    }

    /// Lists the tools supported by this server.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        get_tool_definitions()
    }

    /// Handles a tool call by name with a JSON argument object.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let output = match name {
            RUN_QUERY => {
                let input: RunQueryInput = decode(arguments)?;
                to_value(self.run_query(input).await?)?
            }
            GET_QUERY_RESULTS => {
                let input: GetQueryResultsInput = decode(arguments)?;
                to_value(self.get_query_results(input).await?)?
            }
            other => return Err(ToolError::UnknownTool(other.to_string())),
        };
        Ok(output)
    }

    /// Submits a query, attaching the first page when it waited for success.
    pub async fn run_query(&self, input: RunQueryInput) -> Result<RunQueryOutput, ServiceError> {
        let request = QueryRequest {
            statement: input.query_string,
            workgroup: input.workgroup,
            output_location: input.output_location,
            wait_for_completion: input.wait_for_completion,
        };

        let execution = self.controller.submit(&request).await.map_err(|e| {
            info!("run_query failed: {}: {}", e.category(), e);
            e
        })?;

        let waited_for_success =
            request.wait_for_completion && execution.state == QueryState::Succeeded;
        let execution_id = execution.id.clone();
        let mut output = RunQueryOutput::from(execution);

        if waited_for_success {
            match self.paginator.fetch_page(&execution_id, None, None).await {
                Ok(page) => {
                    output.results = Some(QueryResultsOutput::from_page(&execution_id, page));
                }
                Err(e) => {
                    warn!("Could not attach results for {}: {}", execution_id, e);
                    output.results_error = Some(e.to_json()["error"].clone());
                }
            }
        }

        Ok(output)
    }

    /// Fetches one page of results.
    pub async fn get_query_results(
        &self,
        input: GetQueryResultsInput,
    ) -> Result<QueryResultsOutput, ServiceError> {
        let execution_id = input.query_execution_id.trim();
        if execution_id.is_empty() {
            return Err(ServiceError::invalid_arguments(
                "query_execution_id must not be empty",
            ));
        }

        let page = self
            .paginator
            .fetch_page(
                execution_id,
                input.next_token.as_deref().filter(|t| !t.is_empty()),
                input.max_results,
            )
            .await?;

        Ok(QueryResultsOutput::from_page(execution_id, page))
    }
}

fn decode<T: DeserializeOwned>(arguments: Value) -> Result<T, ServiceError> {
    let arguments = if arguments.is_null() {
        Value::Object(Default::default())
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| ServiceError::invalid_arguments(e.to_string()))
}

fn to_value<T: Serialize>(output: T) -> Result<Value, ServiceError> {
    serde_json::to_value(output)
        .map_err(|e| ServiceError::internal(format!("Failed to encode tool output: {e}")))
}
