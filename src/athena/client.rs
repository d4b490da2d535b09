//! Athena client implementation.
//!
//! Speaks the Athena JSON 1.1 protocol over HTTPS, signing every request
//! with AWS Signature V4.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::signing::{self, Credentials, SigningRequest};
use super::{
    ColumnInfo, EngineError, EngineResult, QueryExecution, QueryExecutionClient, QueryState,
    QueryStatistics, ResultPage, Row,
};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const SERVICE: &str = "athena";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const TARGET_PREFIX: &str = "AmazonAthena";

/// Athena client configuration.
#[derive(Debug, Clone)]
pub struct AthenaClientConfig {
    /// AWS region (e.g., "us-east-1").
    pub region: String,
    /// Endpoint override; defaults to the regional Athena endpoint.
    pub endpoint: Option<String>,
    /// Signing credentials. Calls fail when absent.
    pub credentials: Option<Credentials>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl AthenaClientConfig {
    /// Creates a new config for the given region.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            endpoint: None,
            credentials: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Sets the signing credentials.
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Overrides the endpoint URL.
    pub fn with_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Returns the endpoint URL requests are sent to.
    pub fn endpoint_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://athena.{}.amazonaws.com/", self.region))
    }
}

/// Athena query engine client.
#[derive(Debug, Clone)]
pub struct AthenaClient {
    config: AthenaClientConfig,
    endpoint: Url,
    client: Client,
}

impl AthenaClient {
    /// Creates a new Athena client with the given configuration.
    pub fn new(config: AthenaClientConfig) -> EngineResult<Self> {
        let endpoint = Url::parse(&config.endpoint_url())
            .map_err(|e| EngineError::Transport(format!("Invalid endpoint URL: {e}")))?;
        if endpoint.host_str().is_none() {
            return Err(EngineError::Transport(format!(
                "Endpoint URL has no host: {endpoint}"
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            endpoint,
            client,
        })
    }

    /// Returns the `host` header value for the endpoint.
    fn host_header(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Sends one signed API call and decodes the response body.
    async fn call<Req, Resp>(&self, operation: &str, request: &Req) -> EngineResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let credentials = self.config.credentials.as_ref().ok_or_else(|| {
            EngineError::Transport("No AWS credentials configured".to_string())
        })?;

        let payload = serde_json::to_vec(request)
            .map_err(|e| EngineError::Malformed(format!("Failed to encode request: {e}")))?;
        let target = format!("{TARGET_PREFIX}.{operation}");

        let signing_request = SigningRequest {
            method: "POST",
            path: self.endpoint.path(),
            query: "",
            headers: vec![
                ("content-type".to_string(), CONTENT_TYPE.to_string()),
                ("host".to_string(), self.host_header()),
                ("x-amz-target".to_string(), target),
            ],
            payload: &payload,
        };
        let headers = signing::sign(
            credentials,
            &self.config.region,
            SERVICE,
            signing_request,
            Utc::now(),
        )?;

        debug!("Athena {} request", operation);

        let mut builder = self.client.post(self.endpoint.clone());
        for (name, value) in headers.into_iter().filter(|(name, _)| name != "host") {
            builder = builder.header(name, value);
        }

        let response = builder.body(payload).send().await.map_err(|e| {
            if e.is_timeout() {
                EngineError::Transport("Request timed out".to_string())
            } else if e.is_connect() {
                EngineError::Transport(format!("Failed to connect to Athena: {e}"))
            } else {
                EngineError::Transport(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::Transport(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(parse_error(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| EngineError::Malformed(format!("Failed to parse {operation} response: {e}")))
    }
}

#[async_trait]
impl QueryExecutionClient for AthenaClient {
    async fn submit(
        &self,
        statement: &str,
        workgroup: &str,
        output_location: &str,
    ) -> EngineResult<String> {
        let request = StartQueryExecutionRequest {
            query_string: statement,
            work_group: workgroup,
            result_configuration: ResultConfigurationRequest {
                output_location,
            },
        };
        let response: StartQueryExecutionResponse =
            self.call("StartQueryExecution", &request).await?;
        Ok(response.query_execution_id)
    }

    async fn get_status(&self, execution_id: &str) -> EngineResult<QueryExecution> {
        let request = ExecutionIdRequest {
            query_execution_id: execution_id,
        };
        let response: GetQueryExecutionResponse = self
            .call("GetQueryExecution", &request)
            .await
            .map_err(|e| not_found_for(e, execution_id))?;
        response.query_execution.into_execution()
    }

    async fn get_results_page(
        &self,
        execution_id: &str,
        next_token: Option<&str>,
        limit: u32,
    ) -> EngineResult<ResultPage> {
        let request = GetQueryResultsRequest {
            query_execution_id: execution_id,
            next_token,
            max_results: limit,
        };
        let response: GetQueryResultsResponse = self
            .call("GetQueryResults", &request)
            .await
            .map_err(|e| not_found_for(e, execution_id))?;
        Ok(response.into_page(limit))
    }
}

/// Parses an API error response body.
fn parse_error(status: reqwest::StatusCode, body: &str) -> EngineError {
    match serde_json::from_str::<AthenaErrorResponse>(body) {
        Ok(error) => {
            let code = error
                .error_type
                .as_deref()
                .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
                .unwrap_or_else(|| status.to_string());
            let message = error
                .message
                .or(error.message_upper)
                .unwrap_or_else(|| body.to_string());
            EngineError::Service { code, message }
        }
        Err(_) => EngineError::service(status.to_string(), body),
    }
}

/// Reclassifies "not found" invalid-request errors for a specific execution.
fn not_found_for(error: EngineError, execution_id: &str) -> EngineError {
    match &error {
        EngineError::Service { code, message }
            if code == "ResourceNotFoundException"
                || (code == "InvalidRequestException"
                    && message.to_lowercase().contains("not found")) =>
        {
            EngineError::NotFound(execution_id.to_string())
        }
        _ => error,
    }
}

fn epoch_to_datetime(seconds: f64) -> Option<DateTime<Utc>> {
    let millis = (seconds * 1000.0).round() as i64;
    Utc.timestamp_millis_opt(millis).single()
}

// === Wire types ===

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StartQueryExecutionRequest<'a> {
    query_string: &'a str,
    work_group: &'a str,
    result_configuration: ResultConfigurationRequest<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ResultConfigurationRequest<'a> {
    output_location: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StartQueryExecutionResponse {
    query_execution_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ExecutionIdRequest<'a> {
    query_execution_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueryResultsRequest<'a> {
    query_execution_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<&'a str>,
    max_results: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueryExecutionResponse {
    query_execution: WireQueryExecution,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireQueryExecution {
    query_execution_id: String,
    status: WireStatus,
    #[serde(default)]
    result_configuration: Option<WireResultConfiguration>,
    #[serde(default)]
    work_group: Option<String>,
    #[serde(default)]
    statistics: Option<WireStatistics>,
}

impl WireQueryExecution {
    fn into_execution(self) -> EngineResult<QueryExecution> {
        let state = QueryState::parse(&self.status.state).ok_or_else(|| {
            EngineError::Malformed(format!("Unknown query state: {}", self.status.state))
        })?;

        Ok(QueryExecution {
            id: self.query_execution_id,
            state,
            state_change_reason: self.status.state_change_reason,
            submitted_at: self.status.submission_date_time.and_then(epoch_to_datetime),
            completed_at: self.status.completion_date_time.and_then(epoch_to_datetime),
            output_location: self.result_configuration.and_then(|c| c.output_location),
            workgroup: self.work_group,
            statistics: self.statistics.map(|s| QueryStatistics {
                engine_execution_time_ms: s.engine_execution_time_in_millis,
                data_scanned_bytes: s.data_scanned_in_bytes,
                total_execution_time_ms: s.total_execution_time_in_millis,
                queue_time_ms: s.query_queue_time_in_millis,
            }),
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireStatus {
    state: String,
    #[serde(default)]
    state_change_reason: Option<String>,
    #[serde(default)]
    submission_date_time: Option<f64>,
    #[serde(default)]
    completion_date_time: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireResultConfiguration {
    #[serde(default)]
    output_location: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireStatistics {
    #[serde(default)]
    engine_execution_time_in_millis: Option<u64>,
    #[serde(default)]
    data_scanned_in_bytes: Option<u64>,
    #[serde(default)]
    total_execution_time_in_millis: Option<u64>,
    #[serde(default)]
    query_queue_time_in_millis: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueryResultsResponse {
    #[serde(default)]
    result_set: WireResultSet,
    #[serde(default)]
    next_token: Option<String>,
}

impl GetQueryResultsResponse {
    fn into_page(self, limit: u32) -> ResultPage {
        let columns = self
            .result_set
            .result_set_metadata
            .column_info
            .into_iter()
            .map(|c| ColumnInfo::new(c.name, c.column_type))
            .collect();
        let rows = self
            .result_set
            .rows
            .into_iter()
            .map(|row| row.data.into_iter().map(|d| d.var_char_value).collect::<Row>())
            .collect();

        ResultPage {
            columns,
            rows,
            next_token: self.next_token.filter(|t| !t.is_empty()),
            row_limit: limit,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct WireResultSet {
    #[serde(default)]
    rows: Vec<WireRow>,
    #[serde(default)]
    result_set_metadata: WireResultSetMetadata,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct WireResultSetMetadata {
    #[serde(default)]
    column_info: Vec<WireColumnInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireColumnInfo {
    name: String,
    #[serde(rename = "Type", default)]
    column_type: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireRow {
    #[serde(default)]
    data: Vec<WireDatum>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireDatum {
    #[serde(default)]
    var_char_value: Option<String>,
}

#[derive(Deserialize)]
struct AthenaErrorResponse {
    #[serde(rename = "__type", default)]
    error_type: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "Message", default)]
    message_upper: Option<String>,
}
