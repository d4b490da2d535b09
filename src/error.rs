//! Error types for athena-mcp.
//!
//! Defines the main error enum used throughout the server. Every engine
//! interaction site reclassifies lower-level faults into one of these
//! variants, so a tool invocation always ends in a structured response.

use serde_json::json;
use thiserror::Error;

use crate::athena::QueryState;
use crate::safety::Rejection;

/// Main error type for athena-mcp operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// The statement failed the read-only policy and never reached the engine.
    #[error("{0}")]
    ValidationRejected(Rejection),

    /// The engine refused the submission (bad workgroup, malformed SQL, concurrency cap).
    #[error("Query submission failed: {0}")]
    SubmissionFailed(String),

    /// Looking up the execution status failed, even after one local retry.
    #[error("Failed to fetch query status: {0}")]
    StatusFetchFailed(String),

    /// Results were requested for an execution that has not succeeded.
    #[error("Query execution is {state}, results are only available once it has SUCCEEDED{}", reason_suffix(.reason))]
    ExecutionNotSucceeded {
        state: QueryState,
        reason: Option<String>,
    },

    /// The engine does not know the execution id.
    #[error("Query execution not found: {0}")]
    ExecutionNotFound(String),

    /// Fetching a results page failed.
    #[error("Failed to fetch query results: {0}")]
    ResultFetchFailed(String),

    /// Tool arguments were missing or malformed.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Configuration errors (invalid config file, bad output location, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport errors (unreadable stdin, broken stdout).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!(" ({reason})"),
        None => String::new(),
    }
}

impl ServiceError {
    /// Creates a submission error with the given cause.
    pub fn submission(msg: impl Into<String>) -> Self {
        Self::SubmissionFailed(msg.into())
    }

    /// Creates a status fetch error with the given cause.
    pub fn status_fetch(msg: impl Into<String>) -> Self {
        Self::StatusFetchFailed(msg.into())
    }

    /// Creates a result fetch error with the given cause.
    pub fn result_fetch(msg: impl Into<String>) -> Self {
        Self::ResultFetchFailed(msg.into())
    }

    /// Creates an invalid-arguments error with the given message.
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a protocol error with the given message.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the stable machine-readable error kind reported to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ValidationRejected(_) => "VALIDATION_REJECTED",
            Self::SubmissionFailed(_) => "SUBMISSION_FAILED",
            Self::StatusFetchFailed(_) => "STATUS_FETCH_FAILED",
            Self::ExecutionNotSucceeded { .. } => "EXECUTION_NOT_SUCCEEDED",
            Self::ExecutionNotFound(_) => "EXECUTION_NOT_FOUND",
            Self::ResultFetchFailed(_) => "RESULT_FETCH_FAILED",
            Self::InvalidArguments(_) => "INVALID_ARGUMENTS",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Protocol(_) => "PROTOCOL_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the error category as a string for log output.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ValidationRejected(_) => "Validation Error",
            Self::SubmissionFailed(_)
            | Self::StatusFetchFailed(_)
            | Self::ExecutionNotFound(_)
            | Self::ResultFetchFailed(_) => "Engine Error",
            Self::ExecutionNotSucceeded { .. } => "Execution State Error",
            Self::InvalidArguments(_) => "Argument Error",
            Self::Config(_) => "Configuration Error",
            Self::Protocol(_) => "Protocol Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Renders the error as the structured payload returned to tool callers.
    pub fn to_json(&self) -> serde_json::Value {
        let mut error = json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });

        match self {
            Self::ValidationRejected(rejection) => {
                error["reason"] = json!(rejection.code());
                if let Rejection::ForbiddenKeyword(keyword) = rejection {
                    error["keyword"] = json!(keyword);
                }
            }
            Self::ExecutionNotSucceeded { state, reason } => {
                error["current_state"] = json!(state);
                if let Some(reason) = reason {
                    error["state_change_reason"] = json!(reason);
                }
            }
            Self::ExecutionNotFound(id) => {
                error["query_execution_id"] = json!(id);
            }
            _ => {}
        }

        json!({ "error": error })
    }
}

impl From<Rejection> for ServiceError {
    fn from(rejection: Rejection) -> Self {
        Self::ValidationRejected(rejection)
    }
}

/// Result type alias using ServiceError.
pub type Result<T> = std::result::Result<T, ServiceError>;
