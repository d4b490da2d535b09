//! Query execution and result types.
//!
//! Defines the structures used to represent executions and result pages
//! returned by the query engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hard upper bound on rows per results page.
pub const MAX_PAGE_ROWS: u32 = 1000;

/// Lifecycle state of a query execution, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl QueryState {
    /// Returns true once the execution can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Returns the state as the engine spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parses an engine state string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "QUEUED" => Some(Self::Queued),
            "RUNNING" => Some(Self::Running),
            "SUCCEEDED" => Some(Self::Succeeded),
            "FAILED" => Some(Self::Failed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution statistics reported alongside the status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStatistics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_execution_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_scanned_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_execution_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_time_ms: Option<u64>,
}

/// A query execution as last observed from the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryExecution {
    /// Engine-assigned execution id.
    pub id: String,

    /// Current lifecycle state.
    pub state: QueryState,

    /// Populated by the engine on FAILED or CANCELLED.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_change_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Where the engine writes the result file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_location: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub workgroup: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<QueryStatistics>,
}

impl QueryExecution {
    /// Creates an execution in the given state with no other details.
    pub fn new(id: impl Into<String>, state: QueryState) -> Self {
        Self {
            id: id.into(),
            state,
            state_change_reason: None,
            submitted_at: None,
            completed_at: None,
            output_location: None,
            workgroup: None,
            statistics: None,
        }
    }

    /// Sets the state change reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.state_change_reason = Some(reason.into());
        self
    }

    /// Sets the output location.
    pub fn with_output_location(mut self, location: impl Into<String>) -> Self {
        self.output_location = Some(location.into());
        self
    }

    /// Returns true if the execution is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Engine type name (varchar, bigint, ...).
    #[serde(rename = "type")]
    pub data_type: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A row of data. The engine returns every cell as text; `None` is NULL.
pub type Row = Vec<Option<String>>;

/// One page of results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPage {
    /// Column metadata for the result set.
    pub columns: Vec<ColumnInfo>,

    /// Rows of data, in engine order.
    pub rows: Vec<Row>,

    /// Opaque continuation token; absent on the final page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,

    /// The row cap this page was requested with.
    pub row_limit: u32,
}

impl ResultPage {
    /// Returns true if no further pages exist.
    pub fn is_final(&self) -> bool {
        self.next_token.is_none()
    }

    /// Returns true if the first row repeats the column names.
    pub fn starts_with_header(&self) -> bool {
        match self.rows.first() {
            Some(first) => {
                !self.columns.is_empty()
                    && first.len() == self.columns.len()
                    && first
                        .iter()
                        .zip(&self.columns)
                        .all(|(cell, column)| cell.as_deref() == Some(column.name.as_str()))
            }
            None => false,
        }
    }
}

/// Clamps a requested row limit into `[1, MAX_PAGE_ROWS]`, defaulting to the maximum.
pub fn clamp_row_limit(requested: Option<i64>) -> u32 {
    match requested {
        None => MAX_PAGE_ROWS,
        Some(n) => n.clamp(1, i64::from(MAX_PAGE_ROWS)) as u32,
    }
}
