//! Mock Athena client for testing.
//!
//! Provides an in-memory engine with a scripted status sequence and a fixed
//! result set, recording every call so tests can assert on engine traffic.

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use super::{
    ColumnInfo, EngineError, EngineResult, QueryExecution, QueryExecutionClient, QueryState,
    ResultPage, Row,
};

const TOKEN_PREFIX: &str = "mock-offset-";

/// A recorded submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSubmission {
    pub statement: String,
    pub workgroup: String,
    pub output_location: String,
}

/// A recorded results fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockFetch {
    pub execution_id: String,
    pub next_token: Option<String>,
    pub limit: u32,
}

#[derive(Debug)]
struct MockState {
    next_id: u64,
    known: HashSet<String>,
    states: VecDeque<QueryState>,
    reason: Option<String>,
    submit_error: Option<EngineError>,
    status_failures: usize,
    fetch_error: Option<EngineError>,
    columns: Vec<ColumnInfo>,
    data: Vec<Row>,
    submissions: Vec<MockSubmission>,
    status_calls: usize,
    fetches: Vec<MockFetch>,
}

/// A mock query engine.
///
/// Every `get_status` call consumes the next scripted state; the last one
/// repeats forever. Results are served from a fixed data set, with a header
/// row on the first page as Athena does.
#[derive(Debug)]
pub struct MockAthenaClient {
    state: Mutex<MockState>,
}

impl MockAthenaClient {
    /// Creates a mock whose executions succeed immediately and return no rows.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_id: 1,
                known: HashSet::new(),
                states: VecDeque::from([QueryState::Succeeded]),
                reason: None,
                submit_error: None,
                status_failures: 0,
                fetch_error: None,
                columns: Vec::new(),
                data: Vec::new(),
                submissions: Vec::new(),
                status_calls: 0,
                fetches: Vec::new(),
            }),
        }
    }

    /// Scripts the sequence of states reported by successive status calls.
    pub fn with_states(self, states: impl IntoIterator<Item = QueryState>) -> Self {
        {
            let mut state = self.lock();
            state.states = states.into_iter().collect();
            if state.states.is_empty() {
                state.states.push_back(QueryState::Succeeded);
            }
        }
        self
    }

    /// Sets the state change reason reported with terminal failure states.
    pub fn with_reason(self, reason: impl Into<String>) -> Self {
        self.lock().reason = Some(reason.into());
        self
    }

    /// Sets the result set served for every execution.
    pub fn with_results(self, columns: Vec<ColumnInfo>, data: Vec<Row>) -> Self {
        {
            let mut state = self.lock();
            state.columns = columns;
            state.data = data;
        }
        self
    }

    /// Makes every submission fail with the given error.
    pub fn with_submit_error(self, error: EngineError) -> Self {
        self.lock().submit_error = Some(error);
        self
    }

    /// Makes the next `count` status calls fail with a transport error.
    pub fn with_status_failures(self, count: usize) -> Self {
        self.lock().status_failures = count;
        self
    }

    /// Makes every results fetch fail with the given error.
    pub fn with_fetch_error(self, error: EngineError) -> Self {
        self.lock().fetch_error = Some(error);
        self
    }

    /// Registers an execution id as if it had been submitted earlier.
    pub fn with_known_execution(self, execution_id: impl Into<String>) -> Self {
        self.lock().known.insert(execution_id.into());
        self
    }

    /// Returns the recorded submissions.
    pub fn submissions(&self) -> Vec<MockSubmission> {
        self.lock().submissions.clone()
    }

    /// Returns the number of status calls made, including failed ones.
    pub fn status_calls(&self) -> usize {
        self.lock().status_calls
    }

    /// Returns the recorded results fetches.
    pub fn fetches(&self) -> Vec<MockFetch> {
        self.lock().fetches.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MockAthenaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryExecutionClient for MockAthenaClient {
    async fn submit(
        &self,
        statement: &str,
        workgroup: &str,
        output_location: &str,
    ) -> EngineResult<String> {
        let mut state = self.lock();
        state.submissions.push(MockSubmission {
            statement: statement.to_string(),
            workgroup: workgroup.to_string(),
            output_location: output_location.to_string(),
        });

        if let Some(error) = &state.submit_error {
            return Err(error.clone());
        }

        let id = format!("mock-execution-{}", state.next_id);
        state.next_id += 1;
        state.known.insert(id.clone());
        Ok(id)
    }

    async fn get_status(&self, execution_id: &str) -> EngineResult<QueryExecution> {
        let mut state = self.lock();
        state.status_calls += 1;

        if state.status_failures > 0 {
            state.status_failures -= 1;
            return Err(EngineError::Transport("connection reset by peer".to_string()));
        }
        if !state.known.contains(execution_id) {
            return Err(EngineError::NotFound(execution_id.to_string()));
        }

        let current = if state.states.len() > 1 {
            state.states.pop_front()
        } else {
            state.states.front().copied()
        }
        .unwrap_or(QueryState::Succeeded);

        let execution = QueryExecution::new(execution_id, current);
        match &state.reason {
            Some(reason) if matches!(current, QueryState::Failed | QueryState::Cancelled) => {
                Ok(execution.with_reason(reason.clone()))
            }
            _ => Ok(execution),
        }
    }

    async fn get_results_page(
        &self,
        execution_id: &str,
        next_token: Option<&str>,
        limit: u32,
    ) -> EngineResult<ResultPage> {
        let mut state = self.lock();
        state.fetches.push(MockFetch {
            execution_id: execution_id.to_string(),
            next_token: next_token.map(String::from),
            limit,
        });

        if let Some(error) = &state.fetch_error {
            return Err(error.clone());
        }
        if !state.known.contains(execution_id) {
            return Err(EngineError::NotFound(execution_id.to_string()));
        }

        let limit = limit as usize;
        let (offset, mut rows) = match next_token {
            None => {
                let header: Row = state.columns.iter().map(|c| Some(c.name.clone())).collect();
                (0, vec![header])
            }
            Some(token) => {
                let offset = token
                    .strip_prefix(TOKEN_PREFIX)
                    .and_then(|n| n.parse::<usize>().ok())
                    .filter(|n| *n <= state.data.len())
                    .ok_or_else(|| {
                        EngineError::service("InvalidRequestException", "Invalid NextToken")
                    })?;
                (offset, Vec::new())
            }
        };

        let take = limit.saturating_sub(rows.len());
        let end = (offset + take).min(state.data.len());
        rows.extend(state.data[offset..end].iter().cloned());

        Ok(ResultPage {
            columns: state.columns.clone(),
            rows,
            next_token: (end < state.data.len()).then(|| format!("{TOKEN_PREFIX}{end}")),
            row_limit: limit as u32,
        })
    }
}
