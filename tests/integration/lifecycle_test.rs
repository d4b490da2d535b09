//! Query lifecycle integration tests.
//!
//! Tests validation, submission and polling through the public API.

use super::common::{controller, orders};
use athena_mcp::athena::{EngineError, MockAthenaClient, QueryState};
use athena_mcp::error::ServiceError;
use athena_mcp::query::{QueryRequest, ResultPaginator};
use athena_mcp::safety::Rejection;
use athena_mcp::server::{RunQueryInput, ToolRouter};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn router(client: Arc<MockAthenaClient>) -> ToolRouter {
    ToolRouter::new(controller(client.clone(), 100), ResultPaginator::new(client))
}

fn input(query: &str, wait: bool) -> RunQueryInput {
    RunQueryInput {
        query_string: query.to_string(),
        workgroup: None,
        output_location: None,
        wait_for_completion: wait,
    }
}

#[test]
fn test_read_only_statements_are_submitted() {
    let client = Arc::new(MockAthenaClient::new());
    let controller = controller(client.clone(), 100);

    tokio_test::block_on(async {
        for statement in [
            "select * from orders",
            "  WITH recent AS (SELECT 1) SELECT * FROM recent",
            "SHOW TABLES",
            "describe orders",
            "EXPLAIN SELECT 1",
        ] {
            assert_ok!(controller.submit(&QueryRequest::new(statement)).await);
        }
    });

    assert_eq!(client.submissions().len(), 5);
}

#[tokio::test]
async fn test_write_statements_are_never_submitted() {
    let client = Arc::new(MockAthenaClient::new());
    let controller = controller(client.clone(), 100);

    for statement in [
        "",
        "   ",
        "INSERT INTO orders VALUES (1)",
        "CREATE TABLE t AS SELECT 1",
        "MSCK REPAIR TABLE orders",
        "SELECT * FROM orders; DROP TABLE orders",
        "WITH x AS (SELECT 1) DELETE FROM orders",
    ] {
        let err = assert_err!(controller.submit(&QueryRequest::new(statement)).await);
        assert_eq!(err.kind(), "VALIDATION_REJECTED", "statement: {statement:?}");
    }

    assert!(client.submissions().is_empty());
}

#[tokio::test]
async fn test_forbidden_keyword_is_named() {
    let client = Arc::new(MockAthenaClient::new());
    let err = controller(client, 100)
        .submit(&QueryRequest::new("SELECT * FROM t WHERE 1=1 UNION SELECT * FROM t; ALTER TABLE t"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ServiceError::ValidationRejected(Rejection::ForbiddenKeyword("ALTER"))
    );
    assert_eq!(err.to_json()["error"]["keyword"], "ALTER");
}

#[tokio::test]
async fn test_identifiers_containing_keywords_are_allowed() {
    let client = Arc::new(MockAthenaClient::new());
    let result = controller(client.clone(), 100)
        .submit(&QueryRequest::new(
            "SELECT created_at, updated_by, dropped_count FROM insertions",
        ))
        .await;

    assert_ok!(result);
    assert_eq!(client.submissions().len(), 1);
}

#[tokio::test]
async fn test_run_query_without_wait_reports_result_file() {
    let client = Arc::new(MockAthenaClient::new());
    let output = router(client.clone())
        .run_query(input("SELECT 1", false))
        .await
        .unwrap();

    assert_eq!(output.state, QueryState::Queued);
    assert_eq!(output.workgroup.as_deref(), Some("analytics"));
    assert_eq!(
        output.output_location.as_deref(),
        Some("s3://team-results/athena/mock-execution-1.csv")
    );
    assert_eq!(client.status_calls(), 0);
}

#[tokio::test]
async fn test_run_query_with_wait_attaches_rows() {
    let (columns, rows) = orders(4);
    let client = Arc::new(
        MockAthenaClient::new()
            .with_states([QueryState::Queued, QueryState::Running, QueryState::Succeeded])
            .with_results(columns.clone(), rows.clone()),
    );

    let output = router(client)
        .run_query(input("SELECT * FROM orders", true))
        .await
        .unwrap();

    assert_eq!(output.state, QueryState::Succeeded);
    let results = output.results.unwrap();
    assert_eq!(results.columns, columns);
    assert_eq!(results.rows, rows);
    assert_eq!(results.row_count, 4);
    assert!(output.results_error.is_none());
}

#[tokio::test]
async fn test_run_query_with_wait_reports_failure_reason() {
    let client = Arc::new(
        MockAthenaClient::new()
            .with_states([QueryState::Running, QueryState::Failed])
            .with_reason("TABLE_NOT_FOUND: Table 'orders' does not exist"),
    );

    let output = router(client.clone())
        .run_query(input("SELECT * FROM orders", true))
        .await
        .unwrap();

    assert_eq!(output.state, QueryState::Failed);
    assert_eq!(
        output.state_change_reason.as_deref(),
        Some("TABLE_NOT_FOUND: Table 'orders' does not exist")
    );
    assert!(output.results.is_none());
    assert!(client.fetches().is_empty());
}

#[tokio::test]
async fn test_results_fetch_failure_does_not_hide_execution() {
    let client = Arc::new(
        MockAthenaClient::new()
            .with_fetch_error(EngineError::Transport("connection closed".to_string())),
    );

    let output = router(client)
        .run_query(input("SELECT 1", true))
        .await
        .unwrap();

    assert_eq!(output.state, QueryState::Succeeded);
    assert!(output.results.is_none());
    assert_eq!(output.results_error.unwrap()["kind"], "RESULT_FETCH_FAILED");
}

#[tokio::test]
async fn test_poll_budget_bounds_status_calls() {
    let client = Arc::new(MockAthenaClient::new().with_states([QueryState::Running]));
    let execution = controller(client.clone(), 7)
        .submit(&QueryRequest::new("SELECT 1").waiting())
        .await
        .unwrap();

    assert_eq!(execution.state, QueryState::Running);
    assert_eq!(client.status_calls(), 7);
}

#[tokio::test]
async fn test_submission_failure() {
    let client = Arc::new(MockAthenaClient::new().with_submit_error(EngineError::service(
        "InvalidRequestException",
        "WorkGroup analytics is not found",
    )));

    let err = controller(client, 100)
        .submit(&QueryRequest::new("SELECT 1"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "SUBMISSION_FAILED");
    assert!(err.to_string().contains("WorkGroup analytics is not found"));
}
