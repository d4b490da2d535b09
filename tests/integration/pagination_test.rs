//! Result pagination integration tests.
//!
//! Tests cursor-based paging over a completed execution.

use super::common::orders;
use athena_mcp::athena::{MockAthenaClient, QueryState, Row};
use athena_mcp::error::ServiceError;
use athena_mcp::query::ResultPaginator;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn paginator_over(count: u32) -> (ResultPaginator, Arc<MockAthenaClient>, Vec<Row>) {
    let (columns, rows) = orders(count);
    let client = Arc::new(
        MockAthenaClient::new()
            .with_known_execution("exec-orders")
            .with_results(columns, rows.clone()),
    );
    (ResultPaginator::new(client.clone()), client, rows)
}

#[tokio::test]
async fn test_walking_every_page_returns_each_row_once() {
    let (paginator, client, expected) = paginator_over(25);

    let mut collected = Vec::new();
    let mut token: Option<String> = None;
    let mut pages = 0;
    loop {
        let page = paginator
            .fetch_page("exec-orders", token.as_deref(), Some(10))
            .await
            .unwrap();
        assert!(page.rows.len() <= 10);
        collected.extend(page.rows);
        pages += 1;

        match page.next_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    assert_eq!(collected, expected);
    assert_eq!(pages, 3);
    assert_eq!(client.fetches().len(), 3);
}

#[tokio::test]
async fn test_null_cells_are_preserved() {
    let (paginator, _, _) = paginator_over(3);
    let page = paginator.fetch_page("exec-orders", None, None).await.unwrap();

    assert_eq!(page.rows[2][2], None);
    assert_eq!(page.rows[0][2].as_deref(), Some("0.1"));
}

#[tokio::test]
async fn test_columns_are_reported_on_every_page() {
    let (paginator, _, _) = paginator_over(6);

    let first = paginator
        .fetch_page("exec-orders", None, Some(3))
        .await
        .unwrap();
    let second = paginator
        .fetch_page("exec-orders", first.next_token.as_deref(), Some(3))
        .await
        .unwrap();

    let names: Vec<&str> = second.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["order_id", "region", "discount"]);
    assert_eq!(first.columns, second.columns);
}

#[tokio::test]
async fn test_out_of_range_limits_are_clamped() {
    let (paginator, client, _) = paginator_over(2);

    paginator
        .fetch_page("exec-orders", None, Some(-5))
        .await
        .unwrap();
    paginator
        .fetch_page("exec-orders", None, Some(1_000_000))
        .await
        .unwrap();

    let limits: Vec<u32> = client.fetches().iter().map(|f| f.limit).collect();
    assert_eq!(limits, vec![1, 1000]);
}

#[tokio::test]
async fn test_incomplete_execution_is_refused() {
    let client = Arc::new(
        MockAthenaClient::new()
            .with_known_execution("exec-pending")
            .with_states([QueryState::Queued]),
    );
    let paginator = ResultPaginator::new(client.clone());

    let err = paginator
        .fetch_page("exec-pending", None, None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "EXECUTION_NOT_SUCCEEDED");
    assert_eq!(err.to_json()["error"]["current_state"], "QUEUED");
    assert!(client.fetches().is_empty());
}

#[tokio::test]
async fn test_cancelled_execution_is_refused_with_reason() {
    let client = Arc::new(
        MockAthenaClient::new()
            .with_known_execution("exec-cancelled")
            .with_states([QueryState::Cancelled])
            .with_reason("Query cancelled by user"),
    );
    let paginator = ResultPaginator::new(client);

    let err = paginator
        .fetch_page("exec-cancelled", None, None)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ServiceError::ExecutionNotSucceeded {
            state: QueryState::Cancelled,
            reason: Some("Query cancelled by user".to_string()),
        }
    );
}

#[tokio::test]
async fn test_unknown_execution_is_not_found() {
    let (paginator, _, _) = paginator_over(1);
    let err = paginator
        .fetch_page("does-not-exist", None, None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "EXECUTION_NOT_FOUND");
}
