//! Live Athena integration tests.
//!
//! These tests talk to a real Athena endpoint using credentials resolved the
//! same way the server resolves them. Set ATHENA_MCP_LIVE_OUTPUT_LOCATION to
//! an S3 prefix you can write to in order to run them.

use athena_mcp::athena::{AthenaClient, AthenaClientConfig, QueryState};
use athena_mcp::config::{Config, ServerSettings, SettingsOverrides};
use athena_mcp::query::{QueryLifecycleController, QueryRequest, ResultPaginator};
use std::sync::Arc;

/// Helper to build a controller and paginator against the live service.
fn live_stack() -> Option<(QueryLifecycleController, ResultPaginator)> {
    let output_location = std::env::var("ATHENA_MCP_LIVE_OUTPUT_LOCATION").ok()?;
    let overrides = SettingsOverrides {
        region: std::env::var("AWS_REGION").ok(),
        output_location: Some(output_location),
        access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
        secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
        session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
        profile: std::env::var("AWS_PROFILE").ok(),
        ..Default::default()
    };
    let settings = ServerSettings::resolve(&overrides, &Config::default()).ok()?;
    let client = AthenaClient::new(
        AthenaClientConfig::new(&settings.region).with_credentials(settings.credentials.clone()),
    )
    .ok()?;
    let client = Arc::new(client);

    let controller =
        QueryLifecycleController::new(client.clone(), settings.defaults, settings.polling);
    Some((controller, ResultPaginator::new(client)))
}

#[tokio::test]
async fn test_live_select_literal() {
    let Some((controller, paginator)) = live_stack() else {
        eprintln!("Skipping test: ATHENA_MCP_LIVE_OUTPUT_LOCATION not set");
        return;
    };

    let execution = controller
        .submit(&QueryRequest::new("SELECT 1 AS one, 'two' AS two").waiting())
        .await
        .unwrap();
    assert_eq!(execution.state, QueryState::Succeeded);
    assert!(execution.statistics.is_some());

    let page = paginator
        .fetch_page(&execution.id, None, None)
        .await
        .unwrap();
    assert_eq!(page.columns.len(), 2);
    assert_eq!(page.columns[0].name, "one");
    assert_eq!(
        page.rows,
        vec![vec![Some("1".to_string()), Some("two".to_string())]]
    );
}

#[tokio::test]
async fn test_live_unknown_execution() {
    let Some((_, paginator)) = live_stack() else {
        eprintln!("Skipping test: ATHENA_MCP_LIVE_OUTPUT_LOCATION not set");
        return;
    };

    let err = paginator
        .fetch_page("00000000-0000-0000-0000-000000000000", None, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "EXECUTION_NOT_FOUND");
}
