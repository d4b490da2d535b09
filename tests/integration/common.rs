//! Shared fixtures for integration tests.

use async_trait::async_trait;
use athena_mcp::athena::{ColumnInfo, MockAthenaClient, Row};
use athena_mcp::config::{PollingConfig, QueryDefaults};
use athena_mcp::query::{QueryLifecycleController, ResultPaginator, Sleeper};
use athena_mcp::server::{McpServer, ToolRouter};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Returns immediately so polling tests run without real delays.
pub struct InstantSleeper;

#[async_trait]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, _duration: Duration) {}
}

/// Never completes, so only shutdown can end a wait.
pub struct StalledSleeper;

#[async_trait]
impl Sleeper for StalledSleeper {
    async fn sleep(&self, _duration: Duration) {
        std::future::pending::<()>().await;
    }
}

pub fn defaults() -> QueryDefaults {
    QueryDefaults {
        workgroup: "analytics".to_string(),
        output_location: "s3://team-results/athena/".to_string(),
    }
}

pub fn polling(max_polls: u32) -> PollingConfig {
    PollingConfig {
        interval: Duration::from_millis(10),
        max_polls,
    }
}

/// An orders table with `count` rows.
pub fn orders(count: u32) -> (Vec<ColumnInfo>, Vec<Row>) {
    let columns = vec![
        ColumnInfo::new("order_id", "bigint"),
        ColumnInfo::new("region", "varchar"),
        ColumnInfo::new("discount", "double"),
    ];
    let rows = (1..=count)
        .map(|n| {
            vec![
                Some(n.to_string()),
                Some(if n % 2 == 0 { "emea" } else { "amer" }.to_string()),
                // Every third order has no discount
                (n % 3 != 0).then(|| format!("0.{n}")),
            ]
        })
        .collect();
    (columns, rows)
}

pub fn controller(client: Arc<MockAthenaClient>, max_polls: u32) -> QueryLifecycleController {
    QueryLifecycleController::new(client, defaults(), polling(max_polls))
        .with_sleeper(Arc::new(InstantSleeper))
}

pub fn server(client: Arc<MockAthenaClient>) -> (McpServer, CancellationToken) {
    server_with_sleeper(client, Arc::new(InstantSleeper))
}

pub fn server_with_sleeper(
    client: Arc<MockAthenaClient>,
    sleeper: Arc<dyn Sleeper>,
) -> (McpServer, CancellationToken) {
    let shutdown = CancellationToken::new();
    let controller = QueryLifecycleController::new(client.clone(), defaults(), polling(100))
        .with_sleeper(sleeper)
        .with_shutdown(shutdown.clone());
    let router = ToolRouter::new(controller, ResultPaginator::new(client));
    (McpServer::new(router, shutdown.clone()), shutdown)
}
