//! MCP protocol integration tests.
//!
//! Drives the server over an in-memory byte stream the way an MCP client
//! would over stdio.

use super::common::{orders, server, server_with_sleeper, StalledSleeper};
use athena_mcp::athena::{MockAthenaClient, QueryState};
use athena_mcp::server::JsonRpcResponse;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

fn request(id: i64, method: &str, params: Value) -> String {
    let mut line = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
        .to_string();
    line.push('\n');
    line
}

fn call(id: i64, tool: &str, arguments: Value) -> String {
    request(id, "tools/call", json!({ "name": tool, "arguments": arguments }))
}

fn payload(response: &JsonRpcResponse) -> Value {
    let text = response.result.as_ref().unwrap()["content"][0]["text"]
        .as_str()
        .unwrap()
        .to_string();
    serde_json::from_str(&text).unwrap()
}

/// Feeds `input` to a server and collects every response, keyed by id order.
async fn exchange(client: Arc<MockAthenaClient>, input: String) -> Vec<JsonRpcResponse> {
    let (server, _) = server(client);
    let (output, read_side) = tokio::io::duplex(256 * 1024);

    server.run(input.as_bytes(), output).await.unwrap();

    let mut lines = BufReader::new(read_side).lines();
    let mut responses = Vec::new();
    while let Some(line) = lines.next_line().await.unwrap() {
        responses.push(serde_json::from_str::<JsonRpcResponse>(&line).unwrap());
    }
    responses.sort_by_key(|r| r.id.as_i64());
    responses
}

#[tokio::test]
async fn test_session_handshake_and_listing() {
    let input = [
        request(1, "initialize", json!({ "protocolVersion": "2025-03-26" })),
        "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n".to_string(),
        request(2, "tools/list", json!({})),
        request(3, "resources/list", json!({})),
        request(4, "prompts/list", json!({})),
    ]
    .concat();

    let responses = exchange(Arc::new(MockAthenaClient::new()), input).await;

    assert_eq!(responses.len(), 4);
    let init = responses[0].result.as_ref().unwrap();
    assert_eq!(init["protocolVersion"], "2025-03-26");
    assert_eq!(
        responses[1].result.as_ref().unwrap()["tools"]
            .as_array()
            .unwrap()
            .len(),
        2
    );
    assert_eq!(responses[2].result.as_ref().unwrap()["resources"], json!([]));
    assert_eq!(responses[3].result.as_ref().unwrap()["prompts"], json!([]));
}

#[tokio::test]
async fn test_query_then_page_through_results() {
    let (columns, rows) = orders(5);
    let client = Arc::new(MockAthenaClient::new().with_results(columns, rows));

    let input = call(
        1,
        "run_query",
        json!({ "query_string": "SELECT * FROM orders", "wait_for_completion": true }),
    );
    let responses = exchange(client.clone(), input).await;
    let run = payload(&responses[0]);
    assert_eq!(run["state"], "SUCCEEDED");
    assert_eq!(run["results"]["row_count"], 5);
    let execution_id = run["query_execution_id"].as_str().unwrap().to_string();

    let (server, _) = server(client);
    let first = server
        .handle_message(&call(
            2,
            "get_query_results",
            json!({ "query_execution_id": execution_id, "max_results": 3 }),
        ))
        .await
        .unwrap();
    let first = payload(&first);
    assert_eq!(first["row_count"], 2);
    assert_eq!(first["rows"][0], json!(["1", "amer", "0.1"]));

    let second = server
        .handle_message(&call(
            3,
            "get_query_results",
            json!({
                "query_execution_id": execution_id,
                "next_token": first["next_token"],
                "max_results": 3
            }),
        ))
        .await
        .unwrap();
    let second = payload(&second);
    assert_eq!(second["row_count"], 3);
    assert_eq!(second["rows"][2], json!(["5", "amer", "0.5"]));
    assert!(second.get("next_token").is_none());
}

#[tokio::test]
async fn test_tool_errors_are_structured() {
    let client = Arc::new(
        MockAthenaClient::new()
            .with_known_execution("exec-running")
            .with_states([QueryState::Running]),
    );
    let input = [
        call(1, "run_query", json!({ "query_string": "TRUNCATE TABLE orders" })),
        call(2, "get_query_results", json!({ "query_execution_id": "exec-running" })),
        call(3, "run_query", json!({ "wait_for_completion": true })),
    ]
    .concat();

    let responses = exchange(client.clone(), input).await;

    for response in &responses {
        assert!(response.error.is_none());
        assert_eq!(response.result.as_ref().unwrap()["isError"], true);
    }
    assert_eq!(payload(&responses[0])["error"]["reason"], "NOT_READ_ONLY");
    assert_eq!(
        payload(&responses[1])["error"]["kind"],
        "EXECUTION_NOT_SUCCEEDED"
    );
    assert_eq!(payload(&responses[2])["error"]["kind"], "INVALID_ARGUMENTS");
    assert!(client.submissions().is_empty());
}

#[tokio::test]
async fn test_protocol_errors() {
    let input = [
        "this is not json\n".to_string(),
        request(1, "tools/call", json!({ "name": "delete_bucket", "arguments": {} })),
        request(2, "completion/complete", json!({})),
    ]
    .concat();

    let responses = exchange(Arc::new(MockAthenaClient::new()), input).await;
    let codes: Vec<i64> = responses
        .iter()
        .map(|r| r.error.as_ref().unwrap().code)
        .collect();

    // The parse error carries a null id and sorts first
    assert_eq!(codes, vec![-32700, -32602, -32601]);
}

#[tokio::test]
async fn test_ping_is_answered_while_a_query_is_waiting() {
    let client = Arc::new(MockAthenaClient::new().with_states([QueryState::Running]));
    let (server, shutdown) = server_with_sleeper(client, Arc::new(StalledSleeper));
    let (mut client_input, server_input) = tokio::io::duplex(64 * 1024);
    let (server_output, client_output) = tokio::io::duplex(64 * 1024);
    let running = tokio::spawn(server.run(server_input, server_output));

    client_input
        .write_all(
            call(
                1,
                "run_query",
                json!({ "query_string": "SELECT 1", "wait_for_completion": true }),
            )
            .as_bytes(),
        )
        .await
        .unwrap();
    client_input
        .write_all(request(2, "ping", json!({})).as_bytes())
        .await
        .unwrap();

    let mut lines = BufReader::new(client_output).lines();
    let first: JsonRpcResponse =
        serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(first.id, json!(2));

    shutdown.cancel();
    let second: JsonRpcResponse =
        serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(second.id, json!(1));
    assert_eq!(payload(&second)["state"], "RUNNING");

    running.await.unwrap().unwrap();
}
