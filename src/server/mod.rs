//! MCP server surface: JSON-RPC transport and tool dispatch.

pub mod protocol;
pub mod tools;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpServer};
pub use tools::{
    get_tool_definitions, GetQueryResultsInput, QueryResultsOutput, RunQueryInput,
    RunQueryOutput, ToolDefinition, ToolError, ToolRouter,
};
