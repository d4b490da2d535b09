//! Integration tests for athena-mcp.

pub mod common;
pub mod lifecycle_test;
pub mod live_test;
pub mod pagination_test;
pub mod protocol_test;
