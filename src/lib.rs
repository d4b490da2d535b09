//! athena-mcp - MCP server for read-only Amazon Athena queries.
//!
//! This library exposes the core modules for use by the binary and in
//! integration tests.

pub mod athena;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod query;
pub mod safety;
pub mod server;
