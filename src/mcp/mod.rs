//! Tool-calling protocol server
//!
//! - **protocol**: JSON-RPC 2.0 message types
//! - **server**: newline-delimited stdio server exposing one tool per operation

pub mod protocol;
pub mod server;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use server::{tool_descriptors, McpServer};
