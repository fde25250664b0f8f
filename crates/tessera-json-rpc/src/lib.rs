//! # JSON-RPC 2.0 message layer
//!
//! Pure JSON-RPC 2.0 types shared by every Tessera transport. This crate
//! knows nothing about MCP or HTTP: it defines requests, responses,
//! notifications, and error envelopes, plus the framing helper that turns a
//! raw body (one HTTP POST payload or one stdio line) into a typed message.
//!
//! The protocol crate layers MCP semantics on top; transports only ever
//! construct and serialize the types defined here.

pub mod error;
pub mod message;
pub mod notification;
pub mod request;
pub mod response;
pub mod types;

pub use error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
pub use message::{parse_message, IncomingMessage};
pub use notification::JsonRpcNotification;
pub use request::{JsonRpcRequest, RequestParams};
pub use response::{JsonRpcMessage, JsonRpcResponse, ResponseResult};
pub use types::{JsonRpcVersion, RequestId};

/// JSON-RPC 2.0 version string
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes, plus the MCP server-range codes the
/// wire contract uses.
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    /// MCP: requested resource URI is not registered
    pub const RESOURCE_NOT_FOUND: i64 = -32002;
    /// MCP: the client must complete a URL elicitation (auth prompt) first
    pub const URL_ELICITATION_REQUIRED: i64 = -32042;
}
