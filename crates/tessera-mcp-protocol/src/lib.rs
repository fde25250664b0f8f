//! # Model Context Protocol wire layer
//!
//! Everything a transport or handler needs to speak MCP without knowing how
//! the bytes move: protocol versions and negotiation, the `initialize`
//! handshake types, content blocks, the parameter model with its
//! validation/coercion rules, opaque pagination cursors, and the domain
//! error enum with its mapping onto JSON-RPC wire codes.
//!
//! Supported protocol revisions: `2025-11-25`, `2025-06-18`, `2025-03-26`.

pub mod content;
pub mod initialize;
pub mod methods;
pub mod pagination;
pub mod params;
pub mod prompts;
pub mod version;

pub use content::{Annotations, ContentBlock, ResourceContents, Role};
pub use initialize::{
    ClientCapabilities, Implementation, InitializeResult, PromptsCapability, ResourcesCapability,
    ServerCapabilities, ToolsCapability,
};
pub use pagination::{decode_cursor, encode_cursor, paginate, DEFAULT_PAGE_SIZE};
pub use params::{build_input_schema, validate_arguments, ParamKind, Parameter};
pub use prompts::{prompt_output_to_messages, PromptMessage};
pub use version::ProtocolVersion;

use tessera_json_rpc::{JsonRpcErrorCode, JsonRpcErrorObject};

/// Common result type for MCP operations.
pub type McpResult<T> = Result<T, McpError>;

/// Domain errors for MCP operations.
///
/// Every variant maps onto exactly one wire code via [`McpError::to_error_object`];
/// handlers return these and the dispatch boundary owns the conversion.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("{0}")]
    UnknownTool(String),

    #[error("Unknown prompt: {0}")]
    UnknownPrompt(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("{0}")]
    MissingParameter(String),

    #[error("Invalid parameter type for '{param}': expected {expected}, got {actual}")]
    InvalidParameterType {
        param: String,
        expected: String,
        actual: String,
    },

    #[error("Method '{0}' not found")]
    MethodNotFound(String),

    #[error("Bad Request: Missing session ID")]
    MissingSession,

    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Tool '{0}' requires OAuth authorization; authenticate first")]
    OAuthRequired(String),

    #[error("OAuth is not configured")]
    OAuthNotConfigured,

    #[error("external provider token is missing")]
    ExternalTokenMissing,

    #[error("OAuth validation failed: {0}")]
    OAuthValidationFailed(String),

    #[error("{message}")]
    UrlElicitationRequired { message: String, url: String },

    #[error("cancelled")]
    Cancelled,

    #[error("Timeout waiting for client response to request {0}")]
    ClientResponseTimeout(String),

    #[error("Too many outstanding server-to-client requests (max {0})")]
    TooManyClientRequests(usize),

    #[error("Client did not advertise the '{0}' capability")]
    CapabilityNotSupported(String),

    #[error("{0}")]
    ToolExecution(String),

    #[error("{0}")]
    Internal(String),
}

impl McpError {
    /// Execution failure of a named handler, formatted as the wire contract
    /// requires: `"<handler-name>: <original text>"`.
    pub fn handler_failed(name: &str, err: impl std::fmt::Display) -> Self {
        McpError::ToolExecution(format!("{}: {}", name, err))
    }

    /// Convert to the JSON-RPC error object this error puts on the wire.
    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        let code = match self {
            McpError::UnknownTool(_)
            | McpError::UnknownPrompt(_)
            | McpError::UnknownTask(_)
            | McpError::InvalidParams(_)
            | McpError::MissingParameter(_)
            | McpError::InvalidParameterType { .. } => JsonRpcErrorCode::InvalidParams,
            McpError::ResourceNotFound(_) => JsonRpcErrorCode::ResourceNotFound,
            McpError::MethodNotFound(_) => JsonRpcErrorCode::MethodNotFound,
            McpError::MissingSession
            | McpError::UnknownSession(_)
            | McpError::InvalidRequest(_) => JsonRpcErrorCode::InvalidRequest,
            McpError::UrlElicitationRequired { .. } => JsonRpcErrorCode::UrlElicitationRequired,
            McpError::OAuthRequired(_)
            | McpError::OAuthNotConfigured
            | McpError::ExternalTokenMissing
            | McpError::OAuthValidationFailed(_)
            | McpError::Cancelled
            | McpError::ClientResponseTimeout(_)
            | McpError::TooManyClientRequests(_)
            | McpError::CapabilityNotSupported(_)
            | McpError::ToolExecution(_)
            | McpError::Internal(_) => JsonRpcErrorCode::InternalError,
        };

        let object = JsonRpcErrorObject::new(code, self.to_string());
        match self {
            McpError::UrlElicitationRequired { url, .. } => {
                object.with_data(serde_json::json!({ "url": url }))
            }
            _ => object,
        }
    }
}
