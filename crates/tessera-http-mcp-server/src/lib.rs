//! # Streamable HTTP transport
//!
//! Serves a [`tessera_mcp_server::McpProtocolHandler`] over MCP Streamable
//! HTTP: a single endpoint (default `/mcp`) multiplexing the JSON
//! request/response channel and the server-sent-events channel, a
//! companion endpoint (`/mcp/respond`) where clients answer
//! server-initiated requests, and a liveness probe (`/health`).
//!
//! The transport owns the sockets and the per-session queues; everything
//! protocol-shaped is delegated to the handler it wraps.

pub mod config;
pub mod cors;
pub mod endpoint;
pub mod rate_limit;
pub mod server;
pub mod sse;
pub mod streams;

#[cfg(test)]
mod tests;

pub use config::{RateLimitConfig, ServerConfig};
pub use endpoint::McpEndpoint;
pub use rate_limit::RateLimiter;
pub use server::{run, HttpMcpServer};
pub use sse::SseEventKind;
pub use streams::StreamManager;

/// Transport-level errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpMcpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, HttpMcpError>;
