//! The built server: a protocol handler plus transport entrypoints.
//!
//! The HTTP transport lives in `tessera-http-mcp-server`; it takes the
//! `Arc<McpProtocolHandler>` exposed here. Stdio is served directly.

use std::sync::Arc;

use crate::builder::McpServerBuilder;
use crate::protocol::McpProtocolHandler;
use crate::stdio::StdioTransport;

/// Which transport to serve, usually decided from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Http,
}

impl Transport {
    /// Transport selection per the documented environment contract:
    /// `MCP_TRANSPORT=stdio`, `MCP_STDIO=1`, or `USE_STDIO=1` force stdio;
    /// anything else serves HTTP.
    pub fn from_env() -> Self {
        let truthy = |name: &str| {
            std::env::var(name)
                .map(|v| {
                    let v = v.trim().to_ascii_lowercase();
                    !v.is_empty() && v != "0" && v != "false"
                })
                .unwrap_or(false)
        };
        if std::env::var("MCP_TRANSPORT")
            .map(|v| v.eq_ignore_ascii_case("stdio"))
            .unwrap_or(false)
            || truthy("MCP_STDIO")
            || truthy("USE_STDIO")
        {
            Transport::Stdio
        } else {
            Transport::Http
        }
    }
}

/// A fully assembled MCP server.
#[derive(Clone)]
pub struct McpServer {
    protocol: Arc<McpProtocolHandler>,
}

impl McpServer {
    pub fn new(protocol: Arc<McpProtocolHandler>) -> Self {
        Self { protocol }
    }

    pub fn builder() -> McpServerBuilder {
        McpServerBuilder::new()
    }

    /// The protocol handler, for handing to a transport.
    pub fn protocol(&self) -> Arc<McpProtocolHandler> {
        Arc::clone(&self.protocol)
    }

    /// Serve newline-delimited JSON-RPC on stdin/stdout until EOF.
    pub async fn run_stdio(&self) -> std::io::Result<()> {
        StdioTransport::new(self.protocol()).run().await
    }
}
