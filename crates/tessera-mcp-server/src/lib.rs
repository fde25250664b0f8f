//! # Tessera MCP server core
//!
//! The dispatch core of the framework: handler objects wrapping user
//! functions, the four registries, session lifecycle, the SSE replay
//! buffer, the long-running task store, the protocol handler that ties
//! them together, and the stdio transport.
//!
//! Transports own a [`McpProtocolHandler`] and feed it parsed JSON-RPC
//! messages; the handler never touches sockets. The HTTP transport lives
//! in `tessera-http-mcp-server` and consumes this crate.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use serde_json::json;
//! use tessera_mcp_server::{McpServer, ToolHandler};
//! use tessera_mcp_protocol::Parameter;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let add = ToolHandler::new("add")?
//!         .with_description("Add two integers")
//!         .with_param(Parameter::integer("a"))
//!         .with_param(Parameter::integer("b"))
//!         .with_function(|args, _ctx| async move {
//!             let a = args["a"].as_i64().unwrap_or(0);
//!             let b = args["b"].as_i64().unwrap_or(0);
//!             Ok(json!(a + b))
//!         });
//!
//!     let server = McpServer::builder()
//!         .name("calculator")
//!         .version("0.1.0")
//!         .tool(add)
//!         .build()?;
//!
//!     server.run_stdio().await?;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod client;
pub mod context;
pub mod events;
pub mod logging;
pub mod oauth;
pub mod prompt;
pub mod protocol;
pub mod registry;
pub mod resource;
pub mod server;
pub mod session;
pub mod stdio;
pub mod tasks;
pub mod tool;

#[cfg(test)]
mod tests;

pub use builder::McpServerBuilder;
pub use client::{ClientChannel, PendingClientRequests};
pub use context::{RequestContext, ToolContext};
pub use events::SseEventBuffer;
pub use oauth::{OAuthDecision, OAuthGate};
pub use prompt::PromptHandler;
pub use protocol::McpProtocolHandler;
pub use registry::Registry;
pub use resource::{ResourceHandler, ResourceTemplateHandler, UriTemplate};
pub use server::{McpServer, Transport};
pub use session::{Session, SessionManager};
pub use stdio::StdioTransport;
pub use tasks::{TaskManager, TaskStatus};
pub use tool::ToolHandler;

pub use tessera_mcp_protocol::{McpError, McpResult};
