//! Builder for assembling a server.
//!
//! Registrations are buffered here and transferred into the protocol
//! handler at `build()` time; the built server owns everything and there
//! is no process-global registry.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use tessera_mcp_protocol::{Implementation, McpResult};

use crate::client::DEFAULT_MAX_OUTSTANDING;
use crate::events::DEFAULT_BUFFER_SIZE;
use crate::oauth::OAuthGate;
use crate::prompt::PromptHandler;
use crate::protocol::McpProtocolHandler;
use crate::resource::{ResourceHandler, ResourceTemplateHandler};
use crate::server::McpServer;
use crate::session::{DEFAULT_MAX_AGE, DEFAULT_MAX_SESSIONS};
use crate::tool::ToolHandler;

pub struct McpServerBuilder {
    name: String,
    version: String,
    instructions: Option<String>,
    experimental: Option<Map<String, Value>>,
    tools: Vec<ToolHandler>,
    resources: Vec<ResourceHandler>,
    templates: Vec<ResourceTemplateHandler>,
    prompts: Vec<PromptHandler>,
    oauth_gate: Option<Arc<dyn OAuthGate>>,
    max_sessions: usize,
    session_max_age: Duration,
    sse_buffer_size: usize,
    max_client_requests: usize,
}

impl McpServerBuilder {
    pub fn new() -> Self {
        Self {
            name: "tessera-mcp-server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
            experimental: None,
            tools: Vec::new(),
            resources: Vec::new(),
            templates: Vec::new(),
            prompts: Vec::new(),
            oauth_gate: None,
            max_sessions: DEFAULT_MAX_SESSIONS,
            session_max_age: DEFAULT_MAX_AGE,
            sse_buffer_size: DEFAULT_BUFFER_SIZE,
            max_client_requests: DEFAULT_MAX_OUTSTANDING,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Instructions surfaced to clients in the `initialize` result.
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn experimental(mut self, experimental: Map<String, Value>) -> Self {
        self.experimental = Some(experimental);
        self
    }

    pub fn tool(mut self, tool: ToolHandler) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn resource(mut self, resource: ResourceHandler) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn resource_template(mut self, template: ResourceTemplateHandler) -> Self {
        self.templates.push(template);
        self
    }

    pub fn prompt(mut self, prompt: PromptHandler) -> Self {
        self.prompts.push(prompt);
        self
    }

    pub fn oauth_gate(mut self, gate: Arc<dyn OAuthGate>) -> Self {
        self.oauth_gate = Some(gate);
        self
    }

    pub fn max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    pub fn session_max_age(mut self, max_age: Duration) -> Self {
        self.session_max_age = max_age;
        self
    }

    pub fn sse_buffer_size(mut self, size: usize) -> Self {
        self.sse_buffer_size = size;
        self
    }

    pub fn max_client_requests(mut self, max: usize) -> Self {
        self.max_client_requests = max;
        self
    }

    pub fn build(self) -> McpResult<McpServer> {
        let mut protocol = McpProtocolHandler::with_limits(
            Implementation::new(self.name, self.version),
            self.max_sessions,
            self.session_max_age,
            self.sse_buffer_size,
            self.max_client_requests,
        );
        if let Some(instructions) = self.instructions {
            protocol.set_instructions(instructions);
        }
        if let Some(experimental) = self.experimental {
            protocol.set_experimental(experimental);
        }
        if let Some(gate) = self.oauth_gate {
            protocol.set_oauth_gate(gate);
        }

        for tool in self.tools {
            protocol.register_tool(tool);
        }
        for resource in self.resources {
            protocol.register_resource(resource);
        }
        for template in self.templates {
            protocol.register_template(template);
        }
        for prompt in self.prompts {
            protocol.register_prompt(prompt);
        }

        Ok(McpServer::new(Arc::new(protocol)))
    }
}

impl Default for McpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
