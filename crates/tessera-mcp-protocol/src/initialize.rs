//! The `initialize` handshake: server identity, capability advertisement,
//! and the client's declared capabilities.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::version::ProtocolVersion;

/// Name and version of one protocol participant (the `serverInfo` /
/// `clientInfo` objects).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Implementation {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            title: None,
        }
    }
}

/// Capabilities declared by the client in `initialize`. The server only
/// inspects the three bidirectional ones; everything else is retained
/// verbatim for the session record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elicitation: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<Value>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl ClientCapabilities {
    pub fn supports_sampling(&self) -> bool {
        self.sampling.is_some()
    }

    pub fn supports_elicitation(&self) -> bool {
        self.elicitation.is_some()
    }

    pub fn supports_roots(&self) -> bool {
        self.roots.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    pub list_changed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesCapability {
    pub list_changed: bool,
    pub subscribe: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptsCapability {
    pub list_changed: bool,
}

/// Capabilities the server advertises back in the `initialize` result.
/// Sections are omitted entirely when the corresponding registry is empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Map<String, Value>>,
}

impl ServerCapabilities {
    pub fn with_tools(mut self) -> Self {
        self.tools = Some(ToolsCapability { list_changed: true });
        self
    }

    pub fn with_resources(mut self, subscribe: bool) -> Self {
        self.resources = Some(ResourcesCapability {
            list_changed: true,
            subscribe,
        });
        self
    }

    pub fn with_prompts(mut self) -> Self {
        self.prompts = Some(PromptsCapability { list_changed: true });
        self
    }

    pub fn with_logging(mut self) -> Self {
        self.logging = Some(Value::Object(Map::new()));
        self
    }

    pub fn with_experimental(mut self, experimental: Map<String, Value>) -> Self {
        self.experimental = Some(experimental);
        self
    }
}

/// The `initialize` result payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: ProtocolVersion,
    pub server_info: Implementation,
    pub capabilities: ServerCapabilities,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}
