//! Prompt handlers.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use tessera_mcp_protocol::params::{validate_arguments, Parameter};
use tessera_mcp_protocol::prompts::{prompt_argument_descriptor, prompt_output_to_messages};
use tessera_mcp_protocol::{McpError, McpResult};

type PromptFn =
    Arc<dyn Fn(Map<String, Value>) -> BoxFuture<'static, McpResult<Value>> + Send + Sync>;

/// Wraps a function that generates prompt messages.
///
/// The function may return a plain string, a messages array, or a
/// `{messages: [...]}` object; translation to the `prompts/get` result
/// shape happens here.
pub struct PromptHandler {
    name: String,
    description: String,
    params: Vec<Parameter>,
    tags: Vec<String>,
    func: PromptFn,
}

impl PromptHandler {
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = McpResult<Value>> + Send + 'static,
    {
        let func: PromptFn = Arc::new(move |args| Box::pin(func(args)));
        Self {
            name: name.into(),
            description: String::new(),
            params: Vec::new(),
            tags: Vec::new(),
            func,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// The MCP-format descriptor published by `prompts/list`.
    pub fn descriptor(&self) -> Value {
        let arguments: Vec<Value> = self
            .params
            .iter()
            .filter(|p| !p.is_hidden())
            .map(|p| prompt_argument_descriptor(&p.name, p.description.as_deref(), p.required))
            .collect();
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "arguments": arguments,
        })
    }

    /// Validate arguments, invoke the function, and shape the result as a
    /// `prompts/get` payload.
    pub async fn get(&self, arguments: &Map<String, Value>) -> McpResult<Value> {
        let validated = validate_arguments(&self.params, arguments)?;
        let output = (self.func)(validated).await.map_err(|e| match e {
            McpError::Cancelled => McpError::Cancelled,
            other => McpError::handler_failed(&self.name, other),
        })?;

        let messages = prompt_output_to_messages(output);
        let mut result = Map::new();
        if !self.description.is_empty() {
            result.insert(
                "description".to_string(),
                Value::String(self.description.clone()),
            );
        }
        result.insert("messages".to_string(), Value::Array(messages));
        Ok(Value::Object(result))
    }
}

impl std::fmt::Debug for PromptHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptHandler")
            .field("name", &self.name)
            .field("params", &self.params.len())
            .finish()
    }
}
