//! Resource handlers and URI templates.
//!
//! A plain resource is keyed by its exact URI. A resource template carries
//! `{placeholder}` segments compiled to an anchored regex; at read time the
//! transport-visible URI is matched against registered templates and the
//! extracted bindings become handler arguments.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use regex::Regex;
use serde_json::{Map, Value};

use tessera_mcp_protocol::{McpError, McpResult};

type ResourceFn = Arc<dyn Fn() -> BoxFuture<'static, McpResult<Value>> + Send + Sync>;
type TemplateFn =
    Arc<dyn Fn(HashMap<String, String>) -> BoxFuture<'static, McpResult<Value>> + Send + Sync>;

/// A compiled `{placeholder}` URI template.
#[derive(Debug, Clone)]
pub struct UriTemplate {
    pattern: String,
    regex: Regex,
    variables: Vec<String>,
    static_prefix_len: usize,
}

impl UriTemplate {
    pub fn new(pattern: &str) -> McpResult<Self> {
        // Infallible: the pattern is a literal.
        let var_regex = Regex::new(r"\{([^}]+)\}").unwrap();

        let mut variables = Vec::new();
        let mut regex_pattern = regex::escape(pattern);
        for captures in var_regex.captures_iter(pattern) {
            let var_name = captures
                .get(1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            let escaped_var = regex::escape(&format!("{{{}}}", var_name));
            regex_pattern = regex_pattern.replace(&escaped_var, "([^/]+)");
            variables.push(var_name);
        }

        let regex = Regex::new(&format!("^{}$", regex_pattern)).map_err(|e| {
            McpError::InvalidParams(format!("Invalid URI template '{}': {}", pattern, e))
        })?;

        let static_prefix_len = pattern.find('{').unwrap_or(pattern.len());

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            variables,
            static_prefix_len,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Length of the literal text before the first placeholder. When more
    /// than one template matches a URI, the longest static prefix wins.
    pub fn static_prefix_len(&self) -> usize {
        self.static_prefix_len
    }

    pub fn matches(&self, uri: &str) -> bool {
        self.regex.is_match(uri)
    }

    /// Extract placeholder bindings from a URI that matches this template.
    pub fn extract(&self, uri: &str) -> Option<HashMap<String, String>> {
        let captures = self.regex.captures(uri)?;
        let mut bindings = HashMap::new();
        for (i, name) in self.variables.iter().enumerate() {
            if let Some(value) = captures.get(i + 1) {
                bindings.insert(name.clone(), value.as_str().to_string());
            }
        }
        Some(bindings)
    }
}

/// Wraps a function returning the contents of one fixed-URI resource.
pub struct ResourceHandler {
    uri: String,
    name: String,
    description: String,
    mime_type: String,
    tags: Vec<String>,
    func: ResourceFn,
}

impl ResourceHandler {
    pub fn new<F, Fut>(
        uri: impl Into<String>,
        name: impl Into<String>,
        func: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = McpResult<Value>> + Send + 'static,
    {
        let func: ResourceFn = Arc::new(move || Box::pin(func()));
        Self {
            uri: uri.into(),
            name: name.into(),
            description: String::new(),
            mime_type: "text/plain".to_string(),
            tags: Vec::new(),
            func,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
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

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// The MCP-format descriptor published by `resources/list`.
    pub fn descriptor(&self) -> Value {
        serde_json::json!({
            "uri": self.uri,
            "name": self.name,
            "description": self.description,
            "mimeType": self.mime_type,
        })
    }

    /// Invoke the function and wrap its output as a `contents` chunk.
    pub async fn read(&self) -> McpResult<Value> {
        let output = (self.func)()
            .await
            .map_err(|e| wrap_read_error(&self.name, e))?;
        Ok(contents_chunk(&self.uri, &self.mime_type, output))
    }
}

impl std::fmt::Debug for ResourceHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHandler")
            .field("uri", &self.uri)
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// Like [`ResourceHandler`] but keyed by a URI template; placeholder
/// bindings are passed to the function at read time.
pub struct ResourceTemplateHandler {
    template: UriTemplate,
    name: String,
    description: String,
    mime_type: String,
    tags: Vec<String>,
    func: TemplateFn,
}

impl ResourceTemplateHandler {
    pub fn new<F, Fut>(
        pattern: &str,
        name: impl Into<String>,
        func: F,
    ) -> McpResult<Self>
    where
        F: Fn(HashMap<String, String>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = McpResult<Value>> + Send + 'static,
    {
        let func: TemplateFn = Arc::new(move |bindings| Box::pin(func(bindings)));
        Ok(Self {
            template: UriTemplate::new(pattern)?,
            name: name.into(),
            description: String::new(),
            mime_type: "text/plain".to_string(),
            tags: Vec::new(),
            func,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
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

    pub fn pattern(&self) -> &str {
        self.template.pattern()
    }

    pub fn template(&self) -> &UriTemplate {
        &self.template
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// The MCP-format descriptor published by `resources/templates/list`.
    pub fn descriptor(&self) -> Value {
        serde_json::json!({
            "uriTemplate": self.template.pattern(),
            "name": self.name,
            "description": self.description,
            "mimeType": self.mime_type,
        })
    }

    /// Read the resource at a concrete URI matching this template.
    pub async fn read(&self, uri: &str) -> McpResult<Value> {
        let bindings = self
            .template
            .extract(uri)
            .ok_or_else(|| McpError::ResourceNotFound(uri.to_string()))?;
        let output = (self.func)(bindings)
            .await
            .map_err(|e| wrap_read_error(&self.name, e))?;
        Ok(contents_chunk(uri, &self.mime_type, output))
    }
}

impl std::fmt::Debug for ResourceTemplateHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceTemplateHandler")
            .field("pattern", &self.template.pattern())
            .finish()
    }
}

fn wrap_read_error(name: &str, err: McpError) -> McpError {
    match err {
        McpError::Cancelled => McpError::Cancelled,
        other => McpError::handler_failed(name, other),
    }
}

/// Shape a handler's output as one element of a `resources/read` result's
/// `contents` array: strings carry through, anything else is rendered as
/// pretty-printed JSON.
fn contents_chunk(uri: &str, mime_type: &str, output: Value) -> Value {
    let text = match output {
        Value::String(s) => s,
        other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| "null".to_string()),
    };
    let mut chunk = Map::new();
    chunk.insert("uri".to_string(), Value::String(uri.to_string()));
    chunk.insert("mimeType".to_string(), Value::String(mime_type.to_string()));
    chunk.insert("text".to_string(), Value::String(text));
    Value::Object(chunk)
}
