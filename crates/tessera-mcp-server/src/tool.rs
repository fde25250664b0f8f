//! Tool handlers: a named, schematized async function plus its cached MCP
//! descriptor.

use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use tessera_mcp_protocol::content::Annotations;
use tessera_mcp_protocol::params::{build_input_schema, validate_arguments, Parameter};
use tessera_mcp_protocol::{McpError, McpResult};

use crate::context::ToolContext;

type ToolFn =
    Arc<dyn Fn(Map<String, Value>, ToolContext) -> BoxFuture<'static, McpResult<Value>> + Send + Sync>;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Infallible: the pattern is a literal.
        Regex::new(r"^[A-Za-z0-9_\-.]{1,128}$").unwrap()
    })
}

/// Wraps one user-provided tool function together with its name, schema,
/// tags, and authorization flags.
///
/// The MCP-format descriptor (and its serialized bytes) are cached because
/// clients poll `tools/list` aggressively; both are invalidated together
/// whenever any attribute changes.
pub struct ToolHandler {
    name: String,
    description: String,
    params: Vec<Parameter>,
    tags: Vec<String>,
    requires_auth: bool,
    auth_scopes: Vec<String>,
    annotations: Option<Annotations>,
    func: Option<ToolFn>,
    descriptor: RwLock<Option<(Value, Bytes)>>,
}

impl ToolHandler {
    /// Create a handler. Names are case-sensitive and must match
    /// `^[A-Za-z0-9_\-.]{1,128}$`.
    pub fn new(name: impl Into<String>) -> McpResult<Self> {
        let name = name.into();
        if !name_pattern().is_match(&name) {
            return Err(McpError::InvalidParams(format!(
                "Invalid tool name '{}': must match ^[A-Za-z0-9_\\-.]{{1,128}}$",
                name
            )));
        }
        Ok(Self {
            name,
            description: String::new(),
            params: Vec::new(),
            tags: Vec::new(),
            requires_auth: false,
            auth_scopes: Vec::new(),
            annotations: None,
            func: None,
            descriptor: RwLock::new(None),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self.invalidate_descriptor();
        self
    }

    pub fn with_param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self.invalidate_descriptor();
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

    /// Require OAuth authorization, optionally scoped.
    pub fn with_auth<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires_auth = true;
        self.auth_scopes = scopes.into_iter().map(Into::into).collect();
        self.invalidate_descriptor();
        self
    }

    /// Default annotations stamped on every content element this tool
    /// produces.
    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = Some(annotations);
        self.invalidate_descriptor();
        self
    }

    /// Attach the user function. It receives the validated/coerced
    /// arguments and the request-scoped [`ToolContext`].
    pub fn with_function<F, Fut>(mut self, func: F) -> Self
    where
        F: Fn(Map<String, Value>, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = McpResult<Value>> + Send + 'static,
    {
        let func: ToolFn = Arc::new(move |args, ctx| Box::pin(func(args, ctx)));
        self.func = Some(func);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn requires_auth(&self) -> bool {
        self.requires_auth
    }

    pub fn auth_scopes(&self) -> &[String] {
        &self.auth_scopes
    }

    pub fn annotations(&self) -> Option<&Annotations> {
        self.annotations.as_ref()
    }

    fn invalidate_descriptor(&self) {
        *self.descriptor.write() = None;
    }

    fn build_descriptor(&self) -> (Value, Bytes) {
        let mut descriptor = Map::new();
        descriptor.insert("name".to_string(), Value::String(self.name.clone()));
        descriptor.insert(
            "description".to_string(),
            Value::String(self.description.clone()),
        );
        descriptor.insert("inputSchema".to_string(), build_input_schema(&self.params));
        let value = Value::Object(descriptor);
        let bytes = Bytes::from(serde_json::to_vec(&value).unwrap_or_default());
        (value, bytes)
    }

    /// The MCP-format descriptor published by `tools/list`.
    pub fn descriptor(&self) -> Value {
        if let Some((value, _)) = self.descriptor.read().as_ref() {
            return value.clone();
        }
        let built = self.build_descriptor();
        let value = built.0.clone();
        *self.descriptor.write() = Some(built);
        value
    }

    /// Serialized descriptor bytes, cached alongside the JSON form.
    pub fn descriptor_bytes(&self) -> Bytes {
        if let Some((_, bytes)) = self.descriptor.read().as_ref() {
            return bytes.clone();
        }
        let built = self.build_descriptor();
        let bytes = built.1.clone();
        *self.descriptor.write() = Some(built);
        bytes
    }

    /// Validate and coerce `arguments`, then invoke the user function.
    ///
    /// Parameter failures surface unchanged (they carry the invalid-params
    /// wire code); failures from the user function are wrapped as
    /// `"<tool-name>: <original text>"` execution errors. Cancellation
    /// passes through untouched.
    pub async fn execute(
        &self,
        arguments: &Map<String, Value>,
        ctx: ToolContext,
    ) -> McpResult<Value> {
        let validated = validate_arguments(&self.params, arguments)?;
        let func = self
            .func
            .as_ref()
            .ok_or_else(|| McpError::Internal(format!("Tool '{}' has no function", self.name)))?;
        match (func)(validated, ctx).await {
            Ok(value) => Ok(value),
            Err(McpError::Cancelled) => Err(McpError::Cancelled),
            Err(err @ McpError::UrlElicitationRequired { .. }) => Err(err),
            Err(err) => Err(McpError::handler_failed(&self.name, err)),
        }
    }
}

impl std::fmt::Debug for ToolHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolHandler")
            .field("name", &self.name)
            .field("params", &self.params.len())
            .field("requires_auth", &self.requires_auth)
            .finish()
    }
}
