//! The protocol handler: JSON-RPC method dispatch over the registries,
//! session manager, event buffer, task manager, and the server→client
//! request table.
//!
//! Transports parse bytes into JSON-RPC messages and call
//! [`McpProtocolHandler::handle_request`] /
//! [`McpProtocolHandler::handle_notification`]; everything protocol-shaped
//! happens here. The handler never writes to a socket: server→client
//! traffic goes through the [`ClientChannel`] the transport attached to
//! the request scope.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tessera_json_rpc::{JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, RequestId};
use tessera_mcp_protocol::content::tool_output_to_annotated_content;
use tessera_mcp_protocol::{
    methods, paginate, ClientCapabilities, Implementation, InitializeResult, McpError, McpResult,
    ProtocolVersion, ServerCapabilities, DEFAULT_PAGE_SIZE,
};

use crate::client::{id_key, PendingClientRequests};
use crate::context::{RequestContext, ToolContext};
use crate::events::SseEventBuffer;
use crate::oauth::OAuthGate;
use crate::prompt::PromptHandler;
use crate::registry::Registry;
use crate::resource::{ResourceHandler, ResourceTemplateHandler};
use crate::session::SessionManager;
use crate::tasks::{TaskManager, TaskStatus};
use crate::tool::ToolHandler;

/// Cap on argument keys in a single `tools/call`.
pub const MAX_ARGUMENT_KEYS: usize = 100;

const LOG_LEVELS: [&str; 8] = [
    "debug",
    "info",
    "notice",
    "warning",
    "error",
    "critical",
    "alert",
    "emergency",
];

type SessionBroadcast = Box<dyn Fn(&str, Value) + Send + Sync>;

/// Tracks in-flight requests and their cancellation handles. Shared with
/// the session manager so in-flight sessions count as protected.
#[derive(Default)]
pub(crate) struct InFlightTable {
    map: Mutex<HashMap<String, InFlightEntry>>,
}

struct InFlightEntry {
    token: CancellationToken,
    session_id: Option<String>,
}

impl InFlightTable {
    fn insert(&self, key: String, token: CancellationToken, session_id: Option<String>) {
        self.map.lock().insert(key, InFlightEntry { token, session_id });
    }

    fn remove(&self, key: &str) {
        self.map.lock().remove(key);
    }

    /// Fire the cancellation handle for a request, if still tracked.
    pub(crate) fn cancel(&self, key: &str) -> bool {
        match self.map.lock().get(key) {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    fn protected_sessions(&self) -> HashSet<String> {
        self.map
            .lock()
            .values()
            .filter_map(|entry| entry.session_id.clone())
            .collect()
    }
}

/// The dispatch core. Owns all protocol state; shared across transports
/// behind an `Arc`.
pub struct McpProtocolHandler {
    server_info: Implementation,
    instructions: Option<String>,
    experimental: Option<Map<String, Value>>,
    tools: Registry<ToolHandler>,
    resources: Registry<ResourceHandler>,
    templates: Registry<ResourceTemplateHandler>,
    prompts: Registry<PromptHandler>,
    sessions: SessionManager,
    events: Arc<SseEventBuffer>,
    tasks: TaskManager,
    client_requests: Arc<PendingClientRequests>,
    in_flight: Arc<InFlightTable>,
    oauth_gate: RwLock<Option<Arc<dyn OAuthGate>>>,
    session_broadcast: RwLock<Option<SessionBroadcast>>,
    page_size: usize,
    log_level: RwLock<String>,
}

impl McpProtocolHandler {
    pub fn new(server_info: Implementation) -> Self {
        Self::with_limits(
            server_info,
            crate::session::DEFAULT_MAX_SESSIONS,
            crate::session::DEFAULT_MAX_AGE,
            crate::events::DEFAULT_BUFFER_SIZE,
            crate::client::DEFAULT_MAX_OUTSTANDING,
        )
    }

    pub fn with_limits(
        server_info: Implementation,
        max_sessions: usize,
        session_max_age: Duration,
        sse_buffer_size: usize,
        max_client_requests: usize,
    ) -> Self {
        let in_flight = Arc::new(InFlightTable::default());
        let events = Arc::new(SseEventBuffer::new(sse_buffer_size));

        let sessions = SessionManager::new(max_sessions, session_max_age);
        let provider_table = Arc::clone(&in_flight);
        sessions.set_protected_provider(move || provider_table.protected_sessions());
        let evict_events = Arc::clone(&events);
        sessions.on_evict(move |session_id| evict_events.drop_session(session_id));

        Self {
            server_info,
            instructions: None,
            experimental: None,
            tools: Registry::new(),
            resources: Registry::new(),
            templates: Registry::new(),
            prompts: Registry::new(),
            sessions,
            events,
            tasks: TaskManager::new(),
            client_requests: Arc::new(PendingClientRequests::new(max_client_requests)),
            in_flight,
            oauth_gate: RwLock::new(None),
            session_broadcast: RwLock::new(None),
            page_size: DEFAULT_PAGE_SIZE,
            log_level: RwLock::new("info".to_string()),
        }
    }

    // ------------------------------------------------------------------
    // Registration and wiring
    // ------------------------------------------------------------------

    pub fn set_instructions(&mut self, instructions: impl Into<String>) {
        self.instructions = Some(instructions.into());
    }

    pub fn set_experimental(&mut self, experimental: Map<String, Value>) {
        self.experimental = Some(experimental);
    }

    pub fn set_oauth_gate(&self, gate: Arc<dyn OAuthGate>) {
        *self.oauth_gate.write() = Some(gate);
    }

    pub fn register_tool(&self, tool: ToolHandler) {
        let key = tool.name().to_string();
        let tags = tool.tags().to_vec();
        self.tools.register(key, Arc::new(tool), &tags);
    }

    pub fn register_resource(&self, resource: ResourceHandler) {
        let key = resource.uri().to_string();
        let tags = resource.tags().to_vec();
        self.resources.register(key, Arc::new(resource), &tags);
    }

    pub fn register_template(&self, template: ResourceTemplateHandler) {
        let key = template.pattern().to_string();
        let tags = template.tags().to_vec();
        self.templates.register(key, Arc::new(template), &tags);
    }

    pub fn register_prompt(&self, prompt: PromptHandler) {
        let key = prompt.name().to_string();
        let tags = prompt.tags().to_vec();
        self.prompts.register(key, Arc::new(prompt), &tags);
    }

    pub fn tools(&self) -> &Registry<ToolHandler> {
        &self.tools
    }

    pub fn resources(&self) -> &Registry<ResourceHandler> {
        &self.resources
    }

    pub fn templates(&self) -> &Registry<ResourceTemplateHandler> {
        &self.templates
    }

    pub fn prompts(&self) -> &Registry<PromptHandler> {
        &self.prompts
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    /// Install the transport hook used for server-initiated notifications
    /// when no per-request channel is attached (e.g. the persistent GET
    /// stream).
    pub fn set_session_broadcast<F>(&self, broadcast: F)
    where
        F: Fn(&str, Value) + Send + Sync + 'static,
    {
        *self.session_broadcast.write() = Some(Box::new(broadcast));
    }

    /// Register a transport cleanup hook run whenever a session is evicted
    /// or terminated.
    pub fn on_session_evict<F>(&self, hook: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.sessions.on_evict(hook);
    }

    // ------------------------------------------------------------------
    // Transport-facing session and event helpers
    // ------------------------------------------------------------------

    pub fn session_exists(&self, session_id: &str) -> bool {
        self.sessions.exists(session_id)
    }

    pub fn session_protocol_version(&self, session_id: &str) -> Option<&'static str> {
        self.sessions
            .get(session_id)
            .map(|s| s.protocol_version.as_str())
    }

    pub fn terminate_session(&self, session_id: &str) -> bool {
        self.sessions.terminate(session_id)
    }

    pub fn cleanup_expired_sessions(&self, max_age: Duration) {
        self.sessions.cleanup_expired(max_age);
    }

    pub fn next_sse_event_id(&self, session_id: &str) -> u64 {
        self.events.next_event_id(session_id)
    }

    pub fn buffer_sse_event(&self, session_id: &str, event_id: u64, payload: Value) {
        self.events.buffer_event(session_id, event_id, payload);
    }

    /// Buffered events past `last_event_id`, or `None` when the session is
    /// unknown.
    pub fn missed_events(&self, session_id: &str, last_event_id: u64) -> Option<Vec<(u64, Value)>> {
        if !self.sessions.exists(session_id) {
            return None;
        }
        Some(self.events.events_after(session_id, last_event_id))
    }

    /// Resolve a pending server→client request with the reply the client
    /// POSTed to the companion endpoint.
    pub fn resolve_client_response(&self, request_id: &str, body: Value) -> bool {
        self.client_requests.resolve(request_id, body)
    }

    /// The info document served for a plain GET on the MCP endpoint.
    pub fn server_descriptor(&self) -> Value {
        serde_json::json!({
            "name": self.server_info.name,
            "version": self.server_info.version,
            "protocol": format!("MCP {} (Streamable HTTP)", ProtocolVersion::LATEST),
            "status": "ready",
            "tools": self.tools.len(),
            "resources": self.resources.len(),
        })
    }

    /// Capabilities advertised in `initialize`, derived from what has been
    /// registered.
    pub fn capabilities(&self) -> ServerCapabilities {
        let mut capabilities = ServerCapabilities::default().with_logging();
        if !self.tools.is_empty() {
            capabilities = capabilities.with_tools();
        }
        if !self.resources.is_empty() || !self.templates.is_empty() {
            capabilities = capabilities.with_resources(true);
        }
        if !self.prompts.is_empty() {
            capabilities = capabilities.with_prompts();
        }
        if let Some(experimental) = &self.experimental {
            capabilities = capabilities.with_experimental(experimental.clone());
        }
        capabilities
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Process one request. Returns the response message plus the id of a
    /// session created by `initialize`, which the transport echoes in the
    /// `Mcp-Session-Id` header.
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
        ctx: &RequestContext,
    ) -> (JsonRpcMessage, Option<String>) {
        let request_id = request.id.clone();

        if request.method == methods::INITIALIZE {
            let (result, session_id) = self.handle_initialize(&request.params_map());
            return (
                JsonRpcMessage::success(request_id, result),
                Some(session_id),
            );
        }

        // Every non-initialize request needs a live session.
        let session_id = match &ctx.session_id {
            None => {
                return (
                    error_message(request_id, &McpError::MissingSession),
                    None,
                )
            }
            Some(id) if !self.sessions.exists(id) => {
                return (
                    error_message(request_id, &McpError::UnknownSession(id.clone())),
                    None,
                )
            }
            Some(id) => id.clone(),
        };

        let key = request_id.as_key();
        let cancel = CancellationToken::new();
        self.in_flight
            .insert(key.clone(), cancel.clone(), Some(session_id.clone()));

        let result = self
            .dispatch(&request, &session_id, ctx, cancel)
            .await;

        self.in_flight.remove(&key);

        match result {
            Ok(value) => {
                self.sessions.touch(&session_id);
                (JsonRpcMessage::success(request_id, value), None)
            }
            Err(err) => (error_message(request_id, &err), None),
        }
    }

    /// Process one notification. Side effects only.
    pub async fn handle_notification(&self, notification: JsonRpcNotification, _ctx: &RequestContext) {
        match notification.method.as_str() {
            methods::NOTIFICATION_INITIALIZED => {
                debug!("client reported initialized");
            }
            methods::NOTIFICATION_CANCELLED => {
                let request_id = notification
                    .param("requestId")
                    .map(id_key)
                    .unwrap_or_default();
                if self.in_flight.cancel(&request_id) {
                    debug!(request_id = %request_id, "cancelled in-flight request");
                } else {
                    debug!(request_id = %request_id, "cancellation for unknown request ignored");
                }
            }
            methods::NOTIFICATION_ROOTS_LIST_CHANGED => {
                debug!("client roots list changed");
            }
            other => {
                debug!(method = other, "ignoring unknown notification");
            }
        }
    }

    async fn dispatch(
        &self,
        request: &JsonRpcRequest,
        session_id: &str,
        ctx: &RequestContext,
        cancel: CancellationToken,
    ) -> McpResult<Value> {
        let params = request.params_map();
        match request.method.as_str() {
            methods::PING => Ok(Value::Object(Map::new())),

            methods::TOOLS_LIST => self.handle_list(
                self.tools.values_sorted().iter().map(|t| t.descriptor()),
                "tools",
                &params,
            ),
            methods::TOOLS_CALL => {
                self.handle_tools_call(&request.id, &params, session_id, ctx, cancel)
                    .await
            }

            methods::RESOURCES_LIST => self.handle_list(
                self.resources.values_sorted().iter().map(|r| r.descriptor()),
                "resources",
                &params,
            ),
            methods::RESOURCES_TEMPLATES_LIST => self.handle_list(
                self.templates
                    .values_sorted()
                    .iter()
                    .map(|t| t.descriptor()),
                "resourceTemplates",
                &params,
            ),
            methods::RESOURCES_READ => self.handle_resources_read(&params).await,
            methods::RESOURCES_SUBSCRIBE => {
                let uri = required_str(&params, "uri")?;
                self.sessions.subscribe(session_id, uri);
                Ok(Value::Object(Map::new()))
            }
            methods::RESOURCES_UNSUBSCRIBE => {
                let uri = required_str(&params, "uri")?;
                self.sessions.unsubscribe(session_id, uri);
                Ok(Value::Object(Map::new()))
            }

            methods::PROMPTS_LIST => self.handle_list(
                self.prompts.values_sorted().iter().map(|p| p.descriptor()),
                "prompts",
                &params,
            ),
            methods::PROMPTS_GET => self.handle_prompts_get(&params).await,

            methods::COMPLETION_COMPLETE => Ok(serde_json::json!({
                "completion": { "values": [], "total": 0, "hasMore": false }
            })),
            methods::LOGGING_SET_LEVEL => self.handle_set_level(&params),

            methods::TASKS_GET => self.tasks.handle_get(required_str(&params, "id")?),
            methods::TASKS_RESULT => self.tasks.handle_result(required_str(&params, "id")?),
            methods::TASKS_LIST => {
                let cursor = params.get("cursor").and_then(Value::as_str);
                paginate(self.tasks.list(), "tasks", cursor, self.page_size)
            }
            methods::TASKS_CANCEL => self.handle_tasks_cancel(&params, ctx, session_id),

            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }

    fn handle_list<I>(&self, descriptors: I, key: &str, params: &Map<String, Value>) -> McpResult<Value>
    where
        I: Iterator<Item = Value>,
    {
        let cursor = params.get("cursor").and_then(Value::as_str);
        paginate(descriptors.collect(), key, cursor, self.page_size)
    }

    fn handle_initialize(&self, params: &Map<String, Value>) -> (Value, String) {
        let client_version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or("");
        let negotiated = ProtocolVersion::negotiate(client_version);

        let client_info = params
            .get("clientInfo")
            .cloned()
            .unwrap_or(Value::Object(Map::new()));
        let client_capabilities: ClientCapabilities = params
            .get("capabilities")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        let session_id = self
            .sessions
            .create(client_info.clone(), client_capabilities, negotiated);
        info!(
            session_id = %session_id,
            client = %client_info.get("name").and_then(serde_json::Value::as_str).unwrap_or("unknown"),
            version = %negotiated,
            "initialized session"
        );

        let result = InitializeResult {
            protocol_version: negotiated,
            server_info: self.server_info.clone(),
            capabilities: self.capabilities(),
            instructions: self.instructions.clone(),
        };
        // Infallible for this shape.
        let result = serde_json::to_value(result).unwrap_or(Value::Null);
        (result, session_id)
    }

    async fn handle_tools_call(
        &self,
        request_id: &RequestId,
        params: &Map<String, Value>,
        session_id: &str,
        ctx: &RequestContext,
        cancel: CancellationToken,
    ) -> McpResult<Value> {
        let name = required_str(params, "name")?;
        let arguments = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(other) => {
                return Err(McpError::InvalidParams(format!(
                    "arguments must be an object, got {}",
                    other
                )))
            }
        };

        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| self.unknown_tool_error(name))?;

        if arguments.len() > MAX_ARGUMENT_KEYS {
            return Err(McpError::InvalidParams(format!(
                "too many arguments: {} (max {})",
                arguments.len(),
                MAX_ARGUMENT_KEYS
            )));
        }

        let identity = if tool.requires_auth() {
            Some(self.authorize_tool(&tool, ctx).await?)
        } else {
            None
        };

        // Every accepted call gets a task record.
        let task_id = self
            .tasks
            .create(request_id_value(request_id), tool.name());

        let client_capabilities = self
            .sessions
            .get(session_id)
            .map(|s| s.client_capabilities)
            .unwrap_or_default();
        let mut tool_ctx = ToolContext::new(
            Some(session_id.to_string()),
            client_capabilities,
            ctx.channel.clone(),
            Arc::clone(&self.client_requests),
            cancel.clone(),
        );
        let mut arguments = arguments;
        if let Some((user_id, external_token)) = identity {
            inject_identity(&mut arguments, &tool, &user_id, &external_token);
            tool_ctx = tool_ctx.with_identity(Some(user_id), Some(external_token));
        }

        let started = Instant::now();
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(McpError::Cancelled),
            result = tool.execute(&arguments, tool_ctx) => result,
        };
        debug!(
            tool = %tool.name(),
            duration_ms = started.elapsed().as_millis() as u64,
            error = result.is_err(),
            "tool call finished"
        );

        match result {
            Ok(output) => {
                let annotations = tool.annotations().cloned().unwrap_or_default();
                let content = tool_output_to_annotated_content(output, &annotations);
                let result = serde_json::json!({ "content": content });
                self.tasks.update(
                    &task_id,
                    TaskStatus::Completed,
                    Some(result.clone()),
                    None,
                    None,
                );
                self.notify_task_status(&task_id, ctx, session_id);
                Ok(result)
            }
            Err(McpError::Cancelled) => {
                self.tasks.update(
                    &task_id,
                    TaskStatus::Cancelled,
                    None,
                    None,
                    Some("cancelled".to_string()),
                );
                // No further notifications for a cancelled request.
                Err(McpError::Cancelled)
            }
            Err(err) => {
                let error_object = err.to_error_object();
                self.tasks.update(
                    &task_id,
                    TaskStatus::Failed,
                    None,
                    serde_json::to_value(&error_object).ok(),
                    Some(error_object.message.clone()),
                );
                self.notify_task_status(&task_id, ctx, session_id);
                Err(err)
            }
        }
    }

    /// Run the OAuth gate for a tool flagged `requires_auth`, yielding the
    /// `(user_id, external_access_token)` pair to inject.
    async fn authorize_tool(
        &self,
        tool: &ToolHandler,
        ctx: &RequestContext,
    ) -> McpResult<(String, String)> {
        let token = ctx
            .bearer_token
            .as_deref()
            .ok_or_else(|| McpError::OAuthRequired(tool.name().to_string()))?;
        let gate = self
            .oauth_gate
            .read()
            .clone()
            .ok_or(McpError::OAuthNotConfigured)?;

        let decision = gate
            .validate(token, tool.auth_scopes())
            .await
            .map_err(|e| McpError::OAuthValidationFailed(e.to_string()))?;

        if !decision.authorized {
            return Err(McpError::OAuthValidationFailed(
                decision
                    .reason
                    .unwrap_or_else(|| "authorization denied".to_string()),
            ));
        }
        let external_token = decision
            .external_access_token
            .ok_or(McpError::ExternalTokenMissing)?;
        Ok((decision.user_id.unwrap_or_default(), external_token))
    }

    async fn handle_resources_read(&self, params: &Map<String, Value>) -> McpResult<Value> {
        let uri = required_str(params, "uri")?;

        let chunk = if let Some(resource) = self.resources.get(uri) {
            resource.read().await?
        } else if let Some(template) = self.best_matching_template(uri) {
            template.read(uri).await?
        } else {
            return Err(McpError::ResourceNotFound(uri.to_string()));
        };

        Ok(serde_json::json!({ "contents": [chunk] }))
    }

    /// Among templates matching the URI, the longest static prefix wins.
    fn best_matching_template(&self, uri: &str) -> Option<Arc<ResourceTemplateHandler>> {
        self.templates
            .values_sorted()
            .into_iter()
            .filter(|t| t.template().matches(uri))
            .max_by_key(|t| t.template().static_prefix_len())
    }

    async fn handle_prompts_get(&self, params: &Map<String, Value>) -> McpResult<Value> {
        let name = required_str(params, "name")?;
        let arguments = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        let prompt = self
            .prompts
            .get(name)
            .ok_or_else(|| McpError::UnknownPrompt(name.to_string()))?;
        prompt.get(&arguments).await
    }

    /// `logging/setLevel` is process-wide: the accepted level is stored on
    /// the handler and applies to every session.
    fn handle_set_level(&self, params: &Map<String, Value>) -> McpResult<Value> {
        let level = required_str(params, "level")?.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(McpError::InvalidParams(format!(
                "Invalid log level '{}': expected one of [{}]",
                level,
                LOG_LEVELS.join(", ")
            )));
        }
        info!(level = %level, "log level changed");
        *self.log_level.write() = level;
        Ok(Value::Object(Map::new()))
    }

    pub fn log_level(&self) -> String {
        self.log_level.read().clone()
    }

    fn handle_tasks_cancel(
        &self,
        params: &Map<String, Value>,
        ctx: &RequestContext,
        session_id: &str,
    ) -> McpResult<Value> {
        let task_id = required_str(params, "id")?;
        let (record, request_id) = self.tasks.handle_cancel(task_id)?;
        // Also fire the cancellation handle of the owning request.
        if !request_id.is_null() {
            self.in_flight.cancel(&id_key(&request_id));
        }
        self.notify_task_status(task_id, ctx, session_id);
        Ok(record)
    }

    fn notify_task_status(&self, task_id: &str, ctx: &RequestContext, session_id: &str) {
        let Some(notification) = self.tasks.status_notification(task_id) else {
            return;
        };
        if let Some(channel) = &ctx.channel {
            if channel.send(notification.clone()) {
                return;
            }
        }
        if let Some(broadcast) = self.session_broadcast.read().as_ref() {
            broadcast(session_id, notification);
        }
    }

    fn unknown_tool_error(&self, name: &str) -> McpError {
        let registered = self.tools.keys();
        let suggestion = registered
            .iter()
            .map(|candidate| (levenshtein(name, candidate), candidate))
            .min_by_key(|(distance, _)| *distance)
            .filter(|(distance, _)| *distance <= 2)
            .map(|(_, candidate)| candidate.clone());

        let message = match suggestion {
            Some(candidate) => format!(
                "Unknown tool: '{}'. Did you mean '{}'?",
                name, candidate
            ),
            None if registered.is_empty() => {
                format!("Unknown tool: '{}'. No tools are registered", name)
            }
            None => {
                let shown: Vec<&str> = registered.iter().take(10).map(String::as_str).collect();
                format!(
                    "Unknown tool: '{}'. Available tools: {}",
                    name,
                    shown.join(", ")
                )
            }
        };
        McpError::UnknownTool(message)
    }
}

fn required_str<'a>(params: &'a Map<String, Value>, key: &str) -> McpResult<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| McpError::InvalidParams(format!("Missing required parameter: {}", key)))
}

fn request_id_value(id: &RequestId) -> Value {
    match id {
        RequestId::Number(n) => Value::from(*n),
        RequestId::String(s) => Value::String(s.clone()),
    }
}

fn error_message(id: RequestId, err: &McpError) -> JsonRpcMessage {
    if matches!(err, McpError::MissingSession | McpError::UnknownSession(_)) {
        warn!(error = %err, "rejected request");
    }
    JsonRpcMessage::error(JsonRpcError::new(Some(id), err.to_error_object()))
}

/// Classic two-row edit distance, used for unknown-tool suggestions.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

fn inject_identity(
    arguments: &mut Map<String, Value>,
    tool: &ToolHandler,
    user_id: &str,
    external_token: &str,
) {
    use tessera_mcp_protocol::params::{PARAM_EXTERNAL_ACCESS_TOKEN, PARAM_USER_ID};
    for param in tool.params() {
        if param.name == PARAM_USER_ID {
            arguments.insert(PARAM_USER_ID.to_string(), Value::String(user_id.to_string()));
        }
        if param.name == PARAM_EXTERNAL_ACCESS_TOKEN {
            arguments.insert(
                PARAM_EXTERNAL_ACCESS_TOKEN.to_string(),
                Value::String(external_token.to_string()),
            );
        }
    }
}
