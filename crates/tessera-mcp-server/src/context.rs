//! Request-scoped context objects.
//!
//! [`RequestContext`] is what a transport attaches to each inbound
//! message: the session id, the bearer token it extracted, and (for
//! bidirectional scopes) the channel back to the client.
//!
//! [`ToolContext`] is what a tool function sees while it runs: identity
//! values injected by the OAuth gate plus the bidirectional helpers
//! (progress, sampling, elicitation, roots). Each helper builds a
//! JSON-RPC message with a fresh id, pushes it through the transport's
//! channel, and awaits the matching client reply.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use tessera_mcp_protocol::methods;
use tessera_mcp_protocol::{ClientCapabilities, McpError, McpResult};

use crate::client::{ClientChannel, PendingClientRequests};

/// Transport-supplied context for one inbound message.
#[derive(Clone, Default)]
pub struct RequestContext {
    pub session_id: Option<String>,
    pub bearer_token: Option<String>,
    pub channel: Option<ClientChannel>,
}

impl RequestContext {
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            bearer_token: None,
            channel: None,
        }
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_channel(mut self, channel: ClientChannel) -> Self {
        self.channel = Some(channel);
        self
    }
}

/// Everything a tool function can reach while it executes.
#[derive(Clone)]
pub struct ToolContext {
    pub session_id: Option<String>,
    /// Set by the OAuth gate for authenticated tools.
    pub user_id: Option<String>,
    /// Upstream provider token, set by the OAuth gate.
    pub external_access_token: Option<String>,
    client_capabilities: ClientCapabilities,
    channel: Option<ClientChannel>,
    requests: Arc<PendingClientRequests>,
    cancellation: CancellationToken,
}

impl ToolContext {
    pub fn new(
        session_id: Option<String>,
        client_capabilities: ClientCapabilities,
        channel: Option<ClientChannel>,
        requests: Arc<PendingClientRequests>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            session_id,
            user_id: None,
            external_access_token: None,
            client_capabilities,
            channel,
            requests,
            cancellation,
        }
    }

    /// A context with no session, no transport, and no client
    /// capabilities. Handy for exercising tools directly.
    pub fn detached() -> Self {
        Self::new(
            None,
            ClientCapabilities::default(),
            None,
            Arc::new(PendingClientRequests::default()),
            CancellationToken::new(),
        )
    }

    pub fn with_identity(
        mut self,
        user_id: Option<String>,
        external_access_token: Option<String>,
    ) -> Self {
        self.user_id = user_id;
        self.external_access_token = external_access_token;
        self
    }

    /// The cancellation handle for the owning request. Long-running tools
    /// should check it at convenient points.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    fn channel(&self) -> McpResult<&ClientChannel> {
        self.channel.as_ref().ok_or_else(|| {
            McpError::Internal(
                "no client transport attached to this request scope".to_string(),
            )
        })
    }

    /// Emit a `notifications/progress` to the client. Fire-and-forget.
    pub async fn send_progress(
        &self,
        progress_token: impl Into<Value>,
        progress: f64,
        total: Option<f64>,
    ) -> McpResult<()> {
        let channel = self.channel()?;
        let mut params = Map::new();
        params.insert("progressToken".to_string(), progress_token.into());
        params.insert("progress".to_string(), number(progress));
        if let Some(total) = total {
            params.insert("total".to_string(), number(total));
        }
        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": methods::NOTIFICATION_PROGRESS,
            "params": params,
        });
        self.requests
            .send_to_client(channel, notification)
            .await
            .map(|_| ())
    }

    /// Ask the client to sample its model (`sampling/createMessage`).
    /// Requires the client to have advertised the `sampling` capability.
    pub async fn create_message(&self, params: Value) -> McpResult<Value> {
        if !self.client_capabilities.supports_sampling() {
            return Err(McpError::CapabilityNotSupported("sampling".to_string()));
        }
        self.roundtrip(methods::SAMPLING_CREATE_MESSAGE, params).await
    }

    /// Ask the client for structured user input (`elicitation/create`).
    /// Requires the `elicitation` capability.
    pub async fn create_elicitation(
        &self,
        message: impl Into<String>,
        requested_schema: Option<Value>,
    ) -> McpResult<Value> {
        if !self.client_capabilities.supports_elicitation() {
            return Err(McpError::CapabilityNotSupported("elicitation".to_string()));
        }
        let mut params = Map::new();
        params.insert("message".to_string(), Value::String(message.into()));
        if let Some(schema) = requested_schema {
            params.insert("requestedSchema".to_string(), schema);
        }
        self.roundtrip(methods::ELICITATION_CREATE, Value::Object(params))
            .await
    }

    /// Ask the client for its workspace roots (`roots/list`). Requires the
    /// `roots` capability.
    pub async fn list_roots(&self) -> McpResult<Value> {
        if !self.client_capabilities.supports_roots() {
            return Err(McpError::CapabilityNotSupported("roots".to_string()));
        }
        self.roundtrip(methods::ROOTS_LIST, Value::Object(Map::new()))
            .await
    }

    async fn roundtrip(&self, method: &str, params: Value) -> McpResult<Value> {
        let channel = self.channel()?;
        let request_id = self.requests.next_request_id();
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": request_id,
            "method": method,
            "params": params,
        });
        let reply = self.requests.send_to_client(channel, request).await?;
        if let Some(error) = reply.get("error") {
            return Err(McpError::ToolExecution(format!(
                "client rejected {}: {}",
                method,
                error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
            )));
        }
        Ok(reply.get("result").cloned().unwrap_or(Value::Null))
    }
}

fn number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context_with_channel(capabilities: Value) -> (ToolContext, tokio::sync::mpsc::UnboundedReceiver<Value>, Arc<PendingClientRequests>) {
        let (channel, rx) = ClientChannel::new();
        let requests = Arc::new(PendingClientRequests::default());
        let ctx = ToolContext::new(
            Some("session-1".to_string()),
            serde_json::from_value(capabilities).unwrap(),
            Some(channel),
            Arc::clone(&requests),
            CancellationToken::new(),
        );
        (ctx, rx, requests)
    }

    #[tokio::test]
    async fn test_send_progress_shape() {
        let (ctx, mut rx, _) = context_with_channel(json!({}));
        ctx.send_progress("tok-1", 1.0, Some(10.0)).await.unwrap();

        let notification = rx.recv().await.unwrap();
        assert_eq!(notification["method"], "notifications/progress");
        assert_eq!(notification["params"]["progressToken"], "tok-1");
        assert_eq!(notification["params"]["progress"], 1.0);
        assert_eq!(notification["params"]["total"], 10.0);
        assert!(notification.get("id").is_none());
    }

    #[tokio::test]
    async fn test_sampling_gated_on_capability() {
        let (ctx, _rx, _) = context_with_channel(json!({}));
        let err = ctx.create_message(json!({"messages": []})).await.unwrap_err();
        assert!(matches!(err, McpError::CapabilityNotSupported(_)));
    }

    #[tokio::test]
    async fn test_sampling_roundtrip() {
        let (ctx, mut rx, requests) = context_with_channel(json!({"sampling": {}}));

        let call = tokio::spawn(async move { ctx.create_message(json!({"messages": []})).await });

        let outbound = rx.recv().await.unwrap();
        assert_eq!(outbound["method"], "sampling/createMessage");
        let id = outbound["id"].as_str().unwrap().to_string();
        requests.resolve(
            &id,
            json!({"jsonrpc": "2.0", "id": id, "result": {"role": "assistant"}}),
        );

        let result = call.await.unwrap().unwrap();
        assert_eq!(result["role"], "assistant");
    }

    #[tokio::test]
    async fn test_roundtrip_surfaces_client_error() {
        let (ctx, mut rx, requests) = context_with_channel(json!({"roots": {}}));

        let call = tokio::spawn(async move { ctx.list_roots().await });
        let outbound = rx.recv().await.unwrap();
        let id = outbound["id"].as_str().unwrap().to_string();
        requests.resolve(
            &id,
            json!({"jsonrpc": "2.0", "id": id, "error": {"code": -1, "message": "denied"}}),
        );

        let err = call.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("denied"));
    }

    #[tokio::test]
    async fn test_detached_context_has_no_transport() {
        let ctx = ToolContext::detached();
        let err = ctx.send_progress("t", 0.5, None).await.unwrap_err();
        assert!(err.to_string().contains("no client transport"));
    }
}
