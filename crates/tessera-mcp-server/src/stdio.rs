//! Stdio transport: newline-delimited JSON-RPC over stdin/stdout.
//!
//! One JSON object per line, UTF-8. Responses go to stdout followed by a
//! newline; all logging goes to stderr so stdout stays pure protocol. The
//! session minted by the first `initialize` is remembered and attached to
//! every subsequent dispatch. EOF on stdin shuts the transport down.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error};

use tessera_json_rpc::{parse_message, IncomingMessage, JsonRpcError};

use crate::context::RequestContext;
use crate::protocol::McpProtocolHandler;

pub struct StdioTransport {
    protocol: std::sync::Arc<McpProtocolHandler>,
    session_id: Option<String>,
}

impl StdioTransport {
    pub fn new(protocol: std::sync::Arc<McpProtocolHandler>) -> Self {
        Self {
            protocol,
            session_id: None,
        }
    }

    /// Serve until stdin reaches EOF.
    pub async fn run(&mut self) -> std::io::Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let mut lines = stdin.lines();

        debug!("stdio transport listening");
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(line).await {
                let payload = serde_json::to_string(&response).unwrap_or_else(|e| {
                    error!(error = %e, "failed to serialize response");
                    r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#
                        .to_string()
                });
                stdout.write_all(payload.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }
        debug!("stdin closed, stdio transport shutting down");
        Ok(())
    }

    /// Process one line; `Some` is a response to write back.
    async fn handle_line(&mut self, line: &str) -> Option<serde_json::Value> {
        match parse_message(line) {
            Ok(IncomingMessage::Request(request)) => {
                let ctx = RequestContext {
                    session_id: self.session_id.clone(),
                    bearer_token: None,
                    channel: None,
                };
                let (response, new_session) = self.protocol.handle_request(request, &ctx).await;
                if let Some(session_id) = new_session {
                    debug!(session_id = %session_id, "stdio session established");
                    self.session_id = Some(session_id);
                }
                Some(response.to_value())
            }
            Ok(IncomingMessage::Notification(notification)) => {
                let ctx = RequestContext {
                    session_id: self.session_id.clone(),
                    bearer_token: None,
                    channel: None,
                };
                self.protocol.handle_notification(notification, &ctx).await;
                None
            }
            Ok(IncomingMessage::Response { id, body }) => {
                // A client reply to a server-initiated request; stdio has no
                // bidirectional scope, so just try to resolve and move on.
                let key = match &id {
                    tessera_json_rpc::RequestId::String(s) => s.clone(),
                    tessera_json_rpc::RequestId::Number(n) => n.to_string(),
                };
                if !self.protocol.resolve_client_response(&key, body) {
                    debug!(request_id = %key, "reply for unknown request ignored");
                }
                None
            }
            Err(parse_error) => {
                debug!(error = %parse_error, "bad stdio line");
                Some(serde_json::to_value(&parse_error).unwrap_or_else(|_| {
                    serde_json::to_value(JsonRpcError::parse_error("Parse error"))
                        .unwrap_or_default()
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tessera_mcp_protocol::Implementation;

    fn transport() -> StdioTransport {
        let protocol = Arc::new(McpProtocolHandler::new(Implementation::new("t", "0")));
        StdioTransport::new(protocol)
    }

    #[tokio::test]
    async fn test_initialize_establishes_session() {
        let mut transport = transport();
        let response = transport
            .handle_line(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-06-18","clientInfo":{"name":"t","version":"0"},"capabilities":{}}}"#,
            )
            .await
            .unwrap();
        assert_eq!(response["result"]["protocolVersion"], "2025-06-18");
        assert!(transport.session_id.is_some());

        // Subsequent requests reuse the stored session.
        let response = transport
            .handle_line(r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#)
            .await
            .unwrap();
        assert!(response.get("error").is_none());
    }

    #[tokio::test]
    async fn test_request_before_initialize_rejected() {
        let mut transport = transport();
        let response = transport
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#)
            .await
            .unwrap();
        assert_eq!(response["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn test_parse_error_envelope() {
        let mut transport = transport();
        let response = transport.handle_line("{broken").await.unwrap();
        assert_eq!(response["error"]["code"], -32700);
        assert!(response["id"].is_null());
    }

    #[tokio::test]
    async fn test_notification_produces_no_output() {
        let mut transport = transport();
        let response = transport
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(response.is_none());
    }
}
