//! The MCP endpoint: OPTIONS/GET/POST/DELETE on one path, the client
//! reply channel, and the liveness probe.
//!
//! POST is the primary channel. Clients accepting `application/json` get a
//! plain JSON response; clients accepting `text/event-stream` get an SSE
//! stream — for `tools/call` a bidirectional one that forwards
//! server-initiated requests as `server_request` events while the tool
//! runs, then closes with the final `message` event.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Body, Frame};
use hyper::header::{HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, error, warn};

use tessera_json_rpc::{parse_message, IncomingMessage, JsonRpcRequest};
use tessera_mcp_protocol::{methods, ProtocolVersion};
use tessera_mcp_server::client::id_key;
use tessera_mcp_server::{ClientChannel, McpProtocolHandler, RequestContext};

use crate::config::ServerConfig;
use crate::cors;
use crate::sse::{format_event, format_replay, SseEventKind};
use crate::streams::StreamManager;

pub const HEADER_SESSION_ID: &str = "Mcp-Session-Id";
pub const HEADER_PROTOCOL_VERSION: &str = "MCP-Protocol-Version";
pub const HEADER_LAST_EVENT_ID: &str = "Last-Event-ID";

const CONTENT_TYPE_JSON: &str = "application/json";
const CONTENT_TYPE_SSE: &str = "text/event-stream";
const BEARER_PREFIX: &str = "bearer ";

pub type BoxedBody = UnsyncBoxBody<Bytes, Infallible>;

pub(crate) fn full_body(bytes: impl Into<Bytes>) -> BoxedBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Handles requests for the MCP endpoint paths. One instance serves every
/// connection.
#[derive(Clone)]
pub struct McpEndpoint {
    config: Arc<ServerConfig>,
    protocol: Arc<McpProtocolHandler>,
    streams: Arc<StreamManager>,
}

impl McpEndpoint {
    pub fn new(
        config: Arc<ServerConfig>,
        protocol: Arc<McpProtocolHandler>,
        streams: Arc<StreamManager>,
    ) -> Self {
        Self {
            config,
            protocol,
            streams,
        }
    }

    /// Route one request by path and method.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<BoxedBody>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: std::fmt::Display,
    {
        let path = req.uri().path().to_string();
        let mut response = if path == self.config.mcp_path {
            match req.method() {
                &Method::OPTIONS => self.preflight_response(),
                &Method::GET => self.handle_get(req).await,
                &Method::POST => self.handle_post(req).await,
                &Method::DELETE => self.handle_delete(req.headers()),
                _ => self.plain_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"),
            }
        } else if path == self.config.respond_path && req.method() == Method::POST {
            self.handle_respond(req).await
        } else if path == self.config.health_path && req.method() == Method::GET {
            self.json_response(
                StatusCode::OK,
                serde_json::json!({"status": "healthy"}),
                None,
            )
        } else {
            self.plain_response(StatusCode::NOT_FOUND, "Not Found")
        };

        if self.config.enable_cors {
            cors::apply(response.headers_mut());
        }
        response
    }

    // ------------------------------------------------------------------
    // GET: info document, SSE replay, or persistent stream
    // ------------------------------------------------------------------

    async fn handle_get<B>(&self, req: Request<B>) -> Response<BoxedBody> {
        let headers = req.headers();
        let session_id = header_string(headers, HEADER_SESSION_ID);
        let last_event_id = header_string(headers, HEADER_LAST_EVENT_ID)
            .and_then(|value| value.parse::<u64>().ok());
        let accept = header_string(headers, ACCEPT.as_str()).unwrap_or_default();

        // Resumption: replay buffered events past Last-Event-ID, then close.
        if let (Some(last_id), Some(session)) = (last_event_id, session_id.as_deref()) {
            if let Some(missed) = self.protocol.missed_events(session, last_id) {
                debug!(session, last_id, count = missed.len(), "replaying SSE events");
                let frames = missed
                    .into_iter()
                    .map(|(event_id, data)| format_replay(event_id, &data));
                let body = stream_of_frames(futures::stream::iter(frames));
                return self.sse_response(body, Some(session));
            }
        }

        // Persistent stream: push server-initiated messages until the
        // client disconnects or the session dies.
        if accept.contains(CONTENT_TYPE_SSE) {
            let Some(session) = session_id else {
                return self.error_response(
                    Value::Null,
                    -32600,
                    "Mcp-Session-Id header required for SSE stream",
                    None,
                );
            };
            if !self.protocol.session_exists(&session) {
                return self.error_response(Value::Null, -32600, "Session not found", None);
            }

            debug!(session = %session, "opening persistent GET SSE stream");
            let mut rx = self.streams.open(&session);
            let protocol = Arc::clone(&self.protocol);
            let stream_session = session.clone();
            let body = stream_of_frames(async_stream::stream! {
                while let Some(item) = rx.recv().await {
                    yield emit_event(
                        &protocol,
                        Some(&stream_session),
                        SseEventKind::Message,
                        &item,
                    );
                }
            });
            return self.sse_response(body, Some(&session));
        }

        // Plain info document.
        self.json_response(
            StatusCode::OK,
            self.protocol.server_descriptor(),
            session_id.as_deref(),
        )
    }

    // ------------------------------------------------------------------
    // POST: the request channel
    // ------------------------------------------------------------------

    async fn handle_post<B>(&self, req: Request<B>) -> Response<BoxedBody>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: std::fmt::Display,
    {
        let headers = req.headers().clone();
        let session_id = header_string(&headers, HEADER_SESSION_ID);
        let accept = header_string(&headers, ACCEPT.as_str()).unwrap_or_default();
        let bearer = extract_bearer(&headers);

        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) => {
                error!(error = %err, "failed to read POST body");
                return self.error_response(
                    Value::Null,
                    -32603,
                    "Failed to read request body",
                    session_id.as_deref(),
                );
            }
        };

        if body.len() > self.config.max_body_size {
            return self.error_response(
                Value::Null,
                -32600,
                &format!(
                    "Request body too large ({} bytes, max {})",
                    body.len(),
                    self.config.max_body_size
                ),
                session_id.as_deref(),
            );
        }

        let body_str = match std::str::from_utf8(&body) {
            Ok(s) => s,
            Err(_) => {
                return self.error_response(
                    Value::Null,
                    -32700,
                    "Parse error: body is not valid UTF-8",
                    session_id.as_deref(),
                )
            }
        };

        match parse_message(body_str) {
            Ok(IncomingMessage::Request(request)) => {
                if accept.contains(CONTENT_TYPE_SSE) {
                    self.handle_sse_request(request, session_id, bearer).await
                } else {
                    self.handle_json_request(request, session_id, bearer).await
                }
            }
            Ok(IncomingMessage::Notification(notification)) => {
                let ctx = RequestContext {
                    session_id: session_id.clone(),
                    bearer_token: bearer,
                    channel: None,
                };
                self.protocol.handle_notification(notification, &ctx).await;
                self.accepted_response(session_id.as_deref())
            }
            Ok(IncomingMessage::Response { id, body }) => {
                // Some clients answer server-initiated requests on the main
                // endpoint instead of the companion path.
                self.protocol.resolve_client_response(&id.as_key(), body);
                self.accepted_response(session_id.as_deref())
            }
            Err(envelope) => {
                let value = serde_json::to_value(&envelope).unwrap_or(Value::Null);
                self.json_response(StatusCode::BAD_REQUEST, value, session_id.as_deref())
            }
        }
    }

    /// JSON path: run the request and answer with one JSON body.
    async fn handle_json_request(
        &self,
        request: JsonRpcRequest,
        session_id: Option<String>,
        bearer: Option<String>,
    ) -> Response<BoxedBody> {
        let ctx = RequestContext {
            session_id: session_id.clone(),
            bearer_token: bearer,
            channel: None,
        };
        let (response, new_session) = self.protocol.handle_request(request, &ctx).await;

        let effective = new_session.clone().or(session_id);
        let mut http_response = self.json_response(
            StatusCode::OK,
            response.to_value(),
            effective.as_deref(),
        );
        if let Some(new_session) = new_session {
            set_header(http_response.headers_mut(), HEADER_SESSION_ID, &new_session);
        }
        http_response
    }

    /// SSE path. For `tools/call` the stream is bidirectional: queued
    /// server→client messages become `server_request` events, the final
    /// response a `message` event. Everything else is a one-shot stream.
    async fn handle_sse_request(
        &self,
        request: JsonRpcRequest,
        session_id: Option<String>,
        bearer: Option<String>,
    ) -> Response<BoxedBody> {
        if request.method == methods::TOOLS_CALL {
            return self.handle_sse_tool_call(request, session_id, bearer).await;
        }

        let ctx = RequestContext {
            session_id: session_id.clone(),
            bearer_token: bearer,
            channel: None,
        };
        let (response, new_session) = self.protocol.handle_request(request, &ctx).await;
        let effective = new_session.or(session_id);

        let frame = emit_event(
            &self.protocol,
            effective.as_deref(),
            SseEventKind::Message,
            &response.to_value(),
        );
        let body = stream_of_frames(futures::stream::iter([frame]));
        self.sse_response(body, effective.as_deref())
    }

    async fn handle_sse_tool_call(
        &self,
        request: JsonRpcRequest,
        session_id: Option<String>,
        bearer: Option<String>,
    ) -> Response<BoxedBody> {
        let (channel, mut rx) = ClientChannel::new();
        let ctx = RequestContext {
            session_id: session_id.clone(),
            bearer_token: bearer,
            channel: Some(channel),
        };

        let request_id = serde_json::to_value(&request.id).unwrap_or(Value::Null);
        let protocol = Arc::clone(&self.protocol);
        let join = tokio::spawn(async move { protocol.handle_request(request, &ctx).await });

        let protocol = Arc::clone(&self.protocol);
        let stream_session = session_id.clone();
        let body = stream_of_frames(async_stream::stream! {
            // The channel closes when the handler task finishes, so this
            // drains every server-initiated message first.
            while let Some(item) = rx.recv().await {
                yield emit_event(
                    &protocol,
                    stream_session.as_deref(),
                    SseEventKind::ServerRequest,
                    &item,
                );
            }
            match join.await {
                Ok((response, _)) => {
                    yield emit_event(
                        &protocol,
                        stream_session.as_deref(),
                        SseEventKind::Message,
                        &response.to_value(),
                    );
                }
                Err(join_error) => {
                    error!(error = %join_error, "tool-call task failed");
                    let envelope = serde_json::json!({
                        "jsonrpc": "2.0",
                        "id": request_id,
                        "error": {"code": -32603, "message": "Internal error"},
                    });
                    yield emit_event(
                        &protocol,
                        stream_session.as_deref(),
                        SseEventKind::Error,
                        &envelope,
                    );
                }
            }
        });
        self.sse_response(body, session_id.as_deref())
    }

    // ------------------------------------------------------------------
    // DELETE: terminate session
    // ------------------------------------------------------------------

    fn handle_delete(&self, headers: &HeaderMap) -> Response<BoxedBody> {
        let Some(session_id) = header_string(headers, HEADER_SESSION_ID) else {
            return self.error_response(Value::Null, -32600, "Missing session ID", None);
        };

        // Capture the negotiated version before the session record goes.
        let version = self
            .protocol
            .session_protocol_version(&session_id)
            .unwrap_or(ProtocolVersion::LATEST.as_str());

        if !self.protocol.terminate_session(&session_id) {
            return self.error_response(
                Value::Null,
                -32600,
                &format!("Unknown session: {}", session_id),
                None,
            );
        }
        self.streams.close(&session_id);

        let mut response = Response::builder()
            .status(StatusCode::OK)
            .body(full_body(""))
            .unwrap();
        set_header(response.headers_mut(), HEADER_PROTOCOL_VERSION, version);
        response
    }

    // ------------------------------------------------------------------
    // Companion endpoint: client replies to server-initiated requests
    // ------------------------------------------------------------------

    async fn handle_respond<B>(&self, req: Request<B>) -> Response<BoxedBody>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: std::fmt::Display,
    {
        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(_) => {
                return self.error_response(Value::Null, -32603, "Failed to read request body", None)
            }
        };
        let data: Value = match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(_) => return self.error_response(Value::Null, -32700, "Parse error", None),
        };

        let request_id = data.get("id").map(id_key).unwrap_or_default();
        if self.protocol.resolve_client_response(&request_id, data.clone()) {
            self.json_response(StatusCode::OK, serde_json::json!({"status": "ok"}), None)
        } else {
            self.error_response(
                data.get("id").cloned().unwrap_or(Value::Null),
                -32600,
                &format!("No pending request with ID: {}", request_id),
                None,
            )
        }
    }

    // ------------------------------------------------------------------
    // Response builders
    // ------------------------------------------------------------------

    fn protocol_version_for(&self, session_id: Option<&str>) -> &'static str {
        session_id
            .and_then(|id| self.protocol.session_protocol_version(id))
            .unwrap_or(ProtocolVersion::LATEST.as_str())
    }

    fn preflight_response(&self) -> Response<BoxedBody> {
        let mut response = Response::builder()
            .status(StatusCode::OK)
            .body(full_body(""))
            .unwrap();
        cors::apply_preflight(response.headers_mut());
        response
    }

    fn plain_response(&self, status: StatusCode, text: &str) -> Response<BoxedBody> {
        Response::builder()
            .status(status)
            .body(full_body(text.to_string()))
            .unwrap()
    }

    fn accepted_response(&self, session_id: Option<&str>) -> Response<BoxedBody> {
        let mut response = Response::builder()
            .status(StatusCode::ACCEPTED)
            .body(full_body(""))
            .unwrap();
        set_header(
            response.headers_mut(),
            HEADER_PROTOCOL_VERSION,
            self.protocol_version_for(session_id),
        );
        if let Some(session_id) = session_id {
            set_header(response.headers_mut(), HEADER_SESSION_ID, session_id);
        }
        response
    }

    fn json_response(
        &self,
        status: StatusCode,
        value: Value,
        session_id: Option<&str>,
    ) -> Response<BoxedBody> {
        let payload = serde_json::to_vec(&value).unwrap_or_else(|_| b"{}".to_vec());
        let mut response = Response::builder()
            .status(status)
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
            .body(full_body(payload))
            .unwrap();
        set_header(
            response.headers_mut(),
            HEADER_PROTOCOL_VERSION,
            self.protocol_version_for(session_id),
        );
        if let Some(session_id) = session_id {
            set_header(response.headers_mut(), HEADER_SESSION_ID, session_id);
        }
        response
    }

    fn error_response(
        &self,
        id: Value,
        code: i64,
        message: &str,
        session_id: Option<&str>,
    ) -> Response<BoxedBody> {
        let status = if code == -32700 || code == -32600 {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let envelope = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": code, "message": message},
        });
        self.json_response(status, envelope, session_id)
    }

    fn sse_response(&self, body: BoxedBody, session_id: Option<&str>) -> Response<BoxedBody> {
        let mut response = Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, CONTENT_TYPE_SSE)
            .header("Cache-Control", "no-cache")
            .header("Connection", "keep-alive")
            .body(body)
            .unwrap();
        set_header(
            response.headers_mut(),
            HEADER_PROTOCOL_VERSION,
            self.protocol_version_for(session_id),
        );
        if let Some(session_id) = session_id {
            set_header(response.headers_mut(), HEADER_SESSION_ID, session_id);
        }
        response
    }
}

/// Allocate an event id, buffer the payload for replay, and format the
/// frame. Session-less scopes get unnumbered events.
fn emit_event(
    protocol: &McpProtocolHandler,
    session_id: Option<&str>,
    kind: SseEventKind,
    data: &Value,
) -> String {
    match session_id {
        Some(session) => {
            let event_id = protocol.next_sse_event_id(session);
            protocol.buffer_sse_event(session, event_id, data.clone());
            format_event(Some(event_id), kind, data)
        }
        None => format_event(None, kind, data),
    }
}

fn stream_of_frames<S>(stream: S) -> BoxedBody
where
    S: futures::Stream<Item = String> + Send + 'static,
{
    StreamBody::new(stream.map(|frame| Ok(Frame::data(Bytes::from(frame))))).boxed_unsync()
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

fn set_header(headers: &mut HeaderMap, name: &str, value: &str) {
    // Header names are parsed (not from_static) so the canonical
    // mixed-case MCP names are accepted.
    if let (Ok(name), Ok(value)) = (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        headers.insert(name, value);
    }
}

/// Pull the bearer token out of the `Authorization` header,
/// case-insensitively, working around clients that double the prefix
/// (`Bearer Bearer <token>`).
pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let auth = header_string(headers, AUTHORIZATION.as_str())?;
    if auth.len() < BEARER_PREFIX.len()
        || !auth[..BEARER_PREFIX.len()].eq_ignore_ascii_case(BEARER_PREFIX)
    {
        if !auth.is_empty() {
            warn!("Authorization header present but not a Bearer token");
        }
        return None;
    }
    let mut token = auth[BEARER_PREFIX.len()..].to_string();
    if token.len() >= BEARER_PREFIX.len()
        && token[..BEARER_PREFIX.len()].eq_ignore_ascii_case(BEARER_PREFIX)
    {
        warn!("Double-Bearer prefix detected in Authorization header, stripping again");
        token = token[BEARER_PREFIX.len()..].to_string();
    }
    Some(token)
}
