//! Endpoint tests exercising the full HTTP surface without a socket.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::HeaderMap;
use hyper::{Method, Request, StatusCode};
use serde_json::{json, Value};

use tessera_mcp_protocol::{Implementation, Parameter};
use tessera_mcp_server::{McpProtocolHandler, ToolHandler};

use crate::config::ServerConfig;
use crate::endpoint::{extract_bearer, McpEndpoint};
use crate::streams::StreamManager;

fn endpoint() -> (McpEndpoint, Arc<McpProtocolHandler>) {
    let protocol = Arc::new(McpProtocolHandler::new(Implementation::new(
        "http-test", "0.1.0",
    )));
    protocol.register_tool(
        ToolHandler::new("add")
            .unwrap()
            .with_param(Parameter::integer("a"))
            .with_param(Parameter::integer("b"))
            .with_function(|args, _ctx| async move {
                Ok(json!(args["a"].as_i64().unwrap_or(0) + args["b"].as_i64().unwrap_or(0)))
            }),
    );
    protocol.register_tool(
        ToolHandler::new("progress_tool")
            .unwrap()
            .with_function(|_args, ctx| async move {
                ctx.send_progress("tok", 1.0, Some(10.0)).await?;
                Ok(json!("done"))
            }),
    );

    let config = Arc::new(ServerConfig::default());
    let streams = Arc::new(StreamManager::new());
    {
        let streams = Arc::clone(&streams);
        protocol.on_session_evict(move |session_id| streams.close(session_id));
    }
    (
        McpEndpoint::new(config, Arc::clone(&protocol), streams),
        protocol,
    )
}

fn post(body: &str, session: Option<&str>, accept: &str) -> Request<Full<Bytes>> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/mcp")
        .header("Content-Type", "application/json")
        .header("Accept", accept);
    if let Some(session) = session {
        builder = builder.header("Mcp-Session-Id", session);
    }
    builder.body(Full::new(Bytes::from(body.to_string()))).unwrap()
}

async fn body_json(response: hyper::Response<crate::endpoint::BoxedBody>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: hyper::Response<crate::endpoint::BoxedBody>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn initialize(endpoint: &McpEndpoint) -> String {
    let response = endpoint
        .handle(post(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-06-18","clientInfo":{"name":"t","version":"0"},"capabilities":{}}}"#,
            None,
            "application/json",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    response
        .headers()
        .get("Mcp-Session-Id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

// ----------------------------------------------------------------------
// Scenario S1: initialize, initialized, tools/list
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_initialize_then_list_tools() {
    let (endpoint, _) = endpoint();

    let response = endpoint
        .handle(post(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-06-18","clientInfo":{"name":"t","version":"0"},"capabilities":{}}}"#,
            None,
            "application/json",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let session = response
        .headers()
        .get("Mcp-Session-Id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(session.len(), 32);
    assert_eq!(
        response.headers().get("MCP-Protocol-Version").unwrap(),
        "2025-06-18"
    );
    let value = body_json(response).await;
    assert_eq!(value["id"], 1);
    assert_eq!(value["result"]["protocolVersion"], "2025-06-18");
    assert!(value["result"]["serverInfo"].is_object());
    assert!(value["result"]["capabilities"].is_object());

    // notifications/initialized: 202, no body.
    let response = endpoint
        .handle(post(
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            Some(&session),
            "application/json",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(body_text(response).await.is_empty());

    let response = endpoint
        .handle(post(
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list","params":{}}"#,
            Some(&session),
            "application/json",
        ))
        .await;
    let value = body_json(response).await;
    assert!(value["result"]["tools"].is_array());
}

#[tokio::test]
async fn test_tools_call_json_path() {
    let (endpoint, _) = endpoint();
    let session = initialize(&endpoint).await;

    let response = endpoint
        .handle(post(
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"add","arguments":{"a":2,"b":3}}}"#,
            Some(&session),
            "application/json",
        ))
        .await;
    let value = body_json(response).await;
    assert_eq!(value["result"]["content"], json!([{"type": "text", "text": "5"}]));
}

// ----------------------------------------------------------------------
// Scenario S5: SSE streaming of tools/call
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_sse_tool_call_stream_order() {
    let (endpoint, _) = endpoint();
    let session = initialize(&endpoint).await;

    let response = endpoint
        .handle(post(
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"progress_tool","arguments":{}}}"#,
            Some(&session),
            "text/event-stream",
        ))
        .await;
    assert_eq!(
        response.headers().get("Content-Type").unwrap(),
        "text/event-stream"
    );
    assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-cache");

    let text = body_text(response).await;
    let events: Vec<&str> = text.split("\r\n\r\n").filter(|s| !s.is_empty()).collect();
    // progress as server_request, tasks/status as server_request, then the
    // final message.
    assert!(events[0].contains("event: server_request"));
    assert!(events[0].contains("notifications/progress"));
    let final_event = events.last().unwrap();
    assert!(final_event.contains("event: message"));
    assert!(final_event.contains(r#"\"done\""#));

    // Event ids are monotonic.
    let ids: Vec<u64> = text
        .lines()
        .filter_map(|line| line.strip_prefix("id: "))
        .map(|id| id.trim().parse().unwrap())
        .collect();
    assert!(ids.windows(2).all(|w| w[1] > w[0]));
}

#[tokio::test]
async fn test_sse_non_tool_call_single_message() {
    let (endpoint, _) = endpoint();
    let session = initialize(&endpoint).await;

    let response = endpoint
        .handle(post(
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/list","params":{}}"#,
            Some(&session),
            "text/event-stream",
        ))
        .await;
    let text = body_text(response).await;
    assert_eq!(text.matches("event: message").count(), 1);
    assert!(text.contains("\"tools\""));
}

// ----------------------------------------------------------------------
// Scenario S6: SSE replay
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_sse_replay_after_last_event_id() {
    let (endpoint, protocol) = endpoint();
    let session = initialize(&endpoint).await;

    // Produce two buffered events through the SSE path.
    endpoint
        .handle(post(
            r#"{"jsonrpc":"2.0","id":6,"method":"ping"}"#,
            Some(&session),
            "text/event-stream",
        ))
        .await
        .into_body()
        .collect()
        .await
        .unwrap();
    endpoint
        .handle(post(
            r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#,
            Some(&session),
            "text/event-stream",
        ))
        .await
        .into_body()
        .collect()
        .await
        .unwrap();
    assert!(protocol.missed_events(&session, 0).unwrap().len() >= 2);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/mcp")
        .header("Mcp-Session-Id", &session)
        .header("Last-Event-ID", "1")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = endpoint.handle(request).await;
    let text = body_text(response).await;

    // Exactly the second event comes back.
    assert!(!text.contains("id: 1\r\n"));
    assert!(text.contains("id: 2\r\n"));
    assert!(text.contains("\"id\":7"));
}

// ----------------------------------------------------------------------
// GET info and health
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_plain_get_returns_info_document() {
    let (endpoint, _) = endpoint();
    let request = Request::builder()
        .method(Method::GET)
        .uri("/mcp")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let value = body_json(endpoint.handle(request).await).await;
    assert_eq!(value["name"], "http-test");
    assert_eq!(value["status"], "ready");
    assert_eq!(value["tools"], 2);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (endpoint, _) = endpoint();
    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = endpoint.handle(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_unknown_path_404() {
    let (endpoint, _) = endpoint();
    let request = Request::builder()
        .method(Method::GET)
        .uri("/nope")
        .body(Full::new(Bytes::new()))
        .unwrap();
    assert_eq!(
        endpoint.handle(request).await.status(),
        StatusCode::NOT_FOUND
    );
}

// ----------------------------------------------------------------------
// CORS and transport errors
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_preflight_and_cors_everywhere() {
    let (endpoint, _) = endpoint();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/mcp")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = endpoint.handle(request).await;
    assert_eq!(
        response
            .headers()
            .get("Access-Control-Allow-Methods")
            .unwrap(),
        "GET, POST, DELETE, OPTIONS"
    );

    let response = endpoint
        .handle(post(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#, None, "application/json"))
        .await;
    assert_eq!(
        response.headers().get("Access-Control-Allow-Origin").unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_parse_error_is_400() {
    let (endpoint, _) = endpoint();
    let response = endpoint.handle(post("{broken", None, "application/json")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let value = body_json(response).await;
    assert_eq!(value["error"]["code"], -32700);
}

#[tokio::test]
async fn test_oversized_body_rejected_before_parse() {
    let protocol = Arc::new(McpProtocolHandler::new(Implementation::new("t", "0")));
    let config = Arc::new(ServerConfig::default().max_body_size(64));
    let endpoint = McpEndpoint::new(config, protocol, Arc::new(StreamManager::new()));

    let huge = format!(
        r#"{{"jsonrpc":"2.0","id":1,"method":"ping","params":{{"pad":"{}"}}}}"#,
        "x".repeat(128)
    );
    let response = endpoint.handle(post(&huge, None, "application/json")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let value = body_json(response).await;
    assert_eq!(value["error"]["code"], -32600);
    assert!(value["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Request body too large"));
}

#[tokio::test]
async fn test_missing_session_rejected_on_json_path() {
    let (endpoint, _) = endpoint();
    let response = endpoint
        .handle(post(
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            None,
            "application/json",
        ))
        .await;
    let value = body_json(response).await;
    assert_eq!(value["error"]["code"], -32600);
    assert!(value["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Missing session ID"));
}

// ----------------------------------------------------------------------
// DELETE
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_delete_terminates_session() {
    let (endpoint, protocol) = endpoint();
    let session = initialize(&endpoint).await;

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/mcp")
        .header("Mcp-Session-Id", &session)
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = endpoint.handle(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!protocol.session_exists(&session));

    // Subsequent requests with the dead session are rejected.
    let response = endpoint
        .handle(post(
            r#"{"jsonrpc":"2.0","id":9,"method":"ping"}"#,
            Some(&session),
            "application/json",
        ))
        .await;
    let value = body_json(response).await;
    assert_eq!(value["error"]["code"], -32600);

    // And a second DELETE reports the unknown session.
    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/mcp")
        .header("Mcp-Session-Id", &session)
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = endpoint.handle(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_without_session_rejected() {
    let (endpoint, _) = endpoint();
    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/mcp")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = endpoint.handle(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let value = body_json(response).await;
    assert!(value["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Missing session ID"));
}

// ----------------------------------------------------------------------
// Companion reply endpoint
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_respond_without_pending_request() {
    let (endpoint, _) = endpoint();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/mcp/respond")
        .body(Full::new(Bytes::from(
            r#"{"jsonrpc":"2.0","id":"srv-1","result":{}}"#,
        )))
        .unwrap();
    let response = endpoint.handle(request).await;
    let value = body_json(response).await;
    assert!(value["error"]["message"]
        .as_str()
        .unwrap()
        .contains("No pending request with ID: srv-1"));
}

#[tokio::test]
async fn test_respond_resolves_roots_roundtrip() {
    // A tool that needs a client reply mid-flight.
    let protocol = Arc::new(McpProtocolHandler::new(Implementation::new("bidi", "0")));
    protocol.register_tool(
        ToolHandler::new("needs_roots")
            .unwrap()
            .with_function(|_args, ctx| async move {
                let roots = ctx.list_roots().await?;
                Ok(json!(roots["roots"]))
            }),
    );
    let endpoint = McpEndpoint::new(
        Arc::new(ServerConfig::default()),
        Arc::clone(&protocol),
        Arc::new(StreamManager::new()),
    );

    // Initialize with the roots capability.
    let response = endpoint
        .handle(post(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-11-25","clientInfo":{"name":"t","version":"0"},"capabilities":{"roots":{}}}}"#,
            None,
            "application/json",
        ))
        .await;
    let session = response
        .headers()
        .get("Mcp-Session-Id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    // Start the SSE tool call and read frames incrementally.
    let response = endpoint
        .handle(post(
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"needs_roots","arguments":{}}}"#,
            Some(&session),
            "text/event-stream",
        ))
        .await;
    let mut body = response.into_body();

    let first = body.frame().await.unwrap().unwrap();
    let first = String::from_utf8(first.into_data().unwrap().to_vec()).unwrap();
    assert!(first.contains("event: server_request"));
    assert!(first.contains("roots/list"));
    let data_line = first
        .lines()
        .find(|line| line.starts_with("data: "))
        .unwrap();
    let outbound: Value = serde_json::from_str(&data_line[6..]).unwrap();
    let request_id = outbound["id"].as_str().unwrap();

    // The client answers on the companion endpoint.
    let reply = format!(
        r#"{{"jsonrpc":"2.0","id":"{}","result":{{"roots":[{{"uri":"file:///ws"}}]}}}}"#,
        request_id
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri("/mcp/respond")
        .body(Full::new(Bytes::from(reply)))
        .unwrap();
    let response = endpoint.handle(request).await;
    assert_eq!(body_json(response).await["status"], "ok");

    // The stream finishes with the final message carrying the roots.
    let rest = body.collect().await.unwrap().to_bytes();
    let rest = String::from_utf8(rest.to_vec()).unwrap();
    assert!(rest.contains("event: message"));
    assert!(rest.contains("file:///ws"));
}

// ----------------------------------------------------------------------
// Bearer extraction
// ----------------------------------------------------------------------

#[test]
fn test_bearer_extraction() {
    let mut headers = HeaderMap::new();
    assert_eq!(extract_bearer(&headers), None);

    headers.insert("Authorization", "Bearer abc123".parse().unwrap());
    assert_eq!(extract_bearer(&headers), Some("abc123".to_string()));

    headers.insert("Authorization", "bearer xyz".parse().unwrap());
    assert_eq!(extract_bearer(&headers), Some("xyz".to_string()));

    // Known client bug: doubled prefix is stripped twice.
    headers.insert("Authorization", "Bearer Bearer tok".parse().unwrap());
    assert_eq!(extract_bearer(&headers), Some("tok".to_string()));

    headers.insert("Authorization", "Basic dXNlcg==".parse().unwrap());
    assert_eq!(extract_bearer(&headers), None);
}
