//! Tool-call flows that need more machinery: OAuth gating, the
//! bidirectional channel, cancellation, and task records.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use tessera_json_rpc::{JsonRpcNotification, JsonRpcRequest, RequestParams};
use tessera_mcp_protocol::{Implementation, Parameter};

use crate::client::ClientChannel;
use crate::context::RequestContext;
use crate::oauth::testing::StaticGate;
use crate::oauth::OAuthDecision;
use crate::protocol::McpProtocolHandler;
use crate::tasks::TaskStatus;
use crate::tool::ToolHandler;

fn request(id: i64, method: &str, params: Value) -> JsonRpcRequest {
    let mut request = JsonRpcRequest::new(id, method);
    if let Value::Object(map) = params {
        request = request.with_params(RequestParams::Object(map));
    }
    request
}

async fn initialize_with_caps(handler: &McpProtocolHandler, capabilities: Value) -> String {
    let init = request(
        1,
        "initialize",
        json!({
            "protocolVersion": "2025-11-25",
            "clientInfo": {"name": "t", "version": "0"},
            "capabilities": capabilities
        }),
    );
    let (_, session) = handler
        .handle_request(init, &RequestContext::default())
        .await;
    session.unwrap()
}

fn secure_handler() -> McpProtocolHandler {
    let handler = McpProtocolHandler::new(Implementation::new("secure", "0"));
    handler.register_tool(
        ToolHandler::new("whoami")
            .unwrap()
            .with_param(Parameter::string("_user_id").optional())
            .with_param(Parameter::string("_external_access_token").optional())
            .with_auth(["profile:read"])
            .with_function(|args, ctx| async move {
                Ok(json!({
                    "arg_user": args.get("_user_id").cloned().unwrap_or(Value::Null),
                    "ctx_user": ctx.user_id,
                    "has_token": ctx.external_access_token.is_some(),
                }))
            }),
    );
    handler
}

async fn call_whoami(handler: &McpProtocolHandler, session: &str, bearer: Option<&str>) -> Value {
    let mut ctx = RequestContext::for_session(session);
    if let Some(bearer) = bearer {
        ctx = ctx.with_bearer(bearer);
    }
    let (response, _) = handler
        .handle_request(
            request(2, "tools/call", json!({"name": "whoami", "arguments": {}})),
            &ctx,
        )
        .await;
    response.to_value()
}

#[tokio::test]
async fn test_auth_required_without_token() {
    let handler = secure_handler();
    let session = initialize_with_caps(&handler, json!({})).await;
    let value = call_whoami(&handler, &session, None).await;
    assert_eq!(value["error"]["code"], -32603);
    assert!(value["error"]["message"]
        .as_str()
        .unwrap()
        .contains("requires OAuth authorization; authenticate first"));
}

#[tokio::test]
async fn test_auth_without_gate_configured() {
    let handler = secure_handler();
    let session = initialize_with_caps(&handler, json!({})).await;
    let value = call_whoami(&handler, &session, Some("tok")).await;
    assert!(value["error"]["message"]
        .as_str()
        .unwrap()
        .contains("OAuth is not configured"));
}

#[tokio::test]
async fn test_auth_gate_denies() {
    let handler = secure_handler();
    handler.set_oauth_gate(Arc::new(StaticGate {
        decision: Some(OAuthDecision::deny("token expired")),
    }));
    let session = initialize_with_caps(&handler, json!({})).await;
    let value = call_whoami(&handler, &session, Some("tok")).await;
    assert!(value["error"]["message"]
        .as_str()
        .unwrap()
        .contains("OAuth validation failed: token expired"));
}

#[tokio::test]
async fn test_auth_gate_error() {
    let handler = secure_handler();
    handler.set_oauth_gate(Arc::new(StaticGate { decision: None }));
    let session = initialize_with_caps(&handler, json!({})).await;
    let value = call_whoami(&handler, &session, Some("tok")).await;
    assert!(value["error"]["message"]
        .as_str()
        .unwrap()
        .contains("OAuth validation failed"));
}

#[tokio::test]
async fn test_auth_missing_external_token() {
    let handler = secure_handler();
    handler.set_oauth_gate(Arc::new(StaticGate {
        decision: Some(OAuthDecision {
            authorized: true,
            user_id: Some("u1".to_string()),
            external_access_token: None,
            reason: None,
        }),
    }));
    let session = initialize_with_caps(&handler, json!({})).await;
    let value = call_whoami(&handler, &session, Some("tok")).await;
    assert!(value["error"]["message"]
        .as_str()
        .unwrap()
        .contains("external provider token is missing"));
}

#[tokio::test]
async fn test_auth_success_injects_identity() {
    let handler = secure_handler();
    handler.set_oauth_gate(Arc::new(StaticGate {
        decision: Some(OAuthDecision::allow("user123", "ext_token")),
    }));
    let session = initialize_with_caps(&handler, json!({})).await;
    let value = call_whoami(&handler, &session, Some("tok")).await;

    let body: Value =
        serde_json::from_str(value["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(body["arg_user"], "user123");
    assert_eq!(body["ctx_user"], "user123");
    assert_eq!(body["has_token"], true);
}

#[tokio::test]
async fn test_hidden_params_absent_from_listed_schema() {
    let handler = secure_handler();
    let session = initialize_with_caps(&handler, json!({})).await;
    let (response, _) = handler
        .handle_request(
            request(2, "tools/list", json!({})),
            &RequestContext::for_session(&session),
        )
        .await;
    let schema = &response.to_value()["result"]["tools"][0]["inputSchema"];
    assert_eq!(schema["properties"].as_object().unwrap().len(), 0);
}

#[tokio::test]
async fn test_progress_flows_through_channel_before_final() {
    let handler = McpProtocolHandler::new(Implementation::new("bidi", "0"));
    handler.register_tool(
        ToolHandler::new("long_task")
            .unwrap()
            .with_function(|_args, ctx| async move {
                ctx.send_progress("tok", 1.0, Some(10.0)).await?;
                Ok(json!("done"))
            }),
    );
    let session = initialize_with_caps(&handler, json!({})).await;

    let (channel, mut rx) = ClientChannel::new();
    let ctx = RequestContext::for_session(&session).with_channel(channel);
    let (response, _) = handler
        .handle_request(
            request(9, "tools/call", json!({"name": "long_task", "arguments": {}})),
            &ctx,
        )
        .await;

    // First queued message is the progress notification.
    let progress = rx.recv().await.unwrap();
    assert_eq!(progress["method"], "notifications/progress");
    assert_eq!(progress["params"]["progress"], 1.0);

    let value = response.to_value();
    assert_eq!(
        value["result"]["content"],
        json!([{"type": "text", "text": "\"done\""}])
    );

    // The task status notification also went through the channel.
    let status = rx.recv().await.unwrap();
    assert_eq!(status["method"], "notifications/tasks/status");
    assert_eq!(status["params"]["status"], "completed");
}

#[tokio::test]
async fn test_sampling_round_trip_during_tool_call() {
    let handler = Arc::new(McpProtocolHandler::new(Implementation::new("bidi", "0")));
    handler.register_tool(
        ToolHandler::new("ask_model")
            .unwrap()
            .with_function(|_args, ctx| async move {
                let reply = ctx
                    .create_message(json!({"messages": [
                        {"role": "user", "content": {"type": "text", "text": "hi"}}
                    ]}))
                    .await?;
                Ok(json!(reply["content"]["text"]))
            }),
    );
    let session = initialize_with_caps(&handler, json!({"sampling": {}})).await;

    let (channel, mut rx) = ClientChannel::new();
    let ctx = RequestContext::for_session(&session).with_channel(channel);

    let call = {
        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            handler
                .handle_request(
                    request(3, "tools/call", json!({"name": "ask_model", "arguments": {}})),
                    &ctx,
                )
                .await
        })
    };

    // The transport sees the outbound sampling request and replies on the
    // companion endpoint.
    let outbound = rx.recv().await.unwrap();
    assert_eq!(outbound["method"], "sampling/createMessage");
    let id = outbound["id"].as_str().unwrap().to_string();
    assert!(handler.resolve_client_response(
        &id,
        json!({"jsonrpc": "2.0", "id": id, "result": {"content": {"type": "text", "text": "hello"}}}),
    ));

    let (response, _) = call.await.unwrap();
    let value = response.to_value();
    assert_eq!(value["result"]["content"][0]["text"], "\"hello\"");
}

#[tokio::test]
async fn test_sampling_unavailable_without_capability() {
    let handler = McpProtocolHandler::new(Implementation::new("bidi", "0"));
    handler.register_tool(
        ToolHandler::new("ask_model")
            .unwrap()
            .with_function(|_args, ctx| async move {
                ctx.create_message(json!({"messages": []})).await
            }),
    );
    let session = initialize_with_caps(&handler, json!({})).await;

    let (channel, _rx) = ClientChannel::new();
    let ctx = RequestContext::for_session(&session).with_channel(channel);
    let (response, _) = handler
        .handle_request(
            request(3, "tools/call", json!({"name": "ask_model", "arguments": {}})),
            &ctx,
        )
        .await;
    let value = response.to_value();
    assert_eq!(value["error"]["code"], -32603);
    assert!(value["error"]["message"].as_str().unwrap().contains("sampling"));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_produces_cancelled_error() {
    let handler = Arc::new(McpProtocolHandler::new(Implementation::new("slow", "0")));
    handler.register_tool(
        ToolHandler::new("sleepy")
            .unwrap()
            .with_function(|_args, _ctx| async move {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(json!("never"))
            }),
    );
    let session = initialize_with_caps(&handler, json!({})).await;

    let call = {
        let handler = Arc::clone(&handler);
        let session = session.clone();
        tokio::spawn(async move {
            handler
                .handle_request(
                    request(77, "tools/call", json!({"name": "sleepy", "arguments": {}})),
                    &RequestContext::for_session(&session),
                )
                .await
        })
    };
    // Let the call register its cancellation handle.
    tokio::task::yield_now().await;

    let mut params = serde_json::Map::new();
    params.insert("requestId".to_string(), json!(77));
    handler
        .handle_notification(
            JsonRpcNotification::new("notifications/cancelled").with_params(params),
            &RequestContext::for_session(&session),
        )
        .await;

    let (response, _) = call.await.unwrap();
    let value = response.to_value();
    assert_eq!(value["error"]["code"], -32603);
    assert_eq!(value["error"]["message"], "cancelled");
}

#[tokio::test]
async fn test_task_lifecycle_through_tools_call() {
    let handler = McpProtocolHandler::new(Implementation::new("tasks", "0"));
    handler.register_tool(
        ToolHandler::new("ok_tool")
            .unwrap()
            .with_function(|_args, _ctx| async move { Ok(json!(1)) }),
    );
    handler.register_tool(
        ToolHandler::new("bad_tool")
            .unwrap()
            .with_function(|_args, _ctx| async move {
                Err(tessera_mcp_protocol::McpError::ToolExecution("boom".into()))
            }),
    );
    let session = initialize_with_caps(&handler, json!({})).await;
    let ctx = RequestContext::for_session(&session);

    handler
        .handle_request(
            request(5, "tools/call", json!({"name": "ok_tool", "arguments": {}})),
            &ctx,
        )
        .await;
    handler
        .handle_request(
            request(6, "tools/call", json!({"name": "bad_tool", "arguments": {}})),
            &ctx,
        )
        .await;

    let (response, _) = handler
        .handle_request(request(7, "tasks/list", json!({})), &ctx)
        .await;
    let value = response.to_value();
    let tasks = value["result"]["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0]["status"], "completed");
    assert_eq!(tasks[0]["toolName"], "ok_tool");
    assert_eq!(tasks[1]["status"], "failed");
    assert_eq!(tasks[1]["error"]["message"], "bad_tool: boom");

    // tasks/result succeeds for both terminal states; tasks/cancel
    // rejects them.
    let completed_id = tasks[0]["id"].as_str().unwrap();
    let (response, _) = handler
        .handle_request(
            request(8, "tasks/result", json!({"id": completed_id})),
            &ctx,
        )
        .await;
    assert_eq!(
        response.to_value()["result"]["result"]["content"][0]["text"],
        "1"
    );

    let (response, _) = handler
        .handle_request(
            request(9, "tasks/cancel", json!({"id": completed_id})),
            &ctx,
        )
        .await;
    let value = response.to_value();
    assert_eq!(value["error"]["code"], -32602);
    assert!(value["error"]["message"]
        .as_str()
        .unwrap()
        .contains("terminal state"));
}

#[tokio::test]
async fn test_tasks_cancel_requires_known_id() {
    let handler = McpProtocolHandler::new(Implementation::new("tasks", "0"));
    let session = initialize_with_caps(&handler, json!({})).await;
    let (response, _) = handler
        .handle_request(
            request(5, "tasks/cancel", json!({"id": "ffffffffffffffff"})),
            &RequestContext::for_session(&session),
        )
        .await;
    let value = response.to_value();
    assert_eq!(value["error"]["code"], -32602);
    assert!(value["error"]["message"].as_str().unwrap().contains("Unknown task"));
}

#[tokio::test]
async fn test_working_task_visible_while_tool_runs() {
    let handler = Arc::new(McpProtocolHandler::new(Implementation::new("tasks", "0")));
    let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
    let started_tx = std::sync::Mutex::new(Some(started_tx));
    let release_rx = std::sync::Mutex::new(Some(release_rx));
    handler.register_tool(
        ToolHandler::new("gated")
            .unwrap()
            .with_function(move |_args, _ctx| {
                let started = started_tx.lock().unwrap().take();
                let release = release_rx.lock().unwrap().take();
                async move {
                    if let Some(started) = started {
                        let _ = started.send(());
                    }
                    if let Some(release) = release {
                        let _ = release.await;
                    }
                    Ok(json!("done"))
                }
            }),
    );
    let session = initialize_with_caps(&handler, json!({})).await;

    let call = {
        let handler = Arc::clone(&handler);
        let session = session.clone();
        tokio::spawn(async move {
            handler
                .handle_request(
                    request(11, "tools/call", json!({"name": "gated", "arguments": {}})),
                    &RequestContext::for_session(&session),
                )
                .await
        })
    };
    started_rx.await.unwrap();

    let listed = handler.tasks().list();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["status"], "working");
    let task_id = listed[0]["id"].as_str().unwrap().to_string();

    let _ = release_tx.send(());
    call.await.unwrap();
    assert_eq!(
        handler.tasks().get(&task_id).unwrap().status,
        TaskStatus::Completed
    );
}
