//! Framing: classify one raw JSON body as a request, notification, or
//! client response.

use serde_json::Value;

use crate::error::JsonRpcError;
use crate::notification::JsonRpcNotification;
use crate::request::JsonRpcRequest;
use crate::types::RequestId;

/// One parsed inbound JSON-RPC message.
///
/// `Response` covers the client's answers to server-initiated requests
/// (sampling, elicitation, roots), which arrive on the reply channel with
/// an `id` and a `result` or `error` member instead of a `method`.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Response { id: RequestId, body: Value },
}

/// Parse a raw body into an [`IncomingMessage`].
///
/// Distinguishes the three shapes by the presence of `method` and `id`:
/// `method` + `id` is a request, `method` alone a notification, `id`
/// alone a response. Anything else is a parse/invalid-request error,
/// already shaped as the envelope the transport should send back.
pub fn parse_message(body: &str) -> Result<IncomingMessage, JsonRpcError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| JsonRpcError::parse_error(format!("Parse error: {}", e)))?;

    if !value.is_object() {
        return Err(JsonRpcError::invalid_request(
            None,
            "Expected a JSON-RPC object",
        ));
    }

    let has_method = value.get("method").is_some();
    let has_id = value.get("id").map(|id| !id.is_null()).unwrap_or(false);

    match (has_method, has_id) {
        (true, true) => {
            let request: JsonRpcRequest = serde_json::from_value(value)
                .map_err(|e| JsonRpcError::invalid_request(None, format!("Invalid request: {}", e)))?;
            Ok(IncomingMessage::Request(request))
        }
        (true, false) => {
            let notification: JsonRpcNotification = serde_json::from_value(value).map_err(|e| {
                JsonRpcError::invalid_request(None, format!("Invalid notification: {}", e))
            })?;
            Ok(IncomingMessage::Notification(notification))
        }
        (false, true) => {
            // Infallible: has_id guarantees a non-null id value exists.
            let id: RequestId = serde_json::from_value(value["id"].clone())
                .map_err(|e| JsonRpcError::invalid_request(None, format!("Invalid id: {}", e)))?;
            Ok(IncomingMessage::Response { id, body: value })
        }
        (false, false) => Err(JsonRpcError::invalid_request(
            None,
            "Message has neither method nor id",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request() {
        let msg = parse_message(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).unwrap();
        match msg {
            IncomingMessage::Request(req) => {
                assert_eq!(req.method, "ping");
                assert_eq!(req.id, RequestId::Number(1));
            }
            other => panic!("expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_notification() {
        let msg =
            parse_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        assert!(matches!(msg, IncomingMessage::Notification(_)));
    }

    #[test]
    fn test_null_id_is_notification() {
        let msg = parse_message(r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#).unwrap();
        assert!(matches!(msg, IncomingMessage::Notification(_)));
    }

    #[test]
    fn test_parse_client_response() {
        let msg =
            parse_message(r#"{"jsonrpc":"2.0","id":"srv-1","result":{"roots":[]}}"#).unwrap();
        match msg {
            IncomingMessage::Response { id, body } => {
                assert_eq!(id, RequestId::String("srv-1".to_string()));
                assert_eq!(body["result"]["roots"], serde_json::json!([]));
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error() {
        let err = parse_message("{not json").unwrap_err();
        assert_eq!(err.error.code, -32700);
    }

    #[test]
    fn test_non_object_rejected() {
        let err = parse_message("[1,2,3]").unwrap_err();
        assert_eq!(err.error.code, -32600);
    }
}
