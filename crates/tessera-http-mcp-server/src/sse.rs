//! SSE wire framing.
//!
//! Each event is `id:` + `event:` + `data:` lines (CRLF-terminated)
//! followed by a blank line. The `id` field carries the per-session
//! monotonic counter so clients can resume with `Last-Event-ID`; replayed
//! events omit the `event:` line, which defaults to `message` per the SSE
//! specification.

use serde_json::Value;

/// Event types used on the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseEventKind {
    /// A final JSON-RPC response.
    Message,
    /// A request the server is asking the client to answer.
    ServerRequest,
    /// A JSON-RPC error envelope.
    Error,
}

impl SseEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SseEventKind::Message => "message",
            SseEventKind::ServerRequest => "server_request",
            SseEventKind::Error => "error",
        }
    }
}

/// Format one SSE event. `event_id` is omitted for session-less streams.
pub fn format_event(event_id: Option<u64>, kind: SseEventKind, data: &Value) -> String {
    let payload = serde_json::to_string(data).unwrap_or_else(|_| "{}".to_string());
    let mut frame = String::new();
    if let Some(id) = event_id {
        frame.push_str(&format!("id: {}\r\n", id));
    }
    frame.push_str(&format!("event: {}\r\n", kind.as_str()));
    frame.push_str(&format!("data: {}\r\n", payload));
    frame.push_str("\r\n");
    frame
}

/// Format a replayed event: `id:` and `data:` only.
pub fn format_replay(event_id: u64, data: &Value) -> String {
    let payload = serde_json::to_string(data).unwrap_or_else(|_| "{}".to_string());
    format!("id: {}\r\ndata: {}\r\n\r\n", event_id, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_framing() {
        let frame = format_event(Some(3), SseEventKind::Message, &json!({"ok": true}));
        assert_eq!(
            frame,
            "id: 3\r\nevent: message\r\ndata: {\"ok\":true}\r\n\r\n"
        );
    }

    #[test]
    fn test_server_request_framing() {
        let frame = format_event(Some(1), SseEventKind::ServerRequest, &json!({}));
        assert!(frame.contains("event: server_request\r\n"));
    }

    #[test]
    fn test_sessionless_event_has_no_id() {
        let frame = format_event(None, SseEventKind::Error, &json!({}));
        assert!(!frame.contains("id:"));
        assert!(frame.starts_with("event: error\r\n"));
    }

    #[test]
    fn test_replay_framing() {
        let frame = format_replay(7, &json!({"n": 1}));
        assert_eq!(frame, "id: 7\r\ndata: {\"n\":1}\r\n\r\n");
        assert!(!frame.contains("event:"));
    }
}
