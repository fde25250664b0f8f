//! Server→client request plumbing.
//!
//! During a bidirectional request scope (one SSE stream), the transport
//! hands the protocol handler a [`ClientChannel`]. Notifications are
//! enqueued and forgotten; requests park a oneshot future keyed by their
//! id until the client's reply arrives on the companion endpoint (or the
//! 120 s timeout fires).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use tessera_mcp_protocol::{McpError, McpResult};

/// Default cap on outstanding server-initiated requests.
pub const DEFAULT_MAX_OUTSTANDING: usize = 100;
/// How long a server-initiated request waits for the client's reply.
pub const CLIENT_REPLY_TIMEOUT: Duration = Duration::from_secs(120);

/// Transport-supplied sink for server→client messages. Cloneable; each
/// clone feeds the same per-request SSE queue.
#[derive(Clone)]
pub struct ClientChannel {
    tx: mpsc::UnboundedSender<Value>,
}

impl ClientChannel {
    /// Create a channel pair: the sender half travels with the request
    /// scope, the receiver half is drained by the transport's SSE writer.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue one message. Returns false when the stream is gone.
    pub fn send(&self, message: Value) -> bool {
        self.tx.send(message).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The table of pending server-initiated requests, bounded and keyed by
/// request id.
pub struct PendingClientRequests {
    pending: Mutex<HashMap<String, oneshot::Sender<Value>>>,
    next_id: AtomicU64,
    max_outstanding: usize,
    reply_timeout: Duration,
}

impl PendingClientRequests {
    pub fn new(max_outstanding: usize) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            max_outstanding,
            reply_timeout: CLIENT_REPLY_TIMEOUT,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_timeout(max_outstanding: usize, reply_timeout: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            max_outstanding,
            reply_timeout,
        }
    }

    /// Mint a fresh id for a server-initiated request.
    pub fn next_request_id(&self) -> String {
        format!("srv-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn outstanding(&self) -> usize {
        self.pending.lock().len()
    }

    /// Send one message to the client through `channel`.
    ///
    /// Messages without an `id` are notifications: enqueued, done. Messages
    /// with an `id` register a pending future and await the client's reply.
    /// The cap is enforced synchronously; the request over the limit fails
    /// without being sent.
    pub async fn send_to_client(
        &self,
        channel: &ClientChannel,
        message: Value,
    ) -> McpResult<Value> {
        let request_id = match message.get("id") {
            Some(id) if !id.is_null() => id_key(id),
            _ => {
                // Notification: fire and forget.
                if !channel.send(message) {
                    return Err(McpError::Internal(
                        "client stream closed before notification could be sent".to_string(),
                    ));
                }
                return Ok(Value::Null);
            }
        };

        let rx = {
            let mut pending = self.pending.lock();
            if pending.len() >= self.max_outstanding {
                return Err(McpError::TooManyClientRequests(self.max_outstanding));
            }
            let (tx, rx) = oneshot::channel();
            pending.insert(request_id.clone(), tx);
            rx
        };

        if !channel.send(message) {
            self.pending.lock().remove(&request_id);
            return Err(McpError::Internal(
                "client stream closed before request could be sent".to_string(),
            ));
        }

        match tokio::time::timeout(self.reply_timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => {
                self.pending.lock().remove(&request_id);
                Err(McpError::Internal(format!(
                    "pending request {} dropped without a reply",
                    request_id
                )))
            }
            Err(_) => {
                self.pending.lock().remove(&request_id);
                Err(McpError::ClientResponseTimeout(request_id))
            }
        }
    }

    /// Resolve a pending request with the client's reply body. Returns
    /// false when no request with that id is waiting.
    pub fn resolve(&self, request_id: &str, body: Value) -> bool {
        match self.pending.lock().remove(request_id) {
            Some(tx) => {
                if tx.send(body).is_err() {
                    debug!(request_id, "reply arrived after the waiter gave up");
                }
                true
            }
            None => false,
        }
    }
}

impl Default for PendingClientRequests {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OUTSTANDING)
    }
}

/// Canonical map key for a JSON-RPC id value.
pub fn id_key(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
