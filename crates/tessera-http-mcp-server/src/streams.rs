//! Per-session queues for the persistent GET SSE streams.
//!
//! One single-producer/single-consumer queue per session. The protocol
//! handler pushes server-initiated messages through the broadcast hook;
//! the open GET stream drains them. Closing the queue (on DELETE or
//! eviction) ends the stream.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

pub struct StreamManager {
    streams: Mutex<HashMap<String, mpsc::UnboundedSender<Value>>>,
}

impl StreamManager {
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Open the stream for a session, replacing (and thereby closing) any
    /// previous one.
    pub fn open(&self, session_id: &str) -> mpsc::UnboundedReceiver<Value> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self
            .streams
            .lock()
            .insert(session_id.to_string(), tx)
            .is_some()
        {
            debug!(session_id, "replaced existing GET stream");
        }
        rx
    }

    /// Push a message to a session's open stream. Returns false when no
    /// stream is open.
    pub fn push(&self, session_id: &str, message: Value) -> bool {
        self.streams
            .lock()
            .get(session_id)
            .map(|tx| tx.send(message).is_ok())
            .unwrap_or(false)
    }

    /// Close a session's stream; the receiver sees end-of-stream.
    pub fn close(&self, session_id: &str) {
        if self.streams.lock().remove(session_id).is_some() {
            debug!(session_id, "closed GET stream");
        }
    }

    pub fn open_count(&self) -> usize {
        self.streams.lock().len()
    }
}

impl Default for StreamManager {
    fn default() -> Self {
        Self::new()
    }
}
