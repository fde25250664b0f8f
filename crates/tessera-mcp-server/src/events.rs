//! Per-session SSE event ids and the bounded replay buffer.
//!
//! Event ids are monotonically increasing integers scoped to one session.
//! The buffer keeps the most recent events so a client reconnecting with
//! `Last-Event-ID` can be replayed what it missed; everything is dropped
//! when the session goes away.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use serde_json::Value;

/// Default replay-buffer capacity per session.
pub const DEFAULT_BUFFER_SIZE: usize = 100;

#[derive(Default)]
struct SessionEvents {
    counter: u64,
    buffer: VecDeque<(u64, Value)>,
}

/// Event-id allocation and replay buffering for every session.
pub struct SseEventBuffer {
    sessions: Mutex<HashMap<String, SessionEvents>>,
    max_buffer_size: usize,
}

impl SseEventBuffer {
    pub fn new(max_buffer_size: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_buffer_size,
        }
    }

    /// Allocate the next event id for a session.
    pub fn next_event_id(&self, session_id: &str) -> u64 {
        let mut sessions = self.sessions.lock();
        let events = sessions.entry(session_id.to_string()).or_default();
        events.counter += 1;
        events.counter
    }

    /// Buffer an event for replay, dropping the oldest when full.
    pub fn buffer_event(&self, session_id: &str, event_id: u64, payload: Value) {
        let mut sessions = self.sessions.lock();
        let events = sessions.entry(session_id.to_string()).or_default();
        events.buffer.push_back((event_id, payload));
        while events.buffer.len() > self.max_buffer_size {
            events.buffer.pop_front();
        }
    }

    /// Buffered events with id strictly greater than `last_event_id`, in
    /// order. Empty when the requested id is newer than anything buffered.
    pub fn events_after(&self, session_id: &str, last_event_id: u64) -> Vec<(u64, Value)> {
        let sessions = self.sessions.lock();
        sessions
            .get(session_id)
            .map(|events| {
                events
                    .buffer
                    .iter()
                    .filter(|(id, _)| *id > last_event_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether any state exists for a session.
    pub fn has_session(&self, session_id: &str) -> bool {
        self.sessions.lock().contains_key(session_id)
    }

    /// Discard all state for a session.
    pub fn drop_session(&self, session_id: &str) {
        self.sessions.lock().remove(session_id);
    }
}

impl Default for SseEventBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}
