//! Session lifecycle management.
//!
//! Sessions are minted by `initialize`, keyed by a 32-character opaque id,
//! and evicted on explicit termination, on idle expiry, or (oldest
//! unprotected first) when the session cap is hit. A session is protected
//! while at least one request tagged with it is being processed.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use tessera_mcp_protocol::{ClientCapabilities, ProtocolVersion};

/// Default cap on live sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 1000;
/// Expired-session sweep runs every this many creations.
pub const DEFAULT_CLEANUP_INTERVAL: u64 = 100;
/// Sessions idle longer than this are expired.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(3600);

/// One live session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub client_info: Value,
    pub protocol_version: ProtocolVersion,
    pub client_capabilities: ClientCapabilities,
    pub created_at: Instant,
    pub last_activity: Instant,
    /// URIs this session has subscribed to via `resources/subscribe`.
    pub subscriptions: HashSet<String>,
}

type EvictHook = Box<dyn Fn(&str) + Send + Sync>;
type ProtectedProvider = Box<dyn Fn() -> HashSet<String> + Send + Sync>;

/// Creates, tracks, and evicts sessions.
pub struct SessionManager {
    sessions: Mutex<HashMap<String, Session>>,
    max_sessions: usize,
    cleanup_interval: u64,
    max_age: Duration,
    creation_count: AtomicU64,
    protected_provider: RwLock<Option<ProtectedProvider>>,
    evict_hooks: RwLock<Vec<EvictHook>>,
}

impl SessionManager {
    pub fn new(max_sessions: usize, max_age: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_sessions,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            max_age,
            creation_count: AtomicU64::new(0),
            protected_provider: RwLock::new(None),
            evict_hooks: RwLock::new(Vec::new()),
        }
    }

    /// Install the closure that reports which sessions currently have an
    /// in-flight request.
    pub fn set_protected_provider<F>(&self, provider: F)
    where
        F: Fn() -> HashSet<String> + Send + Sync + 'static,
    {
        *self.protected_provider.write() = Some(Box::new(provider));
    }

    /// Register a callback run for every evicted or terminated session so
    /// dependent state (event buffers, transport queues) can be released.
    pub fn on_evict<F>(&self, hook: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.evict_hooks.write().push(Box::new(hook));
    }

    /// Create a session and return its id.
    pub fn create(
        &self,
        client_info: Value,
        client_capabilities: ClientCapabilities,
        protocol_version: ProtocolVersion,
    ) -> String {
        let count = self.creation_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count % self.cleanup_interval == 0 {
            self.cleanup_expired(self.max_age);
        }

        let evicted = {
            let mut sessions = self.sessions.lock();
            if sessions.len() >= self.max_sessions {
                let protected = self
                    .protected_provider
                    .read()
                    .as_ref()
                    .map(|p| p())
                    .unwrap_or_default();
                let oldest = sessions
                    .values()
                    .filter(|s| !protected.contains(&s.id))
                    .min_by_key(|s| s.last_activity)
                    .map(|s| s.id.clone());
                if let Some(id) = &oldest {
                    sessions.remove(id);
                    debug!(session_id = %id, "evicted oldest session (max_sessions reached)");
                }
                oldest
            } else {
                None
            }
        };
        if let Some(id) = evicted {
            self.run_evict_hooks(&id);
        }

        let id = Uuid::new_v4().simple().to_string();
        let now = Instant::now();
        let session = Session {
            id: id.clone(),
            client_info,
            protocol_version,
            client_capabilities,
            created_at: now,
            last_activity: now,
            subscriptions: HashSet::new(),
        };
        self.sessions.lock().insert(id.clone(), session);
        debug!(session_id = %id, "created session");
        id
    }

    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.lock().get(session_id).cloned()
    }

    pub fn exists(&self, session_id: &str) -> bool {
        self.sessions.lock().contains_key(session_id)
    }

    /// Refresh a session's activity clock.
    pub fn touch(&self, session_id: &str) {
        if let Some(session) = self.sessions.lock().get_mut(session_id) {
            session.last_activity = Instant::now();
        }
    }

    /// Terminate a session explicitly. Returns false if unknown.
    pub fn terminate(&self, session_id: &str) -> bool {
        let removed = self.sessions.lock().remove(session_id).is_some();
        if removed {
            self.run_evict_hooks(session_id);
            debug!(session_id = %session_id, "terminated session");
        }
        removed
    }

    /// Remove sessions idle longer than `max_age`.
    pub fn cleanup_expired(&self, max_age: Duration) {
        let expired: Vec<String> = {
            let sessions = self.sessions.lock();
            sessions
                .values()
                .filter(|s| s.last_activity.elapsed() > max_age)
                .map(|s| s.id.clone())
                .collect()
        };
        for id in expired {
            self.sessions.lock().remove(&id);
            self.run_evict_hooks(&id);
            debug!(session_id = %id, "expired idle session");
        }
    }

    pub fn count(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn subscribe(&self, session_id: &str, uri: &str) -> bool {
        match self.sessions.lock().get_mut(session_id) {
            Some(session) => {
                session.subscriptions.insert(uri.to_string());
                true
            }
            None => false,
        }
    }

    pub fn unsubscribe(&self, session_id: &str, uri: &str) -> bool {
        match self.sessions.lock().get_mut(session_id) {
            Some(session) => session.subscriptions.remove(uri),
            None => false,
        }
    }

    fn run_evict_hooks(&self, session_id: &str) {
        for hook in self.evict_hooks.read().iter() {
            hook(session_id);
        }
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, session_id: &str, age: Duration) {
        if let Some(session) = self.sessions.lock().get_mut(session_id) {
            session.last_activity = Instant::now() - age;
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SESSIONS, DEFAULT_MAX_AGE)
    }
}
