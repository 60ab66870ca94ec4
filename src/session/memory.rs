use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{Provider, Session, SessionConfig, SessionListener, SessionRef};

pub const MEMORY_COOKIE_NAME: &str = "BRRTSESSID";

/// A session held in process memory.
pub struct MemorySession {
    id: String,
    expires_at: Mutex<Instant>,
    invalidated: AtomicBool,
    attributes: Mutex<Map<String, Value>>,
}

impl MemorySession {
    #[must_use]
    pub fn new(id: String, valid: Duration) -> Self {
        Self {
            id,
            expires_at: Mutex::new(Instant::now() + valid),
            invalidated: AtomicBool::new(false),
            attributes: Mutex::new(Map::new()),
        }
    }

    fn attributes(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.attributes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn expires_at(&self) -> MutexGuard<'_, Instant> {
        self.expires_at
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Session for MemorySession {
    fn id(&self) -> &str {
        &self.id
    }

    fn renew(&self, valid: Duration) {
        *self.expires_at() = Instant::now() + valid;
    }

    fn invalidate(&self) {
        self.invalidated.store(true, Ordering::Release);
    }

    fn invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }

    fn expired(&self) -> bool {
        *self.expires_at() <= Instant::now()
    }

    fn get(&self, name: &str) -> Option<Value> {
        self.attributes().get(name).cloned()
    }

    fn get_all(&self) -> Map<String, Value> {
        self.attributes().clone()
    }

    fn set(&self, name: &str, value: Value) {
        self.attributes().insert(name.to_string(), value);
    }

    fn set_all(&self, data: Map<String, Value>, flush: bool) {
        let mut attrs = self.attributes();
        if flush {
            *attrs = data;
        } else {
            attrs.extend(data);
        }
    }

    fn del(&self, name: &str) {
        self.attributes().remove(name);
    }

    fn clear(&self) {
        self.attributes().clear();
    }
}

/// In-process session store.
///
/// Ids are the uppercase hex SHA-256 of a timestamp, a counter and a random
/// ULID.
#[derive(Default)]
pub struct MemoryProvider {
    sessions: DashMap<String, SessionRef>,
    counter: AtomicU64,
}

impl MemoryProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn new_id(&self) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let digest = Sha256::digest(format!("{nanos}:{n}:{}", ulid::Ulid::new()));
        digest.iter().map(|b| format!("{b:02X}")).collect()
    }
}

impl Provider for MemoryProvider {
    fn cookie_name(&self) -> &str {
        MEMORY_COOKIE_NAME
    }

    fn exists(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    fn get(&self, id: &str) -> Option<SessionRef> {
        self.sessions.get(id).map(|s| Arc::clone(s.value()))
    }

    fn del(&self, id: &str) {
        self.sessions.remove(id);
    }

    fn get_all(&self) -> Vec<SessionRef> {
        self.sessions.iter().map(|s| Arc::clone(s.value())).collect()
    }

    fn clear(&self) {
        self.sessions.clear();
    }

    fn new_session(&self, config: &SessionConfig, listener: &SessionListener) -> SessionRef {
        let session: SessionRef = Arc::new(MemorySession::new(self.new_id(), config.valid));
        self.sessions
            .insert(session.id().to_string(), Arc::clone(&session));
        debug!(session_id = %session.id(), "Session created");
        SessionListener::fire(listener.created.as_ref(), session.as_ref());
        session
    }

    fn refresh(&self, session: &SessionRef, config: &SessionConfig, listener: &SessionListener) {
        session.renew(config.valid);
        SessionListener::fire(listener.refreshed.as_ref(), session.as_ref());
    }

    fn clean(&self, _config: &SessionConfig, listener: &SessionListener) {
        for session in self.get_all() {
            if session.expired() && !session.invalidated() {
                session.invalidate();
                SessionListener::fire(listener.invalidated.as_ref(), session.as_ref());
            }
            if session.invalidated() {
                self.del(session.id());
                debug!(session_id = %session.id(), "Session destroyed");
                SessionListener::fire(listener.destroyed.as_ref(), session.as_ref());
            }
        }
    }
}
