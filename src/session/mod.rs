//! Server-side sessions.
//!
//! A [`Provider`] stores [`Session`]s by id and resolves the id from the
//! request cookie. The session middleware
//! ([`SessionMiddleware`](crate::middleware::SessionMiddleware)) attaches the
//! current session to each context; handlers read it with [`current`].
//!
//! [`MemoryProvider`] keeps sessions in process memory.

mod memory;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::context::Context;
use crate::server::Request;

pub use memory::{MemoryProvider, MemorySession, MEMORY_COOKIE_NAME};

/// A shared handle to a session.
pub type SessionRef = Arc<dyn Session>;

/// A session's state. Implementations use interior mutability: a session is
/// shared by every in-flight request carrying its id.
pub trait Session: Send + Sync {
    fn id(&self) -> &str;

    /// Push the expiry to `valid` from now.
    fn renew(&self, valid: Duration);

    fn invalidate(&self);

    fn invalidated(&self) -> bool;

    /// The expiry has passed.
    fn expired(&self) -> bool;

    fn get(&self, name: &str) -> Option<Value>;

    fn get_all(&self) -> Map<String, Value>;

    fn set(&self, name: &str, value: Value);

    /// Merge `data` into the attributes, replacing them all when `flush`.
    fn set_all(&self, data: Map<String, Value>, flush: bool);

    fn del(&self, name: &str);

    fn clear(&self);
}

/// Session store.
pub trait Provider: Send + Sync {
    /// Name of the cookie carrying the session id.
    fn cookie_name(&self) -> &str;

    /// Session id sent with `request`, if any.
    fn get_id(&self, request: &Request) -> Option<String> {
        request
            .cookie(self.cookie_name())
            .filter(|id| !id.is_empty())
    }

    fn exists(&self, id: &str) -> bool;

    fn get(&self, id: &str) -> Option<SessionRef>;

    fn del(&self, id: &str);

    fn get_all(&self) -> Vec<SessionRef>;

    fn clear(&self);

    /// Create and store a session valid for `config.valid`.
    fn new_session(&self, config: &SessionConfig, listener: &SessionListener) -> SessionRef;

    /// Renew `session` for another `config.valid`.
    fn refresh(&self, session: &SessionRef, config: &SessionConfig, listener: &SessionListener);

    /// Invalidate expired sessions and drop invalidated ones.
    fn clean(&self, config: &SessionConfig, listener: &SessionListener);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Lifetime granted on creation and on each request.
    pub valid: Duration,
    /// Period of the background cleanup loop.
    pub clean_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            valid: Duration::from_secs(30 * 60),
            clean_interval: Duration::from_secs(1),
        }
    }
}

/// Session lifecycle callback.
pub type SessionFn = Arc<dyn Fn(&dyn Session) + Send + Sync>;

/// Session lifecycle callbacks, all optional. Callbacks run synchronously on
/// the thread that triggered the event.
#[derive(Clone, Default)]
pub struct SessionListener {
    pub created: Option<SessionFn>,
    pub destroyed: Option<SessionFn>,
    pub invalidated: Option<SessionFn>,
    pub refreshed: Option<SessionFn>,
}

impl SessionListener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_created(mut self, f: impl Fn(&dyn Session) + Send + Sync + 'static) -> Self {
        self.created = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_destroyed(mut self, f: impl Fn(&dyn Session) + Send + Sync + 'static) -> Self {
        self.destroyed = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_invalidated(mut self, f: impl Fn(&dyn Session) + Send + Sync + 'static) -> Self {
        self.invalidated = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_refreshed(mut self, f: impl Fn(&dyn Session) + Send + Sync + 'static) -> Self {
        self.refreshed = Some(Arc::new(f));
        self
    }

    pub(crate) fn fire(callback: Option<&SessionFn>, session: &dyn Session) {
        if let Some(f) = callback {
            f(session);
        }
    }
}

impl fmt::Debug for SessionListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionListener")
            .field("created", &self.created.is_some())
            .field("destroyed", &self.destroyed.is_some())
            .field("invalidated", &self.invalidated.is_some())
            .field("refreshed", &self.refreshed.is_some())
            .finish()
    }
}

/// Context extension holding the request's session.
#[derive(Clone)]
pub struct CurrentSession(pub SessionRef);

/// The session attached by the session middleware.
#[must_use]
pub fn current(ctx: &Context) -> Option<SessionRef> {
    ctx.extensions()
        .get::<CurrentSession>()
        .map(|s| Arc::clone(&s.0))
}
