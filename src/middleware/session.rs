use std::sync::{Arc, Weak};

use chrono::Utc;
use tracing::{debug, warn};

use super::Middleware;
use crate::context::{Context, Cookie, Handler};
use crate::session::{CurrentSession, Provider, SessionConfig, SessionListener};

/// Attaches a session to every request.
///
/// The id comes from the provider's cookie. A known session is refreshed,
/// otherwise a new one is created. The session is stored in the context
/// extensions (read it with [`session::current`](crate::session::current))
/// and the cookie is re-sent with `Path=/` and a fresh expiry.
pub struct SessionMiddleware {
    provider: Arc<dyn Provider>,
    config: SessionConfig,
    listener: SessionListener,
}

impl SessionMiddleware {
    /// Create the middleware and start the provider's cleanup loop.
    ///
    /// The loop runs every `config.clean_interval` on a background thread
    /// and ends once the last other handle to `provider` is dropped.
    #[must_use]
    pub fn new(provider: Arc<dyn Provider>, config: SessionConfig, listener: SessionListener) -> Self {
        spawn_cleaner(Arc::downgrade(&provider), config, listener.clone());
        Self {
            provider,
            config,
            listener,
        }
    }
}

fn spawn_cleaner(provider: Weak<dyn Provider>, config: SessionConfig, listener: SessionListener) {
    let spawned = std::thread::Builder::new()
        .name("brrtweb-session-clean".to_string())
        .spawn(move || loop {
            std::thread::sleep(config.clean_interval);
            let Some(provider) = provider.upgrade() else {
                debug!("Session provider dropped, cleanup loop exiting");
                return;
            };
            provider.clean(&config, &listener);
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Failed to spawn session cleanup thread");
    }
}

impl Middleware for SessionMiddleware {
    fn handler(&self) -> Handler {
        let provider = Arc::clone(&self.provider);
        let config = self.config;
        let listener = self.listener.clone();
        Arc::new(move |ctx: &mut Context| {
            let existing = provider
                .get_id(ctx.request())
                .and_then(|id| provider.get(&id));
            let session = match existing {
                Some(session) => {
                    provider.refresh(&session, &config, &listener);
                    session
                }
                None => provider.new_session(&config, &listener),
            };
            let expires = chrono::Duration::from_std(config.valid)
                .ok()
                .and_then(|valid| Utc::now().checked_add_signed(valid))
                .unwrap_or_else(Utc::now);
            ctx.add_cookie(
                Cookie::new(provider.cookie_name(), session.id())
                    .path("/")
                    .expires(expires),
            );
            ctx.extensions_mut().insert(CurrentSession(session));
            ctx.next()
        })
    }
}
