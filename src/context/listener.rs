use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use super::Context;

/// Callback invoked with a context at a lifecycle point.
pub type ListenerFn = Arc<dyn Fn(&Context) + Send + Sync>;

/// A pair of lifecycle callbacks.
///
/// `created` fires when the pool allocates a new context slot; `destroyed`
/// fires when a chain advances past its last handler.
#[derive(Clone, Default)]
pub struct Listener {
    pub created: Option<ListenerFn>,
    pub destroyed: Option<ListenerFn>,
}

impl Listener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_created<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context) + Send + Sync + 'static,
    {
        self.created = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_destroyed<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context) + Send + Sync + 'static,
    {
        self.destroyed = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("created", &self.created.is_some())
            .field("destroyed", &self.destroyed.is_some())
            .finish()
    }
}

/// Append-only set of context listeners, shared by a pool and its contexts.
///
/// Readers take a lock-free snapshot, so a listener added while a chain runs
/// is seen from the next lifecycle event on.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: ArcSwap<Vec<Arc<Listener>>>,
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Listener) {
        let listener = Arc::new(listener);
        self.listeners.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().map(Arc::clone));
            next.push(Arc::clone(&listener));
            next
        });
    }

    pub fn clear(&self) {
        self.listeners.store(Arc::new(Vec::new()));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn fire_created(&self, ctx: &Context) {
        for l in self.listeners.load_full().iter() {
            if let Some(f) = &l.created {
                f(ctx);
            }
        }
    }

    pub(crate) fn fire_destroyed(&self, ctx: &Context) {
        for l in self.listeners.load_full().iter() {
            if let Some(f) = &l.destroyed {
                f(ctx);
            }
        }
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("len", &self.len())
            .finish()
    }
}
