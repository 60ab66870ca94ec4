use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::trace;

use super::{Context, ListenerRegistry};

/// Default number of idle contexts kept for reuse.
pub const DEFAULT_MAX_IDLE: usize = 1024;

/// Free list of reusable [`Context`]s.
///
/// [`ContextPool::acquire`] hands out a context owned by exactly one request;
/// dropping the returned guard clears the context and puts it back. New slots
/// fire the registry's `created` listeners.
pub struct ContextPool {
    free: Mutex<Vec<Box<Context>>>,
    listeners: Arc<ListenerRegistry>,
    max_idle: usize,
    created: AtomicUsize,
}

impl ContextPool {
    #[must_use]
    pub fn new(listeners: Arc<ListenerRegistry>, max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            listeners,
            max_idle,
            created: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    /// Take an idle context, or create one.
    pub fn acquire(&self) -> PooledContext<'_> {
        let reused = self.lock().pop();
        let ctx = reused.unwrap_or_else(|| {
            let n = self.created.fetch_add(1, Ordering::Relaxed) + 1;
            trace!(contexts_created = n, "Allocating new request context");
            Box::new(Context::new(Arc::clone(&self.listeners)))
        });
        PooledContext {
            pool: self,
            ctx: Some(ctx),
        }
    }

    fn release(&self, mut ctx: Box<Context>) {
        ctx.reset();
        let mut free = self.lock();
        if free.len() < self.max_idle {
            free.push(ctx);
        }
    }

    /// Contexts currently idle in the pool.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.lock().len()
    }

    /// Contexts created over the pool's lifetime.
    #[must_use]
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Box<Context>>> {
        // A panic while holding the lock cannot leave the free list half-updated
        self.free.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for ContextPool {
    fn default() -> Self {
        Self::new(Arc::new(ListenerRegistry::new()), DEFAULT_MAX_IDLE)
    }
}

/// A context checked out of a [`ContextPool`]; returned on drop.
pub struct PooledContext<'a> {
    pool: &'a ContextPool,
    ctx: Option<Box<Context>>,
}

impl Deref for PooledContext<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        // Only None during drop
        #[allow(clippy::expect_used)]
        self.ctx.as_deref().expect("pooled context present")
    }
}

impl DerefMut for PooledContext<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        #[allow(clippy::expect_used)]
        self.ctx.as_deref_mut().expect("pooled context present")
    }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            self.pool.release(ctx);
        }
    }
}
