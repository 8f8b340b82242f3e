use parking_lot::Mutex;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

type Cleanup = Box<dyn FnOnce() + Send>;

static NEXT_SCOPE_ID: AtomicUsize = AtomicUsize::new(0);
static NEXT_CLEANUP_KEY: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static SCOPE_STACK: RefCell<Vec<EffectScope>> = const { RefCell::new(Vec::new()) };
}

struct ScopeInner {
    id: usize,
    active: AtomicBool,
    cleanups: Mutex<Vec<(usize, Cleanup)>>,
    children: Mutex<Vec<EffectScope>>,
    parent: Option<Weak<ScopeInner>>,
}

/// Ownership boundary for reactive subscriptions.
///
/// Effects, memos and watchers created while a scope is current (see
/// [`EffectScope::run`]) are attached to it, and stopping the scope
/// releases all of them at once. Scopes nest: stopping a parent stops every
/// child first.
///
/// ```
/// use pantry::{EffectScope, Effect, Signal};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let count = Signal::new(0);
/// let runs = Arc::new(AtomicUsize::new(0));
/// let scope = EffectScope::detached();
///
/// scope.run(|| {
///     let (count, runs) = (count.clone(), runs.clone());
///     Effect::new(move || {
///         let _ = count.get();
///         runs.fetch_add(1, Ordering::SeqCst);
///     });
/// });
///
/// count.set(1);
/// assert_eq!(runs.load(Ordering::SeqCst), 2);
///
/// scope.stop();
/// count.set(2);
/// assert_eq!(runs.load(Ordering::SeqCst), 2);
/// ```
#[derive(Clone)]
pub struct EffectScope {
    inner: Arc<ScopeInner>,
}

impl EffectScope {
    /// Create a scope nested in the current scope, if there is one.
    pub fn new() -> Self {
        match Self::current() {
            Some(parent) => Self::child_of(&parent),
            None => Self::detached(),
        }
    }

    /// Create a scope with no parent.
    pub fn detached() -> Self {
        Self::build(None)
    }

    /// Create a scope owned by `parent`.
    ///
    /// A child of a stopped parent starts out stopped.
    pub fn child_of(parent: &EffectScope) -> Self {
        let scope = Self::build(Some(Arc::downgrade(&parent.inner)));
        if parent.is_active() {
            parent.inner.children.lock().push(scope.clone());
        } else {
            scope.inner.active.store(false, Ordering::SeqCst);
        }
        scope
    }

    fn build(parent: Option<Weak<ScopeInner>>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
                active: AtomicBool::new(true),
                cleanups: Mutex::new(Vec::new()),
                children: Mutex::new(Vec::new()),
                parent,
            }),
        }
    }

    /// The innermost scope currently running on this thread.
    pub fn current() -> Option<EffectScope> {
        SCOPE_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Whether the scope has not been stopped yet.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Run `f` with this scope as the current scope.
    ///
    /// Returns `None` without running `f` once the scope has been stopped.
    pub fn run<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce() -> R,
    {
        if !self.is_active() {
            tracing::debug!(scope = self.inner.id, "refusing to run inside a stopped scope");
            return None;
        }

        SCOPE_STACK.with(|stack| stack.borrow_mut().push(self.clone()));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        SCOPE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => Some(r),
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Register a cleanup to run when the scope stops.
    ///
    /// Runs `f` immediately if the scope is already stopped.
    pub fn on_stop<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.register_cleanup(f);
    }

    /// Like [`EffectScope::on_stop`], but returns a handle that can drop the
    /// cleanup before the scope stops. `None` when `f` already ran.
    pub(crate) fn register_cleanup<F>(&self, f: F) -> Option<CleanupHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.is_active() {
            f();
            return None;
        }

        let key = NEXT_CLEANUP_KEY.fetch_add(1, Ordering::Relaxed);
        self.inner.cleanups.lock().push((key, Box::new(f)));
        Some(CleanupHandle {
            scope: Arc::downgrade(&self.inner),
            key,
        })
    }

    #[cfg(test)]
    pub(crate) fn cleanup_count(&self) -> usize {
        self.inner.cleanups.lock().len()
    }

    /// Stop the scope: stop every child scope, then run every cleanup in
    /// registration order. Stopping twice is a no-op.
    pub fn stop(&self) {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            return;
        }

        let children = std::mem::take(&mut *self.inner.children.lock());
        for child in children {
            child.stop();
        }

        let cleanups = std::mem::take(&mut *self.inner.cleanups.lock());
        for (_, cleanup) in cleanups {
            cleanup();
        }

        if let Some(parent) = self.inner.parent.as_ref().and_then(Weak::upgrade) {
            parent
                .children
                .lock()
                .retain(|child| child.inner.id != self.inner.id);
        }
    }

    /// Whether two handles refer to the same scope.
    pub fn ptr_eq(&self, other: &EffectScope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for EffectScope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EffectScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectScope")
            .field("id", &self.inner.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// A cleanup registered on a scope, removable before the scope stops.
#[derive(Clone)]
pub(crate) struct CleanupHandle {
    scope: Weak<ScopeInner>,
    key: usize,
}

impl CleanupHandle {
    /// Drop the cleanup without running it.
    pub(crate) fn cancel(&self) {
        if let Some(scope) = self.scope.upgrade() {
            scope.cleanups.lock().retain(|(key, _)| *key != self.key);
        }
    }
}

/// Attach a cleanup to the current scope, if any.
pub(crate) fn on_current_scope_stop<F>(f: F) -> Option<CleanupHandle>
where
    F: FnOnce() + Send + 'static,
{
    EffectScope::current().and_then(|scope| scope.register_cleanup(f))
}
