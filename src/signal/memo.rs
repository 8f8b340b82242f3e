use crate::runtime::{on_current_scope_stop, untrack, ReactiveRuntime};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// A memoized computed value that automatically tracks dependencies.
///
/// Memos recompute lazily: only on the first read after one of their
/// dependencies changed. A memo created inside an [`EffectScope`] stops
/// tracking when the scope stops and keeps returning its last value.
///
/// [`EffectScope`]: crate::EffectScope
#[derive(Clone)]
pub struct Memo<T> {
    compute: Arc<dyn Fn() -> T + Send + Sync>,
    cached: Arc<RwLock<Option<T>>>,
    stopped: Arc<AtomicBool>,
    id: usize,
    runtime: Weak<ReactiveRuntime>,
}

impl<T: Clone + Send + Sync + 'static> Memo<T> {
    /// Create a new memo with the given computation function.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let runtime = ReactiveRuntime::current();
        let id = runtime.next_id();

        // Register this as a memo with the runtime
        runtime.register_memo(id);

        let stopped = Arc::new(AtomicBool::new(false));
        {
            let stopped = stopped.clone();
            let runtime = Arc::downgrade(&runtime);
            on_current_scope_stop(move || {
                stopped.store(true, Ordering::SeqCst);
                if let Some(runtime) = runtime.upgrade() {
                    runtime.remove_observer(id);
                }
            });
        }

        Self {
            compute: Arc::new(compute),
            cached: Arc::new(RwLock::new(None)),
            stopped,
            id,
            runtime: Arc::downgrade(&runtime),
        }
    }

    /// Get the current value, recomputing if necessary.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Read the memoized value with a function without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let runtime = match self.runtime.upgrade() {
            Some(runtime) if !self.stopped.load(Ordering::SeqCst) => runtime,
            _ => return self.with_last(f),
        };

        // Track this read in the reactive context
        runtime.track_read(self.id);

        if !runtime.is_memo_dirty(self.id) {
            if let Some(value) = self.cached.read().as_ref() {
                return f(value);
            }
        }

        // Recompute within observer context to track dependencies
        runtime.clear_dependencies(self.id);
        let value = runtime.with_observer(self.id, || (self.compute)());
        runtime.mark_memo_clean(self.id);
        let result = f(&value);
        *self.cached.write() = Some(value);
        result
    }

    // Last cached value, computed untracked if there is none.
    fn with_last<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        if let Some(value) = self.cached.read().as_ref() {
            return f(value);
        }
        let value = untrack(|| (self.compute)());
        f(&value)
    }

    /// Get the memo's unique ID.
    pub fn id(&self) -> usize {
        self.id
    }
}

/// Create a new memoized computation.
///
/// # Example
///
/// ```
/// use pantry::{create_memo, Signal};
///
/// let count = Signal::new(5);
/// let doubled = create_memo({
///     let count = count.clone();
///     move || count.get() * 2
/// });
/// assert_eq!(doubled.get(), 10);
/// ```
pub fn create_memo<T, F>(compute: F) -> Memo<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Memo::new(compute)
}
