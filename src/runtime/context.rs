use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Callback stored for an effect observer.
pub(crate) type ObserverFn = Arc<dyn Fn() + Send + Sync>;

/// Upper bound on flush rounds before a batch gives up on effects that keep
/// re-triggering each other.
const MAX_FLUSH_ROUNDS: usize = 100;

/// Ids are unique across every runtime so primitives created in one runtime
/// never alias nodes of another.
static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// Reactive context for tracking dependencies.
#[derive(Default)]
struct ReactiveContext {
    current_observer: Option<usize>,
    // Map from source ID (signal or memo) to the observers that read it.
    // Ordered by id, which is creation order.
    dependencies: HashMap<usize, BTreeSet<usize>>,
    // Map from observer ID to the sources it read during its last run
    observer_deps: HashMap<usize, HashSet<usize>>,
    // Map from effect ID to the effect function
    observers: HashMap<usize, ObserverFn>,
    // Map from memo ID to dirty state
    memo_dirty: HashMap<usize, bool>,
    // Effects currently executing; a running effect never re-triggers itself
    running: HashSet<usize>,
    batch_depth: usize,
    pending: BTreeSet<usize>,
}

impl ReactiveContext {
    fn clear_dependencies(&mut self, observer_id: usize) {
        if let Some(old_deps) = self.observer_deps.remove(&observer_id) {
            for source_id in old_deps {
                if let Some(deps) = self.dependencies.get_mut(&source_id) {
                    deps.remove(&observer_id);
                    if deps.is_empty() {
                        self.dependencies.remove(&source_id);
                    }
                }
            }
        }
    }

    /// Mark memos dirty transitively and collect the effects that must run.
    fn collect_stale(&mut self, source_id: usize, effects: &mut BTreeSet<usize>) {
        let Some(observers) = self.dependencies.get(&source_id).cloned() else {
            return;
        };

        for observer_id in observers {
            if let Some(dirty) = self.memo_dirty.get_mut(&observer_id) {
                if !*dirty {
                    *dirty = true;
                    self.collect_stale(observer_id, effects);
                }
            } else if self.observers.contains_key(&observer_id)
                && !self.running.contains(&observer_id)
            {
                effects.insert(observer_id);
            }
        }
    }
}

/// Reactive runtime managing the dependency graph between signals, memos
/// and effects.
///
/// Every thread owns a default runtime. Scoped runtimes can be pushed on top
/// of it for isolation. Reactive tracking is single-threaded: a runtime only
/// observes reads made on the thread that is running it.
///
/// # Examples
///
/// Using the thread's default runtime:
///
/// ```
/// use pantry::Signal;
///
/// let signal = Signal::new(42);
/// assert_eq!(signal.get(), 42);
/// ```
///
/// Using scoped runtimes for isolation:
///
/// ```
/// use pantry::runtime::ReactiveRuntime;
/// use pantry::Signal;
///
/// ReactiveRuntime::scope(|| {
///     let signal = Signal::new(0);
///     assert_eq!(signal.get(), 0);
/// });
/// // Runtime and all its state is dropped here
/// ```
pub struct ReactiveRuntime {
    context: Mutex<ReactiveContext>,
}

thread_local! {
    static DEFAULT_RUNTIME: Arc<ReactiveRuntime> = ReactiveRuntime::new();
    // Stack for scoped runtimes
    static RUNTIME_STACK: RefCell<Vec<Arc<ReactiveRuntime>>> = const { RefCell::new(Vec::new()) };
}

impl ReactiveRuntime {
    fn new() -> Arc<Self> {
        Arc::new(ReactiveRuntime {
            context: Mutex::new(ReactiveContext::default()),
        })
    }

    /// Run a function with a fresh isolated runtime.
    ///
    /// The runtime and all its state is dropped when the function returns.
    pub fn scope<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        Self::with_runtime(Self::new(), f)
    }

    /// The runtime used on this thread when no scoped runtime is active.
    pub fn thread_default() -> Arc<Self> {
        DEFAULT_RUNTIME.with(Arc::clone)
    }

    /// Get the current reactive runtime (scoped, or the thread default).
    pub fn current() -> Arc<Self> {
        RUNTIME_STACK
            .with(|stack| stack.borrow().last().cloned())
            .unwrap_or_else(Self::thread_default)
    }

    /// Run a function with a specific runtime as the current context.
    pub fn with_runtime<F, R>(runtime: Arc<Self>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().push(runtime);
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Clear all observers, dependencies and pending work from this runtime.
    pub fn clear(&self) {
        *self.context.lock() = ReactiveContext::default();
    }

    /// Generate the next unique ID for a reactive primitive.
    pub fn next_id(&self) -> usize {
        NEXT_ID.fetch_add(1, Ordering::Relaxed)
    }

    /// Track a read of a signal or memo by the current observer.
    pub fn track_read(&self, source_id: usize) {
        let mut ctx = self.context.lock();
        if let Some(current_observer) = ctx.current_observer {
            if current_observer == source_id {
                return;
            }
            ctx.dependencies
                .entry(source_id)
                .or_default()
                .insert(current_observer);
            ctx.observer_deps
                .entry(current_observer)
                .or_default()
                .insert(source_id);
        }
    }

    /// Notify everything that depends on a source.
    ///
    /// Dependent memos are marked dirty; dependent effects run immediately,
    /// or at the end of the enclosing batch.
    pub fn notify_observers(&self, source_id: usize) {
        let effects = {
            let mut ctx = self.context.lock();
            let mut effects = BTreeSet::new();
            ctx.collect_stale(source_id, &mut effects);
            if ctx.batch_depth > 0 {
                ctx.pending.extend(effects);
                return;
            }
            effects
        };

        for effect_id in effects {
            self.run_effect(effect_id);
        }
    }

    /// Register an effect function under `observer_id`.
    pub fn create_observer<F>(&self, observer_id: usize, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut ctx = self.context.lock();
        ctx.clear_dependencies(observer_id);
        ctx.observers.insert(observer_id, Arc::new(f));
    }

    /// Run a registered effect, re-collecting its dependencies.
    pub fn run_effect(&self, observer_id: usize) {
        let effect = {
            let mut ctx = self.context.lock();
            let Some(effect) = ctx.observers.get(&observer_id).cloned() else {
                return;
            };
            if !ctx.running.insert(observer_id) {
                return;
            }
            ctx.clear_dependencies(observer_id);
            effect
        };

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.with_observer(observer_id, || effect())
        }));

        self.context.lock().running.remove(&observer_id);

        if let Err(e) = result {
            std::panic::resume_unwind(e);
        }
    }

    /// Remove an observer (effect or memo) and every edge touching it.
    pub fn remove_observer(&self, observer_id: usize) {
        let mut ctx = self.context.lock();
        ctx.observers.remove(&observer_id);
        ctx.memo_dirty.remove(&observer_id);
        ctx.pending.remove(&observer_id);
        ctx.clear_dependencies(observer_id);
        // Memos are also sources
        if let Some(dependents) = ctx.dependencies.remove(&observer_id) {
            for dependent in dependents {
                if let Some(deps) = ctx.observer_deps.get_mut(&dependent) {
                    deps.remove(&observer_id);
                }
            }
        }
    }

    /// Run a function with a specific observer as the current context.
    pub fn with_observer<F, R>(&self, observer_id: usize, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.with_current(Some(observer_id), f)
    }

    /// Run a function without tracking any reads.
    pub fn untracked<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.with_current(None, f)
    }

    fn with_current<F, R>(&self, observer: Option<usize>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let prev = std::mem::replace(&mut self.context.lock().current_observer, observer);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        self.context.lock().current_observer = prev;

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Drop the dependencies an observer collected so far, before re-running it.
    pub fn clear_dependencies(&self, observer_id: usize) {
        self.context.lock().clear_dependencies(observer_id);
    }

    /// Register a memo and mark it as dirty initially.
    pub fn register_memo(&self, memo_id: usize) {
        self.context.lock().memo_dirty.insert(memo_id, true);
    }

    /// Check if a memo is dirty (needs recomputation).
    pub fn is_memo_dirty(&self, memo_id: usize) -> bool {
        self.context
            .lock()
            .memo_dirty
            .get(&memo_id)
            .copied()
            .unwrap_or(true)
    }

    /// Mark a memo as clean (after recomputation).
    pub fn mark_memo_clean(&self, memo_id: usize) {
        if let Some(dirty) = self.context.lock().memo_dirty.get_mut(&memo_id) {
            *dirty = false;
        }
    }

    /// Run `f`, deferring every effect it triggers until the outermost batch
    /// ends. Deferred effects run once each, in creation order.
    pub fn batch<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.context.lock().batch_depth += 1;

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        let outermost = {
            let mut ctx = self.context.lock();
            ctx.batch_depth -= 1;
            ctx.batch_depth == 0
        };

        match result {
            Ok(r) => {
                if outermost {
                    self.flush();
                }
                r
            }
            Err(e) => {
                if outermost {
                    self.context.lock().pending.clear();
                }
                std::panic::resume_unwind(e)
            }
        }
    }

    /// Whether a batch or a flush is open on this runtime.
    pub fn is_batching(&self) -> bool {
        self.context.lock().batch_depth > 0
    }

    fn flush(&self) {
        for _ in 0..MAX_FLUSH_ROUNDS {
            let pending = {
                let mut ctx = self.context.lock();
                if ctx.pending.is_empty() {
                    return;
                }
                ctx.batch_depth += 1;
                std::mem::take(&mut ctx.pending)
            };

            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                for effect_id in pending {
                    self.run_effect(effect_id);
                }
            }));

            self.context.lock().batch_depth -= 1;

            if let Err(e) = result {
                self.context.lock().pending.clear();
                std::panic::resume_unwind(e);
            }
        }

        let dropped = std::mem::take(&mut self.context.lock().pending);
        tracing::warn!(
            effects = dropped.len(),
            "effects kept re-triggering each other; dropping pending runs"
        );
    }
}

/// Run `f` inside a batch on the current runtime.
///
/// ```
/// use pantry::{batch, Effect, Signal};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let a = Signal::new(1);
/// let b = Signal::new(2);
/// let runs = Arc::new(AtomicUsize::new(0));
///
/// let _effect = Effect::new({
///     let (a, b, runs) = (a.clone(), b.clone(), runs.clone());
///     move || {
///         let _ = a.get() + b.get();
///         runs.fetch_add(1, Ordering::SeqCst);
///     }
/// });
///
/// batch(|| {
///     a.set(10);
///     b.set(20);
/// });
/// assert_eq!(runs.load(Ordering::SeqCst), 2);
/// ```
pub fn batch<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    ReactiveRuntime::current().batch(f)
}

/// Run `f` without registering any of its reads as dependencies.
pub fn untrack<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    ReactiveRuntime::current().untracked(f)
}
