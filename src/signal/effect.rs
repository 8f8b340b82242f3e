use crate::runtime::{on_current_scope_stop, CleanupHandle, ReactiveRuntime};
use std::sync::{Arc, Weak};

/// A side effect that runs when its dependencies change.
///
/// The effect runs once on creation to collect its dependencies and again
/// whenever any of them changes; dependencies are re-collected on every
/// run. Dropping the handle does not stop the effect: it lives until
/// [`Effect::stop`] is called or the [`EffectScope`] it was created in stops.
///
/// [`EffectScope`]: crate::EffectScope
///
/// # Examples
///
/// ```
/// use pantry::{Effect, Signal};
/// use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
///
/// let count = Signal::new(0);
/// let counter = Arc::new(AtomicUsize::new(0));
/// let counter_clone = counter.clone();
///
/// let _effect = Effect::new({
///     let count = count.clone();
///     move || {
///         let _ = count.get();
///         counter_clone.fetch_add(1, Ordering::SeqCst);
///     }
/// });
///
/// // Effect runs immediately
/// assert_eq!(counter.load(Ordering::SeqCst), 1);
///
/// count.set(1);
/// assert_eq!(counter.load(Ordering::SeqCst), 2);
/// ```
#[derive(Clone)]
pub struct Effect {
    id: usize,
    runtime: Weak<ReactiveRuntime>,
    // Registration in the owning scope, dropped by `stop`.
    cleanup: Option<CleanupHandle>,
}

impl Effect {
    /// Create a new effect that runs when dependencies change.
    pub fn new<F>(effect: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let runtime = ReactiveRuntime::current();
        let id = runtime.next_id();

        runtime.create_observer(id, effect);

        let weak = Arc::downgrade(&runtime);
        let cleanup = {
            let weak = weak.clone();
            on_current_scope_stop(move || {
                if let Some(runtime) = weak.upgrade() {
                    runtime.remove_observer(id);
                }
            })
        };
        let handle = Self {
            id,
            runtime: weak,
            cleanup,
        };

        // Run immediately within the observer context to track dependencies
        runtime.run_effect(id);

        handle
    }

    /// Manually run the effect, re-collecting its dependencies.
    pub fn run(&self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.run_effect(self.id);
        }
    }

    /// Detach the effect from everything it depends on.
    pub fn stop(&self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.remove_observer(self.id);
        }
        if let Some(cleanup) = &self.cleanup {
            cleanup.cancel();
        }
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> usize {
        self.id
    }
}

/// Create a new effect that runs when dependencies change.
pub fn create_effect<F>(effect: F) -> Effect
where
    F: Fn() + Send + Sync + 'static,
{
    Effect::new(effect)
}
