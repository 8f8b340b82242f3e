use crate::runtime::untrack;
use crate::signal::Effect;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Watcher configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchOptions {
    /// Fire the callback once right away with the initial value.
    pub immediate: bool,
}

impl WatchOptions {
    /// Options with `immediate` set.
    pub fn immediate() -> Self {
        Self { immediate: true }
    }
}

/// Handle to a running watcher.
#[derive(Clone)]
pub struct WatchHandle {
    effect: Effect,
}

impl WatchHandle {
    /// Stop watching. The callback never fires again.
    pub fn stop(&self) {
        self.effect.stop();
    }
}

/// Watch a reactive source and call `callback` whenever it changes.
///
/// `source` runs under dependency tracking; `callback` runs untracked and
/// receives the freshly computed value. The watcher belongs to the current
/// [`EffectScope`](crate::EffectScope), if any.
///
/// ```
/// use pantry::{watch, Signal, WatchOptions};
/// use std::sync::{Arc, Mutex};
///
/// let count = Signal::new(1);
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let _handle = watch(
///     { let count = count.clone(); move || count.get() },
///     { let seen = seen.clone(); move |value: &i32| seen.lock().unwrap().push(*value) },
///     WatchOptions::default(),
/// );
///
/// count.set(2);
/// assert_eq!(*seen.lock().unwrap(), vec![2]);
/// ```
pub fn watch<T, S, C>(source: S, callback: C, options: WatchOptions) -> WatchHandle
where
    T: Send + Sync + 'static,
    S: Fn() -> T + Send + Sync + 'static,
    C: Fn(&T) + Send + Sync + 'static,
{
    let initial = Arc::new(AtomicBool::new(true));

    let effect = Effect::new(move || {
        let value = source();
        let first = initial.swap(false, Ordering::SeqCst);
        if !first || options.immediate {
            untrack(|| callback(&value));
        }
    });

    WatchHandle { effect }
}
