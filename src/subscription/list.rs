use crate::runtime::EffectScope;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Callback held by a [`SubscriptionList`].
pub type Callback<A, R> = Arc<dyn Fn(&A) -> R + Send + Sync>;

type Entries<A, R> = Mutex<Vec<(usize, Callback<A, R>)>>;

static NEXT_KEY: AtomicUsize = AtomicUsize::new(0);

/// Ordered list of listener callbacks.
///
/// Callbacks are invoked in registration order. The list is snapshotted
/// before a trigger, so a callback may add or remove subscriptions; those
/// changes take effect from the next trigger.
pub struct SubscriptionList<A, R = ()> {
    entries: Arc<Entries<A, R>>,
}

impl<A: 'static, R: 'static> SubscriptionList<A, R> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Append `callback`, bound to `scope`: it is removed when the scope
    /// stops. Registering on a stopped scope removes it again right away.
    pub fn add<F>(&self, scope: &EffectScope, callback: F) -> Subscription
    where
        F: Fn(&A) -> R + Send + Sync + 'static,
    {
        let key = self.push(callback);
        let entries = Arc::downgrade(&self.entries);
        let cleanup = {
            let entries = entries.clone();
            scope.register_cleanup(move || remove_entry(&entries, key))
        };

        Subscription::new(move || {
            remove_entry(&entries, key);
            if let Some(cleanup) = &cleanup {
                cleanup.cancel();
            }
        })
    }

    /// Append `callback` with no lifetime binding.
    pub fn add_unscoped<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&A) -> R + Send + Sync + 'static,
    {
        let key = self.push(callback);
        let entries = Arc::downgrade(&self.entries);
        Subscription::new(move || remove_entry(&entries, key))
    }

    fn push<F>(&self, callback: F) -> usize
    where
        F: Fn(&A) -> R + Send + Sync + 'static,
    {
        let key = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().push((key, Arc::new(callback)));
        key
    }

    /// Invoke every registered callback in order with `args`.
    ///
    /// Returns the value produced by the final callback, or `None` when the
    /// list is empty. Panics raised by callbacks propagate to the caller.
    pub fn trigger(&self, args: &A) -> Option<R> {
        let callbacks: Vec<Callback<A, R>> = self
            .entries
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        let mut last = None;
        for callback in callbacks {
            last = Some(callback(args));
        }
        last
    }

    /// Remove every callback.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no callback is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

fn remove_entry<A, R>(entries: &Weak<Entries<A, R>>, key: usize) {
    if let Some(entries) = entries.upgrade() {
        entries.lock().retain(|(k, _)| *k != key);
    }
}

impl<A: 'static, R: 'static> Default for SubscriptionList<A, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, R> Clone for SubscriptionList<A, R> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<A, R> fmt::Debug for SubscriptionList<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionList")
            .field("len", &self.entries.lock().len())
            .finish()
    }
}

/// Handle that removes a registration.
///
/// Dropping the handle keeps the registration alive; call
/// [`Subscription::unsubscribe`] to remove it early.
#[derive(Clone)]
pub struct Subscription {
    detach: Arc<dyn Fn() + Send + Sync>,
    done: Arc<AtomicBool>,
}

impl Subscription {
    /// Wrap a removal function. It runs at most once.
    pub fn new<F>(detach: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            detach: Arc::new(detach),
            done: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Remove the registration. Calling this again is a no-op.
    pub fn unsubscribe(&self) {
        if !self.done.swap(true, Ordering::SeqCst) {
            (self.detach)();
        }
    }

    /// Whether [`Subscription::unsubscribe`] already ran.
    pub fn is_unsubscribed(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("unsubscribed", &self.is_unsubscribed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_runs_in_order_and_returns_last() {
        let list: SubscriptionList<i32, i32> = SubscriptionList::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for factor in [1, 2, 3] {
            let log = log.clone();
            list.add_unscoped(move |n: &i32| {
                log.lock().push(factor);
                n * factor
            });
        }

        assert_eq!(list.trigger(&5), Some(15));
        assert_eq!(*log.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn empty_trigger_is_none() {
        let list: SubscriptionList<()> = SubscriptionList::new();
        assert_eq!(list.trigger(&()), None);
    }

    #[test]
    fn scope_stop_drops_callbacks() {
        let list: SubscriptionList<()> = SubscriptionList::new();
        let scope = EffectScope::detached();
        list.add(&scope, |_| ());
        list.add_unscoped(|_| ());
        assert_eq!(list.len(), 2);

        scope.stop();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn unsubscribe_releases_the_scope_cleanup() {
        let list: SubscriptionList<()> = SubscriptionList::new();
        let scope = EffectScope::detached();

        for _ in 0..10 {
            list.add(&scope, |_| ()).unsubscribe();
        }

        assert!(list.is_empty());
        assert_eq!(scope.cleanup_count(), 0);
    }

    #[test]
    fn adding_to_a_stopped_scope_is_immediately_removed() {
        let list: SubscriptionList<()> = SubscriptionList::new();
        let scope = EffectScope::detached();
        scope.stop();

        list.add(&scope, |_| ());
        assert!(list.is_empty());
    }

    #[test]
    fn unsubscribe_removes_only_its_callback() {
        let list: SubscriptionList<(), &'static str> = SubscriptionList::new();
        let first = list.add_unscoped(|_| "first");
        list.add_unscoped(|_| "second");

        first.unsubscribe();
        first.unsubscribe();
        assert!(first.is_unsubscribed());
        assert_eq!(list.len(), 1);
        assert_eq!(list.trigger(&()), Some("second"));
    }

    #[test]
    fn callbacks_added_during_trigger_wait_for_next_round() {
        let list: SubscriptionList<()> = SubscriptionList::new();
        let calls = Arc::new(AtomicUsize::new(0));
        {
            let (inner, calls) = (list.clone(), calls.clone());
            list.add_unscoped(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                let calls = calls.clone();
                inner.add_unscoped(move |_| {
                    calls.fetch_add(100, Ordering::SeqCst);
                });
            });
        }

        list.trigger(&());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        list.trigger(&());
        assert_eq!(calls.load(Ordering::SeqCst), 102);
    }
}
