use crate::runtime::ReactiveRuntime;
use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, Weak};

/// A reactive cell that holds a value and notifies dependents when changed.
///
/// Cloning a signal yields another handle to the same cell. A signal stays
/// bound to the runtime it was created in: reads and writes made on other
/// threads are tracked and notified there.
#[derive(Clone)]
pub struct Signal<T> {
    value: Arc<RwLock<T>>,
    id: usize,
    runtime: Weak<ReactiveRuntime>,
}

impl<T: Clone + Send + Sync + 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(initial: T) -> Self {
        let runtime = ReactiveRuntime::current();
        let id = runtime.next_id();

        Self {
            value: Arc::new(RwLock::new(initial)),
            id,
            runtime: Arc::downgrade(&runtime),
        }
    }

    fn track(&self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.track_read(self.id);
        }
    }

    fn notify(&self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.notify_observers(self.id);
        }
    }

    /// Get the current value of the signal, tracking the read.
    pub fn get(&self) -> T {
        self.track();
        self.value.read().clone()
    }

    /// Get the current value without registering a dependency.
    pub fn get_untracked(&self) -> T {
        self.value.read().clone()
    }

    /// Set a new value and notify dependents.
    pub fn set(&self, new_value: T) {
        *self.value.write() = new_value;
        self.notify();
    }

    /// Update the value in place and notify dependents.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        {
            let mut value = self.value.write();
            f(&mut value);
        }
        self.notify();
    }

    /// Read the value with a function without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        let value = self.value.read();
        f(&value)
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Whether two handles refer to the same cell.
    pub fn ptr_eq(&self, other: &Signal<T>) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Signal<T> {
    /// Set a new value, notifying dependents only if it differs from the
    /// current one. Returns whether the value changed.
    pub fn set_if_changed(&self, new_value: T) -> bool {
        {
            let mut value = self.value.write();
            if *value == new_value {
                return false;
            }
            *value = new_value;
        }
        self.notify();
        true
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value", &*self.value.read())
            .finish()
    }
}
