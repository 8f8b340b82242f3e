//! The shared state tree and per-store state entries.

use super::StoreId;
use crate::runtime::batch;
use crate::signal::Signal;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Deep-merge `patch` into `target`.
///
/// Recurses only where both sides are objects; anything else, arrays
/// included, replaces the old value outright.
pub fn merge_values(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, new_value) in patch {
                match target.get_mut(&key) {
                    Some(old_value) if old_value.is_object() && new_value.is_object() => {
                        merge_values(old_value, new_value);
                    }
                    _ => {
                        target.insert(key, new_value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

struct EntryInner {
    fields: RwLock<IndexMap<String, Signal<Value>>>,
    // Cells of removed fields. Store members may still hold them, so a field
    // written again gets its old cell back.
    detached: RwLock<IndexMap<String, Signal<Value>>>,
    // Bumped whenever a field is added, replaced or removed.
    shape: Signal<u64>,
}

/// Raw state of one store: one reactive cell per top-level field.
///
/// Reading a field only tracks that field's cell, so observers of one field
/// are not re-run when another changes. Listing or snapshotting the entry
/// also tracks its shape, so added and removed fields are observed.
#[derive(Clone)]
pub struct StateEntry {
    inner: Arc<EntryInner>,
}

impl StateEntry {
    /// An entry with no fields.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EntryInner {
                fields: RwLock::new(IndexMap::new()),
                detached: RwLock::new(IndexMap::new()),
                shape: Signal::new(0),
            }),
        }
    }

    /// An entry with one fresh cell per key of `fields`.
    pub fn from_map(fields: Map<String, Value>) -> Self {
        let entry = Self::new();
        entry.seed(fields);
        entry
    }

    pub(crate) fn seed(&self, fields: Map<String, Value>) {
        {
            let mut cells = self.inner.fields.write();
            for (key, value) in fields {
                cells.insert(key, Signal::new(value));
            }
        }
        self.bump_shape();
    }

    /// Current value of a field, tracked.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.shape.with(|_| ());
        self.cell(key).map(|cell| cell.get())
    }

    /// The cell backing a field.
    pub fn cell(&self, key: &str) -> Option<Signal<Value>> {
        self.inner.fields.read().get(key).cloned()
    }

    /// Every field cell, in insertion order.
    pub fn cells(&self) -> Vec<(String, Signal<Value>)> {
        self.inner
            .fields
            .read()
            .iter()
            .map(|(key, cell)| (key.clone(), cell.clone()))
            .collect()
    }

    /// Field names in insertion order, tracking the entry's shape.
    pub fn keys(&self) -> Vec<String> {
        self.inner.shape.with(|_| ());
        self.inner.fields.read().keys().cloned().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.fields.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.fields.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.fields.read().is_empty()
    }

    /// The whole state as a JSON object, tracking every field and the shape.
    pub fn snapshot(&self) -> Value {
        self.inner.shape.with(|_| ());
        let mut object = Map::new();
        for (key, cell) in self.cells() {
            object.insert(key, cell.get());
        }
        Value::Object(object)
    }

    /// The whole state as a map, without tracking.
    pub fn snapshot_untracked(&self) -> Map<String, Value> {
        self.cells()
            .into_iter()
            .map(|(key, cell)| (key, cell.get_untracked()))
            .collect()
    }

    /// Put `cell` under `key`, replacing any previous cell.
    pub(crate) fn insert_cell(&self, key: impl Into<String>, cell: Signal<Value>) {
        let key = key.into();
        self.inner.detached.write().shift_remove(&key);
        let previous = self.inner.fields.write().insert(key, cell.clone());
        match previous {
            Some(previous) if previous.ptr_eq(&cell) => {}
            _ => self.bump_shape(),
        }
    }

    /// Write one field. Returns whether anything changed.
    pub(crate) fn set_field(&self, key: &str, value: Value) -> bool {
        match self.cell(key) {
            Some(cell) => cell.set_if_changed(value),
            None => {
                let detached = self.inner.detached.write().shift_remove(key);
                let cell = match detached {
                    Some(cell) => {
                        cell.set_if_changed(value);
                        cell
                    }
                    None => Signal::new(value),
                };
                self.inner.fields.write().insert(key.to_owned(), cell);
                self.bump_shape();
                true
            }
        }
    }

    pub(crate) fn remove_field(&self, key: &str) -> bool {
        let removed = self.inner.fields.write().shift_remove(key);
        match removed {
            Some(cell) => {
                self.inner.detached.write().insert(key.to_owned(), cell);
                self.bump_shape();
                true
            }
            None => false,
        }
    }

    /// Deep-merge `partial` into the entry. Cells whose merged value equals
    /// the current one are left untouched.
    pub(crate) fn merge(&self, partial: Map<String, Value>) {
        batch(|| {
            for (key, new_value) in partial {
                let merged = match self.cell(&key) {
                    Some(cell) => {
                        let mut current = cell.get_untracked();
                        merge_values(&mut current, new_value);
                        current
                    }
                    None => new_value,
                };
                self.set_field(&key, merged);
            }
        });
    }

    /// Hand the raw state to `mutator`, then write back what it changed.
    pub(crate) fn mutate(&self, mutator: impl FnOnce(&mut Map<String, Value>)) {
        let before = self.snapshot_untracked();
        let mut after = before.clone();
        mutator(&mut after);

        batch(|| {
            for key in before.keys() {
                if !after.contains_key(key) {
                    self.remove_field(key);
                }
            }
            for (key, value) in after {
                self.set_field(&key, value);
            }
        });
    }

    /// Whether two handles refer to the same entry.
    pub fn ptr_eq(&self, other: &StateEntry) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn bump_shape(&self) {
        self.inner.shape.update(|version| *version += 1);
    }
}

impl Default for StateEntry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StateEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.snapshot_untracked()).finish()
    }
}

/// Reactive mapping from store id to that store's [`StateEntry`].
///
/// Owned by a [`Pantry`](crate::Pantry); entries are created by the store
/// builder and removed when a store is disposed.
#[derive(Clone)]
pub struct StateTree {
    entries: Arc<RwLock<IndexMap<StoreId, StateEntry>>>,
    shape: Signal<u64>,
}

impl StateTree {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(IndexMap::new())),
            shape: Signal::new(0),
        }
    }

    /// The entry of a store, tracking the tree's shape.
    pub fn get(&self, id: &str) -> Option<StateEntry> {
        self.shape.with(|_| ());
        self.entries.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    /// Ids of every store with state, in creation order.
    pub fn ids(&self) -> Vec<StoreId> {
        self.shape.with(|_| ());
        self.entries.read().keys().cloned().collect()
    }

    /// Every store's state as one JSON object keyed by store id.
    pub fn snapshot(&self) -> Value {
        self.shape.with(|_| ());
        let entries: Vec<_> = self
            .entries
            .read()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect();

        Value::Object(
            entries
                .into_iter()
                .map(|(id, entry)| (id.to_string(), entry.snapshot()))
                .collect(),
        )
    }

    pub(crate) fn insert(&self, id: StoreId, entry: StateEntry) {
        self.entries.write().insert(id, entry);
        self.shape.update(|version| *version += 1);
    }

    /// The entry for `id`, created empty if missing. The flag tells whether
    /// it was created by this call.
    pub(crate) fn get_or_seed(&self, id: &StoreId) -> (StateEntry, bool) {
        if let Some(entry) = self.entries.read().get(id) {
            return (entry.clone(), false);
        }
        let entry = StateEntry::new();
        self.insert(id.clone(), entry.clone());
        (entry, true)
    }

    pub(crate) fn remove(&self, id: &str) -> Option<StateEntry> {
        let removed = self.entries.write().shift_remove(id);
        if removed.is_some() {
            self.shape.update(|version| *version += 1);
        }
        removed
    }

    pub(crate) fn clear(&self) {
        self.entries.write().clear();
        self.shape.update(|version| *version += 1);
    }
}

impl Default for StateTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StateTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateTree")
            .field("ids", &self.entries.read().keys().collect::<Vec<_>>())
            .finish()
    }
}
