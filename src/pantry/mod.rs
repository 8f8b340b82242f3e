//! The root container holding every store.
//!
//! A [`Pantry`] owns the shared state tree, the plugin list, the cache of
//! live stores and a master effect scope that every store's scope is nested
//! in. Accessors find it either explicitly or through the per-thread active
//! slot.

mod active;
mod config;
mod host;
mod plugin;

pub use active::{active_pantry, clear_active_pantry, set_active_pantry};
pub use config::{PantryConfig, UnhandledActionErrors};
pub use host::{Host, PANTRY_GLOBAL_PROPERTY, PANTRY_INJECTION_KEY};
pub use plugin::{Plugin, PluginContext};

use crate::error::StoreError;
use crate::runtime::EffectScope;
use crate::store::{Properties, StateTree, Store, StoreId};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::{Arc, Weak};

enum Slot {
    // The store's setup is running; looking it up now is a cycle.
    Building,
    Ready(Store),
}

struct PantryInner {
    state: StateTree,
    plugins: RwLock<Vec<Plugin>>,
    stores: Mutex<IndexMap<StoreId, Slot>>,
    scope: EffectScope,
    config: PantryConfig,
}

/// Root container of stores.
///
/// Cloning yields another handle to the same pantry.
///
/// ```
/// use pantry::{define_store, Descriptor, Pantry};
/// use serde_json::json;
///
/// let pantry = Pantry::new();
/// pantry.activate();
///
/// let use_settings = define_store("settings", Descriptor::new().state(|| json!({"theme": "dark"})));
/// let settings = use_settings.use_active().unwrap();
/// assert_eq!(settings.get("theme"), Some(json!("dark")));
/// assert_eq!(pantry.state().snapshot(), json!({"settings": {"theme": "dark"}}));
/// ```
#[derive(Clone)]
pub struct Pantry {
    inner: Arc<PantryInner>,
}

#[derive(Clone)]
pub(crate) struct WeakPantry {
    inner: Weak<PantryInner>,
}

impl WeakPantry {
    pub(crate) fn upgrade(&self) -> Option<Pantry> {
        self.inner.upgrade().map(|inner| Pantry { inner })
    }
}

impl Pantry {
    pub fn new() -> Self {
        Self::with_config(PantryConfig::default())
    }

    pub fn with_config(config: PantryConfig) -> Self {
        Self {
            inner: Arc::new(PantryInner {
                state: StateTree::new(),
                plugins: RwLock::new(Vec::new()),
                stores: Mutex::new(IndexMap::new()),
                scope: EffectScope::detached(),
                config,
            }),
        }
    }

    pub fn config(&self) -> PantryConfig {
        self.inner.config
    }

    /// The shared state tree: every store's raw state, keyed by store id.
    pub fn state(&self) -> &StateTree {
        &self.inner.state
    }

    /// The master scope every store's scope is nested in.
    pub fn scope(&self) -> &EffectScope {
        &self.inner.scope
    }

    /// Register a plugin. It applies to stores built from now on.
    pub fn use_plugin<F>(&self, plugin: F) -> &Self
    where
        F: Fn(&PluginContext) -> Option<Properties> + Send + Sync + 'static,
    {
        self.inner.plugins.write().push(Arc::new(plugin));
        self
    }

    /// Registered plugins, in registration order.
    pub fn plugins(&self) -> Vec<Plugin> {
        self.inner.plugins.read().clone()
    }

    /// Make this the pantry accessors use when none is passed.
    pub fn activate(&self) {
        set_active_pantry(Some(self.clone()));
    }

    pub fn is_active(&self) -> bool {
        active_pantry().is_some_and(|active| active.ptr_eq(self))
    }

    /// Install into a host application: activate, provide under
    /// [`PANTRY_INJECTION_KEY`] and expose as [`PANTRY_GLOBAL_PROPERTY`].
    pub fn install<H: Host + ?Sized>(&self, host: &mut H) {
        self.activate();
        host.provide(PANTRY_INJECTION_KEY, self.clone());
        host.set_global_property(PANTRY_GLOBAL_PROPERTY, self.clone());
        tracing::debug!("pantry installed");
    }

    /// Whether a built store is cached under `id`.
    pub fn has_store(&self, id: &str) -> bool {
        matches!(self.inner.stores.lock().get(id), Some(Slot::Ready(_)))
    }

    /// The cached store for `id`, without building it.
    pub fn store(&self, id: &str) -> Option<Store> {
        match self.inner.stores.lock().get(id) {
            Some(Slot::Ready(store)) => Some(store.clone()),
            _ => None,
        }
    }

    /// Ids of every cached store, in build order.
    pub fn store_ids(&self) -> Vec<StoreId> {
        self.inner
            .stores
            .lock()
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ready(_)))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Dispose every store, drop every plugin and clear the state tree.
    pub fn dispose(&self) {
        let stores: Vec<Store> = self
            .inner
            .stores
            .lock()
            .values()
            .filter_map(|slot| match slot {
                Slot::Ready(store) => Some(store.clone()),
                Slot::Building => None,
            })
            .collect();

        for store in stores {
            store.dispose();
        }

        self.inner.scope.stop();
        self.inner.stores.lock().clear();
        self.inner.plugins.write().clear();
        self.inner.state.clear();

        if self.is_active() {
            clear_active_pantry();
        }
        tracing::debug!("pantry disposed");
    }

    pub fn ptr_eq(&self, other: &Pantry) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakPantry {
        WeakPantry {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Look `id` up, marking it as under construction on a miss.
    ///
    /// Returns the cached store on a hit and `None` when the caller must
    /// build it.
    pub(crate) fn begin_build(&self, id: &StoreId) -> Result<Option<Store>, StoreError> {
        if !self.inner.scope.is_active() {
            return Err(StoreError::PantryDisposed);
        }

        let mut stores = self.inner.stores.lock();
        match stores.get(id) {
            Some(Slot::Ready(store)) => Ok(Some(store.clone())),
            Some(Slot::Building) => Err(StoreError::Cycle(id.clone())),
            None => {
                stores.insert(id.clone(), Slot::Building);
                Ok(None)
            }
        }
    }

    pub(crate) fn finish_build(&self, id: &StoreId, store: &Store) {
        self.inner
            .stores
            .lock()
            .insert(id.clone(), Slot::Ready(store.clone()));
    }

    pub(crate) fn abort_build(&self, id: &StoreId) {
        let mut stores = self.inner.stores.lock();
        if matches!(stores.get(id), Some(Slot::Building)) {
            stores.shift_remove(id);
        }
    }

    /// Drop `store` from the cache if it is the one cached under its id.
    pub(crate) fn evict(&self, store: &Store) {
        let mut stores = self.inner.stores.lock();
        if let Some(Slot::Ready(cached)) = stores.get(store.id()) {
            if cached.ptr_eq(store) {
                stores.shift_remove(store.id());
            }
        }
    }
}

impl Default for Pantry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Pantry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pantry")
            .field("stores", &self.store_ids())
            .field("plugins", &self.inner.plugins.read().len())
            .field("config", &self.inner.config)
            .finish()
    }
}
