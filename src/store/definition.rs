//! Store definitions and the accessors that build stores on first use.

use super::action::Action;
use super::builder::build_store;
use super::property::{Properties, Property};
use super::state::StateEntry;
use super::store::{Store, StoreStyle, WeakStore};
use super::StoreId;
use crate::error::{value_kind, StoreError};
use crate::pantry::{active_pantry, Pantry};
use crate::signal::Memo;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Produces the initial state of a descriptor store. Must return an object.
pub type StateFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// Computes a derived value from the live store.
pub type Getter = Arc<dyn Fn(&Store) -> Value + Send + Sync>;

/// Setup function of a procedural store.
pub type SetupFn = Arc<dyn Fn(&SetupContext) -> Result<Properties, StoreError> + Send + Sync>;

/// What a setup function gets to work with.
pub struct SetupContext {
    store: Store,
    pantry: Pantry,
}

impl SetupContext {
    pub(crate) fn new(store: &Store, pantry: &Pantry) -> Self {
        Self {
            store: store.clone(),
            pantry: pantry.clone(),
        }
    }

    pub fn id(&self) -> &StoreId {
        self.store.id()
    }

    /// The store being built. Its members are installed after setup returns.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// A weak handle to the store being built, for closures the store keeps.
    pub fn weak_store(&self) -> WeakStore {
        self.store.downgrade()
    }

    pub fn pantry(&self) -> &Pantry {
        &self.pantry
    }

    /// The store's entry in the shared state tree.
    pub fn state(&self) -> StateEntry {
        self.store.state()
    }
}

/// Declarative store definition: a state factory, getters and actions.
///
/// ```
/// use pantry::{Descriptor, Store};
/// use serde_json::{json, Value};
///
/// let descriptor = Descriptor::new()
///     .state(|| json!({ "age": 10 }))
///     .getter("parent_age", |store: &Store| {
///         json!(store.get("age").and_then(|v| v.as_i64()).unwrap_or(0) + 18)
///     });
/// # let _ = descriptor;
/// ```
#[derive(Clone, Default)]
pub struct Descriptor {
    state: Option<StateFactory>,
    getters: IndexMap<String, Getter>,
    actions: IndexMap<String, Action>,
}

impl Descriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the state factory. It runs when the store is built and on reset.
    pub fn state<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.state = Some(Arc::new(factory));
        self
    }

    /// Add a getter. It receives the live store, so it can read state and
    /// other getters.
    pub fn getter<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&Store) -> Value + Send + Sync + 'static,
    {
        self.getters.insert(name.into(), Arc::new(getter));
        self
    }

    pub fn action(mut self, name: impl Into<String>, action: Action) -> Self {
        self.actions.insert(name.into(), action);
        self
    }

    fn defaults(&self) -> StateFactory {
        match &self.state {
            Some(factory) => Arc::clone(factory),
            None => Arc::new(|| Value::Object(Default::default())),
        }
    }

    /// Setup function equivalent to this descriptor.
    fn into_setup(self) -> SetupFn {
        let defaults = self.defaults();
        Arc::new(move |context: &SetupContext| {
            let entry = context.state();
            if entry.is_empty() {
                match defaults() {
                    Value::Object(fields) => entry.seed(fields),
                    other => {
                        return Err(StoreError::Setup {
                            store_id: context.id().clone(),
                            message: format!("state must be an object, found {}", value_kind(&other)),
                        })
                    }
                }
            }

            let mut properties: Properties = entry
                .cells()
                .into_iter()
                .map(|(key, cell)| (key, Property::Cell(cell)))
                .collect();

            for (name, action) in &self.actions {
                properties.insert(name.clone(), Property::Action(action.clone()));
            }

            for (name, getter) in &self.getters {
                let store = context.weak_store();
                let getter = Arc::clone(getter);
                let memo = Memo::new(move || match store.upgrade() {
                    Some(store) => getter(&store),
                    None => Value::Null,
                });
                properties.insert(name.clone(), Property::Derived(memo));
            }

            Ok(properties)
        })
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("state", &self.state.is_some())
            .field("getters", &self.getters.keys().collect::<Vec<_>>())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Accessor for one store id, returned by [`define_store`] and
/// [`define_setup_store`].
#[derive(Clone)]
pub struct StoreDefinition {
    id: StoreId,
    style: StoreStyle,
    setup: SetupFn,
    defaults: Option<StateFactory>,
}

/// Define a store from a descriptor.
pub fn define_store(id: impl Into<StoreId>, descriptor: Descriptor) -> StoreDefinition {
    let defaults = descriptor.defaults();
    StoreDefinition {
        id: id.into(),
        style: StoreStyle::Descriptor,
        setup: descriptor.into_setup(),
        defaults: Some(defaults),
    }
}

/// Define a store from a setup function.
///
/// ```
/// use pantry::{define_setup_store, Pantry, Properties, Property, Signal};
/// use serde_json::json;
///
/// let use_counter = define_setup_store("counter", |_ctx| {
///     let count = Signal::new(json!(20));
///     let double = {
///         let count = count.clone();
///         Property::derived(move || json!(count.get().as_i64().unwrap_or(0) * 2))
///     };
///     Ok(Properties::from([
///         ("count".to_string(), Property::Cell(count)),
///         ("double".to_string(), double),
///     ]))
/// });
///
/// let pantry = Pantry::new();
/// let counter = use_counter.use_store_in(&pantry).unwrap();
/// assert_eq!(counter.get("double"), Some(json!(40)));
/// ```
pub fn define_setup_store<F>(id: impl Into<StoreId>, setup: F) -> StoreDefinition
where
    F: Fn(&SetupContext) -> Result<Properties, StoreError> + Send + Sync + 'static,
{
    StoreDefinition {
        id: id.into(),
        style: StoreStyle::Setup,
        setup: Arc::new(setup),
        defaults: None,
    }
}

impl StoreDefinition {
    pub fn id(&self) -> &StoreId {
        &self.id
    }

    pub fn style(&self) -> StoreStyle {
        self.style
    }

    /// Get the store from `pantry`, building it on first use.
    ///
    /// Without an explicit pantry the active one is used. An explicit pantry
    /// becomes the active one.
    pub fn use_store(&self, pantry: Option<&Pantry>) -> Result<Store, StoreError> {
        let pantry = match pantry {
            Some(pantry) => {
                pantry.activate();
                pantry.clone()
            }
            None => active_pantry().ok_or(StoreError::NoActivePantry)?,
        };

        if let Some(store) = pantry.begin_build(&self.id)? {
            tracing::trace!(store = %self.id, "store cache hit");
            return Ok(store);
        }

        build_store(&self.id, &self.setup, &pantry, self.style, self.defaults.clone()).inspect_err(
            |err| {
                pantry.abort_build(&self.id);
                tracing::debug!(store = %self.id, error = %err, "store build failed");
            },
        )
    }

    /// Get the store from the given pantry.
    pub fn use_store_in(&self, pantry: &Pantry) -> Result<Store, StoreError> {
        self.use_store(Some(pantry))
    }

    /// Get the store from the active pantry.
    pub fn use_active(&self) -> Result<Store, StoreError> {
        self.use_store(None)
    }
}

impl fmt::Debug for StoreDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreDefinition")
            .field("id", &self.id)
            .field("style", &self.style)
            .finish()
    }
}
