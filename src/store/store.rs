use super::action::{invoke_wrapped, Action, ActionContext, ActionResult, Outcome};
use super::definition::StateFactory;
use super::property::Property;
use super::state::StateEntry;
use super::StoreId;
use crate::error::{value_kind, StoreError};
use crate::pantry::{Pantry, PantryConfig, WeakPantry};
use crate::runtime::{batch, EffectScope, ReactiveRuntime};
use crate::signal::{watch, WatchOptions};
use crate::subscription::{Subscription, SubscriptionList};
use futures::future::FutureExt;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// How a store was defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStyle {
    /// Declarative `state` / `getters` / `actions` descriptor.
    Descriptor,
    /// Imperative setup function.
    Setup,
}

/// What kind of write triggered a state subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationKind {
    /// A field was written directly.
    #[default]
    Direct,
    /// `patch` with a partial object.
    PatchObject,
    /// `patch` with a mutator function, `set_state` or `reset`.
    PatchFunction,
}

/// Passed to [`Store::subscribe`] callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationInfo {
    pub store_id: StoreId,
    pub kind: MutationKind,
}

/// Argument of [`Store::patch`].
pub enum Patch<'a> {
    /// Deep-merged into the state.
    Partial(Value),
    /// Receives the raw state and mutates it in place.
    Mutator(Box<dyn FnOnce(&mut Map<String, Value>) + 'a>),
}

impl<'a> Patch<'a> {
    pub fn mutator<F>(f: F) -> Self
    where
        F: FnOnce(&mut Map<String, Value>) + 'a,
    {
        Patch::Mutator(Box::new(f))
    }
}

impl From<Value> for Patch<'_> {
    fn from(value: Value) -> Self {
        Patch::Partial(value)
    }
}

impl From<Map<String, Value>> for Patch<'_> {
    fn from(map: Map<String, Value>) -> Self {
        Patch::Partial(Value::Object(map))
    }
}

type MutationSlot = Arc<Mutex<Option<MutationKind>>>;

/// The kind of the latest write, kept per state subscriber until that
/// subscriber fires. Inside an outer batch the last write's kind wins.
#[derive(Default)]
struct MutationSlots {
    slots: Mutex<Vec<Weak<Mutex<Option<MutationKind>>>>>,
}

impl MutationSlots {
    fn register(&self) -> MutationSlot {
        let slot = MutationSlot::default();
        let mut slots = self.slots.lock();
        slots.retain(|slot| slot.strong_count() > 0);
        slots.push(Arc::downgrade(&slot));
        slot
    }

    fn mark(&self, kind: MutationKind) {
        for slot in self.slots.lock().iter().filter_map(Weak::upgrade) {
            *slot.lock() = Some(kind);
        }
    }

    fn clear(&self) {
        for slot in self.slots.lock().iter().filter_map(Weak::upgrade) {
            *slot.lock() = None;
        }
    }
}

#[derive(Clone)]
pub(crate) struct Member {
    property: Property,
    // Whether calls go through the store's action hooks.
    hooked: bool,
}

pub(crate) struct StoreInner {
    id: StoreId,
    style: StoreStyle,
    scope: EffectScope,
    state: StateEntry,
    members: RwLock<IndexMap<String, Member>>,
    action_subscriptions: SubscriptionList<ActionContext>,
    defaults: Option<StateFactory>,
    pantry: WeakPantry,
    config: PantryConfig,
    disposed: AtomicBool,
    mutations: MutationSlots,
    // Runtime the store's cells, getters and watchers live in.
    runtime: Weak<ReactiveRuntime>,
}

/// A live store.
///
/// `Store` is a cheap handle; clones refer to the same store. Two handles
/// obtained for the same id from the same pantry are the same store
/// ([`Store::ptr_eq`]) until it is disposed.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

/// Non-owning store handle, for closures kept inside the store itself.
#[derive(Clone)]
pub struct WeakStore {
    inner: Weak<StoreInner>,
}

impl WeakStore {
    pub fn upgrade(&self) -> Option<Store> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

impl Store {
    pub(crate) fn shell(
        id: StoreId,
        style: StoreStyle,
        scope: EffectScope,
        state: StateEntry,
        defaults: Option<StateFactory>,
        pantry: &Pantry,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                id,
                style,
                scope,
                state,
                members: RwLock::new(IndexMap::new()),
                action_subscriptions: SubscriptionList::new(),
                defaults,
                pantry: pantry.downgrade(),
                config: pantry.config(),
                disposed: AtomicBool::new(false),
                mutations: MutationSlots::default(),
                runtime: Arc::downgrade(&ReactiveRuntime::current()),
            }),
        }
    }

    pub(crate) fn install(&self, name: String, property: Property, hooked: bool) {
        self.inner
            .members
            .write()
            .insert(name, Member { property, hooked });
    }

    pub(crate) fn scope(&self) -> &EffectScope {
        &self.inner.scope
    }

    pub fn id(&self) -> &StoreId {
        &self.inner.id
    }

    pub fn style(&self) -> StoreStyle {
        self.inner.style
    }

    /// The pantry that built this store, while it is alive.
    pub fn pantry(&self) -> Option<Pantry> {
        self.inner.pantry.upgrade()
    }

    pub fn downgrade(&self) -> WeakStore {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether two handles refer to the same store.
    pub fn ptr_eq(&self, other: &Store) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    fn ensure_active(&self) -> Result<(), StoreError> {
        if self.is_disposed() {
            Err(StoreError::Disposed(self.inner.id.clone()))
        } else {
            Ok(())
        }
    }

    fn member(&self, name: &str) -> Option<Member> {
        self.inner.members.read().get(name).cloned()
    }

    /// A member by name.
    pub fn property(&self, name: &str) -> Option<Property> {
        self.member(name).map(|member| member.property)
    }

    /// Member names in installation order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.members.read().keys().cloned().collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.inner.members.read().contains_key(name) || self.inner.state.contains(name)
    }

    /// Read a state field, derived value or plain value. Reads are tracked.
    ///
    /// State fields added later by a patch are found through the state
    /// entry. Actions have no value.
    pub fn get(&self, name: &str) -> Option<Value> {
        match self.member(name) {
            Some(member) => member.property.value(),
            None => self.inner.state.get(name),
        }
    }

    /// Write a state field.
    pub fn set(&self, name: &str, value: Value) -> Result<(), StoreError> {
        self.ensure_active()?;
        match self.member(name) {
            Some(Member {
                property: Property::Cell(cell),
                ..
            }) => {
                self.with_mutation(MutationKind::Direct, || cell.set_if_changed(value));
                Ok(())
            }
            Some(_) => Err(StoreError::ReadOnly {
                store_id: self.inner.id.clone(),
                name: name.to_owned(),
            }),
            None if self.inner.state.contains(name) => {
                self.with_mutation(MutationKind::Direct, || {
                    self.inner.state.set_field(name, value)
                });
                Ok(())
            }
            None => Err(StoreError::UnknownProperty {
                store_id: self.inner.id.clone(),
                name: name.to_owned(),
            }),
        }
    }

    /// Call an action.
    ///
    /// Actions from the store's definition run inside the `on_action` hooks;
    /// actions contributed by plugins are called as they are.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<ActionResult, StoreError> {
        let Some(member) = self.member(name) else {
            return Err(StoreError::UnknownProperty {
                store_id: self.inner.id.clone(),
                name: name.to_owned(),
            });
        };
        let Property::Action(action) = member.property else {
            return Err(StoreError::NotAnAction {
                store_id: self.inner.id.clone(),
                name: name.to_owned(),
            });
        };

        if member.hooked {
            invoke_wrapped(
                self,
                name,
                &action,
                args,
                &self.inner.action_subscriptions,
                self.inner.config.unhandled_action_errors,
            )
        } else {
            self.call_unhooked(name, &action, args)
        }
    }

    fn call_unhooked(
        &self,
        name: &str,
        action: &Action,
        args: &[Value],
    ) -> Result<ActionResult, StoreError> {
        let store_id = self.inner.id.clone();
        let action_name = name.to_owned();
        match action.invoke(self, args) {
            Ok(Outcome::Ready(value)) => Ok(ActionResult::Ready(value)),
            Ok(Outcome::Pending(future)) => Ok(ActionResult::Pending(
                future
                    .map(move |result| {
                        result.map_err(|source| StoreError::Action {
                            store_id,
                            action: action_name,
                            source,
                        })
                    })
                    .boxed(),
            )),
            Err(source) => Err(StoreError::Action {
                store_id,
                action: action_name,
                source,
            }),
        }
    }

    /// The live state entry of this store.
    pub fn state(&self) -> StateEntry {
        self.inner.state.clone()
    }

    /// Assign every top-level key of `state` over the current state.
    ///
    /// The entry itself is kept, so cells and anything holding them stay
    /// valid; keys missing from `state` are left as they are.
    pub fn set_state(&self, state: Value) -> Result<(), StoreError> {
        let Value::Object(fields) = state else {
            return Err(self.invalid_patch(&state));
        };
        self.patch_with(move |current| {
            for (key, value) in fields {
                current.insert(key, value);
            }
        })
    }

    /// Apply a partial object or a mutator to the state.
    pub fn patch<'a>(&self, patch: impl Into<Patch<'a>>) -> Result<(), StoreError> {
        match patch.into() {
            Patch::Partial(partial) => self.patch_object(partial),
            Patch::Mutator(mutator) => self.patch_with(mutator),
        }
    }

    /// Deep-merge `partial` into the state.
    ///
    /// Objects are merged key by key; any other value, arrays included,
    /// replaces what was there. Unchanged fields are not written.
    pub fn patch_object(&self, partial: Value) -> Result<(), StoreError> {
        self.ensure_active()?;
        let Value::Object(partial) = partial else {
            return Err(self.invalid_patch(&partial));
        };
        self.with_mutation(MutationKind::PatchObject, || {
            self.inner.state.merge(partial)
        });
        Ok(())
    }

    /// Let `mutator` edit the raw state in place.
    pub fn patch_with<F>(&self, mutator: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        self.ensure_active()?;
        self.with_mutation(MutationKind::PatchFunction, || {
            self.inner.state.mutate(mutator)
        });
        Ok(())
    }

    /// Restore the state produced by the descriptor's state factory.
    ///
    /// Fields are assigned over the current ones; cells are kept.
    pub fn reset(&self) -> Result<(), StoreError> {
        self.ensure_active()?;
        let Some(defaults) = &self.inner.defaults else {
            return Err(StoreError::ResetUnsupported(self.inner.id.clone()));
        };
        let defaults = defaults();
        self.set_state(defaults)
    }

    /// Call `callback` after every change to this store's state.
    ///
    /// The callback receives what kind of write happened and a snapshot of
    /// the new state. It fires once per patch. The watcher belongs to the
    /// store and stops when the store is disposed.
    pub fn subscribe<F>(&self, callback: F, options: WatchOptions) -> Result<Subscription, StoreError>
    where
        F: Fn(&MutationInfo, &Value) + Send + Sync + 'static,
    {
        self.ensure_active()?;
        let entry = self.inner.state.clone();
        let store_id = self.inner.id.clone();
        let slot = self.inner.mutations.register();

        let handle = self
            .in_runtime(|| {
                self.inner.scope.run(|| {
                    watch(
                        move || entry.snapshot(),
                        move |state: &Value| {
                            let info = MutationInfo {
                                store_id: store_id.clone(),
                                kind: slot.lock().take().unwrap_or_default(),
                            };
                            callback(&info, state);
                        },
                        options,
                    )
                })
            })
            .ok_or_else(|| StoreError::Disposed(self.inner.id.clone()))?;

        Ok(Subscription::new(move || handle.stop()))
    }

    /// Call `callback` before every action of this store runs.
    pub fn on_action<F>(&self, callback: F) -> Result<Subscription, StoreError>
    where
        F: Fn(&ActionContext) + Send + Sync + 'static,
    {
        self.ensure_active()?;
        Ok(self
            .inner
            .action_subscriptions
            .add(&self.inner.scope, callback))
    }

    /// Tear the store down.
    ///
    /// Stops every effect, memo and watcher of the store, drops its action
    /// subscribers, evicts it from its pantry and, unless the pantry retains
    /// state, removes its state entry. The next lookup of the id builds a
    /// new store. Disposing twice is a no-op.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.inner.scope.stop();
        self.inner.action_subscriptions.clear();

        if let Some(pantry) = self.pantry() {
            pantry.evict(self);
            if !self.inner.config.retain_state_on_dispose {
                pantry.state().remove(self.id().as_str());
            }
        }

        tracing::debug!(store = %self.inner.id, "store disposed");
    }

    fn with_mutation<R>(&self, kind: MutationKind, f: impl FnOnce() -> R) -> R {
        self.in_runtime(|| {
            self.inner.mutations.mark(kind);
            let result = batch(f);
            // Subscribers already fired unless an outer batch is still open.
            if !ReactiveRuntime::current().is_batching() {
                self.inner.mutations.clear();
            }
            result
        })
    }

    /// Run `f` with the store's runtime as the current one, whatever thread
    /// this is.
    fn in_runtime<R>(&self, f: impl FnOnce() -> R) -> R {
        match self.inner.runtime.upgrade() {
            Some(runtime) => ReactiveRuntime::with_runtime(runtime, f),
            None => f(),
        }
    }

    fn invalid_patch(&self, found: &Value) -> StoreError {
        StoreError::InvalidPatch {
            store_id: self.inner.id.clone(),
            found: value_kind(found),
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("style", &self.inner.style)
            .field("members", &self.keys())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
