//! Stores: named bundles of state, derived values and actions.
//!
//! A store is defined once with [`define_store`] (descriptor) or
//! [`define_setup_store`] (setup function) and built lazily the first time
//! its accessor runs against a [`Pantry`](crate::Pantry). Building wires
//! the store's state into the pantry's shared state tree, wraps its actions
//! with the `on_action` hooks and applies every registered plugin.

mod action;
mod builder;
mod definition;
mod id;
mod property;
mod state;
mod store;

pub use action::{Action, ActionContext, ActionFuture, ActionResult};
pub use definition::{
    define_setup_store, define_store, Descriptor, Getter, SetupContext, SetupFn, StateFactory,
    StoreDefinition,
};
pub use id::StoreId;
pub use property::{Properties, Property};
pub use state::{merge_values, StateEntry, StateTree};
pub use store::{MutationInfo, MutationKind, Patch, Store, StoreStyle, WeakStore};
