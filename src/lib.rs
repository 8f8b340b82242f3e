//! # Pantry
//!
//! Reactive application-state stores for Rust.
//!
//! Pantry keeps a registry of named stores, each holding mutable state,
//! derived values and actions, with centralized mutation tracking,
//! subscriptions and plugins.
//!
//! ## Signals (Low-level primitives)
//!
//! Fine-grained reactive primitives the stores are built on:
//! - `Signal<T>` - Reactive values that notify dependents when changed
//! - `Memo<T>` - Computed values that automatically track dependencies
//! - `Effect` - Side effects that run when dependencies change
//! - `EffectScope` - Owns effects and memos so they can be torn down together
//!
//! ## Stores (High-level state management)
//!
//! - `define_store` / `define_setup_store` - Describe a store once, build it lazily
//! - `Store` - State fields, getters and actions, with `patch`, `subscribe`,
//!   `on_action` and `dispose`
//! - `Pantry` - Root container: shared state tree, plugins, store cache
//!
//! ```
//! use pantry::{define_store, Action, Descriptor, Pantry, Store, WatchOptions};
//! use serde_json::{json, Value};
//!
//! let use_counter = define_store(
//!     "counter",
//!     Descriptor::new()
//!         .state(|| json!({ "count": 0 }))
//!         .getter("double", |store: &Store| {
//!             json!(store.get("count").and_then(|v| v.as_i64()).unwrap_or(0) * 2)
//!         })
//!         .action("increment", Action::new(|store: &Store, _: &[Value]| {
//!             store
//!                 .patch_with(|state| {
//!                     let count = state["count"].as_i64().unwrap_or(0);
//!                     state.insert("count".into(), json!(count + 1));
//!                 })
//!                 .map_err(|e| pantry::ActionError::new(e.to_string()))?;
//!             Ok(Value::Null)
//!         })),
//! );
//!
//! let pantry = Pantry::new();
//! let counter = use_counter.use_store_in(&pantry).unwrap();
//!
//! counter.call("increment", &[]).unwrap();
//! assert_eq!(counter.get("count"), Some(json!(1)));
//! assert_eq!(counter.get("double"), Some(json!(2)));
//! ```

pub mod error;
pub mod pantry;
pub mod runtime;
pub mod signal;
pub mod store;
pub mod subscription;

// Re-export main types for convenience
pub use error::{ActionError, ConfigError, StoreError};
pub use pantry::{
    active_pantry, clear_active_pantry, set_active_pantry, Host, Pantry, PantryConfig,
    PluginContext, UnhandledActionErrors,
};
pub use runtime::{batch, untrack, EffectScope};
pub use signal::{create_effect, create_memo, watch, Effect, Memo, Signal, WatchHandle, WatchOptions};
pub use store::{
    define_setup_store, define_store, Action, ActionContext, ActionResult, Descriptor,
    MutationInfo, MutationKind, Patch, Properties, Property, SetupContext, StateEntry, StateTree,
    Store, StoreDefinition, StoreId, WeakStore,
};
pub use subscription::{Subscription, SubscriptionList};
