//! Runtime support for reactive primitives.
//!
//! This module provides the infrastructure for dependency tracking,
//! batching, effect scopes and execution contexts.

mod context;
mod scope;

pub use context::{batch, untrack, ReactiveRuntime};
pub use scope::EffectScope;

pub(crate) use scope::{on_current_scope_stop, CleanupHandle};
