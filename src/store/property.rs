use super::action::Action;
use crate::signal::{Memo, Signal};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;

/// Ordered property table returned by setup functions and plugins.
pub type Properties = IndexMap<String, Property>;

/// A member of a store.
///
/// Setup functions return properties tagged by kind, and the store builder
/// dispatches on the tag: cells are mirrored into the state tree, actions
/// are wrapped with the store's hooks, derived values and plain values are
/// installed as they are.
#[derive(Clone)]
pub enum Property {
    /// Mutable reactive state.
    Cell(Signal<Value>),
    /// Read-only computed value.
    Derived(Memo<Value>),
    /// Callable action.
    Action(Action),
    /// Non-reactive value, typically contributed by a plugin.
    Plain(Value),
}

impl Property {
    /// A new cell holding `value`.
    pub fn cell(value: Value) -> Self {
        Property::Cell(Signal::new(value))
    }

    /// A new derived value computed by `compute`.
    pub fn derived<F>(compute: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Property::Derived(Memo::new(compute))
    }

    pub fn plain(value: Value) -> Self {
        Property::Plain(value)
    }

    /// Short name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Property::Cell(_) => "cell",
            Property::Derived(_) => "derived",
            Property::Action(_) => "action",
            Property::Plain(_) => "plain",
        }
    }

    /// Current value, tracked. Actions have none.
    pub fn value(&self) -> Option<Value> {
        match self {
            Property::Cell(cell) => Some(cell.get()),
            Property::Derived(memo) => Some(memo.get()),
            Property::Plain(value) => Some(value.clone()),
            Property::Action(_) => None,
        }
    }
}

impl From<Signal<Value>> for Property {
    fn from(cell: Signal<Value>) -> Self {
        Property::Cell(cell)
    }
}

impl From<Memo<Value>> for Property {
    fn from(memo: Memo<Value>) -> Self {
        Property::Derived(memo)
    }
}

impl From<Action> for Property {
    fn from(action: Action) -> Self {
        Property::Action(action)
    }
}

impl From<Value> for Property {
    fn from(value: Value) -> Self {
        Property::Plain(value)
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::Cell(cell) => f.debug_tuple("Cell").field(cell).finish(),
            Property::Derived(memo) => f.debug_tuple("Derived").field(&memo.id()).finish(),
            Property::Action(action) => f.debug_tuple("Action").field(action).finish(),
            Property::Plain(value) => f.debug_tuple("Plain").field(value).finish(),
        }
    }
}
