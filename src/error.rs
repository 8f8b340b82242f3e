//! Error types.

use crate::store::StoreId;
use serde_json::Value;
use thiserror::Error;

/// Failure raised by an action body.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ActionError {
    message: String,
    payload: Option<Value>,
}

impl ActionError {
    /// Create an error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            payload: None,
        }
    }

    /// Attach structured data for hooks to inspect.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }
}

/// Errors reported by stores, definitions and the pantry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("no pantry is active; create one and call `activate()` or pass it explicitly")]
    NoActivePantry,

    #[error("the pantry has been disposed")]
    PantryDisposed,

    #[error("store `{0}` was requested while it is still being built")]
    Cycle(StoreId),

    #[error("store `{store_id}`: patch expects an object, found {found}")]
    InvalidPatch { store_id: StoreId, found: &'static str },

    #[error("store `{store_id}` has no property `{name}`")]
    UnknownProperty { store_id: StoreId, name: String },

    #[error("store `{store_id}`: property `{name}` is read-only")]
    ReadOnly { store_id: StoreId, name: String },

    #[error("store `{store_id}`: property `{name}` is not an action")]
    NotAnAction { store_id: StoreId, name: String },

    #[error("store `{0}` was built from a setup function and cannot be reset")]
    ResetUnsupported(StoreId),

    #[error("store `{0}` has been disposed")]
    Disposed(StoreId),

    #[error("store `{store_id}`: action `{action}` failed: {source}")]
    Action {
        store_id: StoreId,
        action: String,
        #[source]
        source: ActionError,
    },

    #[error("store `{store_id}`: setup failed: {message}")]
    Setup { store_id: StoreId, message: String },
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid pantry configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Name of a JSON value's kind, for error messages.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
