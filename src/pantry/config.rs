use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// What a synchronous action failure turns into when no `on_error` hook
/// handled it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnhandledActionErrors {
    /// Return the error to the caller.
    #[default]
    Propagate,
    /// Log it and return `null`.
    Swallow,
}

/// Pantry configuration.
///
/// # Example
///
/// ```json
/// {
///     "unhandled_action_errors": "swallow",
///     "retain_state_on_dispose": true
/// }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PantryConfig {
    pub unhandled_action_errors: UnhandledActionErrors,

    /// Keep a disposed store's state in the tree; the next store built for
    /// the same id picks it up instead of its initial state.
    pub retain_state_on_dispose: bool,
}

impl PantryConfig {
    /// Parse a configuration from JSON. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` on malformed JSON or unknown keys.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}
