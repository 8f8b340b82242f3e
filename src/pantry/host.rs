use super::Pantry;

/// Key under which [`Pantry::install`] provides the pantry to a host.
pub const PANTRY_INJECTION_KEY: &str = "pantry";

/// Global property name under which [`Pantry::install`] exposes the pantry.
pub const PANTRY_GLOBAL_PROPERTY: &str = "$pantry";

/// An application that can host a pantry.
pub trait Host {
    /// Make `pantry` retrievable by dependency injection under `key`.
    fn provide(&mut self, key: &'static str, pantry: Pantry);

    /// Expose `pantry` to code that has no injection context.
    fn set_global_property(&mut self, name: &'static str, pantry: Pantry);
}
