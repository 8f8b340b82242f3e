use super::Pantry;
use crate::store::{Properties, Store};
use std::sync::Arc;

/// Extension invoked once for every store built after it was registered.
///
/// Whatever properties it returns are merged onto the store.
pub type Plugin = Arc<dyn Fn(&PluginContext) -> Option<Properties> + Send + Sync>;

/// What a plugin gets to see.
pub struct PluginContext {
    store: Store,
    pantry: Pantry,
}

impl PluginContext {
    pub(crate) fn new(store: &Store, pantry: &Pantry) -> Self {
        Self {
            store: store.clone(),
            pantry: pantry.clone(),
        }
    }

    /// The store just built; its own members are already installed.
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn pantry(&self) -> &Pantry {
        &self.pantry
    }
}
