//! Turns a setup function into a live store.

use super::definition::{SetupContext, SetupFn, StateFactory};
use super::property::Property;
use super::store::{Store, StoreStyle};
use super::StoreId;
use crate::error::StoreError;
use crate::pantry::{Pantry, PluginContext};
use crate::runtime::EffectScope;

/// Build the store `id` and register it in `pantry`'s cache.
///
/// The caller must have marked `id` as under construction. If setup or a
/// plugin fails or panics, the half-built store is torn down and the marker
/// cleared.
pub(crate) fn build_store(
    id: &StoreId,
    setup: &SetupFn,
    pantry: &Pantry,
    style: StoreStyle,
    defaults: Option<StateFactory>,
) -> Result<Store, StoreError> {
    let scope = pantry
        .scope()
        .run(EffectScope::new)
        .ok_or(StoreError::PantryDisposed)?;

    let (state, seeded) = pantry.state().get_or_seed(id);
    let store = Store::shell(id.clone(), style, scope.clone(), state.clone(), defaults, pantry);
    let mut construction = Construction {
        pantry,
        id,
        scope: scope.clone(),
        seeded,
        cached: None,
        finished: false,
    };

    let context = SetupContext::new(&store, pantry);
    let properties = scope
        .run(|| setup(&context))
        .ok_or(StoreError::PantryDisposed)??;

    for (name, property) in properties {
        if let (Property::Cell(cell), StoreStyle::Setup) = (&property, style) {
            // A retained value from an earlier incarnation wins over the
            // setup's initial value.
            if let Some(existing) = state.cell(&name) {
                if !existing.ptr_eq(cell) {
                    cell.set(existing.get_untracked());
                }
            }
            state.insert_cell(name.clone(), cell.clone());
        }
        store.install(name, property, true);
    }

    pantry.finish_build(id, &store);
    construction.cached = Some(store.clone());

    for plugin in pantry.plugins() {
        let context = PluginContext::new(&store, pantry);
        let Some(extra) = scope.run(|| plugin(&context)).flatten() else {
            continue;
        };
        tracing::trace!(store = %id, properties = extra.len(), "plugin extended store");
        for (name, property) in extra {
            store.install(name, property, false);
        }
    }

    construction.finish();
    tracing::debug!(store = %id, ?style, members = store.keys().len(), "store built");
    Ok(store)
}

/// Tears down a store under construction when dropped before `finish`,
/// which also covers unwinding out of a panicking setup or plugin.
struct Construction<'a> {
    pantry: &'a Pantry,
    id: &'a StoreId,
    scope: EffectScope,
    seeded: bool,
    // Set once the store sits in the pantry's cache.
    cached: Option<Store>,
    finished: bool,
}

impl Construction<'_> {
    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for Construction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.cached.take() {
            Some(store) => store.dispose(),
            None => {
                self.scope.stop();
                self.pantry.abort_build(self.id);
            }
        }
        if self.seeded {
            self.pantry.state().remove(self.id.as_str());
        }
        tracing::debug!(store = %self.id, "store construction abandoned");
    }
}
