//! The implicit pantry used by accessors called without one.
//!
//! The slot is per thread, like the reactive runtime the pantry's stores
//! run on. It is set by [`Pantry::activate`] and [`Pantry::install`], read
//! by [`StoreDefinition::use_active`], and can be cleared between tests.
//!
//! [`StoreDefinition::use_active`]: crate::StoreDefinition::use_active

use super::Pantry;
use std::cell::RefCell;

thread_local! {
    static ACTIVE_PANTRY: RefCell<Option<Pantry>> = const { RefCell::new(None) };
}

/// Replace the active pantry, returning the previous one.
pub fn set_active_pantry(pantry: Option<Pantry>) -> Option<Pantry> {
    ACTIVE_PANTRY.with(|slot| std::mem::replace(&mut *slot.borrow_mut(), pantry))
}

/// The pantry last activated on this thread.
pub fn active_pantry() -> Option<Pantry> {
    ACTIVE_PANTRY.with(|slot| slot.borrow().clone())
}

/// Forget the active pantry.
pub fn clear_active_pantry() {
    set_active_pantry(None);
}
