//! Ordered listener lists.
//!
//! Used both for action hooks (`on_action`, `after`, `on_error`) and for the
//! handles returned by state subscriptions.

mod list;

pub use list::{Callback, Subscription, SubscriptionList};
