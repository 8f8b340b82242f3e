//! Fine-grained reactive primitives.
//!
//! This module provides the building blocks the stores are assembled from:
//! - Signals: reactive cells
//! - Memos: cached computed values
//! - Effects: side effects that react to changes
//! - Watchers: effects that hand each new value to a callback

mod effect;
mod memo;
mod signal;
mod watch;

pub use effect::{create_effect, Effect};
pub use memo::{create_memo, Memo};
pub use signal::Signal;
pub use watch::{watch, WatchHandle, WatchOptions};
