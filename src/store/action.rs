//! Actions and the hooks wrapped around them.

use super::{Store, StoreId};
use crate::error::{ActionError, StoreError};
use crate::pantry::UnhandledActionErrors;
use crate::subscription::{Subscription, SubscriptionList};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Future returned by asynchronous actions.
pub type ActionFuture = BoxFuture<'static, Result<Value, ActionError>>;

type SyncFn = dyn Fn(&Store, &[Value]) -> Result<Value, ActionError> + Send + Sync;
type AsyncFn = dyn Fn(&Store, &[Value]) -> ActionFuture + Send + Sync;

/// A store action. The store is passed as the receiver on every call.
#[derive(Clone)]
pub enum Action {
    Sync(Arc<SyncFn>),
    Async(Arc<AsyncFn>),
}

impl Action {
    /// A synchronous action.
    ///
    /// ```
    /// use pantry::{Action, Store};
    /// use serde_json::{json, Value};
    ///
    /// let increment = Action::new(|store: &Store, _args: &[Value]| {
    ///     let count = store.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
    ///     store.set("count", json!(count + 1)).map_err(|e| pantry::ActionError::new(e.to_string()))?;
    ///     Ok(json!(count + 1))
    /// });
    /// # let _ = increment;
    /// ```
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Store, &[Value]) -> Result<Value, ActionError> + Send + Sync + 'static,
    {
        Action::Sync(Arc::new(f))
    }

    /// An asynchronous action. The returned future must own what it uses;
    /// clone the store into it when needed.
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(&Store, &[Value]) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        Action::Async(Arc::new(move |store: &Store, args: &[Value]| f(store, args).boxed()))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Action::Async(_))
    }

    /// Call the action without any hooks.
    pub(crate) fn invoke(&self, store: &Store, args: &[Value]) -> Result<Outcome, ActionError> {
        match self {
            Action::Sync(f) => f(store, args).map(Outcome::Ready),
            Action::Async(f) => Ok(Outcome::Pending(f(store, args))),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_async() { "async" } else { "sync" })
    }
}

/// What the raw action body produced.
pub(crate) enum Outcome {
    Ready(Value),
    Pending(ActionFuture),
}

/// Result of calling an action through its store.
pub enum ActionResult {
    /// Synchronous action: the final value.
    Ready(Value),
    /// Asynchronous action: resolves after the `after` or `on_error` hooks ran.
    Pending(BoxFuture<'static, Result<Value, StoreError>>),
}

impl ActionResult {
    /// The value of a synchronous call.
    pub fn ready(self) -> Option<Value> {
        match self {
            ActionResult::Ready(value) => Some(value),
            ActionResult::Pending(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ActionResult::Pending(_))
    }

    /// A future for either kind of call.
    pub fn into_future(self) -> BoxFuture<'static, Result<Value, StoreError>> {
        match self {
            ActionResult::Ready(value) => futures::future::ready(Ok(value)).boxed(),
            ActionResult::Pending(future) => future,
        }
    }
}

impl fmt::Debug for ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionResult::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            ActionResult::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// What an `on_action` subscriber sees for one action call.
pub struct ActionContext {
    store: Store,
    name: String,
    args: Vec<Value>,
    after: SubscriptionList<Value, Value>,
    on_error: SubscriptionList<ActionError, Result<(), ActionError>>,
}

impl ActionContext {
    fn new(store: Store, name: &str, args: &[Value]) -> Self {
        Self {
            store,
            name: name.to_owned(),
            args: args.to_vec(),
            after: SubscriptionList::new(),
            on_error: SubscriptionList::new(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_id(&self) -> &StoreId {
        self.store.id()
    }

    /// Name of the action being called.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Run `callback` when this call succeeds.
    ///
    /// It receives the action's value; the value returned by the last
    /// `after` callback becomes the value of the call.
    pub fn after<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.after.add_unscoped(callback)
    }

    /// Run `callback` when this call fails.
    ///
    /// For a synchronous action the last `on_error` callback decides the
    /// outcome: `Ok(())` swallows the error, `Err(e)` rethrows `e`. An
    /// asynchronous action rejects with its own error either way.
    pub fn on_error<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ActionError) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.on_error.add_unscoped(callback)
    }
}

impl fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("store", self.store.id())
            .field("name", &self.name)
            .field("args", &self.args)
            .finish()
    }
}

/// Call `action` with the store's `on_action` hooks around it.
pub(crate) fn invoke_wrapped(
    store: &Store,
    name: &str,
    action: &Action,
    args: &[Value],
    subscriptions: &SubscriptionList<ActionContext>,
    unhandled: UnhandledActionErrors,
) -> Result<ActionResult, StoreError> {
    let context = ActionContext::new(store.clone(), name, args);
    subscriptions.trigger(&context);
    let ActionContext {
        after, on_error, ..
    } = context;

    let failed = |source: ActionError| StoreError::Action {
        store_id: store.id().clone(),
        action: name.to_owned(),
        source,
    };

    match action.invoke(store, args) {
        Ok(Outcome::Ready(value)) => Ok(ActionResult::Ready(
            after.trigger(&value).unwrap_or(value),
        )),
        Ok(Outcome::Pending(future)) => {
            let store_id = store.id().clone();
            let action = name.to_owned();
            Ok(ActionResult::Pending(
                async move {
                    match future.await {
                        Ok(value) => Ok(after.trigger(&value).unwrap_or(value)),
                        Err(error) => {
                            on_error.trigger(&error);
                            Err(StoreError::Action {
                                store_id,
                                action,
                                source: error,
                            })
                        }
                    }
                }
                .boxed(),
            ))
        }
        Err(error) => match on_error.trigger(&error) {
            Some(Ok(())) => Ok(ActionResult::Ready(Value::Null)),
            Some(Err(rethrown)) => Err(failed(rethrown)),
            None => match unhandled {
                UnhandledActionErrors::Propagate => Err(failed(error)),
                UnhandledActionErrors::Swallow => {
                    tracing::warn!(
                        store = %store.id(),
                        action = name,
                        error = %error,
                        "swallowing unhandled action error"
                    );
                    Ok(ActionResult::Ready(Value::Null))
                }
            },
        },
    }
}
