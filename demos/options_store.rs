//! Descriptor store example: state, a getter, actions and subscriptions

use pantry::{define_store, Action, ActionError, Descriptor, Pantry, Store, WatchOptions};
use serde_json::{json, Value};

fn age(store: &Store) -> i64 {
    store.get("age").and_then(|v| v.as_i64()).unwrap_or(0)
}

fn main() -> Result<(), pantry::StoreError> {
    println!("=== Options Store Example ===\n");

    let use_options = define_store(
        "optionsStore",
        Descriptor::new()
            .state(|| json!({ "age": 10, "name": "Kim" }))
            .getter("parentAge", |store: &Store| json!(age(store) + 18))
            .action(
                "birthday",
                Action::new(|store: &Store, _: &[Value]| {
                    let next = age(store) + 1;
                    store
                        .set("age", json!(next))
                        .map_err(|e| ActionError::new(e.to_string()))?;
                    Ok(json!(next))
                }),
            ),
    );

    let pantry = Pantry::new();
    pantry.activate();
    let store = use_options.use_active()?;

    let _state = store.subscribe(
        |info, state| println!("[{:?}] state is now {state}", info.kind),
        WatchOptions::default(),
    )?;
    let _actions = store.on_action(|context| {
        println!("calling `{}`", context.name());
        context.after(|value| {
            println!("`birthday` returned {value}");
            value.clone()
        });
    })?;

    println!("parentAge = {}", store.get("parentAge").unwrap_or_default());

    store.patch(json!({ "age": 20 }))?;
    println!("parentAge = {}", store.get("parentAge").unwrap_or_default());

    store.call("birthday", &[])?;
    println!("parentAge = {}", store.get("parentAge").unwrap_or_default());

    store.reset()?;
    println!("\nAfter reset: {}", pantry.state().snapshot());

    Ok(())
}
