//! Setup store example: cells, derived values and a plugin

use pantry::{define_setup_store, Action, Pantry, Properties, Property, Signal, Store};
use serde_json::{json, Value};

fn main() -> Result<(), pantry::StoreError> {
    println!("=== Setup Store Example ===\n");

    let pantry = Pantry::new();
    pantry.use_plugin(|context| {
        println!("plugin sees store `{}`", context.store().id());
        Some(Properties::from([(
            "createdBy".to_string(),
            Property::plain(json!("setup_store example")),
        )]))
    });

    let use_counter = define_setup_store("counter", |_| {
        let count = Signal::new(json!(20));

        let double_count = {
            let count = count.clone();
            Property::derived(move || json!(count.get().as_i64().unwrap_or(0) * 2))
        };

        let increment = {
            let count = count.clone();
            Action::new(move |_: &Store, _: &[Value]| {
                count.update(|value| *value = json!(value.as_i64().unwrap_or(0) + 1));
                Ok(Value::Null)
            })
        };

        Ok(Properties::from([
            ("count".to_string(), Property::Cell(count)),
            ("doubleCount".to_string(), double_count),
            ("increment".to_string(), Property::Action(increment)),
        ]))
    });

    let counter = use_counter.use_store_in(&pantry)?;
    println!("doubleCount = {}", counter.get("doubleCount").unwrap_or_default());

    counter.call("increment", &[])?;
    println!("doubleCount = {}", counter.get("doubleCount").unwrap_or_default());
    println!("createdBy = {}", counter.get("createdBy").unwrap_or_default());

    println!("\nState tree: {}", pantry.state().snapshot());

    counter.dispose();
    println!("After dispose: {}", pantry.state().snapshot());

    Ok(())
}
