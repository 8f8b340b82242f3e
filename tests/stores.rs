//! Integration tests for stores and the pantry

use pantry::{
    batch, clear_active_pantry, define_setup_store, define_store, Action, ActionError, Descriptor,
    MutationKind, Pantry, PantryConfig, Properties, Property, Signal, Store, StoreDefinition,
    StoreError, StoreId, UnhandledActionErrors, WatchOptions,
};
use parking_lot::Mutex;
use rstest::rstest;
use serde_json::{json, Value};
use std::sync::Arc;

fn counter() -> StoreDefinition {
    define_store(
        "counter",
        Descriptor::new()
            .state(|| json!({ "n": 0, "name": "counter" }))
            .getter("double", |store: &Store| {
                json!(store.get("n").and_then(|v| v.as_i64()).unwrap_or(0) * 2)
            })
            .action(
                "inc",
                Action::new(|store: &Store, _: &[Value]| {
                    let n = store.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
                    store
                        .set("n", json!(n + 1))
                        .map_err(|e| ActionError::new(e.to_string()))?;
                    Ok(json!(n + 1))
                }),
            )
            .action(
                "fail",
                Action::new(|_: &Store, _: &[Value]| Err(ActionError::new("boom"))),
            ),
    )
}

fn options_store() -> StoreDefinition {
    define_store(
        "optionsStore",
        Descriptor::new()
            .state(|| json!({ "age": 10 }))
            .getter("parentAge", |store: &Store| {
                json!(store.get("age").and_then(|v| v.as_i64()).unwrap_or(0) + 18)
            }),
    )
}

fn setup_counter() -> StoreDefinition {
    define_setup_store("setupCounter", |_| {
        let count = Signal::new(json!(20));
        let double = {
            let count = count.clone();
            Property::derived(move || json!(count.get().as_i64().unwrap_or(0) * 2))
        };
        Ok(Properties::from([
            ("count".to_string(), Property::Cell(count)),
            ("doubleCount".to_string(), double),
        ]))
    })
}

fn number(store: &Store, name: &str) -> i64 {
    store.get(name).and_then(|v| v.as_i64()).unwrap_or(-1)
}

#[test]
fn same_id_same_pantry_is_the_same_store() {
    let pantry = Pantry::new();
    let use_counter = counter();

    let a = use_counter.use_store_in(&pantry).unwrap();
    let b = use_counter.use_store_in(&pantry).unwrap();
    assert!(a.ptr_eq(&b));

    let other = Pantry::new();
    let c = use_counter.use_store_in(&other).unwrap();
    assert!(!a.ptr_eq(&c));
    clear_active_pantry();
}

#[test]
fn distinct_ids_have_independent_state() {
    let pantry = Pantry::new();
    let first = define_store("first", Descriptor::new().state(|| json!({ "n": 0 })));
    let second = define_store("second", Descriptor::new().state(|| json!({ "n": 0 })));

    let a = first.use_store_in(&pantry).unwrap();
    let b = second.use_store_in(&pantry).unwrap();
    a.set("n", json!(5)).unwrap();

    assert_eq!(number(&a, "n"), 5);
    assert_eq!(number(&b, "n"), 0);
    assert_eq!(
        pantry.state().snapshot(),
        json!({ "first": { "n": 5 }, "second": { "n": 0 } })
    );
    clear_active_pantry();
}

#[test]
fn accessor_without_pantry_fails() {
    clear_active_pantry();
    assert_eq!(counter().use_active().unwrap_err(), StoreError::NoActivePantry);
}

#[test]
fn accessor_uses_the_active_pantry() {
    let pantry = Pantry::new();
    pantry.activate();

    let store = counter().use_active().unwrap();
    assert!(store.pantry().unwrap().ptr_eq(&pantry));
    assert!(pantry.has_store("counter"));
    clear_active_pantry();
}

#[test]
fn descriptor_getter_follows_patch() {
    let pantry = Pantry::new();
    let store = options_store().use_store_in(&pantry).unwrap();

    assert_eq!(number(&store, "parentAge"), 28);
    store.patch(json!({ "age": 20 })).unwrap();
    assert_eq!(number(&store, "parentAge"), 38);
    clear_active_pantry();
}

#[test]
fn setup_store_cells_live_in_the_state_tree() {
    let pantry = Pantry::new();
    let store = setup_counter().use_store_in(&pantry).unwrap();

    assert_eq!(number(&store, "doubleCount"), 40);
    store.set("count", json!(21)).unwrap();
    assert_eq!(number(&store, "doubleCount"), 42);
    assert_eq!(
        pantry.state().get("setupCounter").unwrap().get("count"),
        Some(json!(21))
    );
    assert_eq!(
        store.set("doubleCount", json!(0)).unwrap_err(),
        StoreError::ReadOnly {
            store_id: "setupCounter".into(),
            name: "doubleCount".into(),
        }
    );
    clear_active_pantry();
}

#[test]
fn patch_object_merges_deeply() {
    let pantry = Pantry::new();
    let use_profile = define_store(
        "profile",
        Descriptor::new().state(|| json!({ "a": 0, "b": { "c": 1, "d": 2 }, "tags": [1, 2] })),
    );
    let store = use_profile.use_store_in(&pantry).unwrap();

    store
        .patch(json!({ "a": 1, "b": { "c": 5 }, "tags": [3] }))
        .unwrap();

    assert_eq!(
        store.state().snapshot(),
        json!({ "a": 1, "b": { "c": 5, "d": 2 }, "tags": [3] })
    );
    clear_active_pantry();
}

#[test]
fn patch_function_adds_fields() {
    let pantry = Pantry::new();
    let store = counter().use_store_in(&pantry).unwrap();

    store
        .patch_with(|state| {
            state.insert("n".into(), json!(9));
            state.insert("extra".into(), json!(true));
        })
        .unwrap();

    assert_eq!(number(&store, "n"), 9);
    assert_eq!(store.get("extra"), Some(json!(true)));
    assert!(store.has("extra"));
    clear_active_pantry();
}

#[rstest]
#[case(json!(1))]
#[case(json!("x"))]
#[case(json!([1, 2]))]
#[case(Value::Null)]
fn patch_rejects_non_objects(#[case] partial: Value) {
    let pantry = Pantry::new();
    let store = counter().use_store_in(&pantry).unwrap();

    let err = store.patch(partial).unwrap_err();
    assert!(matches!(err, StoreError::InvalidPatch { .. }));
    assert_eq!(number(&store, "n"), 0);
    clear_active_pantry();
}

#[test]
fn subscriber_fires_once_per_patch() {
    let pantry = Pantry::new();
    let store = counter().use_store_in(&pantry).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let _subscription = store
        .subscribe(
            {
                let seen = seen.clone();
                move |info, state| seen.lock().push((info.kind, state.clone()))
            },
            WatchOptions::default(),
        )
        .unwrap();

    store.patch(json!({ "n": 1, "name": "renamed" })).unwrap();

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, MutationKind::PatchObject);
    assert_eq!(seen[0].1, json!({ "n": 1, "name": "renamed" }));
    clear_active_pantry();
}

#[test]
fn subscriber_sees_mutation_kinds() {
    let pantry = Pantry::new();
    let store = counter().use_store_in(&pantry).unwrap();
    let kinds = Arc::new(Mutex::new(Vec::new()));

    let subscription = store
        .subscribe(
            {
                let kinds = kinds.clone();
                move |info, _| kinds.lock().push(info.kind)
            },
            WatchOptions::default(),
        )
        .unwrap();

    store.set("n", json!(1)).unwrap();
    store.patch(json!({ "n": 2 })).unwrap();
    store
        .patch_with(|state| {
            state.insert("n".into(), json!(3));
        })
        .unwrap();
    store.reset().unwrap();

    subscription.unsubscribe();
    store.set("n", json!(100)).unwrap();

    assert_eq!(
        *kinds.lock(),
        vec![
            MutationKind::Direct,
            MutationKind::PatchObject,
            MutationKind::PatchFunction,
            MutationKind::PatchFunction,
        ]
    );
    clear_active_pantry();
}

#[test]
fn immediate_subscriber_sees_initial_state() {
    let pantry = Pantry::new();
    let store = options_store().use_store_in(&pantry).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let _subscription = store
        .subscribe(
            {
                let seen = seen.clone();
                move |_, state| seen.lock().push(state.clone())
            },
            WatchOptions::immediate(),
        )
        .unwrap();

    assert_eq!(*seen.lock(), vec![json!({ "age": 10 })]);
    clear_active_pantry();
}

#[test]
fn on_action_runs_before_and_after() {
    let pantry = Pantry::new();
    let store = counter().use_store_in(&pantry).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    let _subscription = store
        .on_action({
            let log = log.clone();
            move |context| {
                let n = context.store().get("n").and_then(|v| v.as_i64());
                log.lock().push(format!("before {} n={:?}", context.name(), n));
                let log = log.clone();
                context.after(move |value| {
                    log.lock().push(format!("after {value}"));
                    json!(5)
                });
            }
        })
        .unwrap();

    let result = store.call("inc", &[json!("arg")]).unwrap();

    assert_eq!(result.ready(), Some(json!(5)));
    assert_eq!(number(&store, "n"), 1);
    assert_eq!(
        *log.lock(),
        vec!["before inc n=Some(0)".to_string(), "after 1".to_string()]
    );
    clear_active_pantry();
}

#[test]
fn on_action_sees_arguments_and_store_id() {
    let pantry = Pantry::new();
    let store = counter().use_store_in(&pantry).unwrap();
    let seen = Arc::new(Mutex::new(None));

    let _subscription = store
        .on_action({
            let seen = seen.clone();
            move |context| {
                *seen.lock() = Some((context.store_id().to_string(), context.args().to_vec()));
            }
        })
        .unwrap();

    store.call("inc", &[json!(1), json!("two")]).unwrap();

    assert_eq!(
        *seen.lock(),
        Some(("counter".to_string(), vec![json!(1), json!("two")]))
    );
    clear_active_pantry();
}

#[test]
fn on_error_hook_sees_the_failure() {
    let pantry = Pantry::new();
    let store = counter().use_store_in(&pantry).unwrap();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let afters = Arc::new(Mutex::new(0));

    let _subscription = store
        .on_action({
            let (errors, afters) = (errors.clone(), afters.clone());
            move |context| {
                let errors = errors.clone();
                context.on_error(move |error| {
                    errors.lock().push(error.message().to_string());
                    Err(error.clone())
                });
                let afters = afters.clone();
                context.after(move |value| {
                    *afters.lock() += 1;
                    value.clone()
                });
            }
        })
        .unwrap();

    let err = store.call("fail", &[]).unwrap_err();

    assert_eq!(
        err,
        StoreError::Action {
            store_id: "counter".into(),
            action: "fail".into(),
            source: ActionError::new("boom"),
        }
    );
    assert_eq!(*errors.lock(), vec!["boom".to_string()]);
    assert_eq!(*afters.lock(), 0);
    clear_active_pantry();
}

#[test]
fn on_error_hook_can_swallow() {
    let pantry = Pantry::new();
    let store = counter().use_store_in(&pantry).unwrap();

    let _subscription = store
        .on_action(|context| {
            context.on_error(|_| Ok(()));
        })
        .unwrap();

    let result = store.call("fail", &[]).unwrap();
    assert_eq!(result.ready(), Some(Value::Null));
    clear_active_pantry();
}

#[test]
fn unhandled_error_propagates_by_default() {
    let pantry = Pantry::new();
    let store = counter().use_store_in(&pantry).unwrap();

    let err = store.call("fail", &[]).unwrap_err();
    assert!(matches!(err, StoreError::Action { .. }));
    assert_eq!(err.to_string(), "store `counter`: action `fail` failed: boom");
    clear_active_pantry();
}

#[test]
fn unhandled_error_can_be_swallowed_by_config() {
    let config = PantryConfig {
        unhandled_action_errors: UnhandledActionErrors::Swallow,
        ..PantryConfig::default()
    };
    let pantry = Pantry::with_config(config);
    let store = counter().use_store_in(&pantry).unwrap();

    assert_eq!(store.call("fail", &[]).unwrap().ready(), Some(Value::Null));
    clear_active_pantry();
}

#[test]
fn calling_unknown_or_non_action_members_fails() {
    let pantry = Pantry::new();
    let store = counter().use_store_in(&pantry).unwrap();

    assert!(matches!(
        store.call("missing", &[]).unwrap_err(),
        StoreError::UnknownProperty { .. }
    ));
    assert!(matches!(
        store.call("double", &[]).unwrap_err(),
        StoreError::NotAnAction { .. }
    ));
    clear_active_pantry();
}

#[tokio::test]
async fn async_action_runs_after_hooks_on_resolve() {
    let pantry = Pantry::new();
    let use_loader = define_store(
        "loader",
        Descriptor::new().state(|| json!({ "loaded": false })).action(
            "load",
            Action::future(|store: &Store, args: &[Value]| {
                let store = store.clone();
                let input = args.first().cloned().unwrap_or(Value::Null);
                async move {
                    store
                        .set("loaded", json!(true))
                        .map_err(|e| ActionError::new(e.to_string()))?;
                    Ok(input)
                }
            }),
        ),
    );
    let store = use_loader.use_store_in(&pantry).unwrap();
    let after = Arc::new(Mutex::new(Vec::new()));

    let _subscription = store
        .on_action({
            let after = after.clone();
            move |context| {
                let after = after.clone();
                context.after(move |value| {
                    after.lock().push(value.clone());
                    json!({ "wrapped": value })
                });
            }
        })
        .unwrap();

    let result = store.call("load", &[json!(7)]).unwrap();
    assert!(result.is_pending());
    assert!(after.lock().is_empty());

    let value = result.into_future().await.unwrap();
    assert_eq!(value, json!({ "wrapped": 7 }));
    assert_eq!(*after.lock(), vec![json!(7)]);
    assert_eq!(store.get("loaded"), Some(json!(true)));
    clear_active_pantry();
}

#[tokio::test]
async fn async_action_rejects_after_on_error() {
    let pantry = Pantry::new();
    let use_loader = define_store(
        "failing",
        Descriptor::new().action(
            "load",
            Action::future(|_: &Store, _: &[Value]| async { Err(ActionError::new("offline")) }),
        ),
    );
    let store = use_loader.use_store_in(&pantry).unwrap();
    let errors = Arc::new(Mutex::new(Vec::new()));

    let _subscription = store
        .on_action({
            let errors = errors.clone();
            move |context| {
                let errors = errors.clone();
                context.on_error(move |error| {
                    errors.lock().push(error.message().to_string());
                    Ok(())
                });
            }
        })
        .unwrap();

    let err = store
        .call("load", &[])
        .unwrap()
        .into_future()
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Action { .. }));
    assert_eq!(*errors.lock(), vec!["offline".to_string()]);
    clear_active_pantry();
}

#[test]
fn reset_restores_the_initial_state() {
    let pantry = Pantry::new();
    let store = counter().use_store_in(&pantry).unwrap();

    store.patch(json!({ "n": 4, "name": "x" })).unwrap();
    store.reset().unwrap();

    assert_eq!(store.state().snapshot(), json!({ "n": 0, "name": "counter" }));
    clear_active_pantry();
}

#[test]
fn setup_store_cannot_reset() {
    let pantry = Pantry::new();
    let store = setup_counter().use_store_in(&pantry).unwrap();

    assert_eq!(
        store.reset().unwrap_err(),
        StoreError::ResetUnsupported("setupCounter".into())
    );
    clear_active_pantry();
}

#[test]
fn set_state_assigns_top_level_keys() {
    let pantry = Pantry::new();
    let store = counter().use_store_in(&pantry).unwrap();
    let cell = store.state().cell("n").unwrap();

    store.set_state(json!({ "n": 3 })).unwrap();

    assert_eq!(cell.get(), json!(3));
    assert_eq!(store.get("name"), Some(json!("counter")));
    clear_active_pantry();
}

#[test]
fn dispose_builds_a_new_store_next_time() {
    let pantry = Pantry::new();
    let use_counter = counter();
    let first = use_counter.use_store_in(&pantry).unwrap();
    first.call("inc", &[]).unwrap();

    first.dispose();

    assert!(first.is_disposed());
    assert!(!pantry.state().contains("counter"));
    assert!(!pantry.has_store("counter"));

    let second = use_counter.use_store_in(&pantry).unwrap();
    assert!(!first.ptr_eq(&second));
    assert_eq!(number(&second, "n"), 0);
    clear_active_pantry();
}

#[test]
fn disposed_store_rejects_writes_and_subscriptions() {
    let pantry = Pantry::new();
    let store = counter().use_store_in(&pantry).unwrap();
    store.dispose();
    store.dispose();

    let disposed = StoreError::Disposed("counter".into());
    assert_eq!(store.set("n", json!(1)).unwrap_err(), disposed);
    assert_eq!(store.patch(json!({ "n": 1 })).unwrap_err(), disposed);
    assert_eq!(store.on_action(|_| {}).unwrap_err(), disposed);
    assert_eq!(
        store
            .subscribe(|_, _| {}, WatchOptions::default())
            .unwrap_err(),
        disposed
    );
    clear_active_pantry();
}

#[test]
fn dispose_stops_getters_and_watchers() {
    let pantry = Pantry::new();
    let store = options_store().use_store_in(&pantry).unwrap();
    let cell = store.state().cell("age").unwrap();
    let fired = Arc::new(Mutex::new(0));

    let _subscription = store
        .subscribe(
            {
                let fired = fired.clone();
                move |_, _| *fired.lock() += 1
            },
            WatchOptions::default(),
        )
        .unwrap();

    store.dispose();
    cell.set(json!(99));

    assert_eq!(*fired.lock(), 0);
    clear_active_pantry();
}

#[test]
fn retained_state_survives_dispose() {
    let config = PantryConfig {
        retain_state_on_dispose: true,
        ..PantryConfig::default()
    };
    let pantry = Pantry::with_config(config);

    let first = setup_counter().use_store_in(&pantry).unwrap();
    first.set("count", json!(50)).unwrap();
    first.dispose();

    assert!(pantry.state().contains("setupCounter"));
    let second = setup_counter().use_store_in(&pantry).unwrap();
    assert!(!first.ptr_eq(&second));
    assert_eq!(number(&second, "count"), 50);
    assert_eq!(number(&second, "doubleCount"), 100);
    clear_active_pantry();
}

#[test]
fn plugins_extend_stores_built_after_registration() {
    let pantry = Pantry::new();
    let early = counter().use_store_in(&pantry).unwrap();

    pantry.use_plugin(|context| {
        assert!(context.store().pantry().is_some());
        Some(Properties::from([(
            "extra".to_string(),
            Property::plain(json!(42)),
        )]))
    });

    let late = options_store().use_store_in(&pantry).unwrap();

    assert_eq!(late.get("extra"), Some(json!(42)));
    assert_eq!(early.get("extra"), None);
    clear_active_pantry();
}

#[test]
fn plugin_actions_skip_action_hooks() {
    let pantry = Pantry::new();
    pantry.use_plugin(|_| {
        Some(Properties::from([(
            "ping".to_string(),
            Property::Action(Action::new(|_: &Store, _: &[Value]| Ok(json!("pong")))),
        )]))
    });
    let store = counter().use_store_in(&pantry).unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));

    let _subscription = store
        .on_action({
            let calls = calls.clone();
            move |context| calls.lock().push(context.name().to_string())
        })
        .unwrap();

    assert_eq!(store.call("ping", &[]).unwrap().ready(), Some(json!("pong")));
    store.call("inc", &[]).unwrap();

    assert_eq!(*calls.lock(), vec!["inc".to_string()]);
    clear_active_pantry();
}

#[test]
fn store_can_use_another_store_during_setup() {
    let pantry = Pantry::new();
    let use_total = define_setup_store("total", |context| {
        let counter = counter().use_store_in(context.pantry())?;
        let total = Property::derived(move || {
            json!(counter.get("n").and_then(|v| v.as_i64()).unwrap_or(0) + 100)
        });
        Ok(Properties::from([("total".to_string(), total)]))
    });

    let total = use_total.use_store_in(&pantry).unwrap();
    let counter_store = counter().use_store_in(&pantry).unwrap();
    counter_store.call("inc", &[]).unwrap();

    assert_eq!(number(&total, "total"), 101);
    assert_eq!(
        pantry.store_ids(),
        vec![StoreId::from("total"), StoreId::from("counter")]
    );
    clear_active_pantry();
}

#[test]
fn self_reference_during_setup_is_a_cycle() {
    let pantry = Pantry::new();
    let use_looping = define_setup_store("looping", |context| {
        define_setup_store("looping", |_| Ok(Properties::new())).use_store_in(context.pantry())?;
        Ok(Properties::new())
    });

    assert_eq!(
        use_looping.use_store_in(&pantry).unwrap_err(),
        StoreError::Cycle("looping".into())
    );
    assert!(!pantry.has_store("looping"));
    assert!(!pantry.state().contains("looping"));
    clear_active_pantry();
}

#[test]
fn failed_setup_leaves_nothing_behind() {
    let pantry = Pantry::new();
    let use_broken = define_store("broken", Descriptor::new().state(|| json!([1, 2, 3])));

    let err = use_broken.use_store_in(&pantry).unwrap_err();
    assert!(matches!(err, StoreError::Setup { .. }));
    assert!(!pantry.has_store("broken"));
    assert!(!pantry.state().contains("broken"));
    clear_active_pantry();
}

#[test]
fn config_parses_from_json() {
    let config = PantryConfig::from_json_str(
        r#"{ "unhandled_action_errors": "swallow", "retain_state_on_dispose": true }"#,
    )
    .unwrap();
    assert_eq!(config.unhandled_action_errors, UnhandledActionErrors::Swallow);
    assert!(config.retain_state_on_dispose);

    assert!(PantryConfig::from_json_str(r#"{ "unknown": 1 }"#).is_err());
}

#[test]
fn writes_from_another_thread_reach_getters_and_subscribers() {
    let pantry = Pantry::new();
    let store = counter().use_store_in(&pantry).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let _subscription = store
        .subscribe(
            {
                let seen = seen.clone();
                move |_, state| seen.lock().push(state["n"].clone())
            },
            WatchOptions::default(),
        )
        .unwrap();
    assert_eq!(number(&store, "double"), 0);

    std::thread::spawn({
        let store = store.clone();
        move || store.set("n", json!(5)).unwrap()
    })
    .join()
    .unwrap();

    assert_eq!(number(&store, "double"), 10);
    assert_eq!(*seen.lock(), vec![json!(5)]);
    clear_active_pantry();
}

#[test]
fn panicking_setup_leaves_nothing_behind() {
    let pantry = Pantry::new();
    let use_fragile = define_setup_store("fragile", |_| -> Result<Properties, StoreError> {
        panic!("setup exploded")
    });

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        use_fragile.use_store_in(&pantry)
    }));
    assert!(outcome.is_err());
    assert!(!pantry.has_store("fragile"));
    assert!(!pantry.state().contains("fragile"));

    let use_sturdy = define_setup_store("fragile", |_| {
        Ok(Properties::from([("n".to_string(), Property::cell(json!(1)))]))
    });
    let store = use_sturdy.use_store_in(&pantry).unwrap();
    assert_eq!(number(&store, "n"), 1);
    clear_active_pantry();
}

#[test]
fn panicking_plugin_leaves_nothing_behind() {
    let pantry = Pantry::new();
    pantry.use_plugin(|_| -> Option<Properties> { panic!("plugin exploded") });

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        counter().use_store_in(&pantry)
    }));
    assert!(outcome.is_err());
    assert!(!pantry.has_store("counter"));
    assert!(!pantry.state().contains("counter"));
    clear_active_pantry();
}

#[test]
fn field_removed_by_a_mutator_comes_back_in_the_same_cell() {
    let pantry = Pantry::new();
    let store = setup_counter().use_store_in(&pantry).unwrap();

    store
        .patch_with(|state| {
            state.remove("count");
        })
        .unwrap();
    assert!(!store.state().contains("count"));

    store.patch(json!({ "count": 5 })).unwrap();

    assert_eq!(number(&store, "count"), 5);
    assert_eq!(store.state().get("count"), Some(json!(5)));
    assert_eq!(number(&store, "doubleCount"), 10);
    clear_active_pantry();
}

#[test]
fn outer_batch_keeps_the_patch_kind() {
    let pantry = Pantry::new();
    let store = counter().use_store_in(&pantry).unwrap();
    let kinds = Arc::new(Mutex::new(Vec::new()));
    let _subscription = store
        .subscribe(
            {
                let kinds = kinds.clone();
                move |info, _| kinds.lock().push(info.kind)
            },
            WatchOptions::default(),
        )
        .unwrap();

    batch(|| store.patch(json!({ "n": 7 })).unwrap());
    store.set("n", json!(8)).unwrap();

    assert_eq!(
        *kinds.lock(),
        vec![MutationKind::PatchObject, MutationKind::Direct]
    );
    clear_active_pantry();
}
