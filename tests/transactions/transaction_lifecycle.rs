//! Single-level transactions: commit, retry, failure and retry limits

use crate::common::*;
use nodb::RetryConfig;

#[test]
fn committed_write_is_visible_outside_the_transaction() {
    let (store, person) = person_store();
    let p = person.create(store.root(), [("firstName", "Ada")]).unwrap();

    store.transact(|rev| person.set(rev, &p, "age", 30)).unwrap();

    assert_eq!(person.get(store.root(), &p, "age").unwrap(), Value::Int(30));
}

#[test]
fn instances_created_in_a_transaction_survive_commit() {
    let (store, person) = person_store();
    let p = store
        .transact(|rev| person.create(rev, [("firstName", "Ada"), ("lastName", "Lovelace")]))
        .unwrap();

    assert_eq!(collect(person.all(store.root())), vec![p.clone()]);
    assert_eq!(
        person.get(store.root(), &p, "lastName").unwrap(),
        Value::from("Lovelace")
    );
}

#[test]
fn deletions_in_a_transaction_apply_on_commit() {
    let (store, person) = person_store();
    let p = person.create(store.root(), [("firstName", "Ada")]).unwrap();

    store.transact(|rev| person.delete(rev, &p)).unwrap();
    assert_eq!(person.count(store.root()), 0);
}

#[test]
fn failing_work_leaves_no_trace() {
    let (store, person) = person_store();
    let p = person.create(store.root(), [("firstName", "Ada")]).unwrap();

    let err = store
        .transact(|rev| {
            person.create(rev, [("firstName", "Ghost")])?;
            person.set(rev, &p, "firstName", "Eve")?;
            person.set(rev, &p, "age", "old")
        })
        .unwrap_err();
    assert!(matches!(err, Error::InvalidProperty { .. }));

    assert_eq!(person.count(store.root()), 1);
    assert_eq!(person.get(store.root(), &p, "firstName").unwrap(), Value::from("Ada"));
    assert_eq!(collect(person.find(store.root(), "firstName", "Ada")), vec![p.clone()]);
    assert_eq!(person.find(store.root(), "firstName", "Eve").count(), 0);
    assert_eq!(person.find(store.root(), "firstLetter", "G").count(), 0);
}

#[test]
fn root_revision_errors_are_not_retried() {
    let (store, _person) = person_store();
    let mut runs = 0;
    let err = store
        .transact(|_| {
            runs += 1;
            store.root().commit()?;
            Ok(())
        })
        .unwrap_err();
    assert_eq!(err, Error::RootRevision { operation: "commit" });
    assert_eq!(runs, 1);
}

#[test]
fn conflicting_work_is_rerun_with_fresh_values() {
    let (store, person) = person_store();
    let p = person.create(store.root(), [("age", 1)]).unwrap();

    let mut runs = 0;
    store
        .transact(|rev| {
            runs += 1;
            let age = person.get(rev, &p, "age")?.as_int().unwrap_or(0);
            if runs == 1 {
                // A concurrent writer commits first
                store.transact_in(store.root(), |other| person.set(other, &p, "age", 40))?;
            }
            person.set(rev, &p, "age", age + 1)
        })
        .unwrap();

    assert_eq!(runs, 2);
    assert_eq!(person.get(store.root(), &p, "age").unwrap(), Value::Int(41));

    let metrics = store.metrics();
    assert_eq!(metrics.total_committed, 2);
    assert_eq!(metrics.total_conflicts, 1);
    assert_eq!(metrics.active_count, 0);
}

#[test]
fn blind_writes_never_retry() {
    let (store, person) = person_store();
    let p = person.create(store.root(), [("age", 1)]).unwrap();

    let mut runs = 0;
    store
        .transact(|rev| {
            runs += 1;
            store.transact_in(store.root(), |other| person.set(other, &p, "age", 2))?;
            person.set(rev, &p, "age", 3)
        })
        .unwrap();
    assert_eq!(runs, 1);
    assert_eq!(person.get(store.root(), &p, "age").unwrap(), Value::Int(3));
}

#[test]
fn retry_cap_gives_up() {
    init_tracing();
    let store = Store::with_config(StoreConfig {
        retry: RetryConfig::new().with_max_retries(1).with_warn_after(1),
    });
    let counter = store
        .create(ModelDefinition::new("Counter").property_with_default("n", PropertyType::Integer, 0))
        .unwrap();
    let c = counter.create_default(store.root()).unwrap();

    let err = store
        .transact(|rev| {
            let n = counter.get(rev, &c, "n")?.as_int().unwrap_or(0);
            counter.set(store.root(), &c, "n", n + 100)?;
            counter.set(rev, &c, "n", n + 1)
        })
        .unwrap_err();
    assert_eq!(err, Error::RetriesExhausted { attempts: 2 });
    assert_eq!(store.metrics().total_aborted, 1);
}

#[test]
fn config_loaded_from_toml_drives_retries() {
    let config = StoreConfig::from_toml_str("[retry]\nmax_retries = 0\n").unwrap();
    let store = Store::with_config(config);
    let counter = store
        .create(ModelDefinition::new("Counter").property("n", PropertyType::Integer))
        .unwrap();
    let c = counter.create_default(store.root()).unwrap();

    let err = store
        .transact(|rev| {
            counter.get(rev, &c, "n")?;
            counter.set(store.root(), &c, "n", 1)?;
            Ok(())
        })
        .unwrap_err();
    assert_eq!(err, Error::RetriesExhausted { attempts: 1 });
}
