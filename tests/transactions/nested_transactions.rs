//! Nested transactions: a `transact` inside work branches off the outer branch

use crate::common::*;
use std::sync::Arc;

#[test]
fn nested_commit_is_invisible_until_outer_commits() {
    let (store, person) = person_store();
    let p = person.create(store.root(), [("age", 1)]).unwrap();

    store
        .transact(|outer| {
            store.transact(|inner| {
                assert!(Arc::ptr_eq(inner.parent().unwrap(), outer));
                person.set(inner, &p, "age", 2)
            })?;
            assert_eq!(person.get(outer, &p, "age")?, Value::Int(2));
            assert_eq!(person.get(store.root(), &p, "age")?, Value::Int(1));
            Ok(())
        })
        .unwrap();

    assert_eq!(person.get(store.root(), &p, "age").unwrap(), Value::Int(2));
}

#[test]
fn inner_conflict_retries_against_latest_outer_value() {
    let (store, person) = person_store();
    let p = person.create(store.root(), [("age", 10)]).unwrap();

    let mut inner_runs = 0;
    store
        .transact(|outer| {
            store.transact(|inner| {
                inner_runs += 1;
                let age = person.get(inner, &p, "age")?.as_int().unwrap_or(0);
                if inner_runs == 1 {
                    // The parent changes between the inner read and the inner commit
                    person.set(outer, &p, "age", 20)?;
                }
                person.set(inner, &p, "age", age + 1)
            })
        })
        .unwrap();

    assert_eq!(inner_runs, 2);
    assert_eq!(person.get(store.root(), &p, "age").unwrap(), Value::Int(21));
}

#[test]
fn failing_inner_work_can_be_handled_by_outer() {
    let (store, person) = person_store();
    let p = person.create(store.root(), [("firstName", "Ada")]).unwrap();

    store
        .transact(|outer| {
            let attempt = store.transact(|inner| {
                person.set(inner, &p, "firstName", "Eve")?;
                person.set(inner, &p, "age", "not a number")
            });
            assert!(attempt.is_err());
            assert_eq!(person.get(outer, &p, "firstName")?, Value::from("Ada"));
            person.set(outer, &p, "age", 36)
        })
        .unwrap();

    assert_eq!(person.get(store.root(), &p, "firstName").unwrap(), Value::from("Ada"));
    assert_eq!(person.get(store.root(), &p, "age").unwrap(), Value::Int(36));
    assert_eq!(collect(person.find(store.root(), "firstName", "Ada")), vec![p]);
}

#[test]
fn outer_conflict_reruns_inner_transactions() {
    let (store, person) = person_store();
    let p = person.create(store.root(), [("age", 0)]).unwrap();

    let mut outer_runs = 0;
    let mut inner_runs = 0;
    store
        .transact(|outer| {
            outer_runs += 1;
            store.transact(|inner| {
                inner_runs += 1;
                let age = person.get(inner, &p, "age")?.as_int().unwrap_or(0);
                person.set(inner, &p, "age", age + 1)
            })?;
            if outer_runs == 1 {
                // The inner read propagated into the outer branch; break it
                store.transact_in(store.root(), |other| person.set(other, &p, "age", 100))?;
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(outer_runs, 2);
    assert_eq!(inner_runs, 2);
    assert_eq!(person.get(store.root(), &p, "age").unwrap(), Value::Int(101));
}

#[test]
fn current_revision_is_restored_after_nested_transactions() {
    let (store, _person) = person_store();
    store
        .transact(|outer| {
            store.transact(|_| Ok(()))?;
            assert!(Arc::ptr_eq(&store.current(), outer));
            Ok(())
        })
        .unwrap();
    assert!(nodb::current().is_none());
}
