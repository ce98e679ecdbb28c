//! Enumeration, selection, filtering and conditional queries

use crate::common::*;
use std::sync::Arc;

fn people(store: &Store, person: &Arc<Model>) -> Vec<Instance> {
    [("Ada", "Lovelace", 15), ("Alan", "Turing", 22), ("Grace", "Hopper", 32)]
        .into_iter()
        .map(|(first, last, age)| {
            person
                .create(
                    store.root(),
                    [
                        ("firstName", Value::from(first)),
                        ("lastName", Value::from(last)),
                        ("age", Value::from(age)),
                    ],
                )
                .unwrap()
        })
        .collect()
}

#[test]
fn select_sums_ages() {
    let (store, person) = person_store();
    people(&store, &person);

    let total = person.select(store.root(), "age").unwrap().sum_ints();
    assert_eq!(total, 69);

    let in_transaction = store
        .transact(|rev| Ok(person.select(rev, "age")?.sum_ints()))
        .unwrap();
    assert_eq!(in_transaction, 69);
}

#[test]
fn select_sees_uncommitted_values_of_its_revision() {
    let (store, person) = person_store();
    let all = people(&store, &person);

    let branch = store.root().branch();
    person.set(&branch, &all[0], "age", 16).unwrap();
    person.delete(&branch, &all[2]).unwrap();

    assert_eq!(person.select(&branch, "age").unwrap().sum_ints(), 38);
    assert_eq!(person.select(store.root(), "age").unwrap().sum_ints(), 69);
    assert!(person.select(store.root(), "shoeSize").is_err());
}

#[test]
fn min_and_max_over_selected_values() {
    let (store, person) = person_store();
    people(&store, &person);
    person.create_default(store.root()).unwrap();

    let root = store.root();
    assert_eq!(person.select(root, "age").unwrap().min_value(), Some(Value::Int(15)));
    assert_eq!(person.select(root, "age").unwrap().max_value(), Some(Value::Int(32)));
    assert_eq!(
        person.select(root, "lastName").unwrap().max_value(),
        Some(Value::from("Turing"))
    );
}

#[test]
fn filter_and_sort() {
    let (store, person) = person_store();
    people(&store, &person);

    let root = Arc::clone(store.root());
    let reader = Arc::clone(&person);
    let view = Arc::clone(&root);
    let adults = person.filter(&root, move |p| {
        reader
            .get(&view, p, "age")
            .ok()
            .and_then(|age| age.as_int())
            .is_some_and(|age| age >= 18)
    });

    let names: Vec<Value> = adults
        .map(|p| person.get(&root, &p, "firstName").unwrap())
        .sorted_with(|a, b| b.compare(a).unwrap_or(std::cmp::Ordering::Equal))
        .collect();
    assert_eq!(names, vec![Value::from("Grace"), Value::from("Alan")]);
}

#[test]
fn conditions_are_conjunctive() {
    let (store, person) = person_store();
    let all = people(&store, &person);

    let found = collect(
        person
            .query(store.root())
            .and("age", Comparator::Gte, 20)
            .and("firstName", Comparator::StartsWith, "A")
            .run()
            .unwrap(),
    );
    assert_eq!(found, vec![all[1].clone()]);

    let by_suffix = collect(
        person
            .query(store.root())
            .and("lastName", Comparator::EndsWith, "er")
            .run()
            .unwrap(),
    );
    assert_eq!(by_suffix, vec![all[2].clone()]);

    assert_eq!(
        collect(person.query(store.root()).and_eq("age", 22).run().unwrap()),
        vec![all[1].clone()]
    );
    assert!(person.query(store.root()).and_eq("shoeSize", 1).run().is_err());
}

#[test]
fn queried_values_are_validated_at_commit() {
    let (store, person) = person_store();
    let all = people(&store, &person);

    let mut runs = 0;
    let minors = store
        .transact(|rev| {
            runs += 1;
            let minors = collect(person.query(rev).and("age", Comparator::Lt, 18).run()?);
            if runs == 1 {
                store.transact_in(store.root(), |other| person.set(other, &all[1], "age", 17))?;
            }
            Ok(minors.len())
        })
        .unwrap();

    assert_eq!(runs, 2);
    assert_eq!(minors, 2);
}

#[test]
fn deleted_instances_leave_enumeration() {
    let (store, person) = person_store();
    let all = people(&store, &person);

    assert!(store.transact(|rev| person.delete(rev, &all[0])).unwrap());
    assert!(!person.delete(store.root(), &all[0]).unwrap());
    assert_eq!(person.count(store.root()), 2);
    assert_eq!(person.select(store.root(), "age").unwrap().sum_ints(), 54);
}
