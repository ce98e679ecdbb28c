//! Lookups through derived and property-keyed indexes

use crate::common::*;

#[test]
fn derived_key_lookup() {
    let (store, person) = person_store();
    let gillis = store
        .transact(|rev| person.create(rev, [("firstName", "Gillis")]))
        .unwrap();

    assert_eq!(collect(person.find(store.root(), "firstLetter", "G")), vec![gillis]);
    assert_eq!(person.find(store.root(), "firstLetter", "J").count(), 0);
}

#[test]
fn renaming_moves_property_bucket_but_keeps_derived_bucket() {
    let (store, person) = person_store();
    let p = person.create(store.root(), [("firstName", "Emile")]).unwrap();

    store
        .transact(|rev| person.set(rev, &p, "firstName", "Emiel"))
        .unwrap();

    let root = store.root();
    assert_eq!(collect(person.find(root, "firstLetter", "E")), vec![p.clone()]);
    assert_eq!(person.find(root, "firstName", "Emile").count(), 0);
    assert_eq!(collect(person.find(root, "firstName", "Emiel")), vec![p]);
}

#[test]
fn buckets_list_newest_first() {
    let (store, person) = person_store();
    let ada = person.create(store.root(), [("firstName", "Ada")]).unwrap();
    let alan = person.create(store.root(), [("firstName", "Alan")]).unwrap();

    assert_eq!(collect(person.find(store.root(), "firstLetter", "A")), vec![alan, ada]);
}

#[test]
fn unknown_index_or_key_yields_empty_sequence() {
    let (store, person) = person_store();
    person.create(store.root(), [("firstName", "Ada")]).unwrap();

    assert_eq!(person.find(store.root(), "byShoeSize", 42).count(), 0);
    assert_eq!(person.find(store.root(), "firstName", "Zed").count(), 0);
}

#[test]
fn null_keys_are_indexed() {
    let (store, person) = person_store();
    let anonymous = person.create_default(store.root()).unwrap();
    assert_eq!(collect(person.find(store.root(), "firstName", Value::Null)), vec![anonymous]);
}

#[test]
fn index_added_later_covers_existing_instances() {
    let (store, person) = person_store();
    let young = person.create(store.root(), [("age", 9)]).unwrap();
    person.create(store.root(), [("age", 70)]).unwrap();

    let by_age_group = person
        .create_index(
            store.root(),
            "ageGroup",
            IndexKey::derived(|view| match view.get("age").as_int() {
                Some(age) if age < 18 => Value::from("minor"),
                Some(_) => Value::from("adult"),
                None => Value::Null,
            }),
        )
        .unwrap();

    assert_eq!(collect(by_age_group.find(store.root(), "minor")), vec![young.clone()]);

    // Maintained from now on
    store.transact(|rev| person.set(rev, &young, "age", 30)).unwrap();
    assert_eq!(person.find(store.root(), "ageGroup", "minor").count(), 0);
    assert_eq!(person.find(store.root(), "ageGroup", "adult").count(), 2);
}

#[test]
fn deleted_instances_leave_the_index() {
    let (store, person) = person_store();
    let p = person.create(store.root(), [("firstName", "Ada")]).unwrap();
    store.transact(|rev| person.delete(rev, &p)).unwrap();

    assert_eq!(person.find(store.root(), "firstName", "Ada").count(), 0);
    assert_eq!(person.find(store.root(), "firstLetter", "A").count(), 0);
}

#[test]
fn extension_instances_appear_in_parent_indexes() {
    let (store, person) = person_store();
    let student = store
        .create(
            ModelDefinition::new("Student")
                .extending(&person)
                .property("school", PropertyType::String)
                .index("school", "school"),
        )
        .unwrap();

    let s = student
        .create(store.root(), [("firstName", "Grace"), ("school", "Yale")])
        .unwrap();
    let p = person.create(store.root(), [("firstName", "Gus")]).unwrap();

    assert_eq!(collect(person.find(store.root(), "firstLetter", "G")), vec![p, s.clone()]);
    assert_eq!(collect(student.find(store.root(), "firstLetter", "G")), vec![s.clone()]);
    assert_eq!(collect(student.find(store.root(), "school", "Yale")), vec![s]);
    assert_eq!(person.find(store.root(), "school", "Yale").count(), 0);
}
