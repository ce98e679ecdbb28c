//! Instance visibility through the revision tree

use crate::common::*;
use proptest::prelude::*;
use std::collections::HashSet;

#[test]
fn created_and_removed_in_same_overlay_leaves_no_trace() {
    let root = Revision::new_root();
    let branch = root.branch();
    let p = instance();
    branch.add(p.clone());
    branch.remove(&p);

    assert_eq!(branch.iterator().count(), 0);
    assert!(branch.pending_operations().is_empty());
    branch.commit().unwrap();
    assert_eq!(root.iterator().count(), 0);
}

#[test]
fn own_creations_come_before_inherited_instances() {
    let root = Revision::new_root();
    let a = instance();
    let b = instance();
    let c = instance();
    root.add(a.clone());
    let outer = root.branch();
    outer.add(b.clone());
    let inner = outer.branch();
    inner.add(c.clone());

    assert_eq!(inner.iterator().collect::<Vec<_>>(), vec![c, b, a]);
}

#[test]
fn deletion_hides_ancestor_instance_only_below() {
    let root = Revision::new_root();
    let a = instance();
    root.add(a.clone());
    let outer = root.branch();
    let inner = outer.branch();
    inner.remove(&a);

    assert!(!inner.contains(&a));
    assert!(outer.contains(&a));
    inner.commit().unwrap();
    assert!(!outer.contains(&a));
    assert!(root.contains(&a));
    outer.commit().unwrap();
    assert!(!root.contains(&a));
}

#[test]
fn iterator_is_lazy_over_parent() {
    let root = Revision::new_root();
    let branch = root.branch();
    let mine = instance();
    branch.add(mine.clone());
    for _ in 0..3 {
        root.add(instance());
    }

    let mut iter = branch.iterator();
    assert_eq!(iter.next(), Some(mine));
    assert_eq!(iter.count(), 3);
}

#[derive(Debug, Clone)]
enum Op {
    Create,
    RemoveInherited(usize),
    RemoveCreated(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Create),
        (0usize..8).prop_map(Op::RemoveInherited),
        (0usize..8).prop_map(Op::RemoveCreated),
    ]
}

proptest! {
    /// iterator() = (ancestor-visible ∪ created) \ deleted, without duplicates
    #[test]
    fn iterator_yields_exactly_the_visible_set(
        inherited in 0usize..6,
        ops in prop::collection::vec(op(), 0..30),
    ) {
        let root = Revision::new_root();
        let existing: Vec<Instance> = (0..inherited).map(|_| instance()).collect();
        for p in &existing {
            root.add(p.clone());
        }

        let branch = root.branch();
        let mut expected: HashSet<Instance> = existing.iter().cloned().collect();
        let mut created: Vec<Instance> = Vec::new();

        for op in ops {
            match op {
                Op::Create => {
                    let p = instance();
                    branch.add(p.clone());
                    expected.insert(p.clone());
                    created.push(p);
                }
                Op::RemoveInherited(i) if !existing.is_empty() => {
                    let p = &existing[i % existing.len()];
                    branch.remove(p);
                    expected.remove(p);
                }
                Op::RemoveCreated(i) if !created.is_empty() => {
                    let p = created.remove(i % created.len());
                    branch.remove(&p);
                    expected.remove(&p);
                }
                _ => {}
            }
        }

        let seen: Vec<Instance> = branch.iterator().collect();
        let unique: HashSet<Instance> = seen.iter().cloned().collect();
        prop_assert_eq!(seen.len(), unique.len());
        prop_assert_eq!(&unique, &expected);

        // The root is unaffected until commit, then matches the branch
        let root_view: HashSet<Instance> = root.iterator().collect();
        prop_assert_eq!(root_view, existing.iter().cloned().collect::<HashSet<_>>());
        branch.commit().unwrap();
        let committed: HashSet<Instance> = root.iterator().collect();
        prop_assert_eq!(committed, expected);
    }
}
