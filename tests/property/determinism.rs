//! Property-based tests for object identity determinism

use proptest::prelude::*;
use skein::model::{Node, Value};
use std::collections::BTreeMap;

fn member_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,12}"
}

fn member_value() -> impl Strategy<Value = i64> {
    any::<i64>()
}

/// Same members in any insertion order always produce the same id.
#[test]
fn test_id_is_insertion_order_independent() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &proptest::collection::btree_map(member_name(), member_value(), 1..8),
            |members: BTreeMap<String, i64>| {
                let mut forward = Node::new("Thing");
                for (name, value) in &members {
                    forward.set(name.clone(), (*value).into()).unwrap();
                }

                let mut reverse = Node::new("Thing");
                for (name, value) in members.iter().rev() {
                    reverse.set(name.clone(), (*value).into()).unwrap();
                }

                assert_eq!(forward.id().unwrap(), reverse.id().unwrap());
                Ok(())
            },
        )
        .unwrap();
}

/// Identical content always hashes to the same id; a changed member value
/// always changes it.
#[test]
fn test_id_tracks_content() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(member_name(), member_value(), member_value()),
            |(name, v1, v2)| {
                let mut a = Node::new("Thing");
                a.set(name.clone(), v1.into()).unwrap();

                let mut b = Node::new("Thing");
                b.set(name.clone(), v1.into()).unwrap();

                assert_eq!(a.id().unwrap(), b.id().unwrap());

                if v1 != v2 {
                    let mut c = Node::new("Thing");
                    c.set(name, v2.into()).unwrap();
                    assert_ne!(a.id().unwrap(), c.id().unwrap());
                }

                Ok(())
            },
        )
        .unwrap();
}

/// Sequence element order is semantic: permuting a sequence changes the id.
#[test]
fn test_sequence_order_is_semantic() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &proptest::collection::vec(any::<i64>(), 2..10),
            |items: Vec<i64>| {
                // First and last differ, so the reversed sequence is distinct.
                prop_assume!(items.first() != items.last());

                let forward: Vec<Value> = items.iter().map(|i| (*i).into()).collect();
                let reverse: Vec<Value> = items.iter().rev().map(|i| (*i).into()).collect();

                let mut a = Node::new("Thing");
                a.set("items", Value::Sequence(forward)).unwrap();

                let mut b = Node::new("Thing");
                b.set("items", Value::Sequence(reverse)).unwrap();

                assert_ne!(a.id().unwrap(), b.id().unwrap());
                Ok(())
            },
        )
        .unwrap();
}

/// The type tag participates in identity even with identical members.
#[test]
fn test_type_tag_is_semantic() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(member_name(), member_value()), |(name, value)| {
            let mut a = Node::new("Wall");
            a.set(name.clone(), value.into()).unwrap();

            let mut b = Node::new("Floor");
            b.set(name, value.into()).unwrap();

            assert_ne!(a.id().unwrap(), b.id().unwrap());
            Ok(())
        })
        .unwrap();
}
