use kingraph_core::{build, component_of, components, PersonId, PersonRecord};
use std::collections::BTreeSet;

fn id(value: &str) -> PersonId {
    PersonId::new(value)
}

fn two_couples() -> Vec<PersonRecord> {
    vec![
        PersonRecord::new("a").with_spouse("b"),
        PersonRecord::new("b").with_spouse("a"),
        PersonRecord::new("c").with_spouse("d"),
        PersonRecord::new("d").with_spouse("c"),
    ]
}

#[test]
fn separate_couples_are_separate_components() {
    let graph = build(two_couples());
    let found = components(&graph);

    assert_eq!(found.len(), 2);
    assert_eq!(found[0].index, 0);
    assert!(found[0].contains(&id("a")) && found[0].contains(&id("b")));
    assert!(found[1].contains(&id("c")) && found[1].contains(&id("d")));
}

#[test]
fn a_new_marriage_merges_two_components() {
    let mut records = two_couples();
    records[1] = records[1].clone().with_spouse("c");
    records[2] = records[2].clone().with_spouse("b");

    let found = components(&build(records));

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].len(), 4);
    assert_eq!(
        component_of(&found, &id("d")).map(|component| component.index),
        Some(0)
    );
}

#[test]
fn components_are_deterministic_across_input_order() {
    let records = vec![
        PersonRecord::new("x").with_father("y"),
        PersonRecord::new("y").with_child("x"),
        PersonRecord::new("solo"),
        PersonRecord::new("m").with_spouse("n"),
        PersonRecord::new("n").with_spouse("m").with_child("k"),
        PersonRecord::new("k").with_mother("n"),
    ];
    let mut reversed = records.clone();
    reversed.reverse();

    let forward = components(&build(records));
    let backward = components(&build(reversed));

    assert_eq!(forward, backward);
    let sizes: Vec<usize> = forward.iter().map(|component| component.len()).collect();
    assert_eq!(sizes, vec![3, 2, 1]);
}

#[test]
fn every_person_sits_in_exactly_one_component() {
    let records = vec![
        PersonRecord::new("p1").with_father("p2").with_mother("p3"),
        PersonRecord::new("p2").with_spouse("p3"),
        PersonRecord::new("p3"),
        PersonRecord::new("p4").with_father("ghost"),
    ];
    let graph = build(records);
    let found = components(&graph);

    for node in graph.nodes() {
        let holders = found
            .iter()
            .filter(|component| component.contains(&node.id))
            .count();
        assert_eq!(holders, 1, "{} sits in {holders} components", node.id);
    }
    let ghost_component = component_of(&found, &id("ghost")).unwrap();
    assert!(ghost_component.contains(&id("p4")));
    assert_eq!(ghost_component.representative, id("ghost"));
}

#[test]
fn joining_two_components_merges_exactly_those_two() {
    let base = vec![
        PersonRecord::new("a").with_father("b"),
        PersonRecord::new("b"),
        PersonRecord::new("c"),
        PersonRecord::new("d").with_mother("c"),
        PersonRecord::new("e"),
    ];
    let before = components(&build(base.clone()));
    assert_eq!(before.len(), 3);

    let mut extended = base;
    extended[0] = extended[0].clone().with_spouse("d");
    let after = components(&build(extended));

    assert_eq!(after.len(), before.len() - 1);
    let left = component_of(&before, &id("a")).unwrap();
    let right = component_of(&before, &id("d")).unwrap();
    let expected: BTreeSet<PersonId> = left.members.union(&right.members).cloned().collect();
    let merged = component_of(&after, &id("a")).unwrap();
    assert_eq!(merged.members, expected);

    let untouched = component_of(&after, &id("e")).unwrap();
    assert_eq!(untouched.members, BTreeSet::from([id("e")]));
}
