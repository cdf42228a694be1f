use kingraph_core::tree::{PlaceFilter, TreeNodeRole};
use kingraph_core::Finding;
use kingraph_core::{
    build, derive, derive_with_cancel, CancelToken, FamilyGraph, PersonId, PersonRecord,
    TreeDirection, TreeError, TreeOptions,
};

fn id(value: &str) -> PersonId {
    PersonId::new(value)
}

fn nuclear() -> FamilyGraph {
    build(vec![
        PersonRecord::new("f").with_spouse("m").with_child("s").with_child("r"),
        PersonRecord::new("m").with_spouse("f").with_child("s").with_child("r"),
        PersonRecord::new("s").with_father("f").with_mother("m").with_birth("1880"),
        PersonRecord::new("r")
            .with_father("f")
            .with_mother("m")
            .with_birth("1885")
            .with_child("c"),
        PersonRecord::new("c").with_father("r"),
    ])
}

/// r -> p -> g -> gg, each the father of the previous one.
fn paternal_line() -> FamilyGraph {
    build(vec![
        PersonRecord::new("r").with_father("p").with_collection("Main"),
        PersonRecord::new("p").with_father("g").with_child("r").with_collection("Main"),
        PersonRecord::new("g").with_father("gg").with_child("p"),
        PersonRecord::new("gg").with_child("g").with_collection("Main"),
    ])
}

#[test]
fn nuclear_family_from_a_child() {
    let tree = derive(&nuclear(), &id("r"), &TreeOptions::default()).unwrap();

    assert_eq!(tree.len(), 5);
    assert_eq!(tree.nodes[0].id, id("r"));
    assert_eq!(tree.node(&id("r")).unwrap().role, TreeNodeRole::Root);
    assert_eq!(tree.generation(&id("f")), Some(-1));
    assert_eq!(tree.generation(&id("m")), Some(-1));
    assert_eq!(tree.generation(&id("s")), Some(0));
    assert_eq!(tree.node(&id("s")).unwrap().role, TreeNodeRole::Sibling);
    assert_eq!(tree.generation(&id("c")), Some(1));

    let r_id = id("r");
    let mut parents: Vec<&PersonId> = tree.parents_of(&r_id).collect();
    parents.sort();
    assert_eq!(parents, vec![&id("f"), &id("m")]);
    let f_id = id("f");
    let spouses: Vec<&PersonId> = tree.spouses_of(&f_id).collect();
    assert_eq!(spouses, vec![&id("m")]);
    assert_eq!(tree.edges.iter().filter(|edge| edge.is_spouse()).count(), 1);
}

#[test]
fn ancestors_stop_at_the_generation_limit() {
    let options = TreeOptions {
        direction: TreeDirection::Ancestors,
        generation_limit: 2,
        ..TreeOptions::default()
    };
    let tree = derive(&paternal_line(), &id("r"), &options).unwrap();

    assert_eq!(tree.len(), 3);
    assert_eq!(tree.generation(&id("p")), Some(-1));
    assert_eq!(tree.generation(&id("g")), Some(-2));
    assert!(!tree.contains(&id("gg")));
}

#[test]
fn descendants_never_include_ancestors() {
    let options = TreeOptions {
        direction: TreeDirection::Descendants,
        ..TreeOptions::default()
    };
    let tree = derive(&paternal_line(), &id("g"), &options).unwrap();

    let ids: Vec<&str> = tree.nodes.iter().map(|node| node.id.as_str()).collect();
    assert_eq!(ids, vec!["g", "p", "r"]);
    assert!(tree.nodes.iter().all(|node| node.generation >= 0));
}

#[test]
fn generation_limit_bounds_every_node() {
    let graph = paternal_line();
    for limit in 1..=3 {
        let options = TreeOptions {
            generation_limit: limit,
            ..TreeOptions::default()
        };
        let tree = derive(&graph, &id("p"), &options).unwrap();
        for node in &tree.nodes {
            assert!(node.generation.unsigned_abs() <= limit, "{} at {}", node.id, node.generation);
        }
    }
}

#[test]
fn missing_root_is_an_error() {
    let result = derive(&nuclear(), &id("nobody"), &TreeOptions::default());
    assert_eq!(result.unwrap_err(), TreeError::RootNotFound(id("nobody")));
}

#[test]
fn filter_that_rejects_the_root_is_an_error() {
    let options = TreeOptions {
        collection_filter: Some("Other".to_string()),
        ..TreeOptions::default()
    };
    let result = derive(&paternal_line(), &id("r"), &options);
    assert_eq!(result.unwrap_err(), TreeError::RootExcludedByFilter(id("r")));
}

#[test]
fn collection_filter_prunes_people_behind_a_gap() {
    let options = TreeOptions {
        direction: TreeDirection::Ancestors,
        collection_filter: Some("main".to_string()),
        ..TreeOptions::default()
    };
    let tree = derive(&paternal_line(), &id("r"), &options).unwrap();

    let ids: Vec<&str> = tree.nodes.iter().map(|node| node.id.as_str()).collect();
    assert_eq!(ids, vec!["r", "p"]);
}

#[test]
fn place_filter_with_blank_text_keeps_everyone() {
    let options = TreeOptions {
        place_filter: Some(PlaceFilter {
            place: "  ".to_string(),
            roles: Vec::new(),
        }),
        ..TreeOptions::default()
    };
    let tree = derive(&nuclear(), &id("r"), &options).unwrap();
    assert_eq!(tree.len(), 5);
}

#[test]
fn cancelled_derivation_returns_no_tree() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = derive_with_cancel(&nuclear(), &id("r"), &TreeOptions::default(), &cancel);
    assert_eq!(result.unwrap_err(), TreeError::Cancelled);
}

#[test]
fn unresolved_parents_appear_as_unresolved_nodes() {
    let graph = build(vec![PersonRecord::new("r").with_father("lost")]);
    let tree = derive(&graph, &id("r"), &TreeOptions::default()).unwrap();

    let lost = tree.node(&id("lost")).unwrap();
    assert!(!lost.resolved);
    assert_eq!(lost.generation, -1);
}

#[test]
fn uncle_marrying_his_niece_is_not_a_cycle() {
    // gp is a grandparent of r through uncle and a great-grandparent through niece.
    let graph = build(vec![
        PersonRecord::new("gp"),
        PersonRecord::new("uncle").with_father("gp").with_spouse("niece"),
        PersonRecord::new("aunt").with_father("gp"),
        PersonRecord::new("niece").with_mother("aunt").with_spouse("uncle"),
        PersonRecord::new("r").with_father("uncle").with_mother("niece"),
    ]);
    let options = TreeOptions {
        direction: TreeDirection::Ancestors,
        ..TreeOptions::default()
    };
    let tree = derive(&graph, &id("r"), &options).unwrap();

    assert_eq!(tree.len(), 5);
    assert!(!tree
        .findings
        .iter()
        .any(|finding| matches!(finding, Finding::Cycle { .. })));
}

#[test]
fn real_ancestry_loop_is_reported_once() {
    let graph = build(vec![
        PersonRecord::new("a").with_father("b"),
        PersonRecord::new("b").with_father("c"),
        PersonRecord::new("c").with_father("a"),
    ]);
    let options = TreeOptions {
        direction: TreeDirection::Ancestors,
        ..TreeOptions::default()
    };
    let tree = derive(&graph, &id("a"), &options).unwrap();

    assert_eq!(tree.len(), 3);
    let cycles = tree
        .findings
        .iter()
        .filter(|finding| matches!(finding, Finding::Cycle { .. }))
        .count();
    assert_eq!(cycles, 1);
}
