//! Collection and place post-filters over a derived node set.

use super::{PlaceFilter, PlaceRole, TreeEdge, TreeError, TreeOptions};
use crate::graph::FamilyGraph;
use crate::model::person::{PersonId, PersonRecord};
use log::debug;
use std::collections::{HashMap, HashSet, VecDeque};

const ALL_PLACE_ROLES: [PlaceRole; 4] = [
    PlaceRole::Birth,
    PlaceRole::Death,
    PlaceRole::Marriage,
    PlaceRole::Burial,
];

/// Drops nodes failing the filters, their edges, and anything left
/// unreachable from the root.
pub(super) fn apply_filters(
    graph: &FamilyGraph,
    options: &TreeOptions,
    root: &PersonId,
    order: Vec<PersonId>,
    edges: Vec<TreeEdge>,
) -> Result<(Vec<PersonId>, Vec<TreeEdge>), TreeError> {
    if options.collection_filter.is_none() && options.place_filter.is_none() {
        return Ok((order, edges));
    }

    if !passes(graph.record(root), options) {
        debug!("event=tree_filter module=tree status=error error_code=root_excluded root={root}");
        return Err(TreeError::RootExcludedByFilter(root.clone()));
    }

    let kept: HashSet<&PersonId> = order
        .iter()
        .filter(|id| *id == root || passes(graph.record(id), options))
        .collect();
    let edges: Vec<TreeEdge> = edges
        .into_iter()
        .filter(|edge| kept.contains(&edge.from) && kept.contains(&edge.to))
        .collect();

    let reachable = reachable_from(root, &edges);
    let before = order.len();
    let order: Vec<PersonId> = order
        .into_iter()
        .filter(|id| reachable.contains(id))
        .collect();
    let edges: Vec<TreeEdge> = edges
        .into_iter()
        .filter(|edge| reachable.contains(&edge.from) && reachable.contains(&edge.to))
        .collect();

    debug!(
        "event=tree_filter module=tree status=ok kept={} dropped={}",
        order.len(),
        before - order.len()
    );
    Ok((order, edges))
}

fn passes(record: Option<&PersonRecord>, options: &TreeOptions) -> bool {
    let Some(record) = record else {
        return false;
    };

    if let Some(collection) = options.collection_filter.as_deref() {
        let matches = record
            .collection
            .as_deref()
            .is_some_and(|value| value.trim().eq_ignore_ascii_case(collection.trim()));
        if !matches {
            return false;
        }
    }

    match &options.place_filter {
        Some(filter) => matches_place(record, filter),
        None => true,
    }
}

fn matches_place(record: &PersonRecord, filter: &PlaceFilter) -> bool {
    let needle = filter.place.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    let roles: &[PlaceRole] = if filter.roles.is_empty() {
        &ALL_PLACE_ROLES
    } else {
        &filter.roles
    };

    let hit = |place: Option<&str>| place.is_some_and(|value| value.to_lowercase().contains(&needle));
    roles.iter().any(|role| match role {
        PlaceRole::Birth => hit(record.birth_place.as_deref()),
        PlaceRole::Death => hit(record.death_place.as_deref()),
        PlaceRole::Burial => hit(record.burial_place.as_deref()),
        PlaceRole::Marriage => record
            .spouses
            .iter()
            .any(|entry| hit(entry.metadata.marriage_place.as_deref())),
    })
}

fn reachable_from(root: &PersonId, edges: &[TreeEdge]) -> HashSet<PersonId> {
    let mut adjacency: HashMap<&PersonId, Vec<&PersonId>> = HashMap::new();
    for edge in edges {
        adjacency.entry(&edge.from).or_default().push(&edge.to);
        adjacency.entry(&edge.to).or_default().push(&edge.from);
    }

    let mut seen: HashSet<PersonId> = HashSet::from([root.clone()]);
    let mut queue = VecDeque::from([root]);
    while let Some(current) = queue.pop_front() {
        for next in adjacency.get(current).into_iter().flatten() {
            if seen.insert((*next).clone()) {
                queue.push_back(*next);
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use crate::graph::build;
    use crate::model::person::{PersonId, PersonRecord};
    use crate::tree::{derive, PlaceFilter, PlaceRole, TreeDirection, TreeOptions};

    #[test]
    fn place_filter_prunes_people_cut_off_from_root() {
        let graph = build(vec![
            PersonRecord::new("r").with_father("f").with_birth_place("Boston, MA"),
            PersonRecord::new("f").with_father("gf").with_birth_place("Cork"),
            PersonRecord::new("gf").with_birth_place("Boston"),
        ]);
        let options = TreeOptions {
            direction: TreeDirection::Ancestors,
            place_filter: Some(PlaceFilter {
                place: "boston".to_string(),
                roles: vec![PlaceRole::Birth],
            }),
            ..TreeOptions::default()
        };
        let tree = derive(&graph, &PersonId::new("r"), &options).unwrap();
        assert!(tree.contains(&PersonId::new("r")));
        assert!(!tree.contains(&PersonId::new("f")));
        assert!(!tree.contains(&PersonId::new("gf")));
        assert!(tree.edges.is_empty());
    }

    #[test]
    fn marriage_role_checks_spouse_entries() {
        let mut root = PersonRecord::new("r").with_spouse("s");
        root.spouses[0].metadata.marriage_place = Some("Dublin".to_string());
        let graph = build(vec![root, PersonRecord::new("s").with_spouse("r")]);
        let options = TreeOptions {
            place_filter: Some(PlaceFilter {
                place: "dublin".to_string(),
                roles: vec![PlaceRole::Marriage],
            }),
            ..TreeOptions::default()
        };
        let tree = derive(&graph, &PersonId::new("r"), &options).unwrap();
        assert!(tree.contains(&PersonId::new("r")));
        assert!(!tree.contains(&PersonId::new("s")));
    }
}
