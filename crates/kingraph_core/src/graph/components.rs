//! Connected family component detection.
//!
//! # Responsibility
//! - Partition the graph into maximal connected groups of people.
//! - Pick a deterministic representative and label for each group.
//!
//! # Invariants
//! - Membership is computed on every call and never stored.
//! - Output order: member count DESC, then smallest member id ASC.
//! - Representative and label never depend on display names.

use super::FamilyGraph;
use crate::model::person::PersonId;
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

/// One maximal connected set of people.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FamilyComponent {
    /// Position in the size-sorted component list.
    pub index: usize,
    pub members: BTreeSet<PersonId>,
    pub representative: PersonId,
    /// Majority group label declared by members, ties broken alphabetically.
    pub label: Option<String>,
}

impl FamilyComponent {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: &PersonId) -> bool {
        self.members.contains(id)
    }
}

/// Finds all family components in `graph`.
///
/// Breadth-first over every edge treated as undirected; linear in nodes plus
/// edges.
pub fn components(graph: &FamilyGraph) -> Vec<FamilyComponent> {
    let mut visited: HashSet<&PersonId> = HashSet::with_capacity(graph.node_count());
    let mut groups: Vec<BTreeSet<PersonId>> = Vec::new();

    for node in graph.nodes() {
        if visited.contains(&node.id) {
            continue;
        }

        let mut members = BTreeSet::new();
        let mut queue = VecDeque::from([&node.id]);
        visited.insert(&node.id);
        while let Some(current) = queue.pop_front() {
            members.insert(current.clone());
            for neighbor in graph.neighbors(current) {
                if visited.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        groups.push(members);
    }

    // BTreeSet::first is the smallest member id.
    groups.sort_by(|left, right| {
        right
            .len()
            .cmp(&left.len())
            .then_with(|| left.first().cmp(&right.first()))
    });

    let result: Vec<FamilyComponent> = groups
        .into_iter()
        .enumerate()
        .filter_map(|(index, members)| {
            let representative = choose_representative(graph, &members)?;
            let label = resolve_label(graph, &members);
            Some(FamilyComponent {
                index,
                members,
                representative,
                label,
            })
        })
        .collect();

    debug!(
        "event=components module=graph status=ok count={} nodes={}",
        result.len(),
        graph.node_count()
    );
    result
}

/// Component holding `id`, if any.
pub fn component_of<'c>(
    components: &'c [FamilyComponent],
    id: &PersonId,
) -> Option<&'c FamilyComponent> {
    components.iter().find(|component| component.contains(id))
}

/// Earliest birth year wins, then the smallest id. Placeholders carry no
/// birth data, so they only win the id fallback.
fn choose_representative(graph: &FamilyGraph, members: &BTreeSet<PersonId>) -> Option<PersonId> {
    members
        .iter()
        .min_by_key(|id| {
            let year = graph.record(id).and_then(|record| record.birth_year());
            (year.is_none(), year, *id)
        })
        .cloned()
}

fn resolve_label(graph: &FamilyGraph, members: &BTreeSet<PersonId>) -> Option<String> {
    let mut votes: BTreeMap<&str, usize> = BTreeMap::new();
    for id in members {
        let label = graph
            .record(id)
            .and_then(|record| record.group_name.as_deref())
            .map(str::trim)
            .filter(|label| !label.is_empty());
        if let Some(label) = label {
            *votes.entry(label).or_default() += 1;
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (label, count) in votes {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((label, count));
        }
    }
    best.map(|(label, _)| label.to_string())
}
