//! Record set to relationship graph conversion.

use super::{Edge, FamilyGraph, GraphNode, ParentKind};
use crate::finding::{Finding, RelationField};
use crate::model::person::{PersonId, PersonRecord};
use log::info;
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

/// Builds a relationship graph from a record snapshot.
///
/// Pure function of `records`: broken references become unresolved
/// placeholder nodes and self-references are skipped, each reported as a
/// finding on the returned graph.
pub fn build<I>(records: I) -> FamilyGraph
where
    I: IntoIterator<Item = PersonRecord>,
{
    let started_at = Instant::now();
    let mut findings = Vec::new();
    let mut by_id: BTreeMap<PersonId, PersonRecord> = BTreeMap::new();

    for record in records {
        if by_id.contains_key(&record.id) {
            findings.push(Finding::DuplicateRecord {
                person: record.id.clone(),
            });
            continue;
        }
        by_id.insert(record.id.clone(), record);
    }

    let mut placeholders: BTreeMap<PersonId, GraphNode> = BTreeMap::new();
    let mut edges = Vec::new();
    let mut parent_pairs: HashSet<(PersonId, PersonId)> = HashSet::new();
    let mut spouse_pairs: HashSet<(PersonId, PersonId)> = HashSet::new();

    for record in by_id.values() {
        let parent_refs = record
            .father
            .iter()
            .map(|id| (id, ParentKind::Biological, RelationField::Father))
            .chain(
                record
                    .mother
                    .iter()
                    .map(|id| (id, ParentKind::Biological, RelationField::Mother)),
            )
            .chain(
                record
                    .step_parents
                    .iter()
                    .map(|id| (id, ParentKind::Step, RelationField::StepParent)),
            )
            .chain(
                record
                    .adoptive_parents
                    .iter()
                    .map(|id| (id, ParentKind::Adoptive, RelationField::AdoptiveParent)),
            );

        for (parent, kind, field) in parent_refs {
            if parent == &record.id {
                findings.push(Finding::SelfReference {
                    person: record.id.clone(),
                    field,
                });
                continue;
            }
            if !parent_pairs.insert((record.id.clone(), parent.clone())) {
                continue;
            }
            note_reference(&by_id, &mut placeholders, &mut findings, record, field, parent);
            edges.push(Edge::ParentChild {
                child: record.id.clone(),
                parent: parent.clone(),
                kind,
            });
        }

        let mut seen_spouses: HashSet<&PersonId> = HashSet::new();
        for entry in &record.spouses {
            if entry.spouse == record.id {
                findings.push(Finding::SelfReference {
                    person: record.id.clone(),
                    field: RelationField::Spouse,
                });
                continue;
            }
            if !seen_spouses.insert(&entry.spouse) {
                findings.push(Finding::DuplicateSpouse {
                    person: record.id.clone(),
                    spouse: entry.spouse.clone(),
                });
                continue;
            }
            note_reference(
                &by_id,
                &mut placeholders,
                &mut findings,
                record,
                RelationField::Spouse,
                &entry.spouse,
            );
            let (a, b) = ordered_pair(&record.id, &entry.spouse);
            if spouse_pairs.insert((a.clone(), b.clone())) {
                edges.push(Edge::Spouse {
                    a: a.clone(),
                    b: b.clone(),
                    order: entry.order,
                    status: entry.metadata.status,
                });
            }
        }
    }

    // Children lists only add edges the child side does not already state.
    for record in by_id.values() {
        for child in &record.children {
            if child == &record.id {
                findings.push(Finding::SelfReference {
                    person: record.id.clone(),
                    field: RelationField::Child,
                });
                continue;
            }
            if parent_pairs.contains(&(child.clone(), record.id.clone())) {
                continue;
            }
            if by_id.contains_key(child) {
                findings.push(Finding::MissingReciprocal {
                    parent: record.id.clone(),
                    child: child.clone(),
                });
            } else {
                note_reference(
                    &by_id,
                    &mut placeholders,
                    &mut findings,
                    record,
                    RelationField::Child,
                    child,
                );
            }
            parent_pairs.insert((child.clone(), record.id.clone()));
            edges.push(Edge::ParentChild {
                child: child.clone(),
                parent: record.id.clone(),
                kind: ParentKind::Biological,
            });
        }
    }

    for finding in &findings {
        finding.log("graph");
    }

    let mut nodes: BTreeMap<PersonId, GraphNode> = by_id
        .into_iter()
        .map(|(id, record)| {
            (
                id.clone(),
                GraphNode {
                    id,
                    record: Some(record),
                },
            )
        })
        .collect();
    nodes.append(&mut placeholders);

    let graph = FamilyGraph::from_parts(nodes, edges, findings);
    info!(
        "event=graph_build module=graph status=ok nodes={} edges={} findings={} duration_ms={}",
        graph.node_count(),
        graph.edge_count(),
        graph.findings().len(),
        started_at.elapsed().as_millis()
    );
    graph
}

fn note_reference(
    by_id: &BTreeMap<PersonId, PersonRecord>,
    placeholders: &mut BTreeMap<PersonId, GraphNode>,
    findings: &mut Vec<Finding>,
    record: &PersonRecord,
    field: RelationField,
    target: &PersonId,
) {
    if by_id.contains_key(target) {
        return;
    }
    findings.push(Finding::UnresolvedReference {
        person: record.id.clone(),
        field,
        target: target.clone(),
    });
    placeholders
        .entry(target.clone())
        .or_insert_with(|| GraphNode {
            id: target.clone(),
            record: None,
        });
}

fn ordered_pair<'a>(left: &'a PersonId, right: &'a PersonId) -> (&'a PersonId, &'a PersonId) {
    if left <= right {
        (left, right)
    } else {
        (right, left)
    }
}
