//! Reciprocal update proposals for single-sided relationship edits.
//!
//! # Responsibility
//! - Turn one relationship edit into the full set of record updates that
//!   keeps every link discoverable from both endpoints.
//! - Check current graph state so nothing already in effect is proposed.
//!
//! # Invariants
//! - Never writes; only returns `RecordUpdate`s.
//! - Re-running a change after its updates were applied proposes nothing.
//! - Unknown people produce an empty proposal plus a finding, never an error.

use crate::finding::{Finding, RelationField};
use crate::graph::FamilyGraph;
use crate::model::person::{MarriageMetadata, PersonId, PersonRecord, SpouseRelation};
use crate::model::update::{ParentRole, RecordUpdate};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One relationship edit requested by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum RelationshipChange {
    SetParent {
        child: PersonId,
        parent: PersonId,
        role: ParentRole,
    },
    /// `parent` narrows step/adoptive roles to one holder; `None` means all.
    ClearParent {
        child: PersonId,
        role: ParentRole,
        #[serde(default)]
        parent: Option<PersonId>,
    },
    AddSpouse {
        a: PersonId,
        b: PersonId,
        #[serde(default)]
        metadata: MarriageMetadata,
    },
    RemoveSpouse {
        a: PersonId,
        b: PersonId,
    },
}

/// Updates an external writer must apply, plus anything worth reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Proposal {
    pub updates: Vec<RecordUpdate>,
    pub findings: Vec<Finding>,
}

impl Proposal {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    fn push(&mut self, update: RecordUpdate) {
        if !self.updates.contains(&update) {
            self.updates.push(update);
        }
    }

    fn finding(&mut self, finding: Finding) {
        finding.log("sync");
        self.findings.push(finding);
    }
}

/// Computes the record updates that make `change` hold symmetrically.
pub fn propose_reciprocal(graph: &FamilyGraph, change: &RelationshipChange) -> Proposal {
    let mut proposal = Proposal::default();
    match change {
        RelationshipChange::SetParent {
            child,
            parent,
            role,
        } => propose_set_parent(graph, &mut proposal, child, parent, *role),
        RelationshipChange::ClearParent {
            child,
            role,
            parent,
        } => propose_clear_parent(graph, &mut proposal, child, *role, parent.as_ref()),
        RelationshipChange::AddSpouse { a, b, metadata } => {
            propose_add_spouse(graph, &mut proposal, a, b, metadata)
        }
        RelationshipChange::RemoveSpouse { a, b } => {
            propose_remove_spouse(graph, &mut proposal, a, b)
        }
    }

    debug!(
        "event=propose_reciprocal module=sync status=ok updates={} findings={}",
        proposal.updates.len(),
        proposal.findings.len()
    );
    proposal
}

/// Every reciprocal missing across the whole graph.
///
/// Used once after a bulk load ran with synchronization suspended.
pub fn reconcile(graph: &FamilyGraph) -> Proposal {
    let mut proposal = Proposal::default();
    let mut added_children: HashSet<(PersonId, PersonId)> = HashSet::new();
    let mut next_orders: BTreeMap<PersonId, u32> = BTreeMap::new();

    for record in graph.nodes().filter_map(|node| node.record.as_ref()) {
        for parent_id in parent_ids(record) {
            if parent_id == &record.id {
                continue;
            }
            let Some(parent) = graph.record(parent_id) else {
                continue;
            };
            if !parent.children.contains(&record.id)
                && added_children.insert((parent_id.clone(), record.id.clone()))
            {
                proposal.push(RecordUpdate::AddChild {
                    person: parent_id.clone(),
                    child: record.id.clone(),
                });
            }
        }

        for entry in &record.spouses {
            if entry.spouse == record.id {
                continue;
            }
            let Some(spouse) = graph.record(&entry.spouse) else {
                continue;
            };
            if spouse.spouse_entry(&record.id).is_some() {
                continue;
            }
            let next = next_orders
                .entry(spouse.id.clone())
                .or_insert_with(|| spouse.next_spouse_order());
            proposal.push(RecordUpdate::AddSpouse {
                person: spouse.id.clone(),
                relation: SpouseRelation {
                    spouse: record.id.clone(),
                    metadata: entry.metadata.clone(),
                    order: *next,
                },
            });
            *next += 1;
        }
    }

    // A children entry without a parent field cannot tell which role it was.
    for finding in graph.findings() {
        if matches!(finding, Finding::MissingReciprocal { .. }) {
            proposal.findings.push(finding.clone());
        }
    }

    debug!(
        "event=reconcile module=sync status=ok updates={} unresolved_children={}",
        proposal.updates.len(),
        proposal.findings.len()
    );
    proposal
}

fn propose_set_parent(
    graph: &FamilyGraph,
    proposal: &mut Proposal,
    child_id: &PersonId,
    parent_id: &PersonId,
    role: ParentRole,
) {
    if child_id == parent_id {
        proposal.finding(Finding::SelfReference {
            person: child_id.clone(),
            field: role_field(role),
        });
        return;
    }
    let (Some(child), Some(parent)) = (
        require(graph, proposal, child_id),
        require(graph, proposal, parent_id),
    ) else {
        return;
    };

    let already_set = match role {
        ParentRole::Father => child.father.as_ref() == Some(parent_id),
        ParentRole::Mother => child.mother.as_ref() == Some(parent_id),
        ParentRole::Step => child.step_parents.contains(parent_id),
        ParentRole::Adoptive => child.adoptive_parents.contains(parent_id),
    };

    if !already_set {
        let replaced = match role {
            ParentRole::Father => child.father.as_ref(),
            ParentRole::Mother => child.mother.as_ref(),
            ParentRole::Step | ParentRole::Adoptive => None,
        };
        if let Some(previous) = replaced {
            let still_linked = other_parent_fields(child, role).any(|id| id == previous);
            let previous_lists_child = graph
                .record(previous)
                .is_some_and(|record| record.children.contains(child_id));
            if !still_linked && previous_lists_child {
                proposal.push(RecordUpdate::RemoveChild {
                    person: previous.clone(),
                    child: child_id.clone(),
                });
            }
        }
        proposal.push(RecordUpdate::SetParent {
            person: child_id.clone(),
            role,
            parent: parent_id.clone(),
        });
    }

    if !parent.children.contains(child_id) {
        proposal.push(RecordUpdate::AddChild {
            person: parent_id.clone(),
            child: child_id.clone(),
        });
    }
}

fn propose_clear_parent(
    graph: &FamilyGraph,
    proposal: &mut Proposal,
    child_id: &PersonId,
    role: ParentRole,
    only: Option<&PersonId>,
) {
    let Some(child) = require(graph, proposal, child_id) else {
        return;
    };

    let held: Vec<&PersonId> = match role {
        ParentRole::Father => child.father.iter().collect(),
        ParentRole::Mother => child.mother.iter().collect(),
        ParentRole::Step => child.step_parents.iter().collect(),
        ParentRole::Adoptive => child.adoptive_parents.iter().collect(),
    };
    let former: Vec<&PersonId> = held
        .into_iter()
        .filter(|id| only.map_or(true, |expected| *id == expected))
        .collect();

    let mut removed_any = false;
    if former.is_empty() {
        // The caller may already have cleared the field; drop whatever
        // children entries no longer have a matching parent field.
        for (holder, _) in graph.parents_of(child_id) {
            if only.is_some_and(|expected| expected != holder) || child.references_parent(holder) {
                continue;
            }
            if graph
                .record(holder)
                .is_some_and(|record| record.children.contains(child_id))
            {
                proposal.push(RecordUpdate::RemoveChild {
                    person: holder.clone(),
                    child: child_id.clone(),
                });
                removed_any = true;
            }
        }
    } else {
        proposal.push(RecordUpdate::ClearParent {
            person: child_id.clone(),
            role,
            parent: only.cloned(),
        });
        removed_any = true;
        for previous in former {
            if other_parent_fields(child, role).any(|id| id == previous) {
                continue;
            }
            match graph.record(previous) {
                Some(record) if record.children.contains(child_id) => {
                    proposal.push(RecordUpdate::RemoveChild {
                        person: previous.clone(),
                        child: child_id.clone(),
                    });
                }
                Some(_) => {}
                None => proposal.finding(Finding::UnknownPerson {
                    person: previous.clone(),
                }),
            }
        }
    }

    if removed_any && role.is_single_valued() && child.parent_union_order.is_some() {
        proposal.push(RecordUpdate::ClearParentUnion {
            person: child_id.clone(),
        });
    }
}

fn propose_add_spouse(
    graph: &FamilyGraph,
    proposal: &mut Proposal,
    a_id: &PersonId,
    b_id: &PersonId,
    metadata: &MarriageMetadata,
) {
    if a_id == b_id {
        proposal.finding(Finding::SelfReference {
            person: a_id.clone(),
            field: RelationField::Spouse,
        });
        return;
    }
    let (Some(a), Some(b)) = (
        require(graph, proposal, a_id),
        require(graph, proposal, b_id),
    ) else {
        return;
    };

    for (me, other) in [(a, b_id), (b, a_id)] {
        match me.spouse_entry(other) {
            None => proposal.push(RecordUpdate::AddSpouse {
                person: me.id.clone(),
                relation: SpouseRelation {
                    spouse: other.clone(),
                    metadata: metadata.clone(),
                    order: me.next_spouse_order(),
                },
            }),
            Some(entry) if &entry.metadata != metadata => {
                proposal.push(RecordUpdate::UpdateSpouse {
                    person: me.id.clone(),
                    spouse: other.clone(),
                    metadata: metadata.clone(),
                })
            }
            Some(_) => {}
        }
    }
}

fn propose_remove_spouse(
    graph: &FamilyGraph,
    proposal: &mut Proposal,
    a_id: &PersonId,
    b_id: &PersonId,
) {
    let (Some(a), Some(b)) = (
        require(graph, proposal, a_id),
        require(graph, proposal, b_id),
    ) else {
        return;
    };

    for (me, other) in [(a, b_id), (b, a_id)] {
        if me.spouse_entry(other).is_some() {
            proposal.push(RecordUpdate::RemoveSpouse {
                person: me.id.clone(),
                spouse: other.clone(),
            });
        }
    }
}

fn require<'g>(
    graph: &'g FamilyGraph,
    proposal: &mut Proposal,
    id: &PersonId,
) -> Option<&'g PersonRecord> {
    let record = graph.record(id);
    if record.is_none() {
        proposal.finding(Finding::UnknownPerson { person: id.clone() });
    }
    record
}

fn parent_ids(record: &PersonRecord) -> impl Iterator<Item = &PersonId> {
    record
        .father
        .iter()
        .chain(record.mother.iter())
        .chain(record.step_parents.iter())
        .chain(record.adoptive_parents.iter())
}

/// Parent ids held by `record` in any slot other than `role`.
fn other_parent_fields(
    record: &PersonRecord,
    role: ParentRole,
) -> impl Iterator<Item = &PersonId> {
    let father = (role != ParentRole::Father).then_some(record.father.as_ref()).flatten();
    let mother = (role != ParentRole::Mother).then_some(record.mother.as_ref()).flatten();
    let step = (role != ParentRole::Step)
        .then_some(record.step_parents.iter())
        .into_iter()
        .flatten();
    let adoptive = (role != ParentRole::Adoptive)
        .then_some(record.adoptive_parents.iter())
        .into_iter()
        .flatten();
    father.into_iter().chain(mother).chain(step).chain(adoptive)
}

fn role_field(role: ParentRole) -> RelationField {
    match role {
        ParentRole::Father => RelationField::Father,
        ParentRole::Mother => RelationField::Mother,
        ParentRole::Step => RelationField::StepParent,
        ParentRole::Adoptive => RelationField::AdoptiveParent,
    }
}

#[cfg(test)]
mod tests {
    use super::{propose_reciprocal, reconcile, RelationshipChange};
    use crate::finding::Finding;
    use crate::graph::build;
    use crate::model::person::{MarriageMetadata, PersonRecord};
    use crate::model::update::{ParentRole, RecordUpdate};

    #[test]
    fn set_father_proposes_field_and_children_entry() {
        let graph = build(vec![PersonRecord::new("c"), PersonRecord::new("f")]);
        let proposal = propose_reciprocal(
            &graph,
            &RelationshipChange::SetParent {
                child: "c".into(),
                parent: "f".into(),
                role: ParentRole::Father,
            },
        );
        assert_eq!(
            proposal.updates,
            vec![
                RecordUpdate::SetParent {
                    person: "c".into(),
                    role: ParentRole::Father,
                    parent: "f".into(),
                },
                RecordUpdate::AddChild {
                    person: "f".into(),
                    child: "c".into(),
                },
            ]
        );
    }

    #[test]
    fn replacing_father_removes_child_from_previous_father() {
        let graph = build(vec![
            PersonRecord::new("c").with_father("old"),
            PersonRecord::new("old").with_child("c"),
            PersonRecord::new("new"),
        ]);
        let proposal = propose_reciprocal(
            &graph,
            &RelationshipChange::SetParent {
                child: "c".into(),
                parent: "new".into(),
                role: ParentRole::Father,
            },
        );
        assert!(proposal.updates.contains(&RecordUpdate::RemoveChild {
            person: "old".into(),
            child: "c".into(),
        }));
        assert_eq!(proposal.updates.len(), 3);
    }

    #[test]
    fn add_spouse_assigns_order_independently_per_side() {
        let graph = build(vec![
            PersonRecord::new("a").with_spouse("x").with_spouse("y"),
            PersonRecord::new("b"),
            PersonRecord::new("x"),
            PersonRecord::new("y"),
        ]);
        let proposal = propose_reciprocal(
            &graph,
            &RelationshipChange::AddSpouse {
                a: "a".into(),
                b: "b".into(),
                metadata: MarriageMetadata::default(),
            },
        );
        let orders: Vec<(String, u32)> = proposal
            .updates
            .iter()
            .filter_map(|update| match update {
                RecordUpdate::AddSpouse { person, relation } => {
                    Some((person.to_string(), relation.order))
                }
                _ => None,
            })
            .collect();
        assert_eq!(orders, vec![("a".to_string(), 3), ("b".to_string(), 1)]);
    }

    #[test]
    fn unknown_person_yields_empty_proposal_and_finding() {
        let graph = build(vec![PersonRecord::new("c")]);
        let proposal = propose_reciprocal(
            &graph,
            &RelationshipChange::RemoveSpouse {
                a: "c".into(),
                b: "nobody".into(),
            },
        );
        assert!(proposal.is_empty());
        assert!(matches!(
            proposal.findings.as_slice(),
            [Finding::UnknownPerson { person }] if person.as_str() == "nobody"
        ));
    }

    #[test]
    fn clear_parent_after_field_already_cleared_removes_dangling_entry() {
        let graph = build(vec![
            PersonRecord::new("c"),
            PersonRecord::new("f").with_child("c"),
        ]);
        let proposal = propose_reciprocal(
            &graph,
            &RelationshipChange::ClearParent {
                child: "c".into(),
                role: ParentRole::Father,
                parent: None,
            },
        );
        assert_eq!(
            proposal.updates,
            vec![RecordUpdate::RemoveChild {
                person: "f".into(),
                child: "c".into(),
            }]
        );
    }

    #[test]
    fn clear_parent_drops_parent_union_order() {
        let mut child = PersonRecord::new("c").with_mother("m");
        child.parent_union_order = Some(2);
        let graph = build(vec![child, PersonRecord::new("m").with_child("c")]);
        let proposal = propose_reciprocal(
            &graph,
            &RelationshipChange::ClearParent {
                child: "c".into(),
                role: ParentRole::Mother,
                parent: None,
            },
        );
        assert!(proposal
            .updates
            .contains(&RecordUpdate::ClearParentUnion { person: "c".into() }));
    }

    #[test]
    fn reconcile_fills_every_missing_reciprocal() {
        let graph = build(vec![
            PersonRecord::new("c").with_father("f").with_mother("m"),
            PersonRecord::new("f").with_spouse("m").with_spouse("z"),
            PersonRecord::new("m").with_child("c"),
            PersonRecord::new("z").with_spouse("q"),
        ]);
        let proposal = reconcile(&graph);
        assert!(proposal.updates.contains(&RecordUpdate::AddChild {
            person: "f".into(),
            child: "c".into(),
        }));
        let spouse_adds = proposal
            .updates
            .iter()
            .filter(|update| matches!(update, RecordUpdate::AddSpouse { .. }))
            .count();
        assert_eq!(spouse_adds, 2);
        assert_eq!(proposal.updates.len(), 3);
    }
}
