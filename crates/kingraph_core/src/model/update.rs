//! Field-level record mutations proposed by the core.
//!
//! # Responsibility
//! - Describe the exact record edits an external writer must persist.
//! - Apply those edits to an in-memory record for writers and tests.
//!
//! # Invariants
//! - `PersonRecord::apply` is idempotent: the second application of the same
//!   update reports no change and leaves the record untouched.

use crate::model::person::{MarriageMetadata, PersonId, PersonRecord, SpouseRelation};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Which parent slot a relationship occupies on the child record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentRole {
    Father,
    Mother,
    Step,
    Adoptive,
}

impl ParentRole {
    /// Father/mother hold one id; step/adoptive roles hold a list.
    pub fn is_single_valued(self) -> bool {
        matches!(self, Self::Father | Self::Mother)
    }
}

impl Display for ParentRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Father => "father",
            Self::Mother => "mother",
            Self::Step => "step_parent",
            Self::Adoptive => "adoptive_parent",
        };
        f.write_str(label)
    }
}

/// One proposed mutation against a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RecordUpdate {
    SetParent {
        person: PersonId,
        role: ParentRole,
        parent: PersonId,
    },
    /// `parent: None` clears every parent held in `role`.
    ClearParent {
        person: PersonId,
        role: ParentRole,
        parent: Option<PersonId>,
    },
    AddChild {
        person: PersonId,
        child: PersonId,
    },
    RemoveChild {
        person: PersonId,
        child: PersonId,
    },
    AddSpouse {
        person: PersonId,
        relation: SpouseRelation,
    },
    UpdateSpouse {
        person: PersonId,
        spouse: PersonId,
        metadata: MarriageMetadata,
    },
    RemoveSpouse {
        person: PersonId,
        spouse: PersonId,
    },
    /// Drops the parents' union order once the parent link it described is gone.
    ClearParentUnion {
        person: PersonId,
    },
}

impl RecordUpdate {
    /// Record the writer must modify.
    pub fn target(&self) -> &PersonId {
        match self {
            Self::SetParent { person, .. }
            | Self::ClearParent { person, .. }
            | Self::AddChild { person, .. }
            | Self::RemoveChild { person, .. }
            | Self::AddSpouse { person, .. }
            | Self::UpdateSpouse { person, .. }
            | Self::RemoveSpouse { person, .. }
            | Self::ClearParentUnion { person } => person,
        }
    }
}

impl PersonRecord {
    /// Applies one update addressed to this record.
    ///
    /// Returns whether anything changed. Updates addressed to another record
    /// are ignored.
    pub fn apply(&mut self, update: &RecordUpdate) -> bool {
        if update.target() != &self.id {
            return false;
        }

        match update {
            RecordUpdate::SetParent { role, parent, .. } => match role {
                ParentRole::Father => replace_if_different(&mut self.father, parent),
                ParentRole::Mother => replace_if_different(&mut self.mother, parent),
                ParentRole::Step => push_unique(&mut self.step_parents, parent),
                ParentRole::Adoptive => push_unique(&mut self.adoptive_parents, parent),
            },
            RecordUpdate::ClearParent { role, parent, .. } => match role {
                ParentRole::Father => clear_slot(&mut self.father, parent.as_ref()),
                ParentRole::Mother => clear_slot(&mut self.mother, parent.as_ref()),
                ParentRole::Step => clear_list(&mut self.step_parents, parent.as_ref()),
                ParentRole::Adoptive => clear_list(&mut self.adoptive_parents, parent.as_ref()),
            },
            RecordUpdate::AddChild { child, .. } => push_unique(&mut self.children, child),
            RecordUpdate::RemoveChild { child, .. } => remove_all(&mut self.children, child),
            RecordUpdate::AddSpouse { relation, .. } => {
                if relation.spouse == self.id || self.spouse_entry(&relation.spouse).is_some() {
                    return false;
                }
                let mut relation = relation.clone();
                if self.spouses.iter().any(|entry| entry.order == relation.order) {
                    relation.order = self.next_spouse_order();
                }
                self.spouses.push(relation);
                true
            }
            RecordUpdate::UpdateSpouse {
                spouse, metadata, ..
            } => match self.spouses.iter_mut().find(|entry| &entry.spouse == spouse) {
                Some(entry) if &entry.metadata != metadata => {
                    entry.metadata = metadata.clone();
                    true
                }
                _ => false,
            },
            RecordUpdate::RemoveSpouse { spouse, .. } => {
                let before = self.spouses.len();
                self.spouses.retain(|entry| &entry.spouse != spouse);
                before != self.spouses.len()
            }
            RecordUpdate::ClearParentUnion { .. } => self.parent_union_order.take().is_some(),
        }
    }
}

fn replace_if_different(slot: &mut Option<PersonId>, value: &PersonId) -> bool {
    if slot.as_ref() == Some(value) {
        return false;
    }
    *slot = Some(value.clone());
    true
}

fn clear_slot(slot: &mut Option<PersonId>, only: Option<&PersonId>) -> bool {
    match (slot.as_ref(), only) {
        (None, _) => false,
        (Some(current), Some(expected)) if current != expected => false,
        _ => slot.take().is_some(),
    }
}

fn clear_list(list: &mut Vec<PersonId>, only: Option<&PersonId>) -> bool {
    match only {
        Some(parent) => remove_all(list, parent),
        None => {
            let changed = !list.is_empty();
            list.clear();
            changed
        }
    }
}

fn push_unique(list: &mut Vec<PersonId>, value: &PersonId) -> bool {
    if list.contains(value) {
        return false;
    }
    list.push(value.clone());
    true
}

fn remove_all(list: &mut Vec<PersonId>, value: &PersonId) -> bool {
    let before = list.len();
    list.retain(|existing| existing != value);
    before != list.len()
}

#[cfg(test)]
mod tests {
    use super::{ParentRole, RecordUpdate};
    use crate::model::person::{MarriageMetadata, PersonId, PersonRecord, SpouseRelation};

    #[test]
    fn apply_is_idempotent_for_child_lists() {
        let mut record = PersonRecord::new("p");
        let update = RecordUpdate::AddChild {
            person: "p".into(),
            child: "c".into(),
        };
        assert!(record.apply(&update));
        assert!(!record.apply(&update));
        assert_eq!(record.children, vec![PersonId::new("c")]);
    }

    #[test]
    fn clear_parent_respects_expected_holder() {
        let mut record = PersonRecord::new("c").with_father("f");
        let wrong = RecordUpdate::ClearParent {
            person: "c".into(),
            role: ParentRole::Father,
            parent: Some("other".into()),
        };
        assert!(!record.apply(&wrong));
        assert_eq!(record.father, Some(PersonId::new("f")));

        let right = RecordUpdate::ClearParent {
            person: "c".into(),
            role: ParentRole::Father,
            parent: None,
        };
        assert!(record.apply(&right));
        assert!(record.father.is_none());
    }

    #[test]
    fn add_spouse_reassigns_colliding_order() {
        let mut record = PersonRecord::new("a").with_spouse("b");
        let update = RecordUpdate::AddSpouse {
            person: "a".into(),
            relation: SpouseRelation {
                spouse: "c".into(),
                metadata: MarriageMetadata::default(),
                order: 1,
            },
        };
        assert!(record.apply(&update));
        assert_eq!(record.spouses[1].order, 2);
        assert!(!record.apply(&update));
    }

    #[test]
    fn updates_for_other_records_are_ignored() {
        let mut record = PersonRecord::new("a");
        let update = RecordUpdate::ClearParentUnion { person: "b".into() };
        assert!(!record.apply(&update));
    }

    #[test]
    fn updates_serialize_with_operation_tag() {
        let update = RecordUpdate::RemoveChild {
            person: "p".into(),
            child: "c".into(),
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["op"], "remove_child");
        assert_eq!(json["child"], "c");
    }
}
