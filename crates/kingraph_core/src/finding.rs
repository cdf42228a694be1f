//! Non-fatal data-integrity findings.
//!
//! # Responsibility
//! - Describe anomalies met while building, deriving or synchronizing.
//! - Keep one stable log line shape for every finding.
//!
//! # Invariants
//! - A finding never aborts the operation that produced it.

use crate::model::person::PersonId;
use log::warn;
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Relationship field a finding refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationField {
    Father,
    Mother,
    StepParent,
    AdoptiveParent,
    Spouse,
    Child,
}

impl Display for RelationField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Father => "father",
            Self::Mother => "mother",
            Self::StepParent => "step_parent",
            Self::AdoptiveParent => "adoptive_parent",
            Self::Spouse => "spouse",
            Self::Child => "child",
        };
        f.write_str(label)
    }
}

/// Anomaly in the record set that was tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// A record references itself; that one edge was skipped.
    SelfReference { person: PersonId, field: RelationField },
    /// A record references an id that is not loaded; a placeholder node stands in.
    UnresolvedReference {
        person: PersonId,
        field: RelationField,
        target: PersonId,
    },
    /// The same spouse appears twice in one record; the first entry wins.
    DuplicateSpouse { person: PersonId, spouse: PersonId },
    /// Two input records share an id; the first one wins.
    DuplicateRecord { person: PersonId },
    /// A children-list entry has no matching parent field on the child.
    MissingReciprocal { parent: PersonId, child: PersonId },
    /// Traversal met a relationship that loops back through the generations.
    Cycle { from: PersonId, to: PersonId },
    /// A relationship edit names a person the graph does not hold.
    UnknownPerson { person: PersonId },
}

impl Finding {
    /// Stable machine-readable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SelfReference { .. } => "self_reference",
            Self::UnresolvedReference { .. } => "unresolved_reference",
            Self::DuplicateSpouse { .. } => "duplicate_spouse",
            Self::DuplicateRecord { .. } => "duplicate_record",
            Self::MissingReciprocal { .. } => "missing_reciprocal",
            Self::Cycle { .. } => "cycle",
            Self::UnknownPerson { .. } => "unknown_person",
        }
    }

    /// Emits this finding as a `warn` event tagged with the reporting module.
    pub fn log(&self, module: &str) {
        warn!(
            "event=integrity_finding module={} status=warn code={} detail=\"{}\"",
            module,
            self.code(),
            self
        );
    }
}

impl Display for Finding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfReference { person, field } => {
                write!(f, "person {person} lists itself as {field}")
            }
            Self::UnresolvedReference {
                person,
                field,
                target,
            } => write!(f, "person {person} references unknown {field} {target}"),
            Self::DuplicateSpouse { person, spouse } => {
                write!(f, "person {person} lists spouse {spouse} more than once")
            }
            Self::DuplicateRecord { person } => write!(f, "duplicate record for person {person}"),
            Self::MissingReciprocal { parent, child } => write!(
                f,
                "person {parent} lists child {child} but the child does not list them as a parent"
            ),
            Self::Cycle { from, to } => {
                write!(f, "relationship {from} -> {to} closes an ancestry cycle")
            }
            Self::UnknownPerson { person } => write!(f, "person not found: {person}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Finding, RelationField};

    #[test]
    fn display_names_the_people_involved() {
        let finding = Finding::UnresolvedReference {
            person: "a".into(),
            field: RelationField::Father,
            target: "ghost".into(),
        };
        assert_eq!(finding.to_string(), "person a references unknown father ghost");
        assert_eq!(finding.code(), "unresolved_reference");
    }
}
