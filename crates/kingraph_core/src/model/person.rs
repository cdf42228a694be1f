//! Person record model.
//!
//! # Responsibility
//! - Define the record shape supplied by the record store.
//! - Provide field-level mutation helpers used when applying `RecordUpdate`s.
//!
//! # Invariants
//! - `id` is stable and never reused for another person.
//! - Relationships reference other people by `PersonId`, never by name.
//! - `spouses` holds at most one entry per spouse id; `order` values are
//!   unique within one record.

use crate::model::date::{DateSortKey, PrecisionDate};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable, opaque person identifier.
///
/// Ordering is lexicographic on the underlying string and is used as the
/// deterministic tie-breaker everywhere.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(String);

impl PersonId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Mints a fresh identifier for a record that has none yet.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PersonId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PersonId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Recorded biological sex. Independent of `gender`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    Intersex,
    Unknown,
}

/// State of one spousal relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpouseStatus {
    #[default]
    Current,
    Divorced,
    Widowed,
    Separated,
    Annulled,
    Unknown,
}

/// Marriage details that travel with a spouse entry on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MarriageMetadata {
    pub marriage_date: Option<PrecisionDate>,
    pub divorce_date: Option<PrecisionDate>,
    pub marriage_place: Option<String>,
    #[serde(default)]
    pub status: SpouseStatus,
}

/// One entry in a person's ordered spouse list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpouseRelation {
    pub spouse: PersonId,
    #[serde(flatten)]
    pub metadata: MarriageMetadata,
    /// 1-based position in this person's marriages. Not shared with the spouse.
    pub order: u32,
}

/// Canonical person record as held by the record store.
///
/// The graph core only reads these; changes travel as `RecordUpdate`s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub id: PersonId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub birth_date: Option<PrecisionDate>,
    #[serde(default)]
    pub death_date: Option<PrecisionDate>,
    #[serde(default)]
    pub sex: Option<Sex>,
    /// Free-text gender identity, kept apart from `sex`.
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub father: Option<PersonId>,
    #[serde(default)]
    pub mother: Option<PersonId>,
    #[serde(default)]
    pub step_parents: Vec<PersonId>,
    #[serde(default)]
    pub adoptive_parents: Vec<PersonId>,
    /// Spouse order index of the parents' union this person was born into.
    #[serde(default)]
    pub parent_union_order: Option<u32>,
    #[serde(default)]
    pub spouses: Vec<SpouseRelation>,
    /// Children of every parent kind. The kind is decided by the child record.
    #[serde(default)]
    pub children: Vec<PersonId>,
    #[serde(default)]
    pub collection: Option<String>,
    /// Self-declared family group label.
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub birth_place: Option<String>,
    #[serde(default)]
    pub death_place: Option<String>,
    #[serde(default)]
    pub burial_place: Option<String>,
    #[serde(default)]
    pub residence_places: Vec<String>,
}

impl PersonRecord {
    /// Creates an empty record with the given id.
    pub fn new(id: impl Into<PersonId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            birth_date: None,
            death_date: None,
            sex: None,
            gender: None,
            father: None,
            mother: None,
            step_parents: Vec::new(),
            adoptive_parents: Vec::new(),
            parent_union_order: None,
            spouses: Vec::new(),
            children: Vec::new(),
            collection: None,
            group_name: None,
            birth_place: None,
            death_place: None,
            burial_place: None,
            residence_places: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_birth(mut self, raw: &str) -> Self {
        self.birth_date = Some(PrecisionDate::parse(raw));
        self
    }

    pub fn with_sex(mut self, sex: Sex) -> Self {
        self.sex = Some(sex);
        self
    }

    pub fn with_father(mut self, father: impl Into<PersonId>) -> Self {
        self.father = Some(father.into());
        self
    }

    pub fn with_mother(mut self, mother: impl Into<PersonId>) -> Self {
        self.mother = Some(mother.into());
        self
    }

    pub fn with_child(mut self, child: impl Into<PersonId>) -> Self {
        let child = child.into();
        if !self.children.contains(&child) {
            self.children.push(child);
        }
        self
    }

    pub fn with_spouse(mut self, spouse: impl Into<PersonId>) -> Self {
        let spouse = spouse.into();
        if self.spouse_entry(&spouse).is_none() {
            let order = self.next_spouse_order();
            self.spouses.push(SpouseRelation {
                spouse,
                metadata: MarriageMetadata::default(),
                order,
            });
        }
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn with_group_name(mut self, group_name: impl Into<String>) -> Self {
        self.group_name = Some(group_name.into());
        self
    }

    pub fn with_birth_place(mut self, place: impl Into<String>) -> Self {
        self.birth_place = Some(place.into());
        self
    }

    /// Earliest-first ordering key for the birth date.
    pub fn birth_key(&self) -> DateSortKey {
        DateSortKey::of(self.birth_date.as_ref())
    }

    /// Parsed birth year, when the birth date carries one.
    pub fn birth_year(&self) -> Option<i32> {
        self.birth_date.as_ref().and_then(|date| date.year)
    }

    pub fn spouse_entry(&self, spouse: &PersonId) -> Option<&SpouseRelation> {
        self.spouses.iter().find(|entry| &entry.spouse == spouse)
    }

    /// Next free 1-based spouse order index on this record.
    pub fn next_spouse_order(&self) -> u32 {
        self.spouses
            .iter()
            .map(|entry| entry.order)
            .max()
            .map_or(1, |max| max + 1)
    }

    /// Spouse entries sorted by their order index, then by spouse id.
    pub fn ordered_spouses(&self) -> Vec<&SpouseRelation> {
        let mut entries: Vec<&SpouseRelation> = self.spouses.iter().collect();
        entries.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.spouse.cmp(&b.spouse)));
        entries
    }

    /// Whether `parent` is referenced by any parent field of this record.
    pub fn references_parent(&self, parent: &PersonId) -> bool {
        self.father.as_ref() == Some(parent)
            || self.mother.as_ref() == Some(parent)
            || self.step_parents.contains(parent)
            || self.adoptive_parents.contains(parent)
    }
}
