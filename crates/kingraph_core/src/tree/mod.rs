//! Bounded tree views derived from the relationship graph.
//!
//! # Responsibility
//! - Define derivation options, the derived `Tree` and its errors.
//! - Walk the graph from a root under direction, generation and filter limits.
//!
//! # Invariants
//! - The root has generation offset 0; ancestors are negative and
//!   descendants positive.
//! - With `generation_limit = k > 0`, every node satisfies `|offset| <= k`.
//! - Derivation always terminates; cycles are reported as findings.
//! - Filtering never leaves a node that is disconnected from the root.

mod derive;
mod filter;

pub use derive::{derive, derive_with_cancel};

use crate::finding::Finding;
use crate::graph::ParentKind;
use crate::model::person::PersonId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Which relatives to walk from the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeDirection {
    Ancestors,
    Descendants,
    #[default]
    Full,
}

/// Date role whose place qualifies a person for a place filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceRole {
    Birth,
    Death,
    Marriage,
    Burial,
}

/// Keeps people with a matching place in one of `roles` (all roles when empty).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceFilter {
    pub place: String,
    #[serde(default)]
    pub roles: Vec<PlaceRole>,
}

/// Derivation options. Plain data; loadable from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeOptions {
    pub direction: TreeDirection,
    /// 0 means unlimited.
    pub generation_limit: u32,
    pub include_spouses: bool,
    pub include_step_parents: bool,
    pub include_adoptive_parents: bool,
    pub collection_filter: Option<String>,
    pub place_filter: Option<PlaceFilter>,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            direction: TreeDirection::Full,
            generation_limit: 0,
            include_spouses: true,
            include_step_parents: false,
            include_adoptive_parents: false,
            collection_filter: None,
            place_filter: None,
        }
    }
}

impl TreeOptions {
    pub fn allows(&self, kind: ParentKind) -> bool {
        match kind {
            ParentKind::Biological => true,
            ParentKind::Step => self.include_step_parents,
            ParentKind::Adoptive => self.include_adoptive_parents,
        }
    }
}

/// How a node entered the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNodeRole {
    Root,
    Ancestor,
    Descendant,
    Sibling,
    Spouse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub id: PersonId,
    /// Signed distance from the root along the ancestor/descendant axis.
    pub generation: i32,
    pub role: TreeNodeRole,
    pub resolved: bool,
    pub name: Option<String>,
    pub birth_year: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeEdgeKind {
    Biological,
    Step,
    Adoptive,
    Spouse,
}

impl From<ParentKind> for TreeEdgeKind {
    fn from(value: ParentKind) -> Self {
        match value {
            ParentKind::Biological => Self::Biological,
            ParentKind::Step => Self::Step,
            ParentKind::Adoptive => Self::Adoptive,
        }
    }
}

/// Parent-child edges run `from` parent `to` child; spouse edges run from the
/// partner discovered first to the other one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEdge {
    pub from: PersonId,
    pub to: PersonId,
    pub kind: TreeEdgeKind,
    /// Spouse order index as seen from `from`.
    pub order: Option<u32>,
}

impl TreeEdge {
    pub fn is_spouse(&self) -> bool {
        self.kind == TreeEdgeKind::Spouse
    }
}

/// Bounded subgraph consumed by the layout engine.
#[derive(Debug, Clone, Serialize)]
pub struct Tree {
    pub root: PersonId,
    pub direction: TreeDirection,
    pub generation_limit: u32,
    /// Discovery order; children follow birth order and spouses their order index.
    pub nodes: Vec<TreeNode>,
    pub edges: Vec<TreeEdge>,
    pub findings: Vec<Finding>,
    #[serde(skip)]
    index: HashMap<PersonId, usize>,
}

impl Tree {
    pub fn new(
        root: PersonId,
        direction: TreeDirection,
        generation_limit: u32,
        nodes: Vec<TreeNode>,
        edges: Vec<TreeEdge>,
        findings: Vec<Finding>,
    ) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(position, node)| (node.id.clone(), position))
            .collect();
        Self {
            root,
            direction,
            generation_limit,
            nodes,
            edges,
            findings,
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &PersonId) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &PersonId) -> Option<&TreeNode> {
        self.index.get(id).map(|position| &self.nodes[*position])
    }

    /// Discovery position of `id`.
    pub fn position(&self, id: &PersonId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn generation(&self, id: &PersonId) -> Option<i32> {
        self.node(id).map(|node| node.generation)
    }

    pub fn parents_of<'t>(&'t self, id: &'t PersonId) -> impl Iterator<Item = &'t PersonId> + 't {
        self.edges
            .iter()
            .filter(move |edge| !edge.is_spouse() && &edge.to == id)
            .map(|edge| &edge.from)
    }

    pub fn children_of<'t>(&'t self, id: &'t PersonId) -> impl Iterator<Item = &'t PersonId> + 't {
        self.edges
            .iter()
            .filter(move |edge| !edge.is_spouse() && &edge.from == id)
            .map(|edge| &edge.to)
    }

    pub fn spouses_of<'t>(&'t self, id: &'t PersonId) -> impl Iterator<Item = &'t PersonId> + 't {
        self.edges.iter().filter(|edge| edge.is_spouse()).filter_map(move |edge| {
            if &edge.from == id {
                Some(&edge.to)
            } else if &edge.to == id {
                Some(&edge.from)
            } else {
                None
            }
        })
    }
}

/// Errors from tree derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Root id is not in the graph.
    RootNotFound(PersonId),
    /// The collection or place filter rejects the root itself.
    RootExcludedByFilter(PersonId),
    /// The caller cancelled the derivation.
    Cancelled,
}

impl Display for TreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RootNotFound(id) => write!(f, "tree root not found: {id}"),
            Self::RootExcludedByFilter(id) => {
                write!(f, "tree filters exclude the root person {id}")
            }
            Self::Cancelled => write!(f, "tree derivation cancelled"),
        }
    }
}

impl Error for TreeError {}

/// Cooperative cancellation flag checked between frontier expansions.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
