//! In-memory relationship graph derived from person records.
//!
//! # Responsibility
//! - Hold typed parent-child and spouse edges between person nodes.
//! - Answer neighbour queries for component detection, tree derivation and
//!   reciprocal-link synchronization.
//!
//! # Invariants
//! - The graph is a pure function of its input records; it is never patched
//!   behind the caller's back and carries no stored component ids.
//! - Every referenced id has a node; unloaded ids get unresolved placeholders.
//! - Edges are sorted by (source, target, kind) so rebuilds are identical.

mod builder;
pub mod cache;
pub mod components;

pub use builder::build;

use crate::finding::Finding;
use crate::model::person::{PersonId, PersonRecord, SpouseStatus};
use serde::Serialize;
use std::collections::BTreeMap;

/// Kind of a parent-child link, decided by the child's record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentKind {
    Biological,
    Step,
    Adoptive,
}

/// Typed relationship edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Edge {
    ParentChild {
        child: PersonId,
        parent: PersonId,
        kind: ParentKind,
    },
    /// Undirected; `a < b` always holds.
    Spouse {
        a: PersonId,
        b: PersonId,
        order: u32,
        status: SpouseStatus,
    },
}

impl Edge {
    /// Parent for parent-child edges, lower id for spouse edges.
    pub fn source(&self) -> &PersonId {
        match self {
            Self::ParentChild { parent, .. } => parent,
            Self::Spouse { a, .. } => a,
        }
    }

    /// Child for parent-child edges, higher id for spouse edges.
    pub fn target(&self) -> &PersonId {
        match self {
            Self::ParentChild { child, .. } => child,
            Self::Spouse { b, .. } => b,
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Self::ParentChild { kind, .. } => *kind as u8,
            Self::Spouse { .. } => 3,
        }
    }
}

/// One person in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub id: PersonId,
    /// `None` for ids that were referenced but not supplied.
    pub record: Option<PersonRecord>,
}

impl GraphNode {
    pub fn is_resolved(&self) -> bool {
        self.record.is_some()
    }
}

/// A spouse as seen from one partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpouseLink<'g> {
    pub spouse: &'g PersonId,
    /// Order index from this partner's own record when it lists the spouse.
    pub order: u32,
    pub status: SpouseStatus,
}

/// Typed multi-parent, multi-spouse relationship graph.
#[derive(Debug, Clone, Default)]
pub struct FamilyGraph {
    nodes: BTreeMap<PersonId, GraphNode>,
    edges: Vec<Edge>,
    findings: Vec<Finding>,
    parent_edges: BTreeMap<PersonId, Vec<usize>>,
    child_edges: BTreeMap<PersonId, Vec<usize>>,
    spouse_edges: BTreeMap<PersonId, Vec<usize>>,
}

impl FamilyGraph {
    fn from_parts(
        nodes: BTreeMap<PersonId, GraphNode>,
        mut edges: Vec<Edge>,
        findings: Vec<Finding>,
    ) -> Self {
        edges.sort_by(|left, right| {
            left.source()
                .cmp(right.source())
                .then_with(|| left.target().cmp(right.target()))
                .then_with(|| left.kind_rank().cmp(&right.kind_rank()))
        });

        let mut parent_edges: BTreeMap<PersonId, Vec<usize>> = BTreeMap::new();
        let mut child_edges: BTreeMap<PersonId, Vec<usize>> = BTreeMap::new();
        let mut spouse_edges: BTreeMap<PersonId, Vec<usize>> = BTreeMap::new();
        for (index, edge) in edges.iter().enumerate() {
            match edge {
                Edge::ParentChild { child, parent, .. } => {
                    parent_edges.entry(child.clone()).or_default().push(index);
                    child_edges.entry(parent.clone()).or_default().push(index);
                }
                Edge::Spouse { a, b, .. } => {
                    spouse_edges.entry(a.clone()).or_default().push(index);
                    spouse_edges.entry(b.clone()).or_default().push(index);
                }
            }
        }

        Self {
            nodes,
            edges,
            findings,
            parent_edges,
            child_edges,
            spouse_edges,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Nodes in identifier order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn node(&self, id: &PersonId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &PersonId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Loaded record for `id`; `None` for absent or unresolved ids.
    pub fn record(&self, id: &PersonId) -> Option<&PersonRecord> {
        self.nodes.get(id).and_then(|node| node.record.as_ref())
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Integrity findings collected during the build.
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Parents of `id` with the link kind, in edge order.
    pub fn parents_of(&self, id: &PersonId) -> Vec<(&PersonId, ParentKind)> {
        self.indexed(&self.parent_edges, id)
            .filter_map(|edge| match edge {
                Edge::ParentChild { parent, kind, .. } => Some((parent, *kind)),
                Edge::Spouse { .. } => None,
            })
            .collect()
    }

    /// Children of `id` with the link kind, in edge order.
    pub fn children_of(&self, id: &PersonId) -> Vec<(&PersonId, ParentKind)> {
        self.indexed(&self.child_edges, id)
            .filter_map(|edge| match edge {
                Edge::ParentChild { child, kind, .. } => Some((child, *kind)),
                Edge::Spouse { .. } => None,
            })
            .collect()
    }

    /// Spouses of `id` sorted by this person's order index, then id.
    pub fn spouses_of(&self, id: &PersonId) -> Vec<SpouseLink<'_>> {
        let own = self.record(id);
        let mut links: Vec<SpouseLink<'_>> = self
            .indexed(&self.spouse_edges, id)
            .filter_map(|edge| match edge {
                Edge::Spouse {
                    a,
                    b,
                    order,
                    status,
                } => {
                    let spouse = if a == id { b } else { a };
                    let order = own
                        .and_then(|record| record.spouse_entry(spouse))
                        .map_or(*order, |entry| entry.order);
                    Some(SpouseLink {
                        spouse,
                        order,
                        status: *status,
                    })
                }
                Edge::ParentChild { .. } => None,
            })
            .collect();
        links.sort_by(|left, right| {
            left.order
                .cmp(&right.order)
                .then_with(|| left.spouse.cmp(right.spouse))
        });
        links
    }

    /// Every node sharing any edge with `id`, ignoring direction.
    pub fn neighbors<'g>(&'g self, id: &PersonId) -> impl Iterator<Item = &'g PersonId> + 'g {
        let parents = self.indexed(&self.parent_edges, id).map(Edge::source);
        let children = self.indexed(&self.child_edges, id).map(Edge::target);
        let owner = id.clone();
        let spouses = self
            .indexed(&self.spouse_edges, id)
            .map(move |edge| {
                if edge.source() == &owner {
                    edge.target()
                } else {
                    edge.source()
                }
            });
        parents.chain(children).chain(spouses)
    }

    /// Whether a parent-child edge of any kind links `parent` to `child`.
    pub fn has_parent_edge(&self, child: &PersonId, parent: &PersonId) -> bool {
        self.parents_of(child).iter().any(|(id, _)| *id == parent)
    }

    fn indexed<'g>(
        &'g self,
        index: &'g BTreeMap<PersonId, Vec<usize>>,
        id: &PersonId,
    ) -> impl Iterator<Item = &'g Edge> + 'g {
        index
            .get(id)
            .into_iter()
            .flatten()
            .map(move |edge_index| &self.edges[*edge_index])
    }
}
