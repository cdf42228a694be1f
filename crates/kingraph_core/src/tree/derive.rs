//! Breadth-first tree derivation.

use super::filter::apply_filters;
use super::{
    CancelToken, Tree, TreeDirection, TreeEdge, TreeEdgeKind, TreeError, TreeNode, TreeNodeRole,
    TreeOptions,
};
use crate::finding::Finding;
use crate::graph::{FamilyGraph, ParentKind};
use crate::model::date::DateSortKey;
use crate::model::person::PersonId;
use log::info;
use std::collections::HashMap;
use std::time::Instant;

/// Derives a bounded tree rooted at `root`.
pub fn derive(graph: &FamilyGraph, root: &PersonId, options: &TreeOptions) -> Result<Tree, TreeError> {
    derive_with_cancel(graph, root, options, &CancelToken::new())
}

/// Same as [`derive`], checking `cancel` before each frontier expansion.
///
/// # Errors
/// - `RootNotFound` when `root` is not a graph node.
/// - `RootExcludedByFilter` when a filter rejects the root.
/// - `Cancelled` when `cancel` fires mid-walk.
pub fn derive_with_cancel(
    graph: &FamilyGraph,
    root: &PersonId,
    options: &TreeOptions,
    cancel: &CancelToken,
) -> Result<Tree, TreeError> {
    let started_at = Instant::now();
    if !graph.contains(root) {
        info!("event=tree_derive module=tree status=error error_code=root_not_found root={root}");
        return Err(TreeError::RootNotFound(root.clone()));
    }

    let mut walk = Walk::new(graph, options);
    walk.place(root, 0, TreeNodeRole::Root);

    if matches!(options.direction, TreeDirection::Ancestors | TreeDirection::Full) {
        walk.expand(root, Axis::Up, cancel)?;
    }
    if matches!(options.direction, TreeDirection::Descendants | TreeDirection::Full) {
        walk.expand(root, Axis::Down, cancel)?;
    }
    if options.direction == TreeDirection::Full {
        walk.attach_siblings(root);
    }
    if options.include_spouses {
        walk.attach_spouses();
    }

    let Walk { order, placed, .. } = walk;
    let mut findings = ancestry_cycles(graph, options, &order, &placed);
    let edges = induced_edges(graph, options, &order, &placed);
    let (order, edges) = apply_filters(graph, options, root, order, edges)?;

    let nodes: Vec<TreeNode> = order
        .into_iter()
        .filter_map(|id| {
            let (generation, role) = placed.get(&id).copied()?;
            let record = graph.record(&id);
            Some(TreeNode {
                generation,
                role,
                resolved: record.is_some(),
                name: record.and_then(|record| record.name.clone()),
                birth_year: record.and_then(|record| record.birth_year()),
                id,
            })
        })
        .collect();

    for finding in &findings {
        finding.log("tree");
    }
    findings.dedup();

    info!(
        "event=tree_derive module=tree status=ok root={} direction={:?} nodes={} edges={} findings={} duration_ms={}",
        root,
        options.direction,
        nodes.len(),
        edges.len(),
        findings.len(),
        started_at.elapsed().as_millis()
    );

    Ok(Tree::new(
        root.clone(),
        options.direction,
        options.generation_limit,
        nodes,
        edges,
        findings,
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Up,
    Down,
}

impl Axis {
    fn step(self) -> i32 {
        match self {
            Self::Up => -1,
            Self::Down => 1,
        }
    }

    fn role(self) -> TreeNodeRole {
        match self {
            Self::Up => TreeNodeRole::Ancestor,
            Self::Down => TreeNodeRole::Descendant,
        }
    }
}

struct Walk<'g> {
    graph: &'g FamilyGraph,
    options: &'g TreeOptions,
    order: Vec<PersonId>,
    placed: HashMap<PersonId, (i32, TreeNodeRole)>,
}

impl<'g> Walk<'g> {
    fn new(graph: &'g FamilyGraph, options: &'g TreeOptions) -> Self {
        Self {
            graph,
            options,
            order: Vec::new(),
            placed: HashMap::new(),
        }
    }

    fn place(&mut self, id: &PersonId, generation: i32, role: TreeNodeRole) -> bool {
        if self.placed.contains_key(id) {
            return false;
        }
        self.placed.insert(id.clone(), (generation, role));
        self.order.push(id.clone());
        true
    }

    /// Breadth-first along one axis; a node is never expanded twice.
    ///
    /// Reaching an already placed relative again is pedigree collapse, not an
    /// error; real cycles are found afterwards by `ancestry_cycles`.
    fn expand(&mut self, root: &PersonId, axis: Axis, cancel: &CancelToken) -> Result<(), TreeError> {
        let limit = self.options.generation_limit;
        let mut frontier = vec![root.clone()];
        let mut depth: u32 = 0;

        while !frontier.is_empty() {
            if cancel.is_cancelled() {
                info!("event=tree_derive module=tree status=cancelled root={root} depth={depth}");
                return Err(TreeError::Cancelled);
            }
            if limit > 0 && depth >= limit {
                break;
            }

            let mut next = Vec::new();
            for id in &frontier {
                let Some(&(generation, _)) = self.placed.get(id) else {
                    continue;
                };
                for relative in self.relatives(id, axis) {
                    if self.place(&relative, generation + axis.step(), axis.role()) {
                        next.push(relative);
                    }
                }
            }
            frontier = next;
            depth += 1;
        }
        Ok(())
    }

    /// Parents (father, mother, then others by id) or children (birth order).
    fn relatives(&self, id: &PersonId, axis: Axis) -> Vec<PersonId> {
        match axis {
            Axis::Up => {
                let record = self.graph.record(id);
                let mut parents: Vec<(u8, PersonId)> = self
                    .graph
                    .parents_of(id)
                    .into_iter()
                    .filter(|(_, kind)| self.options.allows(*kind))
                    .map(|(parent, kind)| {
                        let slot = match (record, kind) {
                            (Some(r), ParentKind::Biological) if r.father.as_ref() == Some(parent) => 0,
                            (Some(r), ParentKind::Biological) if r.mother.as_ref() == Some(parent) => 1,
                            (_, ParentKind::Biological) => 2,
                            (_, ParentKind::Step) => 3,
                            (_, ParentKind::Adoptive) => 4,
                        };
                        (slot, parent.clone())
                    })
                    .collect();
                parents.sort();
                parents.into_iter().map(|(_, parent)| parent).collect()
            }
            Axis::Down => {
                let children: Vec<PersonId> = self
                    .graph
                    .children_of(id)
                    .into_iter()
                    .filter(|(_, kind)| self.options.allows(*kind))
                    .map(|(child, _)| child.clone())
                    .collect();
                self.sorted_by_birth(children)
            }
        }
    }

    fn sorted_by_birth(&self, mut ids: Vec<PersonId>) -> Vec<PersonId> {
        ids.sort_by(|left, right| {
            self.birth_key(left)
                .cmp(&self.birth_key(right))
                .then_with(|| left.cmp(right))
        });
        ids.dedup();
        ids
    }

    fn birth_key(&self, id: &PersonId) -> DateSortKey {
        self.graph
            .record(id)
            .map_or(DateSortKey::Undated, |record| record.birth_key())
    }

    /// Other children of the root's included parents, kept at offset 0.
    fn attach_siblings(&mut self, root: &PersonId) {
        let parents: Vec<PersonId> = self
            .graph
            .parents_of(root)
            .into_iter()
            .filter(|(parent, kind)| self.options.allows(*kind) && self.placed.contains_key(*parent))
            .map(|(parent, _)| parent.clone())
            .collect();

        let mut siblings = Vec::new();
        for parent in &parents {
            for (child, kind) in self.graph.children_of(parent) {
                if self.options.allows(kind) && !self.placed.contains_key(child) {
                    siblings.push(child.clone());
                }
            }
        }
        for sibling in self.sorted_by_birth(siblings) {
            self.place(&sibling, 0, TreeNodeRole::Sibling);
        }
    }

    /// Spouses of root, ancestors and descendants as unexpanded leaves.
    fn attach_spouses(&mut self) {
        let anchors: Vec<PersonId> = self
            .order
            .iter()
            .filter(|id| {
                matches!(
                    self.placed.get(*id),
                    Some((
                        _,
                        TreeNodeRole::Root | TreeNodeRole::Ancestor | TreeNodeRole::Descendant
                    ))
                )
            })
            .cloned()
            .collect();

        for anchor in anchors {
            let Some(&(generation, _)) = self.placed.get(&anchor) else {
                continue;
            };
            let spouses: Vec<PersonId> = self
                .graph
                .spouses_of(&anchor)
                .into_iter()
                .map(|link| link.spouse.clone())
                .collect();
            for spouse in spouses {
                self.place(&spouse, generation, TreeNodeRole::Spouse);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Open,
    Done,
}

/// Back edges of a depth-first walk over the placed parent-to-child edges.
///
/// Only a relative that is still open on the current path closes a cycle, so
/// an ancestor reached along two paths of different length stays silent.
fn ancestry_cycles(
    graph: &FamilyGraph,
    options: &TreeOptions,
    order: &[PersonId],
    placed: &HashMap<PersonId, (i32, TreeNodeRole)>,
) -> Vec<Finding> {
    let placed_children = |id: &PersonId| -> Vec<PersonId> {
        graph
            .children_of(id)
            .into_iter()
            .filter(|(child, kind)| options.allows(*kind) && placed.contains_key(*child))
            .map(|(child, _)| child.clone())
            .collect()
    };

    let mut marks: HashMap<PersonId, Mark> = HashMap::with_capacity(order.len());
    let mut findings = Vec::new();
    for start in order {
        if marks.contains_key(start) {
            continue;
        }
        marks.insert(start.clone(), Mark::Open);
        let mut stack: Vec<(PersonId, Vec<PersonId>, usize)> =
            vec![(start.clone(), placed_children(start), 0)];

        while let Some((node, children, next)) = stack.last_mut() {
            let Some(child) = children.get(*next).cloned() else {
                marks.insert(node.clone(), Mark::Done);
                stack.pop();
                continue;
            };
            *next += 1;
            match marks.get(&child).copied() {
                None => {
                    marks.insert(child.clone(), Mark::Open);
                    let grandchildren = placed_children(&child);
                    stack.push((child, grandchildren, 0));
                }
                Some(Mark::Open) => findings.push(Finding::Cycle {
                    from: node.clone(),
                    to: child,
                }),
                Some(Mark::Done) => {}
            }
        }
    }
    findings
}

/// Graph edges whose endpoints were both placed, in discovery order.
///
/// Spouse edges start at the partner discovered first so `order` reads from
/// the blood relative's side.
fn induced_edges(
    graph: &FamilyGraph,
    options: &TreeOptions,
    order: &[PersonId],
    placed: &HashMap<PersonId, (i32, TreeNodeRole)>,
) -> Vec<TreeEdge> {
    let position: HashMap<&PersonId, usize> = order
        .iter()
        .enumerate()
        .map(|(index, id)| (id, index))
        .collect();
    let mut edges = Vec::new();
    for id in order {
        for (child, kind) in graph.children_of(id) {
            if options.allows(kind) && placed.contains_key(child) {
                edges.push(TreeEdge {
                    from: id.clone(),
                    to: child.clone(),
                    kind: kind.into(),
                    order: None,
                });
            }
        }
        if !options.include_spouses {
            continue;
        }
        for link in graph.spouses_of(id) {
            let (Some(mine), Some(theirs)) = (position.get(id), position.get(link.spouse)) else {
                continue;
            };
            if mine < theirs {
                edges.push(TreeEdge {
                    from: id.clone(),
                    to: link.spouse.clone(),
                    kind: TreeEdgeKind::Spouse,
                    order: Some(link.order),
                });
            }
        }
    }
    edges
}
