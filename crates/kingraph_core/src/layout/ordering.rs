//! Generation bands and in-band ordering.
//!
//! Bands are ordered outward from the root's band: the root band by birth
//! year, descendant bands by the barycenter of their parents' slots, ancestor
//! bands by the barycenter of their children's slots. The unit of ordering is
//! a spouse group, so partners are never split.

use crate::tree::Tree;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// Index-based adjacency over a tree's nodes.
pub(super) struct Topology<'t> {
    tree: &'t Tree,
    parents: Vec<Vec<usize>>,
    children: Vec<Vec<usize>>,
    /// Same-generation spouses, by order index as seen from this node.
    spouses: Vec<Vec<(u32, usize)>>,
}

impl<'t> Topology<'t> {
    pub(super) fn new(tree: &'t Tree) -> Self {
        let count = tree.nodes.len();
        let mut parents = vec![Vec::new(); count];
        let mut children = vec![Vec::new(); count];
        let mut spouses = vec![Vec::new(); count];

        for edge in &tree.edges {
            let (Some(from), Some(to)) = (tree.position(&edge.from), tree.position(&edge.to)) else {
                continue;
            };
            if from == to {
                continue;
            }
            if edge.is_spouse() {
                if tree.nodes[from].generation != tree.nodes[to].generation {
                    continue;
                }
                spouses[from].push((edge.order.unwrap_or(u32::MAX), to));
                spouses[to].push((u32::MAX, from));
            } else {
                parents[to].push(from);
                children[from].push(to);
            }
        }
        for list in &mut spouses {
            list.sort_unstable();
        }

        Self {
            tree,
            parents,
            children,
            spouses,
        }
    }

    pub(super) fn len(&self) -> usize {
        self.tree.nodes.len()
    }

    pub(super) fn generation(&self, index: usize) -> i32 {
        self.tree.nodes[index].generation
    }

    pub(super) fn birth_year(&self, index: usize) -> Option<i32> {
        self.tree.nodes[index].birth_year
    }

    pub(super) fn root(&self) -> Option<usize> {
        self.tree.position(&self.tree.root)
    }

    pub(super) fn parents(&self, index: usize) -> &[usize] {
        &self.parents[index]
    }

    pub(super) fn children(&self, index: usize) -> &[usize] {
        &self.children[index]
    }

    fn id_cmp(&self, left: usize, right: usize) -> Ordering {
        self.tree.nodes[left].id.cmp(&self.tree.nodes[right].id)
    }
}

/// One generation row (or column) as an ordered list of spouse groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Band {
    pub generation: i32,
    pub units: Vec<Vec<usize>>,
}

impl Band {
    pub(super) fn members(&self) -> impl Iterator<Item = usize> + '_ {
        self.units.iter().flatten().copied()
    }
}

/// Which adjacent band a band is ordered against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Side {
    Parents,
    Children,
}

impl Side {
    pub(super) fn linked<'a>(self, topology: &'a Topology<'_>, index: usize) -> &'a [usize] {
        match self {
            Self::Parents => topology.parents(index),
            Self::Children => topology.children(index),
        }
    }
}

/// Index of the band holding the root, or the first band.
pub(super) fn pivot(topology: &Topology<'_>, bands: &[Band]) -> usize {
    topology
        .root()
        .map(|root| topology.generation(root))
        .and_then(|generation| bands.iter().position(|band| band.generation == generation))
        .unwrap_or(0)
}

pub(super) fn order_bands(topology: &Topology<'_>) -> Vec<Band> {
    let mut by_generation: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for index in 0..topology.len() {
        by_generation
            .entry(topology.generation(index))
            .or_default()
            .push(index);
    }
    let mut bands: Vec<Band> = by_generation
        .into_iter()
        .map(|(generation, members)| Band {
            generation,
            units: spouse_units(topology, &members),
        })
        .collect();
    if bands.is_empty() {
        return bands;
    }

    let pivot = pivot(topology, &bands);
    let mut slots = vec![usize::MAX; topology.len()];

    sort_by_birth(topology, &mut bands[pivot]);
    record_slots(&bands[pivot], &mut slots);

    for current in pivot + 1..bands.len() {
        let reference = bands[current - 1].generation;
        sort_by_neighbours(topology, &mut bands[current], &slots, Side::Parents, reference);
        record_slots(&bands[current], &mut slots);
    }
    for current in (0..pivot).rev() {
        let reference = bands[current + 1].generation;
        sort_by_neighbours(topology, &mut bands[current], &slots, Side::Children, reference);
        record_slots(&bands[current], &mut slots);
    }
    bands
}

/// Groups spouses transitively; each group starts at its earliest-discovered
/// member and walks partners by order index.
fn spouse_units(topology: &Topology<'_>, members: &[usize]) -> Vec<Vec<usize>> {
    let mut visited: HashSet<usize> = HashSet::new();
    let mut units = Vec::new();
    for &anchor in members {
        if !visited.insert(anchor) {
            continue;
        }
        let mut unit = Vec::new();
        let mut stack = vec![anchor];
        while let Some(current) = stack.pop() {
            unit.push(current);
            for &(_, spouse) in topology.spouses[current].iter().rev() {
                if visited.insert(spouse) {
                    stack.push(spouse);
                }
            }
        }
        units.push(unit);
    }
    units
}

fn record_slots(band: &Band, slots: &mut [usize]) {
    for (slot, index) in band.members().enumerate() {
        slots[index] = slot;
    }
}

fn sort_by_birth(topology: &Topology<'_>, band: &mut Band) {
    band.units.sort_by(|left, right| {
        let (left, right) = (left[0], right[0]);
        match (topology.birth_year(left), topology.birth_year(right)) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| left.cmp(&right))
        .then_with(|| topology.id_cmp(left, right))
    });
}

struct UnitKey {
    barycenter: f64,
    neighbours: Vec<usize>,
    anchor: usize,
}

fn sort_by_neighbours(
    topology: &Topology<'_>,
    band: &mut Band,
    slots: &[usize],
    side: Side,
    reference: i32,
) {
    let mut keyed: Vec<(UnitKey, Vec<usize>)> = band
        .units
        .drain(..)
        .map(|unit| {
            let mut neighbours: Vec<usize> = unit
                .iter()
                .flat_map(|&member| side.linked(topology, member).iter().copied())
                .filter(|&linked| topology.generation(linked) == reference)
                .map(|linked| slots[linked])
                .filter(|&slot| slot != usize::MAX)
                .collect();
            neighbours.sort_unstable();
            neighbours.dedup();
            let barycenter = if neighbours.is_empty() {
                f64::INFINITY
            } else {
                neighbours.iter().sum::<usize>() as f64 / neighbours.len() as f64
            };
            let key = UnitKey {
                barycenter,
                neighbours,
                anchor: unit[0],
            };
            (key, unit)
        })
        .collect();

    keyed.sort_by(|(left, _), (right, _)| {
        left.barycenter
            .total_cmp(&right.barycenter)
            .then_with(|| left.neighbours.cmp(&right.neighbours))
            .then_with(|| left.anchor.cmp(&right.anchor))
            .then_with(|| topology.id_cmp(left.anchor, right.anchor))
    });
    band.units = keyed.into_iter().map(|(_, unit)| unit).collect();
}

#[cfg(test)]
mod tests {
    use super::{order_bands, Topology};
    use crate::graph::build;
    use crate::model::person::{PersonId, PersonRecord};
    use crate::tree::{derive, TreeDirection, TreeOptions};

    fn names(tree: &crate::tree::Tree, members: Vec<usize>) -> Vec<&str> {
        members
            .into_iter()
            .map(|index| tree.nodes[index].id.as_str())
            .collect()
    }

    #[test]
    fn grandparents_follow_their_childs_side() {
        let graph = build(vec![
            PersonRecord::new("r").with_father("f").with_mother("m"),
            PersonRecord::new("f").with_father("ff").with_mother("fm"),
            PersonRecord::new("m").with_father("mf").with_mother("mm"),
        ]);
        let options = TreeOptions {
            direction: TreeDirection::Ancestors,
            ..TreeOptions::default()
        };
        let tree = derive(&graph, &PersonId::new("r"), &options).unwrap();
        let topology = Topology::new(&tree);
        let bands = order_bands(&topology);

        assert_eq!(bands.len(), 3);
        assert_eq!(names(&tree, bands[0].members().collect()), vec!["ff", "fm", "mf", "mm"]);
        assert_eq!(names(&tree, bands[1].members().collect()), vec!["f", "m"]);
    }

    #[test]
    fn children_stay_grouped_under_their_parents() {
        let graph = build(vec![
            PersonRecord::new("r").with_spouse("w1").with_spouse("w2"),
            PersonRecord::new("w1").with_spouse("r"),
            PersonRecord::new("w2").with_spouse("r"),
            PersonRecord::new("a").with_father("r").with_mother("w2").with_birth("1900"),
            PersonRecord::new("b").with_father("r").with_mother("w1").with_birth("1901"),
            PersonRecord::new("c").with_father("r").with_mother("w2").with_birth("1902"),
        ]);
        let options = TreeOptions {
            direction: TreeDirection::Descendants,
            ..TreeOptions::default()
        };
        let tree = derive(&graph, &PersonId::new("r"), &options).unwrap();
        let topology = Topology::new(&tree);
        let bands = order_bands(&topology);

        assert_eq!(names(&tree, bands[0].members().collect()), vec!["r", "w1", "w2"]);
        assert_eq!(names(&tree, bands[1].members().collect()), vec!["b", "a", "c"]);
    }
}
