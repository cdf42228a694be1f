//! Coordinate layout for derived trees.
//!
//! # Responsibility
//! - Assign every tree node a rectangle inside a generation band.
//! - Describe tree edges with anchor hints for a renderer.
//!
//! # Invariants
//! - No two node rectangles intersect.
//! - Spouse groups are contiguous within a band, and the in-band order chosen
//!   by `ordering` survives placement; only coordinates change.
//! - All coordinates are at or beyond the configured origin.
//!
//! # See also
//! - `crate::tree` for the bounded `Tree` consumed here.

mod ordering;
mod placement;

use crate::model::person::PersonId;
use crate::tree::{Tree, TreeEdgeKind};
use log::info;
use ordering::Topology;
use placement::Metrics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

/// Band axis. Top-down bands are rows; left-right bands are columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutDirection {
    #[default]
    TopDown,
    LeftRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutStrategy {
    #[default]
    Standard,
    /// Standard with every gap halved.
    Compact,
    /// Band separation follows the gap between mean birth years.
    Timeline,
    /// Every band is centred on the root.
    Hourglass,
}

/// Layout tunables. Plain data; loadable from JSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutParams {
    pub node_width: f64,
    pub node_height: f64,
    pub spacing_x: f64,
    pub spacing_y: f64,
    pub direction: LayoutDirection,
    pub strategy: LayoutStrategy,
    pub origin_x: f64,
    pub origin_y: f64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            node_width: 200.0,
            node_height: 80.0,
            spacing_x: 40.0,
            spacing_y: 100.0,
            direction: LayoutDirection::TopDown,
            strategy: LayoutStrategy::Standard,
            origin_x: 0.0,
            origin_y: 0.0,
        }
    }
}

impl LayoutParams {
    /// Sizes below 1 become 1, negative spacing becomes 0, a non-finite
    /// origin becomes 0.
    fn sanitized(&self) -> Self {
        let size = |value: f64| if value >= 1.0 && value.is_finite() { value } else { 1.0 };
        let gap = |value: f64| if value >= 0.0 && value.is_finite() { value } else { 0.0 };
        let origin = |value: f64| if value.is_finite() { value } else { 0.0 };
        Self {
            node_width: size(self.node_width),
            node_height: size(self.node_height),
            spacing_x: gap(self.spacing_x),
            spacing_y: gap(self.spacing_y),
            origin_x: origin(self.origin_x),
            origin_y: origin(self.origin_y),
            ..*self
        }
    }
}

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Interiors intersect; touching edges do not count.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodePlacement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Band index counted from the topmost (or leftmost) band.
    pub band: usize,
    pub generation: i32,
}

impl NodePlacement {
    pub fn rect(&self) -> Rect {
        Rect {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

/// Side of a node rectangle an edge attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    Top,
    Bottom,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeRoute {
    pub from: PersonId,
    pub to: PersonId,
    pub kind: TreeEdgeKind,
    pub from_anchor: Anchor,
    pub to_anchor: Anchor,
}

/// Renderer-facing result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub nodes: BTreeMap<PersonId, NodePlacement>,
    pub edges: Vec<EdgeRoute>,
    pub bounds: Rect,
    /// Node ids per band in final primary-axis order.
    pub bands: Vec<Vec<PersonId>>,
}

impl Layout {
    pub fn node(&self, id: &PersonId) -> Option<&NodePlacement> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Lays out `tree`. Always succeeds for a well-formed tree.
pub fn layout(tree: &Tree, params: &LayoutParams) -> Layout {
    let started_at = Instant::now();
    let params = params.sanitized();
    let metrics = Metrics::new(&params);
    let topology = Topology::new(tree);
    let bands = ordering::order_bands(&topology);
    let placed = placement::place(&topology, &bands, &metrics, params.strategy);

    let mut nodes = BTreeMap::new();
    let mut bounds: Option<Rect> = None;
    for (index, node) in tree.nodes.iter().enumerate() {
        let (primary, secondary) = (placed.primary[index], placed.secondary[index]);
        let (x, y) = match params.direction {
            LayoutDirection::TopDown => (params.origin_x + primary, params.origin_y + secondary),
            LayoutDirection::LeftRight => (params.origin_x + secondary, params.origin_y + primary),
        };
        let placement = NodePlacement {
            x,
            y,
            width: params.node_width,
            height: params.node_height,
            band: placed.band[index],
            generation: node.generation,
        };
        let rect = placement.rect();
        bounds = Some(bounds.map_or(rect, |current| current.union(&rect)));
        nodes.insert(node.id.clone(), placement);
    }

    let edges = tree
        .edges
        .iter()
        .filter_map(|edge| {
            let from = nodes.get(&edge.from)?;
            let to = nodes.get(&edge.to)?;
            let (from_anchor, to_anchor) = anchors(from, to, params.direction);
            Some(EdgeRoute {
                from: edge.from.clone(),
                to: edge.to.clone(),
                kind: edge.kind,
                from_anchor,
                to_anchor,
            })
        })
        .collect();

    let bands: Vec<Vec<PersonId>> = bands
        .iter()
        .map(|band| band.members().map(|index| tree.nodes[index].id.clone()).collect())
        .collect();

    let layout = Layout {
        nodes,
        edges,
        bounds: bounds.unwrap_or(Rect {
            x: params.origin_x,
            y: params.origin_y,
            width: 0.0,
            height: 0.0,
        }),
        bands,
    };

    info!(
        "event=layout module=layout status=ok root={} strategy={:?} direction={:?} nodes={} bands={} duration_ms={}",
        tree.root,
        params.strategy,
        params.direction,
        layout.nodes.len(),
        layout.bands.len(),
        started_at.elapsed().as_millis()
    );
    layout
}

/// Cross-band edges leave the earlier band's far side and enter the later
/// band's near side; same-band edges join facing sides.
fn anchors(from: &NodePlacement, to: &NodePlacement, direction: LayoutDirection) -> (Anchor, Anchor) {
    let (before, after) = match direction {
        LayoutDirection::TopDown => (Anchor::Bottom, Anchor::Top),
        LayoutDirection::LeftRight => (Anchor::Right, Anchor::Left),
    };
    let (inline_before, inline_after) = match direction {
        LayoutDirection::TopDown => (Anchor::Right, Anchor::Left),
        LayoutDirection::LeftRight => (Anchor::Bottom, Anchor::Top),
    };

    if from.band < to.band {
        return (before, after);
    }
    if from.band > to.band {
        return (after, before);
    }
    let from_first = match direction {
        LayoutDirection::TopDown => from.x <= to.x,
        LayoutDirection::LeftRight => from.y <= to.y,
    };
    if from_first {
        (inline_before, inline_after)
    } else {
        (inline_after, inline_before)
    }
}

#[cfg(test)]
mod tests {
    use super::{layout, Anchor, LayoutDirection, LayoutParams, LayoutStrategy, Rect};
    use crate::graph::build;
    use crate::model::person::{PersonId, PersonRecord};
    use crate::tree::{derive, Tree, TreeOptions};

    fn id(value: &str) -> PersonId {
        PersonId::new(value)
    }

    /// Root with both parents, an older sibling, a spouse and one child.
    fn family() -> Tree {
        let graph = build(vec![
            PersonRecord::new("f").with_spouse("m"),
            PersonRecord::new("m").with_spouse("f"),
            PersonRecord::new("s").with_father("f").with_mother("m").with_birth("1880"),
            PersonRecord::new("r")
                .with_father("f")
                .with_mother("m")
                .with_birth("1885")
                .with_spouse("w"),
            PersonRecord::new("w").with_spouse("r"),
            PersonRecord::new("c").with_father("r").with_mother("w"),
        ]);
        derive(&graph, &id("r"), &TreeOptions::default()).unwrap()
    }

    fn assert_no_overlap(result: &super::Layout) {
        let rects: Vec<(&PersonId, Rect)> = result
            .nodes
            .iter()
            .map(|(id, placement)| (id, placement.rect()))
            .collect();
        for (i, (left_id, left)) in rects.iter().enumerate() {
            for (right_id, right) in rects.iter().skip(i + 1) {
                assert!(!left.overlaps(right), "{left_id} overlaps {right_id}");
            }
        }
    }

    #[test]
    fn rect_overlap_is_strict() {
        let a = Rect { x: 0.0, y: 0.0, width: 10.0, height: 10.0 };
        let touching = Rect { x: 10.0, y: 0.0, width: 10.0, height: 10.0 };
        let inside = Rect { x: 5.0, y: 5.0, width: 1.0, height: 1.0 };
        assert!(!a.overlaps(&touching));
        assert!(a.overlaps(&inside));
        assert_eq!(a.union(&touching).width, 20.0);
    }

    #[test]
    fn top_down_rows_follow_generations() {
        let result = layout(&family(), &LayoutParams::default());
        assert_no_overlap(&result);
        let parent_row = result.node(&id("f")).unwrap().y;
        let root_row = result.node(&id("r")).unwrap().y;
        let child_row = result.node(&id("c")).unwrap().y;
        assert!(parent_row < root_row && root_row < child_row);
        assert_eq!(root_row, result.node(&id("s")).unwrap().y);
        assert_eq!(result.bounds.x, 0.0);
        assert_eq!(result.bounds.y, 0.0);
    }

    #[test]
    fn spouses_sit_next_to_their_partner() {
        let result = layout(&family(), &LayoutParams::default());
        let band = &result.bands[1];
        let root_slot = band.iter().position(|entry| entry == &id("r")).unwrap();
        let spouse_slot = band.iter().position(|entry| entry == &id("w")).unwrap();
        assert_eq!(spouse_slot, root_slot + 1);
        let sibling_slot = band.iter().position(|entry| entry == &id("s")).unwrap();
        assert_eq!(sibling_slot + 1, root_slot);
    }

    #[test]
    fn left_right_swaps_axes() {
        let params = LayoutParams {
            direction: LayoutDirection::LeftRight,
            ..LayoutParams::default()
        };
        let result = layout(&family(), &params);
        assert_no_overlap(&result);
        let parent = result.node(&id("f")).unwrap();
        let root = result.node(&id("r")).unwrap();
        assert!(parent.x < root.x);
        let edge = result
            .edges
            .iter()
            .find(|edge| edge.from == id("r") && edge.to == id("c"))
            .unwrap();
        assert_eq!((edge.from_anchor, edge.to_anchor), (Anchor::Right, Anchor::Left));
    }

    #[test]
    fn parent_edges_run_bottom_to_top() {
        let result = layout(&family(), &LayoutParams::default());
        let edge = result
            .edges
            .iter()
            .find(|edge| edge.from == id("f") && edge.to == id("r"))
            .unwrap();
        assert_eq!((edge.from_anchor, edge.to_anchor), (Anchor::Bottom, Anchor::Top));
        let spouse = result
            .edges
            .iter()
            .find(|edge| edge.from == id("r") && edge.to == id("w"))
            .unwrap();
        assert_eq!((spouse.from_anchor, spouse.to_anchor), (Anchor::Right, Anchor::Left));
    }

    #[test]
    fn origin_offsets_every_coordinate() {
        let params = LayoutParams {
            origin_x: 15.0,
            origin_y: -30.0,
            ..LayoutParams::default()
        };
        let result = layout(&family(), &params);
        assert_eq!(result.bounds.x, 15.0);
        assert_eq!(result.bounds.y, -30.0);
    }

    #[test]
    fn invalid_sizes_are_clamped() {
        let params = LayoutParams {
            node_width: 0.0,
            node_height: -5.0,
            spacing_x: -10.0,
            spacing_y: f64::NAN,
            ..LayoutParams::default()
        };
        let result = layout(&family(), &params);
        let root = result.node(&id("r")).unwrap();
        assert_eq!((root.width, root.height), (1.0, 1.0));
        assert_no_overlap(&result);
    }

    #[test]
    fn compact_is_never_wider_than_standard() {
        let standard = layout(&family(), &LayoutParams::default());
        let compact = layout(
            &family(),
            &LayoutParams {
                strategy: LayoutStrategy::Compact,
                ..LayoutParams::default()
            },
        );
        assert_no_overlap(&compact);
        assert!(compact.bounds.width < standard.bounds.width);
        assert!(compact.bounds.height < standard.bounds.height);
    }
}
