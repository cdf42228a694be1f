//! Coordinate assignment over ordered bands.
//!
//! Works in two abstract axes: `primary` runs along a band and `secondary`
//! across bands. The caller maps them to x/y for the chosen direction.

use super::ordering::{pivot, Band, Side, Topology};
use super::{LayoutDirection, LayoutParams, LayoutStrategy};
use std::collections::HashMap;

/// Birth-year difference that earns one standard band step in timeline mode.
const YEARS_PER_BAND: f64 = 25.0;

/// Node extent and gaps along both abstract axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Metrics {
    pub extent: f64,
    pub gap: f64,
    pub band_extent: f64,
    pub band_gap: f64,
}

impl Metrics {
    pub(super) fn new(params: &LayoutParams) -> Self {
        let (extent, gap, band_extent, band_gap) = match params.direction {
            LayoutDirection::TopDown => (
                params.node_width,
                params.spacing_x,
                params.node_height,
                params.spacing_y,
            ),
            LayoutDirection::LeftRight => (
                params.node_height,
                params.spacing_y,
                params.node_width,
                params.spacing_x,
            ),
        };
        let scale = if params.strategy == LayoutStrategy::Compact {
            0.5
        } else {
            1.0
        };
        Self {
            extent,
            gap: gap * scale,
            band_extent,
            band_gap: band_gap * scale,
        }
    }

    fn step(&self) -> f64 {
        self.extent + self.gap
    }

    fn band_step(&self) -> f64 {
        self.band_extent + self.band_gap
    }

    fn span(&self, nodes: usize) -> f64 {
        match nodes {
            0 => 0.0,
            n => n as f64 * self.extent + (n - 1) as f64 * self.gap,
        }
    }
}

/// Per-node abstract coordinates, indexed like `Tree::nodes`.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Placement {
    pub primary: Vec<f64>,
    pub secondary: Vec<f64>,
    pub band: Vec<usize>,
}

pub(super) fn place(
    topology: &Topology<'_>,
    bands: &[Band],
    metrics: &Metrics,
    strategy: LayoutStrategy,
) -> Placement {
    let count = topology.len();
    let mut primary = vec![0.0; count];
    let mut band_of = vec![0; count];
    for (band_index, band) in bands.iter().enumerate() {
        for member in band.members() {
            band_of[member] = band_index;
        }
    }
    if bands.is_empty() {
        return Placement {
            primary,
            secondary: Vec::new(),
            band: band_of,
        };
    }

    let pivot = pivot(topology, bands);
    let mut cursor = 0.0;
    for unit in &bands[pivot].units {
        cursor = put_unit(unit, cursor, metrics, &mut primary);
    }
    for current in (0..pivot).rev() {
        place_band(topology, bands, current, current + 1, Side::Children, metrics, &mut primary);
    }
    for current in pivot + 1..bands.len() {
        place_band(topology, bands, current, current - 1, Side::Parents, metrics, &mut primary);
    }

    if strategy == LayoutStrategy::Hourglass {
        if let Some(root) = topology.root() {
            centre_on(bands, pivot, primary[root] + metrics.extent / 2.0, metrics, &mut primary);
        }
    }

    let shift = primary.iter().copied().fold(f64::INFINITY, f64::min);
    if shift.is_finite() {
        for value in &mut primary {
            *value -= shift;
        }
    }

    let offsets = band_offsets(topology, bands, metrics, strategy);
    let secondary = band_of.iter().map(|&band| offsets[band]).collect();
    Placement {
        primary,
        secondary,
        band: band_of,
    }
}

/// Writes a unit left to right from `left` and returns the next free cursor.
fn put_unit(unit: &[usize], left: f64, metrics: &Metrics, primary: &mut [f64]) -> f64 {
    let mut x = left;
    for &member in unit {
        primary[member] = x;
        x += metrics.step();
    }
    x
}

/// Places `target` against the already placed `reference` band.
///
/// Consecutive units linked to the same reference nodes form one block that
/// is centred on those nodes. A block pushed right by its left neighbour
/// shifts the reference band from its first linked slot by the same amount,
/// keeping the pair aligned without reordering anything.
fn place_band(
    topology: &Topology<'_>,
    bands: &[Band],
    target: usize,
    reference: usize,
    side: Side,
    metrics: &Metrics,
    primary: &mut [f64],
) {
    let reference_slots: Vec<usize> = bands[reference].members().collect();
    let slot_by_index: HashMap<usize, usize> = reference_slots
        .iter()
        .enumerate()
        .map(|(slot, &member)| (member, slot))
        .collect();
    let slot_of = |index: usize| slot_by_index.get(&index).copied();

    let linked_slots = |unit: &[usize]| -> Vec<usize> {
        let mut slots: Vec<usize> = unit
            .iter()
            .flat_map(|&member| side.linked(topology, member).iter().copied())
            .filter_map(&slot_of)
            .collect();
        slots.sort_unstable();
        slots.dedup();
        slots
    };

    let units = &bands[target].units;
    let mut cursor = f64::NEG_INFINITY;
    let mut start = 0;
    while start < units.len() {
        let slots = linked_slots(&units[start]);
        let mut end = start + 1;
        while end < units.len() && linked_slots(&units[end]) == slots {
            end += 1;
        }
        let block = &units[start..end];
        let nodes: usize = block.iter().map(Vec::len).sum();
        let width = metrics.span(nodes);

        let left = match slots.first() {
            Some(&first) => {
                let low = primary[reference_slots[first]];
                let high = slots
                    .iter()
                    .map(|&slot| primary[reference_slots[slot]])
                    .fold(low, f64::max)
                    + metrics.extent;
                let desired = (low + high) / 2.0 - width / 2.0;
                if desired < cursor {
                    let delta = cursor - desired;
                    for &member in &reference_slots[first..] {
                        primary[member] += delta;
                    }
                    cursor
                } else {
                    desired
                }
            }
            None if cursor.is_finite() => cursor,
            None => 0.0,
        };

        let mut x = left;
        for unit in block {
            x = put_unit(unit, x, metrics, primary);
        }
        cursor = x;
        start = end;
    }
}

/// Shifts every band except `pivot` so its centre lands on `centre`.
fn centre_on(bands: &[Band], pivot: usize, centre: f64, metrics: &Metrics, primary: &mut [f64]) {
    for (band_index, band) in bands.iter().enumerate() {
        if band_index == pivot {
            continue;
        }
        let (low, high) = band
            .members()
            .map(|member| primary[member])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), value| {
                (low.min(value), high.max(value))
            });
        if !low.is_finite() {
            continue;
        }
        let delta = centre - (low + high + metrics.extent) / 2.0;
        for member in band.members() {
            primary[member] += delta;
        }
    }
}

/// Secondary coordinate of each band.
fn band_offsets(
    topology: &Topology<'_>,
    bands: &[Band],
    metrics: &Metrics,
    strategy: LayoutStrategy,
) -> Vec<f64> {
    let standard = metrics.band_step();
    let means: Vec<Option<f64>> = bands
        .iter()
        .map(|band| {
            let years: Vec<i32> = band
                .members()
                .filter_map(|member| topology.birth_year(member))
                .collect();
            if years.is_empty() {
                None
            } else {
                Some(years.iter().map(|&year| f64::from(year)).sum::<f64>() / years.len() as f64)
            }
        })
        .collect();

    let mut offsets = Vec::with_capacity(bands.len());
    let mut current = 0.0;
    for band_index in 0..bands.len() {
        if band_index > 0 {
            let step = match (strategy, means[band_index - 1], means[band_index]) {
                (LayoutStrategy::Timeline, Some(previous), Some(mean)) => {
                    standard.max((mean - previous).abs() * standard / YEARS_PER_BAND)
                }
                _ => standard,
            };
            current += step;
        }
        offsets.push(current);
    }
    offsets
}
