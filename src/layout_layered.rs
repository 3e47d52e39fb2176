//! Deterministic layered placement.
//!
//! Layers map onto evenly spaced columns; nodes inside a layer are
//! spread over the usable height in insertion order.

use crate::graph_state::Node;
use crate::layout_settings::{Margins, Viewport};
use crate::store::GraphStore;
use std::collections::BTreeMap;

/// How placement results are applied to live positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Move targets only; nodes keep their position and pins.
    Reaim,
    /// Snap positions to the targets and clear every pin.
    Reset,
}

/// Node indices per layer, in insertion order. Layer 0 shares the first
/// column.
pub fn group_by_layer(nodes: &[Node]) -> BTreeMap<u32, Vec<usize>> {
    let mut layers: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (i, node) in nodes.iter().enumerate() {
        layers.entry(node.layer.max(1)).or_default().push(i);
    }
    layers
}

/// Point scale of layers `1..=max_layer` over the horizontal range.
pub fn column_x(
    layer: u32,
    max_layer: u32,
    viewport: Viewport,
    margins: &Margins,
) -> f64 {
    let start = margins.left;
    let stop = (viewport.width - margins.right).max(start);
    let slots = max_layer.max(1);
    if slots == 1 {
        return start + (stop - start) / 2.0;
    }
    let step = (stop - start) / f64::from(slots - 1);
    let slot = layer.clamp(1, slots) - 1;
    start + step * f64::from(slot)
}

/// Y coordinate of the `index`-th of `count` nodes in a column.
pub fn row_y(index: usize, count: usize, viewport: Viewport, margins: &Margins) -> f64 {
    let span = (viewport.height - margins.top - margins.bottom).max(0.0);
    let step = span / (count as f64 + 1.0);
    margins.top + step * (index as f64 + 1.0)
}

/// Target coordinate for every node, in node order.
pub fn compute_targets(
    nodes: &[Node],
    viewport: Viewport,
    margins: &Margins,
) -> Vec<(f64, f64)> {
    let mut targets = vec![(0.0, 0.0); nodes.len()];
    let layers = group_by_layer(nodes);
    let max_layer = layers.keys().next_back().copied().unwrap_or(1);

    for (&layer, members) in &layers {
        let x = column_x(layer, max_layer, viewport, margins);
        let count = members.len();
        for (row, &node_idx) in members.iter().enumerate() {
            targets[node_idx] = (x, row_y(row, count, viewport, margins));
        }
    }

    targets
}

/// Recompute targets and write them into the store.
pub fn place(
    store: &mut GraphStore,
    viewport: Viewport,
    margins: &Margins,
    placement: Placement,
) {
    let targets = compute_targets(store.nodes(), viewport, margins);
    for ((_, layout), target) in store.layouts_mut().zip(targets) {
        layout.target = target;
        match placement {
            Placement::Reaim => {
                if layout.position.is_none() {
                    layout.position = Some(target);
                }
            }
            Placement::Reset => {
                layout.position = Some(target);
                layout.pin = None;
            }
        }
    }
    log::debug!(
        "placed {} nodes in {:.0}x{:.0} ({placement:?})",
        store.nodes().len(),
        viewport.width,
        viewport.height
    );
}
