use crate::graph_state::{Endpoint, NodeId};
use crate::store::GraphStore;
use serde::Serialize;

const STROKE_BASE: f64 = 1.0;
const STROKE_SCALE: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeFrame {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
    pub group: u32,
    pub color: String,
    pub pinned: bool,
    /// Node is the pending source of a link draft.
    pub highlighted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkFrame {
    pub source: NodeId,
    pub target: NodeId,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub mid_x: f64,
    pub mid_y: f64,
    pub weight: f64,
    pub label: String,
    pub stroke_width: f64,
}

/// Everything the view layer needs to draw one simulation step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Frame {
    pub nodes: Vec<NodeFrame>,
    pub links: Vec<LinkFrame>,
}

impl Frame {
    /// Build a frame from the store.
    ///
    /// `resolve` maps a bound endpoint to the engine's live position;
    /// plain endpoints fall back to the node's stored position.
    pub fn build<F>(
        store: &GraphStore,
        resolve: F,
        highlighted: Option<&str>,
    ) -> Self
    where
        F: Fn(&Endpoint) -> Option<(f64, f64)>,
    {
        let nodes = store
            .nodes()
            .iter()
            .map(|node| {
                let (x, y) = node.layout.current();
                NodeFrame {
                    id: node.id.clone(),
                    x,
                    y,
                    group: node.group,
                    color: group_color(node.group),
                    pinned: node.layout.pin.is_some(),
                    highlighted: highlighted == Some(node.id.as_str()),
                }
            })
            .collect();

        let position = |endpoint: &Endpoint| {
            resolve(endpoint).or_else(|| {
                store.node(endpoint.id()).map(|n| n.layout.current())
            })
        };

        let links = store
            .links()
            .iter()
            .filter_map(|link| {
                let (x1, y1) = position(&link.source)?;
                let (x2, y2) = position(&link.target)?;
                Some(LinkFrame {
                    source: link.source.id().to_string(),
                    target: link.target.id().to_string(),
                    x1,
                    y1,
                    x2,
                    y2,
                    mid_x: (x1 + x2) / 2.0,
                    mid_y: (y1 + y2) / 2.0,
                    weight: link.weight,
                    label: weight_label(link.weight),
                    stroke_width: stroke_width(link.weight),
                })
            })
            .collect();

        Self { nodes, links }
    }

    pub fn node(&self, id: &str) -> Option<&NodeFrame> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn link(&self, source: &str, target: &str) -> Option<&LinkFrame> {
        self.links
            .iter()
            .find(|l| l.source == source && l.target == target)
    }
}

/// Monotonic in `|weight|`.
pub fn stroke_width(weight: f64) -> f64 {
    STROKE_BASE + STROKE_SCALE * weight.abs().sqrt()
}

pub fn weight_label(weight: f64) -> String {
    format!("{weight}")
}

/// Category10 color for a group, as `#rrggbb`.
pub fn group_color(group: u32) -> String {
    let palette = colorous::CATEGORY10;
    let c = palette[group as usize % palette.len()];
    format!("#{:02x}{:02x}{:02x}", c.r, c.g, c.b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_state::{GraphData, Link, Node};

    fn placed_store() -> GraphStore {
        let mut store = GraphStore::from_graph(GraphData::new(
            vec![Node::new("A", 1, 1), Node::new("B", 2, 2)],
            vec![Link::new("A", "B", 4.0)],
        ));
        if let Some(layout) = store.layout_mut("A") {
            layout.position = Some((0.0, 10.0));
        }
        if let Some(layout) = store.layout_mut("B") {
            layout.position = Some((100.0, 30.0));
        }
        store
    }

    #[test]
    fn test_link_midpoint_and_style() {
        let store = placed_store();
        let frame = Frame::build(&store, |_| None, None);

        let link = frame.link("A", "B").unwrap();
        assert_eq!((link.x1, link.y1, link.x2, link.y2), (0.0, 10.0, 100.0, 30.0));
        assert_eq!((link.mid_x, link.mid_y), (50.0, 20.0));
        assert_eq!(link.label, "4");
        assert_eq!(link.stroke_width, STROKE_BASE + STROKE_SCALE * 2.0);
    }

    #[test]
    fn test_resolver_overrides_stored_position() {
        let store = placed_store();
        let frame = Frame::build(
            &store,
            |endpoint| (endpoint.id() == "B").then_some((7.0, 7.0)),
            Some("A"),
        );
        let link = frame.link("A", "B").unwrap();
        assert_eq!((link.x2, link.y2), (7.0, 7.0));
        assert!(frame.node("A").unwrap().highlighted);
        assert!(!frame.node("B").unwrap().highlighted);
    }

    #[test]
    fn test_stroke_width_is_monotonic() {
        let weights = [0.0, 0.1, 0.5, 1.0, 2.0, 10.0];
        for pair in weights.windows(2) {
            assert!(stroke_width(pair[0]) < stroke_width(pair[1]));
        }
    }

    #[test]
    fn test_group_color_cycles_through_palette() {
        assert_eq!(group_color(0), "#1f77b4");
        assert_eq!(group_color(1), "#ff7f0e");
        assert_eq!(group_color(10), group_color(0));
    }
}
