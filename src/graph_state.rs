//! Node and link model, wire shape and integrity checks.

use force_graph::DefaultNodeIdx;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;

pub type NodeId = String;

fn default_group() -> u32 {
    1
}

fn default_layer() -> u32 {
    1
}

fn default_weight() -> f64 {
    1.0
}

// ------------------------------------------------------------------
// Nodes
// ------------------------------------------------------------------

/// Engine-owned placement data. Never serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeLayout {
    /// Current position, `None` until the node has been placed once.
    pub position: Option<(f64, f64)>,
    /// Position fixed by the user; exempt from forces while set.
    pub pin: Option<(f64, f64)>,
    /// Column/row slot computed by the layer placer.
    pub target: (f64, f64),
}

impl NodeLayout {
    /// Where the node is drawn right now.
    pub fn current(&self) -> (f64, f64) {
        self.pin.or(self.position).unwrap_or(self.target)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(default = "default_group")]
    pub group: u32,
    #[serde(default = "default_layer")]
    pub layer: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(
        default,
        rename = "activFn",
        alias = "activationFn",
        skip_serializing_if = "Option::is_none"
    )]
    pub activation_fn: Option<String>,
    #[serde(skip)]
    pub layout: NodeLayout,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, group: u32, layer: u32) -> Self {
        Self {
            id: id.into(),
            group,
            layer,
            value: None,
            activation_fn: None,
            layout: NodeLayout::default(),
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_activation(mut self, activation_fn: impl Into<String>) -> Self {
        self.activation_fn = Some(activation_fn.into());
        self
    }

    /// True when the persisted attributes match, ignoring layout.
    pub fn same_attributes(&self, other: &Node) -> bool {
        self.id == other.id
            && self.group == other.group
            && self.layer == other.layer
            && self.value == other.value
            && self.activation_fn == other.activation_fn
    }
}

// ------------------------------------------------------------------
// Links
// ------------------------------------------------------------------

/// A link endpoint: a plain node id, or an id bound to the physics
/// engine's handle for that node.
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    Id(NodeId),
    Bound { id: NodeId, handle: DefaultNodeIdx },
}

impl Endpoint {
    pub fn id(&self) -> &str {
        match self {
            Endpoint::Id(id) => id,
            Endpoint::Bound { id, .. } => id,
        }
    }

    pub fn handle(&self) -> Option<DefaultNodeIdx> {
        match self {
            Endpoint::Id(_) => None,
            Endpoint::Bound { handle, .. } => Some(*handle),
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, Endpoint::Bound { .. })
    }

    /// Reduce a bound endpoint back to its plain id.
    pub fn normalize(&mut self) {
        if let Endpoint::Bound { id, .. } = self {
            *self = Endpoint::Id(std::mem::take(id));
        }
    }

    pub fn bind(&mut self, handle: DefaultNodeIdx) {
        let id = match self {
            Endpoint::Id(id) => std::mem::take(id),
            Endpoint::Bound { id, .. } => std::mem::take(id),
        };
        *self = Endpoint::Bound { id, handle };
    }

    /// Rewrite the id if it equals `old`, keeping any bound handle.
    pub(crate) fn rename(&mut self, old: &str, new: &str) -> bool {
        let id = match self {
            Endpoint::Id(id) => id,
            Endpoint::Bound { id, .. } => id,
        };
        if id == old {
            *id = new.to_string();
            true
        } else {
            false
        }
    }
}

impl From<&str> for Endpoint {
    fn from(id: &str) -> Self {
        Endpoint::Id(id.to_string())
    }
}

impl From<String> for Endpoint {
    fn from(id: String) -> Self {
        Endpoint::Id(id)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// Endpoints always travel as plain ids.
impl Serialize for Endpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id())
    }
}

impl<'de> Deserialize<'de> for Endpoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Endpoint::Id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub source: Endpoint,
    pub target: Endpoint,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl Link {
    pub fn new(source: impl Into<Endpoint>, target: impl Into<Endpoint>, weight: f64) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            weight,
        }
    }

    /// `(source id, target id)`, independent of endpoint binding.
    pub fn key(&self) -> (&str, &str) {
        (self.source.id(), self.target.id())
    }

    pub fn connects(&self, source: &str, target: &str) -> bool {
        self.key() == (source, target)
    }

    pub fn normalize(&mut self) {
        self.source.normalize();
        self.target.normalize();
    }

    pub fn is_normalized(&self) -> bool {
        !self.source.is_bound() && !self.target.is_bound()
    }
}

// ------------------------------------------------------------------
// Graph
// ------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphData {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl GraphData {
    pub fn new(nodes: Vec<Node>, links: Vec<Link>) -> Self {
        Self { nodes, links }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }
}

/// The six-node demo graph the store ships with.
pub fn sample_graph() -> GraphData {
    let nodes = vec![
        Node::new("Node A", 1, 1),
        Node::new("Node B", 2, 1),
        Node::new("Node C", 1, 2),
        Node::new("Node D", 3, 2),
        Node::new("Node E", 3, 3),
        Node::new("Node F", 3, 3),
    ];
    let links = vec![
        Link::new("Node A", "Node C", 5.0),
        Link::new("Node A", "Node D", 3.0),
        Link::new("Node B", "Node C", 5.0),
        Link::new("Node B", "Node D", 3.0),
        Link::new("Node C", "Node E", 5.0),
        Link::new("Node C", "Node F", 3.0),
        Link::new("Node D", "Node F", 2.0),
    ];
    GraphData::new(nodes, links)
}

/// Build a fully connected feed-forward graph.
///
/// `layer_counts[i]` nodes are created for layer `i + 1`, named
/// `L{layer}-N{n}`. Every node links to every node of the next layer
/// with a weight drawn from `[0.1, 0.5)`, rounded to two decimals.
pub fn generate_layered_graph<R: Rng + ?Sized>(
    layer_counts: &[usize],
    rng: &mut R,
) -> GraphData {
    let mut nodes = Vec::new();
    let mut layer_ids: Vec<Vec<NodeId>> = Vec::with_capacity(layer_counts.len());

    for (layer_index, &count) in layer_counts.iter().enumerate() {
        let layer = (layer_index + 1) as u32;
        let mut ids = Vec::with_capacity(count);
        for n in 1..=count {
            let id = format!("L{layer}-N{n}");
            nodes.push(
                Node::new(id.clone(), layer, layer)
                    .with_value(0.0)
                    .with_activation("relu"),
            );
            ids.push(id);
        }
        layer_ids.push(ids);
    }

    let mut links = Vec::new();
    for pair in layer_ids.windows(2) {
        for source in &pair[0] {
            for target in &pair[1] {
                let weight: f64 = rng.random_range(0.1..0.5);
                links.push(Link::new(
                    source.as_str(),
                    target.as_str(),
                    round_to(weight, 2),
                ));
            }
        }
    }

    GraphData::new(nodes, links)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let p = 10f64.powi(decimals);
    (value * p).round() / p
}

// ------------------------------------------------------------------
// Integrity
// ------------------------------------------------------------------

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum IntegrityError {
    #[error("node id cannot be empty")]
    EmptyId,
    #[error("node {0:?} already exists")]
    DuplicateId(NodeId),
    #[error("node {0:?} does not exist")]
    UnknownNode(NodeId),
    #[error("link {from:?} -> {to:?} references a missing node")]
    DanglingEndpoint { from: NodeId, to: NodeId },
    #[error("link {from:?} -> {to:?} already exists")]
    DuplicateLink { from: NodeId, to: NodeId },
    #[error("link {from:?} -> {to:?} does not exist")]
    UnknownLink { from: NodeId, to: NodeId },
}

/// Reject graphs the store would refuse: empty or repeated node ids and
/// links whose endpoints name no node.
pub fn validate(graph: &GraphData) -> Result<(), IntegrityError> {
    let mut ids = HashSet::with_capacity(graph.nodes.len());
    for node in &graph.nodes {
        if node.id.trim().is_empty() {
            return Err(IntegrityError::EmptyId);
        }
        if !ids.insert(node.id.as_str()) {
            return Err(IntegrityError::DuplicateId(node.id.clone()));
        }
    }

    for link in &graph.links {
        let (source, target) = link.key();
        if !ids.contains(source) || !ids.contains(target) {
            return Err(IntegrityError::DanglingEndpoint {
                from: source.to_string(),
                to: target.to_string(),
            });
        }
    }

    Ok(())
}

// ------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_node_wire_shape_uses_store_field_names() {
        let node = Node::new("L1-N1", 1, 1)
            .with_value(0.5)
            .with_activation("relu");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "L1-N1",
                "group": 1,
                "layer": 1,
                "value": 0.5,
                "activFn": "relu"
            })
        );

        // The long field name is accepted on input as well
        let parsed: Node = serde_json::from_str(
            r#"{"id":"x","group":2,"layer":3,"activationFn":"tanh"}"#,
        )
        .unwrap();
        assert_eq!(parsed.activation_fn.as_deref(), Some("tanh"));
        assert_eq!(parsed.value, None);
    }

    #[test]
    fn test_bound_endpoint_serializes_as_plain_id() {
        let mut link = Link::new("A", "B", 2.0);
        link.source.bind(DefaultNodeIdx::new(7));
        assert!(link.source.is_bound());

        let json = serde_json::to_string(&link).unwrap();
        assert_eq!(json, r#"{"source":"A","target":"B","weight":2.0}"#);

        let back: Link = serde_json::from_str(&json).unwrap();
        assert!(back.is_normalized());
        assert_eq!(back.key(), ("A", "B"));
    }

    #[test]
    fn test_missing_link_weight_defaults_to_one() {
        let link: Link =
            serde_json::from_str(r#"{"source":"A","target":"B"}"#).unwrap();
        assert_eq!(link.weight, 1.0);
    }

    #[test]
    fn test_generate_layered_graph_is_fully_connected_between_layers() {
        let mut rng = StdRng::seed_from_u64(7);
        let graph = generate_layered_graph(&[2, 3, 1], &mut rng);

        assert_eq!(graph.nodes.len(), 6);
        assert_eq!(graph.links.len(), 2 * 3 + 3 * 1);
        assert!(graph.node("L2-N3").is_some());
        assert_eq!(graph.node("L3-N1").map(|n| n.layer), Some(3));

        for link in &graph.links {
            assert!(link.weight >= 0.1 && link.weight <= 0.5);
            assert_eq!(link.weight, round_to(link.weight, 2));
            let source = graph.node(link.source.id()).unwrap();
            let target = graph.node(link.target.id()).unwrap();
            assert_eq!(source.layer + 1, target.layer);
        }
        assert!(validate(&graph).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_graphs() {
        let mut graph = sample_graph();
        assert!(validate(&graph).is_ok());

        graph.links.push(Link::new("Node A", "ghost", 1.0));
        assert!(matches!(
            validate(&graph),
            Err(IntegrityError::DanglingEndpoint { .. })
        ));

        let mut graph = sample_graph();
        graph.nodes.push(Node::new("Node A", 1, 1));
        assert_eq!(
            validate(&graph),
            Err(IntegrityError::DuplicateId("Node A".into()))
        );

        let mut graph = sample_graph();
        graph.nodes.push(Node::new("  ", 1, 1));
        assert_eq!(validate(&graph), Err(IntegrityError::EmptyId));
    }

    #[test]
    fn test_layout_current_prefers_pin_then_position() {
        let mut layout = NodeLayout {
            target: (1.0, 2.0),
            ..Default::default()
        };
        assert_eq!(layout.current(), (1.0, 2.0));
        layout.position = Some((3.0, 4.0));
        assert_eq!(layout.current(), (3.0, 4.0));
        layout.pin = Some((5.0, 6.0));
        assert_eq!(layout.current(), (5.0, 6.0));
    }
}
