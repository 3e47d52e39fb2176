use crate::graph_state::{
    Endpoint, GraphData, IntegrityError, Link, Node, NodeId, NodeLayout,
};
use crate::layout_layered;
use crate::versioned::Versioned;
use force_graph::DefaultNodeIdx;
use std::collections::{BTreeMap, HashMap};

/// Attribute set written back by the node editor.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeAttributes {
    pub group: u32,
    pub layer: u32,
    pub value: Option<f64>,
    pub activation_fn: Option<String>,
}

/// Canonical in-memory graph.
///
/// Every tracked mutation advances [`GraphStore::revision`]; the
/// controller re-arms layout whenever the revision moves. Layout data
/// and endpoint binding are engine-owned and do not count as
/// mutations.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    graph: Versioned<GraphData>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already validated graph.
    pub fn from_graph(graph: GraphData) -> Self {
        Self {
            graph: Versioned::new(graph),
        }
    }

    pub fn graph(&self) -> &GraphData {
        self.graph.get()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.graph.get().nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.graph.get().links
    }

    pub fn revision(&self) -> u64 {
        self.graph.version()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.graph.get().node(id)
    }

    /// Node indices keyed by layer, in store order within a layer.
    pub fn layer_groups(&self) -> BTreeMap<u32, Vec<usize>> {
        layout_layered::group_by_layer(self.nodes())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn find_link(&self, source: &str, target: &str) -> Option<&Link> {
        self.links().iter().find(|l| l.connects(source, target))
    }

    pub fn has_link(&self, source: &str, target: &str) -> bool {
        self.find_link(source, target).is_some()
    }

    /// Swap the whole graph, e.g. after a load.
    pub fn replace(&mut self, graph: GraphData) {
        self.graph.set(graph);
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), IntegrityError> {
        if node.id.trim().is_empty() {
            return Err(IntegrityError::EmptyId);
        }
        if self.contains(&node.id) {
            return Err(IntegrityError::DuplicateId(node.id));
        }
        self.graph.get_mut().nodes.push(node);
        Ok(())
    }

    /// Append a link. Both endpoints must already exist and the
    /// `(source, target)` pair must be new.
    pub fn add_link(&mut self, link: Link) -> Result<(), IntegrityError> {
        let (source, target) = link.key();
        if !self.contains(source) || !self.contains(target) {
            return Err(IntegrityError::DanglingEndpoint {
                from: source.to_string(),
                to: target.to_string(),
            });
        }
        if self.has_link(source, target) {
            return Err(IntegrityError::DuplicateLink {
                from: source.to_string(),
                to: target.to_string(),
            });
        }
        self.graph.get_mut().links.push(link);
        Ok(())
    }

    /// Rename a node and rewrite every link endpoint that referenced
    /// the old id, plain or bound. Returns the number of rewritten
    /// endpoints.
    pub fn rename_node(
        &mut self,
        old: &str,
        new: &str,
    ) -> Result<usize, IntegrityError> {
        if new.trim().is_empty() {
            return Err(IntegrityError::EmptyId);
        }
        if !self.contains(old) {
            return Err(IntegrityError::UnknownNode(old.to_string()));
        }
        if old == new {
            return Ok(0);
        }
        if self.contains(new) {
            return Err(IntegrityError::DuplicateId(new.to_string()));
        }

        let graph = self.graph.get_mut();
        if let Some(node) = graph.nodes.iter_mut().find(|n| n.id == old) {
            node.id = new.to_string();
        }
        let mut rewritten = 0;
        for link in &mut graph.links {
            if link.source.rename(old, new) {
                rewritten += 1;
            }
            if link.target.rename(old, new) {
                rewritten += 1;
            }
        }
        log::debug!("renamed {old:?} to {new:?}, {rewritten} endpoints rewritten");
        Ok(rewritten)
    }

    pub fn set_attributes(
        &mut self,
        id: &str,
        attributes: NodeAttributes,
    ) -> Result<(), IntegrityError> {
        let node = self
            .graph
            .get_mut()
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| IntegrityError::UnknownNode(id.to_string()))?;
        node.group = attributes.group;
        node.layer = attributes.layer;
        node.value = attributes.value;
        node.activation_fn = attributes.activation_fn;
        Ok(())
    }

    pub fn set_link_weight(
        &mut self,
        source: &str,
        target: &str,
        weight: f64,
    ) -> Result<(), IntegrityError> {
        let link = self
            .graph
            .get_mut()
            .links
            .iter_mut()
            .find(|l| l.connects(source, target))
            .ok_or_else(|| IntegrityError::UnknownLink {
                from: source.to_string(),
                to: target.to_string(),
            })?;
        link.weight = weight;
        Ok(())
    }

    /// Reduce every bound endpoint to its plain id. Idempotent.
    pub fn normalize_links(&mut self) {
        for link in &mut self.graph.get_untracked_mut().links {
            link.normalize();
        }
    }

    /// Bind link endpoints to physics handles. Endpoints whose id has
    /// no handle are left plain. Returns the number of links with both
    /// ends bound.
    pub fn bind_links(
        &mut self,
        handles: &HashMap<NodeId, DefaultNodeIdx>,
    ) -> usize {
        let mut bound = 0;
        for link in &mut self.graph.get_untracked_mut().links {
            bind_endpoint(&mut link.source, handles);
            bind_endpoint(&mut link.target, handles);
            if link.source.is_bound() && link.target.is_bound() {
                bound += 1;
            }
        }
        bound
    }

    /// Engine access to per-node layout data, in node order.
    pub fn layouts_mut(
        &mut self,
    ) -> impl Iterator<Item = (&str, &mut NodeLayout)> {
        self.graph
            .get_untracked_mut()
            .nodes
            .iter_mut()
            .map(|n| (n.id.as_str(), &mut n.layout))
    }

    pub fn layout_mut(&mut self, id: &str) -> Option<&mut NodeLayout> {
        self.graph
            .get_untracked_mut()
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .map(|n| &mut n.layout)
    }
}

fn bind_endpoint(
    endpoint: &mut Endpoint,
    handles: &HashMap<NodeId, DefaultNodeIdx>,
) {
    match handles.get(endpoint.id()) {
        Some(&handle) => endpoint.bind(handle),
        None => endpoint.normalize(),
    }
}
