//! In-process stand-in for the remote graph store.
//!
//! Applies requests with the same acceptance rules as the HTTP server:
//! node saves update `group` and `layer` of an existing node, node adds
//! refuse existing ids and unknown link sources, full saves are
//! validated. Every accepted or rejected request is recorded.

use crate::graph_state::{GraphData, validate};
use crate::sync::{SyncRequest, Transport, TransportError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

const BAD_REQUEST: u16 = 400;
const NOT_FOUND: u16 = 404;
const CONFLICT: u16 = 409;

#[derive(Debug, Default)]
pub struct MemoryTransport {
    graph: Mutex<GraphData>,
    requests: Mutex<Vec<SyncRequest>>,
    fail_loads: AtomicBool,
    fail_submits: AtomicBool,
}

impl MemoryTransport {
    pub fn new(graph: GraphData) -> Self {
        Self {
            graph: Mutex::new(graph),
            ..Self::default()
        }
    }

    /// Make every subsequent load fail with a network error.
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail with a network error.
    pub fn fail_submits(&self, fail: bool) {
        self.fail_submits.store(fail, Ordering::SeqCst);
    }

    pub fn graph(&self) -> GraphData {
        lock(&self.graph).clone()
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<SyncRequest> {
        lock(&self.requests).clone()
    }

    fn apply(&self, request: &SyncRequest) -> Result<(), TransportError> {
        let mut graph = lock(&self.graph);
        match request {
            SyncRequest::SaveGraph(next) => {
                validate(next).map_err(|_| status("/api/save", BAD_REQUEST))?;
                *graph = next.clone();
            }
            SyncRequest::SaveNode(node) => {
                let stored = graph
                    .nodes
                    .iter_mut()
                    .find(|n| n.id == node.id)
                    .ok_or_else(|| status("/api/node", NOT_FOUND))?;
                stored.group = node.group;
                stored.layer = node.layer;
            }
            SyncRequest::SaveLink(link) => {
                let (source, target) = link.key();
                let stored = graph
                    .links
                    .iter_mut()
                    .find(|l| l.connects(source, target))
                    .ok_or_else(|| status("/api/link", NOT_FOUND))?;
                stored.weight = link.weight;
            }
            SyncRequest::AddNode { node, link } => {
                if node.id.is_empty() {
                    return Err(status("/api/node/add", BAD_REQUEST));
                }
                if graph.node(&node.id).is_some() {
                    return Err(status("/api/node/add", CONFLICT));
                }
                if graph.node(link.source.id()).is_none() {
                    return Err(status("/api/node/add", BAD_REQUEST));
                }
                graph.nodes.push(node.clone());
                graph.links.push(link.clone());
            }
            SyncRequest::AddLink(link) => {
                let (source, target) = link.key();
                if graph.node(source).is_none() || graph.node(target).is_none() {
                    return Err(status("/api/link/add", BAD_REQUEST));
                }
                if graph.links.iter().any(|l| l.connects(source, target)) {
                    return Err(status("/api/link/add", CONFLICT));
                }
                graph.links.push(link.clone());
            }
        }
        Ok(())
    }
}

impl Transport for MemoryTransport {
    fn fetch_graph(&self) -> Result<GraphData, TransportError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(TransportError::Network {
                url: "memory:/api/getGraph".into(),
                message: "connection refused".into(),
            });
        }
        Ok(self.graph())
    }

    fn submit(&self, request: &SyncRequest) -> Result<(), TransportError> {
        lock(&self.requests).push(request.clone());
        if self.fail_submits.load(Ordering::SeqCst) {
            return Err(TransportError::Network {
                url: "memory:".into(),
                message: "connection refused".into(),
            });
        }
        self.apply(request)
    }
}

fn status(path: &str, status: u16) -> TransportError {
    TransportError::HttpStatus {
        url: format!("memory:{path}"),
        status,
    }
}

// Poisoning is ignored; every request leaves the graph consistent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_state::{Link, Node, sample_graph};

    #[test]
    fn test_node_save_updates_group_and_layer_only() {
        let remote = MemoryTransport::new(sample_graph());
        let node = Node::new("Node A", 7, 2).with_activation("tanh");
        remote.submit(&SyncRequest::SaveNode(node)).unwrap();

        let stored = remote.graph();
        let a = stored.node("Node A").unwrap();
        assert_eq!((a.group, a.layer), (7, 2));
        assert_eq!(a.activation_fn, None);

        let missing = SyncRequest::SaveNode(Node::new("ghost", 1, 1));
        assert_eq!(
            remote.submit(&missing),
            Err(status("/api/node", NOT_FOUND))
        );
    }

    #[test]
    fn test_add_node_checks_id_and_source() {
        let remote = MemoryTransport::new(sample_graph());
        let add = |id: &str, source: &str| SyncRequest::AddNode {
            node: Node::new(id, 1, 4),
            link: Link::new(source, id, 1.0),
        };

        assert_eq!(
            remote.submit(&add("Node A", "Node B")),
            Err(status("/api/node/add", CONFLICT))
        );
        assert_eq!(
            remote.submit(&add("new", "ghost")),
            Err(status("/api/node/add", BAD_REQUEST))
        );
        remote.submit(&add("new", "Node F")).unwrap();
        assert!(remote.graph().node("new").is_some());
        assert_eq!(remote.requests().len(), 3);
    }

    #[test]
    fn test_full_save_is_validated() {
        let remote = MemoryTransport::new(GraphData::default());
        let mut bad = sample_graph();
        bad.links.push(Link::new("Node A", "ghost", 1.0));
        assert!(remote.submit(&SyncRequest::SaveGraph(bad)).is_err());
        assert!(remote.graph().is_empty());
    }
}
