//! Persistence against the remote graph store.
//!
//! Loads are blocking. Saves are fire-and-forget: requests go to a
//! worker thread over a channel and completions come back over a second
//! one, to be drained with [`SyncClient::poll`]. Each request carries a
//! per-entity sequence number so that a completion overtaken by a newer
//! request for the same entity is reported as stale.

use crate::config::Endpoints;
use crate::graph_state::{GraphData, IntegrityError, Link, Node, NodeId, validate};
use crate::store::GraphStore;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use reqwest::blocking::{Client, Response};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use url::Url;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("invalid endpoint url {url:?}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },
    #[error("{url} answered with status {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("unreadable response from {url}: {message}")]
    Body { url: String, message: String },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("failed to load graph: {0}")]
    Transport(#[from] TransportError),
    #[error("loaded graph is inconsistent: {0}")]
    Invalid(#[from] IntegrityError),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SaveError {
    #[error("refusing to save an inconsistent graph: {0}")]
    Invalid(#[from] IntegrityError),
    #[error("saving {key} failed: {source}")]
    Transport {
        key: EntityKey,
        source: TransportError,
    },
    #[error("sync worker has stopped")]
    Disconnected,
}

/// The entity a request writes; sequence numbers are tracked per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Graph,
    Node(NodeId),
    Link(NodeId, NodeId),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Graph => f.write_str("graph"),
            EntityKey::Node(id) => write!(f, "node {id:?}"),
            EntityKey::Link(source, target) => {
                write!(f, "link {source:?} -> {target:?}")
            }
        }
    }
}

/// A write to the remote store. Every payload is sanitized: links carry
/// plain ids and nodes carry no layout.
#[derive(Debug, Clone)]
pub enum SyncRequest {
    SaveGraph(GraphData),
    SaveNode(Node),
    SaveLink(Link),
    AddNode { node: Node, link: Link },
    AddLink(Link),
}

impl SyncRequest {
    pub fn key(&self) -> EntityKey {
        match self {
            SyncRequest::SaveGraph(_) => EntityKey::Graph,
            SyncRequest::SaveNode(node) | SyncRequest::AddNode { node, .. } => {
                EntityKey::Node(node.id.clone())
            }
            SyncRequest::SaveLink(link) | SyncRequest::AddLink(link) => {
                let (source, target) = link.key();
                EntityKey::Link(source.to_string(), target.to_string())
            }
        }
    }
}

/// Seam between the client and the wire.
pub trait Transport: Send + Sync {
    fn fetch_graph(&self) -> Result<GraphData, TransportError>;
    fn submit(&self, request: &SyncRequest) -> Result<(), TransportError>;
}

// ------------------------------------------------------------------
// HTTP
// ------------------------------------------------------------------

pub struct HttpTransport {
    client: Client,
    endpoints: Endpoints,
    base: Url,
}

impl HttpTransport {
    pub fn new(endpoints: Endpoints, timeout: Duration) -> Result<Self, TransportError> {
        let base = Url::parse(&endpoints.base_url).map_err(|e| {
            TransportError::InvalidUrl {
                url: endpoints.base_url.clone(),
                message: e.to_string(),
            }
        })?;
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            TransportError::Network {
                url: endpoints.base_url.clone(),
                message: e.to_string(),
            }
        })?;
        Ok(Self {
            client,
            endpoints,
            base,
        })
    }

    fn url(&self, path: &str) -> Result<Url, TransportError> {
        self.base.join(path).map_err(|e| TransportError::InvalidUrl {
            url: path.to_string(),
            message: e.to_string(),
        })
    }

    fn check(url: &Url, response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl Transport for HttpTransport {
    fn fetch_graph(&self) -> Result<GraphData, TransportError> {
        let url = self.url(&self.endpoints.load_graph)?;
        let response = self.client.get(url.clone()).send().map_err(|e| {
            TransportError::Network {
                url: url.to_string(),
                message: e.to_string(),
            }
        })?;
        Self::check(&url, response)?
            .json::<GraphData>()
            .map_err(|e| TransportError::Body {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    fn submit(&self, request: &SyncRequest) -> Result<(), TransportError> {
        let builder = match request {
            SyncRequest::SaveGraph(graph) => {
                self.client.post(self.url(&self.endpoints.save_graph)?).json(graph)
            }
            SyncRequest::SaveNode(node) => {
                self.client.put(self.url(&self.endpoints.save_node)?).json(node)
            }
            SyncRequest::SaveLink(link) => {
                self.client.post(self.url(&self.endpoints.save_link)?).json(link)
            }
            SyncRequest::AddNode { node, link } => self
                .client
                .post(self.url(&self.endpoints.add_node)?)
                .json(&serde_json::json!({ "node": node, "link": link })),
            SyncRequest::AddLink(link) => {
                self.client.post(self.url(&self.endpoints.add_link)?).json(link)
            }
        };
        let request = builder.build().map_err(|e| TransportError::Body {
            url: self.endpoints.base_url.clone(),
            message: e.to_string(),
        })?;
        let url = request.url().clone();
        let response = self.client.execute(request).map_err(|e| {
            TransportError::Network {
                url: url.to_string(),
                message: e.to_string(),
            }
        })?;
        Self::check(&url, response).map(|_| ())
    }
}

// ------------------------------------------------------------------
// Client
// ------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SaveStatus {
    Saved,
    Failed(SaveError),
    /// A newer request for the same entity was issued after this one.
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub key: EntityKey,
    pub seq: u64,
    pub status: SaveStatus,
}

struct Job {
    seq: u64,
    request: SyncRequest,
}

struct Completion {
    key: EntityKey,
    seq: u64,
    result: Result<(), TransportError>,
}

pub struct SyncClient {
    transport: Arc<dyn Transport>,
    jobs: Option<Sender<Job>>,
    completions: Receiver<Completion>,
    worker: Option<JoinHandle<()>>,
    next_seq: u64,
    latest: HashMap<EntityKey, u64>,
    in_flight: usize,
}

impl SyncClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<Job>();
        let (done_tx, done_rx) = crossbeam_channel::unbounded();
        let worker_transport = Arc::clone(&transport);
        let worker = thread::spawn(move || {
            for job in job_rx.iter() {
                let key = job.request.key();
                let result = worker_transport.submit(&job.request);
                let completion = Completion {
                    key,
                    seq: job.seq,
                    result,
                };
                if done_tx.send(completion).is_err() {
                    break;
                }
            }
        });

        Self {
            transport,
            jobs: Some(job_tx),
            completions: done_rx,
            worker: Some(worker),
            next_seq: 0,
            latest: HashMap::new(),
            in_flight: 0,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Fetch and check the remote graph. Blocks; no retry.
    pub fn load(&self) -> Result<GraphData, LoadError> {
        let mut graph = self.transport.fetch_graph()?;
        for link in &mut graph.links {
            link.normalize();
        }
        validate(&graph)?;
        log::info!(
            "loaded graph with {} nodes and {} links",
            graph.nodes.len(),
            graph.links.len()
        );
        Ok(graph)
    }

    /// Submit the whole graph. The snapshot is validated first; nothing
    /// is sent for a graph the store would reject.
    pub fn save_full(&mut self, store: &GraphStore) -> Result<u64, SaveError> {
        let snapshot = sanitize(store.graph());
        validate(&snapshot)?;
        self.submit(SyncRequest::SaveGraph(snapshot))
    }

    pub fn save_node(&mut self, node: &Node) -> Result<u64, SaveError> {
        self.submit(SyncRequest::SaveNode(sanitize_node(node)))
    }

    pub fn save_link(&mut self, link: &Link) -> Result<u64, SaveError> {
        self.submit(SyncRequest::SaveLink(sanitize_link(link)))
    }

    pub fn add_node(&mut self, node: &Node, link: &Link) -> Result<u64, SaveError> {
        self.submit(SyncRequest::AddNode {
            node: sanitize_node(node),
            link: sanitize_link(link),
        })
    }

    pub fn add_link(&mut self, link: &Link) -> Result<u64, SaveError> {
        self.submit(SyncRequest::AddLink(sanitize_link(link)))
    }

    fn submit(&mut self, request: SyncRequest) -> Result<u64, SaveError> {
        let jobs = self.jobs.as_ref().ok_or(SaveError::Disconnected)?;
        self.next_seq += 1;
        let seq = self.next_seq;
        let key = request.key();
        jobs.send(Job { seq, request })
            .map_err(|_| SaveError::Disconnected)?;
        log::debug!("queued save of {key} (seq {seq})");
        self.latest.insert(key, seq);
        self.in_flight += 1;
        Ok(seq)
    }

    /// Drain finished requests without blocking.
    pub fn poll(&mut self) -> Vec<SyncOutcome> {
        let mut outcomes = Vec::new();
        loop {
            match self.completions.try_recv() {
                Ok(completion) => outcomes.push(self.classify(completion)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.in_flight = 0;
                    break;
                }
            }
        }
        outcomes
    }

    /// Block until every queued request has completed or `timeout`
    /// elapses.
    pub fn wait_idle(&mut self, timeout: Duration) -> Vec<SyncOutcome> {
        let deadline = Instant::now() + timeout;
        let mut outcomes = Vec::new();
        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.completions.recv_timeout(remaining) {
                Ok(completion) => outcomes.push(self.classify(completion)),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    self.in_flight = 0;
                    break;
                }
            }
        }
        outcomes
    }

    fn classify(&mut self, completion: Completion) -> SyncOutcome {
        self.in_flight = self.in_flight.saturating_sub(1);
        let Completion { key, seq, result } = completion;

        let newest = self.latest.get(&key).copied().unwrap_or(seq);
        let status = if seq < newest {
            log::debug!("discarding stale completion for {key} (seq {seq} < {newest})");
            SaveStatus::Stale
        } else {
            match result {
                Ok(()) => SaveStatus::Saved,
                Err(source) => {
                    log::warn!("saving {key} failed: {source}");
                    SaveStatus::Failed(SaveError::Transport {
                        key: key.clone(),
                        source,
                    })
                }
            }
        };
        if seq >= newest {
            self.latest.remove(&key);
        }
        SyncOutcome { key, seq, status }
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop.
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Copy of the graph with plain link endpoints and no layout data.
pub fn sanitize(graph: &GraphData) -> GraphData {
    GraphData::new(
        graph.nodes.iter().map(sanitize_node).collect(),
        graph.links.iter().map(sanitize_link).collect(),
    )
}

fn sanitize_node(node: &Node) -> Node {
    Node {
        layout: Default::default(),
        ..node.clone()
    }
}

fn sanitize_link(link: &Link) -> Link {
    let mut link = link.clone();
    link.normalize();
    link
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_state::sample_graph;
    use crate::memory_remote::MemoryTransport;
    use force_graph::DefaultNodeIdx;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_sanitize_strips_bindings_and_layout() {
        let mut graph = sample_graph();
        graph.links[0].source.bind(DefaultNodeIdx::new(3));
        graph.nodes[0].layout.pin = Some((1.0, 2.0));

        let clean = sanitize(&graph);
        assert!(clean.links.iter().all(Link::is_normalized));
        assert_eq!(clean.nodes[0].layout, Default::default());
        assert_eq!(clean.links[0].key(), graph.links[0].key());
    }

    #[test]
    fn test_save_full_round_trips_through_load() {
        let remote = Arc::new(MemoryTransport::new(GraphData::default()));
        let mut client = SyncClient::new(remote.clone());

        let mut store = GraphStore::from_graph(sample_graph());
        if let Some(layout) = store.layout_mut("Node A") {
            layout.position = Some((3.0, 4.0));
        }
        client.save_full(&store).unwrap();
        let outcomes = client.wait_idle(WAIT);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, SaveStatus::Saved);

        let loaded = client.load().unwrap();
        assert_eq!(loaded.nodes.len(), store.nodes().len());
        for (a, b) in loaded.nodes.iter().zip(store.nodes()) {
            assert!(a.same_attributes(b));
        }
        assert_eq!(loaded.links, sanitize(store.graph()).links);
    }

    #[test]
    fn test_save_full_rejects_inconsistent_graph() {
        let remote = Arc::new(MemoryTransport::new(GraphData::default()));
        let mut client = SyncClient::new(remote.clone());
        let mut graph = sample_graph();
        graph.links.push(Link::new("Node A", "ghost", 1.0));

        let store = GraphStore::from_graph(graph);
        assert!(matches!(
            client.save_full(&store),
            Err(SaveError::Invalid(IntegrityError::DanglingEndpoint { .. }))
        ));
        assert_eq!(client.in_flight(), 0);
        assert!(remote.requests().is_empty());
    }

    #[test]
    fn test_overtaken_completion_is_stale() {
        let remote = Arc::new(MemoryTransport::new(sample_graph()));
        let mut client = SyncClient::new(remote.clone());

        let mut node = Node::new("Node A", 1, 1);
        let first = client.save_node(&node).unwrap();
        node.group = 4;
        let second = client.save_node(&node).unwrap();
        client.save_link(&Link::new("Node A", "Node C", 9.0)).unwrap();

        let mut outcomes = client.wait_idle(WAIT);
        outcomes.sort_by_key(|o| o.seq);
        assert_eq!(outcomes.len(), 3);
        assert_eq!((outcomes[0].seq, &outcomes[0].status), (first, &SaveStatus::Stale));
        assert_eq!((outcomes[1].seq, &outcomes[1].status), (second, &SaveStatus::Saved));
        assert_eq!(outcomes[2].status, SaveStatus::Saved);
        assert_eq!(client.in_flight(), 0);
    }

    #[test]
    fn test_failed_save_is_reported() {
        let remote = Arc::new(MemoryTransport::new(sample_graph()));
        remote.fail_submits(true);
        let mut client = SyncClient::new(remote.clone());

        client.add_link(&Link::new("Node E", "Node F", 1.0)).unwrap();
        let outcomes = client.wait_idle(WAIT);
        assert!(matches!(
            &outcomes[0].status,
            SaveStatus::Failed(SaveError::Transport { key: EntityKey::Link(s, t), .. })
                if s == "Node E" && t == "Node F"
        ));
    }

    #[test]
    fn test_load_failure_is_load_error() {
        let remote = Arc::new(MemoryTransport::new(sample_graph()));
        remote.fail_loads(true);
        let client = SyncClient::new(remote);
        assert!(matches!(client.load(), Err(LoadError::Transport(_))));
    }

    #[test]
    fn test_http_transport_rejects_bad_base_url() {
        let endpoints = Endpoints {
            base_url: "not a url".into(),
            ..Endpoints::default()
        };
        assert!(matches!(
            HttpTransport::new(endpoints, Duration::from_secs(1)),
            Err(TransportError::InvalidUrl { .. })
        ));
    }
}
