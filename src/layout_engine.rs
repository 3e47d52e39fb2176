//! Physics relaxation on top of the layered placement.
//!
//! `force_graph` integrates charge repulsion and its base spring. After
//! each integration step the engine applies two corrections of its own:
//! linked nodes are nudged towards the configured rest length, and every
//! free node is pulled towards its placed target. Both scale with the
//! current energy, so motion dies out as the engine settles.

use crate::frame::Frame;
use crate::graph_state::NodeId;
use crate::layout_settings::SimulationSettings;
use crate::store::GraphStore;
use force_graph::{
    DefaultNodeIdx, EdgeData, ForceGraph, NodeData, SimulationParameters,
};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutPhase {
    /// Nothing bound yet.
    Cold,
    /// Energy decaying inside the settle window.
    Settling,
    /// Energy zero; ticks leave positions untouched.
    Frozen,
    /// A node follows the pointer; energy held at the drag level.
    Dragging { node: NodeId },
}

struct Spring {
    source: DefaultNodeIdx,
    target: DefaultNodeIdx,
    strength: f64,
}

pub struct LayoutEngine {
    settings: SimulationSettings,
    graph: ForceGraph<NodeId, ()>,
    handles: HashMap<NodeId, DefaultNodeIdx>,
    springs: Vec<Spring>,
    targets: HashMap<DefaultNodeIdx, (f64, f64)>,
    positions: HashMap<DefaultNodeIdx, (f64, f64)>,
    phase: LayoutPhase,
    energy: f64,
    settled_for: Duration,
}

fn parameters(settings: &SimulationSettings) -> SimulationParameters {
    SimulationParameters {
        force_charge: settings.force_charge,
        force_spring: settings.force_spring,
        force_max: settings.force_max,
        node_speed: settings.node_speed,
        damping_factor: settings.damping_factor,
    }
}

impl LayoutEngine {
    pub fn new(settings: SimulationSettings) -> Self {
        Self {
            graph: ForceGraph::new(parameters(&settings)),
            settings,
            handles: HashMap::new(),
            springs: Vec::new(),
            targets: HashMap::new(),
            positions: HashMap::new(),
            phase: LayoutPhase::Cold,
            energy: 0.0,
            settled_for: Duration::ZERO,
        }
    }

    pub fn phase(&self) -> &LayoutPhase {
        &self.phase
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub fn handle(&self, id: &str) -> Option<DefaultNodeIdx> {
        self.handles.get(id).copied()
    }

    pub fn is_settling(&self) -> bool {
        self.phase == LayoutPhase::Settling
    }

    /// First arm after a load.
    pub fn start(&mut self, store: &mut GraphStore) {
        self.rearm(store);
    }

    /// Rebuild the physics graph from the store, bind every link
    /// endpoint to its node handle and open a fresh settle window.
    ///
    /// Nodes start from their current position; pinned nodes become
    /// anchors. An ongoing drag survives the rebuild if its node does.
    pub fn rearm(&mut self, store: &mut GraphStore) {
        let mut graph = ForceGraph::new(parameters(&self.settings));
        let mut handles = HashMap::with_capacity(store.nodes().len());
        let mut targets = HashMap::with_capacity(store.nodes().len());

        for node in store.nodes() {
            let (x, y) = node.layout.current();
            let idx = graph.add_node(NodeData {
                x: x as f32,
                y: y as f32,
                mass: self.settings.node_mass,
                is_anchor: node.layout.pin.is_some(),
                user_data: node.id.clone(),
            });
            handles.insert(node.id.clone(), idx);
            targets.insert(idx, node.layout.target);
        }

        let mut degree: HashMap<DefaultNodeIdx, usize> = HashMap::new();
        let mut pairs = Vec::new();
        for link in store.links() {
            let (source, target) = link.key();
            if let (Some(&a), Some(&b)) = (handles.get(source), handles.get(target)) {
                if a == b {
                    continue;
                }
                graph.add_edge(a, b, EdgeData::default());
                *degree.entry(a).or_default() += 1;
                *degree.entry(b).or_default() += 1;
                pairs.push((a, b));
            }
        }
        self.springs = pairs
            .into_iter()
            .map(|(source, target)| {
                let shared = degree[&source].min(degree[&target]).max(1);
                Spring {
                    source,
                    target,
                    strength: 1.0 / shared as f64,
                }
            })
            .collect();

        let bound = store.bind_links(&handles);
        self.graph = graph;
        self.handles = handles;
        self.targets = targets;
        self.positions.clear();
        self.settled_for = Duration::ZERO;

        let dragging = match &self.phase {
            LayoutPhase::Dragging { node } => self.handles.contains_key(node),
            _ => false,
        };
        if dragging {
            self.energy = self.settings.drag_energy;
        } else {
            self.phase = LayoutPhase::Settling;
            self.energy = 1.0;
        }
        self.capture_positions();

        log::debug!(
            "layout armed: {} nodes, {} springs, {bound} bound links",
            self.handles.len(),
            self.springs.len()
        );
    }

    /// Advance the simulation by `dt`, write positions back into the
    /// store and return the resulting frame.
    pub fn tick(
        &mut self,
        store: &mut GraphStore,
        dt: Duration,
        highlighted: Option<&str>,
    ) -> Frame {
        match self.phase {
            LayoutPhase::Settling => {
                self.step(dt);
                self.settled_for += dt;
                self.energy *= 1.0 - self.settings.energy_decay;
                if self.settled_for >= self.settings.settle_window()
                    || self.energy < self.settings.min_energy
                {
                    self.freeze();
                }
            }
            LayoutPhase::Dragging { .. } => {
                self.energy = self.settings.drag_energy;
                self.step(dt);
            }
            LayoutPhase::Cold | LayoutPhase::Frozen => {}
        }
        self.write_back(store);
        self.frame(store, highlighted)
    }

    /// Frame of the current positions without stepping.
    pub fn frame(&self, store: &GraphStore, highlighted: Option<&str>) -> Frame {
        Frame::build(
            store,
            |endpoint| {
                endpoint
                    .handle()
                    .and_then(|handle| self.positions.get(&handle).copied())
            },
            highlighted,
        )
    }

    pub fn drag_start(
        &mut self,
        store: &mut GraphStore,
        id: &str,
        x: f64,
        y: f64,
    ) -> bool {
        if self.phase == LayoutPhase::Cold {
            return false;
        }
        let Some(handle) = self.handle(id) else {
            log::warn!("drag on unknown node {id:?} ignored");
            return false;
        };
        self.phase = LayoutPhase::Dragging {
            node: id.to_string(),
        };
        self.energy = self.settings.drag_energy;
        self.pin(store, id, handle, (x, y));
        true
    }

    pub fn drag_move(&mut self, store: &mut GraphStore, x: f64, y: f64) -> bool {
        let LayoutPhase::Dragging { node } = &self.phase else {
            return false;
        };
        let id = node.clone();
        match self.handle(&id) {
            Some(handle) => {
                self.pin(store, &id, handle, (x, y));
                true
            }
            None => false,
        }
    }

    /// Release the dragged node where it was dropped. The pin stays.
    pub fn drag_end(&mut self) -> bool {
        if !matches!(self.phase, LayoutPhase::Dragging { .. }) {
            return false;
        }
        self.freeze();
        true
    }

    fn freeze(&mut self) {
        self.phase = LayoutPhase::Frozen;
        self.energy = 0.0;
        log::debug!("layout frozen after {:?}", self.settled_for);
    }

    fn pin(
        &mut self,
        store: &mut GraphStore,
        id: &str,
        handle: DefaultNodeIdx,
        (x, y): (f64, f64),
    ) {
        if let Some(layout) = store.layout_mut(id) {
            layout.pin = Some((x, y));
            layout.position = Some((x, y));
        }
        self.graph.visit_nodes_mut(|node| {
            if node.index() == handle {
                node.data.x = x as f32;
                node.data.y = y as f32;
                node.data.is_anchor = true;
            }
        });
        self.positions.insert(handle, (x, y));
    }

    fn step(&mut self, dt: Duration) {
        let seconds = dt.as_secs_f32();
        if seconds <= 0.0 || self.energy <= 0.0 {
            return;
        }
        self.graph.update(seconds * self.energy as f32);
        self.apply_constraints();
    }

    fn apply_constraints(&mut self) {
        let mut positions: HashMap<DefaultNodeIdx, (f64, f64)> = HashMap::new();
        let mut anchored: HashSet<DefaultNodeIdx> = HashSet::new();
        self.graph.visit_nodes(|node| {
            positions.insert(node.index(), (node.x() as f64, node.y() as f64));
            if node.data.is_anchor {
                anchored.insert(node.index());
            }
        });

        let rest = self.settings.link_distance;
        for spring in &self.springs {
            let (Some(&(ax, ay)), Some(&(bx, by))) =
                (positions.get(&spring.source), positions.get(&spring.target))
            else {
                continue;
            };
            let (dx, dy) = (bx - ax, by - ay);
            let length = (dx * dx + dy * dy).sqrt();
            if length < f64::EPSILON {
                continue;
            }
            let k = (length - rest) / length * self.energy * spring.strength * 0.5;
            let (cx, cy) = (dx * k, dy * k);
            if !anchored.contains(&spring.source)
                && let Some(p) = positions.get_mut(&spring.source)
            {
                p.0 += cx;
                p.1 += cy;
            }
            if !anchored.contains(&spring.target)
                && let Some(p) = positions.get_mut(&spring.target)
            {
                p.0 -= cx;
                p.1 -= cy;
            }
        }

        let pull = (self.settings.target_strength * self.energy).min(1.0);
        for (idx, p) in positions.iter_mut() {
            if anchored.contains(idx) {
                continue;
            }
            if let Some(&(tx, ty)) = self.targets.get(idx) {
                if !(p.0.is_finite() && p.1.is_finite()) {
                    *p = (tx, ty);
                    continue;
                }
                p.0 += (tx - p.0) * pull;
                p.1 += (ty - p.1) * pull;
            }
        }

        self.graph.visit_nodes_mut(|node| {
            if node.data.is_anchor {
                return;
            }
            if let Some(&(x, y)) = positions.get(&node.index()) {
                node.data.x = x as f32;
                node.data.y = y as f32;
            }
        });
    }

    fn capture_positions(&mut self) {
        let positions = &mut self.positions;
        self.graph.visit_nodes(|node| {
            positions.insert(node.index(), (node.x() as f64, node.y() as f64));
        });
    }

    fn write_back(&mut self, store: &mut GraphStore) {
        if self.phase == LayoutPhase::Cold {
            return;
        }
        self.capture_positions();
        for (id, layout) in store.layouts_mut() {
            if let Some(pin) = layout.pin {
                layout.position = Some(pin);
                continue;
            }
            let position = self
                .handles
                .get(id)
                .and_then(|handle| self.positions.get(handle));
            if let Some(&p) = position {
                layout.position = Some(p);
            }
        }
    }
}
