use crate::actions::{self, Action};
use crate::editor::{EditorSession, ValidationError};
use crate::effects::{self, Effect};
use crate::frame::Frame;
use crate::gesture::{GestureController, Modifiers};
use crate::graph_state::NodeId;
use crate::layout_engine::LayoutEngine;
use crate::layout_layered::{self, Placement};
use crate::layout_settings::LayoutSettings;
use crate::store::GraphStore;
use crate::sync::{SaveStatus, SyncClient, Transport};
use std::sync::Arc;
use std::time::Duration;

/// Everything the reducer may touch.
pub struct Workspace {
    pub store: GraphStore,
    pub engine: LayoutEngine,
    pub editors: EditorSession,
    pub layout: LayoutSettings,
    /// Last validation failure of an open form.
    pub form_error: Option<ValidationError>,
    /// Non-blocking problems for the user, oldest first.
    pub warnings: Vec<String>,
    /// The last load failed; the graph is empty until a reload succeeds.
    pub load_failed: bool,
    layout_request: Option<Placement>,
    armed_revision: Option<u64>,
    renames: Vec<(NodeId, NodeId)>,
}

impl Workspace {
    pub fn new(layout: LayoutSettings) -> Self {
        Self {
            store: GraphStore::new(),
            engine: LayoutEngine::new(layout.simulation),
            editors: EditorSession::new(),
            layout,
            form_error: None,
            warnings: Vec::new(),
            load_failed: false,
            layout_request: None,
            armed_revision: None,
            renames: Vec::new(),
        }
    }

    /// Ask for placement before the next frame. `Reset` wins over
    /// `Reaim` when both are requested in one turn.
    pub fn request_layout(&mut self, placement: Placement) {
        self.layout_request = match (self.layout_request, placement) {
            (Some(Placement::Reset), _) | (_, Placement::Reset) => {
                Some(Placement::Reset)
            }
            _ => Some(Placement::Reaim),
        };
    }

    /// Remember a committed rename for state held outside the store.
    pub fn record_rename(&mut self, old: NodeId, new: NodeId) {
        self.renames.push((old, new));
    }

    pub fn take_renames(&mut self) -> Vec<(NodeId, NodeId)> {
        std::mem::take(&mut self.renames)
    }

    pub fn warn(&mut self, message: String) {
        log::warn!("{message}");
        self.warnings.push(message);
    }

    /// Re-place and re-arm when the graph changed since the last arm or
    /// a placement was requested.
    pub fn ensure_layout_fresh(&mut self) {
        let stale = self.armed_revision != Some(self.store.revision());
        let placement = match self.layout_request.take() {
            Some(placement) => placement,
            None if stale => Placement::Reaim,
            None => return,
        };
        layout_layered::place(
            &mut self.store,
            self.layout.viewport,
            &self.layout.margins,
            placement,
        );
        self.engine.rearm(&mut self.store);
        self.armed_revision = Some(self.store.revision());
    }
}

/// Top-level controller: owns the workspace, the gesture state and the
/// sync client, and runs the action and effect queues.
pub struct State {
    pub workspace: Workspace,
    pub gestures: GestureController,
    pub sync: SyncClient,
    action_queue: Vec<Action>,
    effect_queue: Vec<Effect>,
}

impl State {
    pub fn new(layout: LayoutSettings, transport: Arc<dyn Transport>) -> Self {
        Self {
            workspace: Workspace::new(layout),
            gestures: GestureController::new(),
            sync: SyncClient::new(transport),
            action_queue: Vec::new(),
            effect_queue: Vec::new(),
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.workspace.store
    }

    pub fn load_failed(&self) -> bool {
        self.workspace.load_failed
    }

    pub fn warnings(&self) -> &[String] {
        &self.workspace.warnings
    }

    pub fn dispatch(&mut self, action: Action) {
        self.action_queue.push(action);
    }

    pub fn flush_actions(&mut self) {
        let actions = std::mem::take(&mut self.action_queue);
        for action in actions {
            let mut effects = actions::update(&mut self.workspace, action);
            self.effect_queue.append(&mut effects);
        }
        for (old, new) in self.workspace.take_renames() {
            self.gestures.on_rename(&old, &new);
        }
        self.workspace.ensure_layout_fresh();
    }

    pub fn flush_effects(&mut self) {
        let effects = std::mem::take(&mut self.effect_queue);
        for effect in effects {
            effects::run(&mut self.workspace, &mut self.sync, effect);
        }
        self.workspace.ensure_layout_fresh();
    }

    /// Fold finished saves into the workspace. Failures become
    /// warnings; the local mutation stays.
    pub fn poll_sync(&mut self) {
        for outcome in self.sync.poll() {
            match outcome.status {
                SaveStatus::Saved => {
                    log::debug!("saved {} (seq {})", outcome.key, outcome.seq);
                }
                SaveStatus::Stale => {}
                SaveStatus::Failed(e) => {
                    self.workspace.warnings.push(e.to_string());
                }
            }
        }
    }

    /// Process everything queued so far, in order.
    pub fn turn(&mut self) {
        self.flush_actions();
        self.flush_effects();
        self.gestures.forget_missing(&self.workspace.store);
        self.poll_sync();
    }

    /// Fetch the remote graph and arm the layout.
    pub fn load(&mut self) {
        self.dispatch(Action::Reload);
        self.turn();
    }

    pub fn node_click(&mut self, id: &str, modifiers: Modifiers) {
        if !self.usable() {
            return;
        }
        let actions =
            self.gestures.on_node_click(&self.workspace.store, id, modifiers);
        self.dispatch_all(actions);
    }

    pub fn link_click(&mut self, source: &str, target: &str) {
        if !self.usable() {
            return;
        }
        let actions = self.gestures.on_link_click(source, target);
        self.dispatch_all(actions);
    }

    pub fn canvas_click(&mut self) {
        let actions = self.gestures.on_canvas_click();
        self.dispatch_all(actions);
    }

    pub fn drag_start(&mut self, id: &str, x: f64, y: f64) {
        if !self.usable() {
            return;
        }
        let action = self.gestures.drag_start(id, x, y);
        self.dispatch_all(vec![action]);
    }

    pub fn drag_move(&mut self, x: f64, y: f64) {
        let action = self.gestures.drag_move(x, y);
        self.dispatch_all(vec![action]);
    }

    pub fn drag_end(&mut self) {
        let action = self.gestures.drag_end();
        self.dispatch_all(vec![action]);
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        let action = self.gestures.resize(width, height);
        self.dispatch_all(vec![action]);
    }

    pub fn relayout(&mut self) {
        let action = self.gestures.relayout();
        self.dispatch_all(vec![action]);
    }

    pub fn save_all(&mut self) {
        if !self.usable() {
            return;
        }
        self.dispatch_all(vec![Action::SaveAll]);
    }

    /// Advance the layout by one step and return the frame to draw.
    pub fn tick(&mut self, dt: Duration) -> Frame {
        self.turn();
        self.workspace.engine.tick(
            &mut self.workspace.store,
            dt,
            self.gestures.pending_source(),
        )
    }

    /// Current frame without stepping.
    pub fn frame(&self) -> Frame {
        self.workspace
            .engine
            .frame(&self.workspace.store, self.gestures.pending_source())
    }

    /// Tick until the engine freezes or `max_steps` is reached. Returns
    /// the number of steps taken.
    pub fn settle(&mut self, dt: Duration, max_steps: usize) -> usize {
        let mut steps = 0;
        self.turn();
        while self.workspace.engine.is_settling() && steps < max_steps {
            self.tick(dt);
            steps += 1;
        }
        steps
    }

    /// Block until queued saves complete, folding their outcomes in.
    pub fn wait_for_sync(&mut self, timeout: Duration) {
        for outcome in self.sync.wait_idle(timeout) {
            if let SaveStatus::Failed(e) = outcome.status {
                self.workspace.warnings.push(e.to_string());
            }
        }
    }

    fn dispatch_all(&mut self, actions: Vec<Action>) {
        for action in actions {
            self.dispatch(action);
        }
        self.turn();
    }

    fn usable(&self) -> bool {
        if self.workspace.load_failed {
            log::warn!("graph is not loaded; gesture ignored");
            return false;
        }
        true
    }
}
