use crate::actions::Action;
use crate::graph_state::NodeId;
use crate::store::GraphStore;
use std::time::{SystemTime, UNIX_EPOCH};

/// Weight given to links created by gesture.
pub const DEFAULT_LINK_WEIGHT: f64 = 1.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        meta: false,
        alt: false,
    };

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::NONE
        }
    }

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::NONE
        }
    }

    pub fn meta() -> Self {
        Self {
            meta: true,
            ..Self::NONE
        }
    }
}

/// Two-click link creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LinkDraft {
    #[default]
    Idle,
    Pending { source: NodeId },
}

/// Turns pointer input into actions.
#[derive(Debug, Default)]
pub struct GestureController {
    draft: LinkDraft,
    last_stamp: u64,
}

impl GestureController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &LinkDraft {
        &self.draft
    }

    pub fn pending_source(&self) -> Option<&str> {
        match &self.draft {
            LinkDraft::Idle => None,
            LinkDraft::Pending { source } => Some(source),
        }
    }

    /// Dispatch table, first match wins: shift grows a child, ctrl or
    /// meta drives the link draft, a plain click opens the editor.
    pub fn on_node_click(
        &mut self,
        store: &GraphStore,
        id: &str,
        modifiers: Modifiers,
    ) -> Vec<Action> {
        if !store.contains(id) {
            log::warn!("click on unknown node {id:?} ignored");
            return vec![];
        }

        if modifiers.shift {
            let child = self.fresh_id(store);
            return vec![Action::GrowNode {
                parent: id.to_string(),
                child,
            }];
        }

        if modifiers.ctrl || modifiers.meta {
            return self.advance_draft(store, id);
        }

        vec![Action::OpenNodeEditor { id: id.to_string() }]
    }

    pub fn on_link_click(&mut self, source: &str, target: &str) -> Vec<Action> {
        vec![Action::OpenLinkEditor {
            source: source.to_string(),
            target: target.to_string(),
        }]
    }

    /// Clicking empty canvas drops a pending link source.
    pub fn on_canvas_click(&mut self) -> Vec<Action> {
        if let LinkDraft::Pending { source } = &self.draft {
            log::debug!("link draft from {source:?} cancelled");
        }
        self.draft = LinkDraft::Idle;
        vec![]
    }

    pub fn drag_start(&self, id: &str, x: f64, y: f64) -> Action {
        Action::DragStart {
            id: id.to_string(),
            x,
            y,
        }
    }

    pub fn drag_move(&self, x: f64, y: f64) -> Action {
        Action::DragMove { x, y }
    }

    pub fn drag_end(&self) -> Action {
        Action::DragEnd
    }

    pub fn resize(&self, width: f64, height: f64) -> Action {
        Action::Resize { width, height }
    }

    pub fn relayout(&self) -> Action {
        Action::Relayout
    }

    /// Follow a rename of the pending link source.
    pub fn on_rename(&mut self, old: &str, new: &str) {
        if let LinkDraft::Pending { source } = &mut self.draft
            && source == old
        {
            *source = new.to_string();
        }
    }

    /// Drop a pending source that is no longer in the store.
    pub fn forget_missing(&mut self, store: &GraphStore) {
        if let LinkDraft::Pending { source } = &self.draft
            && !store.contains(source)
        {
            log::debug!("link draft from {source:?} dropped");
            self.draft = LinkDraft::Idle;
        }
    }

    fn advance_draft(&mut self, store: &GraphStore, id: &str) -> Vec<Action> {
        match std::mem::take(&mut self.draft) {
            LinkDraft::Idle => {
                self.draft = LinkDraft::Pending {
                    source: id.to_string(),
                };
                vec![]
            }
            LinkDraft::Pending { source } if source == id => vec![],
            LinkDraft::Pending { source } => {
                if store.has_link(&source, id) {
                    log::warn!("link {source:?} -> {id:?} already exists");
                    return vec![];
                }
                vec![Action::AddLink {
                    source,
                    target: id.to_string(),
                    weight: DEFAULT_LINK_WEIGHT,
                }]
            }
        }
    }

    /// `node-<millis>`, strictly increasing per controller and suffixed
    /// until it is free in the store.
    fn fresh_id(&mut self, store: &GraphStore) -> NodeId {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        self.last_stamp = now.max(self.last_stamp + 1);

        let base = format!("node-{}", self.last_stamp);
        let mut id = base.clone();
        let mut suffix = 1;
        while store.contains(&id) {
            id = format!("{base}-{suffix}");
            suffix += 1;
        }
        id
    }
}
