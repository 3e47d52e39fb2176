use crate::editor::NodeField;
use crate::effects::Effect;
use crate::graph_state::{Link, Node, NodeId};
use crate::layout_layered::Placement;
use crate::layout_settings::Viewport;
use crate::state::Workspace;

/// Actions that can be dispatched to modify the editor state
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // Graph Structure Actions
    /// Add `child` one layer below `parent`, linked from it
    GrowNode { parent: NodeId, child: NodeId },
    /// Add a link between two existing nodes
    AddLink {
        source: NodeId,
        target: NodeId,
        weight: f64,
    },

    // Node Editor Actions
    OpenNodeEditor { id: NodeId },
    SetNodeField { field: NodeField, text: String },
    CommitNodeEditor,
    CancelNodeEditor,

    // Link Editor Actions
    OpenLinkEditor { source: NodeId, target: NodeId },
    SetLinkWeight { text: String },
    CommitLinkEditor,
    CancelLinkEditor,

    // Layout Actions
    DragStart { id: NodeId, x: f64, y: f64 },
    DragMove { x: f64, y: f64 },
    DragEnd,
    /// Viewport changed; targets are re-aimed, positions kept
    Resize { width: f64, height: f64 },
    /// Snap every node back to its target and release all pins
    Relayout,

    // Persistence Actions
    /// Save the whole graph
    SaveAll,
    /// Replace the local graph with the remote one
    Reload,
    ClearWarnings,
}

/// Apply a single action to the workspace
pub fn update(workspace: &mut Workspace, action: Action) -> Vec<Effect> {
    match action {
        // Graph Structure Actions
        Action::GrowNode { parent, child } => {
            let Some((group, parent_layer)) =
                workspace.store.node(&parent).map(|n| (n.group, n.layer))
            else {
                workspace.warn(format!("cannot grow from unknown node {parent:?}"));
                return vec![];
            };
            let Some(layer) = parent_layer.checked_add(1) else {
                workspace.warn(format!(
                    "cannot grow below {parent:?}: layer {parent_layer} is the last"
                ));
                return vec![];
            };
            let node = Node::new(child, group, layer);
            let link = Link::new(parent.as_str(), node.id.as_str(), 1.0);

            if let Err(e) = workspace.store.add_node(node.clone()) {
                workspace.warn(e.to_string());
                return vec![];
            }
            if let Err(e) = workspace.store.add_link(link.clone()) {
                workspace.warn(e.to_string());
                return vec![];
            }
            workspace.request_layout(Placement::Reaim);
            vec![Effect::PersistAddNode { node, link }]
        }
        Action::AddLink {
            source,
            target,
            weight,
        } => {
            let link = Link::new(source, target, weight);
            match workspace.store.add_link(link.clone()) {
                Ok(()) => {
                    workspace.request_layout(Placement::Reaim);
                    vec![Effect::PersistAddLink { link }]
                }
                Err(e) => {
                    workspace.warn(e.to_string());
                    vec![]
                }
            }
        }

        // Node Editor Actions
        Action::OpenNodeEditor { id } => {
            workspace.form_error =
                workspace.editors.open_node(&workspace.store, &id).err();
            vec![]
        }
        Action::SetNodeField { field, text } => {
            workspace.form_error =
                workspace.editors.set_node_field(field, text).err();
            vec![]
        }
        Action::CommitNodeEditor => {
            match workspace.editors.commit_node(&mut workspace.store) {
                Ok(commit) => {
                    workspace.form_error = None;
                    workspace.request_layout(Placement::Reaim);
                    // The node endpoint addresses nodes by id, so a
                    // rename can only reach the store as a full save.
                    if commit.renamed() {
                        workspace.record_rename(commit.previous_id, commit.node.id);
                        vec![Effect::PersistGraph]
                    } else {
                        vec![Effect::PersistNode { node: commit.node }]
                    }
                }
                Err(e) => {
                    workspace.form_error = Some(e);
                    vec![]
                }
            }
        }
        Action::CancelNodeEditor => {
            workspace.editors.cancel_node();
            workspace.form_error = None;
            vec![]
        }

        // Link Editor Actions
        Action::OpenLinkEditor { source, target } => {
            workspace.form_error = workspace
                .editors
                .open_link(&workspace.store, &source, &target)
                .err();
            vec![]
        }
        Action::SetLinkWeight { text } => {
            workspace.form_error = workspace.editors.set_link_weight(text).err();
            vec![]
        }
        Action::CommitLinkEditor => {
            match workspace.editors.commit_link(&mut workspace.store) {
                Ok(link) => {
                    workspace.form_error = None;
                    vec![Effect::PersistLink { link }]
                }
                Err(e) => {
                    workspace.form_error = Some(e);
                    vec![]
                }
            }
        }
        Action::CancelLinkEditor => {
            workspace.editors.cancel_link();
            workspace.form_error = None;
            vec![]
        }

        // Layout Actions
        Action::DragStart { id, x, y } => {
            workspace.engine.drag_start(&mut workspace.store, &id, x, y);
            vec![]
        }
        Action::DragMove { x, y } => {
            workspace.engine.drag_move(&mut workspace.store, x, y);
            vec![]
        }
        Action::DragEnd => {
            workspace.engine.drag_end();
            vec![]
        }
        Action::Resize { width, height } => {
            workspace.layout.viewport =
                Viewport::new(width.max(0.0), height.max(0.0));
            workspace.request_layout(Placement::Reaim);
            vec![]
        }
        Action::Relayout => {
            log::info!("relayout requested");
            workspace.request_layout(Placement::Reset);
            vec![]
        }

        // Persistence Actions
        Action::SaveAll => {
            if workspace.load_failed {
                workspace.warn("nothing to save: the graph never loaded".into());
                return vec![];
            }
            vec![Effect::PersistGraph]
        }
        Action::Reload => vec![Effect::LoadGraph],
        Action::ClearWarnings => {
            workspace.warnings.clear();
            vec![]
        }
    }
}
