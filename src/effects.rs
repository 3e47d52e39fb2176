use crate::graph_state::{GraphData, Link, Node};
use crate::layout_layered::Placement;
use crate::state::Workspace;
use crate::sync::SyncClient;

/// Deferred effects that must run outside the main reducer (network IO)
#[derive(Debug, Clone)]
pub enum Effect {
    /// Save the whole graph
    PersistGraph,
    /// Save one node's attributes
    PersistNode { node: Node },
    /// Save one link's weight
    PersistLink { link: Link },
    /// Submit a grown node together with its parent link
    PersistAddNode { node: Node, link: Link },
    /// Submit a newly drafted link
    PersistAddLink { link: Link },
    /// Fetch the remote graph and replace the local one
    LoadGraph,
}

/// Execute a single effect. Saves are queued on the sync worker; their
/// outcome arrives later through [`SyncClient::poll`].
pub fn run(workspace: &mut Workspace, sync: &mut SyncClient, effect: Effect) {
    let queued = match effect {
        Effect::PersistGraph => sync.save_full(&workspace.store),
        Effect::PersistNode { node } => sync.save_node(&node),
        Effect::PersistLink { link } => sync.save_link(&link),
        Effect::PersistAddNode { node, link } => sync.add_node(&node, &link),
        Effect::PersistAddLink { link } => sync.add_link(&link),
        Effect::LoadGraph => {
            load(workspace, sync);
            return;
        }
    };
    if let Err(e) = queued {
        workspace.warn(e.to_string());
    }
}

fn load(workspace: &mut Workspace, sync: &SyncClient) {
    workspace.editors = Default::default();
    workspace.form_error = None;
    match sync.load() {
        Ok(graph) => {
            workspace.store.replace(graph);
            workspace.load_failed = false;
        }
        Err(e) => {
            workspace.store.replace(GraphData::default());
            workspace.load_failed = true;
            workspace.warn(e.to_string());
        }
    }
    workspace.request_layout(Placement::Reset);
}
