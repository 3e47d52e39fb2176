use layered_graph::editor::NodeField;
use layered_graph::gesture::LinkDraft;
use layered_graph::layout_engine::LayoutPhase;
use layered_graph::layout_settings::LayoutSettings;
use layered_graph::memory_remote::MemoryTransport;
use layered_graph::sync::SyncRequest;
use layered_graph::{Action, GraphData, Link, Modifiers, Node, State, sample_graph};
use std::sync::Arc;
use std::time::Duration;

const DT: Duration = Duration::from_millis(16);
const SYNC_TIMEOUT: Duration = Duration::from_secs(5);

fn open(graph: GraphData) -> (State, Arc<MemoryTransport>) {
    let remote = Arc::new(MemoryTransport::new(graph));
    let mut state = State::new(LayoutSettings::default(), remote.clone());
    state.load();
    (state, remote)
}

fn two_nodes() -> GraphData {
    GraphData::new(
        vec![Node::new("A", 1, 1), Node::new("B", 1, 2)],
        vec![Link::new("A", "B", 2.0)],
    )
}

fn mean_x(state: &State) -> f64 {
    let frame = state.frame();
    frame.nodes.iter().map(|n| n.x).sum::<f64>() / frame.nodes.len() as f64
}

#[test]
fn test_rename_keeps_links_and_saves_whole_graph() {
    let (mut state, remote) = open(two_nodes());

    state.node_click("A", Modifiers::NONE);
    state.dispatch(Action::SetNodeField {
        field: NodeField::Id,
        text: "A2".into(),
    });
    state.dispatch(Action::CommitNodeEditor);
    state.turn();

    let frame = state.frame();
    assert!(frame.node("A").is_none());
    assert!(frame.node("A2").is_some());
    let link = frame.link("A2", "B").expect("link follows the rename");
    assert_eq!(link.weight, 2.0);
    assert_eq!(link.label, "2");

    state.wait_for_sync(SYNC_TIMEOUT);
    assert!(state.warnings().is_empty());
    assert!(matches!(
        remote.requests().last(),
        Some(SyncRequest::SaveGraph(_))
    ));
    let saved = remote.graph();
    assert!(saved.node("A2").is_some());
    assert!(saved.links.iter().any(|l| l.connects("A2", "B")));
}

#[test]
fn test_shift_click_grows_next_layer() {
    let (mut state, remote) = open(two_nodes());

    state.node_click("A", Modifiers::shift());
    state.node_click("A", Modifiers::shift());

    let grown: Vec<&Node> = state
        .store()
        .nodes()
        .iter()
        .filter(|n| n.id != "A" && n.id != "B")
        .collect();
    assert_eq!(grown.len(), 2);
    assert_ne!(grown[0].id, grown[1].id);
    for node in &grown {
        assert_eq!((node.group, node.layer), (1, 2));
        assert!(node.id.starts_with("node-"));
        let link = state.store().find_link("A", &node.id).unwrap();
        assert_eq!(link.weight, 1.0);
    }
    assert_eq!(state.workspace.engine.phase(), &LayoutPhase::Settling);

    state.wait_for_sync(SYNC_TIMEOUT);
    assert_eq!(remote.graph().nodes.len(), 4);
}

#[test]
fn test_ctrl_clicks_draft_a_link() {
    let (mut state, remote) = open(sample_graph());

    state.node_click("Node A", Modifiers::ctrl());
    assert!(state.frame().node("Node A").unwrap().highlighted);
    state.node_click("Node B", Modifiers::meta());

    let link = state.store().find_link("Node A", "Node B").unwrap();
    assert_eq!(link.weight, 1.0);
    assert_eq!(state.gestures.draft(), &LinkDraft::Idle);
    assert!(!state.frame().node("Node A").unwrap().highlighted);

    state.node_click("Node A", Modifiers::ctrl());
    assert_eq!(state.gestures.pending_source(), Some("Node A"));
    assert_eq!(state.store().links().len(), 8);
    assert!(!state.store().has_link("Node A", "Node A"));

    state.wait_for_sync(SYNC_TIMEOUT);
    assert!(remote.graph().links.iter().any(|l| l.connects("Node A", "Node B")));
}

#[test]
fn test_rename_carries_pending_link_source() {
    let (mut state, remote) = open(two_nodes());

    state.node_click("B", Modifiers::ctrl());
    state.node_click("B", Modifiers::NONE);
    state.dispatch(Action::SetNodeField {
        field: NodeField::Id,
        text: "B2".into(),
    });
    state.dispatch(Action::CommitNodeEditor);
    state.turn();
    assert_eq!(state.gestures.pending_source(), Some("B2"));
    assert!(state.frame().node("B2").unwrap().highlighted);

    state.node_click("A", Modifiers::ctrl());
    assert!(state.store().has_link("B2", "A"));
    assert_eq!(state.gestures.draft(), &LinkDraft::Idle);

    state.wait_for_sync(SYNC_TIMEOUT);
    assert!(state.warnings().is_empty());
    assert!(remote.graph().links.iter().any(|l| l.connects("B2", "A")));
}

#[test]
fn test_ctrl_click_same_node_twice_cancels_draft() {
    let (mut state, remote) = open(sample_graph());

    state.node_click("Node A", Modifiers::ctrl());
    state.node_click("Node A", Modifiers::ctrl());

    assert_eq!(state.gestures.draft(), &LinkDraft::Idle);
    assert_eq!(state.store().links().len(), 7);
    assert!(remote.requests().is_empty());

    state.node_click("Node C", Modifiers::ctrl());
    state.canvas_click();
    assert_eq!(state.gestures.draft(), &LinkDraft::Idle);
}

#[test]
fn test_resize_narrows_layout_and_resettles() {
    let (mut state, _) = open(sample_graph());
    state.resize(800.0, 600.0);
    state.settle(DT, 5_000);
    assert_eq!(state.workspace.engine.phase(), &LayoutPhase::Frozen);
    let wide = mean_x(&state);

    state.resize(400.0, 600.0);
    assert_eq!(state.workspace.engine.phase(), &LayoutPhase::Settling);
    for node in state.store().nodes() {
        let (x, _) = node.layout.target;
        assert!((60.0..=340.0).contains(&x), "{} aimed at {x}", node.id);
    }

    state.settle(DT, 5_000);
    assert_eq!(state.workspace.engine.phase(), &LayoutPhase::Frozen);
    assert!(mean_x(&state) < wide);
    assert_eq!(state.frame().nodes.len(), 6);
    assert_eq!(state.frame().links.len(), 7);
}

#[test]
fn test_failed_save_keeps_local_change() {
    let (mut state, remote) = open(two_nodes());
    remote.fail_submits(true);

    state.link_click("A", "B");
    state.dispatch(Action::SetLinkWeight { text: "0.5".into() });
    state.dispatch(Action::CommitLinkEditor);
    state.turn();
    state.wait_for_sync(SYNC_TIMEOUT);

    assert_eq!(state.warnings().len(), 1);
    assert_eq!(state.store().find_link("A", "B").unwrap().weight, 0.5);
    assert_eq!(state.frame().link("A", "B").unwrap().label, "0.5");
    assert_eq!(remote.graph().links[0].weight, 2.0);
}

#[test]
fn test_failed_load_blocks_editing_until_reload() {
    let remote = Arc::new(MemoryTransport::new(sample_graph()));
    remote.fail_loads(true);
    let mut state = State::new(LayoutSettings::default(), remote.clone());
    state.load();

    assert!(state.load_failed());
    assert!(state.frame().nodes.is_empty());
    state.save_all();
    assert!(remote.requests().is_empty());

    remote.fail_loads(false);
    state.load();
    assert!(!state.load_failed());
    assert_eq!(state.frame().nodes.len(), 6);
}

#[test]
fn test_save_all_then_reload_round_trips() {
    let (mut state, remote) = open(sample_graph());
    state.settle(DT, 5_000);
    state.node_click("Node F", Modifiers::shift());
    state.save_all();
    state.wait_for_sync(SYNC_TIMEOUT);
    assert!(state.warnings().is_empty());

    let before: Vec<(String, u32, u32)> = state
        .store()
        .nodes()
        .iter()
        .map(|n| (n.id.clone(), n.group, n.layer))
        .collect();

    state.load();
    let after: Vec<(String, u32, u32)> = state
        .store()
        .nodes()
        .iter()
        .map(|n| (n.id.clone(), n.group, n.layer))
        .collect();
    assert_eq!(before, after);
    assert_eq!(state.store().links().len(), 8);
    assert_eq!(remote.graph().nodes.len(), 7);
}
