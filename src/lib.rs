pub mod actions;
pub mod config;
pub mod editor;
pub mod effects;
pub mod frame;
pub mod gesture;
pub mod graph_state;
pub mod layout_engine;
pub mod layout_layered;
pub mod layout_settings;
pub mod memory_remote;
pub mod state;
pub mod store;
pub mod sync;
pub mod versioned;

pub use actions::Action;
pub use config::{EditorConfig, load_config};
pub use frame::Frame;
pub use gesture::Modifiers;
pub use graph_state::{
    GraphData, Link, Node, NodeId, generate_layered_graph, sample_graph,
};
pub use state::State;
