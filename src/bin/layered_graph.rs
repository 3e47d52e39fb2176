use bpaf::Bpaf;
use layered_graph::config::ConfigError;
use layered_graph::memory_remote::MemoryTransport;
use layered_graph::sync::{HttpTransport, Transport, TransportError};
use layered_graph::{EditorConfig, State, generate_layered_graph, load_config};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Load a layered graph, settle its layout and print the resulting frame
/// as JSON.
#[derive(Debug, Clone, Bpaf)]
#[bpaf(options, version)]
struct Options {
    /// JSON config file
    #[bpaf(long, argument("PATH"))]
    config: Option<PathBuf>,
    /// Base URL of the graph store, overrides the config
    #[bpaf(long, argument("URL"))]
    server: Option<String>,
    /// Viewport width
    #[bpaf(long, argument("PX"), fallback(800.0))]
    width: f64,
    /// Viewport height
    #[bpaf(long, argument("PX"), fallback(600.0))]
    height: f64,
    /// Work offline on a generated feed-forward graph, e.g. 3,4,2
    #[bpaf(long, argument::<String>("COUNTS"), parse(parse_counts), optional)]
    generate: Option<Vec<usize>>,
    /// Seed for generated link weights
    #[bpaf(long, argument("SEED"), fallback(0))]
    seed: u64,
    /// Upper bound on simulation steps
    #[bpaf(long, argument("N"), fallback(2_000))]
    steps: usize,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("graph did not load: {0}")]
    NotLoaded(String),
}

fn parse_counts(text: String) -> Result<Vec<usize>, String> {
    let counts = text
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<usize>()
                .map_err(|e| format!("{part:?}: {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if counts.is_empty() || counts.contains(&0) {
        return Err("every layer needs at least one node".to_string());
    }
    Ok(counts)
}

fn run(opts: Options) -> Result<(), CliError> {
    let mut config = match &opts.config {
        Some(path) => load_config(path)?,
        None => EditorConfig::default(),
    };
    if let Some(server) = opts.server {
        config.endpoints.base_url = server;
    }

    let transport: Arc<dyn Transport> = match &opts.generate {
        Some(counts) => {
            let mut rng = StdRng::seed_from_u64(opts.seed);
            log::info!("generating offline graph with layers {counts:?}");
            Arc::new(MemoryTransport::new(generate_layered_graph(counts, &mut rng)))
        }
        None => Arc::new(HttpTransport::new(
            config.endpoints.clone(),
            config.request_timeout(),
        )?),
    };

    let mut state = State::new(config.layout, transport);
    state.load();
    if state.load_failed() {
        return Err(CliError::NotLoaded(state.warnings().join("; ")));
    }
    state.resize(opts.width, opts.height);

    let steps = state.settle(Duration::from_millis(16), opts.steps);
    log::info!(
        "settled {} nodes and {} links in {steps} steps",
        state.store().nodes().len(),
        state.store().links().len(),
    );

    println!("{}", serde_json::to_string_pretty(&state.frame())?);
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(options().run()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
