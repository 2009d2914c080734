mod app;

use std::path::PathBuf;

use clap::Parser;
use graph_vista::VizConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// JSON graph dataset: `{"nodes": [...], "relationships": [...]}`.
    #[arg(long)]
    graph: PathBuf,

    /// Style sheet applied on top of the default rules.
    #[arg(long)]
    style: Option<PathBuf>,

    /// JSON file overriding `VizConfig` fields.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    no_clustering: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("graph_vista=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => VizConfig::load(path)?,
        None => VizConfig::default(),
    };
    if args.no_clustering {
        config.clustering = false;
    }
    tracing::info!(graph = %args.graph.display(), clustering = config.clustering, "starting viewer");

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    let request = app::LoadRequest {
        graph: args.graph,
        style: args.style,
        config,
    };
    eframe::run_native(
        "graph-vista",
        options,
        Box::new(move |cc| Ok(Box::new(app::GraphViewerApp::new(cc, request)))),
    )
    .map_err(|error| anyhow::anyhow!("viewer failed: {error}"))
}
