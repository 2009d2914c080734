use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use anyhow::Context as _;
use eframe::egui::{self, Context};
use graph_vista::interaction::{ItemPayload, Target};
use graph_vista::model::{GraphStats, NodeId};
use graph_vista::{DatasetSource, GraphDataset, VisualizationSession, VizConfig, VizEvent};

mod canvas;
mod panels;
mod render_utils;

/// Files the viewer reads on startup and on reload.
#[derive(Clone, Debug)]
pub struct LoadRequest {
    pub graph: PathBuf,
    pub style: Option<PathBuf>,
    pub config: VizConfig,
}

struct LoadedGraph {
    dataset: GraphDataset,
    style: Option<String>,
}

pub struct GraphViewerApp {
    request: LoadRequest,
    state: AppState,
}

enum AppState {
    Loading {
        rx: Receiver<Result<LoadedGraph, String>>,
    },
    Ready(Box<ViewModel>),
    Error(String),
}

/// Latest outbound events, as shown in the details panel.
#[derive(Default)]
struct Inspector {
    selected: Option<ItemPayload>,
    hovered: Option<ItemPayload>,
    stats: GraphStats,
}

struct ViewModel {
    session: VisualizationSession,
    inspector: Rc<RefCell<Inspector>>,
    graph_label: String,
    truncated: bool,
    search: String,
    search_matches: HashSet<NodeId>,
    hovered: Option<Target>,
    dragging: Option<usize>,
    menu_target: Option<usize>,
    style_error: Option<String>,
}

impl GraphViewerApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, request: LoadRequest) -> Self {
        let state = Self::start_load(&request);
        Self { request, state }
    }

    fn spawn_load(request: &LoadRequest) -> Receiver<Result<LoadedGraph, String>> {
        let (tx, rx) = mpsc::channel();
        let graph = request.graph.clone();
        let style = request.style.clone();

        thread::spawn(move || {
            let result = load_files(graph, style).map_err(|error| format!("{error:#}"));
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(request: &LoadRequest) -> AppState {
        AppState::Loading {
            rx: Self::spawn_load(request),
        }
    }
}

fn load_files(graph: PathBuf, style: Option<PathBuf>) -> anyhow::Result<LoadedGraph> {
    let dataset = GraphDataset::load(&graph)?;
    let style = style
        .map(|path| {
            fs::read_to_string(&path)
                .with_context(|| format!("failed to read style sheet {}", path.display()))
        })
        .transpose()?;
    Ok(LoadedGraph { dataset, style })
}

impl ViewModel {
    fn new(loaded: LoadedGraph, request: &LoadRequest) -> Self {
        let config = request.config.clone();
        let source = DatasetSource::new(loaded.dataset.clone(), config.max_neighbours);
        let mut session = VisualizationSession::new(config).with_source(Arc::new(source));

        let inspector = Rc::new(RefCell::new(Inspector::default()));
        let sink = Rc::clone(&inspector);
        session.subscribe(move |event| {
            let mut inspector = sink.borrow_mut();
            match event {
                VizEvent::ItemSelected(payload) => inspector.selected = Some(payload.clone()),
                VizEvent::ItemMouseOver(payload) => inspector.hovered = Some(payload.clone()),
                VizEvent::GraphModelChange(stats) => inspector.stats = stats.clone(),
            }
        });

        let style_error = loaded
            .style
            .as_deref()
            .and_then(|text| session.import_style(text).err())
            .map(|error| error.to_string());
        let truncated = session.load(loaded.dataset);

        Self {
            session,
            inspector,
            graph_label: request.graph.display().to_string(),
            truncated,
            search: String::new(),
            search_matches: HashSet::new(),
            hovered: None,
            dragging: None,
            menu_target: None,
            style_error,
        }
    }
}

impl eframe::App for GraphViewerApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                if let Ok(result) = rx.try_recv() {
                    transition = Some(match result {
                        Ok(loaded) => {
                            AppState::Ready(Box::new(ViewModel::new(loaded, &self.request)))
                        }
                        Err(error) => AppState::Error(error),
                    });
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading graph...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
                ctx.request_repaint();
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load graph");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition = Some(Self::start_load(&self.request));
                    }
                });
            }
            AppState::Ready(model) => {
                let mut reload_requested = false;
                model.show(ctx, &mut reload_requested);
                if reload_requested {
                    transition = Some(Self::start_load(&self.request));
                }
            }
        }

        if let Some(next_state) = transition {
            self.state = next_state;
        }
    }
}
