//! One visualization session: model, styling, clustering, layout and input
//! wired together and advanced once per frame.

use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use eframe::egui::Vec2;
use tracing::{debug, info, warn};

use crate::cluster::{ClusterNetwork, ClusterNetworkBuilder, ExpansionMap, VisualKind};
use crate::config::VizConfig;
use crate::error::Result;
use crate::interaction::{
    Command, EventBus, InteractionContext, InteractionController, PointerEvent, VizEvent,
};
use crate::model::{GraphModel, GraphStats, Neighbourhood, NodeId};
use crate::physics::{FrameReport, LayoutCoordinator};
use crate::render::RenderSnapshot;
use crate::source::{GraphDataset, NeighbourSource};
use crate::style::StyleResolver;
use crate::viewport::{Viewport, ZoomLimits};

struct FetchOutcome {
    node: NodeId,
    result: Result<Neighbourhood>,
}

pub struct VisualizationSession {
    config: VizConfig,
    model: GraphModel,
    style: StyleResolver,
    expansion: ExpansionMap,
    builder: ClusterNetworkBuilder,
    network: ClusterNetwork,
    layout: LayoutCoordinator,
    controller: InteractionController,
    events: EventBus,
    viewport: Viewport,
    source: Option<Arc<dyn NeighbourSource>>,
    fetch_tx: Sender<FetchOutcome>,
    fetch_rx: Receiver<FetchOutcome>,
    in_flight: usize,
    show_group_marks: bool,
    boundaries: BTreeMap<String, Vec<Vec2>>,
}

impl VisualizationSession {
    pub fn new(config: VizConfig) -> Self {
        let (fetch_tx, fetch_rx) = mpsc::channel();
        Self {
            model: GraphModel::new(config.group_property.clone()),
            style: StyleResolver::new(config.max_solutions),
            expansion: ExpansionMap::new(config.initial_expansion),
            builder: ClusterNetworkBuilder::new(config.clustering),
            network: ClusterNetwork::default(),
            layout: LayoutCoordinator::new(config.layout, config.helper_layout, config.schedule),
            controller: InteractionController::default(),
            events: EventBus::default(),
            viewport: Viewport::new(config.zoom),
            source: None,
            fetch_tx,
            fetch_rx,
            in_flight: 0,
            show_group_marks: config.show_group_marks,
            boundaries: BTreeMap::new(),
            config,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn NeighbourSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn config(&self) -> &VizConfig {
        &self.config
    }

    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    pub fn network(&self) -> &ClusterNetwork {
        &self.network
    }

    pub fn layout(&self) -> &LayoutCoordinator {
        &self.layout
    }

    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    pub fn expansion(&self) -> &ExpansionMap {
        &self.expansion
    }

    pub fn style(&self) -> &StyleResolver {
        &self.style
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&VizEvent) + 'static) {
        self.events.subscribe(listener);
    }

    pub fn stats(&self) -> GraphStats {
        self.model.stats()
    }

    pub fn pending_fetches(&self) -> usize {
        self.in_flight
    }

    /// Adds the dataset, keeping at most `initial_node_display` nodes and the
    /// relationships among them. Returns true when nodes were left out.
    pub fn load(&mut self, dataset: GraphDataset) -> bool {
        let limit = self.config.initial_node_display;
        let truncated = dataset.nodes.len() > limit;
        self.model.add_nodes(dataset.nodes.into_iter().take(limit));
        self.model.add_internal_relationships(dataset.relationships);
        info!(
            nodes = self.model.node_count(),
            relationships = self.model.relationship_count(),
            truncated,
            "graph loaded"
        );

        self.rebuild();
        self.emit_model_change();
        truncated
    }

    /// Measured canvas size; the layout bounds follow it.
    pub fn set_viewport_size(&mut self, size: Vec2) {
        if self.viewport.set_size(size) {
            self.layout.set_bounds(size);
        }
    }

    pub fn zoom_in(&mut self) -> ZoomLimits {
        self.viewport.zoom_in()
    }

    pub fn zoom_out(&mut self) -> ZoomLimits {
        self.viewport.zoom_out()
    }

    pub fn show_group_marks(&self) -> bool {
        self.show_group_marks
    }

    pub fn set_show_group_marks(&mut self, show: bool) {
        self.show_group_marks = show;
        if show {
            self.recompute_boundaries();
        } else {
            self.boundaries.clear();
        }
    }

    pub fn boundaries(&self) -> &BTreeMap<String, Vec<Vec2>> {
        &self.boundaries
    }

    pub fn import_style(&mut self, text: &str) -> Result<()> {
        self.style.import_sheet(text)?;
        self.refresh_radii();
        self.layout.reheat();
        Ok(())
    }

    pub fn export_style(&self) -> String {
        self.style.export_sheet()
    }

    pub fn reset_style(&mut self) {
        self.style.reset_to_default();
        self.refresh_radii();
    }

    pub fn handle(&mut self, event: PointerEvent) {
        let mut ctx = InteractionContext {
            model: &mut self.model,
            network: &self.network,
            expansion: &mut self.expansion,
            events: &mut self.events,
            expansion_threshold: self.config.expansion_threshold,
            show_group_marks: self.show_group_marks,
        };
        let commands = self.controller.handle(event, &mut ctx);

        // Indices in commands refer to the current network, so structural
        // rebuilds wait until everything else is applied.
        let mut rebuild = false;
        for command in commands {
            match command {
                Command::Rebuild => rebuild = true,
                Command::FetchNeighbours { node, known } => self.spawn_fetch(node, known),
                Command::Drag { index, position } => {
                    self.layout.drag(&mut self.network, index, position);
                }
                Command::SetFixed { index, fixed } => {
                    self.layout.set_fixed(&mut self.network, index, fixed);
                }
                Command::RecomputeBoundary(key) => self.recompute_boundary(&key),
                Command::Reheat => self.layout.reheat(),
            }
        }
        if rebuild {
            self.rebuild();
        }
    }

    /// Derives a new network from the model and expansion map and reloads the
    /// layout, carrying positions over from the previous network.
    pub fn rebuild(&mut self) {
        self.expansion.retain_overrides(&self.model);
        self.refresh_radii();
        let previous = mem::take(&mut self.network);
        self.network = self
            .builder
            .build(&self.model, &self.expansion, Some(&previous));
        self.layout.rebuild(&mut self.network);
        self.controller.network_rebuilt(&self.model);
        self.sync_positions();
        if self.show_group_marks {
            self.recompute_boundaries();
        }
    }

    /// One frame: merge finished fetches, advance both simulations and copy
    /// positions back into the model.
    pub fn frame(&mut self) -> FrameReport {
        self.poll_fetches();
        let report = self.layout.frame(&mut self.network);
        if report.moved() {
            self.sync_positions();
            if self.show_group_marks {
                self.recompute_boundaries();
            }
        }
        report
    }

    pub fn snapshot(&mut self) -> RenderSnapshot {
        RenderSnapshot::build(&self.model, &self.network, &mut self.style, &self.boundaries)
    }

    /// Merges every fetch result that has arrived. Returns how many were taken.
    pub fn poll_fetches(&mut self) -> usize {
        let mut merged = 0;
        loop {
            match self.fetch_rx.try_recv() {
                Ok(outcome) => {
                    self.merge_fetch(outcome);
                    merged += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        merged
    }

    /// Waits up to `timeout` for in-flight fetches and merges them.
    pub fn block_on_fetches(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut merged = 0;
        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.fetch_rx.recv_timeout(remaining) {
                Ok(outcome) => {
                    self.merge_fetch(outcome);
                    merged += 1;
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
            }
        }
        merged
    }

    fn spawn_fetch(&mut self, node: NodeId, known: Vec<NodeId>) {
        let Some(source) = self.source.clone() else {
            warn!(node = %node, "no neighbour source configured");
            return;
        };

        let tx = self.fetch_tx.clone();
        self.in_flight += 1;
        debug!(node = %node, known = known.len(), "fetching neighbours");
        thread::spawn(move || {
            let result = source.neighbours(&node, &known);
            let _ = tx.send(FetchOutcome { node, result });
        });
    }

    fn merge_fetch(&mut self, outcome: FetchOutcome) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let FetchOutcome { node, result } = outcome;

        if !self.model.contains_node(&node) {
            warn!(node = %node, "dropping neighbours of a node that is gone");
            return;
        }

        let neighbourhood = match result {
            Ok(neighbourhood) => neighbourhood,
            Err(error) => {
                warn!(%error, "neighbour fetch failed");
                return;
            }
        };

        let added = match self.model.add_expanded_nodes(&node, neighbourhood.nodes) {
            Ok(added) => added,
            Err(error) => {
                warn!(%error, "could not merge neighbours");
                return;
            }
        };
        self.model
            .add_internal_relationships(neighbourhood.relationships);
        let _ = self.model.expand_node(&node);
        debug!(node = %node, added = added.len(), "neighbours merged");

        self.rebuild();
        self.emit_model_change();
    }

    fn emit_model_change(&mut self) {
        let stats = self.model.stats();
        self.events.emit(VizEvent::GraphModelChange(stats));
    }

    fn refresh_radii(&mut self) {
        let radii = self
            .model
            .nodes()
            .iter()
            .map(|node| {
                let diameter = self.style.for_node(node).get_px("diameter");
                (node.id.clone(), diameter)
            })
            .collect::<Vec<_>>();
        for (id, diameter) in radii {
            if let Some(diameter) = diameter.filter(|diameter| *diameter > 0.0)
                && let Some(node) = self.model.node_mut(&id)
            {
                node.radius = diameter * 0.5;
            }
        }
    }

    fn sync_positions(&mut self) {
        for visual in self.network.nodes() {
            if let VisualKind::Node(id) = &visual.kind {
                let _ = self.model.set_position(id, visual.position);
            }
        }
    }

    fn recompute_boundary(&mut self, key: &str) {
        match self
            .network
            .group_boundary(&self.model, key, self.config.group_mark_scale)
        {
            Some(hull) => {
                self.boundaries.insert(key.to_owned(), hull);
            }
            None => {
                self.boundaries.remove(key);
            }
        }
    }

    fn recompute_boundaries(&mut self) {
        self.boundaries.clear();
        let keys = self.network.groups().keys().cloned().collect::<Vec<_>>();
        for key in keys {
            self.recompute_boundary(&key);
        }
    }
}
