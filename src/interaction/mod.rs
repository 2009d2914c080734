//! Pointer-driven selection, drag and expansion state machine.
//!
//! The controller mutates the model and expansion map directly and reports
//! everything that needs the layout or a worker thread back as [`Command`]s.

mod events;

use eframe::egui::Vec2;
use tracing::{debug, warn};

use crate::cluster::{ClusterNetwork, ExpansionMap, VisualKind};
use crate::model::{GraphModel, ItemRef, NodeId, RelationshipId};

pub use events::{
    CanvasSummary, EventBus, GroupSummary, ItemPayload, MenuSummary, NodeSummary,
    RelationshipSummary, VizEvent,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ControllerState {
    #[default]
    Idle,
    NodeSelected,
    RelationshipSelected,
    Dragging,
}

/// What the pointer is over: a visible node or group, an aggregate link, or
/// empty canvas. Indices refer to the current [`ClusterNetwork`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Visual(usize),
    Link(usize),
    Canvas,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextAction {
    Remove,
    Unlock,
    Expand,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PointerEvent {
    Click { target: Target, group_modifier: bool },
    DoubleClick(Target),
    DragStart(usize),
    DragMove { index: usize, position: Vec2 },
    DragEnd(usize),
    PanStart,
    PanEnd,
    HoverIn(Target),
    HoverOut(Target),
    MenuOpen(usize),
    MenuClose,
    MenuHover(MenuSummary),
    Context { index: usize, action: ContextAction },
}

/// Follow-up work for the session.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Rebuild,
    FetchNeighbours { node: NodeId, known: Vec<NodeId> },
    Drag { index: usize, position: Vec2 },
    SetFixed { index: usize, fixed: bool },
    RecomputeBoundary(String),
    Reheat,
}

/// Borrowed session state the controller works on.
pub struct InteractionContext<'a> {
    pub model: &'a mut GraphModel,
    pub network: &'a ClusterNetwork,
    pub expansion: &'a mut ExpansionMap,
    pub events: &'a mut EventBus,
    pub expansion_threshold: usize,
    pub show_group_marks: bool,
}

impl InteractionContext<'_> {
    fn canvas(&self) -> ItemPayload {
        ItemPayload::Canvas(CanvasSummary::of(self.model))
    }

    fn emit_model_change(&mut self) {
        let stats = self.model.stats();
        self.events.emit(VizEvent::GraphModelChange(stats));
    }

    fn visual_kind(&self, index: usize) -> Option<VisualKind> {
        self.network.nodes().get(index).map(|node| node.kind.clone())
    }

    fn link_relationship(&self, index: usize) -> Option<RelationshipId> {
        self.network
            .links()
            .get(index)
            .and_then(|link| link.relationships.first())
            .cloned()
    }
}

#[derive(Debug, Default)]
pub struct InteractionController {
    state: ControllerState,
    panning: bool,
    suppress_canvas_click: bool,
    context_menu: Option<usize>,
}

impl InteractionController {
    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_panning(&self) -> bool {
        self.panning
    }

    pub fn context_menu(&self) -> Option<usize> {
        self.context_menu
    }

    /// Drops pointer state that refers to indices of a network that is
    /// about to be replaced.
    pub fn network_rebuilt(&mut self, model: &GraphModel) {
        self.context_menu = None;
        if self.state != ControllerState::Dragging {
            self.state = Self::selection_state(model);
        }
    }

    pub fn handle(&mut self, event: PointerEvent, ctx: &mut InteractionContext<'_>) -> Vec<Command> {
        let mut commands = Vec::new();
        match event {
            PointerEvent::Click {
                target,
                group_modifier,
            } => {
                let suppressed = std::mem::take(&mut self.suppress_canvas_click);
                match target {
                    Target::Visual(index) => {
                        self.visual_clicked(index, group_modifier, ctx, &mut commands)
                    }
                    Target::Link(index) => self.link_clicked(index, ctx),
                    Target::Canvas if suppressed || self.panning => {}
                    Target::Canvas => self.canvas_clicked(ctx),
                }
            }
            PointerEvent::DoubleClick(Target::Visual(index)) => {
                if let Some(VisualKind::Node(id)) = ctx.visual_kind(index) {
                    self.toggle_neighbours(&id, ctx, &mut commands);
                }
            }
            PointerEvent::DoubleClick(_) => {}
            PointerEvent::DragStart(index) => {
                if let Some(kind) = ctx.visual_kind(index) {
                    if let VisualKind::Node(id) = &kind {
                        let _ = ctx.model.set_fixed(id, true);
                    }
                    self.state = ControllerState::Dragging;
                    self.suppress_canvas_click = true;
                    commands.push(Command::SetFixed { index, fixed: true });
                }
            }
            PointerEvent::DragMove { index, position } => {
                if self.state == ControllerState::Dragging {
                    if let Some(VisualKind::Node(id)) = ctx.visual_kind(index) {
                        let _ = ctx.model.set_position(&id, position);
                    }
                    commands.push(Command::Drag { index, position });
                }
            }
            PointerEvent::DragEnd(index) => {
                self.state = Self::selection_state(ctx.model);
                if ctx.show_group_marks
                    && let Some(key) = ctx
                        .network
                        .nodes()
                        .get(index)
                        .and_then(|node| node.group_key.clone())
                {
                    commands.push(Command::RecomputeBoundary(key));
                }
            }
            PointerEvent::PanStart => self.panning = true,
            PointerEvent::PanEnd => self.panning = false,
            PointerEvent::HoverIn(target) => self.hover_in(target, ctx),
            PointerEvent::HoverOut(_) => {
                let canvas = ctx.canvas();
                ctx.events.emit(VizEvent::ItemMouseOver(canvas));
            }
            PointerEvent::MenuOpen(index) => self.context_menu = Some(index),
            PointerEvent::MenuClose => self.context_menu = None,
            PointerEvent::MenuHover(summary) => {
                ctx.events
                    .emit(VizEvent::ItemMouseOver(ItemPayload::ContextMenuItem(summary)));
            }
            PointerEvent::Context { index, action } => {
                self.context_menu = None;
                if let Some(VisualKind::Node(id)) = ctx.visual_kind(index) {
                    self.context_action(index, &id, action, ctx, &mut commands);
                }
            }
        }
        commands
    }

    fn visual_clicked(
        &mut self,
        index: usize,
        group_modifier: bool,
        ctx: &mut InteractionContext<'_>,
        commands: &mut Vec<Command>,
    ) {
        let Some(kind) = ctx.visual_kind(index) else {
            return;
        };

        let id = match kind {
            VisualKind::Group(key) => {
                self.toggle_group(&key, ctx, commands);
                return;
            }
            VisualKind::Node(id) => id,
        };

        if group_modifier
            && let Some(key) = ctx.model.node(&id).and_then(|node| node.group_key.clone())
        {
            self.toggle_group(&key, ctx, commands);
            return;
        }

        let _ = ctx.model.set_fixed(&id, true);
        commands.push(Command::SetFixed { index, fixed: true });

        let Some(node) = ctx.model.node(&id) else {
            return;
        };
        if node.is_selected() {
            self.deselect(ctx);
        } else {
            let summary = NodeSummary::from(node);
            if ctx.model.select(ItemRef::Node(id)).is_ok() {
                self.state = ControllerState::NodeSelected;
                ctx.events
                    .emit(VizEvent::ItemSelected(ItemPayload::Node(summary)));
            }
        }
    }

    fn link_clicked(&mut self, index: usize, ctx: &mut InteractionContext<'_>) {
        let Some(id) = ctx.link_relationship(index) else {
            return;
        };
        let Some(relationship) = ctx.model.relationship(&id) else {
            return;
        };

        if relationship.is_selected() {
            self.deselect(ctx);
            return;
        }

        let summary = RelationshipSummary::from(relationship);
        if ctx.model.select(ItemRef::Relationship(id)).is_ok() {
            self.state = ControllerState::RelationshipSelected;
            ctx.events
                .emit(VizEvent::ItemSelected(ItemPayload::Relationship(summary)));
        }
    }

    fn canvas_clicked(&mut self, ctx: &mut InteractionContext<'_>) {
        self.deselect(ctx);
    }

    fn deselect(&mut self, ctx: &mut InteractionContext<'_>) {
        ctx.model.deselect();
        self.state = ControllerState::Idle;
        let canvas = ctx.canvas();
        ctx.events.emit(VizEvent::ItemSelected(canvas));
    }

    fn toggle_group(
        &mut self,
        key: &str,
        ctx: &mut InteractionContext<'_>,
        commands: &mut Vec<Command>,
    ) {
        let external = ctx
            .network
            .group(key)
            .map_or(0, |group| group.external_link_count);
        let next = ctx
            .expansion
            .toggle(key, external, ctx.expansion_threshold);
        debug!(group = key, state = next.as_index(), "group toggled");
        commands.push(Command::Rebuild);
    }

    fn toggle_neighbours(
        &mut self,
        id: &NodeId,
        ctx: &mut InteractionContext<'_>,
        commands: &mut Vec<Command>,
    ) {
        let Some(node) = ctx.model.node(id) else {
            return;
        };

        if node.is_expanded() {
            match ctx.model.collapse_node(id) {
                Ok(removed) => {
                    debug!(node = %id, removed = removed.len(), "collapsed node");
                    ctx.expansion.retain_overrides(ctx.model);
                    self.state = Self::selection_state(ctx.model);
                    commands.push(Command::Rebuild);
                    ctx.emit_model_change();
                }
                Err(error) => warn!(%error, "collapse failed"),
            }
            return;
        }

        match ctx.model.neighbour_ids(id) {
            Ok(known) => commands.push(Command::FetchNeighbours {
                node: id.clone(),
                known,
            }),
            Err(error) => warn!(%error, "neighbour lookup failed"),
        }
    }

    fn context_action(
        &mut self,
        index: usize,
        id: &NodeId,
        action: ContextAction,
        ctx: &mut InteractionContext<'_>,
        commands: &mut Vec<Command>,
    ) {
        match action {
            ContextAction::Remove => {
                if ctx.model.remove_node(id).is_err() {
                    return;
                }
                ctx.expansion.retain_overrides(ctx.model);
                self.deselect(ctx);
                commands.push(Command::Rebuild);
                ctx.emit_model_change();
            }
            ContextAction::Unlock => {
                let _ = ctx.model.set_fixed(id, false);
                commands.push(Command::SetFixed {
                    index,
                    fixed: false,
                });
                commands.push(Command::Reheat);
                self.deselect(ctx);
            }
            ContextAction::Expand => self.toggle_neighbours(id, ctx, commands),
        }
    }

    fn hover_in(&mut self, target: Target, ctx: &mut InteractionContext<'_>) {
        let payload = match target {
            Target::Visual(index) => {
                if self.context_menu == Some(index) {
                    return;
                }
                match ctx.visual_kind(index) {
                    Some(VisualKind::Node(id)) => {
                        ctx.model.node(&id).map(|node| ItemPayload::Node(node.into()))
                    }
                    Some(VisualKind::Group(key)) => ctx
                        .network
                        .group(&key)
                        .map(|group| ItemPayload::Group(group.into())),
                    None => None,
                }
            }
            Target::Link(index) => ctx
                .link_relationship(index)
                .and_then(|id| ctx.model.relationship(&id))
                .map(|relationship| ItemPayload::Relationship(relationship.into())),
            Target::Canvas => None,
        };

        if let Some(payload) = payload {
            ctx.events.emit(VizEvent::ItemMouseOver(payload));
        }
    }

    fn selection_state(model: &GraphModel) -> ControllerState {
        match model.selected_item() {
            Some(ItemRef::Node(_)) => ControllerState::NodeSelected,
            Some(ItemRef::Relationship(_)) => ControllerState::RelationshipSelected,
            None => ControllerState::Idle,
        }
    }
}
