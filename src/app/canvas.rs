use eframe::egui::{
    self, Align2, Color32, FontId, PointerButton, Pos2, Rect, Response, Sense, Shape, Stroke, Ui,
    vec2,
};
use graph_vista::cluster::VisualKind;
use graph_vista::interaction::{ContextAction, MenuSummary, PointerEvent, Target};
use graph_vista::render::RenderSnapshot;

use super::ViewModel;
use super::render_utils::{
    blend_color, circle_visible, color_or, distance_to_path, draw_background, path_midpoint,
    path_visible, with_alpha,
};

const LINK_HIT_DISTANCE: f32 = 5.0;
const SELECTED_COLOR: Color32 = Color32::from_rgb(106, 168, 240);
const SEARCH_COLOR: Color32 = Color32::from_rgb(245, 196, 66);
const DEFAULT_NODE_COLOR: Color32 = Color32::from_rgb(165, 171, 182);

struct ScreenSpace {
    nodes: Vec<(Pos2, f32)>,
    links: Vec<Vec<Pos2>>,
}

impl ScreenSpace {
    fn project(model: &ViewModel, rect: Rect, snapshot: &RenderSnapshot) -> Self {
        let viewport = model.session.viewport();
        let zoom = viewport.zoom();
        Self {
            nodes: snapshot
                .nodes
                .iter()
                .map(|node| {
                    (
                        viewport.world_to_screen(rect, node.position),
                        (node.radius * zoom).max(2.0),
                    )
                })
                .collect(),
            links: snapshot
                .links
                .iter()
                .map(|link| {
                    link.path
                        .iter()
                        .map(|point| viewport.world_to_screen(rect, *point))
                        .collect()
                })
                .collect(),
        }
    }

    fn hit(&self, pointer: Pos2) -> Target {
        let node = self
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(index, (center, radius))| {
                let distance = center.distance(pointer);
                (distance <= *radius).then_some((index, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((index, _)) = node {
            return Target::Visual(index);
        }

        self.links
            .iter()
            .enumerate()
            .map(|(index, path)| (index, distance_to_path(pointer, path)))
            .filter(|(_, distance)| *distance <= LINK_HIT_DISTANCE)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map_or(Target::Canvas, |(index, _)| Target::Link(index))
    }
}

impl ViewModel {
    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);
        self.session.set_viewport_size(rect.size());

        self.handle_graph_zoom(ui, rect, &response);
        let mut events = Vec::new();
        self.handle_graph_pan(&response, &mut events);

        let report = self.session.frame();
        if report.moved() || response.dragged() || self.session.pending_fetches() > 0 {
            ui.ctx().request_repaint();
        }

        let snapshot = self.session.snapshot();
        let screen = ScreenSpace::project(self, rect, &snapshot);
        let zoom = self.session.viewport().zoom();
        let origin = self
            .session
            .viewport()
            .world_to_screen(rect, self.session.viewport().size() * 0.5);
        draw_background(&painter, rect, origin, zoom);

        let pointer = ui.input(|input| input.pointer.hover_pos());
        let hovered = match pointer {
            Some(pointer) if rect.contains(pointer) => screen.hit(pointer),
            _ => Target::Canvas,
        };
        self.track_hover(hovered, &mut events);
        self.track_drag(ui, rect, &response, hovered, &mut events);

        if response.clicked_by(PointerButton::Primary) {
            let group_modifier = ui.input(|input| input.modifiers.alt);
            events.push(PointerEvent::Click {
                target: hovered,
                group_modifier,
            });
        }
        if response.double_clicked_by(PointerButton::Primary) {
            events.push(PointerEvent::DoubleClick(hovered));
        }
        if response.secondary_clicked()
            && let Target::Visual(index) = hovered
            && !snapshot.nodes[index].is_group()
        {
            self.menu_target = Some(index);
            events.push(PointerEvent::MenuOpen(index));
        }
        self.draw_context_menu(&response, &snapshot, &mut events);

        if matches!(hovered, Target::Visual(_) | Target::Link(_)) {
            ui.output_mut(|output| output.cursor_icon = egui::CursorIcon::PointingHand);
        }

        self.paint(&painter, rect, &snapshot, &screen, hovered, zoom);

        for event in events {
            self.session.handle(event);
        }
    }

    fn handle_graph_zoom(&mut self, ui: &Ui, rect: Rect, response: &Response) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        self.session.viewport_mut().zoom_about(rect, pointer, scroll);
    }

    fn handle_graph_pan(&mut self, response: &Response, events: &mut Vec<PointerEvent>) {
        let panning = [PointerButton::Secondary, PointerButton::Middle];
        if panning.iter().any(|button| response.drag_started_by(*button)) {
            events.push(PointerEvent::PanStart);
        }
        if panning.iter().any(|button| response.dragged_by(*button)) {
            self.session.viewport_mut().pan_by(response.drag_delta());
        }
        if panning.iter().any(|button| response.drag_stopped_by(*button)) {
            events.push(PointerEvent::PanEnd);
        }
    }

    fn track_hover(&mut self, hovered: Target, events: &mut Vec<PointerEvent>) {
        let hovered = (hovered != Target::Canvas).then_some(hovered);
        if hovered == self.hovered {
            return;
        }
        if let Some(previous) = self.hovered.take() {
            events.push(PointerEvent::HoverOut(previous));
        }
        if let Some(current) = hovered {
            events.push(PointerEvent::HoverIn(current));
        }
        self.hovered = hovered;
    }

    fn track_drag(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &Response,
        hovered: Target,
        events: &mut Vec<PointerEvent>,
    ) {
        if response.drag_started_by(PointerButton::Primary)
            && let Target::Visual(index) = hovered
        {
            self.dragging = Some(index);
            events.push(PointerEvent::DragStart(index));
        }

        let Some(index) = self.dragging else {
            return;
        };
        if response.dragged_by(PointerButton::Primary)
            && let Some(pointer) = ui.input(|input| input.pointer.interact_pos())
        {
            let position = self.session.viewport().screen_to_world(rect, pointer);
            events.push(PointerEvent::DragMove { index, position });
        }
        if response.drag_stopped_by(PointerButton::Primary) {
            self.dragging = None;
            events.push(PointerEvent::DragEnd(index));
        }
    }

    fn draw_context_menu(
        &mut self,
        response: &Response,
        snapshot: &RenderSnapshot,
        events: &mut Vec<PointerEvent>,
    ) {
        let Some(index) = self.menu_target else {
            return;
        };
        let selection = snapshot
            .nodes
            .get(index)
            .map(|node| node.caption.clone())
            .unwrap_or_default();

        let shown = response.context_menu(|ui| {
            let items = [
                (ContextAction::Remove, "Remove", "Dismiss the node and its relationships"),
                (ContextAction::Unlock, "Unlock", "Release the pinned position"),
                (ContextAction::Expand, "Expand / collapse", "Fetch or fold neighbours"),
            ];
            for (action, label, content) in items {
                let button = ui.button(label);
                if button.hovered() {
                    events.push(PointerEvent::MenuHover(MenuSummary {
                        label: label.to_owned(),
                        content: content.to_owned(),
                        selection: selection.clone(),
                    }));
                }
                if button.clicked() {
                    events.push(PointerEvent::Context { index, action });
                    ui.close();
                }
            }
        });

        if shown.is_none() && !response.secondary_clicked() {
            self.menu_target = None;
            events.push(PointerEvent::MenuClose);
        }
    }

    fn paint(
        &self,
        painter: &egui::Painter,
        rect: Rect,
        snapshot: &RenderSnapshot,
        screen: &ScreenSpace,
        hovered: Target,
        zoom: f32,
    ) {
        let viewport = self.session.viewport();
        for (_key, hull) in &snapshot.boundaries {
            let points = hull
                .iter()
                .map(|point| viewport.world_to_screen(rect, *point))
                .collect::<Vec<_>>();
            painter.add(Shape::convex_polygon(
                points,
                Color32::from_rgba_unmultiplied(120, 150, 200, 28),
                Stroke::new(1.0, Color32::from_rgba_unmultiplied(90, 120, 170, 120)),
            ));
        }

        for (index, link) in snapshot.links.iter().enumerate() {
            let path = &screen.links[index];
            if !path_visible(rect, path, 4.0) {
                continue;
            }

            let base = color_or(&link.color, DEFAULT_NODE_COLOR);
            let width = (link.width * zoom.sqrt()).max(0.6)
                + (link.multiplicity as f32 - 1.0).min(4.0) * 0.5;
            let (color, width) = if link.selected {
                (SELECTED_COLOR, width + 2.0)
            } else if hovered == Target::Link(index) {
                (blend_color(base, SELECTED_COLOR, 0.5), width + 1.0)
            } else {
                (base, width)
            };
            painter.add(Shape::line(path.clone(), Stroke::new(width, color)));

            if zoom > 0.45
                && !link.caption.is_empty()
                && let Some(midpoint) = path_midpoint(path)
            {
                painter.text(
                    midpoint,
                    Align2::CENTER_BOTTOM,
                    &link.caption,
                    FontId::proportional((link.font_size * zoom).max(7.0)),
                    color_or(&link.text_color, Color32::BLACK),
                );
            }
        }

        for (index, node) in snapshot.nodes.iter().enumerate() {
            let (center, radius) = screen.nodes[index];
            if !circle_visible(rect, center, radius) {
                continue;
            }

            let is_match =
                matches!(&node.kind, VisualKind::Node(id) if self.search_matches.contains(id));
            let mut fill = color_or(&node.color, DEFAULT_NODE_COLOR);
            if is_match {
                fill = blend_color(fill, SEARCH_COLOR, 0.55);
            }
            if hovered == Target::Visual(index) {
                fill = blend_color(fill, Color32::WHITE, 0.2);
            }

            if node.selected {
                painter.circle_filled(center, radius + 6.0, with_alpha(SELECTED_COLOR, 110));
            }
            painter.circle_filled(center, radius, fill);
            painter.circle_stroke(
                center,
                radius,
                Stroke::new(
                    node.border_width,
                    color_or(&node.border_color, Color32::from_gray(150)),
                ),
            );
            if node.is_group() {
                painter.circle_stroke(
                    center,
                    radius - 4.0,
                    Stroke::new(1.0, with_alpha(Color32::WHITE, 160)),
                );
            }
            if node.fixed {
                painter.circle_filled(
                    center + vec2(radius * 0.7, -radius * 0.7),
                    2.5,
                    Color32::from_gray(70),
                );
            }

            if zoom > 0.35 {
                painter.text(
                    center,
                    Align2::CENTER_CENTER,
                    truncate_caption(&node.caption, radius),
                    FontId::proportional((node.font_size * zoom.max(0.6)).max(7.0)),
                    color_or(&node.text_color, Color32::WHITE),
                );
            }
        }
    }
}

/// Shortens a caption so it roughly fits inside a circle of `radius` pixels.
fn truncate_caption(caption: &str, radius: f32) -> String {
    let max_chars = ((radius * 2.0) / 6.0).floor().max(3.0) as usize;
    if caption.chars().count() <= max_chars {
        return caption.to_owned();
    }
    let mut short = caption.chars().take(max_chars.saturating_sub(1)).collect::<String>();
    short.push('…');
    short
}
