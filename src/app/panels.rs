use eframe::egui::{self, Align, Context, Layout, RichText, ScrollArea, Ui};
use graph_vista::interaction::{ItemPayload, NodeSummary, RelationshipSummary};
use graph_vista::model::{NodeId, PropertyEntry};

use super::ViewModel;

const SEARCH_RESULT_ROWS: usize = 12;

impl ViewModel {
    pub(in crate::app) fn show(&mut self, ctx: &Context, reload_requested: &mut bool) {
        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| self.draw_top_bar(ui, reload_requested));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(340.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.draw_graph(ui));
    }

    fn draw_top_bar(&mut self, ui: &mut Ui, reload_requested: &mut bool) {
        ui.horizontal(|ui| {
            ui.heading("graph-vista");
            ui.separator();
            ui.label(&self.graph_label);
            let model = self.session.model();
            ui.label(format!("nodes: {}", model.node_count()));
            ui.label(format!("relationships: {}", model.relationship_count()));
            if self.truncated {
                ui.label(
                    RichText::new(format!(
                        "showing the first {} nodes",
                        self.session.config().initial_node_display
                    ))
                    .italics(),
                );
            }
            ui.separator();

            let limits = self.session.viewport().limits();
            if ui
                .add_enabled(!limits.zoom_in_limit_reached, egui::Button::new("Zoom in"))
                .clicked()
            {
                self.session.zoom_in();
            }
            if ui
                .add_enabled(!limits.zoom_out_limit_reached, egui::Button::new("Zoom out"))
                .clicked()
            {
                self.session.zoom_out();
            }

            let mut marks = self.session.show_group_marks();
            if ui.checkbox(&mut marks, "Group marks").changed() {
                self.session.set_show_group_marks(marks);
            }

            if ui.button("Reset style").clicked() {
                self.session.reset_style();
                self.style_error = None;
            }
            if ui.button("Copy style").clicked() {
                ui.ctx().copy_text(self.session.export_style());
            }
            if ui.button("Reload").clicked() {
                *reload_requested = true;
            }

            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                let pending = self.session.pending_fetches();
                if pending > 0 {
                    ui.spinner();
                    ui.label(format!("expanding {pending}"));
                }
                ui.label(format!("zoom {:.2}", self.session.viewport().zoom()));
            });
        });

        if let Some(error) = &self.style_error {
            ui.colored_label(egui::Color32::from_rgb(200, 70, 60), error.as_str());
        }
    }

    fn draw_details(&mut self, ui: &mut Ui) {
        self.draw_search(ui);
        ui.separator();

        let inspector = self.inspector.borrow();
        ui.heading("Selection");
        ui.add_space(4.0);
        match &inspector.selected {
            Some(ItemPayload::Node(node)) => node_details(ui, node),
            Some(ItemPayload::Relationship(relationship)) => {
                relationship_details(ui, relationship)
            }
            Some(ItemPayload::Canvas(canvas)) => {
                ui.label(format!(
                    "{} nodes, {} relationships",
                    canvas.node_count, canvas.relationship_count
                ));
            }
            Some(ItemPayload::Group(_) | ItemPayload::ContextMenuItem(_)) | None => {
                ui.label("Click a node or relationship to inspect it.");
            }
        }

        ui.separator();
        ui.label(RichText::new("Hover").strong());
        match &inspector.hovered {
            Some(ItemPayload::Node(node)) => {
                ui.label(format!("node {} {}", node.id, node.labels.join(":")));
            }
            Some(ItemPayload::Relationship(relationship)) => {
                ui.label(format!("[{}] {}", relationship.rel_type, relationship.id));
            }
            Some(ItemPayload::Group(group)) => {
                ui.label(format!(
                    "group {} ({} members, {} external links, state {})",
                    group.key,
                    group.size,
                    group.external_link_count,
                    group.state.as_index()
                ));
            }
            Some(ItemPayload::ContextMenuItem(menu)) => {
                ui.label(format!("{}: {}", menu.label, menu.content));
            }
            Some(ItemPayload::Canvas(_)) | None => {
                ui.weak("nothing");
            }
        }

        ui.separator();
        ui.label(RichText::new("Labels").strong());
        for (label, count) in &inspector.stats.label_counts {
            ui.label(format!("{label}: {count}"));
        }
        ui.add_space(4.0);
        ui.label(RichText::new("Relationship types").strong());
        for (rel_type, count) in &inspector.stats.relationship_type_counts {
            ui.label(format!("{rel_type}: {count}"));
        }
        if !inspector.stats.condition_counts.is_empty() {
            ui.add_space(4.0);
            ui.label(RichText::new("Presence conditions").strong());
            for (condition, count) in &inspector.stats.condition_counts {
                ui.label(format!("{condition}: {count}"));
            }
        }
    }

    fn draw_search(&mut self, ui: &mut Ui) {
        ui.heading("Search");
        let response = ui.text_edit_singleline(&mut self.search);
        if response.changed() {
            self.search_matches = self.session.model().search(&self.search).into_iter().collect();
        }
        if self.search.trim().is_empty() {
            return;
        }

        let ranked = self.session.model().search(&self.search);
        ui.small(format!("{} matches", ranked.len()));
        ScrollArea::vertical()
            .id_salt("search_results")
            .max_height(220.0)
            .show(ui, |ui| {
                for id in ranked.iter().take(SEARCH_RESULT_ROWS) {
                    ui.label(search_row(self, id));
                }
            });
    }
}

fn search_row(model: &ViewModel, id: &NodeId) -> String {
    model
        .session
        .model()
        .node(id)
        .map(|node| format!("{} {}", node.id, node.labels.join(":")))
        .unwrap_or_else(|| id.to_string())
}

fn properties_table(ui: &mut Ui, properties: &[PropertyEntry]) {
    egui::Grid::new(ui.next_auto_id())
        .num_columns(2)
        .striped(true)
        .show(ui, |ui| {
            for entry in properties {
                ui.label(RichText::new(&entry.key).strong());
                ui.label(entry.text());
                ui.end_row();
            }
        });
}

fn node_details(ui: &mut Ui, node: &NodeSummary) {
    ui.label(RichText::new(format!("node {}", node.id)).strong());
    if !node.labels.is_empty() {
        ui.label(format!(":{}", node.labels.join(":")));
    }
    properties_table(ui, &node.properties);
}

fn relationship_details(ui: &mut Ui, relationship: &RelationshipSummary) {
    ui.label(RichText::new(format!("[{}] {}", relationship.rel_type, relationship.id)).strong());
    properties_table(ui, &relationship.properties);
}
