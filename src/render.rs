//! Paint-ready view of the current network: world positions, resolved style
//! values and captions. Painters only read from a snapshot.

use std::collections::BTreeMap;

use eframe::egui::Vec2;

use crate::cluster::{ClusterNetwork, Endpoint, Segment, VisualKind};
use crate::model::{GraphModel, Relationship};
use crate::style::{ResolvedStyle, Selector, StyledItem, StyleResolver};

#[derive(Clone, Debug, PartialEq)]
pub struct RenderNode {
    pub key: String,
    /// Renderer-side identity; a change means "drop and recreate".
    pub identity: u64,
    pub kind: VisualKind,
    pub position: Vec2,
    pub radius: f32,
    pub caption: String,
    pub color: String,
    pub border_color: String,
    pub text_color: String,
    pub border_width: f32,
    pub font_size: f32,
    pub selected: bool,
    pub fixed: bool,
    pub size: usize,
}

impl RenderNode {
    pub fn is_group(&self) -> bool {
        matches!(self.kind, VisualKind::Group(_))
    }
}

/// One aggregate link routed through its two helper nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderLink {
    pub key: String,
    pub source: usize,
    pub target: usize,
    pub path: Vec<Vec2>,
    pub caption: String,
    pub color: String,
    pub text_color: String,
    pub width: f32,
    pub font_size: f32,
    pub multiplicity: usize,
    pub selected: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderSnapshot {
    pub nodes: Vec<RenderNode>,
    pub links: Vec<RenderLink>,
    /// Scaled hulls of groups, keyed by group key.
    pub boundaries: Vec<(String, Vec<Vec2>)>,
}

impl RenderSnapshot {
    pub fn build(
        model: &GraphModel,
        network: &ClusterNetwork,
        style: &mut StyleResolver,
        boundaries: &BTreeMap<String, Vec<Vec2>>,
    ) -> Self {
        let nodes = network
            .nodes()
            .iter()
            .map(|visual| {
                let (resolved, caption, selected) = match &visual.kind {
                    VisualKind::Node(id) => match model.node(id) {
                        Some(node) => {
                            let resolved = style.for_node(node);
                            let caption = resolved.caption(StyledItem::Node(node));
                            (resolved, caption, node.is_selected())
                        }
                        None => (style.calculate_style(&Selector::node()), id.to_string(), false),
                    },
                    VisualKind::Group(key) => (
                        style.calculate_style(&Selector::node()),
                        format!("{key} ({})", visual.size),
                        false,
                    ),
                };

                RenderNode {
                    key: visual.key.clone(),
                    identity: visual.identity,
                    kind: visual.kind.clone(),
                    position: visual.position,
                    radius: visual.radius,
                    caption,
                    color: resolved.get("color").to_owned(),
                    border_color: resolved.get("border-color").to_owned(),
                    text_color: resolved.get("text-color-internal").to_owned(),
                    border_width: resolved.get_px("border-width").unwrap_or(2.0),
                    font_size: resolved.get_px("font-size").unwrap_or(10.0),
                    selected,
                    fixed: visual.fixed,
                    size: visual.size,
                }
            })
            .collect();

        let mut helpers = vec![(None, None); network.links().len()];
        for segment in network.helper_links() {
            if segment.segment != Segment::Middle {
                continue;
            }
            if let (Endpoint::Helper(left), Endpoint::Helper(right), Some(slot)) =
                (segment.source, segment.target, helpers.get_mut(segment.link))
            {
                *slot = (Some(left), Some(right));
            }
        }

        let links = network
            .links()
            .iter()
            .zip(helpers)
            .map(|(link, (left, right))| {
                let relationships = link
                    .relationships
                    .iter()
                    .filter_map(|id| model.relationship(id))
                    .collect::<Vec<_>>();
                let shown = relationships
                    .iter()
                    .find(|relationship| relationship.is_selected())
                    .or_else(|| relationships.first())
                    .copied();
                let (resolved, caption) = link_style(style, shown, link.multiplicity());

                let mut path = vec![];
                path.extend(network.endpoint_position(Endpoint::Visual(link.source)));
                path.extend(left.and_then(|helper| network.endpoint_position(Endpoint::Helper(helper))));
                path.extend(
                    right.and_then(|helper| network.endpoint_position(Endpoint::Helper(helper))),
                );
                path.extend(network.endpoint_position(Endpoint::Visual(link.target)));

                RenderLink {
                    key: link.key.clone(),
                    source: link.source,
                    target: link.target,
                    path,
                    caption,
                    color: resolved.get("color").to_owned(),
                    text_color: resolved.get("text-color-external").to_owned(),
                    width: resolved.get_px("shaft-width").unwrap_or(1.0),
                    font_size: resolved.get_px("font-size").unwrap_or(8.0),
                    multiplicity: link.multiplicity(),
                    selected: relationships.iter().any(|relationship| relationship.is_selected()),
                }
            })
            .collect();

        Self {
            nodes,
            links,
            boundaries: boundaries
                .iter()
                .map(|(key, hull)| (key.clone(), hull.clone()))
                .collect(),
        }
    }
}

fn link_style(
    style: &mut StyleResolver,
    relationship: Option<&Relationship>,
    multiplicity: usize,
) -> (ResolvedStyle, String) {
    let Some(relationship) = relationship else {
        return (style.calculate_style(&Selector::relationship()), String::new());
    };

    let resolved = style.for_relationship(relationship);
    let mut caption = resolved.caption(StyledItem::Relationship(relationship));
    if multiplicity > 1 {
        caption = format!("{caption} ×{multiplicity}");
    }
    (resolved, caption)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ClusterNetworkBuilder, ExpansionMap};
    use crate::model::{NodeRecord, RelationshipRecord};

    fn model() -> GraphModel {
        let mut model = GraphModel::default();
        model.add_nodes([
            NodeRecord::new("1").with_label("Person").with_property("name", "Alice"),
            NodeRecord::new("2").with_label("Person").with_property("name", "Bob"),
        ]);
        model
            .add_relationships([
                RelationshipRecord::new("10", "KNOWS", "1", "2"),
                RelationshipRecord::new("11", "LIKES", "2", "1"),
            ])
            .expect("endpoints exist");
        model
    }

    #[test]
    fn captions_and_paths_follow_the_network() {
        let model = model();
        let network = ClusterNetworkBuilder::new(false).build(&model, &ExpansionMap::default(), None);
        let mut style = StyleResolver::default();
        let snapshot = RenderSnapshot::build(&model, &network, &mut style, &BTreeMap::new());

        let captions = snapshot
            .nodes
            .iter()
            .map(|node| node.caption.as_str())
            .collect::<Vec<_>>();
        assert_eq!(captions, vec!["Alice", "Bob"]);
        assert_eq!(snapshot.nodes[0].color, snapshot.nodes[1].color);

        assert_eq!(snapshot.links.len(), 1);
        let link = &snapshot.links[0];
        assert_eq!(link.multiplicity, 2);
        assert_eq!(link.path.len(), 4);
        assert_eq!(link.caption, "KNOWS ×2");
    }

    #[test]
    fn selected_relationship_drives_the_link_caption() {
        let mut model = model();
        model
            .select(crate::model::ItemRef::Relationship("11".into()))
            .expect("relationship exists");
        let network = ClusterNetworkBuilder::new(false).build(&model, &ExpansionMap::default(), None);
        let snapshot =
            RenderSnapshot::build(&model, &network, &mut StyleResolver::default(), &BTreeMap::new());

        assert!(snapshot.links[0].selected);
        assert_eq!(snapshot.links[0].caption, "LIKES ×2");
    }
}
