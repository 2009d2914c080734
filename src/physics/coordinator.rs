use eframe::egui::Vec2;
use tracing::debug;

use crate::cluster::{ClusterNetwork, Endpoint, circle_position};
use crate::config::{LayoutConfig, ScheduleConfig};
use crate::util::stable_jitter;

use super::{Body, ForceLayoutEngine, Spring, TickReport};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameReport {
    pub primary: TickReport,
    pub helper: TickReport,
}

impl FrameReport {
    pub fn moved(&self) -> bool {
        self.primary.steps > 0 || self.helper.steps > 0
    }
}

/// Advances the primary simulation and then the helper simulation once per
/// frame. Helper anchors are copied from the primary result every frame.
pub struct LayoutCoordinator {
    primary: ForceLayoutEngine,
    helper: ForceLayoutEngine,
    schedule: ScheduleConfig,
}

impl LayoutCoordinator {
    pub fn new(primary: LayoutConfig, helper: LayoutConfig, schedule: ScheduleConfig) -> Self {
        Self {
            primary: ForceLayoutEngine::new(primary),
            helper: ForceLayoutEngine::new(helper),
            schedule,
        }
    }

    pub fn primary(&self) -> &ForceLayoutEngine {
        &self.primary
    }

    pub fn helper(&self) -> &ForceLayoutEngine {
        &self.helper
    }

    pub fn set_bounds(&mut self, size: Vec2) {
        self.primary.set_bounds(size);
        self.helper.set_bounds(size);
    }

    pub fn is_settled(&self) -> bool {
        self.primary.is_settled() && self.helper.is_settled()
    }

    pub fn reheat(&mut self) {
        self.primary.reheat();
        self.helper.reheat();
    }

    /// Reloads both simulations from a freshly built network. Unplaced nodes
    /// are arranged on a ring around the center first, and unplaced helpers
    /// along their link.
    pub fn rebuild(&mut self, network: &mut ClusterNetwork) {
        self.place_unplaced(network);
        let primary = *self.primary.config();
        let helper = *self.helper.config();
        self.primary
            .load(primary_bodies(network, &primary), primary_springs(network, &primary));
        self.helper
            .load(helper_bodies(network, &helper), helper_springs(network, &helper));
        debug!(
            bodies = self.primary.bodies().len(),
            helpers = network.helper_nodes().len(),
            "layout reloaded"
        );
    }

    fn place_unplaced(&self, network: &mut ClusterNetwork) {
        let center = self.primary.center();
        let link_distance = self.primary.config().link_distance;
        let unplaced = network.nodes().iter().filter(|node| !node.placed).count();

        let mut slot = 0;
        for node in network.nodes_mut() {
            if node.placed {
                continue;
            }
            node.position = circle_position(slot, unplaced, center, link_distance)
                + stable_jitter(&node.key, link_distance * 0.25);
            node.placed = true;
            slot += 1;
        }

        let ends = network
            .helper_links()
            .iter()
            .filter_map(|segment| match (segment.source, segment.target) {
                (Endpoint::Visual(visual), Endpoint::Helper(helper))
                | (Endpoint::Helper(helper), Endpoint::Visual(visual)) => Some((helper, visual)),
                _ => None,
            })
            .filter_map(|(helper, visual)| {
                network
                    .nodes()
                    .get(visual)
                    .map(|node| (helper, node.position))
            })
            .collect::<Vec<_>>();
        for (helper, anchor) in ends {
            if let Some(node) = network.helper_nodes_mut().get_mut(helper)
                && !node.placed
            {
                node.position = anchor + stable_jitter(&node.id, link_distance * 0.5);
                node.placed = true;
            }
        }
    }

    /// One frame: a time-boxed primary tick, positions copied into the
    /// network, then one helper step against the new anchors.
    pub fn frame(&mut self, network: &mut ClusterNetwork) -> FrameReport {
        let primary = self.primary.tick(&self.schedule);
        if primary.steps > 0 {
            for (node, body) in network.nodes_mut().iter_mut().zip(self.primary.bodies()) {
                node.position = body.position;
            }
            self.helper.reheat();
        }

        let anchors = network.nodes().len();
        for (index, node) in network.nodes().iter().enumerate() {
            if let Some(body) = self.helper.body_mut(index) {
                body.position = node.position;
            }
        }
        let helper = self.helper.run_steps(1);
        for (offset, helper_node) in network.helper_nodes_mut().iter_mut().enumerate() {
            if let Some(body) = self.helper.bodies().get(anchors + offset) {
                helper_node.position = body.position;
            }
        }

        FrameReport { primary, helper }
    }

    pub fn drag(&mut self, network: &mut ClusterNetwork, index: usize, position: Vec2) {
        self.primary.drag(index, position);
        if let Some(node) = network.nodes_mut().get_mut(index) {
            node.position = position;
            node.fixed = true;
        }
        if let Some(body) = self.helper.body_mut(index) {
            body.position = position;
        }
        self.helper.reheat();
    }

    pub fn set_fixed(&mut self, network: &mut ClusterNetwork, index: usize, fixed: bool) {
        self.primary.set_fixed(index, fixed);
        if let Some(node) = network.nodes_mut().get_mut(index) {
            node.fixed = fixed;
        }
    }
}

fn primary_bodies(network: &ClusterNetwork, config: &LayoutConfig) -> Vec<Body> {
    network
        .nodes()
        .iter()
        .map(|node| {
            let charge = if node.is_group() {
                config.group_charge
            } else {
                config.charge
            };
            Body {
                position: node.position,
                velocity: Vec2::ZERO,
                radius: node.radius,
                charge,
                weight: (node.size as f32).max(node.link_count as f32).max(1.0),
                degree: node.link_count,
                fixed: node.fixed,
            }
        })
        .collect()
}

fn primary_springs(network: &ClusterNetwork, config: &LayoutConfig) -> Vec<Spring> {
    network
        .links()
        .iter()
        .map(|link| {
            let nodes = network.nodes();
            let reach = nodes[link.source].radius + nodes[link.target].radius;
            let (gap, strength) = if link.same_group {
                (config.link_distance, config.same_group_strength)
            } else {
                (config.cross_group_distance, config.cross_group_strength)
            };
            Spring {
                from: link.source,
                to: link.target,
                distance: reach + gap,
                strength,
            }
        })
        .collect()
}

/// Visible nodes first, as fixed anchors, then the helpers.
fn helper_bodies(network: &ClusterNetwork, config: &LayoutConfig) -> Vec<Body> {
    let anchors = network.nodes().iter().map(|node| Body {
        fixed: true,
        ..Body::new(node.position, node.radius, config.charge)
    });
    let helpers = network
        .helper_nodes()
        .iter()
        .map(|helper| Body::new(helper.position, 0.0, config.charge));
    anchors.chain(helpers).collect()
}

fn helper_springs(network: &ClusterNetwork, config: &LayoutConfig) -> Vec<Spring> {
    let anchors = network.nodes().len();
    let index = |endpoint: Endpoint| match endpoint {
        Endpoint::Visual(index) => index,
        Endpoint::Helper(index) => anchors + index,
    };

    network
        .helper_links()
        .iter()
        .map(|segment| {
            let link = &network.links()[segment.link];
            let strength = if link.same_group {
                config.same_group_strength
            } else {
                config.cross_group_strength
            };
            Spring {
                from: index(segment.source),
                to: index(segment.target),
                distance: config.link_distance,
                strength,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use eframe::egui::vec2;

    use super::*;
    use crate::cluster::{ClusterNetworkBuilder, ExpansionMap};
    use crate::config::VizConfig;
    use crate::model::{GraphModel, NodeRecord, RelationshipRecord};

    fn network() -> ClusterNetwork {
        let mut model = GraphModel::default();
        model.add_nodes([NodeRecord::new("a"), NodeRecord::new("b"), NodeRecord::new("c")]);
        model
            .add_relationships([
                RelationshipRecord::new("r1", "LINKS", "a", "b"),
                RelationshipRecord::new("r2", "LINKS", "b", "c"),
            ])
            .expect("endpoints exist");
        ClusterNetworkBuilder::new(false).build(&model, &ExpansionMap::default(), None)
    }

    fn coordinator() -> LayoutCoordinator {
        let config = VizConfig::default();
        let mut coordinator =
            LayoutCoordinator::new(config.layout, config.helper_layout, config.schedule);
        coordinator.set_bounds(vec2(800.0, 600.0));
        coordinator
    }

    #[test]
    fn rebuild_places_nodes_and_helpers() {
        let mut network = network();
        let mut coordinator = coordinator();
        coordinator.rebuild(&mut network);

        assert!(network.nodes().iter().all(|node| node.placed));
        assert!(network.helper_nodes().iter().all(|helper| helper.placed));
        assert_eq!(coordinator.primary().bodies().len(), 3);
        assert_eq!(coordinator.helper().bodies().len(), 3 + 4);
        assert_eq!(coordinator.helper().springs().len(), 6);
    }

    #[test]
    fn frame_moves_nodes_and_keeps_anchors_in_sync() {
        let mut network = network();
        let mut coordinator = coordinator();
        coordinator.rebuild(&mut network);
        let before = network.nodes()[0].position;

        let report = coordinator.frame(&mut network);
        assert!(report.primary.steps > 0);
        assert_eq!(report.helper.steps, 1);
        assert_ne!(network.nodes()[0].position, before);
        for (node, anchor) in network.nodes().iter().zip(coordinator.helper().bodies()) {
            assert_eq!(node.position, anchor.position);
            assert!(anchor.fixed);
        }
    }

    #[test]
    fn dragged_node_stays_pinned_across_frames() {
        let mut network = network();
        let mut coordinator = coordinator();
        coordinator.rebuild(&mut network);

        coordinator.drag(&mut network, 1, vec2(42.0, 24.0));
        for _ in 0..3 {
            coordinator.frame(&mut network);
        }
        assert_eq!(network.nodes()[1].position, vec2(42.0, 24.0));
        assert!(network.nodes()[1].fixed);

        coordinator.set_fixed(&mut network, 1, false);
        assert!(!coordinator.primary().bodies()[1].fixed);
    }
}
