//! Derives the displayed network from the model and the per-group expansion
//! states: group nodes, aggregate links and their helper routing nodes.

mod hull;

use std::collections::{BTreeMap, HashMap, HashSet};

use eframe::egui::{Vec2, vec2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{GraphModel, NodeId, RelationshipId};
use crate::util::{centroid, stable_jitter};

pub use hull::{contains, convex_hull, polygon_centroid, scale_polygon};

const GROUP_RADIUS_STEP: f32 = 6.0;
const EMERGE_JITTER: f32 = 2.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionState {
    #[default]
    Collapsed,
    PartiallyExpanded,
    FullyExpanded,
}

impl ExpansionState {
    pub fn as_index(self) -> u8 {
        match self {
            Self::Collapsed => 0,
            Self::PartiallyExpanded => 1,
            Self::FullyExpanded => 2,
        }
    }

    /// State after one click. Groups with fewer than `threshold` external
    /// links skip the partially expanded view.
    pub fn next(self, external_links: usize, threshold: usize) -> Self {
        if external_links < threshold {
            return match self {
                Self::Collapsed => Self::FullyExpanded,
                Self::PartiallyExpanded | Self::FullyExpanded => Self::Collapsed,
            };
        }

        match self {
            Self::Collapsed => Self::PartiallyExpanded,
            Self::PartiallyExpanded => Self::FullyExpanded,
            Self::FullyExpanded => Self::Collapsed,
        }
    }
}

/// Expansion state per group key, plus nodes forced to show individually.
#[derive(Clone, Debug, Default)]
pub struct ExpansionMap {
    states: HashMap<String, ExpansionState>,
    initial: ExpansionState,
    overrides: HashSet<NodeId>,
}

impl ExpansionMap {
    pub fn new(initial: ExpansionState) -> Self {
        Self {
            initial,
            ..Self::default()
        }
    }

    pub fn state(&self, group: &str) -> ExpansionState {
        self.states.get(group).copied().unwrap_or(self.initial)
    }

    pub fn set(&mut self, group: impl Into<String>, state: ExpansionState) {
        self.states.insert(group.into(), state);
    }

    pub fn toggle(&mut self, group: &str, external_links: usize, threshold: usize) -> ExpansionState {
        let next = self.state(group).next(external_links, threshold);
        self.set(group, next);
        next
    }

    pub fn set_override(&mut self, node: NodeId, individual: bool) {
        if individual {
            self.overrides.insert(node);
        } else {
            self.overrides.remove(&node);
        }
    }

    pub fn is_overridden(&self, node: &NodeId) -> bool {
        self.overrides.contains(node)
    }

    /// Drops overrides for nodes the model no longer has.
    pub fn retain_overrides(&mut self, model: &GraphModel) {
        self.overrides.retain(|node| model.contains_node(node));
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum VisualKind {
    Node(NodeId),
    Group(String),
}

#[derive(Clone, Debug)]
pub struct VisualNode {
    /// `n:<node id>` or `g:<group key>:<state>`.
    pub key: String,
    pub kind: VisualKind,
    /// Changes whenever the entity must be treated as new by the renderer.
    pub identity: u64,
    pub group_key: Option<String>,
    pub position: Vec2,
    pub placed: bool,
    pub radius: f32,
    /// Number of model nodes represented.
    pub size: usize,
    /// Distinct aggregate links touching this node.
    pub link_count: usize,
    pub fixed: bool,
}

impl VisualNode {
    pub fn is_group(&self) -> bool {
        matches!(self.kind, VisualKind::Group(_))
    }

    pub fn node_id(&self) -> Option<&NodeId> {
        match &self.kind {
            VisualKind::Node(id) => Some(id),
            VisualKind::Group(_) => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Group {
    pub key: String,
    pub members: Vec<NodeId>,
    /// Members represented by the group node rather than shown individually.
    pub folded: Vec<NodeId>,
    pub external_link_count: usize,
    pub state: ExpansionState,
}

impl Group {
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// All relationships between one unordered pair of visible nodes.
#[derive(Clone, Debug)]
pub struct AggregateLink {
    pub key: String,
    pub source: usize,
    pub target: usize,
    pub relationships: Vec<RelationshipId>,
    pub same_group: bool,
}

impl AggregateLink {
    pub fn multiplicity(&self) -> usize {
        self.relationships.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HelperSide {
    Left,
    Right,
}

#[derive(Clone, Debug)]
pub struct HelperNode {
    pub id: String,
    pub link: usize,
    pub side: HelperSide,
    pub position: Vec2,
    pub placed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Visual(usize),
    Helper(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Segment {
    Left,
    Middle,
    Right,
}

#[derive(Clone, Debug)]
pub struct HelperLink {
    pub id: String,
    pub link: usize,
    pub segment: Segment,
    pub source: Endpoint,
    pub target: Endpoint,
}

#[derive(Clone, Debug, Default)]
pub struct ClusterNetwork {
    nodes: Vec<VisualNode>,
    index_by_key: HashMap<String, usize>,
    links: Vec<AggregateLink>,
    helper_nodes: Vec<HelperNode>,
    helper_links: Vec<HelperLink>,
    groups: BTreeMap<String, Group>,
    membership: HashMap<NodeId, usize>,
    next_identity: u64,
}

impl ClusterNetwork {
    pub fn nodes(&self) -> &[VisualNode] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [VisualNode] {
        &mut self.nodes
    }

    pub fn links(&self) -> &[AggregateLink] {
        &self.links
    }

    pub fn helper_nodes(&self) -> &[HelperNode] {
        &self.helper_nodes
    }

    pub(crate) fn helper_nodes_mut(&mut self) -> &mut [HelperNode] {
        &mut self.helper_nodes
    }

    pub fn helper_links(&self) -> &[HelperLink] {
        &self.helper_links
    }

    pub fn groups(&self) -> &BTreeMap<String, Group> {
        &self.groups
    }

    pub fn group(&self, key: &str) -> Option<&Group> {
        self.groups.get(key)
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.index_by_key.get(key).copied()
    }

    pub fn node(&self, key: &str) -> Option<&VisualNode> {
        self.index_of(key).map(|index| &self.nodes[index])
    }

    /// Visible entity currently representing a model node.
    pub fn visual_for(&self, node: &NodeId) -> Option<usize> {
        self.membership.get(node).copied()
    }

    pub fn endpoint_position(&self, endpoint: Endpoint) -> Option<Vec2> {
        match endpoint {
            Endpoint::Visual(index) => self.nodes.get(index).map(|node| node.position),
            Endpoint::Helper(index) => self.helper_nodes.get(index).map(|helper| helper.position),
        }
    }

    /// Degree of each visible node counted in aggregate links.
    pub fn degrees(&self) -> Vec<usize> {
        self.nodes.iter().map(|node| node.link_count).collect()
    }

    /// Scaled convex hull around a group's members, for groups of three or
    /// more. Shown members use their displayed position, folded ones the last
    /// position the model recorded for them. Members never laid out are
    /// spread inside the group node that holds them.
    pub fn group_boundary(&self, model: &GraphModel, key: &str, scale: f32) -> Option<Vec<Vec2>> {
        let group = self.groups.get(key)?;
        if group.size() < 3 {
            return None;
        }

        let mut holder_center = None;
        let mut points = group
            .members
            .iter()
            .filter_map(|member| {
                let visual = self.membership.get(member).map(|&index| &self.nodes[index]);
                match (visual, model.node(member)) {
                    (Some(visual), _) if !visual.is_group() && visual.placed => {
                        Some(visual.position)
                    }
                    (_, Some(node)) if node.placed => Some(node.position),
                    (Some(holder), _) if holder.is_group() && holder.placed => {
                        holder_center = Some(holder.position);
                        Some(holder.position + stable_jitter(member.as_str(), holder.radius * 0.5))
                    }
                    _ => None,
                }
            })
            .collect::<Vec<_>>();
        points.extend(holder_center);

        let hull = convex_hull(&points);
        if hull.is_empty() {
            return None;
        }
        Some(scale_polygon(&hull, scale.max(1.0)))
    }
}

pub fn node_key(id: &NodeId) -> String {
    format!("n:{id}")
}

pub fn group_node_key(group: &str, state: ExpansionState) -> String {
    format!("g:{group}:{}", state.as_index())
}

pub fn group_radius(base: f32, size: usize) -> f32 {
    base + (size as f32).sqrt() * GROUP_RADIUS_STEP
}

#[derive(Clone, Copy, Debug)]
pub struct ClusterNetworkBuilder {
    clustering: bool,
}

impl ClusterNetworkBuilder {
    pub fn new(clustering: bool) -> Self {
        Self { clustering }
    }

    pub fn build(
        &self,
        model: &GraphModel,
        expansion: &ExpansionMap,
        previous: Option<&ClusterNetwork>,
    ) -> ClusterNetwork {
        let mut network = ClusterNetwork {
            next_identity: previous.map_or(1, |prev| prev.next_identity),
            ..ClusterNetwork::default()
        };

        let groups = if self.clustering {
            self.collect_groups(model, expansion)
        } else {
            BTreeMap::new()
        };

        let prior_groups = previous
            .map(|prev| {
                prev.nodes
                    .iter()
                    .filter_map(|node| match &node.kind {
                        VisualKind::Group(key) => Some((key.clone(), node)),
                        VisualKind::Node(_) => None,
                    })
                    .collect::<HashMap<_, _>>()
            })
            .unwrap_or_default();

        let mut group_index = HashMap::<String, usize>::new();
        for node in model.nodes() {
            let group = node
                .group_key
                .as_ref()
                .and_then(|key| groups.get(key));
            let folded = group.is_some_and(|group| group.folded.contains(&node.id));

            if folded && let Some(group) = group {
                let index = match group_index.get(&group.key) {
                    Some(&index) => index,
                    None => {
                        let visual = Self::group_visual(
                            &mut network,
                            model,
                            group,
                            prior_groups.get(&group.key).copied(),
                        );
                        let index = network.push_node(visual);
                        group_index.insert(group.key.clone(), index);
                        index
                    }
                };
                network.membership.insert(node.id.clone(), index);
                continue;
            }

            let key = node_key(&node.id);
            let identity = previous
                .and_then(|prev| prev.node(&key))
                .map(|prior| prior.identity)
                .unwrap_or_else(|| network.fresh_identity());

            let emerged_from = previous.and_then(|prev| {
                let index = prev.visual_for(&node.id)?;
                let prior = &prev.nodes[index];
                (prior.is_group() && prior.placed).then_some(prior.position)
            });
            let (position, placed) = match emerged_from {
                Some(center) => (center + stable_jitter(node.id.as_str(), EMERGE_JITTER), true),
                None => (node.position, node.placed),
            };

            let index = network.push_node(VisualNode {
                key,
                kind: VisualKind::Node(node.id.clone()),
                identity,
                group_key: node.group_key.clone(),
                position,
                placed,
                radius: node.radius,
                size: 1,
                link_count: 0,
                fixed: node.fixed,
            });
            network.membership.insert(node.id.clone(), index);
        }

        // Groups whose node survives even though every member is shown.
        for group in groups.values() {
            if group.state == ExpansionState::PartiallyExpanded
                && !group_index.contains_key(&group.key)
            {
                let visual = Self::group_visual(
                    &mut network,
                    model,
                    group,
                    prior_groups.get(&group.key).copied(),
                );
                let index = network.push_node(visual);
                group_index.insert(group.key.clone(), index);
            }
        }

        network.groups = groups;
        network.collect_links(model);
        network.attach_helpers(previous);

        debug!(
            nodes = network.nodes.len(),
            links = network.links.len(),
            helpers = network.helper_nodes.len(),
            groups = network.groups.len(),
            "cluster network rebuilt"
        );
        network
    }

    fn collect_groups(&self, model: &GraphModel, expansion: &ExpansionMap) -> BTreeMap<String, Group> {
        let mut external = HashMap::<&str, usize>::new();
        let mut boundary = HashSet::<&NodeId>::new();
        for relationship in model.relationships() {
            let start = model.node(&relationship.start).and_then(|node| node.group_key.as_deref());
            let end = model.node(&relationship.end).and_then(|node| node.group_key.as_deref());
            if start == end {
                continue;
            }
            for (key, member) in [(start, &relationship.start), (end, &relationship.end)] {
                if let Some(key) = key {
                    *external.entry(key).or_default() += 1;
                    boundary.insert(member);
                }
            }
        }

        model
            .groups()
            .into_iter()
            .map(|(key, members)| {
                let state = expansion.state(&key);
                let folded = members
                    .iter()
                    .filter(|member| !expansion.is_overridden(member))
                    .filter(|member| match state {
                        ExpansionState::Collapsed => true,
                        ExpansionState::PartiallyExpanded => !boundary.contains(member),
                        ExpansionState::FullyExpanded => false,
                    })
                    .cloned()
                    .collect();
                let group = Group {
                    external_link_count: external.get(key.as_str()).copied().unwrap_or(0),
                    key: key.clone(),
                    members,
                    folded,
                    state,
                };
                (key, group)
            })
            .collect()
    }

    fn group_visual(
        network: &mut ClusterNetwork,
        model: &GraphModel,
        group: &Group,
        prior: Option<&VisualNode>,
    ) -> VisualNode {
        let key = group_node_key(&group.key, group.state);
        let base_radius = group
            .members
            .iter()
            .filter_map(|member| model.node(member))
            .map(|node| node.radius)
            .fold(0.0f32, f32::max);

        let (identity, position, placed) = match prior {
            Some(prior) if prior.key == key => (prior.identity, prior.position, prior.placed),
            Some(prior) => (network.fresh_identity(), prior.position, prior.placed),
            None => {
                let seed = centroid(
                    group
                        .members
                        .iter()
                        .filter_map(|member| model.node(member))
                        .filter(|node| node.placed)
                        .map(|node| node.position),
                );
                (
                    network.fresh_identity(),
                    seed.unwrap_or(Vec2::ZERO),
                    seed.is_some(),
                )
            }
        };

        VisualNode {
            key,
            kind: VisualKind::Group(group.key.clone()),
            identity,
            group_key: Some(group.key.clone()),
            position,
            placed,
            radius: group_radius(base_radius, group.size()),
            size: group.size(),
            link_count: 0,
            fixed: false,
        }
    }
}

impl ClusterNetwork {
    fn fresh_identity(&mut self) -> u64 {
        let identity = self.next_identity;
        self.next_identity += 1;
        identity
    }

    fn push_node(&mut self, node: VisualNode) -> usize {
        let index = self.nodes.len();
        self.index_by_key.insert(node.key.clone(), index);
        self.nodes.push(node);
        index
    }

    fn collect_links(&mut self, model: &GraphModel) {
        let mut by_pair = HashMap::<String, usize>::new();
        for relationship in model.relationships() {
            let (Some(&source), Some(&target)) = (
                self.membership.get(&relationship.start),
                self.membership.get(&relationship.end),
            ) else {
                continue;
            };
            if source == target {
                continue;
            }

            let (first, second) = {
                let a = &self.nodes[source].key;
                let b = &self.nodes[target].key;
                if a <= b { (a, b) } else { (b, a) }
            };
            let pair = format!("{first}|{second}");

            match by_pair.get(&pair) {
                Some(&index) => self.links[index].relationships.push(relationship.id.clone()),
                None => {
                    let same_group = self.nodes[source].group_key.is_some()
                        && self.nodes[source].group_key == self.nodes[target].group_key;
                    by_pair.insert(pair.clone(), self.links.len());
                    self.links.push(AggregateLink {
                        key: pair,
                        source,
                        target,
                        relationships: vec![relationship.id.clone()],
                        same_group,
                    });
                    self.nodes[source].link_count += 1;
                    self.nodes[target].link_count += 1;
                }
            }
        }
    }

    fn attach_helpers(&mut self, previous: Option<&ClusterNetwork>) {
        let prior = previous
            .map(|prev| {
                prev.helper_nodes
                    .iter()
                    .filter(|helper| helper.placed)
                    .map(|helper| (helper.id.as_str(), helper.position))
                    .collect::<HashMap<_, _>>()
            })
            .unwrap_or_default();

        for (index, link) in self.links.iter().enumerate() {
            let source = &self.nodes[link.source];
            let target = &self.nodes[link.target];
            let left = self.helper_nodes.len();
            let right = left + 1;

            for (id, side, fraction) in [
                (format!("_lh_{}", link.key), HelperSide::Left, 1.0 / 3.0),
                (format!("_rh_{}", link.key), HelperSide::Right, 2.0 / 3.0),
            ] {
                let (position, placed) = match prior.get(id.as_str()) {
                    Some(&position) => (position, true),
                    None if source.placed && target.placed => {
                        let along = source.position + (target.position - source.position) * fraction;
                        (along + stable_jitter(&id, 1.0), true)
                    }
                    None => (Vec2::ZERO, false),
                };
                self.helper_nodes.push(HelperNode {
                    id,
                    link: index,
                    side,
                    position,
                    placed,
                });
            }

            for (prefix, segment, from, to) in [
                ("l", Segment::Left, Endpoint::Visual(link.source), Endpoint::Helper(left)),
                ("m", Segment::Middle, Endpoint::Helper(left), Endpoint::Helper(right)),
                ("r", Segment::Right, Endpoint::Helper(right), Endpoint::Visual(link.target)),
            ] {
                self.helper_links.push(HelperLink {
                    id: format!("{prefix}{}", link.key),
                    link: index,
                    segment,
                    source: from,
                    target: to,
                });
            }
        }
    }
}

/// Deterministic ring placement for nodes that have no position yet.
pub fn circle_position(index: usize, count: usize, center: Vec2, link_distance: f32) -> Vec2 {
    let count = count.max(1);
    let radius = (count as f32 * link_distance / std::f32::consts::TAU).max(link_distance);
    let angle = index as f32 / count as f32 * std::f32::consts::TAU;
    center + vec2(angle.cos(), angle.sin()) * radius
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::model::{NodeRecord, RelationshipRecord};

    fn member(id: &str, group: &str) -> NodeRecord {
        NodeRecord::new(id).with_property("filename", group)
    }

    /// Group `a` = {a1, a2, a3} linked internally, with a1 and a2 linked out to
    /// b1 in group `b`; `c1` is ungrouped.
    fn model() -> GraphModel {
        let mut model = GraphModel::default();
        model.add_nodes([
            member("a1", "a"),
            member("a2", "a"),
            member("a3", "a"),
            member("b1", "b"),
            NodeRecord::new("c1"),
        ]);
        model
            .add_relationships([
                RelationshipRecord::new("r1", "CALLS", "a1", "a2"),
                RelationshipRecord::new("r2", "CALLS", "a2", "a3"),
                RelationshipRecord::new("r3", "USES", "a1", "b1"),
                RelationshipRecord::new("r4", "USES", "a2", "b1"),
                RelationshipRecord::new("r5", "USES", "b1", "c1"),
            ])
            .expect("endpoints exist");
        for (index, id) in ["a1", "a2", "a3", "b1", "c1"].into_iter().enumerate() {
            model
                .set_position(&NodeId::new(id), vec2(index as f32 * 10.0, 0.0))
                .expect("known node");
        }
        model
    }

    fn keys(network: &ClusterNetwork) -> Vec<&str> {
        network.nodes().iter().map(|node| node.key.as_str()).collect()
    }

    #[test]
    fn collapsed_groups_fold_members_and_merge_parallel_links() {
        let model = model();
        let network = ClusterNetworkBuilder::new(true).build(&model, &ExpansionMap::default(), None);

        assert_eq!(keys(&network), vec!["g:a:0", "g:b:0", "n:c1"]);
        let group = network.group("a").expect("group a");
        assert_eq!(group.size(), 3);
        assert_eq!(group.external_link_count, 2);

        // r1 and r2 are internal to `a`; r3 and r4 merge into one link.
        assert_eq!(network.links().len(), 2);
        let ab = &network.links()[0];
        assert_eq!(ab.key, "g:a:0|g:b:0");
        assert_eq!(ab.multiplicity(), 2);
        assert!(!ab.same_group);
    }

    #[test]
    fn every_link_gets_two_helpers_and_three_segments() {
        let model = model();
        let network = ClusterNetworkBuilder::new(true).build(&model, &ExpansionMap::default(), None);

        assert_eq!(network.helper_nodes().len(), network.links().len() * 2);
        assert_eq!(network.helper_links().len(), network.links().len() * 3);
        let ids = network
            .helper_links()
            .iter()
            .map(|link| link.id.as_str())
            .collect::<Vec<_>>();
        assert!(ids.contains(&"lg:a:0|g:b:0"));
        assert!(ids.contains(&"mg:a:0|g:b:0"));
        assert!(ids.contains(&"rg:a:0|g:b:0"));
        assert_eq!(network.helper_nodes()[0].id, "_lh_g:a:0|g:b:0");
        assert_eq!(network.helper_links()[0].source, Endpoint::Visual(network.links()[0].source));
    }

    #[test]
    fn partial_expansion_shows_boundary_members() {
        let model = model();
        let mut expansion = ExpansionMap::default();
        expansion.set("a", ExpansionState::PartiallyExpanded);
        let network = ClusterNetworkBuilder::new(true).build(&model, &expansion, None);

        assert_eq!(keys(&network), vec!["n:a1", "n:a2", "g:a:1", "g:b:0", "n:c1"]);
        assert_eq!(network.group("a").map(|group| group.folded.clone()), Some(vec![NodeId::new("a3")]));
        // a2 -> a3 now connects a shown member to its own group node.
        let internal = network
            .links()
            .iter()
            .find(|link| link.key == "g:a:1|n:a2")
            .expect("member to group link");
        assert!(internal.same_group);
    }

    #[test]
    fn full_expansion_and_flat_mode_show_every_node() {
        let model = model();
        let mut expansion = ExpansionMap::default();
        expansion.set("a", ExpansionState::FullyExpanded);
        expansion.set("b", ExpansionState::FullyExpanded);
        let expanded = ClusterNetworkBuilder::new(true).build(&model, &expansion, None);
        let flat = ClusterNetworkBuilder::new(false).build(&model, &ExpansionMap::default(), None);

        for network in [&expanded, &flat] {
            assert_eq!(keys(network), vec!["n:a1", "n:a2", "n:a3", "n:b1", "n:c1"]);
            assert_eq!(network.links().len(), 5);
        }
        assert!(flat.groups().is_empty());
    }

    #[test]
    fn overridden_node_leaves_its_collapsed_group() {
        let model = model();
        let mut expansion = ExpansionMap::default();
        expansion.set_override(NodeId::new("a3"), true);
        let network = ClusterNetworkBuilder::new(true).build(&model, &expansion, None);
        assert!(network.node("n:a3").is_some());
        assert!(network.node("g:a:0").is_some());
    }

    #[test]
    fn self_loops_after_grouping_are_dropped() {
        let mut model = model();
        model
            .add_relationships([RelationshipRecord::new("loop", "SELF", "c1", "c1")])
            .expect("endpoints exist");
        let network = ClusterNetworkBuilder::new(true).build(&model, &ExpansionMap::default(), None);
        assert!(network.links().iter().all(|link| link.source != link.target));
    }

    #[test]
    fn identities_survive_unchanged_rebuilds_only() {
        let model = model();
        let builder = ClusterNetworkBuilder::new(true);
        let mut expansion = ExpansionMap::default();
        let first = builder.build(&model, &expansion, None);
        let second = builder.build(&model, &expansion, Some(&first));

        let identity = |network: &ClusterNetwork, key: &str| network.node(key).map(|node| node.identity);
        assert_eq!(identity(&first, "g:a:0"), identity(&second, "g:a:0"));
        assert_eq!(identity(&first, "n:c1"), identity(&second, "n:c1"));
        let helpers = |network: &ClusterNetwork| {
            network
                .helper_nodes()
                .iter()
                .map(|helper| helper.id.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(helpers(&first), helpers(&second));

        expansion.set("b", ExpansionState::PartiallyExpanded);
        let third = builder.build(&model, &expansion, Some(&second));
        let old = second.node("g:b:0").expect("collapsed b");
        let new = third.node("g:b:1").expect("partial b");
        assert_ne!(old.identity, new.identity);
        assert_eq!(old.position, new.position);
        assert_eq!(old.size, new.size);
    }

    #[test]
    fn nodes_emerging_from_a_group_start_near_it() {
        let model = model();
        let builder = ClusterNetworkBuilder::new(true);
        let mut expansion = ExpansionMap::default();
        let mut collapsed = builder.build(&model, &expansion, None);
        let group = collapsed.index_of("g:a:0").expect("group a");
        collapsed.nodes_mut()[group].position = vec2(500.0, 500.0);

        expansion.set("a", ExpansionState::FullyExpanded);
        let expanded = builder.build(&model, &expansion, Some(&collapsed));
        for id in ["n:a1", "n:a2", "n:a3"] {
            let node = expanded.node(id).expect("member shown");
            assert!((node.position - vec2(500.0, 500.0)).length() <= EMERGE_JITTER * 2.0);
        }
    }

    #[test]
    fn new_group_is_seeded_at_member_centroid() {
        let model = model();
        let network = ClusterNetworkBuilder::new(true).build(&model, &ExpansionMap::default(), None);
        let group = network.node("g:a:0").expect("group a");
        assert!(group.placed);
        assert_eq!(group.position, vec2(10.0, 0.0));
        assert!(group.radius > model.nodes()[0].radius);
    }

    #[test]
    fn low_external_link_group_skips_partial_state() {
        let mut expansion = ExpansionMap::default();
        assert_eq!(expansion.toggle("g", 1, 2), ExpansionState::FullyExpanded);
        assert_eq!(expansion.toggle("g", 1, 2), ExpansionState::Collapsed);
        assert_eq!(expansion.toggle("g", 1, 2), ExpansionState::FullyExpanded);
    }

    #[test]
    fn collapsed_group_boundary_contains_members() {
        let mut model = model();
        model
            .set_position(&NodeId::new("a2"), vec2(10.0, 25.0))
            .expect("known node");
        let network = ClusterNetworkBuilder::new(true).build(&model, &ExpansionMap::default(), None);
        let boundary = network
            .group_boundary(&model, "a", 1.15)
            .expect("three members");
        for id in ["a1", "a2", "a3"] {
            let position = model.node(&NodeId::new(id)).expect("member").position;
            assert!(contains(&boundary, position));
        }
        assert!(network.group_boundary(&model, "b", 1.15).is_none());
    }

    #[test]
    fn circle_positions_are_distinct() {
        let a = circle_position(0, 4, Vec2::ZERO, 20.0);
        let b = circle_position(1, 4, Vec2::ZERO, 20.0);
        assert!((a - b).length() > 1.0);
    }

    proptest! {
        #[test]
        fn prop_expansion_cycles(external in 0usize..6, clicks in 1usize..12) {
            let threshold = 2;
            let mut state = ExpansionState::Collapsed;
            let mut visited = Vec::new();
            for _ in 0..clicks {
                state = state.next(external, threshold);
                visited.push(state.as_index());
            }

            let cycle: &[u8] = if external >= threshold { &[1, 2, 0] } else { &[2, 0] };
            for (click, index) in visited.iter().enumerate() {
                prop_assert_eq!(*index, cycle[click % cycle.len()]);
            }
        }
    }
}
