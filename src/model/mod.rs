//! Node/relationship store with selection and expansion bookkeeping.
//!
//! Entities live in flat tables keyed by id; relationships only hold endpoint
//! ids. Every mutation validates its inputs before touching the tables so a
//! failed call leaves the model as it was.

mod records;
mod search;
mod stats;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use eframe::egui::Vec2;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, VizError};

pub use records::{
    Neighbourhood, NodeId, NodeRecord, PropertyEntry, RelationshipId, RelationshipRecord,
    value_text,
};
pub use stats::GraphStats;

pub const DEFAULT_NODE_RADIUS: f32 = 25.0;
pub const CONDITION_PROPERTY: &str = "condition";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ItemRef {
    Node(NodeId),
    Relationship(RelationshipId),
}

#[derive(Clone, Debug)]
pub struct Node {
    pub id: NodeId,
    pub labels: Vec<String>,
    pub properties: Vec<PropertyEntry>,
    pub position: Vec2,
    /// False until the layout has assigned a starting position.
    pub placed: bool,
    pub radius: f32,
    pub fixed: bool,
    pub group_key: Option<String>,
    selected: bool,
    expanded: bool,
}

impl Node {
    fn from_record(record: NodeRecord, group_property: &str) -> Self {
        let mut labels = Vec::with_capacity(record.labels.len());
        for label in record.labels {
            if !labels.contains(&label) {
                labels.push(label);
            }
        }

        let group_key = record
            .properties
            .iter()
            .find(|entry| entry.key == group_property)
            .map(PropertyEntry::text)
            .filter(|key| !key.is_empty());

        Self {
            id: record.id,
            labels,
            properties: record.properties,
            position: Vec2::ZERO,
            placed: false,
            radius: DEFAULT_NODE_RADIUS,
            fixed: false,
            group_key,
            selected: false,
            expanded: false,
        }
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.value)
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn to_record(&self) -> NodeRecord {
        NodeRecord {
            id: self.id.clone(),
            labels: self.labels.clone(),
            properties: self.properties.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Relationship {
    pub id: RelationshipId,
    pub rel_type: String,
    pub start: NodeId,
    pub end: NodeId,
    pub properties: Vec<PropertyEntry>,
    selected: bool,
}

impl Relationship {
    fn from_record(record: RelationshipRecord) -> Self {
        Self {
            id: record.id,
            rel_type: record.rel_type,
            start: record.start_node_id,
            end: record.end_node_id,
            properties: record.properties,
            selected: false,
        }
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.value)
    }

    /// Feature formula gating conditional style rules, if any.
    pub fn presence_condition(&self) -> Option<String> {
        self.property(CONDITION_PROPERTY)
            .map(value_text)
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty())
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn touches(&self, node: &NodeId) -> bool {
        &self.start == node || &self.end == node
    }

    pub fn other_end(&self, node: &NodeId) -> Option<&NodeId> {
        if &self.start == node {
            Some(&self.end)
        } else if &self.end == node {
            Some(&self.start)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug)]
pub struct GraphModel {
    nodes: Vec<Node>,
    node_index: HashMap<NodeId, usize>,
    relationships: Vec<Relationship>,
    relationship_index: HashMap<RelationshipId, usize>,
    expanded_nodes: HashMap<NodeId, Vec<NodeId>>,
    selected: Option<ItemRef>,
    group_property: String,
}

impl Default for GraphModel {
    fn default() -> Self {
        Self::new("filename")
    }
}

impl GraphModel {
    pub fn new(group_property: impl Into<String>) -> Self {
        Self {
            nodes: Vec::new(),
            node_index: HashMap::new(),
            relationships: Vec::new(),
            relationship_index: HashMap::new(),
            expanded_nodes: HashMap::new(),
            selected: None,
            group_property: group_property.into(),
        }
    }

    pub fn group_property(&self) -> &str {
        &self.group_property
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.node_index.get(id).map(|&index| &self.nodes[index])
    }

    pub(crate) fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        let index = *self.node_index.get(id)?;
        Some(&mut self.nodes[index])
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.iter_mut()
    }

    pub fn relationship(&self, id: &RelationshipId) -> Option<&Relationship> {
        self.relationship_index
            .get(id)
            .map(|&index| &self.relationships[index])
    }

    /// Adds unseen nodes; ids already present (or repeated in the batch) are skipped.
    pub fn add_nodes(&mut self, records: impl IntoIterator<Item = NodeRecord>) -> Vec<NodeId> {
        let mut added = Vec::new();
        for record in records {
            if self.node_index.contains_key(&record.id) {
                continue;
            }
            let node = Node::from_record(record, &self.group_property);
            self.node_index.insert(node.id.clone(), self.nodes.len());
            added.push(node.id.clone());
            self.nodes.push(node);
        }
        added
    }

    /// Adds relationships after checking every endpoint; known relationship ids are skipped.
    pub fn add_relationships(
        &mut self,
        records: impl IntoIterator<Item = RelationshipRecord>,
    ) -> Result<Vec<RelationshipId>> {
        let records = records.into_iter().collect::<Vec<_>>();
        for record in &records {
            for endpoint in [&record.start_node_id, &record.end_node_id] {
                if !self.node_index.contains_key(endpoint) {
                    return Err(VizError::unknown_node(endpoint.as_str()));
                }
            }
        }

        Ok(self.insert_relationships(records))
    }

    /// Adds only the relationships whose endpoints are both present, dropping the rest.
    pub fn add_internal_relationships(
        &mut self,
        records: impl IntoIterator<Item = RelationshipRecord>,
    ) -> Vec<RelationshipId> {
        let records = records
            .into_iter()
            .filter(|record| {
                self.node_index.contains_key(&record.start_node_id)
                    && self.node_index.contains_key(&record.end_node_id)
            })
            .collect::<Vec<_>>();
        self.insert_relationships(records)
    }

    fn insert_relationships(&mut self, records: Vec<RelationshipRecord>) -> Vec<RelationshipId> {
        let mut added = Vec::new();
        for record in records {
            if self.relationship_index.contains_key(&record.id) {
                continue;
            }
            let relationship = Relationship::from_record(record);
            self.relationship_index
                .insert(relationship.id.clone(), self.relationships.len());
            added.push(relationship.id.clone());
            self.relationships.push(relationship);
        }
        added
    }

    /// Adds nodes discovered by expanding `parent` and remembers them so a later
    /// collapse can take them away again.
    pub fn add_expanded_nodes(
        &mut self,
        parent: &NodeId,
        records: impl IntoIterator<Item = NodeRecord>,
    ) -> Result<Vec<NodeId>> {
        if !self.contains_node(parent) {
            return Err(VizError::unknown_node(parent.as_str()));
        }

        let added = self.add_nodes(records);
        let entry = self.expanded_nodes.entry(parent.clone()).or_default();
        for id in &added {
            if !entry.contains(id) {
                entry.push(id.clone());
            }
        }
        Ok(added)
    }

    pub fn remove_node(&mut self, id: &NodeId) -> Result<Node> {
        let Some(&index) = self.node_index.get(id) else {
            return Err(VizError::unknown_node(id.as_str()));
        };

        let before = self.relationships.len();
        self.relationships.retain(|relationship| !relationship.touches(id));
        if self.relationships.len() != before {
            self.reindex_relationships();
        }

        let node = self.nodes.remove(index);
        self.reindex_nodes();

        self.expanded_nodes.remove(id);
        for members in self.expanded_nodes.values_mut() {
            members.retain(|member| member != id);
        }
        self.drop_stale_selection();

        debug!(node = %id, "removed node");
        Ok(node)
    }

    pub fn remove_relationship(&mut self, id: &RelationshipId) -> Result<Relationship> {
        let Some(&index) = self.relationship_index.get(id) else {
            return Err(VizError::unknown_relationship(id.as_str()));
        };

        let relationship = self.relationships.remove(index);
        self.reindex_relationships();
        self.drop_stale_selection();
        Ok(relationship)
    }

    pub fn expand_node(&mut self, id: &NodeId) -> Result<()> {
        let node = self
            .node_mut(id)
            .ok_or_else(|| VizError::unknown_node(id.as_str()))?;
        node.expanded = true;
        Ok(())
    }

    /// Clears the expanded flag and removes, recursively, every node the
    /// expansion introduced. Returns the removed node ids.
    pub fn collapse_node(&mut self, id: &NodeId) -> Result<Vec<NodeId>> {
        if !self.contains_node(id) {
            return Err(VizError::unknown_node(id.as_str()));
        }

        let mut removed = Vec::new();
        self.collapse_into(id, &mut removed);
        if let Some(node) = self.node_mut(id) {
            node.expanded = false;
        }
        Ok(removed)
    }

    fn collapse_into(&mut self, id: &NodeId, removed: &mut Vec<NodeId>) {
        let Some(children) = self.expanded_nodes.remove(id) else {
            return;
        };

        for child in children {
            if !self.contains_node(&child) {
                continue;
            }
            self.collapse_into(&child, removed);
            if self.remove_node(&child).is_ok() {
                removed.push(child);
            }
        }
    }

    pub fn neighbour_ids(&self, id: &NodeId) -> Result<Vec<NodeId>> {
        if !self.contains_node(id) {
            return Err(VizError::unknown_node(id.as_str()));
        }

        let neighbours = self
            .relationships
            .iter()
            .filter_map(|relationship| relationship.other_end(id))
            .filter(|other| *other != id)
            .cloned()
            .collect::<BTreeSet<_>>();
        Ok(neighbours.into_iter().collect())
    }

    pub fn degree(&self, id: &NodeId) -> usize {
        self.relationships
            .iter()
            .filter(|relationship| relationship.touches(id))
            .count()
    }

    pub fn groups(&self) -> BTreeMap<String, Vec<NodeId>> {
        let mut groups = BTreeMap::<String, Vec<NodeId>>::new();
        for node in &self.nodes {
            if let Some(key) = &node.group_key {
                groups.entry(key.clone()).or_default().push(node.id.clone());
            }
        }
        groups
    }

    pub fn set_fixed(&mut self, id: &NodeId, fixed: bool) -> Result<()> {
        let node = self
            .node_mut(id)
            .ok_or_else(|| VizError::unknown_node(id.as_str()))?;
        node.fixed = fixed;
        Ok(())
    }

    pub fn set_position(&mut self, id: &NodeId, position: Vec2) -> Result<()> {
        let node = self
            .node_mut(id)
            .ok_or_else(|| VizError::unknown_node(id.as_str()))?;
        node.position = position;
        node.placed = true;
        Ok(())
    }

    pub fn selected_item(&self) -> Option<&ItemRef> {
        self.selected.as_ref()
    }

    /// Selects `item`, clearing whatever was selected before.
    pub fn select(&mut self, item: ItemRef) -> Result<()> {
        match &item {
            ItemRef::Node(id) if !self.contains_node(id) => {
                return Err(VizError::unknown_node(id.as_str()));
            }
            ItemRef::Relationship(id) if !self.relationship_index.contains_key(id) => {
                return Err(VizError::unknown_relationship(id.as_str()));
            }
            _ => {}
        }

        self.deselect();
        match &item {
            ItemRef::Node(id) => {
                if let Some(node) = self.node_mut(id) {
                    node.selected = true;
                }
            }
            ItemRef::Relationship(id) => {
                if let Some(&index) = self.relationship_index.get(id) {
                    self.relationships[index].selected = true;
                }
            }
        }
        self.selected = Some(item);
        Ok(())
    }

    pub fn deselect(&mut self) -> Option<ItemRef> {
        let previous = self.selected.take()?;
        match &previous {
            ItemRef::Node(id) => {
                if let Some(node) = self.node_mut(id) {
                    node.selected = false;
                }
            }
            ItemRef::Relationship(id) => {
                if let Some(&index) = self.relationship_index.get(id) {
                    self.relationships[index].selected = false;
                }
            }
        }
        Some(previous)
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats::collect(self)
    }

    fn drop_stale_selection(&mut self) {
        let stale = match &self.selected {
            Some(ItemRef::Node(id)) => !self.node_index.contains_key(id),
            Some(ItemRef::Relationship(id)) => !self.relationship_index.contains_key(id),
            None => false,
        };
        if stale {
            self.selected = None;
        }
    }

    fn reindex_nodes(&mut self) {
        self.node_index.clear();
        for (index, node) in self.nodes.iter().enumerate() {
            self.node_index.insert(node.id.clone(), index);
        }
    }

    fn reindex_relationships(&mut self) {
        self.relationship_index.clear();
        for (index, relationship) in self.relationships.iter().enumerate() {
            self.relationship_index
                .insert(relationship.id.clone(), index);
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn sample() -> GraphModel {
        let mut model = GraphModel::default();
        model.add_nodes([
            NodeRecord::new("1").with_label("A"),
            NodeRecord::new("2").with_label("B"),
        ]);
        model
            .add_relationships([RelationshipRecord::new("10", "R", "1", "2")])
            .expect("endpoints exist");
        model
    }

    #[test]
    fn remove_node_cascades_to_relationships() {
        let mut model = sample();
        model.remove_node(&NodeId::new("1")).expect("known node");

        let ids = model.nodes().iter().map(|node| node.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["2"]);
        assert!(model.relationships().is_empty());
    }

    #[test]
    fn unknown_endpoint_rejects_whole_batch() {
        let mut model = sample();
        let result = model.add_relationships([
            RelationshipRecord::new("11", "R", "2", "1"),
            RelationshipRecord::new("12", "R", "2", "missing"),
        ]);

        assert_eq!(result, Err(VizError::unknown_node("missing")));
        assert_eq!(model.relationship_count(), 1);
    }

    #[test]
    fn unknown_ids_leave_model_unchanged() {
        let mut model = sample();
        assert!(model.remove_node(&NodeId::new("9")).is_err());
        assert!(model.expand_node(&NodeId::new("9")).is_err());
        assert!(model.collapse_node(&NodeId::new("9")).is_err());
        assert!(model.neighbour_ids(&NodeId::new("9")).is_err());
        assert_eq!(model.node_count(), 2);
        assert_eq!(model.relationship_count(), 1);
    }

    #[test]
    fn duplicate_ids_are_skipped() {
        let mut model = sample();
        let added = model.add_nodes([NodeRecord::new("1"), NodeRecord::new("3"), NodeRecord::new("3")]);
        assert_eq!(added, vec![NodeId::new("3")]);

        let added = model
            .add_relationships([RelationshipRecord::new("10", "R", "1", "2")])
            .expect("endpoints exist");
        assert!(added.is_empty());
    }

    #[test]
    fn group_key_comes_from_configured_property() {
        let mut model = GraphModel::new("module");
        model.add_nodes([
            NodeRecord::new("a").with_property("module", "core"),
            NodeRecord::new("b").with_property("filename", "x.c"),
        ]);

        assert_eq!(
            model.node(&NodeId::new("a")).and_then(|node| node.group_key.clone()),
            Some("core".to_owned())
        );
        assert_eq!(model.node(&NodeId::new("b")).and_then(|node| node.group_key.clone()), None);
        assert_eq!(model.groups().len(), 1);
    }

    #[test]
    fn labels_are_deduplicated_in_order() {
        let mut model = GraphModel::default();
        model.add_nodes([NodeRecord::new("a")
            .with_label("B")
            .with_label("A")
            .with_label("B")]);
        assert_eq!(model.nodes()[0].labels, vec!["B", "A"]);
    }

    #[test]
    fn collapse_removes_expanded_subgraph_recursively() {
        let mut model = sample();
        let root = NodeId::new("1");
        model
            .add_expanded_nodes(&root, [NodeRecord::new("3"), NodeRecord::new("2")])
            .expect("root exists");
        model
            .add_relationships([RelationshipRecord::new("13", "R", "1", "3")])
            .expect("endpoints exist");
        model.expand_node(&root).expect("root exists");

        let child = NodeId::new("3");
        model
            .add_expanded_nodes(&child, [NodeRecord::new("4")])
            .expect("child exists");
        model
            .add_relationships([RelationshipRecord::new("14", "R", "3", "4")])
            .expect("endpoints exist");

        let mut removed = model.collapse_node(&root).expect("root exists");
        removed.sort();
        assert_eq!(removed, vec![NodeId::new("3"), NodeId::new("4")]);
        assert!(!model.node(&root).is_some_and(Node::is_expanded));
        assert!(model.contains_node(&NodeId::new("2")));
        assert_eq!(model.relationship_count(), 1);
    }

    #[test]
    fn neighbour_ids_are_sorted_and_exclude_self() {
        let mut model = sample();
        model.add_nodes([NodeRecord::new("0")]);
        model
            .add_relationships([
                RelationshipRecord::new("11", "R", "0", "1"),
                RelationshipRecord::new("12", "LOOP", "1", "1"),
            ])
            .expect("endpoints exist");

        let neighbours = model.neighbour_ids(&NodeId::new("1")).expect("known");
        assert_eq!(neighbours, vec![NodeId::new("0"), NodeId::new("2")]);
        assert_eq!(model.degree(&NodeId::new("1")), 3);
    }

    #[test]
    fn selection_is_exclusive() {
        let mut model = sample();
        model.select(ItemRef::Node(NodeId::new("1"))).expect("known");
        model.select(ItemRef::Node(NodeId::new("2"))).expect("known");

        assert!(!model.node(&NodeId::new("1")).is_some_and(Node::is_selected));
        assert!(model.node(&NodeId::new("2")).is_some_and(Node::is_selected));
        assert_eq!(model.selected_item(), Some(&ItemRef::Node(NodeId::new("2"))));

        model
            .select(ItemRef::Relationship(RelationshipId::new("10")))
            .expect("known");
        let selected_nodes = model.nodes().iter().filter(|node| node.is_selected()).count();
        let selected_relationships = model
            .relationships()
            .iter()
            .filter(|relationship| relationship.is_selected())
            .count();
        assert_eq!(selected_nodes + selected_relationships, 1);
    }

    #[test]
    fn removing_selected_node_clears_selection() {
        let mut model = sample();
        model.select(ItemRef::Node(NodeId::new("1"))).expect("known");
        model.remove_node(&NodeId::new("1")).expect("known");
        assert!(model.selected_item().is_none());
    }

    #[test]
    fn presence_condition_is_trimmed() {
        let mut model = sample();
        model
            .add_relationships([
                RelationshipRecord::new("11", "R", "2", "1").with_property("condition", " A /\\ B ")
            ])
            .expect("endpoints exist");
        let relationship = model
            .relationship(&RelationshipId::new("11"))
            .expect("added");
        assert_eq!(relationship.presence_condition().as_deref(), Some("A /\\ B"));
        assert_eq!(
            model
                .relationship(&RelationshipId::new("10"))
                .and_then(Relationship::presence_condition),
            None
        );
    }

    fn arbitrary_graph() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
        (1usize..12).prop_flat_map(|node_count| {
            (
                Just(node_count),
                prop::collection::vec((0..node_count, 0..node_count), 0..30),
            )
        })
    }

    proptest! {
        #[test]
        fn prop_remove_node_leaves_no_dangling_relationships(
            (node_count, edges) in arbitrary_graph(),
            victim_seed in 0usize..64,
        ) {
            let mut model = GraphModel::default();
            model.add_nodes((0..node_count).map(|index| NodeRecord::new(index.to_string())));
            model
                .add_relationships(edges.iter().enumerate().map(|(index, (from, to))| {
                    RelationshipRecord::new(format!("r{index}"), "R", from.to_string(), to.to_string())
                }))
                .expect("endpoints exist");

            let victim = NodeId::new((victim_seed % node_count).to_string());
            model.remove_node(&victim).expect("known");

            prop_assert!(!model.contains_node(&victim));
            prop_assert!(model.relationships().iter().all(|relationship| !relationship.touches(&victim)));
            prop_assert_eq!(model.node_count(), node_count - 1);
        }

        #[test]
        fn prop_selection_stays_exclusive(picks in prop::collection::vec(0usize..6, 1..20)) {
            let mut model = GraphModel::default();
            model.add_nodes((0..6).map(|index| NodeRecord::new(index.to_string())));

            for pick in &picks {
                model.select(ItemRef::Node(NodeId::new(pick.to_string()))).expect("known");
            }

            let selected = model.nodes().iter().filter(|node| node.is_selected()).collect::<Vec<_>>();
            prop_assert_eq!(selected.len(), 1);
            let last = picks.last().map(|pick| pick.to_string()).unwrap_or_default();
            prop_assert_eq!(selected[0].id.as_str(), last.as_str());
        }
    }
}
