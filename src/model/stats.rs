use std::collections::BTreeMap;

use serde::Serialize;

use super::GraphModel;

/// Aggregate counts reported with every model change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub relationship_count: usize,
    pub label_counts: BTreeMap<String, usize>,
    pub relationship_type_counts: BTreeMap<String, usize>,
    pub condition_counts: BTreeMap<String, usize>,
}

impl GraphStats {
    pub(super) fn collect(model: &GraphModel) -> Self {
        let mut stats = Self {
            node_count: model.node_count(),
            relationship_count: model.relationship_count(),
            ..Self::default()
        };

        for node in model.nodes() {
            for label in &node.labels {
                *stats.label_counts.entry(label.clone()).or_default() += 1;
            }
        }

        for relationship in model.relationships() {
            *stats
                .relationship_type_counts
                .entry(relationship.rel_type.clone())
                .or_default() += 1;
            if let Some(condition) = relationship.presence_condition() {
                *stats.condition_counts.entry(condition).or_default() += 1;
            }
        }

        stats
    }
}
