//! Graph datasets on disk and the neighbour lookups served from them.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, ensure};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VizError};
use crate::model::{NodeId, NodeRecord, Neighbourhood, RelationshipRecord};

/// A complete graph as stored in a JSON file:
/// `{"nodes": [...], "relationships": [...]}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDataset {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub relationships: Vec<RelationshipRecord>,
}

impl GraphDataset {
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let dataset: Self = serde_json::from_str(raw).context("invalid graph dataset JSON")?;
        dataset.validate()?;
        Ok(dataset)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read graph dataset {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("failed to load {}", path.display()))
    }

    fn validate(&self) -> anyhow::Result<()> {
        let mut ids = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            ensure!(ids.insert(&node.id), "duplicate node id `{}`", node.id);
        }

        let mut relationship_ids = HashSet::with_capacity(self.relationships.len());
        for relationship in &self.relationships {
            ensure!(
                relationship_ids.insert(&relationship.id),
                "duplicate relationship id `{}`",
                relationship.id
            );
            for endpoint in [&relationship.start_node_id, &relationship.end_node_id] {
                ensure!(
                    ids.contains(endpoint),
                    "relationship `{}` references unknown node `{endpoint}`",
                    relationship.id
                );
            }
        }
        Ok(())
    }
}

/// Answers "what is connected to this node" for neighbour expansion.
/// Implementations are called from a worker thread.
pub trait NeighbourSource: Send + Sync {
    fn neighbours(&self, node: &NodeId, known: &[NodeId]) -> Result<Neighbourhood>;
}

/// Serves neighbourhoods out of a dataset held in memory.
#[derive(Clone, Debug)]
pub struct DatasetSource {
    dataset: GraphDataset,
    max_neighbours: usize,
}

impl DatasetSource {
    pub fn new(dataset: GraphDataset, max_neighbours: usize) -> Self {
        Self {
            dataset,
            max_neighbours,
        }
    }
}

impl NeighbourSource for DatasetSource {
    /// Up to `max_neighbours` unknown neighbours plus every relationship
    /// between `node` and a returned or already known neighbour.
    fn neighbours(&self, node: &NodeId, known: &[NodeId]) -> Result<Neighbourhood> {
        if !self.dataset.nodes.iter().any(|record| &record.id == node) {
            return Err(VizError::Fetch {
                node: node.to_string(),
                message: "node is not part of the dataset".to_owned(),
            });
        }

        let known = known.iter().collect::<HashSet<_>>();
        let mut fresh = HashSet::new();
        for relationship in &self.dataset.relationships {
            let other = if &relationship.start_node_id == node {
                &relationship.end_node_id
            } else if &relationship.end_node_id == node {
                &relationship.start_node_id
            } else {
                continue;
            };
            if other == node || known.contains(other) || fresh.contains(other) {
                continue;
            }
            if fresh.len() >= self.max_neighbours {
                break;
            }
            fresh.insert(other.clone());
        }

        let nodes = self
            .dataset
            .nodes
            .iter()
            .filter(|record| fresh.contains(&record.id))
            .cloned()
            .collect();
        let relationships = self
            .dataset
            .relationships
            .iter()
            .filter(|relationship| {
                relationship.start_node_id == *node || relationship.end_node_id == *node
            })
            .filter(|relationship| {
                [&relationship.start_node_id, &relationship.end_node_id]
                    .into_iter()
                    .all(|end| end == node || known.contains(end) || fresh.contains(end))
            })
            .cloned()
            .collect();

        Ok(Neighbourhood {
            nodes,
            relationships,
        })
    }
}
