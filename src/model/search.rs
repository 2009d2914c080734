use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use super::{GraphModel, Node, NodeId};

/// Case-insensitive fuzzy query over a node's id, labels and property text.
struct NodeQuery<'q> {
    matcher: SkimMatcherV2,
    text: &'q str,
}

impl<'q> NodeQuery<'q> {
    fn new(text: &'q str) -> Self {
        Self {
            matcher: SkimMatcherV2::default().ignore_case(),
            text,
        }
    }

    fn score(&self, node: &Node) -> Option<i64> {
        let labels = node.labels.iter().map(String::as_str);
        let mut best = [node.id.as_str()]
            .into_iter()
            .chain(labels)
            .filter_map(|field| self.matcher.fuzzy_match(field, self.text))
            .max();
        for entry in &node.properties {
            let score = self.matcher.fuzzy_match(&entry.text(), self.text);
            best = best.max(score);
        }
        best
    }
}

impl GraphModel {
    /// Node ids fuzzily matching `query` on id, labels or property values,
    /// best match first.
    pub fn search(&self, query: &str) -> Vec<NodeId> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let query = NodeQuery::new(query);
        let mut ranked = self
            .nodes
            .iter()
            .filter_map(|node| query.score(node).map(|score| (score, &node.id)))
            .collect::<Vec<_>>();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        ranked.into_iter().map(|(_score, id)| id.clone()).collect()
    }
}
