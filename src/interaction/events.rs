use serde::Serialize;

use crate::cluster::{ExpansionState, Group};
use crate::model::{GraphModel, GraphStats, Node, NodeId, PropertyEntry, Relationship, RelationshipId};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeSummary {
    pub id: NodeId,
    pub labels: Vec<String>,
    pub properties: Vec<PropertyEntry>,
}

impl From<&Node> for NodeSummary {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            labels: node.labels.clone(),
            properties: node.properties.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RelationshipSummary {
    pub id: RelationshipId,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub properties: Vec<PropertyEntry>,
}

impl From<&Relationship> for RelationshipSummary {
    fn from(relationship: &Relationship) -> Self {
        Self {
            id: relationship.id.clone(),
            rel_type: relationship.rel_type.clone(),
            properties: relationship.properties.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupSummary {
    pub key: String,
    pub size: usize,
    pub external_link_count: usize,
    pub state: ExpansionState,
}

impl From<&Group> for GroupSummary {
    fn from(group: &Group) -> Self {
        Self {
            key: group.key.clone(),
            size: group.size(),
            external_link_count: group.external_link_count,
            state: group.state,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasSummary {
    pub node_count: usize,
    pub relationship_count: usize,
}

impl CanvasSummary {
    pub fn of(model: &GraphModel) -> Self {
        Self {
            node_count: model.node_count(),
            relationship_count: model.relationship_count(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MenuSummary {
    pub label: String,
    pub content: String,
    pub selection: String,
}

/// Item carried by selection and hover events, tagged like
/// `{"type": "node", "item": {...}}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "item", rename_all = "kebab-case")]
pub enum ItemPayload {
    Node(NodeSummary),
    Relationship(RelationshipSummary),
    Group(GroupSummary),
    Canvas(CanvasSummary),
    ContextMenuItem(MenuSummary),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VizEvent {
    ItemSelected(ItemPayload),
    ItemMouseOver(ItemPayload),
    GraphModelChange(GraphStats),
}

type Listener = Box<dyn FnMut(&VizEvent)>;

/// Ordered list of subscribers; every event reaches each of them in
/// subscription order.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Listener>,
}

impl EventBus {
    pub fn subscribe(&mut self, listener: impl FnMut(&VizEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn emit(&mut self, event: VizEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn listeners_receive_events_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::default();
        for tag in ["first", "second"] {
            let seen = Rc::clone(&seen);
            bus.subscribe(move |event| {
                if let VizEvent::ItemMouseOver(ItemPayload::Canvas(summary)) = event {
                    seen.borrow_mut().push((tag, summary.node_count));
                }
            });
        }

        bus.emit(VizEvent::ItemMouseOver(ItemPayload::Canvas(CanvasSummary {
            node_count: 3,
            relationship_count: 1,
        })));
        assert_eq!(*seen.borrow(), vec![("first", 3), ("second", 3)]);
    }

    #[test]
    fn payload_serializes_with_type_tag() {
        let payload = ItemPayload::Canvas(CanvasSummary {
            node_count: 2,
            relationship_count: 1,
        });
        let value = serde_json::to_value(&payload).expect("serializable");
        assert_eq!(
            value,
            serde_json::json!({
                "type": "canvas",
                "item": { "nodeCount": 2, "relationshipCount": 1 }
            })
        );
    }
}
