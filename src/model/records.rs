use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Integer(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(text) => text,
            RawId::Integer(value) => value.to_string(),
        }
    }
}

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(from = "RawId", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<RawId> for $name {
            fn from(raw: RawId) -> Self {
                Self(raw.into())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(NodeId);
string_id!(RelationshipId);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyEntry {
    pub key: String,
    pub value: Value,
}

impl PropertyEntry {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn text(&self) -> String {
        value_text(&self.value)
    }
}

/// Display form of a property value: strings verbatim, arrays joined by `", "`.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawProperties {
    List(Vec<PropertyEntry>),
    Map(serde_json::Map<String, Value>),
}

fn deserialize_properties<'de, D>(deserializer: D) -> Result<Vec<PropertyEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawProperties::deserialize(deserializer)? {
        RawProperties::List(entries) => entries,
        RawProperties::Map(map) => map
            .into_iter()
            .map(|(key, value)| PropertyEntry { key, value })
            .collect(),
    })
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_properties")]
    pub properties: Vec<PropertyEntry>,
}

impl NodeRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(id),
            labels: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.push(PropertyEntry::new(key, value));
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub id: RelationshipId,
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(rename = "startNodeId", alias = "start")]
    pub start_node_id: NodeId,
    #[serde(rename = "endNodeId", alias = "end")]
    pub end_node_id: NodeId,
    #[serde(default, deserialize_with = "deserialize_properties")]
    pub properties: Vec<PropertyEntry>,
}

impl RelationshipRecord {
    pub fn new(
        id: impl Into<String>,
        rel_type: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Self {
            id: RelationshipId::new(id),
            rel_type: rel_type.into(),
            start_node_id: NodeId::new(start),
            end_node_id: NodeId::new(end),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.push(PropertyEntry::new(key, value));
        self
    }
}

/// Nodes and relationships delivered together, e.g. by a neighbour fetch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Neighbourhood {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub relationships: Vec<RelationshipRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_accept_numbers_and_strings() {
        let record: NodeRecord =
            serde_json::from_str(r#"{ "id": 7, "labels": ["Person"] }"#).expect("valid record");
        assert_eq!(record.id.as_str(), "7");

        let record: RelationshipRecord = serde_json::from_str(
            r#"{ "id": "r1", "type": "KNOWS", "startNodeId": 7, "endNodeId": "8" }"#,
        )
        .expect("valid record");
        assert_eq!(record.start_node_id, NodeId::new("7"));
        assert_eq!(record.end_node_id, NodeId::new("8"));
        assert!(record.properties.is_empty());
    }

    #[test]
    fn properties_accept_list_and_map_forms() {
        let record: NodeRecord = serde_json::from_str(
            r#"{ "id": "a", "properties": [{ "key": "name", "value": "Alice" }] }"#,
        )
        .expect("list form");
        assert_eq!(record.properties[0].text(), "Alice");

        let record: NodeRecord =
            serde_json::from_str(r#"{ "id": "a", "properties": { "tags": ["x", "y"] } }"#)
                .expect("map form");
        assert_eq!(record.properties[0].key, "tags");
        assert_eq!(record.properties[0].text(), "x, y");
    }
}
