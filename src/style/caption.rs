use crate::model::{Node, PropertyEntry, Relationship, value_text};

pub const ID_PLACEHOLDER: &str = "<id>";
pub const TYPE_PLACEHOLDER: &str = "<type>";

/// Item being styled or captioned.
#[derive(Clone, Copy, Debug)]
pub enum StyledItem<'a> {
    Node(&'a Node),
    Relationship(&'a Relationship),
}

impl<'a> StyledItem<'a> {
    fn id(self) -> &'a str {
        match self {
            Self::Node(node) => node.id.as_str(),
            Self::Relationship(relationship) => relationship.id.as_str(),
        }
    }

    fn properties(self) -> &'a [PropertyEntry] {
        match self {
            Self::Node(node) => &node.properties,
            Self::Relationship(relationship) => &relationship.properties,
        }
    }
}

type KeyTest = fn(&str) -> bool;

const CAPTION_PRIORITY: [KeyTest; 6] = [
    |key| key.eq_ignore_ascii_case("name"),
    |key| key.eq_ignore_ascii_case("title"),
    |key| key.eq_ignore_ascii_case("label"),
    |key| key.to_ascii_lowercase().ends_with("name"),
    |key| key.to_ascii_lowercase().ends_with("description"),
    |key| !key.is_empty(),
];

/// Caption template for a node without an explicit caption rule: the first
/// property key by priority, as `{key}`, else the id placeholder.
pub fn default_caption(node: &Node) -> String {
    CAPTION_PRIORITY
        .iter()
        .find_map(|test| node.properties.iter().find(|entry| test(&entry.key)))
        .map(|entry| format!("{{{}}}", entry.key))
        .unwrap_or_else(|| ID_PLACEHOLDER.to_owned())
}

/// Expands `{key}` with property values and the `<id>`/`<type>` placeholders.
/// Placeholders are only recognised in the template text, never inside a
/// substituted value. Unknown keys are left as written.
pub fn interpolate(template: &str, item: StyledItem<'_>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        push_literal(&mut output, &rest[..open], item);
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find(['{', '}']) else {
            push_literal(&mut output, &rest[open..], item);
            rest = "";
            break;
        };

        if after_open.as_bytes()[close] == b'{' {
            output.push('{');
            rest = after_open;
            continue;
        }

        let key = &after_open[..close];
        match item
            .properties()
            .iter()
            .find(|entry| entry.key == key)
        {
            Some(entry) => output.push_str(&value_text(&entry.value)),
            None => {
                output.push('{');
                push_literal(&mut output, key, item);
                output.push('}');
            }
        }
        rest = &after_open[close + 1..];
    }
    push_literal(&mut output, rest, item);
    output
}

fn push_literal(output: &mut String, text: &str, item: StyledItem<'_>) {
    let text = text.replace(ID_PLACEHOLDER, item.id());
    match item {
        StyledItem::Relationship(relationship) => {
            output.push_str(&text.replace(TYPE_PLACEHOLDER, &relationship.rel_type));
        }
        StyledItem::Node(_) => output.push_str(&text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GraphModel, NodeId, NodeRecord, RelationshipId, RelationshipRecord};

    fn node_with(properties: &[(&str, &str)]) -> Node {
        let mut record = NodeRecord::new("n1");
        for (key, value) in properties {
            record = record.with_property(*key, *value);
        }
        let mut model = GraphModel::default();
        model.add_nodes([record]);
        model.node(&NodeId::new("n1")).cloned().expect("added")
    }

    #[test]
    fn caption_priority_order() {
        assert_eq!(default_caption(&node_with(&[("age", "3"), ("Name", "x")])), "{Name}");
        assert_eq!(default_caption(&node_with(&[("label", "x"), ("title", "y")])), "{title}");
        assert_eq!(default_caption(&node_with(&[("age", "3"), ("fullName", "x")])), "{fullName}");
        assert_eq!(
            default_caption(&node_with(&[("age", "3"), ("shortDescription", "x")])),
            "{shortDescription}"
        );
        assert_eq!(default_caption(&node_with(&[("age", "3"), ("born", "x")])), "{age}");
        assert_eq!(default_caption(&node_with(&[])), "<id>");
    }

    #[test]
    fn interpolates_properties_and_placeholders() {
        let node = node_with(&[("name", "Alice")]);
        assert_eq!(interpolate("{name}", StyledItem::Node(&node)), "Alice");
        assert_eq!(interpolate("<id>: {name}", StyledItem::Node(&node)), "n1: Alice");
        assert_eq!(interpolate("{missing}", StyledItem::Node(&node)), "{missing}");
        assert_eq!(interpolate("{{name}", StyledItem::Node(&node)), "{Alice");
        assert_eq!(interpolate("{name", StyledItem::Node(&node)), "{name");
    }

    #[test]
    fn placeholders_inside_property_values_stay_literal() {
        let node = node_with(&[("name", "<id> and <type>")]);
        assert_eq!(
            interpolate("{name} (<id>)", StyledItem::Node(&node)),
            "<id> and <type> (n1)"
        );
    }

    #[test]
    fn relationship_type_placeholder() {
        let mut model = GraphModel::default();
        model.add_nodes([NodeRecord::new("a"), NodeRecord::new("b")]);
        model
            .add_relationships([RelationshipRecord::new("r", "KNOWS", "a", "b")])
            .expect("endpoints exist");
        let relationship = model.relationship(&RelationshipId::new("r")).expect("added");
        assert_eq!(
            interpolate("<type>", StyledItem::Relationship(relationship)),
            "KNOWS"
        );

        let mut model = GraphModel::default();
        model.add_nodes([NodeRecord::new("a"), NodeRecord::new("b")]);
        model
            .add_relationships([
                RelationshipRecord::new("r", "KNOWS", "a", "b").with_property("since", "<type>")
            ])
            .expect("endpoints exist");
        let relationship = model.relationship(&RelationshipId::new("r")).expect("added");
        assert_eq!(
            interpolate("<type> since {since}", StyledItem::Relationship(relationship)),
            "KNOWS since <type>"
        );
    }
}
