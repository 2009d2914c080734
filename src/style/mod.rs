//! Selector/rule based styling for nodes and relationships.
//!
//! Rules are kept in insertion order and merged last-write-wins. Conditional
//! rules (`relationship.condRule.<formula>`) apply on top of the regular ones
//! when a relationship's presence condition is admitted by the formula.

mod caption;
pub mod condition;
mod selector;
mod sheet;

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{Result, VizError};
use crate::model::{Node, Relationship};

pub use caption::{ID_PLACEHOLDER, StyledItem, TYPE_PLACEHOLDER, default_caption, interpolate};
pub use condition::{ConditionCache, Formula, SolutionSet};
pub use selector::{CONDITION_TOKEN, Selector, Tag};
pub use sheet::{parse_sheet, write_sheet};

pub type PropertyMap = BTreeMap<String, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaletteEntry {
    pub color: &'static str,
    pub border_color: &'static str,
    pub text_color_internal: &'static str,
}

const fn entry(
    color: &'static str,
    border_color: &'static str,
    text_color_internal: &'static str,
) -> PaletteEntry {
    PaletteEntry {
        color,
        border_color,
        text_color_internal,
    }
}

pub const DEFAULT_PALETTE: [PaletteEntry; 12] = [
    entry("#FFE081", "#9AA1AC", "#FFFFFF"),
    entry("#C990C0", "#b261a5", "#FFFFFF"),
    entry("#F79767", "#f36924", "#FFFFFF"),
    entry("#57C7E3", "#23b3d7", "#FFFFFF"),
    entry("#F16667", "#eb2728", "#FFFFFF"),
    entry("#D9C8AE", "#c0a378", "#604A0E"),
    entry("#8DCC93", "#5db665", "#604A0E"),
    entry("#ECB5C9", "#da7298", "#604A0E"),
    entry("#4C8EDA", "#2870c2", "#FFFFFF"),
    entry("#FFC454", "#d7a013", "#604A0E"),
    entry("#DA7194", "#cc3c6c", "#FFFFFF"),
    entry("#569480", "#447666", "#FFFFFF"),
];

fn props<const N: usize>(pairs: [(&str, &str); N]) -> PropertyMap {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}

pub fn default_rules() -> Vec<StyleRule> {
    vec![
        StyleRule::new(
            Selector::node(),
            props([
                ("diameter", "50px"),
                ("color", "#A5ABB6"),
                ("border-color", "#9AA1AC"),
                ("border-width", "2px"),
                ("text-color-internal", "#FFFFFF"),
                ("font-size", "10px"),
            ]),
        ),
        StyleRule::new(
            Selector::relationship(),
            props([
                ("color", "#A5ABB6"),
                ("shaft-width", "1px"),
                ("font-size", "8px"),
                ("padding", "3px"),
                ("text-color-external", "#000000"),
                ("text-color-internal", "#FFFFFF"),
                ("caption", TYPE_PLACEHOLDER),
            ]),
        ),
    ]
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleRule {
    pub selector: Selector,
    pub props: PropertyMap,
}

impl StyleRule {
    pub fn new(selector: Selector, props: PropertyMap) -> Self {
        Self { selector, props }
    }

    pub fn matches(&self, candidate: &Selector) -> bool {
        self.selector.matches(candidate)
    }
}

/// Merged properties for one selector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedStyle {
    pub selector: Selector,
    pub props: PropertyMap,
}

impl ResolvedStyle {
    fn new(selector: Selector) -> Self {
        Self {
            selector,
            props: PropertyMap::new(),
        }
    }

    fn merge(&mut self, rule: &StyleRule) {
        for (key, value) in &rule.props {
            self.props.insert(key.clone(), value.clone());
        }
    }

    /// Property value or the empty string.
    pub fn get(&self, key: &str) -> &str {
        self.props.get(key).map(String::as_str).unwrap_or("")
    }

    /// Numeric prefix of values such as `50px`.
    pub fn get_px(&self, key: &str) -> Option<f32> {
        let value = self.get(key).trim();
        let numeric = value.strip_suffix("px").unwrap_or(value);
        numeric.trim().parse().ok()
    }

    pub fn caption(&self, item: StyledItem<'_>) -> String {
        interpolate(self.get("caption"), item)
    }
}

pub fn node_selector(node: &Node) -> Selector {
    Selector::new(Tag::Node, node.labels.iter().cloned())
}

pub fn relationship_selector(relationship: &Relationship) -> Selector {
    Selector::new(Tag::Relationship, [relationship.rel_type.clone()])
}

#[derive(Clone, Debug)]
pub struct StyleResolver {
    rules: Vec<StyleRule>,
    conditions: ConditionCache,
    max_solutions: usize,
}

impl Default for StyleResolver {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl StyleResolver {
    pub fn new(max_solutions: usize) -> Self {
        Self {
            rules: default_rules(),
            conditions: ConditionCache::default(),
            max_solutions,
        }
    }

    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }

    pub fn reset_to_default(&mut self) {
        self.rules = default_rules();
        self.conditions.clear();
    }

    pub fn calculate_style(&self, selector: &Selector) -> ResolvedStyle {
        let mut style = ResolvedStyle::new(selector.clone());
        for rule in &self.rules {
            if rule.matches(selector) {
                style.merge(rule);
            }
        }
        style
    }

    /// Style for a node. Labelled nodes without a classed color or caption rule
    /// get one created for their first label, so later lookups are stable.
    pub fn for_node(&mut self, node: &Node) -> ResolvedStyle {
        let selector = node_selector(node);
        if !node.labels.is_empty() {
            self.set_default_node_styling(&selector, node);
        }

        let mut style = self.calculate_style(&selector);
        if style.get("caption").is_empty() {
            style
                .props
                .insert("caption".to_owned(), default_caption(node));
        }
        style
    }

    /// Style for a relationship: type rules first, then every conditional rule
    /// admitting the relationship's presence condition.
    pub fn for_relationship(&mut self, relationship: &Relationship) -> ResolvedStyle {
        let mut style = self.calculate_style(&relationship_selector(relationship));
        let Some(condition) = relationship.presence_condition() else {
            return style;
        };

        for rule in &self.rules {
            let Some(formula) = rule.selector.formula() else {
                continue;
            };
            if self
                .conditions
                .matches(formula, &condition, self.max_solutions)
            {
                style.merge(rule);
            }
        }
        style
    }

    pub fn for_condition(&self, formula: &str) -> ResolvedStyle {
        self.calculate_style(&Selector::condition(formula))
    }

    fn set_default_node_styling(&mut self, selector: &Selector, node: &Node) {
        let mut has_color = false;
        let mut has_caption = false;
        for rule in &self.rules {
            if !rule.selector.classes.is_empty() && rule.matches(selector) {
                has_color |= rule.props.contains_key("color");
                has_caption |= rule.props.contains_key("caption");
            }
        }

        let mut classes = selector.classes.clone();
        classes.sort();
        classes.truncate(1);
        let minimal = Selector::new(selector.tag, classes);

        if !has_color {
            let palette = self.next_palette_entry();
            debug!(selector = %minimal, color = palette.color, "assigned default color");
            self.change_for_selector(
                minimal.clone(),
                props([
                    ("color", palette.color),
                    ("border-color", palette.border_color),
                    ("text-color-internal", palette.text_color_internal),
                ]),
            );
        }
        if !has_caption {
            let caption = default_caption(node);
            self.change_for_selector(minimal, props([("caption", caption.as_str())]));
        }
    }

    /// First palette entry whose color no rule uses yet; cycles once all are taken.
    fn next_palette_entry(&self) -> PaletteEntry {
        let used = |color: &str| {
            self.rules
                .iter()
                .any(|rule| rule.props.get("color").is_some_and(|used| used.eq_ignore_ascii_case(color)))
        };
        if let Some(free) = DEFAULT_PALETTE.iter().find(|entry| !used(entry.color)) {
            return *free;
        }

        let classed = self
            .rules
            .iter()
            .filter(|rule| !rule.selector.classes.is_empty())
            .count();
        DEFAULT_PALETTE[classed % DEFAULT_PALETTE.len()]
    }

    /// Merges `props` into the rule whose selector matches `selector` exactly,
    /// creating the rule when none exists.
    pub fn change_for_selector(&mut self, selector: Selector, props: PropertyMap) -> &StyleRule {
        let index = match self
            .rules
            .iter()
            .position(|rule| rule.selector.matches_exact(&selector))
        {
            Some(index) => index,
            None => {
                self.rules.push(StyleRule::new(selector, PropertyMap::new()));
                self.rules.len() - 1
            }
        };
        let rule = &mut self.rules[index];
        rule.props.extend(props);
        rule
    }

    pub fn destroy_rule(&mut self, selector: &Selector) -> Option<StyleRule> {
        let index = self.rules.iter().position(|rule| &rule.selector == selector)?;
        Some(self.rules.remove(index))
    }

    /// Replaces the rule set with the parsed sheet. On error the current
    /// rules are kept untouched.
    pub fn import_sheet(&mut self, text: &str) -> Result<()> {
        match parse_sheet(text) {
            Ok(blocks) => {
                self.replace_rules(blocks);
                Ok(())
            }
            Err(error) => {
                warn!(%error, "style sheet rejected, keeping previous rules");
                Err(error)
            }
        }
    }

    pub fn export_sheet(&self) -> String {
        write_sheet(&self.rules)
    }

    /// Selector string to property map, in rule order.
    pub fn to_sheet(&self) -> Vec<(String, PropertyMap)> {
        self.rules
            .iter()
            .map(|rule| (rule.selector.to_string(), rule.props.clone()))
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .to_sheet()
            .into_iter()
            .map(|(selector, props)| {
                let props = props
                    .into_iter()
                    .map(|(key, value)| (key, serde_json::Value::String(value)))
                    .collect::<serde_json::Map<_, _>>();
                (selector, serde_json::Value::Object(props))
            })
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }

    /// Loads rules from a `selector -> {key: value}` JSON object.
    pub fn load_rules(&mut self, data: &serde_json::Value) -> Result<()> {
        let Some(object) = data.as_object() else {
            return Err(VizError::style_parse(0, "style rules must be a JSON object"));
        };

        let mut blocks = Vec::with_capacity(object.len());
        for (selector, props) in object {
            let selector = Selector::parse(selector)?;
            let Some(props) = props.as_object() else {
                return Err(VizError::style_parse(
                    0,
                    format!("properties of `{selector}` must be an object"),
                ));
            };
            let props = props
                .iter()
                .map(|(key, value)| {
                    let value = match value {
                        serde_json::Value::String(text) => text.clone(),
                        other => other.to_string(),
                    };
                    (key.clone(), value)
                })
                .collect();
            blocks.push((selector, props));
        }

        self.replace_rules(blocks);
        Ok(())
    }

    fn replace_rules(&mut self, blocks: Vec<(Selector, PropertyMap)>) {
        self.rules = blocks
            .into_iter()
            .map(|(selector, props)| StyleRule::new(selector, props))
            .collect();
        self.conditions.clear();
        debug!(rules = self.rules.len(), "style rules replaced");
    }
}
