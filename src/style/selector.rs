use std::fmt;

use crate::error::{Result, VizError};

/// Reserved class token marking a conditional rule; the rest of the selector
/// after it is the feature formula.
pub const CONDITION_TOKEN: &str = "condRule";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    Node,
    Relationship,
}

impl Tag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Relationship => "relationship",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "node" => Some(Self::Node),
            "relationship" => Some(Self::Relationship),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Selector {
    pub tag: Tag,
    pub classes: Vec<String>,
}

impl Selector {
    pub fn new(tag: Tag, classes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            tag,
            classes: classes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn node() -> Self {
        Self::new(Tag::Node, Vec::<String>::new())
    }

    pub fn relationship() -> Self {
        Self::new(Tag::Relationship, Vec::<String>::new())
    }

    /// Whitespace in `formula` is dropped, so `A \/ B` and `A\/B` name the
    /// same rule.
    pub fn condition(formula: impl AsRef<str>) -> Self {
        let formula = formula.as_ref().split_whitespace().collect::<String>();
        Self::new(Tag::Relationship, [CONDITION_TOKEN.to_owned(), formula])
    }

    pub fn formula(&self) -> Option<&str> {
        match self.classes.as_slice() {
            [token, formula] if token == CONDITION_TOKEN => Some(formula),
            _ => None,
        }
    }

    pub fn is_condition(&self) -> bool {
        self.formula().is_some()
    }

    /// Tags equal and every class of `self` present in `candidate`.
    pub fn matches(&self, candidate: &Selector) -> bool {
        self.tag == candidate.tag
            && self
                .classes
                .iter()
                .all(|class| candidate.classes.contains(class))
    }

    pub fn matches_exact(&self, candidate: &Selector) -> bool {
        self.matches(candidate) && self.classes.len() == candidate.classes.len()
    }

    /// Parses `tag.class.class`. A backslash makes the next character part of
    /// the class name; unescaped whitespace is ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = split_unescaped(text);
        let Some((tag, rest)) = tokens.split_first() else {
            return Err(VizError::style_parse(0, "empty selector"));
        };
        let Some(tag) = Tag::parse(tag) else {
            return Err(VizError::style_parse(
                0,
                format!("unknown selector tag `{tag}` in `{text}`"),
            ));
        };

        if let Some(position) = rest.iter().position(|token| token == CONDITION_TOKEN) {
            if position != 0 || tag != Tag::Relationship {
                return Err(VizError::style_parse(
                    0,
                    format!("`{CONDITION_TOKEN}` must directly follow `relationship` in `{text}`"),
                ));
            }
            let formula = raw_after_condition_token(text);
            if formula.is_empty() {
                return Err(VizError::style_parse(
                    text.len(),
                    format!("missing formula after `{CONDITION_TOKEN}`"),
                ));
            }
            return Ok(Self::condition(formula));
        }

        if rest.iter().any(String::is_empty) {
            return Err(VizError::style_parse(
                0,
                format!("empty class in selector `{text}`"),
            ));
        }
        Ok(Self::new(tag, rest.iter().cloned()))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag.as_str())?;
        if let Some(formula) = self.formula() {
            return write!(f, ".{CONDITION_TOKEN}.{formula}");
        }
        for class in &self.classes {
            f.write_str(".")?;
            for c in class.chars() {
                if needs_escape(c) {
                    f.write_str("\\")?;
                }
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

/// Characters a class name can only carry in sheet text when escaped.
pub(super) fn needs_escape(c: char) -> bool {
    matches!(c, '.' | '\\' | '{' | '}' | '\'' | ';') || c.is_whitespace()
}

fn split_unescaped(text: &str) -> Vec<String> {
    let mut tokens = vec![String::new()];
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next().unwrap_or('\\');
                if let Some(last) = tokens.last_mut() {
                    last.push(escaped);
                }
            }
            '.' => tokens.push(String::new()),
            c if c.is_whitespace() => {}
            other => {
                if let Some(last) = tokens.last_mut() {
                    last.push(other);
                }
            }
        }
    }
    tokens
}

fn raw_after_condition_token(text: &str) -> &str {
    let marker = format!(".{CONDITION_TOKEN}.");
    text.find(&marker)
        .map(|index| text[index + marker.len()..].trim())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subset_matching_ignores_order() {
        let rule = Selector::new(Tag::Node, ["Person"]);
        let candidate = Selector::new(Tag::Node, ["Actor", "Person"]);
        assert!(rule.matches(&candidate));
        assert!(!rule.matches_exact(&candidate));
        assert!(Selector::node().matches(&candidate));
        assert!(!Selector::relationship().matches(&candidate));
        assert!(!candidate.matches(&rule));
    }

    #[test]
    fn parses_escaped_classes() {
        let selector = Selector::parse("node.Foo\\.Bar.Baz").expect("valid");
        assert_eq!(selector.classes, vec!["Foo.Bar", "Baz"]);
        assert_eq!(selector.to_string(), "node.Foo\\.Bar.Baz");
    }

    #[test]
    fn condition_token_binds_remainder_as_formula() {
        let selector = Selector::parse("relationship.condRule.A/\\(B\\/C.D)").expect("valid");
        assert_eq!(selector.formula(), Some("A/\\(B\\/C.D)"));
        assert_eq!(selector.to_string(), "relationship.condRule.A/\\(B\\/C.D)");
        assert_eq!(Selector::parse(&selector.to_string()).expect("valid"), selector);
    }

    #[test]
    fn awkward_class_names_survive_display_and_parse() {
        let selector = Selector::new(Tag::Node, ["My Label", "a{b}", "it's;", "back\\slash"]);
        let text = selector.to_string();
        assert_eq!(text, "node.My\\ Label.a\\{b\\}.it\\'s\\;.back\\\\slash");
        assert_eq!(Selector::parse(&text).expect("valid"), selector);
    }

    #[test]
    fn condition_ignores_formula_whitespace() {
        assert_eq!(Selector::condition("A \\/ B"), Selector::condition("A\\/B"));
        let parsed = Selector::parse("relationship.condRule. A \\/ B ").expect("valid");
        assert_eq!(parsed, Selector::condition("A\\/B"));
        assert_eq!(parsed.to_string(), "relationship.condRule.A\\/B");
    }

    #[test]
    fn rejects_malformed_selectors() {
        for text in ["", "edge.X", "node..X", "node.condRule.A", "relationship.condRule."] {
            assert!(Selector::parse(text).is_err(), "{text:?} should fail");
        }
    }
}
