use std::fmt::Write as _;

use crate::error::{Result, VizError};

use super::{PropertyMap, Selector, StyleRule};

#[derive(Default)]
struct PendingProperty {
    key: String,
    value: Vec<(char, bool)>,
    seen_colon: bool,
    quoted: bool,
}

impl PendingProperty {
    fn push(&mut self, c: char, in_string: bool) {
        if self.seen_colon {
            self.value.push((c, in_string));
        } else {
            self.key.push(c);
        }
    }

    fn finish(self, offset: usize, into: &mut PropertyMap) -> Result<()> {
        let key = self.key.trim();
        if !self.seen_colon {
            if key.is_empty() {
                return Ok(());
            }
            return Err(VizError::style_parse(
                offset,
                format!("property `{key}` has no value"),
            ));
        }
        if key.is_empty() {
            return Err(VizError::style_parse(offset, "property without a key"));
        }

        let start = self
            .value
            .iter()
            .position(|(c, quoted)| *quoted || !c.is_whitespace());
        let end = self
            .value
            .iter()
            .rposition(|(c, quoted)| *quoted || !c.is_whitespace());
        let value = match (start, end) {
            (Some(start), Some(end)) => self.value[start..=end]
                .iter()
                .map(|(c, _)| *c)
                .collect::<String>(),
            _ => String::new(),
        };

        if value.is_empty() && !self.quoted {
            return Ok(());
        }
        into.insert(key.to_owned(), value);
        Ok(())
    }
}

/// Parses `selector { key: value; ... }` blocks. Single quotes protect
/// `{`, `}`, `;` and `:` inside values, where `\'` and `\\` stand for a quote
/// and a backslash. In selectors a backslash keeps the next character;
/// other whitespace is ignored.
pub fn parse_sheet(text: &str) -> Result<Vec<(Selector, PropertyMap)>> {
    let mut blocks: Vec<(Selector, PropertyMap)> = Vec::new();
    let mut keyword = String::new();
    let mut keyword_offset = 0usize;
    let mut props: Option<PropertyMap> = None;
    let mut pending = PendingProperty::default();
    let mut in_string = false;
    let mut string_offset = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        if c == '\\' && props.is_none() {
            // Selector escapes are resolved by `Selector::parse`.
            if keyword.is_empty() {
                keyword_offset = offset;
            }
            keyword.push(c);
            if let Some((_, escaped)) = chars.next() {
                keyword.push(escaped);
            }
            continue;
        }
        if c == '\\' && in_string {
            match chars.peek() {
                Some(&(_, escaped @ ('\'' | '\\'))) => {
                    chars.next();
                    pending.push(escaped, true);
                }
                _ => pending.push(c, true),
            }
            continue;
        }
        if c == '\'' {
            if props.is_none() {
                return Err(VizError::style_parse(offset, "quote outside a block"));
            }
            in_string = !in_string;
            string_offset = offset;
            pending.quoted = true;
            continue;
        }
        if in_string {
            pending.push(c, true);
            continue;
        }

        match c {
            '{' if props.is_some() => {
                return Err(VizError::style_parse(offset, "nested `{`"));
            }
            '{' => props = Some(PropertyMap::new()),
            '}' => {
                let Some(mut map) = props.take() else {
                    return Err(VizError::style_parse(offset, "unmatched `}`"));
                };
                std::mem::take(&mut pending).finish(offset, &mut map)?;
                let selector = Selector::parse(&keyword).map_err(|error| match error {
                    VizError::StyleParse { message, .. } => {
                        VizError::style_parse(keyword_offset, message)
                    }
                    other => other,
                })?;
                match blocks.iter_mut().find(|(existing, _)| existing == &selector) {
                    Some((_, existing)) => *existing = map,
                    None => blocks.push((selector, map)),
                }
                keyword.clear();
            }
            ';' if props.is_some() => {
                if let Some(map) = props.as_mut() {
                    std::mem::take(&mut pending).finish(offset, map)?;
                }
            }
            ':' if props.is_some() && !pending.seen_colon => pending.seen_colon = true,
            other if props.is_some() => pending.push(other, false),
            other => {
                if !other.is_whitespace() {
                    if keyword.is_empty() {
                        keyword_offset = offset;
                    }
                    keyword.push(other);
                }
            }
        }
    }

    if in_string {
        return Err(VizError::style_parse(string_offset, "unterminated quote"));
    }
    if props.is_some() {
        return Err(VizError::style_parse(text.len(), "unclosed block"));
    }
    if !keyword.is_empty() {
        return Err(VizError::style_parse(
            keyword_offset,
            format!("selector `{keyword}` has no block"),
        ));
    }

    Ok(blocks)
}

fn needs_quotes(key: &str, value: &str) -> bool {
    key == "caption"
        || value.is_empty()
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace)
        || value.contains(['{', '}', ';', ':', '\''])
}

fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if matches!(c, '\'' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

pub fn write_sheet(rules: &[StyleRule]) -> String {
    let mut sheet = String::new();
    for rule in rules {
        let _ = writeln!(sheet, "{} {{", rule.selector);
        for (key, value) in &rule.props {
            if needs_quotes(key, value) {
                let _ = writeln!(sheet, "  {key}: {};", quote(value));
            } else {
                let _ = writeln!(sheet, "  {key}: {value};");
            }
        }
        sheet.push_str("}\n\n");
    }
    sheet
}
