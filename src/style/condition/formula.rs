use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Result, VizError};

/// Propositional formula over named features.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Formula {
    Const(bool),
    Var(String),
    Not(Box<Formula>),
    And(Vec<Formula>),
    Or(Vec<Formula>),
}

impl Formula {
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = tokenize(text)?;
        let mut parser = Parser {
            tokens: &tokens,
            cursor: 0,
            source_len: text.len(),
        };
        let formula = parser.disjunction()?;
        match parser.peek() {
            None => Ok(formula),
            Some((offset, token)) => Err(VizError::style_parse(
                *offset,
                format!("unexpected {token} in formula `{text}`"),
            )),
        }
    }

    pub fn variables(&self) -> BTreeSet<String> {
        let mut variables = BTreeSet::new();
        self.collect_variables(&mut variables);
        variables
    }

    fn collect_variables(&self, into: &mut BTreeSet<String>) {
        match self {
            Self::Const(_) => {}
            Self::Var(name) => {
                into.insert(name.clone());
            }
            Self::Not(inner) => inner.collect_variables(into),
            Self::And(items) | Self::Or(items) => {
                for item in items {
                    item.collect_variables(into);
                }
            }
        }
    }

    pub fn evaluate(&self, value_of: &impl Fn(&str) -> bool) -> bool {
        match self {
            Self::Const(value) => *value,
            Self::Var(name) => value_of(name),
            Self::Not(inner) => !inner.evaluate(value_of),
            Self::And(items) => items.iter().all(|item| item.evaluate(value_of)),
            Self::Or(items) => items.iter().any(|item| item.evaluate(value_of)),
        }
    }

    /// Three-valued evaluation: `None` while unassigned variables still decide the result.
    pub fn evaluate_partial(&self, value_of: &impl Fn(&str) -> Option<bool>) -> Option<bool> {
        match self {
            Self::Const(value) => Some(*value),
            Self::Var(name) => value_of(name),
            Self::Not(inner) => inner.evaluate_partial(value_of).map(|value| !value),
            Self::And(items) => {
                let mut undecided = false;
                for item in items {
                    match item.evaluate_partial(value_of) {
                        Some(false) => return Some(false),
                        Some(true) => {}
                        None => undecided = true,
                    }
                }
                (!undecided).then_some(true)
            }
            Self::Or(items) => {
                let mut undecided = false;
                for item in items {
                    match item.evaluate_partial(value_of) {
                        Some(true) => return Some(true),
                        Some(false) => {}
                        None => undecided = true,
                    }
                }
                (!undecided).then_some(false)
            }
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn joined(f: &mut fmt::Formatter<'_>, items: &[Formula], operator: &str) -> fmt::Result {
            f.write_str("(")?;
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    write!(f, " {operator} ")?;
                }
                write!(f, "{item}")?;
            }
            f.write_str(")")
        }

        match self {
            Self::Const(value) => write!(f, "{value}"),
            Self::Var(name) => f.write_str(name),
            Self::Not(inner) => write!(f, "!{inner}"),
            Self::And(items) => joined(f, items, "/\\"),
            Self::Or(items) => joined(f, items, "\\/"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Ident(String),
    Not,
    And,
    Or,
    Open,
    Close,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "`{name}`"),
            Self::Not => f.write_str("`!`"),
            Self::And => f.write_str("conjunction"),
            Self::Or => f.write_str("disjunction"),
            Self::Open => f.write_str("`(`"),
            Self::Close => f.write_str("`)`"),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token)>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '!' => Token::Not,
            '*' | '&' => Token::And,
            '+' | '|' => Token::Or,
            '(' => Token::Open,
            ')' => Token::Close,
            '/' if chars.peek().is_some_and(|(_, next)| *next == '\\') => {
                chars.next();
                Token::And
            }
            '\\' if chars.peek().is_some_and(|(_, next)| *next == '/') => {
                chars.next();
                Token::Or
            }
            c if is_ident_char(c) => {
                let mut name = c.to_string();
                while let Some((_, next)) = chars.peek().copied() {
                    if !is_ident_char(next) {
                        break;
                    }
                    name.push(next);
                    chars.next();
                }
                Token::Ident(name)
            }
            other => {
                return Err(VizError::style_parse(
                    offset,
                    format!("unexpected character `{other}` in formula `{text}`"),
                ));
            }
        };
        tokens.push((offset, token));
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [(usize, Token)],
    cursor: usize,
    source_len: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&(usize, Token)> {
        self.tokens.get(self.cursor)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek().is_some_and(|(_, token)| token == expected) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn disjunction(&mut self) -> Result<Formula> {
        let mut items = vec![self.conjunction()?];
        while self.eat(&Token::Or) {
            items.push(self.conjunction()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Formula::Or(items)
        })
    }

    fn conjunction(&mut self) -> Result<Formula> {
        let mut items = vec![self.unary()?];
        while self.eat(&Token::And) {
            items.push(self.unary()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Formula::And(items)
        })
    }

    fn unary(&mut self) -> Result<Formula> {
        if self.eat(&Token::Not) {
            return Ok(Formula::Not(Box::new(self.unary()?)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Formula> {
        let Some((offset, token)) = self.tokens.get(self.cursor).cloned() else {
            return Err(VizError::style_parse(
                self.source_len,
                "formula ended unexpectedly",
            ));
        };
        self.cursor += 1;

        match token {
            Token::Ident(name) => Ok(match name.as_str() {
                "true" | "TRUE" => Formula::Const(true),
                "false" | "FALSE" => Formula::Const(false),
                _ => Formula::Var(name),
            }),
            Token::Open => {
                let inner = self.disjunction()?;
                if self.eat(&Token::Close) {
                    Ok(inner)
                } else {
                    Err(VizError::style_parse(offset, "unbalanced `(` in formula"))
                }
            }
            other => Err(VizError::style_parse(
                offset,
                format!("expected a feature name, found {other}"),
            )),
        }
    }
}
