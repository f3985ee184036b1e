//! # Member Expressions
//!
//! Small tag-query language restricting which entities may carry a role.
//!
//! ```text
//! expr   := and ( '|' and )*
//! and    := unary ( ws unary )*
//! unary  := '-' unary | '(' expr ')' | term
//! term   := 'closed' | 'type:' kind | atom [ '=' atom ]
//! atom   := bare word | "quoted \" string"
//! ```
//!
//! `key` and `key=*` test for the key, `key=value` for the exact tag.

use crate::{Entity, EntityKind, ValidatorError};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Key(String),
    Tag(String, String),
    Kind(EntityKind),
    Closed,
    Not(Box<Predicate>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    fn matches(&self, entity: &Entity) -> bool {
        match self {
            Self::Key(k) => entity.tags.has_key(k),
            Self::Tag(k, v) => entity.tags.get(k) == Some(v.as_str()),
            Self::Kind(kind) => entity.kind() == *kind,
            Self::Closed => entity.is_closed(),
            Self::Not(p) => !p.matches(entity),
            Self::And(ps) => ps.iter().all(|p| p.matches(entity)),
            Self::Or(ps) => ps.iter().any(|p| p.matches(entity)),
        }
    }
}

/// A parsed member expression, keeping its source text for messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberExpression {
    source: String,
    predicate: Predicate,
}

impl MemberExpression {
    /// Parse an expression.
    pub fn parse(source: &str) -> Result<Self, ValidatorError> {
        let mut parser = Parser {
            source,
            chars: source.chars().collect(),
            pos: 0,
        };
        let predicate = parser.parse_or()?;
        parser.skip_ws();
        if parser.pos < parser.chars.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(Self {
            source: source.trim().to_string(),
            predicate,
        })
    }

    /// Whether the entity satisfies the expression.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        self.predicate.matches(entity)
    }

    /// The expression text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for MemberExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn error(&self, message: &str) -> ValidatorError {
        ValidatorError::InvalidExpression {
            expression: self.source.to_string(),
            message: format!("{} at offset {}", message, self.pos),
        }
    }

    fn parse_or(&mut self) -> Result<Predicate, ValidatorError> {
        let mut alternatives = vec![self.parse_and()?];
        loop {
            self.skip_ws();
            if self.peek() != Some('|') {
                break;
            }
            self.pos += 1;
            alternatives.push(self.parse_and()?);
        }
        Ok(flatten(alternatives, Predicate::Or))
    }

    fn parse_and(&mut self) -> Result<Predicate, ValidatorError> {
        let mut parts = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None | Some('|' | ')') => break,
                Some(_) => parts.push(self.parse_unary()?),
            }
        }
        if parts.is_empty() {
            return Err(self.error("expected a term"));
        }
        Ok(flatten(parts, Predicate::And))
    }

    fn parse_unary(&mut self) -> Result<Predicate, ValidatorError> {
        self.skip_ws();
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(Predicate::Not(Box::new(self.parse_unary()?)))
            }
            Some('(') => {
                self.pos += 1;
                let inner = self.parse_or()?;
                self.skip_ws();
                if self.peek() != Some(')') {
                    return Err(self.error("expected ')'"));
                }
                self.pos += 1;
                Ok(inner)
            }
            _ => self.parse_term(),
        }
    }

    fn parse_term(&mut self) -> Result<Predicate, ValidatorError> {
        let (key, quoted) = self.parse_atom()?;
        if !quoted {
            if key == "closed" {
                return Ok(Predicate::Closed);
            }
            if let Some(kind) = key.strip_prefix("type:") {
                return match kind {
                    "point" => Ok(Predicate::Kind(EntityKind::Point)),
                    "line" => Ok(Predicate::Kind(EntityKind::Line)),
                    "composite" => Ok(Predicate::Kind(EntityKind::Composite)),
                    _ => Err(self.error("unknown entity kind")),
                };
            }
        }
        if self.peek() != Some('=') {
            return Ok(Predicate::Key(key));
        }
        self.pos += 1;
        let (value, quoted) = self.parse_atom()?;
        if value == "*" && !quoted {
            Ok(Predicate::Key(key))
        } else {
            Ok(Predicate::Tag(key, value))
        }
    }

    /// Returns the atom text and whether it was quoted.
    fn parse_atom(&mut self) -> Result<(String, bool), ValidatorError> {
        if self.peek() == Some('"') {
            self.pos += 1;
            let mut text = String::new();
            loop {
                match self.peek() {
                    None => return Err(self.error("unterminated string")),
                    Some('"') => {
                        self.pos += 1;
                        return Ok((text, true));
                    }
                    Some('\\') if self.chars.get(self.pos + 1).is_some() => {
                        text.push(self.chars[self.pos + 1]);
                        self.pos += 2;
                    }
                    Some(c) => {
                        text.push(c);
                        self.pos += 1;
                    }
                }
            }
        }
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, '|' | '(' | ')' | '=' | '"') {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected a key or value"));
        }
        Ok((self.chars[start..self.pos].iter().collect(), false))
    }
}

fn flatten(mut parts: Vec<Predicate>, combine: fn(Vec<Predicate>) -> Predicate) -> Predicate {
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        combine(parts)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Tags;

    fn tagged(pairs: &[(&str, &str)]) -> Entity {
        Entity::point(1, pairs.iter().copied().collect::<Tags>())
    }

    fn matches(expr: &str, entity: &Entity) -> bool {
        MemberExpression::parse(expr).expect("parse").matches(entity)
    }

    #[test]
    fn key_and_tag_terms() {
        let stop = tagged(&[("public_transport", "stop_position"), ("bus", "yes")]);
        assert!(matches("bus", &stop));
        assert!(matches("bus=*", &stop));
        assert!(matches("public_transport=stop_position", &stop));
        assert!(!matches("public_transport=platform", &stop));
    }

    #[test]
    fn boolean_structure() {
        let e = tagged(&[("highway", "bus_stop")]);
        assert!(matches("railway | highway=bus_stop", &e));
        assert!(!matches("highway railway", &e));
        assert!(matches("highway -railway", &e));
        assert!(matches("-(railway | amenity)", &e));
    }

    #[test]
    fn kind_and_closed_keywords() {
        let ring = Entity::line(1, Tags::new(), vec![1, 2, 3, 1]);
        assert!(matches("type:line closed", &ring));
        assert!(!matches("type:point", &ring));
        assert!(MemberExpression::parse("type:area").is_err());
    }

    #[test]
    fn quoted_values_and_keywords() {
        let e = tagged(&[("name", "Main Street"), ("closed", "yes")]);
        assert!(matches("name=\"Main Street\"", &e));
        assert!(matches("\"closed\"=yes", &e));
    }

    #[test]
    fn keeps_source_for_messages() {
        let expr = MemberExpression::parse("  highway | railway ").expect("parse");
        assert_eq!(expr.to_string(), "highway | railway");
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in ["", "(highway", "highway |", "name=\"open", "a)"] {
            assert!(MemberExpression::parse(bad).is_err(), "{bad:?} should fail");
        }
    }
}
