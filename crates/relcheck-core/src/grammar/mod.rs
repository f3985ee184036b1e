//! # Role Grammar
//!
//! Declarative description of the expected structure of composites.
//!
//! A [`GrammarEntry`] applies to a composite through tag conditions and
//! defines [`RoleDef`]s: for one role key, the accepted member types, an
//! optional member expression and a cardinality.
//!
//! The grammar is produced by an external source and consumed read-only
//! through [`GrammarCache`].

mod cache;
mod expression;

pub use cache::{GrammarCache, GrammarSource, StaticGrammar};
pub use expression::MemberExpression;

use crate::graph::EntityStore;
use crate::{EntityId, EntityKind, Tags, ValidatorError};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// =============================================================================
// MEMBER TYPES
// =============================================================================

/// Member type as seen by the grammar.
///
/// Finer than [`EntityKind`]: closed lines and multipolygon composites are
/// told apart from their plain counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberType {
    Point,
    Line,
    ClosedLine,
    Multipolygon,
    Composite,
}

impl MemberType {
    /// Display type of a referenced entity.
    ///
    /// Entities unknown to the store are typed by their declared kind.
    pub fn of<S: EntityStore + ?Sized>(store: &S, id: EntityId) -> Self {
        let entity = store.entity(id);
        match id.kind {
            EntityKind::Point => Self::Point,
            EntityKind::Line if entity.is_some_and(|e| e.is_closed()) => Self::ClosedLine,
            EntityKind::Line => Self::Line,
            EntityKind::Composite if entity.is_some_and(|e| e.is_multipolygon()) => {
                Self::Multipolygon
            }
            EntityKind::Composite => Self::Composite,
        }
    }

    /// Name used in messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Line => "line",
            Self::ClosedLine => "closed line",
            Self::Multipolygon => "multipolygon",
            Self::Composite => "composite",
        }
    }
}

impl fmt::Display for MemberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// CARDINALITY
// =============================================================================

/// Number of members a role accepts.
///
/// Expressed through [`Cardinality::valid_count`]: the count the role would
/// accept given an observed count. An observed count is valid iff it equals
/// its valid count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Any number, including none.
    Any,
    /// Exactly `n`.
    Exactly(u64),
    /// At least `n`.
    AtLeast(u64),
    /// Between `min` and `max`, inclusive.
    Between(u64, u64),
    /// Either absent or exactly `n`.
    ZeroOr(u64),
}

impl Cardinality {
    /// The count the role accepts given `observed` members.
    #[must_use]
    pub fn valid_count(self, observed: u64) -> u64 {
        match self {
            Self::Any => observed,
            Self::Exactly(n) => n,
            Self::AtLeast(n) => observed.max(n),
            Self::Between(min, max) => observed.clamp(min, max),
            Self::ZeroOr(n) => {
                if observed == 0 {
                    0
                } else {
                    n
                }
            }
        }
    }
}

impl std::str::FromStr for Cardinality {
    type Err = ValidatorError;

    /// `*`, `N`, `N+`, `N-M` or `?N`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ValidatorError::InvalidCardinality(s.to_string());
        let number = |t: &str| t.trim().parse::<u64>().map_err(|_| invalid());

        if s == "*" {
            return Ok(Self::Any);
        }
        if let Some(n) = s.strip_prefix('?') {
            return Ok(Self::ZeroOr(number(n)?));
        }
        if let Some(n) = s.strip_suffix('+') {
            return Ok(Self::AtLeast(number(n)?));
        }
        if let Some((min, max)) = s.split_once('-') {
            let (min, max) = (number(min)?, number(max)?);
            if min > max {
                return Err(invalid());
            }
            return Ok(Self::Between(min, max));
        }
        Ok(Self::Exactly(number(s)?))
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Exactly(n) => write!(f, "{}", n),
            Self::AtLeast(n) => write!(f, "{}+", n),
            Self::Between(min, max) => write!(f, "{}-{}", min, max),
            Self::ZeroOr(n) => write!(f, "?{}", n),
        }
    }
}

// =============================================================================
// ROLE DEFINITION
// =============================================================================

/// Expected shape of the members carrying one role.
#[derive(Debug, Clone)]
pub struct RoleDef {
    /// Role key; a regular expression when `pattern` is set.
    pub key: String,
    pattern: Option<Regex>,
    /// Accepted member types; empty accepts every type.
    pub types: BTreeSet<MemberType>,
    /// Optional predicate over the member entity.
    pub member_expression: Option<MemberExpression>,
    /// Accepted member count.
    pub count: Cardinality,
}

impl RoleDef {
    /// A role matched by exact key, accepting any type and count.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            pattern: None,
            types: BTreeSet::new(),
            member_expression: None,
            count: Cardinality::Any,
        }
    }

    /// A role whose key is an anchored regular expression.
    pub fn pattern(key: impl Into<String>) -> Result<Self, ValidatorError> {
        let key = key.into();
        let pattern = Regex::new(&format!("^(?:{})$", key)).map_err(|e| {
            ValidatorError::InvalidGrammar {
                entry: key.clone(),
                message: format!("bad role pattern: {}", e),
            }
        })?;
        Ok(Self {
            pattern: Some(pattern),
            ..Self::new(key)
        })
    }

    /// Restrict the accepted member types.
    #[must_use]
    pub fn with_types(mut self, types: impl IntoIterator<Item = MemberType>) -> Self {
        self.types = types.into_iter().collect();
        self
    }

    /// Set the accepted member count.
    #[must_use]
    pub fn with_count(mut self, count: Cardinality) -> Self {
        self.count = count;
        self
    }

    /// Require members to satisfy an expression.
    #[must_use]
    pub fn with_expression(mut self, expression: MemberExpression) -> Self {
        self.member_expression = Some(expression);
        self
    }

    /// Whether the key is a pattern.
    #[must_use]
    pub fn is_pattern(&self) -> bool {
        self.pattern.is_some()
    }

    /// Whether a member role is covered by this definition.
    #[must_use]
    pub fn is_role(&self, role: &str) -> bool {
        match &self.pattern {
            Some(p) => p.is_match(role),
            None => self.key == role,
        }
    }

    /// Whether the member type is accepted.
    #[must_use]
    pub fn accepts(&self, member_type: MemberType) -> bool {
        self.types.is_empty() || self.types.contains(&member_type)
    }

    /// Valid count for the observed count.
    #[must_use]
    pub fn valid_count(&self, observed: u64) -> u64 {
        self.count.valid_count(observed)
    }
}

// =============================================================================
// GRAMMAR ENTRY
// =============================================================================

/// A tag requirement of a grammar entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCondition {
    /// Required key.
    pub key: String,
    /// Accepted values; empty accepts any value.
    pub values: Vec<String>,
}

impl TagCondition {
    /// Require `key` with one of `values` (any value when empty).
    #[must_use]
    pub fn new(key: impl Into<String>, values: &[&str]) -> Self {
        Self {
            key: key.into(),
            values: values.iter().map(|v| (*v).to_string()).collect(),
        }
    }

    /// Whether the tags satisfy the condition.
    #[must_use]
    pub fn matches(&self, tags: &Tags) -> bool {
        match tags.get(&self.key) {
            Some(v) => self.values.is_empty() || self.values.iter().any(|a| a == v),
            None => false,
        }
    }
}

/// Named structure definition for one family of composites.
#[derive(Debug, Clone)]
pub struct GrammarEntry {
    /// Human-readable name, quoted in diagnostics.
    pub name: String,
    /// All conditions must hold for the entry to apply.
    pub conditions: Vec<TagCondition>,
    /// Role definitions.
    pub roles: Vec<RoleDef>,
}

impl GrammarEntry {
    /// Create an entry.
    #[must_use]
    pub fn new(name: impl Into<String>, conditions: Vec<TagCondition>, roles: Vec<RoleDef>) -> Self {
        Self {
            name: name.into(),
            conditions,
            roles,
        }
    }

    /// An entry applies when it has conditions and all of them hold.
    #[must_use]
    pub fn applies_to(&self, tags: &Tags) -> bool {
        !self.conditions.is_empty() && self.conditions.iter().all(|c| c.matches(tags))
    }
}

// =============================================================================
// TESTS
// =============================================================================
