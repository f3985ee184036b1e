//! # Core Type Definitions
//!
//! This module contains the entity model validated by relcheck:
//! - Identifiers (`EntityKind`, `EntityId`)
//! - Tag sets (`Tags`)
//! - Entities and their kind-specific bodies (`Entity`, `EntityBody`, `Member`)
//! - Error types (`ValidatorError`)
//!
//! ## Ownership
//!
//! Entities belong to the external entity graph. Rules only ever borrow them;
//! the single mutation path is an explicitly applied [`crate::fix::Fix`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// The three entity kinds of a map data set.
///
/// The declaration order is the visiting order of the rule engine:
/// points, then lines, then composites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A single located point.
    Point,
    /// An ordered chain of points.
    Line,
    /// An ordered list of role-tagged references to other entities.
    Composite,
}

impl EntityKind {
    /// Lowercase name used in messages and wire formats.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Line => "line",
            Self::Composite => "composite",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stable identity of an entity.
///
/// Numeric ids are only unique per kind, so the kind is part of the identity.
/// Non-positive ids denote entities created locally and never uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId {
    /// The entity kind.
    pub kind: EntityKind,
    /// The per-kind numeric id.
    pub id: i64,
}

impl EntityId {
    /// Create a new identifier.
    #[must_use]
    pub const fn new(kind: EntityKind, id: i64) -> Self {
        Self { kind, id }
    }

    /// Point identifier helper.
    #[must_use]
    pub const fn point(id: i64) -> Self {
        Self::new(EntityKind::Point, id)
    }

    /// Line identifier helper.
    #[must_use]
    pub const fn line(id: i64) -> Self {
        Self::new(EntityKind::Line, id)
    }

    /// Composite identifier helper.
    #[must_use]
    pub const fn composite(id: i64) -> Self {
        Self::new(EntityKind::Composite, id)
    }

    /// Whether this entity was created locally (never uploaded).
    #[must_use]
    pub const fn is_new(self) -> bool {
        self.id <= 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

impl std::str::FromStr for EntityId {
    type Err = ValidatorError;

    /// Parse `kind/id`, e.g. `composite/42` or `line/-3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidatorError::InvalidEntityId(s.to_string());
        let (kind, id) = s.split_once('/').ok_or_else(invalid)?;
        let kind = match kind {
            "point" => EntityKind::Point,
            "line" => EntityKind::Line,
            "composite" => EntityKind::Composite,
            _ => return Err(invalid()),
        };
        let id = id.parse::<i64>().map_err(|_| invalid())?;
        Ok(Self::new(kind, id))
    }
}

// =============================================================================
// TAGS
// =============================================================================

/// Key/value tag set with unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    /// Create an empty tag set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a tag, replacing any previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Get the value of a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether the key is present.
    #[must_use]
    pub fn has_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Whether the key is present with one of the given values.
    #[must_use]
    pub fn has_tag(&self, key: &str, values: &[&str]) -> bool {
        self.get(key).is_some_and(|v| values.contains(&v))
    }

    /// Iterate tags in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether the set holds no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// A role-tagged reference held by a composite.
///
/// The referenced kind is fixed at reference time through `entity.kind`.
/// The empty role is the default role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Free-form role string.
    pub role: String,
    /// The referenced entity.
    pub entity: EntityId,
}

impl Member {
    /// Create a new member.
    #[must_use]
    pub fn new(role: impl Into<String>, entity: EntityId) -> Self {
        Self {
            role: role.into(),
            entity,
        }
    }
}

/// Kind-specific payload of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityBody {
    /// Points carry no structure beyond their tags.
    Point,
    /// Lines reference their points in order.
    Line { nodes: Vec<EntityId> },
    /// Composites reference members in order.
    Composite { members: Vec<Member> },
}

/// An entity of the validated data set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    /// Stable identity. The kind always agrees with `body`.
    pub id: EntityId,
    /// Tag set.
    pub tags: Tags,
    /// Deleted entities are kept as tombstones until upload.
    pub deleted: bool,
    /// Incomplete entities are known by reference only (not downloaded).
    pub incomplete: bool,
    /// Kind-specific payload.
    pub body: EntityBody,
}

impl Entity {
    /// Create a point.
    #[must_use]
    pub fn point(id: i64, tags: Tags) -> Self {
        Self::with_body(EntityId::point(id), tags, EntityBody::Point)
    }

    /// Create a line over the given point ids.
    #[must_use]
    pub fn line(id: i64, tags: Tags, nodes: Vec<i64>) -> Self {
        let nodes = nodes.into_iter().map(EntityId::point).collect();
        Self::with_body(EntityId::line(id), tags, EntityBody::Line { nodes })
    }

    /// Create a composite with the given members.
    #[must_use]
    pub fn composite(id: i64, tags: Tags, members: Vec<Member>) -> Self {
        Self::with_body(
            EntityId::composite(id),
            tags,
            EntityBody::Composite { members },
        )
    }

    /// Create an incomplete placeholder known only by id.
    #[must_use]
    pub fn placeholder(id: EntityId) -> Self {
        let body = match id.kind {
            EntityKind::Point => EntityBody::Point,
            EntityKind::Line => EntityBody::Line { nodes: Vec::new() },
            EntityKind::Composite => EntityBody::Composite {
                members: Vec::new(),
            },
        };
        Self {
            incomplete: true,
            ..Self::with_body(id, Tags::new(), body)
        }
    }

    fn with_body(id: EntityId, tags: Tags, body: EntityBody) -> Self {
        Self {
            id,
            tags,
            deleted: false,
            incomplete: false,
            body,
        }
    }

    /// The entity kind.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.id.kind
    }

    /// Usable entities are neither deleted nor incomplete.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.deleted && !self.incomplete
    }

    /// Members of a composite; empty for other kinds.
    #[must_use]
    pub fn members(&self) -> &[Member] {
        match &self.body {
            EntityBody::Composite { members } => members,
            _ => &[],
        }
    }

    /// Point count of a line; zero for other kinds.
    #[must_use]
    pub fn node_count(&self) -> usize {
        match &self.body {
            EntityBody::Line { nodes } => nodes.len(),
            _ => 0,
        }
    }

    /// A line is closed when it has at least three points and ends where it starts.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        match &self.body {
            EntityBody::Line { nodes } if !self.incomplete && nodes.len() >= 3 => {
                nodes.first() == nodes.last()
            }
            _ => false,
        }
    }

    /// Composites describing an area (`type=multipolygon` or `type=boundary`).
    #[must_use]
    pub fn is_multipolygon(&self) -> bool {
        self.kind() == EntityKind::Composite
            && self.tags.has_tag("type", &["multipolygon", "boundary"])
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur around a validation run.
///
/// Entity-level checks never fail; they report diagnostics instead.
/// These errors cover rule setup, lifecycle misuse and wire formats.
#[derive(Debug, Error)]
pub enum ValidatorError {
    /// The role grammar could not be loaded.
    #[error("Role grammar unavailable: {0}")]
    GrammarUnavailable(String),

    /// The role grammar is malformed.
    #[error("Invalid grammar entry '{entry}': {message}")]
    InvalidGrammar { entry: String, message: String },

    /// A member expression could not be parsed.
    #[error("Invalid member expression '{expression}': {message}")]
    InvalidExpression { expression: String, message: String },

    /// A cardinality string could not be parsed.
    #[error("Invalid cardinality: {0}")]
    InvalidCardinality(String),

    /// An entity identifier could not be parsed.
    #[error("Invalid entity id: {0}")]
    InvalidEntityId(String),

    /// The requested entity does not exist in the graph.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// A rule was driven out of its lifecycle order.
    #[error("Rule '{rule}' used before {expected}")]
    Lifecycle { rule: String, expected: &'static str },

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_order_is_visit_order() {
        assert!(EntityKind::Point < EntityKind::Line);
        assert!(EntityKind::Line < EntityKind::Composite);
    }

    #[test]
    fn entity_id_round_trips_through_display() {
        let id = EntityId::composite(-7);
        let parsed: EntityId = id.to_string().parse().expect("parse");
        assert_eq!(parsed, id);
        assert!(id.is_new());
        assert!(!EntityId::line(3).is_new());
    }

    #[test]
    fn entity_id_rejects_garbage() {
        assert!("relation/1".parse::<EntityId>().is_err());
        assert!("line/x".parse::<EntityId>().is_err());
        assert!("17".parse::<EntityId>().is_err());
    }

    #[test]
    fn closed_line_needs_three_points() {
        let closed = Entity::line(1, Tags::new(), vec![1, 2, 3, 1]);
        let degenerate = Entity::line(2, Tags::new(), vec![1, 1]);
        let open = Entity::line(3, Tags::new(), vec![1, 2, 3]);
        assert!(closed.is_closed());
        assert!(!degenerate.is_closed());
        assert!(!open.is_closed());
    }

    #[test]
    fn placeholder_is_unusable() {
        let p = Entity::placeholder(EntityId::composite(9));
        assert!(p.incomplete);
        assert!(!p.is_usable());
        assert!(p.members().is_empty());
    }

    #[test]
    fn multipolygon_detection() {
        let mp = Entity::composite(1, [("type", "boundary")].into_iter().collect(), vec![]);
        let route = Entity::composite(2, [("type", "route")].into_iter().collect(), vec![]);
        assert!(mp.is_multipolygon());
        assert!(!route.is_multipolygon());
    }
}
