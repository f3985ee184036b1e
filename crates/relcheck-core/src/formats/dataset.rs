//! # Data Set Format
//!
//! JSON serialization of entity graphs.
//!
//! This is a pure transformation; file I/O lives in the app layer.
//!
//! ```json
//! { "entities": [
//!     { "type": "point", "id": 1, "tags": { "highway": "bus_stop" } },
//!     { "type": "line", "id": 2, "nodes": [1, 3, 4] },
//!     { "type": "composite", "id": -1, "tags": { "type": "route" },
//!       "members": [ { "type": "line", "ref": 2, "role": "" } ] }
//! ] }
//! ```
//!
//! `deleted` and `incomplete` default to `false`. Member references to ids
//! absent from the document are incomplete placeholders for every consumer.

use crate::graph::{EntityGraph, EntityStore};
use crate::primitives::MAX_DOCUMENT_SIZE;
use crate::{Entity, EntityBody, EntityId, EntityKind, Member, Tags, ValidatorError};
use serde::{Deserialize, Serialize};

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct DataSetWire {
    entities: Vec<EntityWire>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntityWire {
    #[serde(rename = "type")]
    kind: EntityKind,
    id: i64,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    tags: Tags,
    #[serde(default, skip_serializing_if = "is_false")]
    deleted: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    incomplete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nodes: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    members: Option<Vec<MemberWire>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct MemberWire {
    #[serde(rename = "type")]
    kind: EntityKind,
    #[serde(rename = "ref")]
    reference: i64,
    #[serde(default)]
    role: String,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl From<&Entity> for EntityWire {
    fn from(entity: &Entity) -> Self {
        let (nodes, members) = match &entity.body {
            EntityBody::Point => (None, None),
            EntityBody::Line { nodes } => (Some(nodes.iter().map(|n| n.id).collect()), None),
            EntityBody::Composite { members } => (
                None,
                Some(
                    members
                        .iter()
                        .map(|m| MemberWire {
                            kind: m.entity.kind,
                            reference: m.entity.id,
                            role: m.role.clone(),
                        })
                        .collect(),
                ),
            ),
        };
        Self {
            kind: entity.kind(),
            id: entity.id.id,
            tags: entity.tags.clone(),
            deleted: entity.deleted,
            incomplete: entity.incomplete,
            nodes,
            members,
        }
    }
}

impl TryFrom<EntityWire> for Entity {
    type Error = ValidatorError;

    fn try_from(wire: EntityWire) -> Result<Self, Self::Error> {
        let id = EntityId::new(wire.kind, wire.id);
        let misplaced = |field: &str| {
            ValidatorError::DeserializationError(format!("{} cannot carry '{}'", id, field))
        };
        let mut entity = match wire.kind {
            EntityKind::Point => {
                if wire.nodes.is_some() {
                    return Err(misplaced("nodes"));
                }
                if wire.members.is_some() {
                    return Err(misplaced("members"));
                }
                Entity::point(wire.id, wire.tags)
            }
            EntityKind::Line => {
                if wire.members.is_some() {
                    return Err(misplaced("members"));
                }
                Entity::line(wire.id, wire.tags, wire.nodes.unwrap_or_default())
            }
            EntityKind::Composite => {
                if wire.nodes.is_some() {
                    return Err(misplaced("nodes"));
                }
                let members = wire
                    .members
                    .unwrap_or_default()
                    .into_iter()
                    .map(|m| Member::new(m.role, EntityId::new(m.kind, m.reference)))
                    .collect();
                Entity::composite(wire.id, wire.tags, members)
            }
        };
        entity.deleted = wire.deleted;
        entity.incomplete = wire.incomplete;
        Ok(entity)
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Parse a JSON data set.
///
/// The document size is checked before parsing. Duplicate ids are rejected.
pub fn dataset_from_json(text: &str) -> Result<EntityGraph, ValidatorError> {
    if text.len() > MAX_DOCUMENT_SIZE {
        return Err(ValidatorError::DeserializationError(format!(
            "Data set of {} bytes exceeds maximum allowed {} bytes",
            text.len(),
            MAX_DOCUMENT_SIZE
        )));
    }
    let wire: DataSetWire = serde_json::from_str(text)
        .map_err(|e| ValidatorError::DeserializationError(e.to_string()))?;

    let mut graph = EntityGraph::new();
    for entity in wire.entities {
        let entity = Entity::try_from(entity)?;
        if graph.entity(entity.id).is_some() {
            return Err(ValidatorError::DeserializationError(format!(
                "Duplicate entity {}",
                entity.id
            )));
        }
        graph.insert(entity);
    }
    Ok(graph)
}

/// Serialize a graph as pretty-printed JSON, entities in id order.
pub fn dataset_to_json(graph: &EntityGraph) -> Result<String, ValidatorError> {
    let wire = DataSetWire {
        entities: graph.entities().map(EntityWire::from).collect(),
    };
    serde_json::to_string_pretty(&wire).map_err(|e| ValidatorError::SerializationError(e.to_string()))
}

// =============================================================================
// TESTS
// =============================================================================
