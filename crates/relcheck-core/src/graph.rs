//! # Entity Graph
//!
//! The entity collection under validation.
//!
//! This module implements the `EntityStore` trait used by rules to resolve
//! member references. All data structures use `BTreeMap` for deterministic
//! ordering.

use crate::{Entity, EntityBody, EntityId, EntityKind, Member, ValidatorError};
use std::collections::BTreeMap;

// =============================================================================
// ENTITYSTORE TRAIT
// =============================================================================

/// Read access to an entity collection.
///
/// Rules never mutate the store. References to ids the store does not know
/// are treated as incomplete placeholders by every consumer.
pub trait EntityStore {
    /// Lookup an entity by id.
    fn entity(&self, id: EntityId) -> Option<&Entity>;

    /// Whether a referenced entity is usable (present, not deleted, complete).
    fn is_usable(&self, id: EntityId) -> bool {
        self.entity(id).is_some_and(Entity::is_usable)
    }

    /// Whether a referenced entity is incomplete or unknown to the store.
    fn is_incomplete(&self, id: EntityId) -> bool {
        self.entity(id).is_none_or(|e| e.incomplete)
    }

    /// Whether a referenced entity is deleted.
    fn is_deleted(&self, id: EntityId) -> bool {
        self.entity(id).is_some_and(|e| e.deleted)
    }

    /// Distinct composite members of a composite, in first-occurrence order.
    fn child_composites(&self, id: EntityId) -> Vec<EntityId> {
        let mut children: Vec<EntityId> = Vec::new();
        if let Some(entity) = self.entity(id) {
            for member in entity.members() {
                if member.entity.kind == EntityKind::Composite && !children.contains(&member.entity)
                {
                    children.push(member.entity);
                }
            }
        }
        children
    }
}

// =============================================================================
// GRAPH IMPLEMENTATION
// =============================================================================

/// In-memory entity collection keyed by id.
#[derive(Debug, Clone, Default)]
pub struct EntityGraph {
    entities: BTreeMap<EntityId, Entity>,
}

impl EntityGraph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entity. Returns its id.
    pub fn insert(&mut self, entity: Entity) -> EntityId {
        let id = entity.id;
        self.entities.insert(id, entity);
        id
    }

    /// Mutable lookup, used by fixes.
    pub fn entity_mut(&mut self, id: EntityId) -> Result<&mut Entity, ValidatorError> {
        self.entities
            .get_mut(&id)
            .ok_or(ValidatorError::EntityNotFound(id))
    }

    /// Replace the member list of a composite. Returns the previous list.
    pub fn set_members(
        &mut self,
        id: EntityId,
        members: Vec<Member>,
    ) -> Result<Vec<Member>, ValidatorError> {
        let entity = self.entity_mut(id)?;
        match &mut entity.body {
            EntityBody::Composite { members: current } => Ok(std::mem::replace(current, members)),
            _ => Err(ValidatorError::EntityNotFound(id)),
        }
    }

    /// All entities in deterministic order (kind, then id).
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// All ids in deterministic order.
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Total number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the graph holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl EntityStore for EntityGraph {
    fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }
}

impl FromIterator<Entity> for EntityGraph {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        let mut graph = Self::new();
        for entity in iter {
            graph.insert(entity);
        }
        graph
    }
}

// =============================================================================
// TESTS
// =============================================================================
