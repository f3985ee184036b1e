//! # Fixes
//!
//! Reversible mutations materialized for fixable diagnostics.
//!
//! Rules only describe a fix; applying it is left to the caller (usually an
//! undo-aware command layer). Applying a fix returns its inverse, so
//! replaying the inverse restores the previous state exactly.

use crate::graph::{EntityGraph, EntityStore};
use crate::{EntityId, Member, ValidatorError};

/// A reversible mutation of an entity graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fix {
    /// Mark entities deleted.
    Delete(Vec<EntityId>),
    /// Clear the deleted mark of entities.
    Undelete(Vec<EntityId>),
    /// Replace the member list of a composite.
    ChangeMembers {
        composite: EntityId,
        members: Vec<Member>,
    },
}

impl Fix {
    /// Delete the given entities, skipping those already deleted.
    ///
    /// Returns `None` when nothing is left to delete.
    pub fn delete_if_needed<S: EntityStore + ?Sized>(
        store: &S,
        ids: impl IntoIterator<Item = EntityId>,
    ) -> Option<Self> {
        let remaining: Vec<EntityId> = ids.into_iter().filter(|id| !store.is_deleted(*id)).collect();
        (!remaining.is_empty()).then_some(Self::Delete(remaining))
    }

    /// Short description for command history.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Delete(ids) => format!("Delete {} entities", ids.len()),
            Self::Undelete(ids) => format!("Restore {} entities", ids.len()),
            Self::ChangeMembers { composite, members } => {
                format!("Set {} members of {}", members.len(), composite)
            }
        }
    }

    /// Apply the fix and return its inverse.
    ///
    /// Fails without mutating anything when a referenced entity is missing.
    pub fn apply(&self, graph: &mut EntityGraph) -> Result<Fix, ValidatorError> {
        match self {
            Self::Delete(ids) => {
                set_deleted(graph, ids, true)?;
                Ok(Self::Undelete(ids.clone()))
            }
            Self::Undelete(ids) => {
                set_deleted(graph, ids, false)?;
                Ok(Self::Delete(ids.clone()))
            }
            Self::ChangeMembers { composite, members } => {
                let previous = graph.set_members(*composite, members.clone())?;
                Ok(Self::ChangeMembers {
                    composite: *composite,
                    members: previous,
                })
            }
        }
    }
}

fn set_deleted(graph: &mut EntityGraph, ids: &[EntityId], deleted: bool) -> Result<(), ValidatorError> {
    if let Some(missing) = ids.iter().find(|id| graph.entity(**id).is_none()) {
        return Err(ValidatorError::EntityNotFound(*missing));
    }
    for id in ids {
        graph.entity_mut(*id)?.deleted = deleted;
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Entity, Tags};

    fn sample() -> EntityGraph {
        [
            Entity::composite(-1, Tags::new(), vec![]),
            Entity::composite(
                2,
                Tags::new(),
                vec![
                    Member::new("", EntityId::composite(2)),
                    Member::new("x", EntityId::point(1)),
                ],
            ),
            Entity::point(1, Tags::new()),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn delete_round_trips() {
        let mut graph = sample();
        let id = EntityId::composite(-1);

        let undo = Fix::Delete(vec![id]).apply(&mut graph).expect("apply");
        assert!(graph.is_deleted(id));

        undo.apply(&mut graph).expect("undo");
        assert!(!graph.is_deleted(id));
    }

    #[test]
    fn change_members_round_trips() {
        let mut graph = sample();
        let id = EntityId::composite(2);
        let before = graph.entity(id).expect("entity").members().to_vec();

        let undo = Fix::ChangeMembers {
            composite: id,
            members: vec![Member::new("x", EntityId::point(1))],
        }
        .apply(&mut graph)
        .expect("apply");
        assert_eq!(graph.entity(id).expect("entity").members().len(), 1);

        undo.apply(&mut graph).expect("undo");
        assert_eq!(graph.entity(id).expect("entity").members(), before.as_slice());
    }

    #[test]
    fn delete_missing_entity_fails_untouched() {
        let mut graph = sample();
        let fix = Fix::Delete(vec![EntityId::composite(-1), EntityId::line(99)]);
        assert!(fix.apply(&mut graph).is_err());
        assert!(!graph.is_deleted(EntityId::composite(-1)));
    }

    #[test]
    fn delete_if_needed_skips_deleted() {
        let mut graph = sample();
        let id = EntityId::composite(-1);
        graph.entity_mut(id).expect("entity").deleted = true;

        assert_eq!(Fix::delete_if_needed(&graph, [id]), None);
        assert_eq!(
            Fix::delete_if_needed(&graph, [id, EntityId::point(1)]),
            Some(Fix::Delete(vec![EntityId::point(1)]))
        );
    }
}
