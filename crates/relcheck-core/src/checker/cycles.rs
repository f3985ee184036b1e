//! # Cycle Detection
//!
//! Depth-first discovery of circular composite containment.
//!
//! An edge runs from composite P to composite C when C is a usable member
//! of P. Every visited composite seeds a traversal; re-entering the current
//! path closes a loop. The [`CycleRegistry`] keeps one minimal
//! representative per loop, so a loop is reported once whatever composite
//! the run happened to visit first.

use crate::diagnostic::{Diagnostic, Severity};
use crate::graph::EntityStore;
use crate::primitives::COMPOSITE_LOOP;
use crate::{EntityId, EntityKind};
use std::collections::BTreeSet;

/// Headline for loops over one or two composites.
const CONTAINS_ITSELF: &str = "Composite contains itself as a member";

/// Headline for loops over three or more composites.
const CIRCULAR_DEPENDENCY: &str = "Composites generate circular dependency of parent/child elements";

// =============================================================================
// CYCLE
// =============================================================================

/// A closed containment path.
///
/// `path` starts and ends with the same composite; `members` is the set of
/// distinct composites on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    path: Vec<EntityId>,
    members: BTreeSet<EntityId>,
}

impl Cycle {
    fn new(path: Vec<EntityId>) -> Self {
        let members = path.iter().copied().collect();
        Self { path, members }
    }

    /// The closed path, first entry repeated at the end.
    #[must_use]
    pub fn path(&self) -> &[EntityId] {
        &self.path
    }

    /// Distinct composites on the loop.
    #[must_use]
    pub fn members(&self) -> &BTreeSet<EntityId> {
        &self.members
    }

    /// Number of distinct composites on the loop.
    #[must_use]
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Loops over more than two composites.
    #[must_use]
    pub fn is_complex(&self) -> bool {
        self.size() > 2
    }

    /// Distinct composites in path order.
    #[must_use]
    pub fn distinct(&self) -> Vec<EntityId> {
        let mut seen = BTreeSet::new();
        self.path.iter().copied().filter(|id| seen.insert(*id)).collect()
    }

    /// The loop diagnostic, concerning every composite on the loop once.
    #[must_use]
    pub fn diagnostic(&self, rule: &str) -> Diagnostic {
        let headline = if self.is_complex() {
            CIRCULAR_DEPENDENCY
        } else {
            CONTAINS_ITSELF
        };
        Diagnostic::builder(rule, Severity::Error, COMPOSITE_LOOP)
            .message(headline)
            .entities(self.distinct())
            .build()
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Loops discovered during one run.
#[derive(Debug, Clone, Default)]
pub struct CycleRegistry {
    cycles: Vec<Cycle>,
}

impl CycleRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every recorded loop.
    pub fn clear(&mut self) {
        self.cycles.clear();
    }

    /// Recorded loops, in discovery order.
    #[must_use]
    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    /// Number of recorded loops.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    /// Whether no loop is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    /// Traverse containment from `start`.
    pub fn discover<S: EntityStore + ?Sized>(&mut self, store: &S, start: EntityId) {
        self.walk(store, start, Vec::new());
    }

    /// Drop loops over more than two composites.
    pub fn drop_complex(&mut self) {
        self.cycles.retain(|c| !c.is_complex());
    }

    /// Move the recorded loops out, leaving the registry empty.
    pub fn take(&mut self) -> Vec<Cycle> {
        std::mem::take(&mut self.cycles)
    }

    /// Every simple containment path from `start`, extending `path`.
    ///
    /// Runs on an explicit stack so deep chains cannot exhaust the thread
    /// stack.
    fn walk<S: EntityStore + ?Sized>(&mut self, store: &S, start: EntityId, mut path: Vec<EntityId>) {
        if path.contains(&start) {
            self.record(&path, start);
            return;
        }
        let mut on_path: BTreeSet<EntityId> = path.iter().copied().collect();
        path.push(start);
        on_path.insert(start);

        // One frame per composite on the path below the seed: its children
        // and the index of the next one to follow.
        let mut stack: Vec<(Vec<EntityId>, usize)> = vec![(store.child_composites(start), 0)];
        while let Some((children, next)) = stack.last_mut() {
            let step = children.get(*next).copied();
            *next += 1;
            match step {
                None => {
                    stack.pop();
                    if let Some(done) = path.pop() {
                        on_path.remove(&done);
                    }
                }
                Some(child) if !store.is_usable(child) => {}
                Some(child) if on_path.contains(&child) => self.record(&path, child),
                Some(child) => {
                    path.push(child);
                    on_path.insert(child);
                    stack.push((store.child_composites(child), 0));
                }
            }
        }
    }

    /// `path` re-entered `closing`. The path holds distinct composites.
    fn record(&mut self, path: &[EntityId], closing: EntityId) {
        let on_path: BTreeSet<EntityId> = path.iter().copied().collect();
        let mut redundant = false;
        self.cycles.retain(|known| {
            if redundant {
                return true;
            }
            // A larger known loop through the whole path only adds an
            // irrelevant parent.
            if known.size() > path.len() && known.members.is_superset(&on_path) {
                return false;
            }
            if path.len() >= known.size() && known.members.is_subset(&on_path) {
                redundant = true;
            }
            true
        });
        if redundant {
            return;
        }
        // Loops entered from a parent outside them are recorded when the
        // loop itself is visited.
        if path.first() == Some(&closing) {
            let mut closed = path.to_vec();
            closed.push(closing);
            self.cycles.push(Cycle::new(closed));
        }
    }
}

// =============================================================================
// INCREMENTAL QUERY
// =============================================================================

/// Would adding `child` as a member of `parent` create a loop?
///
/// Returns an empty list when the link is safe, otherwise the loop path.
/// The path normally starts and ends with `parent`; when `child` already
/// sits on a loop of its own, that loop may be returned instead.
pub fn would_create_cycle<S: EntityStore + ?Sized>(
    store: &S,
    parent: EntityId,
    child: EntityId,
    allow_complex_loops: bool,
) -> Vec<EntityId> {
    if parent.kind != EntityKind::Composite || child.kind != EntityKind::Composite {
        return Vec::new();
    }
    let mut registry = CycleRegistry::new();
    registry.walk(store, child, vec![parent]);
    if allow_complex_loops {
        registry.drop_complex();
    }
    registry
        .take()
        .into_iter()
        .next()
        .map(|c| c.path)
        .unwrap_or_default()
}

// =============================================================================
// TESTS
// =============================================================================
