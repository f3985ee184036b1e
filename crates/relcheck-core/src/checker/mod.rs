//! # Composite Checker
//!
//! The composite-membership rule. Per visited composite it checks
//! emptiness, matches the members against the role grammar, and traverses
//! containment for loops. Loops are deferred to the end of the run so each
//! one is reported once.
//!
//! ## Flow of `visit_composite`
//!
//! 1. Empty composite (no usable member): error, and no member checks.
//! 2. Role checks, unless policy skips the composite's type:
//!    - no applicable grammar entry: "type unknown" (or the public
//!      transport scheme warning);
//!    - otherwise member shape, role counts and unknown roles.
//! 3. Loop discovery.

mod cycles;
mod roles;

pub use cycles::{Cycle, CycleRegistry, would_create_cycle};

use crate::config::CheckerConfig;
use crate::diagnostic::{Diagnostic, Diagnostics, Severity};
use crate::engine::Rule;
use crate::fix::Fix;
use crate::grammar::{GrammarCache, GrammarEntry};
use crate::graph::EntityStore;
use crate::primitives::{
    COMPOSITE_EMPTY, COMPOSITE_LOOP, COMPOSITE_UNKNOWN, PUBLIC_TRANSPORT_ROUTES,
    PUBLIC_TRANSPORT_VERSION_KEY,
};
use crate::{Entity, EntityId, ValidatorError};
use std::sync::Arc;

const NAME: &str = "Composite checker";
const DESCRIPTION: &str = "Checks composite roles against the role grammar and finds circular composites.";

/// The composite-membership rule.
#[derive(Debug)]
pub struct CompositeChecker {
    grammar: Arc<GrammarCache>,
    config: CheckerConfig,
    entries: Arc<[GrammarEntry]>,
    cycles: CycleRegistry,
}

impl CompositeChecker {
    /// Create a checker reading the shared grammar cache.
    #[must_use]
    pub fn new(grammar: Arc<GrammarCache>, config: CheckerConfig) -> Self {
        Self {
            grammar,
            config,
            entries: Arc::from(Vec::new()),
            cycles: CycleRegistry::new(),
        }
    }

    /// Policy in effect.
    #[must_use]
    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Grammar entries used by the current run.
    #[must_use]
    pub fn entries(&self) -> &[GrammarEntry] {
        &self.entries
    }

    /// Would adding `child` under `parent` create a loop, under this
    /// checker's loop policy? See [`would_create_cycle`].
    pub fn would_create_cycle<S: EntityStore + ?Sized>(
        &self,
        store: &S,
        parent: EntityId,
        child: EntityId,
    ) -> Vec<EntityId> {
        would_create_cycle(store, parent, child, self.config.allow_complex_loops)
    }

    fn skips_roles(&self, composite: &Entity) -> bool {
        (self.config.skip_multipolygons && composite.is_multipolygon())
            || (self.config.skip_turn_restrictions
                && composite.tags.has_tag("type", &["restriction"]))
    }

    /// Grammar checks. Members are only matched when `with_members` is set.
    fn check_grammar(
        &self,
        store: &dyn EntityStore,
        composite: &Entity,
        with_members: bool,
        out: &mut Diagnostics,
    ) {
        let found = roles::candidates(&self.entries, &composite.tags);
        if !found.is_empty() {
            if with_members {
                roles::check_roles(NAME, store, composite, &found, out);
            }
            return;
        }
        let tags = &composite.tags;
        if tags.has_tag("type", &["route"]) && tags.has_tag("route", PUBLIC_TRANSPORT_ROUTES) {
            out.push(
                Diagnostic::builder(NAME, Severity::Warning, COMPOSITE_UNKNOWN)
                    .grouped(
                        "Route scheme is unspecified",
                        "Add {0} ({1}=public_transport; {2}=legacy)",
                        vec![PUBLIC_TRANSPORT_VERSION_KEY.to_string(), "2".to_string(), "1".to_string()],
                    )
                    .entity(composite.id)
                    .build(),
            );
        } else if tags.has_key("type") {
            out.push(
                Diagnostic::builder(NAME, Severity::Other, COMPOSITE_UNKNOWN)
                    .message("Composite type is unknown")
                    .entity(composite.id)
                    .build(),
            );
        }
    }
}

/// No usable member: every member is deleted, incomplete or unknown.
fn is_empty(store: &dyn EntityStore, composite: &Entity) -> bool {
    !composite.members().iter().any(|m| store.is_usable(m.entity))
}

impl Rule for CompositeChecker {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn initialize(&mut self) -> Result<(), ValidatorError> {
        self.entries = self
            .grammar
            .snapshot()
            .map_err(|e| match e {
                ValidatorError::GrammarUnavailable(_) => e,
                other => ValidatorError::GrammarUnavailable(other.to_string()),
            })?;
        tracing::debug!(entries = self.entries.len(), "composite checker initialized");
        Ok(())
    }

    fn start(&mut self) {
        self.cycles.clear();
        // Pick up a grammar rebuilt since the last run.
        match self.grammar.snapshot() {
            Ok(entries) => self.entries = entries,
            Err(e) => tracing::warn!(error = %e, "keeping previous role grammar"),
        }
    }

    fn visit_composite(&mut self, store: &dyn EntityStore, entity: &Entity, out: &mut Diagnostics) {
        let empty = is_empty(store, entity);
        if empty {
            out.push(
                Diagnostic::builder(NAME, Severity::Error, COMPOSITE_EMPTY)
                    .message("Composite is empty")
                    .entity(entity.id)
                    .build(),
            );
        }
        if !self.skips_roles(entity) {
            self.check_grammar(store, entity, !empty, out);
        }
        self.cycles.discover(store, entity.id);
    }

    fn finish(&mut self, out: &mut Diagnostics) {
        if self.config.allow_complex_loops {
            self.cycles.drop_complex();
        }
        let cycles = self.cycles.take();
        if !cycles.is_empty() {
            tracing::debug!(loops = cycles.len(), "composite loops found");
        }
        for cycle in cycles {
            out.push(cycle.diagnostic(NAME));
        }
    }

    fn is_fixable(&self, diagnostic: &Diagnostic, _store: &dyn EntityStore) -> bool {
        if diagnostic.rule != NAME {
            return false;
        }
        match diagnostic.code {
            COMPOSITE_EMPTY => diagnostic.entities.first().is_some_and(|id| id.is_new()),
            COMPOSITE_LOOP => diagnostic.entities.len() == 1,
            _ => false,
        }
    }

    fn fix(&self, diagnostic: &Diagnostic, store: &dyn EntityStore) -> Option<Fix> {
        if !self.is_fixable(diagnostic, store) {
            return None;
        }
        let first = *diagnostic.entities.first()?;
        if store.is_deleted(first) {
            return None;
        }
        match diagnostic.code {
            COMPOSITE_EMPTY => Fix::delete_if_needed(store, diagnostic.entities.iter().copied()),
            COMPOSITE_LOOP => {
                let concerned = diagnostic.entity_set();
                let members = store
                    .entity(first)?
                    .members()
                    .iter()
                    .filter(|m| !concerned.contains(&m.entity))
                    .cloned()
                    .collect();
                Some(Fix::ChangeMembers {
                    composite: first,
                    members,
                })
            }
            _ => None,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
