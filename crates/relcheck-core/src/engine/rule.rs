//! # Rule Contract
//!
//! A rule is a per-kind visitor. The runner owns the diagnostic list and the
//! progress binding; the rule only receives the entity under check, read
//! access to the store, and the list to push findings into.

use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::fix::Fix;
use crate::graph::EntityStore;
use crate::{Entity, ValidatorError};

/// A validation rule driven by [`super::RuleRunner`].
///
/// The trait is object-safe; heterogeneous rules can be driven as
/// `Box<dyn Rule>`.
pub trait Rule {
    /// Rule name, recorded in every diagnostic it produces.
    fn name(&self) -> &str;

    /// One-line description for listings.
    fn description(&self) -> &str {
        ""
    }

    /// One-time setup. A failure aborts the run.
    fn initialize(&mut self) -> Result<(), ValidatorError> {
        Ok(())
    }

    /// Per-run reset, called when a run starts.
    fn start(&mut self) {}

    /// Check a usable point.
    fn visit_point(&mut self, _store: &dyn EntityStore, _entity: &Entity, _out: &mut Diagnostics) {}

    /// Check a usable line with at least two points.
    fn visit_line(&mut self, _store: &dyn EntityStore, _entity: &Entity, _out: &mut Diagnostics) {}

    /// Check a usable composite.
    fn visit_composite(
        &mut self,
        _store: &dyn EntityStore,
        _entity: &Entity,
        _out: &mut Diagnostics,
    ) {
    }

    /// Flush deferred findings at the end of a run.
    fn finish(&mut self, _out: &mut Diagnostics) {}

    /// Whether a fix can be materialized for the diagnostic.
    fn is_fixable(&self, _diagnostic: &Diagnostic, _store: &dyn EntityStore) -> bool {
        false
    }

    /// Materialize a fix for the diagnostic, if any.
    fn fix(&self, _diagnostic: &Diagnostic, _store: &dyn EntityStore) -> Option<Fix> {
        None
    }
}

impl<R: Rule + ?Sized> Rule for Box<R> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn description(&self) -> &str {
        (**self).description()
    }

    fn initialize(&mut self) -> Result<(), ValidatorError> {
        (**self).initialize()
    }

    fn start(&mut self) {
        (**self).start();
    }

    fn visit_point(&mut self, store: &dyn EntityStore, entity: &Entity, out: &mut Diagnostics) {
        (**self).visit_point(store, entity, out);
    }

    fn visit_line(&mut self, store: &dyn EntityStore, entity: &Entity, out: &mut Diagnostics) {
        (**self).visit_line(store, entity, out);
    }

    fn visit_composite(&mut self, store: &dyn EntityStore, entity: &Entity, out: &mut Diagnostics) {
        (**self).visit_composite(store, entity, out);
    }

    fn finish(&mut self, out: &mut Diagnostics) {
        (**self).finish(out);
    }

    fn is_fixable(&self, diagnostic: &Diagnostic, store: &dyn EntityStore) -> bool {
        (**self).is_fixable(diagnostic, store)
    }

    fn fix(&self, diagnostic: &Diagnostic, store: &dyn EntityStore) -> Option<Fix> {
        (**self).fix(diagnostic, store)
    }
}
