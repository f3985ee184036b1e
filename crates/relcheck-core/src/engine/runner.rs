//! # Rule Runner
//!
//! Drives one rule over an entity selection.
//!
//! Lifecycle: `initialize` once, then per run `start` → `run` → `finish`.
//! `validate` bundles a whole run for callers that need no finer control.

use super::progress::{NullProgress, ProgressMonitor};
use super::rule::Rule;
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::fix::Fix;
use crate::graph::EntityStore;
use crate::primitives::{DIAGNOSTICS_INITIAL_CAPACITY, PROGRESS_TEXT_INTERVAL};
use crate::{Entity, EntityBody, EntityId, EntityKind, ValidatorError};
use std::collections::BTreeSet;
use std::time::Instant;

/// Outcome of [`RuleRunner::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Entities taken from the selection before the run ended.
    pub visited: usize,
    /// Entities actually dispatched to the rule.
    pub dispatched: usize,
    /// Whether the run stopped on cancellation.
    pub canceled: bool,
}

/// Generic driver for a [`Rule`].
pub struct RuleRunner<R: Rule> {
    rule: R,
    diagnostics: Diagnostics,
    progress: Option<Box<dyn ProgressMonitor>>,
    stopwatch: Option<Instant>,
    initialized: bool,
    partial_selection: bool,
    show_element_count: bool,
}

impl<R: Rule> RuleRunner<R> {
    /// Wrap a rule.
    #[must_use]
    pub fn new(rule: R) -> Self {
        Self {
            rule,
            diagnostics: Diagnostics::new(),
            progress: None,
            stopwatch: None,
            initialized: false,
            partial_selection: false,
            show_element_count: false,
        }
    }

    /// The driven rule.
    #[must_use]
    pub fn rule(&self) -> &R {
        &self.rule
    }

    /// Mutable access to the driven rule.
    pub fn rule_mut(&mut self) -> &mut R {
        &mut self.rule
    }

    /// Mark the next runs as covering a partial selection of the data.
    pub fn set_partial_selection(&mut self, partial: bool) {
        self.partial_selection = partial;
    }

    /// Whether runs cover a partial selection.
    #[must_use]
    pub fn is_partial_selection(&self) -> bool {
        self.partial_selection
    }

    /// Push "N of M elements done" text every [`PROGRESS_TEXT_INTERVAL`] entities.
    pub fn set_show_element_count(&mut self, show: bool) {
        self.show_element_count = show;
    }

    /// One-time setup of the rule.
    pub fn initialize(&mut self) -> Result<(), ValidatorError> {
        self.stopwatch = Some(Instant::now());
        self.rule.initialize()?;
        self.initialized = true;
        Ok(())
    }

    /// Begin a run: reset diagnostics and bind the progress monitor.
    ///
    /// A missing monitor is replaced by [`NullProgress`].
    pub fn start(&mut self, progress: Option<Box<dyn ProgressMonitor>>) -> Result<(), ValidatorError> {
        if !self.initialized {
            return Err(self.lifecycle("initialize"));
        }
        let mut progress = progress.unwrap_or_else(|| Box::new(NullProgress));
        let title = format!("Running test {}", self.rule.name());
        progress.begin_task(&title);
        tracing::debug!("{}", title);

        self.progress = Some(progress);
        self.diagnostics = Diagnostics::with_capacity(DIAGNOSTICS_INITIAL_CAPACITY);
        self.stopwatch = Some(Instant::now());
        self.rule.start();
        Ok(())
    }

    /// Visit the selection: points, then lines, then composites, each group in
    /// selection order.
    ///
    /// Ids unknown to the store are ignored. Deleted or incomplete entities
    /// and lines with fewer than two points are counted but not dispatched.
    pub fn run<S: EntityStore>(
        &mut self,
        store: &S,
        selection: &[EntityId],
    ) -> Result<RunOutcome, ValidatorError> {
        let Some(progress) = self.progress.as_mut() else {
            return Err(ValidatorError::Lifecycle {
                rule: self.rule.name().to_string(),
                expected: "start",
            });
        };

        let mut ordered: Vec<&Entity> = selection.iter().filter_map(|id| store.entity(*id)).collect();
        ordered.sort_by_key(|e| e.kind());

        let total = ordered.len();
        progress.set_ticks_count(total);

        let mut outcome = RunOutcome {
            visited: 0,
            dispatched: 0,
            canceled: false,
        };
        for entity in ordered {
            if progress.is_canceled() {
                tracing::info!(rule = self.rule.name(), visited = outcome.visited, "run canceled");
                outcome.canceled = true;
                break;
            }
            if is_checkable(entity) {
                dispatch(&mut self.rule, store, entity, &mut self.diagnostics);
                outcome.dispatched += 1;
            }
            outcome.visited += 1;
            progress.worked(1);
            if self.show_element_count && outcome.visited % PROGRESS_TEXT_INTERVAL == 0 {
                progress.set_extra_text(&format!("{} of {} elements done", outcome.visited, total));
            }
        }
        Ok(outcome)
    }

    /// Whether the bound monitor reports cancellation.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.progress.as_ref().is_some_and(|p| p.is_canceled())
    }

    /// End a run: flush deferred findings, release the monitor, log timing.
    pub fn finish(&mut self) {
        self.rule.finish(&mut self.diagnostics);
        if let Some(mut progress) = self.progress.take() {
            progress.finish_task();
        }
        if let Some(started) = self.stopwatch {
            tracing::debug!(
                rule = self.rule.name(),
                diagnostics = self.diagnostics.len(),
                "{} took {:?}",
                self.rule.name(),
                started.elapsed()
            );
        }
    }

    /// Drop diagnostics that concern none of the relevant entities.
    pub fn filter_diagnostics(&mut self, relevant: &BTreeSet<EntityId>) {
        if !self.diagnostics.is_empty() {
            self.diagnostics.retain_concerned(relevant);
        }
    }

    /// Diagnostics gathered so far.
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Move the diagnostics out, leaving an empty list.
    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }

    /// Whether the rule can fix the diagnostic.
    pub fn is_fixable<S: EntityStore>(&self, diagnostic: &Diagnostic, store: &S) -> bool {
        self.rule.is_fixable(diagnostic, store)
    }

    /// Materialize the rule's fix for the diagnostic.
    pub fn fix<S: EntityStore>(&self, diagnostic: &Diagnostic, store: &S) -> Option<Fix> {
        self.rule.fix(diagnostic, store)
    }

    /// Run the whole lifecycle over a selection and return the diagnostics.
    ///
    /// Initializes the rule on first use. On a partial selection the result is
    /// filtered down to diagnostics concerning the selection. Cancellation is
    /// not an error: the diagnostics gathered before it are returned.
    pub fn validate<S: EntityStore>(
        &mut self,
        store: &S,
        selection: &[EntityId],
        progress: Option<Box<dyn ProgressMonitor>>,
    ) -> Result<Diagnostics, ValidatorError> {
        if !self.initialized {
            self.initialize()?;
        }
        self.start(progress)?;
        self.run(store, selection)?;
        self.finish();
        if self.partial_selection {
            let relevant: BTreeSet<EntityId> = selection.iter().copied().collect();
            self.filter_diagnostics(&relevant);
        }
        Ok(self.take_diagnostics())
    }

    fn lifecycle(&self, expected: &'static str) -> ValidatorError {
        ValidatorError::Lifecycle {
            rule: self.rule.name().to_string(),
            expected,
        }
    }
}

/// Deleted and incomplete entities are skipped, as are lines that cannot
/// form a segment.
fn is_checkable(entity: &Entity) -> bool {
    entity.is_usable() && (entity.kind() != EntityKind::Line || entity.node_count() > 1)
}

fn dispatch<R: Rule, S: EntityStore>(rule: &mut R, store: &S, entity: &Entity, out: &mut Diagnostics) {
    match entity.body {
        EntityBody::Point => rule.visit_point(store, entity, out),
        EntityBody::Line { .. } => rule.visit_line(store, entity, out),
        EntityBody::Composite { .. } => rule.visit_composite(store, entity, out),
    }
}

// =============================================================================
// TESTS
// =============================================================================
