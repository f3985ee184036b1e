//! # relcheck-core
//!
//! Composite-membership validator for map entity graphs.
//!
//! Map data sets hold points, lines and composites; composites reference
//! other entities (including other composites) as role-tagged members. This
//! crate checks composites against a declarative role grammar and finds
//! circular containment, reporting findings as [`Diagnostic`]s.
//!
//! ## Layers
//!
//! - `types`, `graph`: the entity model and read access to it
//! - `engine`: generic rule driver with cancellation and progress
//! - `grammar`: role grammar, member expressions and the grammar cache
//! - `checker`: the composite rule and cycle detection
//! - `fix`: reversible mutations for fixable diagnostics
//! - `formats`: JSON data sets and TOML grammars (no file I/O)
//!
//! ## Example
//!
//! ```
//! use relcheck_core::{
//!     CheckerConfig, CompositeChecker, Entity, EntityGraph, EntityId, GrammarCache, Member,
//!     RuleRunner, Tags,
//! };
//! use std::sync::Arc;
//!
//! let graph: EntityGraph = [
//!     Entity::composite(1, Tags::new(), vec![Member::new("", EntityId::composite(2))]),
//!     Entity::composite(2, Tags::new(), vec![Member::new("", EntityId::composite(1))]),
//! ]
//! .into_iter()
//! .collect();
//!
//! let grammar = Arc::new(GrammarCache::from_entries(Vec::new()));
//! let mut runner = RuleRunner::new(CompositeChecker::new(grammar, CheckerConfig::default()));
//! let diagnostics = runner.validate(&graph, &graph.ids(), None).expect("validate");
//! assert_eq!(diagnostics.len(), 1);
//! ```
//!
//! ## Architectural Constraints
//!
//! - Pure, synchronous Rust: no async, no network, no file I/O
//! - Deterministic: ordered collections everywhere, no hash iteration
//! - Entities are read-only to rules; only an applied [`Fix`] mutates

// =============================================================================
// MODULES
// =============================================================================

pub mod checker;
pub mod config;
pub mod diagnostic;
pub mod engine;
pub mod fix;
pub mod formats;
pub mod grammar;
pub mod graph;
pub mod primitives;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Entity, EntityBody, EntityId, EntityKind, Member, Tags, ValidatorError};

// =============================================================================
// RE-EXPORTS: Validation
// =============================================================================

pub use checker::{CompositeChecker, Cycle, CycleRegistry, would_create_cycle};
pub use config::CheckerConfig;
pub use diagnostic::{Diagnostic, DiagnosticBuilder, Diagnostics, Message, Severity};
pub use engine::{
    CancellationToken, NullProgress, ProgressMonitor, Rule, RuleRunner, RunOutcome,
    TracingProgress,
};
pub use fix::Fix;
pub use graph::{EntityGraph, EntityStore};

// =============================================================================
// RE-EXPORTS: Grammar
// =============================================================================

pub use grammar::{
    Cardinality, GrammarCache, GrammarEntry, GrammarSource, MemberExpression, MemberType, RoleDef,
    StaticGrammar, TagCondition,
};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{dataset_from_json, dataset_to_json, grammar_from_toml};
