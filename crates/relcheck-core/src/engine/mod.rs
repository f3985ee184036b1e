//! # Rule Engine
//!
//! Generic driver running validation rules over an entity selection, with
//! cooperative cancellation, coarse progress reporting and post-hoc
//! filtering for partial selections.

mod progress;
mod rule;
mod runner;

pub use progress::{CancellationToken, NullProgress, ProgressMonitor, TracingProgress};
pub use rule::Rule;
pub use runner::{RuleRunner, RunOutcome};
