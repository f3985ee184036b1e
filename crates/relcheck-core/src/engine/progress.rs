//! # Progress and Cancellation
//!
//! The engine polls the bound monitor once per dispatched entity. Cancellation
//! is cooperative: a canceled run stops before its next dispatch and keeps
//! every diagnostic gathered so far.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Progress sink and cancellation source bound to a validation run.
///
/// All methods default to no-ops so implementors only override what they
/// observe.
pub trait ProgressMonitor {
    /// A run starts.
    fn begin_task(&mut self, _title: &str) {}

    /// Total number of ticks the run will report.
    fn set_ticks_count(&mut self, _ticks: usize) {}

    /// Ticks completed since the last call.
    fn worked(&mut self, _ticks: usize) {}

    /// Coarse, human-readable progress text.
    fn set_extra_text(&mut self, _text: &str) {}

    /// Whether the caller asked the run to stop.
    fn is_canceled(&self) -> bool {
        false
    }

    /// The run is finished and the binding released.
    fn finish_task(&mut self) {}
}

/// Stand-in used when the caller supplies no monitor.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressMonitor for NullProgress {}

/// Shared cancellation flag.
///
/// Clones observe the same flag, so a caller keeps one clone and hands
/// another to the run. A bare token is itself a silent monitor.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    canceled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not canceled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Relaxed)
    }
}

impl ProgressMonitor for CancellationToken {
    fn is_canceled(&self) -> bool {
        CancellationToken::is_canceled(self)
    }
}

/// Monitor that reports progress through `tracing`.
///
/// Without a token the run cannot be canceled through this monitor.
#[derive(Debug, Default)]
pub struct TracingProgress {
    token: Option<CancellationToken>,
    title: String,
    ticks: usize,
    done: usize,
}

impl TracingProgress {
    /// Create a monitor that only reports progress.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a monitor observing the given token.
    #[must_use]
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token: Some(token),
            ..Self::default()
        }
    }

    /// Ticks completed so far.
    #[must_use]
    pub fn done(&self) -> usize {
        self.done
    }
}

impl ProgressMonitor for TracingProgress {
    fn begin_task(&mut self, title: &str) {
        self.title = title.to_string();
        self.done = 0;
        tracing::debug!(task = %self.title, "begin");
    }

    fn set_ticks_count(&mut self, ticks: usize) {
        self.ticks = ticks;
    }

    fn worked(&mut self, ticks: usize) {
        self.done = self.done.saturating_add(ticks);
    }

    fn set_extra_text(&mut self, text: &str) {
        tracing::info!(task = %self.title, done = self.done, total = self.ticks, "{}", text);
    }

    fn is_canceled(&self) -> bool {
        self.token.as_ref().is_some_and(CancellationToken::is_canceled)
    }

    fn finish_task(&mut self) {
        tracing::debug!(task = %self.title, done = self.done, total = self.ticks, "finished");
    }
}
