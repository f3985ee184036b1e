//! # Grammar Cache
//!
//! Lazily built, rebuildable view of the external role grammar.
//!
//! The cache is an owned context object shared by `Arc`; rules hold a
//! snapshot (`Arc<[GrammarEntry]>`) for the duration of a run. A rebuild
//! swaps the snapshot atomically under the lock, so runs in progress keep
//! reading the grammar they started with.

use super::GrammarEntry;
use crate::ValidatorError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Provider of grammar entries.
pub trait GrammarSource: Send + Sync {
    /// Load every grammar entry.
    fn load(&self) -> Result<Vec<GrammarEntry>, ValidatorError>;
}

/// Grammar source backed by entries held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticGrammar {
    entries: Vec<GrammarEntry>,
}

impl StaticGrammar {
    /// Wrap a list of entries.
    #[must_use]
    pub fn new(entries: Vec<GrammarEntry>) -> Self {
        Self { entries }
    }
}

impl GrammarSource for StaticGrammar {
    fn load(&self) -> Result<Vec<GrammarEntry>, ValidatorError> {
        Ok(self.entries.clone())
    }
}

/// Cache of the entries that define roles.
pub struct GrammarCache {
    source: Box<dyn GrammarSource>,
    entries: RwLock<Option<Arc<[GrammarEntry]>>>,
    builds: AtomicU64,
}

impl GrammarCache {
    /// Create an empty cache over a source. Nothing is loaded yet.
    #[must_use]
    pub fn new(source: impl GrammarSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            entries: RwLock::new(None),
            builds: AtomicU64::new(0),
        }
    }

    /// Cache over in-memory entries.
    #[must_use]
    pub fn from_entries(entries: Vec<GrammarEntry>) -> Self {
        Self::new(StaticGrammar::new(entries))
    }

    /// The cached entries, building them on first use.
    pub fn snapshot(&self) -> Result<Arc<[GrammarEntry]>, ValidatorError> {
        if let Some(entries) = self.read().as_ref() {
            return Ok(Arc::clone(entries));
        }
        let mut slot = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have built it while we waited for the lock.
        if let Some(entries) = slot.as_ref() {
            return Ok(Arc::clone(entries));
        }
        let entries = self.build()?;
        *slot = Some(Arc::clone(&entries));
        Ok(entries)
    }

    /// Drop the cached entries; the next snapshot rebuilds them.
    pub fn invalidate(&self) {
        *self.entries.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Reload the entries from the source now.
    ///
    /// On failure the cache is left empty, never stale.
    pub fn rebuild(&self) -> Result<(), ValidatorError> {
        let mut slot = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
        *slot = Some(self.build()?);
        Ok(())
    }

    /// Notification that the source changed (entry added, removed or modified).
    pub fn grammar_changed(&self) -> Result<(), ValidatorError> {
        self.invalidate();
        self.rebuild()
    }

    /// Whether entries are currently cached.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.read().is_some()
    }

    /// Number of builds performed so far.
    #[must_use]
    pub fn builds(&self) -> u64 {
        self.builds.load(Ordering::Relaxed)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Arc<[GrammarEntry]>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn build(&self) -> Result<Arc<[GrammarEntry]>, ValidatorError> {
        let entries: Vec<GrammarEntry> = self
            .source
            .load()?
            .into_iter()
            .filter(|e| !e.roles.is_empty())
            .collect();
        let builds = self.builds.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(entries = entries.len(), builds, "role grammar cache built");
        Ok(Arc::from(entries))
    }
}

impl std::fmt::Debug for GrammarCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrammarCache")
            .field("loaded", &self.is_loaded())
            .field("builds", &self.builds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{RoleDef, TagCondition};
    use std::sync::Mutex;

    /// Source whose entries can be swapped between loads.
    struct Swappable(Arc<Mutex<Vec<GrammarEntry>>>);

    impl GrammarSource for Swappable {
        fn load(&self) -> Result<Vec<GrammarEntry>, ValidatorError> {
            Ok(self.0.lock().unwrap_or_else(PoisonError::into_inner).clone())
        }
    }

    struct Broken;

    impl GrammarSource for Broken {
        fn load(&self) -> Result<Vec<GrammarEntry>, ValidatorError> {
            Err(ValidatorError::GrammarUnavailable("offline".into()))
        }
    }

    fn entry(name: &str, roles: Vec<RoleDef>) -> GrammarEntry {
        GrammarEntry::new(name, vec![TagCondition::new("type", &[name])], roles)
    }

    #[test]
    fn builds_lazily_once() {
        let cache = GrammarCache::from_entries(vec![entry("route", vec![RoleDef::new("stop")])]);
        assert!(!cache.is_loaded());

        let first = cache.snapshot().expect("snapshot");
        let second = cache.snapshot().expect("snapshot");
        assert_eq!(first.len(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.builds(), 1);
    }

    #[test]
    fn entries_without_roles_are_dropped() {
        let cache = GrammarCache::from_entries(vec![
            entry("route", vec![RoleDef::new("stop")]),
            entry("site", vec![]),
        ]);
        let entries = cache.snapshot().expect("snapshot");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "route");
    }

    #[test]
    fn grammar_changed_rebuilds_from_source() {
        let shared = Arc::new(Mutex::new(vec![entry("route", vec![RoleDef::new("stop")])]));
        let cache = GrammarCache::new(Swappable(Arc::clone(&shared)));
        let before = cache.snapshot().expect("snapshot");

        shared
            .lock()
            .expect("lock")
            .push(entry("network", vec![RoleDef::new("")]));
        cache.grammar_changed().expect("rebuild");

        let after = cache.snapshot().expect("snapshot");
        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 2);
        assert_eq!(cache.builds(), 2);
    }

    #[test]
    fn invalidate_forces_reload() {
        let cache = GrammarCache::from_entries(vec![entry("route", vec![RoleDef::new("stop")])]);
        cache.snapshot().expect("snapshot");
        cache.invalidate();
        assert!(!cache.is_loaded());
        cache.snapshot().expect("snapshot");
        assert_eq!(cache.builds(), 2);
    }

    #[test]
    fn load_failure_is_reported() {
        let cache = GrammarCache::new(Broken);
        assert!(matches!(
            cache.snapshot(),
            Err(ValidatorError::GrammarUnavailable(_))
        ));
        assert!(cache.rebuild().is_err());
        assert!(!cache.is_loaded());
    }
}
