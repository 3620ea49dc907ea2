//! The compiled artifact cache.
//!
//! One [`CompiledArtifact`] per (resolved position, name). Artifacts are
//! immutable once built: a recompile installs a new `Arc` in a single map
//! write, so readers see either the old or the new code and never a mix.
//! Every install draws a fresh number from a monotonically increasing
//! generation sequence, which is how callers observe that an artifact was
//! (or was not) rebuilt.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use vellum_compiler::Code;
use vellum_core::{ArtifactKey, CompileDiagnostic};

/// Whether an artifact reflects the current definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArtifactStatus {
    Current,
    /// The last recompile failed; the code is the last good build.
    Stale { diagnostic: CompileDiagnostic },
}

impl ArtifactStatus {
    pub fn is_current(&self) -> bool {
        matches!(self, ArtifactStatus::Current)
    }
}

/// Generated code for one key plus its invalidation bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    pub key: ArtifactKey,
    pub code: Code,
    pub generation: u64,
    pub status: ArtifactStatus,
    /// Template names this artifact spliced in, transitively.
    pub includes: BTreeSet<String>,
    /// Phrase names this artifact inlined, transitively.
    pub phrases: BTreeSet<String>,
}

impl CompiledArtifact {
    pub fn is_stale(&self) -> bool {
        !self.status.is_current()
    }
}

/// Counters since the cache was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub compiled: u64,
    pub failed: u64,
    pub removed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    compiled: AtomicU64,
    failed: AtomicU64,
    removed: AtomicU64,
}

/// Thread-safe artifact map.
#[derive(Debug)]
pub struct ArtifactCache {
    artifacts: RwLock<FxHashMap<ArtifactKey, Arc<CompiledArtifact>>>,
    generation: AtomicU64,
    counters: Counters,
}

impl Default for ArtifactCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self {
            artifacts: RwLock::new(FxHashMap::default()),
            generation: AtomicU64::new(1),
            counters: Counters::default(),
        }
    }

    pub fn get(&self, key: &ArtifactKey) -> Option<Arc<CompiledArtifact>> {
        self.artifacts.read().get(key).cloned()
    }

    pub fn contains(&self, key: &ArtifactKey) -> bool {
        self.artifacts.read().contains_key(key)
    }

    /// Install freshly compiled code, replacing any previous artifact.
    pub fn install(
        &self,
        key: ArtifactKey,
        code: Code,
        includes: BTreeSet<String>,
        phrases: BTreeSet<String>,
    ) -> Arc<CompiledArtifact> {
        let artifact = Arc::new(CompiledArtifact {
            key: key.clone(),
            code,
            generation: self.next_generation(),
            status: ArtifactStatus::Current,
            includes,
            phrases,
        });
        self.artifacts.write().insert(key, Arc::clone(&artifact));
        self.counters.compiled.fetch_add(1, Ordering::Relaxed);
        artifact
    }

    /// Flag the artifact under `key` as stale, keeping its code and
    /// generation. The dependency sets are replaced with the ones seen by
    /// the failed compile so the artifact is retried when they change.
    ///
    /// Returns `None` when there is no previous artifact to keep.
    pub fn mark_stale(
        &self,
        key: &ArtifactKey,
        diagnostic: CompileDiagnostic,
        includes: BTreeSet<String>,
        phrases: BTreeSet<String>,
    ) -> Option<Arc<CompiledArtifact>> {
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        let mut artifacts = self.artifacts.write();
        let previous = artifacts.get(key)?;
        let mut includes = includes;
        let mut phrases = phrases;
        includes.extend(previous.includes.iter().cloned());
        phrases.extend(previous.phrases.iter().cloned());
        let stale = Arc::new(CompiledArtifact {
            key: key.clone(),
            code: previous.code.clone(),
            generation: previous.generation,
            status: ArtifactStatus::Stale { diagnostic },
            includes,
            phrases,
        });
        artifacts.insert(key.clone(), Arc::clone(&stale));
        Some(stale)
    }

    /// Record a failure with nothing to install or keep.
    pub fn record_failure(&self) {
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn remove(&self, key: &ArtifactKey) -> Option<Arc<CompiledArtifact>> {
        let removed = self.artifacts.write().remove(key);
        if removed.is_some() {
            self.counters.removed.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Every key, sorted.
    pub fn keys(&self) -> Vec<ArtifactKey> {
        let mut keys: Vec<_> = self.artifacts.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Keys matching a predicate, sorted.
    pub fn keys_where(&self, mut predicate: impl FnMut(&ArtifactKey) -> bool) -> Vec<ArtifactKey> {
        let mut keys: Vec<_> = self
            .artifacts
            .read()
            .keys()
            .filter(|key| predicate(key))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.read().is_empty()
    }

    /// Drop every artifact. The generation sequence keeps counting.
    pub fn clear(&self) {
        self.artifacts.write().clear();
    }

    /// Load persisted artifacts, continuing the generation sequence after
    /// the highest one seen.
    pub fn restore(&self, artifacts: impl IntoIterator<Item = CompiledArtifact>) {
        let mut map = self.artifacts.write();
        let mut highest = 0;
        for artifact in artifacts {
            highest = highest.max(artifact.generation);
            map.insert(artifact.key.clone(), Arc::new(artifact));
        }
        self.generation.fetch_max(highest + 1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            compiled: self.counters.compiled.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            removed: self.counters.removed.load(Ordering::Relaxed),
        }
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_core::PositionId;

    fn key(name: &str) -> ArtifactKey {
        ArtifactKey::template(PositionId(1), PositionId::ROOT, name)
    }

    fn diagnostic() -> CompileDiagnostic {
        CompileDiagnostic {
            message: "unknown function 'nope'".into(),
            offset: 3,
            line: 1,
            column: 4,
            template: "header".into(),
        }
    }

    #[test]
    fn installs_draw_increasing_generations() {
        let cache = ArtifactCache::new();
        let first = cache.install(key("a"), Code::text("a"), BTreeSet::new(), BTreeSet::new());
        let second = cache.install(key("b"), Code::text("b"), BTreeSet::new(), BTreeSet::new());
        let again = cache.install(key("a"), Code::text("a2"), BTreeSet::new(), BTreeSet::new());

        assert!(first.generation < second.generation);
        assert!(second.generation < again.generation);
        assert_eq!(cache.get(&key("a")).unwrap().code, Code::text("a2"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().compiled, 3);
    }

    #[test]
    fn stale_keeps_code_and_generation() {
        let cache = ArtifactCache::new();
        let good = cache.install(
            key("a"),
            Code::text("good"),
            BTreeSet::from(["footer".to_string()]),
            BTreeSet::new(),
        );
        let stale = cache
            .mark_stale(
                &key("a"),
                diagnostic(),
                BTreeSet::from(["sidebar".to_string()]),
                BTreeSet::new(),
            )
            .unwrap();

        assert!(stale.is_stale());
        assert_eq!(stale.code, Code::text("good"));
        assert_eq!(stale.generation, good.generation);
        assert!(stale.includes.contains("footer"));
        assert!(stale.includes.contains("sidebar"));
        assert_eq!(cache.stats().failed, 1);

        assert!(
            cache
                .mark_stale(
                    &key("missing"),
                    diagnostic(),
                    BTreeSet::new(),
                    BTreeSet::new(),
                )
                .is_none()
        );
    }

    #[test]
    fn restore_continues_the_sequence() {
        let cache = ArtifactCache::new();
        cache.restore([CompiledArtifact {
            key: key("a"),
            code: Code::text("a"),
            generation: 41,
            status: ArtifactStatus::Current,
            includes: BTreeSet::new(),
            phrases: BTreeSet::new(),
        }]);
        let next = cache.install(key("b"), Code::empty(), BTreeSet::new(), BTreeSet::new());
        assert_eq!(next.generation, 42);
    }

    #[test]
    fn remove_counts_only_existing_keys() {
        let cache = ArtifactCache::new();
        cache.install(key("a"), Code::empty(), BTreeSet::new(), BTreeSet::new());
        assert!(cache.remove(&key("a")).is_some());
        assert!(cache.remove(&key("a")).is_none());
        assert_eq!(cache.stats().removed, 1);
        assert!(cache.is_empty());
    }
}
