//! The dependency graph.
//!
//! For every artifact, the template names it includes and the phrase names
//! it inlines, plus reverse indexes from a name back to the artifacts that
//! reference it. Edges recorded by the compiler are already transitive, so
//! one reverse lookup yields every artifact that must be regenerated when a
//! name changes.

use std::collections::BTreeSet;

use rustc_hash::{FxHashMap, FxHashSet};
use vellum_core::ArtifactKey;

/// The outgoing edges of one artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Edges {
    pub includes: BTreeSet<String>,
    pub phrases: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    forward: FxHashMap<ArtifactKey, Edges>,
    includers: FxHashMap<String, FxHashSet<ArtifactKey>>,
    phrase_users: FxHashMap<String, FxHashSet<ArtifactKey>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the edges of `key`.
    pub fn set_edges(&mut self, key: &ArtifactKey, edges: Edges) {
        self.unlink(key);
        for name in &edges.includes {
            self.includers
                .entry(name.clone())
                .or_default()
                .insert(key.clone());
        }
        for name in &edges.phrases {
            self.phrase_users
                .entry(name.clone())
                .or_default()
                .insert(key.clone());
        }
        self.forward.insert(key.clone(), edges);
    }

    /// Forget `key` entirely.
    pub fn remove(&mut self, key: &ArtifactKey) -> Option<Edges> {
        self.unlink(key);
        self.forward.remove(key)
    }

    pub fn edges(&self, key: &ArtifactKey) -> Option<&Edges> {
        self.forward.get(key)
    }

    /// Artifacts that include the template `name`, sorted.
    pub fn includers_of(&self, name: &str) -> Vec<ArtifactKey> {
        sorted(self.includers.get(name))
    }

    /// Artifacts that inline the phrase `name`, sorted.
    pub fn phrase_users_of(&self, name: &str) -> Vec<ArtifactKey> {
        sorted(self.phrase_users.get(name))
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.includers.clear();
        self.phrase_users.clear();
    }

    fn unlink(&mut self, key: &ArtifactKey) {
        let Some(old) = self.forward.get(key) else {
            return;
        };
        for name in &old.includes {
            if let Some(users) = self.includers.get_mut(name) {
                users.remove(key);
                if users.is_empty() {
                    self.includers.remove(name);
                }
            }
        }
        for name in &old.phrases {
            if let Some(users) = self.phrase_users.get_mut(name) {
                users.remove(key);
                if users.is_empty() {
                    self.phrase_users.remove(name);
                }
            }
        }
    }
}

fn sorted(keys: Option<&FxHashSet<ArtifactKey>>) -> Vec<ArtifactKey> {
    let mut keys: Vec<_> = keys.into_iter().flatten().cloned().collect();
    keys.sort();
    keys
}
