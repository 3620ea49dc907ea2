//! Inheritance Resolver - flattened (name, position) -> definition maps.
//!
//! For every name, each position maps to the definition at its nearest
//! ancestor (itself included) that defines the name directly. Positions
//! with no such ancestor are absent, which is how "unresolved" is
//! represented. Lookups are a pair of hash lookups; the cost of inheritance
//! is paid once per rebuild.

use crate::tree::PositionTree;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use vellum_core::{DefinitionId, EntityKind, PositionId};

/// Result of looking a name up at a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Found(DefinitionId),
    Unresolved,
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }

    pub fn ok(self) -> Option<DefinitionId> {
        match self {
            Resolution::Found(id) => Some(id),
            Resolution::Unresolved => None,
        }
    }
}

/// One position whose resolution changed during a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PositionChange {
    pub position: PositionId,
    pub old: Option<DefinitionId>,
    pub new: Option<DefinitionId>,
}

/// The positions whose resolution of one name changed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolutionChange {
    pub name: String,
    /// Sorted by position.
    pub changes: Vec<PositionChange>,
}

impl ResolutionChange {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = PositionId> + '_ {
        self.changes.iter().map(|change| change.position)
    }

    /// Positions where the name no longer resolves at all.
    pub fn lost(&self) -> impl Iterator<Item = PositionId> + '_ {
        self.changes
            .iter()
            .filter(|change| change.new.is_none())
            .map(|change| change.position)
    }
}

/// Direct definitions of one name: owning position -> definition.
pub type DirectDefinitions = FxHashMap<PositionId, DefinitionId>;

/// Flattened resolution for every name of one entity kind.
#[derive(Debug, Clone)]
pub struct ResolutionMap {
    kind: EntityKind,
    entries: FxHashMap<String, FxHashMap<PositionId, DefinitionId>>,
}

impl ResolutionMap {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            entries: FxHashMap::default(),
        }
    }

    /// Build the map for every name from `(name, position, definition)`
    /// triples.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn build(
        kind: EntityKind,
        tree: &PositionTree,
        definitions: impl IntoIterator<Item = (String, PositionId, DefinitionId)>,
    ) -> Self {
        let mut by_name: FxHashMap<String, DirectDefinitions> = FxHashMap::default();
        for (name, position, id) in definitions {
            by_name.entry(name).or_default().insert(position, id);
        }

        let mut map = Self::new(kind);
        for (name, direct) in by_name {
            let resolved = flatten(tree, &direct);
            if !resolved.is_empty() {
                map.entries.insert(name, resolved);
            }
        }
        map
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// O(1) lookup.
    pub fn resolve(&self, name: &str, position: PositionId) -> Resolution {
        match self.get(name, position) {
            Some(id) => Resolution::Found(id),
            None => Resolution::Unresolved,
        }
    }

    pub fn get(&self, name: &str, position: PositionId) -> Option<DefinitionId> {
        self.entries.get(name)?.get(&position).copied()
    }

    /// Recompute one name from its direct definitions, returning the
    /// positions whose resolution changed. Rebuilding with the same input
    /// is a no-op that reports no changes.
    pub fn rebuild_name(
        &mut self,
        tree: &PositionTree,
        name: &str,
        direct: &DirectDefinitions,
    ) -> ResolutionChange {
        let resolved = flatten(tree, direct);
        let previous = if resolved.is_empty() {
            self.entries.remove(name).unwrap_or_default()
        } else {
            self.entries
                .insert(name.to_string(), resolved.clone())
                .unwrap_or_default()
        };

        let mut changes: Vec<PositionChange> = previous
            .iter()
            .filter(|&(position, id)| resolved.get(position) != Some(id))
            .map(|(&position, &id)| PositionChange {
                position,
                old: Some(id),
                new: resolved.get(&position).copied(),
            })
            .chain(
                resolved
                    .iter()
                    .filter(|&(position, _)| !previous.contains_key(position))
                    .map(|(&position, &id)| PositionChange {
                        position,
                        old: None,
                        new: Some(id),
                    }),
            )
            .collect();
        changes.sort();

        ResolutionChange {
            name: name.to_string(),
            changes,
        }
    }

    /// Positions whose resolution of `name` is `definition`.
    pub fn positions_resolving_to(&self, name: &str, definition: DefinitionId) -> Vec<PositionId> {
        let mut positions: Vec<_> = self
            .entries
            .get(name)
            .into_iter()
            .flat_map(|entries| entries.iter())
            .filter(|&(_, &id)| id == definition)
            .map(|(&position, _)| position)
            .collect();
        positions.sort();
        positions
    }

    /// Every position where `name` resolves, ascending.
    pub fn positions(&self, name: &str) -> Vec<PositionId> {
        let mut positions: Vec<_> = self
            .entries
            .get(name)
            .into_iter()
            .flat_map(|entries| entries.keys().copied())
            .collect();
        positions.sort();
        positions
    }

    /// Every name that resolves at `position`, sorted.
    pub fn names_at(&self, position: PositionId) -> Vec<(String, DefinitionId)> {
        let mut names: Vec<_> = self
            .entries
            .iter()
            .filter_map(|(name, entries)| entries.get(&position).map(|&id| (name.clone(), id)))
            .collect();
        names.sort();
        names
    }

    /// All names with at least one resolved position, sorted.
    pub fn names(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    /// Drop every entry for a position that no longer exists.
    pub fn remove_position(&mut self, position: PositionId) {
        self.entries.retain(|_, entries| {
            entries.remove(&position);
            !entries.is_empty()
        });
    }
}

/// Walk the tree breadth-first: a direct definition wins, otherwise the
/// parent's entry is inherited.
fn flatten(tree: &PositionTree, direct: &DirectDefinitions) -> FxHashMap<PositionId, DefinitionId> {
    let mut resolved = FxHashMap::default();
    if direct.is_empty() {
        return resolved;
    }
    for position in tree.breadth_first() {
        let inherited = tree
            .parent(position)
            .and_then(|parent| resolved.get(&parent).copied());
        if let Some(id) = direct.get(&position).copied().or(inherited) {
            resolved.insert(position, id);
        }
    }
    resolved
}
