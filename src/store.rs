//! The persistence collaborator.
//!
//! The engine only needs to load tree nodes and definitions and to persist
//! compiled artifacts. Hosts that let the engine write authoritative data
//! as well (the edit convenience methods) implement [`EditableStore`].

use serde::{Deserialize, Serialize};
use vellum_core::{ArtifactKey, DefinitionId, EntityKind, PositionId, SourceHash, TreeKind};
use vellum_registry::TreeNode;

use crate::cache::CompiledArtifact;
use crate::error::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A template body owned by one style position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    pub id: DefinitionId,
    pub name: String,
    pub style: PositionId,
    pub source: String,
}

/// Phrase text owned by one language position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseDefinition {
    pub id: DefinitionId,
    pub name: String,
    pub language: PositionId,
    pub text: String,
}

/// Either kind of definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Definition {
    Template(TemplateDefinition),
    Phrase(PhraseDefinition),
}

impl Definition {
    pub fn id(&self) -> DefinitionId {
        match self {
            Definition::Template(t) => t.id,
            Definition::Phrase(p) => p.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Definition::Template(_) => EntityKind::Template,
            Definition::Phrase(_) => EntityKind::Phrase,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Definition::Template(t) => &t.name,
            Definition::Phrase(p) => &p.name,
        }
    }

    /// The owning style or language position.
    pub fn position(&self) -> PositionId {
        match self {
            Definition::Template(t) => t.style,
            Definition::Phrase(p) => p.language,
        }
    }

    /// Template source or phrase text.
    pub fn content(&self) -> &str {
        match self {
            Definition::Template(t) => &t.source,
            Definition::Phrase(p) => &p.text,
        }
    }

    pub fn source_hash(&self) -> SourceHash {
        SourceHash::of(self.kind(), self.content())
    }
}

/// Read access plus artifact persistence.
pub trait Store: Send + Sync {
    /// Every node of one tree, in any order. An empty result means a tree
    /// with only the root.
    fn load_tree(&self, tree: TreeKind) -> StoreResult<Vec<TreeNode>>;

    fn load_template(&self, id: DefinitionId) -> StoreResult<TemplateDefinition>;

    fn load_phrase(&self, id: DefinitionId) -> StoreResult<PhraseDefinition>;

    /// Every direct definition of `name` as `(position, id)`.
    fn definitions_named(
        &self,
        kind: EntityKind,
        name: &str,
    ) -> StoreResult<Vec<(PositionId, DefinitionId)>>;

    /// Every direct definition at `position` as `(name, id)`.
    fn definitions_at(
        &self,
        kind: EntityKind,
        position: PositionId,
    ) -> StoreResult<Vec<(String, DefinitionId)>>;

    /// Every definition of a kind as `(name, position, id)`.
    fn all_definitions(
        &self,
        kind: EntityKind,
    ) -> StoreResult<Vec<(String, PositionId, DefinitionId)>>;

    /// Insert or replace an artifact in one step.
    fn replace_artifact(&self, artifact: &CompiledArtifact) -> StoreResult<()>;

    fn remove_artifact(&self, key: &ArtifactKey) -> StoreResult<()>;

    fn artifacts(&self) -> StoreResult<Vec<CompiledArtifact>>;

    /// Load either kind of definition.
    fn load_definition(&self, kind: EntityKind, id: DefinitionId) -> StoreResult<Definition> {
        Ok(match kind {
            EntityKind::Template => Definition::Template(self.load_template(id)?),
            EntityKind::Phrase => Definition::Phrase(self.load_phrase(id)?),
        })
    }

    /// The definition of `name` owned by `position`, if any.
    fn definition_at(
        &self,
        kind: EntityKind,
        name: &str,
        position: PositionId,
    ) -> StoreResult<Option<DefinitionId>> {
        Ok(self
            .definitions_named(kind, name)?
            .into_iter()
            .find(|(at, _)| *at == position)
            .map(|(_, id)| id))
    }
}

/// Authoritative writes.
pub trait EditableStore: Store {
    /// Create or update the template `name` owned by `style`.
    fn put_template(
        &self,
        style: PositionId,
        name: &str,
        source: &str,
    ) -> StoreResult<DefinitionId>;

    /// Create or update the phrase `name` owned by `language`.
    fn put_phrase(&self, language: PositionId, name: &str, text: &str) -> StoreResult<DefinitionId>;

    fn delete_definition(&self, kind: EntityKind, id: DefinitionId) -> StoreResult<Definition>;

    /// Insert or replace a tree node.
    fn put_tree_node(&self, tree: TreeKind, node: &TreeNode) -> StoreResult<()>;

    fn delete_tree_node(&self, tree: TreeKind, id: PositionId) -> StoreResult<()>;
}
