//! An in-memory [`Store`], for tests and for hosts that keep their own
//! persistence outside the engine.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use vellum_core::{ArtifactKey, DefinitionId, EntityKind, PositionId, TreeKind};
use vellum_registry::TreeNode;

use crate::cache::CompiledArtifact;
use crate::error::StoreError;
use crate::store::{
    Definition, EditableStore, PhraseDefinition, Store, StoreResult, TemplateDefinition,
};

#[derive(Debug)]
pub struct MemoryStore {
    styles: RwLock<BTreeMap<PositionId, TreeNode>>,
    languages: RwLock<BTreeMap<PositionId, TreeNode>>,
    templates: RwLock<BTreeMap<DefinitionId, TemplateDefinition>>,
    phrases: RwLock<BTreeMap<DefinitionId, PhraseDefinition>>,
    artifacts: RwLock<FxHashMap<ArtifactKey, CompiledArtifact>>,
    next_id: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Both trees hold only their root.
    pub fn new() -> Self {
        let root = || BTreeMap::from([(PositionId::ROOT, TreeNode::new(PositionId::ROOT, None))]);
        Self {
            styles: RwLock::new(root()),
            languages: RwLock::new(root()),
            templates: RwLock::new(BTreeMap::new()),
            phrases: RwLock::new(BTreeMap::new()),
            artifacts: RwLock::new(FxHashMap::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Add a position under `parent` while setting up a store.
    pub fn with_position(self, tree: TreeKind, id: PositionId, parent: PositionId) -> Self {
        self.tree(tree)
            .write()
            .insert(id, TreeNode::new(id, Some(parent)));
        self
    }

    /// Add a template while setting up a store.
    pub fn with_template(self, style: PositionId, name: &str, source: &str) -> Self {
        self.insert_template(style, name, source);
        self
    }

    /// Add a phrase while setting up a store.
    pub fn with_phrase(self, language: PositionId, name: &str, text: &str) -> Self {
        self.insert_phrase(language, name, text);
        self
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts.read().len()
    }

    fn tree(&self, tree: TreeKind) -> &RwLock<BTreeMap<PositionId, TreeNode>> {
        match tree {
            TreeKind::Style => &self.styles,
            TreeKind::Language => &self.languages,
        }
    }

    fn check_position(&self, tree: TreeKind, id: PositionId) -> StoreResult<()> {
        if self.tree(tree).read().contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::MissingPosition { tree, id })
        }
    }

    fn fresh_id(&self) -> DefinitionId {
        DefinitionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn insert_template(&self, style: PositionId, name: &str, source: &str) -> DefinitionId {
        let mut templates = self.templates.write();
        if let Some(existing) = templates
            .values_mut()
            .find(|t| t.style == style && t.name == name)
        {
            existing.source = source.to_string();
            return existing.id;
        }
        let id = self.fresh_id();
        templates.insert(
            id,
            TemplateDefinition {
                id,
                name: name.to_string(),
                style,
                source: source.to_string(),
            },
        );
        id
    }

    fn insert_phrase(&self, language: PositionId, name: &str, text: &str) -> DefinitionId {
        let mut phrases = self.phrases.write();
        if let Some(existing) = phrases
            .values_mut()
            .find(|p| p.language == language && p.name == name)
        {
            existing.text = text.to_string();
            return existing.id;
        }
        let id = self.fresh_id();
        phrases.insert(
            id,
            PhraseDefinition {
                id,
                name: name.to_string(),
                language,
                text: text.to_string(),
            },
        );
        id
    }
}

impl Store for MemoryStore {
    fn load_tree(&self, tree: TreeKind) -> StoreResult<Vec<TreeNode>> {
        Ok(self.tree(tree).read().values().cloned().collect())
    }

    fn load_template(&self, id: DefinitionId) -> StoreResult<TemplateDefinition> {
        self.templates
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::MissingDefinition {
                kind: EntityKind::Template,
                id,
            })
    }

    fn load_phrase(&self, id: DefinitionId) -> StoreResult<PhraseDefinition> {
        self.phrases
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::MissingDefinition {
                kind: EntityKind::Phrase,
                id,
            })
    }

    fn definitions_named(
        &self,
        kind: EntityKind,
        name: &str,
    ) -> StoreResult<Vec<(PositionId, DefinitionId)>> {
        Ok(match kind {
            EntityKind::Template => self
                .templates
                .read()
                .values()
                .filter(|t| t.name == name)
                .map(|t| (t.style, t.id))
                .collect(),
            EntityKind::Phrase => self
                .phrases
                .read()
                .values()
                .filter(|p| p.name == name)
                .map(|p| (p.language, p.id))
                .collect(),
        })
    }

    fn definitions_at(
        &self,
        kind: EntityKind,
        position: PositionId,
    ) -> StoreResult<Vec<(String, DefinitionId)>> {
        Ok(match kind {
            EntityKind::Template => self
                .templates
                .read()
                .values()
                .filter(|t| t.style == position)
                .map(|t| (t.name.clone(), t.id))
                .collect(),
            EntityKind::Phrase => self
                .phrases
                .read()
                .values()
                .filter(|p| p.language == position)
                .map(|p| (p.name.clone(), p.id))
                .collect(),
        })
    }

    fn all_definitions(
        &self,
        kind: EntityKind,
    ) -> StoreResult<Vec<(String, PositionId, DefinitionId)>> {
        Ok(match kind {
            EntityKind::Template => self
                .templates
                .read()
                .values()
                .map(|t| (t.name.clone(), t.style, t.id))
                .collect(),
            EntityKind::Phrase => self
                .phrases
                .read()
                .values()
                .map(|p| (p.name.clone(), p.language, p.id))
                .collect(),
        })
    }

    fn replace_artifact(&self, artifact: &CompiledArtifact) -> StoreResult<()> {
        self.artifacts
            .write()
            .insert(artifact.key.clone(), artifact.clone());
        Ok(())
    }

    fn remove_artifact(&self, key: &ArtifactKey) -> StoreResult<()> {
        self.artifacts.write().remove(key);
        Ok(())
    }

    fn artifacts(&self) -> StoreResult<Vec<CompiledArtifact>> {
        let mut artifacts: Vec<_> = self.artifacts.read().values().cloned().collect();
        artifacts.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(artifacts)
    }
}

impl EditableStore for MemoryStore {
    fn put_template(
        &self,
        style: PositionId,
        name: &str,
        source: &str,
    ) -> StoreResult<DefinitionId> {
        self.check_position(TreeKind::Style, style)?;
        Ok(self.insert_template(style, name, source))
    }

    fn put_phrase(
        &self,
        language: PositionId,
        name: &str,
        text: &str,
    ) -> StoreResult<DefinitionId> {
        self.check_position(TreeKind::Language, language)?;
        Ok(self.insert_phrase(language, name, text))
    }

    fn delete_definition(&self, kind: EntityKind, id: DefinitionId) -> StoreResult<Definition> {
        let removed = match kind {
            EntityKind::Template => self.templates.write().remove(&id).map(Definition::Template),
            EntityKind::Phrase => self.phrases.write().remove(&id).map(Definition::Phrase),
        };
        removed.ok_or(StoreError::MissingDefinition { kind, id })
    }

    fn put_tree_node(&self, tree: TreeKind, node: &TreeNode) -> StoreResult<()> {
        self.tree(tree).write().insert(node.id, node.clone());
        Ok(())
    }

    fn delete_tree_node(&self, tree: TreeKind, id: PositionId) -> StoreResult<()> {
        self.tree(tree)
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::MissingPosition { tree, id })
    }
}
