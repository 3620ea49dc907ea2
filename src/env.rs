//! The compile environment the engine hands to the code generator.
//!
//! Includes and phrases are looked up through the resolution maps and
//! loaded from the store. Parsed template trees are memoized by definition
//! id and source fingerprint, so a template included by hundreds of
//! artifacts is parsed once per edit.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use vellum_compiler::CompileEnv;
use vellum_core::{DefinitionId, ParseErrors, PositionId, SourceHash};
use vellum_parser::{Parser, Template};
use vellum_registry::ResolutionMap;

use crate::store::Store;

/// Parsed trees keyed by definition.
#[derive(Debug, Default)]
pub struct ParseMemo {
    trees: RwLock<FxHashMap<DefinitionId, (SourceHash, Arc<Template>)>>,
}

impl ParseMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// The parsed tree of `source`, reusing the memoized one when the
    /// fingerprint matches.
    pub fn parse(&self, id: DefinitionId, source: &str) -> Result<Arc<Template>, ParseErrors> {
        let hash = SourceHash::template(source);
        if let Some((_, tree)) = self.trees.read().get(&id).filter(|(memo, _)| *memo == hash) {
            return Ok(Arc::clone(tree));
        }

        let tree = Arc::new(Parser::parse(source)?);
        self.trees.write().insert(id, (hash, Arc::clone(&tree)));
        Ok(tree)
    }

    pub fn forget(&self, id: DefinitionId) {
        self.trees.write().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.trees.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.read().is_empty()
    }

    pub fn clear(&self) {
        self.trees.write().clear();
    }
}

/// [`CompileEnv`] over a snapshot of the resolution maps.
pub(crate) struct EngineEnv<'e> {
    pub templates: &'e ResolutionMap,
    pub phrases: &'e ResolutionMap,
    pub store: &'e dyn Store,
    pub memo: &'e ParseMemo,
}

impl CompileEnv for EngineEnv<'_> {
    fn phrase(&self, name: &str, language: PositionId) -> Option<String> {
        let id = self.phrases.get(name, language)?;
        match self.store.load_phrase(id) {
            Ok(phrase) => Some(phrase.text),
            Err(error) => {
                tracing::warn!(%error, phrase = name, %language, "phrase lookup failed");
                None
            }
        }
    }

    fn template(
        &self,
        name: &str,
        style: PositionId,
    ) -> Result<Option<Arc<Template>>, ParseErrors> {
        let Some(id) = self.templates.get(name, style) else {
            return Ok(None);
        };
        match self.store.load_template(id) {
            Ok(template) => self.memo.parse(id, &template.source).map(Some),
            Err(error) => {
                tracing::warn!(%error, template = name, %style, "template lookup failed");
                Ok(None)
            }
        }
    }
}
