//! The engine facade.
//!
//! [`Engine`] owns the derived state (position trees, resolution maps, the
//! dependency graph, the artifact cache, memoized parse trees) over a
//! [`Store`] holding the authoritative definitions. Rendering code reads
//! artifacts through [`Engine::get_compiled`]; administrative code reports
//! edits through the `on_*` hooks, or, for an [`EditableStore`], performs
//! them through the edit methods, which persist and cascade in one call.
//!
//! Locks are always taken in the order: per-name locks (sorted), engine
//! state, dependency graph, artifact cache, parse memo.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use vellum_compiler::{
    CompileContext, CompileError, FunctionCompiler, FunctionRegistry, TemplateCompiler,
};
use vellum_core::{
    ArtifactKey, CompileDiagnostic, DefinitionId, EntityKind, PositionId, SourceHash, TreeKind,
    Value,
};
use vellum_parser::Parser;
use vellum_registry::{DirectDefinitions, PositionTree, Resolution, ResolutionMap, TreeNode};

use crate::cache::{ArtifactCache, CacheStats, CompiledArtifact};
use crate::cascade::{
    Affected, CascadeFailure, CascadeReport, CompileInputs, Outcome, Targets, plan,
};
use crate::config::{EngineConfig, FailurePolicy};
use crate::deps::{DependencyGraph, Edges};
use crate::env::ParseMemo;
use crate::error::{EngineError, RenderError, Result, StoreError};
use crate::render::{RenderHost, Renderer};
use crate::store::{EditableStore, Store};

/// Trees and resolution maps, replaced or mutated together.
struct EngineState {
    styles: PositionTree,
    languages: PositionTree,
    templates: ResolutionMap,
    phrases: ResolutionMap,
}

impl EngineState {
    fn load(store: &dyn Store) -> Result<Self> {
        let styles = PositionTree::from_nodes(TreeKind::Style, store.load_tree(TreeKind::Style)?)?;
        let languages =
            PositionTree::from_nodes(TreeKind::Language, store.load_tree(TreeKind::Language)?)?;
        let templates = ResolutionMap::build(
            EntityKind::Template,
            &styles,
            store.all_definitions(EntityKind::Template)?,
        );
        let phrases = ResolutionMap::build(
            EntityKind::Phrase,
            &languages,
            store.all_definitions(EntityKind::Phrase)?,
        );
        Ok(Self {
            styles,
            languages,
            templates,
            phrases,
        })
    }

    fn tree(&self, tree: TreeKind) -> &PositionTree {
        match tree {
            TreeKind::Style => &self.styles,
            TreeKind::Language => &self.languages,
        }
    }

    fn tree_mut(&mut self, tree: TreeKind) -> &mut PositionTree {
        match tree {
            TreeKind::Style => &mut self.styles,
            TreeKind::Language => &mut self.languages,
        }
    }

    fn map(&self, kind: EntityKind) -> &ResolutionMap {
        match kind {
            EntityKind::Template => &self.templates,
            EntityKind::Phrase => &self.phrases,
        }
    }

    /// Recompute one name from the store's direct definitions.
    fn rebuild_name(
        &mut self,
        store: &dyn Store,
        kind: EntityKind,
        name: &str,
    ) -> Result<Affected> {
        let direct: DirectDefinitions = store.definitions_named(kind, name)?.into_iter().collect();
        let (tree, map) = match kind {
            EntityKind::Template => (&self.styles, &mut self.templates),
            EntityKind::Phrase => (&self.languages, &mut self.phrases),
        };
        let change = map.rebuild_name(tree, name, &direct);
        Ok(Affected {
            kind,
            name: name.to_string(),
            positions: change.positions().collect(),
        })
    }
}

/// Per-(kind, name) mutexes serializing cascades of the same name.
#[derive(Default)]
struct NameLocks {
    locks: Mutex<FxHashMap<(EntityKind, String), Arc<Mutex<()>>>>,
}

impl NameLocks {
    /// Lock handles for `names`, in sorted order.
    fn handles(&self, kind: EntityKind, names: &BTreeSet<String>) -> Vec<Arc<Mutex<()>>> {
        let mut locks = self.locks.lock();
        names
            .iter()
            .map(|name| Arc::clone(locks.entry((kind, name.clone())).or_default()))
            .collect()
    }
}

/// Builder for an [`Engine`] with a custom configuration or function
/// registry.
pub struct EngineBuilder<S: Store> {
    store: S,
    config: EngineConfig,
    registry: FunctionRegistry,
}

impl<S: Store> EngineBuilder<S> {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the whole registry, built-ins included.
    pub fn registry(mut self, registry: FunctionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Register (or override) one template function.
    pub fn function(
        mut self,
        name: impl Into<String>,
        compiler: impl FunctionCompiler + 'static,
    ) -> Self {
        self.registry.register(name, compiler);
        self
    }

    pub fn open(self) -> Result<Engine<S>> {
        Engine::open_with(self.store, self.config, self.registry)
    }
}

/// Ahead-of-time compiler and cache over a [`Store`].
pub struct Engine<S: Store> {
    store: S,
    config: EngineConfig,
    registry: FunctionRegistry,
    state: RwLock<EngineState>,
    deps: RwLock<DependencyGraph>,
    cache: ArtifactCache,
    memo: ParseMemo,
    name_locks: NameLocks,
}

impl<S: Store> fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("artifacts", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl<S: Store> Engine<S> {
    /// Load trees and definitions, build the resolution maps and restore
    /// persisted artifacts. Call [`rebuild_all`](Self::rebuild_all) to
    /// compile a store that has none.
    pub fn open(store: S, config: EngineConfig) -> Result<Self> {
        Self::open_with(store, config, FunctionRegistry::with_builtins())
    }

    pub fn builder(store: S) -> EngineBuilder<S> {
        EngineBuilder {
            store,
            config: EngineConfig::default(),
            registry: FunctionRegistry::with_builtins(),
        }
    }

    fn open_with(store: S, config: EngineConfig, registry: FunctionRegistry) -> Result<Self> {
        config.validate()?;
        let state = EngineState::load(&store)?;

        let cache = ArtifactCache::new();
        let mut deps = DependencyGraph::new();
        let artifacts = store.artifacts()?;
        for artifact in &artifacts {
            deps.set_edges(
                &artifact.key,
                Edges {
                    includes: artifact.includes.clone(),
                    phrases: artifact.phrases.clone(),
                },
            );
        }
        tracing::info!(
            styles = state.styles.len(),
            languages = state.languages.len(),
            artifacts = artifacts.len(),
            "engine opened"
        );
        cache.restore(artifacts);

        Ok(Self {
            store,
            config,
            registry,
            state: RwLock::new(state),
            deps: RwLock::new(deps),
            cache,
            memo: ParseMemo::new(),
            name_locks: NameLocks::default(),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Every cached artifact key, sorted.
    pub fn artifact_keys(&self) -> Vec<ArtifactKey> {
        self.cache.keys()
    }

    /// Positions of one tree, parents before children.
    pub fn positions(&self, tree: TreeKind) -> Vec<PositionId> {
        self.state.read().tree(tree).breadth_first()
    }

    /// Ancestors of `position` followed by `position` itself.
    pub fn chain(&self, tree: TreeKind, position: PositionId) -> Result<Vec<PositionId>> {
        Ok(self.state.read().tree(tree).chain(position)?)
    }

    // ========================================================================
    // Rendering interface
    // ========================================================================

    pub fn get_compiled(&self, key: &ArtifactKey) -> Option<Arc<CompiledArtifact>> {
        self.cache.get(key)
    }

    pub fn get_compiled_template(
        &self,
        style: PositionId,
        language: PositionId,
        name: &str,
    ) -> Option<Arc<CompiledArtifact>> {
        self.cache
            .get(&ArtifactKey::template(style, language, name))
    }

    /// O(1) inheritance lookup.
    pub fn resolve(&self, kind: EntityKind, name: &str, position: PositionId) -> Resolution {
        self.state.read().map(kind).resolve(name, position)
    }

    /// The source or text in effect for `name` at `position`.
    pub fn get_effective_text(
        &self,
        kind: EntityKind,
        name: &str,
        position: PositionId,
    ) -> Result<Option<String>> {
        let Some(id) = self.state.read().map(kind).get(name, position) else {
            return Ok(None);
        };
        let definition = self.store.load_definition(kind, id)?;
        Ok(Some(definition.content().to_string()))
    }

    /// Render a cached artifact.
    pub fn render(&self, key: &ArtifactKey, data: &Value, host: &dyn RenderHost) -> Result<String> {
        let artifact = self
            .get_compiled(key)
            .ok_or_else(|| RenderError::MissingArtifact(key.to_string()))?;
        Ok(Renderer::new(host).render(&artifact.code, data)?)
    }

    pub fn render_template(
        &self,
        style: PositionId,
        language: PositionId,
        name: &str,
        data: &Value,
        host: &dyn RenderHost,
    ) -> Result<String> {
        self.render(&ArtifactKey::template(style, language, name), data, host)
    }

    /// Fast compile of an edited source without following includes. An
    /// empty result means the source is acceptable.
    pub fn validate_template(
        &self,
        name: &str,
        source: &str,
        style: PositionId,
    ) -> Vec<CompileDiagnostic> {
        let tree = match Parser::parse(source) {
            Ok(tree) => tree,
            Err(errors) => {
                return errors
                    .into_iter()
                    .map(|error| CompileError::Syntax(error).diagnostic(name))
                    .collect();
            }
        };

        let state = self.state.read();
        let inputs = self.inputs(&state);
        let env = inputs.env();
        let ctx = CompileContext::validation(style, PositionId::ROOT);
        match TemplateCompiler::new(&env, &self.registry, ctx).compile_template(name, &tree) {
            Ok(_) => Vec::new(),
            Err(failure) => vec![failure.error.diagnostic(name)],
        }
    }

    // ========================================================================
    // Rebuild
    // ========================================================================

    /// Reload trees and definitions and recompile every artifact.
    #[tracing::instrument(level = "info", skip(self))]
    pub fn rebuild_all(&self) -> Result<CascadeReport> {
        let mut state = self.state.write();
        *state = EngineState::load(&self.store)?;
        self.deps.write().clear();
        self.memo.clear();

        let inputs = self.inputs(&state);
        let wanted = inputs.all_keys();
        let wanted_set: BTreeSet<_> = wanted.iter().cloned().collect();

        let mut report = CascadeReport::default();
        for key in self.cache.keys_where(|key| !wanted_set.contains(key)) {
            self.drop_artifact(&key, &mut report)?;
        }

        let targets: Targets = wanted.into_iter().map(|key| (key, true)).collect();
        self.run(&inputs, targets, &mut report)?;
        tracing::info!(
            recompiled = report.recompiled.len(),
            removed = report.removed.len(),
            failures = report.failures.len(),
            "full rebuild finished"
        );
        Ok(report)
    }

    // ========================================================================
    // Administrative hooks
    // ========================================================================

    /// A definition of `name` owned by `position` was created or changed.
    pub fn on_definition_changed(
        &self,
        kind: EntityKind,
        name: &str,
        position: PositionId,
    ) -> Result<CascadeReport> {
        let edited = self.store.definition_at(kind, name, position)?;
        if let Some(id) = edited {
            self.memo.forget(id);
        }
        self.cascade_names(kind, BTreeSet::from([name.to_string()]), edited, |_| Ok(()))
    }

    /// The definition of `name` owned by `position` was deleted.
    pub fn on_definition_deleted(
        &self,
        kind: EntityKind,
        name: &str,
        position: PositionId,
    ) -> Result<CascadeReport> {
        tracing::debug!(%kind, name, %position, "definition deleted");
        self.cascade_names(kind, BTreeSet::from([name.to_string()]), None, |_| Ok(()))
    }

    /// `id` was moved under `parent`.
    pub fn on_position_reparented(
        &self,
        tree: TreeKind,
        id: PositionId,
        parent: PositionId,
    ) -> Result<CascadeReport> {
        let kind = tree.entity();
        let names = {
            let state = self.state.read();
            let positions = state.tree(tree);
            let mut chain = positions.ancestors(id)?.to_vec();
            chain.extend(positions.chain(parent)?);
            self.names_defined_at(kind, &chain)?
        };
        self.cascade_names(kind, names, None, |state| {
            let moved = state.tree_mut(tree).set_parent(id, parent)?;
            tracing::debug!(
                %tree,
                %id,
                %parent,
                subtree = moved.subtree.len(),
                "position reparented"
            );
            Ok(())
        })
    }

    /// `id` was added under `parent`.
    pub fn on_position_added(
        &self,
        tree: TreeKind,
        id: PositionId,
        parent: PositionId,
    ) -> Result<CascadeReport> {
        let kind = tree.entity();
        let names = {
            let state = self.state.read();
            let mut names: BTreeSet<String> = state
                .map(kind)
                .names_at(parent)
                .into_iter()
                .map(|(name, _)| name)
                .collect();
            names.extend(self.names_defined_at(kind, &[id])?);
            names
        };
        let mut report = self.cascade_names(kind, names, None, |state| {
            state.tree_mut(tree).insert(id, parent)?;
            Ok(())
        })?;

        if tree == TreeKind::Language {
            let state = self.state.read();
            let inputs = self.inputs(&state);
            let targets: Targets = inputs
                .template_keys_for_language(id)
                .into_iter()
                .map(|key| (key, true))
                .collect();
            self.run(&inputs, targets, &mut report)?;
        }
        Ok(report)
    }

    /// `id` was removed; its children now belong to its former parent.
    /// Definitions owned by `id` no longer count.
    pub fn on_position_removed(&self, tree: TreeKind, id: PositionId) -> Result<CascadeReport> {
        let kind = tree.entity();
        let names: BTreeSet<String> = self
            .state
            .read()
            .map(kind)
            .names_at(id)
            .into_iter()
            .map(|(name, _)| name)
            .collect();

        let mut report = CascadeReport::default();
        let at_removed = self.cache.keys_where(|key| match tree {
            TreeKind::Style => key.style() == Some(id),
            TreeKind::Language => key.language() == id,
        });
        for key in at_removed {
            self.drop_artifact(&key, &mut report)?;
        }

        let cascade = self.cascade_names(kind, names, None, |state| {
            let removal = state.tree_mut(tree).remove(id)?;
            tracing::debug!(%tree, %id, children = removal.children.len(), "position removed");
            Ok(())
        })?;
        report.merge(cascade);
        Ok(report)
    }

    // ========================================================================
    // Cascade machinery
    // ========================================================================

    /// Lock `names`, apply `mutate` to the state, rebuild every name, and
    /// recompile the planned targets.
    fn cascade_names(
        &self,
        kind: EntityKind,
        names: BTreeSet<String>,
        edited: Option<DefinitionId>,
        mutate: impl FnOnce(&mut EngineState) -> Result<()>,
    ) -> Result<CascadeReport> {
        let span = tracing::info_span!("cascade", %kind, names = names.len());
        let _enter = span.enter();

        let handles = self.name_locks.handles(kind, &names);
        let _guards: Vec<_> = handles.iter().map(|lock| lock.lock()).collect();

        let mut state = self.state.write();
        mutate(&mut state)?;
        let mut affected = Vec::with_capacity(names.len());
        for name in &names {
            let mut change = state.rebuild_name(&self.store, kind, name)?;
            if let Some(id) = edited {
                change
                    .positions
                    .extend(state.map(kind).positions_resolving_to(name, id));
            }
            affected.push(change);
        }
        let state = parking_lot::RwLockWriteGuard::downgrade(state);

        let targets = plan(&affected, &state.languages, &self.deps.read());
        let inputs = self.inputs(&state);
        let mut report = CascadeReport::default();
        self.run(&inputs, targets, &mut report)?;

        if report.is_clean() {
            tracing::info!(
                recompiled = report.recompiled.len(),
                removed = report.removed.len(),
                "cascade finished"
            );
        } else {
            tracing::warn!(
                recompiled = report.recompiled.len(),
                removed = report.removed.len(),
                failures = report.failures.len(),
                "cascade finished with failures"
            );
        }
        Ok(report)
    }

    fn inputs<'e>(&'e self, state: &'e EngineState) -> CompileInputs<'e> {
        CompileInputs {
            styles: &state.styles,
            languages: &state.languages,
            templates: &state.templates,
            phrases: &state.phrases,
            store: &self.store,
            memo: &self.memo,
            registry: &self.registry,
        }
    }

    /// Names with a direct definition at any of `positions`.
    fn names_defined_at(
        &self,
        kind: EntityKind,
        positions: &[PositionId],
    ) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for &position in positions {
            for (name, _) in self.store.definitions_at(kind, position)? {
                names.insert(name);
            }
        }
        Ok(names)
    }

    /// Compile every target, then apply the outcomes in key order.
    fn run(
        &self,
        inputs: &CompileInputs<'_>,
        targets: Targets,
        report: &mut CascadeReport,
    ) -> Result<()> {
        let targets: Vec<(ArtifactKey, bool)> = targets.into_iter().collect();
        let outcomes: Vec<Outcome> = if self.config.runs_parallel(targets.len()) {
            tracing::debug!(targets = targets.len(), "compiling in parallel");
            targets
                .par_iter()
                .map(|(key, _)| inputs.compile(key))
                .collect()
        } else {
            targets.iter().map(|(key, _)| inputs.compile(key)).collect()
        };

        for ((key, direct), outcome) in targets.into_iter().zip(outcomes) {
            self.apply(key, direct, outcome, report)?;
        }
        Ok(())
    }

    fn apply(
        &self,
        key: ArtifactKey,
        direct: bool,
        outcome: Outcome,
        report: &mut CascadeReport,
    ) -> Result<()> {
        match outcome {
            Outcome::Compiled {
                code,
                includes,
                phrases,
            } => {
                self.deps.write().set_edges(
                    &key,
                    Edges {
                        includes: includes.clone(),
                        phrases: phrases.clone(),
                    },
                );
                let artifact = self.cache.install(key.clone(), code, includes, phrases);
                self.store.replace_artifact(&artifact)?;
                report.recompiled.push((key, artifact.generation));
            }
            Outcome::Failed {
                diagnostic,
                includes,
                phrases,
            } => {
                tracing::warn!(%key, error = %diagnostic, "compile failed");
                let kept = match self.config.failure_policy {
                    FailurePolicy::KeepLastGood => {
                        let kept = self.cache.mark_stale(
                            &key,
                            diagnostic.clone(),
                            includes.clone(),
                            phrases.clone(),
                        );
                        if kept.is_none() {
                            tracing::debug!(%key, "no previous artifact to keep");
                        }
                        kept
                    }
                    FailurePolicy::Invalidate => {
                        self.cache.record_failure();
                        if self.cache.remove(&key).is_some() {
                            self.store.remove_artifact(&key)?;
                        }
                        None
                    }
                };
                // kept code still reads everything the stale artifact records
                let edges = match &kept {
                    Some(stale) => Edges {
                        includes: stale.includes.clone(),
                        phrases: stale.phrases.clone(),
                    },
                    None => Edges { includes, phrases },
                };
                self.deps.write().set_edges(&key, edges);
                if let Some(stale) = kept {
                    self.store.replace_artifact(&stale)?;
                }
                report.failures.push(CascadeFailure {
                    key,
                    diagnostic,
                    direct,
                });
            }
            Outcome::Unresolved => self.drop_artifact(&key, report)?,
        }
        Ok(())
    }

    fn drop_artifact(&self, key: &ArtifactKey, report: &mut CascadeReport) -> Result<()> {
        self.deps.write().remove(key);
        if self.cache.remove(key).is_some() {
            self.store.remove_artifact(key)?;
            report.removed.push(key.clone());
        }
        Ok(())
    }
}

// ============================================================================
// Edit convenience
// ============================================================================

impl<S: EditableStore> Engine<S> {
    /// Validate, persist and cascade a template edit. Sources that do not
    /// compile are rejected with their diagnostics and not persisted; an
    /// unchanged source is a no-op.
    pub fn save_template(
        &self,
        style: PositionId,
        name: &str,
        source: &str,
    ) -> Result<CascadeReport> {
        if self.unchanged(EntityKind::Template, name, style, source)? {
            return Ok(CascadeReport::default());
        }
        if self.config.validate_on_save {
            let diagnostics = self.validate_template(name, source, style);
            if !diagnostics.is_empty() {
                return Err(EngineError::Rejected {
                    name: name.to_string(),
                    diagnostics,
                });
            }
        }
        self.store.put_template(style, name, source)?;
        self.on_definition_changed(EntityKind::Template, name, style)
    }

    pub fn save_phrase(
        &self,
        language: PositionId,
        name: &str,
        text: &str,
    ) -> Result<CascadeReport> {
        if self.unchanged(EntityKind::Phrase, name, language, text)? {
            return Ok(CascadeReport::default());
        }
        self.store.put_phrase(language, name, text)?;
        self.on_definition_changed(EntityKind::Phrase, name, language)
    }

    pub fn delete_definition(
        &self,
        kind: EntityKind,
        name: &str,
        position: PositionId,
    ) -> Result<CascadeReport> {
        let id = self
            .store
            .definition_at(kind, name, position)?
            .ok_or_else(|| StoreError::NotDefinedAt {
                kind,
                name: name.to_string(),
                position,
            })?;
        self.store.delete_definition(kind, id)?;
        self.memo.forget(id);
        self.on_definition_deleted(kind, name, position)
    }

    pub fn add_position(
        &self,
        tree: TreeKind,
        id: PositionId,
        parent: PositionId,
    ) -> Result<CascadeReport> {
        {
            let state = self.state.read();
            let positions = state.tree(tree);
            if positions.contains(id) {
                return Err(vellum_core::TreeError::DuplicatePosition { tree, id }.into());
            }
            positions.ancestors(parent)?;
        }
        self.store
            .put_tree_node(tree, &TreeNode::new(id, Some(parent)))?;
        self.on_position_added(tree, id, parent)
    }

    pub fn reparent_position(
        &self,
        tree: TreeKind,
        id: PositionId,
        parent: PositionId,
    ) -> Result<CascadeReport> {
        let report = self.on_position_reparented(tree, id, parent)?;
        self.persist_nodes(tree, &[id])?;
        Ok(report)
    }

    /// Remove `id` and the definitions it owns.
    pub fn remove_position(&self, tree: TreeKind, id: PositionId) -> Result<CascadeReport> {
        let kind = tree.entity();
        let children = {
            let state = self.state.read();
            let positions = state.tree(tree);
            positions.ancestors(id)?;
            positions.children(id)
        };
        for (_, definition) in self.store.definitions_at(kind, id)? {
            self.store.delete_definition(kind, definition)?;
            self.memo.forget(definition);
        }
        let report = self.on_position_removed(tree, id)?;
        self.store.delete_tree_node(tree, id)?;
        self.persist_nodes(tree, &children)?;
        Ok(report)
    }

    fn unchanged(
        &self,
        kind: EntityKind,
        name: &str,
        position: PositionId,
        content: &str,
    ) -> Result<bool> {
        let Some(id) = self.store.definition_at(kind, name, position)? else {
            return Ok(false);
        };
        let current = self.store.load_definition(kind, id)?;
        Ok(current.source_hash() == SourceHash::of(kind, content))
    }

    /// Write the nodes of the subtrees under `tops`, whose chains changed.
    fn persist_nodes(&self, tree: TreeKind, tops: &[PositionId]) -> Result<()> {
        let nodes: Vec<TreeNode> = {
            let state = self.state.read();
            let positions = state.tree(tree);
            let moved: BTreeSet<PositionId> = tops
                .iter()
                .flat_map(|&top| positions.subtree(top))
                .collect();
            positions
                .nodes()
                .into_iter()
                .filter(|node| moved.contains(&node.id))
                .collect()
        };
        for node in &nodes {
            self.store.put_tree_node(tree, node)?;
        }
        Ok(())
    }
}
