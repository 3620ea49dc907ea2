//! Cascade planning and per-target compilation.
//!
//! A cascade starts from a set of [`Affected`] names (a name plus the
//! positions whose resolution of it changed), expands them into the
//! artifact keys that must be regenerated, and compiles each key into an
//! [`Outcome`]. Compiling a target only reads engine state, so targets can
//! be compiled on the rayon pool; outcomes are applied by the engine.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use vellum_compiler::{
    Code, CompileContext, CompileError, FunctionRegistry, compile_phrase_text, compile_template,
};
use vellum_core::{ArtifactKey, CompileDiagnostic, EntityKind, PositionId};
use vellum_registry::{PositionTree, ResolutionMap};

use crate::deps::DependencyGraph;
use crate::env::{EngineEnv, ParseMemo};
use crate::store::Store;

// ============================================================================
// Report
// ============================================================================

/// An artifact that failed to recompile during a cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeFailure {
    pub key: ArtifactKey,
    pub diagnostic: CompileDiagnostic,
    /// `true` when the edited name is the artifact's own name, `false`
    /// when it was reached through an include or phrase edge.
    pub direct: bool,
}

/// What one cascade did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeReport {
    /// Regenerated artifacts with their new generation, sorted by key.
    pub recompiled: Vec<(ArtifactKey, u64)>,
    /// Artifacts whose name no longer resolves at their position.
    pub removed: Vec<ArtifactKey>,
    pub failures: Vec<CascadeFailure>,
}

impl CascadeReport {
    /// No artifact failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.recompiled.is_empty() && self.removed.is_empty() && self.failures.is_empty()
    }

    /// The generation assigned to `key` by this cascade.
    pub fn generation_of(&self, key: &ArtifactKey) -> Option<u64> {
        self.recompiled
            .iter()
            .find(|(recompiled, _)| recompiled == key)
            .map(|&(_, generation)| generation)
    }

    pub fn was_recompiled(&self, key: &ArtifactKey) -> bool {
        self.generation_of(key).is_some()
    }

    pub fn was_removed(&self, key: &ArtifactKey) -> bool {
        self.removed.contains(key)
    }

    pub fn failure(&self, key: &ArtifactKey) -> Option<&CascadeFailure> {
        self.failures.iter().find(|failure| &failure.key == key)
    }

    /// Fold a later cascade into this one.
    pub fn merge(&mut self, other: CascadeReport) {
        self.recompiled.extend(other.recompiled);
        self.removed.extend(other.removed);
        self.failures.extend(other.failures);
    }
}

// ============================================================================
// Planning
// ============================================================================

/// One name whose resolution changed at some positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Affected {
    pub kind: EntityKind,
    pub name: String,
    pub positions: BTreeSet<PositionId>,
}

/// Artifact keys to regenerate, each flagged direct or dependency-triggered.
pub(crate) type Targets = BTreeMap<ArtifactKey, bool>;

fn add_target(targets: &mut Targets, key: ArtifactKey, direct: bool) {
    let entry = targets.entry(key).or_insert(direct);
    *entry |= direct;
}

/// Expand affected names into artifact keys: the name's own artifacts at
/// every affected position, plus every artifact whose recorded edges reach
/// the name at an affected position.
pub(crate) fn plan(
    affected: &[Affected],
    languages: &PositionTree,
    deps: &DependencyGraph,
) -> Targets {
    let mut targets = Targets::new();
    let all_languages = languages.breadth_first();

    for change in affected {
        if change.positions.is_empty() {
            continue;
        }
        match change.kind {
            EntityKind::Template => {
                for &style in &change.positions {
                    for &language in &all_languages {
                        add_target(
                            &mut targets,
                            ArtifactKey::template(style, language, change.name.as_str()),
                            true,
                        );
                    }
                }
                for key in deps.includers_of(&change.name) {
                    if key
                        .style()
                        .is_some_and(|style| change.positions.contains(&style))
                    {
                        add_target(&mut targets, key, false);
                    }
                }
            }
            EntityKind::Phrase => {
                for &language in &change.positions {
                    add_target(
                        &mut targets,
                        ArtifactKey::phrase(language, change.name.as_str()),
                        true,
                    );
                }
                for key in deps.phrase_users_of(&change.name) {
                    if change.positions.contains(&key.language()) {
                        add_target(&mut targets, key, false);
                    }
                }
            }
        }
    }
    targets
}

// ============================================================================
// Compiling one target
// ============================================================================

/// Result of compiling one artifact key.
#[derive(Debug)]
pub(crate) enum Outcome {
    Compiled {
        code: Code,
        includes: BTreeSet<String>,
        phrases: BTreeSet<String>,
    },
    Failed {
        diagnostic: CompileDiagnostic,
        includes: BTreeSet<String>,
        phrases: BTreeSet<String>,
    },
    /// The name does not resolve at the key's position.
    Unresolved,
}

impl Outcome {
    fn failed(diagnostic: CompileDiagnostic) -> Self {
        Outcome::Failed {
            diagnostic,
            includes: BTreeSet::new(),
            phrases: BTreeSet::new(),
        }
    }
}

/// Read-only view of everything a target compile needs.
pub(crate) struct CompileInputs<'e> {
    pub styles: &'e PositionTree,
    pub languages: &'e PositionTree,
    pub templates: &'e ResolutionMap,
    pub phrases: &'e ResolutionMap,
    pub store: &'e dyn Store,
    pub memo: &'e ParseMemo,
    pub registry: &'e FunctionRegistry,
}

impl CompileInputs<'_> {
    pub fn env(&self) -> EngineEnv<'_> {
        EngineEnv {
            templates: self.templates,
            phrases: self.phrases,
            store: self.store,
            memo: self.memo,
        }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile(&self, key: &ArtifactKey) -> Outcome {
        match key {
            ArtifactKey::Template {
                style,
                language,
                name,
            } => self.compile_template(*style, *language, name),
            ArtifactKey::Phrase { language, name } => self.compile_phrase(*language, name),
        }
    }

    fn compile_template(&self, style: PositionId, language: PositionId, name: &str) -> Outcome {
        if !self.languages.contains(language) {
            return Outcome::Unresolved;
        }
        let Some(id) = self.templates.get(name, style) else {
            return Outcome::Unresolved;
        };
        let definition = match self.store.load_template(id) {
            Ok(definition) => definition,
            Err(error) => return Outcome::failed(store_diagnostic(name, &error)),
        };
        let tree = match self.memo.parse(id, &definition.source) {
            Ok(tree) => tree,
            Err(errors) => return Outcome::failed(CompileError::from(errors).diagnostic(name)),
        };

        let env = self.env();
        let ctx = CompileContext::new(style, language);
        match compile_template(&env, self.registry, ctx, name, &tree) {
            Ok(compiled) => Outcome::Compiled {
                code: compiled.code,
                includes: compiled.includes,
                phrases: compiled.phrases,
            },
            Err(failure) => Outcome::Failed {
                diagnostic: failure.error.diagnostic(name),
                includes: failure.includes,
                phrases: failure.phrases,
            },
        }
    }

    fn compile_phrase(&self, language: PositionId, name: &str) -> Outcome {
        let Some(id) = self.phrases.get(name, language) else {
            return Outcome::Unresolved;
        };
        match self.store.load_phrase(id) {
            Ok(phrase) => Outcome::Compiled {
                code: compile_phrase_text(&phrase.text),
                includes: BTreeSet::new(),
                phrases: BTreeSet::new(),
            },
            Err(error) => Outcome::failed(store_diagnostic(name, &error)),
        }
    }

    /// Every key that should exist: each resolvable template at each style
    /// where it resolves, for every language, and each resolvable phrase at
    /// each language where it resolves.
    pub fn all_keys(&self) -> Vec<ArtifactKey> {
        let languages = self.languages.breadth_first();
        let mut keys = Vec::new();
        for name in self.templates.names() {
            for style in self.templates.positions(&name) {
                for &language in &languages {
                    keys.push(ArtifactKey::template(style, language, name.as_str()));
                }
            }
        }
        for name in self.phrases.names() {
            for language in self.phrases.positions(&name) {
                keys.push(ArtifactKey::phrase(language, name.as_str()));
            }
        }
        keys.sort();
        keys
    }

    /// Template keys for a newly added language: every template at every
    /// style where it resolves.
    pub fn template_keys_for_language(&self, language: PositionId) -> Vec<ArtifactKey> {
        let mut keys = Vec::new();
        for name in self.templates.names() {
            for style in self.templates.positions(&name) {
                if self.styles.contains(style) {
                    keys.push(ArtifactKey::template(style, language, name.as_str()));
                }
            }
        }
        keys
    }
}

fn store_diagnostic(name: &str, error: &dyn std::error::Error) -> CompileDiagnostic {
    CompileDiagnostic {
        message: error.to_string(),
        offset: 0,
        line: 1,
        column: 1,
        template: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::Edges;
    use vellum_core::TreeKind;

    fn p(id: u32) -> PositionId {
        PositionId(id)
    }

    fn languages() -> PositionTree {
        let mut tree = PositionTree::new(TreeKind::Language);
        tree.insert(p(1), p(0)).unwrap();
        tree
    }

    #[test]
    fn template_change_targets_every_language_and_includers() {
        let mut deps = DependencyGraph::new();
        let page_at_2 = ArtifactKey::template(p(2), p(0), "page");
        let page_at_3 = ArtifactKey::template(p(3), p(0), "page");
        deps.set_edges(
            &page_at_2,
            Edges {
                includes: BTreeSet::from(["header".to_string()]),
                phrases: BTreeSet::new(),
            },
        );
        deps.set_edges(
            &page_at_3,
            Edges {
                includes: BTreeSet::from(["header".to_string()]),
                phrases: BTreeSet::new(),
            },
        );

        let affected = [Affected {
            kind: EntityKind::Template,
            name: "header".into(),
            positions: BTreeSet::from([p(2)]),
        }];
        let targets = plan(&affected, &languages(), &deps);

        assert_eq!(
            targets.get(&ArtifactKey::template(p(2), p(0), "header")),
            Some(&true)
        );
        assert_eq!(
            targets.get(&ArtifactKey::template(p(2), p(1), "header")),
            Some(&true)
        );
        assert_eq!(targets.get(&page_at_2), Some(&false));
        assert!(!targets.contains_key(&page_at_3));
        assert_eq!(targets.len(), 3);
    }

    #[test]
    fn phrase_change_targets_users_at_affected_languages() {
        let mut deps = DependencyGraph::new();
        let english = ArtifactKey::template(p(0), p(0), "page");
        let german = ArtifactKey::template(p(0), p(1), "page");
        for key in [&english, &german] {
            deps.set_edges(
                key,
                Edges {
                    includes: BTreeSet::new(),
                    phrases: BTreeSet::from(["welcome".to_string()]),
                },
            );
        }

        let affected = [Affected {
            kind: EntityKind::Phrase,
            name: "welcome".into(),
            positions: BTreeSet::from([p(1)]),
        }];
        let targets = plan(&affected, &languages(), &deps);

        assert_eq!(
            targets.get(&ArtifactKey::phrase(p(1), "welcome")),
            Some(&true)
        );
        assert_eq!(targets.get(&german), Some(&false));
        assert!(!targets.contains_key(&english));
    }

    #[test]
    fn report_lookups_and_merge() {
        let key = ArtifactKey::phrase(p(0), "hello");
        let mut report = CascadeReport::default();
        assert!(report.is_empty());
        report.merge(CascadeReport {
            recompiled: vec![(key.clone(), 7)],
            ..CascadeReport::default()
        });
        assert_eq!(report.generation_of(&key), Some(7));
        assert!(report.is_clean());
        assert!(!report.was_removed(&key));
    }
}
