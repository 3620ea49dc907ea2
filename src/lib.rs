//! Vellum: an ahead-of-time template and phrase compiler.
//!
//! Templates and phrases are defined along two inheritance trees (styles
//! and languages). The [`Engine`] compiles every (position, name) pair into
//! a cached [`CompiledArtifact`] and tracks include and phrase edges, so an
//! edit recompiles exactly the artifacts it reaches.
//!
//! ## Modules
//!
//! - [`engine`]: the facade, rendering interface and administrative hooks
//! - [`cascade`]: cascade planning and reports
//! - [`cache`]: compiled artifacts and their generation sequence
//! - [`deps`]: include and phrase reference edges
//! - [`store`] / [`memory_store`]: the persistence collaborator
//! - [`render`]: a minimal executor for generated code
//! - [`config`], [`logging`], [`error`]
//!
//! ## Example
//!
//! ```
//! use vellum::{DefaultHost, Engine, EngineConfig, MemoryStore, TreeKind};
//! use vellum::{PositionId, Value};
//!
//! let (s1, s2) = (PositionId(1), PositionId(2));
//! let store = MemoryStore::new().with_template(PositionId::ROOT, "greeting", "Hello {$name}!");
//! let engine = Engine::open(store, EngineConfig::default())?;
//! engine.rebuild_all()?;
//! engine.add_position(TreeKind::Style, s1, PositionId::ROOT)?;
//! engine.add_position(TreeKind::Style, s2, s1)?;
//!
//! let data: Value = [("name", "<b>")].into_iter().collect();
//! let host = DefaultHost::default();
//! let out = engine.render_template(s2, PositionId::ROOT, "greeting", &data, &host)?;
//! assert_eq!(out, "Hello &lt;b&gt;!");
//!
//! engine.save_template(s1, "greeting", "Hi {$name}")?;
//! let out = engine.render_template(s2, PositionId::ROOT, "greeting", &data, &host)?;
//! assert_eq!(out, "Hi &lt;b&gt;");
//! # Ok::<(), vellum::EngineError>(())
//! ```

pub mod cache;
pub mod cascade;
pub mod config;
pub mod deps;
pub mod engine;
mod env;
pub mod error;
pub mod logging;
pub mod memory_store;
pub mod render;
pub mod store;

pub use cache::{ArtifactCache, ArtifactStatus, CacheStats, CompiledArtifact};
pub use cascade::{CascadeFailure, CascadeReport};
pub use config::{EngineConfig, FailurePolicy};
pub use deps::{DependencyGraph, Edges};
pub use engine::{Engine, EngineBuilder};
pub use env::ParseMemo;
pub use error::{ConfigError, EngineError, RenderError, Result, StoreError};
pub use memory_store::MemoryStore;
pub use render::{DefaultHost, HelperFn, LocaleFormat, PageNavRequest, RenderHost, Renderer};
pub use store::{
    Definition, EditableStore, PhraseDefinition, Store, StoreResult, TemplateDefinition,
};

pub use vellum_compiler::{
    Code, CompileDiagnostic, CompileError, FunctionCompiler, FunctionRegistry,
};
pub use vellum_core::{
    ArtifactKey, DefinitionId, EntityKind, PositionId, TreeError, TreeKind, Value,
};
pub use vellum_registry::Resolution;
