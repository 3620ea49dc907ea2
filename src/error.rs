//! Error types for the engine layer.
//!
//! ```text
//! EngineError
//! ├── TreeError    - style/language tree maintenance (vellum-core)
//! ├── StoreError   - the persistence collaborator
//! ├── ConfigError  - loading EngineConfig
//! ├── RenderError  - executing generated code
//! ├── ParseErrors  - template source that does not parse
//! └── Rejected     - an edit refused by validation, with diagnostics
//! ```
//!
//! Compile errors never appear here directly: they are local to one
//! artifact and are reported through [`CascadeReport`](crate::CascadeReport)
//! or as [`CompileDiagnostic`]s.

use std::path::PathBuf;

use thiserror::Error;
use vellum_compiler::ArithError;
use vellum_core::{
    CompileDiagnostic, DefinitionId, EntityKind, ParseErrors, PositionId, TreeError, TreeKind,
};

pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors from a [`Store`](crate::Store).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{kind} definition {id} does not exist")]
    MissingDefinition { kind: EntityKind, id: DefinitionId },

    #[error("no {kind} '{name}' is defined at position {position}")]
    NotDefinedAt {
        kind: EntityKind,
        name: String,
        position: PositionId,
    },

    #[error("{tree} position {id} is not stored")]
    MissingPosition { tree: TreeKind, id: PositionId },

    /// Failure reported by the backing storage.
    #[error("store backend: {0}")]
    Backend(String),
}

/// Errors loading an [`EngineConfig`](crate::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for '{field}': {message}")]
    Invalid { field: &'static str, message: String },
}

/// Errors executing generated code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error(transparent)]
    Arith(#[from] ArithError),

    /// Validation-only code reached the renderer.
    #[error("include of '{0}' was not expanded")]
    UnexpandedInclude(String),

    #[error("invalid date format '{0}'")]
    DateFormat(String),

    #[error("timestamp {0} is out of range")]
    Timestamp(i64),

    #[error("no compiled artifact for {0}")]
    MissingArtifact(String),
}

/// Top-level engine error.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Parse(#[from] ParseErrors),

    /// An edit refused because the new source does not compile.
    #[error("template '{name}' was rejected: {}", first_message(diagnostics))]
    Rejected {
        name: String,
        diagnostics: Vec<CompileDiagnostic>,
    },
}

fn first_message(diagnostics: &[CompileDiagnostic]) -> String {
    match diagnostics {
        [] => "no diagnostics".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

impl EngineError {
    /// Diagnostics of a rejected edit, empty for every other error.
    pub fn diagnostics(&self) -> &[CompileDiagnostic] {
        match self {
            EngineError::Rejected { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}
