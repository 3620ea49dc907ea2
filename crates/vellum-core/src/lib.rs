//! Shared types for the vellum template compiler.
//!
//! This crate contains the types every other vellum crate agrees on:
//!
//! - [`Span`] - source locations
//! - [`PositionId`], [`DefinitionId`], [`ArtifactKey`] - identities of tree
//!   positions, authoritative definitions and compiled artifacts
//! - [`Escape`] and [`EscapeContext`] - output escaping
//! - [`Value`] - the data context generated code runs against
//! - [`SourceHash`] - fingerprints of definition source
//! - error types for parsing, compiling and tree maintenance

mod error;
mod escape;
mod ids;
mod source_hash;
mod span;
mod value;

pub use error::{
    CompileDiagnostic, CompileError, ParseError, ParseErrorKind, ParseErrors, TreeError,
};
pub use escape::{Escape, EscapeContext};
pub use ids::{ArtifactKey, DefinitionId, EntityKind, PositionId, TreeKind};
pub use source_hash::SourceHash;
pub use span::Span;
pub use value::Value;
