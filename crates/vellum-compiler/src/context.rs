//! Compilation context and the environment the compiler reads from.
//!
//! The compiler never reaches into storage itself. Everything it needs
//! about the world - the effective phrase text for a language, the parsed
//! tree of a template that resolves at a style - comes through
//! [`CompileEnv`], which the engine implements on top of its resolution
//! maps and parse memo.

use bitflags::bitflags;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use vellum_core::{ParseErrors, PositionId};
use vellum_parser::{Parser, Template};

bitflags! {
    /// Switches for one compilation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CompileFlags: u8 {
        /// Inline included templates. Without it includes are only checked
        /// for existence and cycles.
        const FOLLOW_INCLUDES = 1 << 0;
    }
}

/// The coordinates an artifact is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompileContext {
    pub style: PositionId,
    pub language: PositionId,
    pub flags: CompileFlags,
}

impl CompileContext {
    /// Full compilation, inlining includes.
    pub fn new(style: PositionId, language: PositionId) -> Self {
        Self {
            style,
            language,
            flags: CompileFlags::FOLLOW_INCLUDES,
        }
    }

    /// Cheap validation for edit forms: includes are not expanded.
    pub fn validation(style: PositionId, language: PositionId) -> Self {
        Self {
            style,
            language,
            flags: CompileFlags::empty(),
        }
    }

    #[inline]
    pub fn follows_includes(&self) -> bool {
        self.flags.contains(CompileFlags::FOLLOW_INCLUDES)
    }
}

/// Read access to effective phrases and templates.
pub trait CompileEnv {
    /// The text of the phrase `name` as resolved at `language`.
    fn phrase(&self, name: &str, language: PositionId) -> Option<String>;

    /// The parsed tree of the template `name` as resolved at `style`.
    ///
    /// `Ok(None)` means no definition resolves there.
    fn template(&self, name: &str, style: PositionId) -> Result<Option<Arc<Template>>, ParseErrors>;
}

/// A position-agnostic environment backed by two maps.
///
/// Useful for checking a standalone template and in tests; the engine has
/// its own implementation.
#[derive(Debug, Clone, Default)]
pub struct SimpleEnv {
    templates: FxHashMap<String, String>,
    phrases: FxHashMap<String, String>,
}

impl SimpleEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.templates.insert(name.into(), source.into());
        self
    }

    pub fn with_phrase(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.phrases.insert(name.into(), text.into());
        self
    }
}

impl CompileEnv for SimpleEnv {
    fn phrase(&self, name: &str, _language: PositionId) -> Option<String> {
        self.phrases.get(name).cloned()
    }

    fn template(
        &self,
        name: &str,
        _style: PositionId,
    ) -> Result<Option<Arc<Template>>, ParseErrors> {
        self.templates
            .get(name)
            .map(|source| Parser::parse(source).map(Arc::new))
            .transpose()
    }
}
