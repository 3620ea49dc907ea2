//! Identifiers for tree positions, definitions and compiled artifacts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which inheritance tree a position belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeKind {
    /// Presentation variants. Templates are defined per style.
    Style,
    /// Locales. Phrases are defined per language.
    Language,
}

impl TreeKind {
    /// The entity kind whose definitions live on this tree.
    pub fn entity(self) -> EntityKind {
        match self {
            TreeKind::Style => EntityKind::Template,
            TreeKind::Language => EntityKind::Phrase,
        }
    }
}

impl fmt::Display for TreeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeKind::Style => write!(f, "style"),
            TreeKind::Language => write!(f, "language"),
        }
    }
}

/// The kind of overridable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Template,
    Phrase,
}

impl EntityKind {
    /// The tree this entity kind is resolved along.
    pub fn tree(self) -> TreeKind {
        match self {
            EntityKind::Template => TreeKind::Style,
            EntityKind::Phrase => TreeKind::Language,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Template => write!(f, "template"),
            EntityKind::Phrase => write!(f, "phrase"),
        }
    }
}

/// A node in the style tree or the language tree.
///
/// Position `0` is the root of either tree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionId(pub u32);

impl PositionId {
    /// The root position of a tree.
    pub const ROOT: PositionId = PositionId(0);

    #[inline]
    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl fmt::Debug for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PositionId {
    fn from(id: u32) -> Self {
        PositionId(id)
    }
}

/// Identity of one authoritative template or phrase definition row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefinitionId(pub u64);

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "def{}", self.0)
    }
}

/// Cache key of a compiled artifact.
///
/// Templates compile per (style, language) pair because phrase text is
/// inlined at compile time. Phrase artifacts exist per language only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactKey {
    Template {
        style: PositionId,
        language: PositionId,
        name: String,
    },
    Phrase {
        language: PositionId,
        name: String,
    },
}

impl ArtifactKey {
    pub fn template(style: PositionId, language: PositionId, name: impl Into<String>) -> Self {
        ArtifactKey::Template {
            style,
            language,
            name: name.into(),
        }
    }

    pub fn phrase(language: PositionId, name: impl Into<String>) -> Self {
        ArtifactKey::Phrase {
            language,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ArtifactKey::Template { name, .. } | ArtifactKey::Phrase { name, .. } => name,
        }
    }

    pub fn entity(&self) -> EntityKind {
        match self {
            ArtifactKey::Template { .. } => EntityKind::Template,
            ArtifactKey::Phrase { .. } => EntityKind::Phrase,
        }
    }

    /// The position this artifact's own definition is resolved at.
    pub fn resolution_position(&self) -> PositionId {
        match self {
            ArtifactKey::Template { style, .. } => *style,
            ArtifactKey::Phrase { language, .. } => *language,
        }
    }

    pub fn language(&self) -> PositionId {
        match self {
            ArtifactKey::Template { language, .. } | ArtifactKey::Phrase { language, .. } => {
                *language
            }
        }
    }

    pub fn style(&self) -> Option<PositionId> {
        match self {
            ArtifactKey::Template { style, .. } => Some(*style),
            ArtifactKey::Phrase { .. } => None,
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKey::Template {
                style,
                language,
                name,
            } => write!(f, "template '{name}' (style {style}, language {language})"),
            ArtifactKey::Phrase { language, name } => {
                write!(f, "phrase '{name}' (language {language})")
            }
        }
    }
}
