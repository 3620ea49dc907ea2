//! Deterministic fingerprints of definition source text.
//!
//! Used to skip reparsing when a definition is saved unchanged and to key
//! memoized parse trees. Uses XXHash64 with a domain constant so a
//! template body and a phrase with identical text hash differently.

use crate::EntityKind;
use std::fmt;
use xxhash_rust::xxh64::xxh64;

mod domain {
    pub const TEMPLATE: u64 = 0x2fac10b63a6cc57c;
    pub const PHRASE: u64 = 0x5ea77ffbcdf5f302;
}

/// A 64-bit fingerprint of one definition's source text.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SourceHash(pub u64);

impl SourceHash {
    #[inline]
    pub fn of(kind: EntityKind, source: &str) -> Self {
        let domain = match kind {
            EntityKind::Template => domain::TEMPLATE,
            EntityKind::Phrase => domain::PHRASE,
        };
        SourceHash(domain ^ xxh64(source.as_bytes(), 0))
    }

    #[inline]
    pub fn template(source: &str) -> Self {
        Self::of(EntityKind::Template, source)
    }

    #[inline]
    pub fn phrase(text: &str) -> Self {
        Self::of(EntityKind::Phrase, text)
    }
}

impl fmt::Debug for SourceHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceHash({:#018x})", self.0)
    }
}
