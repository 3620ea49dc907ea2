//! Segment tree for templates and the parser that builds it.

mod parser;
mod segment;

pub use parser::Parser;
pub use segment::{Argument, Branch, CallSegment, Segment, Template};

// Re-export error types from core
pub use vellum_core::{ParseError, ParseErrorKind, ParseErrors};
