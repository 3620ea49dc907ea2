//! Vellum template parser.
//!
//! This crate turns template source into a tree of segments:
//! - Lexical analysis with a mode stack (text, argument lists, quoted
//!   content, block tags)
//! - The segment tree ([`Template`], [`Segment`], [`Argument`])
//! - The parser producing it
//!
//! # Example
//!
//! ```
//! use vellum_parser::{Parser, Segment};
//!
//! let template = Parser::parse("Hello {$user.name}! {phrase(welcome, board={$board})}").unwrap();
//! assert_eq!(template.segments().len(), 4);
//! assert!(matches!(template.segments()[1], Segment::Variable { .. }));
//! ```

pub mod ast;
pub mod lexer;

pub use ast::{Argument, Branch, CallSegment, Parser, Segment, Template};
pub use lexer::{Lexer, Token, TokenKind};
