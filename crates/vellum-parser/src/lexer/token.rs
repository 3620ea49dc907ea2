//! Token types for the template lexer.

use std::fmt;
use vellum_core::Span;

/// A token from template source.
///
/// Lexemes borrow from the source; the parser copies what it keeps into
/// the owned segment tree.
#[derive(Clone, Copy, PartialEq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    /// The raw source text of this token.
    pub lexeme: &'src str,
    pub span: Span,
}

impl<'src> Token<'src> {
    #[inline]
    pub fn new(kind: TokenKind, lexeme: &'src str, span: Span) -> Self {
        Self { kind, lexeme, span }
    }
}

impl fmt::Debug for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:?} @ {:?})", self.kind, self.lexeme, self.span)
    }
}

/// All token kinds produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // =========================================
    // Text
    // =========================================
    /// Literal text, or unquoted/quoted argument text.
    Text,

    // =========================================
    // Inline constructs
    // =========================================
    /// `{$path.to.value}`
    Var,
    /// `{name(`
    CallStart,
    /// `key=` at the start of an argument.
    NamedArg,
    /// `,` at paren depth 0 inside a call.
    Comma,
    /// `)}`
    CallEnd,
    /// Opening quote of a quoted argument.
    QuoteOpen,
    /// Closing quote of a quoted argument or attribute value.
    QuoteClose,

    // =========================================
    // Block tags
    // =========================================
    /// `<tpl:name`
    TagStart,
    /// `name="` inside a tag; the value follows as quoted content.
    Attr,
    /// `>` ending an opening tag.
    TagEnd,
    /// `/>` ending a self-closing tag.
    TagSelfClose,
    /// `</tpl:name>`
    TagClose,

    // =========================================
    // Special
    // =========================================
    Eof,
    Error,
}

impl TokenKind {
    pub fn description(&self) -> &'static str {
        match self {
            TokenKind::Text => "text",
            TokenKind::Var => "variable",
            TokenKind::CallStart => "function call",
            TokenKind::NamedArg => "named argument",
            TokenKind::Comma => "','",
            TokenKind::CallEnd => "')}'",
            TokenKind::QuoteOpen => "opening quote",
            TokenKind::QuoteClose => "closing quote",
            TokenKind::TagStart => "block tag",
            TokenKind::Attr => "attribute",
            TokenKind::TagEnd => "'>'",
            TokenKind::TagSelfClose => "'/>'",
            TokenKind::TagClose => "closing block tag",
            TokenKind::Eof => "end of template",
            TokenKind::Error => "error",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
