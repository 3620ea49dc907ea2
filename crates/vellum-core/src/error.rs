//! Unified error types for vellum.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ParseError / ParseErrors - lexing and parsing of template source
//! CompileError             - code generation for one artifact
//! TreeError                - style/language tree maintenance
//! CompileDiagnostic        - flattened {message, offset, template} for edit forms
//! ```
//!
//! Compile errors are always local to the artifact being compiled. The
//! cascade processor in the root crate collects them into a report instead
//! of aborting.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{PositionId, Span, TreeKind};

// ============================================================================
// Parse Errors
// ============================================================================

/// Categories of parse errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    /// `{$path` without the closing `}`.
    UnterminatedTag,
    /// A quoted argument or attribute value without its closing quote.
    UnterminatedString,
    /// `{name(` without the closing `)}`.
    UnterminatedCall,
    /// A closing block tag with no matching opener.
    UnmatchedBlock,
    /// A block tag opened but never closed.
    UnclosedBlock,
    /// An argument list that cannot be split into arguments.
    MalformedArguments,
    /// A `<tpl:...>` tag with an unknown name.
    UnknownTag,
    /// A block tag without a required attribute.
    MissingAttribute,
    /// An attribute whose value is not allowed.
    InvalidAttribute,
    /// A token that makes no sense where it appears.
    UnexpectedToken,
}

impl ParseErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseErrorKind::UnterminatedTag => "unterminated tag",
            ParseErrorKind::UnterminatedString => "unterminated string",
            ParseErrorKind::UnterminatedCall => "unterminated function call",
            ParseErrorKind::UnmatchedBlock => "unmatched block tag",
            ParseErrorKind::UnclosedBlock => "unclosed block tag",
            ParseErrorKind::MalformedArguments => "malformed argument list",
            ParseErrorKind::UnknownTag => "unknown tag",
            ParseErrorKind::MissingAttribute => "missing attribute",
            ParseErrorKind::InvalidAttribute => "invalid attribute",
            ParseErrorKind::UnexpectedToken => "unexpected token",
        }
    }
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parse error with location and context.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} at {span}: {message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
    pub message: String,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
        }
    }

    pub fn unexpected_token(span: Span, found: &str, expected: &str) -> Self {
        Self::new(
            ParseErrorKind::UnexpectedToken,
            span,
            format!("expected {expected}, found {found}"),
        )
    }

    /// Format the error with the offending source line and a caret.
    pub fn display_with_source(&self, source: &str) -> String {
        let mut output = format!("Error at {}: {}\n", self.span, self.kind);
        if !self.message.is_empty() {
            output.push_str(&format!("  {}\n", self.message));
        }
        let index = self.span.line.saturating_sub(1) as usize;
        if let Some(line_text) = source.lines().nth(index) {
            output.push_str("  |\n");
            output.push_str(&format!("{:>3} | {}\n", self.span.line, line_text));
            let indent = " ".repeat(self.span.col.saturating_sub(1) as usize);
            let pointer = if self.span.len <= 1 {
                "^".to_string()
            } else {
                "^".to_string() + &"~".repeat((self.span.len - 1) as usize)
            };
            output.push_str(&format!("  | {}{}\n", indent, pointer));
        }
        output
    }
}

/// All errors found while parsing one template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseErrors {
    errors: Vec<ParseError>,
}

impl ParseErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn push(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn first(&self) -> Option<&ParseError> {
        self.errors.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParseError> {
        self.errors.iter()
    }

    pub fn into_vec(self) -> Vec<ParseError> {
        self.errors
    }
}

impl IntoIterator for ParseErrors {
    type Item = ParseError;
    type IntoIter = std::vec::IntoIter<ParseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl From<ParseError> for ParseErrors {
    fn from(error: ParseError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl std::fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseErrors {}

// ============================================================================
// Compile Errors
// ============================================================================

/// Errors raised while generating code for one artifact.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// The template source (or an included template) does not parse.
    #[error(transparent)]
    Syntax(#[from] ParseError),

    /// A call to a function with no registered compiler.
    #[error("at {span}: unknown function '{name}'")]
    UnknownFunction { name: String, span: Span },

    /// A function called with the wrong number of arguments.
    #[error("at {span}: '{function}' expects {expected} argument(s), got {got}")]
    ArgumentCount {
        function: String,
        expected: String,
        got: usize,
        span: Span,
    },

    /// A phrase lookup whose name is not a compile-time literal.
    #[error("at {span}: phrase name must be a literal")]
    NonLiteralPhraseName { span: Span },

    /// An include that would re-enter a template already being compiled.
    #[error("at {span}: circular include of '{name}' ({})", chain.join(" -> "))]
    CircularInclude {
        name: String,
        chain: Vec<String>,
        span: Span,
    },

    /// An include of a template that does not resolve at this style.
    #[error("at {span}: included template '{name}' does not exist at style {style}")]
    UnresolvedInclude {
        name: String,
        style: PositionId,
        span: Span,
    },

    /// An arithmetic or condition expression that does not parse.
    #[error("at {span}: malformed expression: {message}")]
    MalformedExpression { message: String, span: Span },

    /// An argument whose value a function cannot accept.
    #[error("at {span}: invalid argument to '{function}': {message}")]
    InvalidArgument {
        function: String,
        message: String,
        span: Span,
    },

    /// An error raised while compiling an included template.
    #[error("in included template '{template}': {source}")]
    Included {
        template: String,
        source: Box<CompileError>,
    },
}

impl CompileError {
    /// The span of the innermost error.
    pub fn span(&self) -> Span {
        match self {
            CompileError::Syntax(e) => e.span,
            CompileError::UnknownFunction { span, .. }
            | CompileError::ArgumentCount { span, .. }
            | CompileError::NonLiteralPhraseName { span }
            | CompileError::CircularInclude { span, .. }
            | CompileError::UnresolvedInclude { span, .. }
            | CompileError::MalformedExpression { span, .. }
            | CompileError::InvalidArgument { span, .. } => *span,
            CompileError::Included { source, .. } => source.span(),
        }
    }

    /// Strip `Included` wrappers.
    pub fn innermost(&self) -> &CompileError {
        match self {
            CompileError::Included { source, .. } => source.innermost(),
            other => other,
        }
    }

    /// Flatten into a diagnostic for display next to the template that
    /// actually contains the error.
    pub fn diagnostic(&self, template: &str) -> CompileDiagnostic {
        let mut template = template;
        let mut error = self;
        while let CompileError::Included {
            template: inner,
            source,
        } = error
        {
            template = inner;
            error = source;
        }
        let span = error.span();
        let message = match error {
            CompileError::Syntax(e) => format!("{}: {}", e.kind, e.message),
            other => strip_location(&other.to_string()),
        };
        CompileDiagnostic {
            message,
            offset: span.offset,
            line: span.line,
            column: span.col,
            template: template.to_string(),
        }
    }
}

fn strip_location(message: &str) -> String {
    match message.split_once(": ") {
        Some((prefix, rest)) if prefix.starts_with("at ") => rest.to_string(),
        _ => message.to_string(),
    }
}

impl From<ParseErrors> for CompileError {
    fn from(errors: ParseErrors) -> Self {
        match errors.into_iter().next() {
            Some(first) => CompileError::Syntax(first),
            None => CompileError::Syntax(ParseError::new(
                ParseErrorKind::UnexpectedToken,
                Span::default(),
                "parse failed without a reported error",
            )),
        }
    }
}

/// A compile error flattened for an edit form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileDiagnostic {
    pub message: String,
    pub offset: u32,
    pub line: u32,
    pub column: u32,
    /// Name of the template whose source contains the error.
    pub template: String,
}

impl std::fmt::Display for CompileDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}:{} (offset {}): {}",
            self.template, self.line, self.column, self.offset, self.message
        )
    }
}

// ============================================================================
// Tree Errors
// ============================================================================

/// Errors from maintaining the style and language trees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("{tree} position {id} does not exist")]
    UnknownPosition { tree: TreeKind, id: PositionId },

    #[error("{tree} position {id} already exists")]
    DuplicatePosition { tree: TreeKind, id: PositionId },

    /// Assigning the parent would make a position its own ancestor.
    #[error("{tree} position {parent} cannot become the parent of {id}: it is in {id}'s subtree")]
    Cycle {
        tree: TreeKind,
        id: PositionId,
        parent: PositionId,
    },

    #[error("the root {tree} position cannot be moved or removed")]
    RootImmutable { tree: TreeKind },

    /// A persisted node whose parent chain never reaches the root.
    #[error("{tree} position {id} is not connected to the root")]
    Orphan { tree: TreeKind, id: PositionId },
}
