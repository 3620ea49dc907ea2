//! Tokenizer shared by the arithmetic and condition grammars.
//!
//! Literal segments of the argument are scanned character by character.
//! Every other segment (a variable or a nested call) is compiled raw and
//! becomes an opaque [`Tok::Placeholder`] indexing into the compiled code.

use std::fmt;

use vellum_core::{CompileError, EscapeContext, Span, Value};
use vellum_parser::{Argument, Segment};

use crate::code::Code;
use crate::compiler::TemplateCompiler;

type Result<T> = std::result::Result<T, CompileError>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tok {
    Num(f64),
    Str(String),
    Word(String),
    Sym(Sym),
    Placeholder(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sym {
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    Comma,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Bang,
    AndAnd,
    OrOr,
}

impl Sym {
    fn as_str(self) -> &'static str {
        match self {
            Sym::Plus => "+",
            Sym::Minus => "-",
            Sym::Star => "*",
            Sym::Slash => "/",
            Sym::Percent => "%",
            Sym::LParen => "(",
            Sym::RParen => ")",
            Sym::Comma => ",",
            Sym::Eq => "==",
            Sym::Ne => "!=",
            Sym::Lt => "<",
            Sym::Le => "<=",
            Sym::Gt => ">",
            Sym::Ge => ">=",
            Sym::Bang => "!",
            Sym::AndAnd => "&&",
            Sym::OrOr => "||",
        }
    }
}

impl fmt::Display for Tok {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tok::Num(n) => write!(f, "'{}'", Value::Number(*n)),
            Tok::Str(s) => write!(f, "{s:?}"),
            Tok::Word(w) => write!(f, "'{w}'"),
            Tok::Sym(sym) => write!(f, "'{}'", sym.as_str()),
            Tok::Placeholder(_) => f.write_str("a value"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub tok: Tok,
    pub span: Span,
}

/// Tokens of one argument plus the code behind each placeholder.
#[derive(Debug)]
pub(crate) struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
    whole: Span,
    placeholders: Vec<Code>,
}

impl TokenStream {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|token| &token.tok)
    }

    pub fn peek_sym(&self) -> Option<Sym> {
        match self.peek() {
            Some(Tok::Sym(sym)) => Some(*sym),
            _ => None,
        }
    }

    pub fn next(&mut self) -> Option<Tok> {
        let token = self.tokens.get(self.pos)?.tok.clone();
        self.pos += 1;
        Some(token)
    }

    pub fn eat_sym(&mut self, sym: Sym) -> bool {
        if self.peek_sym() == Some(sym) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume a case-insensitive keyword.
    pub fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Word(w)) if w.eq_ignore_ascii_case(word)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect_sym(&mut self, sym: Sym) -> Result<()> {
        if self.eat_sym(sym) {
            return Ok(());
        }
        Err(match self.peek() {
            Some(tok) => self.error(format!("expected '{}', found {tok}", sym.as_str())),
            None => self.error(format!("expected '{}' before the end", sym.as_str())),
        })
    }

    pub fn placeholder(&self, index: usize) -> Code {
        self.placeholders
            .get(index)
            .cloned()
            .unwrap_or_else(Code::empty)
    }

    /// Span of the token about to be read, or of the whole argument at the
    /// end.
    pub fn span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|token| token.span)
            .unwrap_or(self.whole)
    }

    /// Span of the token just read.
    pub fn previous_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|token| token.span)
            .unwrap_or(self.whole)
    }

    pub fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::MalformedExpression {
            message: message.into(),
            span: self.span(),
        }
    }

    /// Error for a token that was already consumed.
    pub fn error_at_previous(&self, message: impl Into<String>) -> CompileError {
        CompileError::MalformedExpression {
            message: message.into(),
            span: self.previous_span(),
        }
    }
}

/// Tokenize an argument, compiling its non-literal segments raw.
pub(crate) fn tokenize(
    compiler: &mut TemplateCompiler<'_>,
    argument: &Argument,
) -> Result<TokenStream> {
    let mut tokens = Vec::new();
    let mut placeholders = Vec::new();
    for segment in &argument.segments {
        match segment {
            Segment::Literal { text, span } => scan(text, *span, &mut tokens)?,
            other => {
                placeholders.push(compiler.compile_segment(other, EscapeContext::RAW)?);
                tokens.push(Token {
                    tok: Tok::Placeholder(placeholders.len() - 1),
                    span: other.span(),
                });
            }
        }
    }
    Ok(TokenStream {
        tokens,
        pos: 0,
        whole: argument.span,
        placeholders,
    })
}

/// Scan literal text whose first byte is at `origin`.
fn scan(text: &str, origin: Span, tokens: &mut Vec<Token>) -> Result<()> {
    let bytes = text.as_bytes();
    let digit_at = |at: usize| bytes.get(at).is_some_and(u8::is_ascii_digit);
    let mut i = 0;
    let mut line = origin.line;
    let mut col = origin.col;

    while i < bytes.len() {
        let start = i;
        let (start_line, start_col) = (line, col);
        let c = bytes[i];

        if c == b'\n' {
            i += 1;
            line += 1;
            col = 1;
            continue;
        }
        if c.is_ascii_whitespace() {
            i += 1;
            col += 1;
            continue;
        }

        let tok = if c.is_ascii_digit() || (c == b'.' && digit_at(i + 1)) {
            while digit_at(i) {
                i += 1;
            }
            if bytes.get(i) == Some(&b'.') && digit_at(i + 1) {
                i += 1;
                while digit_at(i) {
                    i += 1;
                }
            }
            let lexeme = &text[start..i];
            let value = lexeme.parse::<f64>().map_err(|_| CompileError::MalformedExpression {
                message: format!("invalid number '{lexeme}'"),
                span: Span::point(origin.offset + start as u32, start_line, start_col),
            })?;
            Tok::Num(value)
        } else if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            Tok::Word(text[start..i].to_string())
        } else if c == b'"' || c == b'\'' {
            i += 1;
            let mut value = String::new();
            let mut closed = false;
            while i < bytes.len() {
                let ch = text[i..].chars().next().unwrap_or('\0');
                if ch as u32 == c as u32 {
                    i += 1;
                    closed = true;
                    break;
                }
                if ch == '\\' && i + 1 < bytes.len() {
                    i += 1;
                    let escaped = text[i..].chars().next().unwrap_or('\\');
                    value.push(escaped);
                    i += escaped.len_utf8();
                    continue;
                }
                value.push(ch);
                i += ch.len_utf8();
            }
            if !closed {
                let width = (i - start) as u32;
                return Err(CompileError::MalformedExpression {
                    message: "unterminated string".into(),
                    span: Span::new(origin.offset + start as u32, start_line, start_col, width),
                });
            }
            Tok::Str(value)
        } else {
            let next = bytes.get(i + 1).copied();
            let (sym, len) = match (c, next) {
                (b'=', Some(b'=')) => (Sym::Eq, 2),
                (b'!', Some(b'=')) => (Sym::Ne, 2),
                (b'<', Some(b'=')) => (Sym::Le, 2),
                (b'>', Some(b'=')) => (Sym::Ge, 2),
                (b'&', Some(b'&')) => (Sym::AndAnd, 2),
                (b'|', Some(b'|')) => (Sym::OrOr, 2),
                (b'<', _) => (Sym::Lt, 1),
                (b'>', _) => (Sym::Gt, 1),
                (b'!', _) => (Sym::Bang, 1),
                (b'+', _) => (Sym::Plus, 1),
                (b'-', _) => (Sym::Minus, 1),
                (b'*', _) => (Sym::Star, 1),
                (b'/', _) => (Sym::Slash, 1),
                (b'%', _) => (Sym::Percent, 1),
                (b'(', _) => (Sym::LParen, 1),
                (b')', _) => (Sym::RParen, 1),
                (b',', _) => (Sym::Comma, 1),
                _ => {
                    let ch = text[i..].chars().next().unwrap_or('?');
                    return Err(CompileError::MalformedExpression {
                        message: format!("unexpected character '{ch}'"),
                        span: Span::new(origin.offset + i as u32, line, col, ch.len_utf8() as u32),
                    });
                }
            };
            i += len;
            Tok::Sym(sym)
        };

        col += text[start..i].chars().count() as u32;
        let width = (i - start) as u32;
        tokens.push(Token {
            tok,
            span: Span::new(origin.offset + start as u32, start_line, start_col, width),
        });
    }
    Ok(())
}
