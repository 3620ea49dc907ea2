//! Main lexer implementation for template source.
//!
//! The [`Lexer`] converts source text into a stream of [`Token`]s. Template
//! source is mostly literal text, so the lexer keeps a stack of modes: plain
//! text, a function call's argument list, a quoted argument or attribute
//! value, and the inside of a block tag. Inline constructs nest freely, so
//! `{link(thread, "{$t.title}", page={calc({$p} + 1)})}` pushes and pops
//! several modes.

use super::cursor::{Cursor, ident_len, is_ident_continue, is_ident_start};
use super::token::{Token, TokenKind};
use vellum_core::{ParseError, ParseErrorKind, Span};

const COMMENT_OPEN: &str = "<tpl:comment>";
const COMMENT_CLOSE: &str = "</tpl:comment>";
const TAG_OPEN: &str = "<tpl:";
const TAG_CLOSE_OPEN: &str = "</tpl:";

/// Where the lexer is inside the current argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgState {
    /// Right after `{name(` or `,`: a name or a quote may follow.
    Start,
    /// Right after `key=`: a quote may follow.
    Value,
    /// Past the start of the argument.
    Inside,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Text,
    Args {
        depth: u32,
        state: ArgState,
        open: Span,
    },
    Quoted {
        quote: char,
        open: Span,
    },
    Tag {
        open: Span,
    },
}

#[derive(Clone, Copy)]
struct Mark {
    offset: u32,
    line: u32,
    col: u32,
}

/// Lexer for template source.
pub struct Lexer<'src> {
    cursor: Cursor<'src>,
    modes: Vec<Mode>,
    errors: Vec<ParseError>,
    finished: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            cursor: Cursor::new(source),
            modes: vec![Mode::Text],
            errors: Vec::new(),
            finished: false,
        }
    }

    /// Tokenize a whole template, including the trailing `Eof` token.
    pub fn tokenize(source: &'src str) -> (Vec<Token<'src>>, Vec<ParseError>) {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::with_capacity(source.len() / 16 + 4);
        loop {
            let token = lexer.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        (tokens, lexer.take_errors())
    }

    /// Take accumulated errors, leaving an empty vec.
    pub fn take_errors(&mut self) -> Vec<ParseError> {
        std::mem::take(&mut self.errors)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Consume and return the next token.
    pub fn next_token(&mut self) -> Token<'src> {
        self.scan_token()
    }

    // =========================================
    // Internal: Token scanning
    // =========================================

    fn scan_token(&mut self) -> Token<'src> {
        if self.cursor.is_eof() {
            return self.finish();
        }

        match self.modes.last().copied().unwrap_or(Mode::Text) {
            Mode::Text => self.scan_text_mode(),
            Mode::Args { depth, state, .. } => self.scan_args_mode(depth, state),
            Mode::Quoted { quote, .. } => self.scan_quoted_mode(quote),
            Mode::Tag { .. } => self.scan_tag_mode(),
        }
    }

    /// Report every construct still open at end of input and emit `Eof`.
    fn finish(&mut self) -> Token<'src> {
        while let Some(mode) = self.modes.pop() {
            let error = match mode {
                Mode::Text => continue,
                Mode::Args { open, .. } => ParseError::new(
                    ParseErrorKind::UnterminatedCall,
                    open,
                    "expected ')}' before end of template",
                ),
                Mode::Quoted { quote, open } => ParseError::new(
                    ParseErrorKind::UnterminatedString,
                    open,
                    format!("expected closing {quote}"),
                ),
                Mode::Tag { open } => ParseError::new(
                    ParseErrorKind::UnterminatedTag,
                    open,
                    "expected '>' or '/>'",
                ),
            };
            self.errors.push(error);
        }
        self.modes.push(Mode::Text);
        self.finished = true;

        let mark = self.mark();
        Token::new(
            TokenKind::Eof,
            "",
            Span::point(mark.offset, mark.line, mark.col),
        )
    }

    fn mark(&self) -> Mark {
        Mark {
            offset: self.cursor.offset(),
            line: self.cursor.line(),
            col: self.cursor.column(),
        }
    }

    fn span_from(&self, mark: Mark) -> Span {
        Span::new(
            mark.offset,
            mark.line,
            mark.col,
            self.cursor.offset() - mark.offset,
        )
    }

    /// Create a token from `mark` to the current position.
    fn make_token(&self, kind: TokenKind, mark: Mark) -> Token<'src> {
        Token::new(
            kind,
            self.cursor.slice_from(mark.offset),
            self.span_from(mark),
        )
    }

    /// Create an error token and record the error.
    fn make_error(
        &mut self,
        kind: ParseErrorKind,
        mark: Mark,
        message: impl Into<String>,
    ) -> Token<'src> {
        let span = self.span_from(mark);
        self.errors.push(ParseError::new(kind, span, message));
        Token::new(TokenKind::Error, self.cursor.slice_from(mark.offset), span)
    }

    fn set_args(&mut self, depth: u32, state: ArgState) {
        if let Some(Mode::Args {
            depth: d, state: s, ..
        }) = self.modes.last_mut()
        {
            *d = depth;
            *s = state;
        }
    }

    // =========================================
    // Construct detection
    // =========================================

    fn at_variable(&self) -> bool {
        let rest = self.cursor.rest();
        rest.starts_with("{$") && rest[2..].chars().next().is_some_and(is_ident_start)
    }

    /// Length of the function name if the cursor is at `{name(`.
    fn call_name_len(&self) -> Option<usize> {
        let after = self.cursor.rest().strip_prefix('{')?;
        let len = ident_len(after);
        (len > 0 && after[len..].starts_with('(')).then_some(len)
    }

    fn at_inline(&self) -> bool {
        self.cursor.check_str("{") && (self.at_variable() || self.call_name_len().is_some())
    }

    fn at_tag(&self) -> bool {
        let rest = self.cursor.rest();
        rest.starts_with(COMMENT_OPEN)
            || rest
                .strip_prefix(TAG_CLOSE_OPEN)
                .or_else(|| rest.strip_prefix(TAG_OPEN))
                .is_some_and(|after| ident_len(after) > 0)
    }

    fn at_construct(&self) -> bool {
        match self.cursor.peek() {
            Some('{') => self.at_inline(),
            Some('<') => self.at_tag(),
            _ => false,
        }
    }

    // =========================================
    // Scanning: inline constructs
    // =========================================

    fn scan_inline(&mut self) -> Option<Token<'src>> {
        if self.at_variable() {
            return Some(self.scan_variable());
        }
        let name_len = self.call_name_len()?;
        Some(self.scan_call_start(name_len))
    }

    /// Scan `{$path.to.value}`.
    fn scan_variable(&mut self) -> Token<'src> {
        let mark = self.mark();
        self.cursor.advance_bytes(2);
        let path = self.cursor.eat_while(|c| is_ident_continue(c) || c == '.');

        if !self.cursor.eat('}') {
            return self.make_error(
                ParseErrorKind::UnterminatedTag,
                mark,
                format!("expected '}}' to close variable '${path}'"),
            );
        }
        if path.split('.').any(str::is_empty) {
            return self.make_error(
                ParseErrorKind::UnexpectedToken,
                mark,
                format!("malformed variable path '{path}'"),
            );
        }
        self.make_token(TokenKind::Var, mark)
    }

    /// Scan `{name(` and enter argument mode.
    fn scan_call_start(&mut self, name_len: usize) -> Token<'src> {
        let mark = self.mark();
        self.cursor.advance_bytes(name_len + 2);
        let token = self.make_token(TokenKind::CallStart, mark);
        self.modes.push(Mode::Args {
            depth: 0,
            state: ArgState::Start,
            open: token.span,
        });
        token
    }

    // =========================================
    // Scanning: text mode
    // =========================================

    fn scan_text_mode(&mut self) -> Token<'src> {
        if self.cursor.check_str(COMMENT_OPEN) {
            if let Some(error) = self.skip_comment() {
                return error;
            }
            return self.scan_token();
        }
        if let Some(token) = self.scan_inline() {
            return token;
        }
        if let Some(token) = self.scan_tag_open() {
            return token;
        }

        let mark = self.mark();
        loop {
            self.cursor.advance();
            if self.cursor.is_eof() || self.at_construct() {
                break;
            }
        }
        self.make_token(TokenKind::Text, mark)
    }

    /// Skip `<tpl:comment> ... </tpl:comment>` entirely.
    fn skip_comment(&mut self) -> Option<Token<'src>> {
        let mark = self.mark();
        self.cursor.advance_bytes(COMMENT_OPEN.len());

        match self.cursor.rest().find(COMMENT_CLOSE) {
            Some(index) => {
                self.cursor.advance_bytes(index + COMMENT_CLOSE.len());
                None
            }
            None => {
                let span = self.span_from(mark);
                self.cursor.advance_bytes(self.cursor.rest().len());
                self.errors.push(ParseError::new(
                    ParseErrorKind::UnclosedBlock,
                    span,
                    "<tpl:comment> is never closed",
                ));
                Some(Token::new(TokenKind::Error, "", span))
            }
        }
    }

    /// Scan `<tpl:name` (entering tag mode) or `</tpl:name>`.
    fn scan_tag_open(&mut self) -> Option<Token<'src>> {
        let rest = self.cursor.rest();

        if let Some(after) = rest.strip_prefix(TAG_CLOSE_OPEN) {
            let len = ident_len(after);
            if len == 0 {
                return None;
            }
            let mark = self.mark();
            self.cursor.advance_bytes(TAG_CLOSE_OPEN.len() + len);
            self.cursor.eat_while(|c| c.is_ascii_whitespace());
            if !self.cursor.eat('>') {
                return Some(self.make_error(
                    ParseErrorKind::UnterminatedTag,
                    mark,
                    "expected '>' to end the closing tag",
                ));
            }
            return Some(self.make_token(TokenKind::TagClose, mark));
        }

        let after = rest.strip_prefix(TAG_OPEN)?;
        let len = ident_len(after);
        if len == 0 {
            return None;
        }
        let mark = self.mark();
        self.cursor.advance_bytes(TAG_OPEN.len() + len);
        let token = self.make_token(TokenKind::TagStart, mark);
        self.modes.push(Mode::Tag { open: token.span });
        Some(token)
    }

    // =========================================
    // Scanning: argument lists
    // =========================================

    fn scan_args_mode(&mut self, depth: u32, state: ArgState) -> Token<'src> {
        if state != ArgState::Inside {
            if let Some(token) = self.scan_argument_start(state) {
                return token;
            }
            self.set_args(depth, ArgState::Inside);
        }

        match self.cursor.peek() {
            Some(',') if depth == 0 => {
                let mark = self.mark();
                self.cursor.advance();
                self.set_args(0, ArgState::Start);
                self.make_token(TokenKind::Comma, mark)
            }
            Some(')') if depth == 0 => {
                let mark = self.mark();
                self.cursor.advance();
                if self.cursor.eat('}') {
                    self.modes.pop();
                    self.make_token(TokenKind::CallEnd, mark)
                } else {
                    self.make_error(
                        ParseErrorKind::MalformedArguments,
                        mark,
                        "unbalanced ')' in argument list",
                    )
                }
            }
            _ => match self.scan_inline() {
                Some(token) => token,
                None => self.scan_argument_text(depth),
            },
        }
    }

    /// At the start of an argument: a quote opens a quoted argument and
    /// `key=` names it. Leading whitespace before either is dropped.
    fn scan_argument_start(&mut self, state: ArgState) -> Option<Token<'src>> {
        let rest = self.cursor.rest();
        let trimmed = rest.trim_start();
        let ws = rest.len() - trimmed.len();

        if let Some(quote @ ('"' | '\'')) = trimmed.chars().next() {
            self.cursor.advance_bytes(ws);
            let mark = self.mark();
            self.cursor.advance();
            let token = self.make_token(TokenKind::QuoteOpen, mark);
            self.set_args(0, ArgState::Inside);
            self.modes.push(Mode::Quoted {
                quote,
                open: token.span,
            });
            return Some(token);
        }

        if state == ArgState::Start {
            let len = ident_len(trimmed);
            let after = &trimmed[len..];
            if len > 0 && after.starts_with('=') && !after.starts_with("==") {
                let mark = self.mark();
                self.cursor.advance_bytes(ws + len + 1);
                self.set_args(0, ArgState::Value);
                return Some(self.make_token(TokenKind::NamedArg, mark));
            }
        }
        None
    }

    /// Unquoted argument text. Parentheses inside it are balanced and kept.
    fn scan_argument_text(&mut self, depth: u32) -> Token<'src> {
        let mark = self.mark();
        let mut depth = depth;
        loop {
            match self.cursor.peek() {
                None => break,
                Some(',' | ')') if depth == 0 => break,
                Some('(') => depth += 1,
                Some(')') => depth -= 1,
                Some('{') if self.at_inline() => break,
                _ => {}
            }
            self.cursor.advance();
        }
        self.set_args(depth, ArgState::Inside);
        self.make_token(TokenKind::Text, mark)
    }

    // =========================================
    // Scanning: quoted content
    // =========================================

    fn scan_quoted_mode(&mut self, quote: char) -> Token<'src> {
        if self.cursor.peek() == Some(quote) {
            let mark = self.mark();
            self.cursor.advance();
            self.modes.pop();
            return self.make_token(TokenKind::QuoteClose, mark);
        }
        if let Some(token) = self.scan_inline() {
            return token;
        }

        let mark = self.mark();
        loop {
            match self.cursor.peek() {
                None => break,
                Some(c) if c == quote => break,
                Some('\\') => {
                    self.cursor.advance();
                }
                Some('{') if self.at_inline() => break,
                _ => {}
            }
            self.cursor.advance();
        }
        self.make_token(TokenKind::Text, mark)
    }

    // =========================================
    // Scanning: block tags
    // =========================================

    fn scan_tag_mode(&mut self) -> Token<'src> {
        self.cursor.eat_while(char::is_whitespace);
        if self.cursor.is_eof() {
            return self.finish();
        }

        let mark = self.mark();
        if self.cursor.check_str("/>") {
            self.cursor.advance_bytes(2);
            self.modes.pop();
            return self.make_token(TokenKind::TagSelfClose, mark);
        }
        if self.cursor.eat('>') {
            self.modes.pop();
            return self.make_token(TokenKind::TagEnd, mark);
        }

        let len = ident_len(self.cursor.rest());
        if len > 0 {
            self.cursor.advance_bytes(len);
            if self.cursor.check_str("=\"") {
                self.cursor.advance_bytes(2);
                let token = self.make_token(TokenKind::Attr, mark);
                self.modes.push(Mode::Quoted {
                    quote: '"',
                    open: token.span,
                });
                return token;
            }
            return self.make_error(
                ParseErrorKind::InvalidAttribute,
                mark,
                "attribute values must be written as name=\"value\"",
            );
        }

        self.cursor.advance();
        let found = self.cursor.slice_from(mark.offset);
        self.make_error(
            ParseErrorKind::UnexpectedToken,
            mark,
            format!("unexpected '{found}' inside block tag"),
        )
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token<'src>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        (token.kind != TokenKind::Eof).then_some(token)
    }
}
