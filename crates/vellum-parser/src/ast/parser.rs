//! Parser infrastructure for template source.
//!
//! Provides the [`Parser`] struct with token navigation and the recursive
//! descent over text, inline calls and block tags.

use crate::ast::segment::{Argument, Branch, CallSegment, Segment, Template};
use crate::lexer::{Lexer, Token, TokenKind};
use indexmap::IndexMap;
use vellum_core::{ParseError, ParseErrorKind, ParseErrors, Span};

/// The parser for template source.
///
/// The whole source is tokenized up front. Lexical errors are reported
/// together; structural errors stop the parse at the first one.
pub struct Parser<'src> {
    tokens: Vec<Token<'src>>,
    position: usize,
}

type Attributes = IndexMap<String, Argument>;

impl<'src> Parser<'src> {
    /// Parse a complete template.
    ///
    /// Pure: identical input yields an identical tree.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn parse(source: &'src str) -> Result<Template, ParseErrors> {
        let (tokens, lexer_errors) = Lexer::tokenize(source);
        if !lexer_errors.is_empty() {
            let mut errors = ParseErrors::new();
            for error in lexer_errors {
                errors.push(error);
            }
            return Err(errors);
        }

        let mut parser = Parser {
            tokens,
            position: 0,
        };
        parser.parse_template().map_err(ParseErrors::from)
    }

    // ========================================================================
    // Token Navigation
    // ========================================================================

    fn peek(&self) -> Token<'src> {
        let index = self.position.min(self.tokens.len().saturating_sub(1));
        self.tokens[index]
    }

    fn advance(&mut self) -> Token<'src> {
        let token = self.peek();
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token<'src>> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token<'src>, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let token = self.peek();
            Err(ParseError::unexpected_token(
                token.span,
                token.kind.description(),
                kind.description(),
            ))
        }
    }

    // ========================================================================
    // Template and bodies
    // ========================================================================

    fn parse_template(&mut self) -> Result<Template, ParseError> {
        let segments = self.parse_body()?;
        let token = self.peek();
        match token.kind {
            TokenKind::Eof => Ok(Template::new(segments)),
            TokenKind::TagClose => Err(ParseError::new(
                ParseErrorKind::UnmatchedBlock,
                token.span,
                format!("{} has no matching opening tag", token.lexeme),
            )),
            _ => Err(ParseError::new(
                ParseErrorKind::UnmatchedBlock,
                token.span,
                format!("<tpl:{}> outside of <tpl:if>", tag_name(&token)),
            )),
        }
    }

    /// Parse segments until end of input, a closing tag, or an
    /// `elseif`/`else` tag belonging to an enclosing if block.
    fn parse_body(&mut self) -> Result<Vec<Segment>, ParseError> {
        let mut segments = Vec::new();
        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::Eof | TokenKind::TagClose => break,
                TokenKind::TagStart if matches!(tag_name(&token), "elseif" | "else") => break,
                TokenKind::Text => {
                    self.advance();
                    push_literal(&mut segments, token.lexeme.to_string(), token.span);
                }
                TokenKind::Var => {
                    self.advance();
                    segments.push(variable(&token));
                }
                TokenKind::CallStart => segments.push(Segment::Call(self.parse_call()?)),
                TokenKind::TagStart => segments.push(self.parse_block()?),
                _ => {
                    return Err(ParseError::unexpected_token(
                        token.span,
                        token.kind.description(),
                        "text, a variable, a function call or a block tag",
                    ));
                }
            }
        }
        Ok(segments)
    }

    // ========================================================================
    // Function calls
    // ========================================================================

    /// Parse `{name(arg, arg, key=value)}`.
    fn parse_call(&mut self) -> Result<CallSegment, ParseError> {
        let start = self.expect(TokenKind::CallStart)?;
        let name = start.lexeme[1..start.lexeme.len() - 1].to_string();

        let mut args = Vec::new();
        let mut named = IndexMap::new();
        let end = loop {
            let (key, argument) = self.parse_argument()?;
            match key {
                Some(key) => {
                    named.insert(key, argument);
                }
                None => args.push(argument),
            }

            let token = self.advance();
            match token.kind {
                TokenKind::Comma => continue,
                TokenKind::CallEnd => break token.span,
                _ => {
                    return Err(ParseError::new(
                        ParseErrorKind::MalformedArguments,
                        token.span,
                        format!(
                            "expected ',' or ')}}' in call to '{name}', found {}",
                            token.kind
                        ),
                    ));
                }
            }
        };

        // `{name()}` and `{name( )}` take no arguments
        if args.len() == 1 && named.is_empty() && args[0].is_empty() && !args[0].quoted {
            args.clear();
        }
        if args.len() + named.len() > 1 {
            if let Some(empty) = args.iter().find(|arg| arg.is_empty() && !arg.quoted) {
                return Err(ParseError::new(
                    ParseErrorKind::MalformedArguments,
                    empty.span,
                    format!("empty argument in call to '{name}'"),
                ));
            }
        }

        Ok(CallSegment {
            name,
            args,
            named,
            span: start.span.merge(end),
        })
    }

    /// Parse one argument, with its name if it is a named argument.
    fn parse_argument(&mut self) -> Result<(Option<String>, Argument), ParseError> {
        let start = self.peek().span;
        let key = self
            .eat(TokenKind::NamedArg)
            .map(|token| token.lexeme.trim().trim_end_matches('=').to_string());

        if let Some(open) = self.eat(TokenKind::QuoteOpen) {
            let quote = open.lexeme.chars().next().unwrap_or('"');
            let (segments, close) = self.parse_quoted(quote)?;
            while let Some(trailing) = self.eat(TokenKind::Text) {
                if !trailing.lexeme.trim().is_empty() {
                    return Err(ParseError::new(
                        ParseErrorKind::MalformedArguments,
                        trailing.span,
                        "unexpected text after a quoted argument",
                    ));
                }
            }
            return Ok((key, Argument::new(segments, open.span.merge(close), true)));
        }

        let mut segments = Vec::new();
        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::Comma | TokenKind::CallEnd => break,
                TokenKind::Text => {
                    self.advance();
                    push_literal(&mut segments, token.lexeme.to_string(), token.span);
                }
                TokenKind::Var => {
                    self.advance();
                    segments.push(variable(&token));
                }
                TokenKind::CallStart => segments.push(Segment::Call(self.parse_call()?)),
                _ => {
                    return Err(ParseError::new(
                        ParseErrorKind::MalformedArguments,
                        token.span,
                        format!("unexpected {} in argument list", token.kind),
                    ));
                }
            }
        }
        trim_literals(&mut segments);

        let span = match (segments.first(), segments.last()) {
            (Some(first), Some(last)) => first.span().merge(last.span()),
            _ => Span::point(start.offset, start.line, start.col),
        };
        Ok((key, Argument::new(segments, span, false)))
    }

    /// Parse quoted content up to and including the closing quote.
    fn parse_quoted(&mut self, quote: char) -> Result<(Vec<Segment>, Span), ParseError> {
        let mut segments = Vec::new();
        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::QuoteClose => {
                    self.advance();
                    return Ok((segments, token.span));
                }
                TokenKind::Text => {
                    self.advance();
                    push_literal(&mut segments, unescape(token.lexeme, quote), token.span);
                }
                TokenKind::Var => {
                    self.advance();
                    segments.push(variable(&token));
                }
                TokenKind::CallStart => segments.push(Segment::Call(self.parse_call()?)),
                _ => {
                    return Err(ParseError::new(
                        ParseErrorKind::UnterminatedString,
                        token.span,
                        format!("expected closing {quote}"),
                    ));
                }
            }
        }
    }

    // ========================================================================
    // Block tags
    // ========================================================================

    fn parse_block(&mut self) -> Result<Segment, ParseError> {
        let open = self.expect(TokenKind::TagStart)?;
        let (attrs, end) = self.parse_attributes()?;
        match tag_name(&open) {
            "if" => self.parse_if(&open, attrs, &end),
            "foreach" => self.parse_foreach(&open, attrs, &end),
            "include" => parse_include(&open, attrs, &end),
            other => Err(ParseError::new(
                ParseErrorKind::UnknownTag,
                open.span,
                format!("unknown block tag <tpl:{other}>"),
            )),
        }
    }

    /// Parse `name="value"` pairs up to `>` or `/>`.
    fn parse_attributes(&mut self) -> Result<(Attributes, Token<'src>), ParseError> {
        let mut attrs = Attributes::new();
        loop {
            let token = self.advance();
            match token.kind {
                TokenKind::Attr => {
                    let name = token.lexeme.trim_end_matches("=\"").to_string();
                    let (segments, close) = self.parse_quoted('"')?;
                    attrs.insert(name, Argument::new(segments, token.span.merge(close), true));
                }
                TokenKind::TagEnd | TokenKind::TagSelfClose => return Ok((attrs, token)),
                _ => {
                    return Err(ParseError::unexpected_token(
                        token.span,
                        token.kind.description(),
                        "an attribute, '>' or '/>'",
                    ));
                }
            }
        }
    }

    fn parse_if(
        &mut self,
        open: &Token<'src>,
        mut attrs: Attributes,
        end: &Token<'src>,
    ) -> Result<Segment, ParseError> {
        expect_open_tag(open, end)?;
        let condition = take_required(open, &mut attrs, "is")?;
        reject_extra(open, &attrs)?;

        let mut branches = Vec::new();
        let mut otherwise = None;
        let mut pending = Some((condition, open.span));
        let mut seen_else = false;

        loop {
            let body = self.parse_body()?;
            match pending.take() {
                Some((condition, span)) => branches.push(Branch {
                    condition,
                    body,
                    span,
                }),
                None => otherwise = Some(body),
            }

            let token = self.peek();
            match token.kind {
                TokenKind::TagClose => {
                    self.advance();
                    check_closing(open, &token)?;
                    return Ok(Segment::If {
                        branches,
                        otherwise,
                        span: open.span.merge(token.span),
                    });
                }
                TokenKind::TagStart => {
                    self.advance();
                    let tag = tag_name(&token);
                    let (mut attrs, end) = self.parse_attributes()?;
                    expect_self_closing(&token, &end)?;
                    if seen_else {
                        return Err(ParseError::new(
                            ParseErrorKind::UnexpectedToken,
                            token.span,
                            format!("<tpl:{tag}> after <tpl:else>"),
                        ));
                    }
                    if tag == "elseif" {
                        let condition = take_required(&token, &mut attrs, "is")?;
                        pending = Some((condition, token.span));
                    } else {
                        seen_else = true;
                    }
                    reject_extra(&token, &attrs)?;
                }
                TokenKind::Eof => return Err(unclosed(open)),
                _ => {
                    return Err(ParseError::unexpected_token(
                        token.span,
                        token.kind.description(),
                        "</tpl:if>",
                    ));
                }
            }
        }
    }

    fn parse_foreach(
        &mut self,
        open: &Token<'src>,
        mut attrs: Attributes,
        end: &Token<'src>,
    ) -> Result<Segment, ParseError> {
        expect_open_tag(open, end)?;
        let source = take_required(open, &mut attrs, "loop")?;
        let value = take_required(open, &mut attrs, "value")?;
        let value = loop_variable(&value)?;
        let key = match attrs.shift_remove("key") {
            Some(key) => Some(loop_variable(&key)?),
            None => None,
        };
        reject_extra(open, &attrs)?;

        let body = self.parse_body()?;
        let token = self.advance();
        match token.kind {
            TokenKind::TagClose => {
                check_closing(open, &token)?;
                Ok(Segment::Foreach {
                    source,
                    value,
                    key,
                    body,
                    span: open.span.merge(token.span),
                })
            }
            TokenKind::Eof => Err(unclosed(open)),
            _ => Err(ParseError::new(
                ParseErrorKind::UnmatchedBlock,
                token.span,
                format!("<tpl:{}> outside of <tpl:if>", tag_name(&token)),
            )),
        }
    }
}

fn parse_include(
    open: &Token<'_>,
    mut attrs: Attributes,
    end: &Token<'_>,
) -> Result<Segment, ParseError> {
    expect_self_closing(open, end)?;
    let template = take_required(open, &mut attrs, "template")?;
    reject_extra(open, &attrs)?;

    match template.literal_text() {
        Some(name) if !name.trim().is_empty() => Ok(Segment::Include {
            name: name.trim().to_string(),
            span: open.span.merge(end.span),
        }),
        _ => Err(ParseError::new(
            ParseErrorKind::InvalidAttribute,
            template.span,
            "the included template name must be literal text",
        )),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Name of a block tag from its `<tpl:name` or `</tpl:name>` token.
fn tag_name<'a>(token: &Token<'a>) -> &'a str {
    match token.kind {
        TokenKind::TagStart => token.lexeme.strip_prefix("<tpl:").unwrap_or(token.lexeme),
        TokenKind::TagClose => token
            .lexeme
            .strip_prefix("</tpl:")
            .unwrap_or(token.lexeme)
            .trim_end_matches('>')
            .trim_end(),
        _ => "",
    }
}

fn variable(token: &Token<'_>) -> Segment {
    let path = &token.lexeme[2..token.lexeme.len() - 1];
    Segment::Variable {
        path: path.split('.').map(str::to_string).collect(),
        span: token.span,
    }
}

/// Append literal text, merging with a preceding literal.
fn push_literal(segments: &mut Vec<Segment>, text: String, span: Span) {
    if let Some(Segment::Literal {
        text: previous,
        span: previous_span,
    }) = segments.last_mut()
    {
        previous.push_str(&text);
        *previous_span = previous_span.merge(span);
        return;
    }
    segments.push(Segment::Literal { text, span });
}

/// Trim whitespace around an unquoted argument.
fn trim_literals(segments: &mut Vec<Segment>) {
    if let Some(Segment::Literal { text, span }) = segments.first_mut() {
        let trimmed = text.trim_start();
        let removed = &text[..text.len() - trimmed.len()];
        *span = advance_span(*span, removed);
        *text = trimmed.to_string();
    }
    if let Some(Segment::Literal { text, span }) = segments.last_mut() {
        let trimmed_len = text.trim_end().len();
        span.len -= (text.len() - trimmed_len) as u32;
        text.truncate(trimmed_len);
    }
    segments.retain(|segment| !matches!(segment, Segment::Literal { text, .. } if text.is_empty()));
}

/// Move the start of a span past `removed`.
fn advance_span(span: Span, removed: &str) -> Span {
    let bytes = removed.len() as u32;
    let (line, col) = match removed.rfind('\n') {
        Some(index) => (
            span.line + removed.matches('\n').count() as u32,
            (removed.len() - index) as u32,
        ),
        None => (span.line, span.col + bytes),
    };
    Span::new(span.offset + bytes, line, col, span.len - bytes)
}

/// Undo `\"`, `\'` and `\\` escapes inside quoted content.
fn unescape(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(&next) = chars.peek() {
                if next == quote || next == '\\' || next == '"' || next == '\'' {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(ch);
    }
    out
}

fn take_required(
    open: &Token<'_>,
    attrs: &mut Attributes,
    name: &str,
) -> Result<Argument, ParseError> {
    attrs.shift_remove(name).ok_or_else(|| {
        ParseError::new(
            ParseErrorKind::MissingAttribute,
            open.span,
            format!("<tpl:{}> requires the '{name}' attribute", tag_name(open)),
        )
    })
}

fn reject_extra(open: &Token<'_>, attrs: &Attributes) -> Result<(), ParseError> {
    match attrs.iter().next() {
        Some((name, value)) => Err(ParseError::new(
            ParseErrorKind::InvalidAttribute,
            value.span,
            format!("<tpl:{}> has no '{name}' attribute", tag_name(open)),
        )),
        None => Ok(()),
    }
}

/// `value="$item"` or `value="item"`.
fn loop_variable(attr: &Argument) -> Result<String, ParseError> {
    let invalid = || {
        ParseError::new(
            ParseErrorKind::InvalidAttribute,
            attr.span,
            "loop variables must be written as $name",
        )
    };
    let text = attr.literal_text().ok_or_else(invalid)?;
    let name = text.trim();
    let name = name.strip_prefix('$').unwrap_or(name);
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name.to_string())
    } else {
        Err(invalid())
    }
}

fn expect_open_tag(open: &Token<'_>, end: &Token<'_>) -> Result<(), ParseError> {
    if end.kind == TokenKind::TagSelfClose {
        return Err(ParseError::new(
            ParseErrorKind::UnexpectedToken,
            end.span,
            format!("<tpl:{}> cannot be self-closing", tag_name(open)),
        ));
    }
    Ok(())
}

fn expect_self_closing(open: &Token<'_>, end: &Token<'_>) -> Result<(), ParseError> {
    if end.kind != TokenKind::TagSelfClose {
        return Err(ParseError::new(
            ParseErrorKind::UnexpectedToken,
            end.span,
            format!("<tpl:{}> must be self-closing", tag_name(open)),
        ));
    }
    Ok(())
}

fn check_closing(open: &Token<'_>, close: &Token<'_>) -> Result<(), ParseError> {
    let expected = tag_name(open);
    let found = tag_name(close);
    if expected == found {
        Ok(())
    } else {
        Err(ParseError::new(
            ParseErrorKind::UnmatchedBlock,
            close.span,
            format!("expected </tpl:{expected}>, found </tpl:{found}>"),
        ))
    }
}

fn unclosed(open: &Token<'_>) -> ParseError {
    ParseError::new(
        ParseErrorKind::UnclosedBlock,
        open.span,
        format!("<tpl:{}> is never closed", tag_name(open)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Template {
        match Parser::parse(source) {
            Ok(template) => template,
            Err(errors) => panic!("parse failed: {errors}"),
        }
    }

    fn parse_error(source: &str) -> ParseError {
        match Parser::parse(source) {
            Ok(template) => panic!("expected an error, got {template:?}"),
            Err(errors) => errors.first().cloned().expect("at least one error"),
        }
    }

    fn call(segment: &Segment) -> &CallSegment {
        match segment {
            Segment::Call(call) => call,
            other => panic!("expected a call, got {other:?}"),
        }
    }

    #[test]
    fn text_and_variables() {
        let template = parse("Hello {$user.name}!");
        assert_eq!(template.segments.len(), 3);
        assert_eq!(template.segments[0].as_literal(), Some("Hello "));
        match &template.segments[1] {
            Segment::Variable { path, span } => {
                assert_eq!(path, &["user", "name"]);
                assert_eq!(span.offset, 6);
            }
            other => panic!("expected a variable, got {other:?}"),
        }
    }

    #[test]
    fn parsing_is_pure() {
        let source = r#"<tpl:if is="{$a}">{phrase(hi, name={$n})}<tpl:else />x</tpl:if>"#;
        assert_eq!(parse(source), parse(source));
    }

    #[test]
    fn call_arguments_are_trimmed_and_named() {
        let template = parse("{link( forum , {$f}, page=2, page=3, id={$x})}");
        let call = call(&template.segments[0]);
        assert_eq!(call.name, "link");
        assert_eq!(call.args.len(), 2);
        assert_eq!(call.args[0].literal_text().as_deref(), Some("forum"));
        assert_eq!(call.args[1].segments.len(), 1);
        assert_eq!(call.named.len(), 2);
        assert_eq!(call.named["page"].literal_text().as_deref(), Some("3"));
        assert!(matches!(call.named["id"].segments[0], Segment::Variable { .. }));
    }

    #[test]
    fn positional_after_named_argument() {
        let template = parse("{f(a=1, page = 2)}");
        let call = call(&template.segments[0]);
        assert_eq!(call.args.len(), 1);
        assert_eq!(call.args[0].literal_text().as_deref(), Some("page = 2"));
    }

    #[test]
    fn quoted_arguments() {
        let template = parse(r#"{phrase('it\'s', label="a, \"b\" {$c}")}"#);
        let call = call(&template.segments[0]);
        assert!(call.args[0].quoted);
        assert_eq!(call.args[0].literal_text().as_deref(), Some("it's"));
        let label = &call.named["label"];
        assert_eq!(label.segments[0].as_literal(), Some("a, \"b\" "));
        assert!(matches!(label.segments[1], Segment::Variable { .. }));
    }

    #[test]
    fn nested_calls() {
        let template = parse("{number({calc({$a} * 2)}, 1)}");
        let outer = call(&template.segments[0]);
        assert_eq!(outer.args.len(), 2);
        let inner = call(&outer.args[0].segments[0]);
        assert_eq!(inner.name, "calc");
        assert_eq!(inner.args[0].segments.len(), 2);
    }

    #[test]
    fn empty_argument_lists() {
        let template = parse("{now()}{now( )}{now('')}");
        assert!(call(&template.segments[0]).args.is_empty());
        assert!(call(&template.segments[1]).args.is_empty());
        assert_eq!(call(&template.segments[2]).args.len(), 1);
    }

    #[test]
    fn empty_argument_between_commas() {
        let error = parse_error("{f(a,,b)}");
        assert_eq!(error.kind, ParseErrorKind::MalformedArguments);
    }

    #[test]
    fn if_elseif_else() {
        let template = parse(
            r#"<tpl:if is="{$a}">A<tpl:elseif is="{$b}" />B<tpl:else />C</tpl:if>"#,
        );
        match &template.segments[0] {
            Segment::If {
                branches,
                otherwise,
                ..
            } => {
                assert_eq!(branches.len(), 2);
                assert_eq!(branches[1].body[0].as_literal(), Some("B"));
                assert_eq!(otherwise.as_ref().map(|b| b.len()), Some(1));
            }
            other => panic!("expected an if block, got {other:?}"),
        }
    }

    #[test]
    fn foreach_with_key() {
        let source = concat!(
            r#"<tpl:foreach loop="{$items}" value="$item" key="$i">"#,
            r#"{$i}={$item.name}</tpl:foreach>"#,
        );
        let template = parse(source);
        match &template.segments[0] {
            Segment::Foreach {
                value, key, body, ..
            } => {
                assert_eq!(value, "item");
                assert_eq!(key.as_deref(), Some("i"));
                assert_eq!(body.len(), 3);
            }
            other => panic!("expected a foreach block, got {other:?}"),
        }
    }

    #[test]
    fn include_and_comment() {
        let template =
            parse(r#"a<tpl:comment>ignored</tpl:comment>b<tpl:include template="footer" />"#);
        assert_eq!(template.segments[0].as_literal(), Some("ab"));
        assert_eq!(template.include_names(), vec!["footer"]);
    }

    #[test]
    fn include_name_must_be_literal() {
        let error = parse_error(r#"<tpl:include template="{$name}" />"#);
        assert_eq!(error.kind, ParseErrorKind::InvalidAttribute);
    }

    #[test]
    fn block_errors() {
        assert_eq!(
            parse_error("x</tpl:if>").kind,
            ParseErrorKind::UnmatchedBlock
        );
        assert_eq!(
            parse_error("<tpl:else />").kind,
            ParseErrorKind::UnmatchedBlock
        );
        assert_eq!(
            parse_error(r#"<tpl:if is="1">x"#).kind,
            ParseErrorKind::UnclosedBlock
        );
        assert_eq!(
            parse_error(r#"<tpl:if is="1">x</tpl:foreach>"#).kind,
            ParseErrorKind::UnmatchedBlock
        );
        assert_eq!(
            parse_error("<tpl:if>x</tpl:if>").kind,
            ParseErrorKind::MissingAttribute
        );
        assert_eq!(
            parse_error("<tpl:loop>x</tpl:loop>").kind,
            ParseErrorKind::UnknownTag
        );
        assert_eq!(
            parse_error(r#"<tpl:if is="1">a<tpl:else />b<tpl:else />c</tpl:if>"#).kind,
            ParseErrorKind::UnexpectedToken
        );
    }

    #[test]
    fn lexer_errors_carry_offsets() {
        let error = parse_error("Hello {$name");
        assert_eq!(error.kind, ParseErrorKind::UnterminatedTag);
        assert_eq!(error.span.offset, 6);

        let errors = Parser::parse("{$a {$b").unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn trimmed_argument_spans_point_at_text() {
        let template = parse("{calc(  1 + 2)}");
        let arg = &call(&template.segments[0]).args[0];
        assert_eq!(arg.segments[0].as_literal(), Some("1 + 2"));
        assert_eq!(arg.span.offset, 8);
        assert_eq!(arg.span.len, 5);
    }
}
