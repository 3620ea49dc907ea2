//! Compile-time phrase inlining.
//!
//! `{phrase(name, param=value)}` is replaced by the phrase text effective at
//! the compiler's language position. `{param}` placeholders in the text are
//! replaced by the compiled named argument; `{1}`, `{2}`... take the
//! positional arguments after the name. Placeholders with no matching
//! argument stay verbatim. A name that does not resolve is emitted as-is.

use vellum_core::{CompileError, Escape, EscapeContext};
use vellum_parser::CallSegment;

use super::{arg, expect_args};
use crate::code::Code;
use crate::compiler::TemplateCompiler;

type Result<T> = std::result::Result<T, CompileError>;

/// A piece of phrase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece<'a> {
    Text(&'a str),
    /// `{name}`, holding `name`.
    Param(&'a str),
}

/// Split phrase text at `{name}` placeholders.
fn pieces(text: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut rest = text;
    let mut literal_start = 0;
    let mut offset = 0;

    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let len = after
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
            .count();
        let at = offset + open;
        if len > 0 && after.as_bytes().get(len) == Some(&b'}') {
            if at > literal_start {
                pieces.push(Piece::Text(&text[literal_start..at]));
            }
            pieces.push(Piece::Param(&after[..len]));
            literal_start = at + len + 2;
            offset = literal_start;
            rest = &text[offset..];
        } else {
            offset = at + 1;
            rest = &text[offset..];
        }
    }
    if literal_start < text.len() {
        pieces.push(Piece::Text(&text[literal_start..]));
    }
    pieces
}

/// `{phrase(name, ...)}`
pub(crate) fn compile_phrase(
    compiler: &mut TemplateCompiler<'_>,
    call: &CallSegment,
    escape: EscapeContext,
) -> Result<Code> {
    expect_args(call, 1, None)?;
    let name_arg = arg(call, 0)?;
    let name = name_arg
        .literal_text()
        .ok_or(CompileError::NonLiteralPhraseName {
            span: name_arg.span,
        })?;
    let name = name.trim();
    if name.is_empty() {
        return Err(CompileError::InvalidArgument {
            function: call.name.clone(),
            message: "the phrase name is empty".into(),
            span: name_arg.span,
        });
    }

    compiler.record_phrase(name);
    let language = compiler.context().language;
    let Some(text) = compiler.env().phrase(name, language) else {
        return Ok(Code::text(name));
    };

    let mut parts = Vec::new();
    for piece in pieces(&text) {
        match piece {
            Piece::Text(text) => parts.push(Code::text(text)),
            Piece::Param(param) => {
                let argument = match param.parse::<usize>() {
                    Ok(index) if index > 0 => call.arg(index),
                    Ok(_) => None,
                    Err(_) => call.named(param),
                };
                match argument {
                    Some(argument) => parts.push(compiler.compile_argument(argument, escape)?),
                    None => parts.push(Code::text(format!("{{{param}}}"))),
                }
            }
        }
    }
    Ok(Code::concat(parts))
}

/// Compile phrase text into a standalone artifact. Placeholders read the
/// data context and are HTML-escaped.
pub fn compile_phrase_text(text: &str) -> Code {
    Code::concat(pieces(text).into_iter().map(|piece| match piece {
        Piece::Text(text) => Code::text(text),
        Piece::Param(param) => Code::escape(Escape::Html, Code::var([param])),
    }))
}
