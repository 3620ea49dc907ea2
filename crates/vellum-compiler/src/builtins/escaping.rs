//! Functions that override the ambient escaping context.

use vellum_core::{CompileError, Escape, EscapeContext};
use vellum_parser::CallSegment;

use super::{arg, expect_args};
use crate::code::Code;
use crate::compiler::TemplateCompiler;

type Result<T> = std::result::Result<T, CompileError>;

/// `{escape(value[, mode])}`, HTML unless a literal mode name is given.
pub(crate) fn compile_escape(
    compiler: &mut TemplateCompiler<'_>,
    call: &CallSegment,
    _escape: EscapeContext,
) -> Result<Code> {
    expect_args(call, 1, Some(2))?;
    let mode = match call.arg(1) {
        None => Escape::Html,
        Some(argument) => {
            let name = argument.literal_text().ok_or_else(|| CompileError::InvalidArgument {
                function: call.name.clone(),
                message: "the escaping mode must be a literal".into(),
                span: argument.span,
            })?;
            Escape::from_name(&name).ok_or_else(|| CompileError::InvalidArgument {
                function: call.name.clone(),
                message: format!("unknown escaping mode '{name}'"),
                span: argument.span,
            })?
        }
    };
    forced(compiler, call, mode)
}

/// `{raw(value)}`
pub(crate) fn compile_raw(
    compiler: &mut TemplateCompiler<'_>,
    call: &CallSegment,
    _escape: EscapeContext,
) -> Result<Code> {
    expect_args(call, 1, Some(1))?;
    forced(compiler, call, Escape::Raw)
}

/// `{urlencode(value)}`
pub(crate) fn compile_urlencode(
    compiler: &mut TemplateCompiler<'_>,
    call: &CallSegment,
    _escape: EscapeContext,
) -> Result<Code> {
    expect_args(call, 1, Some(1))?;
    forced(compiler, call, Escape::Url)
}

/// `{jsescape(value)}`
pub(crate) fn compile_jsescape(
    compiler: &mut TemplateCompiler<'_>,
    call: &CallSegment,
    _escape: EscapeContext,
) -> Result<Code> {
    expect_args(call, 1, Some(1))?;
    forced(compiler, call, Escape::Js)
}

/// Compile the value raw, then apply exactly one escaping operation.
fn forced(compiler: &mut TemplateCompiler<'_>, call: &CallSegment, mode: Escape) -> Result<Code> {
    let value = compiler.compile_argument(arg(call, 0)?, EscapeContext::RAW)?;
    Ok(Code::escape(mode, value))
}
