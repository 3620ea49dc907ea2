//! Locale formatting: `count`, `number`, `date`, `time`, `datetime`.
//!
//! The value and option are compiled raw; formatting happens at execution
//! time and the formatted text is escaped under the ambient context.

use vellum_core::{CompileError, EscapeContext};
use vellum_parser::CallSegment;

use super::{arg, expect_args, optional_raw};
use crate::code::{Code, FormatKind};
use crate::compiler::TemplateCompiler;

type Result<T> = std::result::Result<T, CompileError>;

fn format(
    compiler: &mut TemplateCompiler<'_>,
    call: &CallSegment,
    escape: EscapeContext,
    kind: FormatKind,
) -> Result<Code> {
    expect_args(call, 1, Some(2))?;
    let value = compiler.compile_argument(arg(call, 0)?, EscapeContext::RAW)?;
    let option = optional_raw(compiler, call, 1)?;
    let code = Code::Format {
        kind,
        value: Box::new(value),
        option,
    };
    Ok(Code::escape(escape.mode(), code))
}

pub(crate) fn compile_count(
    compiler: &mut TemplateCompiler<'_>,
    call: &CallSegment,
    escape: EscapeContext,
) -> Result<Code> {
    format(compiler, call, escape, FormatKind::Count)
}

pub(crate) fn compile_number(
    compiler: &mut TemplateCompiler<'_>,
    call: &CallSegment,
    escape: EscapeContext,
) -> Result<Code> {
    format(compiler, call, escape, FormatKind::Number)
}

pub(crate) fn compile_date(
    compiler: &mut TemplateCompiler<'_>,
    call: &CallSegment,
    escape: EscapeContext,
) -> Result<Code> {
    format(compiler, call, escape, FormatKind::Date)
}

pub(crate) fn compile_time(
    compiler: &mut TemplateCompiler<'_>,
    call: &CallSegment,
    escape: EscapeContext,
) -> Result<Code> {
    format(compiler, call, escape, FormatKind::Time)
}

pub(crate) fn compile_datetime(
    compiler: &mut TemplateCompiler<'_>,
    call: &CallSegment,
    escape: EscapeContext,
) -> Result<Code> {
    format(compiler, call, escape, FormatKind::DateTime)
}
