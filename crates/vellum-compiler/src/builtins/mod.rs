//! Built-in template functions.
//!
//! Each built-in is a plain function with the [`FunctionCompiler`]
//! signature, grouped by concern:
//!
//! - [`control`]: `if`, `checked`, `selected`, `calc`
//! - [`escaping`]: `escape`, `raw`, `urlencode`, `jsescape`
//! - [`format`]: `count`, `number`, `date`, `time`, `datetime`
//! - [`links`]: `link`, `pagenav`, `helper`
//! - [`phrase`]: compile-time phrase inlining
//!
//! [`FunctionCompiler`]: crate::registry::FunctionCompiler

mod control;
mod escaping;
mod format;
mod links;
mod phrase;

pub use phrase::compile_phrase_text;

use vellum_core::{CompileError, EscapeContext};
use vellum_parser::{Argument, CallSegment};

use crate::code::Code;
use crate::compiler::TemplateCompiler;
use crate::registry::FunctionRegistry;

type Result<T> = std::result::Result<T, CompileError>;

pub(crate) fn register_all(registry: &mut FunctionRegistry) {
    registry.register("if", control::compile_if);
    registry.register("checked", control::compile_checked);
    registry.register("selected", control::compile_selected);
    registry.register("calc", control::compile_calc);

    registry.register("escape", escaping::compile_escape);
    registry.register("raw", escaping::compile_raw);
    registry.register("urlencode", escaping::compile_urlencode);
    registry.register("jsescape", escaping::compile_jsescape);

    registry.register("count", format::compile_count);
    registry.register("number", format::compile_number);
    registry.register("date", format::compile_date);
    registry.register("time", format::compile_time);
    registry.register("datetime", format::compile_datetime);

    registry.register("link", links::compile_link);
    registry.register("pagenav", links::compile_pagenav);
    registry.register("helper", links::compile_helper);

    registry.register("phrase", phrase::compile_phrase);
}

// ============================================================================
// Argument helpers
// ============================================================================

/// Check the positional argument count against `min..=max` (`None` is
/// unbounded).
pub(crate) fn expect_args(call: &CallSegment, min: usize, max: Option<usize>) -> Result<()> {
    let got = call.args.len();
    if got >= min && max.is_none_or(|max| got <= max) {
        return Ok(());
    }
    let expected = match max {
        Some(max) if max == min => format!("{min}"),
        Some(max) => format!("{min} to {max}"),
        None => format!("at least {min}"),
    };
    Err(CompileError::ArgumentCount {
        function: call.name.clone(),
        expected,
        got,
        span: call.span,
    })
}

/// A positional argument that [`expect_args`] already guaranteed.
pub(crate) fn arg(call: &CallSegment, index: usize) -> Result<&Argument> {
    call.arg(index).ok_or_else(|| CompileError::ArgumentCount {
        function: call.name.clone(),
        expected: format!("at least {}", index + 1),
        got: call.args.len(),
        span: call.span,
    })
}

/// Compile an optional positional argument raw.
pub(crate) fn optional_raw(
    compiler: &mut TemplateCompiler<'_>,
    call: &CallSegment,
    index: usize,
) -> Result<Option<Box<Code>>> {
    call.arg(index)
        .map(|argument| {
            compiler
                .compile_argument(argument, EscapeContext::RAW)
                .map(Box::new)
        })
        .transpose()
}

/// Compile every named argument not in `skip` raw, in source order.
pub(crate) fn named_raw(
    compiler: &mut TemplateCompiler<'_>,
    call: &CallSegment,
    skip: &[&str],
) -> Result<Vec<(String, Code)>> {
    let mut params = Vec::with_capacity(call.named.len());
    for (name, argument) in &call.named {
        if skip.contains(&name.as_str()) {
            continue;
        }
        params.push((name.clone(), compiler.compile_argument(argument, EscapeContext::RAW)?));
    }
    Ok(params)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::context::{CompileContext, SimpleEnv};
    use vellum_core::PositionId;
    use vellum_parser::Parser;

    /// Compile `source` as a root template against `env`.
    pub fn compile_in(env: &SimpleEnv, source: &str) -> Result<Code> {
        let template = Parser::parse(source)?;
        let registry = FunctionRegistry::with_builtins();
        let mut compiler = TemplateCompiler::new(
            env,
            &registry,
            CompileContext::new(PositionId::ROOT, PositionId::ROOT),
        );
        compiler.compile_segments(&template.segments, EscapeContext::HTML)
    }

    pub fn compile(source: &str) -> Result<Code> {
        compile_in(&SimpleEnv::new(), source)
    }
}
