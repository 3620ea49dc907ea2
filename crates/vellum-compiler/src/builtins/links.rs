//! `link`, `pagenav` and `helper`: calls whose result is produced by the
//! host at execution time.

use vellum_core::{CompileError, EscapeContext};
use vellum_parser::CallSegment;

use super::{arg, expect_args, named_raw, optional_raw};
use crate::code::Code;
use crate::compiler::TemplateCompiler;

type Result<T> = std::result::Result<T, CompileError>;

/// `{link(type[, data], param=value...)}`
pub(crate) fn compile_link(
    compiler: &mut TemplateCompiler<'_>,
    call: &CallSegment,
    escape: EscapeContext,
) -> Result<Code> {
    expect_args(call, 1, Some(2))?;
    let kind = compiler.compile_argument(arg(call, 0)?, EscapeContext::RAW)?;
    let data = optional_raw(compiler, call, 1)?;
    let params = named_raw(compiler, call, &[])?;
    let code = Code::Link {
        kind: Box::new(kind),
        data,
        params,
    };
    Ok(Code::escape(escape.mode(), code))
}

const PAGENAV_REQUIRED: [&str; 3] = ["page", "per_page", "total"];

/// `{pagenav(type, data, page=, per_page=, total=, ...)}`. The host emits
/// markup, so the result is not escaped.
pub(crate) fn compile_pagenav(
    compiler: &mut TemplateCompiler<'_>,
    call: &CallSegment,
    _escape: EscapeContext,
) -> Result<Code> {
    expect_args(call, 2, Some(2))?;
    let link = compiler.compile_argument(arg(call, 0)?, EscapeContext::RAW)?;
    let data = compiler.compile_argument(arg(call, 1)?, EscapeContext::RAW)?;

    let page = required_named(compiler, call, "page")?;
    let per_page = required_named(compiler, call, "per_page")?;
    let total = required_named(compiler, call, "total")?;
    let params = named_raw(compiler, call, &PAGENAV_REQUIRED)?;

    Ok(Code::PageNav {
        link: Box::new(link),
        data: Box::new(data),
        page,
        per_page,
        total,
        params,
    })
}

fn required_named(
    compiler: &mut TemplateCompiler<'_>,
    call: &CallSegment,
    name: &str,
) -> Result<Box<Code>> {
    let argument = call.named(name).ok_or_else(|| CompileError::InvalidArgument {
        function: call.name.clone(),
        message: format!("the named argument '{name}' is required"),
        span: call.span,
    })?;
    Ok(Box::new(compiler.compile_argument(argument, EscapeContext::RAW)?))
}

/// `{helper(name, args...)}`
pub(crate) fn compile_helper(
    compiler: &mut TemplateCompiler<'_>,
    call: &CallSegment,
    _escape: EscapeContext,
) -> Result<Code> {
    expect_args(call, 1, None)?;
    let name = compiler.compile_argument(arg(call, 0)?, EscapeContext::RAW)?;
    let mut args = Vec::with_capacity(call.args.len() - 1);
    for argument in &call.args[1..] {
        args.push(compiler.compile_argument(argument, EscapeContext::RAW)?);
    }
    Ok(Code::Helper {
        name: Box::new(name),
        args,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::compile;
    use super::*;
    use vellum_core::Escape;

    #[test]
    fn link_is_escaped_under_the_ambient_context() {
        let code = compile("<a href=\"{link(threads, {$thread}, page=2)}\">").unwrap();
        assert_eq!(
            code,
            Code::concat([
                Code::text("<a href=\""),
                Code::escape(
                    Escape::Html,
                    Code::Link {
                        kind: Box::new(Code::text("threads")),
                        data: Some(Box::new(Code::var(["thread"]))),
                        params: vec![("page".into(), Code::text("2"))],
                    }
                ),
                Code::text("\">"),
            ])
        );
    }

    #[test]
    fn pagenav_requires_paging_arguments() {
        let source =
            "{pagenav(forums, {$forum}, page={$page}, per_page=20, total={$total}, order=new)}";
        let code = compile(source).unwrap();
        match code {
            Code::PageNav {
                link,
                per_page,
                params,
                ..
            } => {
                assert_eq!(*link, Code::text("forums"));
                assert_eq!(*per_page, Code::text("20"));
                assert_eq!(params, vec![("order".to_string(), Code::text("new"))]);
            }
            other => panic!("unexpected code {other:?}"),
        }

        assert!(matches!(
            compile("{pagenav(forums, {$forum}, page=1, total=3)}"),
            Err(CompileError::InvalidArgument { ref message, .. }) if message.contains("per_page")
        ));
    }

    #[test]
    fn helper_args_are_raw() {
        assert_eq!(
            compile("{helper(avatar, {$user}, small)}").unwrap(),
            Code::Helper {
                name: Box::new(Code::text("avatar")),
                args: vec![Code::var(["user"]), Code::text("small")],
            }
        );
    }
}
