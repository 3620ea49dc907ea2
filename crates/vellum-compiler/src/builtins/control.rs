//! `if`, `checked`, `selected` and `calc`.

use vellum_core::{CompileError, EscapeContext, Value};
use vellum_parser::CallSegment;

use super::{arg, expect_args};
use crate::code::Code;
use crate::compiler::TemplateCompiler;

type Result<T> = std::result::Result<T, CompileError>;

/// `{if(cond, then[, else])}`
pub(crate) fn compile_if(
    compiler: &mut TemplateCompiler<'_>,
    call: &CallSegment,
    escape: EscapeContext,
) -> Result<Code> {
    expect_args(call, 2, Some(3))?;
    let test = compiler.compile_condition(arg(call, 0)?)?;
    let then = compiler.compile_argument(arg(call, 1)?, escape)?;
    let otherwise = match call.arg(2) {
        Some(argument) => compiler.compile_argument(argument, escape)?,
        None => Code::empty(),
    };
    Ok(Code::Cond {
        test: Box::new(test),
        then: Box::new(then),
        otherwise: Box::new(otherwise),
    })
}

/// `{checked(cond)}`
pub(crate) fn compile_checked(
    compiler: &mut TemplateCompiler<'_>,
    call: &CallSegment,
    _escape: EscapeContext,
) -> Result<Code> {
    attribute_flag(compiler, call, " checked=\"checked\"")
}

/// `{selected(cond)}`
pub(crate) fn compile_selected(
    compiler: &mut TemplateCompiler<'_>,
    call: &CallSegment,
    _escape: EscapeContext,
) -> Result<Code> {
    attribute_flag(compiler, call, " selected=\"selected\"")
}

fn attribute_flag(
    compiler: &mut TemplateCompiler<'_>,
    call: &CallSegment,
    markup: &str,
) -> Result<Code> {
    expect_args(call, 1, Some(1))?;
    let test = compiler.compile_condition(arg(call, 0)?)?;
    Ok(Code::Cond {
        test: Box::new(test),
        then: Box::new(Code::text(markup)),
        otherwise: Box::new(Code::empty()),
    })
}

/// `{calc(expr)}`. Constant expressions are folded.
pub(crate) fn compile_calc(
    compiler: &mut TemplateCompiler<'_>,
    call: &CallSegment,
    _escape: EscapeContext,
) -> Result<Code> {
    expect_args(call, 1, Some(1))?;
    let arith = compiler.compile_calc(arg(call, 0)?)?;
    Ok(match arith.fold() {
        Some(n) => Code::Const(Value::Number(n)),
        None => Code::Arith(Box::new(arith)),
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::compile;
    use crate::code::{CompareOp, Test};
    use vellum_core::{CompileError, Escape, Value};

    use super::*;

    #[test]
    fn if_compiles_branches_under_ambient_escaping() {
        let code = compile("{if({$n} == 1, one, {$label})}").unwrap();
        assert_eq!(
            code,
            Code::Cond {
                test: Box::new(Test::Compare {
                    op: CompareOp::Eq,
                    left: Code::var(["n"]),
                    right: Code::Const(Value::Number(1.0)),
                }),
                then: Box::new(Code::text("one")),
                otherwise: Box::new(Code::escape(Escape::Html, Code::var(["label"]))),
            }
        );
    }

    #[test]
    fn checked_emits_attribute() {
        let code = compile("<input{checked({$on})}>").unwrap();
        assert_eq!(
            code,
            Code::concat([
                Code::text("<input"),
                Code::Cond {
                    test: Box::new(Test::Truthy(Code::var(["on"]))),
                    then: Box::new(Code::text(" checked=\"checked\"")),
                    otherwise: Box::new(Code::empty()),
                },
                Code::text(">"),
            ])
        );
        assert!(compile("{selected({$a}, {$b})}").is_err());
    }

    #[test]
    fn calc_folds_constants() {
        assert_eq!(
            compile(r#"{calc("2 + 3 * (4 - 1)")}"#).unwrap(),
            Code::Const(Value::Number(11.0))
        );
        assert_eq!(
            compile("{calc(max(1, 2, 3))}").unwrap(),
            Code::Const(Value::Number(3.0))
        );
        assert!(matches!(compile("{calc({$a} * 2)}").unwrap(), Code::Arith(_)));
        assert!(matches!(
            compile(r#"{calc("2 +")}"#),
            Err(CompileError::MalformedExpression { .. })
        ));
    }
}
