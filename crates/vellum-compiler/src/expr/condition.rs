//! Condition grammar (the boolean path).
//!
//! ```text
//! or         := and (('||' | 'or') and)*
//! and        := not (('&&' | 'and') not)*
//! not        := ('!' | 'not') not | '(' or ')' | comparison
//! comparison := operand (CMP operand)?
//! operand    := PLACEHOLDER | NUMBER | '-' NUMBER | STRING | true | false | null
//! ```
//!
//! Word operators are case-insensitive. A lone operand tests truthiness.

use vellum_core::{CompileError, Value};
use vellum_parser::Argument;

use super::tokens::{Sym, Tok, TokenStream, tokenize};
use crate::code::{Code, CompareOp, Test};
use crate::compiler::TemplateCompiler;

type Result<T> = std::result::Result<T, CompileError>;

pub(crate) fn parse_condition(
    compiler: &mut TemplateCompiler<'_>,
    argument: &Argument,
) -> Result<Test> {
    let mut tokens = tokenize(compiler, argument)?;
    if tokens.is_empty() {
        return Err(tokens.error("empty condition"));
    }
    let test = or(&mut tokens)?;
    match tokens.peek() {
        None => Ok(test),
        Some(tok) => Err(tokens.error(format!("unexpected {tok}"))),
    }
}

fn or(tokens: &mut TokenStream) -> Result<Test> {
    let mut left = and(tokens)?;
    while tokens.eat_sym(Sym::OrOr) || tokens.eat_word("or") {
        let right = and(tokens)?;
        left = Test::Or(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn and(tokens: &mut TokenStream) -> Result<Test> {
    let mut left = not(tokens)?;
    while tokens.eat_sym(Sym::AndAnd) || tokens.eat_word("and") {
        let right = not(tokens)?;
        left = Test::And(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn not(tokens: &mut TokenStream) -> Result<Test> {
    if tokens.eat_sym(Sym::Bang) || tokens.eat_word("not") {
        return Ok(Test::Not(Box::new(not(tokens)?)));
    }
    if tokens.eat_sym(Sym::LParen) {
        let inner = or(tokens)?;
        tokens.expect_sym(Sym::RParen)?;
        return Ok(inner);
    }
    comparison(tokens)
}

fn comparison(tokens: &mut TokenStream) -> Result<Test> {
    let left = operand(tokens)?;
    let op = match tokens.peek_sym() {
        Some(Sym::Eq) => CompareOp::Eq,
        Some(Sym::Ne) => CompareOp::Ne,
        Some(Sym::Lt) => CompareOp::Lt,
        Some(Sym::Le) => CompareOp::Le,
        Some(Sym::Gt) => CompareOp::Gt,
        Some(Sym::Ge) => CompareOp::Ge,
        _ => return Ok(Test::Truthy(left)),
    };
    tokens.next();
    let right = operand(tokens)?;
    Ok(Test::Compare { op, left, right })
}

fn operand(tokens: &mut TokenStream) -> Result<Code> {
    let Some(tok) = tokens.next() else {
        return Err(tokens.error("expected a value before the end"));
    };
    let value = match tok {
        Tok::Placeholder(index) => return Ok(tokens.placeholder(index)),
        Tok::Num(n) => Value::Number(n),
        Tok::Str(s) => Value::String(s),
        Tok::Sym(Sym::Minus) => match tokens.next() {
            Some(Tok::Num(n)) => Value::Number(-n),
            _ => return Err(tokens.error_at_previous("expected a number after '-'")),
        },
        Tok::Word(word) if word.eq_ignore_ascii_case("true") => Value::Bool(true),
        Tok::Word(word) if word.eq_ignore_ascii_case("false") => Value::Bool(false),
        Tok::Word(word) if word.eq_ignore_ascii_case("null") => Value::Null,
        other => return Err(tokens.error_at_previous(format!("expected a value, found {other}"))),
    };
    Ok(Code::Const(value))
}
