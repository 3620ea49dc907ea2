//! Arithmetic grammar.
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '%') unary)*
//! unary   := ('-' | '+') unary | primary
//! primary := NUMBER | PLACEHOLDER | '(' expr ')' | FUNC '(' expr (',' expr)* ')'
//! ```

use vellum_core::CompileError;
use vellum_parser::Argument;

use super::tokens::{Sym, Tok, TokenStream, tokenize};
use crate::code::{Arith, ArithOp, MathFn};
use crate::compiler::TemplateCompiler;

type Result<T> = std::result::Result<T, CompileError>;

pub(crate) fn parse_calc(
    compiler: &mut TemplateCompiler<'_>,
    argument: &Argument,
) -> Result<Arith> {
    let mut tokens = tokenize(compiler, argument)?;
    if tokens.is_empty() {
        return Err(tokens.error("empty expression"));
    }
    let expr = expression(&mut tokens)?;
    match tokens.peek() {
        None => Ok(expr),
        Some(tok) => Err(tokens.error(format!("expected an operator, found {tok}"))),
    }
}

fn expression(tokens: &mut TokenStream) -> Result<Arith> {
    let mut left = term(tokens)?;
    loop {
        let op = match tokens.peek_sym() {
            Some(Sym::Plus) => ArithOp::Add,
            Some(Sym::Minus) => ArithOp::Sub,
            _ => return Ok(left),
        };
        tokens.next();
        let right = term(tokens)?;
        left = binary(op, left, right);
    }
}

fn term(tokens: &mut TokenStream) -> Result<Arith> {
    let mut left = unary(tokens)?;
    loop {
        let op = match tokens.peek_sym() {
            Some(Sym::Star) => ArithOp::Mul,
            Some(Sym::Slash) => ArithOp::Div,
            Some(Sym::Percent) => ArithOp::Mod,
            _ => return Ok(left),
        };
        tokens.next();
        let right = unary(tokens)?;
        left = binary(op, left, right);
    }
}

fn unary(tokens: &mut TokenStream) -> Result<Arith> {
    if tokens.eat_sym(Sym::Minus) {
        return Ok(Arith::Neg(Box::new(unary(tokens)?)));
    }
    if tokens.eat_sym(Sym::Plus) {
        return unary(tokens);
    }
    primary(tokens)
}

fn primary(tokens: &mut TokenStream) -> Result<Arith> {
    let Some(tok) = tokens.next() else {
        return Err(tokens.error("unexpected end of expression"));
    };
    match tok {
        Tok::Num(n) => Ok(Arith::Num(n)),
        Tok::Placeholder(index) => Ok(Arith::Value(tokens.placeholder(index))),
        Tok::Sym(Sym::LParen) => {
            let inner = expression(tokens)?;
            tokens.expect_sym(Sym::RParen)?;
            Ok(inner)
        }
        Tok::Word(name) => function(tokens, &name),
        other => Err(tokens.error_at_previous(format!("unexpected {other}"))),
    }
}

fn function(tokens: &mut TokenStream, name: &str) -> Result<Arith> {
    let Some(func) = MathFn::from_name(name) else {
        return Err(tokens.error_at_previous(format!("unknown function '{name}'")));
    };
    let span = tokens.previous_span();
    tokens.expect_sym(Sym::LParen)?;

    let mut args = Vec::new();
    if !tokens.eat_sym(Sym::RParen) {
        loop {
            args.push(expression(tokens)?);
            if tokens.eat_sym(Sym::Comma) {
                continue;
            }
            tokens.expect_sym(Sym::RParen)?;
            break;
        }
    }

    let (min, max) = func.arity();
    if args.len() < min || max.is_some_and(|max| args.len() > max) {
        let expected = match max {
            Some(max) if max == min => format!("{min}"),
            Some(max) => format!("{min} to {max}"),
            None => format!("at least {min}"),
        };
        return Err(CompileError::MalformedExpression {
            message: format!(
                "'{}' takes {expected} argument(s), got {}",
                func.name(),
                args.len()
            ),
            span,
        });
    }
    Ok(Arith::Func { func, args })
}

fn binary(op: ArithOp, left: Arith, right: Arith) -> Arith {
    Arith::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
