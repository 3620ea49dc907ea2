//! Generated code.
//!
//! [`Code`] is a small tree of output operations. It is what the compiled
//! artifact cache stores and what the executor in the root crate walks. It
//! serializes with serde for persistence and has a readable `Display` form
//! for admin debugging pages.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use vellum_core::{Escape, Value};

/// An output operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Code {
    /// Literal output, never escaped.
    Text(String),
    /// A value known at compile time.
    Const(Value),
    /// A lookup in the loop scope, then the data context.
    Var(Vec<String>),
    Concat(Vec<Code>),
    /// Neutralize the string form of the inner value.
    Escape { mode: Escape, inner: Box<Code> },
    Cond {
        test: Box<Test>,
        then: Box<Code>,
        otherwise: Box<Code>,
    },
    Each {
        source: Box<Code>,
        key: Option<String>,
        value: String,
        body: Box<Code>,
    },
    Arith(Box<Arith>),
    /// Locale-aware formatting, with an optional decimals or format argument.
    Format {
        kind: FormatKind,
        value: Box<Code>,
        option: Option<Box<Code>>,
    },
    Link {
        kind: Box<Code>,
        data: Option<Box<Code>>,
        params: Vec<(String, Code)>,
    },
    PageNav {
        link: Box<Code>,
        data: Box<Code>,
        page: Box<Code>,
        per_page: Box<Code>,
        total: Box<Code>,
        params: Vec<(String, Code)>,
    },
    /// An external callback; unknown names render empty.
    Helper { name: Box<Code>, args: Vec<Code> },
    /// An include that was checked but not expanded.
    Include { name: String },
}

impl Code {
    pub fn empty() -> Code {
        Code::Text(String::new())
    }

    pub fn text(text: impl Into<String>) -> Code {
        Code::Text(text.into())
    }

    pub fn var<S: Into<String>>(path: impl IntoIterator<Item = S>) -> Code {
        Code::Var(path.into_iter().map(Into::into).collect())
    }

    /// Concatenate parts, flattening nested concatenations and merging
    /// adjacent text.
    pub fn concat(parts: impl IntoIterator<Item = Code>) -> Code {
        let mut flat: Vec<Code> = Vec::new();
        for part in parts {
            match part {
                Code::Concat(inner) => {
                    for code in inner {
                        push_part(&mut flat, code);
                    }
                }
                other => push_part(&mut flat, other),
            }
        }
        match flat.len() {
            0 => Code::empty(),
            1 => flat.pop().unwrap_or_else(Code::empty),
            _ => Code::Concat(flat),
        }
    }

    /// Wrap in an escape operation. `Raw` leaves the code as-is and static
    /// text is escaped immediately.
    pub fn escape(mode: Escape, inner: Code) -> Code {
        match (mode, inner) {
            (Escape::Raw, inner) => inner,
            (mode, Code::Text(text)) => Code::Text(mode.apply(&text).into_owned()),
            (mode, inner) => Code::Escape {
                mode,
                inner: Box::new(inner),
            },
        }
    }

    /// The output if this code is static text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Code::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_empty_text(&self) -> bool {
        self.as_text().is_some_and(str::is_empty)
    }
}

fn push_part(parts: &mut Vec<Code>, code: Code) {
    if code.is_empty_text() {
        return;
    }
    if let (Some(Code::Text(previous)), Code::Text(text)) = (parts.last_mut(), &code) {
        previous.push_str(text);
        return;
    }
    parts.push(code);
}

/// Kinds of locale formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    Count,
    Number,
    Date,
    Time,
    DateTime,
}

impl FormatKind {
    pub fn name(self) -> &'static str {
        match self {
            FormatKind::Count => "count",
            FormatKind::Number => "number",
            FormatKind::Date => "date",
            FormatKind::Time => "time",
            FormatKind::DateTime => "datetime",
        }
    }
}

// ============================================================================
// Conditions
// ============================================================================

/// A boolean test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Test {
    Truthy(Code),
    Not(Box<Test>),
    And(Box<Test>, Box<Test>),
    Or(Box<Test>, Box<Test>),
    Compare {
        op: CompareOp,
        left: Code,
        right: Code,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

// ============================================================================
// Arithmetic
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arith {
    Num(f64),
    /// A value from generated code, coerced to a number.
    Value(Code),
    Neg(Box<Arith>),
    Binary {
        op: ArithOp,
        left: Box<Arith>,
        right: Box<Arith>,
    },
    Func { func: MathFn, args: Vec<Arith> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        }
    }
}

/// Whitelisted math functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MathFn {
    Abs,
    Ceil,
    Floor,
    Max,
    Min,
    Pow,
    Round,
}

impl MathFn {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "abs" => Some(MathFn::Abs),
            "ceil" => Some(MathFn::Ceil),
            "floor" => Some(MathFn::Floor),
            "max" => Some(MathFn::Max),
            "min" => Some(MathFn::Min),
            "pow" => Some(MathFn::Pow),
            "round" => Some(MathFn::Round),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MathFn::Abs => "abs",
            MathFn::Ceil => "ceil",
            MathFn::Floor => "floor",
            MathFn::Max => "max",
            MathFn::Min => "min",
            MathFn::Pow => "pow",
            MathFn::Round => "round",
        }
    }

    /// Allowed argument counts as `(min, max)`; `None` is unbounded.
    pub fn arity(self) -> (usize, Option<usize>) {
        match self {
            MathFn::Abs | MathFn::Ceil | MathFn::Floor => (1, Some(1)),
            MathFn::Round => (1, Some(2)),
            MathFn::Pow => (2, Some(2)),
            MathFn::Max | MathFn::Min => (1, None),
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        let first = args.first().copied().unwrap_or(0.0);
        match self {
            MathFn::Abs => first.abs(),
            MathFn::Ceil => first.ceil(),
            MathFn::Floor => first.floor(),
            MathFn::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            MathFn::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            MathFn::Pow => first.powf(args.get(1).copied().unwrap_or(1.0)),
            MathFn::Round => {
                let precision = args.get(1).copied().unwrap_or(0.0).trunc() as i32;
                let factor = 10f64.powi(precision);
                (first * factor).round() / factor
            }
        }
    }
}

/// Errors evaluating arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArithError {
    #[error("division by zero")]
    DivisionByZero,
}

impl Arith {
    /// Whether the expression contains no runtime values.
    pub fn is_constant(&self) -> bool {
        match self {
            Arith::Num(_) => true,
            Arith::Value(_) => false,
            Arith::Neg(inner) => inner.is_constant(),
            Arith::Binary { left, right, .. } => left.is_constant() && right.is_constant(),
            Arith::Func { args, .. } => args.iter().all(Arith::is_constant),
        }
    }

    /// Evaluate, asking `value` for the number behind each runtime value.
    pub fn evaluate<E: From<ArithError>>(
        &self,
        value: &mut dyn FnMut(&Code) -> Result<f64, E>,
    ) -> Result<f64, E> {
        Ok(match self {
            Arith::Num(n) => *n,
            Arith::Value(code) => value(code)?,
            Arith::Neg(inner) => -inner.evaluate(value)?,
            Arith::Binary { op, left, right } => {
                let left = left.evaluate(value)?;
                let right = right.evaluate(value)?;
                match op {
                    ArithOp::Add => left + right,
                    ArithOp::Sub => left - right,
                    ArithOp::Mul => left * right,
                    ArithOp::Div | ArithOp::Mod if right == 0.0 => {
                        return Err(ArithError::DivisionByZero.into());
                    }
                    ArithOp::Div => left / right,
                    ArithOp::Mod => left % right,
                }
            }
            Arith::Func { func, args } => {
                let values = args
                    .iter()
                    .map(|arg| arg.evaluate(value))
                    .collect::<Result<Vec<_>, E>>()?;
                func.apply(&values)
            }
        })
    }

    /// Evaluate a constant expression. `None` if it is not constant or
    /// cannot be evaluated.
    pub fn fold(&self) -> Option<f64> {
        if !self.is_constant() {
            return None;
        }
        self.evaluate::<ArithError>(&mut |_| Ok(0.0)).ok()
    }
}

// ============================================================================
// Display
// ============================================================================

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_params(f: &mut fmt::Formatter<'_>, params: &[(String, Code)]) -> fmt::Result {
    for (name, code) in params {
        write!(f, ", {name}={code}")?;
    }
    Ok(())
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Code::Text(text) => write!(f, "{text:?}"),
            Code::Const(Value::String(s)) => write!(f, "{s:?}"),
            Code::Const(Value::Null) => f.write_str("null"),
            Code::Const(Value::Bool(b)) => write!(f, "{b}"),
            Code::Const(value) => write!(f, "{value}"),
            Code::Var(path) => write!(f, "${}", path.join(".")),
            Code::Concat(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" . ")?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
            Code::Escape { mode, inner } => write!(f, "{mode}({inner})"),
            Code::Cond {
                test,
                then,
                otherwise,
            } => write!(f, "({test} ? {then} : {otherwise})"),
            Code::Each {
                source,
                key,
                value,
                body,
            } => match key {
                Some(key) => write!(f, "foreach({source} as ${key} => ${value}) {{ {body} }}"),
                None => write!(f, "foreach({source} as ${value}) {{ {body} }}"),
            },
            Code::Arith(arith) => write!(f, "calc({arith})"),
            Code::Format {
                kind,
                value,
                option,
            } => match option {
                Some(option) => write!(f, "{}({value}, {option})", kind.name()),
                None => write!(f, "{}({value})", kind.name()),
            },
            Code::Link { kind, data, params } => {
                write!(f, "link({kind}")?;
                if let Some(data) = data {
                    write!(f, ", {data}")?;
                }
                write_params(f, params)?;
                f.write_str(")")
            }
            Code::PageNav {
                link,
                data,
                page,
                per_page,
                total,
                params,
            } => {
                write!(
                    f,
                    "pagenav({link}, {data}, page={page}, per_page={per_page}, total={total}"
                )?;
                write_params(f, params)?;
                f.write_str(")")
            }
            Code::Helper { name, args } => {
                write!(f, "helper({name}")?;
                for arg in args {
                    write!(f, ", {arg}")?;
                }
                f.write_str(")")
            }
            Code::Include { name } => write!(f, "include({name:?})"),
        }
    }
}

impl fmt::Display for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Test::Truthy(code) => write!(f, "{code}"),
            Test::Not(inner) => write!(f, "!{inner}"),
            Test::And(left, right) => write!(f, "({left} && {right})"),
            Test::Or(left, right) => write!(f, "({left} || {right})"),
            Test::Compare { op, left, right } => write!(f, "{left} {} {right}", op.symbol()),
        }
    }
}

impl fmt::Display for Arith {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arith::Num(n) => write!(f, "{}", Value::Number(*n)),
            Arith::Value(code) => write!(f, "{code}"),
            Arith::Neg(inner) => write!(f, "-{inner}"),
            Arith::Binary { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
            Arith::Func { func, args } => {
                write!(f, "{}(", func.name())?;
                write_list(f, args)?;
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_flattens_and_merges_text() {
        let code = Code::concat([
            Code::text("Hello "),
            Code::concat([Code::text(""), Code::text("dear ")]),
            Code::escape(Escape::Html, Code::var(["name"])),
            Code::text("!"),
        ]);
        assert_eq!(
            code,
            Code::Concat(vec![
                Code::text("Hello dear "),
                Code::Escape {
                    mode: Escape::Html,
                    inner: Box::new(Code::var(["name"])),
                },
                Code::text("!"),
            ])
        );
        assert_eq!(Code::concat([Code::text("a")]), Code::text("a"));
        assert_eq!(Code::concat(Vec::new()), Code::empty());
    }

    #[test]
    fn escaping_static_text_happens_at_compile_time() {
        assert_eq!(
            Code::escape(Escape::Html, Code::text("<b>")),
            Code::text("&lt;b&gt;")
        );
        assert_eq!(
            Code::escape(Escape::Raw, Code::var(["x"])),
            Code::var(["x"])
        );
    }

    #[test]
    fn display_is_readable() {
        let code = Code::concat([
            Code::text("Hi "),
            Code::escape(Escape::Html, Code::var(["user", "name"])),
        ]);
        assert_eq!(code.to_string(), r#""Hi " . html($user.name)"#);

        let test = Test::Compare {
            op: CompareOp::Ge,
            left: Code::var(["n"]),
            right: Code::Const(Value::from(2)),
        };
        assert_eq!(test.to_string(), "$n >= 2");
    }

    #[test]
    fn arithmetic_folds_constants() {
        // 2 + 3 * (4 - 1)
        let expr = Arith::Binary {
            op: ArithOp::Add,
            left: Box::new(Arith::Num(2.0)),
            right: Box::new(Arith::Binary {
                op: ArithOp::Mul,
                left: Box::new(Arith::Num(3.0)),
                right: Box::new(Arith::Binary {
                    op: ArithOp::Sub,
                    left: Box::new(Arith::Num(4.0)),
                    right: Box::new(Arith::Num(1.0)),
                }),
            }),
        };
        assert_eq!(expr.fold(), Some(11.0));
        assert!(!Arith::Value(Code::var(["x"])).is_constant());
    }

    #[test]
    fn math_functions() {
        let max = Arith::Func {
            func: MathFn::Max,
            args: vec![Arith::Num(1.0), Arith::Num(3.0), Arith::Num(2.0)],
        };
        assert_eq!(max.fold(), Some(3.0));
        let round = Arith::Func {
            func: MathFn::Round,
            args: vec![Arith::Num(2.345), Arith::Num(2.0)],
        };
        assert_eq!(round.fold(), Some(2.35));
        assert_eq!(MathFn::from_name("POW"), Some(MathFn::Pow));
        assert_eq!(MathFn::Round.arity(), (1, Some(2)));
    }

    #[test]
    fn division_by_zero() {
        let expr = Arith::Binary {
            op: ArithOp::Mod,
            left: Box::new(Arith::Num(1.0)),
            right: Box::new(Arith::Num(0.0)),
        };
        assert_eq!(expr.fold(), None);
        assert_eq!(
            expr.evaluate::<ArithError>(&mut |_| Ok(0.0)),
            Err(ArithError::DivisionByZero)
        );
    }
}
