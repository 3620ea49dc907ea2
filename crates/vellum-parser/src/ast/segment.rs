//! Segment tree node definitions.
//!
//! A parsed template is an ordered list of [`Segment`]s. Function call
//! arguments and block tag attributes are themselves segment sequences
//! ([`Argument`]), so variables and calls nest anywhere an argument is
//! allowed. Every node owns its strings and carries a [`Span`], so trees
//! can be cached and compared independently of the source text.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use vellum_core::Span;

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Template {
    pub segments: Vec<Segment>,
}

impl Template {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Names of every template this one includes through `<tpl:include>`,
    /// in source order, duplicates removed.
    pub fn include_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        collect_includes(&self.segments, &mut names);
        names
    }
}

fn collect_includes<'a>(segments: &'a [Segment], names: &mut Vec<&'a str>) {
    for segment in segments {
        match segment {
            Segment::Include { name, .. } => {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
            Segment::If {
                branches,
                otherwise,
                ..
            } => {
                for branch in branches {
                    collect_includes(&branch.body, names);
                }
                if let Some(body) = otherwise {
                    collect_includes(body, names);
                }
            }
            Segment::Foreach { body, .. } => collect_includes(body, names),
            Segment::Literal { .. } | Segment::Variable { .. } | Segment::Call(_) => {}
        }
    }
}

/// One node of the segment tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    /// Text emitted verbatim.
    Literal { text: String, span: Span },
    /// `{$a.b}`
    Variable { path: Vec<String>, span: Span },
    /// `{name(args)}`
    Call(CallSegment),
    /// `<tpl:if>` with its `elseif` branches and optional `else`.
    If {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Segment>>,
        span: Span,
    },
    /// `<tpl:foreach loop="..." value="$v" key="$k">`
    Foreach {
        source: Argument,
        value: String,
        key: Option<String>,
        body: Vec<Segment>,
        span: Span,
    },
    /// `<tpl:include template="name" />`
    Include { name: String, span: Span },
}

impl Segment {
    pub fn span(&self) -> Span {
        match self {
            Segment::Literal { span, .. }
            | Segment::Variable { span, .. }
            | Segment::If { span, .. }
            | Segment::Foreach { span, .. }
            | Segment::Include { span, .. } => *span,
            Segment::Call(call) => call.span,
        }
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Segment::Literal { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// One `is="..."` branch of an if block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub condition: Argument,
    pub body: Vec<Segment>,
    pub span: Span,
}

/// A function call with its arguments left uncompiled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSegment {
    pub name: String,
    pub args: Vec<Argument>,
    /// Named arguments in source order. A repeated name keeps the last value.
    pub named: IndexMap<String, Argument>,
    pub span: Span,
}

impl CallSegment {
    pub fn arg(&self, index: usize) -> Option<&Argument> {
        self.args.get(index)
    }

    pub fn named(&self, name: &str) -> Option<&Argument> {
        self.named.get(name)
    }
}

/// A function argument or attribute value: a sequence of segments.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Argument {
    pub segments: Vec<Segment>,
    pub span: Span,
    /// Whether the argument was written in quotes.
    pub quoted: bool,
}

impl Argument {
    pub fn new(segments: Vec<Segment>, span: Span, quoted: bool) -> Self {
        Self {
            segments,
            span,
            quoted,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The argument's text if it contains nothing but literal text.
    pub fn literal_text(&self) -> Option<String> {
        self.segments
            .iter()
            .map(Segment::as_literal)
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.concat())
    }

    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, Segment::Literal { .. }))
    }
}
