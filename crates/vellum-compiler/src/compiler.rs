//! The code generator.
//!
//! [`TemplateCompiler`] walks a segment tree for one (style, language)
//! context and produces [`Code`]. Function calls are delegated to the
//! [`FunctionRegistry`]; includes are resolved at the same style and either
//! spliced in or, in validation mode, only checked. Every include and phrase
//! name touched along the way is recorded so the caller can store the
//! artifact's dependency edges.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vellum_core::{CompileError, EscapeContext, PositionId, Span};
use vellum_parser::{Argument, Branch, CallSegment, Segment, Template};

use crate::code::{Arith, Code, Test};
use crate::context::{CompileContext, CompileEnv};
use crate::expr;
use crate::registry::FunctionRegistry;

type Result<T> = std::result::Result<T, CompileError>;

/// The output of compiling one template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledTemplate {
    pub code: Code,
    /// Every template name included, directly or through another include.
    pub includes: BTreeSet<String>,
    /// Every phrase name referenced, found or not.
    pub phrases: BTreeSet<String>,
}

/// A failed compilation, with the dependencies seen before it failed.
///
/// The edges matter even on failure: a template that includes a missing
/// template must be retried once that template is created.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct CompileFailure {
    #[source]
    pub error: CompileError,
    pub includes: BTreeSet<String>,
    pub phrases: BTreeSet<String>,
}

/// Compiles one artifact.
pub struct TemplateCompiler<'a> {
    env: &'a dyn CompileEnv,
    registry: &'a FunctionRegistry,
    ctx: CompileContext,
    /// (style, name) of every template currently being compiled, outermost
    /// first.
    include_stack: Vec<(PositionId, String)>,
    includes: BTreeSet<String>,
    phrases: BTreeSet<String>,
}

impl<'a> TemplateCompiler<'a> {
    pub fn new(
        env: &'a dyn CompileEnv,
        registry: &'a FunctionRegistry,
        ctx: CompileContext,
    ) -> Self {
        Self {
            env,
            registry,
            ctx,
            include_stack: Vec::new(),
            includes: BTreeSet::new(),
            phrases: BTreeSet::new(),
        }
    }

    pub fn context(&self) -> &CompileContext {
        &self.ctx
    }

    pub fn env(&self) -> &'a dyn CompileEnv {
        self.env
    }

    pub fn registry(&self) -> &'a FunctionRegistry {
        self.registry
    }

    /// Record a phrase reference edge.
    pub fn record_phrase(&mut self, name: &str) {
        if !self.phrases.contains(name) {
            self.phrases.insert(name.to_string());
        }
    }

    /// Compile the template `name` whose parsed tree is `template`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile_template(
        mut self,
        name: &str,
        template: &Template,
    ) -> std::result::Result<CompiledTemplate, CompileFailure> {
        self.include_stack.push((self.ctx.style, name.to_string()));
        let result = self.compile_segments(&template.segments, EscapeContext::HTML);
        self.include_stack.pop();

        match result {
            Ok(code) => Ok(CompiledTemplate {
                code,
                includes: self.includes,
                phrases: self.phrases,
            }),
            Err(error) => Err(CompileFailure {
                error,
                includes: self.includes,
                phrases: self.phrases,
            }),
        }
    }

    // ==========================================================================
    // Segments
    // ==========================================================================

    pub fn compile_segments(
        &mut self,
        segments: &[Segment],
        escape: EscapeContext,
    ) -> Result<Code> {
        let mut parts = Vec::with_capacity(segments.len());
        for segment in segments {
            parts.push(self.compile_segment(segment, escape)?);
        }
        Ok(Code::concat(parts))
    }

    pub fn compile_segment(&mut self, segment: &Segment, escape: EscapeContext) -> Result<Code> {
        match segment {
            Segment::Literal { text, .. } => Ok(Code::Text(text.clone())),
            Segment::Variable { path, .. } => Ok(Self::compile_variable(path, escape)),
            Segment::Call(call) => self.compile_call(call, escape),
            Segment::If {
                branches,
                otherwise,
                ..
            } => self.compile_if(branches, otherwise.as_deref(), escape),
            Segment::Foreach {
                source,
                value,
                key,
                body,
                ..
            } => {
                let source = self.compile_argument(source, EscapeContext::RAW)?;
                let body = self.compile_segments(body, escape)?;
                Ok(Code::Each {
                    source: Box::new(source),
                    key: key.clone(),
                    value: value.clone(),
                    body: Box::new(body),
                })
            }
            Segment::Include { name, span } => self.compile_include(name, *span, escape),
        }
    }

    /// Compile an argument's segments under `escape`.
    pub fn compile_argument(&mut self, argument: &Argument, escape: EscapeContext) -> Result<Code> {
        self.compile_segments(&argument.segments, escape)
    }

    /// Compile an argument through the boolean path.
    pub fn compile_condition(&mut self, argument: &Argument) -> Result<Test> {
        expr::parse_condition(self, argument)
    }

    /// Compile an argument through the arithmetic grammar.
    pub fn compile_calc(&mut self, argument: &Argument) -> Result<Arith> {
        expr::parse_calc(self, argument)
    }

    pub fn compile_variable(path: &[String], escape: EscapeContext) -> Code {
        Code::escape(escape.mode(), Code::Var(path.to_vec()))
    }

    pub fn compile_call(&mut self, call: &CallSegment, escape: EscapeContext) -> Result<Code> {
        let registry = self.registry;
        match registry.get(&call.name) {
            Some(function) => function.compile(self, call, escape),
            None => Err(CompileError::UnknownFunction {
                name: call.name.clone(),
                span: call.span,
            }),
        }
    }

    fn compile_if(
        &mut self,
        branches: &[Branch],
        otherwise: Option<&[Segment]>,
        escape: EscapeContext,
    ) -> Result<Code> {
        let mut compiled = Vec::with_capacity(branches.len());
        for branch in branches {
            let test = self.compile_condition(&branch.condition)?;
            let body = self.compile_segments(&branch.body, escape)?;
            compiled.push((test, body));
        }
        let mut code = match otherwise {
            Some(body) => self.compile_segments(body, escape)?,
            None => Code::empty(),
        };
        for (test, then) in compiled.into_iter().rev() {
            code = Code::Cond {
                test: Box::new(test),
                then: Box::new(then),
                otherwise: Box::new(code),
            };
        }
        Ok(code)
    }

    // ==========================================================================
    // Includes
    // ==========================================================================

    fn compile_include(&mut self, name: &str, span: Span, escape: EscapeContext) -> Result<Code> {
        let style = self.ctx.style;
        if self
            .include_stack
            .iter()
            .any(|(s, n)| *s == style && n == name)
        {
            let mut chain: Vec<String> =
                self.include_stack.iter().map(|(_, n)| n.clone()).collect();
            chain.push(name.to_string());
            return Err(CompileError::CircularInclude {
                name: name.to_string(),
                chain,
                span,
            });
        }

        self.includes.insert(name.to_string());
        let unresolved = || CompileError::UnresolvedInclude {
            name: name.to_string(),
            style,
            span,
        };
        let found = self.env.template(name, style);

        if !self.ctx.follows_includes() {
            return match found {
                Ok(None) => Err(unresolved()),
                _ => Ok(Code::Include {
                    name: name.to_string(),
                }),
            };
        }

        let template = match found {
            Ok(Some(template)) => template,
            Ok(None) => return Err(unresolved()),
            Err(errors) => return Err(included(name, errors.into())),
        };

        self.include_stack.push((style, name.to_string()));
        let result = self.compile_segments(&template.segments, escape);
        self.include_stack.pop();
        result.map_err(|error| included(name, error))
    }
}

fn included(name: &str, error: CompileError) -> CompileError {
    CompileError::Included {
        template: name.to_string(),
        source: Box::new(error),
    }
}

impl fmt::Debug for TemplateCompiler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateCompiler")
            .field("ctx", &self.ctx)
            .field("include_stack", &self.include_stack)
            .field("includes", &self.includes)
            .field("phrases", &self.phrases)
            .finish()
    }
}

/// Compile `template` for `ctx` with a fresh compiler.
pub fn compile_template(
    env: &dyn CompileEnv,
    registry: &FunctionRegistry,
    ctx: CompileContext,
    name: &str,
    template: &Template,
) -> std::result::Result<CompiledTemplate, CompileFailure> {
    TemplateCompiler::new(env, registry, ctx).compile_template(name, template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimpleEnv;
    use vellum_core::Escape;
    use vellum_parser::Parser;

    type Compiled = std::result::Result<CompiledTemplate, CompileFailure>;

    fn compile_with(env: &SimpleEnv, ctx: CompileContext, source: &str) -> Compiled {
        let template = Parser::parse(source).unwrap();
        let registry = FunctionRegistry::with_builtins();
        compile_template(env, &registry, ctx, "page", &template)
    }

    fn compile(env: &SimpleEnv, source: &str) -> Compiled {
        compile_with(
            env,
            CompileContext::new(PositionId::ROOT, PositionId::ROOT),
            source,
        )
    }

    fn html_var(name: &str) -> Code {
        Code::escape(Escape::Html, Code::var([name]))
    }

    #[test]
    fn bare_variable_is_html_escaped() {
        let compiled = compile(&SimpleEnv::new(), "Hello {$name}!").unwrap();
        assert_eq!(
            compiled.code,
            Code::concat([Code::text("Hello "), html_var("name"), Code::text("!")])
        );
        assert!(compiled.includes.is_empty());
        assert!(compiled.phrases.is_empty());
    }

    #[test]
    fn compilation_is_idempotent() {
        let env = SimpleEnv::new().with_phrase("welcome", "Welcome {name}");
        let source = concat!(
            r#"<tpl:if is="{$n} > 1">{phrase(welcome, name={$user})}"#,
            r#"<tpl:else />{calc(1 + 2)}</tpl:if>"#,
        );
        assert_eq!(
            compile(&env, source).unwrap(),
            compile(&env, source).unwrap()
        );
    }

    #[test]
    fn unknown_function_reports_offset() {
        let failure = compile(&SimpleEnv::new(), "abc {nope(1)}").unwrap_err();
        match failure.error {
            CompileError::UnknownFunction { name, span } => {
                assert_eq!(name, "nope");
                assert_eq!(span.offset, 4);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn if_block_with_elseif_nests_conditionals() {
        let compiled = compile(
            &SimpleEnv::new(),
            r#"<tpl:if is="{$a}">A<tpl:elseif is="{$b}" />B<tpl:else />C</tpl:if>"#,
        )
        .unwrap();
        assert_eq!(
            compiled.code,
            Code::Cond {
                test: Box::new(Test::Truthy(Code::var(["a"]))),
                then: Box::new(Code::text("A")),
                otherwise: Box::new(Code::Cond {
                    test: Box::new(Test::Truthy(Code::var(["b"]))),
                    then: Box::new(Code::text("B")),
                    otherwise: Box::new(Code::text("C")),
                }),
            }
        );
    }

    #[test]
    fn foreach_source_is_raw_and_body_ambient() {
        let compiled = compile(
            &SimpleEnv::new(),
            r#"<tpl:foreach loop="{$items}" value="$item" key="$i">{$item.name}</tpl:foreach>"#,
        )
        .unwrap();
        assert_eq!(
            compiled.code,
            Code::Each {
                source: Box::new(Code::var(["items"])),
                key: Some("i".into()),
                value: "item".into(),
                body: Box::new(Code::escape(Escape::Html, Code::var(["item", "name"]))),
            }
        );
    }

    #[test]
    fn includes_are_spliced_and_recorded_transitively() {
        let env = SimpleEnv::new()
            .with_template("header", "[<tpl:include template=\"logo\" />]")
            .with_template("logo", "{phrase(site_name)}")
            .with_phrase("site_name", "Vellum");
        let compiled = compile(&env, "<tpl:include template=\"header\" />body").unwrap();
        assert_eq!(compiled.code, Code::text("[Vellum]body"));
        assert_eq!(
            compiled
                .includes
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>(),
            vec!["header", "logo"]
        );
        assert!(compiled.phrases.contains("site_name"));
    }

    #[test]
    fn circular_include_detected_when_following() {
        let env = SimpleEnv::new()
            .with_template("a", "<tpl:include template=\"b\" />")
            .with_template("b", "<tpl:include template=\"a\" />");
        let template = Parser::parse("<tpl:include template=\"b\" />").unwrap();
        let registry = FunctionRegistry::with_builtins();
        let ctx = CompileContext::new(PositionId::ROOT, PositionId::ROOT);
        let failure = compile_template(&env, &registry, ctx, "a", &template).unwrap_err();

        match failure.error.innermost() {
            CompileError::CircularInclude { name, chain, .. } => {
                assert_eq!(name, "a");
                assert_eq!(chain, &vec!["a".to_string(), "b".into(), "a".into()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(failure.error.diagnostic("a").template, "b");
    }

    #[test]
    fn validation_mode_leaves_includes_unexpanded() {
        let env = SimpleEnv::new()
            .with_template("a", "<tpl:include template=\"b\" />")
            .with_template("b", "<tpl:include template=\"a\" />");
        let template = Parser::parse("<tpl:include template=\"b\" />").unwrap();
        let registry = FunctionRegistry::with_builtins();
        let ctx = CompileContext::validation(PositionId::ROOT, PositionId::ROOT);
        let compiled = compile_template(&env, &registry, ctx, "a", &template).unwrap();
        assert_eq!(compiled.code, Code::Include { name: "b".into() });
        assert!(compiled.includes.contains("b"));
    }

    #[test]
    fn missing_include_is_an_error_with_edge_recorded() {
        let failure = compile(&SimpleEnv::new(), "<tpl:include template=\"gone\" />").unwrap_err();
        assert!(matches!(
            failure.error,
            CompileError::UnresolvedInclude { ref name, .. } if name == "gone"
        ));
        assert!(failure.includes.contains("gone"));

        let quick = compile_with(
            &SimpleEnv::new(),
            CompileContext::validation(PositionId::ROOT, PositionId::ROOT),
            "<tpl:include template=\"gone\" />",
        );
        assert!(quick.is_err());
    }

    #[test]
    fn errors_in_included_templates_name_them() {
        let env = SimpleEnv::new().with_template("footer", "ok\n{broken(}");
        let failure = compile(&env, "<tpl:include template=\"footer\" />").unwrap_err();
        let diagnostic = failure.error.diagnostic("page");
        assert_eq!(diagnostic.template, "footer");
        assert!(matches!(failure.error.innermost(), CompileError::Syntax(_)));
    }
}
