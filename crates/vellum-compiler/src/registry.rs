//! Function compiler registry.
//!
//! Template functions are compiled, not interpreted: each name maps to a
//! [`FunctionCompiler`] that turns the call's raw arguments into [`Code`].
//! The registry is built once, extended by the host, and shared read-only
//! by every compilation, including parallel ones.

use crate::builtins;
use crate::code::Code;
use crate::compiler::TemplateCompiler;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use vellum_core::{CompileError, EscapeContext};
use vellum_parser::CallSegment;

type Result<T> = std::result::Result<T, CompileError>;

/// Compiles one template function call.
///
/// Implementations receive the compiler so they can compile arguments
/// under whatever escape context they need and record dependencies.
pub trait FunctionCompiler: Send + Sync {
    fn compile(
        &self,
        compiler: &mut TemplateCompiler<'_>,
        call: &CallSegment,
        escape: EscapeContext,
    ) -> Result<Code>;
}

impl<F> FunctionCompiler for F
where
    F: Fn(&mut TemplateCompiler<'_>, &CallSegment, EscapeContext) -> Result<Code> + Send + Sync,
{
    fn compile(
        &self,
        compiler: &mut TemplateCompiler<'_>,
        call: &CallSegment,
        escape: EscapeContext,
    ) -> Result<Code> {
        self(compiler, call, escape)
    }
}

/// Name -> function compiler.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: FxHashMap<String, Arc<dyn FunctionCompiler>>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in function.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtins::register_all(&mut registry);
        registry
    }

    /// Register `compiler` under `name`, returning any compiler it replaces.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        compiler: impl FunctionCompiler + 'static,
    ) -> Option<Arc<dyn FunctionCompiler>> {
        self.functions.insert(name.into(), Arc::new(compiler))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn FunctionCompiler>> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}
