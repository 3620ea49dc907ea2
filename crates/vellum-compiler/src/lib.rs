//! Vellum template compiler.
//!
//! Turns parsed segment trees into generated [`Code`] for one style and
//! language position.
//!
//! ## Modules
//!
//! - [`code`]: the generated-code IR and its readable rendering
//! - [`context`]: compilation context, flags and the [`CompileEnv`] seam
//! - [`compiler`]: the code generator, include expansion and cycle detection
//! - [`registry`]: the function compiler registry
//! - `builtins`: the 17 built-in functions
//! - `expr`: the arithmetic and condition grammars
//!
//! ## Example
//!
//! ```
//! use vellum_compiler::{CompileContext, FunctionRegistry, SimpleEnv, compile_template};
//! use vellum_core::PositionId;
//! use vellum_parser::Parser;
//!
//! let env = SimpleEnv::new().with_phrase("greeting", "Hello");
//! let registry = FunctionRegistry::with_builtins();
//! let template = Parser::parse("{phrase(greeting)}, {$name}!").unwrap();
//! let ctx = CompileContext::new(PositionId::ROOT, PositionId::ROOT);
//!
//! let compiled = compile_template(&env, &registry, ctx, "hello", &template).unwrap();
//! assert_eq!(compiled.code.to_string(), r#""Hello, " . html($name) . "!""#);
//! assert!(compiled.phrases.contains("greeting"));
//! ```

mod builtins;
pub mod code;
pub mod compiler;
pub mod context;
mod expr;
pub mod registry;

pub use builtins::compile_phrase_text;
pub use code::{Arith, ArithError, ArithOp, Code, CompareOp, FormatKind, MathFn, Test};
pub use compiler::{CompileFailure, CompiledTemplate, TemplateCompiler, compile_template};
pub use context::{CompileContext, CompileEnv, CompileFlags, SimpleEnv};
pub use registry::{FunctionCompiler, FunctionRegistry};

// Re-export the error types callers match on.
pub use vellum_core::{CompileDiagnostic, CompileError};
