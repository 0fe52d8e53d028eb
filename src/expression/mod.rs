//! Expression compilation and evaluation.
//!
//! This module turns typed expression trees into a compiled, shared
//! expression graph and evaluates it over columnar batches:
//! - compiler: scoped compilation with CSE, capture resolution, rewrites,
//!   flattening and constant folding
//! - expr: the compiled node kinds and their evaluation
//! - expr_set: a compiled forest plus its per-batch state
//! - context: the evaluation context (errors, memory, options)

pub mod compiler;
pub mod context;
pub mod expr;
pub mod expr_set;
pub mod fold;

pub use compiler::{compile_expressions, CompileOptions, CompiledExprs};
pub use context::EvalContext;
pub use expr::{Expr, ExprKind, ExprMetadata, ExprPtr, FieldSelector, SpecialForm};
pub use expr_set::ExprSet;
