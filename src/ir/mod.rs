//! Typed-expression intermediate representation consumed by the compiler.

pub mod typed_expr;

pub use typed_expr::{TypedExpr, TypedExprRef};
