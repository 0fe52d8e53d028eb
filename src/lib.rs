//! Vexel - Columnar Expression Engine
//!
//! Vexel is the expression compilation and cast evaluation core of a
//! columnar SQL execution engine. Given typed expression trees produced by
//! a query planner, it materializes an executable expression graph with
//! common-subexpression sharing, lambda capture resolution, call
//! flattening and constant folding, and evaluates it on batches of
//! columnar rows. A family of per-type cast kernels converts columnar
//! values between primitive, decimal, string and temporal types under
//! dialect-selectable policies.

pub mod cast;
pub mod common;
pub mod expression;
pub mod functions;
pub mod ir;
pub mod types;

// Re-export common types for convenience
pub use common::{MemoryPool, VexelError, VexelResult};

// Re-export type system for convenience
pub use types::{
    DataChunk, LogicalType, PhysicalType, SelectionVector, TypeUtils, ValidityMask, Value, Vector,
};

// Re-export the typed-expression IR for convenience
pub use ir::{TypedExpr, TypedExprRef};

// Re-export the expression system for convenience
pub use expression::{
    CompileOptions, EvalContext, Expr, ExprKind, ExprMetadata, ExprPtr, ExprSet, FieldSelector,
    SpecialForm,
};

// Re-export the cast engine for convenience
pub use cast::{CastHooks, CastOperator, CastPolicy, PrestoCastHooks, SparkCastHooks};

// Re-export function registration for convenience
pub use functions::{
    register_builtin_functions, FunctionMetadata, FunctionSignature, SimpleFunction,
    VectorFunction,
};

#[cfg(test)]
mod tests {

    #[test]
    fn it_works() {
        let result = 2 + 2;
        assert_eq!(result, 4);
    }
}
