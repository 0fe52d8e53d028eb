//! Function registries and the built-in function set.

pub mod builtins;
pub mod registry;

pub use builtins::register_builtin_functions;
pub use registry::{
    clear_expression_rewrites, clear_function_registry, expression_rewrites,
    flattening_candidates, get_function_signatures, get_vector_function_signatures,
    is_deterministic, is_special_form, register_expression_rewrite, register_function,
    register_vector_function, remove_function, resolve_callable_special_form, resolve_function,
    resolve_function_or_callable_special_form, resolve_function_with_coercions,
    resolve_function_with_metadata, resolve_vector_function,
    resolve_vector_function_with_metadata, ExpressionRewrite, FunctionMetadata,
    FunctionSignature, ScalarFn, SimpleFunction, VectorFunction,
};
