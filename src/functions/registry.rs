//! Process-wide function registries.
//!
//! Scalar functions come in two flavors: simple functions evaluate one row
//! at a time over `Value`s and are adapted into vector functions at
//! compilation time; vector functions evaluate a whole selection at once.
//! Special forms and expression rewrites are registered here as well.
//!
//! All registries are process-wide and guarded by reader-writer locks.
//! Compilation takes a single read lock up front to compute the set of
//! flattenable call names and otherwise relies on per-name resolution.

use crate::common::error::VexelResult;
use crate::expression::context::EvalContext;
use crate::ir::TypedExprRef;
use crate::types::{LogicalType, SelectionVector, Value, Vector};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};
use tracing::debug;

/// A function signature: argument types and return type.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub name: String,
    pub arg_types: Vec<LogicalType>,
    pub return_type: LogicalType,
    /// When set, the last argument type may repeat.
    pub variadic: bool,
}

impl FunctionSignature {
    pub fn new(
        name: impl Into<String>,
        arg_types: Vec<LogicalType>,
        return_type: LogicalType,
    ) -> Self {
        Self {
            name: name.into(),
            arg_types,
            return_type,
            variadic: false,
        }
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// Whether this signature accepts the given argument types, using
    /// structural type equivalence.
    pub fn matches(&self, arg_types: &[LogicalType]) -> bool {
        if self.variadic {
            let fixed = self.arg_types.len().saturating_sub(1);
            if arg_types.len() < fixed || self.arg_types.is_empty() {
                return false;
            }
            let last = self.arg_types.last().unwrap();
            self.arg_types[..fixed]
                .iter()
                .zip(arg_types.iter())
                .all(|(a, b)| a.equivalent(b))
                && arg_types[fixed..].iter().all(|t| last.equivalent(t))
        } else {
            self.arg_types.len() == arg_types.len()
                && self
                    .arg_types
                    .iter()
                    .zip(arg_types.iter())
                    .all(|(a, b)| a.equivalent(b))
        }
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, ty) in self.arg_types.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", ty)?;
        }
        if self.variadic {
            write!(f, "...")?;
        }
        write!(f, ") -> {}", self.return_type)
    }
}

/// Execution-relevant properties of a registered function.
#[derive(Debug, Clone)]
pub struct FunctionMetadata {
    /// Same inputs always produce the same output.
    pub deterministic: bool,
    /// A null in any argument yields a null output without calling the
    /// function for that row.
    pub default_null_behavior: bool,
    /// Nested calls of this function with type-equivalent inputs may be
    /// flattened into one n-ary call.
    pub supports_flattening: bool,
    /// Relative cost hint; lower resolves first among equal matches.
    pub priority: u32,
}

impl Default for FunctionMetadata {
    fn default() -> Self {
        Self {
            deterministic: true,
            default_null_behavior: true,
            supports_flattening: false,
            priority: 100,
        }
    }
}

/// A scalar function evaluated over a selection of rows at once.
pub trait VectorFunction: Send + Sync {
    fn apply(
        &self,
        rows: &SelectionVector,
        args: &[Vector],
        return_type: &LogicalType,
        ctx: &mut EvalContext,
    ) -> VexelResult<Vector>;
}

/// Row-at-a-time function body for simple functions.
pub type ScalarFn = fn(&[Value]) -> VexelResult<Value>;

/// A simple function: one signature plus a row-wise body.
pub struct SimpleFunction {
    pub signature: FunctionSignature,
    pub metadata: FunctionMetadata,
    pub function: ScalarFn,
}

impl fmt::Debug for SimpleFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleFunction")
            .field("signature", &self.signature)
            .finish()
    }
}

impl SimpleFunction {
    /// Instantiate this simple function as a vector function.
    pub fn create_vector_function(&self) -> Arc<dyn VectorFunction> {
        Arc::new(SimpleVectorAdapter {
            function: self.function,
            default_null_behavior: self.metadata.default_null_behavior,
        })
    }
}

/// Adapts a row-wise scalar function to the vector interface.
struct SimpleVectorAdapter {
    function: ScalarFn,
    default_null_behavior: bool,
}

impl VectorFunction for SimpleVectorAdapter {
    fn apply(
        &self,
        rows: &SelectionVector,
        args: &[Vector],
        return_type: &LogicalType,
        ctx: &mut EvalContext,
    ) -> VexelResult<Vector> {
        let mut result = Vector::new(return_type.clone(), rows.required_size());
        result.resize(rows.required_size())?;

        let mut arg_values = Vec::with_capacity(args.len());
        for row in rows.iter() {
            arg_values.clear();
            let mut has_null = false;
            for arg in args {
                let value = arg.get_value(row)?;
                has_null |= value.is_null();
                arg_values.push(value);
            }
            if has_null && self.default_null_behavior {
                result.set_null(row);
                ctx.note_default_null_row_skipped();
                continue;
            }
            match (self.function)(&arg_values) {
                Ok(value) => result.set_value(row, &value)?,
                Err(err) if err.is_user_error() => ctx.set_error(row, err),
                Err(err) => return Err(err),
            }
        }
        Ok(result)
    }
}

struct VectorFunctionEntry {
    signatures: Vec<FunctionSignature>,
    function: Arc<dyn VectorFunction>,
    metadata: FunctionMetadata,
}

type SimpleFunctionMap = FxHashMap<String, Vec<Arc<SimpleFunction>>>;
type VectorFunctionMap = FxHashMap<String, VectorFunctionEntry>;

fn simple_functions() -> &'static RwLock<SimpleFunctionMap> {
    static REGISTRY: OnceLock<RwLock<SimpleFunctionMap>> = OnceLock::new();
    REGISTRY.get_or_init(Default::default)
}

fn vector_functions() -> &'static RwLock<VectorFunctionMap> {
    static REGISTRY: OnceLock<RwLock<VectorFunctionMap>> = OnceLock::new();
    REGISTRY.get_or_init(Default::default)
}

/// Register a simple function. Multiple signatures may be registered under
/// the same name.
pub fn register_function(function: SimpleFunction) {
    debug!(name = %function.signature.name, "registering simple function");
    let name = function.signature.name.clone();
    simple_functions()
        .write()
        .unwrap()
        .entry(name)
        .or_default()
        .push(Arc::new(function));
}

/// Register a vector function under `name`.
pub fn register_vector_function(
    name: impl Into<String>,
    signatures: Vec<FunctionSignature>,
    function: Arc<dyn VectorFunction>,
    metadata: FunctionMetadata,
) {
    let name = name.into();
    debug!(name = %name, "registering vector function");
    vector_functions().write().unwrap().insert(
        name,
        VectorFunctionEntry {
            signatures,
            function,
            metadata,
        },
    );
}

/// Resolve a simple function by exact (equivalent) argument types.
pub fn resolve_function(name: &str, arg_types: &[LogicalType]) -> Option<Arc<SimpleFunction>> {
    let registry = simple_functions().read().unwrap();
    let candidates = registry.get(name)?;
    candidates
        .iter()
        .filter(|f| f.signature.matches(arg_types))
        .min_by_key(|f| f.metadata.priority)
        .cloned()
}

/// Resolve a simple function allowing implicit numeric widening of
/// arguments. `coercions` is filled 1:1 with the argument list: `Some(t)`
/// where the argument must be cast to `t`, `None` where it already matches.
pub fn resolve_function_with_coercions(
    name: &str,
    arg_types: &[LogicalType],
    coercions: &mut Vec<Option<LogicalType>>,
) -> Option<Arc<SimpleFunction>> {
    if let Some(found) = resolve_function(name, arg_types) {
        coercions.clear();
        coercions.resize(arg_types.len(), None);
        return Some(found);
    }

    let registry = simple_functions().read().unwrap();
    let candidates = registry.get(name)?;
    'candidate: for candidate in candidates {
        let params = &candidate.signature.arg_types;
        if candidate.signature.variadic || params.len() != arg_types.len() {
            continue;
        }
        let mut attempt = Vec::with_capacity(arg_types.len());
        for (arg, param) in arg_types.iter().zip(params.iter()) {
            if arg.equivalent(param) {
                attempt.push(None);
            } else {
                match crate::types::TypeUtils::common_type(arg, param) {
                    Ok(common) if common.equivalent(param) => attempt.push(Some(param.clone())),
                    _ => continue 'candidate,
                }
            }
        }
        *coercions = attempt;
        return Some(candidate.clone());
    }
    None
}

/// Resolve a simple function and return its declared return type and
/// metadata.
pub fn resolve_function_with_metadata(
    name: &str,
    arg_types: &[LogicalType],
) -> Option<(LogicalType, FunctionMetadata)> {
    resolve_function(name, arg_types)
        .map(|f| (f.signature.return_type.clone(), f.metadata.clone()))
}

/// All registered simple-function signatures for `name`.
pub fn get_function_signatures(name: &str) -> Vec<FunctionSignature> {
    simple_functions()
        .read()
        .unwrap()
        .get(name)
        .map(|fs| fs.iter().map(|f| f.signature.clone()).collect())
        .unwrap_or_default()
}

/// Resolve a vector function implementation for the given argument types.
/// `constant_inputs` is aligned 1:1 with the arguments and carries the
/// constant value where an argument is a compiled constant; implementations
/// may specialize on it.
pub fn resolve_vector_function(
    name: &str,
    arg_types: &[LogicalType],
    _constant_inputs: &[Option<Value>],
) -> Option<(Arc<dyn VectorFunction>, LogicalType)> {
    resolve_vector_function_with_metadata(name, arg_types, _constant_inputs)
        .map(|(function, _, return_type)| (function, return_type))
}

/// Resolve a vector function along with its metadata.
pub fn resolve_vector_function_with_metadata(
    name: &str,
    arg_types: &[LogicalType],
    _constant_inputs: &[Option<Value>],
) -> Option<(Arc<dyn VectorFunction>, FunctionMetadata, LogicalType)> {
    let registry = vector_functions().read().unwrap();
    let entry = registry.get(name)?;
    let signature = entry.signatures.iter().find(|s| s.matches(arg_types))?;
    Some((
        entry.function.clone(),
        entry.metadata.clone(),
        signature.return_type.clone(),
    ))
}

/// All registered vector-function signatures for `name`.
pub fn get_vector_function_signatures(name: &str) -> Option<Vec<FunctionSignature>> {
    vector_functions()
        .read()
        .unwrap()
        .get(name)
        .map(|entry| entry.signatures.clone())
}

/// Whether a function with this name is deterministic; `None` when the name
/// is not registered at all.
pub fn is_deterministic(name: &str) -> Option<bool> {
    if let Some(entry) = vector_functions().read().unwrap().get(name) {
        return Some(entry.metadata.deterministic);
    }
    let registry = simple_functions().read().unwrap();
    registry
        .get(name)
        .and_then(|fs| fs.iter().map(|f| f.metadata.deterministic).reduce(|a, b| a && b))
}

/// Remove every registration under `name`.
pub fn remove_function(name: &str) {
    debug!(name = %name, "removing function");
    simple_functions().write().unwrap().remove(name);
    vector_functions().write().unwrap().remove(name);
}

/// Clear both function registries.
pub fn clear_function_registry() {
    simple_functions().write().unwrap().clear();
    vector_functions().write().unwrap().clear();
}

/// Out of the given call names, the subset whose registered metadata allows
/// flattening. Takes the vector registry read lock exactly once.
pub fn flattening_candidates(names: &FxHashSet<String>) -> FxHashSet<String> {
    let registry = vector_functions().read().unwrap();
    names
        .iter()
        .filter(|name| {
            registry
                .get(name.as_str())
                .map(|entry| entry.metadata.supports_flattening)
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

// ---- special forms ----

/// Names evaluated with non-strict (special form) semantics.
pub const SPECIAL_FORM_NAMES: &[&str] = &[
    "and",
    "or",
    "if",
    "try",
    "switch",
    "coalesce",
    "cast",
    "try_cast",
    "row_constructor",
];

/// Whether `name` is a registered special form.
pub fn is_special_form(name: &str) -> bool {
    SPECIAL_FORM_NAMES.contains(&name)
}

/// Resolve the return type of a special form that can be called through a
/// plain `Call` node. Forms with dedicated IR nodes (cast, row constructor)
/// are not callable.
pub fn resolve_callable_special_form(
    name: &str,
    arg_types: &[LogicalType],
) -> Option<LogicalType> {
    match name {
        "and" | "or" => {
            (!arg_types.is_empty() && arg_types.iter().all(|t| *t == LogicalType::Boolean))
                .then_some(LogicalType::Boolean)
        }
        "if" => {
            if (arg_types.len() == 2 || arg_types.len() == 3)
                && arg_types[0] == LogicalType::Boolean
            {
                if arg_types.len() == 3 && !arg_types[1].equivalent(&arg_types[2]) {
                    return None;
                }
                Some(arg_types[1].clone())
            } else {
                None
            }
        }
        "try" => (arg_types.len() == 1).then(|| arg_types[0].clone()),
        "coalesce" => {
            let first = arg_types.first()?;
            arg_types
                .iter()
                .all(|t| t.equivalent(first))
                .then(|| first.clone())
        }
        "switch" => {
            // switch(cond1, value1, cond2, value2, ..., [default])
            if arg_types.len() < 2 {
                return None;
            }
            Some(arg_types[1].clone())
        }
        _ => None,
    }
}

/// Resolve a simple function or, failing that, a callable special form.
pub fn resolve_function_or_callable_special_form(
    name: &str,
    arg_types: &[LogicalType],
) -> Option<LogicalType> {
    resolve_function(name, arg_types)
        .map(|f| f.signature.return_type.clone())
        .or_else(|| resolve_callable_special_form(name, arg_types))
}

// ---- expression rewrites ----

/// A rewrite inspects a typed expression and optionally returns a
/// replacement. Rewrites run before compilation of every node; the first
/// one that returns a replacement wins.
pub type ExpressionRewrite = fn(&TypedExprRef) -> Option<TypedExprRef>;

fn rewrites() -> &'static RwLock<Vec<ExpressionRewrite>> {
    static REGISTRY: OnceLock<RwLock<Vec<ExpressionRewrite>>> = OnceLock::new();
    REGISTRY.get_or_init(Default::default)
}

/// Register an expression rewrite.
pub fn register_expression_rewrite(rewrite: ExpressionRewrite) {
    rewrites().write().unwrap().push(rewrite);
}

/// Snapshot of the registered rewrites, in registration order.
pub fn expression_rewrites() -> Vec<ExpressionRewrite> {
    rewrites().read().unwrap().clone()
}

/// Remove all registered rewrites.
pub fn clear_expression_rewrites() {
    rewrites().write().unwrap().clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_matching() {
        let sig = FunctionSignature::new(
            "plus",
            vec![LogicalType::Integer, LogicalType::Integer],
            LogicalType::Integer,
        );
        assert!(sig.matches(&[LogicalType::Integer, LogicalType::Integer]));
        assert!(!sig.matches(&[LogicalType::Integer]));
        assert!(!sig.matches(&[LogicalType::Integer, LogicalType::BigInt]));

        let variadic =
            FunctionSignature::new("concat", vec![LogicalType::Varchar], LogicalType::Varchar)
                .variadic();
        assert!(variadic.matches(&[LogicalType::Varchar]));
        assert!(variadic.matches(&[
            LogicalType::Varchar,
            LogicalType::Varchar,
            LogicalType::Varchar,
            LogicalType::Varchar
        ]));
        assert!(!variadic.matches(&[LogicalType::Varchar, LogicalType::Integer]));
    }

    #[test]
    fn test_signature_display() {
        let sig = FunctionSignature::new(
            "lt",
            vec![LogicalType::BigInt, LogicalType::BigInt],
            LogicalType::Boolean,
        );
        assert_eq!(sig.to_string(), "lt(BIGINT, BIGINT) -> BOOLEAN");
    }

    #[test]
    fn test_special_form_names() {
        assert!(is_special_form("and"));
        assert!(is_special_form("try_cast"));
        assert!(!is_special_form("plus"));
    }

    #[test]
    fn test_callable_special_form_resolution() {
        assert_eq!(
            resolve_callable_special_form("if", &[
                LogicalType::Boolean,
                LogicalType::Integer,
                LogicalType::Integer
            ]),
            Some(LogicalType::Integer)
        );
        assert_eq!(
            resolve_callable_special_form("if", &[
                LogicalType::Boolean,
                LogicalType::Integer,
                LogicalType::Varchar
            ]),
            None
        );
        assert_eq!(
            resolve_callable_special_form("coalesce", &[
                LogicalType::Varchar,
                LogicalType::Varchar
            ]),
            Some(LogicalType::Varchar)
        );
        assert_eq!(resolve_callable_special_form("cast", &[LogicalType::Integer]), None);
    }
}
