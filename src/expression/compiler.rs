//! Compilation of typed expression trees into the executable graph.
//!
//! The compiler walks a forest of [`TypedExpr`] trees and produces shared
//! [`Expr`] nodes. Within one lexical scope, structurally equal subtrees
//! compile to the same node (common subexpression elimination). Lambdas
//! open child scopes; free variables in a lambda body are detected and
//! promoted to captures of every enclosing scope that does not define
//! them. Nested AND/OR calls, and calls to functions whose registry
//! metadata allows it, are flattened into one n-ary call.

use crate::cast::{CastHooks, PrestoCastHooks};
use crate::common::error::{VexelError, VexelResult};
use crate::common::pool::MemoryPool;
use crate::expression::expr::{Expr, ExprPtr, SpecialForm};
use crate::expression::fold;
use crate::functions::registry;
use crate::internal_err;
use crate::ir::{TypedExpr, TypedExprRef};
use crate::types::{LogicalType, Value};
use rustc_hash::{FxHashMap, FxHashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, trace};

/// Options controlling compilation.
pub struct CompileOptions {
    /// Speculatively evaluate constant subtrees at compilation time.
    pub enable_constant_folding: bool,
    /// The dialect hooks attached to compiled casts.
    pub cast_hooks: Arc<dyn CastHooks>,
    /// The memory pool constant materialization draws from during
    /// compilation; the compiled set keeps it for execution. Defaults to
    /// an unbounded pool; pass one from [`MemoryPool::with_limit`] to
    /// bound output allocation.
    pub pool: Arc<MemoryPool>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            enable_constant_folding: true,
            cast_hooks: Arc::new(PrestoCastHooks::new()),
            pool: Arc::new(MemoryPool::new()),
        }
    }
}

/// The result of compiling a forest of expressions.
pub struct CompiledExprs {
    /// Compiled top-level expressions, 1:1 with the sources.
    pub exprs: Vec<ExprPtr>,
    /// Shared nodes that memoize results and must be reset between batches.
    pub to_reset: Vec<ExprPtr>,
}

/// Dedup-map key over typed expression trees: pointer identity first,
/// structural hash and equality otherwise. Holding the `Arc` keeps
/// rewritten trees alive for the lifetime of the table.
#[derive(Clone)]
struct ExprKey(TypedExprRef);

impl PartialEq for ExprKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || *self.0 == *other.0
    }
}

impl Eq for ExprKey {}

impl Hash for ExprKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// An outer-scope column referenced from inside a lambda.
struct Capture {
    field: String,
    reference: ExprPtr,
    /// The IR node the reference was compiled from; keys the parent
    /// scope's dedup table.
    field_access: TypedExprRef,
}

/// A lexical scope. The top-level scope has no locals and no parent; each
/// lambda opens a child scope whose locals are its formal parameters.
/// Common subexpression elimination only applies within one scope.
struct Scope {
    locals: Vec<String>,
    parent: Option<usize>,
    captures: Vec<Capture>,
    visited: FxHashMap<ExprKey, ExprPtr>,
}

impl Scope {
    fn top() -> Self {
        Self {
            locals: Vec::new(),
            parent: None,
            captures: Vec::new(),
            visited: FxHashMap::default(),
        }
    }

    fn lambda(locals: Vec<String>, parent: usize) -> Self {
        Self {
            locals,
            parent: Some(parent),
            captures: Vec::new(),
            visited: FxHashMap::default(),
        }
    }
}

/// Compile a forest of typed expressions against the process-wide
/// registries.
pub fn compile_expressions(
    sources: &[TypedExprRef],
    options: &CompileOptions,
) -> VexelResult<CompiledExprs> {
    // Precompute the set of calls that support flattening. This takes the
    // registry lock once instead of once per call site.
    let mut call_names = FxHashSet::default();
    for source in sources {
        collect_call_names(source, &mut call_names);
    }
    let mut flattening_candidates = registry::flattening_candidates(&call_names);
    flattening_candidates.insert("and".to_string());
    flattening_candidates.insert("or".to_string());
    debug!(
        sources = sources.len(),
        flattenable = flattening_candidates.len(),
        "compiling expression forest"
    );

    let mut compiler = ExprCompiler {
        options,
        scopes: vec![Scope::top()],
        to_reset: Vec::new(),
        flattening_candidates,
        rewrites: registry::expression_rewrites(),
    };

    let mut exprs = Vec::with_capacity(sources.len());
    for source in sources {
        exprs.push(compiler.compile_expression(source, 0)?);
    }
    Ok(CompiledExprs {
        exprs,
        to_reset: compiler.to_reset,
    })
}

struct ExprCompiler<'a> {
    options: &'a CompileOptions,
    /// Scope stack; index 0 is the top-level scope.
    scopes: Vec<Scope>,
    to_reset: Vec<ExprPtr>,
    flattening_candidates: FxHashSet<String>,
    rewrites: Vec<registry::ExpressionRewrite>,
}

impl ExprCompiler<'_> {
    fn compile_expression(
        &mut self,
        expr: &TypedExprRef,
        scope_id: usize,
    ) -> VexelResult<ExprPtr> {
        let rewritten = self.rewrite_expression(expr);
        self.compile_rewritten(&rewritten, scope_id)
    }

    /// Apply registered rewrites; the first one that produces a
    /// replacement wins. The rewritten tree stays alive through the dedup
    /// table key.
    fn rewrite_expression(&self, expr: &TypedExprRef) -> TypedExprRef {
        for rewrite in &self.rewrites {
            if let Some(rewritten) = rewrite(expr) {
                trace!(kind = expr.kind_name(), "expression rewritten");
                return rewritten;
            }
        }
        expr.clone()
    }

    fn compile_rewritten(
        &mut self,
        expr: &TypedExprRef,
        scope_id: usize,
    ) -> VexelResult<ExprPtr> {
        if let Some(already) = self.scopes[scope_id].visited.get(&ExprKey(expr.clone())) {
            let already = already.clone();
            if !already.is_multiply_referenced() {
                // Promotion changes a metadata-relevant property, so the
                // cached metadata is recomputed.
                self.to_reset.push(already.clone());
                already.set_multiply_referenced();
                already.clear_metadata();
                already.compute_metadata();
            }
            return Ok(already);
        }

        // Lambdas compile their body in a child scope, not here.
        let compiled_inputs = if matches!(**expr, TypedExpr::Lambda { .. }) {
            Vec::new()
        } else {
            self.compile_inputs(expr, scope_id)?
        };

        let result = match &**expr {
            TypedExpr::Constant { ty, value } => {
                Expr::constant_typed(ty.clone(), value.clone())
            }
            TypedExpr::FieldAccess { ty, name, .. } => {
                let reference = Expr::field(ty.clone(), compiled_inputs, name.clone());
                if expr.is_input_column() {
                    // Only top-level input columns participate in capture
                    // resolution, not struct fields.
                    self.capture_field_reference(&reference, expr, scope_id);
                }
                reference
            }
            TypedExpr::Dereference { ty, index, .. } => {
                Expr::field_at(ty.clone(), compiled_inputs, *index)
            }
            TypedExpr::Cast { ty, try_cast, .. } => {
                self.compile_cast(ty, *try_cast, compiled_inputs)?
            }
            TypedExpr::Call { ty, name, .. } => {
                self.compile_call(ty, name, compiled_inputs)?
            }
            TypedExpr::RowConstructor { ty, .. } => {
                Expr::special_form(SpecialForm::RowConstructor, ty.clone(), compiled_inputs)
            }
            TypedExpr::Lambda { .. } => self.compile_lambda(expr, scope_id)?,
            TypedExpr::Input { .. } => {
                return Err(VexelError::InvalidExpression(
                    "An input reference can only occur under a field access".to_string(),
                ))
            }
        };

        result.compute_metadata();

        // If the node is already a constant, folding it is redundant.
        let compiled = if self.options.enable_constant_folding && !result.is_constant_expr() {
            fold::try_fold_if_constant(&result, &self.options.pool)?
        } else {
            result
        };

        self.scopes[scope_id]
            .visited
            .insert(ExprKey(expr.clone()), compiled.clone());
        Ok(compiled)
    }

    fn compile_inputs(
        &mut self,
        expr: &TypedExprRef,
        scope_id: usize,
    ) -> VexelResult<Vec<ExprPtr>> {
        let flatten_if = should_flatten(expr, &self.flattening_candidates);
        let mut compiled = Vec::with_capacity(expr.inputs().len());
        for input in expr.inputs() {
            if matches!(**input, TypedExpr::Input { .. }) {
                if !matches!(**expr, TypedExpr::FieldAccess { .. }) {
                    return Err(VexelError::InvalidExpression(
                        "An input reference can only occur under a field access".to_string(),
                    ));
                }
                // Input references compile to nothing themselves.
            } else if let Some(flatten_call) = &flatten_if {
                let mut flat = Vec::new();
                flatten_input(input, flatten_call, &mut flat);
                for flattened in flat {
                    compiled.push(self.compile_expression(&flattened, scope_id)?);
                }
            } else {
                compiled.push(self.compile_expression(input, scope_id)?);
            }
        }
        Ok(compiled)
    }

    fn compile_cast(
        &self,
        to_type: &LogicalType,
        try_cast: bool,
        inputs: Vec<ExprPtr>,
    ) -> VexelResult<ExprPtr> {
        if inputs.len() != 1 {
            return Err(internal_err!("Cast expects one input, got {}", inputs.len()));
        }
        if inputs[0].ty() == to_type {
            return Ok(inputs.into_iter().next().unwrap());
        }
        Ok(Expr::special_form(
            SpecialForm::Cast {
                try_cast,
                hooks: self.options.cast_hooks.clone(),
            },
            to_type.clone(),
            inputs,
        ))
    }

    fn compile_call(
        &self,
        ty: &LogicalType,
        name: &str,
        inputs: Vec<ExprPtr>,
    ) -> VexelResult<ExprPtr> {
        if registry::is_special_form(name) {
            let form = self.make_special_form(name);
            return Ok(Expr::special_form(form, ty.clone(), inputs));
        }

        let input_types: Vec<LogicalType> = inputs.iter().map(|i| i.ty().clone()).collect();
        let constant_inputs = get_constant_inputs(&inputs);

        if let Some((function, metadata, _)) =
            registry::resolve_vector_function_with_metadata(name, &input_types, &constant_inputs)
        {
            return Ok(Expr::function(ty.clone(), inputs, function, metadata, name));
        }

        if let Some(entry) = registry::resolve_function(name, &input_types) {
            if !ty.equivalent(&entry.signature.return_type) {
                return Err(VexelError::ReturnTypeMismatch {
                    name: name.to_string(),
                    registered: entry.signature.return_type.to_string(),
                    declared: ty.to_string(),
                    arg_types: format_types(&input_types),
                });
            }
            let function = entry.create_vector_function();
            return Ok(Expr::function(
                ty.clone(),
                inputs,
                function,
                entry.metadata.clone(),
                name,
            ));
        }

        let mut signatures: Vec<String> = Vec::new();
        if let Some(vector_signatures) = registry::get_vector_function_signatures(name) {
            signatures.extend(vector_signatures.iter().map(|s| format!("({})", s)));
        }
        signatures.extend(
            registry::get_function_signatures(name)
                .iter()
                .map(|s| format!("({})", s)),
        );

        Err(VexelError::FunctionNotRegistered {
            name: name.to_string(),
            arg_types: format_types(&input_types),
            signatures: if signatures.is_empty() {
                String::new()
            } else {
                format!(
                    " Found function registered with the following signatures:\n{}",
                    signatures.join("\n")
                )
            },
        })
    }

    fn make_special_form(&self, name: &str) -> SpecialForm {
        match name {
            "and" => SpecialForm::And,
            "or" => SpecialForm::Or,
            "if" => SpecialForm::If,
            "try" => SpecialForm::Try,
            "switch" => SpecialForm::Switch,
            "coalesce" => SpecialForm::Coalesce,
            "cast" => SpecialForm::Cast {
                try_cast: false,
                hooks: self.options.cast_hooks.clone(),
            },
            "try_cast" => SpecialForm::Cast {
                try_cast: true,
                hooks: self.options.cast_hooks.clone(),
            },
            "row_constructor" => SpecialForm::RowConstructor,
            other => unreachable!("not a special form: {}", other),
        }
    }

    fn compile_lambda(
        &mut self,
        expr: &TypedExprRef,
        scope_id: usize,
    ) -> VexelResult<ExprPtr> {
        let TypedExpr::Lambda {
            ty,
            signature,
            body,
        } = &**expr
        else {
            return Err(internal_err!("compile_lambda on non-lambda"));
        };

        let locals = signature.iter().map(|(name, _)| name.clone()).collect();
        self.scopes.push(Scope::lambda(locals, scope_id));
        let lambda_scope = self.scopes.len() - 1;
        let compiled_body = self.compile_expression(body, lambda_scope)?;
        let lambda_scope = self.scopes.pop().unwrap();

        // Resolve captures against the parent scope: reuse a field
        // reference the parent already compiled, or materialize one there.
        let mut capture_references = Vec::with_capacity(lambda_scope.captures.len());
        for capture in lambda_scope.captures {
            let key = ExprKey(capture.field_access.clone());
            let reference = match self.scopes[scope_id].visited.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let fresh =
                        Expr::field(capture.reference.ty().clone(), vec![], capture.field);
                    fresh.compute_metadata();
                    self.scopes[scope_id].visited.insert(key, fresh.clone());
                    fresh
                }
            };
            capture_references.push(reference);
        }

        Ok(Expr::lambda(
            ty.clone(),
            signature.clone(),
            capture_references,
            compiled_body,
        ))
    }

    /// Record `reference` as a capture in every scope from the reference's
    /// scope outwards that neither defines the name as a local nor already
    /// captures it. The top-level scope never captures.
    fn capture_field_reference(
        &mut self,
        reference: &ExprPtr,
        field_access: &TypedExprRef,
        scope_id: usize,
    ) {
        let field = reference.name().to_string();
        let mut current = scope_id;
        while let Some(parent) = self.scopes[current].parent {
            let scope = &mut self.scopes[current];
            if scope.locals.contains(&field)
                || scope.captures.iter().any(|c| c.field == field)
            {
                return;
            }
            scope.captures.push(Capture {
                field: field.clone(),
                reference: reference.clone(),
                field_access: field_access.clone(),
            });
            current = parent;
        }
    }
}

/// Whether all of an expression's inputs have pairwise equivalent types.
fn all_input_types_equivalent(expr: &TypedExprRef) -> bool {
    let inputs = expr.inputs();
    inputs
        .iter()
        .skip(1)
        .all(|input| inputs[0].ty().equivalent(input.ty()))
}

/// Decide whether a call's inputs should be flattened, and under which
/// name. AND and OR always flatten; other candidates flatten only while
/// their input types are equivalent.
fn should_flatten(
    expr: &TypedExprRef,
    flattening_candidates: &FxHashSet<String>,
) -> Option<String> {
    if let TypedExpr::Call { name, .. } = &**expr {
        if name == "and"
            || name == "or"
            || (flattening_candidates.contains(name) && all_input_types_equivalent(expr))
        {
            return Some(name.clone());
        }
    }
    None
}

fn is_call(expr: &TypedExprRef, name: &str) -> bool {
    expr.call_name() == Some(name)
}

/// Recursively flatten nested calls of `flatten_call` into a vector of
/// their inputs. Recursion stops exploring a branch when it meets a
/// different call or inputs of differing types.
fn flatten_input(input: &TypedExprRef, flatten_call: &str, flat: &mut Vec<TypedExprRef>) {
    if is_call(input, flatten_call) && all_input_types_equivalent(input) {
        for child in input.inputs() {
            flatten_input(child, flatten_call, flat);
        }
    } else {
        flat.push(input.clone());
    }
}

/// A vector aligned 1:1 with compiled inputs carrying the constant value
/// for inputs that compiled to constants.
fn get_constant_inputs(inputs: &[ExprPtr]) -> Vec<Option<Value>> {
    inputs
        .iter()
        .map(|input| input.constant_value().cloned())
        .collect()
}

/// Collect every call name in an expression tree, descending into lambda
/// bodies.
fn collect_call_names(expr: &TypedExprRef, names: &mut FxHashSet<String>) {
    if let Some(name) = expr.call_name() {
        names.insert(name.to_string());
    }
    for input in expr.inputs() {
        collect_call_names(input, names);
    }
}

fn format_types(types: &[LogicalType]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
