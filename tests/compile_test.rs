//! Compiler integration tests: subexpression sharing, lambda captures,
//! call flattening, cast short-circuiting and constant folding.

use std::sync::Arc;
use vexel::expression::{CompileOptions, EvalContext, ExprKind, ExprSet};
use vexel::functions::{
    register_builtin_functions, register_expression_rewrite, register_vector_function,
    FunctionMetadata, FunctionSignature, VectorFunction,
};
use vexel::types::{DataChunk, LogicalType, SelectionVector, Value, Vector};
use vexel::{MemoryPool, TypedExpr, TypedExprRef, VexelError, VexelResult};

fn compile_one(source: TypedExprRef) -> VexelResult<ExprSet> {
    register_builtin_functions();
    ExprSet::compile(&[source], &CompileOptions::default())
}

fn int_column(name: &str) -> TypedExprRef {
    TypedExpr::column(name, LogicalType::Integer)
}

fn bool_column(name: &str) -> TypedExprRef {
    TypedExpr::column(name, LogicalType::Boolean)
}

fn plus(a: TypedExprRef, b: TypedExprRef) -> TypedExprRef {
    TypedExpr::call("plus", LogicalType::Integer, vec![a, b])
}

#[test]
fn test_cse_shares_equal_subtrees() -> VexelResult<()> {
    // plus(plus(x, 1), plus(x, 1)) with the inner tree built twice.
    let first = plus(int_column("x"), TypedExpr::constant(Value::integer(1)));
    let second = plus(int_column("x"), TypedExpr::constant(Value::integer(1)));
    assert!(!Arc::ptr_eq(&first, &second));

    let set = compile_one(plus(first, second))?;
    let outer = set.expr(0)?;
    assert_eq!(outer.inputs().len(), 2);
    assert!(Arc::ptr_eq(&outer.inputs()[0], &outer.inputs()[1]));
    assert!(outer.inputs()[0].is_multiply_referenced());
    // The unshared outer node is not promoted.
    assert!(!outer.is_multiply_referenced());
    Ok(())
}

#[test]
fn test_cse_across_sources_in_one_set() -> VexelResult<()> {
    register_builtin_functions();
    let a = plus(int_column("x"), TypedExpr::constant(Value::integer(7)));
    let b = plus(int_column("x"), TypedExpr::constant(Value::integer(7)));
    let set = ExprSet::compile(&[a, b], &CompileOptions::default())?;
    assert!(Arc::ptr_eq(set.expr(0)?, set.expr(1)?));
    assert!(set.expr(0)?.is_multiply_referenced());
    Ok(())
}

#[test]
fn test_lambda_without_free_variables_has_no_captures() -> VexelResult<()> {
    let body = plus(
        TypedExpr::column("k", LogicalType::Integer),
        TypedExpr::constant(Value::integer(1)),
    );
    let lambda = TypedExpr::lambda(vec![("k".to_string(), LogicalType::Integer)], body);
    let set = compile_one(lambda)?;

    match set.expr(0)?.kind() {
        ExprKind::Lambda { captures, .. } => assert!(captures.is_empty()),
        _ => panic!("expected a compiled lambda"),
    }
    Ok(())
}

#[test]
fn test_nested_lambda_captures_propagate_outward() -> VexelResult<()> {
    // lambda (a) -> lambda (k) -> plus(k, outer_x)
    let inner_body = plus(
        TypedExpr::column("k", LogicalType::Integer),
        int_column("outer_x"),
    );
    let inner = TypedExpr::lambda(vec![("k".to_string(), LogicalType::Integer)], inner_body);
    let outer = TypedExpr::lambda(vec![("a".to_string(), LogicalType::Integer)], inner);
    let set = compile_one(outer)?;

    let ExprKind::Lambda { captures, body, .. } = set.expr(0)?.kind() else {
        panic!("expected a compiled lambda");
    };
    // The outer lambda does not define outer_x, so it captures it too.
    assert_eq!(captures.len(), 1);
    assert_eq!(captures[0].name(), "outer_x");

    let ExprKind::Lambda {
        captures: inner_captures,
        ..
    } = body.kind()
    else {
        panic!("expected the body to be the inner lambda");
    };
    assert_eq!(inner_captures.len(), 1);
    assert_eq!(inner_captures[0].name(), "outer_x");
    Ok(())
}

#[test]
fn test_lambda_parameter_shadows_outer_name() -> VexelResult<()> {
    // lambda (x) -> plus(x, 1): x resolves to the formal parameter.
    let body = plus(
        TypedExpr::column("x", LogicalType::Integer),
        TypedExpr::constant(Value::integer(1)),
    );
    let lambda = TypedExpr::lambda(vec![("x".to_string(), LogicalType::Integer)], body);
    let set = compile_one(lambda)?;
    match set.expr(0)?.kind() {
        ExprKind::Lambda { captures, .. } => assert!(captures.is_empty()),
        _ => panic!("expected a compiled lambda"),
    }
    Ok(())
}

#[test]
fn test_and_flattening_keeps_or_nested() -> VexelResult<()> {
    // AND(a, AND(b, OR(c, d))) compiles to AND[a, b, OR(c, d)].
    let or_expr = TypedExpr::call(
        "or",
        LogicalType::Boolean,
        vec![bool_column("c"), bool_column("d")],
    );
    let inner_and = TypedExpr::call(
        "and",
        LogicalType::Boolean,
        vec![bool_column("b"), or_expr],
    );
    let top = TypedExpr::call(
        "and",
        LogicalType::Boolean,
        vec![bool_column("a"), inner_and],
    );

    let set = compile_one(top)?;
    let compiled = set.expr(0)?;
    assert_eq!(compiled.special_form_name(), Some("and"));
    assert_eq!(compiled.inputs().len(), 3);
    assert_eq!(compiled.inputs()[0].name(), "a");
    assert_eq!(compiled.inputs()[1].name(), "b");
    assert_eq!(compiled.inputs()[2].special_form_name(), Some("or"));
    assert_eq!(compiled.inputs()[2].inputs().len(), 2);
    Ok(())
}

/// A test-only variadic function registered as flattenable.
struct MergeFunction;

impl VectorFunction for MergeFunction {
    fn apply(
        &self,
        rows: &SelectionVector,
        args: &[Vector],
        return_type: &LogicalType,
        _ctx: &mut EvalContext,
    ) -> VexelResult<Vector> {
        let mut result = Vector::new(return_type.clone(), rows.required_size());
        result.resize(rows.required_size())?;
        for row in rows.iter() {
            let mut out = String::new();
            for arg in args {
                out.push_str(&arg.get_value(row)?.to_string());
            }
            result.set_value(row, &Value::varchar(out))?;
        }
        Ok(result)
    }
}

fn register_merge() {
    register_vector_function(
        "merge",
        vec![
            FunctionSignature::new("merge", vec![LogicalType::Varchar], LogicalType::Varchar)
                .variadic(),
            FunctionSignature::new(
                "merge",
                vec![LogicalType::Varchar, LogicalType::Integer],
                LogicalType::Varchar,
            ),
        ],
        Arc::new(MergeFunction),
        FunctionMetadata {
            supports_flattening: true,
            ..FunctionMetadata::default()
        },
    );
}

#[test]
fn test_flattenable_function_flattens_uniform_inputs() -> VexelResult<()> {
    register_merge();
    let varchar = |name: &str| TypedExpr::column(name, LogicalType::Varchar);
    let inner = TypedExpr::call(
        "merge",
        LogicalType::Varchar,
        vec![varchar("a"), varchar("b")],
    );
    let top = TypedExpr::call("merge", LogicalType::Varchar, vec![inner, varchar("c")]);

    let set = compile_one(top)?;
    let compiled = set.expr(0)?;
    assert_eq!(compiled.name(), "merge");
    assert_eq!(compiled.inputs().len(), 3);
    Ok(())
}

#[test]
fn test_flattening_stops_at_differing_input_types() -> VexelResult<()> {
    register_merge();
    let varchar = |name: &str| TypedExpr::column(name, LogicalType::Varchar);
    // The inner merge mixes VARCHAR and INTEGER inputs, so it must stay a
    // single nested input of the outer call.
    let inner = TypedExpr::call(
        "merge",
        LogicalType::Varchar,
        vec![varchar("a"), int_column("i")],
    );
    let top = TypedExpr::call("merge", LogicalType::Varchar, vec![inner, varchar("c")]);

    let set = compile_one(top)?;
    let compiled = set.expr(0)?;
    assert_eq!(compiled.inputs().len(), 2);
    assert_eq!(compiled.inputs()[0].name(), "merge");
    assert_eq!(compiled.inputs()[0].inputs().len(), 2);
    Ok(())
}

#[test]
fn test_cast_to_same_type_is_identity() -> VexelResult<()> {
    let set = compile_one(TypedExpr::cast(LogicalType::Integer, int_column("x")))?;
    let compiled = set.expr(0)?;
    assert!(matches!(compiled.kind(), ExprKind::FieldReference(_)));
    assert_eq!(compiled.name(), "x");

    let set = compile_one(TypedExpr::cast(LogicalType::Varchar, int_column("x")))?;
    assert_eq!(set.expr(0)?.special_form_name(), Some("cast"));
    Ok(())
}

#[test]
fn test_try_cast_compiles_to_try_cast_form() -> VexelResult<()> {
    let set = compile_one(TypedExpr::try_cast(LogicalType::Varchar, int_column("x")))?;
    assert_eq!(set.expr(0)?.special_form_name(), Some("try_cast"));
    Ok(())
}

#[test]
fn test_constant_folding_produces_constant() -> VexelResult<()> {
    let source = plus(
        TypedExpr::constant(Value::integer(1)),
        TypedExpr::constant(Value::integer(2)),
    );
    let set = compile_one(source)?;
    let compiled = set.expr(0)?;
    assert!(compiled.is_constant_expr());
    assert_eq!(compiled.constant_value(), Some(&Value::integer(3)));
    Ok(())
}

#[test]
fn test_constant_folding_swallows_user_errors() -> VexelResult<()> {
    // divide(1, 0) fails deterministically, but compilation must not: the
    // error surfaces only if the row is actually evaluated.
    let source = TypedExpr::call(
        "divide",
        LogicalType::Integer,
        vec![
            TypedExpr::constant(Value::integer(1)),
            TypedExpr::constant(Value::integer(0)),
        ],
    );
    let set = compile_one(source)?;
    let compiled = set.expr(0)?;
    assert!(!compiled.is_constant_expr());
    assert_eq!(compiled.name(), "divide");

    // Evaluating it surfaces the error per row.
    let chunk = DataChunk::with_rows(1);
    let rows = SelectionVector::sequential(1);
    let mut ctx = EvalContext::new();
    set.eval(0, &rows, &chunk, &mut ctx)?;
    assert!(ctx.has_errors());
    Ok(())
}

#[test]
fn test_constant_folding_can_be_disabled() -> VexelResult<()> {
    register_builtin_functions();
    let source = plus(
        TypedExpr::constant(Value::integer(1)),
        TypedExpr::constant(Value::integer(2)),
    );
    let options = CompileOptions {
        enable_constant_folding: false,
        ..CompileOptions::default()
    };
    let set = ExprSet::compile(&[source], &options)?;
    assert!(!set.expr(0)?.is_constant_expr());
    Ok(())
}

#[test]
fn test_unknown_function_lists_signatures() {
    register_builtin_functions();
    let err = compile_one(TypedExpr::call(
        "no_such_function",
        LogicalType::Integer,
        vec![int_column("x")],
    ))
    .unwrap_err();
    match &err {
        VexelError::FunctionNotRegistered { name, .. } => {
            assert_eq!(name, "no_such_function");
        }
        other => panic!("expected FunctionNotRegistered, got {:?}", other),
    }

    // A known name with unsupported argument types reports the registered
    // signatures.
    let err = compile_one(TypedExpr::call(
        "plus",
        LogicalType::Integer,
        vec![
            TypedExpr::column("s", LogicalType::Varchar),
            TypedExpr::column("t", LogicalType::Varchar),
        ],
    ))
    .unwrap_err();
    assert!(err.to_string().contains("plus(INTEGER, INTEGER)"));
}

#[test]
fn test_return_type_mismatch_is_rejected() {
    register_builtin_functions();
    let err = compile_one(TypedExpr::call(
        "plus",
        LogicalType::Varchar,
        vec![int_column("x"), TypedExpr::constant(Value::integer(1))],
    ))
    .unwrap_err();
    assert!(matches!(err, VexelError::ReturnTypeMismatch { .. }));
}

#[test]
fn test_input_reference_outside_field_access_fails() {
    let bad = TypedExpr::call(
        "plus",
        LogicalType::Integer,
        vec![
            std::sync::Arc::new(TypedExpr::Input {
                ty: LogicalType::Integer,
            }),
            TypedExpr::constant(Value::integer(1)),
        ],
    );
    let err = compile_one(bad).unwrap_err();
    assert!(matches!(err, VexelError::InvalidExpression(_)));
}

#[test]
fn test_rewrite_hook_replaces_expression() -> VexelResult<()> {
    register_builtin_functions();
    register_expression_rewrite(|expr| match &**expr {
        TypedExpr::Call { name, ty, .. } if name == "always_five" => {
            Some(TypedExpr::constant_typed(ty.clone(), Value::integer(5)))
        }
        _ => None,
    });

    let set = compile_one(TypedExpr::call(
        "always_five",
        LogicalType::Integer,
        vec![],
    ))?;
    assert_eq!(set.expr(0)?.constant_value(), Some(&Value::integer(5)));
    Ok(())
}

#[test]
fn test_row_constructor_compiles_and_evaluates() -> VexelResult<()> {
    let source = TypedExpr::row(vec![
        int_column("x"),
        TypedExpr::constant(Value::varchar("tag")),
    ]);
    let set = compile_one(source)?;
    assert_eq!(set.expr(0)?.special_form_name(), Some("row_constructor"));

    let column = Vector::from_values(&[Value::integer(9)])?;
    let chunk = DataChunk::from_named_vectors(vec![("x".to_string(), column)])?;
    let rows = SelectionVector::sequential(1);
    let mut ctx = EvalContext::new();
    let result = set.eval(0, &rows, &chunk, &mut ctx)?;
    assert_eq!(
        result.get_value(0)?,
        Value::Row(vec![
            ("c0".to_string(), Value::integer(9)),
            ("c1".to_string(), Value::varchar("tag")),
        ])
    );
    Ok(())
}

#[test]
fn test_end_to_end_eval_with_shared_subtree() -> VexelResult<()> {
    // plus(plus(x, 1), plus(x, 1)) evaluated over a column.
    let source = plus(
        plus(int_column("x"), TypedExpr::constant(Value::integer(1))),
        plus(int_column("x"), TypedExpr::constant(Value::integer(1))),
    );
    let set = compile_one(source)?;

    let column = Vector::from_values(&[Value::integer(1), Value::integer(10)])?;
    let chunk = DataChunk::from_named_vectors(vec![("x".to_string(), column)])?;
    let rows = SelectionVector::sequential(2);
    let mut ctx = EvalContext::new();
    let result = set.eval(0, &rows, &chunk, &mut ctx)?;
    assert_eq!(result.get_value(0)?, Value::integer(4));
    assert_eq!(result.get_value(1)?, Value::integer(22));
    set.clear();
    Ok(())
}

#[test]
fn test_bounded_pool_threads_through_compilation_and_eval() -> VexelResult<()> {
    register_builtin_functions();
    let pool = Arc::new(MemoryPool::with_limit(64));
    let options = CompileOptions {
        pool: pool.clone(),
        ..CompileOptions::default()
    };
    let source = plus(int_column("x"), TypedExpr::constant(Value::integer(1)));
    let set = ExprSet::compile(&[source], &options)?;
    assert!(Arc::ptr_eq(set.pool(), &pool));

    let column = Vector::from_values(&[Value::integer(1), Value::integer(2)])?;
    let chunk = DataChunk::from_named_vectors(vec![("x".to_string(), column)])?;
    let rows = SelectionVector::sequential(2);
    {
        let mut ctx = set.make_context();
        let result = set.eval(0, &rows, &chunk, &mut ctx)?;
        assert_eq!(result.get_value(1)?, Value::integer(3));
        assert!(pool.reserved() > 0);
    }
    // Dropping the context returns the batch's reservations.
    assert_eq!(pool.reserved(), 0);

    // A batch whose outputs exceed the limit aborts with a system error.
    let big_rows = SelectionVector::sequential(1000);
    let big_column = Vector::constant(LogicalType::Integer, &Value::integer(1), 1000)?;
    let big_chunk = DataChunk::from_named_vectors(vec![("x".to_string(), big_column)])?;
    let mut ctx = set.make_context();
    let err = set.eval(0, &big_rows, &big_chunk, &mut ctx).unwrap_err();
    assert!(!err.is_user_error());
    Ok(())
}

#[test]
fn test_null_propagates_through_default_null_functions() -> VexelResult<()> {
    let source = plus(int_column("x"), TypedExpr::constant(Value::integer(1)));
    let set = compile_one(source)?;

    let column =
        Vector::from_values_typed(LogicalType::Integer, &[Value::integer(1), Value::Null])?;
    let chunk = DataChunk::from_named_vectors(vec![("x".to_string(), column)])?;
    let rows = SelectionVector::sequential(2);
    let mut ctx = EvalContext::new();
    let result = set.eval(0, &rows, &chunk, &mut ctx)?;
    assert_eq!(result.get_value(0)?, Value::integer(2));
    assert!(result.get_value(1)?.is_null());
    assert!(!ctx.has_errors());
    Ok(())
}
