//! Typed expression trees produced by a query planner.
//!
//! These nodes are the input to expression compilation. They are immutable,
//! structurally hashable and comparable, which is what the per-scope
//! deduplication table keys on.

use crate::types::{LogicalType, Value};
use std::sync::Arc;

/// Shared reference to a typed expression node.
pub type TypedExprRef = Arc<TypedExpr>;

/// A node in a typed expression tree.
#[derive(Debug, Clone, PartialEq, Hash)]
pub enum TypedExpr {
    /// A literal value.
    Constant { ty: LogicalType, value: Value },
    /// A reference to the ambient input row. Only valid directly under a
    /// `FieldAccess`.
    Input { ty: LogicalType },
    /// Projects a named field out of its input. With an `Input` child this
    /// references a top-level column.
    FieldAccess {
        ty: LogicalType,
        name: String,
        inputs: Vec<TypedExprRef>,
    },
    /// Projects a field out of its input by position.
    Dereference {
        ty: LogicalType,
        index: usize,
        inputs: Vec<TypedExprRef>,
    },
    /// A call to a named scalar function or special form.
    Call {
        ty: LogicalType,
        name: String,
        inputs: Vec<TypedExprRef>,
    },
    /// A cast of the single input to `ty`. `try_cast` yields null instead of
    /// an error on domain failures.
    Cast {
        ty: LogicalType,
        inputs: Vec<TypedExprRef>,
        try_cast: bool,
    },
    /// Constructs a row from its inputs.
    RowConstructor {
        ty: LogicalType,
        inputs: Vec<TypedExprRef>,
    },
    /// A lambda with named formal parameters and a body expression.
    Lambda {
        ty: LogicalType,
        signature: Vec<(String, LogicalType)>,
        body: TypedExprRef,
    },
}

impl TypedExpr {
    /// The result type of this expression.
    pub fn ty(&self) -> &LogicalType {
        match self {
            TypedExpr::Constant { ty, .. }
            | TypedExpr::Input { ty }
            | TypedExpr::FieldAccess { ty, .. }
            | TypedExpr::Dereference { ty, .. }
            | TypedExpr::Call { ty, .. }
            | TypedExpr::Cast { ty, .. }
            | TypedExpr::RowConstructor { ty, .. }
            | TypedExpr::Lambda { ty, .. } => ty,
        }
    }

    /// The child expressions, in order. A lambda's only child is its body.
    pub fn inputs(&self) -> &[TypedExprRef] {
        match self {
            TypedExpr::Constant { .. } | TypedExpr::Input { .. } => &[],
            TypedExpr::FieldAccess { inputs, .. }
            | TypedExpr::Dereference { inputs, .. }
            | TypedExpr::Call { inputs, .. }
            | TypedExpr::Cast { inputs, .. }
            | TypedExpr::RowConstructor { inputs, .. } => inputs,
            TypedExpr::Lambda { body, .. } => std::slice::from_ref(body),
        }
    }

    /// Whether this is a `FieldAccess` directly over the ambient input row,
    /// i.e. a top-level column reference rather than a struct field access.
    pub fn is_input_column(&self) -> bool {
        match self {
            TypedExpr::FieldAccess { inputs, .. } => {
                inputs.len() == 1 && matches!(*inputs[0], TypedExpr::Input { .. })
            }
            _ => false,
        }
    }

    /// The call name, if this is a `Call`.
    pub fn call_name(&self) -> Option<&str> {
        match self {
            TypedExpr::Call { name, .. } => Some(name),
            _ => None,
        }
    }

    /// A short name for the node kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            TypedExpr::Constant { .. } => "constant",
            TypedExpr::Input { .. } => "input",
            TypedExpr::FieldAccess { .. } => "field access",
            TypedExpr::Dereference { .. } => "dereference",
            TypedExpr::Call { .. } => "call",
            TypedExpr::Cast { .. } => "cast",
            TypedExpr::RowConstructor { .. } => "row constructor",
            TypedExpr::Lambda { .. } => "lambda",
        }
    }

    // ---- builders ----

    /// A constant with the type inferred from the value.
    pub fn constant(value: Value) -> TypedExprRef {
        let ty = value.get_type();
        Self::constant_typed(ty, value)
    }

    /// A constant with an explicit type, e.g. a typed NULL.
    pub fn constant_typed(ty: LogicalType, value: Value) -> TypedExprRef {
        Arc::new(TypedExpr::Constant { ty, value })
    }

    /// A reference to a top-level input column.
    pub fn column(name: impl Into<String>, ty: LogicalType) -> TypedExprRef {
        Arc::new(TypedExpr::FieldAccess {
            ty: ty.clone(),
            name: name.into(),
            inputs: vec![Arc::new(TypedExpr::Input { ty })],
        })
    }

    /// A named field access on an arbitrary input expression.
    pub fn field(
        input: TypedExprRef,
        name: impl Into<String>,
        ty: LogicalType,
    ) -> TypedExprRef {
        Arc::new(TypedExpr::FieldAccess {
            ty,
            name: name.into(),
            inputs: vec![input],
        })
    }

    /// A positional field access on an input expression.
    pub fn dereference(input: TypedExprRef, index: usize, ty: LogicalType) -> TypedExprRef {
        Arc::new(TypedExpr::Dereference {
            ty,
            index,
            inputs: vec![input],
        })
    }

    /// A function call.
    pub fn call(
        name: impl Into<String>,
        ty: LogicalType,
        inputs: Vec<TypedExprRef>,
    ) -> TypedExprRef {
        Arc::new(TypedExpr::Call {
            ty,
            name: name.into(),
            inputs,
        })
    }

    /// A cast to `ty`.
    pub fn cast(ty: LogicalType, input: TypedExprRef) -> TypedExprRef {
        Arc::new(TypedExpr::Cast {
            ty,
            inputs: vec![input],
            try_cast: false,
        })
    }

    /// A try-cast to `ty`.
    pub fn try_cast(ty: LogicalType, input: TypedExprRef) -> TypedExprRef {
        Arc::new(TypedExpr::Cast {
            ty,
            inputs: vec![input],
            try_cast: true,
        })
    }

    /// A row constructor; the row type's field names are generated.
    pub fn row(inputs: Vec<TypedExprRef>) -> TypedExprRef {
        let ty = LogicalType::Row(
            inputs
                .iter()
                .enumerate()
                .map(|(i, input)| (format!("c{}", i), input.ty().clone()))
                .collect(),
        );
        Arc::new(TypedExpr::RowConstructor { ty, inputs })
    }

    /// A lambda over the given formal parameters.
    pub fn lambda(signature: Vec<(String, LogicalType)>, body: TypedExprRef) -> TypedExprRef {
        let ty = LogicalType::Function {
            parameters: signature.iter().map(|(_, ty)| ty.clone()).collect(),
            returns: Box::new(body.ty().clone()),
        };
        Arc::new(TypedExpr::Lambda {
            ty,
            signature,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(expr: &TypedExpr) -> u64 {
        let mut hasher = DefaultHasher::new();
        expr.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_structural_equality_and_hash() {
        let a = TypedExpr::call(
            "plus",
            LogicalType::Integer,
            vec![
                TypedExpr::column("x", LogicalType::Integer),
                TypedExpr::constant(Value::integer(1)),
            ],
        );
        let b = TypedExpr::call(
            "plus",
            LogicalType::Integer,
            vec![
                TypedExpr::column("x", LogicalType::Integer),
                TypedExpr::constant(Value::integer(1)),
            ],
        );
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(*a, *b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let c = TypedExpr::call(
            "plus",
            LogicalType::Integer,
            vec![
                TypedExpr::column("y", LogicalType::Integer),
                TypedExpr::constant(Value::integer(1)),
            ],
        );
        assert_ne!(*a, *c);
    }

    #[test]
    fn test_input_column_detection() {
        let column = TypedExpr::column("x", LogicalType::Integer);
        assert!(column.is_input_column());

        let nested = TypedExpr::field(
            TypedExpr::column(
                "row_col",
                LogicalType::Row(vec![("inner".to_string(), LogicalType::Integer)]),
            ),
            "inner",
            LogicalType::Integer,
        );
        assert!(!nested.is_input_column());
    }

    #[test]
    fn test_lambda_type() {
        let body = TypedExpr::call(
            "plus",
            LogicalType::Integer,
            vec![
                TypedExpr::column("k", LogicalType::Integer),
                TypedExpr::constant(Value::integer(1)),
            ],
        );
        let lambda = TypedExpr::lambda(vec![("k".to_string(), LogicalType::Integer)], body);
        assert_eq!(
            lambda.ty(),
            &LogicalType::Function {
                parameters: vec![LogicalType::Integer],
                returns: Box::new(LogicalType::Integer),
            }
        );
        assert_eq!(lambda.inputs().len(), 1);
    }

    #[test]
    fn test_row_constructor_type() {
        let row = TypedExpr::row(vec![
            TypedExpr::constant(Value::integer(1)),
            TypedExpr::constant(Value::varchar("a")),
        ]);
        assert_eq!(
            row.ty(),
            &LogicalType::Row(vec![
                ("c0".to_string(), LogicalType::Integer),
                ("c1".to_string(), LogicalType::Varchar),
            ])
        );
    }
}
