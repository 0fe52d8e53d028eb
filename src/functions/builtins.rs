//! Built-in scalar functions.
//!
//! A small arithmetic/comparison/string set registered at startup. The
//! registries accept further registrations at any time; these exist so an
//! engine embedding the compiler has a working core without wiring its own
//! function package first.

use crate::common::error::{VexelError, VexelResult};
use crate::expression::context::EvalContext;
use crate::internal_err;
use crate::functions::registry::{
    register_function, register_vector_function, FunctionMetadata, FunctionSignature,
    SimpleFunction, VectorFunction,
};
use crate::types::{LogicalType, SelectionVector, Value, Vector};
use std::sync::{Arc, Once};

/// Register the built-in function set. Safe to call more than once.
pub fn register_builtin_functions() {
    static ONCE: Once = Once::new();
    ONCE.call_once(register_all);
}

fn register_all() {
    for ty in [
        LogicalType::Integer,
        LogicalType::BigInt,
        LogicalType::Double,
    ] {
        register_binary("plus", ty.clone(), ty.clone(), scalar_plus);
        register_binary("minus", ty.clone(), ty.clone(), scalar_minus);
        register_binary("multiply", ty.clone(), ty.clone(), scalar_multiply);
        register_binary("divide", ty.clone(), ty.clone(), scalar_divide);
    }

    for ty in [
        LogicalType::Integer,
        LogicalType::BigInt,
        LogicalType::Double,
        LogicalType::Varchar,
    ] {
        register_binary("eq", ty.clone(), LogicalType::Boolean, scalar_eq);
        register_binary("lt", ty.clone(), LogicalType::Boolean, scalar_lt);
        register_binary("gt", ty.clone(), LogicalType::Boolean, scalar_gt);
    }

    register_function(SimpleFunction {
        signature: FunctionSignature::new("upper", vec![LogicalType::Varchar], LogicalType::Varchar),
        metadata: FunctionMetadata::default(),
        function: scalar_upper,
    });
    register_function(SimpleFunction {
        signature: FunctionSignature::new("length", vec![LogicalType::Varchar], LogicalType::BigInt),
        metadata: FunctionMetadata::default(),
        function: scalar_length,
    });

    register_vector_function(
        "concat",
        vec![
            FunctionSignature::new("concat", vec![LogicalType::Varchar], LogicalType::Varchar)
                .variadic(),
        ],
        Arc::new(ConcatFunction),
        FunctionMetadata {
            supports_flattening: true,
            ..FunctionMetadata::default()
        },
    );
}

fn register_binary(name: &str, arg: LogicalType, ret: LogicalType, function: super::ScalarFn) {
    register_function(SimpleFunction {
        signature: FunctionSignature::new(name, vec![arg.clone(), arg], ret),
        metadata: FunctionMetadata::default(),
        function,
    });
}

fn binary_args(args: &[Value]) -> VexelResult<(&Value, &Value)> {
    match args {
        [a, b] => Ok((a, b)),
        _ => Err(internal_err!(
            "Binary function called with {} arguments",
            args.len()
        )),
    }
}

fn arith(
    args: &[Value],
    name: &str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> VexelResult<Value> {
    let (a, b) = binary_args(args)?;
    match (a, b) {
        (Value::Integer(a), Value::Integer(b)) => int_op(*a as i64, *b as i64)
            .filter(|v| i32::try_from(*v).is_ok())
            .map(|v| Value::Integer(v as i32))
            .ok_or_else(|| VexelError::OutOfRange(format!("integer overflow in {}", name))),
        (Value::BigInt(a), Value::BigInt(b)) => int_op(*a, *b)
            .map(Value::BigInt)
            .ok_or_else(|| VexelError::OutOfRange(format!("integer overflow in {}", name))),
        (Value::Double(a), Value::Double(b)) => Ok(Value::Double(float_op(*a, *b))),
        (a, b) => Err(VexelError::InvalidType(format!(
            "{} is not defined for {} and {}",
            name,
            a.get_type(),
            b.get_type()
        ))),
    }
}

fn scalar_plus(args: &[Value]) -> VexelResult<Value> {
    arith(args, "plus", i64::checked_add, |a, b| a + b)
}

fn scalar_minus(args: &[Value]) -> VexelResult<Value> {
    arith(args, "minus", i64::checked_sub, |a, b| a - b)
}

fn scalar_multiply(args: &[Value]) -> VexelResult<Value> {
    arith(args, "multiply", i64::checked_mul, |a, b| a * b)
}

fn scalar_divide(args: &[Value]) -> VexelResult<Value> {
    let (a, b) = binary_args(args)?;
    match (a, b) {
        (_, Value::Integer(0)) | (_, Value::BigInt(0)) => {
            Err(VexelError::InvalidValue("Division by zero".to_string()))
        }
        _ => arith(args, "divide", i64::checked_div, |a, b| a / b),
    }
}

fn scalar_eq(args: &[Value]) -> VexelResult<Value> {
    let (a, b) = binary_args(args)?;
    Ok(Value::Boolean(a.compare(b)? == std::cmp::Ordering::Equal))
}

fn scalar_lt(args: &[Value]) -> VexelResult<Value> {
    let (a, b) = binary_args(args)?;
    Ok(Value::Boolean(a.compare(b)? == std::cmp::Ordering::Less))
}

fn scalar_gt(args: &[Value]) -> VexelResult<Value> {
    let (a, b) = binary_args(args)?;
    Ok(Value::Boolean(a.compare(b)? == std::cmp::Ordering::Greater))
}

fn scalar_upper(args: &[Value]) -> VexelResult<Value> {
    Ok(Value::Varchar(args[0].try_as_string()?.to_uppercase()))
}

fn scalar_length(args: &[Value]) -> VexelResult<Value> {
    Ok(Value::BigInt(args[0].try_as_string()?.chars().count() as i64))
}

/// Variadic string concatenation. Registered as a vector function with
/// flattening support, so nested concat calls compile into one n-ary call.
struct ConcatFunction;

impl VectorFunction for ConcatFunction {
    fn apply(
        &self,
        rows: &SelectionVector,
        args: &[Vector],
        return_type: &LogicalType,
        ctx: &mut EvalContext,
    ) -> VexelResult<Vector> {
        let mut result = Vector::new(return_type.clone(), rows.required_size());
        result.resize(rows.required_size())?;

        for row in rows.iter() {
            let mut out = String::new();
            let mut has_null = false;
            for arg in args {
                match arg.get_value(row)? {
                    Value::Null => {
                        has_null = true;
                        break;
                    }
                    Value::Varchar(s) => out.push_str(&s),
                    other => {
                        return Err(VexelError::InvalidType(format!(
                            "concat expects VARCHAR inputs, got {}",
                            other.get_type()
                        )))
                    }
                }
            }
            if has_null {
                result.set_null(row);
                ctx.note_default_null_row_skipped();
            } else {
                result.set_value(row, &Value::Varchar(out))?;
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() -> VexelResult<()> {
        register_builtin_functions();
        assert_eq!(
            scalar_plus(&[Value::integer(2), Value::integer(3)])?,
            Value::integer(5)
        );
        assert_eq!(
            scalar_multiply(&[Value::bigint(1 << 40), Value::bigint(4)])?,
            Value::bigint(1 << 42)
        );
        assert!(scalar_plus(&[Value::integer(i32::MAX), Value::integer(1)])
            .unwrap_err()
            .is_user_error());
        Ok(())
    }

    #[test]
    fn test_division_by_zero_is_user_error() {
        let err = scalar_divide(&[Value::integer(1), Value::integer(0)]).unwrap_err();
        assert!(err.is_user_error());
    }

    #[test]
    fn test_comparisons() -> VexelResult<()> {
        assert_eq!(
            scalar_lt(&[Value::varchar("a"), Value::varchar("b")])?,
            Value::Boolean(true)
        );
        assert_eq!(
            scalar_eq(&[Value::bigint(4), Value::bigint(4)])?,
            Value::Boolean(true)
        );
        Ok(())
    }
}
