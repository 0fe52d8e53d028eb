use crate::common::error::{VexelError, VexelResult};
use crate::types::logical_type::LogicalType;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Represents a single value with type information.
/// Values are the fundamental unit of scalar data in the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Null value (type is stored separately)
    Null,
    /// Boolean value
    Boolean(bool),
    /// 8-bit signed integer
    TinyInt(i8),
    /// 16-bit signed integer
    SmallInt(i16),
    /// 32-bit signed integer
    Integer(i32),
    /// 64-bit signed integer
    BigInt(i64),
    /// 128-bit signed integer
    HugeInt(i128),
    /// 32-bit floating point
    Real(f32),
    /// 64-bit double precision
    Double(f64),
    /// Decimal value (stored as integer scaled by 10^scale)
    Decimal {
        value: i128,
        precision: u8,
        scale: u8,
    },
    /// String value
    Varchar(String),
    /// Binary data
    Varbinary(Vec<u8>),
    /// Date value (days since 1970-01-01)
    Date(i32),
    /// Timestamp value (microseconds since 1970-01-01 00:00:00 UTC)
    Timestamp(i64),
    /// Array value
    Array(Vec<Value>),
    /// Row value with field names
    Row(Vec<(String, Value)>),
}

impl Value {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the logical type of this value
    pub fn get_type(&self) -> LogicalType {
        match self {
            Value::Null => LogicalType::Unknown, // Null needs external type info
            Value::Boolean(_) => LogicalType::Boolean,
            Value::TinyInt(_) => LogicalType::TinyInt,
            Value::SmallInt(_) => LogicalType::SmallInt,
            Value::Integer(_) => LogicalType::Integer,
            Value::BigInt(_) => LogicalType::BigInt,
            Value::HugeInt(_) => LogicalType::HugeInt,
            Value::Real(_) => LogicalType::Real,
            Value::Double(_) => LogicalType::Double,
            Value::Decimal {
                precision, scale, ..
            } => LogicalType::Decimal {
                precision: *precision,
                scale: *scale,
            },
            Value::Varchar(_) => LogicalType::Varchar,
            Value::Varbinary(_) => LogicalType::Varbinary,
            Value::Date(_) => LogicalType::Date,
            Value::Timestamp(_) => LogicalType::Timestamp,
            Value::Array(values) => {
                let element = values
                    .iter()
                    .find(|v| !v.is_null())
                    .map(|v| v.get_type())
                    .unwrap_or(LogicalType::Unknown);
                LogicalType::Array(Box::new(element))
            }
            Value::Row(fields) => LogicalType::Row(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.get_type()))
                    .collect(),
            ),
        }
    }

    /// Try to extract a boolean value
    pub fn try_as_boolean(&self) -> VexelResult<bool> {
        match self {
            Value::Boolean(value) => Ok(*value),
            Value::Null => Err(VexelError::InvalidValue(
                "Cannot extract boolean from NULL".to_string(),
            )),
            _ => Err(VexelError::InvalidType(format!(
                "Cannot extract boolean from {}",
                self.get_type()
            ))),
        }
    }

    /// Try to extract an i64, widening from the narrower integer types
    pub fn try_as_i64(&self) -> VexelResult<i64> {
        match self {
            Value::TinyInt(value) => Ok(*value as i64),
            Value::SmallInt(value) => Ok(*value as i64),
            Value::Integer(value) => Ok(*value as i64),
            Value::BigInt(value) => Ok(*value),
            Value::Date(value) => Ok(*value as i64),
            Value::Timestamp(value) => Ok(*value),
            Value::Null => Err(VexelError::InvalidValue(
                "Cannot extract i64 from NULL".to_string(),
            )),
            _ => Err(VexelError::InvalidType(format!(
                "Cannot extract i64 from {}",
                self.get_type()
            ))),
        }
    }

    /// Try to extract an i128, widening from any integer type
    pub fn try_as_i128(&self) -> VexelResult<i128> {
        match self {
            Value::HugeInt(value) => Ok(*value),
            Value::Decimal { value, .. } => Ok(*value),
            other => other.try_as_i64().map(|v| v as i128),
        }
    }

    /// Try to extract an f64 value
    pub fn try_as_f64(&self) -> VexelResult<f64> {
        match self {
            Value::Real(value) => Ok(*value as f64),
            Value::Double(value) => Ok(*value),
            Value::TinyInt(value) => Ok(*value as f64),
            Value::SmallInt(value) => Ok(*value as f64),
            Value::Integer(value) => Ok(*value as f64),
            Value::BigInt(value) => Ok(*value as f64),
            Value::HugeInt(value) => Ok(*value as f64),
            Value::Decimal { value, scale, .. } => {
                Ok(*value as f64 / 10f64.powi(*scale as i32))
            }
            Value::Null => Err(VexelError::InvalidValue(
                "Cannot extract f64 from NULL".to_string(),
            )),
            _ => Err(VexelError::InvalidType(format!(
                "Cannot extract f64 from {}",
                self.get_type()
            ))),
        }
    }

    /// Try to extract a string value
    pub fn try_as_string(&self) -> VexelResult<String> {
        match self {
            Value::Varchar(value) => Ok(value.clone()),
            Value::Null => Err(VexelError::InvalidValue(
                "Cannot extract string from NULL".to_string(),
            )),
            _ => Err(VexelError::InvalidType(format!(
                "Cannot extract string from {}",
                self.get_type()
            ))),
        }
    }

    /// Create a boolean value
    pub fn boolean(value: bool) -> Self {
        Value::Boolean(value)
    }

    /// Create an integer value
    pub fn integer(value: i32) -> Self {
        Value::Integer(value)
    }

    /// Create a big integer value
    pub fn bigint(value: i64) -> Self {
        Value::BigInt(value)
    }

    /// Create a double value
    pub fn double(value: f64) -> Self {
        Value::Double(value)
    }

    /// Create a string value
    pub fn varchar(value: impl Into<String>) -> Self {
        Value::Varchar(value.into())
    }

    /// Create a timestamp value from microseconds since the epoch
    pub fn timestamp(micros: i64) -> Self {
        Value::Timestamp(micros)
    }

    /// Create a decimal value from a scaled integer
    pub fn decimal(value: i128, precision: u8, scale: u8) -> Self {
        Value::Decimal {
            value,
            precision,
            scale,
        }
    }

    /// Compare two values for ordering. Numeric values of different widths
    /// compare through the wider representation; decimals rescale.
    pub fn compare(&self, other: &Value) -> VexelResult<Ordering> {
        fn float_cmp(a: f64, b: f64) -> VexelResult<Ordering> {
            a.partial_cmp(&b)
                .ok_or_else(|| VexelError::InvalidValue("Cannot compare NaN values".to_string()))
        }

        match (self, other) {
            (Value::Null, Value::Null) => Ok(Ordering::Equal),
            // NULL sorts before any value.
            (Value::Null, _) => Ok(Ordering::Less),
            (_, Value::Null) => Ok(Ordering::Greater),
            (Value::Boolean(a), Value::Boolean(b)) => Ok(a.cmp(b)),
            (Value::Varchar(a), Value::Varchar(b)) => Ok(a.cmp(b)),
            (Value::Varbinary(a), Value::Varbinary(b)) => Ok(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Ok(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Ok(a.cmp(b)),

            (
                Value::Decimal {
                    value: a,
                    scale: scale_a,
                    ..
                },
                Value::Decimal {
                    value: b,
                    scale: scale_b,
                    ..
                },
            ) => {
                if scale_a == scale_b {
                    Ok(a.cmp(b))
                } else if scale_a < scale_b {
                    let multiplier = 10_i128.pow((scale_b - scale_a) as u32);
                    Ok((a * multiplier).cmp(b))
                } else {
                    let multiplier = 10_i128.pow((scale_a - scale_b) as u32);
                    Ok(a.cmp(&(b * multiplier)))
                }
            }
            (Value::Decimal { value, scale, .. }, other) if other.get_type().is_integral() => {
                let scaled = other.try_as_i128()? * 10_i128.pow(*scale as u32);
                Ok(value.cmp(&scaled))
            }
            (this, Value::Decimal { value, scale, .. }) if this.get_type().is_integral() => {
                let scaled = this.try_as_i128()? * 10_i128.pow(*scale as u32);
                Ok(scaled.cmp(value))
            }

            (a, b) if a.get_type().is_integral() && b.get_type().is_integral() => {
                Ok(a.try_as_i128()?.cmp(&b.try_as_i128()?))
            }
            (a, b) if a.get_type().is_numeric() && b.get_type().is_numeric() => {
                float_cmp(a.try_as_f64()?, b.try_as_f64()?)
            }

            _ => Err(VexelError::InvalidType(format!(
                "Cannot compare {} and {}",
                self.get_type(),
                other.get_type()
            ))),
        }
    }
}

// Structural hash consistent with PartialEq; floats hash by bit pattern.
impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(v) => v.hash(state),
            Value::TinyInt(v) => v.hash(state),
            Value::SmallInt(v) => v.hash(state),
            Value::Integer(v) => v.hash(state),
            Value::BigInt(v) => v.hash(state),
            Value::HugeInt(v) => v.hash(state),
            Value::Real(v) => v.to_bits().hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::Decimal {
                value,
                precision,
                scale,
            } => {
                value.hash(state);
                precision.hash(state);
                scale.hash(state);
            }
            Value::Varchar(v) => v.hash(state),
            Value::Varbinary(v) => v.hash(state),
            Value::Date(v) => v.hash(state),
            Value::Timestamp(v) => v.hash(state),
            Value::Array(values) => values.hash(state),
            Value::Row(fields) => {
                for (name, value) in fields {
                    name.hash(state);
                    value.hash(state);
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(value) => write!(f, "{}", value),
            Value::TinyInt(value) => write!(f, "{}", value),
            Value::SmallInt(value) => write!(f, "{}", value),
            Value::Integer(value) => write!(f, "{}", value),
            Value::BigInt(value) => write!(f, "{}", value),
            Value::HugeInt(value) => write!(f, "{}", value),
            Value::Real(value) => write!(f, "{}", value),
            Value::Double(value) => write!(f, "{}", value),
            Value::Decimal { value, scale, .. } => {
                if *scale == 0 {
                    return write!(f, "{}", value);
                }
                let divisor = 10_i128.pow(*scale as u32);
                let integer_part = value / divisor;
                let fractional_part = (value % divisor).abs();
                let sign = if *value < 0 && integer_part == 0 {
                    "-"
                } else {
                    ""
                };
                write!(
                    f,
                    "{}{}.{:0width$}",
                    sign,
                    integer_part,
                    fractional_part,
                    width = *scale as usize
                )
            }
            Value::Varchar(value) => write!(f, "{}", value),
            Value::Varbinary(data) => {
                for byte in data {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            Value::Date(value) => write!(f, "DATE({})", value),
            Value::Timestamp(value) => write!(f, "TIMESTAMP({})", value),
            Value::Array(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
            Value::Row(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_creation() {
        let bool_val = Value::boolean(true);
        assert!(bool_val.try_as_boolean().unwrap());

        let int_val = Value::integer(42);
        assert_eq!(int_val.try_as_i64().unwrap(), 42);

        let double_val = Value::double(3.5);
        assert!((double_val.try_as_f64().unwrap() - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_value_comparison() {
        let int1 = Value::integer(10);
        let int2 = Value::bigint(20);
        assert_eq!(int1.compare(&int2).unwrap(), Ordering::Less);

        let str1 = Value::varchar("apple");
        let str2 = Value::varchar("banana");
        assert_eq!(str1.compare(&str2).unwrap(), Ordering::Less);

        // Decimal 1.50 vs integer 2
        let dec = Value::decimal(150, 5, 2);
        assert_eq!(dec.compare(&Value::integer(2)).unwrap(), Ordering::Less);
        assert_eq!(dec.compare(&Value::integer(1)).unwrap(), Ordering::Greater);
    }

    #[test]
    fn test_decimal_display() {
        assert_eq!(Value::decimal(12345, 10, 2).to_string(), "123.45");
        assert_eq!(Value::decimal(-50, 5, 2).to_string(), "-0.50");
        assert_eq!(Value::decimal(7, 3, 0).to_string(), "7");
    }

    #[test]
    fn test_null_values() {
        let null_val = Value::Null;
        assert!(null_val.is_null());
        assert!(null_val.try_as_i64().is_err());
        assert_eq!(null_val.get_type(), LogicalType::Unknown);
    }

    #[test]
    fn test_row_type() {
        let row = Value::Row(vec![
            ("id".to_string(), Value::integer(1)),
            ("name".to_string(), Value::varchar("a")),
        ]);
        match row.get_type() {
            LogicalType::Row(fields) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].1, LogicalType::Integer);
            }
            other => panic!("expected ROW type, got {}", other),
        }
    }
}
